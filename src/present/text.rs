use std::fmt::Write;

use crate::cube::{MeasureList, TableData};

const OVERALL: &str = "overall";

/// Renders a pivot table as aligned text, with an overall column and row.
///
/// ```text
/// firstname \ instrument  piano  sax  trumpet  overall
/// Bill                        1    0        0        1
/// ...
/// overall                     3    1        2        6
/// ```
pub fn render_table(table: &TableData) -> String {
    let corner = format!("{} \\ {}", table.row_dim_name, table.col_dim_name);

    let mut header: Vec<String> = vec![corner];
    header.extend(table.col_names.iter().map(|(_, pretty)| pretty.clone()));
    header.push(OVERALL.to_string());

    let mut lines: Vec<Vec<String>> = vec![header];
    for (r, row) in table.rows.iter().enumerate() {
        let mut line = vec![row.pretty_name.clone()];
        line.extend(
            (0..table.cols.len())
                .map(|c| table.cell(c, r).map(|v| v.to_string()).unwrap_or_default()),
        );
        line.push(row.overall.to_string());
        lines.push(line);
    }

    let mut footer = vec![OVERALL.to_string()];
    footer.extend(table.col_overalls.iter().map(|v| v.to_string()));
    footer.push(table.overall.to_string());
    lines.push(footer);

    let columns = lines.iter().map(Vec::len).max().unwrap_or(0);
    let widths: Vec<usize> = (0..columns)
        .map(|i| {
            lines
                .iter()
                .filter_map(|l| l.get(i))
                .map(|s| s.chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    for line in &lines {
        let mut cells = Vec::with_capacity(line.len());
        for (i, cell) in line.iter().enumerate() {
            if i == 0 {
                cells.push(format!("{:<width$}", cell, width = widths[i]));
            } else {
                cells.push(format!("{:>width$}", cell, width = widths[i]));
            }
        }
        let _ = writeln!(out, "{}", cells.join("  ").trim_end());
    }
    out
}

/// One line per top-level entry, nested levels in brackets
pub fn render_measure_list(list: &MeasureList) -> String {
    let mut out = String::new();
    for item in list.level() {
        let _ = writeln!(out, "{}", inline(item));
    }
    out
}

fn inline(list: &MeasureList) -> String {
    match list {
        MeasureList::Measure(value) => value.to_string(),
        MeasureList::Level(items) => {
            let inner: Vec<String> = items.iter().map(inline).collect();
            format!("[{}]", inner.join(", "))
        }
    }
}

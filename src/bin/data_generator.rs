use std::fs::File;
use std::io::{BufWriter, Write};

use chrono::{Days, NaiveDate};
use rand::Rng;

const CATEGORIES: [&str; 4] = ["A", "B", "C", "D"];
const REGIONS: [&str; 6] = ["US", "EU", "ASIA", "AFRICA", "AUSTRALIA", "SOUTH AMERICA"];

/// Writes `data/sales.csv` (or the path given as first argument) with
/// `id,amount,category,region,date` rows; the row count is the second argument.
fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let path = args.next().unwrap_or_else(|| "data/sales.csv".to_string());
    let rows: usize = match args.next() {
        Some(n) => n.parse()?,
        None => 1_000_000,
    };

    if let Some(dir) = std::path::Path::new(&path).parent() {
        std::fs::create_dir_all(dir)?;
    }
    let mut writer = BufWriter::new(File::create(&path)?);
    writeln!(writer, "id,amount,category,region,date")?;

    let start = NaiveDate::from_ymd_opt(2020, 1, 1)
        .ok_or_else(|| anyhow::anyhow!("invalid start date"))?;
    let mut rng = rand::rng();
    for i in 0..rows {
        let amount = rng.random_range(1..1000);
        let category = CATEGORIES[rng.random_range(0..CATEGORIES.len())];
        let region = REGIONS[rng.random_range(0..REGIONS.len())];
        let date = start + Days::new(rng.random_range(0..1461));
        writeln!(
            writer,
            "{},{},{},{},{}",
            i,
            amount,
            category,
            region,
            date.format("%Y-%m-%d")
        )?;
    }
    writer.flush()?;

    println!("Sample CSV generated: {} ({} rows)", path, rows);
    Ok(())
}

//! Field-path parsing and lookups against a backing collection.
//!
//! A path is a `__` (or `.`) separated list of segments. Every segment but the
//! last traverses a relation; the last one names a field. After the field, the
//! path may carry one date part (`year`, `month`, `day`) or one calendar
//! granularity (`absmonth`, `absday`), then one operator (`exact`, `in`, `gt`,
//! `gte`, `lt`, `lte`, `regex`, `iregex`). Keywords are only recognized after at least
//! one field segment.

use std::cmp::Ordering;
use std::fmt;

use chrono::{Datelike, NaiveDate};
use regex::{Regex, RegexBuilder};

use crate::collection::RecordError;
use crate::cube::{CubeError, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatePart {
    Year,
    Month,
    Day,
}

impl DatePart {
    fn keyword(&self) -> &'static str {
        match self {
            DatePart::Year => "year",
            DatePart::Month => "month",
            DatePart::Day => "day",
        }
    }

    pub fn extract(&self, date: NaiveDate) -> i64 {
        match self {
            DatePart::Year => date.year() as i64,
            DatePart::Month => date.month() as i64,
            DatePart::Day => date.day() as i64,
        }
    }
}

/// Groups a date field by absolute month or day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CalendarGranularity {
    Month,
    Day,
}

impl CalendarGranularity {
    fn keyword(&self) -> &'static str {
        match self {
            CalendarGranularity::Month => "absmonth",
            CalendarGranularity::Day => "absday",
        }
    }

    pub fn truncate(&self, date: NaiveDate) -> NaiveDate {
        match self {
            CalendarGranularity::Month => date.with_day(1).unwrap_or(date),
            CalendarGranularity::Day => date,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LookupOp {
    #[default]
    Exact,
    /// Equal to one element of a [`Value::List`]
    In,
    Gt,
    Gte,
    Lt,
    Lte,
    Regex,
    IRegex,
}

impl LookupOp {
    fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "exact" => Some(LookupOp::Exact),
            "in" => Some(LookupOp::In),
            "gt" => Some(LookupOp::Gt),
            "gte" => Some(LookupOp::Gte),
            "lt" => Some(LookupOp::Lt),
            "lte" => Some(LookupOp::Lte),
            "regex" => Some(LookupOp::Regex),
            "iregex" => Some(LookupOp::IRegex),
            _ => None,
        }
    }

    fn keyword(&self) -> &'static str {
        match self {
            LookupOp::Exact => "exact",
            LookupOp::In => "in",
            LookupOp::Gt => "gt",
            LookupOp::Gte => "gte",
            LookupOp::Lt => "lt",
            LookupOp::Lte => "lte",
            LookupOp::Regex => "regex",
            LookupOp::IRegex => "iregex",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    raw: String,
    segments: Vec<String>,
    date_part: Option<DatePart>,
    granularity: Option<CalendarGranularity>,
    op: LookupOp,
}

impl FieldPath {
    pub fn parse(raw: &str) -> Self {
        let mut segments: Vec<String> = raw
            .split("__")
            .flat_map(|part| part.split('.'))
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        let mut op = LookupOp::Exact;
        if segments.len() > 1 {
            if let Some(parsed) = segments.last().and_then(|s| LookupOp::from_keyword(s)) {
                op = parsed;
                segments.pop();
            }
        }

        let mut date_part = None;
        let mut granularity = None;
        if segments.len() > 1 {
            match segments.last().map(String::as_str) {
                Some("year") => date_part = Some(DatePart::Year),
                Some("month") => date_part = Some(DatePart::Month),
                Some("day") => date_part = Some(DatePart::Day),
                Some("absmonth") => granularity = Some(CalendarGranularity::Month),
                Some("absday") => granularity = Some(CalendarGranularity::Day),
                _ => {}
            }
            if date_part.is_some() || granularity.is_some() {
                segments.pop();
            }
        }

        FieldPath {
            raw: raw.to_string(),
            segments,
            date_part,
            granularity,
            op,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Field and relation segments, without date parts or operators
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn date_part(&self) -> Option<DatePart> {
        self.date_part
    }

    pub fn granularity(&self) -> Option<CalendarGranularity> {
        self.granularity
    }

    pub fn op(&self) -> LookupOp {
        self.op
    }

    /// Same field, reduced to one component of its date
    pub fn with_date_part(&self, part: DatePart) -> Self {
        let mut raw = self.segments.join("__");
        raw.push_str("__");
        raw.push_str(part.keyword());
        FieldPath {
            raw,
            segments: self.segments.clone(),
            date_part: Some(part),
            granularity: None,
            op: LookupOp::Exact,
        }
    }

    /// Same field, date part and granularity, compared with `op`
    pub fn with_op(&self, op: LookupOp) -> Self {
        let mut parts: Vec<&str> = self.segments.iter().map(String::as_str).collect();
        if let Some(part) = self.date_part {
            parts.push(part.keyword());
        }
        if let Some(granularity) = self.granularity {
            parts.push(granularity.keyword());
        }
        if op != LookupOp::Exact {
            parts.push(op.keyword());
        }
        FieldPath {
            raw: parts.join("__"),
            op,
            ..self.clone()
        }
    }

    /// Applies the path's date part or granularity to a resolved field value.
    ///
    /// Returns `None` when the path asks for a date component of a non-date value.
    pub fn project(&self, value: Value) -> Option<Value> {
        match (self.date_part, self.granularity, value) {
            (Some(part), _, Value::Date(d)) => Some(Value::Int(part.extract(d))),
            (None, Some(granularity), Value::Date(d)) => Some(Value::Date(granularity.truncate(d))),
            (None, None, value) => Some(value),
            _ => None,
        }
    }
}

impl From<&str> for FieldPath {
    fn from(raw: &str) -> Self {
        FieldPath::parse(raw)
    }
}

impl From<String> for FieldPath {
    fn from(raw: String) -> Self {
        FieldPath::parse(&raw)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// One `field <op> value` condition of a collection filter
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Lookup {
    pub path: FieldPath,
    pub value: Value,
}

impl Lookup {
    pub fn new(path: impl Into<FieldPath>, value: impl Into<Value>) -> Self {
        Lookup {
            path: path.into(),
            value: value.into(),
        }
    }

    /// Splits an absolute-month or absolute-day lookup on a date into exact
    /// year, month (and day) lookups. Any other lookup is returned unchanged.
    pub fn expand(self) -> Vec<Lookup> {
        let date = match (self.path.granularity(), &self.value) {
            (Some(_), Value::Date(d)) => *d,
            _ => return vec![self],
        };

        let mut parts = vec![DatePart::Year, DatePart::Month];
        if self.path.granularity() == Some(CalendarGranularity::Day) {
            parts.push(DatePart::Day);
        }
        parts
            .into_iter()
            .map(|part| Lookup {
                path: self.path.with_date_part(part),
                value: Value::Int(part.extract(date)),
            })
            .collect()
    }

    pub fn matcher(&self) -> Result<Matcher, CubeError> {
        match self.path.op() {
            LookupOp::Regex | LookupOp::IRegex => {
                let pattern = self.value.to_string();
                let regex = RegexBuilder::new(&pattern)
                    .case_insensitive(self.path.op() == LookupOp::IRegex)
                    .build()
                    .map_err(|e| {
                        RecordError::Parse(format!("invalid pattern '{}': {}", pattern, e))
                    })?;
                Ok(Matcher::Pattern(regex))
            }
            op => Ok(Matcher::Compare(op, self.value.clone())),
        }
    }
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.path, self.value)
    }
}

/// A lookup prepared for evaluation against many records
#[derive(Debug, Clone)]
pub enum Matcher {
    Compare(LookupOp, Value),
    Pattern(Regex),
}

impl Matcher {
    pub fn matches(&self, candidate: &Value) -> bool {
        match self {
            Matcher::Pattern(regex) => regex.is_match(&candidate.to_string()),
            Matcher::Compare(LookupOp::In, Value::List(targets)) => {
                targets.iter().any(|t| compare(candidate, t).is_eq())
            }
            Matcher::Compare(op, target) => {
                let ordering = compare(candidate, target);
                match op {
                    LookupOp::Exact | LookupOp::In => ordering.is_eq(),
                    LookupOp::Gt => ordering.is_gt(),
                    LookupOp::Gte => ordering.is_ge(),
                    LookupOp::Lt => ordering.is_lt(),
                    LookupOp::Lte => ordering.is_le(),
                    LookupOp::Regex | LookupOp::IRegex => false,
                }
            }
        }
    }
}

fn compare(candidate: &Value, target: &Value) -> Ordering {
    match (candidate, target) {
        // a related record may be matched by its primary key
        (Value::Entity(e), Value::Int(id)) => e.id.cmp(id),
        (Value::Float(a), Value::Int(b)) => a.total_cmp(&(*b as f64)),
        (Value::Int(a), Value::Float(b)) => (*a as f64).total_cmp(b),
        _ => candidate.cmp(target),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_traversal_and_date_part() {
        let path = FieldPath::parse("author__release_date__year");
        assert_eq!(path.segments(), &["author".to_string(), "release_date".to_string()]);
        assert_eq!(path.date_part(), Some(DatePart::Year));
        assert_eq!(path.op(), LookupOp::Exact);
    }

    #[test]
    fn test_parse_dots_and_operator() {
        let path = FieldPath::parse("instrument.name__iregex");
        assert_eq!(path.segments(), &["instrument".to_string(), "name".to_string()]);
        assert_eq!(path.op(), LookupOp::IRegex);
    }

    #[test]
    fn test_keyword_alone_is_a_field() {
        let path = FieldPath::parse("month");
        assert_eq!(path.segments(), &["month".to_string()]);
        assert_eq!(path.date_part(), None);
    }

    #[test]
    fn test_absmonth_expands_to_year_and_month() {
        let date = NaiveDate::from_ymd_opt(1986, 11, 1).unwrap();
        let lookups = Lookup::new("date__absmonth", date).expand();
        assert_eq!(
            lookups,
            vec![
                Lookup::new("date__year", 1986),
                Lookup::new("date__month", 11),
            ]
        );
    }

    #[test]
    fn test_absday_expands_to_three_parts() {
        let date = NaiveDate::from_ymd_opt(1990, 8, 23).unwrap();
        let lookups = Lookup::new("released__absday", date).expand();
        assert_eq!(lookups.len(), 3);
        assert_eq!(lookups[2], Lookup::new("released__day", 23));
    }

    #[test]
    fn test_absmonth_without_date_is_kept() {
        let lookups = Lookup::new("date__absmonth", "soon").expand();
        assert_eq!(lookups.len(), 1);
        assert_eq!(lookups[0].path.granularity(), Some(CalendarGranularity::Month));
    }

    #[test]
    fn test_iregex_matcher() {
        let matcher = Lookup::new("title__iregex", "^[a-n]").matcher().unwrap();
        assert!(matcher.matches(&Value::from("All Blues")));
        assert!(!matcher.matches(&Value::from("So What")));
    }

    #[test]
    fn test_compare_matchers() {
        let gt = Lookup::new("value__gt", 15).matcher().unwrap();
        assert!(gt.matches(&Value::Int(20)));
        assert!(!gt.matches(&Value::Int(15)));
    }

    #[test]
    fn test_in_matcher() {
        let lookup = Lookup::new(
            "instrument__name__in",
            vec![Value::from("piano"), Value::from("sax")],
        );
        assert_eq!(lookup.path.op(), LookupOp::In);
        let matcher = lookup.matcher().unwrap();
        assert!(matcher.matches(&Value::from("sax")));
        assert!(!matcher.matches(&Value::from("trumpet")));

        let nothing = Lookup::new("instrument__in", Vec::<Value>::new()).matcher().unwrap();
        assert!(!nothing.matches(&Value::Int(1)));
    }

    #[test]
    fn test_with_op_keeps_date_part() {
        let path = FieldPath::parse("released__absmonth").with_op(LookupOp::In);
        assert_eq!(path.as_str(), "released__absmonth__in");
        assert_eq!(path, FieldPath::parse("released__absmonth__in"));
        assert_eq!(path.granularity(), Some(CalendarGranularity::Month));
    }
}

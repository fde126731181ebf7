//! In-memory tabular data parsed from a staged CSV file.
//!
//! Column kinds are decided once, at parse time: a column is numeric when every
//! non-missing cell parses as a number, otherwise it is text. Cleaning code
//! works on the typed column data and never re-probes cell contents.

use crate::utils::error::{EtlError, Result};
use std::collections::HashSet;

/// Cell values read as missing.
pub const MISSING_TOKENS: &[&str] = &[
    "", "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "null", "NULL", "None", "#N/A", "<NA>",
];

const DELIMITER_CANDIDATES: &[u8] = b",;\t|";
const SNIFF_LINES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// `integral` is set when every value was an integer and none was missing.
    Numeric { integral: bool },
    Text,
}

/// A numeric cell. Integers keep their exact value instead of going through `f64`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Integer(i64),
    Float(f64),
}

impl Number {
    /// Integer text first, so values past 2^53 survive a round trip.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        raw.parse::<i64>()
            .map(Number::Integer)
            .ok()
            .or_else(|| raw.parse::<f64>().ok().map(Number::Float))
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Number::Integer(v) => v as f64,
            Number::Float(v) => v,
        }
    }

    fn render(self, integral: bool) -> String {
        match self {
            Number::Integer(v) if integral => v.to_string(),
            Number::Integer(v) => format!("{}.0", v),
            Number::Float(v) => format_float(v),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Numeric(Vec<Option<Number>>),
    Text(Vec<Option<String>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
    integral: bool,
    /// Set by mean imputation when the column had no value to average.
    pub mean_undefined: bool,
}

impl Column {
    pub fn numeric(name: impl Into<String>, values: Vec<Option<Number>>, integral: bool) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Numeric(values),
            integral,
            mean_undefined: false,
        }
    }

    pub fn text(name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Text(values),
            integral: false,
            mean_undefined: false,
        }
    }

    pub fn kind(&self) -> ColumnKind {
        match self.data {
            ColumnData::Numeric(_) => ColumnKind::Numeric {
                integral: self.integral,
            },
            ColumnData::Text(_) => ColumnKind::Text,
        }
    }

    pub fn len(&self) -> usize {
        match &self.data {
            ColumnData::Numeric(values) => values.len(),
            ColumnData::Text(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_missing(&self, row: usize) -> bool {
        match &self.data {
            ColumnData::Numeric(values) => values.get(row).is_some_and(Option::is_none),
            ColumnData::Text(values) => values.get(row).is_some_and(Option::is_none),
        }
    }

    pub fn missing_count(&self) -> usize {
        (0..self.len()).filter(|&row| self.is_missing(row)).count()
    }

    /// Cell rendered the way it is written back to CSV; `None` for a missing cell.
    pub fn render(&self, row: usize) -> Option<String> {
        match &self.data {
            ColumnData::Numeric(values) => values
                .get(row)
                .copied()
                .flatten()
                .map(|v| v.render(self.integral)),
            ColumnData::Text(values) => values.get(row).cloned().flatten(),
        }
    }

    pub(crate) fn retain_rows(&mut self, keep: &[bool]) {
        fn retain<T>(values: &mut Vec<T>, keep: &[bool]) {
            let mut flags = keep.iter();
            values.retain(|_| flags.next().copied().unwrap_or(false));
        }
        match &mut self.data {
            ColumnData::Numeric(values) => retain(values, keep),
            ColumnData::Text(values) => retain(values, keep),
        }
    }

    /// Re-types a numeric column as text, keeping the rendered values.
    pub(crate) fn into_text(self) -> Column {
        let Column {
            name,
            data,
            integral,
            mean_undefined,
        } = self;
        let rendered = match data {
            ColumnData::Text(values) => values,
            ColumnData::Numeric(values) => values
                .into_iter()
                .map(|v| v.map(|v| v.render(integral)))
                .collect(),
        };
        Column {
            name,
            data: ColumnData::Text(rendered),
            integral: false,
            mean_undefined,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    dropped_rows: usize,
}

impl Table {
    /// Parses delimited text. `name` only labels errors.
    pub fn parse(name: &str, content: &[u8]) -> Result<Self> {
        let parse_error = |message: String| EtlError::ParseError {
            name: name.to_string(),
            message,
        };

        let text = std::str::from_utf8(content)
            .map_err(|e| parse_error(format!("content is not UTF-8: {}", e)))?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        if text.trim().is_empty() {
            return Err(parse_error("content is empty".to_string()));
        }

        let delimiter = sniff_delimiter(text);
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers = reader
            .headers()
            .map_err(|e| parse_error(format!("unreadable header: {}", e)))?
            .clone();
        if headers.iter().all(|h| h.trim().is_empty()) {
            return Err(parse_error("header row has no column names".to_string()));
        }
        let names = dedupe_names(headers.iter());
        let width = names.len();

        let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); width];
        let mut dropped_rows = 0;
        for record in reader.records() {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    tracing::debug!(file = name, error = %e, "Dropping unreadable row");
                    dropped_rows += 1;
                    continue;
                }
            };
            if record.len() > width {
                dropped_rows += 1;
                continue;
            }
            for (idx, column) in cells.iter_mut().enumerate() {
                column.push(record.get(idx).and_then(as_present));
            }
        }

        if dropped_rows > 0 {
            tracing::warn!(file = name, dropped_rows, "Skipped malformed rows");
        }

        let columns = names
            .into_iter()
            .zip(cells)
            .map(|(name, values)| infer_column(name, values))
            .collect();

        Ok(Self {
            columns,
            dropped_rows,
        })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Column name to kind, as decided at parse time.
    pub fn schema(&self) -> Vec<(&str, ColumnKind)> {
        self.columns
            .iter()
            .map(|c| (c.name.as_str(), c.kind()))
            .collect()
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    pub fn dropped_rows(&self) -> usize {
        self.dropped_rows
    }

    pub fn missing_count(&self) -> usize {
        self.columns.iter().map(Column::missing_count).sum()
    }

    pub(crate) fn into_columns(self) -> (Vec<Column>, usize) {
        (self.columns, self.dropped_rows)
    }

    pub(crate) fn with_columns(columns: Vec<Column>, dropped_rows: usize) -> Self {
        Self {
            columns,
            dropped_rows,
        }
    }

    /// Comma-separated output with a header row; missing cells are empty.
    pub fn to_csv_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(self.columns.iter().map(|c| c.name.as_str()))?;
        for row in 0..self.row_count() {
            let record: Vec<String> = self
                .columns
                .iter()
                .map(|c| c.render(row).unwrap_or_default())
                .collect();
            writer.write_record(&record)?;
        }
        writer
            .into_inner()
            .map_err(|e| EtlError::IoError(e.into_error()))
    }
}

fn as_present(raw: &str) -> Option<String> {
    if MISSING_TOKENS.contains(&raw.trim()) {
        None
    } else {
        Some(raw.to_string())
    }
}

fn infer_column(name: String, values: Vec<Option<String>>) -> Column {
    let parsed: Option<Vec<Option<Number>>> = values
        .iter()
        .map(|cell| match cell {
            None => Some(None),
            Some(raw) => Number::parse(raw).map(Some),
        })
        .collect();

    match parsed {
        Some(numbers) => {
            let integral = !numbers.is_empty()
                && numbers
                    .iter()
                    .all(|cell| matches!(cell, Some(Number::Integer(_))));
            Column::numeric(name, numbers, integral)
        }
        None => Column::text(name, values),
    }
}

/// Repeated header names get `.1`, `.2`, ... suffixes.
fn dedupe_names<'a>(headers: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    headers
        .map(|header| {
            let base = header.trim().to_string();
            let mut candidate = base.clone();
            let mut suffix = 1;
            while !seen.insert(candidate.clone()) {
                candidate = format!("{}.{}", base, suffix);
                suffix += 1;
            }
            candidate
        })
        .collect()
}

/// Picks the candidate delimiter that splits the first lines most consistently.
pub fn sniff_delimiter(text: &str) -> u8 {
    let lines: Vec<&str> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .take(SNIFF_LINES)
        .collect();

    let mut best: Option<(bool, usize, u8)> = None;
    for &candidate in DELIMITER_CANDIDATES {
        let counts: Vec<usize> = lines
            .iter()
            .map(|line| line.bytes().filter(|&b| b == candidate).count())
            .collect();
        let header_count = counts.first().copied().unwrap_or(0);
        if header_count == 0 {
            continue;
        }
        let consistent = counts.iter().all(|&c| c == header_count);
        let score = (consistent, header_count, candidate);
        let better = match best {
            None => true,
            Some((best_consistent, best_count, _)) => {
                (consistent, header_count) > (best_consistent, best_count)
            }
        };
        if better {
            best = Some(score);
        }
    }

    best.map(|(_, _, delimiter)| delimiter).unwrap_or(b',')
}

fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_infers_kinds() {
        let table = Table::parse("a.csv", b"id,val,label\n1,,x\n2,4,\n").unwrap();

        assert_eq!(table.row_count(), 2);
        assert_eq!(
            table.schema(),
            vec![
                ("id", ColumnKind::Numeric { integral: true }),
                ("val", ColumnKind::Numeric { integral: false }),
                ("label", ColumnKind::Text),
            ]
        );
        assert_eq!(table.missing_count(), 2);
    }

    #[test]
    fn test_parse_detects_delimiter() {
        let table = Table::parse("semi.csv", b"a;b;c\n1;2;3\n4;5;6\n").unwrap();
        assert_eq!(table.column_names(), vec!["a", "b", "c"]);

        let table = Table::parse("pipe.csv", b"a|b\nx,y|1\n").unwrap();
        assert_eq!(table.column_names(), vec!["a", "b"]);
        assert_eq!(table.column("a").unwrap().render(0).as_deref(), Some("x,y"));
    }

    #[test]
    fn test_parse_drops_overlong_rows_and_pads_short_ones() {
        let table = Table::parse("bad.csv", b"a,b\n1,2\n1,2,3\n5\n").unwrap();

        assert_eq!(table.row_count(), 2);
        assert_eq!(table.dropped_rows(), 1);
        assert!(table.column("b").unwrap().is_missing(1));
    }

    #[test]
    fn test_parse_rejects_unusable_content() {
        assert!(matches!(
            Table::parse("empty.csv", b"  \n"),
            Err(EtlError::ParseError { .. })
        ));
        assert!(matches!(
            Table::parse("binary.csv", &[0xff, 0xfe, 0x00, 0x81]),
            Err(EtlError::ParseError { .. })
        ));
    }

    #[test]
    fn test_missing_tokens_and_duplicate_headers() {
        let table = Table::parse("t.csv", b"x,x,y\nNA,1,null\n2,N/A,z\n").unwrap();

        assert_eq!(table.column_names(), vec!["x", "x.1", "y"]);
        assert!(table.column("x").unwrap().is_missing(0));
        assert!(table.column("x.1").unwrap().is_missing(1));
        assert_eq!(table.column("y").unwrap().kind(), ColumnKind::Text);
    }

    #[test]
    fn test_all_missing_column_is_numeric() {
        let table = Table::parse("t.csv", b"a,b\n1,\n2,\n").unwrap();
        assert_eq!(
            table.column("b").unwrap().kind(),
            ColumnKind::Numeric { integral: false }
        );
    }

    #[test]
    fn test_to_csv_formats_numbers() {
        let table = Table::parse("a.csv", b"id,val,ratio\n1,,0.25\n2,4,1.5\n").unwrap();
        let out = String::from_utf8(table.to_csv_bytes().unwrap()).unwrap();

        assert_eq!(out, "id,val,ratio\n1,,0.25\n2,4.0,1.5\n");
    }

    #[test]
    fn test_large_integers_are_written_back_exactly() {
        let input = "id,val\n9007199254740993,1\n9007199254740995,2\n";
        let table = Table::parse("big.csv", input.as_bytes()).unwrap();
        let out = String::from_utf8(table.to_csv_bytes().unwrap()).unwrap();
        assert_eq!(out, input);

        let table = Table::parse("big.csv", b"id,val\n9007199254740993,\n2,4\n").unwrap();
        let out = String::from_utf8(table.to_csv_bytes().unwrap()).unwrap();
        assert_eq!(out, "id,val\n9007199254740993,\n2,4.0\n");
    }
}

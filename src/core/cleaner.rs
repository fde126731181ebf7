use crate::core::table::{Column, ColumnData, Number, Table};
use crate::utils::error::{EtlError, Result};
use std::fmt;

/// How missing cells are handled.
#[derive(Debug, Clone, PartialEq)]
pub enum ImputationPolicy {
    DropRowsWithAnyMissing,
    FillWithConstant(String),
    FillNumericWithColumnMean,
}

impl ImputationPolicy {
    /// Resolves a configured policy name. `fill_value` is only read by the fill policy.
    pub fn from_name(name: &str, fill_value: Option<&str>) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "drop" | "drop-rows-with-any-missing" => Ok(Self::DropRowsWithAnyMissing),
            "mean" | "fill-numeric-with-column-mean" => Ok(Self::FillNumericWithColumnMean),
            "fill" | "fill-with-constant" => match fill_value {
                Some(value) => Ok(Self::FillWithConstant(value.to_string())),
                None => Err(EtlError::InvalidPolicy {
                    policy: name.to_string(),
                    reason: "the fill policy needs a fill value".to_string(),
                }),
            },
            _ => Err(EtlError::InvalidPolicy {
                policy: name.to_string(),
                reason: "expected one of: drop, fill, mean".to_string(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::DropRowsWithAnyMissing => "drop-rows-with-any-missing",
            Self::FillWithConstant(_) => "fill-with-constant",
            Self::FillNumericWithColumnMean => "fill-numeric-with-column-mean",
        }
    }
}

impl fmt::Display for ImputationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FillWithConstant(value) => write!(f, "{}({})", self.name(), value),
            _ => f.write_str(self.name()),
        }
    }
}

/// Applies `policy` to `table`.
///
/// Mean imputation leaves a numeric column with no values at all untouched and
/// sets [`Column::mean_undefined`] on it.
pub fn clean(table: Table, policy: &ImputationPolicy) -> Table {
    let (columns, dropped_rows) = table.into_columns();
    let columns = match policy {
        ImputationPolicy::DropRowsWithAnyMissing => drop_incomplete_rows(columns),
        ImputationPolicy::FillWithConstant(value) => columns
            .into_iter()
            .map(|column| fill_constant(column, value))
            .collect(),
        ImputationPolicy::FillNumericWithColumnMean => {
            columns.into_iter().map(fill_mean).collect()
        }
    };
    Table::with_columns(columns, dropped_rows)
}

fn drop_incomplete_rows(mut columns: Vec<Column>) -> Vec<Column> {
    let rows = columns.first().map(Column::len).unwrap_or(0);
    let keep: Vec<bool> = (0..rows)
        .map(|row| !columns.iter().any(|c| c.is_missing(row)))
        .collect();
    for column in &mut columns {
        column.retain_rows(&keep);
    }
    columns
}

fn fill_constant(column: Column, value: &str) -> Column {
    if column.missing_count() == 0 {
        return column;
    }
    let number = Number::parse(value);
    let retype = number.is_none() && matches!(column.data, ColumnData::Numeric(_));
    let mut column = if retype { column.into_text() } else { column };
    match &mut column.data {
        ColumnData::Numeric(values) => {
            if let Some(number) = number {
                values.iter_mut().filter(|v| v.is_none()).for_each(|v| *v = Some(number));
            }
        }
        ColumnData::Text(values) => values
            .iter_mut()
            .filter(|v| v.is_none())
            .for_each(|v| *v = Some(value.to_string())),
    }
    column
}

fn fill_mean(mut column: Column) -> Column {
    let missing = column.missing_count();
    if let ColumnData::Numeric(values) = &mut column.data {
        let (sum, count) = values
            .iter()
            .flatten()
            .fold((0.0_f64, 0_usize), |(sum, count), v| {
                (sum + v.as_f64(), count + 1)
            });
        if count == 0 {
            column.mean_undefined = missing > 0;
            return column;
        }
        let mean = sum / count as f64;
        values
            .iter_mut()
            .filter(|v| v.is_none())
            .for_each(|v| *v = Some(Number::Float(mean)));
    }
    column
}

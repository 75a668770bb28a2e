use std::fmt;

use itertools::Itertools;
use serde::Deserialize;

use crate::{capacity, Error, Result};

/// A single cell.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Text(String),
    #[serde(skip)]
    Missing,
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Text(_) | Value::Missing => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Equality that lets an integer match a float of the same value.
    pub fn matches(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Missing, Value::Missing) => true,
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => f.write_str(s),
            Value::Missing => Ok(()),
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

pub(crate) fn type_mismatch(column: &str, value: &Value) -> Error {
    Error::TypeMismatch {
        column: column.to_string(),
        value: match value {
            Value::Missing => String::from("a missing value"),
            other => format!("`{other}`"),
        },
    }
}

/// Named columns over rows of equal width.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new<S: Into<String>, I: IntoIterator<Item = S>>(columns: I) -> Table {
        Table {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: vec![],
        }
    }

    pub fn push(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(Error::Config(format!(
                "row has {} cells but the table has {} columns ({})",
                row.len(),
                self.columns.len(),
                self.columns.iter().join(", ")
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| Error::UnknownColumn(name.to_string()))
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    pub fn column(&self, name: &str) -> Result<impl Iterator<Item = &Value>> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(move |row| &row[idx]))
    }

    /// Every value of `name` as a float; fails on the first non-numeric cell.
    pub fn numeric_column(&self, name: &str) -> Result<Vec<f64>> {
        self.column(name)?
            .map(|v| v.as_f64().ok_or_else(|| type_mismatch(name, v)))
            .collect()
    }

    /// Keep the first `n` rows.
    pub fn head(mut self, n: usize) -> Table {
        self.rows.truncate(n);
        self
    }

    /// Keep every `n`th row, starting with the first.
    pub fn step_by(self, n: usize) -> Result<Table> {
        if n == 0 {
            return Err(Error::Config(String::from("row step must be at least 1")));
        }
        Ok(Table {
            columns: self.columns,
            rows: self.rows.into_iter().step_by(n).collect(),
        })
    }

    pub fn filter_eq(self, column: &str, value: &Value) -> Result<Table> {
        let idx = self.column_index(column)?;
        Ok(Table {
            columns: self.columns,
            rows: self
                .rows
                .into_iter()
                .filter(|row| row[idx].matches(value))
                .collect(),
        })
    }

    /// Append (or overwrite) a column computed from each row.
    pub fn derive<F>(mut self, name: &str, f: F) -> Result<Table>
    where
        F: Fn(&[Value]) -> Result<Value>,
    {
        let values = self
            .rows
            .iter()
            .map(|row| f(row))
            .collect::<Result<Vec<Value>>>()?;

        match self.columns.iter().position(|c| c == name) {
            Some(idx) => self
                .rows
                .iter_mut()
                .zip(values)
                .for_each(|(row, v)| row[idx] = v),
            None => {
                self.columns.push(name.to_string());
                self.rows
                    .iter_mut()
                    .zip(values)
                    .for_each(|(row, v)| row.push(v));
            }
        }
        Ok(self)
    }

    /// Channel capacity from an SNR column in dB.
    pub fn with_capacity(self, snr: &str, into: &str) -> Result<Table> {
        let idx = self.column_index(snr)?;
        self.derive(into, |row| {
            row[idx]
                .as_f64()
                .map(|snr_db| Value::Float(capacity(snr_db)))
                .ok_or_else(|| type_mismatch(snr, &row[idx]))
        })
    }

    /// A text column built from `template`, where every `{Column}` is replaced by that row's value.
    pub fn with_label(self, into: &str, template: &str) -> Result<Table> {
        let pieces = parse_template(template, &self)?;
        self.derive(into, |row| {
            Ok(Value::Text(
                pieces
                    .iter()
                    .map(|piece| match piece {
                        Piece::Literal(s) => s.clone(),
                        Piece::Column(i) => row[*i].to_string(),
                    })
                    .collect(),
            ))
        })
    }
}

enum Piece {
    Literal(String),
    Column(usize),
}

fn parse_template(template: &str, table: &Table) -> Result<Vec<Piece>> {
    let mut pieces = vec![];
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        if open > 0 {
            pieces.push(Piece::Literal(rest[..open].to_string()));
        }
        let close = rest[open..].find('}').ok_or_else(|| {
            Error::Config(format!("unclosed `{{` in label template `{template}`"))
        })?;
        let name = &rest[open + 1..open + close];
        if name.is_empty() {
            return Err(Error::Config(format!(
                "empty column name in label template `{template}`"
            )));
        }
        pieces.push(Piece::Column(table.column_index(name)?));
        rest = &rest[open + close + 1..];
    }
    if !rest.is_empty() {
        pieces.push(Piece::Literal(rest.to_string()));
    }
    Ok(pieces)
}

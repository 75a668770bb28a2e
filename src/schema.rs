use std::collections::BTreeMap;

use serde::Deserialize;

use crate::{table::type_mismatch, Error, Result, Value};

/// How a raw CSV cell is read.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldKind {
    Integer,
    #[default]
    Float,
    /// An integral category code. The simulator prints these with `%f`, so `3.000000` is `3`.
    Code,
    Text,
}

impl FieldKind {
    pub fn parse(&self, raw: &str) -> core::result::Result<Value, String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(Value::Missing);
        }
        match self {
            FieldKind::Integer => raw
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| format!("`{raw}` is not an integer")),
            FieldKind::Float => raw
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| format!("`{raw}` is not a number")),
            FieldKind::Code => {
                let code: f64 = raw
                    .parse()
                    .map_err(|_| format!("`{raw}` is not a category code"))?;
                integral(code)
                    .map(Value::Integer)
                    .ok_or_else(|| format!("`{raw}` is not an integral category code"))
            }
            FieldKind::Text => Ok(Value::Text(raw.to_string())),
        }
    }
}

/// `x` as an integer, if it is a whole number that fits in an `i64`.
pub(crate) fn integral(x: f64) -> Option<i64> {
    if x.is_finite() && x.fract() == 0f64 && x.abs() < i64::MAX as f64 {
        // `-0.0` casts to `0`.
        Some(x as i64)
    } else {
        None
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(default)]
    pub kind: FieldKind,
}

impl Field {
    pub fn new(name: &str, kind: FieldKind) -> Field {
        Field {
            name: name.to_string(),
            kind,
        }
    }
}

/// The ordered columns a file is expected to have.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Schema {
    pub fields: Vec<Field>,
    pub has_header: bool,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Schema {
        Schema {
            fields,
            has_header: false,
        }
    }

    /// Shorthand for `Schema::new` from `(name, kind)` pairs.
    pub fn of(fields: &[(&str, FieldKind)]) -> Schema {
        Schema::new(
            fields
                .iter()
                .map(|&(name, kind)| Field::new(name, kind))
                .collect(),
        )
    }

    pub fn with_header(mut self, has_header: bool) -> Schema {
        self.has_header = has_header;
        self
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

/// What to do with a code that has no label.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum UnmappedPolicy {
    #[default]
    Reject,
    Sentinel(String),
}

pub const DEFAULT_SENTINEL: &str = "unmapped";

/// Replaces the integral codes of one column with display labels.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(try_from = "RawLabelMap")]
pub struct LabelMap {
    pub column: String,
    pub labels: BTreeMap<i64, String>,
    pub unmapped: UnmappedPolicy,
}

impl LabelMap {
    pub fn new<'a, I: IntoIterator<Item = (i64, &'a str)>>(column: &str, labels: I) -> LabelMap {
        LabelMap {
            column: column.to_string(),
            labels: labels
                .into_iter()
                .map(|(code, label)| (code, label.to_string()))
                .collect(),
            unmapped: UnmappedPolicy::Reject,
        }
    }

    pub fn with_policy(mut self, unmapped: UnmappedPolicy) -> LabelMap {
        self.unmapped = unmapped;
        self
    }

    /// The label for one cell, and whether the sentinel stood in for a missing entry.
    pub fn apply(&self, value: &Value) -> Result<(Value, bool)> {
        let code = match value {
            Value::Missing => return Ok((Value::Missing, false)),
            Value::Integer(code) => *code,
            Value::Float(x) => integral(*x).ok_or_else(|| type_mismatch(&self.column, value))?,
            other => return Err(type_mismatch(&self.column, other)),
        };

        match (self.labels.get(&code), &self.unmapped) {
            (Some(label), _) => Ok((Value::Text(label.clone()), false)),
            (None, UnmappedPolicy::Sentinel(sentinel)) => Ok((Value::Text(sentinel.clone()), true)),
            (None, UnmappedPolicy::Reject) => Err(Error::UnmappedCode {
                column: self.column.clone(),
                code,
            }),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum UnmappedMode {
    #[default]
    Reject,
    Sentinel,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLabelMap {
    column: String,
    labels: BTreeMap<String, String>,
    #[serde(default)]
    unmapped: UnmappedMode,
    sentinel: Option<String>,
}

impl TryFrom<RawLabelMap> for LabelMap {
    type Error = String;

    fn try_from(raw: RawLabelMap) -> core::result::Result<Self, Self::Error> {
        let labels = raw
            .labels
            .into_iter()
            .map(|(code, label)| {
                code.trim()
                    .parse::<i64>()
                    .map(|code| (code, label))
                    .map_err(|_| format!("label key `{code}` is not an integer code"))
            })
            .collect::<core::result::Result<BTreeMap<i64, String>, String>>()?;

        let unmapped = match (raw.unmapped, raw.sentinel) {
            (UnmappedMode::Reject, None) => UnmappedPolicy::Reject,
            (UnmappedMode::Reject, Some(_)) => {
                return Err(String::from("`sentinel` requires `unmapped = \"sentinel\"`"));
            }
            (UnmappedMode::Sentinel, sentinel) => UnmappedPolicy::Sentinel(
                sentinel.unwrap_or_else(|| DEFAULT_SENTINEL.to_string()),
            ),
        };

        Ok(LabelMap {
            column: raw.column,
            labels,
            unmapped,
        })
    }
}

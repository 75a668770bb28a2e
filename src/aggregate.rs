use std::collections::HashMap;

use tracing::debug;

use crate::{schema::integral, table::type_mismatch, Error, Result, Table, Value};

/// Hashable view of a cell, grouping the same values that [`Value::matches`] treats as equal.
///
/// Integral floats key as integers and `-0.0` as `0.0`; other floats compare by bit pattern.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum GroupKey {
    Integer(i64),
    Float(u64),
    Text(String),
    Missing,
}

impl From<&Value> for GroupKey {
    fn from(value: &Value) -> Self {
        match value {
            Value::Integer(i) => GroupKey::Integer(*i),
            Value::Float(x) => match integral(*x) {
                Some(i) => GroupKey::Integer(i),
                None => GroupKey::Float(x.to_bits()),
            },
            Value::Text(s) => GroupKey::Text(s.clone()),
            Value::Missing => GroupKey::Missing,
        }
    }
}

struct Group {
    key: Vec<Value>,
    sum: f64,
    count: usize,
}

/// Mean of `measure` for every distinct combination of `keys`.
///
/// The result has the key columns followed by the measure column, one row per group,
/// in the order each group was first seen.
pub fn group_mean(table: &Table, keys: &[&str], measure: &str) -> Result<Table> {
    if keys.is_empty() {
        return Err(Error::Config(String::from(
            "grouping needs at least one key column",
        )));
    }
    let key_idx = keys
        .iter()
        .map(|k| table.column_index(k))
        .collect::<Result<Vec<usize>>>()?;
    let measure_idx = table.column_index(measure)?;

    let mut index: HashMap<Vec<GroupKey>, usize> = HashMap::new();
    let mut groups: Vec<Group> = vec![];

    for row in table.rows() {
        let value = row[measure_idx]
            .as_f64()
            .ok_or_else(|| type_mismatch(measure, &row[measure_idx]))?;

        let key: Vec<GroupKey> = key_idx.iter().map(|&i| GroupKey::from(&row[i])).collect();
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push(Group {
                key: key_idx.iter().map(|&i| row[i].clone()).collect(),
                sum: 0f64,
                count: 0,
            });
            groups.len() - 1
        });

        groups[slot].sum += value;
        groups[slot].count += 1;
    }

    let mut out = Table::new(keys.iter().chain([&measure]).copied());
    for Group { mut key, sum, count } in groups {
        key.push(Value::Float(sum / count as f64));
        out.push(key)?;
    }

    debug!(
        keys = ?keys,
        measure,
        rows = table.len(),
        groups = out.len(),
        "grouped"
    );
    Ok(out)
}

/// Split `table` by the values of `column`, in first-seen order.
pub fn partition(table: &Table, column: &str) -> Result<Vec<(Value, Table)>> {
    let idx = table.column_index(column)?;
    let mut index: HashMap<GroupKey, usize> = HashMap::new();
    let mut parts: Vec<(Value, Table)> = vec![];

    for row in table.rows() {
        let slot = *index.entry(GroupKey::from(&row[idx])).or_insert_with(|| {
            parts.push((row[idx].clone(), Table::new(table.columns().iter().cloned())));
            parts.len() - 1
        });
        parts[slot].1.push(row.clone())?;
    }

    Ok(parts)
}

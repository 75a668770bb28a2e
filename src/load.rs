use std::collections::BTreeSet;
use std::fs::File;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::{Error, FieldKind, LabelMap, Result, Schema, Table, Value};

pub const ANTENNAS: &str = "Antennas";
pub const LAMBDA: &str = "Lambda";

fn csv_error(path: &Path, err: csv::Error) -> Error {
    let line = err.position().map_or(0, |p| p.line());
    let message = err.to_string();
    match err.into_kind() {
        csv::ErrorKind::Io(source) => Error::io(path, source),
        _ => Error::Parse {
            path: path.to_path_buf(),
            line,
            message,
        },
    }
}

fn reader(path: &Path, has_headers: bool) -> Result<csv::Reader<File>> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    Ok(csv::ReaderBuilder::new()
        .has_headers(has_headers)
        .flexible(true)
        .from_reader(file))
}

/// Read `path` into a table with the schema's column names.
///
/// The header, or the first data record when there is none, decides whether the file fits the
/// schema at all ([`Error::SchemaMismatch`]); any other record of a different width is a
/// [`Error::Parse`].
pub fn load_table(
    path: impl AsRef<Path>,
    schema: &Schema,
    labels: Option<&LabelMap>,
) -> Result<Table> {
    let path = path.as_ref();
    let label_idx = labels
        .map(|map| {
            schema
                .position(&map.column)
                .map(|idx| (idx, map))
                .ok_or_else(|| Error::UnknownColumn(map.column.clone()))
        })
        .transpose()?;

    let mut table = Table::new(schema.names());
    let mut substituted: BTreeSet<i64> = BTreeSet::new();

    let mut rdr = reader(path, schema.has_header)?;
    let mismatch = |found: usize| Error::SchemaMismatch {
        path: path.to_path_buf(),
        expected: schema.len(),
        found,
    };
    if schema.has_header {
        let header = rdr.headers().map_err(|e| csv_error(path, e))?;
        // An empty file reads as an empty header.
        if !header.is_empty() && header.len() != schema.len() {
            return Err(mismatch(header.len()));
        }
    }

    for (n, record) in rdr.records().enumerate() {
        let record = record.map_err(|e| csv_error(path, e))?;
        let line = record.position().map_or(0, |p| p.line());

        // With a header the width is already settled, so any odd row is a parse error.
        if record.len() != schema.len() {
            return Err(if n == 0 && !schema.has_header {
                mismatch(record.len())
            } else {
                Error::Parse {
                    path: path.to_path_buf(),
                    line,
                    message: format!("expected {} fields, found {}", schema.len(), record.len()),
                }
            });
        }

        let mut row = schema
            .fields
            .iter()
            .zip(record.iter())
            .map(|(field, raw)| {
                field.kind.parse(raw).map_err(|message| Error::Parse {
                    path: path.to_path_buf(),
                    line,
                    message: format!("column `{}`: {message}", field.name),
                })
            })
            .collect::<Result<Vec<Value>>>()?;

        if let Some((idx, map)) = label_idx {
            let raw = row[idx].clone();
            let (label, was_substituted) = map.apply(&raw)?;
            if was_substituted {
                if let Value::Integer(code) = raw {
                    substituted.insert(code);
                }
            }
            row[idx] = label;
        }

        table.push(row)?;
    }

    if let Some((_, map)) = label_idx {
        if !substituted.is_empty() {
            warn!(
                column = %map.column,
                codes = ?substituted,
                "codes without a label were replaced by the sentinel"
            );
        }
    }

    info!(path = %path.display(), rows = table.len(), "loaded table");
    Ok(table)
}

/// Read a ragged file of `Nr, Nt, λ1, λ2, ...` rows into the long table
/// `Nr, Nt, Antennas, Lambda`, one row per singular value.
pub fn load_singular_values(path: impl AsRef<Path>) -> Result<Table> {
    let path = path.as_ref();
    let mut table = Table::new(["Nr", "Nt", ANTENNAS, LAMBDA]);

    for record in reader(path, false)?.records() {
        let record = record.map_err(|e| csv_error(path, e))?;
        let line = record.position().map_or(0, |p| p.line());
        let parse = |kind: FieldKind, raw: &str| {
            kind.parse(raw).map_err(|message| Error::Parse {
                path: path.to_path_buf(),
                line,
                message,
            })
        };

        if record.len() < 2 {
            return Err(Error::Parse {
                path: path.to_path_buf(),
                line,
                message: String::from("expected Nr, Nt and singular values"),
            });
        }

        let nr = parse(FieldKind::Code, &record[0])?;
        let nt = parse(FieldKind::Code, &record[1])?;
        let antennas = Value::Text(format!("({nr},{nt})"));

        for raw in record.iter().skip(2) {
            let lambda = parse(FieldKind::Float, raw)?;
            // Shorter rows are padded with empty cells.
            if !lambda.is_missing() {
                table.push(vec![nr.clone(), nt.clone(), antennas.clone(), lambda])?;
            }
        }
    }

    info!(path = %path.display(), rows = table.len(), "loaded singular values");
    Ok(table)
}

/// Write `table` with a header row.
pub fn write_csv(table: &Table, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let mut w = csv::Writer::from_path(path).map_err(|e| csv_error(path, e))?;

    w.write_record(table.columns())
        .map_err(|e| csv_error(path, e))?;
    for row in table.rows() {
        w.write_record(row.iter().map(Value::to_string))
            .map_err(|e| csv_error(path, e))?;
    }
    w.flush().map_err(|e| Error::io(path, e))?;

    debug!(path = %path.display(), rows = table.len(), "wrote table");
    Ok(())
}

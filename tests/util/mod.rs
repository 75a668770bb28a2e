#![allow(dead_code, unused_macros)]
use std::io::Write;
use std::path::PathBuf;

use mimoplot::{FieldKind, LabelMap, Schema};
use tempfile::NamedTempFile;

/// Build a table from column names and rows of values.
macro_rules! table {
    ([$($column:expr),* $(,)?], $([$($value:expr),* $(,)?]),* $(,)?) => {{
        let mut t = mimoplot::Table::new([$($column),*]);
        $(
            t.push(vec![$(mimoplot::Value::from($value)),*]).unwrap();
        )*
        t
    }};
}

pub fn csv_file(contents: &str) -> NamedTempFile {
    let mut f = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    f.flush().unwrap();
    f
}

/// `Test, Nr, Nt, NoiseLevel, ErrorPercentage, BER`, as the simulator writes it.
pub fn noise_schema() -> Schema {
    Schema::of(&[
        ("Test", FieldKind::Integer),
        ("Nr", FieldKind::Integer),
        ("Nt", FieldKind::Integer),
        ("NoiseLevel", FieldKind::Code),
        ("ErrorPercentage", FieldKind::Float),
        ("BER", FieldKind::Float),
    ])
}

pub fn noise_intervals() -> LabelMap {
    LabelMap::new(
        "NoiseLevel",
        [
            (0, "[-0.001, 0.001]"),
            (1, "[-0.01, 0.01]"),
            (2, "[-0.5, 0.5]"),
            (3, "[-1, 1]"),
        ],
    )
}

pub fn demo(path: &str) -> PathBuf {
    [env!("CARGO_MANIFEST_DIR"), "demos", path].iter().collect()
}

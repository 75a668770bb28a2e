use rstest::rstest;

#[macro_use]
mod util;

use mimoplot::{
    group_mean, load_table, Error, FieldKind, Schema, UnmappedPolicy, Value,
};
use util::{csv_file, demo, noise_intervals, noise_schema};

const RUNS: &str = "\
1,2,4,0.000000,0.0394,0.000183
2,2,4,3.000000,25.5,0.12
3,4,8,3.000000,12.5,0.06
4,4,8,1.000000,0.5,0.0021
";

#[test]
fn rows_and_columns_follow_the_schema() {
    let f = csv_file(RUNS);
    let t = load_table(f.path(), &noise_schema(), None).unwrap();

    assert_eq!(t.len(), 4);
    assert_eq!(
        t.columns(),
        ["Test", "Nr", "Nt", "NoiseLevel", "ErrorPercentage", "BER"]
    );
    assert_eq!(t.get(1, "NoiseLevel"), Some(&Value::Integer(3)));
    assert_eq!(t.get(2, "ErrorPercentage"), Some(&Value::Float(12.5)));
}

#[test]
fn simulator_output() {
    let t = load_table(demo("data/noise_sweep.csv"), &noise_schema(), None).unwrap();
    assert_eq!(t.len(), 50);
    assert!(t.numeric_column("BER").unwrap().iter().all(|&b| b >= 0f64));
}

#[test]
fn header_row_is_skipped() {
    let f = csv_file("Nr,Nt,BER\n2,4,0.1\n");
    let schema = Schema::of(&[
        ("Nr", FieldKind::Integer),
        ("Nt", FieldKind::Integer),
        ("BER", FieldKind::Float),
    ])
    .with_header(true);
    let t = load_table(f.path(), &schema, None).unwrap();
    assert_eq!(t.len(), 1);
    assert_eq!(t.get(0, "BER"), Some(&Value::Float(0.1)));
}

#[test]
fn header_only_is_empty() {
    let f = csv_file("Test,Nr,Nt,NoiseLevel,ErrorPercentage,BER\n");
    let t = load_table(f.path(), &noise_schema().with_header(true), None).unwrap();
    assert!(t.is_empty());
    assert_eq!(t.columns().len(), 6);

    let grouped = group_mean(&t, &["Nr", "Nt"], "BER").unwrap();
    assert!(grouped.is_empty());
    assert_eq!(grouped.columns(), ["Nr", "Nt", "BER"]);
}

#[rstest]
#[case("1,2,4,3,25.5\n", 5)]
#[case("1,2,4,3,25.5,0.12,7\n", 7)]
fn wrong_width_is_a_schema_mismatch(#[case] contents: &str, #[case] width: usize) {
    let f = csv_file(contents);
    match load_table(f.path(), &noise_schema(), None) {
        Err(Error::SchemaMismatch {
            expected, found, ..
        }) => {
            assert_eq!(expected, 6);
            assert_eq!(found, width);
        }
        other => panic!("expected a schema mismatch, got {other:?}"),
    }
}

#[rstest]
#[case("Nr,Nt,BER\n", 3)]
#[case("Test,Nr,Nt,NoiseLevel,BER\n1,2,4,3,25.5,0.12\n", 5)]
fn header_width_must_match_the_schema(#[case] contents: &str, #[case] width: usize) {
    let f = csv_file(contents);
    match load_table(f.path(), &noise_schema().with_header(true), None) {
        Err(Error::SchemaMismatch {
            expected, found, ..
        }) => {
            assert_eq!(expected, 6);
            assert_eq!(found, width);
        }
        other => panic!("expected a schema mismatch, got {other:?}"),
    }
}

#[test]
fn rows_wider_than_the_header_are_parse_errors() {
    let f = csv_file("Test,Nr,Nt,NoiseLevel,ErrorPercentage,BER\n1,2,4,3,25.5,0.12,7\n");
    assert!(matches!(
        load_table(f.path(), &noise_schema().with_header(true), None),
        Err(Error::Parse { line: 2, .. })
    ));
}

#[test]
fn empty_file_with_header_is_empty() {
    let f = csv_file("");
    let t = load_table(f.path(), &noise_schema().with_header(true), None).unwrap();
    assert!(t.is_empty());
}

#[test]
fn ragged_row_is_a_parse_error() {
    let f = csv_file("1,2,4,3,25.5,0.12\n2,2,4,3,25.5\n");
    assert!(matches!(
        load_table(f.path(), &noise_schema(), None),
        Err(Error::Parse { line: 2, .. })
    ));
}

#[rstest]
#[case("1,2,4,3,25.5,high\n")]
#[case("1,2,four,3,25.5,0.12\n")]
#[case("1,2,4,0.5,25.5,0.12\n")]
fn bad_cells_are_parse_errors(#[case] contents: &str) {
    let f = csv_file(contents);
    match load_table(f.path(), &noise_schema(), None) {
        Err(Error::Parse { line, message, .. }) => {
            assert_eq!(line, 1);
            assert!(message.starts_with("column `"), "{message}");
        }
        other => panic!("expected a parse error, got {other:?}"),
    }
}

#[test]
fn missing_file_is_io() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("output.csv");
    match load_table(&path, &noise_schema(), None) {
        Err(Error::Io { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("expected an io error, got {other:?}"),
    }
}

#[test]
fn codes_become_interval_labels() {
    let f = csv_file(RUNS);
    let t = load_table(f.path(), &noise_schema(), Some(&noise_intervals())).unwrap();
    let labels: Vec<String> = t
        .column("NoiseLevel")
        .unwrap()
        .map(Value::to_string)
        .collect();
    assert_eq!(
        labels,
        ["[-0.001, 0.001]", "[-1, 1]", "[-1, 1]", "[-0.01, 0.01]"]
    );
}

#[test]
fn unmapped_code_is_rejected() {
    let f = csv_file("1,2,4,7.000000,50.0,0.25\n");
    assert!(matches!(
        load_table(f.path(), &noise_schema(), Some(&noise_intervals())),
        Err(Error::UnmappedCode { code: 7, ref column }) if column == "NoiseLevel"
    ));
}

#[test]
fn unmapped_code_takes_the_sentinel() {
    let f = csv_file("1,2,4,7.000000,50.0,0.25\n2,2,4,3,25.5,0.12\n");
    let labels =
        noise_intervals().with_policy(UnmappedPolicy::Sentinel(String::from("other")));
    let t = load_table(f.path(), &noise_schema(), Some(&labels)).unwrap();
    assert_eq!(t.get(0, "NoiseLevel"), Some(&Value::from("other")));
    assert_eq!(t.get(1, "NoiseLevel"), Some(&Value::from("[-1, 1]")));
}

#[test]
fn label_column_must_be_in_the_schema() {
    let f = csv_file(RUNS);
    let mut labels = noise_intervals();
    labels.column = String::from("Noise");
    assert!(matches!(
        load_table(f.path(), &noise_schema(), Some(&labels)),
        Err(Error::UnknownColumn(name)) if name == "Noise"
    ));
}

#[test]
fn tables_compare_by_value() {
    let f = csv_file("2,4,0.1\n4,8,0.2\n");
    let schema = Schema::of(&[
        ("Nr", FieldKind::Integer),
        ("Nt", FieldKind::Integer),
        ("BER", FieldKind::Float),
    ]);
    let expected = table!(["Nr", "Nt", "BER"], [2i64, 4i64, 0.1], [4i64, 8i64, 0.2]);
    assert_eq!(load_table(f.path(), &schema, None).unwrap(), expected);
}

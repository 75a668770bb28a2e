use std::collections::HashMap;

use assert_approx_eq::assert_approx_eq;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

#[macro_use]
mod util;

use mimoplot::{group_mean, load_table, Error, Table, Value};
use util::{csv_file, noise_intervals, noise_schema};

fn means(t: &Table) -> HashMap<(i64, i64), f64> {
    t.rows()
        .iter()
        .map(|row| match row.as_slice() {
            [Value::Integer(nr), Value::Integer(nt), mean] => {
                ((*nr, *nt), mean.as_f64().unwrap())
            }
            other => panic!("unexpected row {other:?}"),
        })
        .collect()
}

#[test]
fn mean_ber_per_antenna_pair() {
    let t = table!(
        ["Nr", "Nt", "BER"],
        [2i64, 4i64, 0.1],
        [2i64, 4i64, 0.3],
        [4i64, 8i64, 0.2],
    );
    let g = group_mean(&t, &["Nr", "Nt"], "BER").unwrap();

    assert_eq!(g.columns(), ["Nr", "Nt", "BER"]);
    assert_eq!(g.len(), 2);
    let m = means(&g);
    assert_approx_eq!(m[&(2, 4)], 0.2);
    assert_approx_eq!(m[&(4, 8)], 0.2);
}

#[test]
fn one_row_per_distinct_key() {
    let mut t = Table::new(["Nr", "Nt", "BER"]);
    for i in 0..60i64 {
        let nr = 2i64 << (i % 3);
        t.push(vec![
            Value::Integer(nr),
            Value::Integer(2 * nr),
            Value::Float(i as f64 / 100f64),
        ])
        .unwrap();
    }
    let g = group_mean(&t, &["Nr", "Nt"], "BER").unwrap();
    assert_eq!(g.len(), 3);

    // 2, 4, 8 receive antennas take the rows with i = 0, 1, 2 mod 3.
    let m = means(&g);
    for (k, nr) in [2i64, 4, 8].into_iter().enumerate() {
        let expected = (0..60).filter(|i| i % 3 == k).map(|i| i as f64 / 100f64).sum::<f64>() / 20f64;
        assert_approx_eq!(m[&(nr, 2 * nr)], expected);
    }
}

#[test]
fn mean_does_not_depend_on_row_order() {
    let mut rows: Vec<Vec<Value>> = (0..200)
        .map(|i| {
            let nr = if i % 2 == 0 { 2i64 } else { 4 };
            vec![
                Value::Integer(nr),
                Value::Integer(2 * nr),
                Value::Float(((i * 37) % 101) as f64 / 101f64),
            ]
        })
        .collect();

    let build = |rows: &[Vec<Value>]| {
        let mut t = Table::new(["Nr", "Nt", "BER"]);
        for row in rows {
            t.push(row.clone()).unwrap();
        }
        means(&group_mean(&t, &["Nr", "Nt"], "BER").unwrap())
    };
    let reference = build(&rows);

    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..5 {
        rows.shuffle(&mut rng);
        let shuffled = build(&rows);
        assert_eq!(shuffled.len(), reference.len());
        for (key, mean) in reference.iter() {
            assert_approx_eq!(shuffled[key], *mean, 1e-12);
        }
    }
}

#[test]
fn load_and_group_twice() {
    let f = csv_file(
        "1,2,4,3,25.5,0.12\n2,2,4,3,24.5,0.11\n3,4,8,2,3.0,0.01\n4,4,8,3,12.5,0.06\n",
    );
    let run = || {
        let t = load_table(f.path(), &noise_schema(), Some(&noise_intervals())).unwrap();
        group_mean(&t, &["Nt", "NoiseLevel"], "ErrorPercentage").unwrap()
    };
    let first = run();
    assert_eq!(first.len(), 3);
    assert_eq!(first, run());
}

#[test]
fn single_row_groups_are_exact() {
    let t = table!(
        ["Nr", "Nt", "BER"],
        [2i64, 4i64, 0.1234567890123],
        [4i64, 8i64, 1e-7],
    );
    let g = group_mean(&t, &["Nr", "Nt"], "BER").unwrap();
    assert_eq!(g.get(0, "BER"), Some(&Value::Float(0.1234567890123)));
    assert_eq!(g.get(1, "BER"), Some(&Value::Float(1e-7)));
}

#[test]
fn integer_measures_average_to_floats() {
    let t = table!(["Nt", "Errors"], [4i64, 3i64], [4i64, 4i64]);
    let g = group_mean(&t, &["Nt"], "Errors").unwrap();
    assert_eq!(g.get(0, "Errors"), Some(&Value::Float(3.5)));
}

#[test]
fn no_rows_no_groups() {
    let t = Table::new(["Nr", "Nt", "BER"]);
    let g = group_mean(&t, &["Nr", "Nt"], "BER").unwrap();
    assert!(g.is_empty());
}

#[test]
fn labelled_measure_is_rejected() {
    let t = table!(["Nt", "NoiseLevel"], [4i64, "[-1, 1]"]);
    assert!(matches!(
        group_mean(&t, &["Nt"], "NoiseLevel"),
        Err(Error::TypeMismatch { ref column, .. }) if column == "NoiseLevel"
    ));
}

//! Load MIMO simulation results, group and average them, and chart them with matplotlib.
//!
//! The flow is always the same: [`load`] a CSV against a [`Schema`], shape the [`Table`],
//! [`aggregate`] it, then build and render a [`Figure`]. A [`Pipeline`] strings those steps
//! together from a TOML description.

pub mod aggregate;
mod error;
pub mod load;
pub mod pipeline;
pub mod render;
pub mod schema;
pub mod table;

pub use crate::{
    aggregate::{group_mean, partition},
    error::{Error, Result},
    load::{load_singular_values, load_table, write_csv},
    pipeline::{Analysis, Pipeline},
    render::{Chart, ChartKind, Figure, Output, SecondaryAxis},
    schema::{Field, FieldKind, LabelMap, Schema, UnmappedPolicy},
    table::{Table, Value},
};

#[inline]
pub fn db(x: f64) -> f64 {
    10f64 * x.log10()
}

#[inline]
pub fn undb(x: f64) -> f64 {
    10f64.powf(x / 10f64)
}

/// Shannon capacity in bits per symbol for an SNR given in dB.
#[inline]
pub fn capacity(snr_db: f64) -> f64 {
    (1f64 + undb(snr_db)).log2()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn db_round_trip() {
        for x in [1e-5, 0.5, 1f64, 2f64, 1000f64] {
            assert_approx_eq!(undb(db(x)), x, x * 1e-12);
        }
    }

    #[test]
    fn capacity_at_known_snrs() {
        // 0 dB is a linear SNR of one.
        assert_approx_eq!(capacity(0f64), 1f64);
        assert_approx_eq!(capacity(db(3f64)), 2f64);
        assert_approx_eq!(capacity(db(15f64)), 4f64);
        assert!(capacity(-40f64) < 1e-3);
    }
}

//! Theoretical HyperLogLog error bounds for a given precision.
//!
//! With `m = 2^P` registers the standard error of HyperLogLog is `1.04 / sqrt(m)`;
//! `1.32 / sqrt(m)` is used as the upper bound that measured mean errors are
//! checked against. Expected values:
//!   P = 10: 3.25% / 4.13%
//!   P = 12: 1.62% / 2.06%
//!   P = 14: 0.81% / 1.03%

use serde::Serialize;

use crate::error::ReportError;

/// Valid precision range, matching the register counts HyperLogLog sketches use in practice.
pub const MIN_PRECISION: u8 = 4;
pub const MAX_PRECISION: u8 = 18;

const STANDARD_ERROR_FACTOR: f64 = 1.04;
const UPPER_BOUND_FACTOR: f64 = 1.32;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TheoreticalBound {
    pub precision: u8,
    pub registers: u32,
    /// `1.04 / sqrt(m)`
    pub standard_error: f64,
    /// `1.32 / sqrt(m)`
    pub upper_bound: f64,
}

impl TheoreticalBound {
    pub fn for_precision(precision: u8) -> Result<Self, ReportError> {
        if !(MIN_PRECISION..=MAX_PRECISION).contains(&precision) {
            return Err(ReportError::InvalidSetting(format!(
                "precision {precision} outside [{MIN_PRECISION}, {MAX_PRECISION}]"
            )));
        }
        let registers = 1u32 << precision;
        let sqrt_m = f64::from(registers).sqrt();
        Ok(Self {
            precision,
            registers,
            standard_error: STANDARD_ERROR_FACTOR / sqrt_m,
            upper_bound: UPPER_BOUND_FACTOR / sqrt_m,
        })
    }
}

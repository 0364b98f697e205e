use thiserror::Error;

// ---------------------------------------------------------------------------
// SfgError – everything the aggregate model can reject
// ---------------------------------------------------------------------------

/// Errors raised by selection, calibration and the spectral aggregates.
///
/// All of them are caller-input problems detected at construction or
/// operation time. Nothing here is retried or coerced.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SfgError {
    /// A field failed its broadcast / length contract against the primary array.
    #[error("shape mismatch for `{field}`: expected {expected}, got {actual}")]
    Shape {
        field: &'static str,
        expected: String,
        actual: String,
    },

    /// Two pump-probe aggregates do not share the same axes.
    #[error("incompatible aggregates: `{axis}` differs")]
    IncompatibleAggregates { axis: &'static str },

    #[error("invalid selector range on axis `{axis}`: {reason}")]
    InvalidSelectorRange { axis: &'static str, reason: String },

    /// A trace window is not a usable range.
    #[error("invalid range for `{argument}`: {reason}")]
    InvalidRange {
        argument: &'static str,
        reason: String,
    },

    #[error("calibration domain error at pixel {pixel}: {reason}")]
    CalibrationDomain { pixel: usize, reason: String },

    /// A partially built bleach lacks a field an operation needs.
    #[error("missing field `{0}`")]
    MissingField(&'static str),
}

impl SfgError {
    pub(crate) fn shape(
        field: &'static str,
        expected: impl std::fmt::Debug,
        actual: impl std::fmt::Debug,
    ) -> Self {
        SfgError::Shape {
            field,
            expected: format!("{expected:?}"),
            actual: format!("{actual:?}"),
        }
    }
}

pub type SfgResult<T> = Result<T, SfgError>;

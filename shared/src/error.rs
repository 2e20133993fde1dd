use thiserror::Error;

/// Failures turning raw input or stored rows into typed model values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("unknown {kind} value `{value}`")]
    UnknownVariant { kind: &'static str, value: String },
}

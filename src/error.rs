use thiserror::Error;

/// Errors raised while differentiating a graph.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GradError {
    /// The logarithmic partial of `pow` was needed for a non-positive base.
    #[error("ln of non-positive base {base} while differentiating {label}")]
    Domain { label: String, base: f64 },

    #[error("non-finite gradient {grad} at {label}")]
    NonFinite { label: String, grad: f64 },

    #[error("cannot set the value of non-leaf node {label}")]
    NotALeaf { label: String },
}

#[derive(Error, Debug)]
pub enum DataError {
    #[error("data io: {0}")]
    Io(#[from] std::io::Error),

    #[error("data: no record after the header")]
    Empty,

    #[error("data: missing column '{0}'")]
    MissingColumn(String),

    #[error("data: column '{column}' has non-numeric value {value:?}")]
    Parse { column: String, value: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("config validation: {0}")]
    Validation(String),
}

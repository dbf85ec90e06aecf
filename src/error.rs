//! Error types for nireject

use thiserror::Error;

/// Result type alias for nireject operations
pub type Result<T> = std::result::Result<T, NirejectError>;

/// Main error type of the crate
#[derive(Error, Debug)]
pub enum NirejectError {
    /// Invalid input detected before any computation ran.
    /// The message always names the offending values.
    #[error("{0}")]
    Validation(String),

    #[error("The function={function} is not supported for the current task={task}")]
    UnsupportedFunction { function: String, task: String },

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Data error: {0}")]
    Data(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl NirejectError {
    pub(crate) fn invalid_parameter(
        name: &str,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        NirejectError::InvalidParameter {
            name: name.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<polars::error::PolarsError> for NirejectError {
    fn from(err: polars::error::PolarsError) -> Self {
        NirejectError::Data(err.to_string())
    }
}

impl From<serde_json::Error> for NirejectError {
    fn from(err: serde_json::Error) -> Self {
        NirejectError::Serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for NirejectError {
    fn from(err: ndarray::ShapeError) -> Self {
        NirejectError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_is_verbatim() {
        let err = NirejectError::Validation("'RL' is not a supported task.".to_string());
        assert_eq!(err.to_string(), "'RL' is not a supported task.");
    }

    #[test]
    fn test_unsupported_function_display() {
        let err = NirejectError::UnsupportedFunction {
            function: "predict".to_string(),
            task: "unsupervised".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "The function=predict is not supported for the current task=unsupervised"
        );
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<u32>("not a number").unwrap_err();
        let err: NirejectError = json_err.into();
        assert!(matches!(err, NirejectError::Serialization(_)));
    }
}

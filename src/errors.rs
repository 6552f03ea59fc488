use thiserror::Error;

/// Structured error types for the annotation service.
///
/// `Decode`, `Inference`, `Encode` and `Network` are the failure kinds of a
/// single pipeline invocation. `Validation` covers malformed requests and
/// `Configuration` covers startup problems. The `Display` text of every
/// variant is what the scoring entrypoint places in `{"error": ...}`.
#[derive(Error, Debug)]
pub enum AnnotatorError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Decode error: cannot identify image data ({source})")]
    Decode {
        #[source]
        source: image::ImageError,
    },

    #[error("Inference error: {operation} failed ({source})")]
    Inference {
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Encode error: cannot encode annotated image ({source})")]
    Encode {
        #[source]
        source: image::ImageError,
    },

    #[error("Network error: fetching {url} failed ({reason})")]
    Network { url: String, reason: String },

    #[error("Validation error: {field} {reason}")]
    Validation { field: String, reason: String },
}

pub type Result<T> = std::result::Result<T, AnnotatorError>;

impl AnnotatorError {
    /// Wraps any predictor-side failure, keeping only its message.
    pub fn inference(operation: &str, err: impl std::fmt::Display) -> Self {
        Self::Inference {
            operation: operation.to_string(),
            source: err.to_string().into(),
        }
    }

    pub fn validation(field: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// Short machine-friendly name of the failure kind.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration",
            Self::Decode { .. } => "decode",
            Self::Inference { .. } => "inference",
            Self::Encode { .. } => "encode",
            Self::Network { .. } => "network",
            Self::Validation { .. } => "validation",
        }
    }
}

/// Convert I/O errors to configuration errors.
///
/// I/O only happens outside the per-request pipeline (reading the model file,
/// binding the listener, the scoring client's local files).
impl From<std::io::Error> for AnnotatorError {
    fn from(err: std::io::Error) -> Self {
        Self::Configuration {
            message: err.to_string(),
        }
    }
}

/// Shape errors only occur while building or reading tensors.
impl From<ndarray::ShapeError> for AnnotatorError {
    fn from(err: ndarray::ShapeError) -> Self {
        Self::inference("tensor shape conversion", err)
    }
}

//! Error types for image loading and viewer configuration

/// Terminal failure of a single image load.
///
/// Carried by the failure side of a progress channel, stored on the item while
/// it is errored, and handed to the error renderer.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum LoadError {
    #[error("{status} {status_text}")]
    Http { status: u16, status_text: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("io error: {0}")]
    Io(String),
}

/// Errors raised synchronously by viewer operations.
#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    /// A callback-typed argument was missing or not callable
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Load(#[from] LoadError),
}

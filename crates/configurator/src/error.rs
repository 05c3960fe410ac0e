//! Error types for the configuration engines and the publish pipeline.
//!
//! A collision during height adjustment is not an error: the engine returns
//! `false` instead.

/// Asset fetch or parse failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LoadError {
    #[error("Asset not found: {0}")]
    NotFound(String),

    #[error("HTTP {status} while fetching {url}")]
    Http { url: String, status: u16 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to parse asset: {0}")]
    Parse(String),

    #[error("Asset requires unsupported glTF extension {0}")]
    UnsupportedExtension(String),

    #[error("Load task aborted: {0}")]
    Aborted(String),
}

impl From<reqwest::Error> for LoadError {
    fn from(e: reqwest::Error) -> Self {
        LoadError::Network(e.to_string())
    }
}

/// Part replacement / reset failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PartError {
    #[error("No model loaded")]
    NoScene,

    #[error("Category and part id must be non-empty")]
    InvalidRequest,

    #[error("No scene node matches category '{0}'")]
    NoMatch(String),

    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Paint color failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ColorError {
    #[error("Invalid color '{0}': expected #rrggbb")]
    Invalid(String),
}

/// Serialization failure. No partial artifact is ever produced.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExportError {
    #[error("No model loaded")]
    NoScene,

    #[error("Nothing visible to export")]
    EmptyScene,

    #[error("GLB encoding failed: {0}")]
    Glb(String),

    #[error("USDZ encoding failed: {0}")]
    Usdz(String),

    #[error("Export task failed: {0}")]
    Task(String),
}

/// Object store failure. A 404 on an existence check is reported as absence, not as an error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("Existence check failed for {key}: {message}")]
    Lookup { key: String, message: String },

    #[error("Upload failed for {key}: {message}")]
    Upload { key: String, message: String },
}

/// Anything that can go wrong at the publish entry point.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PublishError {
    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

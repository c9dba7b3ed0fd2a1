use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum GoldError {
    #[error("invalid dataset identifier: {0}")]
    #[diagnostic(help("use a path inside the annotation repository, e.g. `batch-01`"))]
    InvalidDatasetId(String),

    #[error("gold dataset not found in remote repository: {0}")]
    NotFound(String),

    #[error("gold dataset is not in the local cache: {0}")]
    DatasetNotCached(String),

    #[error("invalid remote repository URL: {0}")]
    #[diagnostic(help("expected an absolute URL such as \
         https://github.com/clamsproject/aapb-annotations/tree/main"))]
    InvalidRemote(String),

    #[error("remote request failed: {0}")]
    Http(String),

    #[error("remote returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("failed to read directory listing from {url}: {reason}")]
    #[diagnostic(help(
        "the gold retriever relies on an undocumented GitHub endpoint; \
         report breakage at https://github.com/clamsproject/clams-utils/issues"
    ))]
    UnexpectedListing { url: String, reason: String },

    #[error("invalid bundle contents: {0}")]
    InvalidBundle(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(String),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

/// Coarse classification callers can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    Network,
    NotFound,
    Filesystem,
}

impl GoldError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GoldError::InvalidDatasetId(_)
            | GoldError::InvalidRemote(_)
            | GoldError::ConfigRead(_)
            | GoldError::ConfigParse(_) => ErrorKind::InvalidInput,
            GoldError::Http(_)
            | GoldError::Status { .. }
            | GoldError::UnexpectedListing { .. }
            | GoldError::InvalidBundle(_) => ErrorKind::Network,
            GoldError::NotFound(_) | GoldError::DatasetNotCached(_) => ErrorKind::NotFound,
            GoldError::Filesystem(_) => ErrorKind::Filesystem,
        }
    }
}

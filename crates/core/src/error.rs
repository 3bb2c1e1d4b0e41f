use thiserror::Error;

/// Result type for legalrag operations
pub type Result<T> = std::result::Result<T, Error>;

/// Classification of an [`Error`] used by the lifecycle to decide how a
/// failed startup is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or invalid required configuration
    Config,
    /// Backend unreachable, not ready, or connection not live
    Connectivity,
    /// Backend rejected a schema read or write
    Schema,
    /// A dependent service failed to initialize
    Collaborator,
    /// Operation issued in the wrong lifecycle state
    InvalidState,
    /// I/O failure (e.g. binding the listener)
    Io,
    /// Anything else
    Other,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Config => "config",
            Self::Connectivity => "connectivity",
            Self::Schema => "schema",
            Self::Collaborator => "collaborator",
            Self::InvalidState => "invalid_state",
            Self::Io => "io",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// Main error type for legalrag operations
#[derive(Error, Debug)]
pub enum Error {
    /// I/O related errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Backend could not be reached or is not ready
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// Backend rejected a schema operation
    #[error("Schema error: {0}")]
    Schema(String),

    /// A collaborating service failed
    #[error("Collaborator error: {0}")]
    Collaborator(String),

    /// Lifecycle operation issued in the wrong state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Creates a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a connectivity error
    pub fn connectivity(msg: impl Into<String>) -> Self {
        Self::Connectivity(msg.into())
    }

    /// Creates a schema error
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    /// Creates a collaborator error
    pub fn collaborator(msg: impl Into<String>) -> Self {
        Self::Collaborator(msg.into())
    }

    /// Creates an invalid state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Adds context to any error
    pub fn with_context<E>(context: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::WithContext {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Returns the taxonomy kind of this error.
    ///
    /// Context wrappers report the kind of the wrapped error when it is a
    /// legalrag or I/O error, and `Other` otherwise.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) => ErrorKind::Io,
            Self::Config(_) => ErrorKind::Config,
            Self::Connectivity(_) => ErrorKind::Connectivity,
            Self::Schema(_) => ErrorKind::Schema,
            Self::Collaborator(_) => ErrorKind::Collaborator,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::WithContext { source, .. } => {
                if let Some(inner) = source.downcast_ref::<Error>() {
                    inner.kind()
                } else if source.is::<std::io::Error>() {
                    ErrorKind::Io
                } else {
                    ErrorKind::Other
                }
            }
            Self::Other(_) => ErrorKind::Other,
        }
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::with_context(context, e))
    }
}

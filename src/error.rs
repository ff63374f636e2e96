use thiserror::Error;

/// Errors that can occur in the wtt application
#[derive(Error, Debug)]
pub enum WttError {
    /// A non-creating operation expected an existing ledger
    #[error("time ledger is not initialized")]
    NotInitialized,

    /// No tracked process matches the given project name or pid
    #[error("no tracked process matches '{0}'")]
    NotFound(String),

    /// The candidate set was empty
    #[error("no active tracking processes")]
    NoActiveProcesses,

    /// The persisted ledger content could not be parsed
    #[error("ledger file is corrupt: {0}")]
    CorruptLedger(#[source] serde_json::Error),

    /// Writing or renaming the ledger file failed
    #[error("failed to persist ledger: {0}")]
    PersistFailure(#[source] std::io::Error),

    /// Signal delivery failed for a reason other than the process being gone
    #[error("failed to signal process {pid}: {source}")]
    SignalFailure {
        pid: u32,
        #[source]
        source: std::io::Error,
    },

    /// The tracker was started outside a git repository
    #[error("current directory is not a git repository")]
    NotAGitRepository,

    /// Failed to spawn the detached tracker process
    #[error("failed to spawn background tracker: {0}")]
    SpawnFailure(#[source] std::io::Error),

    /// The user dismissed an interactive prompt
    #[error("selection cancelled")]
    SelectionCancelled,

    /// Error reading or parsing configuration
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Filesystem error from the marker directory or ledger path
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for wtt operations
pub type Result<T> = std::result::Result<T, WttError>;

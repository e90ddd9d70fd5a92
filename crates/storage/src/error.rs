#![forbid(unsafe_code)]

use repo_core::ResourceIdError;

type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Terminal condition that makes a transaction refuse further work.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClosedReason {
    Committed,
    RolledBack,
    Expired,
}

impl ClosedReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Committed => "committed",
            Self::RolledBack => "rolled back",
            Self::Expired => "expired",
        }
    }
}

#[derive(Debug)]
pub enum IndexError {
    Io(std::io::Error),
    Sql(rusqlite::Error),
    Config(String),
    InvalidInput(&'static str),
    InvalidIdentifier(ResourceIdError),
    TransactionNotFound { tx_id: String },
    TransactionClosed { tx_id: String, reason: ClosedReason },
    Runtime { context: &'static str, source: Cause },
}

impl IndexError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "IO",
            Self::Sql(_) => "STORE",
            Self::Config(_) => "CONFIG",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::InvalidIdentifier(_) => "INVALID_IDENTIFIER",
            Self::TransactionNotFound { .. } => "TX_NOT_FOUND",
            Self::TransactionClosed { .. } => "TX_CLOSED",
            Self::Runtime { .. } => "REPOSITORY_RUNTIME",
        }
    }

    pub(crate) fn runtime(context: &'static str, source: impl Into<Cause>) -> Self {
        Self::Runtime {
            context,
            source: source.into(),
        }
    }

    pub(crate) fn closed(tx_id: &str, reason: ClosedReason) -> Self {
        Self::TransactionClosed {
            tx_id: tx_id.to_string(),
            reason,
        }
    }

    pub fn closed_reason(&self) -> Option<ClosedReason> {
        match self {
            Self::TransactionClosed { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

impl std::fmt::Display for IndexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io: {err}"),
            Self::Sql(err) => write!(f, "sqlite: {err}"),
            Self::Config(message) => write!(f, "config: {message}"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::InvalidIdentifier(err) => write!(f, "invalid identifier: {err}"),
            Self::TransactionNotFound { tx_id } => {
                write!(f, "no transaction found with id {tx_id}")
            }
            Self::TransactionClosed { tx_id, reason } => {
                write!(f, "transaction {tx_id} is closed ({})", reason.as_str())
            }
            Self::Runtime { context, source } => write!(f, "{context}: {source}"),
        }
    }
}

impl std::error::Error for IndexError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Sql(err) => Some(err),
            Self::InvalidIdentifier(err) => Some(err),
            Self::Runtime { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for IndexError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<rusqlite::Error> for IndexError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sql(value)
    }
}

impl From<ResourceIdError> for IndexError {
    fn from(value: ResourceIdError) -> Self {
        Self::InvalidIdentifier(value)
    }
}

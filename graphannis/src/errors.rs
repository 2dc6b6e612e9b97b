use thiserror::Error;

/// Errors surfaced to callers of the corpus manager: the only
/// layer that returns errors. Everything below it signals via
/// `Option`/`bool`/empty iterators instead.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GraphAnnisError {
    #[error("corpus '{0}' does not exist")]
    NoSuchCorpus(String),
    #[error(transparent)]
    Core(#[from] graphannis_core::errors::GraphAnnisCoreError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Bincode(#[from] bincode::Error),
    #[error("could not build a connected query plan: operators do not join all nodes into a single component")]
    DisconnectedQuery,
    #[error("background writer for corpus '{0}' panicked")]
    BackgroundWriterPanicked(String),
    #[error("lock on corpus '{0}' was poisoned")]
    LockPoisoned(String),
    #[error("could not create operator: {0}")]
    ImpossibleSearch(String),
    #[error("operand '#{0}' not found")]
    OperandNotFound(usize),
}

pub type Result<T> = std::result::Result<T, GraphAnnisError>;

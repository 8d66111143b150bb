use thiserror::Error;

/// Pipeline-level failure classes. Completion and dispatch failures never
/// appear here: the completion client degrades to a fallback reply and
/// dispatch failures are part of the terminal outcome.
#[derive(Debug, Error)]
pub enum Error {
    /// The duplicate-delivery check could not be recorded.
    #[error("duplicate-delivery check failed: {0}")]
    Dedup(#[source] chatline_store::Error),

    /// User or chat resolution failed; the event is lost.
    #[error("identity resolution failed: {0}")]
    Identity(#[source] chatline_store::Error),

    /// A message append failed; later steps do not run.
    #[error("message persistence failed: {0}")]
    Persistence(#[source] chatline_store::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

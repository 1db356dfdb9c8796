//! Error types for the session layer.

/// Errors surfaced by the account facade.
///
/// The client only ever sees a 400 echo; these variants exist so the
/// handlers can log the real reason and so local mode can be
/// distinguished from a backend outage.
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    /// An account with this id already exists.
    #[error("account id already exists")]
    AlreadyExists,

    /// No account with this id.
    #[error("account not found")]
    NotFound,

    /// The password did not match.
    #[error("bad credentials")]
    BadCredentials,

    /// The credential backend could not be reached or failed.
    #[error("account store unavailable: {0}")]
    Unavailable(String),
}

//! Error types for mainstay-core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MainstayError {
    /// A deadline elapsed before the operation could complete. Distinct
    /// from any OS error; callers match on it to tell "slow" from "broken".
    #[error("timed out after {0} us")]
    Timeout(i64),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("nix error: {0}")]
    Nix(#[from] nix::Error),

    #[error("invalid stream open mode: {0:?}")]
    StreamMode(String),
}

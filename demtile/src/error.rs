use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DemError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("invalid HGT name {0}")]
    HgtName(PathBuf),

    #[error("invalid HGT file len {0} for {1}")]
    HgtLen(u64, PathBuf),

    #[error("expected {expected} samples, got {actual}")]
    Dimensions { expected: usize, actual: usize },
}

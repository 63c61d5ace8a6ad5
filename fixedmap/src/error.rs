use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::layout::ValueKind;

/// Errors that can occur when creating, opening or operating on a table
#[derive(Error, Debug)]
pub enum TableError {
    /// IO errors when creating, mapping or syncing the backing file
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Creation parameters that are zero or exceed the supported bounds
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// `create` refuses to clobber an existing file
    #[error("table file already exists: {0}")]
    AlreadyExists(PathBuf),

    /// `open` on a path with no backing file
    #[error("table file not found: {0}")]
    NotFound(PathBuf),

    /// Bad magic, unsupported version, or a file that disagrees with its own header
    #[error("incompatible table format: {0}")]
    IncompatibleFormat(String),

    /// Caller-supplied key does not match the table's fixed key size
    #[error("key is {got} bytes, table key size is {expected}")]
    InvalidKeyLength { expected: usize, got: usize },

    /// Value exceeds the slot's payload budget fixed at creation
    #[error("value needs {got} bytes, slot payload budget is {budget}")]
    ValueTooLarge { budget: usize, got: usize },

    /// No free slot in the probe sequence, or every slot is occupied
    #[error("the table is out of space for items")]
    TableFull,

    /// The table was written with the other value shape
    #[error("table holds {stored:?} values, {requested:?} access was requested")]
    ShapeMismatch {
        stored: ValueKind,
        requested: ValueKind,
    },
}

pub type Result<T> = std::result::Result<T, TableError>;

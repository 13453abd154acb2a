//! Error type shared by every node in the pixel tree

use thiserror::Error;

use crate::registry::EntryKind;

#[derive(Error, Debug)]
pub enum Error {
    /// Nothing to split: the input was empty or only whitespace
    #[error("{0}: empty list")]
    EmptyList(String),
    /// Malformed descriptor (brackets, quotes, stage syntax)
    #[error("{context}: {message}")]
    Syntax { context: String, message: String },
    #[error("no {kind} type named {name}")]
    UnknownType { kind: EntryKind, name: String },
    #[error("{name}: {message}")]
    BadArgs { name: String, message: String },
    /// Failure reported by a leaf device backend
    #[error("device error: {0}")]
    Device(String),
}

impl Error {
    pub fn syntax(context: &str, message: impl Into<String>) -> Self {
        Self::Syntax {
            context: context.to_string(),
            message: message.into(),
        }
    }

    pub fn bad_args(name: &str, message: impl Into<String>) -> Self {
        Self::BadArgs {
            name: name.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

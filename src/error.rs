use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HandleError {
    #[error("handle is empty: nothing to dereference")]
    Empty,

    #[error("unknown lesson '{id}'")]
    UnknownLesson { id: String },

    #[error("I/O failure on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config: {0}")]
    Config(#[from] toml::de::Error),
}

impl HandleError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn unknown_lesson(id: impl Into<String>) -> Self {
        Self::UnknownLesson { id: id.into() }
    }
}

pub type Result<T> = std::result::Result<T, HandleError>;

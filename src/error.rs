use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HitcovError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML write error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed hit record on line {line}: {message}")]
    Record { line: usize, message: String },

    #[error("Unknown record layout: '{0}'. Supported: assembly, legacy")]
    UnknownLayout(String),

    #[error("Hit record file not found: {}", .0.display())]
    InputNotFound(PathBuf),
}

pub type Result<T> = std::result::Result<T, HitcovError>;

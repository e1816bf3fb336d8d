//! Error taxonomy for the editor engine.
//!
//! Snapshot, storage, restore and font failures are handled where they occur
//! (logged, skipped, or replaced by a fallback). Only bad input from the
//! caller, an unknown layer or an undecodable image, is returned to it.

use crate::layers::LayerId;

/// Errors raised by the editor engine.
#[derive(Debug)]
pub enum EditorError {
    /// Snapshot text could not be decoded into layers.
    CorruptSnapshot(serde_json::Error),
    /// Durable storage could not be read or written.
    StorageUnavailable(anyhow::Error),
    /// A restore finished after the document was reset underneath it.
    StaleRestore { captured: u64, current: u64 },
    /// A font face could not be loaded.
    MissingResource { family: String, weight: String },
    /// Background image data could not be decoded.
    InvalidImage(String),
    /// No layer with this id exists in the document.
    UnknownLayer(LayerId),
}

impl std::fmt::Display for EditorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CorruptSnapshot(err) => write!(f, "corrupt snapshot: {err}"),
            Self::StorageUnavailable(err) => write!(f, "storage unavailable: {err:#}"),
            Self::StaleRestore { captured, current } => {
                write!(f, "stale restore: started in epoch {captured}, now {current}")
            }
            Self::MissingResource { family, weight } => {
                write!(f, "font {family} {weight} could not be loaded")
            }
            Self::InvalidImage(msg) => write!(f, "invalid image: {msg}"),
            Self::UnknownLayer(id) => write!(f, "unknown layer {id}"),
        }
    }
}

impl std::error::Error for EditorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::CorruptSnapshot(err) => Some(err),
            Self::StorageUnavailable(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

pub type Result<T, E = EditorError> = std::result::Result<T, E>;

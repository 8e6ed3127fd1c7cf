use std::path::PathBuf;

use ndarray_npy::{ReadNpyError, ReadNpzError};
use thiserror::Error;

use crate::types::Modality;

pub type Result<T> = std::result::Result<T, Error>;

/// Fatal errors. Anything here aborts the run.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Infinigen data directory {0} does not exist")]
    InvalidInputRoot(PathBuf),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read array {path}: {source}")]
    Npy {
        path: PathBuf,
        #[source]
        source: ReadNpyError,
    },

    #[error("Failed to read array `{key}` from {path}: {source}")]
    Npz {
        path: PathBuf,
        key: String,
        #[source]
        source: ReadNpzError,
    },

    #[error("Unsupported array in {path}: {reason}")]
    InvalidArray { path: PathBuf, reason: String },

    #[error("Failed to write image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to serialize annotations to {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid_array(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::InvalidArray {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Reasons a scene/camera unit is skipped. These are diagnostics, the run continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnitRejection {
    #[error("missing modality directories: {}", format_missing(.0))]
    MissingModalityDirectory(Vec<(Modality, PathBuf)>),

    /// Modalities hold different numbers of files. Under the drop-leading
    /// alignment this is also reported when the counts still differ after the
    /// drop, segmentation included, since every modality must end up with one
    /// file per frame. The counts are the ones found on disk.
    #[error(
        "mismatched number of files (RGB files: {color}, Depth files: {depth}, \
         Camera files: {camview}, Segment files: {segmentation})"
    )]
    CountMismatch {
        color: usize,
        depth: usize,
        camview: usize,
        segmentation: usize,
    },

    #[error("{modality} files are not in frame order: {detail}")]
    SortOrderAnomaly { modality: Modality, detail: String },

    #[error("frame {position} pairs {left} frame {left_frame} with {right} frame {right_frame}")]
    FrameIndexMismatch {
        position: usize,
        left: Modality,
        left_frame: u32,
        right: Modality,
        right_frame: u32,
    },
}

fn format_missing(missing: &[(Modality, PathBuf)]) -> String {
    missing
        .iter()
        .map(|(modality, path)| format!("{} ({})", modality, path.display()))
        .collect::<Vec<_>>()
        .join(", ")
}

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid grid {rows}x{cols} for a {width}x{height} image")]
    InvalidGrid {
        rows: usize,
        cols: usize,
        width: usize,
        height: usize,
    },

    #[error("feature extraction failed: {0}")]
    Extraction(String),

    #[error("insufficient correspondences: need {needed}, got {got}")]
    InsufficientCorrespondences { needed: usize, got: usize },

    #[error("no consistent homography could be fitted")]
    DegenerateHomography,

    #[error("homography estimation failed: {0}")]
    Estimation(String),

    #[error("unable to open image at {path}")]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("unable to save image to {path}")]
    ImageSave {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("display error: {0}")]
    Display(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Failures that stay local to one region pair instead of aborting the run.
    pub fn is_region_local(&self) -> bool {
        return matches!(
            self,
            Error::Extraction(_)
                | Error::InsufficientCorrespondences { .. }
                | Error::DegenerateHomography
                | Error::Estimation(_)
        );
    }
}

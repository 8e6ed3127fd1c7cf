//! Infinigen to CO3D dataset converter
//!
//! This library turns the multi-camera output of the Infinigen renderer into the
//! CO3D-style layout expected by multi-view training pipelines: per-camera image,
//! depth and mask directories plus gzip/JSON annotation manifests with camera
//! intrinsics and extrinsics for every frame.

pub mod classify;
pub mod config;
pub mod dataset;
pub mod discovery;
pub mod error;
pub mod io;
pub mod naming;
pub mod resolver;
pub mod transcode;
pub mod types;
pub mod utils;

// Re-export commonly used types and functions
pub use classify::{classify_frames, ClassifyOutcome, ClassifyReport};
pub use config::{AlignmentPolicy, Args, ClassifyArgs, ConvertConfig, DepthRange};
pub use dataset::{process_dataset, split_units};
pub use discovery::discover_units;
pub use error::{Error, Result, UnitRejection};
pub use resolver::{resolve_unit, Resolution};
pub use types::{
    AnnotationManifest, CameraParameters, ConversionSummary, FrameRecord, Modality,
    ModalityFileSet, SceneCameraUnit, SplitData,
};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

// Directory holding the modality directories of a scene
pub const FRAMES_DIR: &str = "frames";

// Prefix of per-camera directories
pub const CAMERA_DIR_PREFIX: &str = "camera_";

/// The four per-frame outputs of the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Modality {
    Color,
    Depth,
    Camview,
    Segmentation,
}

impl Modality {
    pub const ALL: [Modality; 4] = [
        Modality::Color,
        Modality::Depth,
        Modality::Camview,
        Modality::Segmentation,
    ];

    /// Directory name under `frames/`
    pub fn dir_name(self) -> &'static str {
        match self {
            Modality::Color => "Image",
            Modality::Depth => "Depth",
            Modality::Camview => "camview",
            Modality::Segmentation => "ObjectSegmentation",
        }
    }

    /// File extension, without the dot
    pub fn extension(self) -> &'static str {
        match self {
            Modality::Color => "png",
            Modality::Depth | Modality::Segmentation => "npy",
            Modality::Camview => "npz",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// One (root, scene, camera) stream of correlated frames
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SceneCameraUnit {
    pub root: PathBuf,
    pub scene: String,
    pub camera: String,
}

impl SceneCameraUnit {
    pub fn new(root: impl Into<PathBuf>, scene: impl Into<String>, camera: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            scene: scene.into(),
            camera: camera.into(),
        }
    }

    /// Manifest key, e.g. `1a0bdba9_camera_0`
    pub fn scene_key(&self) -> String {
        format!("{}_{}", self.scene, self.camera)
    }

    /// Input directory of one modality for this camera
    pub fn modality_dir(&self, modality: Modality) -> PathBuf {
        self.root
            .join(&self.scene)
            .join(FRAMES_DIR)
            .join(modality.dir_name())
            .join(&self.camera)
    }
}

impl fmt::Display for SceneCameraUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.scene_key(), self.root.display())
    }
}

/// A listed input file together with its parsed frame index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameFile {
    pub name: String,
    pub frame: Option<u32>,
}

/// The four aligned file sequences of a unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModalityFileSet {
    pub color: Vec<FrameFile>,
    pub depth: Vec<FrameFile>,
    pub camview: Vec<FrameFile>,
    pub segmentation: Vec<FrameFile>,
}

impl ModalityFileSet {
    pub fn get(&self, modality: Modality) -> &[FrameFile] {
        match modality {
            Modality::Color => &self.color,
            Modality::Depth => &self.depth,
            Modality::Camview => &self.camview,
            Modality::Segmentation => &self.segmentation,
        }
    }

    /// Number of aligned frames. Only meaningful once resolved.
    pub fn frame_count(&self) -> usize {
        self.color.len()
    }
}

/// Intrinsics and the top three rows of the extrinsic transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraParameters {
    pub intrinsics: [[f64; 3]; 3],
    pub extrinsics: [[f64; 4]; 3],
}

/// One frame entry of an annotation manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub filepath: String,
    pub intri: [[f64; 3]; 3],
    pub extri: [[f64; 4]; 3],
}

impl FrameRecord {
    pub fn new(filepath: String, camera: &CameraParameters) -> Self {
        Self {
            filepath,
            intri: camera.intrinsics,
            extri: camera.extrinsics,
        }
    }
}

// Scene key to the frames of that scene/camera, in frame order
pub type AnnotationManifest = BTreeMap<String, Vec<FrameRecord>>;

// Which manifest a unit belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Split {
    Train,
    Test,
}

impl Split {
    pub fn as_str(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Test => "test",
        }
    }
}

// Struct to hold the units assigned to each split
#[derive(Debug, Clone, Default)]
pub struct SplitData {
    pub train_units: Vec<SceneCameraUnit>,
    pub test_units: Vec<SceneCameraUnit>,
}

// Struct to hold the output directories of one unit
#[derive(Debug, Clone)]
pub struct UnitOutputDirs {
    pub images_dir: PathBuf,
    pub depths_dir: PathBuf,
    pub masks_dir: PathBuf,
    pub depth_masks_dir: PathBuf,
}

impl UnitOutputDirs {
    pub fn under(unit_dir: &Path) -> Self {
        Self {
            images_dir: unit_dir.join("images"),
            depths_dir: unit_dir.join("depths"),
            masks_dir: unit_dir.join("masks"),
            depth_masks_dir: unit_dir.join("depth_masks"),
        }
    }

    pub fn all(&self) -> [&Path; 4] {
        [
            &self.images_dir,
            &self.depths_dir,
            &self.masks_dir,
            &self.depth_masks_dir,
        ]
    }
}

// Struct to hold the category-level output locations
#[derive(Debug, Clone)]
pub struct OutputDirs {
    pub data_dir: PathBuf,
    pub annotations_dir: PathBuf,
}

/// Counters for a conversion run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConversionSummary {
    pub discovered_units: usize,
    pub train_units: usize,
    pub test_units: usize,
    pub converted_units: usize,
    pub frames_written: usize,
    pub skipped_missing_directory: usize,
    pub skipped_count_mismatch: usize,
    pub skipped_misaligned: usize,
}

impl ConversionSummary {
    pub fn skipped(&self) -> usize {
        self.skipped_missing_directory + self.skipped_count_mismatch + self.skipped_misaligned
    }

    pub fn print_summary(&self) {
        log::info!("=== Conversion Summary ===");
        log::info!("Discovered scene/camera units: {}", self.discovered_units);
        log::info!(
            "Assigned to train: {}, test: {}",
            self.train_units,
            self.test_units
        );
        log::info!("Converted units: {}", self.converted_units);
        log::info!("Frames written: {}", self.frames_written);

        if self.skipped() > 0 {
            log::warn!(
                "Skipped units: {} (missing directories: {}, mismatched counts: {}, misaligned frames: {})",
                self.skipped(),
                self.skipped_missing_directory,
                self.skipped_count_mismatch,
                self.skipped_misaligned
            );
        }
    }
}

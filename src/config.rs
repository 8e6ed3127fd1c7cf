use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Command-line arguments for converting Infinigen renders to CO3D format.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct Args {
    /// Infinigen output directories (one or more)
    #[arg(long = "infinigen_data_dir", num_args = 1.., required = true)]
    pub infinigen_data_dir: Vec<PathBuf>,

    /// Directory where preprocessed data will be saved
    #[arg(long = "data_output_dir", default_value = "data/default")]
    pub data_output_dir: PathBuf,

    /// Directory where annotation files will be saved
    #[arg(long = "annotation_output_dir", default_value = "data/annotations")]
    pub annotation_output_dir: PathBuf,

    /// Category name, used as the output folder name
    #[arg(long = "category", default_value = "default")]
    pub category: String,

    /// Proportion of scene/camera units assigned to the train split
    #[arg(long = "train_split", default_value_t = 0.8, value_parser = validate_ratio)]
    pub train_split: f64,

    /// Seed for random shuffling
    #[arg(long = "seed", default_value_t = 42)]
    pub seed: u64,

    /// Only mark this segmentation id in object masks
    #[arg(long = "object_id")]
    pub object_id: Option<i64>,

    /// Lower bound of the valid depth window
    #[arg(long = "min_depth", default_value_t = DEFAULT_MIN_DEPTH)]
    pub min_depth: f64,

    /// Upper bound of the valid depth window
    #[arg(long = "max_depth", default_value_t = DEFAULT_MAX_DEPTH)]
    pub max_depth: f64,

    /// How to reconcile modalities with different frame counts
    #[arg(long = "alignment", value_enum, default_value = "drop-leading")]
    pub alignment: AlignmentMode,

    /// Leading color/camera frames dropped by the drop-leading alignment
    #[arg(long = "drop_leading", default_value_t = DEFAULT_DROP_LEADING)]
    pub drop_leading: usize,
}

/// Command-line arguments for sorting raw frame dumps into per-camera directories.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct ClassifyArgs {
    /// Directories holding Infinigen scenes (each scene with a `frames` subtree)
    #[arg(required = true)]
    pub roots: Vec<PathBuf>,
}

pub const DEFAULT_MIN_DEPTH: f64 = 0.1;
pub const DEFAULT_MAX_DEPTH: f64 = 100.0;
pub const DEFAULT_DROP_LEADING: usize = 5;

// Alignment choice as exposed on the command line
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum AlignmentMode {
    DropLeading,
    Strict,
}

/// Correction applied when the four modality counts disagree.
///
/// Some renders carry extra leading color and camera frames that have no depth
/// or segmentation counterpart. `DropLeading` discards `count` leading entries
/// of the color and camview sequences and re-checks the counts. It only
/// triggers when the counts are unequal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentPolicy {
    DropLeading { count: usize },
    Strict,
}

impl Default for AlignmentPolicy {
    fn default() -> Self {
        AlignmentPolicy::DropLeading {
            count: DEFAULT_DROP_LEADING,
        }
    }
}

/// Inclusive window of depth values considered valid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthRange {
    pub min: f64,
    pub max: f64,
}

impl Default for DepthRange {
    fn default() -> Self {
        Self {
            min: DEFAULT_MIN_DEPTH,
            max: DEFAULT_MAX_DEPTH,
        }
    }
}

impl DepthRange {
    /// Whether a single depth sample is valid. Zero and NaN never are.
    pub fn is_valid(&self, depth: f64) -> bool {
        depth != 0.0 && !depth.is_nan() && depth >= self.min && depth <= self.max
    }
}

/// Everything a conversion run needs
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertConfig {
    pub input_roots: Vec<PathBuf>,
    pub data_output_dir: PathBuf,
    pub annotation_output_dir: PathBuf,
    pub category: String,
    pub train_split: f64,
    pub seed: u64,
    pub object_id: Option<i64>,
    pub depth_range: DepthRange,
    pub alignment: AlignmentPolicy,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            input_roots: Vec::new(),
            data_output_dir: PathBuf::from("data/default"),
            annotation_output_dir: PathBuf::from("data/annotations"),
            category: "default".to_string(),
            train_split: 0.8,
            seed: 42,
            object_id: None,
            depth_range: DepthRange::default(),
            alignment: AlignmentPolicy::default(),
        }
    }
}

impl ConvertConfig {
    /// Check that every input root exists and the numeric settings make sense
    pub fn validate(&self) -> Result<()> {
        for root in &self.input_roots {
            if !root.is_dir() {
                return Err(Error::InvalidInputRoot(root.clone()));
            }
        }
        if !(0.0..=1.0).contains(&self.train_split) {
            return Err(Error::InvalidConfig(format!(
                "train split {} is not between 0.0 and 1.0",
                self.train_split
            )));
        }
        if self.depth_range.min > self.depth_range.max {
            return Err(Error::InvalidConfig(format!(
                "min depth {} is greater than max depth {}",
                self.depth_range.min, self.depth_range.max
            )));
        }
        if self.category.is_empty() {
            return Err(Error::InvalidConfig("category must not be empty".to_string()));
        }
        Ok(())
    }
}

impl Args {
    /// Build the conversion configuration from the parsed arguments
    pub fn to_convert_config(&self) -> ConvertConfig {
        let alignment = match self.alignment {
            AlignmentMode::DropLeading => AlignmentPolicy::DropLeading {
                count: self.drop_leading,
            },
            AlignmentMode::Strict => AlignmentPolicy::Strict,
        };

        ConvertConfig {
            input_roots: self.infinigen_data_dir.clone(),
            data_output_dir: self.data_output_dir.clone(),
            annotation_output_dir: self.annotation_output_dir.clone(),
            category: self.category.clone(),
            train_split: self.train_split,
            seed: self.seed,
            object_id: self.object_id,
            depth_range: DepthRange {
                min: self.min_depth,
                max: self.max_depth,
            },
            alignment,
        }
    }
}

// Validate that the ratio is between 0.0 and 1.0
pub fn validate_ratio(s: &str) -> std::result::Result<f64, String> {
    match f64::from_str(s) {
        Ok(val) if (0.0..=1.0).contains(&val) => Ok(val),
        _ => Err("RATIO must be between 0.0 and 1.0".to_string()),
    }
}

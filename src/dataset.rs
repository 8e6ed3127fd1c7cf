use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashSet;

use crate::config::ConvertConfig;
use crate::discovery::discover_units;
use crate::error::{Result, UnitRejection};
use crate::io::{setup_output_directories, unit_output_dirs, write_manifests};
use crate::resolver::{resolve_unit, Resolution};
use crate::transcode::transcode_unit;
use crate::types::{AnnotationManifest, ConversionSummary, SceneCameraUnit, SplitData};
use crate::utils::create_progress_bar;

/// Shuffle the units with a seeded RNG and cut the first `floor(ratio * n)` into train
pub fn split_units(units: &[SceneCameraUnit], train_split: f64, seed: u64) -> SplitData {
    let mut shuffled = units.to_vec();
    let mut rng = StdRng::seed_from_u64(seed);
    shuffled.shuffle(&mut rng);

    let num_train = ((shuffled.len() as f64 * train_split).floor() as usize).min(shuffled.len());
    let test_units = shuffled.split_off(num_train);

    SplitData {
        train_units: shuffled,
        test_units,
    }
}

/// Main conversion pipeline: discover, split, resolve, transcode, write manifests
pub fn process_dataset(config: &ConvertConfig) -> Result<ConversionSummary> {
    config.validate()?;

    let output_dirs = setup_output_directories(config)?;

    let units = discover_units(&config.input_roots)?;
    info!("Discovered {} scene/camera units.", units.len());

    let split_data = split_units(&units, config.train_split, config.seed);
    let train_set: HashSet<&SceneCameraUnit> = split_data.train_units.iter().collect();

    let mut summary = ConversionSummary {
        discovered_units: units.len(),
        train_units: split_data.train_units.len(),
        test_units: split_data.test_units.len(),
        ..ConversionSummary::default()
    };

    let mut annotations_train = AnnotationManifest::new();
    let mut annotations_test = AnnotationManifest::new();

    let pb = create_progress_bar(units.len() as u64, "Convert");
    for unit in split_data
        .train_units
        .iter()
        .chain(split_data.test_units.iter())
    {
        pb.set_message(unit.scene_key());

        let files = match resolve_unit(unit, config.alignment)? {
            Resolution::Accepted { files, corrected } => {
                if corrected {
                    info!("Realigned {} to {} frames.", unit, files.frame_count());
                }
                files
            }
            Resolution::Rejected(rejection) => {
                warn!("Skipping {}: {}", unit, rejection);
                match rejection {
                    UnitRejection::MissingModalityDirectory(_) => {
                        summary.skipped_missing_directory += 1
                    }
                    UnitRejection::CountMismatch { .. } => summary.skipped_count_mismatch += 1,
                    UnitRejection::SortOrderAnomaly { .. }
                    | UnitRejection::FrameIndexMismatch { .. } => summary.skipped_misaligned += 1,
                }
                pb.inc(1);
                continue;
            }
        };

        let records = transcode_unit(
            unit,
            &files,
            &unit_output_dirs(&output_dirs, unit),
            &config.category,
            config.depth_range,
            config.object_id,
        )?;

        summary.converted_units += 1;
        summary.frames_written += records.len();

        // Committed only once every frame of the unit is written
        if train_set.contains(unit) {
            annotations_train.insert(unit.scene_key(), records);
        } else {
            annotations_test.insert(unit.scene_key(), records);
        }
        pb.inc(1);
    }
    pb.finish_with_message("Conversion complete");

    info!("Writing annotation files...");
    write_manifests(
        &output_dirs.annotations_dir,
        &config.category,
        &annotations_train,
        &annotations_test,
    )?;

    Ok(summary)
}

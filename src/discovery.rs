use log::{debug, warn};
use std::path::PathBuf;

use crate::error::Result;
use crate::types::{Modality, SceneCameraUnit, CAMERA_DIR_PREFIX, FRAMES_DIR};
use crate::utils::list_subdirectories;

/// Enumerate every (root, scene, camera) unit with a camera directory under `frames/Image`.
///
/// Scenes and cameras are visited in name order so the result is stable for a
/// given tree. Scenes without an image directory or without cameras are
/// reported and skipped.
pub fn discover_units(roots: &[PathBuf]) -> Result<Vec<SceneCameraUnit>> {
    let mut units = Vec::new();

    for root in roots {
        for scene in list_subdirectories(root)? {
            let image_dir = root
                .join(&scene)
                .join(FRAMES_DIR)
                .join(Modality::Color.dir_name());
            if !image_dir.is_dir() {
                warn!(
                    "Skipping scene {} due to missing Image directory: {}",
                    scene,
                    image_dir.display()
                );
                continue;
            }

            let cameras: Vec<String> = list_subdirectories(&image_dir)?
                .into_iter()
                .filter(|name| name.starts_with(CAMERA_DIR_PREFIX))
                .collect();
            if cameras.is_empty() {
                warn!(
                    "Skipping scene {}: no {}* directories in {}",
                    scene,
                    CAMERA_DIR_PREFIX,
                    image_dir.display()
                );
                continue;
            }

            for camera in cameras {
                debug!("Found {}_{} in {}", scene, camera, root.display());
                units.push(SceneCameraUnit::new(root.clone(), scene.clone(), camera));
            }
        }
    }

    Ok(units)
}

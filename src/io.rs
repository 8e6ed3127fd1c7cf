use flate2::write::GzEncoder;
use flate2::Compression;
use log::info;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::ConvertConfig;
use crate::error::{Error, Result};
use crate::types::{AnnotationManifest, OutputDirs, SceneCameraUnit, Split, UnitOutputDirs};
use crate::utils::create_output_directory;

/// Set up the category directories for data and annotations
pub fn setup_output_directories(config: &ConvertConfig) -> Result<OutputDirs> {
    let data_dir = create_output_directory(&config.data_output_dir.join(&config.category))?;
    let annotations_dir =
        create_output_directory(&config.annotation_output_dir.join(&config.category))?;

    Ok(OutputDirs {
        data_dir,
        annotations_dir,
    })
}

/// Output directories of one unit, `<data_dir>/<scene>_<camera>/...`
pub fn unit_output_dirs(output_dirs: &OutputDirs, unit: &SceneCameraUnit) -> UnitOutputDirs {
    UnitOutputDirs::under(&output_dirs.data_dir.join(unit.scene_key()))
}

/// Path of a manifest file, e.g. `<annotations_dir>/desert_train.jgz`
pub fn manifest_path(annotations_dir: &Path, category: &str, split: Split, extension: &str) -> PathBuf {
    annotations_dir.join(format!("{}_{}.{}", category, split.as_str(), extension))
}

/// Write the train and test manifests, each as `.jgz` and `.json`
pub fn write_manifests(
    annotations_dir: &Path,
    category: &str,
    train: &AnnotationManifest,
    test: &AnnotationManifest,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(4);
    for (split, manifest) in [(Split::Train, train), (Split::Test, test)] {
        let jgz_path = manifest_path(annotations_dir, category, split, "jgz");
        write_compressed_manifest(&jgz_path, manifest)?;
        info!("Wrote {}", jgz_path.display());
        written.push(jgz_path);

        let json_path = manifest_path(annotations_dir, category, split, "json");
        write_pretty_manifest(&json_path, manifest)?;
        info!("Wrote {}", json_path.display());
        written.push(json_path);
    }
    Ok(written)
}

/// Gzip-compressed compact JSON
pub fn write_compressed_manifest(path: &Path, manifest: &AnnotationManifest) -> Result<()> {
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    serde_json::to_writer(&mut encoder, manifest).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })?;
    encoder
        .finish()
        .and_then(|mut writer| writer.flush())
        .map_err(|e| Error::io(path, e))
}

/// Indented JSON for humans
pub fn write_pretty_manifest(path: &Path, manifest: &AnnotationManifest) -> Result<()> {
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, manifest).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })?;
    writer.flush().map_err(|e| Error::io(path, e))
}

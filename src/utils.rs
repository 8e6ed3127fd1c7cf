use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Create a progress bar with the given length and label
pub fn create_progress_bar(len: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    let style = ProgressStyle::default_bar()
        .template(&format!(
            "{{spinner:.green}} [{}] [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} ({{eta}}) {{msg}}",
            label
        ))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb
}

/// Create an output directory if needed and return its path. Existing content is kept.
pub fn create_output_directory(path: &Path) -> Result<PathBuf> {
    if path.is_dir() {
        log::debug!("Directory {:?} already exists, reusing it.", path);
    } else {
        fs::create_dir_all(path).map_err(|e| Error::io(path, e))?;
    }
    Ok(path.to_path_buf())
}

/// Names of the subdirectories of `dir`, sorted
pub fn list_subdirectories(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| Error::io(dir, e))? {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        if entry.path().is_dir() {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            } else {
                log::warn!("Skipping non UTF-8 directory name in {}", dir.display());
            }
        }
    }
    names.sort();
    Ok(names)
}

/// Names of the regular files in `dir` with the given extension, sorted
pub fn list_files_with_extension(dir: &Path, extension: &str) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| Error::io(dir, e))? {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        let path = entry.path();
        if !path.is_file() || !path.extension().is_some_and(|ext| ext == extension) {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

/// Join path components with `/`, whatever the platform separator
pub fn relative_posix_path(components: &[&str]) -> String {
    components.join("/")
}

//! Sort raw frame dumps into per-camera directories.
//!
//! Infinigen writes every camera of a scene into the same modality directory
//! (`frames/Image`, `frames/Depth`, ...). This pass moves each file into
//! `camera_<cam_id>` under its modality directory, reading the camera id from
//! the file name. It is best effort: failures are recorded and the pass goes on.

use jwalk::{Parallelism, WalkDir};
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

use crate::naming::camera_id;
use crate::types::{CAMERA_DIR_PREFIX, FRAMES_DIR};
use crate::utils::list_subdirectories;

/// What happened to one candidate file or directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifyOutcome {
    Moved { from: PathBuf, to: PathBuf },
    AlreadyClassified(PathBuf),
    NotMatching(PathBuf),
    MoveFailed { path: PathBuf, reason: String },
    UnreadableDirectory { path: PathBuf, reason: String },
}

/// Per-entry outcomes of a classification pass
#[derive(Debug, Clone, Default)]
pub struct ClassifyReport {
    pub outcomes: Vec<ClassifyOutcome>,
}

impl ClassifyReport {
    pub fn moved(&self) -> usize {
        self.count(|o| matches!(o, ClassifyOutcome::Moved { .. }))
    }

    pub fn already_classified(&self) -> usize {
        self.count(|o| matches!(o, ClassifyOutcome::AlreadyClassified(_)))
    }

    pub fn not_matching(&self) -> usize {
        self.count(|o| matches!(o, ClassifyOutcome::NotMatching(_)))
    }

    pub fn move_failures(&self) -> usize {
        self.count(|o| matches!(o, ClassifyOutcome::MoveFailed { .. }))
    }

    pub fn unreadable_directories(&self) -> usize {
        self.count(|o| matches!(o, ClassifyOutcome::UnreadableDirectory { .. }))
    }

    fn count(&self, pred: impl Fn(&ClassifyOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(o)).count()
    }

    fn record(&mut self, outcome: ClassifyOutcome) {
        match &outcome {
            ClassifyOutcome::Moved { from, to } => {
                debug!("Moved {} -> {}", from.display(), to.display())
            }
            ClassifyOutcome::MoveFailed { path, reason } => {
                debug!("Failed to move {}: {}", path.display(), reason)
            }
            ClassifyOutcome::UnreadableDirectory { path, reason } => {
                debug!("Cannot list {}: {}", path.display(), reason)
            }
            _ => {}
        }
        self.outcomes.push(outcome);
    }

    pub fn print_summary(&self) {
        info!("=== Classification Summary ===");
        info!("Moved into camera directories: {}", self.moved());
        info!("Already classified: {}", self.already_classified());
        info!("Not matching the naming convention: {}", self.not_matching());

        let failures = self.move_failures() + self.unreadable_directories();
        if failures > 0 {
            warn!(
                "Skipped entries: {} (move failures: {}, unreadable directories: {})",
                failures,
                self.move_failures(),
                self.unreadable_directories()
            );
        }
    }
}

/// Classify every scene under each root
pub fn classify_frames(roots: &[PathBuf]) -> ClassifyReport {
    let mut report = ClassifyReport::default();

    for root in roots {
        if !root.is_dir() {
            warn!("Skipping {}: not a directory.", root.display());
            continue;
        }

        let scenes = match list_subdirectories(root) {
            Ok(scenes) => scenes,
            Err(e) => {
                report.record(ClassifyOutcome::UnreadableDirectory {
                    path: root.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        for scene in scenes {
            let frames_dir = root.join(&scene).join(FRAMES_DIR);
            if !frames_dir.is_dir() {
                debug!("Scene {} has no {} directory.", scene, FRAMES_DIR);
                continue;
            }
            classify_frames_dir(&frames_dir, &mut report);
        }
    }

    report
}

/// Classify the modality directories of one `frames` directory
pub fn classify_frames_dir(frames_dir: &Path, report: &mut ClassifyReport) {
    let modality_dirs = match list_subdirectories(frames_dir) {
        Ok(dirs) => dirs,
        Err(e) => {
            report.record(ClassifyOutcome::UnreadableDirectory {
                path: frames_dir.to_path_buf(),
                reason: e.to_string(),
            });
            return;
        }
    };

    for modality in modality_dirs {
        let modality_dir = frames_dir.join(modality);
        for candidate in collect_candidates(&modality_dir, report) {
            classify_file(&modality_dir, &candidate, report);
        }
    }
}

// Files directly in `dir` and files one level inside its immediate subdirectories
fn collect_candidates(dir: &Path, report: &mut ClassifyReport) -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(2)
        .skip_hidden(false)
        .sort(true)
        .parallelism(Parallelism::Serial);

    for entry in walker {
        match entry {
            Ok(entry) if entry.file_type().is_file() => candidates.push(entry.path()),
            Ok(_) => {}
            Err(e) => report.record(ClassifyOutcome::UnreadableDirectory {
                path: e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf()),
                reason: e.to_string(),
            }),
        }
    }

    candidates
}

fn classify_file(modality_dir: &Path, source: &Path, report: &mut ClassifyReport) {
    let Some(file_name) = source.file_name().and_then(|name| name.to_str()) else {
        report.record(ClassifyOutcome::NotMatching(source.to_path_buf()));
        return;
    };
    let Some(cam_id) = camera_id(file_name) else {
        report.record(ClassifyOutcome::NotMatching(source.to_path_buf()));
        return;
    };

    let destination_dir = modality_dir.join(format!("{}{}", CAMERA_DIR_PREFIX, cam_id));
    let destination = destination_dir.join(file_name);
    if destination == source {
        report.record(ClassifyOutcome::AlreadyClassified(destination));
        return;
    }

    if let Err(e) = fs::create_dir_all(&destination_dir) {
        report.record(ClassifyOutcome::MoveFailed {
            path: source.to_path_buf(),
            reason: format!("cannot create {}: {}", destination_dir.display(), e),
        });
        return;
    }

    match move_file(source, &destination) {
        Ok(()) => report.record(ClassifyOutcome::Moved {
            from: source.to_path_buf(),
            to: destination,
        }),
        Err(e) => report.record(ClassifyOutcome::MoveFailed {
            path: source.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}

// Rename, or copy and remove when the rename is refused (e.g. across filesystems)
fn move_file(source: &Path, destination: &Path) -> std::io::Result<()> {
    if fs::rename(source, destination).is_ok() {
        return Ok(());
    }
    fs::copy(source, destination)?;
    fs::remove_file(source)
}

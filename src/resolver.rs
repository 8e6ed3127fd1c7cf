//! Frame correspondence across the four modalities of a unit.
//!
//! Position `i` of every sequence must denote the same frame. Files are listed
//! in name order and the frame index parsed from each name is used as the join
//! key: it has to agree with the name order within a modality and across
//! modalities at every position.

use log::debug;

use crate::config::AlignmentPolicy;
use crate::error::{Result, UnitRejection};
use crate::naming::parse_frame_name;
use crate::types::{FrameFile, Modality, ModalityFileSet, SceneCameraUnit};
use crate::utils::list_files_with_extension;

/// Outcome of resolving one unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Accepted {
        files: ModalityFileSet,
        corrected: bool,
    },
    Rejected(UnitRejection),
}

/// List and align the modality files of a unit.
///
/// I/O failures are errors. Units that cannot be aligned come back as
/// `Resolution::Rejected` with the reason.
pub fn resolve_unit(unit: &SceneCameraUnit, policy: AlignmentPolicy) -> Result<Resolution> {
    let missing: Vec<_> = Modality::ALL
        .iter()
        .map(|&modality| (modality, unit.modality_dir(modality)))
        .filter(|(_, dir)| !dir.is_dir())
        .collect();
    if !missing.is_empty() {
        return Ok(Resolution::Rejected(
            UnitRejection::MissingModalityDirectory(missing),
        ));
    }

    let mut listed = Vec::with_capacity(Modality::ALL.len());
    for modality in Modality::ALL {
        let names = list_files_with_extension(&unit.modality_dir(modality), modality.extension())?;
        let files = names
            .into_iter()
            .map(|name| {
                let frame = parse_frame_name(&name).map(|parsed| parsed.frame);
                FrameFile { name, frame }
            })
            .collect::<Vec<_>>();
        if let Err(rejection) = check_frame_order(modality, &files) {
            return Ok(Resolution::Rejected(rejection));
        }
        listed.push(files);
    }

    let segmentation = listed.pop().unwrap_or_default();
    let camview = listed.pop().unwrap_or_default();
    let depth = listed.pop().unwrap_or_default();
    let color = listed.pop().unwrap_or_default();

    Ok(align(
        ModalityFileSet {
            color,
            depth,
            camview,
            segmentation,
        },
        policy,
    ))
}

/// Bring the four sequences to a common length, applying the policy if needed
pub fn align(files: ModalityFileSet, policy: AlignmentPolicy) -> Resolution {
    let counts = UnitRejection::CountMismatch {
        color: files.color.len(),
        depth: files.depth.len(),
        camview: files.camview.len(),
        segmentation: files.segmentation.len(),
    };

    if all_equal(&files) {
        return match check_join(&files, false) {
            Ok(()) => Resolution::Accepted {
                files,
                corrected: false,
            },
            Err(rejection) => Resolution::Rejected(rejection),
        };
    }

    let AlignmentPolicy::DropLeading { count } = policy else {
        return Resolution::Rejected(counts);
    };

    let ModalityFileSet {
        mut color,
        depth,
        mut camview,
        segmentation,
    } = files;
    color.drain(..count.min(color.len()));
    camview.drain(..count.min(camview.len()));
    debug!(
        "Dropped {} leading color/camera frames, now {} against {} depth frames",
        count,
        color.len(),
        depth.len()
    );

    let trimmed = ModalityFileSet {
        color,
        depth,
        camview,
        segmentation,
    };
    if !all_equal(&trimmed) {
        return Resolution::Rejected(counts);
    }

    match check_join(&trimmed, true) {
        Ok(()) => Resolution::Accepted {
            files: trimmed,
            corrected: true,
        },
        Err(rejection) => Resolution::Rejected(rejection),
    }
}

fn all_equal(files: &ModalityFileSet) -> bool {
    let n = files.color.len();
    Modality::ALL
        .iter()
        .all(|&modality| files.get(modality).len() == n)
}

// Name order must match frame order: no duplicate or descending frame indices
fn check_frame_order(modality: Modality, files: &[FrameFile]) -> std::result::Result<(), UnitRejection> {
    let mut previous: Option<&FrameFile> = None;
    for file in files.iter().filter(|file| file.frame.is_some()) {
        if let Some(prev) = previous {
            if prev.frame >= file.frame {
                return Err(UnitRejection::SortOrderAnomaly {
                    modality,
                    detail: format!("{} sorts before {}", prev.name, file.name),
                });
            }
        }
        previous = Some(file);
    }
    Ok(())
}

// Pairs of modalities whose frame indices must match position by position.
// Color and camera are trimmed together, as are depth and segmentation; the
// two groups are only compared when no correction was applied.
fn check_join(files: &ModalityFileSet, corrected: bool) -> std::result::Result<(), UnitRejection> {
    let mut pairs = vec![
        (Modality::Color, Modality::Camview),
        (Modality::Depth, Modality::Segmentation),
    ];
    if !corrected {
        pairs.push((Modality::Color, Modality::Depth));
    }

    for (left, right) in pairs {
        let matched = files.get(left).iter().zip(files.get(right));
        for (position, (l, r)) in matched.enumerate() {
            if let (Some(left_frame), Some(right_frame)) = (l.frame, r.frame) {
                if left_frame != right_frame {
                    return Err(UnitRejection::FrameIndexMismatch {
                        position,
                        left,
                        left_frame,
                        right,
                        right_frame,
                    });
                }
            }
        }
    }
    Ok(())
}

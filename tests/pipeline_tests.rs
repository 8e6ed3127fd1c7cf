use flate2::read::GzDecoder;
use ndarray::{array, Array2, Array3};
use ndarray_npy::{write_npy, NpzWriter};
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use infinigen2co3d::transcode::{
    read_camera_parameters, read_depth, read_segmentation, DepthMap,
};
use infinigen2co3d::{
    classify_frames, discover_units, process_dataset, resolve_unit, AlignmentPolicy,
    AnnotationManifest, ClassifyOutcome, ConvertConfig, Error, Modality, Resolution,
    SceneCameraUnit, UnitRejection,
};

const DEPTH: [[f32; 2]; 2] = [[0.0, 1.0], [2.0, 4.0]];

fn intrinsics(camera: u32) -> Array2<f64> {
    array![
        [500.0 + camera as f64, 0.0, 320.0],
        [0.0, 500.0, 240.0],
        [0.0, 0.0, 1.0]
    ]
}

fn extrinsics(frame: u32) -> Array2<f64> {
    array![
        [1.0, 0.0, 0.0, frame as f64],
        [0.0, 1.0, 0.0, 0.5],
        [0.0, 0.0, 1.0, -2.0],
        [0.0, 0.0, 0.0, 1.0]
    ]
}

fn write_camview(path: &Path, camera: u32, frame: u32) {
    let mut npz = NpzWriter::new(File::create(path).unwrap());
    npz.add_array("K", &intrinsics(camera)).unwrap();
    npz.add_array("T", &extrinsics(frame)).unwrap();
    npz.finish().unwrap();
}

/// Write one modality file per frame, flat in the modality directory like the renderer does
fn write_raw_frames(
    frames_dir: &Path,
    modality: Modality,
    camera: u32,
    frames: std::ops::Range<u32>,
    subdir: Option<&str>,
) {
    let dir = match subdir {
        Some(sub) => frames_dir.join(modality.dir_name()).join(sub),
        None => frames_dir.join(modality.dir_name()),
    };
    fs::create_dir_all(&dir).unwrap();

    for frame in frames {
        let name = format!(
            "{}_{}_0_{:04}_0.{}",
            modality.dir_name(),
            camera,
            frame,
            modality.extension()
        );
        let path = dir.join(name);
        match modality {
            Modality::Color => fs::write(&path, format!("color {} {}", camera, frame)).unwrap(),
            Modality::Depth => write_npy(&path, &Array2::from(DEPTH.to_vec())).unwrap(),
            Modality::Camview => write_camview(&path, camera, frame),
            Modality::Segmentation => {
                write_npy(&path, &array![[0i32, 0], [3, 3]]).unwrap();
            }
        }
    }
}

fn write_raw_scene(root: &Path, scene: &str, cameras: &[u32], frames: std::ops::Range<u32>) {
    let frames_dir = root.join(scene).join("frames");
    for &camera in cameras {
        for modality in Modality::ALL {
            write_raw_frames(&frames_dir, modality, camera, frames.clone(), None);
        }
    }
}

fn files_in(dir: &Path) -> BTreeSet<String> {
    fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect()
}

fn read_manifest_json(path: &Path) -> AnnotationManifest {
    serde_json::from_reader(File::open(path).unwrap()).unwrap()
}

fn read_manifest_jgz(path: &Path) -> AnnotationManifest {
    serde_json::from_reader(GzDecoder::new(File::open(path).unwrap())).unwrap()
}

fn config(root: PathBuf, out: &Path, category: &str, train_split: f64) -> ConvertConfig {
    ConvertConfig {
        input_roots: vec![root],
        data_output_dir: out.join("data"),
        annotation_output_dir: out.join("annotations"),
        category: category.to_string(),
        train_split,
        ..ConvertConfig::default()
    }
}

#[test]
fn test_classify_frames_moves_into_camera_dirs() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path().join("coral");
    write_raw_scene(&root, "scene_a", &[0, 1], 0..3);

    let image_dir = root.join("scene_a/frames/Image");
    fs::write(image_dir.join("notes.txt"), "keep me").unwrap();
    fs::write(image_dir.join("Image_0_0_12_0.png"), "odd").unwrap();

    // One level down is picked up, two levels down is not
    write_raw_frames(&root.join("scene_a/frames"), Modality::Color, 2, 0..1, Some("extra"));
    write_raw_frames(&root.join("scene_a/frames"), Modality::Color, 3, 0..1, Some("extra/deeper"));

    let report = classify_frames(&[root.clone()]);
    assert_eq!(report.moved(), 2 * 3 * 4 + 1);
    assert_eq!(report.move_failures(), 0);
    assert_eq!(report.not_matching(), 2);

    assert_eq!(
        files_in(&image_dir.join("camera_0")),
        ["Image_0_0_0000_0.png", "Image_0_0_0001_0.png", "Image_0_0_0002_0.png"]
            .into_iter()
            .map(String::from)
            .collect()
    );
    assert_eq!(files_in(&root.join("scene_a/frames/Depth/camera_1")).len(), 3);
    assert!(image_dir.join("camera_2/Image_2_0_0000_0.png").is_file());
    assert!(image_dir.join("extra/deeper/Image_3_0_0000_0.png").is_file());
    assert!(!image_dir.join("camera_3").exists());
    assert!(image_dir.join("notes.txt").is_file());
    assert!(image_dir.join("Image_0_0_12_0.png").is_file());
}

#[test]
fn test_classify_frames_is_idempotent() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path().join("coral");
    write_raw_scene(&root, "scene_a", &[0, 1], 0..4);

    classify_frames(&[root.clone()]);
    let snapshot: Vec<_> = Modality::ALL
        .iter()
        .flat_map(|m| ["camera_0", "camera_1"].map(|c| root.join("scene_a/frames").join(m.dir_name()).join(c)))
        .map(|dir| files_in(&dir))
        .collect();

    let report = classify_frames(&[root.clone()]);
    assert_eq!(report.moved(), 0);
    assert_eq!(report.already_classified(), 2 * 4 * 4);

    let again: Vec<_> = Modality::ALL
        .iter()
        .flat_map(|m| ["camera_0", "camera_1"].map(|c| root.join("scene_a/frames").join(m.dir_name()).join(c)))
        .map(|dir| files_in(&dir))
        .collect();
    assert_eq!(snapshot, again);
}

#[test]
fn test_classify_frames_continues_after_move_failure() {
    let temp_dir = tempfile::tempdir().unwrap();
    let image_dir = temp_dir.path().join("coral/scene_a/frames/Image");
    fs::create_dir_all(&image_dir).unwrap();
    fs::write(image_dir.join("Image_0_0_0000_0.png"), "color 0").unwrap();
    fs::write(image_dir.join("Image_1_0_0000_0.png"), "color 1").unwrap();
    // A plain file where the camera directory should go
    fs::write(image_dir.join("camera_0"), "in the way").unwrap();

    let report = classify_frames(&[temp_dir.path().join("coral")]);
    assert_eq!(report.move_failures(), 1);
    assert_eq!(report.moved(), 1);
    assert_eq!(report.not_matching(), 1);
    assert!(report.outcomes.iter().any(|outcome| matches!(
        outcome,
        ClassifyOutcome::MoveFailed { path, .. } if path.ends_with("Image_0_0_0000_0.png")
    )));

    assert!(image_dir.join("Image_0_0_0000_0.png").is_file());
    assert!(image_dir.join("camera_1/Image_1_0_0000_0.png").is_file());
}

#[test]
fn test_discover_units_skips_scenes_without_cameras() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path().join("desert");
    write_raw_scene(&root, "scene_b", &[1, 0], 0..2);
    classify_frames(&[root.clone()]);
    fs::create_dir_all(root.join("scene_c/frames/Image/not_a_camera")).unwrap();
    fs::create_dir_all(root.join("scene_d/frames/Depth")).unwrap();

    let units = discover_units(&[root.clone()]).unwrap();
    assert_eq!(
        units,
        vec![
            SceneCameraUnit::new(root.clone(), "scene_b", "camera_0"),
            SceneCameraUnit::new(root.clone(), "scene_b", "camera_1"),
        ]
    );
}

#[test]
fn test_resolve_unit_missing_directory() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path().join("desert");
    write_raw_scene(&root, "scene_a", &[0], 0..2);
    classify_frames(&[root.clone()]);
    fs::remove_dir_all(root.join("scene_a/frames/camview/camera_0")).unwrap();

    let unit = SceneCameraUnit::new(root.clone(), "scene_a", "camera_0");
    match resolve_unit(&unit, AlignmentPolicy::default()).unwrap() {
        Resolution::Rejected(UnitRejection::MissingModalityDirectory(missing)) => {
            assert_eq!(missing.len(), 1);
            assert_eq!(missing[0].0, Modality::Camview);
        }
        other => panic!("unexpected resolution: {:?}", other),
    }
}

#[test]
fn test_resolve_unit_drops_spurious_leading_frames() {
    let temp_dir = tempfile::tempdir().unwrap();
    let frames_dir = temp_dir.path().join("desert/scene_a/frames");
    write_raw_frames(&frames_dir, Modality::Color, 0, 0..25, Some("camera_0"));
    write_raw_frames(&frames_dir, Modality::Camview, 0, 0..25, Some("camera_0"));
    write_raw_frames(&frames_dir, Modality::Depth, 0, 5..25, Some("camera_0"));
    write_raw_frames(&frames_dir, Modality::Segmentation, 0, 5..25, Some("camera_0"));

    let unit = SceneCameraUnit::new(temp_dir.path().join("desert"), "scene_a", "camera_0");
    match resolve_unit(&unit, AlignmentPolicy::default()).unwrap() {
        Resolution::Accepted { files, corrected } => {
            assert!(corrected);
            assert_eq!(files.frame_count(), 20);
            assert_eq!(files.color[0].name, "Image_0_0_0005_0.png");
            assert_eq!(files.depth[0].name, "Depth_0_0_0005_0.npy");
        }
        other => panic!("unexpected resolution: {:?}", other),
    }
}

#[test]
fn test_resolve_unit_rejects_unpadded_frame_order() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path().join("desert");
    let frames_dir = root.join("scene_a/frames");
    for modality in Modality::ALL {
        let dir = frames_dir.join(modality.dir_name()).join("camera_0");
        fs::create_dir_all(&dir).unwrap();
        for frame in [9, 10] {
            let name = format!("{}_0_0_{}_0.{}", modality.dir_name(), frame, modality.extension());
            fs::write(dir.join(name), "").unwrap();
        }
    }

    let unit = SceneCameraUnit::new(root, "scene_a", "camera_0");
    assert!(matches!(
        resolve_unit(&unit, AlignmentPolicy::default()).unwrap(),
        Resolution::Rejected(UnitRejection::SortOrderAnomaly { modality: Modality::Color, .. })
    ));
}

#[test]
fn test_read_camera_parameters_keeps_top_rows() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("camview_0_0_0007_0.npz");
    write_camview(&path, 2, 7);

    let camera = read_camera_parameters(&path).unwrap();
    assert_eq!(camera.intrinsics[0], [502.0, 0.0, 320.0]);
    assert_eq!(camera.intrinsics[2], [0.0, 0.0, 1.0]);
    assert_eq!(
        camera.extrinsics,
        [
            [1.0, 0.0, 0.0, 7.0],
            [0.0, 1.0, 0.0, 0.5],
            [0.0, 0.0, 1.0, -2.0]
        ]
    );
}

#[test]
fn test_process_dataset_end_to_end() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path().join("desert_renders");
    write_raw_scene(&root, "scene_a", &[0, 1], 0..3);
    write_raw_scene(&root, "scene_b", &[0], 0..3);
    classify_frames(&[root.clone()]);

    // A unit without segmentation output is skipped
    fs::remove_dir_all(root.join("scene_b/frames/ObjectSegmentation")).unwrap();

    let out = temp_dir.path().join("out");
    let config = config(root.clone(), &out, "desert", 0.5);
    let summary = process_dataset(&config).unwrap();

    assert_eq!(summary.discovered_units, 3);
    assert_eq!(summary.train_units, 1);
    assert_eq!(summary.test_units, 2);
    assert_eq!(summary.converted_units, 2);
    assert_eq!(summary.skipped_missing_directory, 1);
    assert_eq!(summary.frames_written, 6);

    for scene_key in ["scene_a_camera_0", "scene_a_camera_1"] {
        let unit_dir = out.join("data/desert").join(scene_key);
        for sub in ["images", "depths", "masks", "depth_masks"] {
            assert_eq!(files_in(&unit_dir.join(sub)).len(), 3, "{}/{}", scene_key, sub);
        }
        assert_eq!(
            fs::read_to_string(unit_dir.join("images/rgb_000002.png")).unwrap(),
            format!("color {} 2", &scene_key[scene_key.len() - 1..])
        );

        let depth = image::open(unit_dir.join("depths/rgb_000000.png.geometric.png"))
            .unwrap()
            .into_luma16();
        assert_eq!(depth.dimensions(), (2, 2));
        assert_eq!(depth.into_raw(), vec![0, 16383, 32767, 65535]);

        let depth_mask = image::open(unit_dir.join("depth_masks/rgb_000000.png"))
            .unwrap()
            .into_luma8();
        assert_eq!(depth_mask.into_raw(), vec![0, 255, 255, 255]);

        let mask = image::open(unit_dir.join("masks/rgb_000001_mask.png"))
            .unwrap()
            .into_luma8();
        assert_eq!(mask.into_raw(), vec![0, 0, 255, 255]);
    }
    assert!(!out.join("data/desert/scene_b_camera_0").exists());

    let annotations = out.join("annotations/desert");
    let train = read_manifest_json(&annotations.join("desert_train.json"));
    let test = read_manifest_json(&annotations.join("desert_test.json"));
    assert_eq!(read_manifest_jgz(&annotations.join("desert_train.jgz")), train);
    assert_eq!(read_manifest_jgz(&annotations.join("desert_test.jgz")), test);

    let keys: BTreeSet<_> = train.keys().chain(test.keys()).cloned().collect();
    assert_eq!(
        keys,
        ["scene_a_camera_0", "scene_a_camera_1"]
            .into_iter()
            .map(String::from)
            .collect()
    );
    assert!(train.keys().all(|key| !test.contains_key(key)));

    let records = train
        .get("scene_a_camera_1")
        .or_else(|| test.get("scene_a_camera_1"))
        .unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[1].filepath, "desert/scene_a_camera_1/images/rgb_000001.png");
    assert_eq!(records[1].intri[0][0], 501.0);
    assert_eq!(records[1].extri[0][3], 1.0);
    assert_eq!(records[2].extri.len(), 3);
}

#[test]
fn test_process_dataset_is_reproducible() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path().join("renders");
    write_raw_scene(&root, "scene_a", &[0, 1, 2], 0..1);
    write_raw_scene(&root, "scene_b", &[0, 1], 0..1);
    classify_frames(&[root.clone()]);

    let first_out = temp_dir.path().join("first");
    let second_out = temp_dir.path().join("second");
    process_dataset(&config(root.clone(), &first_out, "desert", 0.6)).unwrap();
    process_dataset(&config(root.clone(), &second_out, "desert", 0.6)).unwrap();

    for name in ["desert_train.json", "desert_test.json"] {
        let first = read_manifest_json(&first_out.join("annotations/desert").join(name));
        let second = read_manifest_json(&second_out.join("annotations/desert").join(name));
        assert_eq!(first.keys().collect::<Vec<_>>(), second.keys().collect::<Vec<_>>());
    }
    let train = read_manifest_json(&first_out.join("annotations/desert/desert_train.json"));
    assert_eq!(train.len(), 3);
}

#[test]
fn test_process_dataset_missing_root_is_fatal() {
    let temp_dir = tempfile::tempdir().unwrap();
    let missing = temp_dir.path().join("does_not_exist");
    let out = temp_dir.path().join("out");

    let result = process_dataset(&config(missing.clone(), &out, "desert", 0.8));
    assert!(matches!(result, Err(Error::InvalidInputRoot(path)) if path == missing));
    assert!(!out.exists());
}

#[test]
fn test_read_depth_keeps_u16_arrays() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("depth_u16.npy");
    write_npy(&path, &array![[0u16, 1000], [40000, 65535]]).unwrap();

    match read_depth(&path).unwrap() {
        DepthMap::Fixed(depth) => assert_eq!(depth, array![[0u16, 1000], [40000, 65535]]),
        other => panic!("expected a 16-bit depth map, got {:?}", other),
    }
}

#[test]
fn test_read_depth_squeezes_single_channel() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("depth_hw1.npy");
    let depth = Array3::from_shape_vec((2, 3, 1), vec![0.5f32, 1.0, 1.5, 2.0, 2.5, 3.0]).unwrap();
    write_npy(&path, &depth).unwrap();

    match read_depth(&path).unwrap() {
        DepthMap::Float(depth) => {
            assert_eq!(depth, array![[0.5, 1.0, 1.5], [2.0, 2.5, 3.0]]);
        }
        other => panic!("expected a float depth map, got {:?}", other),
    }
}

#[test]
fn test_read_depth_rejects_multichannel() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("depth_hw3.npy");
    write_npy(&path, &Array3::<f32>::zeros((2, 2, 3))).unwrap();

    assert!(matches!(read_depth(&path), Err(Error::InvalidArray { .. })));
}

#[test]
fn test_read_segmentation_dtypes() {
    let temp_dir = tempfile::tempdir().unwrap();

    let bool_path = temp_dir.path().join("seg_bool.npy");
    write_npy(&bool_path, &array![[true, false]]).unwrap();
    assert_eq!(read_segmentation(&bool_path).unwrap(), array![[1.0, 0.0]]);

    let int_path = temp_dir.path().join("seg_i64.npy");
    write_npy(&int_path, &Array3::from_shape_vec((1, 2, 1), vec![1i64, 2]).unwrap()).unwrap();
    assert_eq!(read_segmentation(&int_path).unwrap(), array![[1.0, 2.0]]);

    let byte_path = temp_dir.path().join("seg_u8.npy");
    write_npy(&byte_path, &array![[0u8, 7], [7, 0]]).unwrap();
    assert_eq!(read_segmentation(&byte_path).unwrap(), array![[0.0, 7.0], [7.0, 0.0]]);
}

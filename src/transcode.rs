//! Per-frame conversion of a resolved unit.
//!
//! For every aligned frame the color image is copied, the segmentation array
//! becomes an object mask, the depth array becomes a 16-bit depth image plus a
//! validity mask, and the camera file becomes a [`FrameRecord`].

use image::{DynamicImage, ImageBuffer, ImageFormat, Luma};
use ndarray::{Array2, ArrayD, Axis, Ix2, OwnedRepr};
use ndarray_npy::{NpzReader, ReadNpyError, ReadNpyExt, ReadNpzError, ReadableElement};
use std::fs::{self, File};
use std::path::Path;

use crate::config::DepthRange;
use crate::error::{Error, Result};
use crate::types::{
    CameraParameters, FrameRecord, Modality, ModalityFileSet, SceneCameraUnit, UnitOutputDirs,
};
use crate::utils::{create_output_directory, relative_posix_path};

/// A loaded depth array. 16-bit arrays are written as they are.
#[derive(Debug, Clone, PartialEq)]
pub enum DepthMap {
    Fixed(Array2<u16>),
    Float(Array2<f64>),
}

impl DepthMap {
    pub fn dim(&self) -> (usize, usize) {
        match self {
            DepthMap::Fixed(array) => array.dim(),
            DepthMap::Float(array) => array.dim(),
        }
    }

    fn values(&self) -> Array2<f64> {
        match self {
            DepthMap::Fixed(array) => array.mapv(f64::from),
            DepthMap::Float(array) => array.clone(),
        }
    }
}

/// Object mask: 255 where the (NaN-cleaned) id is positive, or equals `object_id` if given
pub fn object_mask(segmentation: &Array2<f64>, object_id: Option<i64>) -> Array2<u8> {
    segmentation.mapv(|value| {
        let value = if value.is_nan() { 0.0 } else { value };
        let hit = match object_id {
            Some(id) => value == id as f64,
            None => value > 0.0,
        };
        if hit {
            255
        } else {
            0
        }
    })
}

/// Rescale depth linearly to the full `u16` range.
///
/// The range is taken over finite values. A constant (or entirely non-finite)
/// array encodes to zeros. NaN and `-inf` encode to 0, `+inf` to 65535.
/// A few NaN pixels therefore leave the rest of the image intact instead of
/// zeroing the whole frame.
pub fn encode_depth(depth: &DepthMap) -> Array2<u16> {
    let values = match depth {
        DepthMap::Fixed(array) => return array.clone(),
        DepthMap::Float(array) => array,
    };

    let bounds = values
        .iter()
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<(f64, f64)>, &v| match acc {
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            None => Some((v, v)),
        });

    let (min, max) = match bounds {
        Some((min, max)) if max - min > 0.0 => (min, max),
        _ => return Array2::zeros(values.dim()),
    };
    let span = max - min;

    values.mapv(|v| {
        if v.is_nan() {
            0
        } else if v == f64::INFINITY {
            u16::MAX
        } else if v == f64::NEG_INFINITY {
            0
        } else {
            ((v - min) / span * f64::from(u16::MAX)) as u16
        }
    })
}

/// Validity mask: 255 inside the depth window, 0 elsewhere and for zero or NaN depth
pub fn depth_validity_mask(depth: &DepthMap, range: DepthRange) -> Array2<u8> {
    depth
        .values()
        .mapv(|v| if range.is_valid(v) { 255 } else { 0 })
}

/// Load a depth `.npy` file
pub fn read_depth(path: &Path) -> Result<DepthMap> {
    let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
    if let Some(array) = try_read_npy::<u16>(path, &bytes)? {
        return Ok(DepthMap::Fixed(to_image_shape(path, array)?));
    }
    Ok(DepthMap::Float(read_as_f64(path, &bytes)?))
}

/// Load a segmentation `.npy` file as floating point ids
pub fn read_segmentation(path: &Path) -> Result<Array2<f64>> {
    let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
    read_as_f64(path, &bytes)
}

/// Read `K` and the top three rows of `T` from a camview `.npz` file
pub fn read_camera_parameters(path: &Path) -> Result<CameraParameters> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut npz = NpzReader::new(file).map_err(|source| Error::Npz {
        path: path.to_path_buf(),
        key: "archive".to_string(),
        source,
    })?;

    let k = read_npz_matrix(&mut npz, path, "K")?;
    let t = read_npz_matrix(&mut npz, path, "T")?;

    if k.dim() != (3, 3) {
        return Err(Error::invalid_array(
            path,
            format!("K has shape {:?}, expected (3, 3)", k.dim()),
        ));
    }
    if t.nrows() < 3 || t.ncols() != 4 {
        return Err(Error::invalid_array(
            path,
            format!("T has shape {:?}, expected (3, 4) or (4, 4)", t.dim()),
        ));
    }

    let mut intrinsics = [[0.0; 3]; 3];
    for ((row, col), value) in k.indexed_iter() {
        intrinsics[row][col] = *value;
    }
    let mut extrinsics = [[0.0; 4]; 3];
    for ((row, col), value) in t.indexed_iter().filter(|((row, _), _)| *row < 3) {
        extrinsics[row][col] = *value;
    }

    Ok(CameraParameters {
        intrinsics,
        extrinsics,
    })
}

/// Convert every frame of a resolved unit and return its records in frame order
pub fn transcode_unit(
    unit: &SceneCameraUnit,
    files: &ModalityFileSet,
    output: &UnitOutputDirs,
    category: &str,
    depth_range: DepthRange,
    object_id: Option<i64>,
) -> Result<Vec<FrameRecord>> {
    for dir in output.all() {
        create_output_directory(dir)?;
    }

    let scene_key = unit.scene_key();
    let color_dir = unit.modality_dir(Modality::Color);
    let depth_dir = unit.modality_dir(Modality::Depth);
    let camview_dir = unit.modality_dir(Modality::Camview);
    let segmentation_dir = unit.modality_dir(Modality::Segmentation);

    let mut records = Vec::with_capacity(files.frame_count());
    for i in 0..files.frame_count() {
        let stem = format!("rgb_{:06}", i);
        let rgb_name = format!("{}.png", stem);

        // Color image, copied verbatim
        let rgb_src = color_dir.join(&files.color[i].name);
        let rgb_dst = output.images_dir.join(&rgb_name);
        fs::copy(&rgb_src, &rgb_dst).map_err(|e| Error::io(&rgb_src, e))?;

        // Object mask
        let segmentation = read_segmentation(&segmentation_dir.join(&files.segmentation[i].name))?;
        let mask = object_mask(&segmentation, object_id);
        write_gray8(&output.masks_dir.join(format!("{}_mask.png", stem)), &mask)?;

        // Depth and depth mask, named the way the trainer looks them up
        let depth = read_depth(&depth_dir.join(&files.depth[i].name))?;
        write_gray16(
            &output.depths_dir.join(format!("{}.geometric.png", rgb_name)),
            &encode_depth(&depth),
        )?;
        write_gray8(
            &output.depth_masks_dir.join(&rgb_name),
            &depth_validity_mask(&depth, depth_range),
        )?;

        let camera = read_camera_parameters(&camview_dir.join(&files.camview[i].name))?;
        let filepath = relative_posix_path(&[category, &scene_key, "images", &rgb_name]);
        records.push(FrameRecord::new(filepath, &camera));
    }

    Ok(records)
}

fn write_gray8(path: &Path, array: &Array2<u8>) -> Result<()> {
    let (height, width) = array.dim();
    let buffer = ImageBuffer::<Luma<u8>, Vec<u8>>::from_raw(
        width as u32,
        height as u32,
        array.iter().copied().collect(),
    )
    .ok_or_else(|| Error::invalid_array(path, "buffer does not match image size"))?;
    save_png(path, buffer)
}

fn write_gray16(path: &Path, array: &Array2<u16>) -> Result<()> {
    let (height, width) = array.dim();
    let buffer = ImageBuffer::<Luma<u16>, Vec<u16>>::from_raw(
        width as u32,
        height as u32,
        array.iter().copied().collect(),
    )
    .ok_or_else(|| Error::invalid_array(path, "buffer does not match image size"))?;
    save_png(path, buffer)
}

fn save_png(path: &Path, image: impl Into<DynamicImage>) -> Result<()> {
    image
        .into()
        .save_with_format(path, ImageFormat::Png)
        .map_err(|source| Error::Image {
            path: path.to_path_buf(),
            source,
        })
}

fn try_read_npy<T: ReadableElement>(path: &Path, bytes: &[u8]) -> Result<Option<ArrayD<T>>> {
    match ArrayD::<T>::read_npy(bytes) {
        Ok(array) => Ok(Some(array)),
        Err(ReadNpyError::WrongDescriptor(_)) => Ok(None),
        Err(source) => Err(Error::Npy {
            path: path.to_path_buf(),
            source,
        }),
    }
}

// Any numeric dtype numpy writes for depth or ids, as f64
fn read_as_f64(path: &Path, bytes: &[u8]) -> Result<Array2<f64>> {
    macro_rules! try_dtype {
        ($t:ty) => {
            if let Some(array) = try_read_npy::<$t>(path, bytes)? {
                return to_image_shape(path, array.mapv(|v| v as f64));
            }
        };
    }

    try_dtype!(f32);
    try_dtype!(f64);
    try_dtype!(i8);
    try_dtype!(i16);
    try_dtype!(i32);
    try_dtype!(i64);
    try_dtype!(u8);
    try_dtype!(u16);
    try_dtype!(u32);
    try_dtype!(u64);

    if let Some(array) = try_read_npy::<bool>(path, bytes)? {
        return to_image_shape(path, array.mapv(|v| if v { 1.0 } else { 0.0 }));
    }

    Err(Error::invalid_array(path, "unsupported dtype"))
}

// (H, W) or (H, W, 1)
fn to_image_shape<T>(path: &Path, array: ArrayD<T>) -> Result<Array2<T>> {
    let single_channel = array.ndim() == 3 && array.len_of(Axis(2)) == 1;
    let array = if single_channel {
        array.index_axis_move(Axis(2), 0)
    } else {
        array
    };
    if array.ndim() != 2 {
        return Err(Error::invalid_array(
            path,
            format!("shape {:?} is not an image", array.shape()),
        ));
    }
    array
        .into_dimensionality::<Ix2>()
        .map_err(|e| Error::invalid_array(path, e.to_string()))
}

fn read_npz_matrix(npz: &mut NpzReader<File>, path: &Path, key: &str) -> Result<Array2<f64>> {
    let name = format!("{}.npy", key);
    let npz_error = |source: ReadNpzError| Error::Npz {
        path: path.to_path_buf(),
        key: key.to_string(),
        source,
    };

    match npz.by_name::<OwnedRepr<f64>, Ix2>(&name) {
        Ok(matrix) => return Ok(matrix),
        Err(ReadNpzError::Npy(ReadNpyError::WrongDescriptor(_))) => {}
        Err(source) => return Err(npz_error(source)),
    }
    npz.by_name::<OwnedRepr<f32>, Ix2>(&name)
        .map(|matrix| matrix.mapv(f64::from))
        .map_err(npz_error)
}

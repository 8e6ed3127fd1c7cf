//! Infinigen frame file naming.
//!
//! Rendered frames are named `<data>_<cam_id>_0_<frame>_0.<ext>`, for example
//! `Image_0_0_0048_0.png` or `camview_1_0_0048_0.npz`. The frame field is four
//! zero-padded digits in well-formed output.

use regex::Regex;
use std::sync::OnceLock;

// Number of digits of a well-formed frame field
pub const FRAME_DIGITS: usize = 4;

static FRAME_NAME_PATTERN: OnceLock<Regex> = OnceLock::new();

fn frame_name_pattern() -> &'static Regex {
    FRAME_NAME_PATTERN.get_or_init(|| {
        Regex::new(r"^[^_]+_(?P<cam_id>[^_]+)_0_(?P<frame>\d+)_0\..+$")
            .expect("frame name pattern is valid")
    })
}

/// Fields decoded from a frame file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameName {
    pub camera: String,
    pub frame: u32,
    pub frame_digits: usize,
}

impl FrameName {
    /// True when the name follows the convention exactly, four-digit frame included
    pub fn is_canonical(&self) -> bool {
        self.frame_digits == FRAME_DIGITS
    }
}

/// Parse a frame file name. Returns `None` for names with any other structure.
pub fn parse_frame_name(file_name: &str) -> Option<FrameName> {
    let caps = frame_name_pattern().captures(file_name)?;
    let frame_str = caps.name("frame")?.as_str();
    let frame = frame_str.parse().ok()?;

    Some(FrameName {
        camera: caps["cam_id"].to_string(),
        frame,
        frame_digits: frame_str.len(),
    })
}

/// Camera id of a file that follows the naming convention exactly
pub fn camera_id(file_name: &str) -> Option<String> {
    parse_frame_name(file_name)
        .filter(FrameName::is_canonical)
        .map(|name| name.camera)
}

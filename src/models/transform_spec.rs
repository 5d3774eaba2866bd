//! Transform-specification value objects and the request-key parser.
//!
//! A request key is a `/`-separated path in which zero or more leading
//! segments are transform markers (`w_<int>`, `h_<int>`,
//! `c_<float>,<float>,<float>,<float>`) and the final segment is always the
//! source object's key. The full key doubles as the derivative's storage key
//! and redirect target, so it is kept verbatim.

/// Percentage-based crop rectangle, read left-to-right, top-to-bottom.
///
/// Values are nominally 0-100 but are not validated here; out-of-range
/// rectangles are resolved (and clamped or rejected) downstream against the
/// source image's actual dimensions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropSpec {
    pub x_pct: f64,
    pub y_pct: f64,
    pub width_pct: f64,
    pub height_pct: f64,
}

/// Parsed transform specification for a single request.
///
/// Immutable once built. `width`/`height` absent means the marker was not
/// present (never zero). A spec with no width, height, and crop is legal and
/// degrades to a pass-through re-encode.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformSpec {
    /// Storage key of the untransformed source: the key's final path segment.
    pub original_key: String,
    /// The full request key, used as both the derivative's storage key and
    /// the redirect target path.
    pub derived_key: String,
    /// Target width in pixels.
    pub width: Option<u32>,
    /// Target height in pixels.
    pub height: Option<u32>,
    /// Crop region in percentage units, applied before any resize.
    pub crop: Option<CropSpec>,
}

impl TransformSpec {
    /// Decode a request key into a structured spec. Total: malformed input
    /// never fails, it yields a spec with fewer (or no) parameters.
    ///
    /// Segments are matched individually, so markers may appear in any order
    /// among themselves. The final segment is the original key by
    /// construction and is never interpreted as a marker. Unrecognized or
    /// malformed leading segments are ignored, and the first occurrence of
    /// each marker kind wins.
    pub fn parse(key: &str) -> Self {
        let (marker_path, original_key) = match key.rfind('/') {
            Some(idx) => (&key[..idx], &key[idx + 1..]),
            None => ("", key),
        };

        let mut width = None;
        let mut height = None;
        let mut crop = None;
        for segment in marker_path.split('/').filter(|s| !s.is_empty()) {
            if let Some(value) = parse_dimension(segment, "w_") {
                width.get_or_insert(value);
            } else if let Some(value) = parse_dimension(segment, "h_") {
                height.get_or_insert(value);
            } else if let Some(value) = parse_crop(segment) {
                crop.get_or_insert(value);
            }
        }

        Self {
            original_key: original_key.to_string(),
            derived_key: key.to_string(),
            width,
            height,
            crop,
        }
    }

    /// True when the spec carries no actionable parameters and the pipeline
    /// reduces to fetch + re-encode.
    pub fn is_passthrough(&self) -> bool {
        self.width.is_none() && self.height.is_none() && self.crop.is_none()
    }
}

/// Match a `w_<int>`/`h_<int>` segment. Only base-10 digits after the marker
/// qualify, and zero is rejected (dimensions are strictly positive).
fn parse_dimension(segment: &str, marker: &str) -> Option<u32> {
    let digits = segment.strip_prefix(marker)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u32>().ok().filter(|value| *value > 0)
}

/// Match a `c_x,y,w,h` segment: exactly four comma-separated numeric tokens,
/// mapped positionally. Values stay as floats, unclamped.
fn parse_crop(segment: &str) -> Option<CropSpec> {
    let body = segment.strip_prefix("c_")?;
    let mut values = [0.0f64; 4];
    let mut count = 0;
    for token in body.split(',') {
        if count == 4 {
            return None;
        }
        values[count] = token.trim().parse().ok()?;
        count += 1;
    }
    if count != 4 {
        return None;
    }
    Some(CropSpec {
        x_pct: values[0],
        y_pct: values[1],
        width_pct: values[2],
        height_pct: values[3],
    })
}

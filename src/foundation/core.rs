use crate::foundation::error::{CaptureError, CaptureResult};

/// Encoder-side dimension alignment in pixels.
pub const DIM_ALIGN: u32 = 8;

/// Bytes per RGBA8 pixel.
pub const BYTES_PER_PIXEL: usize = 4;

/// Round `dim` to the nearest multiple of [`DIM_ALIGN`] (halves round up), never below one block.
pub fn normalize_dim(dim: u32) -> u32 {
    let blocks = dim.saturating_add(DIM_ALIGN / 2) / DIM_ALIGN;
    blocks.max(1) * DIM_ALIGN
}

/// Frame dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Resolution {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Resolution {
    /// Create a validated, non-empty resolution.
    pub fn new(width: u32, height: u32) -> CaptureResult<Self> {
        if width == 0 || height == 0 {
            return Err(CaptureError::validation(
                "resolution width/height must be non-zero",
            ));
        }
        Ok(Self { width, height })
    }

    /// Both dimensions rounded with [`normalize_dim`].
    pub fn normalized(self) -> Self {
        Self {
            width: normalize_dim(self.width),
            height: normalize_dim(self.height),
        }
    }

    /// Return `true` when both dimensions are already aligned.
    pub fn is_normalized(self) -> bool {
        self.width.is_multiple_of(DIM_ALIGN) && self.height.is_multiple_of(DIM_ALIGN)
    }

    /// Size of one tightly packed RGBA8 frame.
    pub fn frame_bytes(self) -> usize {
        (self.width as usize)
            .saturating_mul(self.height as usize)
            .saturating_mul(BYTES_PER_PIXEL)
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A straight-alpha RGBA8 image, tightly packed, row-major, top row first.
///
/// Used both for engine render targets and for extracted frames. Targets are plain owned values:
/// dropping one releases it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRGBA {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGBA8 bytes, `width * height * 4` long.
    pub data: Vec<u8>,
}

impl FrameRGBA {
    /// Allocate a transparent black frame.
    pub fn new(size: Resolution) -> Self {
        Self {
            width: size.width,
            height: size.height,
            data: vec![0u8; size.frame_bytes()],
        }
    }

    /// Wrap existing pixel bytes, checking the length against the dimensions.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> CaptureResult<Self> {
        let size = Resolution::new(width, height)?;
        if data.len() != size.frame_bytes() {
            return Err(CaptureError::validation(format!(
                "frame data is {} bytes, expected {} for {size}",
                data.len(),
                size.frame_bytes()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Frame dimensions.
    pub fn size(&self) -> Resolution {
        Resolution {
            width: self.width,
            height: self.height,
        }
    }

    /// Pixel at `(x, y)`, with `y = 0` the top row.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        let px = self.data.get(i..i + BYTES_PER_PIXEL)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_rounds_to_nearest_multiple_of_eight() {
        assert_eq!(normalize_dim(642), 640);
        assert_eq!(normalize_dim(478), 480);
        assert_eq!(normalize_dim(640), 640);
        assert_eq!(normalize_dim(1283), 1280);
        assert_eq!(normalize_dim(1284), 1288);
        assert_eq!(normalize_dim(1), 8);
        assert_eq!(normalize_dim(0), 8);
    }

    #[test]
    fn normalize_matches_rounded_division_for_all_small_sizes() {
        for d in 4..4096u32 {
            let expected = ((f64::from(d) / 8.0).round() as u32) * 8;
            assert_eq!(normalize_dim(d), expected, "dim {d}");
        }
    }

    #[test]
    fn normalized_resolution_is_aligned() {
        let r = Resolution::new(642, 478).unwrap().normalized();
        assert_eq!(r, Resolution::new(640, 480).unwrap());
        assert!(r.is_normalized());
        assert_eq!(r.frame_bytes(), 640 * 480 * 4);
        assert_eq!(r.to_string(), "640x480");
    }

    #[test]
    fn zero_resolution_is_rejected() {
        assert!(Resolution::new(0, 10).is_err());
        assert!(Resolution::new(10, 0).is_err());
    }

    #[test]
    fn from_raw_checks_length() {
        assert!(FrameRGBA::from_raw(2, 2, vec![0; 16]).is_ok());
        assert!(FrameRGBA::from_raw(2, 2, vec![0; 15]).is_err());
    }

    #[test]
    fn pixel_addresses_top_row_first() {
        let mut f = FrameRGBA::new(Resolution::new(2, 2).unwrap());
        f.data[8..12].copy_from_slice(&[1, 2, 3, 4]);
        assert_eq!(f.pixel(0, 1), Some([1, 2, 3, 4]));
        assert_eq!(f.pixel(2, 0), None);
    }
}

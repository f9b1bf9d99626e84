//! Uploaded still image.

use anyhow::{anyhow, Result};
use zeroize::Zeroize;

use super::{synthetic_pixels, FrameSource, ReadyState};
use crate::frame::{Frame, Size};

/// A decoded still image. Every capture yields a fresh copy of the same pixels.
pub struct StillImage {
    name: String,
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl StillImage {
    pub fn from_rgb(name: impl Into<String>, data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!("image dimensions must be non-zero"));
        }
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(anyhow!(
                "image expects {} RGB bytes, received {}",
                expected,
                data.len()
            ));
        }
        Ok(Self {
            name: name.into(),
            data,
            width,
            height,
        })
    }

    /// Synthetic image for `stub://` uploads.
    pub fn synthetic(width: u32, height: u32, scene: u8) -> Self {
        Self {
            name: format!("stub://image/{}", scene),
            data: synthetic_pixels(width.max(1), height.max(1), 0, scene),
            width: width.max(1),
            height: height.max(1),
        }
    }
}

impl FrameSource for StillImage {
    fn name(&self) -> &str {
        &self.name
    }

    fn ready_state(&self) -> ReadyState {
        ReadyState::HaveEnoughData
    }

    fn natural_size(&self) -> Option<Size> {
        Some(Size::from_pixels(self.width, self.height))
    }

    fn capture(&mut self) -> Result<Frame> {
        Frame::from_rgb(self.data.clone(), self.width, self.height)
    }
}

impl Drop for StillImage {
    fn drop(&mut self) {
        self.data.zeroize();
    }
}

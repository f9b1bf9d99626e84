//! Input sources.
//!
//! A session reads frames from exactly one `InputSource` at a time:
//! - `Live`: a camera-like stream that is either ready to capture or not
//! - `UploadVideo`: an uploaded clip with play/pause and buffering state
//! - `UploadImage`: a single uploaded still frame
//!
//! Device acquisition and media decoding are external. The concrete sources
//! in this module only implement the synthetic `stub://` backends.
//!
//! Readiness is resolved once per tick through `InputSource::is_ready`; callers
//! never inspect the variant to decide whether a frame can be read.

pub mod clip;
pub mod live;
pub mod still;

use anyhow::Result;

use crate::frame::{Frame, Size};

pub use clip::{ClipConfig, ClipSource};
pub use live::{LiveConfig, LiveSource};
pub use still::StillImage;

/// Media readiness, mirroring the usual media element ladder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadyState {
    HaveNothing,
    HaveMetadata,
    HaveCurrentData,
    HaveFutureData,
    HaveEnoughData,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Live,
    Upload,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    Video,
    Image,
}

/// Capability interface shared by every frame-producing source.
pub trait FrameSource: Send {
    fn name(&self) -> &str;

    fn ready_state(&self) -> ReadyState;

    /// Natural pixel dimensions, once metadata is known.
    fn natural_size(&self) -> Option<Size>;

    /// Read the current frame.
    fn capture(&mut self) -> Result<Frame>;
}

/// Extra state exposed by uploaded video.
pub trait VideoPlayback: FrameSource {
    fn is_playing(&self) -> bool;

    fn is_ended(&self) -> bool;

    fn play(&mut self);

    fn pause(&mut self);
}

pub enum InputSource {
    Live(Box<dyn FrameSource>),
    UploadVideo(Box<dyn VideoPlayback>),
    UploadImage(StillImage),
}

impl InputSource {
    pub fn live<S: FrameSource + 'static>(source: S) -> Self {
        Self::Live(Box::new(source))
    }

    pub fn video<V: VideoPlayback + 'static>(video: V) -> Self {
        Self::UploadVideo(Box::new(video))
    }

    pub fn image(image: StillImage) -> Self {
        Self::UploadImage(image)
    }

    pub fn mode(&self) -> Mode {
        match self {
            Self::Live(_) => Mode::Live,
            Self::UploadVideo(_) | Self::UploadImage(_) => Mode::Upload,
        }
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            Self::Live(_) | Self::UploadVideo(_) => SourceKind::Video,
            Self::UploadImage(_) => SourceKind::Image,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Live(source) => source.name(),
            Self::UploadVideo(video) => video.name(),
            Self::UploadImage(image) => image.name(),
        }
    }

    /// Whether a usable frame can be read right now.
    ///
    /// Live streams must report `HaveEnoughData`. Uploaded video must be
    /// playing, not ended, and buffered to at least `HaveCurrentData`.
    /// A mounted image is always usable.
    pub fn is_ready(&self) -> bool {
        match self {
            Self::Live(source) => source.ready_state() >= ReadyState::HaveEnoughData,
            Self::UploadVideo(video) => {
                video.is_playing()
                    && !video.is_ended()
                    && video.ready_state() >= ReadyState::HaveCurrentData
            }
            Self::UploadImage(image) => image.ready_state() >= ReadyState::HaveCurrentData,
        }
    }

    pub fn natural_size(&self) -> Option<Size> {
        let size = match self {
            Self::Live(source) => source.natural_size(),
            Self::UploadVideo(video) => video.natural_size(),
            Self::UploadImage(image) => image.natural_size(),
        };
        size.filter(Size::is_laid_out)
    }

    pub fn capture(&mut self) -> Result<Frame> {
        match self {
            Self::Live(source) => source.capture(),
            Self::UploadVideo(video) => video.capture(),
            Self::UploadImage(image) => image.capture(),
        }
    }

    /// Playback control for uploaded video. No-op for other variants.
    pub fn set_playing(&mut self, playing: bool) {
        if let Self::UploadVideo(video) = self {
            if playing {
                video.play();
            } else {
                video.pause();
            }
        }
    }
}

/// Deterministic synthetic RGB pattern used by the `stub://` sources.
///
/// Each scene paints one bright rectangle over a gradient so that stub
/// models have something content-dependent to look at.
pub(crate) fn synthetic_pixels(width: u32, height: u32, frame_index: u64, scene: u8) -> Vec<u8> {
    let (w, h) = (width as usize, height as usize);
    let mut pixels = vec![0u8; w * h * 3];
    let rect_w = (w / 4).max(1);
    let rect_h = (h / 4).max(1);
    let rect_x = (scene as usize * 37) % w.saturating_sub(rect_w).max(1);
    let rect_y = (scene as usize * 23) % h.saturating_sub(rect_h).max(1);
    for y in 0..h {
        for x in 0..w {
            let idx = (y * w + x) * 3;
            let inside = x >= rect_x && x < rect_x + rect_w && y >= rect_y && y < rect_y + rect_h;
            if inside {
                pixels[idx] = 250;
                pixels[idx + 1] = scene.wrapping_mul(40);
                pixels[idx + 2] = 30;
            } else {
                let base = ((x + y) as u64 + frame_index % 4) % 64;
                pixels[idx] = base as u8;
                pixels[idx + 1] = base as u8;
                pixels[idx + 2] = (base as u8).wrapping_add(scene);
            }
        }
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn still_image_is_always_ready() {
        let source = InputSource::image(StillImage::synthetic(32, 24, 1));
        assert_eq!(source.mode(), Mode::Upload);
        assert_eq!(source.kind(), SourceKind::Image);
        assert!(source.is_ready());
        assert_eq!(source.natural_size(), Some(Size::new(32.0, 24.0)));
    }

    #[test]
    fn live_source_requires_connection() {
        let mut live = LiveSource::new(LiveConfig {
            url: "stub://camera".into(),
            width: 32,
            height: 24,
        })
        .unwrap();
        assert_eq!(live.ready_state(), ReadyState::HaveNothing);
        live.connect().unwrap();
        let source = InputSource::live(live);
        assert_eq!(source.mode(), Mode::Live);
        assert!(source.is_ready());
    }

    #[test]
    fn paused_video_is_not_ready() {
        let clip = ClipSource::new(ClipConfig {
            path: "stub://clip".into(),
            frame_count: 4,
            width: 16,
            height: 16,
            looping: true,
        })
        .unwrap();
        let mut source = InputSource::video(clip);
        assert!(!source.is_ready());
        source.set_playing(true);
        assert!(source.is_ready());
        source.set_playing(false);
        assert!(!source.is_ready());
    }

    #[test]
    fn synthetic_pixels_change_with_scene() {
        let a = synthetic_pixels(16, 16, 0, 0);
        let b = synthetic_pixels(16, 16, 0, 1);
        assert_eq!(a.len(), 16 * 16 * 3);
        assert_ne!(a, b);
    }
}

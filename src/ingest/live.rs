//! Live camera-like source.
//!
//! Only the synthetic `stub://` backend is provided here; device capture is
//! handled outside this crate and plugs in through `FrameSource`.

use anyhow::{anyhow, bail, Result};

use super::{synthetic_pixels, FrameSource, ReadyState};
use crate::frame::{Frame, Size};

/// Frames between synthetic scene changes.
const SCENE_PERIOD: u64 = 50;

#[derive(Clone, Debug)]
pub struct LiveConfig {
    /// Stream URL. Only `stub://...` is understood by this crate.
    pub url: String,
    pub width: u32,
    pub height: u32,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            url: "stub://camera".to_string(),
            width: 640,
            height: 480,
        }
    }
}

pub struct LiveSource {
    backend: LiveBackend,
}

enum LiveBackend {
    Synthetic(SyntheticCamera),
}

impl LiveSource {
    pub fn new(config: LiveConfig) -> Result<Self> {
        if !config.url.starts_with("stub://") {
            bail!("live source '{}' requires an external capture backend", config.url);
        }
        if config.width == 0 || config.height == 0 {
            return Err(anyhow!("live source dimensions must be non-zero"));
        }
        Ok(Self {
            backend: LiveBackend::Synthetic(SyntheticCamera::new(config)),
        })
    }

    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            LiveBackend::Synthetic(camera) => camera.connect(),
        }
    }

    pub fn disconnect(&mut self) {
        match &mut self.backend {
            LiveBackend::Synthetic(camera) => camera.connected = false,
        }
    }

    pub fn stats(&self) -> LiveStats {
        match &self.backend {
            LiveBackend::Synthetic(camera) => LiveStats {
                frames_captured: camera.frame_count,
                url: camera.config.url.clone(),
            },
        }
    }
}

impl FrameSource for LiveSource {
    fn name(&self) -> &str {
        match &self.backend {
            LiveBackend::Synthetic(camera) => &camera.config.url,
        }
    }

    fn ready_state(&self) -> ReadyState {
        match &self.backend {
            LiveBackend::Synthetic(camera) if camera.connected => ReadyState::HaveEnoughData,
            LiveBackend::Synthetic(_) => ReadyState::HaveNothing,
        }
    }

    fn natural_size(&self) -> Option<Size> {
        match &self.backend {
            LiveBackend::Synthetic(camera) if camera.connected => Some(Size::from_pixels(
                camera.config.width,
                camera.config.height,
            )),
            LiveBackend::Synthetic(_) => None,
        }
    }

    fn capture(&mut self) -> Result<Frame> {
        match &mut self.backend {
            LiveBackend::Synthetic(camera) => camera.next_frame(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct LiveStats {
    pub frames_captured: u64,
    pub url: String,
}

struct SyntheticCamera {
    config: LiveConfig,
    connected: bool,
    frame_count: u64,
    scene_state: u8,
}

impl SyntheticCamera {
    fn new(config: LiveConfig) -> Self {
        Self {
            config,
            connected: false,
            frame_count: 0,
            scene_state: 0,
        }
    }

    fn connect(&mut self) -> Result<()> {
        log::info!("LiveSource: connected to {} (synthetic)", self.config.url);
        self.connected = true;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        if !self.connected {
            bail!("live source {} is not connected", self.config.url);
        }
        self.frame_count += 1;
        if self.frame_count.is_multiple_of(SCENE_PERIOD) {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let pixels = synthetic_pixels(
            self.config.width,
            self.config.height,
            self.frame_count,
            self.scene_state,
        );
        Frame::from_rgb(pixels, self.config.width, self.config.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_stub_urls() {
        let config = LiveConfig {
            url: "rtsp://10.0.0.2/stream".into(),
            ..LiveConfig::default()
        };
        assert!(LiveSource::new(config).is_err());
    }

    #[test]
    fn capture_requires_connection_and_counts_frames() {
        let mut live = LiveSource::new(LiveConfig {
            url: "stub://cam".into(),
            width: 8,
            height: 8,
        })
        .unwrap();
        assert!(live.capture().is_err());
        assert!(live.natural_size().is_none());

        live.connect().unwrap();
        let frame = live.capture().unwrap();
        assert_eq!((frame.width, frame.height), (8, 8));
        assert_eq!(live.stats().frames_captured, 1);

        live.disconnect();
        assert_eq!(live.ready_state(), ReadyState::HaveNothing);
    }
}

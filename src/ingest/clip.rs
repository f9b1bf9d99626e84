//! Uploaded video clip source.
//!
//! The synthetic backend (`stub://` paths) pre-renders a short sequence of
//! frames and plays it back, looping or stopping at the end. Decoding real
//! files is left to an external `VideoPlayback` implementation.

use anyhow::{anyhow, bail, Result};

use super::{synthetic_pixels, FrameSource, ReadyState, VideoPlayback};
use crate::frame::{Frame, Size};

#[derive(Clone, Debug)]
pub struct ClipConfig {
    pub path: String,
    pub frame_count: usize,
    pub width: u32,
    pub height: u32,
    pub looping: bool,
}

impl Default for ClipConfig {
    fn default() -> Self {
        Self {
            path: "stub://clip".to_string(),
            frame_count: 48,
            width: 640,
            height: 480,
            looping: true,
        }
    }
}

pub struct ClipSource {
    config: ClipConfig,
    frames: Vec<Vec<u8>>,
    position: usize,
    playing: bool,
    ended: bool,
    buffered: ReadyState,
}

impl ClipSource {
    /// Mount a clip. Playback starts paused, like a freshly loaded element.
    pub fn new(config: ClipConfig) -> Result<Self> {
        if !config.path.starts_with("stub://") {
            bail!("clip '{}' requires an external decoder", config.path);
        }
        if config.frame_count == 0 {
            return Err(anyhow!("clip must contain at least one frame"));
        }
        if config.width == 0 || config.height == 0 {
            return Err(anyhow!("clip dimensions must be non-zero"));
        }
        let frames = (0..config.frame_count)
            .map(|i| synthetic_pixels(config.width, config.height, i as u64, (i / 12) as u8))
            .collect();
        log::info!(
            "ClipSource: mounted {} ({} frames, looping={})",
            config.path,
            config.frame_count,
            config.looping
        );
        Ok(Self {
            config,
            frames,
            position: 0,
            playing: false,
            ended: false,
            buffered: ReadyState::HaveEnoughData,
        })
    }

    /// Simulate network buffering state.
    pub fn set_buffered(&mut self, state: ReadyState) {
        self.buffered = state;
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Seek to a frame index and clear the ended flag.
    pub fn seek(&mut self, position: usize) {
        self.position = position % self.frames.len();
        self.ended = false;
    }
}

impl FrameSource for ClipSource {
    fn name(&self) -> &str {
        &self.config.path
    }

    fn ready_state(&self) -> ReadyState {
        self.buffered
    }

    fn natural_size(&self) -> Option<Size> {
        (self.buffered >= ReadyState::HaveMetadata)
            .then(|| Size::from_pixels(self.config.width, self.config.height))
    }

    /// Read the current frame and advance the playhead.
    fn capture(&mut self) -> Result<Frame> {
        if self.ended {
            bail!("clip {} has ended", self.config.path);
        }
        let pixels = self.frames[self.position].clone();
        let frame = Frame::from_rgb(pixels, self.config.width, self.config.height)?;
        self.position += 1;
        if self.position == self.frames.len() {
            if self.config.looping {
                self.position = 0;
            } else {
                self.position -= 1;
                self.ended = true;
                self.playing = false;
            }
        }
        Ok(frame)
    }
}

impl VideoPlayback for ClipSource {
    fn is_playing(&self) -> bool {
        self.playing
    }

    fn is_ended(&self) -> bool {
        self.ended
    }

    fn play(&mut self) {
        if self.ended {
            self.seek(0);
        }
        self.playing = true;
    }

    fn pause(&mut self) {
        self.playing = false;
    }
}

//! Model-space to display-space box mapping.
//!
//! The source is drawn with "cover" fit: scaled uniformly until it fills the
//! container on both axes, centred, overflow cropped. Boxes are then clamped
//! so they stay at least `margin` pixels inside the container.

use serde::Serialize;

use crate::config::OverlaySettings;
use crate::detect::{BoundingBox, Detection};
use crate::error::LensError;
use crate::frame::Size;

/// Display-space placement of one detection. Recomputed every render.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct DisplayBox {
    pub left: f32,
    pub top: f32,
    /// Scaled width, capped at `max_width`.
    pub width: f32,
    /// Scaled height, capped at `max_height`.
    pub height: f32,
    pub max_width: f32,
    pub max_height: f32,
    /// `false` when the box hugs the container top and its label goes inside.
    pub label_above: bool,
}

/// Cover-fit transform between a source and its container.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoverFit {
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl CoverFit {
    pub fn new(source: Size, container: Size) -> Result<Self, LensError> {
        if !source.is_laid_out() {
            return Err(LensError::GeometryUnavailable("source dimensions"));
        }
        if !container.is_laid_out() {
            return Err(LensError::GeometryUnavailable("container dimensions"));
        }
        let scale = (container.width / source.width).max(container.height / source.height);
        let displayed_width = source.width * scale;
        let displayed_height = source.height * scale;
        Ok(Self {
            scale,
            offset_x: (container.width - displayed_width) / 2.0,
            offset_y: (container.height - displayed_height) / 2.0,
        })
    }

    /// Unclamped display-space box.
    pub fn project(&self, bbox: &BoundingBox) -> BoundingBox {
        BoundingBox::new(
            bbox.x * self.scale + self.offset_x,
            bbox.y * self.scale + self.offset_y,
            bbox.width * self.scale,
            bbox.height * self.scale,
        )
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct CoordinateMapper {
    settings: OverlaySettings,
}

impl CoordinateMapper {
    pub fn new(settings: OverlaySettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> OverlaySettings {
        self.settings
    }

    /// Map a model-space box into the container.
    ///
    /// Returns `GeometryUnavailable` when either size is missing or the
    /// container leaves no room inside the margins. Callers skip the box for
    /// this frame only.
    pub fn map(
        &self,
        bbox: &BoundingBox,
        source: Size,
        container: Size,
    ) -> Result<DisplayBox, LensError> {
        let margin = self.settings.margin;
        if container.is_laid_out()
            && (container.width <= 2.0 * margin || container.height <= 2.0 * margin)
        {
            return Err(LensError::GeometryUnavailable("container smaller than margins"));
        }
        let fit = CoverFit::new(source, container)?;
        let raw = fit.project(bbox);
        if ![raw.x, raw.y, raw.width, raw.height]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(LensError::GeometryUnavailable("non-finite box"));
        }

        let width = raw.width.max(0.0);
        let height = raw.height.max(0.0);
        let left = clamp_edge(raw.x, margin, container.width - width - margin);
        let top = clamp_edge(raw.y, margin, container.height - height - margin);
        let max_width = (container.width - left - margin).max(0.0);
        let max_height = (container.height - top - margin).max(0.0);

        Ok(DisplayBox {
            left,
            top,
            width: width.min(max_width),
            height: height.min(max_height),
            max_width,
            max_height,
            label_above: top >= self.settings.label_threshold,
        })
    }

    pub fn map_detection(
        &self,
        detection: &Detection,
        source: Size,
        container: Size,
    ) -> Result<DisplayBox, LensError> {
        self.map(&detection.bbox, source, container)
    }
}

/// `max(lo, min(value, hi))`: when the box is too big to fit, the low edge wins.
fn clamp_edge(value: f32, lo: f32, hi: f32) -> f32 {
    lo.max(value.min(hi))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cover_fit_crops_the_overflowing_axis() {
        let fit = CoverFit::new(Size::new(640.0, 480.0), Size::new(800.0, 450.0)).unwrap();
        assert_eq!(fit.scale, 1.25);
        assert_eq!(fit.offset_x, 0.0);
        assert_eq!(fit.offset_y, -75.0);
    }

    #[test]
    fn missing_geometry_is_unmappable() {
        let mapper = CoordinateMapper::default();
        let bbox = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        assert!(matches!(
            mapper.map(&bbox, Size::default(), Size::new(800.0, 450.0)),
            Err(LensError::GeometryUnavailable(_))
        ));
        assert!(matches!(
            mapper.map(&bbox, Size::new(640.0, 480.0), Size::new(0.0, 450.0)),
            Err(LensError::GeometryUnavailable(_))
        ));
        assert!(matches!(
            mapper.map(&bbox, Size::new(640.0, 480.0), Size::new(15.0, 450.0)),
            Err(LensError::GeometryUnavailable(_))
        ));
    }

    #[test]
    fn box_near_top_puts_label_inside() {
        let mapper = CoordinateMapper::default();
        let source = Size::new(100.0, 100.0);
        let container = Size::new(100.0, 100.0);
        let near_top = mapper
            .map(&BoundingBox::new(20.0, 0.0, 10.0, 10.0), source, container)
            .unwrap();
        assert_eq!(near_top.top, 10.0);
        assert!(!near_top.label_above);

        let lower = mapper
            .map(&BoundingBox::new(20.0, 50.0, 10.0, 10.0), source, container)
            .unwrap();
        assert!(lower.label_above);
    }

    #[test]
    fn oversized_box_is_pinned_and_capped() {
        let mapper = CoordinateMapper::default();
        let out = mapper
            .map(
                &BoundingBox::new(-50.0, -50.0, 500.0, 500.0),
                Size::new(100.0, 100.0),
                Size::new(200.0, 200.0),
            )
            .unwrap();
        assert_eq!(out.left, 10.0);
        assert_eq!(out.top, 10.0);
        assert_eq!(out.max_width, 180.0);
        assert_eq!(out.width, 180.0);
        assert_eq!(out.height, 180.0);
    }
}

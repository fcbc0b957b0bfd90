//! Overlay compositing instructions.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use reelkit_common::error::{ReelkitError, ReelkitResult};

/// Placement of an overlay in source-frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlayRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// An image composited over every exported frame.
///
/// Owned by the caller; the export pipeline only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayDescriptor {
    /// Rasterized overlay image (PNG or anything the encoder can read).
    pub image: PathBuf,

    /// Target rectangle before scaling.
    pub rect: OverlayRect,

    /// Rasterization scale applied to the rectangle size.
    pub scale: f64,
}

impl OverlayDescriptor {
    pub fn new(image: impl Into<PathBuf>, rect: OverlayRect) -> Self {
        Self {
            image: image.into(),
            rect,
            scale: 1.0,
        }
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Rendered size in whole pixels, never below 1x1.
    pub fn scaled_size(&self) -> (u32, u32) {
        let w = (self.rect.width * self.scale).round().max(1.0) as u32;
        let h = (self.rect.height * self.scale).round().max(1.0) as u32;
        (w, h)
    }

    /// Reject degenerate geometry before any work is scheduled.
    pub fn validate(&self) -> ReelkitResult<()> {
        let r = &self.rect;
        let finite = [r.x, r.y, r.width, r.height, self.scale]
            .iter()
            .all(|v| v.is_finite());
        if !finite || r.width <= 0.0 || r.height <= 0.0 || self.scale <= 0.0 {
            return Err(ReelkitError::configuration(format!(
                "invalid overlay geometry {}x{} at ({}, {}) scale {}",
                r.width, r.height, r.x, r.y, self.scale
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn watermark() -> OverlayDescriptor {
        OverlayDescriptor::new(
            "/tmp/long_story_watermark.png",
            OverlayRect {
                x: 0.0,
                y: 0.0,
                width: 200.0,
                height: 100.0,
            },
        )
    }

    #[test]
    fn test_scaled_size() {
        assert_eq!(watermark().scaled_size(), (200, 100));
        assert_eq!(watermark().with_scale(2.0).scaled_size(), (400, 200));
    }

    #[test]
    fn test_validate_rejects_degenerate_geometry() {
        assert!(watermark().validate().is_ok());
        assert!(watermark().with_scale(0.0).validate().is_err());

        let mut flat = watermark();
        flat.rect.height = 0.0;
        assert!(flat.validate().is_err());
    }
}

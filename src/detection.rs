use serde_derive::{Deserialize, Serialize};

use crate::bbox::{BBox, Ltrb};
use crate::error::Error;

/// One detector output box in pixel coordinates (top-left origin), with the
/// same coordinate system as zone polygons and count lines.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub bbox: BBox<Ltrb>,
    #[serde(rename = "p")]
    pub confidence: f32,
    #[serde(rename = "c", default)]
    pub class: Option<u32>,
}

impl Detection {
    #[inline]
    pub fn new(bbox: BBox<Ltrb>, confidence: f32, class: Option<u32>) -> Self {
        Self {
            bbox,
            confidence,
            class,
        }
    }

    #[inline]
    pub fn ltrb(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32, class: Option<u32>) -> Self {
        Self::new(BBox::ltrb(x1, y1, x2, y2), confidence, class)
    }

    /// Returns a detection safe to feed into cost computation.
    ///
    /// Inverted corners are swapped and the score is clamped into `[0, 1]`.
    /// Non-finite values and boxes with no area are rejected.
    pub fn sanitize(&self) -> Result<Detection, Error> {
        if !self.bbox.is_finite() {
            return Err(Error::InvalidDetection(format!(
                "non-finite box {:?}",
                self.bbox.as_slice()
            )));
        }

        if !self.confidence.is_finite() {
            return Err(Error::InvalidDetection(format!(
                "non-finite score {}",
                self.confidence
            )));
        }

        let bbox = self.bbox.normalized();
        if bbox.width() <= 0.0 || bbox.height() <= 0.0 {
            return Err(Error::InvalidDetection(format!(
                "empty box {:?}",
                self.bbox.as_slice()
            )));
        }

        Ok(Detection {
            bbox,
            confidence: self.confidence.clamp(0.0, 1.0),
            class: self.class,
        })
    }
}

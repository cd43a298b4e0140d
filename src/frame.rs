use serde_derive::{Deserialize, Serialize};

use crate::detection::Detection;

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Frame {
    #[serde(default)]
    pub index: u64,
    // (width, height) in px, (0, 0) when unknown
    #[serde(default)]
    pub dims: (u32, u32),
    pub detections: Vec<Detection>,
}

impl Frame {
    pub fn new(index: u64, detections: Vec<Detection>) -> Self {
        Self {
            index,
            dims: (0, 0),
            detections,
        }
    }

    #[inline]
    pub fn with_dims(mut self, width: u32, height: u32) -> Self {
        self.dims = (width, height);
        self
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.detections.len()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Detection> {
        self.detections.iter()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    /// Detections clipped to the frame bounds when the dimensions are known.
    pub fn clipped_detections(&self) -> Vec<Detection> {
        let (w, h) = self.dims;
        if w == 0 || h == 0 {
            return self.detections.clone();
        }

        self.iter()
            .map(|d| Detection {
                bbox: d.bbox.normalized().clipped(w as f32, h as f32),
                ..*d
            })
            .collect()
    }
}

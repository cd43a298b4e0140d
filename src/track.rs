use nalgebra as na;
use serde_derive::Serialize;

use crate::bbox::{BBox, Ltrb};

/// Immutable per-cycle view of a live track.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Track {
    pub track_id: u32,
    pub bbox: BBox<Ltrb>,
    pub class: Option<u32>,
    pub confidence: f32,
    pub age: u32,
    pub hits: u32,
    pub time_since_update: u32,
    pub confirmed: bool,

    // bbox centers, oldest first
    pub history: Vec<na::Point2<f32>>,
}

impl Track {
    #[inline]
    pub fn center(&self) -> na::Point2<f32> {
        self.bbox.center()
    }
}

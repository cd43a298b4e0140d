use std::collections::{BTreeMap, HashSet};

use nalgebra as na;
use serde_derive::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ZoneConfig;
use crate::error::{Error, Result};
use crate::geometry::point_in_polygon;
use crate::Track;

/// Named polygonal region, implicitly closed.
#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    name: String,
    polygon: Vec<na::Point2<f32>>,
}

impl Zone {
    pub fn new<S: Into<String>>(name: S, polygon: Vec<na::Point2<f32>>) -> Result<Self> {
        let name = name.into();

        if polygon.len() < 3 {
            return Err(Error::EmptyPolygon {
                name,
                points: polygon.len(),
            });
        }

        Ok(Self { name, polygon })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn polygon(&self) -> &[na::Point2<f32>] {
        &self.polygon
    }

    #[inline]
    pub fn contains(&self, point: &na::Point2<f32>) -> bool {
        point_in_polygon(point, &self.polygon)
    }
}

impl TryFrom<&ZoneConfig> for Zone {
    type Error = Error;

    fn try_from(cfg: &ZoneConfig) -> Result<Self> {
        Zone::new(
            cfg.name.clone(),
            cfg.polygon
                .iter()
                .map(|[x, y]| na::Point2::new(*x, *y))
                .collect(),
        )
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ZoneCount {
    pub present: usize,
    pub unique: u64,
}

#[derive(Debug, Default)]
struct ZoneState {
    present: HashSet<u32>,
    unique: u64,
}

/// Per-zone occupancy and entry counting.
///
/// `present` is rebuilt every cycle from the track centers. `unique` grows by
/// one each time a track id shows up inside a zone it was not in on the
/// previous cycle, so leaving and coming back counts twice.
#[derive(Debug)]
pub struct ZoneCounter {
    zones: Vec<(Zone, ZoneState)>,
}

impl ZoneCounter {
    pub fn new(zones: Vec<Zone>) -> Self {
        Self {
            zones: zones
                .into_iter()
                .map(|z| (z, ZoneState::default()))
                .collect(),
        }
    }

    pub fn zones(&self) -> impl Iterator<Item = &Zone> {
        self.zones.iter().map(|(z, _)| z)
    }

    pub fn update(&mut self, tracks: &[Track]) {
        for (zone, state) in &mut self.zones {
            let current: HashSet<u32> = tracks
                .iter()
                .filter(|t| zone.contains(&t.center()))
                .map(|t| t.track_id)
                .collect();

            for id in current.difference(&state.present) {
                state.unique += 1;
                debug!(zone = zone.name(), track_id = *id, "zone entry");
            }

            state.present = current;
        }
    }

    pub fn count(&self, name: &str) -> Option<ZoneCount> {
        self.zones
            .iter()
            .find(|(z, _)| z.name() == name)
            .map(|(_, s)| ZoneCount {
                present: s.present.len(),
                unique: s.unique,
            })
    }

    pub fn is_present(&self, name: &str, track_id: u32) -> bool {
        self.zones
            .iter()
            .any(|(z, s)| z.name() == name && s.present.contains(&track_id))
    }

    pub fn snapshot(&self) -> BTreeMap<String, ZoneCount> {
        self.zones
            .iter()
            .map(|(z, s)| {
                (
                    z.name().to_string(),
                    ZoneCount {
                        present: s.present.len(),
                        unique: s.unique,
                    },
                )
            })
            .collect()
    }
}

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_derive::Serialize;
use tracing::trace;

use crate::config::SceneConfig;
use crate::error::Result;
use crate::line::{CountLine, LineCount, LineCounter};
use crate::tracker::IouTracker;
use crate::zone::{Zone, ZoneCount, ZoneCounter};
use crate::{Frame, Track};

/// Everything downstream consumers get out of one cycle.
#[derive(Serialize, Debug, Clone)]
pub struct SceneSnapshot {
    pub frame: u64,
    pub tracks: Arc<[Track]>,
    pub zones: BTreeMap<String, ZoneCount>,
    pub lines: BTreeMap<String, LineCount>,
}

/// One video stream: tracker plus the zone and line analytics fed by it.
///
/// A scene shares no state with any other scene, so independent streams can run
/// on separate threads as long as each scene is owned by a single worker.
#[derive(Debug)]
pub struct Scene {
    tracker: IouTracker,
    zones: ZoneCounter,
    lines: LineCounter,
    last: Arc<[Track]>,
    frame: u64,
}

impl Scene {
    pub fn new(tracker: IouTracker, zones: Vec<Zone>, lines: Vec<CountLine>) -> Self {
        Self {
            tracker,
            zones: ZoneCounter::new(zones),
            lines: LineCounter::new(lines),
            last: Arc::new([]),
            frame: 0,
        }
    }

    pub fn from_config(config: &SceneConfig) -> Result<Self> {
        config.validate()?;

        let zones = config
            .zones
            .iter()
            .map(Zone::try_from)
            .collect::<Result<Vec<_>>>()?;

        let lines = config
            .lines
            .iter()
            .map(CountLine::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::new(
            IouTracker::new(config.tracker.clone()),
            zones,
            lines,
        ))
    }

    /// Runs detections through the tracker, then the zone and line analytics.
    pub fn update(&mut self, frame: &Frame) -> SceneSnapshot {
        let detections = frame.clipped_detections();
        let tracks: Arc<[Track]> = self.tracker.update(&detections).into();

        debug_assert!(
            tracks.windows(2).all(|w| w[0].track_id < w[1].track_id),
            "tracker emitted unordered or repeated track ids"
        );

        self.zones.update(&tracks);
        self.lines.update(&tracks);

        self.last = tracks;
        self.frame = frame.index;

        trace!(frame = frame.index, tracks = self.last.len(), "scene cycle");

        self.snapshot()
    }

    #[inline]
    pub fn tracks(&self) -> Arc<[Track]> {
        self.last.clone()
    }

    #[inline]
    pub fn tracker(&self) -> &IouTracker {
        &self.tracker
    }

    #[inline]
    pub fn zones(&self) -> &ZoneCounter {
        &self.zones
    }

    #[inline]
    pub fn lines(&self) -> &LineCounter {
        &self.lines
    }

    pub fn snapshot(&self) -> SceneSnapshot {
        SceneSnapshot {
            frame: self.frame,
            tracks: self.last.clone(),
            zones: self.zones.snapshot(),
            lines: self.lines.snapshot(),
        }
    }
}

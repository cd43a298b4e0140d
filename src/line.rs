use std::collections::{BTreeMap, HashMap, HashSet};

use nalgebra as na;
use serde_derive::{Deserialize, Serialize};
use tracing::info;

use crate::config::LineConfig;
use crate::error::{Error, Result};
use crate::geometry::{crossing_sign, segments_intersect};
use crate::Track;

/// Named directed segment `from -> to`.
#[derive(Debug, Clone, PartialEq)]
pub struct CountLine {
    name: String,
    from: na::Point2<f32>,
    to: na::Point2<f32>,
    directional: bool,
}

impl CountLine {
    pub fn new<S: Into<String>>(
        name: S,
        from: na::Point2<f32>,
        to: na::Point2<f32>,
        directional: bool,
    ) -> Result<Self> {
        let name = name.into();
        let dir = to - from;

        if !(dir.x.is_finite() && dir.y.is_finite()) || dir.norm_squared() <= 0.0 {
            return Err(Error::DegenerateLine { name });
        }

        Ok(Self {
            name,
            from,
            to,
            directional,
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn endpoints(&self) -> (na::Point2<f32>, na::Point2<f32>) {
        (self.from, self.to)
    }

    #[inline]
    pub fn is_directional(&self) -> bool {
        self.directional
    }

    #[inline]
    pub fn direction(&self) -> na::Vector2<f32> {
        self.to - self.from
    }

    /// Tests every consecutive step of `path` against the line and returns the
    /// crossing sign of the last intersecting step, or `None` when no step
    /// intersects. Directional lines ignore crossings parallel to the line.
    pub fn crossing(&self, path: &[na::Point2<f32>]) -> Option<i8> {
        let line = self.direction();
        let mut sign = None;

        for step in path.windows(2) {
            let (a, b) = (&step[0], &step[1]);

            if segments_intersect(a, b, &self.from, &self.to) {
                sign = Some(crossing_sign(&line, &(b - a)));
            }
        }

        match sign {
            Some(0) if self.directional => None,
            other => other,
        }
    }
}

impl TryFrom<&LineConfig> for CountLine {
    type Error = Error;

    fn try_from(cfg: &LineConfig) -> Result<Self> {
        CountLine::new(
            cfg.name.clone(),
            na::Point2::new(cfg.from[0], cfg.from[1]),
            na::Point2::new(cfg.to[0], cfg.to[1]),
            cfg.directional,
        )
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineCount {
    #[serde(rename = "+")]
    pub positive: u64,
    #[serde(rename = "-")]
    pub negative: u64,
}

/// Directional crossing counters for a set of lines.
///
/// A crossing is recorded for a `(track, line)` pair only when its sign differs
/// from the last one recorded for that pair. A single crossing stays visible in
/// the track history for several cycles, this keeps it from being counted on
/// each of them. As a consequence, a crossing that is evicted from the history
/// before the next cycle is never seen, and a back-and-forth movement inside
/// one history window collapses to the sign of its last step.
#[derive(Debug)]
pub struct LineCounter {
    lines: Vec<(CountLine, LineCount)>,
    last_sign: HashMap<(u32, usize), i8>,
}

impl LineCounter {
    pub fn new(lines: Vec<CountLine>) -> Self {
        Self {
            lines: lines
                .into_iter()
                .map(|l| (l, LineCount::default()))
                .collect(),
            last_sign: HashMap::new(),
        }
    }

    pub fn lines(&self) -> impl Iterator<Item = &CountLine> {
        self.lines.iter().map(|(l, _)| l)
    }

    pub fn update(&mut self, tracks: &[Track]) {
        for t in tracks.iter().filter(|t| t.history.len() >= 2) {
            for (idx, (line, count)) in self.lines.iter_mut().enumerate() {
                let sign = match line.crossing(&t.history) {
                    Some(sign) => sign,
                    None => continue,
                };

                let key = (t.track_id, idx);
                if self.last_sign.get(&key) == Some(&sign) {
                    continue;
                }

                if sign >= 0 {
                    count.positive += 1;
                } else {
                    count.negative += 1;
                }
                self.last_sign.insert(key, sign);

                info!(line = line.name(), track_id = t.track_id, sign, "line crossing");
            }
        }

        // ids are never reused, entries of gone tracks can only leak memory
        let live: HashSet<u32> = tracks.iter().map(|t| t.track_id).collect();
        self.last_sign.retain(|(id, _), _| live.contains(id));
    }

    pub fn last_sign(&self, track_id: u32, name: &str) -> Option<i8> {
        let idx = self.lines.iter().position(|(l, _)| l.name() == name)?;

        self.last_sign.get(&(track_id, idx)).copied()
    }

    pub fn count(&self, name: &str) -> Option<LineCount> {
        self.lines
            .iter()
            .find(|(l, _)| l.name() == name)
            .map(|(_, c)| *c)
    }

    pub fn snapshot(&self) -> BTreeMap<String, LineCount> {
        self.lines
            .iter()
            .map(|(l, c)| (l.name().to_string(), *c))
            .collect()
    }
}

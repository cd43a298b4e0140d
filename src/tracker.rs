use std::collections::BTreeMap;

use nalgebra as na;
use ndarray::Array2;
use tracing::{debug, trace, warn};

use crate::assignment::Assigner;
use crate::bbox::{BBox, Ltrb};
use crate::config::TrackerConfig;
use crate::history::BoundedHistory;
use crate::{Detection, Track};

/// Mutable state of one identity, owned by the tracker arena.
#[derive(Debug, Clone)]
pub struct TrackRecord {
    pub id: u32,
    pub bbox: BBox<Ltrb>,
    pub class: Option<u32>,
    pub confidence: f32,
    pub hits: u32,
    pub age: u32,
    pub time_since_update: u32,
    pub history: BoundedHistory<na::Point2<f32>>,
}

impl TrackRecord {
    pub fn new(id: u32, det: &Detection, history_len: usize) -> Self {
        let mut history = BoundedHistory::with_capacity(history_len);
        history.push(det.bbox.center());

        Self {
            id,
            bbox: det.bbox,
            class: det.class,
            confidence: det.confidence,
            hits: 1,
            age: 1,
            time_since_update: 0,
            history,
        }
    }

    #[inline]
    pub fn mark_missed(&mut self) {
        self.age = self.age.saturating_add(1);
        self.time_since_update = self.time_since_update.saturating_add(1);
    }

    pub fn update(&mut self, det: &Detection) {
        self.bbox = det.bbox;
        self.confidence = det.confidence;
        if det.class.is_some() {
            self.class = det.class;
        }

        self.hits = self.hits.saturating_add(1);
        self.time_since_update = 0;
        self.history.push(det.bbox.center());
    }

    /// IoU against `det`, or 0 when both classes are known and differ and
    /// matching is class-aware.
    #[inline]
    pub fn similarity(&self, det: &Detection, class_agnostic: bool) -> f32 {
        if !class_agnostic {
            if let (Some(a), Some(b)) = (self.class, det.class) {
                if a != b {
                    return 0.0;
                }
            }
        }

        self.bbox.iou(&det.bbox)
    }

    pub fn snapshot(&self, min_hits: u32) -> Track {
        Track {
            track_id: self.id,
            bbox: self.bbox,
            class: self.class,
            confidence: self.confidence,
            age: self.age,
            hits: self.hits,
            time_since_update: self.time_since_update,
            confirmed: self.hits >= min_hits,
            history: self.history.to_vec(),
        }
    }
}

/// IoU multi-object tracker for a single stream.
///
/// Tracks live in an arena keyed by id. IDs start at 1, grow strictly and are
/// never handed out twice by the same tracker.
#[derive(Debug)]
pub struct IouTracker {
    config: TrackerConfig,
    assigner: Box<dyn Assigner>,
    tracks: BTreeMap<u32, TrackRecord>,
    next_id: Option<u32>,
}

impl IouTracker {
    pub fn new(config: TrackerConfig) -> Self {
        let assigner = config.assignment.build();

        Self::with_assigner(config, assigner)
    }

    /// An `iou_threshold` outside `[0, 1]` is clamped into it, NaN falls back
    /// to the default. Zero-similarity pairs are rejected by the assigners
    /// regardless.
    pub fn with_assigner(mut config: TrackerConfig, assigner: Box<dyn Assigner>) -> Self {
        if let Err(err) = config.validate() {
            warn!(%err, "adjusting tracker config");

            config.iou_threshold = if config.iou_threshold.is_nan() {
                TrackerConfig::default().iou_threshold
            } else {
                config.iou_threshold.clamp(0.0, 1.0)
            };
        }

        Self {
            config,
            assigner,
            tracks: BTreeMap::new(),
            next_id: Some(1),
        }
    }

    #[inline]
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    #[inline]
    pub fn get(&self, id: u32) -> Option<&TrackRecord> {
        self.tracks.get(&id)
    }

    /// Runs one cycle and returns the surviving tracks ordered by id.
    ///
    /// Malformed detections are dropped with a warning, never reported as errors.
    pub fn update(&mut self, detections: &[Detection]) -> Vec<Track> {
        let detections: Vec<Detection> = detections
            .iter()
            .filter_map(|d| match d.sanitize() {
                Ok(d) => Some(d),
                Err(err) => {
                    warn!(%err, "dropping detection");
                    None
                }
            })
            .collect();

        for t in self.tracks.values_mut() {
            t.mark_missed();
        }

        let ids: Vec<u32> = self.tracks.keys().copied().collect();
        let class_agnostic = self.config.class_agnostic;
        let similarity = Array2::from_shape_fn((ids.len(), detections.len()), |(r, c)| {
            self.tracks[&ids[r]].similarity(&detections[c], class_agnostic)
        });

        let assignment = self
            .assigner
            .assign(similarity.view(), self.config.iou_threshold);

        for &(r, c, _) in &assignment.matches {
            if let Some(t) = self.tracks.get_mut(&ids[r]) {
                t.update(&detections[c]);
            }
        }

        for &c in &assignment.unmatched_detections {
            // ids are never reused, so once exhausted nothing new is spawned
            let Some(id) = self.next_id else {
                warn!("track ids exhausted, dropping detection");
                continue;
            };
            self.next_id = id.checked_add(1);

            debug!(track_id = id, bbox = ?detections[c].bbox.as_slice(), "spawn track");
            self.tracks
                .insert(id, TrackRecord::new(id, &detections[c], self.config.history_len));
        }

        let max_age = self.config.max_age;
        self.tracks.retain(|id, t| {
            let keep = t.time_since_update <= max_age;
            if !keep {
                debug!(track_id = *id, hits = t.hits, age = t.age, "drop track");
            }
            keep
        });

        trace!(
            detections = detections.len(),
            matched = assignment.matches.len(),
            tracks = self.tracks.len(),
            "tracker cycle"
        );

        self.tracks()
    }

    pub fn tracks(&self) -> Vec<Track> {
        self.tracks
            .values()
            .map(|t| t.snapshot(self.config.min_hits))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignment::AssignmentKind;

    fn det(x1: f32, y1: f32, x2: f32, y2: f32) -> Detection {
        Detection::ltrb(x1, y1, x2, y2, 0.8, None)
    }

    fn det_with_class(x1: f32, y1: f32, x2: f32, y2: f32, class: u32) -> Detection {
        Detection::ltrb(x1, y1, x2, y2, 0.8, Some(class))
    }

    #[test]
    fn test_spawn_starts_lifecycle_counters() {
        let mut tracker = IouTracker::new(TrackerConfig::default());
        let tracks = tracker.update(&[det(0., 0., 10., 10.), det(50., 50., 70., 70.)]);

        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].track_id, 1);
        assert_eq!(tracks[1].track_id, 2);
        for t in &tracks {
            assert_eq!((t.hits, t.age, t.time_since_update), (1, 1, 0));
            assert!(!t.confirmed);
            assert_eq!(t.history.len(), 1);
        }
        assert_eq!(tracks[1].history[0], na::Point2::new(60.0, 60.0));
    }

    #[test]
    fn test_match_updates_track() {
        let mut tracker = IouTracker::new(TrackerConfig::default());
        tracker.update(&[det(0., 0., 100., 100.)]);
        let tracks = tracker.update(&[Detection::ltrb(5., 5., 105., 105., 0.6, Some(3))]);

        assert_eq!(tracks.len(), 1);
        let t = &tracks[0];
        assert_eq!(t.track_id, 1);
        assert_eq!((t.hits, t.age, t.time_since_update), (2, 2, 0));
        assert_eq!(t.bbox, BBox::ltrb(5., 5., 105., 105.));
        assert_eq!(t.class, Some(3));
        assert_eq!(t.confidence, 0.6);
        assert_eq!(
            t.history,
            vec![na::Point2::new(50.0, 50.0), na::Point2::new(55.0, 55.0)]
        );
    }

    #[test]
    fn test_class_is_sticky() {
        let mut tracker = IouTracker::new(TrackerConfig::default());
        tracker.update(&[det_with_class(0., 0., 100., 100., 2)]);
        let tracks = tracker.update(&[det(0., 0., 100., 100.)]);
        assert_eq!(tracks[0].class, Some(2));
    }

    #[test]
    fn test_confirmation_after_min_hits() {
        let mut tracker = IouTracker::new(TrackerConfig::default());
        let d = [det(10., 10., 60., 60.)];

        assert!(!tracker.update(&d)[0].confirmed);
        assert!(!tracker.update(&d)[0].confirmed);
        let tracks = tracker.update(&d);
        assert_eq!(tracks.len(), 1);
        assert!(tracks[0].confirmed);
        assert_eq!(tracks[0].hits, 3);
    }

    #[test]
    fn test_time_since_update_and_expiry() {
        let config = TrackerConfig {
            max_age: 3,
            ..TrackerConfig::default()
        };
        let mut tracker = IouTracker::new(config);
        tracker.update(&[det(10., 10., 60., 60.)]);

        for expected in 1..=3 {
            let tracks = tracker.update(&[]);
            assert_eq!(tracks.len(), 1);
            assert_eq!(tracks[0].time_since_update, expected);
            assert_eq!(tracks[0].age, expected + 1);
        }

        assert!(tracker.update(&[]).is_empty());
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_removed_track_is_not_revived() {
        let config = TrackerConfig {
            max_age: 0,
            ..TrackerConfig::default()
        };
        let mut tracker = IouTracker::new(config);
        tracker.update(&[det(10., 10., 60., 60.)]);
        assert!(tracker.update(&[]).is_empty());

        let tracks = tracker.update(&[det(10., 10., 60., 60.)]);
        assert_eq!(tracks[0].track_id, 2);
    }

    #[test]
    fn test_low_iou_spawns_new_track() {
        let mut tracker = IouTracker::new(TrackerConfig::default());
        tracker.update(&[det(0., 0., 10., 10.)]);
        let tracks = tracker.update(&[det(8., 8., 18., 18.)]);

        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].time_since_update, 1);
        assert_eq!(tracks[1].track_id, 2);
    }

    #[test]
    fn test_class_aware_matching() {
        let config = TrackerConfig {
            class_agnostic: false,
            ..TrackerConfig::default()
        };
        let mut tracker = IouTracker::new(config);
        tracker.update(&[det_with_class(0., 0., 100., 100., 0)]);

        let tracks = tracker.update(&[det_with_class(0., 0., 100., 100., 2)]);
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].hits, 1);

        // unknown class on either side still matches
        let tracks = tracker.update(&[det(0., 0., 100., 100.)]);
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks.iter().filter(|t| t.time_since_update == 0).count(), 1);
    }

    #[test]
    fn test_zero_threshold_never_matches_other_class() {
        let config = TrackerConfig {
            class_agnostic: false,
            iou_threshold: 0.0,
            ..TrackerConfig::default()
        };
        let mut tracker = IouTracker::new(config);
        tracker.update(&[det_with_class(0., 0., 100., 100., 0)]);

        let tracks = tracker.update(&[det_with_class(0., 0., 100., 100., 7)]);
        assert_eq!(tracks.len(), 2);
        assert_eq!((tracks[0].track_id, tracks[0].class, tracks[0].hits), (1, Some(0), 1));
        assert_eq!((tracks[1].track_id, tracks[1].class), (2, Some(7)));

        // disjoint boxes do not match either
        let tracks = tracker.update(&[det_with_class(500., 500., 510., 510., 0)]);
        assert_eq!(tracks.len(), 3);
        assert_eq!(tracks[2].track_id, 3);
        assert_eq!(tracks[0].hits, 1);
    }

    #[test]
    fn test_out_of_range_threshold_is_adjusted() {
        let tracker = IouTracker::new(TrackerConfig {
            iou_threshold: f32::NAN,
            ..TrackerConfig::default()
        });
        assert_eq!(tracker.config().iou_threshold, 0.3);

        let tracker = IouTracker::new(TrackerConfig {
            iou_threshold: 2.0,
            ..TrackerConfig::default()
        });
        assert_eq!(tracker.config().iou_threshold, 1.0);

        let mut tracker = IouTracker::new(TrackerConfig {
            iou_threshold: f32::NAN,
            ..TrackerConfig::default()
        });
        tracker.update(&[det(0., 0., 10., 10.)]);
        let tracks = tracker.update(&[det(300., 300., 310., 310.)]);
        assert_eq!(tracks.len(), 2);
    }

    #[test]
    fn test_counters_saturate() {
        let mut tracker = IouTracker::new(TrackerConfig::default());
        tracker.update(&[det(0., 0., 10., 10.)]);
        if let Some(t) = tracker.tracks.get_mut(&1) {
            t.age = u32::MAX;
            t.hits = u32::MAX;
            t.time_since_update = u32::MAX - 1;
        }

        let tracks = tracker.update(&[det(0., 0., 10., 10.)]);
        assert_eq!((tracks[0].age, tracks[0].hits), (u32::MAX, u32::MAX));
        assert_eq!(tracks[0].time_since_update, 0);
    }

    #[test]
    fn test_exhausted_ids_are_not_reused() {
        let mut tracker = IouTracker::new(TrackerConfig::default());
        tracker.next_id = Some(u32::MAX);

        let tracks = tracker.update(&[det(0., 0., 10., 10.)]);
        assert_eq!(tracks[0].track_id, u32::MAX);

        let tracks = tracker.update(&[det(0., 0., 10., 10.), det(200., 200., 210., 210.)]);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].track_id, u32::MAX);
        assert_eq!(tracks[0].hits, 2);
    }

    #[test]
    fn test_class_agnostic_ignores_class() {
        let mut tracker = IouTracker::new(TrackerConfig::default());
        tracker.update(&[det_with_class(0., 0., 100., 100., 0)]);
        let tracks = tracker.update(&[det_with_class(0., 0., 100., 100., 2)]);

        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].class, Some(2));
    }

    #[test]
    fn test_malformed_detections_do_not_stall() {
        let mut tracker = IouTracker::new(TrackerConfig::default());
        let tracks = tracker.update(&[
            det(f32::NAN, 0., 10., 10.),
            det(5., 5., 5., 20.),
            det(40., 40., 20., 20.),
        ]);

        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].bbox, BBox::ltrb(20., 20., 40., 40.));
    }

    #[test]
    fn test_history_is_bounded() {
        let config = TrackerConfig {
            history_len: 4,
            ..TrackerConfig::default()
        };
        let mut tracker = IouTracker::new(config);

        let mut tracks = Vec::new();
        for i in 0..10 {
            let x = i as f32;
            tracks = tracker.update(&[det(x, 0., x + 100., 100.)]);
        }

        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].history.len(), 4);
        assert_eq!(tracks[0].history[0], na::Point2::new(56.0, 50.0));
        assert_eq!(tracks[0].history[3], na::Point2::new(59.0, 50.0));
    }

    #[test]
    fn test_hungarian_backend() {
        let config = TrackerConfig {
            assignment: AssignmentKind::Hungarian,
            ..TrackerConfig::default()
        };
        let mut tracker = IouTracker::new(config);
        tracker.update(&[det(0., 0., 100., 100.), det(200., 0., 300., 100.)]);
        let tracks = tracker.update(&[det(205., 0., 305., 100.), det(5., 0., 105., 100.)]);

        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].bbox, BBox::ltrb(5., 0., 105., 100.));
        assert_eq!(tracks[1].bbox, BBox::ltrb(205., 0., 305., 100.));
    }
}

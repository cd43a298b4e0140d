use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde_derive::{Deserialize, Serialize};

use crate::assignment::AssignmentKind;
use crate::error::{Error, Result};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TrackerConfig {
    /// Cycles a track survives without a match before it is removed
    pub max_age: u32,
    /// Matches required before a track is reported as confirmed
    pub min_hits: u32,
    /// Minimum IoU for a track/detection pair to be accepted
    pub iou_threshold: f32,
    /// When false, a track and a detection with different known classes never match
    pub class_agnostic: bool,
    /// Number of center points kept per track
    pub history_len: usize,
    pub assignment: AssignmentKind,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_age: 30,
            min_hits: 3,
            iou_threshold: 0.3,
            class_agnostic: true,
            history_len: 20,
            assignment: AssignmentKind::Greedy,
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err(Error::InvalidConfig(format!(
                "iou_threshold must be within [0, 1], got {}",
                self.iou_threshold
            )));
        }

        if self.history_len == 0 {
            return Err(Error::InvalidConfig(
                "history_len must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ZoneConfig {
    pub name: String,
    pub polygon: Vec<[f32; 2]>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LineConfig {
    pub name: String,
    pub from: [f32; 2],
    pub to: [f32; 2],
    #[serde(default)]
    pub directional: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct SceneConfig {
    pub tracker: TrackerConfig,
    pub zones: Vec<ZoneConfig>,
    pub lines: Vec<LineConfig>,
}

impl SceneConfig {
    pub fn from_json_str(src: &str) -> Result<Self> {
        let config: SceneConfig = serde_json::from_str(src)?;
        config.validate()?;

        Ok(config)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let src = fs::read_to_string(path)?;

        Self::from_json_str(&src)
    }

    /// Checks tracker parameters and name uniqueness. Zone and line geometry is
    /// checked when the zones and lines are built.
    pub fn validate(&self) -> Result<()> {
        self.tracker.validate()?;

        unique_names("zone", self.zones.iter().map(|z| z.name.as_str()))?;
        unique_names("line", self.lines.iter().map(|l| l.name.as_str()))?;

        Ok(())
    }
}

fn unique_names<'a, I: Iterator<Item = &'a str>>(kind: &'static str, names: I) -> Result<()> {
    let mut seen = HashSet::new();

    for name in names {
        if !seen.insert(name) {
            return Err(Error::DuplicateName {
                kind,
                name: name.to_string(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_fields_missing() {
        let config = SceneConfig::from_json_str("{}").unwrap();
        assert_eq!(config, SceneConfig::default());
        assert_eq!(config.tracker.max_age, 30);
        assert_eq!(config.tracker.min_hits, 3);
        assert_eq!(config.tracker.history_len, 20);
    }

    #[test]
    fn test_parse_full_config() {
        let config = SceneConfig::from_json_str(
            r#"{
                "tracker": { "max_age": 10, "class_agnostic": false, "assignment": "hungarian" },
                "zones": [ { "name": "Zone A", "polygon": [[50,50],[600,50],[600,400],[50,400]] } ],
                "lines": [ { "name": "Line 1", "from": [100,200], "to": [500,200], "directional": true } ]
            }"#,
        )
        .unwrap();

        assert_eq!(config.tracker.max_age, 10);
        assert_eq!(config.tracker.min_hits, 3);
        assert!(!config.tracker.class_agnostic);
        assert_eq!(config.tracker.assignment, AssignmentKind::Hungarian);
        assert_eq!(config.zones[0].polygon.len(), 4);
        assert!(config.lines[0].directional);
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let err = SceneConfig::from_json_str(
            r#"{ "lines": [
                { "name": "gate", "from": [0,0], "to": [1,0] },
                { "name": "gate", "from": [0,5], "to": [1,5] }
            ] }"#,
        )
        .unwrap_err();

        assert!(matches!(err, Error::DuplicateName { kind: "line", .. }));
    }

    #[test]
    fn test_rejects_bad_tracker_params() {
        let err = SceneConfig::from_json_str(r#"{ "tracker": { "iou_threshold": 1.5 } }"#)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));

        let err = SceneConfig::from_json_str(r#"{ "tracker": { "history_len": 0 } }"#)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            SceneConfig::from_json_str("{ nope").unwrap_err(),
            Error::Config(_)
        ));
    }
}

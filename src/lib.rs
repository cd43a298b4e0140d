pub mod assignment;
pub mod bbox;
pub mod config;
pub mod detection;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod history;
pub mod line;
pub mod scene;
pub mod tracker;
pub mod zone;

mod track;

pub use config::SceneConfig;
pub use detection::Detection;
pub use error::{Error, Result};
pub use frame::Frame;
pub use scene::{Scene, SceneSnapshot};
pub use track::Track;

use nalgebra as na;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Scalar type accepted by the planar predicates in [`geometry`].
pub trait Float: num_traits::Float + na::Scalar + fmt::Debug {}

impl<T> Float for T where T: num_traits::Float + na::Scalar + fmt::Debug {}

pub trait Tracking {
    fn update(&mut self, frame: &Frame, src: &str) -> Result<SceneSnapshot>;
    fn tracks(&self, src: &str) -> Arc<[Track]>;
}

/// Registry of isolated scenes keyed by source name.
///
/// Every source gets its own tracker and counters, built from the shared
/// config the first time a frame arrives for it.
pub struct Streams {
    config: SceneConfig,
    scenes: HashMap<String, Scene>,
}

impl Streams {
    pub fn new(config: SceneConfig) -> Result<Self> {
        // build once up front so a bad zone or line fails here and not on the first frame
        Scene::from_config(&config)?;

        Ok(Self {
            config,
            scenes: HashMap::new(),
        })
    }

    #[inline]
    pub fn scene(&self, src: &str) -> Option<&Scene> {
        self.scenes.get(src)
    }

    #[inline]
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.scenes.keys().map(String::as_str)
    }

    /// Detaches the scene of `src`, e.g. to hand it to a dedicated worker.
    pub fn remove(&mut self, src: &str) -> Option<Scene> {
        self.scenes.remove(src)
    }
}

impl crate::Tracking for Streams {
    fn update(&mut self, frame: &Frame, src: &str) -> Result<SceneSnapshot> {
        let scene = match self.scenes.entry(src.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(Scene::from_config(&self.config)?),
        };

        Ok(scene.update(frame))
    }

    #[inline]
    fn tracks(&self, src: &str) -> Arc<[Track]> {
        if let Some(scene) = self.scenes.get(src) {
            return scene.tracks();
        }

        Arc::new([])
    }
}

use std::time::Duration;

use bon::Builder;
use serde::{Deserialize, Serialize};

/// Tunable runtime behaviour.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Frames per second the host is expected to tick at.
    #[builder(default = 30.0)]
    pub framerate: f64,
    /// Keep running threads for the whole frame budget even after something
    /// visible changed.
    #[builder(default)]
    pub turbo: bool,
    /// How many of the most recent call frames are searched when deciding
    /// whether a recursive call that drew something should yield.
    #[builder(default = 5)]
    pub recursion_window: usize,
    /// Procedure calls nested deeper than this abort the runtime.
    #[builder(default = 10_000)]
    pub max_call_depth: usize,
    /// Keep sprites from being moved fully off stage.
    #[builder(default)]
    pub sprite_fencing: bool,
    #[builder(default, into)]
    pub username: String,
    /// Seed for `pick random` and random list indices. Unset means entropy.
    pub seed: Option<u64>,
}

impl Settings {
    pub fn frame_budget(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.framerate.max(1.0))
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::builder().build()
    }
}

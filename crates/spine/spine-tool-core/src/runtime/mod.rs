//! Boundary with the skeletal animation runtime.
//!
//! The core never mutates track state except through [`AnimationRuntime`]. A
//! runtime reports lifecycle and timeline events as queued [`RuntimeSignal`]s,
//! drained by the owning controller once per frame. Adapters implement the
//! trait over a real Spine runtime; [`SimulatedSkeleton`] is a deterministic
//! in-process implementation over parsed skeleton JSON.

pub mod simulated;
pub mod skeleton_data;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ids::EntryId;
use crate::scene::Vec3;

pub use simulated::SimulatedSkeleton;
pub use skeleton_data::{AnimationDef, BoneDef, EventDef, EventKey, SkeletonData};

/// Snapshot of one track entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackEntry {
    pub id: EntryId,
    pub track_index: usize,
    pub animation_name: String,
    /// Animation duration in seconds.
    pub duration: f32,
    /// Seconds since the entry started; keeps growing across loops.
    pub track_time: f32,
    pub time_scale: f32,
    pub looping: bool,
}

impl TrackEntry {
    /// Track time wrapped into the animation (looping) or clamped to its end.
    pub fn animation_time(&self) -> f32 {
        if self.duration <= 0.0 {
            return 0.0;
        }
        if self.looping {
            self.track_time.rem_euclid(self.duration)
        } else {
            self.track_time.clamp(0.0, self.duration)
        }
    }
}

/// A timeline event authored in the animation tool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NativeEvent {
    pub name: String,
    /// Time of the key within the animation, in seconds.
    pub time: f32,
    /// Track time at which the key was crossed; includes completed loops.
    pub track_time: f32,
    pub int_value: i32,
    pub float_value: f32,
    pub string_value: String,
}

/// Signals a runtime queues for its owner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RuntimeSignal {
    Start { entry: TrackEntry },
    End { entry: TrackEntry },
    /// A loop (or the whole non-looping animation) finished.
    Complete { entry: TrackEntry },
    Event { entry: TrackEntry, event: NativeEvent },
}

impl RuntimeSignal {
    pub fn entry(&self) -> &TrackEntry {
        match self {
            RuntimeSignal::Start { entry }
            | RuntimeSignal::End { entry }
            | RuntimeSignal::Complete { entry }
            | RuntimeSignal::Event { entry, .. } => entry,
        }
    }
}

/// A bone's position in skeleton space.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bone {
    pub name: String,
    pub position: Vec3,
}

/// Operations the core needs from a skeleton's animation state.
pub trait AnimationRuntime {
    /// Replace whatever plays on `track` with `animation`.
    fn set_animation(&mut self, track: usize, animation: &str, looping: bool) -> Result<TrackEntry>;

    /// Queue `animation` after the current entry. `delay <= 0` is relative to
    /// the end of the previous entry.
    fn add_animation(
        &mut self,
        track: usize,
        animation: &str,
        looping: bool,
        delay: f32,
    ) -> Result<TrackEntry>;

    fn clear_track(&mut self, track: usize);

    fn clear_tracks(&mut self);

    fn current(&self, track: usize) -> Option<TrackEntry>;

    /// Scrub the current entry. Returns false when the track is empty.
    fn set_track_time(&mut self, track: usize, time: f32) -> bool;

    /// Returns false when the track is empty.
    fn set_time_scale(&mut self, track: usize, scale: f32) -> bool;

    fn set_mix(&mut self, from: &str, to: &str, duration: f32);

    fn find_bone(&self, name: &str) -> Option<Bone>;

    fn set_skin(&mut self, name: &str) -> Result<()>;

    fn skin(&self) -> Option<&str>;

    fn set_to_setup_pose(&mut self);

    fn animation_duration(&self, animation: &str) -> Option<f32>;

    fn animation_names(&self) -> Vec<String>;

    /// Advance all tracks by `dt` seconds, queueing signals.
    fn update(&mut self, dt: f32);

    /// Take every signal queued since the last drain, in emission order.
    fn drain_signals(&mut self) -> Vec<RuntimeSignal>;
}

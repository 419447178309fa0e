//! Per-frame output of [`Stage::update`](crate::stage::Stage::update).
//!
//! Outputs carry the semantic events of the last frame only. Hosts (and the
//! synchronizer) read them after each update; the next update clears them.

use serde::Serialize;

use crate::ids::EntryId;
use crate::runtime::TrackEntry;
use crate::scene::ComponentId;
use crate::stage::SkeletonId;

/// Discrete signals emitted while stepping the stage.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[non_exhaustive]
pub enum StageEvent {
    AnimationStarted {
        skeleton: SkeletonId,
        entry: TrackEntry,
    },
    AnimationEnded {
        skeleton: SkeletonId,
        entry: TrackEntry,
    },
    /// One loop, or the whole non-looping animation, finished.
    AnimationCompleted {
        skeleton: SkeletonId,
        entry: TrackEntry,
    },
    /// A tool-authored timeline event was delivered.
    NativeEvent {
        skeleton: SkeletonId,
        entry: EntryId,
        name: String,
        track_time: f32,
    },
    /// An injected binding fired.
    InjectedFired {
        skeleton: SkeletonId,
        entry: EntryId,
        target: ComponentId,
        animation: String,
        callback: String,
        track_time: f32,
    },
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct Outputs {
    pub events: Vec<StageEvent>,
}

impl Outputs {
    #[inline]
    pub fn clear(&mut self) {
        self.events.clear();
    }

    #[inline]
    pub fn push_event(&mut self, event: StageEvent) {
        self.events.push(event);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Completion events for `skeleton` in this frame.
    pub fn completions(&self, skeleton: SkeletonId) -> impl Iterator<Item = &TrackEntry> {
        self.events.iter().filter_map(move |e| match e {
            StageEvent::AnimationCompleted { skeleton: s, entry } if *s == skeleton => Some(entry),
            _ => None,
        })
    }

    /// Names of the callbacks fired for `skeleton` this frame, in firing order.
    pub fn fired(&self, skeleton: SkeletonId) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                StageEvent::InjectedFired {
                    skeleton: s,
                    callback,
                    ..
                } if *s == skeleton => Some(callback.as_str()),
                _ => None,
            })
            .collect()
    }
}

//! Timeline event scheduler.
//!
//! One [`TrackWatch`] per track slot. A watch starts when the runtime reports
//! that an entry started on the track and the entry's animation has bindings.
//! Each tick re-reads the track from the runtime, validates that it is still
//! the watched entry and that time has not gone backwards, then fires every
//! binding whose target time has been reached, in ascending time order.
//!
//! ```text
//!            start (bindings)          all fired
//!   Idle ───────────────────► Watching ─────────► Draining
//!    ▲                           │                   │
//!    │        invalidated        ▼                   │
//!    │◄──────────────────── Aborted                  │
//!    └──────── end / new start ◄─────────────────────┘
//! ```

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::diagnostics::{Diagnostics, Severity};
use crate::error::{InvalidationReason, SpineToolError};
use crate::event::EventData;
use crate::ids::EntryId;
use crate::runtime::{AnimationRuntime, TrackEntry};
use crate::scanner::{BindingIndex, ResolvedBinding};
use crate::scene::{ComponentId, InvokeError, Scene};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WatchState {
    Idle,
    Watching,
    Draining,
    Aborted,
}

#[derive(Debug)]
struct TrackWatch {
    entry: EntryId,
    animation: String,
    duration: f32,
    /// Sorted by normalized time; ties keep declaration order.
    bindings: Vec<ResolvedBinding>,
    next: usize,
    last_time: f32,
    state: WatchState,
}

/// One binding that fired during a tick.
#[derive(Clone, Debug, PartialEq)]
pub struct FiredBinding {
    pub track: usize,
    pub entry: EntryId,
    pub target: ComponentId,
    pub animation: String,
    pub callback: String,
    pub track_time: f32,
}

#[derive(Debug, Default)]
pub struct TickReport {
    pub fired: Vec<FiredBinding>,
    /// Targets found destroyed while firing.
    pub stale: Vec<ComponentId>,
}

#[derive(Debug, Default)]
pub struct TimelineScheduler {
    watches: HashMap<usize, TrackWatch>,
}

impl TimelineScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, track: usize) -> WatchState {
        self.watches
            .get(&track)
            .map_or(WatchState::Idle, |w| w.state)
    }

    /// Bindings of the current watch on `track` that have not fired yet.
    pub fn pending(&self, track: usize) -> usize {
        self.watches
            .get(&track)
            .filter(|w| w.state == WatchState::Watching)
            .map_or(0, |w| w.bindings.len() - w.next)
    }

    /// An entry started on its track. Any previous watch on that track is
    /// superseded, fired or not.
    pub fn on_start(&mut self, entry: &TrackEntry, index: &BindingIndex) {
        let track = entry.track_index;
        self.watches.remove(&track);

        let bindings = index.get(&entry.animation_name);
        if bindings.is_empty() {
            return;
        }
        if entry.duration <= 0.0 {
            tracing::debug!(
                track,
                animation = %entry.animation_name,
                "animation has no duration; bindings not watched"
            );
            return;
        }

        let mut sorted = bindings.to_vec();
        sorted.sort_by(|a, b| {
            a.descriptor
                .normalized_time()
                .total_cmp(&b.descriptor.normalized_time())
        });
        tracing::debug!(
            track,
            entry = %entry.id,
            animation = %entry.animation_name,
            bindings = sorted.len(),
            "watching track"
        );
        self.watches.insert(
            track,
            TrackWatch {
                entry: entry.id,
                animation: entry.animation_name.clone(),
                duration: entry.duration,
                bindings: sorted,
                next: 0,
                last_time: entry.track_time.max(0.0),
                state: WatchState::Watching,
            },
        );
    }

    /// An entry ended. Only the watch for that same entry is released.
    pub fn on_end(&mut self, entry: &TrackEntry) {
        let track = entry.track_index;
        if self.watches.get(&track).is_some_and(|w| w.entry == entry.id) {
            self.watches.remove(&track);
        }
    }

    pub fn cancel(&mut self, track: usize) {
        self.watches.remove(&track);
    }

    pub fn cancel_all(&mut self) {
        self.watches.clear();
    }

    /// Advance every live watch against the runtime's current track state.
    pub fn tick(
        &mut self,
        runtime: &dyn AnimationRuntime,
        scene: &mut Scene,
        diagnostics: &Diagnostics,
    ) -> TickReport {
        let mut report = TickReport::default();
        let mut tracks: Vec<usize> = self
            .watches
            .iter()
            .filter(|(_, w)| w.state == WatchState::Watching)
            .map(|(t, _)| *t)
            .collect();
        tracks.sort_unstable();

        for track in tracks {
            let Some(watch) = self.watches.get_mut(&track) else {
                continue;
            };
            let current = runtime.current(track);
            let invalid = match &current {
                None => Some(InvalidationReason::TrackCleared),
                Some(e) if e.id != watch.entry => Some(InvalidationReason::EntryReplaced),
                Some(e) if e.track_time < 0.0 => Some(InvalidationReason::TimeNegative),
                Some(e) if e.track_time < watch.last_time => Some(InvalidationReason::TimeRegressed),
                Some(_) => None,
            };
            if let Some(reason) = invalid {
                watch.state = WatchState::Aborted;
                diagnostics.report(
                    Severity::Info,
                    &SpineToolError::TrackInvalidated {
                        track,
                        animation: watch.animation.clone(),
                        reason,
                    },
                );
                continue;
            }
            let Some(current) = current else {
                continue;
            };
            let time = current.track_time;

            while watch.next < watch.bindings.len() {
                let binding = &watch.bindings[watch.next];
                let target_time = watch.duration * binding.descriptor.normalized_time();
                if time < target_time {
                    break;
                }
                watch.next += 1;

                let data = EventData::from_descriptor(&binding.descriptor, time);
                match scene.invoke(binding.target, &binding.invoker, &data) {
                    Ok(()) => {
                        tracing::debug!(
                            track,
                            animation = %watch.animation,
                            callback = binding.descriptor.callback_name(),
                            target_time,
                            track_time = time,
                            "binding fired"
                        );
                        report.fired.push(FiredBinding {
                            track,
                            entry: watch.entry,
                            target: binding.target,
                            animation: watch.animation.clone(),
                            callback: binding.descriptor.callback_name().to_string(),
                            track_time: time,
                        });
                    }
                    Err(InvokeError::Destroyed) => {
                        diagnostics.warn(&SpineToolError::TrackInvalidated {
                            track,
                            animation: watch.animation.clone(),
                            reason: InvalidationReason::TargetDestroyed,
                        });
                        if !report.stale.contains(&binding.target) {
                            report.stale.push(binding.target);
                        }
                    }
                    Err(InvokeError::Failed(source)) => {
                        diagnostics.error(&SpineToolError::InvocationFailure {
                            callback: binding.descriptor.callback_name().to_string(),
                            source,
                        });
                    }
                }
            }

            watch.last_time = time;
            if watch.next >= watch.bindings.len() {
                watch.state = WatchState::Draining;
            }
        }

        report
    }
}

//! Deterministic in-process animation state over [`SkeletonData`].
//!
//! Mirrors the track semantics of Spine's `AnimationState` closely enough to
//! drive and test the core: entries per track, queued entries with delays,
//! per-loop completion, authored timeline events and start/end signals.
//! No posing or mixing is computed.

use std::collections::VecDeque;

use hashbrown::HashMap;

use crate::error::{Result, SpineToolError};
use crate::ids::IdAllocator;
use crate::runtime::skeleton_data::{AnimationDef, SkeletonData};
use crate::runtime::{AnimationRuntime, Bone, NativeEvent, RuntimeSignal, TrackEntry};

#[derive(Debug)]
struct Active {
    entry: TrackEntry,
    /// Set after the first update; the first event window includes time 0.
    applied: bool,
}

#[derive(Debug)]
struct Queued {
    entry: TrackEntry,
    /// Seconds of the previous entry's track time before this one starts.
    delay: f32,
}

#[derive(Debug, Default)]
struct TrackSlot {
    current: Option<Active>,
    queue: VecDeque<Queued>,
}

#[derive(Debug)]
pub struct SimulatedSkeleton {
    data: SkeletonData,
    tracks: Vec<TrackSlot>,
    ids: IdAllocator,
    signals: Vec<RuntimeSignal>,
    mixes: HashMap<(String, String), f32>,
    skin: Option<String>,
    setup_pose_resets: u32,
}

impl SimulatedSkeleton {
    pub fn new(data: SkeletonData) -> Self {
        Self {
            data,
            tracks: Vec::new(),
            ids: IdAllocator::new(),
            signals: Vec::new(),
            mixes: HashMap::new(),
            skin: None,
            setup_pose_resets: 0,
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self::new(SkeletonData::from_json(json)?))
    }

    pub fn data(&self) -> &SkeletonData {
        &self.data
    }

    /// Mix duration configured between two animations, if any.
    pub fn mix(&self, from: &str, to: &str) -> Option<f32> {
        self.mixes
            .get(&(from.to_string(), to.to_string()))
            .copied()
    }

    pub fn setup_pose_resets(&self) -> u32 {
        self.setup_pose_resets
    }

    /// Entries waiting behind the current one on `track`.
    pub fn queued(&self, track: usize) -> usize {
        self.tracks.get(track).map_or(0, |t| t.queue.len())
    }

    fn slot_mut(&mut self, track: usize) -> &mut TrackSlot {
        if self.tracks.len() <= track {
            self.tracks.resize_with(track + 1, TrackSlot::default);
        }
        &mut self.tracks[track]
    }

    fn new_entry(&mut self, track: usize, def: &AnimationDef, looping: bool) -> TrackEntry {
        TrackEntry {
            id: self.ids.alloc_entry(),
            track_index: track,
            animation_name: def.name.clone(),
            duration: def.duration,
            track_time: 0.0,
            time_scale: 1.0,
            looping,
        }
    }

    fn lookup(&self, animation: &str) -> Result<AnimationDef> {
        self.data
            .animation(animation)
            .cloned()
            .ok_or_else(|| SpineToolError::AnimationNotFound {
                name: animation.to_string(),
            })
    }

    /// Queue event and completion signals for one advanced window.
    fn emit_window(
        signals: &mut Vec<RuntimeSignal>,
        def: Option<&AnimationDef>,
        entry: &TrackEntry,
        prev: f32,
        first: bool,
    ) {
        let now = entry.track_time;
        if now < prev {
            return;
        }
        let in_window = |t: f32| (t > prev || (first && t >= prev)) && t <= now;
        let d = entry.duration;

        if let Some(def) = def {
            if d <= 0.0 {
                if first {
                    for key in &def.events {
                        signals.push(event_signal(entry, 0.0, key));
                    }
                }
            } else if entry.looping {
                let first_loop = (prev / d).floor().max(0.0) as u64;
                let last_loop = (now / d).floor().max(0.0) as u64;
                for k in first_loop..=last_loop {
                    let base = k as f32 * d;
                    for key in &def.events {
                        if in_window(base + key.time) {
                            signals.push(event_signal(entry, base, key));
                        }
                    }
                }
            } else {
                for key in def.events.iter().filter(|k| k.time <= d) {
                    if in_window(key.time) {
                        signals.push(event_signal(entry, 0.0, key));
                    }
                }
            }
        }

        let completions = if d <= 0.0 {
            u64::from(first)
        } else if entry.looping {
            ((now / d).floor() - (prev / d).floor()).max(0.0) as u64
        } else {
            u64::from(prev < d && now >= d)
        };
        for _ in 0..completions {
            signals.push(RuntimeSignal::Complete {
                entry: entry.clone(),
            });
        }
    }
}

fn event_signal(
    entry: &TrackEntry,
    loop_base: f32,
    key: &crate::runtime::skeleton_data::EventKey,
) -> RuntimeSignal {
    RuntimeSignal::Event {
        entry: entry.clone(),
        event: NativeEvent {
            name: key.name.clone(),
            time: key.time,
            track_time: loop_base + key.time,
            int_value: key.int,
            float_value: key.float,
            string_value: key.string.clone(),
        },
    }
}

impl AnimationRuntime for SimulatedSkeleton {
    fn set_animation(&mut self, track: usize, animation: &str, looping: bool) -> Result<TrackEntry> {
        let def = self.lookup(animation)?;
        let entry = self.new_entry(track, &def, looping);
        let slot = self.slot_mut(track);
        slot.queue.clear();
        let replaced = slot.current.replace(Active {
            entry: entry.clone(),
            applied: false,
        });
        if let Some(old) = replaced {
            self.signals.push(RuntimeSignal::End { entry: old.entry });
        }
        self.signals.push(RuntimeSignal::Start {
            entry: entry.clone(),
        });
        Ok(entry)
    }

    fn add_animation(
        &mut self,
        track: usize,
        animation: &str,
        looping: bool,
        delay: f32,
    ) -> Result<TrackEntry> {
        let def = self.lookup(animation)?;
        let previous_duration = {
            let slot = self.slot_mut(track);
            match (slot.queue.back(), slot.current.as_ref()) {
                (Some(q), _) => Some(q.entry.duration),
                (None, Some(active)) => Some(active.entry.duration),
                (None, None) => None,
            }
        };
        let Some(previous_duration) = previous_duration else {
            return self.set_animation(track, animation, looping);
        };
        let delay = if delay <= 0.0 {
            (previous_duration + delay).max(0.0)
        } else {
            delay
        };
        let entry = self.new_entry(track, &def, looping);
        self.slot_mut(track).queue.push_back(Queued {
            entry: entry.clone(),
            delay,
        });
        Ok(entry)
    }

    fn clear_track(&mut self, track: usize) {
        if let Some(slot) = self.tracks.get_mut(track) {
            slot.queue.clear();
            if let Some(old) = slot.current.take() {
                self.signals.push(RuntimeSignal::End { entry: old.entry });
            }
        }
    }

    fn clear_tracks(&mut self) {
        for track in 0..self.tracks.len() {
            self.clear_track(track);
        }
    }

    fn current(&self, track: usize) -> Option<TrackEntry> {
        self.tracks
            .get(track)
            .and_then(|t| t.current.as_ref())
            .map(|a| a.entry.clone())
    }

    fn set_track_time(&mut self, track: usize, time: f32) -> bool {
        match self.tracks.get_mut(track).and_then(|t| t.current.as_mut()) {
            Some(active) => {
                active.entry.track_time = time;
                true
            }
            None => false,
        }
    }

    fn set_time_scale(&mut self, track: usize, scale: f32) -> bool {
        match self.tracks.get_mut(track).and_then(|t| t.current.as_mut()) {
            Some(active) => {
                active.entry.time_scale = scale;
                true
            }
            None => false,
        }
    }

    fn set_mix(&mut self, from: &str, to: &str, duration: f32) {
        self.mixes
            .insert((from.to_string(), to.to_string()), duration.max(0.0));
    }

    fn find_bone(&self, name: &str) -> Option<Bone> {
        self.data.bone_position(name).map(|position| Bone {
            name: name.to_string(),
            position,
        })
    }

    fn set_skin(&mut self, name: &str) -> Result<()> {
        if !self.data.has_skin(name) {
            return Err(SpineToolError::SkinNotFound {
                name: name.to_string(),
            });
        }
        self.skin = Some(name.to_string());
        Ok(())
    }

    fn skin(&self) -> Option<&str> {
        self.skin.as_deref()
    }

    fn set_to_setup_pose(&mut self) {
        self.setup_pose_resets += 1;
    }

    fn animation_duration(&self, animation: &str) -> Option<f32> {
        self.data.animation(animation).map(|a| a.duration)
    }

    fn animation_names(&self) -> Vec<String> {
        self.data.animations.iter().map(|a| a.name.clone()).collect()
    }

    fn update(&mut self, dt: f32) {
        for track in 0..self.tracks.len() {
            let Some(active) = self.tracks[track].current.as_mut() else {
                continue;
            };
            let prev = active.entry.track_time;
            let first = !active.applied;
            active.entry.track_time += dt * active.entry.time_scale;
            active.applied = true;
            let snapshot = active.entry.clone();

            let def = self.data.animation(&snapshot.animation_name);
            Self::emit_window(&mut self.signals, def, &snapshot, prev, first);

            let slot = &mut self.tracks[track];
            let due = slot
                .queue
                .front()
                .is_some_and(|q| snapshot.track_time >= q.delay);
            if due {
                if let Some(next) = slot.queue.pop_front() {
                    slot.current = Some(Active {
                        entry: next.entry.clone(),
                        applied: false,
                    });
                    self.signals.push(RuntimeSignal::End { entry: snapshot });
                    self.signals.push(RuntimeSignal::Start { entry: next.entry });
                }
            }
        }
    }

    fn drain_signals(&mut self) -> Vec<RuntimeSignal> {
        std::mem::take(&mut self.signals)
    }
}

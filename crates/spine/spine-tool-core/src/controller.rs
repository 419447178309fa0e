//! Animation facade for one skeleton object.
//!
//! An [`AnimationController`] wraps one [`AnimationRuntime`] bound to a scene
//! node. Gameplay code plays, pauses and re-skins through it; each frame the
//! owning [`Stage`](crate::stage::Stage) calls `update`, which drains the
//! runtime's signals into the scheduler, the native event bridge and the
//! frame outputs.

use std::rc::Rc;

use crate::bridge::{Listener, NativeEventBridge};
use crate::config::Config;
use crate::diagnostics::Diagnostics;
use crate::error::{Result, SpineToolError};
use crate::injector::EventInjector;
use crate::outputs::{Outputs, StageEvent};
use crate::runtime::{AnimationRuntime, RuntimeSignal, TrackEntry};
use crate::scene::{ComponentId, NodeId, Scene};
use crate::stage::SkeletonId;
use crate::symbols::SymbolCollection;

pub struct AnimationController {
    node: NodeId,
    runtime: Box<dyn AnimationRuntime>,
    default_track: usize,
    current_animation: Option<String>,
    /// Time scale applied to new entries and restored on resume.
    speed: f32,
    paused: bool,
    bridge: NativeEventBridge,
    injector: EventInjector,
    symbols: Option<Rc<SymbolCollection>>,
    diagnostics: Diagnostics,
}

impl std::fmt::Debug for AnimationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimationController")
            .field("node", &self.node)
            .field("current_animation", &self.current_animation)
            .field("speed", &self.speed)
            .field("paused", &self.paused)
            .field("listeners", self.bridge.listeners())
            .finish_non_exhaustive()
    }
}

impl AnimationController {
    pub fn new(
        node: NodeId,
        runtime: Box<dyn AnimationRuntime>,
        cfg: &Config,
        diagnostics: Diagnostics,
    ) -> Self {
        Self {
            node,
            runtime,
            default_track: cfg.default_track,
            current_animation: None,
            speed: 1.0,
            paused: false,
            bridge: NativeEventBridge::new(),
            injector: EventInjector::new(node),
            symbols: None,
            diagnostics,
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn runtime(&self) -> &dyn AnimationRuntime {
        &*self.runtime
    }

    /// Direct runtime access for host adapters (e.g. editor scrubbing).
    pub fn runtime_mut(&mut self) -> &mut dyn AnimationRuntime {
        &mut *self.runtime
    }

    pub fn default_track(&self) -> usize {
        self.default_track
    }

    // ---------- playback ----------

    /// Replace the default track's animation.
    pub fn play(&mut self, animation: &str, looping: bool) -> Result<TrackEntry> {
        self.play_on_track(self.default_track, animation, looping)
    }

    pub fn play_on_track(&mut self, track: usize, animation: &str, looping: bool) -> Result<TrackEntry> {
        let mut entry = self.runtime.set_animation(track, animation, looping)?;
        if track == self.default_track {
            self.current_animation = Some(animation.to_string());
        }
        self.paused = false;
        self.runtime.set_time_scale(track, self.speed);
        entry.time_scale = self.speed;
        tracing::debug!(track, animation, looping, entry = %entry.id, "play");
        Ok(entry)
    }

    /// Queue `animation` after whatever plays on the default track.
    pub fn add_animation(&mut self, animation: &str, looping: bool, delay: f32) -> Result<TrackEntry> {
        let entry = self
            .runtime
            .add_animation(self.default_track, animation, looping, delay)?;
        tracing::debug!(animation, looping, delay, entry = %entry.id, "queued");
        Ok(entry)
    }

    pub fn set_symbols(&mut self, symbols: Rc<SymbolCollection>) {
        self.symbols = Some(symbols);
    }

    pub fn symbols(&self) -> Option<&SymbolCollection> {
        self.symbols.as_deref()
    }

    /// Play the animation of symbol `id`, applying its skin, blend and speed.
    pub fn play_symbol(&mut self, id: &str, looping: bool) -> Result<TrackEntry> {
        let symbol = self
            .symbols
            .as_ref()
            .and_then(|s| s.get(id))
            .cloned()
            .ok_or_else(|| SpineToolError::SymbolNotFound { id: id.to_string() })?;
        if !self.has_animation(&symbol.animation_name) {
            return Err(SpineToolError::AnimationNotFound {
                name: symbol.animation_name,
            });
        }

        if !symbol.skin_name.is_empty() && self.set_skin(&symbol.skin_name).is_ok() {
            self.runtime.set_to_setup_pose();
        }
        if symbol.blend_duration > 0.0 {
            if let Some(previous) = self.current_animation.as_deref() {
                self.runtime
                    .set_mix(previous, &symbol.animation_name, symbol.blend_duration);
            }
        }
        self.speed = symbol.custom_speed;
        self.play(&symbol.animation_name, looping)
    }

    pub fn stop(&mut self) {
        self.stop_track(self.default_track);
    }

    /// Clear one track. Tracking for it stops before the next tick.
    pub fn stop_track(&mut self, track: usize) {
        self.runtime.clear_track(track);
        self.injector.cancel(track);
        if track == self.default_track {
            self.current_animation = None;
        }
    }

    pub fn stop_all(&mut self) {
        self.runtime.clear_tracks();
        self.injector.cancel_all();
        self.current_animation = None;
    }

    pub fn pause(&mut self) {
        if self.runtime.set_time_scale(self.default_track, 0.0) {
            self.paused = true;
        }
    }

    pub fn resume(&mut self) {
        if self.runtime.set_time_scale(self.default_track, self.speed) {
            self.paused = false;
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Set the playback speed. While paused the speed is stored and applied
    /// on resume.
    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
        if !self.paused {
            self.runtime.set_time_scale(self.default_track, speed);
        }
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    // ---------- skeleton settings ----------

    pub fn set_skin(&mut self, name: &str) -> Result<()> {
        self.runtime.set_skin(name).inspect_err(|err| {
            self.diagnostics.warn(err);
        })
    }

    pub fn skin(&self) -> Option<&str> {
        self.runtime.skin()
    }

    pub fn set_mix(&mut self, from: &str, to: &str, duration: f32) {
        self.runtime.set_mix(from, to, duration);
    }

    pub fn set_to_setup_pose(&mut self) {
        self.runtime.set_to_setup_pose();
    }

    // ---------- queries ----------

    /// Duration in seconds; 0 for unknown animations.
    pub fn duration(&self, animation: &str) -> f32 {
        self.runtime.animation_duration(animation).unwrap_or(0.0)
    }

    pub fn has_animation(&self, animation: &str) -> bool {
        self.runtime.animation_duration(animation).is_some()
    }

    pub fn animation_names(&self) -> Vec<String> {
        self.runtime.animation_names()
    }

    pub fn track_entry(&self, track: usize) -> Option<TrackEntry> {
        self.runtime.current(track)
    }

    pub fn current_entry(&self) -> Option<TrackEntry> {
        self.runtime.current(self.default_track)
    }

    pub fn current_animation(&self) -> Option<&str> {
        self.current_animation.as_deref()
    }

    /// True while the default track has an entry that is advancing.
    pub fn is_playing(&self) -> bool {
        self.current_entry().is_some_and(|e| e.time_scale > 0.0)
    }

    // ---------- listeners ----------

    /// Returns false if `listener` was already registered for `event`.
    pub fn add_event_listener(&mut self, event: &str, listener: Listener) -> bool {
        let added = self.bridge.listeners_mut().add(event, listener);
        if added {
            tracing::debug!(event, "listener added");
        }
        added
    }

    pub fn remove_event_listener(&mut self, event: &str, listener: &Listener) -> bool {
        self.bridge.listeners_mut().remove(event, listener)
    }

    pub fn remove_all_listeners(&mut self, event: &str) -> usize {
        self.bridge.listeners_mut().remove_all(event)
    }

    pub fn clear_listeners(&mut self) {
        self.bridge.listeners_mut().clear();
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.bridge.listeners().len(event)
    }

    // ---------- injection ----------

    pub fn injector(&self) -> &EventInjector {
        &self.injector
    }

    pub fn rescan(&mut self, scene: &Scene) {
        self.injector.rescan(scene, &self.diagnostics);
    }

    pub fn register_events(&mut self, component: ComponentId, scene: &Scene) -> usize {
        self.injector
            .register_events(component, scene, &self.diagnostics)
    }

    // ---------- frame ----------

    pub(crate) fn update(&mut self, id: SkeletonId, dt: f32, scene: &mut Scene, outputs: &mut Outputs) {
        self.injector.initialize(scene, &self.diagnostics);

        let queued = self.runtime.drain_signals();
        self.route(id, queued, scene, outputs);

        self.runtime.update(dt);
        let fresh = self.runtime.drain_signals();
        self.route(id, fresh, scene, outputs);

        let report = self.injector.tick(&*self.runtime, scene, &self.diagnostics);
        for fired in report.fired {
            outputs.push_event(StageEvent::InjectedFired {
                skeleton: id,
                entry: fired.entry,
                target: fired.target,
                animation: fired.animation,
                callback: fired.callback,
                track_time: fired.track_time,
            });
        }
    }

    fn route(&mut self, id: SkeletonId, signals: Vec<RuntimeSignal>, scene: &mut Scene, outputs: &mut Outputs) {
        for signal in signals {
            match signal {
                RuntimeSignal::Start { entry } => {
                    if entry.track_index == self.default_track {
                        self.current_animation = Some(entry.animation_name.clone());
                        let scale = if self.paused { 0.0 } else { self.speed };
                        self.runtime.set_time_scale(entry.track_index, scale);
                    }
                    self.injector.on_start(&entry);
                    outputs.push_event(StageEvent::AnimationStarted { skeleton: id, entry });
                }
                RuntimeSignal::End { entry } => {
                    self.injector.on_end(&entry);
                    outputs.push_event(StageEvent::AnimationEnded { skeleton: id, entry });
                }
                RuntimeSignal::Complete { entry } => {
                    outputs.push_event(StageEvent::AnimationCompleted { skeleton: id, entry });
                }
                RuntimeSignal::Event { entry, event } => {
                    self.bridge
                        .deliver(self.node, &entry, &event, scene, &self.diagnostics);
                    outputs.push_event(StageEvent::NativeEvent {
                        skeleton: id,
                        entry: entry.id,
                        track_time: event.track_time,
                        name: event.name,
                    });
                }
            }
        }
    }

    /// Stop tracking everything; used when the skeleton is despawned.
    pub(crate) fn shutdown(&mut self) {
        self.injector.cancel_all();
        self.runtime.clear_tracks();
        self.runtime.drain_signals();
    }
}

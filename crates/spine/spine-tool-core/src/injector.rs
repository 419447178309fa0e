//! Per-skeleton event injector: the binding index for the components on one
//! node plus the scheduler that fires them.

use serde::{Deserialize, Serialize};

use crate::diagnostics::Diagnostics;
use crate::runtime::{AnimationRuntime, TrackEntry};
use crate::scanner::{scan, BindingIndex};
use crate::scene::{ComponentId, NodeId, Scene};
use crate::scheduler::{TickReport, TimelineScheduler, WatchState};

/// One resolved binding, flattened for listing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegisteredEvent {
    pub animation: String,
    pub callback: String,
    pub normalized_time: f32,
    pub target_type: String,
}

#[derive(Debug)]
pub struct EventInjector {
    node: NodeId,
    index: BindingIndex,
    scheduler: TimelineScheduler,
    scanned: bool,
    registered: Vec<ComponentId>,
}

impl EventInjector {
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            index: BindingIndex::new(),
            scheduler: TimelineScheduler::new(),
            scanned: false,
            registered: Vec::new(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.scanned
    }

    /// Scan the node's components once. Later calls are no-ops; use
    /// [`EventInjector::rescan`] to pick up new components.
    pub fn initialize(&mut self, scene: &Scene, diagnostics: &Diagnostics) {
        if !self.scanned {
            self.rescan(scene, diagnostics);
        }
    }

    /// Replace the index with a fresh scan of the node's components.
    /// Watches already running keep the bindings they started with.
    pub fn rescan(&mut self, scene: &Scene, diagnostics: &Diagnostics) {
        let candidates = scene.components_of(self.node);
        self.index = scan(scene, &candidates, diagnostics);
        self.registered = candidates;
        self.scanned = true;
        tracing::debug!(
            node = ?self.node,
            bindings = self.index.len(),
            "event injector scanned"
        );
    }

    /// Add the bindings of one component, e.g. one attached after
    /// initialization. Components already registered are skipped. Returns the
    /// number of bindings added.
    pub fn register_events(
        &mut self,
        component: ComponentId,
        scene: &Scene,
        diagnostics: &Diagnostics,
    ) -> usize {
        if self.registered.contains(&component) {
            return 0;
        }
        let added = scan(scene, &[component], diagnostics);
        let count = added.len();
        if scene.contains_component(component) {
            self.registered.push(component);
        }
        self.index.merge(added);
        count
    }

    /// Every resolved binding, sorted by animation then time.
    pub fn registered_events(&self) -> Vec<RegisteredEvent> {
        let mut events: Vec<RegisteredEvent> = self
            .index
            .iter()
            .map(|b| RegisteredEvent {
                animation: b.descriptor().animation_name().to_string(),
                callback: b.descriptor().callback_name().to_string(),
                normalized_time: b.descriptor().normalized_time(),
                target_type: b.target_type().to_string(),
            })
            .collect();
        events.sort_by(|a, b| {
            a.animation
                .cmp(&b.animation)
                .then(a.normalized_time.total_cmp(&b.normalized_time))
        });
        events
    }

    pub fn index(&self) -> &BindingIndex {
        &self.index
    }

    pub fn watch_state(&self, track: usize) -> WatchState {
        self.scheduler.state(track)
    }

    pub(crate) fn on_start(&mut self, entry: &TrackEntry) {
        self.scheduler.on_start(entry, &self.index);
    }

    pub(crate) fn on_end(&mut self, entry: &TrackEntry) {
        self.scheduler.on_end(entry);
    }

    pub(crate) fn cancel(&mut self, track: usize) {
        self.scheduler.cancel(track);
    }

    pub(crate) fn cancel_all(&mut self) {
        self.scheduler.cancel_all();
    }

    /// Run the scheduler, then forget targets found destroyed.
    pub(crate) fn tick(
        &mut self,
        runtime: &dyn AnimationRuntime,
        scene: &mut Scene,
        diagnostics: &Diagnostics,
    ) -> TickReport {
        let report = self.scheduler.tick(runtime, scene, diagnostics);
        for target in &report.stale {
            let removed = self.index.remove_target(*target);
            self.registered.retain(|c| c != target);
            tracing::debug!(?target, removed, "pruned bindings of destroyed target");
        }
        report
    }
}

//! Spine Tool Core (engine-agnostic)
//!
//! Binds gameplay callbacks to Spine animation time. Gameplay types declare
//! event descriptors and callable methods through [`TargetType`]; a per-skeleton
//! injector resolves them once and a scheduler fires each binding when the
//! track reaches its normalized time. Tool-authored timeline events are
//! bridged to the same callback payload, and a dual-track synchronizer plays
//! paired animations on two skeletons with a shared completion.
//!
//! The animation runtime itself sits behind [`AnimationRuntime`];
//! [`SimulatedSkeleton`] implements it over Spine JSON exports.

pub mod bridge;
pub mod config;
pub mod controller;
pub mod diagnostics;
pub mod error;
pub mod event;
pub mod ids;
pub mod injector;
pub mod outputs;
pub mod pool;
pub mod runtime;
pub mod scanner;
pub mod scene;
pub mod scheduler;
pub mod stage;
pub mod symbols;
pub mod sync;
pub mod target;

// Re-exports for consumers (hosts and adapters)
pub use bridge::{EventListeners, Listener, NativeEventBridge};
pub use config::{Config, DiagnosticsCfg};
pub use controller::AnimationController;
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use error::{ErrorKind, InvalidationReason, Result, SpineToolError};
pub use event::{EventData, EventDescriptor};
pub use ids::EntryId;
pub use injector::{EventInjector, RegisteredEvent};
pub use outputs::{Outputs, StageEvent};
pub use pool::{Handle, Pool};
pub use runtime::{
    AnimationDef, AnimationRuntime, Bone, BoneDef, EventKey, NativeEvent, RuntimeSignal,
    SimulatedSkeleton, SkeletonData, TrackEntry,
};
pub use scanner::{scan, BindingIndex, ResolvedBinding};
pub use scene::{ComponentId, NodeId, Scene, Transform, Vec3};
pub use scheduler::{TimelineScheduler, WatchState};
pub use stage::{SkeletonId, Stage};
pub use symbols::{SymbolCollection, SymbolData};
pub use sync::{CompletionReason, DualTrackSynchronizer, SyncCompletion, SyncSettings};
pub use target::{Arity, CallbackResult, EventTarget, Param, TargetType, NATIVE_EVENT_METHOD};

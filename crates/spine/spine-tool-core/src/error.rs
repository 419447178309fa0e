//! Error types for spine-tool-core.

use serde::{Deserialize, Serialize};

/// Why a watched track stopped being trackable.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvalidationReason {
    /// Track time went negative.
    TimeNegative,
    /// Track time moved backwards (scrubbed) while watching.
    TimeRegressed,
    /// A different entry now occupies the track.
    EntryReplaced,
    /// The track has no current entry.
    TrackCleared,
    /// The skeleton or callback target is gone.
    TargetDestroyed,
}

impl std::fmt::Display for InvalidationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::TimeNegative => "track time is negative",
            Self::TimeRegressed => "track time regressed",
            Self::EntryReplaced => "entry was replaced",
            Self::TrackCleared => "track was cleared",
            Self::TargetDestroyed => "target was destroyed",
        };
        f.write_str(s)
    }
}

/// Error type for scanning, scheduling, syncing and facade operations.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum SpineToolError {
    /// Descriptor names a callback the target type does not expose.
    #[error("Callback '{callback}' not found in {target_type} (animation '{animation}')")]
    BindingNotFound {
        target_type: String,
        callback: String,
        animation: String,
    },

    /// Callback exists but takes something other than () or (&EventData).
    #[error("Callback '{callback}' in {target_type} has signature ({params}); expected () or (&EventData)")]
    BindingSignatureMismatch {
        target_type: String,
        callback: String,
        params: String,
    },

    /// A resolved callback returned an error while firing.
    #[error("Failed to invoke '{callback}': {source}")]
    InvocationFailure {
        callback: String,
        #[source]
        source: anyhow::Error,
    },

    /// Tracking for a track was abandoned.
    #[error("Track {track} invalidated while watching '{animation}': {reason}")]
    TrackInvalidated {
        track: usize,
        animation: String,
        reason: InvalidationReason,
    },

    #[error("Sync partner missing: {role} is not set")]
    SyncPartnerMissing { role: &'static str },

    #[error("Sync timed out after {elapsed:.2}s waiting for '{animation}' to complete")]
    SyncTimeout { animation: String, elapsed: f32 },

    #[error("Skin not found: {name}")]
    SkinNotFound { name: String },

    #[error("Animation not found: {name}")]
    AnimationNotFound { name: String },

    #[error("Bone not found: {name}")]
    BoneNotFound { name: String },

    #[error("Symbol not found: {id}")]
    SymbolNotFound { id: String },

    #[error("Skeleton not found")]
    SkeletonNotFound,

    #[error("Node not found")]
    NodeNotFound,

    #[error("Parenting '{child}' under '{parent}' would create a cycle")]
    ParentCycle { child: String, parent: String },

    #[error("Skeleton data error: {0}")]
    SkeletonData(#[from] serde_json::Error),
}

/// Field-less mirror of [`SpineToolError`] for cheap matching in diagnostics.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    BindingNotFound,
    BindingSignatureMismatch,
    InvocationFailure,
    TrackInvalidated,
    SyncPartnerMissing,
    SyncTimeout,
    SkinNotFound,
    AnimationNotFound,
    BoneNotFound,
    SymbolNotFound,
    SkeletonNotFound,
    NodeNotFound,
    ParentCycle,
    SkeletonData,
}

impl SpineToolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BindingNotFound { .. } => ErrorKind::BindingNotFound,
            Self::BindingSignatureMismatch { .. } => ErrorKind::BindingSignatureMismatch,
            Self::InvocationFailure { .. } => ErrorKind::InvocationFailure,
            Self::TrackInvalidated { .. } => ErrorKind::TrackInvalidated,
            Self::SyncPartnerMissing { .. } => ErrorKind::SyncPartnerMissing,
            Self::SyncTimeout { .. } => ErrorKind::SyncTimeout,
            Self::SkinNotFound { .. } => ErrorKind::SkinNotFound,
            Self::AnimationNotFound { .. } => ErrorKind::AnimationNotFound,
            Self::BoneNotFound { .. } => ErrorKind::BoneNotFound,
            Self::SymbolNotFound { .. } => ErrorKind::SymbolNotFound,
            Self::SkeletonNotFound => ErrorKind::SkeletonNotFound,
            Self::NodeNotFound => ErrorKind::NodeNotFound,
            Self::ParentCycle { .. } => ErrorKind::ParentCycle,
            Self::SkeletonData(_) => ErrorKind::SkeletonData,
        }
    }
}

pub type Result<T> = std::result::Result<T, SpineToolError>;

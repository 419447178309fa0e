//! Dual-track synchronizer.
//!
//! Couples two skeletons for a paired animation (a grab and its victim, an
//! execution and its target). Starting a sync places the slave relative to
//! the master, plays both animations in the same call and then waits for the
//! master's entry to complete. A timeout backs up the completion signal.
//!
//! The synchronizer holds skeleton handles, not controllers, and is driven by
//! [`DualTrackSynchronizer::update`] after each [`Stage::update`].

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Result, SpineToolError};
use crate::ids::EntryId;
use crate::runtime::TrackEntry;
use crate::scene::{BoneFollow, NodeId, Vec3};
use crate::stage::{SkeletonId, Stage};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Parent the slave under the master (or its attach point) while syncing.
    pub parent_slave_to_master: bool,
    pub slave_local_offset: Vec3,
    /// Face the slave opposite the master.
    pub flip_slave_direction: bool,
    /// Master bone the slave attaches to instead of the master's root.
    pub attach_bone: Option<String>,
    /// Fixed timeout in seconds; by default derived from the master animation.
    pub timeout: Option<f32>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            parent_slave_to_master: true,
            slave_local_offset: Vec3::ZERO,
            flip_slave_direction: true,
            attach_bone: None,
            timeout: None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionReason {
    /// The master's entry reported completion.
    Natural,
    /// No completion arrived in time.
    Timeout,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SyncCompletion {
    pub master_animation: String,
    pub slave_animation: String,
    pub reason: CompletionReason,
}

#[derive(Debug)]
struct Session {
    master_animation: String,
    slave_animation: String,
    looping: bool,
    master_entry: EntryId,
    elapsed: f32,
    timeout: f32,
}

/// What to play on each partner.
#[derive(Copy, Clone)]
enum Source<'a> {
    Animation(&'a str),
    Symbol(&'a str),
}

type StartedFn = Box<dyn FnMut(&str, &str)>;
type CompletedFn = Box<dyn FnMut(&SyncCompletion)>;

pub struct DualTrackSynchronizer {
    settings: SyncSettings,
    default_timeout: f32,
    timeout_grace: f32,
    master: Option<SkeletonId>,
    slave: Option<SkeletonId>,
    attach_point: Option<NodeId>,
    session: Option<Session>,
    on_started: Vec<StartedFn>,
    on_completed: Vec<CompletedFn>,
}

impl std::fmt::Debug for DualTrackSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DualTrackSynchronizer")
            .field("settings", &self.settings)
            .field("master", &self.master)
            .field("slave", &self.slave)
            .field("attach_point", &self.attach_point)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl DualTrackSynchronizer {
    pub fn new(cfg: &Config, settings: SyncSettings) -> Self {
        Self {
            settings,
            default_timeout: cfg.sync_default_timeout,
            timeout_grace: cfg.sync_timeout_grace,
            master: None,
            slave: None,
            attach_point: None,
            session: None,
            on_started: Vec::new(),
            on_completed: Vec::new(),
        }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn master(&self) -> Option<SkeletonId> {
        self.master
    }

    pub fn slave(&self) -> Option<SkeletonId> {
        self.slave
    }

    pub fn attach_point(&self) -> Option<NodeId> {
        self.attach_point
    }

    pub fn is_syncing(&self) -> bool {
        self.session.is_some()
    }

    pub fn current_master_animation(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.master_animation.as_str())
    }

    pub fn current_slave_animation(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.slave_animation.as_str())
    }

    pub fn is_looping(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.looping)
    }

    /// Seconds after which an uncompleted session is forced to complete.
    pub fn timeout(&self) -> Option<f32> {
        self.session.as_ref().map(|s| s.timeout)
    }

    pub fn on_started(&mut self, f: impl FnMut(&str, &str) + 'static) {
        self.on_started.push(Box::new(f));
    }

    pub fn on_completed(&mut self, f: impl FnMut(&SyncCompletion) + 'static) {
        self.on_completed.push(Box::new(f));
    }

    /// Set the master. A configured attach bone is resolved against it.
    pub fn set_master(&mut self, stage: &mut Stage, master: SkeletonId) {
        self.master = Some(master);
        if self.settings.attach_bone.is_some() {
            self.setup_attach_point(stage);
        }
    }

    pub fn set_slave(&mut self, slave: SkeletonId) {
        self.slave = Some(slave);
    }

    /// Attach the slave to a master bone from now on.
    pub fn set_attach_bone(&mut self, stage: &mut Stage, bone: &str) {
        self.settings.attach_bone = Some(bone.to_string());
        self.setup_attach_point(stage);
    }

    /// Change the slave offset; applied immediately while syncing.
    pub fn set_slave_offset(&mut self, stage: &mut Stage, offset: Vec3) {
        self.settings.slave_local_offset = offset;
        if self.session.is_none() {
            return;
        }
        let Some(slave_node) = self.slave.and_then(|s| stage.skeleton_node(s)) else {
            return;
        };
        let placed = if self.settings.parent_slave_to_master {
            stage.scene_mut().set_local_position(slave_node, offset)
        } else {
            match self.master_world_position(stage) {
                Some(origin) => stage.scene_mut().set_world_position(slave_node, origin + offset),
                None => Ok(()),
            }
        };
        if let Err(err) = placed {
            stage.diagnostics().warn(&err);
        }
    }

    fn setup_attach_point(&mut self, stage: &mut Stage) {
        let Some(bone) = self.settings.attach_bone.clone() else {
            return;
        };
        let Some(master) = self.master else {
            return;
        };
        let Some(master_node) = stage.skeleton_node(master) else {
            return;
        };

        let found = stage
            .controller(master)
            .and_then(|c| c.runtime().find_bone(&bone))
            .is_some();
        let point = if found {
            Some(Self::spawn_attach_point(stage, master, master_node, &bone))
        } else {
            stage
                .diagnostics()
                .warn(&SpineToolError::BoneNotFound { name: bone });
            None
        };

        if let Some(old) = self.attach_point.take() {
            self.retire_attach_point(stage, old, point.unwrap_or(master_node));
        }
        self.attach_point = point;
    }

    fn spawn_attach_point(
        stage: &mut Stage,
        master: SkeletonId,
        master_node: NodeId,
        bone: &str,
    ) -> NodeId {
        let point = stage.scene_mut().spawn_node(format!("AttachPoint_{bone}"));
        if let Err(err) = stage.scene_mut().set_parent(point, Some(master_node)) {
            stage.diagnostics().warn(&err);
        }
        if let Some(position) = stage.bone_world_position(master, bone) {
            let _ = stage.scene_mut().set_world_position(point, position);
        }
        if let Some(node) = stage.scene_mut().node_mut(point) {
            node.follow = Some(BoneFollow {
                skeleton: master,
                bone: bone.to_string(),
            });
        }
        tracing::debug!(%bone, "attach point created");
        point
    }

    /// Move everything hanging off `old` onto `anchor`, then drop `old`.
    /// A parented slave keeps its offset relative to the new anchor.
    fn retire_attach_point(&self, stage: &mut Stage, old: NodeId, anchor: NodeId) {
        let slave_node = self.slave.and_then(|s| stage.skeleton_node(s));
        let children = stage
            .scene()
            .node(old)
            .map(|n| n.children().to_vec())
            .unwrap_or_default();
        for child in children {
            let scene = stage.scene_mut();
            let moved = scene.set_parent(child, Some(anchor)).and_then(|()| {
                if self.session.is_some() && Some(child) == slave_node {
                    scene.set_local_position(child, self.settings.slave_local_offset)?;
                }
                Ok(())
            });
            if let Err(err) = moved {
                stage.diagnostics().warn(&err);
            }
        }
        stage.scene_mut().despawn_node(old);
    }

    /// Play `master_animation` on the master and `slave_animation` on the
    /// slave, with the slave placed relative to the master. A running
    /// session is stopped first.
    pub fn start_sync(
        &mut self,
        stage: &mut Stage,
        master_animation: &str,
        slave_animation: &str,
        looping: bool,
    ) -> Result<()> {
        self.begin(
            stage,
            Source::Animation(master_animation),
            Source::Animation(slave_animation),
            looping,
        )
    }

    /// Like [`DualTrackSynchronizer::start_sync`], resolving each side
    /// through its controller's symbol collection.
    pub fn start_sync_by_symbol(
        &mut self,
        stage: &mut Stage,
        master_symbol: &str,
        slave_symbol: &str,
        looping: bool,
    ) -> Result<()> {
        self.begin(
            stage,
            Source::Symbol(master_symbol),
            Source::Symbol(slave_symbol),
            looping,
        )
    }

    fn partners(&self, stage: &Stage) -> Result<(SkeletonId, SkeletonId)> {
        let master = self
            .master
            .filter(|m| stage.contains_skeleton(*m))
            .ok_or(SpineToolError::SyncPartnerMissing { role: "master" })?;
        let slave = self
            .slave
            .filter(|s| stage.contains_skeleton(*s))
            .ok_or(SpineToolError::SyncPartnerMissing { role: "slave" })?;
        Ok((master, slave))
    }

    /// Resolve `source` to an animation name `skeleton` can play.
    fn resolve(stage: &Stage, skeleton: SkeletonId, source: Source<'_>) -> Result<String> {
        let controller = stage
            .controller(skeleton)
            .ok_or(SpineToolError::SkeletonNotFound)?;
        let animation = match source {
            Source::Animation(name) => name.to_string(),
            Source::Symbol(id) => controller
                .symbols()
                .and_then(|s| s.get(id))
                .map(|s| s.animation_name.clone())
                .ok_or_else(|| SpineToolError::SymbolNotFound { id: id.to_string() })?,
        };
        if !controller.has_animation(&animation) {
            return Err(SpineToolError::AnimationNotFound { name: animation });
        }
        Ok(animation)
    }

    fn play(stage: &mut Stage, skeleton: SkeletonId, source: Source<'_>, looping: bool) -> Result<TrackEntry> {
        let controller = stage.try_controller_mut(skeleton)?;
        match source {
            Source::Animation(name) => controller.play(name, looping),
            Source::Symbol(id) => controller.play_symbol(id, looping),
        }
    }

    fn begin(
        &mut self,
        stage: &mut Stage,
        master_source: Source<'_>,
        slave_source: Source<'_>,
        looping: bool,
    ) -> Result<()> {
        let checked = self.partners(stage).and_then(|(master, slave)| {
            let master_animation = Self::resolve(stage, master, master_source)?;
            let slave_animation = Self::resolve(stage, slave, slave_source)?;
            Ok((master, slave, master_animation, slave_animation))
        });
        let (master, slave, master_animation, slave_animation) = match checked {
            Ok(plan) => plan,
            Err(err) => {
                stage.diagnostics().error(&err);
                return Err(err);
            }
        };

        if self.session.is_some() {
            self.stop_sync(stage);
        }

        self.setup_slave_transform(stage, master, slave);

        let master_entry = Self::play(stage, master, master_source, looping)?;
        if let Err(err) = Self::play(stage, slave, slave_source, looping) {
            stage.diagnostics().warn(&err);
        }

        let timeout = self.settings.timeout.unwrap_or_else(|| {
            let speed = stage.controller(master).map_or(1.0, |c| c.speed());
            let length = if speed > 0.0 {
                master_entry.duration / speed
            } else {
                master_entry.duration
            };
            if length > 0.0 {
                length + self.timeout_grace
            } else {
                self.default_timeout
            }
        });

        self.session = Some(Session {
            master_animation: master_animation.clone(),
            slave_animation: slave_animation.clone(),
            looping,
            master_entry: master_entry.id,
            elapsed: 0.0,
            timeout,
        });
        tracing::info!(
            master = %master_animation,
            slave = %slave_animation,
            looping,
            timeout,
            "sync started"
        );
        for f in &mut self.on_started {
            f(&master_animation, &slave_animation);
        }
        Ok(())
    }

    fn master_world_position(&self, stage: &Stage) -> Option<Vec3> {
        let node = self.master.and_then(|m| stage.skeleton_node(m))?;
        stage.scene().world_transform(node).map(|t| t.position)
    }

    fn setup_slave_transform(&mut self, stage: &mut Stage, master: SkeletonId, slave: SkeletonId) {
        let (Some(master_node), Some(slave_node)) =
            (stage.skeleton_node(master), stage.skeleton_node(slave))
        else {
            return;
        };
        let offset = self.settings.slave_local_offset;
        let flip = self.settings.flip_slave_direction;

        let placed = if self.settings.parent_slave_to_master {
            let parent = self
                .attach_point
                .filter(|p| stage.scene().contains_node(*p))
                .unwrap_or(master_node);
            let scene = stage.scene_mut();
            scene.set_parent(slave_node, Some(parent)).and_then(|()| {
                scene.set_local_position(slave_node, offset)?;
                if flip {
                    let mut scale = scene
                        .node(slave_node)
                        .map_or(Vec3::ONE, |n| n.local.scale);
                    scale.x = -scale.x.abs();
                    scene.set_local_scale(slave_node, scale)?;
                }
                Ok(())
            })
        } else {
            let origin = stage
                .scene()
                .world_transform(master_node)
                .map_or(Vec3::ZERO, |t| t.position);
            let master_scale_x = stage
                .scene()
                .node(master_node)
                .map_or(1.0, |n| n.local.scale.x);
            let scene = stage.scene_mut();
            scene
                .set_world_position(slave_node, origin + offset)
                .and_then(|()| {
                    if flip {
                        let mut scale = scene
                            .node(slave_node)
                            .map_or(Vec3::ONE, |n| n.local.scale);
                        scale.x = -master_scale_x.signum() * scale.x.abs();
                        scene.set_local_scale(slave_node, scale)?;
                    }
                    Ok(())
                })
        };
        if let Err(err) = placed {
            stage.diagnostics().warn(&err);
        }
    }

    fn release_slave(&self, stage: &mut Stage) {
        if !self.settings.parent_slave_to_master {
            return;
        }
        let Some(slave_node) = self.slave.and_then(|s| stage.skeleton_node(s)) else {
            return;
        };
        if let Err(err) = stage.scene_mut().set_parent(slave_node, None) {
            stage.diagnostics().warn(&err);
        }
        tracing::debug!("slave released");
    }

    /// Stop both animations and release the slave. Completion is not raised.
    pub fn stop_sync(&mut self, stage: &mut Stage) {
        let Some(session) = self.session.take() else {
            return;
        };
        for skeleton in [self.master, self.slave].into_iter().flatten() {
            if let Some(controller) = stage.controller_mut(skeleton) {
                controller.stop();
            }
        }
        self.release_slave(stage);
        tracing::info!(
            master = %session.master_animation,
            slave = %session.slave_animation,
            "sync stopped"
        );
    }

    /// Observe the frame's outputs and advance the timeout. Call once per
    /// frame after [`Stage::update`] with the same `dt`.
    pub fn update(&mut self, stage: &mut Stage, dt: f32) -> Option<SyncCompletion> {
        let session = self.session.as_mut()?;

        let Some(master) = self.master.filter(|m| stage.contains_skeleton(*m)) else {
            stage
                .diagnostics()
                .warn(&SpineToolError::SyncPartnerMissing { role: "master" });
            self.session = None;
            self.release_slave(stage);
            return None;
        };

        let completed = stage
            .outputs()
            .completions(master)
            .any(|e| e.id == session.master_entry);
        let reason = if completed {
            CompletionReason::Natural
        } else {
            session.elapsed += dt;
            if session.elapsed < session.timeout {
                return None;
            }
            stage.diagnostics().warn(&SpineToolError::SyncTimeout {
                animation: session.master_animation.clone(),
                elapsed: session.elapsed,
            });
            CompletionReason::Timeout
        };

        let session = self.session.take()?;
        self.release_slave(stage);
        let completion = SyncCompletion {
            master_animation: session.master_animation,
            slave_animation: session.slave_animation,
            reason,
        };
        tracing::info!(
            master = %completion.master_animation,
            reason = ?completion.reason,
            "sync completed"
        );
        for f in &mut self.on_completed {
            f(&completion);
        }
        Some(completion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::runtime::{AnimationDef, SimulatedSkeleton, SkeletonData};

    fn skeleton(animation: &str, duration: f32) -> SimulatedSkeleton {
        SimulatedSkeleton::new(SkeletonData::new().with_animation(AnimationDef::new(animation, duration)))
    }

    #[test]
    fn missing_partner_leaves_state_untouched() {
        let mut stage = Stage::default();
        let master = stage.spawn_skeleton("master", skeleton("grab", 1.0));
        let mut sync = DualTrackSynchronizer::new(stage.config(), SyncSettings::default());
        sync.set_master(&mut stage, master);

        let err = sync.start_sync(&mut stage, "grab", "grabbed", false).unwrap_err();
        assert!(matches!(err, SpineToolError::SyncPartnerMissing { role: "slave" }));
        assert!(!sync.is_syncing());
        assert!(stage.controller(master).unwrap().current_entry().is_none());
        assert!(stage.diagnostics().has(ErrorKind::SyncPartnerMissing));
    }

    #[test]
    fn unknown_animation_is_rejected_before_playing() {
        let mut stage = Stage::default();
        let master = stage.spawn_skeleton("master", skeleton("grab", 1.0));
        let slave = stage.spawn_skeleton("slave", skeleton("grabbed", 1.0));
        let mut sync = DualTrackSynchronizer::new(stage.config(), SyncSettings::default());
        sync.set_master(&mut stage, master);
        sync.set_slave(slave);

        assert!(sync.start_sync(&mut stage, "grab", "flail", false).is_err());
        assert!(!sync.is_syncing());
        assert!(stage.controller(master).unwrap().current_entry().is_none());
        let slave_node = stage.skeleton_node(slave).unwrap();
        assert!(stage.scene().node(slave_node).unwrap().parent().is_none());
    }

    #[test]
    fn timeout_uses_master_length_plus_grace() {
        let mut stage = Stage::default();
        let master = stage.spawn_skeleton("master", skeleton("grab", 1.0));
        let slave = stage.spawn_skeleton("slave", skeleton("grabbed", 1.0));
        let mut sync = DualTrackSynchronizer::new(stage.config(), SyncSettings::default());
        sync.set_master(&mut stage, master);
        sync.set_slave(slave);
        sync.start_sync(&mut stage, "grab", "grabbed", false).unwrap();
        assert_eq!(sync.timeout(), Some(1.25));
    }
}

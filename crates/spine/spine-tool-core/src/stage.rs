//! Composition root.
//!
//! A [`Stage`] owns the scene, every skeleton's [`AnimationController`], the
//! shared diagnostics sink and the per-frame [`Outputs`]. Hosts call
//! [`Stage::update`] once per frame; synchronizers run after it.

use crate::config::Config;
use crate::controller::AnimationController;
use crate::diagnostics::Diagnostics;
use crate::error::{Result, SpineToolError};
use crate::outputs::Outputs;
use crate::pool::{Handle, Pool};
use crate::runtime::AnimationRuntime;
use crate::scene::{ComponentId, NodeId, Scene, Vec3};
use crate::target::EventTarget;

pub type SkeletonId = Handle<AnimationController>;

#[derive(Debug)]
pub struct Stage {
    cfg: Config,
    scene: Scene,
    skeletons: Pool<AnimationController>,
    diagnostics: Diagnostics,
    outputs: Outputs,
}

impl Default for Stage {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Stage {
    pub fn new(cfg: Config) -> Self {
        let diagnostics = Diagnostics::new(cfg.diagnostics.clone());
        Self {
            cfg,
            scene: Scene::new(),
            skeletons: Pool::new(),
            diagnostics,
            outputs: Outputs::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Bind an animation runtime to an existing node.
    pub fn add_skeleton(
        &mut self,
        node: NodeId,
        runtime: impl AnimationRuntime + 'static,
    ) -> Result<SkeletonId> {
        if !self.scene.contains_node(node) {
            return Err(SpineToolError::NodeNotFound);
        }
        let controller =
            AnimationController::new(node, Box::new(runtime), &self.cfg, self.diagnostics.clone());
        let id = self.skeletons.spawn(controller);
        tracing::debug!(?id, ?node, "skeleton added");
        Ok(id)
    }

    /// Spawn a node named `name` and bind `runtime` to it.
    pub fn spawn_skeleton(
        &mut self,
        name: &str,
        runtime: impl AnimationRuntime + 'static,
    ) -> SkeletonId {
        let node = self.scene.spawn_node(name);
        let controller =
            AnimationController::new(node, Box::new(runtime), &self.cfg, self.diagnostics.clone());
        self.skeletons.spawn(controller)
    }

    pub fn contains_skeleton(&self, id: SkeletonId) -> bool {
        self.skeletons.is_valid(id)
    }

    pub fn controller(&self, id: SkeletonId) -> Option<&AnimationController> {
        self.skeletons.get(id)
    }

    pub fn controller_mut(&mut self, id: SkeletonId) -> Option<&mut AnimationController> {
        self.skeletons.get_mut(id)
    }

    pub fn try_controller_mut(&mut self, id: SkeletonId) -> Result<&mut AnimationController> {
        self.skeletons
            .get_mut(id)
            .ok_or(SpineToolError::SkeletonNotFound)
    }

    pub fn skeleton_node(&self, id: SkeletonId) -> Option<NodeId> {
        self.skeletons.get(id).map(AnimationController::node)
    }

    /// The skeleton bound to `node`, if any.
    pub fn skeleton_of(&self, node: NodeId) -> Option<SkeletonId> {
        self.skeletons
            .iter()
            .find(|(_, c)| c.node() == node)
            .map(|(id, _)| id)
    }

    /// Attach a gameplay component to `node`.
    pub fn attach<T: EventTarget>(&mut self, node: NodeId, value: T) -> Result<ComponentId> {
        self.scene.attach(node, value)
    }

    /// Register a component attached after the skeleton's first update.
    pub fn register_events(&mut self, skeleton: SkeletonId, component: ComponentId) -> Result<usize> {
        let controller = self
            .skeletons
            .get_mut(skeleton)
            .ok_or(SpineToolError::SkeletonNotFound)?;
        Ok(controller.register_events(component, &self.scene))
    }

    /// Re-scan the components on a skeleton's node.
    pub fn rescan(&mut self, skeleton: SkeletonId) -> Result<()> {
        let controller = self
            .skeletons
            .get_mut(skeleton)
            .ok_or(SpineToolError::SkeletonNotFound)?;
        controller.rescan(&self.scene);
        Ok(())
    }

    /// World position of `bone` on `skeleton`: the bone's skeleton-space
    /// position placed through the skeleton node's world transform.
    pub fn bone_world_position(&self, skeleton: SkeletonId, bone: &str) -> Option<Vec3> {
        let controller = self.skeletons.get(skeleton)?;
        let bone = controller.runtime().find_bone(bone)?;
        let world = self.scene.world_transform(controller.node())?;
        Some(world.position + world.scale * bone.position)
    }

    /// Step every skeleton by `dt` seconds, then move bone-following nodes.
    pub fn update(&mut self, dt: f32) -> &Outputs {
        self.outputs.clear();

        for id in self.skeletons.handles() {
            let Some(controller) = self.skeletons.get_mut(id) else {
                continue;
            };
            if !self.scene.contains_node(controller.node()) {
                controller.shutdown();
                self.skeletons.free(id);
                tracing::debug!(?id, "skeleton dropped with its node");
                continue;
            }
            controller.update(id, dt, &mut self.scene, &mut self.outputs);
        }

        for (node, follow) in self.scene.bone_followers() {
            if let Some(position) = self.bone_world_position(follow.skeleton, &follow.bone) {
                // The node exists; it was just listed.
                let _ = self.scene.set_world_position(node, position);
            }
        }

        &self.outputs
    }

    /// Outputs of the last [`Stage::update`].
    pub fn outputs(&self) -> &Outputs {
        &self.outputs
    }

    /// Remove `node`, its descendants, their components and any skeleton
    /// bound to them. Tracking for removed skeletons is cancelled.
    pub fn despawn(&mut self, node: NodeId) -> Vec<NodeId> {
        let removed = self.scene.despawn_node(node);
        let doomed: Vec<SkeletonId> = self
            .skeletons
            .iter()
            .filter(|(_, c)| removed.contains(&c.node()))
            .map(|(id, _)| id)
            .collect();
        for id in doomed {
            if let Some(mut controller) = self.skeletons.free(id) {
                controller.shutdown();
            }
            tracing::debug!(?id, "skeleton despawned");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{AnimationDef, BoneDef, SimulatedSkeleton, SkeletonData};
    use crate::scene::BoneFollow;

    fn runtime() -> SimulatedSkeleton {
        SimulatedSkeleton::new(
            SkeletonData::new()
                .with_bone(BoneDef {
                    name: "hand".into(),
                    parent: None,
                    x: 2.0,
                    y: 1.0,
                })
                .with_animation(AnimationDef::new("idle", 1.0)),
        )
    }

    #[test]
    fn despawn_drops_skeleton_and_children() {
        let mut stage = Stage::default();
        let hero = stage.spawn_skeleton("hero", runtime());
        let node = stage.skeleton_node(hero).unwrap();
        assert_eq!(stage.skeleton_of(node), Some(hero));

        let removed = stage.despawn(node);
        assert_eq!(removed, [node]);
        assert!(!stage.contains_skeleton(hero));
        assert!(stage.update(0.1).is_empty());
    }

    #[test]
    fn bone_followers_track_the_skeleton() {
        let mut stage = Stage::default();
        let hero = stage.spawn_skeleton("hero", runtime());
        let node = stage.skeleton_node(hero).unwrap();
        stage
            .scene_mut()
            .set_local_position(node, Vec3::new(10.0, 0.0, 0.0))
            .unwrap();
        stage
            .scene_mut()
            .set_local_scale(node, Vec3::new(-1.0, 1.0, 1.0))
            .unwrap();

        let point = stage.scene_mut().spawn_node("point");
        stage.scene_mut().node_mut(point).unwrap().follow = Some(BoneFollow {
            skeleton: hero,
            bone: "hand".into(),
        });
        stage.update(0.0);
        assert_eq!(
            stage.scene().world_transform(point).unwrap().position,
            Vec3::new(8.0, 1.0, 0.0)
        );
    }

    #[test]
    fn skeleton_is_dropped_when_its_node_goes_away() {
        let mut stage = Stage::default();
        let hero = stage.spawn_skeleton("hero", runtime());
        let node = stage.skeleton_node(hero).unwrap();
        stage.scene_mut().despawn_node(node);
        stage.update(0.1);
        assert!(!stage.contains_skeleton(hero));
        assert!(stage.add_skeleton(node, runtime()).is_err());
    }
}

//! Scene graph: named nodes with local transforms, and the gameplay
//! components attached to them.
//!
//! Nodes form a parent/child hierarchy (slaves are parented under masters
//! during a sync). Components are the gameplay objects whose callbacks get
//! bound; they are stored type-erased next to their type's tables.

use std::any::{Any, TypeId};
use std::ops::{Add, Mul, Sub};
use std::rc::Rc;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SpineToolError};
use crate::event::EventData;
use crate::pool::{Handle, Pool};
use crate::stage::SkeletonId;
use crate::target::{EventTarget, Invoker, TargetMeta};

pub type NodeId = Handle<Node>;
pub type ComponentId = Handle<Component>;

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);
    pub const ONE: Vec3 = Vec3::new(1.0, 1.0, 1.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Component-wise division; zero divisors yield zero.
    fn div_or_zero(self, rhs: Vec3) -> Vec3 {
        let d = |a: f32, b: f32| if b == 0.0 { 0.0 } else { a / b };
        Vec3::new(d(self.x, rhs.x), d(self.y, rhs.y), d(self.z, rhs.z))
    }
}

impl Add for Vec3 {
    type Output = Vec3;
    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

/// Component-wise product.
impl Mul for Vec3 {
    type Output = Vec3;
    fn mul(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x * rhs.x, self.y * rhs.y, self.z * rhs.z)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// Express `self` (parent space) composed with a child's local transform.
    fn compose(&self, local: &Transform) -> Transform {
        Transform {
            position: self.position + self.scale * local.position,
            scale: self.scale * local.scale,
        }
    }

    /// Inverse of [`Transform::compose`]: the local transform that places a
    /// child at `world` under `self`.
    fn relative(&self, world: &Transform) -> Transform {
        Transform {
            position: (world.position - self.position).div_or_zero(self.scale),
            scale: world.scale.div_or_zero(self.scale),
        }
    }
}

/// Makes a node track a skeleton bone's position every frame.
#[derive(Clone, Debug)]
pub struct BoneFollow {
    pub skeleton: SkeletonId,
    pub bone: String,
}

#[derive(Debug)]
pub struct Node {
    name: String,
    pub local: Transform,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    components: Vec<ComponentId>,
    pub follow: Option<BoneFollow>,
}

impl Node {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn components(&self) -> &[ComponentId] {
        &self.components
    }
}

/// A gameplay object attached to a node.
pub struct Component {
    node: NodeId,
    value: Box<dyn Any>,
    meta: Rc<TargetMeta>,
}

impl Component {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn type_name(&self) -> &'static str {
        self.meta.type_name
    }

    pub(crate) fn meta(&self) -> &Rc<TargetMeta> {
        &self.meta
    }
}

impl std::fmt::Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Component")
            .field("node", &self.node)
            .field("type", &self.meta.type_name)
            .finish()
    }
}

/// Outcome of calling into a component that failed.
#[derive(Debug)]
pub(crate) enum InvokeError {
    /// The component no longer exists.
    Destroyed,
    Failed(anyhow::Error),
}

#[derive(Debug, Default)]
pub struct Scene {
    nodes: Pool<Node>,
    components: Pool<Component>,
    metas: HashMap<TypeId, Rc<TargetMeta>>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn_node(&mut self, name: impl Into<String>) -> NodeId {
        self.nodes.spawn(Node {
            name: name.into(),
            local: Transform::default(),
            parent: None,
            children: Vec::new(),
            components: Vec::new(),
            follow: None,
        })
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.is_valid(id)
    }

    /// Find the first live node with `name`.
    pub fn find_node(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|(_, n)| n.name == name)
            .map(|(h, _)| h)
    }

    /// Attach a gameplay object to `node`. The type's tables are built once
    /// per type and shared by every instance.
    pub fn attach<T: EventTarget>(&mut self, node: NodeId, value: T) -> Result<ComponentId> {
        if !self.nodes.is_valid(node) {
            return Err(SpineToolError::NodeNotFound);
        }
        let meta = self
            .metas
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Rc::new(T::target_type().erase()))
            .clone();
        let id = self.components.spawn(Component {
            node,
            value: Box::new(value),
            meta,
        });
        if let Some(n) = self.nodes.get_mut(node) {
            n.components.push(id);
        }
        Ok(id)
    }

    /// Remove one component. Bindings that point at it go stale.
    pub fn detach(&mut self, id: ComponentId) -> bool {
        match self.components.free(id) {
            Some(component) => {
                if let Some(n) = self.nodes.get_mut(component.node) {
                    n.components.retain(|c| *c != id);
                }
                true
            }
            None => false,
        }
    }

    pub fn component(&self, id: ComponentId) -> Option<&Component> {
        self.components.get(id)
    }

    pub fn contains_component(&self, id: ComponentId) -> bool {
        self.components.is_valid(id)
    }

    pub fn get<T: 'static>(&self, id: ComponentId) -> Option<&T> {
        self.components.get(id)?.value.downcast_ref::<T>()
    }

    pub fn get_mut<T: 'static>(&mut self, id: ComponentId) -> Option<&mut T> {
        self.components.get_mut(id)?.value.downcast_mut::<T>()
    }

    /// Components of `node` in attach order.
    pub fn components_of(&self, node: NodeId) -> Vec<ComponentId> {
        self.nodes
            .get(node)
            .map(|n| n.components.clone())
            .unwrap_or_default()
    }

    pub(crate) fn invoke(
        &mut self,
        id: ComponentId,
        invoker: &Invoker,
        data: &EventData,
    ) -> std::result::Result<(), InvokeError> {
        let component = self.components.get_mut(id).ok_or(InvokeError::Destroyed)?;
        invoker
            .call(&mut *component.value, data)
            .map_err(InvokeError::Failed)
    }

    /// Remove `node`, its descendants and all their components. Returns the
    /// removed node ids, parents before children.
    pub fn despawn_node(&mut self, id: NodeId) -> Vec<NodeId> {
        let mut removed = Vec::new();
        if !self.nodes.is_valid(id) {
            return removed;
        }
        if let Some(parent) = self.nodes.get(id).and_then(|n| n.parent) {
            if let Some(p) = self.nodes.get_mut(parent) {
                p.children.retain(|c| *c != id);
            }
        }
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.free(current) {
                for component in node.components {
                    self.components.free(component);
                }
                stack.extend(node.children);
                removed.push(current);
            }
        }
        removed
    }

    /// World transform, composed through the parent chain.
    pub fn world_transform(&self, id: NodeId) -> Option<Transform> {
        let node = self.nodes.get(id)?;
        match node.parent {
            Some(parent) => {
                let parent_world = self.world_transform(parent)?;
                Some(parent_world.compose(&node.local))
            }
            None => Some(node.local),
        }
    }

    /// Reparent `child`, keeping its world transform. `None` detaches it to the root.
    pub fn set_parent(&mut self, child: NodeId, parent: Option<NodeId>) -> Result<()> {
        let world = self
            .world_transform(child)
            .ok_or(SpineToolError::NodeNotFound)?;

        if let Some(p) = parent {
            if !self.nodes.is_valid(p) {
                return Err(SpineToolError::NodeNotFound);
            }
            let mut cursor = Some(p);
            while let Some(c) = cursor {
                if c == child {
                    return Err(SpineToolError::ParentCycle {
                        child: self.name_of(child),
                        parent: self.name_of(p),
                    });
                }
                cursor = self.nodes.get(c).and_then(|n| n.parent);
            }
        }

        let old_parent = self.nodes.get(child).and_then(|n| n.parent);
        if let Some(old) = old_parent {
            if let Some(o) = self.nodes.get_mut(old) {
                o.children.retain(|c| *c != child);
            }
        }

        let local = match parent {
            Some(p) => {
                let parent_world = self
                    .world_transform(p)
                    .ok_or(SpineToolError::NodeNotFound)?;
                if let Some(pn) = self.nodes.get_mut(p) {
                    pn.children.push(child);
                }
                parent_world.relative(&world)
            }
            None => world,
        };

        let node = self.nodes.get_mut(child).ok_or(SpineToolError::NodeNotFound)?;
        node.parent = parent;
        node.local = local;
        Ok(())
    }

    pub fn set_local_position(&mut self, id: NodeId, position: Vec3) -> Result<()> {
        let node = self.nodes.get_mut(id).ok_or(SpineToolError::NodeNotFound)?;
        node.local.position = position;
        Ok(())
    }

    pub fn set_local_scale(&mut self, id: NodeId, scale: Vec3) -> Result<()> {
        let node = self.nodes.get_mut(id).ok_or(SpineToolError::NodeNotFound)?;
        node.local.scale = scale;
        Ok(())
    }

    /// Place `id` at a world position regardless of its parent.
    pub fn set_world_position(&mut self, id: NodeId, position: Vec3) -> Result<()> {
        let parent = self
            .nodes
            .get(id)
            .ok_or(SpineToolError::NodeNotFound)?
            .parent;
        let local = match parent.and_then(|p| self.world_transform(p)) {
            Some(parent_world) => (position - parent_world.position).div_or_zero(parent_world.scale),
            None => position,
        };
        self.set_local_position(id, local)
    }

    /// Nodes that follow a bone, with the follow target.
    pub(crate) fn bone_followers(&self) -> Vec<(NodeId, BoneFollow)> {
        self.nodes
            .iter()
            .filter_map(|(h, n)| n.follow.clone().map(|f| (h, f)))
            .collect()
    }

    fn name_of(&self, id: NodeId) -> String {
        self.nodes
            .get(id)
            .map(|n| n.name.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reparenting_keeps_world_position() {
        let mut scene = Scene::new();
        let master = scene.spawn_node("master");
        let slave = scene.spawn_node("slave");
        scene.set_local_position(master, Vec3::new(10.0, 0.0, 0.0)).unwrap();
        scene.set_local_scale(master, Vec3::new(2.0, 1.0, 1.0)).unwrap();
        scene.set_local_position(slave, Vec3::new(14.0, 3.0, 0.0)).unwrap();

        scene.set_parent(slave, Some(master)).unwrap();
        let local = scene.node(slave).unwrap().local;
        assert_eq!(local.position, Vec3::new(2.0, 3.0, 0.0));
        assert_eq!(local.scale, Vec3::new(0.5, 1.0, 1.0));
        assert_eq!(
            scene.world_transform(slave).unwrap().position,
            Vec3::new(14.0, 3.0, 0.0)
        );
        assert_eq!(scene.node(master).unwrap().children(), &[slave]);

        scene.set_parent(slave, None).unwrap();
        assert!(scene.node(slave).unwrap().parent().is_none());
        assert!(scene.node(master).unwrap().children().is_empty());
        assert_eq!(scene.node(slave).unwrap().local.position, Vec3::new(14.0, 3.0, 0.0));
    }

    #[test]
    fn cycles_are_rejected() {
        let mut scene = Scene::new();
        let a = scene.spawn_node("a");
        let b = scene.spawn_node("b");
        scene.set_parent(b, Some(a)).unwrap();
        let err = scene.set_parent(a, Some(b)).unwrap_err();
        assert!(matches!(err, SpineToolError::ParentCycle { .. }));
    }

    #[test]
    fn despawn_removes_descendants() {
        let mut scene = Scene::new();
        let root = scene.spawn_node("root");
        let child = scene.spawn_node("child");
        let grandchild = scene.spawn_node("grandchild");
        scene.set_parent(child, Some(root)).unwrap();
        scene.set_parent(grandchild, Some(child)).unwrap();

        let removed = scene.despawn_node(child);
        assert_eq!(removed.len(), 2);
        assert!(scene.contains_node(root));
        assert!(!scene.contains_node(grandchild));
        assert!(scene.node(root).unwrap().children().is_empty());
        assert_eq!(scene.find_node("root"), Some(root));
    }
}

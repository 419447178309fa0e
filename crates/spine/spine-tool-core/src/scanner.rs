//! Descriptor scanner: resolves declared descriptors to invocable bindings.

use hashbrown::HashMap;

use crate::diagnostics::Diagnostics;
use crate::error::SpineToolError;
use crate::event::EventDescriptor;
use crate::scene::{ComponentId, Scene};
use crate::target::{Arity, Invoker, Param};

/// A descriptor whose callback was found on its target with a bindable
/// signature.
#[derive(Clone, Debug)]
pub struct ResolvedBinding {
    pub(crate) descriptor: EventDescriptor,
    pub(crate) target: ComponentId,
    pub(crate) target_type: &'static str,
    pub(crate) invoker: Invoker,
    pub(crate) arity: Arity,
}

impl ResolvedBinding {
    pub fn descriptor(&self) -> &EventDescriptor {
        &self.descriptor
    }

    pub fn target(&self) -> ComponentId {
        self.target
    }

    pub fn target_type(&self) -> &'static str {
        self.target_type
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }
}

/// Resolved bindings grouped by animation name, in declaration order.
#[derive(Clone, Debug, Default)]
pub struct BindingIndex {
    by_animation: HashMap<String, Vec<ResolvedBinding>>,
}

impl BindingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bindings for `animation`; empty when none were resolved.
    pub fn get(&self, animation: &str) -> &[ResolvedBinding] {
        self.by_animation
            .get(animation)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Total number of bindings across all animations.
    pub fn len(&self) -> usize {
        self.by_animation.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Animation names with at least one binding, sorted.
    pub fn animation_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .by_animation
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, _)| k.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedBinding> {
        self.by_animation.values().flatten()
    }

    pub fn contains_target(&self, target: ComponentId) -> bool {
        self.iter().any(|b| b.target == target)
    }

    /// Drop every binding that points at `target`. Returns how many went.
    pub fn remove_target(&mut self, target: ComponentId) -> usize {
        let mut removed = 0;
        for bindings in self.by_animation.values_mut() {
            let before = bindings.len();
            bindings.retain(|b| b.target != target);
            removed += before - bindings.len();
        }
        self.by_animation.retain(|_, v| !v.is_empty());
        removed
    }

    /// Append `other`'s bindings, keeping order within each animation.
    pub fn merge(&mut self, other: BindingIndex) {
        for (animation, bindings) in other.by_animation {
            self.by_animation
                .entry(animation)
                .or_default()
                .extend(bindings);
        }
    }

    fn push(&mut self, binding: ResolvedBinding) {
        self.by_animation
            .entry(binding.descriptor.animation_name().to_string())
            .or_default()
            .push(binding);
    }
}

fn describe(params: &[Param]) -> String {
    params
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Resolve the descriptors of every candidate component.
///
/// Unresolvable descriptors are reported as warnings and skipped. Candidates
/// that no longer exist, or appear twice, are ignored.
pub fn scan(scene: &Scene, candidates: &[ComponentId], diagnostics: &Diagnostics) -> BindingIndex {
    let mut index = BindingIndex::new();
    let mut seen: Vec<ComponentId> = Vec::with_capacity(candidates.len());

    for &id in candidates {
        if seen.contains(&id) {
            continue;
        }
        seen.push(id);
        let Some(component) = scene.component(id) else {
            continue;
        };
        let meta = component.meta();

        for descriptor in &meta.descriptors {
            let Some(method) = meta.method(descriptor.callback_name()) else {
                diagnostics.warn(&SpineToolError::BindingNotFound {
                    target_type: meta.type_name.to_string(),
                    callback: descriptor.callback_name().to_string(),
                    animation: descriptor.animation_name().to_string(),
                });
                continue;
            };

            let shape_ok = matches!(
                (method.params.as_slice(), &method.invoker),
                ([], Invoker::Plain(_)) | ([Param::EventData], Invoker::WithEvent(_))
            );
            let arity = match (shape_ok, method.invoker.arity()) {
                (true, Some(arity)) => arity,
                _ => {
                    diagnostics.warn(&SpineToolError::BindingSignatureMismatch {
                        target_type: meta.type_name.to_string(),
                        callback: method.name.clone(),
                        params: describe(&method.params),
                    });
                    continue;
                }
            };

            tracing::debug!(
                target_type = meta.type_name,
                animation = descriptor.animation_name(),
                callback = descriptor.callback_name(),
                time = descriptor.normalized_time(),
                "binding resolved"
            );
            index.push(ResolvedBinding {
                descriptor: descriptor.clone(),
                target: id,
                target_type: meta.type_name,
                invoker: method.invoker.clone(),
                arity,
            });
        }
    }

    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::event::EventData;
    use crate::target::{CallbackResult, EventTarget, TargetType};

    #[derive(Default)]
    struct Chest;

    impl Chest {
        fn on_open(&mut self) -> CallbackResult {
            Ok(())
        }

        fn on_coin(&mut self, _data: &EventData) -> CallbackResult {
            Ok(())
        }
    }

    impl EventTarget for Chest {
        fn target_type() -> TargetType<Self> {
            TargetType::new("Chest")
                .inject(EventDescriptor::new("open", "on_coin", 0.8))
                .inject(EventDescriptor::new("open", "on_open", 0.2))
                .inject(EventDescriptor::new("open", "on_missing", 0.5))
                .inject(EventDescriptor::new("shake", "spawn_reward", 0.5))
                .method("on_open", Self::on_open)
                .method_with_event("on_coin", Self::on_coin)
                .method_signature("spawn_reward", &[Param::Other("u32"), Param::Other("f32")])
        }
    }

    #[test]
    fn keeps_declaration_order_and_rejects_bad_bindings() {
        let mut scene = Scene::new();
        let node = scene.spawn_node("chest");
        let id = scene.attach(node, Chest).unwrap();
        let diag = Diagnostics::default();

        let index = scan(&scene, &[id], &diag);
        let open: Vec<&str> = index
            .get("open")
            .iter()
            .map(|b| b.descriptor().callback_name())
            .collect();
        assert_eq!(open, ["on_coin", "on_open"]);
        assert_eq!(index.get("open")[0].arity(), Arity::One);
        assert!(index.get("shake").is_empty());
        assert_eq!(diag.count(ErrorKind::BindingNotFound), 1);
        assert_eq!(diag.count(ErrorKind::BindingSignatureMismatch), 1);
        assert!(diag.records()[1].message.contains("u32, f32"));
    }

    #[test]
    fn duplicate_candidates_scan_once() {
        let mut scene = Scene::new();
        let node = scene.spawn_node("chest");
        let id = scene.attach(node, Chest).unwrap();
        let index = scan(&scene, &[id, id], &Diagnostics::default());
        assert_eq!(index.len(), 2);

        let mut merged = index.clone();
        assert_eq!(merged.remove_target(id), 2);
        assert!(merged.is_empty());
        merged.merge(index);
        assert_eq!(merged.animation_names(), ["open"]);
    }
}

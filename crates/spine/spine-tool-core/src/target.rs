//! Per-type descriptor and method tables.
//!
//! Gameplay types opt in by implementing [`EventTarget`] and returning a
//! [`TargetType`] built with its descriptor table (what should fire, when) and
//! its method table (what can be called, by name). The scanner consumes these
//! tables directly; there is no runtime reflection.
//!
//! ```
//! use spine_tool::{EventData, EventDescriptor, EventTarget, TargetType};
//!
//! #[derive(Default)]
//! struct Brawler {
//!     hits: Vec<i32>,
//! }
//!
//! impl Brawler {
//!     fn on_hit_impact(&mut self, data: &EventData) -> anyhow::Result<()> {
//!         self.hits.push(data.int_param);
//!         Ok(())
//!     }
//! }
//!
//! impl EventTarget for Brawler {
//!     fn target_type() -> TargetType<Self> {
//!         TargetType::new("Brawler")
//!             .inject(EventDescriptor::new("attack", "on_hit_impact", 0.5).with_int(50))
//!             .method_with_event("on_hit_impact", Self::on_hit_impact)
//!     }
//! }
//! ```

use std::any::Any;
use std::marker::PhantomData;
use std::rc::Rc;

use anyhow::anyhow;

use crate::event::{EventData, EventDescriptor};

/// Result returned by gameplay callbacks and listeners.
pub type CallbackResult = anyhow::Result<()>;

/// Method name the native event bridge broadcasts to on every component of a node.
pub const NATIVE_EVENT_METHOD: &str = "on_spine_event";

/// One declared parameter of a method.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Param {
    EventData,
    Other(&'static str),
}

impl std::fmt::Display for Param {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Param::EventData => f.write_str("&EventData"),
            Param::Other(name) => f.write_str(name),
        }
    }
}

/// How many arguments a bound callback takes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Arity {
    Zero,
    One,
}

pub(crate) type PlainFn = Rc<dyn Fn(&mut dyn Any) -> CallbackResult>;
pub(crate) type EventFn = Rc<dyn Fn(&mut dyn Any, &EventData) -> CallbackResult>;

/// Type-erased call path for one method.
#[derive(Clone)]
pub(crate) enum Invoker {
    Plain(PlainFn),
    WithEvent(EventFn),
    /// Declared for introspection only; never callable.
    Unsupported,
}

impl Invoker {
    pub(crate) fn arity(&self) -> Option<Arity> {
        match self {
            Invoker::Plain(_) => Some(Arity::Zero),
            Invoker::WithEvent(_) => Some(Arity::One),
            Invoker::Unsupported => None,
        }
    }

    /// Call against an erased target. Zero-arg methods ignore `data`.
    pub(crate) fn call(&self, target: &mut dyn Any, data: &EventData) -> CallbackResult {
        match self {
            Invoker::Plain(f) => f(target),
            Invoker::WithEvent(f) => f(target, data),
            Invoker::Unsupported => Err(anyhow!("method is not invocable")),
        }
    }
}

impl std::fmt::Debug for Invoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Invoker::Plain(_) => f.write_str("Plain"),
            Invoker::WithEvent(_) => f.write_str("WithEvent"),
            Invoker::Unsupported => f.write_str("Unsupported"),
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct MethodEntry {
    pub(crate) name: String,
    pub(crate) params: Vec<Param>,
    pub(crate) invoker: Invoker,
}

/// Builder for a gameplay type's descriptor and method tables.
pub struct TargetType<T> {
    type_name: &'static str,
    descriptors: Vec<EventDescriptor>,
    methods: Vec<MethodEntry>,
    marker: PhantomData<fn(&mut T)>,
}

impl<T: 'static> TargetType<T> {
    pub fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            descriptors: Vec::new(),
            methods: Vec::new(),
            marker: PhantomData,
        }
    }

    /// Declare an event descriptor. Declaration order is preserved.
    pub fn inject(mut self, descriptor: EventDescriptor) -> Self {
        self.descriptors.push(descriptor.normalized());
        self
    }

    /// Register a zero-argument callback.
    pub fn method(self, name: &str, f: fn(&mut T) -> CallbackResult) -> Self {
        let type_name = self.type_name;
        let invoker = Invoker::Plain(Rc::new(move |target: &mut dyn Any| {
            match target.downcast_mut::<T>() {
                Some(t) => f(t),
                None => Err(anyhow!("target is not a {type_name}")),
            }
        }));
        self.upsert(name, Vec::new(), invoker)
    }

    /// Register a callback taking the event payload.
    pub fn method_with_event(self, name: &str, f: fn(&mut T, &EventData) -> CallbackResult) -> Self {
        let type_name = self.type_name;
        let invoker = Invoker::WithEvent(Rc::new(
            move |target: &mut dyn Any, data: &EventData| match target.downcast_mut::<T>() {
                Some(t) => f(t, data),
                None => Err(anyhow!("target is not a {type_name}")),
            },
        ));
        self.upsert(name, vec![Param::EventData], invoker)
    }

    /// Declare a method that exists on the type but cannot be bound
    /// (e.g. it takes gameplay arguments). Descriptors naming it are rejected
    /// with a signature mismatch rather than "not found".
    pub fn method_signature(self, name: &str, params: &[Param]) -> Self {
        self.upsert(name, params.to_vec(), Invoker::Unsupported)
    }

    /// Insert or replace a method entry by name.
    fn upsert(mut self, name: &str, params: Vec<Param>, invoker: Invoker) -> Self {
        if let Some(entry) = self.methods.iter_mut().find(|m| m.name == name) {
            entry.params = params;
            entry.invoker = invoker;
        } else {
            self.methods.push(MethodEntry {
                name: name.to_string(),
                params,
                invoker,
            });
        }
        self
    }

    pub(crate) fn erase(self) -> TargetMeta {
        TargetMeta {
            type_name: self.type_name,
            descriptors: self.descriptors,
            methods: self.methods,
        }
    }
}

/// Gameplay types whose callbacks can be bound to animation time.
pub trait EventTarget: Sized + 'static {
    fn target_type() -> TargetType<Self>;
}

/// Erased tables shared by every instance of one type.
#[derive(Debug)]
pub(crate) struct TargetMeta {
    pub(crate) type_name: &'static str,
    pub(crate) descriptors: Vec<EventDescriptor>,
    pub(crate) methods: Vec<MethodEntry>,
}

impl TargetMeta {
    pub(crate) fn method(&self, name: &str) -> Option<&MethodEntry> {
        self.methods.iter().find(|m| m.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy {
        calls: u32,
    }

    fn bump(d: &mut Dummy) -> CallbackResult {
        d.calls += 1;
        Ok(())
    }

    fn bump_by(d: &mut Dummy, data: &EventData) -> CallbackResult {
        d.calls += data.int_param as u32;
        Ok(())
    }

    #[test]
    fn later_registration_replaces_earlier() {
        let meta = TargetType::<Dummy>::new("Dummy")
            .method("go", bump)
            .method_with_event("go", bump_by)
            .erase();
        assert_eq!(meta.methods.len(), 1);
        let entry = meta.method("go").unwrap();
        assert_eq!(entry.invoker.arity(), Some(Arity::One));

        let mut d = Dummy { calls: 0 };
        let mut data = EventData::new("go", "a", 0.0, 0.0);
        data.int_param = 3;
        entry.invoker.call(&mut d, &data).unwrap();
        assert_eq!(d.calls, 3);
    }

    #[test]
    fn wrong_target_type_is_an_error_not_a_panic() {
        let meta = TargetType::<Dummy>::new("Dummy").method("go", bump).erase();
        let mut other = 5u8;
        let data = EventData::new("go", "a", 0.0, 0.0);
        assert!(meta.method("go").unwrap().invoker.call(&mut other, &data).is_err());
    }
}

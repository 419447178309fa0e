//! Generational pool with liveness-checked handles.
//!
//! A handle stores the slot index and the generation the slot had when the
//! payload was spawned. Freeing a slot bumps its generation, so every handle
//! that still points at the old payload stops resolving instead of aliasing
//! whatever is spawned into the slot next. Nodes, gameplay components and
//! skeleton controllers all live in pools; bindings and sync sessions keep
//! handles, never owning references.

use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

pub struct Handle<T> {
    index: u32,
    generation: u32,
    marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    #[inline]
    fn new(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation,
            marker: PhantomData,
        }
    }

    #[inline]
    pub fn index(self) -> u32 {
        self.index
    }

    #[inline]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> Debug for Handle<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[Idx: {}; Gen: {}]", self.index, self.generation)
    }
}

impl<T> Serialize for Handle<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Handle", 2)?;
        s.serialize_field("index", &self.index)?;
        s.serialize_field("generation", &self.generation)?;
        s.end()
    }
}

#[derive(Debug)]
struct Record<T> {
    generation: u32,
    payload: Option<T>,
}

#[derive(Debug)]
pub struct Pool<T> {
    records: Vec<Record<T>>,
    free_stack: Vec<u32>,
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Pool<T> {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            free_stack: Vec::new(),
        }
    }

    pub fn spawn(&mut self, payload: T) -> Handle<T> {
        if let Some(index) = self.free_stack.pop() {
            let record = &mut self.records[index as usize];
            record.generation = record.generation.wrapping_add(1).max(1);
            record.payload = Some(payload);
            return Handle::new(index, record.generation);
        }
        let index = self.records.len() as u32;
        self.records.push(Record {
            generation: 1,
            payload: Some(payload),
        });
        Handle::new(index, 1)
    }

    /// Remove the payload behind `handle`. Stale handles return `None`.
    pub fn free(&mut self, handle: Handle<T>) -> Option<T> {
        let record = self.records.get_mut(handle.index as usize)?;
        if record.generation != handle.generation {
            return None;
        }
        let payload = record.payload.take()?;
        self.free_stack.push(handle.index);
        Some(payload)
    }

    #[inline]
    pub fn is_valid(&self, handle: Handle<T>) -> bool {
        self.get(handle).is_some()
    }

    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        self.records
            .get(handle.index as usize)
            .filter(|r| r.generation == handle.generation)
            .and_then(|r| r.payload.as_ref())
    }

    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        self.records
            .get_mut(handle.index as usize)
            .filter(|r| r.generation == handle.generation)
            .and_then(|r| r.payload.as_mut())
    }

    /// Borrow two distinct live payloads mutably at once.
    pub fn get_two_mut(&mut self, a: Handle<T>, b: Handle<T>) -> Option<(&mut T, &mut T)> {
        if a.index == b.index || !self.is_valid(a) || !self.is_valid(b) {
            return None;
        }
        let (lo, hi, swapped) = if a.index < b.index {
            (a.index as usize, b.index as usize, false)
        } else {
            (b.index as usize, a.index as usize, true)
        };
        let (left, right) = self.records.split_at_mut(hi);
        let first = left[lo].payload.as_mut()?;
        let second = right[0].payload.as_mut()?;
        if swapped {
            Some((second, first))
        } else {
            Some((first, second))
        }
    }

    pub fn len(&self) -> usize {
        self.records.len() - self.free_stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Handles of all live payloads, in slot order.
    pub fn handles(&self) -> Vec<Handle<T>> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.payload.is_some())
            .map(|(i, r)| Handle::new(i as u32, r.generation))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.records.iter().enumerate().filter_map(|(i, r)| {
            r.payload
                .as_ref()
                .map(|p| (Handle::new(i as u32, r.generation), p))
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle<T>, &mut T)> {
        self.records.iter_mut().enumerate().filter_map(|(i, r)| {
            let generation = r.generation;
            r.payload
                .as_mut()
                .map(|p| (Handle::new(i as u32, generation), p))
        })
    }
}

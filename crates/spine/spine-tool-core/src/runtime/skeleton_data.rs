//! Skeleton definitions parsed from Spine's JSON export.
//!
//! Only what the core needs is kept: bone names and setup translations,
//! skin names, event definitions and, per animation, its duration and its
//! event timeline. Every other timeline is scanned solely to find the
//! animation's duration (the largest `time` key anywhere in it).

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::Result;
use crate::scene::Vec3;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoneDef {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
}

/// Default payload of a named event.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EventDef {
    #[serde(default)]
    pub int: i32,
    #[serde(default)]
    pub float: f32,
    #[serde(default)]
    pub string: String,
}

/// One key on an animation's event timeline, defaults already applied.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventKey {
    pub name: String,
    pub time: f32,
    pub int: i32,
    pub float: f32,
    pub string: String,
}

impl EventKey {
    pub fn new(name: impl Into<String>, time: f32) -> Self {
        Self {
            name: name.into(),
            time,
            int: 0,
            float: 0.0,
            string: String::new(),
        }
    }

    pub fn with_int(mut self, value: i32) -> Self {
        self.int = value;
        self
    }

    pub fn with_float(mut self, value: f32) -> Self {
        self.float = value;
        self
    }

    pub fn with_string(mut self, value: impl Into<String>) -> Self {
        self.string = value.into();
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnimationDef {
    pub name: String,
    pub duration: f32,
    /// Sorted by time.
    pub events: Vec<EventKey>,
}

impl AnimationDef {
    pub fn new(name: impl Into<String>, duration: f32) -> Self {
        Self {
            name: name.into(),
            duration: duration.max(0.0),
            events: Vec::new(),
        }
    }

    pub fn with_event(mut self, key: EventKey) -> Self {
        self.events.push(key);
        self.events.sort_by(|a, b| a.time.total_cmp(&b.time));
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SkeletonData {
    pub bones: Vec<BoneDef>,
    pub skins: Vec<String>,
    pub events: HashMap<String, EventDef>,
    /// Sorted by name.
    pub animations: Vec<AnimationDef>,
}

#[derive(Deserialize)]
struct RawSkeleton {
    #[serde(default)]
    bones: Vec<BoneDef>,
    #[serde(default)]
    skins: Option<RawSkins>,
    #[serde(default)]
    events: HashMap<String, EventDef>,
    #[serde(default)]
    animations: serde_json::Map<String, JsonValue>,
}

/// Spine 3.8+ exports skins as an array; older exports as a name-keyed map.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawSkins {
    List(Vec<RawSkin>),
    Map(serde_json::Map<String, JsonValue>),
}

#[derive(Deserialize)]
struct RawSkin {
    name: String,
}

#[derive(Deserialize)]
struct RawEventKey {
    name: String,
    #[serde(default)]
    time: f32,
    #[serde(default)]
    int: Option<i32>,
    #[serde(default)]
    float: Option<f32>,
    #[serde(default)]
    string: Option<String>,
}

/// Largest `time` key anywhere below `value`.
fn max_time(value: &JsonValue) -> f32 {
    match value {
        JsonValue::Object(map) => map.iter().fold(0.0f32, |acc, (k, v)| {
            let here = if k == "time" {
                v.as_f64().unwrap_or(0.0) as f32
            } else {
                max_time(v)
            };
            acc.max(here)
        }),
        JsonValue::Array(items) => items.iter().map(max_time).fold(0.0f32, f32::max),
        _ => 0.0,
    }
}

impl SkeletonData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a Spine JSON skeleton export.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawSkeleton = serde_json::from_str(json)?;
        Self::from_raw(raw)
    }

    pub fn from_value(value: JsonValue) -> Result<Self> {
        let raw: RawSkeleton = serde_json::from_value(value)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawSkeleton) -> Result<Self> {
        let skins = match raw.skins {
            Some(RawSkins::List(list)) => list.into_iter().map(|s| s.name).collect(),
            Some(RawSkins::Map(map)) => map.keys().cloned().collect(),
            None => Vec::new(),
        };

        let mut animations = Vec::with_capacity(raw.animations.len());
        for (name, body) in raw.animations {
            let keys: Vec<RawEventKey> = match body.get("events") {
                Some(events) => serde_json::from_value(events.clone())?,
                None => Vec::new(),
            };
            let mut def = AnimationDef::new(name, max_time(&body));
            for key in keys {
                let defaults = raw.events.get(&key.name).cloned().unwrap_or_default();
                def.events.push(EventKey {
                    int: key.int.unwrap_or(defaults.int),
                    float: key.float.unwrap_or(defaults.float),
                    string: key.string.unwrap_or(defaults.string),
                    name: key.name,
                    time: key.time,
                });
            }
            def.events.sort_by(|a, b| a.time.total_cmp(&b.time));
            animations.push(def);
        }
        animations.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(Self {
            bones: raw.bones,
            skins,
            events: raw.events,
            animations,
        })
    }

    pub fn with_bone(mut self, bone: BoneDef) -> Self {
        self.bones.push(bone);
        self
    }

    pub fn with_skin(mut self, name: impl Into<String>) -> Self {
        self.skins.push(name.into());
        self
    }

    /// Insert or replace an animation by name.
    pub fn with_animation(mut self, animation: AnimationDef) -> Self {
        self.animations.retain(|a| a.name != animation.name);
        self.animations.push(animation);
        self.animations.sort_by(|a, b| a.name.cmp(&b.name));
        self
    }

    pub fn animation(&self, name: &str) -> Option<&AnimationDef> {
        self.animations.iter().find(|a| a.name == name)
    }

    pub fn has_skin(&self, name: &str) -> bool {
        self.skins.iter().any(|s| s == name)
    }

    pub fn bone(&self, name: &str) -> Option<&BoneDef> {
        self.bones.iter().find(|b| b.name == name)
    }

    /// Setup-pose position of a bone, summing translations up the parent
    /// chain. Rotation and scale are not applied.
    pub fn bone_position(&self, name: &str) -> Option<Vec3> {
        let mut bone = self.bone(name)?;
        let mut position = Vec3::new(bone.x, bone.y, 0.0);
        let mut depth = 0;
        while let Some(parent) = bone.parent.as_deref() {
            bone = self.bone(parent)?;
            position = position + Vec3::new(bone.x, bone.y, 0.0);
            depth += 1;
            if depth > self.bones.len() {
                break;
            }
        }
        Some(position)
    }
}

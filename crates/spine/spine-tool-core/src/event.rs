//! Event descriptors and the payload passed to callbacks.

use serde::{Deserialize, Serialize};

/// Declarative binding of (animation, normalized time) to a named callback.
///
/// Descriptors are plain data registered in a type's
/// [`TargetType`](crate::target::TargetType) table. `normalized_time` is clamped
/// into `[0, 1]` on construction; NaN becomes 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDescriptor {
    animation_name: String,
    callback_name: String,
    normalized_time: f32,
    #[serde(default)]
    string_param: String,
    #[serde(default)]
    int_param: i32,
    #[serde(default)]
    float_param: f32,
}

fn clamp01(t: f32) -> f32 {
    if t.is_nan() {
        0.0
    } else {
        t.clamp(0.0, 1.0)
    }
}

impl EventDescriptor {
    pub fn new(
        animation_name: impl Into<String>,
        callback_name: impl Into<String>,
        normalized_time: f32,
    ) -> Self {
        Self {
            animation_name: animation_name.into(),
            callback_name: callback_name.into(),
            normalized_time: clamp01(normalized_time),
            string_param: String::new(),
            int_param: 0,
            float_param: 0.0,
        }
    }

    #[inline]
    pub fn with_string(mut self, value: impl Into<String>) -> Self {
        self.string_param = value.into();
        self
    }

    #[inline]
    pub fn with_int(mut self, value: i32) -> Self {
        self.int_param = value;
        self
    }

    #[inline]
    pub fn with_float(mut self, value: f32) -> Self {
        self.float_param = value;
        self
    }

    pub fn animation_name(&self) -> &str {
        &self.animation_name
    }

    pub fn callback_name(&self) -> &str {
        &self.callback_name
    }

    pub fn normalized_time(&self) -> f32 {
        self.normalized_time
    }

    pub fn string_param(&self) -> &str {
        &self.string_param
    }

    pub fn int_param(&self) -> i32 {
        self.int_param
    }

    pub fn float_param(&self) -> f32 {
        self.float_param
    }

    /// Re-apply the clamp after deserialization from untrusted data.
    pub(crate) fn normalized(mut self) -> Self {
        self.normalized_time = clamp01(self.normalized_time);
        self
    }
}

/// Payload delivered to one-argument callbacks and event listeners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    pub event_name: String,
    pub animation_name: String,
    /// Fraction of the animation's duration at which the event is placed.
    pub normalized_time: f32,
    /// Absolute track time (seconds) when the event was delivered.
    pub track_time: f32,
    pub string_param: String,
    pub int_param: i32,
    pub float_param: f32,
}

impl EventData {
    pub fn new(
        event_name: impl Into<String>,
        animation_name: impl Into<String>,
        normalized_time: f32,
        track_time: f32,
    ) -> Self {
        Self {
            event_name: event_name.into(),
            animation_name: animation_name.into(),
            normalized_time,
            track_time,
            string_param: String::new(),
            int_param: 0,
            float_param: 0.0,
        }
    }

    /// Build the payload for an injected descriptor firing at `track_time`.
    /// The event name is the descriptor's callback name.
    pub fn from_descriptor(descriptor: &EventDescriptor, track_time: f32) -> Self {
        Self {
            event_name: descriptor.callback_name.clone(),
            animation_name: descriptor.animation_name.clone(),
            normalized_time: descriptor.normalized_time,
            track_time,
            string_param: descriptor.string_param.clone(),
            int_param: descriptor.int_param,
            float_param: descriptor.float_param,
        }
    }
}

impl std::fmt::Display for EventData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SpineEvent[{}] @{:.2} (Anim: {})",
            self.event_name, self.normalized_time, self.animation_name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_time_is_clamped() {
        assert_eq!(EventDescriptor::new("a", "f", 1.5).normalized_time(), 1.0);
        assert_eq!(EventDescriptor::new("a", "f", -0.2).normalized_time(), 0.0);
        assert_eq!(EventDescriptor::new("a", "f", f32::NAN).normalized_time(), 0.0);
        assert_eq!(EventDescriptor::new("a", "f", 0.25).normalized_time(), 0.25);
    }

    #[test]
    fn payload_copies_descriptor_params() {
        let d = EventDescriptor::new("attack", "on_hit_impact", 0.5)
            .with_int(50)
            .with_float(1.5)
            .with_string("heavy");
        let data = EventData::from_descriptor(&d, 1.02);
        assert_eq!(data.event_name, "on_hit_impact");
        assert_eq!(data.animation_name, "attack");
        assert_eq!(data.int_param, 50);
        assert_eq!(data.float_param, 1.5);
        assert_eq!(data.string_param, "heavy");
        assert_eq!(data.track_time, 1.02);
        assert_eq!(data.to_string(), "SpineEvent[on_hit_impact] @0.50 (Anim: attack)");
    }

    #[test]
    fn deserialized_descriptor_is_reclamped() {
        let d: EventDescriptor = serde_json::from_str(
            r#"{ "animation_name": "a", "callback_name": "f", "normalized_time": 3.0 }"#,
        )
        .unwrap();
        assert_eq!(d.normalized().normalized_time(), 1.0);
    }
}

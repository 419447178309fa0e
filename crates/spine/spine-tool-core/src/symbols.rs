//! Symbol metadata: named presets mapping a gameplay symbol to an animation
//! plus playback settings.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SymbolData {
    pub id: String,
    pub name: String,
    pub description: String,
    pub animation_name: String,
    /// Seconds; informational.
    pub duration: f32,
    pub is_looping: bool,
    /// Higher sorts first.
    pub priority: i32,
    pub tags: Vec<String>,
    pub can_be_triggered: bool,
    pub trigger_cooldown: f32,
    pub custom_speed: f32,
    /// Empty for "keep the current skin".
    pub skin_name: String,
    /// Mix duration from the previous animation; 0 disables.
    pub blend_duration: f32,
}

impl Default for SymbolData {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            description: String::new(),
            animation_name: String::new(),
            duration: 0.0,
            is_looping: false,
            priority: 0,
            tags: Vec::new(),
            can_be_triggered: true,
            trigger_cooldown: 0.0,
            custom_speed: 1.0,
            skin_name: String::new(),
            blend_duration: 0.2,
        }
    }
}

impl SymbolData {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        animation_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            animation_name: animation_name.into(),
            ..Self::default()
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.id.is_empty() && !self.name.is_empty() && !self.animation_name.is_empty()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn add_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !self.has_tag(&tag) {
            self.tags.push(tag);
        }
    }

    pub fn remove_tag(&mut self, tag: &str) {
        self.tags.retain(|t| t != tag);
    }
}

#[derive(Deserialize)]
struct RawCollection {
    #[serde(default)]
    name: String,
    #[serde(default)]
    symbols: Vec<SymbolData>,
}

/// Ordered symbol list with an id index over its valid entries. On duplicate
/// ids the first valid entry wins.
#[derive(Clone, Debug, Default, Serialize)]
pub struct SymbolCollection {
    pub name: String,
    symbols: Vec<SymbolData>,
    #[serde(skip)]
    by_id: HashMap<String, usize>,
}

impl SymbolCollection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawCollection = serde_json::from_str(json)?;
        Ok(Self::from_symbols(raw.name, raw.symbols))
    }

    pub fn from_symbols(name: impl Into<String>, symbols: Vec<SymbolData>) -> Self {
        let mut collection = Self {
            name: name.into(),
            symbols,
            by_id: HashMap::new(),
        };
        collection.reindex();
        collection
    }

    pub fn with_symbol(mut self, symbol: SymbolData) -> Self {
        self.push(symbol);
        self
    }

    pub fn push(&mut self, symbol: SymbolData) {
        let at = self.symbols.len();
        if symbol.is_valid() && !self.by_id.contains_key(&symbol.id) {
            self.by_id.insert(symbol.id.clone(), at);
        }
        self.symbols.push(symbol);
    }

    fn reindex(&mut self) {
        self.by_id.clear();
        for (i, symbol) in self.symbols.iter().enumerate() {
            if symbol.is_valid() && !self.by_id.contains_key(&symbol.id) {
                self.by_id.insert(symbol.id.clone(), i);
            }
        }
    }

    /// Every symbol, including invalid ones, in authored order.
    pub fn symbols(&self) -> &[SymbolData] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&SymbolData> {
        self.by_id.get(id).and_then(|&i| self.symbols.get(i))
    }

    /// First symbol (in authored order) that plays `animation`.
    pub fn by_animation(&self, animation: &str) -> Option<&SymbolData> {
        self.symbols.iter().find(|s| s.animation_name == animation)
    }

    pub fn by_tag(&self, tag: &str) -> Vec<&SymbolData> {
        self.symbols.iter().filter(|s| s.has_tag(tag)).collect()
    }

    /// Highest priority first; equal priorities keep authored order.
    pub fn sorted_by_priority(&self) -> Vec<&SymbolData> {
        let mut sorted: Vec<&SymbolData> = self.symbols.iter().collect();
        sorted.sort_by(|a, b| b.priority.cmp(&a.priority));
        sorted
    }
}

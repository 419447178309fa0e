//! Core configuration for spine-tool-core.

use serde::{Deserialize, Serialize};

/// Configuration for the stage, its controllers and synchronizers.
/// Keep this minimal; expand as needed without breaking API.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Track used by facade operations that take no explicit track index.
    pub default_track: usize,

    /// Sync timeout (seconds) when the master animation length is unknown.
    pub sync_default_timeout: f32,
    /// Added to the master animation length before the sync timeout fallback fires.
    pub sync_timeout_grace: f32,

    pub diagnostics: DiagnosticsCfg,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsCfg {
    /// Retain reported errors for later inspection (tests, debug overlays).
    pub capture: bool,
    /// Oldest records are dropped beyond this many.
    pub max_records: usize,
}

impl Default for DiagnosticsCfg {
    fn default() -> Self {
        Self {
            capture: true,
            max_records: 1024,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_track: 0,
            sync_default_timeout: 5.0,
            sync_timeout_grace: 0.25,
            diagnostics: DiagnosticsCfg::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let cfg: Config = serde_json::from_str(r#"{ "sync_default_timeout": 2.0 }"#).unwrap();
        assert_eq!(cfg.sync_default_timeout, 2.0);
        assert_eq!(cfg.default_track, 0);
        assert!(cfg.diagnostics.capture);
        assert_eq!(cfg.diagnostics.max_records, 1024);
    }
}

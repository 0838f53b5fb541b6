//! Partial configuration types for layered config merging.
//!
//! Every layer (project file, explicit `--config` file, command line) is an
//! `Option`-wrapped copy of [`LocateConfig`]. Layers are merged from highest to
//! lowest precedence and resolved against the built-in defaults.

use crate::config::{LocateConfig, OpenMode, PathFormat};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Trait for merging configuration layers.
/// Higher precedence values (self) override lower precedence (other).
pub trait Merge {
    /// Merge values from a lower-precedence layer into this layer.
    /// Values already set in self take precedence over values in other.
    fn merge_from(&mut self, other: &Self);
}

impl<T: Clone> Merge for Option<T> {
    fn merge_from(&mut self, other: &Self) {
        if self.is_none() {
            *self = other.clone();
        }
    }
}

/// Partial configuration where all fields are optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PartialLocateConfig {
    pub editor: Option<String>,
    pub open_mode: Option<OpenMode>,
    pub path_format: Option<PathFormat>,
    pub project_root: Option<PathBuf>,
    pub relative_paths: Option<bool>,
    pub open_in_workspace: Option<bool>,
    pub default_port: Option<u16>,
    pub output_dir: Option<PathBuf>,
    pub find_port_timeout_ms: Option<u64>,
}

impl Merge for PartialLocateConfig {
    fn merge_from(&mut self, other: &Self) {
        self.editor.merge_from(&other.editor);
        self.open_mode.merge_from(&other.open_mode);
        self.path_format.merge_from(&other.path_format);
        self.project_root.merge_from(&other.project_root);
        self.relative_paths.merge_from(&other.relative_paths);
        self.open_in_workspace.merge_from(&other.open_in_workspace);
        self.default_port.merge_from(&other.default_port);
        self.output_dir.merge_from(&other.output_dir);
        self.find_port_timeout_ms
            .merge_from(&other.find_port_timeout_ms);
    }
}

impl PartialLocateConfig {
    /// Fill every unset field from the system defaults
    pub fn resolve(self) -> LocateConfig {
        let defaults = LocateConfig::default();
        LocateConfig {
            editor: self.editor.or(defaults.editor),
            open_mode: self.open_mode.unwrap_or(defaults.open_mode),
            path_format: self.path_format.or(defaults.path_format),
            project_root: self.project_root.or(defaults.project_root),
            relative_paths: self.relative_paths.unwrap_or(defaults.relative_paths),
            open_in_workspace: self.open_in_workspace.unwrap_or(defaults.open_in_workspace),
            default_port: self.default_port.unwrap_or(defaults.default_port),
            output_dir: self.output_dir.or(defaults.output_dir),
            find_port_timeout_ms: self
                .find_port_timeout_ms
                .unwrap_or(defaults.find_port_timeout_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_higher_layer_wins() {
        let mut cli = PartialLocateConfig {
            editor: Some("nvim".to_string()),
            ..Default::default()
        };
        let project = PartialLocateConfig {
            editor: Some("code".to_string()),
            relative_paths: Some(true),
            ..Default::default()
        };

        cli.merge_from(&project);
        let config = cli.resolve();

        assert_eq!(config.editor.as_deref(), Some("nvim"));
        assert!(config.relative_paths);
        assert_eq!(config.default_port, crate::config::DEFAULT_PORT);
    }

    #[test]
    fn test_partial_layer_parses_sparse_json() {
        let layer: PartialLocateConfig =
            serde_json::from_str(r#"{"openMode": "reuse", "defaultPort": 7000}"#).unwrap();
        assert_eq!(layer.open_mode, Some(OpenMode::Reuse));
        assert_eq!(layer.default_port, Some(7000));
        assert_eq!(layer.editor, None);
    }
}

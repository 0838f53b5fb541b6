//! Runtime configuration I/O operations.
//!
//! System directory detection and layered config loading. Only `main` should
//! construct a [`DirectoryContext`] from the system; everything else receives
//! it by parameter so tests can point at temp directories.

use crate::config::{ConfigError, LocateConfig};
use crate::partial_config::{Merge, PartialLocateConfig};
use std::path::{Path, PathBuf};

/// Directory holding project-local configuration, relative to the working dir
pub const PROJECT_CONFIG_DIR: &str = ".code-locate";

/// Dotenv-style file consulted for `CODE_EDITOR` when the JSON config names no editor
pub const ENV_LOCAL_FILE: &str = ".env.local";

/// Environment variable naming the editor override
pub const EDITOR_ENV_VAR: &str = "CODE_EDITOR";

/// Directory paths for shared state and logs
#[derive(Debug, Clone)]
pub struct DirectoryContext {
    /// Cache directory holding the default record store,
    /// e.g. ~/.cache/code-locate on Linux, ~/Library/Caches/code-locate on macOS
    pub cache_dir: PathBuf,

    /// Directory for log files when `--log-file` is not given a full path
    pub log_dir: PathBuf,
}

impl DirectoryContext {
    /// Create a DirectoryContext from the system directories
    /// This should ONLY be called from main()
    pub fn from_system() -> std::io::Result<Self> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "Could not determine cache directory",
                )
            })?
            .join("code-locate");

        let log_dir = dirs::state_dir()
            .map(|dir| dir.join("code-locate"))
            .unwrap_or_else(|| cache_dir.join("logs"));

        Ok(Self { cache_dir, log_dir })
    }

    /// Create a DirectoryContext for testing with a temp directory
    pub fn for_testing(temp_dir: &Path) -> Self {
        Self {
            cache_dir: temp_dir.join("cache"),
            log_dir: temp_dir.join("logs"),
        }
    }

    /// Default location of the shared record store
    pub fn default_output_dir(&self) -> PathBuf {
        self.cache_dir.clone()
    }

    /// Default log file path
    pub fn log_path(&self) -> PathBuf {
        self.log_dir.join("code-locate.log")
    }
}

/// Path to the project-local config file for a working directory
pub fn project_config_path(working_dir: &Path) -> PathBuf {
    working_dir.join(PROJECT_CONFIG_DIR).join("config.json")
}

/// Read a config layer from disk. A missing file is not an error.
fn load_layer(path: &Path) -> Result<Option<PartialLocateConfig>, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ConfigError::IoError(format!("{}: {}", path.display(), e))),
    };

    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))
}

/// Editor named by the project-local configuration, if any.
///
/// Looks at the `editor` field of `.code-locate/config.json`, then at a
/// `CODE_EDITOR=` line in `.env.local`. Missing or unparsable files are ignored.
pub fn project_editor_override(working_dir: &Path) -> Option<String> {
    match load_layer(&project_config_path(working_dir)) {
        Ok(Some(layer)) => {
            if let Some(editor) = layer.editor.filter(|e| !e.trim().is_empty()) {
                return Some(editor);
            }
        }
        Ok(None) => {}
        Err(e) => tracing::debug!("Ignoring project config: {}", e),
    }

    let env_local = std::fs::read_to_string(working_dir.join(ENV_LOCAL_FILE)).ok()?;
    parse_env_value(&env_local, EDITOR_ENV_VAR)
}

/// Extract `KEY=value` from dotenv-style content. Quotes around the value are
/// stripped, comments and `export` prefixes are tolerated.
fn parse_env_value(contents: &str, key: &str) -> Option<String> {
    contents.lines().find_map(|line| {
        let line = line.trim();
        if line.starts_with('#') {
            return None;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let (name, value) = line.split_once('=')?;
        if name.trim() != key {
            return None;
        }
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
            .unwrap_or(value);
        (!value.is_empty()).then(|| value.to_string())
    })
}

/// Loads and merges all configuration layers.
///
/// Resolution order: defaults → project file → explicit file → command line.
/// The project file's `editor` is left to [`project_editor_override`].
pub struct ConfigResolver {
    working_dir: PathBuf,
    explicit_file: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(working_dir: PathBuf) -> Self {
        Self {
            working_dir,
            explicit_file: None,
        }
    }

    /// Add a config file given on the command line. Unlike the project file,
    /// it must exist.
    pub fn with_explicit_file(mut self, path: Option<PathBuf>) -> Self {
        self.explicit_file = path;
        self
    }

    pub fn project_config_path(&self) -> PathBuf {
        project_config_path(&self.working_dir)
    }

    /// Merge all layers under the given command-line layer
    pub fn resolve(&self, cli: PartialLocateConfig) -> Result<LocateConfig, ConfigError> {
        let mut merged = cli;

        if let Some(path) = &self.explicit_file {
            match load_layer(path)? {
                Some(layer) => {
                    tracing::debug!("Loaded config layer from {:?}", path);
                    merged.merge_from(&layer);
                }
                None => {
                    return Err(ConfigError::IoError(format!(
                        "{}: file not found",
                        path.display()
                    )))
                }
            }
        }

        // A broken project file should not stop the tool from working.
        // Its editor ranks below CODE_EDITOR and is read by the resolver.
        match load_layer(&self.project_config_path()) {
            Ok(Some(mut layer)) => {
                tracing::debug!("Loaded project config layer");
                layer.editor = None;
                merged.merge_from(&layer);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Ignoring project config: {}", e),
        }

        let config = merged.resolve();
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_project_config(dir: &Path, contents: &str) {
        let path = project_config_path(dir);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_project_editor_from_json() {
        let temp = TempDir::new().unwrap();
        write_project_config(temp.path(), r#"{"editor": "webstorm"}"#);
        assert_eq!(
            project_editor_override(temp.path()).as_deref(),
            Some("webstorm")
        );
    }

    #[test]
    fn test_project_editor_from_env_local() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(ENV_LOCAL_FILE),
            "# local settings\nPORT=3000\nexport CODE_EDITOR=\"cursor\"\n",
        )
        .unwrap();
        assert_eq!(
            project_editor_override(temp.path()).as_deref(),
            Some("cursor")
        );
    }

    #[test]
    fn test_project_editor_ignores_broken_files() {
        let temp = TempDir::new().unwrap();
        write_project_config(temp.path(), "{{{");
        assert_eq!(project_editor_override(temp.path()), None);
    }

    #[test]
    fn test_parse_env_value_variants() {
        assert_eq!(
            parse_env_value("CODE_EDITOR=code", "CODE_EDITOR").as_deref(),
            Some("code")
        );
        assert_eq!(
            parse_env_value("CODE_EDITOR='subl -w'", "CODE_EDITOR").as_deref(),
            Some("subl -w")
        );
        assert_eq!(parse_env_value("CODE_EDITOR=", "CODE_EDITOR"), None);
        assert_eq!(parse_env_value("#CODE_EDITOR=vim", "CODE_EDITOR"), None);
        assert_eq!(parse_env_value("EDITOR=vim", "CODE_EDITOR"), None);
    }

    #[test]
    fn test_resolver_layers() {
        let temp = TempDir::new().unwrap();
        write_project_config(
            temp.path(),
            r#"{"editor": "code", "defaultPort": 6100, "relativePaths": true}"#,
        );
        let explicit = temp.path().join("explicit.json");
        std::fs::write(&explicit, r#"{"defaultPort": 6200}"#).unwrap();

        let resolver = ConfigResolver::new(temp.path().to_path_buf())
            .with_explicit_file(Some(explicit));
        let cli = PartialLocateConfig {
            editor: Some("zed".to_string()),
            ..Default::default()
        };
        let config = resolver.resolve(cli).unwrap();

        assert_eq!(config.editor.as_deref(), Some("zed"));
        assert_eq!(config.default_port, 6200);
        assert!(config.relative_paths);
    }

    #[test]
    fn test_project_editor_is_not_an_explicit_override() {
        let temp = TempDir::new().unwrap();
        write_project_config(temp.path(), r#"{"editor": "webstorm", "defaultPort": 6100}"#);

        let config = ConfigResolver::new(temp.path().to_path_buf())
            .resolve(PartialLocateConfig::default())
            .unwrap();
        assert_eq!(config.editor, None);
        assert_eq!(config.default_port, 6100);
    }

    #[test]
    fn test_resolver_requires_explicit_file() {
        let temp = TempDir::new().unwrap();
        let resolver = ConfigResolver::new(temp.path().to_path_buf())
            .with_explicit_file(Some(temp.path().join("missing.json")));
        assert!(matches!(
            resolver.resolve(PartialLocateConfig::default()),
            Err(ConfigError::IoError(_))
        ));
    }

    #[test]
    fn test_directory_context_for_testing() {
        let temp = TempDir::new().unwrap();
        let dirs = DirectoryContext::for_testing(temp.path());
        assert_eq!(dirs.default_output_dir(), temp.path().join("cache"));
        assert!(dirs.log_path().starts_with(temp.path().join("logs")));
    }
}

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Port the locate service starts scanning from
pub const DEFAULT_PORT: u16 = 5678;

/// How long followers wait for a published port before giving up
pub const DEFAULT_FIND_PORT_TIMEOUT_MS: u64 = 30_000;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LocateConfig {
    /// Editor to open files with (e.g., "code", "webstorm", or a raw command).
    /// When unset, the running editor is detected automatically.
    #[serde(default)]
    pub editor: Option<String>,

    /// Whether a locate request reuses the current editor window, opens a new
    /// one, or lets the editor decide (default: auto)
    #[serde(default)]
    pub open_mode: OpenMode,

    /// Custom argument template with `{file}`, `{line}` and `{column}` tokens.
    /// Either a single string or an ordered list of arguments.
    #[serde(default)]
    pub path_format: Option<PathFormat>,

    /// Absolute project root used as the coordination key
    /// (default: the current working directory)
    #[serde(default)]
    pub project_root: Option<PathBuf>,

    /// Resolve requested files against the project root and refuse any file
    /// outside of it (default: false)
    #[serde(default)]
    pub relative_paths: bool,

    /// Pass the project root as the workspace argument to editors that
    /// support one (default: false)
    #[serde(default)]
    pub open_in_workspace: bool,

    /// First port tried when binding the locate endpoint (default: 5678)
    #[serde(default = "default_port")]
    pub default_port: u16,

    /// Directory holding the shared record file
    /// (default: the user cache directory)
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Maximum time to wait for another process to publish its port
    /// (default: 30000)
    #[serde(default = "default_find_port_timeout_ms")]
    pub find_port_timeout_ms: u64,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_find_port_timeout_ms() -> u64 {
    DEFAULT_FIND_PORT_TIMEOUT_MS
}

impl Default for LocateConfig {
    fn default() -> Self {
        Self {
            editor: None,
            open_mode: OpenMode::default(),
            path_format: None,
            project_root: None,
            relative_paths: false,
            open_in_workspace: false,
            default_port: DEFAULT_PORT,
            output_dir: None,
            find_port_timeout_ms: DEFAULT_FIND_PORT_TIMEOUT_MS,
        }
    }
}

/// Window behaviour requested from multi-window editors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum OpenMode {
    /// Reuse the most recently focused window
    Reuse,
    /// Always open a new window
    New,
    /// Let the editor decide
    #[default]
    Auto,
}

impl std::str::FromStr for OpenMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "reuse" => Ok(Self::Reuse),
            "new" => Ok(Self::New),
            "auto" => Ok(Self::Auto),
            other => Err(ConfigError::ValidationError(format!(
                "unknown open mode '{other}' (expected reuse, new or auto)"
            ))),
        }
    }
}

/// User supplied argument template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum PathFormat {
    /// A single argument, e.g. `"{file}:{line}:{column}"`
    Single(String),
    /// Ordered arguments, e.g. `["--goto", "{file}:{line}"]`
    Tokens(Vec<String>),
}

impl LocateConfig {
    /// Load configuration from a JSON file. Missing fields take their defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let config: LocateConfig =
            serde_json::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }
        std::fs::write(path.as_ref(), contents).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Reject values that can never work at runtime
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_port == 0 {
            return Err(ConfigError::ValidationError(
                "defaultPort must be between 1 and 65535".to_string(),
            ));
        }
        if let Some(root) = &self.project_root {
            if !root.is_absolute() {
                return Err(ConfigError::ValidationError(format!(
                    "projectRoot must be an absolute path, got {}",
                    root.display()
                )));
            }
        }
        if let Some(PathFormat::Tokens(tokens)) = &self.path_format {
            if tokens.is_empty() {
                return Err(ConfigError::ValidationError(
                    "pathFormat must contain at least one argument".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Project root, falling back to the given working directory
    pub fn project_root_or(&self, working_dir: &Path) -> PathBuf {
        self.project_root
            .clone()
            .unwrap_or_else(|| working_dir.to_path_buf())
    }

    /// Workspace argument handed to the argument formatter, if enabled
    pub fn workspace_root(&self, working_dir: &Path) -> Option<PathBuf> {
        self.open_in_workspace
            .then(|| self.project_root_or(working_dir))
    }

    pub fn find_port_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.find_port_timeout_ms)
    }
}

/// Configuration error types
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(msg) => write!(f, "IO error: {msg}"),
            ConfigError::ParseError(msg) => write!(f, "Parse error: {msg}"),
            ConfigError::SerializeError(msg) => write!(f, "Serialize error: {msg}"),
            ConfigError::ValidationError(msg) => write!(f, "Validation error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

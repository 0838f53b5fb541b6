//! Editor resolution
//!
//! Works out which editor should receive a locate request and how to invoke
//! it. Resolution order, first usable result wins:
//!
//! 1. explicit per-call override
//! 2. `CODE_EDITOR` environment variable
//! 3. project-local configuration (`.code-locate/config.json`, `.env.local`)
//! 4. a scan of running processes against the [`descriptors::EDITORS`] table
//! 5. the generic `VISUAL` and `EDITOR` variables
//!
//! An override naming a known editor maps straight to that editor's command.
//! Anything else is treated as a raw command line.

pub mod descriptors;
pub mod format;
pub mod process_list;

use crate::config_io::{project_editor_override, EDITOR_ENV_VAR};
use descriptors::{find_descriptor, EditorDescriptor, ProcessMatch, EDITORS};
use format::{is_terminal_editor, ArgStyle};
use process_list::{ProcessLister, SystemProcessLister};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Generic editor variables, consulted in this order after the process scan
pub const FALLBACK_ENV_VARS: [&str; 2] = ["VISUAL", "EDITOR"];

const MACOS_APPLICATIONS_DIR: &str = "/Applications";

/// Operating system family, decides process listing and editor commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Linux,
    Windows,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Self::MacOs
        } else if cfg!(windows) {
            Self::Windows
        } else {
            Self::Linux
        }
    }
}

/// Read access to environment variables
pub trait EnvSource: Send + Sync {
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemEnv;

impl EnvSource for SystemEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Where a resolved editor came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    Explicit,
    Environment,
    ProjectConfig,
    RunningProcess,
    Fallback,
}

impl std::fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Explicit => "explicit override",
            Self::Environment => EDITOR_ENV_VAR,
            Self::ProjectConfig => "project config",
            Self::RunningProcess => "running process",
            Self::Fallback => "VISUAL/EDITOR",
        };
        f.write_str(name)
    }
}

/// A concrete editor invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEditor {
    /// Program to run, a bare name or a full path
    pub command: String,
    /// Arguments that precede the formatted position arguments
    pub args: Vec<String>,
    /// Known editor this came from, `None` for raw commands
    pub descriptor: Option<&'static EditorDescriptor>,
    pub source: ResolutionSource,
}

impl ResolvedEditor {
    /// Whether the editor shares the invoking terminal
    pub fn is_terminal(&self) -> bool {
        is_terminal_editor(&self.command)
    }

    pub fn style(&self) -> ArgStyle {
        ArgStyle::for_command(&self.command)
    }

    /// Raw command line, split on whitespace unless it names an existing file
    fn raw(value: &str, source: ResolutionSource) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        if Path::new(value).is_file() {
            return Some(Self {
                command: value.to_string(),
                args: Vec::new(),
                descriptor: None,
                source,
            });
        }
        let mut parts = value.split_whitespace().map(str::to_string);
        let command = parts.next()?;
        Some(Self {
            command,
            args: parts.collect(),
            descriptor: None,
            source,
        })
    }
}

enum OverrideOutcome {
    Resolved(ResolvedEditor),
    /// Known editor that cannot be addressed directly (not available on this
    /// platform, or installed outside its default location); only usable if
    /// it is running
    Preferred(&'static EditorDescriptor),
}

/// Finds the editor to launch
pub struct EditorResolver {
    platform: Platform,
    working_dir: PathBuf,
    env: Arc<dyn EnvSource>,
    lister: Arc<dyn ProcessLister>,
}

impl EditorResolver {
    /// Resolver for the current system, reading project config from `working_dir`
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            platform: Platform::current(),
            working_dir: working_dir.into(),
            env: Arc::new(SystemEnv),
            lister: Arc::new(SystemProcessLister),
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_env(mut self, env: Arc<dyn EnvSource>) -> Self {
        self.env = env;
        self
    }

    pub fn with_lister(mut self, lister: Arc<dyn ProcessLister>) -> Self {
        self.lister = lister;
        self
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Resolve the editor, `None` if no method produced one
    pub async fn resolve(&self, explicit: Option<&str>) -> Option<ResolvedEditor> {
        let mut preferred = Vec::new();

        for source in [
            ResolutionSource::Explicit,
            ResolutionSource::Environment,
            ResolutionSource::ProjectConfig,
        ] {
            let value = match source {
                ResolutionSource::Explicit => explicit.map(str::to_string),
                ResolutionSource::Environment => self.env.var(EDITOR_ENV_VAR),
                _ => project_editor_override(&self.working_dir),
            };
            let Some(value) = value.filter(|v| !v.trim().is_empty()) else {
                continue;
            };
            match self.from_override(&value, source) {
                Some(OverrideOutcome::Resolved(editor)) => {
                    tracing::debug!("Editor {:?} from {}", editor.command, source);
                    return Some(editor);
                }
                Some(OverrideOutcome::Preferred(descriptor)) => {
                    tracing::debug!(
                        "Editor {} from {} cannot be addressed directly, preferring it in the scan",
                        descriptor.id,
                        source
                    );
                    preferred.push(descriptor);
                }
                None => {}
            }
        }

        if let Some(editor) = self.scan(&preferred).await {
            tracing::debug!("Editor {:?} found among running processes", editor.command);
            return Some(editor);
        }

        for var in FALLBACK_ENV_VARS {
            if let Some(editor) = self
                .env
                .var(var)
                .and_then(|value| ResolvedEditor::raw(&value, ResolutionSource::Fallback))
            {
                tracing::debug!("Editor {:?} from {}", editor.command, var);
                return Some(editor);
            }
        }

        None
    }

    fn from_override(&self, value: &str, source: ResolutionSource) -> Option<OverrideOutcome> {
        let Some(descriptor) = find_descriptor(value) else {
            return ResolvedEditor::raw(value, source).map(OverrideOutcome::Resolved);
        };
        match descriptor.command(self.platform) {
            // Bundle paths only work for the default install location
            Some(command) if !Path::new(command).is_absolute() || Path::new(command).exists() => {
                Some(OverrideOutcome::Resolved(ResolvedEditor {
                    command: command.to_string(),
                    args: Vec::new(),
                    descriptor: Some(descriptor),
                    source,
                }))
            }
            _ => Some(OverrideOutcome::Preferred(descriptor)),
        }
    }

    /// Match the process listing against the editor table
    async fn scan(&self, preferred: &[&'static EditorDescriptor]) -> Option<ResolvedEditor> {
        let listing = match self.lister.list(self.platform).await {
            Ok(listing) => listing,
            Err(e) => {
                tracing::debug!("Could not list running processes: {}", e);
                return None;
            }
        };

        let running = running_editors(&listing, self.platform);
        let chosen = preferred
            .iter()
            .find_map(|wanted| {
                running
                    .iter()
                    .find(|(descriptor, _)| std::ptr::eq(*descriptor, *wanted))
            })
            .or_else(|| running.first())?;

        Some(ResolvedEditor {
            command: chosen.1.clone(),
            args: Vec::new(),
            descriptor: Some(chosen.0),
            source: ResolutionSource::RunningProcess,
        })
    }
}

/// Editors present in a process listing, in table priority order, with the
/// command to run each one.
pub fn running_editors(
    listing: &str,
    platform: Platform,
) -> Vec<(&'static EditorDescriptor, String)> {
    EDITORS
        .iter()
        .filter_map(|descriptor| {
            descriptor
                .matches(platform)
                .iter()
                .find(|entry| listing.contains(entry.pattern))
                .map(|entry| (descriptor, command_from_listing(entry, listing, platform)))
        })
        .collect()
}

/// Command for a matched process, pointing at the running installation
/// where the listing reveals it.
fn command_from_listing(entry: &ProcessMatch, listing: &str, platform: Platform) -> String {
    let line = listing
        .lines()
        .map(str::trim)
        .find(|line| line.contains(entry.pattern));

    match (platform, line) {
        (Platform::Windows, Some(line)) => line.to_string(),
        // App bundles may live outside /Applications (e.g. ~/Applications)
        (Platform::MacOs, Some(line)) if entry.pattern.starts_with('/') => {
            match (
                line.find(entry.pattern),
                entry.command.strip_prefix(MACOS_APPLICATIONS_DIR),
            ) {
                (Some(index), Some(in_bundle)) => format!("{}{}", &line[..index], in_bundle),
                _ => entry.command.to_string(),
            }
        }
        _ => entry.command.to_string(),
    }
}

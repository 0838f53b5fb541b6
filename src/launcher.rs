//! Editor process launcher
//!
//! Turns a [`LaunchRequest`] into a running editor process. Launches are
//! fire-and-forget: failures are logged and never retried. At most one child
//! is tracked at a time; a new launch replaces it, and when the new editor
//! lives in the terminal whatever child is in flight is killed first so the
//! terminal editor owns the tty alone.

use crate::config::{LocateConfig, OpenMode, PathFormat};
use crate::config_io::{EDITOR_ENV_VAR, PROJECT_CONFIG_DIR};
use crate::editor::format::format_args;
use crate::editor::{EditorResolver, Platform};
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use tokio::process::{Child, Command};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// A request to open a file at a position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub file: PathBuf,
    /// 1-based line
    pub line: i64,
    /// 1-based column, non-positive values mean 1
    pub column: i64,
    /// Editor override for this request only
    pub editor: Option<String>,
    pub open_mode: Option<OpenMode>,
    pub path_format: Option<PathFormat>,
    pub workspace: Option<PathBuf>,
}

impl LaunchRequest {
    pub fn new(file: impl Into<PathBuf>, line: i64, column: i64) -> Self {
        Self {
            file: file.into(),
            line,
            column,
            editor: None,
            open_mode: None,
            path_format: None,
            workspace: None,
        }
    }

    pub fn with_editor(mut self, editor: Option<String>) -> Self {
        self.editor = editor;
        self
    }
}

/// Settings applied to every request that does not override them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchDefaults {
    pub editor: Option<String>,
    pub open_mode: OpenMode,
    pub path_format: Option<PathFormat>,
    pub workspace: Option<PathBuf>,
}

impl LaunchDefaults {
    pub fn from_config(config: &LocateConfig, working_dir: &Path) -> Self {
        Self {
            editor: config.editor.clone(),
            open_mode: config.open_mode,
            path_format: config.path_format.clone(),
            workspace: config.workspace_root(working_dir),
        }
    }
}

/// Launcher lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LaunchState {
    #[default]
    Idle,
    /// Resolving the editor and starting the process
    Launching,
    /// A child process is tracked
    Running,
    /// Waiting for the tracked editor to die before a terminal editor starts
    Killing,
}

/// How the most recent tracked child ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchOutcome {
    ExitedOk,
    /// Non-zero exit, wait failure, or killed to make room for another editor
    ExitedError,
}

/// Launch error types
#[derive(Debug)]
pub enum LaunchError {
    FileNotFound(PathBuf),
    InvalidLine(i64),
    NoEditor,
    Spawn {
        command: String,
        source: std::io::Error,
    },
}

impl std::fmt::Display for LaunchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FileNotFound(path) => write!(f, "File not found: {}", path.display()),
            Self::InvalidLine(line) => write!(f, "Invalid line number: {line}"),
            Self::NoEditor => write!(
                f,
                "Could not determine which editor to open. Set the {EDITOR_ENV_VAR} \
                 environment variable, add an \"editor\" entry to \
                 {PROJECT_CONFIG_DIR}/config.json, or pass --editor"
            ),
            Self::Spawn { command, source } => {
                write!(f, "Failed to start editor '{command}': {source}")
            }
        }
    }
}

impl std::error::Error for LaunchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Spawn { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Starts editor processes
pub trait ProcessSpawner: Send + Sync {
    fn spawn(&self, command: &str, args: &[String]) -> std::io::Result<Child>;
}

/// Spawns the real editor with the parent's stdio, so terminal editors take
/// over the invoking terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalProcessSpawner;

impl ProcessSpawner for LocalProcessSpawner {
    fn spawn(&self, command: &str, args: &[String]) -> std::io::Result<Child> {
        let mut cmd = editor_command(command, args);
        cmd.stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        cmd.spawn()
    }
}

/// Editor shims on Windows are usually .cmd scripts, so they go through
/// `cmd.exe /C` with every word quoted for cmd
#[cfg(windows)]
fn editor_command(command: &str, args: &[String]) -> Command {
    let line = std::iter::once(command)
        .chain(args.iter().map(String::as_str))
        .map(quote_for_cmd)
        .collect::<Vec<_>>()
        .join(" ");
    let mut cmd = Command::new("cmd.exe");
    cmd.arg("/S").arg("/C").raw_arg(format!("\"{line}\""));
    cmd
}

#[cfg(not(windows))]
fn editor_command(command: &str, args: &[String]) -> Command {
    let mut cmd = Command::new(command);
    cmd.args(args);
    cmd
}

/// Quote one word of a `cmd.exe` command line. Inside quotes `&`, `|`, `^`,
/// `<` and `>` are literal, so only embedded quotes need doubling.
#[cfg_attr(not(windows), allow(dead_code))]
fn quote_for_cmd(word: &str) -> String {
    format!("\"{}\"", word.replace('"', "\"\""))
}

struct InFlight {
    pid: u32,
    kill: Arc<Notify>,
    done: JoinHandle<()>,
}

#[derive(Debug, Default)]
struct Status {
    state: LaunchState,
    current_pid: Option<u32>,
    last_outcome: Option<LaunchOutcome>,
}

/// Resolves, formats and spawns editors; owns the single tracked child
pub struct Launcher {
    resolver: EditorResolver,
    defaults: LaunchDefaults,
    spawner: Arc<dyn ProcessSpawner>,
    wsl: bool,
    current: tokio::sync::Mutex<Option<InFlight>>,
    status: Arc<Mutex<Status>>,
}

impl Launcher {
    pub fn new(resolver: EditorResolver, defaults: LaunchDefaults) -> Self {
        let wsl = resolver.platform() == Platform::Linux && is_wsl();
        Self {
            resolver,
            defaults,
            spawner: Arc::new(LocalProcessSpawner),
            wsl,
            current: tokio::sync::Mutex::new(None),
            status: Arc::new(Mutex::new(Status::default())),
        }
    }

    pub fn with_spawner(mut self, spawner: Arc<dyn ProcessSpawner>) -> Self {
        self.spawner = spawner;
        self
    }

    /// Force WSL path translation on or off
    pub fn with_wsl(mut self, wsl: bool) -> Self {
        self.wsl = wsl;
        self
    }

    pub fn resolver(&self) -> &EditorResolver {
        &self.resolver
    }

    pub fn state(&self) -> LaunchState {
        self.status
            .lock()
            .map(|status| status.state)
            .unwrap_or_default()
    }

    pub fn last_outcome(&self) -> Option<LaunchOutcome> {
        self.status.lock().ok().and_then(|status| status.last_outcome)
    }

    /// Launch and log any failure
    pub async fn launch(&self, request: LaunchRequest) {
        match self.try_launch(request).await {
            Ok(_) => {}
            Err(e @ LaunchError::Spawn { .. }) => tracing::error!("{}", e),
            Err(e) => tracing::warn!("{}", e),
        }
    }

    /// Launch the editor for `request`, returning the child's pid
    pub async fn try_launch(&self, request: LaunchRequest) -> Result<u32, LaunchError> {
        if tokio::fs::metadata(&request.file).await.is_err() {
            return Err(LaunchError::FileNotFound(request.file));
        }
        let line = u32::try_from(request.line)
            .ok()
            .filter(|line| *line >= 1)
            .ok_or(LaunchError::InvalidLine(request.line))?;

        // Serialises launches: kill-then-spawn must not interleave
        let mut current = self.current.lock().await;
        self.set_state(LaunchState::Launching);

        let explicit = request.editor.as_deref().or(self.defaults.editor.as_deref());
        let Some(editor) = self.resolver.resolve(explicit).await else {
            self.settle(current.is_some());
            return Err(LaunchError::NoEditor);
        };

        let file = self.editor_path(&request.file);
        let open_mode = request.open_mode.unwrap_or(self.defaults.open_mode);
        let template = request.path_format.as_ref().or(self.defaults.path_format.as_ref());
        let workspace = request.workspace.as_ref().or(self.defaults.workspace.as_ref());

        let mut args = editor.args.clone();
        args.extend(format_args(
            &editor.command,
            &file,
            line,
            request.column,
            open_mode,
            workspace.map(PathBuf::as_path),
            template,
        ));

        let terminal = editor.is_terminal();
        if let Some(previous) = current.take() {
            if terminal {
                tracing::debug!(
                    "Killing editor {} before starting {}",
                    previous.pid,
                    editor.command
                );
                self.set_state(LaunchState::Killing);
                previous.kill.notify_one();
                if let Err(e) = previous.done.await {
                    tracing::warn!("Editor watcher for {} failed: {}", previous.pid, e);
                }
            }
        }

        let child = match self.spawner.spawn(&editor.command, &args) {
            Ok(child) => child,
            Err(source) => {
                self.settle(false);
                return Err(LaunchError::Spawn {
                    command: editor.command,
                    source,
                });
            }
        };
        let pid = child.id().unwrap_or_default();
        tracing::info!(
            "Opened {} with {} {:?} (pid {})",
            file,
            editor.command,
            args,
            pid
        );

        let kill = Arc::new(Notify::new());
        let done = tokio::spawn(watch_child(
            child,
            pid,
            file,
            kill.clone(),
            self.status.clone(),
        ));
        *current = Some(InFlight {
            pid,
            kill,
            done,
        });

        if let Ok(mut status) = self.status.lock() {
            status.state = LaunchState::Running;
            status.current_pid = Some(pid);
        }
        Ok(pid)
    }

    /// Wait for the tracked child, if any, to exit
    pub async fn wait(&self) -> Option<LaunchOutcome> {
        let in_flight = self.current.lock().await.take()?;
        if let Err(e) = in_flight.done.await {
            tracing::warn!("Editor watcher for {} failed: {}", in_flight.pid, e);
        }
        self.last_outcome()
    }

    /// Path string handed to the editor
    fn editor_path(&self, file: &Path) -> String {
        if self.wsl {
            if let Some(relative) = std::env::current_dir()
                .ok()
                .and_then(|cwd| wsl_relative_path(file, &cwd))
            {
                return relative.to_string_lossy().into_owned();
            }
        }
        file.to_string_lossy().into_owned()
    }

    fn set_state(&self, state: LaunchState) {
        if let Ok(mut status) = self.status.lock() {
            status.state = state;
        }
    }

    /// Return to the resting state after a launch that did not start a child
    fn settle(&self, tracking: bool) {
        if let Ok(mut status) = self.status.lock() {
            status.state = if tracking {
                LaunchState::Running
            } else {
                status.current_pid = None;
                LaunchState::Idle
            };
        }
    }
}

async fn watch_child(
    mut child: Child,
    pid: u32,
    file: String,
    kill: Arc<Notify>,
    status: Arc<Mutex<Status>>,
) {
    let exited = tokio::select! {
        result = child.wait() => Some(result),
        _ = kill.notified() => None,
    };

    let outcome = match exited {
        Some(Ok(exit)) if exit.success() => LaunchOutcome::ExitedOk,
        Some(Ok(exit)) => {
            tracing::error!("Editor exited with {} while opening {}", exit, file);
            LaunchOutcome::ExitedError
        }
        Some(Err(e)) => {
            tracing::error!("Failed to wait for editor opening {}: {}", file, e);
            LaunchOutcome::ExitedError
        }
        None => {
            if let Err(e) = child.kill().await {
                tracing::warn!("Failed to kill editor {}: {}", pid, e);
            }
            LaunchOutcome::ExitedError
        }
    };

    if let Ok(mut status) = status.lock() {
        status.last_outcome = Some(outcome);
        if status.current_pid == Some(pid) {
            status.current_pid = None;
            status.state = LaunchState::Idle;
        }
    }
}

/// Whether we run inside the Windows Subsystem for Linux
pub fn is_wsl() -> bool {
    if std::env::var_os("WSL_DISTRO_NAME").is_some() {
        return true;
    }
    std::fs::read_to_string("/proc/version")
        .map(|version| version.to_ascii_lowercase().contains("microsoft"))
        .unwrap_or(false)
}

/// Windows drive paths seen from WSL (`/mnt/c/...`) are passed relative to
/// `cwd` so Windows editors started through interop can open them.
pub fn wsl_relative_path(file: &Path, cwd: &Path) -> Option<PathBuf> {
    if !file.starts_with("/mnt/") {
        return None;
    }
    Some(relative_path(file, cwd))
}

fn relative_path(path: &Path, base: &Path) -> PathBuf {
    let path: Vec<Component> = path.components().collect();
    let base: Vec<Component> = base.components().collect();
    let common = path
        .iter()
        .zip(base.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut relative = PathBuf::new();
    for _ in common..base.len() {
        relative.push("..");
    }
    for component in &path[common..] {
        relative.push(component.as_os_str());
    }
    relative
}

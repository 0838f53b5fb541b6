use anyhow::{Context, Result as AnyhowResult};
use clap::{Parser, Subcommand};
use code_locate::config::{LocateConfig, OpenMode};
use code_locate::config_io::{ConfigResolver, DirectoryContext};
use code_locate::editor::EditorResolver;
use code_locate::launcher::{LaunchDefaults, LaunchError, LaunchRequest, Launcher};
use code_locate::partial_config::PartialLocateConfig;
use code_locate::service::{normalize, Coordinator, LocateOptions};
use code_locate::store::{RecordField, RecordStore};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Open your editor at the source location behind a clicked element
#[derive(Parser, Debug)]
#[command(name = "code-locate")]
#[command(about = "Coordinates editor launches for a project", long_about = None)]
#[command(version)]
struct Args {
    /// Path to configuration file (merged over .code-locate/config.json)
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Write logs to a file instead of stderr. Without a value the file goes
    /// to the system log directory.
    #[arg(long, value_name = "PATH", global = true, num_args = 0..=1, require_equals = true)]
    log_file: Option<Option<PathBuf>>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug, Default)]
struct ProjectArgs {
    /// Project root (default: current directory)
    #[arg(long, value_name = "DIR")]
    root: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the locate service, or reuse the one already serving the project
    Serve {
        #[command(flatten)]
        project: ProjectArgs,

        /// First port to try
        #[arg(long)]
        port: Option<u16>,

        /// Editor to open files with
        #[arg(long)]
        editor: Option<String>,

        /// reuse, new or auto
        #[arg(long, value_name = "MODE")]
        open_mode: Option<OpenMode>,

        /// Only open files inside the project root
        #[arg(long)]
        relative_paths: bool,
    },

    /// Open a file directly. Supports file:line:col syntax.
    Open {
        #[arg(value_name = "FILE[:LINE[:COLUMN]]")]
        location: String,

        #[arg(long)]
        editor: Option<String>,
    },

    /// Print the editor that would be launched
    Editor {
        #[arg(long)]
        editor: Option<String>,
    },

    /// Print the shared record of a project as JSON
    Status {
        #[command(flatten)]
        project: ProjectArgs,
    },

    /// Start a new generation: forget the published port
    Reset {
        #[command(flatten)]
        project: ProjectArgs,
    },

    /// Wait until a port is published for the project and print it
    WaitPort {
        #[command(flatten)]
        project: ProjectArgs,

        #[arg(long, value_name = "MS")]
        timeout_ms: Option<u64>,
    },

    /// Print the effective configuration as JSON
    DumpConfig,

    /// Print the JSON schema of the configuration file
    Schema,
}

impl Command {
    /// Command-line configuration layer
    fn config_layer(&self, working_dir: &Path) -> PartialLocateConfig {
        let mut layer = PartialLocateConfig::default();
        match self {
            Self::Serve {
                project,
                port,
                editor,
                open_mode,
                relative_paths,
            } => {
                layer.project_root = project.absolute_root(working_dir);
                layer.default_port = *port;
                layer.editor = editor.clone();
                layer.open_mode = *open_mode;
                layer.relative_paths = relative_paths.then_some(true);
            }
            Self::Open { editor, .. } | Self::Editor { editor } => {
                layer.editor = editor.clone();
            }
            Self::Status { project } | Self::Reset { project } => {
                layer.project_root = project.absolute_root(working_dir);
            }
            Self::WaitPort {
                project,
                timeout_ms,
            } => {
                layer.project_root = project.absolute_root(working_dir);
                layer.find_port_timeout_ms = *timeout_ms;
            }
            Self::DumpConfig | Self::Schema => {}
        }
        layer
    }
}

impl ProjectArgs {
    fn absolute_root(&self, working_dir: &Path) -> Option<PathBuf> {
        self.root.as_ref().map(|root| normalize(&working_dir.join(root)))
    }
}

/// Everything a command needs, built from the resolved configuration
struct App {
    working_dir: PathBuf,
    dir_context: DirectoryContext,
    config: LocateConfig,
}

impl App {
    fn project_root(&self) -> PathBuf {
        self.config.project_root_or(&self.working_dir)
    }

    fn store(&self) -> RecordStore {
        let output_dir = self
            .config
            .output_dir
            .clone()
            .unwrap_or_else(|| self.dir_context.default_output_dir());
        RecordStore::new(output_dir)
    }

    fn launcher(&self) -> Launcher {
        Launcher::new(
            EditorResolver::new(&self.working_dir),
            LaunchDefaults::from_config(&self.config, &self.working_dir),
        )
    }
}

fn init_tracing(log_file: Option<&Path>) -> AnyhowResult<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("code_locate=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

/// Split `file[:line[:column]]`. A path that exists as given wins, so files
/// named like `notes:10` still open.
fn parse_location(input: &str) -> (PathBuf, i64, i64) {
    let full_path = PathBuf::from(input);
    if full_path.exists() {
        return (full_path, 1, 1);
    }

    // Skip a Windows drive prefix so `C:` is not read as a line number
    let search_start = match Path::new(input).components().next() {
        Some(Component::Prefix(_)) => input.find(':').map(|i| i + 1).unwrap_or(0),
        _ => 0,
    };
    let (prefix, suffix) = input.split_at(search_start);
    let parts: Vec<&str> = suffix.rsplitn(3, ':').collect();

    match parts.as_slice() {
        [column, line, rest] => {
            if let (Ok(line), Ok(column)) = (line.parse::<i64>(), column.parse::<i64>()) {
                return (PathBuf::from(format!("{prefix}{rest}")), line, column);
            }
            let mut parts = suffix.rsplitn(2, ':');
            if let (Some(line), Some(rest)) = (parts.next(), parts.next()) {
                if let Ok(line) = line.parse::<i64>() {
                    return (PathBuf::from(format!("{prefix}{rest}")), line, 1);
                }
            }
        }
        [line, rest] => {
            if let Ok(line) = line.parse::<i64>() {
                return (PathBuf::from(format!("{prefix}{rest}")), line, 1);
            }
        }
        _ => {}
    }

    (full_path, 1, 1)
}

async fn serve(app: &App) -> AnyhowResult<()> {
    let store = app.store();
    let launcher = Arc::new(app.launcher());
    let options = LocateOptions::from_config(&app.config, &app.working_dir);
    let root = options.project_root.clone();

    let coordinator = Coordinator::new();
    let port = coordinator
        .start(options, &store, launcher)
        .await
        .context("Failed to start the locate service")?;

    let Some(handle) = coordinator.handle().filter(|handle| handle.is_serving()) else {
        println!("Locate service already running on port {port}");
        return Ok(());
    };
    println!("Locate service listening on http://127.0.0.1:{port}");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    handle.shutdown();

    // Unpublish, unless another generation took over meanwhile
    if store.get(&root).await.map(|record| record.port) == Some(port) {
        store.set(&root, RecordField::Port(0)).await;
    }
    Ok(())
}

async fn open(app: &App, location: &str) -> AnyhowResult<()> {
    let (file, line, column) = parse_location(location);
    let file = app.working_dir.join(file);
    let launcher = app.launcher();

    let pid = launcher
        .try_launch(LaunchRequest::new(&file, line, column))
        .await
        .with_context(|| format!("Failed to open {}", file.display()))?;
    tracing::debug!("Editor started with pid {}", pid);

    launcher.wait().await;
    Ok(())
}

async fn run(args: Args, dir_context: DirectoryContext) -> AnyhowResult<()> {
    let working_dir = std::env::current_dir().context("Failed to read current directory")?;
    let config = ConfigResolver::new(working_dir.clone())
        .with_explicit_file(args.config.clone())
        .resolve(args.command.config_layer(&working_dir))
        .context("Failed to load configuration")?;
    let app = App {
        working_dir,
        dir_context,
        config,
    };

    match &args.command {
        Command::Serve { .. } => serve(&app).await?,
        Command::Open { location, .. } => open(&app, location).await?,
        Command::Editor { .. } => {
            let resolved = EditorResolver::new(&app.working_dir)
                .resolve(app.config.editor.as_deref())
                .await
                .ok_or(LaunchError::NoEditor)?;
            let mut command = vec![resolved.command.clone()];
            command.extend(resolved.args.iter().cloned());
            println!("{} ({})", command.join(" "), resolved.source);
        }
        Command::Status { .. } => {
            let root = app.project_root();
            match app.store().get(&root).await {
                Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                None => println!("No record for {}", root.display()),
            }
        }
        Command::Reset { .. } => {
            let root = app.project_root();
            app.store().reset(&root).await;
            println!("Reset {}", root.display());
        }
        Command::WaitPort { .. } => {
            let timeout: Duration = app.config.find_port_timeout();
            let port = app
                .store()
                .find_port(&app.project_root(), timeout)
                .await?;
            println!("{port}");
        }
        Command::DumpConfig => {
            println!("{}", serde_json::to_string_pretty(&app.config)?);
        }
        Command::Schema => {
            let schema = schemars::schema_for!(LocateConfig);
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
    }
    Ok(())
}

fn main() -> AnyhowResult<()> {
    let args = Args::parse();
    let dir_context =
        DirectoryContext::from_system().context("Failed to determine system directories")?;
    let log_file = args
        .log_file
        .clone()
        .map(|path| path.unwrap_or_else(|| dir_context.log_path()));
    init_tracing(log_file.as_deref())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;
    runtime.block_on(run(args, dir_context))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_location() {
        assert_eq!(
            parse_location("src/missing.ts:10:4"),
            (PathBuf::from("src/missing.ts"), 10, 4)
        );
        assert_eq!(
            parse_location("src/missing.ts:10"),
            (PathBuf::from("src/missing.ts"), 10, 1)
        );
        assert_eq!(
            parse_location("src/missing.ts"),
            (PathBuf::from("src/missing.ts"), 1, 1)
        );
        assert_eq!(
            parse_location("src/a:b.ts:3"),
            (PathBuf::from("src/a:b.ts"), 3, 1)
        );
    }

    #[test]
    fn test_cli_layer_makes_root_absolute() {
        let args = Args::parse_from(["code-locate", "status", "--root", "app/../web"]);
        let layer = args.command.config_layer(Path::new("/work"));
        assert_eq!(layer.project_root, Some(PathBuf::from("/work/web")));
    }

    #[test]
    fn test_serve_flags_layer() {
        let args = Args::parse_from([
            "code-locate",
            "serve",
            "--port",
            "7000",
            "--open-mode",
            "reuse",
            "--relative-paths",
        ]);
        let layer = args.command.config_layer(Path::new("/work"));
        assert_eq!(layer.default_port, Some(7000));
        assert_eq!(layer.open_mode, Some(OpenMode::Reuse));
        assert_eq!(layer.relative_paths, Some(true));
        assert_eq!(layer.project_root, None);
    }

    #[test]
    fn test_log_file_flag() {
        let args = Args::parse_from(["code-locate", "--log-file", "schema"]);
        assert_eq!(args.log_file, Some(None));
        assert!(matches!(args.command, Command::Schema));

        let args = Args::parse_from(["code-locate", "schema", "--log-file=/tmp/cl.log"]);
        assert_eq!(args.log_file, Some(Some(PathBuf::from("/tmp/cl.log"))));
    }
}

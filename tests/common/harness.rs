// LocateHarness - a project directory, a shared store and a launcher that
// records launches instead of opening real editors

use code_locate::editor::process_list::StaticProcessList;
use code_locate::editor::{EditorResolver, Platform};
use code_locate::launcher::{LaunchDefaults, Launcher, ProcessSpawner};
use code_locate::service::{LocateOptions, ServiceHandle};
use code_locate::store::RecordStore;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::process::{Child, Command};

/// Spawner that remembers every invocation and runs a no-op program
#[derive(Default)]
pub struct RecordingSpawner {
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl RecordingSpawner {
    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }

    /// Wait up to `timeout` for at least one launch
    pub async fn wait_for_call(&self, timeout: Duration) -> Option<(String, Vec<String>)> {
        let start = Instant::now();
        while start.elapsed() < timeout {
            if let Some(call) = self.calls().into_iter().next() {
                return Some(call);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        None
    }
}

impl ProcessSpawner for RecordingSpawner {
    fn spawn(&self, command: &str, args: &[String]) -> std::io::Result<Child> {
        self.calls
            .lock()
            .unwrap()
            .push((command.to_string(), args.to_vec()));

        let mut cmd = if cfg!(windows) {
            let mut cmd = Command::new("cmd.exe");
            cmd.args(["/C", "exit", "0"]);
            cmd
        } else {
            Command::new("true")
        };
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
    }
}

pub struct LocateHarness {
    _temp_dir: TempDir,
    /// Absolute project root
    pub project_root: PathBuf,
    /// Directory backing the record store
    pub output_dir: PathBuf,
    pub store: RecordStore,
    pub spawner: Arc<RecordingSpawner>,
    pub launcher: Arc<Launcher>,
}

impl LocateHarness {
    /// Project with `src/App.tsx`, launches always go to `code`
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let project_root = temp_dir.path().join("project");
        std::fs::create_dir_all(project_root.join("src")).unwrap();
        std::fs::write(project_root.join("src/App.tsx"), "export default {}\n").unwrap();
        let output_dir = temp_dir.path().join("out");

        let spawner = Arc::new(RecordingSpawner::default());
        let launcher = Arc::new(launcher_for(&project_root, spawner.clone()));

        Self {
            store: RecordStore::new(&output_dir),
            _temp_dir: temp_dir,
            project_root,
            output_dir,
            spawner,
            launcher,
        }
    }

    /// Service options with a port range nobody else is using
    pub fn options(&self, relative_paths: bool) -> LocateOptions {
        LocateOptions {
            project_root: self.project_root.clone(),
            relative_paths,
            default_port: free_port(),
            on_locate: None,
        }
    }

    /// A second store instance over the same file, as another process would see it
    pub fn other_store(&self) -> RecordStore {
        RecordStore::new(&self.output_dir)
    }
}

pub fn launcher_for(working_dir: &Path, spawner: Arc<RecordingSpawner>) -> Launcher {
    let resolver = EditorResolver::new(working_dir)
        .with_platform(Platform::Linux)
        .with_env(Arc::new(HashMap::<String, String>::new()))
        .with_lister(Arc::new(StaticProcessList(String::new())));
    let defaults = LaunchDefaults {
        editor: Some("code".to_string()),
        ..LaunchDefaults::default()
    };
    Launcher::new(resolver, defaults)
        .with_spawner(spawner)
        .with_wsl(false)
}

/// A port the OS just handed out, so most likely free
pub fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[derive(Debug)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
    pub allow_origin: Option<String>,
    pub allow_methods: Option<String>,
    pub allow_headers: Option<String>,
}

/// Send a request to the locate endpoint from a blocking thread
pub async fn request(method: &str, port: u16, query: &str) -> HttpReply {
    let method = method.to_string();
    let url = format!("http://127.0.0.1:{port}/?{query}");
    tokio::task::spawn_blocking(move || {
        let response = match ureq::request(&method, &url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(_, response)) => response,
            Err(e) => panic!("request to {url} failed: {e}"),
        };
        HttpReply {
            status: response.status(),
            allow_origin: response
                .header("Access-Control-Allow-Origin")
                .map(str::to_string),
            allow_methods: response
                .header("Access-Control-Allow-Methods")
                .map(str::to_string),
            allow_headers: response
                .header("Access-Control-Allow-Headers")
                .map(str::to_string),
            body: response.into_string().unwrap_or_default(),
        }
    })
    .await
    .unwrap()
}

pub fn serving_port(handle: &ServiceHandle) -> u16 {
    assert!(handle.is_serving(), "expected this process to own the listener");
    handle.port()
}

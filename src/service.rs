//! Locate service
//!
//! A tiny localhost HTTP endpoint that browser-side code calls with
//! `GET /?file=&line=&column=`. One listener serves a whole project: the
//! first process to bind publishes its port in the [`RecordStore`] and every
//! later process finds it there and reuses it.
//!
//! The listener runs on its own thread (`tiny_http` is blocking) and hands
//! launches to the tokio runtime. Responses are sent before the launch runs.

use crate::config::LocateConfig;
use crate::launcher::{LaunchRequest, Launcher};
use crate::store::{RecordField, RecordStore};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tiny_http::{Header, Method, Request, Response, Server};
use tokio::sync::OnceCell;

/// Number of consecutive ports tried when binding
pub const PORT_SCAN_LIMIT: u16 = 100;

/// How long a published port may take to accept a connection before it is
/// considered stale
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// Body of the containment rejection
pub const FORBIDDEN_MESSAGE: &str = "not allowed to open this file";

/// Pause between publishing a port and checking that it is still the one
/// recorded, so a process publishing at the same moment is seen
pub const PUBLISH_SETTLE: Duration = Duration::from_millis(100);

const LISTEN_HOST: &str = "127.0.0.1";

/// A file position accepted by the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocateTarget {
    pub file: PathBuf,
    pub line: i64,
    pub column: i64,
}

/// Called for every accepted request, before the editor is launched
pub type LocateHook = Arc<dyn Fn(&LocateTarget) + Send + Sync>;

#[derive(Clone)]
pub struct LocateOptions {
    /// Absolute project root, the coordination key
    pub project_root: PathBuf,
    /// Resolve files against the root and refuse anything outside it
    pub relative_paths: bool,
    /// First port tried when binding
    pub default_port: u16,
    pub on_locate: Option<LocateHook>,
}

impl LocateOptions {
    pub fn from_config(config: &LocateConfig, working_dir: &Path) -> Self {
        Self {
            project_root: config.project_root_or(working_dir),
            relative_paths: config.relative_paths,
            default_port: config.default_port,
            on_locate: None,
        }
    }

    pub fn with_hook(mut self, hook: LocateHook) -> Self {
        self.on_locate = Some(hook);
        self
    }
}

/// Service error types
#[derive(Debug)]
pub enum ServiceError {
    NoFreePort { first: u16, attempts: u16 },
    NoRuntime,
    Io(std::io::Error),
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoFreePort { first, attempts } => write!(
                f,
                "No free port for the locate service in {}..{}",
                first,
                first.saturating_add(*attempts)
            ),
            Self::NoRuntime => write!(f, "The locate service must be started inside a tokio runtime"),
            Self::Io(e) => write!(f, "Locate service I/O error: {e}"),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<std::io::Error> for ServiceError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// A listener owned by this process
pub struct ServingHandle {
    port: u16,
    server: Mutex<Option<Arc<Server>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

/// Result of [`LocateService::start`]
pub enum ServiceHandle {
    /// Another live listener already serves the project
    Reused(u16),
    Serving(ServingHandle),
}

impl ServiceHandle {
    pub fn port(&self) -> u16 {
        match self {
            Self::Reused(port) => *port,
            Self::Serving(serving) => serving.port,
        }
    }

    pub fn is_serving(&self) -> bool {
        matches!(self, Self::Serving(_))
    }

    /// Stop the listener thread and close the socket. No-op for a reused
    /// listener or one already stopped.
    pub fn shutdown(&self) {
        let Self::Serving(serving) = self else {
            return;
        };
        let Some(server) = serving.server.lock().ok().and_then(|mut slot| slot.take()) else {
            return;
        };
        server.unblock();
        let thread = serving.thread.lock().ok().and_then(|mut slot| slot.take());
        if let Some(thread) = thread {
            if thread.join().is_err() {
                tracing::warn!("Locate service thread panicked");
            }
        }
        drop(server);
        tracing::info!("Locate service on port {} stopped", serving.port);
    }
}

pub struct LocateService;

impl LocateService {
    /// Reuse the project's live listener or start a new one and publish it
    pub async fn start(
        options: LocateOptions,
        store: &RecordStore,
        launcher: Arc<Launcher>,
    ) -> Result<ServiceHandle, ServiceError> {
        let root = &options.project_root;
        if let Some(port) = live_published_port(store, root, None).await {
            tracing::info!("Reusing locate service on port {}", port);
            return Ok(ServiceHandle::Reused(port));
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| ServiceError::NoRuntime)?;
        let (server, port) = bind(options.default_port)?;

        // Another process may have published while we were binding
        if let Some(live) = live_published_port(store, root, Some(port)).await {
            tracing::info!("Reusing locate service on port {}, releasing {}", live, port);
            drop(server);
            return Ok(ServiceHandle::Reused(live));
        }
        store.set(root, RecordField::Port(port)).await;

        // Of two processes publishing together the last write wins; the other
        // closes its listener instead of serving unpublished
        tokio::time::sleep(PUBLISH_SETTLE).await;
        if let Some(live) = live_published_port(store, root, Some(port)).await {
            tracing::info!("Port {} was replaced by {}, releasing it", port, live);
            drop(server);
            return Ok(ServiceHandle::Reused(live));
        }
        let published = store.get(root).await.map(|record| record.port);
        if published != Some(port) {
            tracing::debug!("Republishing port {} over dead port {:?}", port, published);
            store.set(root, RecordField::Port(port)).await;
        }

        let server = Arc::new(server);
        tracing::info!(
            "Locate service listening on http://{}:{} for {}",
            LISTEN_HOST,
            port,
            options.project_root.display()
        );

        let context = RequestContext {
            options,
            launcher,
            runtime,
        };
        let thread_server = server.clone();
        let thread = std::thread::Builder::new()
            .name("locate-service".to_string())
            .spawn(move || serve(&thread_server, &context))?;

        Ok(ServiceHandle::Serving(ServingHandle {
            port,
            server: Mutex::new(Some(server)),
            thread: Mutex::new(Some(thread)),
        }))
    }
}

/// Starts the locate service at most once per process; concurrent callers
/// share the first result.
#[derive(Default)]
pub struct Coordinator {
    handle: OnceCell<ServiceHandle>,
}

impl Coordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn start(
        &self,
        options: LocateOptions,
        store: &RecordStore,
        launcher: Arc<Launcher>,
    ) -> Result<u16, ServiceError> {
        self.handle
            .get_or_try_init(|| LocateService::start(options, store, launcher))
            .await
            .map(ServiceHandle::port)
    }

    pub fn handle(&self) -> Option<&ServiceHandle> {
        self.handle.get()
    }
}

/// The project's published port if it is positive, not `own`, and answering
async fn live_published_port(store: &RecordStore, root: &Path, own: Option<u16>) -> Option<u16> {
    let port = store
        .get(root)
        .await
        .map(|record| record.port)
        .filter(|port| *port > 0 && Some(*port) != own)?;
    if probe(port).await {
        Some(port)
    } else {
        tracing::debug!("Published port {} is not answering", port);
        None
    }
}

/// Whether something accepts connections on a local port
pub async fn probe(port: u16) -> bool {
    matches!(
        tokio::time::timeout(
            PROBE_TIMEOUT,
            tokio::net::TcpStream::connect((LISTEN_HOST, port))
        )
        .await,
        Ok(Ok(_))
    )
}

fn bind(first: u16) -> Result<(Server, u16), ServiceError> {
    let last = first.saturating_add(PORT_SCAN_LIMIT - 1);
    for port in first..=last {
        match Server::http((LISTEN_HOST, port)) {
            Ok(server) => return Ok((server, port)),
            Err(e) => tracing::debug!("Port {} unavailable: {}", port, e),
        }
    }
    Err(ServiceError::NoFreePort {
        first,
        attempts: PORT_SCAN_LIMIT,
    })
}

struct RequestContext {
    options: LocateOptions,
    launcher: Arc<Launcher>,
    runtime: tokio::runtime::Handle,
}

fn serve(server: &Server, context: &RequestContext) {
    loop {
        match server.recv() {
            Ok(request) => handle_request(request, context),
            Err(e) => {
                tracing::debug!("Locate service stopped receiving: {}", e);
                break;
            }
        }
    }
}

fn handle_request(request: Request, context: &RequestContext) {
    if *request.method() == Method::Options {
        respond(request, 200, "");
        return;
    }

    let query = request
        .url()
        .split_once('?')
        .map(|(_, query)| query.to_string())
        .unwrap_or_default();
    let params = LocateParams::parse(&query);

    let file = if context.options.relative_paths {
        match resolve_within(&context.options.project_root, &params.file) {
            Some(file) => file,
            None => {
                tracing::warn!("Refused to open {:?} outside the project", params.file);
                respond(request, 403, FORBIDDEN_MESSAGE);
                return;
            }
        }
    } else {
        PathBuf::from(&params.file)
    };

    respond(request, 200, "ok");

    let target = LocateTarget {
        file,
        line: params.line,
        column: params.column,
    };
    if let Some(hook) = &context.options.on_locate {
        hook(&target);
    }

    let launcher = context.launcher.clone();
    context.runtime.spawn(async move {
        launcher
            .launch(LaunchRequest::new(target.file, target.line, target.column))
            .await;
    });
}

/// Query parameters of a locate request. Unparsable numbers become 0, which
/// the launcher rejects for lines and clamps for columns.
#[derive(Debug, Default, PartialEq, Eq)]
struct LocateParams {
    file: String,
    line: i64,
    column: i64,
}

impl LocateParams {
    fn parse(query: &str) -> Self {
        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "file" => params.file = value.into_owned(),
                "line" => params.line = value.trim().parse().unwrap_or_default(),
                "column" => params.column = value.trim().parse().unwrap_or_default(),
                _ => {}
            }
        }
        params
    }
}

fn respond(request: Request, status: u16, body: &str) {
    let mut response = Response::from_string(body).with_status_code(status);
    for name in [
        "Access-Control-Allow-Origin",
        "Access-Control-Allow-Methods",
        "Access-Control-Allow-Headers",
    ] {
        if let Ok(header) = Header::from_bytes(name.as_bytes(), &b"*"[..]) {
            response.add_header(header);
        }
    }
    if let Err(e) = request.respond(response) {
        tracing::debug!("Failed to answer locate request: {}", e);
    }
}

/// Resolve `file` against `root`, `None` if the result leaves the root.
///
/// The lexical check catches `..` segments; the canonical check catches
/// symlinks inside the root that point elsewhere.
pub fn resolve_within(root: &Path, file: &str) -> Option<PathBuf> {
    if file.is_empty() {
        return None;
    }
    let root = normalize(root);
    let resolved = normalize(&root.join(file));
    if !resolved.starts_with(&root) {
        return None;
    }

    if let (Ok(real_root), Ok(real_file)) = (root.canonicalize(), resolved.canonicalize()) {
        if !real_file.starts_with(&real_root) {
            return None;
        }
    }
    Some(resolved)
}

/// Lexically remove `.` and `..` components
pub fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // `..` never climbs above the root
                if !matches!(
                    normalized.components().next_back(),
                    None | Some(Component::RootDir) | Some(Component::Prefix(_))
                ) {
                    normalized.pop();
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

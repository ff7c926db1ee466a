//! Test support utilities.
//!
//! Provides a local HTTP stub standing in for the version manifest service
//! and a scripted stand-in for the container engine CLI, plus a `log`
//! sink that records what the crate logs.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use reqwest::Client;
use tokio::io::{AsyncBufReadExt as _, AsyncWriteExt as _, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use crate::config::LauncherConfig;

type Routes = Arc<Mutex<HashMap<String, Vec<u8>>>>;

struct CaptureLogger {
    records: Mutex<Vec<(log::Level, String)>>,
}

static CAPTURE: CaptureLogger = CaptureLogger {
    records: Mutex::new(Vec::new()),
};

impl log::Log for CaptureLogger {
    fn enabled(&self, _metadata: &log::Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &log::Record<'_>) {
        self.records
            .lock()
            .unwrap()
            .push((record.level(), record.args().to_string()));
    }

    fn flush(&self) {}
}

/// Route the `log` facade into an in-memory sink shared by all tests.
/// Filter by something unique to the test when reading it back.
pub fn capture_logs() {
    let _ = log::set_logger(&CAPTURE);
    log::set_max_level(log::LevelFilter::Info);
}

/// Captured records whose message contains `needle`.
pub fn captured_logs(needle: &str) -> Vec<(log::Level, String)> {
    CAPTURE
        .records
        .lock()
        .unwrap()
        .iter()
        .filter(|(_, msg)| msg.contains(needle))
        .cloned()
        .collect()
}

/// HTTP client that never goes through an environment proxy.
pub fn test_client() -> Client {
    Client::builder().no_proxy().build().unwrap()
}

/// Serves fixed bodies by path; unknown paths get a 404.
pub struct StubServer {
    addr: SocketAddr,
    routes: Routes,
    task: JoinHandle<()>,
}

impl StubServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let routes: Routes = Arc::default();

        let serve_routes = Arc::clone(&routes);
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve_one(stream, Arc::clone(&serve_routes)));
            }
        });

        Self { addr, routes, task }
    }

    /// A manifest at `/manifest.json` listing `versions`, each with metadata
    /// and a downloadable artifact.
    pub async fn with_versions(versions: &[&str]) -> Self {
        let stub = Self::start().await;

        let entries: Vec<serde_json::Value> = versions
            .iter()
            .map(|v| serde_json::json!({ "id": v, "type": "release", "url": stub.url(&format!("/meta/{v}.json")) }))
            .collect();
        stub.route(
            "/manifest.json",
            serde_json::json!({ "latest": {}, "versions": entries })
                .to_string()
                .into_bytes(),
        );

        for v in versions {
            stub.route(
                &format!("/meta/{v}.json"),
                serde_json::json!({ "id": v, "downloads": { "server": { "url": stub.artifact_url(v) } } })
                    .to_string()
                    .into_bytes(),
            );
            stub.route(&format!("/artifacts/{v}/server.jar"), Self::artifact_bytes(v));
        }

        stub
    }

    pub fn route(&self, path: &str, body: Vec<u8>) {
        self.routes.lock().unwrap().insert(path.to_string(), body);
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn manifest_url(&self) -> String {
        self.url("/manifest.json")
    }

    pub fn artifact_url(&self, version: &str) -> String {
        self.url(&format!("/artifacts/{version}/server.jar"))
    }

    pub fn artifact_bytes(version: &str) -> Vec<u8> {
        format!("PK fake server jar {version}").into_bytes()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve_one(stream: TcpStream, routes: Routes) {
    let (read, mut write) = stream.into_split();
    let mut reader = BufReader::new(read);

    let mut request_line = String::new();
    if reader.read_line(&mut request_line).await.is_err() {
        return;
    }
    loop {
        let mut header = String::new();
        match reader.read_line(&mut header).await {
            Ok(0) => break,
            Ok(_) if header == "\r\n" || header == "\n" => break,
            Ok(_) => {}
            Err(_) => return,
        }
    }

    let path = request_line.split_whitespace().nth(1).unwrap_or("/");
    let body = routes.lock().unwrap().get(path).cloned();
    let (status, body) = match body {
        Some(body) => ("200 OK", body),
        None => ("404 Not Found", b"not found".to_vec()),
    };

    let head = format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    let _ = write.write_all(head.as_bytes()).await;
    let _ = write.write_all(&body).await;
    let _ = write.shutdown().await;
}

/// A host that accepts connections and never answers. Returns its URL and
/// the accept task.
pub async fn stalled_server() -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let task = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    (format!("http://{}/manifest.json", addr), task)
}

/// Writes an executable script that logs each invocation's arguments to
/// `<dir>/engine.log` and exits 1 when the first argument is in `fail_on`.
#[cfg(unix)]
pub fn fake_engine(dir: &Path, fail_on: &[&str]) -> PathBuf {
    use std::os::unix::fs::PermissionsExt as _;

    let log = dir.join("engine.log");
    let mut script = format!(
        "#!/bin/sh\necho \"$@\" >> '{}'\ncase \"$1\" in\n",
        log.display()
    );
    for sub in fail_on {
        script.push_str(&format!("  {sub}) echo \"{sub} failed\" >&2; exit 1 ;;\n"));
    }
    script.push_str("esac\nexit 0\n");

    let path = dir.join("fake-engine");
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Lines logged by [`fake_engine`], one per invocation.
pub fn engine_calls(dir: &Path) -> Vec<String> {
    std::fs::read_to_string(dir.join("engine.log"))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

/// Config rooted in `root` whose "server" is a long `sleep`.
pub fn test_config(root: &Path, manifest_url: String) -> LauncherConfig {
    let mut config = LauncherConfig::with_instances_dir(root.join("instances"));
    config.manifest_url = manifest_url;
    config.launch.program = "sleep".to_string();
    config.launch.args = vec!["30".to_string()];
    config.http_timeout_secs = 10;
    config.download_timeout_secs = 10;
    config.stop_timeout_secs = 5;
    config
}

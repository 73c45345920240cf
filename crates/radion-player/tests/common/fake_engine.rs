#![allow(dead_code)]

//! Stand-in for mpv's JSON IPC socket.  Connections are served one at a
//! time, so commands are recorded in the order the client sent them.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use radion_player::ipc::IpcClient;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio::task::JoinHandle;

pub struct FakeEngine {
    path: PathBuf,
    commands: Arc<Mutex<Vec<Value>>>,
    metadata: Arc<Mutex<String>>,
    task: JoinHandle<()>,
    _dir: Option<tempfile::TempDir>,
}

impl FakeEngine {
    pub fn start() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("mpv.sock");
        let mut engine = Self::start_at(&path);
        engine._dir = Some(dir);
        engine
    }

    pub fn start_at(path: &Path) -> Self {
        let listener = UnixListener::bind(path).expect("bind fake mpv socket");
        let commands = Arc::new(Mutex::new(Vec::new()));
        let metadata = Arc::new(Mutex::new(
            r#"{"error":"property unavailable","request_id":0}"#.to_string(),
        ));
        let task = tokio::spawn(serve(listener, commands.clone(), metadata.clone()));
        Self {
            path: path.to_path_buf(),
            commands,
            metadata,
            task,
            _dir: None,
        }
    }

    pub fn address(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    pub fn ipc(&self) -> IpcClient {
        IpcClient::new(self.address(), Duration::from_millis(500), 1024)
    }

    /// Raw reply line for the next `get_property metadata` queries.
    pub fn set_metadata(&self, reply: &str) {
        *self.metadata.lock().unwrap() = reply.to_string();
    }

    /// Every `command` array received so far.
    pub fn commands(&self) -> Vec<Value> {
        self.commands.lock().unwrap().clone()
    }

    /// Received commands except metadata polls.
    pub fn control_commands(&self) -> Vec<Value> {
        self.commands()
            .into_iter()
            .filter(|c| c[0] != "get_property")
            .collect()
    }

    pub fn metadata_queries(&self) -> usize {
        self.commands()
            .iter()
            .filter(|c| c[0] == "get_property")
            .count()
    }

    /// Stop listening and remove the socket file.
    pub fn shutdown(self) {
        self.task.abort();
        let _ = std::fs::remove_file(&self.path);
    }
}

impl Drop for FakeEngine {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(
    listener: UnixListener,
    commands: Arc<Mutex<Vec<Value>>>,
    metadata: Arc<Mutex<String>>,
) {
    while let Ok((stream, _)) = listener.accept().await {
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        let mut line = String::new();

        let read = tokio::time::timeout(Duration::from_secs(1), reader.read_line(&mut line)).await;
        let Ok(Ok(n)) = read else { continue };
        if n == 0 {
            // readiness probe: connect and close
            continue;
        }
        let Ok(value) = serde_json::from_str::<Value>(line.trim()) else {
            continue;
        };
        let command = value["command"].clone();
        let is_query = command[0] == "get_property";
        commands.lock().unwrap().push(command);

        if is_query {
            let mut reply = metadata.lock().unwrap().clone();
            reply.push('\n');
            let _ = write_half.write_all(reply.as_bytes()).await;
        }
    }
}

/// Poll `check` until it holds or `timeout` passes.
pub async fn eventually<F>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

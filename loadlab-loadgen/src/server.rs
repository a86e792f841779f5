use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::PathBuf;
use std::process::{Child, Command};
use std::time::{Duration, Instant};

const READY_TIMEOUT: Duration = Duration::from_secs(30);

/// A `loadlab-server` child process, killed on drop.
pub struct ServerProcess {
    child: Child,
    pub addr: SocketAddr,
}

impl Drop for ServerProcess {
    fn drop(&mut self) {
        self.child.kill().ok();
        self.child.wait().ok();
    }
}

impl ServerProcess {
    /// Build the `loadlab-server` binary, spawn it on a free local port and wait
    /// until it accepts connections.
    ///
    /// Errors map to exit code 3 in the CLI.
    pub fn build_and_spawn() -> Result<Self, String> {
        let status = Command::new("cargo")
            .args(["build", "-p", "loadlab-server"])
            .status()
            .map_err(|e| format!("Failed to invoke cargo build: {e}"))?;
        if !status.success() {
            return Err(format!("cargo build -p loadlab-server failed: {status}"));
        }

        let port = pick_free_port()?;
        let addr = SocketAddr::from(([127, 0, 0, 1], port));

        let child = Command::new(server_binary_path()?)
            .args(["--host", "127.0.0.1", "--port", &port.to_string()])
            .spawn()
            .map_err(|e| format!("Failed to spawn loadlab-server: {e}"))?;
        // From here on, an early return drops `server` and kills the child.
        let server = ServerProcess { child, addr };

        poll_until_ready(addr, Instant::now() + READY_TIMEOUT)
            .map_err(|e| format!("Server not ready within timeout: {e}"))?;

        Ok(server)
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

/// Reserve a free TCP port by binding to port 0 and releasing it.
pub fn pick_free_port() -> Result<u16, String> {
    let listener =
        TcpListener::bind("127.0.0.1:0").map_err(|e| format!("Failed to reserve port: {e}"))?;
    listener
        .local_addr()
        .map(|addr| addr.port())
        .map_err(|e| format!("Failed to read reserved port: {e}"))
}

/// Path of the `loadlab-server` binary next to this executable in `target/<profile>/`
/// (one level up when running from `target/<profile>/deps/` as a test).
fn server_binary_path() -> Result<PathBuf, String> {
    let mut path = std::env::current_exe()
        .map_err(|e| format!("Cannot determine own executable path: {e}"))?;
    path.pop();
    if path.file_name().is_some_and(|n| n == "deps") {
        path.pop();
    }
    path.push(format!("loadlab-server{}", std::env::consts::EXE_SUFFIX));
    Ok(path)
}

/// Poll `addr` with TCP connects until one succeeds or `deadline` passes.
fn poll_until_ready(addr: SocketAddr, deadline: Instant) -> Result<(), String> {
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(format!("timed out waiting for {addr}"));
        }
        let probe = Duration::min(remaining, Duration::from_millis(200));
        if TcpStream::connect_timeout(&addr, probe).is_ok() {
            return Ok(());
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}

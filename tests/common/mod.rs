use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// A foreground daemon instance under test, with its lock and log files
/// confined to a temp directory.
pub struct TestDaemon {
    pub child: Child,
    pub addr: SocketAddr,
    pub pid_file: PathBuf,
    _temp_dir: TempDir,
}

impl TestDaemon {
    /// Launch `wardend --foreground` on a free port and wait until it
    /// accepts connections.
    pub fn launch() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let pid_file = temp_dir.path().join("wardend.pid");
        let log_file = temp_dir.path().join("wardend.out");
        let port = free_port();

        let child = Command::new(wardend_bin())
            .arg(port.to_string())
            .arg("--foreground")
            .arg("--pid-file")
            .arg(&pid_file)
            .arg("--log-file")
            .arg(&log_file)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("daemon should spawn");

        let daemon = Self {
            child,
            addr: SocketAddr::from(([127, 0, 0, 1], port)),
            pid_file,
            _temp_dir: temp_dir,
        };

        daemon.wait_until_accepting();
        daemon
    }

    fn wait_until_accepting(&self) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if TcpStream::connect_timeout(&self.addr, Duration::from_millis(200)).is_ok() {
                return;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        panic!("daemon never started accepting on {}", self.addr);
    }

    /// Open a session and verify the connection is live.
    pub fn connect(&self) -> TestSession {
        let stream = TcpStream::connect_timeout(&self.addr, Duration::from_secs(5)).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(10)))
            .unwrap();
        TestSession::new(stream)
    }

    pub fn is_accepting(&self) -> bool {
        TcpStream::connect_timeout(&self.addr, Duration::from_millis(500)).is_ok()
    }

    pub fn send_sigterm(&self) {
        unsafe {
            libc::kill(self.child.id() as i32, libc::SIGTERM);
        }
    }

    /// Wait for the daemon process to exit and return whether it was clean.
    pub fn wait_for_exit(&mut self) -> bool {
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if let Some(status) = self.child.try_wait().unwrap() {
                return status.success();
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        false
    }

    /// Give the accept loop a moment to observe a signal.
    pub fn settle(&self) {
        std::thread::sleep(Duration::from_millis(300));
    }
}

impl Drop for TestDaemon {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// One line-oriented exchange with a worker.
pub struct TestSession {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl TestSession {
    fn new(stream: TcpStream) -> Self {
        let writer = stream.try_clone().unwrap();
        Self {
            reader: BufReader::new(stream),
            writer,
        }
    }

    pub fn round_trip(&mut self, request: &str) -> String {
        writeln!(self.writer, "{request}").unwrap();
        self.writer.flush().unwrap();

        let mut line = String::new();
        self.reader.read_line(&mut line).unwrap();
        line.trim_end_matches(['\r', '\n']).to_string()
    }

    /// Send quit and confirm the worker closes the connection.
    pub fn quit(mut self) {
        assert_eq!(self.round_trip("quit"), "bye");

        let mut line = String::new();
        let bytes = self.reader.read_line(&mut line).unwrap();
        assert_eq!(bytes, 0, "worker should close after quit");
    }
}

pub fn wardend_bin() -> PathBuf {
    assert_cmd::cargo::cargo_bin("wardend")
}

/// Grab a port the kernel considers free right now. Racy in principle, good
/// enough for tests.
pub fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

pub fn read_pid_file(path: &Path) -> u32 {
    std::fs::read_to_string(path)
        .unwrap()
        .trim()
        .parse()
        .unwrap()
}

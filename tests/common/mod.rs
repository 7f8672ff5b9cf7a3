#![allow(dead_code)]

use promsync::registry::MemoryRegistry;
use promsync::settings::Settings;
use promsync::supervisor::Supervisor;
use promsync::target::Target;
use std::fs;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// A daemon stand-in that records its arguments and every SIGHUP it receives.
const FAKE_DAEMON: &str = r#"#!/bin/sh
printf '%s\n' "$@" > "{dir}/args.txt"
trap 'echo hup >> "{dir}/hups.txt"' HUP
echo "fake daemon up"
while true; do sleep 0.1; done
"#;

/// Same, but ignores SIGTERM so stop() has to escalate.
const STUBBORN_DAEMON: &str = r#"#!/bin/sh
printf '%s\n' "$@" > "{dir}/args.txt"
trap '' TERM
while true; do sleep 0.1; done
"#;

/// Exits during the startup grace period.
const FAILING_DAEMON: &str = r#"#!/bin/sh
echo "loading config" >&2
echo "boom: unknown flag" >&2
exit 3
"#;

/// Isolated directory, daemon scripts and port for one supervisor.
pub struct TestEnv {
    temp_dir: TempDir,
    pub port: u16,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
            port: free_port(),
        }
    }

    pub fn dir(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir().join("conf").join("prometheus.yml")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.dir().join("data")
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir().join("prometheus.log")
    }

    pub fn fake_daemon(&self) -> PathBuf {
        self.write_script("prometheus", FAKE_DAEMON)
    }

    pub fn stubborn_daemon(&self) -> PathBuf {
        self.write_script("stubborn", STUBBORN_DAEMON)
    }

    pub fn failing_daemon(&self) -> PathBuf {
        self.write_script("failing", FAILING_DAEMON)
    }

    fn write_script(&self, name: &str, body: &str) -> PathBuf {
        let path = self.dir().join(name);
        fs::write(&path, body.replace("{dir}", &self.dir().display().to_string())).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        }
        path
    }

    /// Settings pointing into the temp dir, with timings short enough for tests.
    pub fn settings(&self, binary: &Path) -> Settings {
        let mut settings = Settings::default();
        settings.daemon.binary_path = binary.to_path_buf();
        settings.daemon.config_path = self.config_path();
        settings.daemon.data_dir = self.data_dir();
        settings.daemon.log_file = self.log_path();
        settings.daemon.listen_port = self.port;
        settings.daemon.startup_grace = "300ms".to_string();
        settings.daemon.stop_poll_attempts = 10;
        settings.daemon.stop_poll_interval = "100ms".to_string();
        settings.reclaim.grace = "100ms".to_string();
        settings.reclaim.settle = "0s".to_string();
        settings.monitor.interval = "200ms".to_string();
        settings.monitor.join_timeout = "2s".to_string();
        settings
    }

    pub fn supervisor(&self, binary: &Path, registry: Arc<MemoryRegistry>) -> Arc<Supervisor> {
        Supervisor::new(self.settings(binary), registry)
    }

    pub fn read_config(&self) -> String {
        fs::read_to_string(self.config_path()).unwrap_or_default()
    }

    /// Arguments the fake daemon was started with, one per line.
    pub fn recorded_args(&self) -> Vec<String> {
        fs::read_to_string(self.dir().join("args.txt"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn daemon_was_spawned(&self) -> bool {
        self.dir().join("args.txt").exists()
    }

    /// Number of SIGHUPs the fake daemon has handled.
    pub fn hup_count(&self) -> usize {
        fs::read_to_string(self.dir().join("hups.txt"))
            .unwrap_or_default()
            .lines()
            .count()
    }

    /// Poll `check` every 50ms for up to 5 seconds without blocking the runtime.
    pub async fn wait_until(&self, what: &str, check: impl Fn() -> bool) {
        for _ in 0..100 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("timed out waiting for {what}");
    }

    /// Run the promsync binary with the temp dir as working directory.
    pub fn run_command(&self, args: &[&str], extra_env: &[(&str, &str)]) -> std::process::Output {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_promsync"));
        cmd.args(args)
            .current_dir(self.dir())
            .env_remove("DATABASE_URL")
            .env_remove("PROMSYNC_SETTINGS")
            .env("PROMSYNC_LOG", "debug")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, val) in extra_env {
            cmd.env(key, val);
        }
        cmd.output().expect("Failed to execute promsync command")
    }

    /// Settings file with reclaim timings short enough for tests.
    pub fn write_fast_settings(&self) -> PathBuf {
        let path = self.dir().join("settings.toml");
        fs::write(&path, "[reclaim]\ngrace = \"300ms\"\nsettle = \"200ms\"\n").unwrap();
        path
    }

    pub fn write_targets_file(&self, content: &str) -> PathBuf {
        let path = self.dir().join("targets.toml");
        fs::write(&path, content).unwrap();
        path
    }
}

/// Listens on `port` and ignores SIGTERM. Returns once the socket is bound.
pub fn spawn_port_holder(port: u16) -> std::process::Child {
    use std::io::{BufRead, BufReader};

    let script = r#"
import signal, socket, sys, time
signal.signal(signal.SIGTERM, signal.SIG_IGN)
s = socket.socket()
s.setsockopt(socket.SOL_SOCKET, socket.SO_REUSEADDR, 1)
s.bind(("0.0.0.0", int(sys.argv[1])))
s.listen()
print("ready", flush=True)
time.sleep(60)
"#;
    let mut child = Command::new("python3")
        .args(["-c", script, &port.to_string()])
        .stdout(Stdio::piped())
        .spawn()
        .expect("Failed to spawn port holder");
    let mut line = String::new();
    BufReader::new(child.stdout.take().unwrap())
        .read_line(&mut line)
        .unwrap();
    assert_eq!(line.trim(), "ready");
    child
}

pub fn targets() -> Vec<Target> {
    vec![
        Target::new("A", "alpha", "https://a.com/m", "t1"),
        Target::new("B", "beta", "http://b.com:81/m", "t1"),
        Target::new("C", "gamma", "https://c.com/m", "t2"),
    ]
}

pub fn free_port() -> u16 {
    TcpListener::bind(("127.0.0.1", 0))
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

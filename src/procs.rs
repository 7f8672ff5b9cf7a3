use once_cell::sync::Lazy;
use std::sync::Mutex;
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate};

pub struct Procs {
    system: Mutex<sysinfo::System>,
}

pub static PROCS: Lazy<Procs> = Lazy::new(Procs::new);

impl Default for Procs {
    fn default() -> Self {
        Self::new()
    }
}

impl Procs {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(sysinfo::System::new()),
        }
    }

    fn lock_system(&self) -> std::sync::MutexGuard<'_, sysinfo::System> {
        self.system.lock().unwrap_or_else(|poisoned| {
            warn!("System mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Process name and command line, refreshed on demand. Used for log lines only.
    pub fn describe(&self, pid: u32) -> Option<String> {
        let sys_pid = sysinfo::Pid::from_u32(pid);
        let mut system = self.lock_system();
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[sys_pid]),
            true,
            ProcessRefreshKind::everything(),
        );
        system.process(sys_pid).map(|p| {
            let cmd = p
                .cmd()
                .iter()
                .map(|arg| arg.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ");
            if cmd.is_empty() {
                p.name().to_string_lossy().to_string()
            } else {
                cmd
            }
        })
    }
}

/// Signals the supervisor sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Sig {
    Term,
    Kill,
    Hup,
}

/// Result of delivering a signal: delivered, or the target no longer exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Gone,
}

#[cfg(unix)]
mod imp {
    use super::{Delivery, Sig};
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, kill, killpg};
    use nix::unistd::Pid;

    fn to_nix(sig: Sig) -> Signal {
        match sig {
            Sig::Term => Signal::SIGTERM,
            Sig::Kill => Signal::SIGKILL,
            Sig::Hup => Signal::SIGHUP,
        }
    }

    fn delivery(result: nix::Result<()>) -> Result<Delivery, String> {
        match result {
            Ok(()) => Ok(Delivery::Sent),
            Err(Errno::ESRCH) => Ok(Delivery::Gone),
            Err(e) => Err(e.to_string()),
        }
    }

    pub fn signal_pid(pid: u32, sig: Sig) -> Result<Delivery, String> {
        let pid = i32::try_from(pid).map_err(|e| e.to_string())?;
        delivery(kill(Pid::from_raw(pid), to_nix(sig)))
    }

    pub fn signal_group(pgid: u32, sig: Sig) -> Result<Delivery, String> {
        let pgid = i32::try_from(pgid).map_err(|e| e.to_string())?;
        delivery(killpg(Pid::from_raw(pgid), to_nix(sig)))
    }

    pub fn is_alive(pid: u32) -> bool {
        let Ok(pid) = i32::try_from(pid) else {
            return false;
        };
        match kill(Pid::from_raw(pid), None::<Signal>) {
            Ok(()) => true,
            Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }
}

#[cfg(not(unix))]
mod imp {
    use super::{Delivery, PROCS, Sig};

    pub fn signal_pid(pid: u32, sig: Sig) -> Result<Delivery, String> {
        if sig == Sig::Hup {
            return Err("live reload signals are not supported on this platform".to_string());
        }
        let sys_pid = sysinfo::Pid::from_u32(pid);
        let mut system = PROCS.lock_system();
        system.refresh_processes(sysinfo::ProcessesToUpdate::Some(&[sys_pid]), true);
        match system.process(sys_pid) {
            Some(process) => {
                process.kill();
                Ok(Delivery::Sent)
            }
            None => Ok(Delivery::Gone),
        }
    }

    pub fn signal_group(pgid: u32, sig: Sig) -> Result<Delivery, String> {
        signal_pid(pgid, sig)
    }

    pub fn is_alive(pid: u32) -> bool {
        let sys_pid = sysinfo::Pid::from_u32(pid);
        let mut system = PROCS.lock_system();
        system.refresh_processes(sysinfo::ProcessesToUpdate::Some(&[sys_pid]), true);
        system.process(sys_pid).is_some()
    }
}

pub use imp::{is_alive, signal_group, signal_pid};

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::Command;
    use std::time::Duration;

    #[test]
    fn test_own_process_is_alive() {
        assert!(is_alive(std::process::id()));
        assert!(PROCS.describe(std::process::id()).is_some());
    }

    #[test]
    fn test_signal_terminates_and_reports_gone() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        let pid = child.id();
        assert!(is_alive(pid));

        assert_eq!(signal_pid(pid, Sig::Term).unwrap(), Delivery::Sent);
        child.wait().unwrap();
        std::thread::sleep(Duration::from_millis(50));

        assert!(!is_alive(pid));
        assert_eq!(signal_pid(pid, Sig::Term).unwrap(), Delivery::Gone);
    }

    #[test]
    fn test_sig_display() {
        assert_eq!(Sig::Term.to_string(), "TERM");
        assert_eq!(Sig::Hup.to_string(), "HUP");
    }
}

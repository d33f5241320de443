//! Process inspection and signaling
//!
//! Unix-only: signal delivery via kill(2), descendant discovery through
//! `/proc` with a `pgrep` fallback, and CPU usage sampling from `/proc/stat`
//! deltas. Other platforms get descriptive errors.

use std::collections::HashMap;
use std::time::Duration;

use crate::error::CoreError;

#[cfg(unix)]
mod unix {
    use super::*;
    use std::fs;
    use std::process::Command;

    /// Translate a signal name (or numeric string) to a signal number.
    pub fn signal_from_name(name: &str) -> Result<i32, CoreError> {
        let trimmed = name.trim();
        if let Ok(num) = trimmed.parse::<i32>() {
            return Ok(num);
        }
        let sig = match trimmed.to_uppercase().as_str() {
            "HUP" => libc::SIGHUP,
            "INT" => libc::SIGINT,
            "QUIT" => libc::SIGQUIT,
            "ILL" => libc::SIGILL,
            "TRAP" => libc::SIGTRAP,
            "ABRT" => libc::SIGABRT,
            "BUS" => libc::SIGBUS,
            "FPE" => libc::SIGFPE,
            "KILL" => libc::SIGKILL,
            "USR1" => libc::SIGUSR1,
            "SEGV" => libc::SIGSEGV,
            "USR2" => libc::SIGUSR2,
            "PIPE" => libc::SIGPIPE,
            "ALRM" => libc::SIGALRM,
            "TERM" => libc::SIGTERM,
            "CHLD" => libc::SIGCHLD,
            "CONT" => libc::SIGCONT,
            "STOP" => libc::SIGSTOP,
            "TSTP" => libc::SIGTSTP,
            "VTALRM" => libc::SIGVTALRM,
            "PROF" => libc::SIGPROF,
            "WINCH" => libc::SIGWINCH,
            _ => return Err(CoreError::Input(format!("unknown signal: {}", name))),
        };
        Ok(sig)
    }

    /// Deliver a signal; a process that is already gone is not an error.
    pub fn send_signal(pid: i32, sig: i32) -> Result<(), CoreError> {
        let rc = unsafe { libc::kill(pid, sig) };
        if rc == 0 {
            return Ok(());
        }
        let errno = std::io::Error::last_os_error();
        if errno.raw_os_error() == Some(libc::ESRCH) {
            return Ok(());
        }
        Err(CoreError::Input(format!(
            "failed to send signal to pid {}: {}",
            pid, errno
        )))
    }

    fn process_alive(pid: i32) -> bool {
        unsafe { libc::kill(pid, 0) == 0 }
    }

    fn direct_children(pid: i32) -> Vec<i32> {
        // Linux 3.4+ exposes children directly; fall back to pgrep elsewhere.
        let children_path = format!("/proc/{}/task/{}/children", pid, pid);
        if let Ok(content) = fs::read_to_string(&children_path) {
            return content
                .split_whitespace()
                .filter_map(|f| f.parse().ok())
                .collect();
        }

        let output = Command::new("pgrep").arg("-P").arg(pid.to_string()).output();
        match output {
            Ok(out) => String::from_utf8_lossy(&out.stdout)
                .lines()
                .filter_map(|l| l.trim().parse().ok())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    /// All descendants of `pid`, parents before their children.
    pub fn child_pids_recursive(pid: i32) -> Vec<i32> {
        let mut out = Vec::new();
        for child in direct_children(pid) {
            out.push(child);
            out.extend(child_pids_recursive(child));
        }
        out
    }

    /// Signal the whole tree, deepest descendants first, root last.
    pub fn kill_process_tree(pid: i32, signal: &str) -> Result<(), CoreError> {
        if pid <= 0 {
            return Err(CoreError::Input(format!("invalid PID: {}", pid)));
        }
        let sig = signal_from_name(signal)?;

        let children = child_pids_recursive(pid);
        for &child in children.iter().rev() {
            if let Err(e) = send_signal(child, sig) {
                tracing::warn!(pid = child, error = %e, "failed to signal child process");
            }
        }
        send_signal(pid, sig)
    }

    /// Whether the root or any descendant is still alive.
    pub fn process_tree_exists(pid: i32) -> bool {
        if process_alive(pid) {
            return true;
        }
        child_pids_recursive(pid).into_iter().any(process_alive)
    }

    /// Graceful termination: signal the tree, poll liveness every 100 ms up
    /// to the deadline, then escalate to KILL. `force` skips straight to KILL.
    pub async fn kill_process_tree_with_timeout(
        pid: i32,
        signal: &str,
        graceful_timeout_secs: u64,
        force: bool,
    ) -> Result<(), CoreError> {
        if force {
            return kill_process_tree(pid, "KILL");
        }

        let graceful = if signal.trim().is_empty() { "TERM" } else { signal };
        kill_process_tree(pid, graceful)?;

        if graceful_timeout_secs > 0 {
            let deadline =
                tokio::time::Instant::now() + Duration::from_secs(graceful_timeout_secs);
            while tokio::time::Instant::now() < deadline {
                if !process_tree_exists(pid) {
                    return Ok(());
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            tracing::warn!(pid, "graceful timeout reached, escalating to KILL");
            return kill_process_tree(pid, "KILL");
        }
        Ok(())
    }

    fn total_cpu_time() -> Result<u64, CoreError> {
        let content = fs::read_to_string("/proc/stat")
            .map_err(|e| CoreError::Input(format!("failed to read /proc/stat: {}", e)))?;
        for line in content.lines() {
            if let Some(rest) = line.strip_prefix("cpu ") {
                let mut total = 0u64;
                for field in rest.split_whitespace() {
                    total += field.parse::<u64>().map_err(|e| {
                        CoreError::Input(format!("failed to parse CPU time: {}", e))
                    })?;
                }
                return Ok(total);
            }
        }
        Err(CoreError::input("cpu line not found in /proc/stat"))
    }

    /// utime + stime in jiffies from `/proc/<pid>/stat`, tolerating process
    /// names that contain spaces.
    fn process_cpu_jiffies(pid: i32) -> Result<u64, CoreError> {
        let content = fs::read_to_string(format!("/proc/{}/stat", pid))
            .map_err(|e| CoreError::Input(format!("failed to read process stat: {}", e)))?;
        let last_paren = content
            .rfind(')')
            .ok_or_else(|| CoreError::input("invalid stat format"))?;
        let fields: Vec<&str> = content[last_paren + 1..].split_whitespace().collect();
        if fields.len() < 14 {
            return Err(CoreError::input("stat file too short"));
        }
        let utime: u64 = fields[11]
            .parse()
            .map_err(|e| CoreError::Input(format!("failed to parse utime: {}", e)))?;
        let stime: u64 = fields[12]
            .parse()
            .map_err(|e| CoreError::Input(format!("failed to parse stime: {}", e)))?;
        Ok(utime + stime)
    }

    /// Percent CPU per PID measured over a one-second window. Processes that
    /// disappear mid-window report 0.
    pub async fn process_cpu_usage(pids: &[i32]) -> Result<HashMap<i32, f64>, CoreError> {
        let total_before = total_cpu_time()?;
        let mut before: HashMap<i32, u64> = HashMap::with_capacity(pids.len());
        for &pid in pids {
            before.insert(pid, process_cpu_jiffies(pid).unwrap_or(0));
        }

        tokio::time::sleep(Duration::from_secs(1)).await;

        let total_after = total_cpu_time()?;
        let total_delta = (total_after - total_before) as f64;

        let mut results = HashMap::with_capacity(pids.len());
        if total_delta == 0.0 {
            return Ok(results);
        }
        for &pid in pids {
            let after = match process_cpu_jiffies(pid) {
                Ok(v) => v,
                Err(_) => {
                    results.insert(pid, 0.0);
                    continue;
                }
            };
            let delta = after.saturating_sub(*before.get(&pid).unwrap_or(&0)) as f64;
            results.insert(pid, delta / total_delta * 100.0);
        }
        Ok(results)
    }

    /// Integer-rounded variant of [`process_cpu_usage`].
    pub async fn process_cpu_usage_simple(
        pids: &[i32],
    ) -> Result<HashMap<i32, i64>, CoreError> {
        let results = process_cpu_usage(pids).await?;
        Ok(results
            .into_iter()
            .map(|(pid, usage)| (pid, (usage + 0.5) as i64))
            .collect())
    }

    pub fn page_size() -> i64 {
        unsafe { libc::sysconf(libc::_SC_PAGESIZE) }
    }
}

#[cfg(unix)]
pub use unix::{
    child_pids_recursive, kill_process_tree, kill_process_tree_with_timeout, page_size,
    process_cpu_usage, process_cpu_usage_simple, process_tree_exists, send_signal,
    signal_from_name,
};

#[cfg(not(unix))]
mod fallback {
    use super::*;

    const UNSUPPORTED: &str = "process signaling is only supported on Unix";

    pub fn signal_from_name(_name: &str) -> Result<i32, CoreError> {
        Err(CoreError::input(UNSUPPORTED))
    }

    pub fn kill_process_tree(_pid: i32, _signal: &str) -> Result<(), CoreError> {
        Err(CoreError::input(UNSUPPORTED))
    }

    pub async fn kill_process_tree_with_timeout(
        _pid: i32,
        _signal: &str,
        _graceful_timeout_secs: u64,
        _force: bool,
    ) -> Result<(), CoreError> {
        Err(CoreError::input(UNSUPPORTED))
    }

    pub async fn process_cpu_usage(_pids: &[i32]) -> Result<HashMap<i32, f64>, CoreError> {
        Err(CoreError::input(UNSUPPORTED))
    }

    pub async fn process_cpu_usage_simple(
        _pids: &[i32],
    ) -> Result<HashMap<i32, i64>, CoreError> {
        Err(CoreError::input(UNSUPPORTED))
    }

    pub fn page_size() -> i64 {
        4096
    }
}

#[cfg(not(unix))]
pub use fallback::{
    kill_process_tree, kill_process_tree_with_timeout, page_size, process_cpu_usage,
    process_cpu_usage_simple, signal_from_name,
};

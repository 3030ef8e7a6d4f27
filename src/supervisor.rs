//! Process supervision: start the declared node set, tear it down again.
//!
//! `ProcessSupervisor` runs each node as `<launcher> <package> <type>
//! __name:=<name> [args..]` with `ROS_NAMESPACE` set, optionally after a
//! `roscore`. Shutdown interrupts nodes in reverse start order, waits a
//! grace period, then kills whatever is left.

use crate::launch::LaunchDescriptor;

use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_LAUNCHER: &str = "rosrun";
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);
pub const MASTER_STARTUP_WAIT: Duration = Duration::from_secs(2);

const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to spawn {what}: {source}")]
    Spawn {
        what: String,
        #[source]
        source: std::io::Error,
    },
}

/// Lifecycle of the launched set. `shutdown` must tolerate a partial start
/// and repeated calls.
pub trait Supervisor {
    fn start(&mut self, launch: &LaunchDescriptor) -> Result<(), SupervisorError>;
    fn shutdown(&mut self);
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub launcher: String,
    pub start_master: bool,
    pub grace: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            launcher: DEFAULT_LAUNCHER.to_string(),
            start_master: false,
            grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

struct Launched {
    label: String,
    child: Child,
}

pub struct ProcessSupervisor {
    config: SupervisorConfig,
    launched: Vec<Launched>,
}

impl ProcessSupervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            config,
            launched: Vec::new(),
        }
    }

    /// Number of children currently owned.
    pub fn launched(&self) -> usize {
        self.launched.len()
    }

    fn spawn(&mut self, label: String, mut cmd: Command) -> Result<(), SupervisorError> {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        let child = cmd.spawn().map_err(|source| SupervisorError::Spawn {
            what: label.clone(),
            source,
        })?;
        debug!(process = %label, pid = child.id(), "spawned");
        self.launched.push(Launched { label, child });
        Ok(())
    }
}

impl Supervisor for ProcessSupervisor {
    fn start(&mut self, launch: &LaunchDescriptor) -> Result<(), SupervisorError> {
        if self.config.start_master {
            self.spawn("roscore".to_string(), Command::new("roscore"))?;
            thread::sleep(MASTER_STARTUP_WAIT);
        }

        for node in &launch.nodes {
            let mut cmd = Command::new(&self.config.launcher);
            cmd.arg(&node.package)
                .arg(&node.kind)
                .arg(format!("__name:={}", node.name))
                .args(&node.args)
                .env("ROS_NAMESPACE", &node.namespace);
            self.spawn(node.qualified_name(), cmd)?;
        }

        info!(count = self.launched.len(), "launched process set");
        Ok(())
    }

    fn shutdown(&mut self) {
        if self.launched.is_empty() {
            return;
        }
        info!(count = self.launched.len(), "shutting down process set");

        // Nodes first, master (spawned first) last.
        while let Some(mut l) = self.launched.pop() {
            stop_with_grace(&l.label, &mut l.child, self.config.grace);
        }
    }
}

impl Drop for ProcessSupervisor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// SIGINT (what ROS nodes expect), then SIGKILL after `grace`.
#[cfg(unix)]
fn stop_with_grace(label: &str, child: &mut Child, grace: Duration) {
    if let Ok(Some(_)) = child.try_wait() {
        debug!(process = %label, "already exited");
        return;
    }

    let pid = child.id() as libc::pid_t;
    unsafe {
        libc::kill(pid, libc::SIGINT);
    }
    debug!(process = %label, pid, "sent SIGINT");

    let deadline = Instant::now() + grace;
    while Instant::now() < deadline {
        match child.try_wait() {
            Ok(Some(_)) => return,
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                warn!(process = %label, error = %e, "failed to check process status");
                break;
            }
        }
    }

    warn!(process = %label, pid, "did not exit after SIGINT, killing");
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(not(unix))]
fn stop_with_grace(_label: &str, child: &mut Child, _grace: Duration) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Supervisor for graphs that are already running: starts nothing.
#[derive(Debug, Default)]
pub struct Attached;

impl Supervisor for Attached {
    fn start(&mut self, _launch: &LaunchDescriptor) -> Result<(), SupervisorError> {
        info!("attaching to a running graph, nothing launched");
        Ok(())
    }

    fn shutdown(&mut self) {}
}

/// Calls `shutdown` exactly once when dropped.
pub struct TeardownGuard<'a, S: Supervisor + ?Sized> {
    supervisor: &'a mut S,
}

impl<'a, S: Supervisor + ?Sized> TeardownGuard<'a, S> {
    pub fn new(supervisor: &'a mut S) -> Self {
        Self { supervisor }
    }

    pub fn supervisor(&mut self) -> &mut S {
        &mut *self.supervisor
    }
}

impl<S: Supervisor + ?Sized> Drop for TeardownGuard<'_, S> {
    fn drop(&mut self) {
        self.supervisor.shutdown();
    }
}

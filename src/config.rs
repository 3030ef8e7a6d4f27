//! Command line and resolved run configuration.

use crate::graph::{BuildPolicy, DanglingPolicy, DuplicatePolicy};
use crate::logging::{LogConfig, LogFormat, LogLevel};
use crate::registry::master::{DEFAULT_CALLER_ID, DEFAULT_MASTER_URI};
use crate::render::ReportFormat;
use crate::supervisor::{DEFAULT_LAUNCHER, DEFAULT_SHUTDOWN_GRACE, SupervisorConfig};

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "rosgraph-probe")]
#[command(about = "Launch a ROS node set, sample the master and summarise capabilities per node type", long_about = None)]
pub struct Cli {
    /// Launch descriptor (JSON).
    pub launch: PathBuf,

    /// Seconds to wait after launching before sampling the master.
    #[arg(default_value_t = 5)]
    pub settle: u64,

    #[arg(long, env = "ROS_MASTER_URI", default_value = DEFAULT_MASTER_URI)]
    pub master_uri: String,

    /// Caller id presented to the master and nodes.
    #[arg(long, default_value = DEFAULT_CALLER_ID)]
    pub caller_id: String,

    /// Command used to run each node as `<launcher> <package> <type>`.
    #[arg(long, default_value = DEFAULT_LAUNCHER)]
    pub launcher: String,

    /// Start `roscore` before the nodes.
    #[arg(long)]
    pub start_master: bool,

    /// Analyse an already running graph; launch nothing.
    #[arg(long, conflicts_with = "start_master")]
    pub attach: bool,

    /// Analyse a recorded registry snapshot (JSON) instead of a live master.
    #[arg(long, value_name = "PATH", conflicts_with_all = ["start_master", "attach"])]
    pub snapshot: Option<PathBuf>,

    /// Handling of two declarations with the same qualified name.
    #[arg(long, value_enum, default_value = "reject")]
    pub on_duplicate: DuplicatePolicy,

    /// Handling of a cross-link to a channel or service that was never built.
    #[arg(long, value_enum, default_value = "fail")]
    pub on_dangling: DanglingPolicy,

    /// Timeout in seconds for each registry or node call.
    #[arg(long, default_value_t = 3)]
    pub rpc_timeout: u64,

    /// Report written to stdout.
    #[arg(long, value_enum, default_value = "text")]
    pub format: ReportFormat,

    /// Log level; overrides ROSGRAPH_PROBE_LOG.
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Log format on stderr; overrides ROSGRAPH_PROBE_LOG_FORMAT.
    #[arg(long, value_enum)]
    pub log_format: Option<LogFormat>,
}

/// Where the graph comes from and whether we own its processes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Launch,
    Attach,
    Snapshot(PathBuf),
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub launch: PathBuf,
    pub mode: Mode,
    pub settle: Duration,
    pub master_uri: String,
    pub caller_id: String,
    pub rpc_timeout: Duration,
    pub supervisor: SupervisorConfig,
    pub policy: BuildPolicy,
    pub format: ReportFormat,
    pub log: LogConfig,
}

impl Cli {
    pub fn into_config(self) -> RunConfig {
        let mode = match (self.snapshot, self.attach) {
            (Some(path), _) => Mode::Snapshot(path),
            (None, true) => Mode::Attach,
            (None, false) => Mode::Launch,
        };
        // Nothing was launched, nothing needs to settle.
        let settle = match mode {
            Mode::Launch => Duration::from_secs(self.settle),
            Mode::Attach | Mode::Snapshot(_) => Duration::ZERO,
        };

        RunConfig {
            launch: self.launch,
            mode,
            settle,
            master_uri: self.master_uri,
            caller_id: self.caller_id,
            rpc_timeout: Duration::from_secs(self.rpc_timeout),
            supervisor: SupervisorConfig {
                launcher: self.launcher,
                start_master: self.start_master,
                grace: DEFAULT_SHUTDOWN_GRACE,
            },
            policy: BuildPolicy {
                on_duplicate: self.on_duplicate,
                on_dangling: self.on_dangling,
            },
            format: self.format,
            log: LogConfig::from_env(self.log_level, self.log_format),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["rosgraph-probe", "launch.json"]).unwrap();
        assert_eq!(cli.settle, 5);
        assert_eq!(cli.caller_id, DEFAULT_CALLER_ID);

        let config = cli.into_config();
        assert_eq!(config.mode, Mode::Launch);
        assert_eq!(config.settle, Duration::from_secs(5));
        assert_eq!(config.policy, BuildPolicy::default());
        assert_eq!(config.format, ReportFormat::Text);
        assert_eq!(config.supervisor.launcher, "rosrun");
    }

    #[test]
    fn test_settle_and_policies() {
        let cli = Cli::try_parse_from([
            "rosgraph-probe",
            "launch.json",
            "12",
            "--on-duplicate",
            "keep-first",
            "--on-dangling",
            "skip",
            "--format",
            "json",
        ])
        .unwrap();
        let config = cli.into_config();
        assert_eq!(config.settle, Duration::from_secs(12));
        assert_eq!(config.policy.on_duplicate, DuplicatePolicy::KeepFirst);
        assert_eq!(config.policy.on_dangling, DanglingPolicy::Skip);
        assert_eq!(config.format, ReportFormat::Json);
    }

    #[test]
    fn test_snapshot_mode_skips_settle() {
        let cli = Cli::try_parse_from(["rosgraph-probe", "launch.json", "--snapshot", "snap.json"]).unwrap();
        let config = cli.into_config();
        assert_eq!(config.mode, Mode::Snapshot(PathBuf::from("snap.json")));
        assert_eq!(config.settle, Duration::ZERO);
    }

    #[test]
    fn test_missing_launch_is_an_error() {
        let err = Cli::try_parse_from(["rosgraph-probe"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_policy_flags_list_their_values() {
        let cmd = Cli::command();
        let arg = cmd
            .get_arguments()
            .find(|a| a.get_id() == "on_duplicate")
            .unwrap();
        let values: Vec<String> = arg
            .get_possible_values()
            .iter()
            .map(|v| v.get_name().to_string())
            .collect();
        assert_eq!(values, vec!["reject", "keep-first"]);
        assert!(arg.get_help().is_some());

        assert!(Cli::try_parse_from(["rosgraph-probe", "l.json", "--on-dangling", "lenient"]).is_err());
    }

    #[test]
    fn test_attach_conflicts_with_start_master() {
        assert!(Cli::try_parse_from(["rosgraph-probe", "l.json", "--attach", "--start-master"]).is_err());
    }
}

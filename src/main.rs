use clap::Parser;
use clap::error::ErrorKind;

use rosgraph_probe::Result;
use rosgraph_probe::config::{Cli, Mode, RunConfig};
use rosgraph_probe::launch::load_descriptor;
use rosgraph_probe::logging::init_logging;
use rosgraph_probe::pipeline::{RunOptions, run_analysis};
use rosgraph_probe::registry::{MasterClient, StaticRegistry, Traced};
use rosgraph_probe::render::render_report;
use rosgraph_probe::supervisor::{Attached, ProcessSupervisor};

use anyhow::Context;
use std::process::ExitCode;

fn main() -> Result<ExitCode> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            // Usage errors exit with 1, not clap's default 2.
            let _ = e.print();
            return Ok(ExitCode::from(1));
        }
    };
    let config = cli.into_config();
    init_logging(&config.log);

    run(&config)?;
    Ok(ExitCode::SUCCESS)
}

fn run(config: &RunConfig) -> Result<()> {
    // 1) Load the intended process set.
    let launch = load_descriptor(&config.launch)?;
    tracing::info!(nodes = launch.nodes.len(), path = %config.launch.display(), "launch descriptor loaded");

    let options = RunOptions {
        settle: config.settle,
        policy: config.policy,
    };

    // 2) Launch, sample, build, derive. Teardown happens inside.
    let analysis = match &config.mode {
        Mode::Launch => {
            let registry = Traced::new(MasterClient::new(
                config.master_uri.as_str(),
                config.caller_id.as_str(),
                config.rpc_timeout,
            ));
            let mut supervisor = ProcessSupervisor::new(config.supervisor.clone());
            run_analysis(&mut supervisor, &registry, &launch, &options)?
        }
        Mode::Attach => {
            let registry = Traced::new(MasterClient::new(
                config.master_uri.as_str(),
                config.caller_id.as_str(),
                config.rpc_timeout,
            ));
            run_analysis(&mut Attached, &registry, &launch, &options)?
        }
        Mode::Snapshot(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("read registry snapshot {}", path.display()))?;
            let recorded: StaticRegistry = serde_json::from_str(&text)
                .with_context(|| format!("parse registry snapshot {}", path.display()))?;
            run_analysis(&mut Attached, &Traced::new(recorded), &launch, &options)?
        }
    };

    // 3) Report.
    print!("{}", render_report(&analysis, config.format)?);
    Ok(())
}

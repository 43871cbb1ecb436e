//! Command-line interface.
//!
//! Flags override the `SIM_*` environment variables, which in turn override
//! built-in defaults.

use clap::Parser;
use simbridge_client::ConfigOverrides;
use simbridge_types::session::DEFAULT_SIMULATOR_NAME;

/// Drive a sample adder simulation against the simulator session service
/// or an exported brain.
#[derive(Parser, Debug)]
#[command(name = "simbridge-runner")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Service URL (overrides `SIM_API_HOST`)
    #[arg(long, value_name = "URL")]
    pub api_host: Option<String>,

    /// Workspace id (overrides `SIM_WORKSPACE`)
    #[arg(long, value_name = "ID")]
    pub workspace: Option<String>,

    /// Workspace access key (overrides `SIM_ACCESS_KEY`)
    #[arg(long = "accesskey", visible_alias = "access-key", value_name = "KEY")]
    pub access_key: Option<String>,

    /// Simulator context (overrides `SIM_CONTEXT`)
    #[arg(long, value_name = "CONTEXT")]
    pub sim_context: Option<String>,

    /// Display name used at registration
    #[arg(long, default_value = DEFAULT_SIMULATOR_NAME)]
    pub name: String,

    /// Steps per episode before the adder reports itself halted (0 = never)
    #[arg(long, default_value_t = 10)]
    pub episode_length: u64,

    /// Log every request and response (raises the client log level to debug)
    #[arg(long)]
    pub enable_logging: bool,

    /// Drive an exported brain instead of a training session
    #[arg(long)]
    pub exported_brain: bool,

    /// Exported-brain prediction URL (overrides `SIM_EXPORTED_BRAIN_URL`)
    #[arg(long, value_name = "URL", requires = "exported_brain")]
    pub exported_brain_url: Option<String>,

    /// Stop the exported-brain loop after this many predictions
    #[arg(long, value_name = "N", requires = "exported_brain")]
    pub iterations: Option<u64>,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Raise the default log level to debug for the client and runner
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Connection overrides to layer over the environment.
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            server: self.api_host.clone(),
            workspace: self.workspace.clone(),
            access_key: self.access_key.clone(),
            simulator_context: self.sim_context.clone(),
        }
    }

    /// Default log filter when `RUST_LOG` is unset.
    ///
    /// `--enable-logging` opens the client's `debug` level so that traffic
    /// lines are visible without `-v`.
    pub const fn default_log_filter(&self) -> &'static str {
        if self.verbose {
            "info,simbridge_client=debug,simbridge_runner=debug"
        } else if self.enable_logging {
            "info,simbridge_client=debug"
        } else {
            "info"
        }
    }
}

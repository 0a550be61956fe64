use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use vpnc_netconf::config::{CONFIG_FILE_NAME, Config, ConfigError, RedirectGatewayMethod};
use vpnc_netconf::openconnect::{handle_script_mode, plan_event};
use vpnc_netconf::platform::SystemExecutor;

#[derive(Parser)]
#[command(name = "vpnc-netconf")]
#[command(about = "Network configuration script for OpenConnect on Windows")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: ./vpnc-netconf.toml, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured redirect-gateway method
    #[arg(long, global = true, value_enum)]
    redirect_gateway_method: Option<RedirectGatewayMethod>,
}

#[derive(Subcommand)]
enum Commands {
    /// Script mode for OpenConnect integration (the default)
    ///
    /// Called by OpenConnect with environment variables describing the VPN
    /// connection. Exits with the sum of all command exit statuses.
    ///
    /// Usage: openconnect ... -s 'vpnc-netconf.exe'
    Script,
    /// Print the commands the current environment would run, without
    /// running them (host probes still run)
    Plan {
        #[arg(long, value_enum, default_value_t = PlanFormat::Text)]
        format: PlanFormat,
    },
    /// Generate default config file
    Init {
        #[arg(long, default_value = CONFIG_FILE_NAME)]
        path: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PlanFormat {
    Text,
    Json,
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so OpenConnect output and `plan` stay readable
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<i32, Box<dyn std::error::Error>> {
    match cli.command.unwrap_or(Commands::Script) {
        Commands::Script => {
            let config = load_config(cli.config.as_deref(), cli.redirect_gateway_method)?;
            let outcome = handle_script_mode(&config, &SystemExecutor::new())?;
            info!(
                "Script completed: {} commands, {} failed",
                outcome.report.commands, outcome.report.failures
            );
            Ok(outcome.exit_code())
        }
        Commands::Plan { format } => {
            let config = load_config(cli.config.as_deref(), cli.redirect_gateway_method)?;
            let plan = plan_event(&config, &SystemExecutor::new(), |key| std::env::var(key))?;
            match format {
                PlanFormat::Text => {
                    for op in &plan.operations {
                        println!("{}", op);
                    }
                }
                PlanFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
            }
            Ok(0)
        }
        Commands::Init { path } => {
            info!("Generating default config...");
            Config::default().save(&path)?;
            println!("Created default config: {}", path.display());
            Ok(0)
        }
    }
}

fn load_config(
    path: Option<&Path>,
    method: Option<RedirectGatewayMethod>,
) -> Result<Config, ConfigError> {
    let mut config = Config::discover(path)?;
    if let Some(method) = method {
        config.redirect_gateway_method = method;
    }
    Ok(config)
}

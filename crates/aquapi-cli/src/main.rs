mod cmd;
mod output;

use aquapi_core::config::DEFAULT_CONFIG_FILE;
use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use cmd::{config::ConfigSubcommand, control::ControlArgs, decide::DecideArgs, serve::ServeArgs};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "aquapi",
    about = "Hydroponic pump control: serve activation decisions and drive pumps from them",
    version,
    propagate_version = true
)]
struct Cli {
    /// Config file (default: ./aquapi.yaml)
    #[arg(long, global = true, env = "AQUAPI_CONFIG")]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP decision server
    Serve(ServeArgs),

    /// Run the execution loop for one actuator on this machine
    Control(ControlArgs),

    /// Evaluate one activation decision locally, without a server
    Decide(DecideArgs),

    /// Inspect and validate the config file
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve(_) | Commands::Control(_) => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli
        .config
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let result = match cli.command {
        Commands::Serve(args) => cmd::serve::run(&config_path, args),
        Commands::Control(args) => cmd::control::run(&config_path, args, cli.json),
        Commands::Decide(args) => cmd::decide::run(args, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&config_path, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

use crate::demo::{run_demo, run_import, run_rollover, DemoArgs, ImportArgs, RolloverArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use recruit::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "recruit-api",
    about = "Run and demonstrate the interview scheduling back-end from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Run a single rollover sweep over a seeded demo tenant
    Rollover(RolloverArgs),
    /// Import a job-board CSV export and optional resume files
    Import(ImportArgs),
    /// Walk through availability, booking, and rollover for a demo tenant
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Do not start the background rollover task
    #[arg(long)]
    pub(crate) no_rollover: bool,
    /// Seed the demo company and log a session key for `x-session-key`
    #[arg(long)]
    pub(crate) seed_demo: bool,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Rollover(args) => run_rollover(args).await,
        Command::Import(args) => run_import(args).await,
        Command::Demo(args) => run_demo(args).await,
    }
}

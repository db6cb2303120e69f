use clap::Parser;

use crate::args::{Args, Command};

mod args;
mod commands;

/// OAuth device-flow client id for the Copilot chat completions API. Public by design: the
/// device-code flow authenticates the end user, not this id.
const DEVICE_FLOW_CLIENT_ID: &str = "Iv1.b507a08c87ecfe98";

#[tokio::main]
async fn main() {
    let args = Args::parse();

    server::logger::init(args.log_filter());

    if let Err(err) = run(args).await {
        log::error!("{err:#}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => config::Config::load(path)?,
        None => {
            let config = config::Config::default();
            config.validate()?;
            config
        }
    };

    match args.command {
        Command::Auth => commands::auth(&config).await,
        Command::Logout => commands::logout(&config).await,
        Command::Start(start_args) => commands::start(config, start_args).await,
        Command::CheckUsage => commands::check_usage(&config).await,
        Command::Debug(sub) => commands::debug(&config, &sub).await,
        Command::Patcher { target } => commands::patcher(&target).await,
    }
}

use clap::Parser;
use pipetopo::cli::{Cli, Commands, list_command, render_command, seed_command, sync_command};
use pipetopo::config::constants;
use pipetopo::logging;
use tracing::error;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    constants::init_constants();
    let args = Cli::parse();

    let file_layer = match logging::create_log_file(args.cmd.name()) {
        Ok(log_file) => Some(
            fmt::layer()
                .with_writer(log_file)
                .with_target(false)
                .with_thread_ids(false)
                .with_level(true)
                .with_ansi(false)
                .with_filter(EnvFilter::new("debug")),
        ),
        Err(e) => {
            eprintln!("Logging to file disabled: {e}");
            None
        }
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_level(true)
                .with_filter(
                    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
                ),
        )
        .with(file_layer)
        .init();

    if let Err(e) = run(args).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Cli) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    match args.cmd {
        Commands::Render { bootstrap, pipeline } => {
            render_command(bootstrap, pipeline).await?;
        }
        Commands::List { bootstrap } => {
            list_command(bootstrap).await?;
        }
        Commands::Seed { bootstrap, store } => {
            seed_command(bootstrap, store).await?;
        }
        Commands::Sync { bootstrap, store } => {
            sync_command(bootstrap, store).await?;
        }
    }
    Ok(())
}

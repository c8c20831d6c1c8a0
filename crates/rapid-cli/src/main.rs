//! CLI entry point - the composition root.

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use rapid_cli::handlers::download::DownloadArgs;
use rapid_cli::{Cli, CliConfig, Commands, handlers};

/// Install the global subscriber. `RUST_LOG` wins over `default`.
fn init_tracing(default: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = cli.command.as_ref() else {
        Cli::command().print_help()?;
        return Ok(());
    };

    // Foreground downloads keep the terminal for progress bars.
    let quiet = matches!(command, Commands::Download { .. } | Commands::Resume { .. });
    init_tracing(match (cli.verbose, quiet) {
        (true, _) => "debug",
        (false, true) => "warn",
        (false, false) => "info",
    });

    let config = CliConfig::from_cli(&cli)?;

    match cli.command {
        Some(Commands::Serve {
            port,
            allow_origins,
        }) => handlers::serve::execute(config, port, allow_origins).await?,
        Some(Commands::Download {
            url,
            provider,
            chunks,
            cookies,
            user_agent,
        }) => {
            let args = DownloadArgs {
                url,
                provider,
                chunks,
                cookies,
                user_agent,
            };
            handlers::download::download(config, args).await?;
        }
        Some(Commands::Resume { id }) => handlers::download::resume(config, &id).await?,
        Some(Commands::List { page }) => handlers::list::execute(&config, page).await?,
        None => {}
    }

    Ok(())
}

//! CLI entry point.
//!
//! Parses arguments, bootstraps one session, dispatches to a handler and
//! always ends the session before exiting so no server outlives the process.

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use skillpool_cli::{
    Cli, CliConfig, CliContext, CliError, Commands, InvokeArgs, bootstrap, handlers,
};

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn dispatch(ctx: &CliContext, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::List => handlers::list::execute(ctx).await,
        Commands::Skill { name } => handlers::skill::execute(ctx, &name).await,
        Commands::Invoke {
            server,
            tool,
            resource,
            prompt,
            args,
            filter,
        } => {
            let args = InvokeArgs {
                server,
                tool,
                resource,
                prompt,
                args,
                filter,
            };
            handlers::invoke::execute(ctx, args).await
        }
        Commands::Servers => handlers::servers::execute(ctx).await,
    }
}

async fn run(mut cli: Cli) -> anyhow::Result<()> {
    let Some(command) = cli.command.take() else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let config = CliConfig::from_cli(&cli)?;
    let ctx = bootstrap(config).await?;

    let result = tokio::select! {
        result = dispatch(&ctx, command) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, stopping servers");
            Ok(())
        }
    };

    ctx.shutdown().await;
    result
}

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli).await {
        eprintln!("Error: {err:#}");
        let code = err.downcast_ref::<CliError>().map_or(1, CliError::exit_code);
        std::process::exit(code);
    }
}

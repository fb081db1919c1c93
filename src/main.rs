//! Model Comparator - Main Entry Point
//!
//! Regression model comparison with CLI and server modes.

use clap::Parser;
use model_comparator::cli::{cmd_compare, cmd_info, cmd_predict, cmd_serve, cmd_train, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "model_comparator=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port, host } => {
            cmd_serve(&host, port).await?;
        }
        Commands::Train { data, target, model, params, output, permutation_repeats } => {
            cmd_train(
                &data,
                &target,
                &model,
                params.as_deref(),
                output.as_deref(),
                permutation_repeats,
            )?;
        }
        Commands::Compare { data, target } => {
            cmd_compare(&data, &target)?;
        }
        Commands::Predict { model, data, output } => {
            cmd_predict(&model, &data, output.as_deref())?;
        }
        Commands::Info { data } => {
            cmd_info(&data)?;
        }
    }

    Ok(())
}

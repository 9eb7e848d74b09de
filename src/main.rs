//! textclass - Main Entry Point

use clap::Parser;
use textclass::cli::{cmd_evaluate, cmd_info, cmd_predict, cmd_train, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "textclass=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train { preset, data, config, test_fraction, seed, cv_folds, output } => {
            cmd_train(preset, &data, config.as_deref(), test_fraction, seed, cv_folds, &output)?;
        }
        Commands::Evaluate { model, data, header } => {
            cmd_evaluate(&model, &data, header)?;
        }
        Commands::Predict { model, text, fields, data, header, parallel, output } => {
            cmd_predict(&model, text.as_deref(), &fields, data.as_deref(), header, parallel, output.as_deref())?;
        }
        Commands::Info { model } => {
            cmd_info(&model)?;
        }
    }

    Ok(())
}

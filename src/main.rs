use clap::Parser;
use tracing::Level;
use unseen::cli::commands::{cmd_normalize, cmd_prompt, cmd_transform};
use unseen::cli::config::{Cli, Commands, load_config};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(cli.config.as_deref());

    match &cli.command {
        Commands::Transform {
            tree,
            context,
            output,
            css,
            dry_run,
        } => {
            cmd_transform(
                &cli,
                &config,
                tree,
                context,
                output.as_deref(),
                css.as_deref(),
                *dry_run,
            )
            .await?;
        }
        Commands::Prompt { tree, context } => {
            println!("{}", cmd_prompt(&config, tree, context)?);
        }
        Commands::Normalize { input, target } => {
            println!("{}", cmd_normalize(input, target)?);
        }
    }

    Ok(())
}

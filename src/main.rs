use clap::Parser;
use scenario_harness::cli::commands::{cmd_run, cmd_validate};
use scenario_harness::cli::config::{Cli, Commands, RunSettings, load_config, log_level};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level(cli.verbose))),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(cli.config.as_deref());

    match cli.command {
        Commands::Run(args) => {
            let settings = RunSettings::resolve(&args, &config);
            let all_passed = cmd_run(&args.scenarios, &settings)?;
            if !all_passed {
                std::process::exit(1);
            }
        }
        Commands::Validate { scenarios } => {
            cmd_validate(&scenarios, &config.harness)?;
        }
    }

    Ok(())
}

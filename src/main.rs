//! Bundlever CLI - rewrite the OS version fields of a device backup bundle.

use bundlever::atomic::CommitOptions;
use bundlever::cli::{Cli, Commands};
use bundlever::commands::{self, Output};
use bundlever::config::{self, ConfigOverrides, OutputFormat, ResolvedConfig};
use bundlever::logging;
use clap::Parser;
use std::io;
use std::process;
use tracing::debug;

fn main() {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);

    let mut overrides = ConfigOverrides::new();
    overrides.backup = cli.command.backup_override();
    if cli.human_readable {
        overrides = overrides.with_output_format(OutputFormat::Human);
    }

    let config = match config::resolve_config(&overrides) {
        Ok(config) => config,
        Err(e) => exit_with_error(&e, cli.human_readable),
    };
    debug!(?config, "configuration resolved");
    let human = config.output_format() == OutputFormat::Human;

    if let Err(e) = run_command(cli.command, &config, human) {
        exit_with_error(&e, human);
    }
}

fn run_command(
    command: Commands,
    config: &ResolvedConfig,
    human: bool,
) -> Result<(), bundlever::Error> {
    match command {
        Commands::Show { bundle } => {
            let result = commands::show(&bundle)?;
            output(&result, human);
        }

        Commands::Update {
            bundle,
            product_version,
            build_version,
            yes,
            ..
        } => {
            let loaded = commands::load(&bundle)?;

            // Current values and prompts go to stderr; stdout carries the result
            if !yes {
                let current = commands::ShowResult {
                    snapshot: loaded.snapshot(),
                };
                eprintln!("{}", current.to_human());
            }
            let confirmation = commands::confirm_update(
                &mut io::stdin().lock(),
                &mut io::stderr(),
                yes,
                product_version,
                build_version,
            )?;

            let options = CommitOptions::with_backup(config.backup());
            let result = commands::update(loaded, confirmation, &options)?;
            output(&result, human);
        }

        Commands::Config => {
            output(&commands::config(config), human);
        }
    }
    Ok(())
}

fn output<T: Output>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}

fn exit_with_error(e: &bundlever::Error, human: bool) -> ! {
    if human {
        eprintln!("Error: {}", e);
        eprintln!("{}", e.modification_notice());
    } else {
        let err = serde_json::json!({
            "error": e.to_string(),
            "exit_code": e.exit_code().code(),
            "modified": e.modified_documents(),
            "notice": e.modification_notice(),
        });
        eprintln!("{}", err);
    }
    process::exit(e.exit_code().code());
}

#[cfg(not(feature = "cli"))]
compile_error!("The `xdbf` binary requires the `cli` feature. Build with `--features cli`.");

use clap::Parser;
use std::fs::File;
use std::io::Write;
use std::process;

use dbf::cli;
use dbf::cli::app::{Cli, ColorMode, Commands};
use dbf::DbfError;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    match cli.color {
        ColorMode::Always => colored::control::set_override(true),
        ColorMode::Never => colored::control::set_override(false),
        ColorMode::Auto => {} // colored auto-detects tty
    }

    // RUST_LOG wins over -v
    let default_level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let writer_result: Result<Box<dyn Write>, DbfError> = match &cli.output {
        Some(path) => File::create(path)
            .map(|f| Box::new(f) as Box<dyn Write>)
            .map_err(|e| DbfError::Io(format!("Cannot create {}: {}", path, e))),
        None => Ok(Box::new(std::io::stdout()) as Box<dyn Write>),
    };

    let mut writer = match writer_result {
        Ok(w) => w,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Info { open, json } => {
            cli::info::execute(&cli::info::InfoOptions { open, json }, &mut writer)
        }

        Commands::Records {
            open,
            deleted,
            columns,
            limit,
            raw,
            convert_float,
            pretty,
        } => cli::records::execute(
            &cli::records::RecordsOptions {
                open,
                deleted,
                columns,
                limit,
                raw,
                convert_float,
                pretty,
            },
            &mut writer,
        ),

        Commands::Count { open, json } => {
            cli::count::execute(&cli::count::CountOptions { open, json }, &mut writer)
        }

        Commands::Dump { open, row, binary } => {
            cli::dump::execute(&cli::dump::DumpOptions { open, row, binary }, &mut writer)
        }

        Commands::Completions { shell } => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            clap_complete::generate(shell, &mut cmd, "xdbf", &mut std::io::stdout());
            Ok(())
        }
    };

    let result = result.and_then(|()| {
        writer
            .flush()
            .map_err(|e| DbfError::Io(format!("Cannot write to output: {}", e)))
    });

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

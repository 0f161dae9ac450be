use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use compatmark::{Converter, Options};
use log::{debug, error};

/// Convert Markdown to HTML the way Markdown.pl and Showdown do.
#[derive(Debug, Parser)]
#[command(name = "compatmark", version, about)]
struct Cli {
    /// Markdown file to convert; reads stdin when omitted
    input: Option<PathBuf>,

    /// Write the HTML here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// JSON file with converter options
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the tab width from the options
    #[arg(long, value_name = "N")]
    tab_width: Option<usize>,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            eprintln!("compatmark: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let mut options = match &cli.config {
        Some(path) => Options::load_from_path(path)?,
        None => Options::default(),
    };
    if let Some(tab_width) = cli.tab_width {
        options.tab_width = tab_width;
    }
    let converter = Converter::new(options)?;

    let input = match &cli.input {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut input = String::new();
            io::stdin()
                .read_to_string(&mut input)
                .context("failed to read stdin")?;
            input
        }
    };
    debug!("converting {} bytes", input.len());
    let html = converter.render(&input);

    match &cli.output {
        Some(path) => fs::write(path, html)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(html.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}

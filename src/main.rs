mod app_logic;
mod core;

use crate::app_logic::{AppCommand, AppEvent, MessageSeverity, PrunerAppLogic, PrunerEventHandler};
use crate::core::{CheckState, CoreConfigManager, DuplicateKey, SectionId, TokenizerKind};
use clap::{ArgAction, Parser};
use simplelog::{ColorChoice, ConfigBuilder, LevelFilter, TermLogger, TerminalMode};
use std::error::Error;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "llms-pruner", version)]
#[command(about = "Inspect and prune llms.txt documents by section", long_about = None)]
#[command(
    after_help = "Selections are applied in this order: --select-none, duplicate groups, then sections."
)]
struct Cli {
    /// Document to load, `-` for stdin; defaults to the last one opened
    #[arg(value_name = "PATH")]
    input: Option<PathBuf>,

    /// Deselect a section and its subsection tree
    #[arg(long, value_name = "ID")]
    exclude: Vec<SectionId>,

    /// Select a section and its subsection tree
    #[arg(long, value_name = "ID")]
    include: Vec<SectionId>,

    /// Deselect every member of a duplicate group
    #[arg(long, value_name = "TITLE::LEVEL")]
    exclude_duplicate: Vec<DuplicateKey>,

    /// Select every member of a duplicate group
    #[arg(long, value_name = "TITLE::LEVEL")]
    include_duplicate: Vec<DuplicateKey>,

    /// Start from an empty selection instead of everything
    #[arg(long)]
    select_none: bool,

    /// Write the pruned document to this file
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Print the pruned document to stdout
    #[arg(long, conflicts_with = "output")]
    print: bool,

    /// Do not print the section report
    #[arg(short, long)]
    quiet: bool,

    /// Tokenizer to use instead of the configured one
    #[arg(long, value_enum)]
    tokenizer: Option<TokenizerKind>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let config = ConfigBuilder::new().set_time_level(LevelFilter::Off).build();
    if let Err(e) = TermLogger::init(level, config, TerminalMode::Stderr, ColorChoice::Auto) {
        eprintln!("Failed to initialize logger: {e}");
    }
}

fn selection_events(cli: &Cli) -> Vec<AppEvent> {
    let mut events = Vec::new();
    if cli.select_none {
        events.push(AppEvent::SelectAll(CheckState::Unchecked));
    }
    for key in &cli.exclude_duplicate {
        events.push(AppEvent::ToggleDuplicateGroup {
            key: key.clone(),
            check: CheckState::Unchecked,
        });
    }
    for key in &cli.include_duplicate {
        events.push(AppEvent::ToggleDuplicateGroup {
            key: key.clone(),
            check: CheckState::Checked,
        });
    }
    for id in &cli.exclude {
        events.push(AppEvent::ToggleSection {
            id: *id,
            check: CheckState::Unchecked,
        });
    }
    for id in &cli.include {
        events.push(AppEvent::ToggleSection {
            id: *id,
            check: CheckState::Checked,
        });
    }
    events
}

/* Carries out the commands; returns true if any of them reported an error. */
fn execute(commands: Vec<AppCommand>) -> bool {
    let mut failed = false;
    for command in commands {
        match command {
            AppCommand::ShowMessage { severity, text } => match severity {
                MessageSeverity::Information => eprintln!("{text}"),
                MessageSeverity::Warning => eprintln!("warning: {text}"),
                MessageSeverity::Error => {
                    eprintln!("error: {text}");
                    failed = true;
                }
            },
            AppCommand::ShowReport(report) => print!("{report}"),
            AppCommand::EmitExport(content) => print!("{content}"),
        }
    }
    failed
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_manager = Arc::new(CoreConfigManager::new());
    let mut logic = PrunerAppLogic::new(config_manager, cli.tokenizer);

    let Some(input) = cli.input.clone().or_else(|| logic.last_document_path().cloned()) else {
        return Err("No document given and no previously opened document remembered".into());
    };
    let load = if input.as_os_str() == "-" {
        log::info!("Main: Reading document from stdin");
        AppEvent::LoadContent(io::read_to_string(io::stdin())?)
    } else {
        log::info!("Main: Loading {input:?}");
        AppEvent::LoadDocument(input)
    };
    if execute(logic.handle_event(load)) {
        return Err("Document could not be loaded".into());
    }

    for event in selection_events(&cli) {
        execute(logic.handle_event(event));
    }
    if !cli.quiet && !cli.print {
        execute(logic.handle_event(AppEvent::ShowReport));
    }
    if cli.output.is_some() || cli.print {
        let destination = cli.output.clone();
        if execute(logic.handle_event(AppEvent::Export { destination })) {
            return Err("Export failed".into());
        }
    }
    Ok(())
}

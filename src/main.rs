use std::fs::File;
use std::io::stdout;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;

use clap::Parser;
use ratatui::DefaultTerminal;
use ratatui::crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
};
use tracing::info;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod college;
mod controller;
mod domain;
mod inputter;
mod loader;
mod model;
mod row;
mod ui;
mod view_state;

use college::CollegeSource;
use controller::Controller;
use domain::{CTError, TableConfig};
use model::{Model, Status};
use ui::TableUI;

/// Browse, search and sort a table of colleges.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// College data file (csv, parquet or arrow)
    path: String,

    /// Write logs to this file
    #[arg(long)]
    log_file: Option<String>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// How long to wait for terminal events, in milliseconds
    #[arg(long, default_value_t = 100)]
    poll_ms: u64,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(&args) {
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn init_logging(args: &Args) -> Result<(), CTError> {
    let Some(log_file) = &args.log_file else {
        return Ok(());
    };
    let file = File::create(expand_path(log_file)?)?;
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

fn expand_path(path: &str) -> Result<PathBuf, CTError> {
    shellexpand::full(path)
        .map(|p| PathBuf::from(p.as_ref()))
        .map_err(|e| CTError::InvalidPath(e.to_string()))
}

fn run(args: &Args) -> Result<(), CTError> {
    init_logging(args)?;
    info!("Starting college-table!");

    let source = CollegeSource::load(expand_path(&args.path)?)?;
    let cfg = TableConfig::default().event_poll_time(args.poll_ms);

    let mut terminal = ratatui::init();
    let result = execute!(stdout(), EnableMouseCapture)
        .map_err(CTError::from)
        .and_then(|_| run_loop(&mut terminal, &cfg, source));
    let _ = execute!(stdout(), DisableMouseCapture);
    ratatui::restore();
    result
}

fn run_loop(
    terminal: &mut DefaultTerminal,
    cfg: &TableConfig,
    source: CollegeSource,
) -> Result<(), CTError> {
    let size = terminal.size()?;
    let mut model = Model::init(cfg, source, size.width as usize, size.height as usize);
    let mut ui = TableUI::new();
    let controller = Controller::new(cfg);

    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(&model, f))?;

        // Handle events and map to a Message
        let message = controller.handle_event(&model)?;
        if message.is_some() {
            model.update(message);
        }
    }
    info!("Bye!");
    Ok(())
}

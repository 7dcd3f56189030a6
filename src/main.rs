use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

mod controller;
mod domain;
mod editor;
mod inputter;
mod logging;
mod model;
mod session;
mod table;
mod ui;

use controller::Controller;
use domain::{Args, FEConfig, FEError};
use model::{Model, Status};
use ui::TableUI;

fn main() -> ExitCode {
    let args = Args::parse();
    let _log_guard = logging::init(args.log_dir.as_deref());

    let result = run(&args);
    ratatui::restore();
    match result {
        Err(e) => {
            error!("Exiting with error: {e:?}");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn run(args: &Args) -> Result<(), FEError> {
    info!(
        "Starting flagedit, logging to {}",
        logging::log_path(args.log_dir.as_deref()).display()
    );
    let cfg = FEConfig::from(args);

    let mut model = Model::init(&cfg)?;
    if let Some(path) = &args.file {
        model.open(path);
    }

    let mut ui = TableUI::new(&cfg);
    let controller = Controller::new(&cfg);

    let mut terminal = ratatui::init();

    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(&model, f))?;

        // Handle events and map to a Message
        let message = controller.handle_event(&model)?;
        model.update(message)?;
    }

    Ok(())
}

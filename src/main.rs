use std::process::ExitCode;

use clap::Parser;
use eframe::egui;

use isoview::app::IsoViewApp;
use isoview::cli::Cli;

fn main() -> ExitCode {
    env_logger::init();

    let setup = match Cli::parse().into_setup() {
        Ok(setup) => setup,
        Err(e) => {
            log::error!("Startup failed: {e:#}");
            eprintln!("error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let [width, height] = setup.config.window_size;
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([width, height])
            .with_min_inner_size([480.0, 360.0]),
        ..Default::default()
    };
    let title = format!("isoview – {}", setup.mode.name());

    let result = eframe::run_native(
        &title,
        options,
        Box::new(move |cc| Ok(Box::new(IsoViewApp::new(cc.egui_ctx.clone(), setup)?))),
    );
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Event loop error: {e}");
            ExitCode::FAILURE
        }
    }
}

use std::process::ExitCode;

use engine::{run_headless, IdleInput};
use tracing::{error, info, warn};

use super::bootstrap::{AppError, AppWiring};
use super::gameplay::save_game;

pub(crate) fn run(app: Result<AppWiring, AppError>) -> ExitCode {
    match app {
        Ok(app) => run_wired(app),
        Err(err) => {
            error!(error = %err, "startup_failed");
            ExitCode::FAILURE
        }
    }
}

/// Runs until the tick bound or a quit, stops the poller, then saves.
pub(crate) fn run_wired(app: AppWiring) -> ExitCode {
    let AppWiring {
        settings,
        config,
        mut scene,
        poller,
    } = app;

    let summary = run_headless(config, &mut scene, &mut IdleInput);
    info!(
        ticks_run = summary.ticks_run,
        quit_requested = summary.quit_requested,
        map = scene.state().current_map_key(),
        "session_finished"
    );

    if let Some(mut poller) = poller {
        if !poller.stop() {
            warn!("online_poller_detached");
        }
    }

    match save_game(scene.state(), &settings.save_file) {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}

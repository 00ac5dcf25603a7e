use std::path::PathBuf;

use engine::{resolve_app_paths, LoopConfig, StartupError};
use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::gameplay::{load_game, GameplayScene, OnlineLink, SaveError, TmxDirectory};
use super::online::{HttpOnlineService, OnlinePoller, POLL_INTERVAL};
use super::settings::GameSettings;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error("failed to load save: {0}")]
    Load(#[from] SaveError),
    #[error("no save file at {0}")]
    MissingSave(PathBuf),
}

pub(crate) struct AppWiring {
    pub(crate) settings: GameSettings,
    pub(crate) config: LoopConfig,
    pub(crate) scene: GameplayScene,
    pub(crate) poller: Option<OnlinePoller>,
}

pub(crate) fn build_app() -> Result<AppWiring, AppError> {
    init_tracing();
    info!("=== Trail Startup ===");

    let paths = resolve_app_paths()?;
    let settings = GameSettings::from_env(&paths);
    info!(
        root = %paths.root.display(),
        save_file = %settings.save_file.display(),
        maps_dir = %settings.maps_dir.display(),
        online = settings.online_url.is_some(),
        max_ticks = settings.max_ticks,
        "settings_resolved"
    );
    wire(settings)
}

/// Loads the save, optionally starts the presence poller and queues the
/// startup navigation request.
pub(crate) fn wire(settings: GameSettings) -> Result<AppWiring, AppError> {
    let maps = TmxDirectory::new(&settings.maps_dir);
    let state = load_game(&settings.save_file, &maps)?
        .ok_or_else(|| AppError::MissingSave(settings.save_file.clone()))?;
    let mut scene = GameplayScene::new(state, StdRng::from_entropy());

    let poller = settings.online_url.as_deref().and_then(|url| {
        let service = HttpOnlineService::new(url);
        match OnlinePoller::start(Box::new(service), POLL_INTERVAL) {
            Ok(poller) => Some(poller),
            Err(error) => {
                warn!(url, error = %error, "online_disabled");
                None
            }
        }
    });
    if let Some(poller) = &poller {
        scene = scene.with_online(OnlineLink {
            shared: poller.shared(),
            local_id: poller.local_id(),
        });
    }

    if let Some(place) = settings.navigate_to.as_deref() {
        let outcome = scene.state_mut().select_place(place);
        info!(place, outcome = ?outcome, "startup_navigation");
    }

    Ok(AppWiring {
        config: settings.loop_config(),
        settings,
        scene,
        poller,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

#[cfg(test)]
pub(crate) mod tests {
    use std::fs;
    use std::path::Path;

    use super::*;

    /// 6x4 open map with a single grass tile at (4, 2).
    pub(crate) const OPEN_MAP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<map version="1.10" orientation="orthogonal" width="6" height="4" tilewidth="16" tileheight="16">
 <layer id="1" name="Ground" width="6" height="4">
  <data encoding="csv">
1,1,1,1,1,1,
1,1,1,1,1,1,
1,1,1,1,1,1,
1,1,1,1,1,1
</data>
 </layer>
 <layer id="2" name="PokemonBush" width="6" height="4">
  <data encoding="csv">
0,0,0,0,0,0,
0,0,0,0,0,0,
0,0,0,0,3,0,
0,0,0,0,0,0
</data>
 </layer>
</map>
"#;

    pub(crate) const MINIMAL_SAVE: &str = r#"{
  "map": [
    {
      "path": "field.tmx",
      "teleport": [],
      "player": { "x": 1, "y": 1 }
    }
  ],
  "current_map": "field.tmx"
}"#;

    pub(crate) fn write_fixture(dir: &Path) -> GameSettings {
        let maps_dir = dir.join("maps");
        fs::create_dir_all(&maps_dir).expect("maps dir");
        fs::write(maps_dir.join("field.tmx"), OPEN_MAP).expect("map");
        let save_file = dir.join("saves").join("game0.json");
        fs::create_dir_all(dir.join("saves")).expect("saves dir");
        fs::write(&save_file, MINIMAL_SAVE).expect("save");
        GameSettings {
            save_file,
            maps_dir,
            max_ticks: 5,
            ..GameSettings::default()
        }
    }

    #[test]
    fn wiring_loads_save_offline() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = write_fixture(dir.path());

        let app = wire(settings).expect("wired");
        assert!(app.poller.is_none());
        assert_eq!(app.config.max_ticks, Some(5));
        assert_eq!(app.scene.state().current_map_key(), "field.tmx");
    }

    #[test]
    fn missing_save_is_a_startup_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut settings = write_fixture(dir.path());
        settings.save_file = dir.path().join("absent.json");

        assert!(matches!(wire(settings), Err(AppError::MissingSave(_))));
    }

    #[test]
    fn missing_map_file_is_a_load_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = write_fixture(dir.path());
        fs::remove_file(settings.maps_dir.join("field.tmx")).expect("remove map");

        assert!(matches!(wire(settings), Err(AppError::Load(_))));
    }

    #[test]
    fn shipped_save_loads_and_every_place_is_reachable() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../..");
        let maps = TmxDirectory::new(root.join("assets").join("maps"));
        let state = load_game(&root.join("saves").join("game0.json"), &maps)
            .expect("load")
            .expect("present");
        assert_eq!(state.current_map_key(), "map.tmx");
        assert_eq!(state.maps().len(), 3);

        let places: Vec<String> = state.places().iter().map(|(name, _)| name.clone()).collect();
        for place in places {
            let mut state = state.clone();
            assert!(
                matches!(
                    state.select_place(&place),
                    crate::app::gameplay::state::NavigationOutcome::Started { .. }
                ),
                "{place}"
            );
        }
    }

    #[test]
    fn unreachable_service_still_wires_a_poller() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut settings = write_fixture(dir.path());
        settings.online_url = Some("http://127.0.0.1:9".to_string());

        let mut app = wire(settings).expect("wired");
        let poller = app.poller.as_mut().expect("poller");
        assert_eq!(poller.local_id(), None);
        assert!(poller.stop());
    }
}

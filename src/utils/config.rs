use std::path::{Path, PathBuf};

use crate::models::Settings;

const ENV_API_KEY: &str = "SPRINTFEED_API_KEY";
const ENV_PROJECT_ID: &str = "SPRINTFEED_PROJECT_ID";
const ENV_ID_TOKEN: &str = "SPRINTFEED_ID_TOKEN";
const ENV_DATA_DIR: &str = "SPRINTFEED_DATA_DIR";

pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub fn data_dir() -> PathBuf {
    env_value(ENV_DATA_DIR)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data"))
}

pub fn settings_path(data_dir: &Path) -> PathBuf {
    data_dir.join("config").join("settings.json")
}

/// Environment values only fill fields the settings file left blank.
pub fn apply_env_defaults(settings: &mut Settings) {
    if settings.store.api_key.trim().is_empty() {
        settings.store.api_key = env_value(ENV_API_KEY).unwrap_or_default();
    }
    if settings.store.project_id.trim().is_empty() {
        settings.store.project_id = env_value(ENV_PROJECT_ID).unwrap_or_default();
    }
    if settings.store.id_token.is_none() {
        settings.store.id_token = env_value(ENV_ID_TOKEN);
    }
}

/// Missing or unreadable settings fall back to defaults.
pub fn load_settings(data_dir: &Path) -> Settings {
    let path = settings_path(data_dir);
    let mut settings = if path.exists() {
        match std::fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|content| {
                serde_json::from_str::<Settings>(&content).map_err(|e| e.to_string())
            })
        {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("[Config] Ignoring unreadable {}: {}", path.display(), e);
                Settings::default()
            }
        }
    } else {
        Settings::default()
    };
    apply_env_defaults(&mut settings);
    settings
}

pub fn save_settings(data_dir: &Path, settings: &Settings) -> anyhow::Result<()> {
    let path = settings_path(data_dir);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, serde_json::to_string_pretty(settings)?)?;
    Ok(())
}

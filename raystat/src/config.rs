use directories::ProjectDirs;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::error;

const CONFIG_FILENAME: &str = "raystat_config.json";

static CONFIG_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
#[serde(default)]
pub struct AppConfig {
    /// Local port of the engine's SOCKS inbound; the stats query endpoint is
    /// derived from it once at startup.
    pub socks_port: u16,
    /// Tag of the inbound whose traffic counters are monitored.
    pub inbound_tag: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            socks_port: 10808,
            inbound_tag: "socks".to_string(),
        }
    }
}

pub fn get_config_path() -> PathBuf {
    if let Some(proj_dirs) = ProjectDirs::from("com", "raystat", "RayStat") {
        let config_dir = proj_dirs.config_dir();
        if !config_dir.exists() {
            let _ = fs::create_dir_all(config_dir);
        }
        return config_dir.join(CONFIG_FILENAME);
    }

    std::env::current_dir()
        .unwrap_or_default()
        .join(CONFIG_FILENAME)
}

fn load_config_inner() -> AppConfig {
    let path = get_config_path();
    match fs::read_to_string(&path) {
        Ok(contents) => match serde_json::from_str::<AppConfig>(&contents) {
            Ok(cfg) => cfg,
            Err(e) => {
                error!("Failed to parse config at {:?}: {}", path, e);
                AppConfig::default()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => AppConfig::default(),
        Err(e) => {
            error!("Failed to read config at {:?}: {}", path, e);
            AppConfig::default()
        }
    }
}

pub fn load_config() -> AppConfig {
    let _guard = CONFIG_LOCK.lock().unwrap();
    load_config_inner()
}

fn save_config_inner(config: &AppConfig) -> std::io::Result<()> {
    let path = get_config_path();
    let json = serde_json::to_string_pretty(config)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

    fs::write(&path, json)?;
    Ok(())
}

pub fn save_config(config: &AppConfig) -> std::io::Result<()> {
    let _guard = CONFIG_LOCK.lock().unwrap();
    save_config_inner(config)
}

use std::env;
use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 4000;
pub const DEFAULT_DATA_DIR: &str = "/data";
pub const DEFAULT_MUSIC_DIR: &str = "/music";

/// Process configuration, read once at startup. The library mount can later
/// be overridden through the settings row; everything else is fixed for the
/// lifetime of the process.
#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub version: String,
    pub git_sha: Option<String>,
    pub data_dir: PathBuf,
    pub music_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Self {
        let port = env_value("PORT")
            .and_then(|value| value.parse::<u16>().ok())
            .filter(|port| *port != 0)
            .unwrap_or(DEFAULT_PORT);
        let version =
            env_value("APP_VERSION").unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());
        let git_sha = env_value("GIT_SHA");
        let data_dir =
            PathBuf::from(env_value("DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()));
        let music_dir =
            PathBuf::from(env_value("MUSIC_DIR").unwrap_or_else(|| DEFAULT_MUSIC_DIR.to_string()));
        Self {
            port,
            version,
            git_sha,
            data_dir,
            music_dir,
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("crate.db")
    }

    pub fn user_agent(&self) -> String {
        format!("crate/{} (selfhosted)", self.version)
    }
}

fn env_value(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

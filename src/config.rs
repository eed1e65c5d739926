use clap::Parser;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

const MAX_IDLE_MINUTES: u64 = 365 * 24 * 60;

/// Runtime configuration for the weld manager server
///
/// Every option can also come from the environment, which is how the
/// container deployment sets them.
#[derive(Debug, Clone, Parser)]
#[command(name = "weld-manager", version, about = "Weld production log web app")]
pub struct AppConfig {
    /// Address the HTTP server listens on
    #[arg(long, env = "WELD_BIND", default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,

    /// JSON file holding column mappings and form settings
    #[arg(long, env = "WELD_SETTINGS", default_value = "settings.json")]
    pub settings: PathBuf,

    /// Master workbook loaded automatically when a session starts
    #[arg(long, env = "WELD_MASTER", default_value = "bop.xlsx")]
    pub master: PathBuf,

    /// Directory served under /static
    #[arg(long = "static-dir", env = "WELD_STATIC", default_value = "static")]
    pub static_dir: PathBuf,

    /// Largest master upload accepted, in MiB
    #[arg(long = "max-upload-mb", env = "WELD_MAX_UPLOAD_MB", default_value_t = 200)]
    pub max_upload_mb: usize,

    /// Minutes without a request before a session is dropped
    #[arg(
        long = "session-idle-minutes",
        env = "WELD_SESSION_IDLE_MINUTES",
        default_value_t = 60
    )]
    pub session_idle_minutes: u64,
}

impl AppConfig {
    /// Default file names resolved inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        AppConfig {
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
            settings: dir.join("settings.json"),
            master: dir.join("bop.xlsx"),
            static_dir: dir.join("static"),
            max_upload_mb: 200,
            session_idle_minutes: 60,
        }
    }

    /// Upload cap in bytes.
    pub fn upload_limit(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }

    /// Idle time before a session is dropped, capped at a year.
    pub fn session_idle(&self) -> Duration {
        let minutes = self.session_idle_minutes.min(MAX_IDLE_MINUTES);
        Duration::from_secs(minutes * 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let config = AppConfig::try_parse_from([
            "weld-manager",
            "--bind",
            "0.0.0.0:8080",
            "--master",
            "/data/master.xlsx",
        ])
        .unwrap();

        assert_eq!(config.bind.port(), 8080);
        assert_eq!(config.master, PathBuf::from("/data/master.xlsx"));
        assert_eq!(config.upload_limit(), 200 * 1024 * 1024);
    }

    #[test]
    fn limits_can_be_tuned() {
        let config = AppConfig::try_parse_from([
            "weld-manager",
            "--max-upload-mb",
            "5",
            "--session-idle-minutes",
            "0",
        ])
        .unwrap();

        assert_eq!(config.upload_limit(), 5 * 1024 * 1024);
        assert_eq!(config.session_idle(), Duration::ZERO);
    }

    #[test]
    fn in_dir_places_files_under_directory() {
        let config = AppConfig::in_dir(Path::new("/tmp/weld"));
        assert_eq!(config.settings, PathBuf::from("/tmp/weld/settings.json"));
        assert_eq!(config.master, PathBuf::from("/tmp/weld/bop.xlsx"));
    }
}

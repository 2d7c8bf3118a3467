use crate::domain::classifier::DEFAULT_SERVICES;
use crate::infrastructure::bluetooth::protocol::CASAMBI_COMPANY_ID;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_false")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_false")]
    pub show_file_line: bool,
    #[serde(default = "default_false")]
    pub show_thread_ids: bool,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_false(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_false(),
            show_thread_ids: default_false(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "casambi_mesh".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

/// Invalid configuration, reported before any event is processed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be greater than zero (got {value} ms)")]
    NonPositiveWindow { name: &'static str, value: i64 },
    #[error("purge_after_ms ({purge_after_ms}) must exceed stale_after_ms ({stale_after_ms})")]
    PurgeBeforeStale {
        stale_after_ms: i64,
        purge_after_ms: i64,
    },
    #[error("at least one service identifier must be recognized")]
    NoServiceIdentifiers,
    #[error("address_history_limit must be at least 1")]
    EmptyAddressHistory,
}

/// Identity resolution and eviction parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshSettings {
    #[serde(default = "default_company_id")]
    pub company_id: u16,
    #[serde(default = "default_service_uuids")]
    pub service_uuids: Vec<Uuid>,
    /// Silence after which a record or edge is hidden from active queries
    #[serde(default = "default_stale_after_ms")]
    pub stale_after_ms: i64,
    /// Silence after which a stale record is dropped entirely
    #[serde(default = "default_purge_after_ms")]
    pub purge_after_ms: i64,
    /// How long a reference may stay unconfirmed before it is reported
    #[serde(default = "default_stuck_after_ms")]
    pub stuck_after_ms: i64,
    #[serde(default = "default_housekeeping_interval_ms")]
    pub housekeeping_interval_ms: i64,
    #[serde(default = "default_address_history_limit")]
    pub address_history_limit: usize,
}

impl Default for MeshSettings {
    fn default() -> Self {
        Self {
            company_id: default_company_id(),
            service_uuids: default_service_uuids(),
            stale_after_ms: default_stale_after_ms(),
            purge_after_ms: default_purge_after_ms(),
            stuck_after_ms: default_stuck_after_ms(),
            housekeeping_interval_ms: default_housekeeping_interval_ms(),
            address_history_limit: default_address_history_limit(),
        }
    }
}

impl MeshSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("stale_after_ms", self.stale_after_ms),
            ("purge_after_ms", self.purge_after_ms),
            ("stuck_after_ms", self.stuck_after_ms),
            ("housekeeping_interval_ms", self.housekeeping_interval_ms),
        ] {
            if value <= 0 {
                return Err(ConfigError::NonPositiveWindow { name, value });
            }
        }
        if self.purge_after_ms <= self.stale_after_ms {
            return Err(ConfigError::PurgeBeforeStale {
                stale_after_ms: self.stale_after_ms,
                purge_after_ms: self.purge_after_ms,
            });
        }
        if self.service_uuids.is_empty() {
            return Err(ConfigError::NoServiceIdentifiers);
        }
        if self.address_history_limit == 0 {
            return Err(ConfigError::EmptyAddressHistory);
        }
        Ok(())
    }
}

fn default_company_id() -> u16 {
    CASAMBI_COMPANY_ID
}
fn default_service_uuids() -> Vec<Uuid> {
    DEFAULT_SERVICES.to_vec()
}
fn default_stale_after_ms() -> i64 {
    30_000
}
fn default_purge_after_ms() -> i64 {
    300_000
}
fn default_stuck_after_ms() -> i64 {
    60_000
}
fn default_housekeeping_interval_ms() -> i64 {
    5_000
}
fn default_address_history_limit() -> usize {
    8
}

/// Live scan parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerSettings {
    #[serde(default = "default_scan_duration_secs")]
    pub scan_duration_secs: u64,
    /// Adapter index as reported by the platform manager
    #[serde(default)]
    pub adapter_index: usize,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            scan_duration_secs: default_scan_duration_secs(),
            adapter_index: 0,
        }
    }
}

fn default_scan_duration_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    // Logging Settings
    #[serde(default)]
    pub log_settings: LogSettings,

    // Identity resolution
    #[serde(default)]
    pub mesh: MeshSettings,

    // Live scanning
    #[serde(default)]
    pub scanner: ScannerSettings,
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    /// Load from the default location, falling back to defaults when the
    /// file is missing or unreadable
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        Ok(Self::load_or_default(settings_path))
    }

    /// Load from an explicit file; a missing or broken file is an error
    pub fn from_path(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let settings_path = path.into();
        let settings = Self::load_from_file(&settings_path)?;
        Ok(Self {
            settings,
            settings_path,
        })
    }

    fn load_or_default(settings_path: PathBuf) -> Self {
        let settings = Self::load_from_file(&settings_path).unwrap_or_default();
        Self {
            settings,
            settings_path,
        }
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("CasambiMesh");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.settings_path
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(MeshSettings::default().validate(), Ok(()));
        assert_eq!(MeshSettings::default().company_id, 963);
    }

    #[test]
    fn test_invalid_windows_are_rejected() {
        let mut mesh = MeshSettings::default();
        mesh.stale_after_ms = 0;
        assert_eq!(
            mesh.validate(),
            Err(ConfigError::NonPositiveWindow {
                name: "stale_after_ms",
                value: 0
            })
        );

        let mut mesh = MeshSettings::default();
        mesh.purge_after_ms = mesh.stale_after_ms;
        assert!(matches!(
            mesh.validate(),
            Err(ConfigError::PurgeBeforeStale { .. })
        ));

        let mut mesh = MeshSettings::default();
        mesh.service_uuids.clear();
        assert_eq!(mesh.validate(), Err(ConfigError::NoServiceIdentifiers));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{ "mesh": { "stale_after_ms": 1000, "purge_after_ms": 2000 } }"#)
                .unwrap();
        assert_eq!(settings.mesh.stale_after_ms, 1000);
        assert_eq!(settings.mesh.company_id, CASAMBI_COMPANY_ID);
        assert_eq!(settings.mesh.service_uuids.len(), 2);
        assert_eq!(settings.log_settings.level, "info");
    }

    #[test]
    fn test_save_and_reload() {
        let path = std::env::temp_dir().join(format!(
            "casambi_mesh_settings_{}.json",
            std::process::id()
        ));
        let mut service = SettingsService::load_or_default(path.clone());
        service.get_mut().mesh.stuck_after_ms = 12_345;
        service.save().unwrap();

        let reloaded = SettingsService::from_path(&path).unwrap();
        assert_eq!(reloaded.get().mesh.stuck_after_ms, 12_345);
        let _ = fs::remove_file(path);
    }
}

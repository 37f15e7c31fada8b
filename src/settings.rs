use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::db::DB_FILE;
use crate::error::{HydroError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default = "default_company_name")]
    pub company_name: String,
}

fn default_company_name() -> String {
    "Hydrodemolition Co.".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            user_name: String::new(),
            company_name: default_company_name(),
        }
    }
}

impl Settings {
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(DB_FILE)
    }

    pub fn session(&self) -> Session {
        Session {
            user_name: self.user_name.clone(),
        }
    }
}

/// Who is acting. Passed explicitly to operations that record an author.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub user_name: String,
}

impl Session {
    pub fn author(&self) -> Option<&str> {
        (!self.user_name.is_empty()).then_some(self.user_name.as_str())
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("hydrops")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("hydrops")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_default()
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| HydroError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert!(s.user_name.is_empty());
        assert!(s.data_dir.ends_with("hydrops"));
        assert!(s.db_path().ends_with("hydrops.db"));
    }

    #[test]
    fn test_missing_keys_fall_back_to_defaults() {
        let json = r#"{"data_dir": "/tmp/hydro"}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.company_name, "Hydrodemolition Co.");
        assert_eq!(s.user_name, "");
        assert_eq!(s.db_path(), PathBuf::from("/tmp/hydro/hydrops.db"));
    }

    #[test]
    fn test_session_author() {
        let mut s = Settings::default();
        assert_eq!(s.session().author(), None);
        s.user_name = "Dana".into();
        assert_eq!(s.session().author(), Some("Dana"));
    }

    #[test]
    fn test_shellexpand_keeps_unknown_paths() {
        let expanded = shellexpand_path("/definitely/not/here");
        assert_eq!(expanded, "/definitely/not/here");
    }
}

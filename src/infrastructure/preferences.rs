// Preference persistence
use crate::application::preferences::{PreferenceStore, Preferences};
use anyhow::Context;
use std::path::PathBuf;
use std::sync::Mutex;

/// Stores preferences as a small TOML file.
pub struct FilePreferenceStore {
    path: PathBuf,
}

impl FilePreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn load(&self) -> anyhow::Result<Preferences> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Preferences::default()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read preferences {}", self.path.display()));
            }
        };
        toml::from_str(&text).with_context(|| format!("Invalid preferences file {}", self.path.display()))
    }

    fn save(&self, preferences: &Preferences) -> anyhow::Result<()> {
        let text = toml::to_string(preferences).context("Failed to encode preferences")?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(&self.path, text)
            .with_context(|| format!("Failed to write preferences {}", self.path.display()))
    }
}

/// Keeps preferences for the lifetime of the process only.
#[derive(Default)]
pub struct MemoryPreferenceStore {
    current: Mutex<Preferences>,
}

impl PreferenceStore for MemoryPreferenceStore {
    fn load(&self) -> anyhow::Result<Preferences> {
        self.current
            .lock()
            .map(|p| *p)
            .map_err(|_| anyhow::anyhow!("Preference store is poisoned"))
    }

    fn save(&self, preferences: &Preferences) -> anyhow::Result<()> {
        let mut current = self
            .current
            .lock()
            .map_err(|_| anyhow::anyhow!("Preference store is poisoned"))?;
        *current = *preferences;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dashboard::DisplayMode;
    use crate::domain::metric::Metric;

    #[test]
    fn test_file_store_round_trip_and_missing_file() {
        let dir = std::env::temp_dir().join(format!("agri-telemetry-prefs-{}", std::process::id()));
        let path = dir.join("preferences.toml");
        let store = FilePreferenceStore::new(&path);

        assert_eq!(store.load().unwrap(), Preferences::default());

        let prefs = Preferences {
            chart_mode: DisplayMode::HourlyHistory,
            dark_mode: true,
            selected_metric: Some(Metric::Tds),
        };
        store.save(&prefs).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("agri-chart-mode = \"hourlyHistory\""));
        assert_eq!(FilePreferenceStore::new(&path).load().unwrap(), prefs);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let path = std::env::temp_dir().join(format!("agri-telemetry-bad-{}.toml", std::process::id()));
        std::fs::write(&path, "agri-dark-mode = \"maybe\"").unwrap();
        assert!(FilePreferenceStore::new(&path).load().is_err());
        let _ = std::fs::remove_file(path);
    }
}

//! Session preferences, loaded from JSON.
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Prefs {
    /// REPL / batch-file mode: a later definition of an identifier replaces
    /// the earlier ones outright instead of shadowing them.
    pub overwrite_existing_definitions: bool,
    /// Unit used by trig functions for plain numbers and by inverse trig
    /// functions for their results.
    pub angle_unit: String,
    /// Scheme used by `to scheme` conversions that do not name one.
    pub unit_scheme: Option<String>,
    pub load_prelude: bool,
}

impl Default for Prefs {
    fn default() -> Self {
        Self {
            overwrite_existing_definitions: false,
            angle_unit: "radians".to_string(),
            unit_scheme: None,
            load_prelude: true,
        }
    }
}

impl Prefs {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn repl() -> Self {
        Self { overwrite_existing_definitions: true, ..Self::default() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_json_uses_defaults() {
        let prefs = Prefs::from_json_str(r#"{"angle_unit": "degrees"}"#).unwrap();
        assert_eq!(prefs.angle_unit, "degrees");
        assert!(!prefs.overwrite_existing_definitions);
        assert!(prefs.load_prelude);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"overwrite_existing_definitions": true, "unit_scheme": "Imperial"}}"#).unwrap();
        let prefs = Prefs::load(file.path()).unwrap();
        assert!(prefs.overwrite_existing_definitions);
        assert_eq!(prefs.unit_scheme.as_deref(), Some("Imperial"));
    }

    #[test]
    fn test_errors_are_reported() {
        assert!(matches!(Prefs::from_json_str("{not json"), Err(ConfigError::Json(_))));
        let missing = tempfile::tempdir().unwrap().path().join("absent.json");
        assert!(matches!(Prefs::load(missing), Err(ConfigError::Io(_))));
    }
}

//! Engine settings.
//!
//! Everything about *how* a pipeline reaches the device, as opposed to what
//! it does: which `adb` binary and device to use, how text recognition is
//! invoked, and the pauses that give the device UI time to react. Settings
//! come from defaults, an optional YAML/JSON file and CLI overrides, in that
//! order.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config_file::ConfigFormat;
use crate::error::{PipelineError, Result};

/// External text recognizer invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    /// Recognizer program; `None` disables recognition
    pub program: Option<String>,

    /// Arguments; `{image}` and `{lang}` are substituted per call
    pub args: Vec<String>,

    /// Where captures are written for the recognizer to read
    pub screenshot_path: PathBuf,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            program: None,
            args: vec!["{image}".to_string(), "{lang}".to_string()],
            screenshot_path: std::env::temp_dir().join("tapflow_screenshot.png"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub adb_path: PathBuf,

    /// Device serial passed as `adb -s`; `None` uses the only attached device
    pub serial: Option<String>,

    pub ocr: OcrSettings,

    /// Pause after every synthesized tap
    pub settle_delay_ms: u64,

    /// Hold time for long presses
    pub long_press_ms: u64,

    /// Pause after opening a settings page before inspecting it
    pub page_load_delay_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            adb_path: PathBuf::from("adb"),
            serial: None,
            ocr: OcrSettings::default(),
            settle_delay_ms: 500,
            long_press_ms: 1000,
            page_load_delay_ms: 2000,
        }
    }
}

impl EngineSettings {
    /// Settings with every pause set to zero, for tests and dry runs
    pub fn immediate() -> Self {
        Self {
            settle_delay_ms: 0,
            page_load_delay_ms: 0,
            ..Self::default()
        }
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;

        match ConfigFormat::from_path(path) {
            ConfigFormat::Yaml => serde_yaml::from_str(&content).map_err(|source| {
                PipelineError::Yaml {
                    path: path.to_path_buf(),
                    source,
                }
            }),
            ConfigFormat::Json => serde_json::from_str(&content).map_err(|source| {
                PipelineError::Json {
                    path: path.to_path_buf(),
                    source,
                }
            }),
        }
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn long_press(&self) -> Duration {
        Duration::from_millis(self.long_press_ms)
    }

    pub fn page_load_delay(&self) -> Duration {
        Duration::from_millis(self.page_load_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    #[test]
    fn test_defaults() {
        let s = EngineSettings::default();
        assert_eq!(s.adb_path, PathBuf::from("adb"));
        assert!(s.serial.is_none());
        assert!(s.ocr.program.is_none());
        assert_eq!(s.long_press(), Duration::from_millis(1000));
        assert_eq!(s.settle_delay(), Duration::from_millis(500));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let mut file = Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "serial: emulator-5554\nocr:\n  program: /usr/bin/ocr-json").unwrap();

        let s = EngineSettings::load_from_file(file.path()).unwrap();
        assert_eq!(s.serial.as_deref(), Some("emulator-5554"));
        assert_eq!(s.ocr.program.as_deref(), Some("/usr/bin/ocr-json"));
        assert_eq!(s.ocr.args, vec!["{image}", "{lang}"]);
        assert_eq!(s.long_press_ms, 1000);
    }

    #[test]
    fn test_json_settings() {
        let mut file = Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"settle_delay_ms": 0, "adb_path": "/opt/adb"}}"#).unwrap();

        let s = EngineSettings::load_from_file(file.path()).unwrap();
        assert_eq!(s.settle_delay(), Duration::ZERO);
        assert_eq!(s.adb_path, PathBuf::from("/opt/adb"));
    }

    #[test]
    fn test_wrong_type_is_error() {
        let mut file = Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "long_press_ms: forever").unwrap();
        assert!(matches!(
            EngineSettings::load_from_file(file.path()),
            Err(PipelineError::Yaml { .. })
        ));
    }

    #[test]
    fn test_immediate_has_no_pauses() {
        let s = EngineSettings::immediate();
        assert_eq!(s.settle_delay(), Duration::ZERO);
        assert_eq!(s.page_load_delay(), Duration::ZERO);
    }
}

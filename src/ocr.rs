//! Text recognition
//!
//! Recognition itself happens outside this crate. [`CommandRecognizer`]
//! hands a capture to an external program and reads back a JSON array of
//! detections:
//!
//! ```json
//! [{"text": "蓝牙", "confidence": 0.98, "box": [[48,210],[300,210],[300,290],[48,290]]}]
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tracing::{debug, warn};

use crate::context::TextMatch;
use crate::device::ShellOutput;
use crate::settings::OcrSettings;

/// Turns a PNG capture into recognized text regions.
pub trait TextRecognizer {
    fn recognize(&self, png: &[u8], language: &str) -> Result<Vec<TextMatch>>;
}

/// Recognizes nothing. Used for dry runs and when no program is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRecognizer;

impl TextRecognizer for NullRecognizer {
    fn recognize(&self, _png: &[u8], language: &str) -> Result<Vec<TextMatch>> {
        debug!("No recognizer configured, returning no text ({})", language);
        Ok(Vec::new())
    }
}

#[derive(Debug, Deserialize)]
struct RawDetection {
    text: String,
    #[serde(default)]
    confidence: f64,
    #[serde(rename = "box")]
    bounding_box: Vec<[f64; 2]>,
}

/// Parse recognizer stdout into matches.
pub fn parse_detections(json: &str) -> Result<Vec<TextMatch>> {
    let raw: Vec<RawDetection> = serde_json::from_str(json.trim())
        .context("Recognizer output is not a JSON detection list")?;
    Ok(raw
        .into_iter()
        .map(|d| TextMatch::new(d.text, d.confidence, d.bounding_box))
        .collect())
}

/// Runs an external program per capture.
#[derive(Debug, Clone)]
pub struct CommandRecognizer {
    program: String,
    args: Vec<String>,
    image_path: PathBuf,
}

impl CommandRecognizer {
    pub fn new(
        program: impl Into<String>,
        args: Vec<String>,
        image_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            program: program.into(),
            args,
            image_path: image_path.into(),
        }
    }

    fn expand_args(&self, language: &str) -> Vec<String> {
        let image = self.image_path.to_string_lossy();
        self.args
            .iter()
            .map(|arg| arg.replace("{image}", &image).replace("{lang}", language))
            .collect()
    }
}

impl TextRecognizer for CommandRecognizer {
    fn recognize(&self, png: &[u8], language: &str) -> Result<Vec<TextMatch>> {
        fs::write(&self.image_path, png)
            .with_context(|| format!("Failed to write capture to {:?}", self.image_path))?;

        let args = self.expand_args(language);
        debug!(program = %self.program, ?args, "Running recognizer");
        let output: ShellOutput = Command::new(&self.program)
            .args(&args)
            .output()
            .with_context(|| format!("Failed to run recognizer {}", self.program))?
            .into();
        output.ensure_success(&self.program)?;

        if !output.stderr.trim().is_empty() {
            warn!("Recognizer stderr: {}", output.stderr.trim());
        }
        parse_detections(&output.stdout)
    }
}

/// Build the recognizer described by the settings.
pub fn recognizer_from_settings(settings: &OcrSettings) -> Box<dyn TextRecognizer> {
    match &settings.program {
        Some(program) => Box::new(CommandRecognizer::new(
            program.clone(),
            settings.args.clone(),
            settings.screenshot_path.clone(),
        )),
        None => Box::new(NullRecognizer),
    }
}

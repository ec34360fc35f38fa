//! `adb`-backed device
//!
//! Every operation is one or two `adb` invocations. Arguments are passed
//! as an argv list; nothing goes through a local shell.

use anyhow::{Context, Result, bail};
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use std::time::Duration;
use tracing::debug;

use super::ui_tree::{UiNode, parse_dump};
use super::{Device, ShellOutput};
use crate::context::Point;
use crate::settings::EngineSettings;

const UI_DUMP_PATH: &str = "/sdcard/window_dump.xml";

#[derive(Debug, Clone)]
pub struct AdbDevice {
    adb: PathBuf,
    serial: Option<String>,
}

impl AdbDevice {
    pub fn new(adb: impl Into<PathBuf>, serial: Option<String>) -> Self {
        Self {
            adb: adb.into(),
            serial,
        }
    }

    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self::new(settings.adb_path.clone(), settings.serial.clone())
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        let mut cmd = Command::new(&self.adb);
        if let Some(serial) = &self.serial {
            cmd.arg("-s").arg(serial);
        }
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(adb = %self.adb.display(), ?args, "Running adb");
        cmd.output()
            .with_context(|| format!("Failed to run {} {}", self.adb.display(), args.join(" ")))
    }

    fn run_checked(&self, args: &[&str]) -> Result<ShellOutput> {
        let output = ShellOutput::from(self.run(args)?);
        output.ensure_success(&format!("adb {}", args.join(" ")))?;
        Ok(output)
    }
}

impl Device for AdbDevice {
    fn capture_screen(&self) -> Result<Vec<u8>> {
        let output = self.run(&["exec-out", "screencap", "-p"])?;
        if !output.status.success() {
            bail!(
                "screencap failed (exit code {}): {}",
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        if output.stdout.is_empty() {
            bail!("screencap returned no data");
        }
        Ok(output.stdout)
    }

    fn tap(&self, at: Point) -> Result<()> {
        let (x, y) = (at.x.to_string(), at.y.to_string());
        self.run_checked(&["shell", "input", "tap", &x, &y])?;
        Ok(())
    }

    fn long_press(&self, at: Point, hold: Duration) -> Result<()> {
        let (x, y) = (at.x.to_string(), at.y.to_string());
        let ms = hold.as_millis().to_string();
        self.run_checked(&["shell", "input", "swipe", &x, &y, &x, &y, &ms])?;
        Ok(())
    }

    fn input_text(&self, text: &str) -> Result<()> {
        let quoted = format!("\"{text}\"");
        self.run_checked(&["shell", "input", "text", &quoted])?;
        Ok(())
    }

    fn start_activity(&self, intent_action: &str) -> Result<()> {
        self.run_checked(&["shell", "am", "start", "-a", intent_action])?;
        Ok(())
    }

    fn launch_app(&self, package: &str, stop_first: bool) -> Result<()> {
        if stop_first {
            self.run_checked(&["shell", "am", "force-stop", package])?;
        }
        self.run_checked(&[
            "shell",
            "monkey",
            "-p",
            package,
            "-c",
            "android.intent.category.LAUNCHER",
            "1",
        ])?;
        Ok(())
    }

    fn shell(&self, args: &[&str]) -> Result<ShellOutput> {
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push("shell");
        full.extend_from_slice(args);
        Ok(ShellOutput::from(self.run(&full)?))
    }

    fn ui_dump(&self) -> Result<Vec<UiNode>> {
        self.run_checked(&["shell", "uiautomator", "dump", UI_DUMP_PATH])
            .context("uiautomator dump failed")?;
        let xml = self.run_checked(&["exec-out", "cat", UI_DUMP_PATH])?;
        parse_dump(&xml.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_adb_binary_is_error() {
        let device = AdbDevice::new("/nonexistent/adb-binary", Some("emulator-5554".into()));
        let err = device.tap(Point::new(1, 1)).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/adb-binary"));
    }

    #[test]
    fn test_from_settings() {
        let settings = EngineSettings {
            serial: Some("R58M".into()),
            ..EngineSettings::default()
        };
        let device = AdbDevice::from_settings(&settings);
        assert_eq!(device.serial.as_deref(), Some("R58M"));
        assert_eq!(device.adb, PathBuf::from("adb"));
    }
}

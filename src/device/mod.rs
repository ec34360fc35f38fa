//! Device control
//!
//! Actions never talk to `adb` directly. They go through the [`Device`]
//! trait, which has one production implementation ([`AdbDevice`]) and one
//! that only logs ([`DryRunDevice`]). Tests supply their own recording fake.

mod adb;
pub mod ui_tree;

pub use adb::AdbDevice;
pub use ui_tree::{Bounds, UiNode};

use anyhow::{Result, bail};
use image::{ImageFormat, RgbaImage};
use std::io::Cursor;
use std::process::Output;
use std::time::Duration;
use tracing::info;

use crate::context::Point;

/// Output of a device shell command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code (None if terminated by signal).
    pub exit_code: Option<i32>,
    pub success: bool,
}

impl ShellOutput {
    /// A successful command with the given stdout
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: Some(0),
            success: true,
        }
    }

    /// A failed command with the given exit code and stderr
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code: Some(exit_code),
            success: false,
        }
    }

    /// Check if the command succeeded and return an error if not.
    pub fn ensure_success(&self, context: &str) -> Result<()> {
        if self.success {
            Ok(())
        } else {
            let code = self.exit_code.unwrap_or(-1);
            bail!(
                "{} failed (exit code {}): {}",
                context,
                code,
                self.stderr.trim()
            )
        }
    }
}

impl From<Output> for ShellOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
            success: output.status.success(),
        }
    }
}

/// Operations a pipeline can perform on a device.
pub trait Device {
    /// Capture the current screen as PNG bytes.
    fn capture_screen(&self) -> Result<Vec<u8>>;

    fn tap(&self, at: Point) -> Result<()>;

    fn long_press(&self, at: Point, hold: Duration) -> Result<()>;

    /// Type text into the focused field. `text` must already be escaped
    /// for `input text` (see [`crate::actions::escape_input_text`]).
    fn input_text(&self, text: &str) -> Result<()>;

    /// Start an activity by intent action, e.g. `android.settings.SETTINGS`.
    fn start_activity(&self, intent_action: &str) -> Result<()>;

    /// Launch an app's main activity, force-stopping it first if asked.
    fn launch_app(&self, package: &str, stop_first: bool) -> Result<()>;

    /// Run a shell command on the device. A non-zero exit is reported in the
    /// output, not as an error.
    fn shell(&self, args: &[&str]) -> Result<ShellOutput>;

    /// Dump the current view hierarchy.
    fn ui_dump(&self) -> Result<Vec<UiNode>>;
}

/// A device that logs every operation and touches nothing.
///
/// Captures are blank PNGs of the configured size so that screenshot
/// validation passes; shell commands succeed with empty output.
#[derive(Debug, Clone)]
pub struct DryRunDevice {
    width: u32,
    height: u32,
}

impl Default for DryRunDevice {
    fn default() -> Self {
        Self::new(1080, 2400)
    }
}

impl DryRunDevice {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Encode an empty RGBA canvas as PNG.
pub fn blank_png(width: u32, height: u32) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    RgbaImage::new(width, height).write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

impl Device for DryRunDevice {
    fn capture_screen(&self) -> Result<Vec<u8>> {
        info!("[dry-run] capture screen {}x{}", self.width, self.height);
        blank_png(self.width, self.height)
    }

    fn tap(&self, at: Point) -> Result<()> {
        info!("[dry-run] tap {}", at);
        Ok(())
    }

    fn long_press(&self, at: Point, hold: Duration) -> Result<()> {
        info!("[dry-run] long press {} for {:?}", at, hold);
        Ok(())
    }

    fn input_text(&self, text: &str) -> Result<()> {
        info!("[dry-run] input text {:?}", text);
        Ok(())
    }

    fn start_activity(&self, intent_action: &str) -> Result<()> {
        info!("[dry-run] start activity {}", intent_action);
        Ok(())
    }

    fn launch_app(&self, package: &str, stop_first: bool) -> Result<()> {
        info!("[dry-run] launch {} (stop first: {})", package, stop_first);
        Ok(())
    }

    fn shell(&self, args: &[&str]) -> Result<ShellOutput> {
        info!("[dry-run] shell {}", args.join(" "));
        Ok(ShellOutput::ok(""))
    }

    fn ui_dump(&self) -> Result<Vec<UiNode>> {
        info!("[dry-run] ui dump");
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_success() {
        assert!(ShellOutput::ok("done").ensure_success("tap").is_ok());

        let err = ShellOutput::failed(255, "error: no devices/emulators found\n")
            .ensure_success("adb tap")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "adb tap failed (exit code 255): error: no devices/emulators found"
        );
    }

    #[test]
    fn test_dry_run_capture_is_decodable_png() {
        let device = DryRunDevice::new(200, 300);
        let png = device.capture_screen().unwrap();
        let img = image::load_from_memory_with_format(&png, ImageFormat::Png).unwrap();
        assert_eq!((img.width(), img.height()), (200, 300));
    }

    #[test]
    fn test_dry_run_operations_succeed() {
        let device = DryRunDevice::default();
        assert!(device.tap(Point::new(1, 2)).is_ok());
        assert!(device.shell(&["settings", "get", "global", "bluetooth_on"]).unwrap().success);
        assert!(device.ui_dump().unwrap().is_empty());
    }
}

//! Bluetooth switching and status
//!
//! Switching tries the Bluetooth manager binder call first, then the global
//! setting, and finally falls back to opening the settings page so a person
//! can flip the switch. Only the last resort leaves the state unknown.
//!
//! Toggling and switch location work from recognized text on the settings
//! page instead, for devices where neither shell route is permitted.

use anyhow::Result;
use serde::Deserialize;
use serde_json::{Value, json};
use std::thread;
use tracing::{info, warn};

use super::tap::PressKind;
use super::{Action, BLUETOOTH_SETTINGS};
use crate::context::{ExecutionContext, Point, TextMatch};
use crate::device::Device;
use crate::executor::ActionExecutor;

/// Binder transaction codes of `IBluetoothManager`
const ENABLE_TRANSACTION: &str = "6";
const DISABLE_TRANSACTION: &str = "7";

const SWITCH_CLASS: &str = "android.widget.Switch";

/// Recognized text above this line belongs to the page header
const HEADER_LIMIT: i64 = 500;

/// Switch position used when nothing on the page gives it away
const DEFAULT_SWITCH: Point = Point::new(900, 250);

/// Status words shown next to the switch on some skins
const STATUS_WORDS: [&str; 4] = ["ON", "OFF", "开启", "关闭"];

fn default_label() -> String {
    "蓝牙".to_string()
}

fn default_language() -> String {
    "zhs".to_string()
}

fn default_result_set() -> String {
    "bluetooth_page".to_string()
}

fn in_header(m: &TextMatch) -> bool {
    m.center().y < HEADER_LIMIT
}

/// First header match whose text contains `label`
fn find_label<'a>(matches: &'a [TextMatch], label: &str) -> Option<&'a TextMatch> {
    matches.iter().find(|m| in_header(m) && m.text().contains(label))
}

fn moved(at: Point, dx: i64) -> Point {
    at.offset(Point::new(dx, 0)).unwrap_or(at)
}

pub struct SetBluetoothAction {
    name: String,
    enable: bool,
}

impl SetBluetoothAction {
    pub fn new(name: String, enable: bool) -> Self {
        Self { name, enable }
    }

    fn via_service_call(&self, device: &dyn Device) -> bool {
        let code = if self.enable {
            ENABLE_TRANSACTION
        } else {
            DISABLE_TRANSACTION
        };
        match device.shell(&["service", "call", "bluetooth_manager", code]) {
            Ok(out) if out.success => {
                info!(action = %self.name, "Service call output: {}", out.stdout.trim());
                out.stdout.contains("00000001") || out.stdout.contains("Parcel")
            }
            Ok(out) => {
                warn!(action = %self.name, "Service call failed: {}", out.stderr.trim());
                false
            }
            Err(e) => {
                warn!(action = %self.name, "Service call failed: {:#}", e);
                false
            }
        }
    }

    fn via_settings(&self, device: &dyn Device) -> bool {
        let value = if self.enable { "1" } else { "0" };
        match device.shell(&["settings", "put", "global", "bluetooth_on", value]) {
            Ok(out) => {
                if !out.success {
                    warn!(action = %self.name, "Settings command failed: {}", out.stderr.trim());
                }
                out.success
            }
            Err(e) => {
                warn!(action = %self.name, "Settings command failed: {:#}", e);
                false
            }
        }
    }
}

impl Action for SetBluetoothAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, ctx: &mut ExecutionContext, executor: &ActionExecutor<'_>) -> Result<()> {
        let device = executor.device();
        let verb = if self.enable { "enable" } else { "disable" };

        if self.via_service_call(device) || self.via_settings(device) {
            info!(action = %self.name, "Bluetooth {}d", verb);
            ctx.set_variable("bluetooth_enabled", Value::Bool(self.enable));
            return Ok(());
        }

        warn!(
            action = %self.name,
            "Could not {} Bluetooth directly, opening the settings page instead", verb
        );
        device.start_activity(BLUETOOTH_SETTINGS)?;
        thread::sleep(executor.settings().page_load_delay());
        ctx.set_variable("bluetooth_enabled", Value::Null);
        Ok(())
    }
}

/// Store whether Bluetooth is on in `bluetooth_status` and `is_bluetooth_enabled`.
///
/// Reads the global setting, then the Bluetooth manager dump, then falls
/// back to the switch on the settings page. When none of them answers,
/// Bluetooth is reported as off. This step never fails.
pub struct BluetoothStatusAction {
    name: String,
}

impl BluetoothStatusAction {
    pub fn new(name: String) -> Self {
        Self { name }
    }

    fn from_setting(&self, device: &dyn Device) -> Option<bool> {
        let out = device
            .shell(&["settings", "get", "global", "bluetooth_on"])
            .ok()
            .filter(|out| out.success)?;
        match out.stdout.trim() {
            "1" => Some(true),
            "0" => Some(false),
            other => {
                warn!(action = %self.name, "Unexpected bluetooth_on value {:?}", other);
                None
            }
        }
    }

    /// `enabled: true|false` from the Bluetooth manager service dump
    fn from_dumpsys(&self, device: &dyn Device) -> Option<bool> {
        let out = device
            .shell(&["dumpsys", "bluetooth_manager"])
            .ok()
            .filter(|out| out.success)?;
        out.stdout.lines().find_map(|line| {
            match line.trim().strip_prefix("enabled:").map(str::trim) {
                Some("true") => Some(true),
                Some("false") => Some(false),
                _ => None,
            }
        })
    }

    fn from_switch(&self, executor: &ActionExecutor<'_>) -> Option<bool> {
        let device = executor.device();
        if let Err(e) = device.start_activity(BLUETOOTH_SETTINGS) {
            warn!(action = %self.name, "Could not open Bluetooth settings: {:#}", e);
            return None;
        }
        thread::sleep(executor.settings().page_load_delay());

        match device.ui_dump() {
            Ok(nodes) => nodes.iter().find(|n| n.class == SWITCH_CLASS).map(|n| n.checked),
            Err(e) => {
                warn!(action = %self.name, "UI dump failed: {:#}", e);
                None
            }
        }
    }
}

impl Action for BluetoothStatusAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, ctx: &mut ExecutionContext, executor: &ActionExecutor<'_>) -> Result<()> {
        let status = self
            .from_setting(executor.device())
            .or_else(|| self.from_dumpsys(executor.device()))
            .or_else(|| self.from_switch(executor))
            .unwrap_or_else(|| {
                warn!(action = %self.name, "Bluetooth status unknown, assuming off");
                false
            });

        info!(action = %self.name, "Bluetooth is {}", if status { "on" } else { "off" });
        ctx.set_variable("bluetooth_status", Value::Bool(status));
        ctx.set_variable("is_bluetooth_enabled", Value::Bool(status));
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToggleParams {
    /// Text of the Bluetooth row on the settings page
    #[serde(default = "default_label")]
    pub label: String,

    #[serde(default = "default_language")]
    pub language: String,
}

/// Flip the Bluetooth switch by tapping to the right of its label.
pub struct ToggleBluetoothAction {
    name: String,
    params: ToggleParams,
}

impl ToggleBluetoothAction {
    pub fn new(name: String, params: ToggleParams) -> Self {
        Self { name, params }
    }
}

impl Action for ToggleBluetoothAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, _ctx: &mut ExecutionContext, executor: &ActionExecutor<'_>) -> Result<()> {
        let device = executor.device();
        device.start_activity(BLUETOOTH_SETTINGS)?;
        thread::sleep(executor.settings().page_load_delay());

        let png = device.capture_screen()?;
        let matches = executor.recognizer().recognize(&png, &self.params.language)?;
        let at = match find_label(&matches, &self.params.label) {
            Some(m) => moved(m.center(), 500),
            None => {
                warn!(action = %self.name, "No '{}' label on the page", self.params.label);
                DEFAULT_SWITCH
            }
        };

        PressKind::Tap.perform(at, executor)?;
        info!(action = %self.name, "Tapped the Bluetooth switch at {}", at);
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwitchPositionParams {
    /// OCR result-set captured from the Bluetooth settings page
    #[serde(default = "default_result_set")]
    pub result_set: String,

    #[serde(default = "default_label")]
    pub label: String,
}

/// Estimate where the Bluetooth switch sits from stored OCR results.
///
/// Stores `bluetooth_switch_x` / `bluetooth_switch_y`. The estimate falls
/// back from the label, to a status word, to the rightmost header text,
/// and finally to a fixed position, so the step never fails.
pub struct SwitchPositionAction {
    name: String,
    params: SwitchPositionParams,
}

impl SwitchPositionAction {
    pub fn new(name: String, params: SwitchPositionParams) -> Self {
        Self { name, params }
    }
}

/// Switch position guessed from the texts of the settings page.
fn estimate_switch_position(matches: &[TextMatch], label: &str) -> Point {
    if let Some(m) = find_label(matches, label) {
        return moved(m.center(), 400);
    }
    if let Some(m) = matches
        .iter()
        .find(|m| in_header(m) && STATUS_WORDS.contains(&m.text()))
    {
        return moved(m.center(), -100);
    }
    matches
        .iter()
        .filter(|m| in_header(m) && m.center().x > 500)
        .max_by_key(|m| m.center().x)
        .map_or(DEFAULT_SWITCH, |m| moved(m.center(), 100))
}

impl Action for SwitchPositionAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, ctx: &mut ExecutionContext, _executor: &ActionExecutor<'_>) -> Result<()> {
        let matches = ctx.get_ocr_results(&self.params.result_set);
        if matches.is_empty() {
            warn!(
                action = %self.name,
                "No OCR results in '{}', the screen may be locked", self.params.result_set
            );
        }
        let at = estimate_switch_position(matches, &self.params.label);

        info!(action = %self.name, "Bluetooth switch estimated at {}", at);
        ctx.set_variable("bluetooth_switch_x", json!(at.x));
        ctx.set_variable("bluetooth_switch_y", json!(at.y));
        Ok(())
    }
}

//! Pipeline actions
//!
//! Every step of a pipeline is one [`Action`]. The set of variants is closed:
//! [`ActionKind`] names them all and knows how to build each one from a
//! descriptor's `(name, params)`.
//!
//! # Contract
//!
//! An action's body ([`Action::run`]) returns `anyhow::Result<()>`. The
//! provided [`Action::execute`] logs any error under the action's name and
//! reports `false`; nothing escapes to the caller.

mod bluetooth;
mod capture;
mod condition;
mod input;
mod system;
mod tap;
mod wait;

pub use bluetooth::{
    BluetoothStatusAction, SetBluetoothAction, SwitchPositionAction, ToggleBluetoothAction,
};
pub use capture::OcrAction;
pub use condition::ConditionAction;
pub use input::{InputAction, escape_input_text};
pub use system::{LaunchAppAction, OpenActivityAction, UiClickAction};
pub use tap::{ClickAction, PressKind};
pub use wait::WaitAction;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use tracing::error;

use crate::context::ExecutionContext;
use crate::executor::ActionExecutor;

/// Intent action of the system Bluetooth settings page
pub const BLUETOOTH_SETTINGS: &str = "android.settings.BLUETOOTH_SETTINGS";

/// Intent action of the top-level settings page
pub const SETTINGS: &str = "android.settings.SETTINGS";

pub trait Action {
    fn name(&self) -> &str;

    /// Perform the action against the context and the executor's device.
    fn run(&self, ctx: &mut ExecutionContext, executor: &ActionExecutor<'_>) -> Result<()>;

    /// Run and convert the outcome to the pipeline's success flag.
    fn execute(&self, ctx: &mut ExecutionContext, executor: &ActionExecutor<'_>) -> bool {
        match self.run(ctx, executor) {
            Ok(()) => true,
            Err(e) => {
                error!(action = self.name(), "Action failed: {:#}", e);
                false
            }
        }
    }
}

/// Every action variant, keyed by its descriptor `type`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum ActionKind {
    Ocr,
    ClickText,
    ClickPosition,
    Wait,
    Input,
    Condition,
    OpenSettings,
    OpenBluetooth,
    LaunchApp,
    UiClick,
    EnableBluetooth,
    DisableBluetooth,
    CheckBluetoothStatus,
    ToggleBluetooth,
    CalculateBluetoothSwitchPosition,
}

impl ActionKind {
    /// Descriptor tag, e.g. `click_text`
    pub fn tag(self) -> &'static str {
        self.into()
    }

    /// One-line summary for listings
    pub const fn description(self) -> &'static str {
        match self {
            Self::Ocr => "Capture the screen and store recognized text",
            Self::ClickText => "Tap recognized text (or a position)",
            Self::ClickPosition => "Tap a position (or recognized text)",
            Self::Wait => "Sleep, or wait until a condition holds",
            Self::Input => "Type text into the focused field",
            Self::Condition => "Run one of two step lists depending on an expression",
            Self::OpenSettings => "Open a settings page by intent action",
            Self::OpenBluetooth => "Open the Bluetooth settings page",
            Self::LaunchApp => "Launch an app by package name",
            Self::UiClick => "Tap a view found in the UI hierarchy",
            Self::EnableBluetooth => "Turn Bluetooth on",
            Self::DisableBluetooth => "Turn Bluetooth off",
            Self::CheckBluetoothStatus => "Store whether Bluetooth is on",
            Self::ToggleBluetooth => "Tap the Bluetooth switch found on its settings page",
            Self::CalculateBluetoothSwitchPosition => {
                "Estimate the Bluetooth switch position from OCR results"
            }
        }
    }

    /// Build an instance from a descriptor's name and parameters.
    pub fn build(self, name: &str, params: &Map<String, Value>) -> Result<Box<dyn Action>> {
        let name = name.to_string();
        let action: Box<dyn Action> = match self {
            Self::Ocr => Box::new(OcrAction::new(name, decode(params)?)),
            Self::ClickText | Self::ClickPosition => {
                Box::new(ClickAction::new(name, decode(params)?))
            }
            Self::Wait => Box::new(WaitAction::new(name, decode(params)?)),
            Self::Input => Box::new(InputAction::new(name, decode(params)?)),
            Self::Condition => Box::new(ConditionAction::new(name, decode(params)?)),
            Self::OpenSettings => Box::new(OpenActivityAction::from_params(name, decode(params)?)),
            Self::OpenBluetooth => Box::new(OpenActivityAction::new(name, BLUETOOTH_SETTINGS)),
            Self::LaunchApp => Box::new(LaunchAppAction::new(name, decode(params)?)),
            Self::UiClick => Box::new(UiClickAction::new(name, decode(params)?)),
            Self::EnableBluetooth => Box::new(SetBluetoothAction::new(name, true)),
            Self::DisableBluetooth => Box::new(SetBluetoothAction::new(name, false)),
            Self::CheckBluetoothStatus => Box::new(BluetoothStatusAction::new(name)),
            Self::ToggleBluetooth => Box::new(ToggleBluetoothAction::new(name, decode(params)?)),
            Self::CalculateBluetoothSwitchPosition => {
                Box::new(SwitchPositionAction::new(name, decode(params)?))
            }
        };
        Ok(action)
    }
}

/// Decode a descriptor's params into an action's parameter struct.
fn decode<T: DeserializeOwned>(params: &Map<String, Value>) -> Result<T> {
    serde_json::from_value(Value::Object(params.clone())).context("Invalid action parameters")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_tags_roundtrip() {
        for kind in ActionKind::iter() {
            assert_eq!(ActionKind::from_str(kind.tag()).unwrap(), kind);
        }
        assert_eq!(ActionKind::CheckBluetoothStatus.tag(), "check_bluetooth_status");
        assert_eq!(ActionKind::Ocr.to_string(), "ocr");
    }

    #[test]
    fn test_build_uses_name() {
        let action = ActionKind::Wait
            .build("pause", &Map::new())
            .unwrap();
        assert_eq!(action.name(), "pause");
    }

    #[test]
    fn test_build_rejects_bad_params() {
        let params = json!({"seconds": "soon"});
        let err = ActionKind::Wait
            .build("pause", params.as_object().unwrap())
            .err()
            .expect("bad params");
        assert!(format!("{err:#}").contains("Invalid action parameters"));
    }
}

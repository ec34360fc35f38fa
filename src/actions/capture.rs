use anyhow::{Context, Result, bail};
use image::{DynamicImage, GenericImageView, ImageFormat};
use serde::Deserialize;
use std::io::Cursor;
use tracing::info;

use super::Action;
use crate::context::{ExecutionContext, TextMatch};
use crate::executor::ActionExecutor;

/// Smallest capture accepted; anything smaller is usually a locked screen.
const MIN_CAPTURE_SIDE: u32 = 100;

fn default_language() -> String {
    "zhs".to_string()
}

fn default_save_to() -> String {
    "ocr_result".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrParams {
    /// `[x, y, width, height]` of the area to recognize
    #[serde(default)]
    pub region: Option<[u32; 4]>,

    #[serde(default = "default_language")]
    pub language: String,

    /// Result-set and variable name the matches are stored under
    #[serde(default = "default_save_to")]
    pub save_to: String,
}

/// Capture the screen, recognize text and store the matches.
///
/// Matches are stored twice: as a named result-set for text lookups and as
/// a variable of the same name for expressions. Coordinates are always
/// screen-absolute, also when a region is given.
pub struct OcrAction {
    name: String,
    params: OcrParams,
}

impl OcrAction {
    pub fn new(name: String, params: OcrParams) -> Self {
        Self { name, params }
    }
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

fn shift(m: &TextMatch, dx: f64, dy: f64) -> TextMatch {
    let moved = m
        .bounding_box()
        .iter()
        .map(|[x, y]| [x + dx, y + dy])
        .collect();
    TextMatch::new(m.text(), m.confidence(), moved)
}

impl Action for OcrAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, ctx: &mut ExecutionContext, executor: &ActionExecutor<'_>) -> Result<()> {
        let png = executor.device().capture_screen()?;
        let screen = image::load_from_memory(&png).context("Screen capture is not a valid image")?;
        let (width, height) = screen.dimensions();
        if width < MIN_CAPTURE_SIDE || height < MIN_CAPTURE_SIDE {
            bail!("Screen capture is {width}x{height}; the screen may be locked");
        }

        let matches = match self.params.region {
            None => executor.recognizer().recognize(&png, &self.params.language)?,
            Some([x, y, w, h]) => {
                if w == 0 || h == 0 || x >= width || y >= height {
                    bail!("Region [{x}, {y}, {w}, {h}] lies outside the {width}x{height} screen");
                }
                let cropped = screen.crop_imm(x, y, w.min(width - x), h.min(height - y));
                let found = executor
                    .recognizer()
                    .recognize(&encode_png(&cropped)?, &self.params.language)?;
                found
                    .iter()
                    .map(|m| shift(m, f64::from(x), f64::from(y)))
                    .collect()
            }
        };

        if matches.is_empty() {
            info!(action = %self.name, "No text recognized ({})", self.params.save_to);
        }
        for (i, m) in matches.iter().enumerate() {
            info!(
                action = %self.name,
                "{}. '{}' confidence {:.2} at {}",
                i + 1,
                m.text(),
                m.confidence(),
                m.center()
            );
        }

        let as_value = serde_json::to_value(&matches)?;
        ctx.set_ocr_results(self.params.save_to.clone(), matches);
        ctx.set_variable(self.params.save_to.clone(), as_value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DryRunDevice;
    use crate::ocr::NullRecognizer;
    use crate::registry::ActionRegistry;
    use crate::settings::EngineSettings;
    use serde_json::{Value, json};

    fn run_ocr(device: DryRunDevice, params: Value, ctx: &mut ExecutionContext) -> Result<()> {
        let registry = ActionRegistry::builtin();
        let settings = EngineSettings::immediate();
        let executor = ActionExecutor::new(&registry, &device, &NullRecognizer, &settings);
        let action = OcrAction::new("ocr".to_string(), serde_json::from_value(params)?);
        action.run(ctx, &executor)
    }

    #[test]
    fn test_shift_moves_box_and_center() {
        let m = TextMatch::new("OK", 0.8, vec![[0.0, 0.0], [10.0, 0.0], [10.0, 4.0], [0.0, 4.0]]);
        let moved = shift(&m, 100.0, 50.0);
        assert_eq!(moved.text(), "OK");
        assert_eq!(moved.bounding_box()[2], [110.0, 54.0]);
        assert_eq!(moved.center(), crate::context::Point::new(105, 52));
    }

    #[test]
    fn test_stores_set_and_variable() {
        let mut ctx = ExecutionContext::new();
        run_ocr(DryRunDevice::default(), json!({"save_to": "page"}), &mut ctx).unwrap();
        assert!(ctx.get_ocr_results("page").is_empty());
        assert_eq!(ctx.get_variable("page"), Some(&json!([])));
    }

    #[test]
    fn test_rejects_small_capture() {
        let mut ctx = ExecutionContext::new();
        let err = run_ocr(DryRunDevice::new(80, 600), json!({}), &mut ctx).unwrap_err();
        assert!(err.to_string().contains("80x600"));
        assert_eq!(ctx.get_variable("ocr_result"), None);
    }

    #[test]
    fn test_region_outside_screen() {
        let mut ctx = ExecutionContext::new();
        let params = json!({"region": [2000, 0, 100, 100]});
        let err = run_ocr(DryRunDevice::default(), params, &mut ctx).unwrap_err();
        assert!(err.to_string().contains("outside the 1080x2400 screen"));

        let inside = json!({"region": [1000, 2300, 500, 500], "save_to": "corner"});
        run_ocr(DryRunDevice::default(), inside, &mut ctx).unwrap();
        assert_eq!(ctx.get_variable("corner"), Some(&json!([])));
    }
}

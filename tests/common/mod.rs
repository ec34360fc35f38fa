// Shared fakes for the integration tests: a device that records every
// operation and a recognizer that replays scripted results.

#![allow(dead_code)]

use anyhow::{Result, bail};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;

use tapflow::context::{Point, TextMatch};
use tapflow::device::{Bounds, Device, ShellOutput, UiNode, blank_png};
use tapflow::ocr::TextRecognizer;
use tapflow::{EngineSettings, PipelineEngine};

/// One device call, as seen by [`RecordingDevice`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Capture,
    Tap(Point),
    LongPress(Point),
    Input(String),
    StartActivity(String),
    LaunchApp(String, bool),
    Shell(String),
    UiDump,
}

pub type OpLog = Rc<RefCell<Vec<Op>>>;

/// Device fake; keep the log handle before boxing it into an engine.
pub struct RecordingDevice {
    log: OpLog,
    screen: (u32, u32),
    shell: HashMap<String, ShellOutput>,
    nodes: Vec<UiNode>,
    failing_taps: bool,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self {
            log: Rc::new(RefCell::new(Vec::new())),
            screen: (1080, 2400),
            shell: HashMap::new(),
            nodes: Vec::new(),
            failing_taps: false,
        }
    }

    pub fn log(&self) -> OpLog {
        Rc::clone(&self.log)
    }

    pub fn with_screen(mut self, width: u32, height: u32) -> Self {
        self.screen = (width, height);
        self
    }

    /// Answer for a shell command, keyed by its space-joined arguments.
    /// Unscripted commands succeed with empty output.
    pub fn with_shell(mut self, command: &str, output: ShellOutput) -> Self {
        self.shell.insert(command.to_string(), output);
        self
    }

    pub fn with_nodes(mut self, nodes: Vec<UiNode>) -> Self {
        self.nodes = nodes;
        self
    }

    pub fn with_failing_taps(mut self) -> Self {
        self.failing_taps = true;
        self
    }

    fn push(&self, op: Op) {
        self.log.borrow_mut().push(op);
    }
}

impl Device for RecordingDevice {
    fn capture_screen(&self) -> Result<Vec<u8>> {
        self.push(Op::Capture);
        blank_png(self.screen.0, self.screen.1)
    }

    fn tap(&self, at: Point) -> Result<()> {
        self.push(Op::Tap(at));
        if self.failing_taps {
            bail!("input tap failed");
        }
        Ok(())
    }

    fn long_press(&self, at: Point, _hold: Duration) -> Result<()> {
        self.push(Op::LongPress(at));
        Ok(())
    }

    fn input_text(&self, text: &str) -> Result<()> {
        self.push(Op::Input(text.to_string()));
        Ok(())
    }

    fn start_activity(&self, intent_action: &str) -> Result<()> {
        self.push(Op::StartActivity(intent_action.to_string()));
        Ok(())
    }

    fn launch_app(&self, package: &str, stop_first: bool) -> Result<()> {
        self.push(Op::LaunchApp(package.to_string(), stop_first));
        Ok(())
    }

    fn shell(&self, args: &[&str]) -> Result<ShellOutput> {
        let command = args.join(" ");
        self.push(Op::Shell(command.clone()));
        Ok(self
            .shell
            .get(&command)
            .cloned()
            .unwrap_or_else(|| ShellOutput::ok("")))
    }

    fn ui_dump(&self) -> Result<Vec<UiNode>> {
        self.push(Op::UiDump);
        Ok(self.nodes.clone())
    }
}

/// Recognizer returning queued results, one batch per call.
/// Once the queue is drained every call returns the last batch.
pub struct ScriptedRecognizer {
    batches: RefCell<VecDeque<Vec<TextMatch>>>,
    last: RefCell<Vec<TextMatch>>,
    calls: Rc<RefCell<Vec<String>>>,
}

impl ScriptedRecognizer {
    pub fn new(batches: Vec<Vec<TextMatch>>) -> Self {
        Self {
            batches: RefCell::new(batches.into()),
            last: RefCell::new(Vec::new()),
            calls: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Languages passed to each call, in order
    pub fn calls(&self) -> Rc<RefCell<Vec<String>>> {
        Rc::clone(&self.calls)
    }
}

impl TextRecognizer for ScriptedRecognizer {
    fn recognize(&self, _png: &[u8], language: &str) -> Result<Vec<TextMatch>> {
        self.calls.borrow_mut().push(language.to_string());
        if let Some(batch) = self.batches.borrow_mut().pop_front() {
            *self.last.borrow_mut() = batch;
        }
        Ok(self.last.borrow().clone())
    }
}

/// Match with a 2x2 box centered on `(x, y)`
pub fn text_at(text: &str, x: f64, y: f64) -> TextMatch {
    TextMatch::new(
        text,
        0.9,
        vec![
            [x - 1.0, y - 1.0],
            [x + 1.0, y - 1.0],
            [x + 1.0, y + 1.0],
            [x - 1.0, y + 1.0],
        ],
    )
}

pub fn node(class: &str, text: &str, bounds: [i64; 4], checked: bool) -> UiNode {
    UiNode {
        text: text.to_string(),
        class: class.to_string(),
        checked,
        bounds: Bounds {
            left: bounds[0],
            top: bounds[1],
            right: bounds[2],
            bottom: bounds[3],
        },
        ..UiNode::default()
    }
}

pub fn engine_with(device: RecordingDevice, recognizer: ScriptedRecognizer) -> PipelineEngine {
    PipelineEngine::new(
        Box::new(device),
        Box::new(recognizer),
        EngineSettings::immediate(),
    )
}

pub fn taps(log: &OpLog) -> Vec<Point> {
    log.borrow()
        .iter()
        .filter_map(|op| match op {
            Op::Tap(p) => Some(*p),
            _ => None,
        })
        .collect()
}

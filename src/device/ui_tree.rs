//! `uiautomator dump` parsing
//!
//! Every `<node>` element becomes one [`UiNode`]; nesting is ignored and
//! nodes are returned in document order.

use anyhow::{Context, Result};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

use crate::context::Point;

static BOUNDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(-?\d+),(-?\d+)\]\[(-?\d+),(-?\d+)\]").expect("static pattern")
});

/// Screen rectangle of a view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Bounds {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

impl Bounds {
    pub fn parse(s: &str) -> Option<Self> {
        let caps = BOUNDS.captures(s)?;
        let n = |i: usize| caps[i].parse::<i64>().ok();
        Some(Self {
            left: n(1)?,
            top: n(2)?,
            right: n(3)?,
            bottom: n(4)?,
        })
    }

    pub fn center(&self) -> Point {
        Point::new(mean(self.left, self.right), mean(self.top, self.bottom))
    }
}

// The mean of two i64 always fits back into an i64.
fn mean(a: i64, b: i64) -> i64 {
    ((i128::from(a) + i128::from(b)) / 2) as i64
}

/// One view from the hierarchy
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct UiNode {
    pub text: String,
    pub resource_id: String,
    pub class: String,
    pub content_desc: String,
    pub checked: bool,
    pub bounds: Bounds,
}

fn node_from(element: &BytesStart<'_>) -> Result<UiNode> {
    let mut node = UiNode::default();
    for attr in element.attributes() {
        let attr = attr.context("Malformed attribute in UI dump")?;
        let value = attr
            .unescape_value()
            .context("Malformed attribute value in UI dump")?;
        match attr.key.as_ref() {
            b"text" => node.text = value.into_owned(),
            b"resource-id" => node.resource_id = value.into_owned(),
            b"class" => node.class = value.into_owned(),
            b"content-desc" => node.content_desc = value.into_owned(),
            b"checked" => node.checked = value == "true",
            b"bounds" => node.bounds = Bounds::parse(&value).unwrap_or_default(),
            _ => {}
        }
    }
    Ok(node)
}

/// Parse every `<node>` in a dump.
pub fn parse_dump(xml: &str) -> Result<Vec<UiNode>> {
    let mut reader = Reader::from_str(xml);
    let mut nodes = Vec::new();
    loop {
        match reader
            .read_event()
            .with_context(|| format!("Invalid UI dump at byte {}", reader.buffer_position()))?
        {
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"node" => {
                nodes.push(node_from(&e)?);
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(nodes)
}

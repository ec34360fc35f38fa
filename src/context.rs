//! Shared execution context
//!
//! The [`ExecutionContext`] is the only mutable state threaded through a
//! pipeline run. Actions talk to each other exclusively by writing variables
//! and OCR result-sets here and reading them back in later steps.
//!
//! # Text lookup
//!
//! [`ExecutionContext::find_text`] searches every result-set in insertion
//! order. The first exact match anywhere wins outright; only when no exact
//! match exists is the first substring match used.

use chrono::{DateTime, Utc};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Integer screen coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

impl Point {
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Shift this point by `by`; `None` if either coordinate overflows.
    pub fn offset(self, by: Point) -> Option<Self> {
        Some(Self {
            x: self.x.checked_add(by.x)?,
            y: self.y.checked_add(by.y)?,
        })
    }
}

// Serialized as `[x, y]` so expressions can index it.
impl Serialize for Point {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (self.x, self.y).serialize(serializer)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// One recognized text region.
///
/// The center is derived from the bounding box at construction and the
/// record cannot be modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextMatch {
    text: String,
    confidence: f64,
    #[serde(rename = "box")]
    bounding_box: Vec<[f64; 2]>,
    center: Point,
}

impl TextMatch {
    /// Build a match from recognizer output. `confidence` is clamped to `[0, 1]`.
    pub fn new(text: impl Into<String>, confidence: f64, bounding_box: Vec<[f64; 2]>) -> Self {
        let center = box_center(&bounding_box);
        Self {
            text: text.into(),
            confidence: confidence.clamp(0.0, 1.0),
            bounding_box,
            center,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn bounding_box(&self) -> &[[f64; 2]] {
        &self.bounding_box
    }

    pub fn center(&self) -> Point {
        self.center
    }
}

/// Mean of the box corners, truncated toward zero.
fn box_center(points: &[[f64; 2]]) -> Point {
    if points.is_empty() {
        return Point::default();
    }
    let n = points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), [x, y]| (sx + x, sy + y));
    Point::new((sx / n) as i64, (sy / n) as i64)
}

/// Named OCR result-sets in insertion order.
///
/// Replacing an existing set keeps its original position.
#[derive(Debug, Clone, Default)]
pub struct OcrResults {
    sets: Vec<(String, Vec<TextMatch>)>,
}

impl OcrResults {
    pub fn insert(&mut self, name: impl Into<String>, matches: Vec<TextMatch>) {
        let name = name.into();
        match self.sets.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = matches,
            None => self.sets.push((name, matches)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&[TextMatch]> {
        self.sets
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, m)| m.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[TextMatch])> {
        self.sets.iter().map(|(n, m)| (n.as_str(), m.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

impl Serialize for OcrResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.sets.len()))?;
        for (name, matches) in &self.sets {
            map.serialize_entry(name, matches)?;
        }
        map.end()
    }
}

/// How a text lookup matched its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Partial,
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::Partial => write!(f, "partial"),
        }
    }
}

/// Result of a successful text lookup.
#[derive(Debug, Clone, Copy)]
pub struct TextHit<'a> {
    pub result_set: &'a str,
    pub text_match: &'a TextMatch,
    pub kind: MatchKind,
}

impl TextHit<'_> {
    /// Center of the matched region shifted by `offset`.
    pub fn tap_point(&self, offset: Point) -> Option<Point> {
        self.text_match.center().offset(offset)
    }
}

/// One executed step, as recorded by the executor.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub action_type: String,
    pub name: String,
    pub success: bool,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

/// Per-run store of variables, OCR result-sets and execution history.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    variables: HashMap<String, Value>,
    ocr_results: OcrResults,
    history: Vec<HistoryEntry>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable, overwriting any previous value.
    pub fn set_variable(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        debug!("Set variable {} = {}", key, value);
        self.variables.insert(key, value);
    }

    pub fn get_variable(&self, key: &str) -> Option<&Value> {
        self.variables.get(key)
    }

    pub fn variables(&self) -> &HashMap<String, Value> {
        &self.variables
    }

    /// Store a named result-set, replacing a previous set of the same name.
    pub fn set_ocr_results(&mut self, key: impl Into<String>, results: Vec<TextMatch>) {
        let key = key.into();
        debug!("Set OCR result-set {} with {} entries", key, results.len());
        self.ocr_results.insert(key, results);
    }

    /// Result-set by name; missing sets read as empty.
    pub fn get_ocr_results(&self, key: &str) -> &[TextMatch] {
        self.ocr_results.get(key).unwrap_or(&[])
    }

    pub fn ocr_results(&self) -> &OcrResults {
        &self.ocr_results
    }

    /// Locate `target` in the stored OCR results.
    ///
    /// With `result_set` given only that set is searched. Exact matches beat
    /// partial (substring) matches regardless of where they occur; among
    /// equals the first one in set order, then item order, wins.
    pub fn find_text(&self, target: &str, result_set: Option<&str>) -> Option<TextHit<'_>> {
        let mut partial: Option<TextHit<'_>> = None;

        let sets = self
            .ocr_results
            .iter()
            .filter(|(name, _)| result_set.is_none_or(|wanted| *name == wanted));

        for (name, matches) in sets {
            for m in matches {
                if m.text() == target {
                    return Some(TextHit {
                        result_set: name,
                        text_match: m,
                        kind: MatchKind::Exact,
                    });
                }
                if partial.is_none() && m.text().contains(target) {
                    partial = Some(TextHit {
                        result_set: name,
                        text_match: m,
                        kind: MatchKind::Partial,
                    });
                }
            }
        }

        partial
    }

    pub fn record(&mut self, entry: HistoryEntry) {
        self.history.push(entry);
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    /// Square box of side 2 centered on `(x, y)`.
    pub(crate) fn text_at(text: &str, x: i64, y: i64) -> TextMatch {
        let (x, y) = (x as f64, y as f64);
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

    #[test]
    fn test_variables_overwrite() {
        let mut ctx = ExecutionContext::new();
        ctx.set_variable("user", json!("alice"));
        ctx.set_variable("user", json!("bob"));
        assert_eq!(ctx.get_variable("user"), Some(&json!("bob")));
        assert_eq!(ctx.get_variable("missing"), None);
    }

    #[test]
    fn test_center_is_truncated_mean() {
        let m = TextMatch::new(
            "OK",
            0.5,
            vec![[10.0, 20.0], [15.0, 20.0], [15.0, 25.0], [10.0, 25.0]],
        );
        assert_eq!(m.center(), Point::new(12, 22));
    }

    #[test]
    fn test_confidence_is_clamped() {
        assert_eq!(TextMatch::new("x", 1.7, vec![]).confidence(), 1.0);
        assert_eq!(TextMatch::new("x", -0.2, vec![]).confidence(), 0.0);
    }

    #[test]
    fn test_missing_result_set_reads_empty() {
        let ctx = ExecutionContext::new();
        assert!(ctx.get_ocr_results("nothing").is_empty());
    }

    #[test]
    fn test_replacing_result_set_keeps_position() {
        let mut ctx = ExecutionContext::new();
        ctx.set_ocr_results("first", vec![text_at("a", 0, 0)]);
        ctx.set_ocr_results("second", vec![text_at("b", 0, 0)]);
        ctx.set_ocr_results("first", vec![text_at("c", 0, 0)]);

        let names: Vec<&str> = ctx.ocr_results().iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["first", "second"]);
        assert_eq!(ctx.get_ocr_results("first")[0].text(), "c");
    }

    #[test]
    fn test_exact_match_beats_earlier_partial() {
        let mut ctx = ExecutionContext::new();
        ctx.set_ocr_results("B", vec![text_at("OK button", 2, 2)]);
        ctx.set_ocr_results("A", vec![text_at("OK", 1, 1)]);

        let hit = ctx.find_text("OK", None).expect("should match");
        assert_eq!(hit.kind, MatchKind::Exact);
        assert_eq!(hit.result_set, "A");
        assert_eq!(hit.text_match.center(), Point::new(1, 1));
    }

    #[test]
    fn test_partial_match_when_no_exact() {
        let mut ctx = ExecutionContext::new();
        ctx.set_ocr_results("B", vec![text_at("OK button", 2, 2)]);
        ctx.set_ocr_results("C", vec![text_at("press OK", 3, 3)]);

        let hit = ctx.find_text("OK", None).expect("should match");
        assert_eq!(hit.kind, MatchKind::Partial);
        assert_eq!(hit.text_match.center(), Point::new(2, 2));
    }

    #[test]
    fn test_first_exact_match_wins() {
        let mut ctx = ExecutionContext::new();
        ctx.set_ocr_results("A", vec![text_at("Next", 5, 5), text_at("Next", 6, 6)]);
        ctx.set_ocr_results("B", vec![text_at("Next", 7, 7)]);

        let hit = ctx.find_text("Next", None).expect("should match");
        assert_eq!(hit.text_match.center(), Point::new(5, 5));
    }

    #[test]
    fn test_lookup_restricted_to_one_set() {
        let mut ctx = ExecutionContext::new();
        ctx.set_ocr_results("A", vec![text_at("OK", 1, 1)]);
        ctx.set_ocr_results("B", vec![text_at("OK button", 2, 2)]);

        let hit = ctx.find_text("OK", Some("B")).expect("should match");
        assert_eq!(hit.result_set, "B");
        assert!(ctx.find_text("OK", Some("missing")).is_none());
    }

    #[test]
    fn test_no_match() {
        let mut ctx = ExecutionContext::new();
        ctx.set_ocr_results("A", vec![text_at("Cancel", 1, 1)]);
        assert!(ctx.find_text("OK", None).is_none());
    }

    #[test]
    fn test_tap_point_applies_offset() {
        let mut ctx = ExecutionContext::new();
        ctx.set_ocr_results("A", vec![text_at("OK", 100, 200)]);
        let hit = ctx.find_text("OK", None).expect("should match");
        assert_eq!(hit.tap_point(Point::new(400, -10)), Some(Point::new(500, 190)));
    }

    #[test]
    fn test_offset_overflow_is_none() {
        let edge = Point::new(i64::MAX, 0);
        assert_eq!(edge.offset(Point::new(1, 0)), None);
        assert_eq!(Point::new(0, i64::MIN).offset(Point::new(0, -1)), None);
        assert_eq!(edge.offset(Point::new(-1, 5)), Some(Point::new(i64::MAX - 1, 5)));
    }

    #[test]
    fn test_match_serializes_center_as_pair() {
        let value = serde_json::to_value(text_at("OK", 3, 4)).unwrap();
        assert_eq!(value["text"], json!("OK"));
        assert_eq!(value["center"], json!([3, 4]));
        assert_eq!(value["box"][0], json!([2.0, 3.0]));
    }
}

//! Environment seams
//!
//! The engine never touches host globals directly; storage, location,
//! user prompts and layout geometry are injected behind these traits.
//! In-memory implementations back the test suites.

use std::collections::HashMap;

use hywire_dom::NodeId;

/// Persistence error
#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    #[error("Storage quota exceeded")]
    QuotaExceeded,
}

/// Key/value persistence (history snapshots)
pub trait Storage {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str);
}

/// Unbounded in-memory storage
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: HashMap<String, String>,
    /// Byte budget, for quota tests (None = unlimited)
    pub quota: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: usize) -> Self {
        Self { values: HashMap::new(), quota: Some(quota) }
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        if let Some(quota) = self.quota {
            if value.len() > quota {
                return Err(StorageError::QuotaExceeded);
            }
        }
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) {
        self.values.remove(key);
    }
}

/// Location/history host API
pub trait LocationApi {
    fn current_url(&self) -> String;
    fn push(&mut self, url: &str);
    fn replace(&mut self, url: &str);
    /// Hard navigation (client-side redirect)
    fn assign(&mut self, url: &str);
    fn reload(&mut self);
}

/// In-memory location for tests
#[derive(Debug)]
pub struct MemoryLocation {
    current: String,
    pub pushed: Vec<String>,
    pub replaced: Vec<String>,
    pub assigned: Vec<String>,
    pub reloads: usize,
}

impl MemoryLocation {
    pub fn new(url: &str) -> Self {
        Self {
            current: url.to_string(),
            pushed: Vec::new(),
            replaced: Vec::new(),
            assigned: Vec::new(),
            reloads: 0,
        }
    }
}

impl Default for MemoryLocation {
    fn default() -> Self {
        Self::new("http://localhost/")
    }
}

impl LocationApi for MemoryLocation {
    fn current_url(&self) -> String {
        self.current.clone()
    }

    fn push(&mut self, url: &str) {
        self.current = url.to_string();
        self.pushed.push(url.to_string());
    }

    fn replace(&mut self, url: &str) {
        self.current = url.to_string();
        self.replaced.push(url.to_string());
    }

    fn assign(&mut self, url: &str) {
        self.current = url.to_string();
        self.assigned.push(url.to_string());
    }

    fn reload(&mut self) {
        self.reloads += 1;
    }
}

/// User confirmation/prompt preconditions
pub trait Prompter {
    fn confirm(&mut self, message: &str) -> bool;
    fn prompt(&mut self, message: &str) -> Option<String>;
}

/// Accepts every confirm, answers every prompt with an empty string
#[derive(Debug, Default)]
pub struct AcceptAllPrompter;

impl Prompter for AcceptAllPrompter {
    fn confirm(&mut self, _message: &str) -> bool {
        true
    }

    fn prompt(&mut self, _message: &str) -> Option<String> {
        Some(String::new())
    }
}

/// Scripted prompter for tests
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    /// Answer for the next confirms (drained front-first; empty = true)
    pub confirms: Vec<bool>,
    /// Answers for prompts (None = cancelled)
    pub prompts: Vec<Option<String>>,
}

impl Prompter for ScriptedPrompter {
    fn confirm(&mut self, _message: &str) -> bool {
        if self.confirms.is_empty() { true } else { self.confirms.remove(0) }
    }

    fn prompt(&mut self, _message: &str) -> Option<String> {
        if self.prompts.is_empty() { Some(String::new()) } else { self.prompts.remove(0) }
    }
}

/// Element bounds in viewport coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Check if two rectangles intersect
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && self.right() > other.x
            && self.y < other.bottom()
            && self.bottom() > other.y
    }

    /// Area of overlap with `other`, as a fraction of this rect's area
    pub fn intersection_ratio(&self, other: &Rect) -> f32 {
        let w = (self.right().min(other.right()) - self.x.max(other.x)).max(0.0);
        let h = (self.bottom().min(other.bottom()) - self.y.max(other.y)).max(0.0);
        let area = self.width * self.height;
        if area <= 0.0 {
            return 0.0;
        }
        (w * h) / area
    }
}

/// Layout geometry provider for reveal/intersect triggers.
///
/// A headless host returns None for everything; reveal and intersect
/// triggers then simply never fire.
pub trait Geometry {
    /// Element bounds in viewport coordinates (None = not laid out)
    fn bounds(&self, node: NodeId) -> Option<Rect>;
    /// Current viewport rect
    fn viewport(&self) -> Rect;
}

/// Scripted geometry for tests
#[derive(Debug, Default)]
pub struct StubGeometry {
    pub viewport: Rect,
    pub bounds: HashMap<NodeId, Rect>,
}

impl StubGeometry {
    pub fn new(viewport: Rect) -> Self {
        Self { viewport, bounds: HashMap::new() }
    }
}

impl Geometry for StubGeometry {
    fn bounds(&self, node: NodeId) -> Option<Rect> {
        self.bounds.get(&node).copied()
    }

    fn viewport(&self) -> Rect {
        self.viewport
    }
}

/// Geometry provider that reports nothing laid out
#[derive(Debug, Default)]
pub struct NullGeometry;

impl Geometry for NullGeometry {
    fn bounds(&self, _node: NodeId) -> Option<Rect> {
        None
    }

    fn viewport(&self) -> Rect {
        Rect::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_quota() {
        let mut s = MemoryStorage::with_quota(4);
        assert!(s.set("k", "abcd").is_ok());
        assert!(matches!(s.set("k", "abcde"), Err(StorageError::QuotaExceeded)));
        assert_eq!(s.get("k").as_deref(), Some("abcd"));
    }

    #[test]
    fn test_intersection_ratio() {
        let elem = Rect::new(0.0, 50.0, 100.0, 100.0);
        let viewport = Rect::new(0.0, 0.0, 100.0, 100.0);
        assert!(elem.intersects(&viewport));
        assert!((elem.intersection_ratio(&viewport) - 0.5).abs() < 1e-6);

        let offscreen = Rect::new(0.0, 500.0, 100.0, 100.0);
        assert!(!offscreen.intersects(&viewport));
        assert_eq!(offscreen.intersection_ratio(&viewport), 0.0);
    }

    #[test]
    fn test_memory_location() {
        let mut loc = MemoryLocation::new("http://localhost/start");
        loc.push("http://localhost/next");
        assert_eq!(loc.current_url(), "http://localhost/next");
        assert_eq!(loc.pushed.len(), 1);
    }
}

//! Abstract DOM driver boundary.
//!
//! The engine never speaks a browser protocol itself. It consumes a
//! [`DomDriver`] capability provided by the session layer: strategy queries,
//! per-element probes, and frame resolution. Everything here is read-only with
//! respect to the page; the trait has no click/type/scroll surface, so
//! resolution can never cause side effects.
//!
//! [`MockDriver`] is the in-process implementation used by unit tests and the
//! demo example. Its DOM is scripted and mutable from the test body, which
//! makes late-attach and node-replacement scenarios easy to stage.

use crate::descriptor::Strategy;
use crate::result::{EsperarError, EsperarResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use uuid::Uuid;

/// Axis-aligned bounding box in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// X position
    pub x: f64,
    /// Y position
    pub y: f64,
    /// Width
    pub width: f64,
    /// Height
    pub height: f64,
}

impl Rect {
    /// Create a new rect
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Center point of the rect
    #[must_use]
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Opaque reference to a resolved element, bound to one driver session.
///
/// A handle is valid only until the next navigation or driver invalidation.
/// The engine never caches one across a wait boundary. Each wait re-resolves
/// from the descriptor, so DOM replacement (a framework re-render swapping the
/// physical node) surfaces as a fresh handle, not a stale dereference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandleRef {
    id: Uuid,
    node_key: String,
}

impl HandleRef {
    /// Create a handle for the driver node identified by `node_key`.
    ///
    /// Each call mints a fresh handle identity, even for the same node.
    #[must_use]
    pub fn new(node_key: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            node_key: node_key.into(),
        }
    }

    /// Unique identity of this handle (fresh per query)
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Driver's stable key for the underlying logical node
    #[must_use]
    pub fn node_key(&self) -> &str {
        &self.node_key
    }
}

/// Resolved frame boundary, used to scope subsequent queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameScope {
    selector: String,
}

impl FrameScope {
    /// Create a frame scope for `selector`
    #[must_use]
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
        }
    }

    /// Selector that identified the frame
    #[must_use]
    pub fn selector(&self) -> &str {
        &self.selector
    }
}

/// Query scope threaded through resolution as an explicit parameter.
///
/// Holding frame context here, instead of in mutable driver state, means one
/// caller's frame entry can never leak into another caller's concurrent
/// resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryScope {
    /// Frame to query inside; `None` means the main document
    pub frame: Option<FrameScope>,
    /// Element to scope descendant queries under; `None` means the document root
    pub root: Option<HandleRef>,
}

impl QueryScope {
    /// The unscoped main document
    #[must_use]
    pub fn page() -> Self {
        Self::default()
    }

    /// Scope under a frame boundary
    #[must_use]
    pub fn in_frame(frame: FrameScope) -> Self {
        Self {
            frame: Some(frame),
            root: None,
        }
    }

    /// Narrow this scope to descendants of `root`
    #[must_use]
    pub fn under(mut self, root: HandleRef) -> Self {
        self.root = Some(root);
        self
    }
}

/// DOM driver capability consumed by the engine.
///
/// Implementations perform the actual protocol work (CDP, WebDriver, an
/// in-process DOM). All methods are queries; a thrown error means the driver
/// could not answer, not that the element failed a predicate.
#[async_trait]
pub trait DomDriver: Send + Sync {
    /// Query elements matching `value` under `strategy`, inside `scope`
    async fn query(
        &self,
        strategy: Strategy,
        value: &str,
        scope: &QueryScope,
    ) -> EsperarResult<Vec<HandleRef>>;

    /// Whether the element is currently visible
    async fn is_visible(&self, handle: &HandleRef) -> EsperarResult<bool>;

    /// Whether the element is currently enabled
    async fn is_enabled(&self, handle: &HandleRef) -> EsperarResult<bool>;

    /// Bounding box, or `None` while the element has no layout
    async fn bounding_box(&self, handle: &HandleRef) -> EsperarResult<Option<Rect>>;

    /// Text content of the element
    async fn text_content(&self, handle: &HandleRef) -> EsperarResult<String>;

    /// Resolve an iframe/shadow boundary selector into a frame scope
    async fn resolve_frame(&self, selector: &str, scope: &QueryScope) -> EsperarResult<FrameScope>;

    /// Number of live animations/transitions affecting the element
    async fn animations(&self, handle: &HandleRef) -> EsperarResult<usize>;
}

// ============================================================================
// Mock driver
// ============================================================================

/// A scripted DOM node served by [`MockDriver`].
#[derive(Debug, Clone)]
pub struct MockNode {
    key: String,
    selectors: Vec<(Strategy, String)>,
    text: String,
    visible: bool,
    enabled: bool,
    rect: Rect,
    animations: usize,
    frame: Option<String>,
    parent: Option<String>,
}

impl MockNode {
    /// Create a node with a stable key
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            selectors: Vec::new(),
            text: String::new(),
            visible: true,
            enabled: true,
            rect: Rect::new(0.0, 0.0, 100.0, 20.0),
            animations: 0,
            frame: None,
            parent: None,
        }
    }

    /// Register a (strategy, value) pair this node answers to
    #[must_use]
    pub fn matches(mut self, strategy: Strategy, value: impl Into<String>) -> Self {
        self.selectors.push((strategy, value.into()));
        self
    }

    /// Set text content
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Start hidden
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Start disabled
    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Set the bounding box
    #[must_use]
    pub const fn at(mut self, rect: Rect) -> Self {
        self.rect = rect;
        self
    }

    /// Start with `count` live animations
    #[must_use]
    pub const fn animating(mut self, count: usize) -> Self {
        self.animations = count;
        self
    }

    /// Place the node inside the frame identified by `selector`
    #[must_use]
    pub fn in_frame(mut self, selector: impl Into<String>) -> Self {
        self.frame = Some(selector.into());
        self
    }

    /// Make the node a descendant of the node with `parent_key`
    #[must_use]
    pub fn child_of(mut self, parent_key: impl Into<String>) -> Self {
        self.parent = Some(parent_key.into());
        self
    }

    fn answers(&self, strategy: Strategy, value: &str) -> bool {
        if self
            .selectors
            .iter()
            .any(|(s, v)| *s == strategy && v == value)
        {
            return true;
        }
        // Text strategy also matches by containment, like a real text engine.
        strategy == Strategy::Text && !value.is_empty() && self.text.contains(value)
    }
}

#[derive(Debug, Default)]
struct MockDom {
    nodes: Vec<MockNode>,
    frames: Vec<String>,
    unsupported: Vec<Strategy>,
}

impl MockDom {
    fn node(&self, key: &str) -> Option<&MockNode> {
        self.nodes.iter().find(|n| n.key == key)
    }

    fn node_mut(&mut self, key: &str) -> Option<&mut MockNode> {
        self.nodes.iter_mut().find(|n| n.key == key)
    }

    fn is_descendant_of(&self, key: &str, ancestor: &str) -> bool {
        let mut cursor = self.node(key).and_then(|n| n.parent.as_deref());
        while let Some(parent) = cursor {
            if parent == ancestor {
                return true;
            }
            cursor = self.node(parent).and_then(|n| n.parent.as_deref());
        }
        false
    }
}

/// Scripted in-process driver for unit tests and demos.
///
/// The DOM is mutable from the outside while queries run, so tests can stage
/// asynchronous UI behavior: spawn a task, sleep, then flip visibility or
/// insert a node while the engine is polling.
#[derive(Debug, Default)]
pub struct MockDriver {
    dom: Mutex<MockDom>,
    calls: Mutex<Vec<String>>,
}

impl MockDriver {
    /// Create an empty driver
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node to the DOM
    pub fn insert(&self, node: MockNode) {
        self.dom.lock().unwrap().nodes.push(node);
    }

    /// Remove a node; returns true if it existed
    pub fn remove(&self, key: &str) -> bool {
        let mut dom = self.dom.lock().unwrap();
        let before = dom.nodes.len();
        dom.nodes.retain(|n| n.key != key);
        dom.nodes.len() != before
    }

    /// Register a frame boundary
    pub fn add_frame(&self, selector: impl Into<String>) {
        self.dom.lock().unwrap().frames.push(selector.into());
    }

    /// Mark a strategy as unsupported by this driver
    pub fn mark_unsupported(&self, strategy: Strategy) {
        self.dom.lock().unwrap().unsupported.push(strategy);
    }

    /// Flip a node's visibility
    pub fn set_visible(&self, key: &str, visible: bool) {
        if let Some(node) = self.dom.lock().unwrap().node_mut(key) {
            node.visible = visible;
        }
    }

    /// Flip a node's enabled state
    pub fn set_enabled(&self, key: &str, enabled: bool) {
        if let Some(node) = self.dom.lock().unwrap().node_mut(key) {
            node.enabled = enabled;
        }
    }

    /// Move/resize a node
    pub fn set_rect(&self, key: &str, rect: Rect) {
        if let Some(node) = self.dom.lock().unwrap().node_mut(key) {
            node.rect = rect;
        }
    }

    /// Set the number of live animations on a node
    pub fn set_animations(&self, key: &str, count: usize) {
        if let Some(node) = self.dom.lock().unwrap().node_mut(key) {
            node.animations = count;
        }
    }

    /// Replace a node's text content
    pub fn set_text(&self, key: &str, text: impl Into<String>) {
        if let Some(node) = self.dom.lock().unwrap().node_mut(key) {
            node.text = text.into();
        }
    }

    /// Drop the whole DOM, as a navigation would; all handles become stale
    pub fn invalidate(&self) {
        let mut dom = self.dom.lock().unwrap();
        dom.nodes.clear();
        dom.frames.clear();
    }

    /// Recorded driver calls, oldest first
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Check whether any recorded call starts with `prefix`
    #[must_use]
    pub fn was_called(&self, prefix: &str) -> bool {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .any(|c| c.starts_with(prefix))
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn with_node<T>(
        &self,
        handle: &HandleRef,
        f: impl FnOnce(&MockNode) -> T,
    ) -> EsperarResult<T> {
        let dom = self.dom.lock().unwrap();
        dom.node(handle.node_key())
            .map(f)
            .ok_or_else(|| EsperarError::Driver {
                message: format!("stale handle: node {:?} is gone", handle.node_key()),
            })
    }
}

#[async_trait]
impl DomDriver for MockDriver {
    async fn query(
        &self,
        strategy: Strategy,
        value: &str,
        scope: &QueryScope,
    ) -> EsperarResult<Vec<HandleRef>> {
        self.record(format!("query:{}:{value}", strategy.name()));
        let dom = self.dom.lock().unwrap();
        if dom.unsupported.contains(&strategy) {
            return Err(EsperarError::UnsupportedStrategy {
                strategy: strategy.name().to_string(),
            });
        }
        let frame = scope.frame.as_ref().map(FrameScope::selector);
        let handles = dom
            .nodes
            .iter()
            .filter(|n| n.answers(strategy, value))
            .filter(|n| n.frame.as_deref() == frame)
            .filter(|n| match &scope.root {
                Some(root) => dom.is_descendant_of(&n.key, root.node_key()),
                None => true,
            })
            .map(|n| HandleRef::new(&n.key))
            .collect();
        Ok(handles)
    }

    async fn is_visible(&self, handle: &HandleRef) -> EsperarResult<bool> {
        self.with_node(handle, |n| n.visible)
    }

    async fn is_enabled(&self, handle: &HandleRef) -> EsperarResult<bool> {
        self.with_node(handle, |n| n.enabled)
    }

    async fn bounding_box(&self, handle: &HandleRef) -> EsperarResult<Option<Rect>> {
        self.with_node(handle, |n| n.visible.then_some(n.rect))
    }

    async fn text_content(&self, handle: &HandleRef) -> EsperarResult<String> {
        self.with_node(handle, |n| n.text.clone())
    }

    async fn resolve_frame(&self, selector: &str, _scope: &QueryScope) -> EsperarResult<FrameScope> {
        self.record(format!("resolve_frame:{selector}"));
        let dom = self.dom.lock().unwrap();
        if dom.frames.iter().any(|f| f == selector) {
            Ok(FrameScope::new(selector))
        } else {
            Err(EsperarError::FrameNotFound {
                selector: selector.to_string(),
            })
        }
    }

    async fn animations(&self, handle: &HandleRef) -> EsperarResult<usize> {
        self.with_node(handle, |n| n.animations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn button(key: &str, label: &str) -> MockNode {
        MockNode::new(key)
            .matches(Strategy::Css, "button")
            .matches(Strategy::Role, "button")
            .text(label)
    }

    mod handle_tests {
        use super::*;

        #[test]
        fn test_fresh_identity_per_handle() {
            let a = HandleRef::new("node-1");
            let b = HandleRef::new("node-1");
            assert_ne!(a.id(), b.id());
            assert_eq!(a.node_key(), b.node_key());
        }
    }

    mod scope_tests {
        use super::*;

        #[test]
        fn test_page_scope_is_unscoped() {
            let scope = QueryScope::page();
            assert!(scope.frame.is_none());
            assert!(scope.root.is_none());
        }

        #[test]
        fn test_under_narrows_root() {
            let root = HandleRef::new("panel");
            let scope = QueryScope::page().under(root.clone());
            assert_eq!(scope.root, Some(root));
        }
    }

    mod mock_query_tests {
        use super::*;

        #[tokio::test]
        async fn test_query_by_strategy() {
            let driver = MockDriver::new();
            driver.insert(button("save", "Save"));
            driver.insert(button("cancel", "Cancel"));
            driver.insert(MockNode::new("title").matches(Strategy::Css, "h1"));

            let found = driver
                .query(Strategy::Role, "button", &QueryScope::page())
                .await
                .unwrap();
            assert_eq!(found.len(), 2);
        }

        #[tokio::test]
        async fn test_text_strategy_matches_by_containment() {
            let driver = MockDriver::new();
            driver.insert(button("save", "Save changes"));

            let found = driver
                .query(Strategy::Text, "Save", &QueryScope::page())
                .await
                .unwrap();
            assert_eq!(found.len(), 1);
            assert_eq!(found[0].node_key(), "save");
        }

        #[tokio::test]
        async fn test_frame_scoping_partitions_nodes() {
            let driver = MockDriver::new();
            driver.add_frame("iframe#compose");
            driver.insert(button("outer", "Send"));
            driver.insert(button("inner", "Send").in_frame("iframe#compose"));

            let page = driver
                .query(Strategy::Role, "button", &QueryScope::page())
                .await
                .unwrap();
            assert_eq!(page.len(), 1);
            assert_eq!(page[0].node_key(), "outer");

            let frame = driver
                .resolve_frame("iframe#compose", &QueryScope::page())
                .await
                .unwrap();
            let framed = driver
                .query(Strategy::Role, "button", &QueryScope::in_frame(frame))
                .await
                .unwrap();
            assert_eq!(framed.len(), 1);
            assert_eq!(framed[0].node_key(), "inner");
        }

        #[tokio::test]
        async fn test_root_scoping_walks_ancestry() {
            let driver = MockDriver::new();
            driver.insert(MockNode::new("modal").matches(Strategy::Css, "#modal"));
            driver.insert(button("inside", "OK").child_of("modal"));
            driver.insert(button("outside", "OK"));

            let modal = driver
                .query(Strategy::Css, "#modal", &QueryScope::page())
                .await
                .unwrap()
                .remove(0);
            let scoped = driver
                .query(Strategy::Role, "button", &QueryScope::page().under(modal))
                .await
                .unwrap();
            assert_eq!(scoped.len(), 1);
            assert_eq!(scoped[0].node_key(), "inside");
        }

        #[tokio::test]
        async fn test_unsupported_strategy() {
            let driver = MockDriver::new();
            driver.mark_unsupported(Strategy::XPath);
            let err = driver
                .query(Strategy::XPath, "//a", &QueryScope::page())
                .await
                .unwrap_err();
            assert!(matches!(err, EsperarError::UnsupportedStrategy { .. }));
        }

        #[tokio::test]
        async fn test_missing_frame() {
            let driver = MockDriver::new();
            let err = driver
                .resolve_frame("iframe#nope", &QueryScope::page())
                .await
                .unwrap_err();
            assert!(matches!(err, EsperarError::FrameNotFound { .. }));
        }
    }

    mod mock_probe_tests {
        use super::*;

        #[tokio::test]
        async fn test_probes_reflect_mutation() {
            let driver = MockDriver::new();
            driver.insert(button("save", "Save").hidden().disabled());
            let handle = driver
                .query(Strategy::Role, "button", &QueryScope::page())
                .await
                .unwrap()
                .remove(0);

            assert!(!driver.is_visible(&handle).await.unwrap());
            assert!(!driver.is_enabled(&handle).await.unwrap());
            assert!(driver.bounding_box(&handle).await.unwrap().is_none());

            driver.set_visible("save", true);
            driver.set_enabled("save", true);
            assert!(driver.is_visible(&handle).await.unwrap());
            assert!(driver.bounding_box(&handle).await.unwrap().is_some());
        }

        #[tokio::test]
        async fn test_stale_handle_after_removal() {
            let driver = MockDriver::new();
            driver.insert(button("save", "Save"));
            let handle = driver
                .query(Strategy::Role, "button", &QueryScope::page())
                .await
                .unwrap()
                .remove(0);

            assert!(driver.remove("save"));
            let err = driver.is_visible(&handle).await.unwrap_err();
            assert!(matches!(err, EsperarError::Driver { .. }));
        }

        #[tokio::test]
        async fn test_call_recording() {
            let driver = MockDriver::new();
            driver
                .query(Strategy::Css, "#x", &QueryScope::page())
                .await
                .unwrap();
            assert!(driver.was_called("query:css:#x"));
            assert!(!driver.was_called("resolve_frame"));
        }
    }
}

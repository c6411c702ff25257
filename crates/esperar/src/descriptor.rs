//! Descriptor model: immutable, composable descriptions of "which element(s)".
//!
//! A [`LocatorDescriptor`] carries no behavior. Resolution lives in
//! [`crate::resolver`]; the descriptor is pure data that may be shared and
//! reused across concurrent acquisitions. Building a derived descriptor never
//! mutates the original: every builder consumes `self` and returns a new
//! value, and a child holds its own copy of the parent chain.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lookup strategy used to match a descriptor against the DOM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Strategy {
    /// CSS selector (e.g. `button.primary`)
    Css,
    /// XPath expression
    XPath,
    /// Visible text content
    Text,
    /// Accessible role name
    Role,
    /// Test ID attribute (`data-testid`)
    TestId,
    /// Placeholder attribute of an input
    Placeholder,
    /// `alt` text of an image
    AltText,
    /// `title` attribute
    Title,
    /// Associated form label text
    Label,
}

impl Strategy {
    /// Strategy name as used in diagnostics and driver dispatch
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Css => "css",
            Self::XPath => "xpath",
            Self::Text => "text",
            Self::Role => "role",
            Self::TestId => "test-id",
            Self::Placeholder => "placeholder",
            Self::AltText => "alt-text",
            Self::Title => "title",
            Self::Label => "label",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Position selection applied after filtering.
///
/// The variants are mutually exclusive by construction: a descriptor holds at
/// most one `Position`, and the last builder call wins. Absence means "all
/// matches", which strict mode rejects when more than one element remains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Position {
    /// Index 0 of the filtered match set
    First,
    /// Index `count - 1` of the filtered match set
    Last,
    /// Explicit zero-based index
    Index(usize),
}

/// Conjunctive post-filters applied over the raw strategy match set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    /// Keep only elements whose text contains this substring
    pub has_text: Option<String>,
    /// Drop elements whose text contains this substring
    pub has_not_text: Option<String>,
    /// Keep only elements the driver reports as visible
    pub visible_only: bool,
    /// Keep only elements the driver reports as enabled
    pub enabled_only: bool,
}

impl FilterOptions {
    /// Create an empty filter set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require text content to contain `text`
    #[must_use]
    pub fn has_text(mut self, text: impl Into<String>) -> Self {
        self.has_text = Some(text.into());
        self
    }

    /// Exclude elements whose text content contains `text`
    #[must_use]
    pub fn has_not_text(mut self, text: impl Into<String>) -> Self {
        self.has_not_text = Some(text.into());
        self
    }

    /// Require driver-reported visibility
    #[must_use]
    pub const fn visible_only(mut self) -> Self {
        self.visible_only = true;
        self
    }

    /// Require driver-reported enabledness
    #[must_use]
    pub const fn enabled_only(mut self) -> Self {
        self.enabled_only = true;
        self
    }

    /// True when no filter is set
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.has_text.is_none()
            && self.has_not_text.is_none()
            && !self.visible_only
            && !self.enabled_only
    }
}

/// Immutable description of which element(s) to find.
///
/// Descriptors chain through `parent`: a child is scoped inside its parent's
/// single resolved handle, and resolution walks the chain root-first. The
/// `frame` boundary, when set, is entered before the strategy query runs.
///
/// # Example
///
/// ```
/// use esperar::prelude::*;
///
/// let save = LocatorDescriptor::css("#modal")
///     .child(LocatorDescriptor::role("button").with_text("Save"))
///     .described("save button in the settings modal");
/// assert_eq!(save.strategy(), Strategy::Role);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocatorDescriptor {
    strategy: Strategy,
    value: String,
    parent: Option<Box<LocatorDescriptor>>,
    position: Option<Position>,
    filters: FilterOptions,
    frame: Option<String>,
    description: Option<String>,
}

impl LocatorDescriptor {
    /// Create a descriptor from an explicit strategy and value
    #[must_use]
    pub fn new(strategy: Strategy, value: impl Into<String>) -> Self {
        Self {
            strategy,
            value: value.into(),
            parent: None,
            position: None,
            filters: FilterOptions::default(),
            frame: None,
            description: None,
        }
    }

    /// CSS selector descriptor
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::new(Strategy::Css, selector)
    }

    /// XPath expression descriptor
    #[must_use]
    pub fn xpath(expression: impl Into<String>) -> Self {
        Self::new(Strategy::XPath, expression)
    }

    /// Visible-text descriptor
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(Strategy::Text, text)
    }

    /// Accessible-role descriptor
    #[must_use]
    pub fn role(role: impl Into<String>) -> Self {
        Self::new(Strategy::Role, role)
    }

    /// Test ID descriptor (`data-testid`)
    #[must_use]
    pub fn test_id(id: impl Into<String>) -> Self {
        Self::new(Strategy::TestId, id)
    }

    /// Placeholder descriptor
    #[must_use]
    pub fn placeholder(text: impl Into<String>) -> Self {
        Self::new(Strategy::Placeholder, text)
    }

    /// Alt-text descriptor
    #[must_use]
    pub fn alt_text(text: impl Into<String>) -> Self {
        Self::new(Strategy::AltText, text)
    }

    /// Title-attribute descriptor
    #[must_use]
    pub fn title(text: impl Into<String>) -> Self {
        Self::new(Strategy::Title, text)
    }

    /// Form-label descriptor
    #[must_use]
    pub fn label(text: impl Into<String>) -> Self {
        Self::new(Strategy::Label, text)
    }

    /// Scope `child` inside this descriptor; returns the child.
    ///
    /// The parent must resolve to exactly one element at resolution time.
    #[must_use]
    pub fn child(self, child: LocatorDescriptor) -> Self {
        Self {
            parent: Some(Box::new(self)),
            ..child
        }
    }

    /// Scope this descriptor inside `parent`; the mirror of [`Self::child`].
    ///
    /// The parent must resolve to exactly one element at resolution time.
    #[must_use]
    pub fn within(mut self, parent: LocatorDescriptor) -> Self {
        self.parent = Some(Box::new(parent));
        self
    }

    /// Select the first match
    #[must_use]
    pub fn first(mut self) -> Self {
        self.position = Some(Position::First);
        self
    }

    /// Select the last match
    #[must_use]
    pub fn last(mut self) -> Self {
        self.position = Some(Position::Last);
        self
    }

    /// Select the match at a zero-based index
    #[must_use]
    pub fn nth(mut self, index: usize) -> Self {
        self.position = Some(Position::Index(index));
        self
    }

    /// Filter matches by contained text
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.filters.has_text = Some(text.into());
        self
    }

    /// Exclude matches by contained text
    #[must_use]
    pub fn without_text(mut self, text: impl Into<String>) -> Self {
        self.filters.has_not_text = Some(text.into());
        self
    }

    /// Replace the full filter set
    #[must_use]
    pub fn filter(mut self, filters: FilterOptions) -> Self {
        self.filters = filters;
        self
    }

    /// Resolve inside the iframe/shadow boundary named by `selector`
    #[must_use]
    pub fn in_frame(mut self, selector: impl Into<String>) -> Self {
        self.frame = Some(selector.into());
        self
    }

    /// Attach a human-readable label used only for diagnostics
    #[must_use]
    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Lookup strategy
    #[must_use]
    pub const fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Strategy value (selector, expression, text, or role name)
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Parent descriptor, if this one is scoped
    #[must_use]
    pub fn parent(&self) -> Option<&LocatorDescriptor> {
        self.parent.as_deref()
    }

    /// Position selector, if any
    #[must_use]
    pub const fn position(&self) -> Option<Position> {
        self.position
    }

    /// Post-filters
    #[must_use]
    pub const fn filters(&self) -> &FilterOptions {
        &self.filters
    }

    /// Frame boundary selector, if any
    #[must_use]
    pub fn frame(&self) -> Option<&str> {
        self.frame.as_deref()
    }

    /// Diagnostic label, if any
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Number of descriptors in the chain, this one included
    #[must_use]
    pub fn chain_len(&self) -> usize {
        let mut len = 1;
        let mut cursor = self.parent.as_deref();
        while let Some(d) = cursor {
            len += 1;
            cursor = d.parent.as_deref();
        }
        len
    }
}

impl fmt::Display for LocatorDescriptor {
    /// Renders the chain root-first, e.g. `css=#modal >> role=button`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(parent) = &self.parent {
            write!(f, "{parent} >> ")?;
        }
        if let Some(frame) = &self.frame {
            write!(f, "frame={frame} :: ")?;
        }
        write!(f, "{}={}", self.strategy, self.value)?;
        if let Some(text) = &self.filters.has_text {
            write!(f, "[has_text={text:?}]")?;
        }
        match self.position {
            Some(Position::First) => write!(f, ".first")?,
            Some(Position::Last) => write!(f, ".last")?,
            Some(Position::Index(i)) => write!(f, ".nth({i})")?,
            None => {}
        }
        Ok(())
    }
}

//! Strategy resolver: turns a [`LocatorDescriptor`] into live element handles.
//!
//! Resolution is a pure function of (descriptor, DOM-at-this-instant). Nothing
//! is cached between calls; the condition engine re-runs the resolver on every
//! poll tick precisely so that DOM replacement is observed instead of papered
//! over with a stale handle.
//!
//! A chained descriptor resolves root-first: each ancestor must narrow to
//! exactly one element before its child query runs, scoped under that single
//! handle. Frame boundaries are entered via the driver before the strategy
//! query, and the frame context travels in the [`QueryScope`] parameter rather
//! than in driver state.

use crate::descriptor::{FilterOptions, LocatorDescriptor, Position};
use crate::driver::{DomDriver, HandleRef, QueryScope};
use crate::result::{EsperarError, EsperarResult};
use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{debug, trace};

/// Options controlling strictness and empty-set handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Reject multi-element matches that carry no position selector
    pub strict: bool,
    /// Treat an empty match set as [`EsperarError::ElementNotFound`].
    ///
    /// Wait-condition polling turns this off: during a poll, absence is an
    /// unmet condition, not an error.
    pub require_match: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            strict: true,
            require_match: true,
        }
    }
}

impl ResolveOptions {
    /// Strict resolution that errors on an empty match set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow multi-element matches without a position selector
    #[must_use]
    pub const fn lenient(mut self) -> Self {
        self.strict = false;
        self
    }

    /// Return an empty [`ResolvedSet`] instead of erroring when nothing matches
    #[must_use]
    pub const fn allow_empty(mut self) -> Self {
        self.require_match = false;
        self
    }
}

/// Handles produced by one resolution pass, with the descriptor rendering
/// that produced them.
#[derive(Debug, Clone)]
pub struct ResolvedSet {
    descriptor: String,
    handles: Vec<HandleRef>,
}

impl ResolvedSet {
    /// Diagnostic rendering of the source descriptor
    #[must_use]
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    /// Resolved handles, in driver document order
    #[must_use]
    pub fn handles(&self) -> &[HandleRef] {
        &self.handles
    }

    /// Number of handles
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// True when nothing matched
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// First handle, if any
    #[must_use]
    pub fn first(&self) -> Option<&HandleRef> {
        self.handles.first()
    }

    /// Consume the set, yielding the handles
    #[must_use]
    pub fn into_handles(self) -> Vec<HandleRef> {
        self.handles
    }
}

/// Resolve `descriptor` against the current DOM, starting at the main document.
///
/// # Errors
///
/// Returns [`EsperarError::ElementNotFound`] when nothing matches and
/// `require_match` is set, [`EsperarError::ElementAmbiguous`] under strict mode,
/// [`EsperarError::AmbiguousParent`] when an ancestor narrows to more than one
/// element, plus any driver or frame failure from the underlying queries.
pub async fn resolve(
    driver: &dyn DomDriver,
    descriptor: &LocatorDescriptor,
    options: ResolveOptions,
) -> EsperarResult<ResolvedSet> {
    resolve_in(driver, descriptor, options, QueryScope::page()).await
}

/// Resolve `descriptor` within an explicit starting scope.
pub async fn resolve_in(
    driver: &dyn DomDriver,
    descriptor: &LocatorDescriptor,
    options: ResolveOptions,
    scope: QueryScope,
) -> EsperarResult<ResolvedSet> {
    let (handles, _) = select(driver, descriptor, scope).await?;
    debug!(
        descriptor = %descriptor,
        matches = handles.len(),
        "resolution pass complete"
    );

    if options.strict && descriptor.position().is_none() && handles.len() > 1 {
        return Err(EsperarError::ElementAmbiguous {
            count: handles.len(),
            descriptor: descriptor.to_string(),
        });
    }
    if options.require_match && handles.is_empty() {
        return Err(EsperarError::ElementNotFound {
            descriptor: descriptor.to_string(),
        });
    }
    Ok(ResolvedSet {
        descriptor: descriptor.to_string(),
        handles,
    })
}

/// Resolve to exactly one handle.
///
/// Under strict options this is resolution as most callers want it: one
/// element or a typed failure. With `lenient` options, multiple matches
/// collapse to the first in document order.
///
/// # Errors
///
/// Same failures as [`resolve`]; an empty match set is always an error here,
/// regardless of `require_match`.
pub async fn resolve_one(
    driver: &dyn DomDriver,
    descriptor: &LocatorDescriptor,
    options: ResolveOptions,
) -> EsperarResult<HandleRef> {
    let set = resolve_in(driver, descriptor, options, QueryScope::page()).await?;
    set.handles
        .into_iter()
        .next()
        .ok_or_else(|| EsperarError::ElementNotFound {
            descriptor: descriptor.to_string(),
        })
}

/// Walk the chain root-first and produce the filtered, positioned match set
/// for `descriptor` alone, plus the scope its matches live in so children can
/// continue from the same frame context. Strictness is not applied here;
/// ancestors enforce their own exactly-one invariant.
fn select<'a>(
    driver: &'a dyn DomDriver,
    descriptor: &'a LocatorDescriptor,
    scope: QueryScope,
) -> BoxFuture<'a, EsperarResult<(Vec<HandleRef>, QueryScope)>> {
    async move {
        let scope = match descriptor.parent() {
            Some(parent) => {
                let (mut parents, parent_scope) = select(driver, parent, scope).await?;
                match parents.len() {
                    0 => {
                        return Err(EsperarError::ElementNotFound {
                            descriptor: parent.to_string(),
                        })
                    }
                    1 => QueryScope {
                        frame: parent_scope.frame,
                        root: Some(parents.remove(0)),
                    },
                    count => {
                        return Err(EsperarError::AmbiguousParent {
                            count,
                            descriptor: parent.to_string(),
                        })
                    }
                }
            }
            None => scope,
        };

        // Entering a frame starts a fresh document context; an element root
        // from the outer document cannot scope queries inside it.
        let scope = match descriptor.frame() {
            Some(selector) => {
                let frame = driver.resolve_frame(selector, &scope).await?;
                QueryScope::in_frame(frame)
            }
            None => scope,
        };

        let raw = driver
            .query(descriptor.strategy(), descriptor.value(), &scope)
            .await?;
        trace!(
            strategy = %descriptor.strategy(),
            value = descriptor.value(),
            raw_matches = raw.len(),
            "strategy query"
        );

        let filtered = apply_filters(driver, descriptor.filters(), raw).await?;
        let positioned = apply_position(filtered, descriptor.position())?;
        Ok((positioned, scope))
    }
    .boxed()
}

async fn apply_filters(
    driver: &dyn DomDriver,
    filters: &FilterOptions,
    handles: Vec<HandleRef>,
) -> EsperarResult<Vec<HandleRef>> {
    if filters.is_empty() {
        return Ok(handles);
    }
    let mut kept = Vec::with_capacity(handles.len());
    for handle in handles {
        if let Some(text) = &filters.has_text {
            if !driver.text_content(&handle).await?.contains(text.as_str()) {
                continue;
            }
        }
        if let Some(text) = &filters.has_not_text {
            if driver.text_content(&handle).await?.contains(text.as_str()) {
                continue;
            }
        }
        if filters.visible_only && !driver.is_visible(&handle).await? {
            continue;
        }
        if filters.enabled_only && !driver.is_enabled(&handle).await? {
            continue;
        }
        kept.push(handle);
    }
    Ok(kept)
}

fn apply_position(
    mut handles: Vec<HandleRef>,
    position: Option<Position>,
) -> EsperarResult<Vec<HandleRef>> {
    match position {
        None => Ok(handles),
        Some(Position::First) => {
            handles.truncate(1);
            Ok(handles)
        }
        Some(Position::Last) => Ok(handles.pop().into_iter().collect()),
        Some(Position::Index(index)) => {
            if index < handles.len() {
                Ok(vec![handles.swap_remove(index)])
            } else {
                Err(EsperarError::IndexOutOfRange {
                    index,
                    count: handles.len(),
                })
            }
        }
    }
}

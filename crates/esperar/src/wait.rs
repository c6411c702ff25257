//! Condition engine: polling synchronization over descriptors.
//!
//! A [`WaitCondition`] is a named boolean probe over the live DOM. The engine
//! polls it at a fixed interval until it reports true or the budget runs out.
//! Element conditions re-run the resolver on every tick instead of caching a
//! handle, so a framework re-render that swaps the physical node is picked up
//! as soon as the replacement matches the descriptor.
//!
//! A check that errors does not abort the wait. Mid-churn probes routinely
//! fail (stale handle, detached node) and succeed one tick later; the error is
//! logged at debug level and the tick counts as unmet.

use crate::descriptor::LocatorDescriptor;
use crate::driver::{DomDriver, Rect};
use crate::resolver::{self, ResolveOptions};
use crate::result::{EsperarError, EsperarResult};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Default wait budget
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Default interval between condition checks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Timing options for a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Total budget; the first check still runs when this is zero
    pub timeout: Duration,
    /// Pause between checks
    pub poll_interval: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl WaitOptions {
    /// Default timing (5s budget, 50ms poll)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the total budget
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the poll interval
    #[must_use]
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Successful wait: which condition held, and when.
#[derive(Debug, Clone)]
pub struct WaitOutcome {
    /// Name of the condition that held
    pub condition: String,
    /// Index of the satisfied condition within the declared list.
    ///
    /// Zero for single-condition waits and for [`wait_for_all`].
    pub index: usize,
    /// Wall-clock time from wait start to the satisfying check
    pub elapsed: Duration,
}

/// A named boolean probe over the live DOM.
#[async_trait]
pub trait WaitCondition: Send + Sync {
    /// Condition name used in diagnostics and timeout errors
    fn name(&self) -> &str;

    /// Probe the DOM once.
    ///
    /// # Errors
    ///
    /// An error marks this tick as unmet; the engine logs it and keeps polling.
    async fn check(&self, driver: &dyn DomDriver) -> EsperarResult<bool>;

    /// Optional diagnosis logged when the wait times out
    fn failure_hint(&self) -> Option<String> {
        None
    }
}

/// Adapter turning an async closure into a [`WaitCondition`].
///
/// The closure takes no arguments; capture the driver (or whatever state the
/// probe needs) at construction time.
pub struct FnCondition<F> {
    name: String,
    check: F,
}

impl<F> std::fmt::Debug for FnCondition<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnCondition").field("name", &self.name).finish_non_exhaustive()
    }
}

impl<F, Fut> FnCondition<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = EsperarResult<bool>> + Send,
{
    /// Wrap `check` under `name`
    pub fn new(name: impl Into<String>, check: F) -> Self {
        Self {
            name: name.into(),
            check,
        }
    }
}

#[async_trait]
impl<F, Fut> WaitCondition for FnCondition<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = EsperarResult<bool>> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self, _driver: &dyn DomDriver) -> EsperarResult<bool> {
        (self.check)().await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ElementPredicate {
    Attached,
    Visible,
    Hidden,
    Enabled,
    Stable,
}

/// Condition over a descriptor, re-resolved on every check.
#[derive(Debug)]
pub struct ElementCondition {
    name: String,
    descriptor: LocatorDescriptor,
    predicate: ElementPredicate,
    // Bounding box seen on the previous tick; Stable requires two consecutive
    // ticks with an identical box.
    last_rect: Mutex<Option<Rect>>,
}

impl ElementCondition {
    fn new(descriptor: LocatorDescriptor, predicate: ElementPredicate) -> Self {
        let label = match predicate {
            ElementPredicate::Attached => "attached",
            ElementPredicate::Visible => "visible",
            ElementPredicate::Hidden => "hidden",
            ElementPredicate::Enabled => "enabled",
            ElementPredicate::Stable => "stable",
        };
        Self {
            name: format!("{label}({descriptor})"),
            descriptor,
            predicate,
            last_rect: Mutex::new(None),
        }
    }

    /// At least one element matches the descriptor
    #[must_use]
    pub fn attached(descriptor: LocatorDescriptor) -> Self {
        Self::new(descriptor, ElementPredicate::Attached)
    }

    /// The element matches and is visible
    #[must_use]
    pub fn visible(descriptor: LocatorDescriptor) -> Self {
        Self::new(descriptor, ElementPredicate::Visible)
    }

    /// No element matches, or the match is not visible
    #[must_use]
    pub fn hidden(descriptor: LocatorDescriptor) -> Self {
        Self::new(descriptor, ElementPredicate::Hidden)
    }

    /// The element matches and is enabled
    #[must_use]
    pub fn enabled(descriptor: LocatorDescriptor) -> Self {
        Self::new(descriptor, ElementPredicate::Enabled)
    }

    /// The element is visible, animation-free, and its bounding box has not
    /// moved between two consecutive checks
    #[must_use]
    pub fn stable(descriptor: LocatorDescriptor) -> Self {
        Self::new(descriptor, ElementPredicate::Stable)
    }
}

#[async_trait]
impl WaitCondition for ElementCondition {
    fn name(&self) -> &str {
        &self.name
    }

    fn failure_hint(&self) -> Option<String> {
        let hint = match self.predicate {
            ElementPredicate::Attached => "no element ever matched the descriptor",
            ElementPredicate::Visible => "element matched but never became visible",
            ElementPredicate::Hidden => "a matching element stayed visible",
            ElementPredicate::Enabled => "element matched but stayed disabled",
            ElementPredicate::Stable => "element kept moving or animating",
        };
        Some(hint.to_string())
    }

    async fn check(&self, driver: &dyn DomDriver) -> EsperarResult<bool> {
        // Attached and hidden are existence probes and tolerate multi-matches;
        // the single-element predicates keep strict resolution, so an
        // ambiguous tick counts as unmet rather than picking an arbitrary
        // element to probe.
        let resolve_options = match self.predicate {
            ElementPredicate::Attached | ElementPredicate::Hidden => {
                ResolveOptions::new().lenient().allow_empty()
            }
            _ => ResolveOptions::new().allow_empty(),
        };
        let set = resolver::resolve(driver, &self.descriptor, resolve_options).await?;

        match self.predicate {
            ElementPredicate::Attached => return Ok(!set.is_empty()),
            ElementPredicate::Hidden => {
                for handle in set.handles() {
                    if driver.is_visible(handle).await? {
                        return Ok(false);
                    }
                }
                return Ok(true);
            }
            _ => {}
        }

        let handle = match set.first() {
            Some(handle) => handle.clone(),
            None => return Ok(false),
        };

        match self.predicate {
            // Existence predicates returned above.
            ElementPredicate::Attached | ElementPredicate::Hidden => Ok(true),
            ElementPredicate::Visible => driver.is_visible(&handle).await,
            ElementPredicate::Enabled => driver.is_enabled(&handle).await,
            ElementPredicate::Stable => {
                if !driver.is_visible(&handle).await? {
                    *self.last_rect.lock().unwrap() = None;
                    return Ok(false);
                }
                let Some(rect) = driver.bounding_box(&handle).await? else {
                    *self.last_rect.lock().unwrap() = None;
                    return Ok(false);
                };
                let animating = driver.animations(&handle).await? > 0;
                let mut last = self.last_rect.lock().unwrap();
                let settled = !animating && *last == Some(rect);
                *last = Some(rect);
                Ok(settled)
            }
        }
    }
}

/// Poll `condition` until it holds or `options.timeout` elapses.
///
/// # Errors
///
/// [`EsperarError::ConditionTimeout`] when the budget runs out. Check errors
/// never surface; they are logged and polled past.
pub async fn satisfy(
    driver: &dyn DomDriver,
    condition: &dyn WaitCondition,
    options: WaitOptions,
) -> EsperarResult<WaitOutcome> {
    let start = Instant::now();
    loop {
        match condition.check(driver).await {
            Ok(true) => {
                let elapsed = start.elapsed();
                debug!(condition = condition.name(), ?elapsed, "condition held");
                return Ok(WaitOutcome {
                    condition: condition.name().to_string(),
                    index: 0,
                    elapsed,
                });
            }
            Ok(false) => trace!(condition = condition.name(), "condition unmet"),
            Err(error) => debug!(
                condition = condition.name(),
                %error,
                "check failed, treating tick as unmet"
            ),
        }
        if start.elapsed() >= options.timeout {
            if let Some(hint) = condition.failure_hint() {
                debug!(condition = condition.name(), %hint, "wait diagnosis");
            }
            return Err(timeout_error(condition.name(), start));
        }
        tokio::time::sleep(options.poll_interval).await;
    }
}

/// Poll until any condition holds; ties within one tick break to the lowest
/// declared index.
///
/// Conditions are checked sequentially in declaration order on every tick, so
/// "first declared" and "first checked" coincide and the winner is
/// deterministic even when several conditions became true between ticks.
///
/// # Errors
///
/// [`EsperarError::ConditionTimeout`] naming every condition when none held
/// within the budget.
pub async fn wait_for_any(
    driver: &dyn DomDriver,
    conditions: &[&dyn WaitCondition],
    options: WaitOptions,
) -> EsperarResult<WaitOutcome> {
    let label = joined_name("any", conditions);
    let start = Instant::now();
    loop {
        for (index, condition) in conditions.iter().enumerate() {
            match condition.check(driver).await {
                Ok(true) => {
                    return Ok(WaitOutcome {
                        condition: condition.name().to_string(),
                        index,
                        elapsed: start.elapsed(),
                    })
                }
                Ok(false) => {}
                Err(error) => debug!(
                    condition = condition.name(),
                    %error,
                    "check failed, treating tick as unmet"
                ),
            }
        }
        if start.elapsed() >= options.timeout {
            return Err(timeout_error(&label, start));
        }
        tokio::time::sleep(options.poll_interval).await;
    }
}

/// Poll until every condition holds within a single tick.
///
/// Simultaneity is required: conditions that are each true at different times
/// but never together do not satisfy this wait.
///
/// # Errors
///
/// [`EsperarError::ConditionTimeout`] naming every condition when the set was
/// never simultaneously true within the budget.
pub async fn wait_for_all(
    driver: &dyn DomDriver,
    conditions: &[&dyn WaitCondition],
    options: WaitOptions,
) -> EsperarResult<WaitOutcome> {
    let label = joined_name("all", conditions);
    let start = Instant::now();
    loop {
        let mut all_held = true;
        for condition in conditions {
            let held = match condition.check(driver).await {
                Ok(held) => held,
                Err(error) => {
                    debug!(
                        condition = condition.name(),
                        %error,
                        "check failed, treating tick as unmet"
                    );
                    false
                }
            };
            if !held {
                all_held = false;
                break;
            }
        }
        if all_held {
            return Ok(WaitOutcome {
                condition: label,
                index: 0,
                elapsed: start.elapsed(),
            });
        }
        if start.elapsed() >= options.timeout {
            return Err(timeout_error(&label, start));
        }
        tokio::time::sleep(options.poll_interval).await;
    }
}

fn joined_name(kind: &str, conditions: &[&dyn WaitCondition]) -> String {
    let names: Vec<&str> = conditions.iter().map(|c| c.name()).collect();
    format!("{kind}({})", names.join(", "))
}

fn timeout_error(condition: &str, start: Instant) -> EsperarError {
    EsperarError::ConditionTimeout {
        condition: condition.to_string(),
        elapsed_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
    }
}

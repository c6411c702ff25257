//! Target acquisition: the synchronization step an action runs before it
//! touches an element.
//!
//! [`acquire`] composes the three lower layers. It waits for the descriptor to
//! attach, resolves it strictly, then waits for the required target state,
//! re-resolving on every tick. The whole sequence runs under the retry
//! executor so transient driver failures (stale handle mid-render, detached
//! node) restart the sequence instead of surfacing to the caller.
//!
//! Terminal failures are classified into the four public classes a test author
//! acts on: element never matched, match was ambiguous, element never reached
//! the required state, or the frame boundary was missing. The retry wrapper is
//! an implementation detail and is unwrapped from those.

use crate::descriptor::LocatorDescriptor;
use crate::driver::{DomDriver, HandleRef};
use crate::resolver::{self, ResolveOptions};
use crate::result::{EsperarError, EsperarResult};
use crate::retry::{self, RetryPolicy};
use crate::wait::{self, ElementCondition, WaitCondition, WaitOptions};
use std::time::{Duration, Instant};
use tracing::debug;

/// State the target must reach before an action may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    /// Present in the DOM
    Attached,
    /// Present and visible
    Visible,
    /// Present and enabled
    Enabled,
    /// Present, visible, animation-free, and not moving
    Stable,
}

impl TargetState {
    fn condition(self, descriptor: LocatorDescriptor) -> ElementCondition {
        match self {
            Self::Attached => ElementCondition::attached(descriptor),
            Self::Visible => ElementCondition::visible(descriptor),
            Self::Enabled => ElementCondition::enabled(descriptor),
            Self::Stable => ElementCondition::stable(descriptor),
        }
    }
}

/// Phase of an acquisition, used to tag diagnostics.
///
/// Each acquisition walks `Idle -> Resolving -> ConditionPending -> Ready` (or
/// `Failed`); nothing carries over between calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquirePhase {
    /// Not started
    Idle,
    /// Waiting for attachment and strict-resolving the match set
    Resolving,
    /// Waiting for the required target state
    ConditionPending,
    /// Final handle produced
    Ready,
    /// Terminal failure classified
    Failed,
}

impl AcquirePhase {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Resolving => "resolving",
            Self::ConditionPending => "condition_pending",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }
}

/// Options for one acquisition.
#[derive(Debug, Clone, Copy)]
pub struct AcquireOptions {
    /// Wait timing shared by the presence and settling phases
    pub wait: WaitOptions,
    /// Strictness of the resolution phase
    pub resolve: ResolveOptions,
    /// Retry shape for transient failures.
    ///
    /// The time budget is always overridden with `wait.timeout`; an
    /// acquisition has exactly one deadline.
    pub retry: RetryPolicy,
}

impl Default for AcquireOptions {
    fn default() -> Self {
        Self {
            wait: WaitOptions::default(),
            resolve: ResolveOptions::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl AcquireOptions {
    /// Default options (5s budget, 50ms poll, strict)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the overall deadline
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.wait = self.wait.timeout(timeout);
        self
    }

    /// Set the poll interval
    #[must_use]
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.wait = self.wait.poll_interval(interval);
        self
    }

    /// Replace the resolution options
    #[must_use]
    pub const fn resolve(mut self, resolve: ResolveOptions) -> Self {
        self.resolve = resolve;
        self
    }

    /// Replace the retry shape
    #[must_use]
    pub const fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// A successfully acquired target.
#[derive(Debug, Clone)]
pub struct Acquisition {
    /// Handle resolved after the target state held
    pub handle: HandleRef,
    /// Name of the condition that admitted the target
    pub condition: String,
    /// Wall-clock time from call to acquisition
    pub elapsed: Duration,
}

/// Acquire `descriptor` once it reaches `state`.
///
/// # Errors
///
/// [`EsperarError::ElementNotFound`] when nothing ever matched within the
/// budget, [`EsperarError::ElementAmbiguous`] on a strict multi-match,
/// [`EsperarError::ConditionTimeout`] when the element matched but never
/// reached `state`, and [`EsperarError::FrameNotFound`] for a missing frame
/// boundary.
pub async fn acquire(
    driver: &dyn DomDriver,
    descriptor: &LocatorDescriptor,
    state: TargetState,
    options: AcquireOptions,
) -> EsperarResult<Acquisition> {
    let condition = state.condition(descriptor.clone());
    acquire_with(driver, descriptor, &condition, options).await
}

/// Acquire `descriptor` once `condition` holds.
///
/// The condition replaces the settling phase; presence and strict resolution
/// still run first, so the handle handed back is known to match the
/// descriptor unambiguously.
///
/// # Errors
///
/// Same classification as [`acquire`].
pub async fn acquire_with(
    driver: &dyn DomDriver,
    descriptor: &LocatorDescriptor,
    condition: &dyn WaitCondition,
    options: AcquireOptions,
) -> EsperarResult<Acquisition> {
    let start = Instant::now();
    let policy = options.retry.budget(options.wait.timeout);

    let result = retry::run(policy, move || async move {
        attempt(driver, descriptor, condition, options, start).await
    })
    .await
    .map_err(classify);

    match &result {
        Ok(acquisition) => debug!(
            phase = AcquirePhase::Ready.as_str(),
            descriptor = %descriptor,
            condition = %acquisition.condition,
            elapsed = ?acquisition.elapsed,
            "target acquired"
        ),
        Err(error) => debug!(
            phase = AcquirePhase::Failed.as_str(),
            descriptor = %descriptor,
            %error,
            "acquisition failed"
        ),
    }
    result
}

async fn attempt(
    driver: &dyn DomDriver,
    descriptor: &LocatorDescriptor,
    condition: &dyn WaitCondition,
    options: AcquireOptions,
    start: Instant,
) -> EsperarResult<Acquisition> {
    let deadline = options.wait.timeout;
    let remaining = || deadline.saturating_sub(start.elapsed());
    let presence = ElementCondition::attached(descriptor.clone());

    debug!(
        phase = AcquirePhase::Resolving.as_str(),
        descriptor = %descriptor,
        "waiting for attachment"
    );
    if let Err(EsperarError::ConditionTimeout { .. }) =
        wait::satisfy(driver, &presence, options.wait.timeout(remaining())).await
    {
        // One direct resolution for a precise diagnosis: missing element,
        // missing frame, or an ambiguity the lenient presence probe hid.
        resolver::resolve_one(driver, descriptor, options.resolve).await?;
        // Attached after all; carry on with whatever budget is left.
    }

    debug!(
        phase = AcquirePhase::Resolving.as_str(),
        descriptor = %descriptor,
        "strict resolution"
    );
    resolver::resolve_one(driver, descriptor, options.resolve).await?;

    debug!(
        phase = AcquirePhase::ConditionPending.as_str(),
        condition = condition.name(),
        "waiting for target state"
    );
    let outcome = wait::satisfy(driver, condition, options.wait.timeout(remaining())).await?;

    // The settling wait may have outlived the handle checked above; the one
    // handed to the caller is resolved after the state held.
    let handle = resolver::resolve_one(driver, descriptor, options.resolve).await?;
    Ok(Acquisition {
        handle,
        condition: outcome.condition,
        elapsed: start.elapsed(),
    })
}

/// Unwrap the retry envelope when its cause is one of the public failure
/// classes; anything else keeps the envelope for its attempt accounting.
fn classify(error: EsperarError) -> EsperarError {
    match error {
        EsperarError::RetryExhausted {
            attempts,
            elapsed_ms,
            source,
        } => {
            if matches!(
                *source,
                EsperarError::ElementNotFound { .. }
                    | EsperarError::ElementAmbiguous { .. }
                    | EsperarError::ConditionTimeout { .. }
                    | EsperarError::FrameNotFound { .. }
            ) {
                *source
            } else {
                EsperarError::RetryExhausted {
                    attempts,
                    elapsed_ms,
                    source,
                }
            }
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Strategy;
    use crate::driver::{MockDriver, MockNode};
    use std::sync::Arc;

    fn fast() -> AcquireOptions {
        AcquireOptions::new()
            .timeout(Duration::from_millis(800))
            .poll_interval(Duration::from_millis(10))
    }

    fn save_button() -> MockNode {
        MockNode::new("save")
            .matches(Strategy::Role, "button")
            .text("Save")
    }

    #[tokio::test]
    async fn test_acquire_ready_target() {
        let driver = MockDriver::new();
        driver.insert(save_button());

        let acquisition = acquire(
            &driver,
            &LocatorDescriptor::role("button"),
            TargetState::Visible,
            fast(),
        )
        .await
        .unwrap();
        assert_eq!(acquisition.handle.node_key(), "save");
        assert!(acquisition.condition.starts_with("visible("));
        assert!(acquisition.elapsed < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_late_attach_acquires_near_attach_time() {
        let driver = Arc::new(MockDriver::new());
        let mutator = Arc::clone(&driver);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(60)).await;
            mutator.insert(save_button());
        });

        let acquisition = acquire(
            driver.as_ref(),
            &LocatorDescriptor::role("button"),
            TargetState::Visible,
            fast(),
        )
        .await
        .unwrap();
        assert!(acquisition.elapsed >= Duration::from_millis(50));
        assert!(acquisition.elapsed < Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_never_matching_spends_budget_then_not_found() {
        let driver = MockDriver::new();
        let before = Instant::now();
        let err = acquire(
            &driver,
            &LocatorDescriptor::css("#ghost"),
            TargetState::Visible,
            fast().timeout(Duration::from_millis(80)),
        )
        .await
        .unwrap_err();
        assert!(before.elapsed() >= Duration::from_millis(80));
        match err {
            EsperarError::ElementNotFound { descriptor } => {
                assert!(descriptor.contains("#ghost"));
            }
            other => panic!("expected ElementNotFound, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_strict_ambiguity_surfaces_with_count() {
        let driver = MockDriver::new();
        driver.insert(save_button());
        driver.insert(
            MockNode::new("cancel")
                .matches(Strategy::Role, "button")
                .text("Cancel"),
        );
        driver.insert(
            MockNode::new("close")
                .matches(Strategy::Role, "button")
                .text("Close"),
        );

        let err = acquire(
            &driver,
            &LocatorDescriptor::role("button"),
            TargetState::Visible,
            fast(),
        )
        .await
        .unwrap_err();
        match err {
            EsperarError::ElementAmbiguous { count, .. } => assert_eq!(count, 3),
            other => panic!("expected ElementAmbiguous, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_attached_but_never_visible_times_out_as_condition() {
        let driver = MockDriver::new();
        driver.insert(save_button().hidden());

        let err = acquire(
            &driver,
            &LocatorDescriptor::role("button"),
            TargetState::Visible,
            fast().timeout(Duration::from_millis(100)),
        )
        .await
        .unwrap_err();
        match err {
            EsperarError::ConditionTimeout { condition, .. } => {
                assert!(condition.starts_with("visible("));
            }
            other => panic!("expected ConditionTimeout, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_enabled_state_waits_for_flip() {
        let driver = Arc::new(MockDriver::new());
        driver.insert(save_button().disabled());

        let mutator = Arc::clone(&driver);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            mutator.set_enabled("save", true);
        });

        let acquisition = acquire(
            driver.as_ref(),
            &LocatorDescriptor::role("button"),
            TargetState::Enabled,
            fast(),
        )
        .await
        .unwrap();
        assert!(acquisition.elapsed >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_missing_frame_is_a_public_failure() {
        let driver = MockDriver::new();
        let err = acquire(
            &driver,
            &LocatorDescriptor::css("#send").in_frame("iframe#gone"),
            TargetState::Attached,
            fast().timeout(Duration::from_millis(80)),
        )
        .await
        .unwrap_err();
        match err {
            EsperarError::FrameNotFound { selector } => {
                assert_eq!(selector, "iframe#gone");
            }
            other => panic!("expected FrameNotFound, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_acquire_with_custom_condition() {
        let driver = Arc::new(MockDriver::new());
        driver.insert(save_button().text("Saving..."));

        let mutator = Arc::clone(&driver);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            mutator.set_text("save", "Saved");
        });

        let probe = Arc::clone(&driver);
        let settled = crate::wait::FnCondition::new("save settled", move || {
            let probe = Arc::clone(&probe);
            async move {
                let set = resolver::resolve(
                    probe.as_ref(),
                    &LocatorDescriptor::role("button"),
                    ResolveOptions::new().allow_empty(),
                )
                .await?;
                match set.first() {
                    Some(handle) => Ok(probe.text_content(handle).await? == "Saved"),
                    None => Ok(false),
                }
            }
        });

        let acquisition = acquire_with(
            driver.as_ref(),
            &LocatorDescriptor::role("button"),
            &settled,
            fast(),
        )
        .await
        .unwrap();
        assert_eq!(acquisition.condition, "save settled");
        assert!(acquisition.elapsed >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_handle_is_resolved_after_state_holds() {
        // The node is replaced while settling; the returned handle must point
        // at the replacement.
        let driver = Arc::new(MockDriver::new());
        driver.insert(save_button().hidden());

        let mutator = Arc::clone(&driver);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            mutator.remove("save");
            mutator.insert(
                MockNode::new("save-v2")
                    .matches(Strategy::Role, "button")
                    .text("Save"),
            );
        });

        let acquisition = acquire(
            driver.as_ref(),
            &LocatorDescriptor::role("button"),
            TargetState::Visible,
            fast(),
        )
        .await
        .unwrap();
        assert_eq!(acquisition.handle.node_key(), "save-v2");
        assert!(driver.is_visible(&acquisition.handle).await.unwrap());
    }
}

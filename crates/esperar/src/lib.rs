//! Esperar: element resolution and synchronization for browser-test automation
//!
//! Esperar (Spanish: "to wait") decides which element a test step targets and
//! when that element is ready to be acted on. It owns no browser protocol;
//! the session layer hands it a [`DomDriver`] and gets back handles that are
//! resolved fresh, synchronized, and unambiguous.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     ESPERAR Architecture                      │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌────────────┐   ┌────────────┐   ┌────────────┐            │
//! │  │ Descriptor │──►│ Resolver   │──►│ Condition  │            │
//! │  │ (pure data)│   │ (per tick) │   │ Engine     │            │
//! │  └────────────┘   └────────────┘   └─────┬──────┘            │
//! │                                          │                   │
//! │  ┌────────────┐   ┌────────────┐   ┌─────▼──────┐            │
//! │  │ DomDriver  │◄──│ Retry      │◄──│ Acquire    │            │
//! │  │ (abstract) │   │ Executor   │   │ Dispatcher │            │
//! │  └────────────┘   └────────────┘   └────────────┘            │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use esperar::prelude::*;
//!
//! # async fn run(driver: &dyn DomDriver) -> EsperarResult<()> {
//! let save = LocatorDescriptor::css("#settings")
//!     .child(LocatorDescriptor::role("button").with_text("Save"));
//!
//! let target = acquire(driver, &save, TargetState::Stable, AcquireOptions::new()).await?;
//! println!("ready after {:?}", target.elapsed);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

pub mod acquire;
pub mod descriptor;
pub mod driver;
pub mod resolver;
pub mod result;
pub mod retry;
pub mod wait;

pub use acquire::{acquire, acquire_with, AcquireOptions, AcquirePhase, Acquisition, TargetState};
pub use descriptor::{FilterOptions, LocatorDescriptor, Position, Strategy};
pub use driver::{DomDriver, FrameScope, HandleRef, MockDriver, MockNode, QueryScope, Rect};
pub use resolver::{resolve, resolve_in, resolve_one, ResolveOptions, ResolvedSet};
pub use result::{EsperarError, EsperarResult};
pub use retry::{run as with_retry, Backoff, RetryPolicy};
pub use wait::{
    satisfy, wait_for_any, wait_for_all, ElementCondition, FnCondition, WaitCondition,
    WaitOptions, WaitOutcome, DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT,
};

/// Common imports for test authors
pub mod prelude {
    pub use super::acquire::{
        acquire, acquire_with, AcquireOptions, Acquisition, TargetState,
    };
    pub use super::descriptor::{FilterOptions, LocatorDescriptor, Position, Strategy};
    pub use super::driver::{
        DomDriver, FrameScope, HandleRef, MockDriver, MockNode, QueryScope, Rect,
    };
    pub use super::resolver::{resolve, resolve_one, ResolveOptions, ResolvedSet};
    pub use super::result::{EsperarError, EsperarResult};
    pub use super::retry::{Backoff, RetryPolicy};
    pub use super::wait::{
        satisfy, wait_for_any, wait_for_all, ElementCondition, FnCondition, WaitCondition,
        WaitOptions, WaitOutcome,
    };
}

//! Acquisition walkthrough against a scripted DOM.
//!
//! Stages a page where a settings modal opens late, its save button starts
//! disabled, and the button node is swapped by a re-render mid-wait. The
//! acquisition still lands on the right element because every tick re-resolves
//! from the descriptor.
//!
//! Run with: `cargo run --example acquire_demo`

use esperar::prelude::*;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> EsperarResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "esperar=debug".into()),
        )
        .init();

    let driver = Arc::new(MockDriver::new());
    driver.insert(MockNode::new("app").matches(Strategy::Css, "#app"));

    // The page script: modal opens after 150ms, its save button attaches
    // disabled, gets swapped by a re-render, then enables.
    let page = Arc::clone(&driver);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        page.insert(MockNode::new("modal").matches(Strategy::Css, "#settings"));
        page.insert(
            MockNode::new("save-v1")
                .matches(Strategy::Role, "button")
                .text("Save")
                .child_of("modal")
                .disabled(),
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        page.remove("save-v1");
        page.insert(
            MockNode::new("save-v2")
                .matches(Strategy::Role, "button")
                .text("Save")
                .child_of("modal")
                .disabled(),
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        page.set_enabled("save-v2", true);
    });

    let save = LocatorDescriptor::css("#settings")
        .child(LocatorDescriptor::role("button").with_text("Save"))
        .described("save button in the settings modal");
    println!("acquiring: {save}");

    let options = AcquireOptions::new()
        .timeout(Duration::from_secs(2))
        .poll_interval(Duration::from_millis(20));
    let target = acquire(driver.as_ref(), &save, TargetState::Enabled, options).await?;

    println!(
        "acquired {} via {} after {:?}",
        target.handle.node_key(),
        target.condition,
        target.elapsed
    );

    // A descriptor that never matches spends its budget and reports what was
    // missing, not a bare timeout.
    let ghost = LocatorDescriptor::test_id("ghost");
    let err = acquire(
        driver.as_ref(),
        &ghost,
        TargetState::Visible,
        AcquireOptions::new().timeout(Duration::from_millis(300)),
    )
    .await
    .unwrap_err();
    println!("ghost acquisition failed as expected: {err}");

    Ok(())
}

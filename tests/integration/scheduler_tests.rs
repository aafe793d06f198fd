use super::*;
use alivewater_monitor::session::AuthOutcome;
use alivewater_monitor::{CycleScheduler, ExitStatus};

#[tokio::test]
async fn test_scheduled_cycle_notifies_and_commits() -> anyhow::Result<()> {
    let harness = TestHarness::new();
    harness.set_sales(&[sale_row("1001")]);
    harness.set_terminals(&[]);

    CycleScheduler::run_scheduled_cycle(Arc::clone(&harness.monitor)).await;

    assert_eq!(harness.sink.sent().len(), RECIPIENTS.len());
    assert_eq!(harness.monitor.store().load().last_sales.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_scheduler_survives_failing_cycles() -> anyhow::Result<()> {
    let harness = TestHarness::new();
    harness.dashboard.set_auth(AuthOutcome::Timeout);

    CycleScheduler::run_scheduled_cycle(Arc::clone(&harness.monitor)).await;
    harness.dashboard.fail_launch();
    CycleScheduler::run_scheduled_cycle(Arc::clone(&harness.monitor)).await;

    let status = harness.monitor.status().await;
    assert_eq!(status.status.cycles_run, 2);
    assert_eq!(status.status.auth_failures, 1);
    assert_eq!(status.status.cycles_failed, 1);
    assert_eq!(status.status.last_status, Some(ExitStatus::FatalError));
    Ok(())
}

#[tokio::test]
async fn test_run_on_start_triggers_first_cycle() -> anyhow::Result<()> {
    let harness = TestHarness::with_config(|config| {
        config.scheduler.run_on_start = true;
        config.scheduler.interval_secs = 3600;
    });
    harness.set_sales(&[]);
    harness.set_terminals(&[]);

    let mut scheduler = CycleScheduler::new(Arc::clone(&harness.monitor)).await?;
    scheduler.start().await?;

    let monitor = Arc::clone(&harness.monitor);
    let ran = wait_for_condition(
        || {
            let monitor = Arc::clone(&monitor);
            async move { monitor.status().await.status.cycles_run > 0 }
        },
        10,
    )
    .await;

    scheduler.shutdown().await?;
    assert!(ran);
    assert_eq!(harness.dashboard.opened(), 1);
    Ok(())
}

/// Helper to wait for async operations
async fn wait_for_condition<F, Fut>(mut condition: F, timeout_seconds: u64) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = std::time::Instant::now();
    let timeout = Duration::from_secs(timeout_seconds);

    while start.elapsed() < timeout {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    false
}

//! Watchdog supervisor
//!
//! A dedicated task alternating two timers: the cycle timer triggers a
//! ping round, the grace timer triggers the check that reaps every client
//! still awaiting a pong. The task holds no state of its own; liveness
//! lives in the client registry and is mutated only by the control task,
//! which receives `WatchdogCycle`/`WatchdogCheck` inputs from here.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::WatchdogConfig;
use crate::dispatch::ControlInput;

/// Spawn the watchdog timer task. Returns `None` when disabled.
///
/// The task exits when the control task goes away (send fails).
pub fn spawn_watchdog(
    config: &WatchdogConfig,
    control_tx: mpsc::Sender<ControlInput>,
) -> Option<JoinHandle<()>> {
    if !config.enabled {
        debug!("watchdog disabled");
        return None;
    }

    let cycle = Duration::from_millis(config.cycle_ms);
    let grace = Duration::from_millis(config.grace_ms);

    Some(tokio::spawn(async move {
        loop {
            tokio::time::sleep(cycle).await;
            if control_tx.send(ControlInput::WatchdogCycle).await.is_err() {
                break;
            }
            tokio::time::sleep(grace).await;
            if control_tx.send(ControlInput::WatchdogCheck).await.is_err() {
                break;
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn alternates_cycle_and_check() {
        let (tx, mut rx) = mpsc::channel(8);
        let config = WatchdogConfig {
            enabled: true,
            cycle_ms: 2000,
            grace_ms: 500,
        };
        let handle = spawn_watchdog(&config, tx).unwrap();

        assert!(matches!(rx.recv().await, Some(ControlInput::WatchdogCycle)));
        assert!(matches!(rx.recv().await, Some(ControlInput::WatchdogCheck)));
        assert!(matches!(rx.recv().await, Some(ControlInput::WatchdogCycle)));

        handle.abort();
    }

    #[tokio::test]
    async fn disabled_watchdog_spawns_nothing() {
        let (tx, _rx) = mpsc::channel(8);
        let config = WatchdogConfig {
            enabled: false,
            cycle_ms: 1,
            grace_ms: 1,
        };
        assert!(spawn_watchdog(&config, tx).is_none());
    }

    #[tokio::test]
    async fn exits_when_control_is_gone() {
        let (tx, rx) = mpsc::channel(8);
        let config = WatchdogConfig {
            enabled: true,
            cycle_ms: 1,
            grace_ms: 1,
        };
        let handle = spawn_watchdog(&config, tx).unwrap();
        drop(rx);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("watchdog task should exit")
            .unwrap();
    }
}

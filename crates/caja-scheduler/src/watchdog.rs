//! # Watchdog
//!
//! A second timer that keeps the automation loop alive. If the loop should
//! be running but its timer task has ended (panic, abort), the watchdog
//! spawns a fresh one. It never cancels a tick already in progress.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::automation::AutomationLoop;

pub struct Watchdog {
    automation: AutomationLoop,
    interval: Duration,
}

impl Watchdog {
    pub fn new(automation: AutomationLoop, interval: Duration) -> Self {
        Watchdog {
            automation,
            interval,
        }
    }

    /// One inspection. Returns whether the loop was restarted.
    pub async fn check_once(&self) -> bool {
        self.automation.revive_if_dead().await
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    pub async fn run(self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so the loop gets to start
        interval.tick().await;

        info!(interval_secs = self.interval.as_secs(), "Watchdog started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Watchdog shutting down");
                    break;
                }
                _ = interval.tick() => {
                    if !self.check_once().await {
                        debug!("Automation loop healthy");
                    }
                }
            }
        }
    }
}

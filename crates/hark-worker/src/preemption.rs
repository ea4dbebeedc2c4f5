//! Spot interruption monitoring.
//!
//! One background task per job polls the instance metadata service for
//! a spot interruption notice. When a notice arrives the monitor
//! shortens the active lease so the queue re-offers the job to another
//! host before this one terminates, then stops polling. The pipeline
//! itself is never aborted; a run that outlives its lease just produces
//! a redundant result.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use hark_queue::{JobQueue, Lease};

use crate::error::{WorkerError, WorkerResult};
use crate::metrics;

const TOKEN_TTL_SECS: &str = "21600";

/// Spot interruption notice, as served by the metadata service.
#[derive(Debug, Clone, Deserialize)]
pub struct InstanceAction {
    pub action: String,
    pub time: DateTime<Utc>,
}

impl InstanceAction {
    pub fn is_termination(&self) -> bool {
        self.action == "terminate"
    }
}

/// Seconds from `now` until `at`, clamped at zero.
pub fn seconds_until(at: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    (at - now).num_seconds().max(0) as u64
}

/// Fetch an IMDSv2 session token.
pub async fn fetch_imds_token(client: &reqwest::Client, base_url: &str) -> WorkerResult<String> {
    let response = client
        .put(format!("{}/latest/api/token", base_url))
        .header("X-aws-ec2-metadata-token-ttl-seconds", TOKEN_TTL_SECS)
        .send()
        .await
        .map_err(|e| WorkerError::metadata_failed(e.to_string()))?;

    if !response.status().is_success() {
        return Err(WorkerError::metadata_failed(format!(
            "token request returned {}",
            response.status()
        )));
    }

    response
        .text()
        .await
        .map_err(|e| WorkerError::metadata_failed(e.to_string()))
}

/// Probe for a spot interruption notice. `None` means no notice yet.
pub async fn probe_instance_action(
    client: &reqwest::Client,
    base_url: &str,
) -> WorkerResult<Option<InstanceAction>> {
    let token = fetch_imds_token(client, base_url).await?;
    let response = client
        .get(format!("{}/latest/meta-data/spot/instance-action", base_url))
        .header("X-aws-ec2-metadata-token", token)
        .send()
        .await
        .map_err(|e| WorkerError::metadata_failed(e.to_string()))?;

    let status = response.status();
    if status.is_success() {
        let action = response
            .json::<InstanceAction>()
            .await
            .map_err(|e| WorkerError::metadata_failed(e.to_string()))?;
        Ok(Some(action))
    } else if status == reqwest::StatusCode::NOT_FOUND {
        // No notice outstanding
        Ok(None)
    } else {
        debug!("Interruption probe returned {}", status);
        Ok(None)
    }
}

/// Handle to a running interruption monitor.
///
/// The monitor makes a single armed-to-fired transition: once a
/// termination notice is observed it records the time, hands the lease
/// back, and stops. It never un-fires.
pub struct PreemptionMonitor {
    handle: JoinHandle<()>,
    rx: watch::Receiver<Option<DateTime<Utc>>>,
}

impl PreemptionMonitor {
    /// Spawn a monitor guarding the given lease.
    pub fn start(
        client: reqwest::Client,
        base_url: String,
        interval: Duration,
        queue: JobQueue,
        lease: Lease,
    ) -> Self {
        let (tx, rx) = watch::channel(None);
        let handle = tokio::spawn(async move {
            poll_until_notice(client, base_url, interval, queue, lease, tx).await;
        });
        Self { handle, rx }
    }

    /// Announced termination time, once a notice has been observed.
    pub fn termination_time(&self) -> Option<DateTime<Utc>> {
        *self.rx.borrow()
    }

    /// Stop polling and reap the task.
    pub async fn stop(self) {
        self.handle.abort();
        let _ = self.handle.await;
    }
}

async fn poll_until_notice(
    client: reqwest::Client,
    base_url: String,
    interval: Duration,
    queue: JobQueue,
    lease: Lease,
    tx: watch::Sender<Option<DateTime<Utc>>>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        match probe_instance_action(&client, &base_url).await {
            Ok(Some(action)) if action.is_termination() => {
                warn!("Spot instance scheduled for termination at {}", action.time);
                metrics::record_preemption_notice();
                let _ = tx.send(Some(action.time));

                // Hand the job back before the host disappears. A failed
                // visibility change only delays redelivery, so ignore it.
                let remaining = seconds_until(action.time, Utc::now());
                if let Err(e) = queue.extend(&lease, Duration::from_secs(remaining)).await {
                    debug!(
                        "Ignoring visibility change failure after interruption notice: {}",
                        e
                    );
                }
                return;
            }
            Ok(_) => {}
            Err(e) => {
                debug!("Interruption check failed: {}", e);
            }
        }
    }
}

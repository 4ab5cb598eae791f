use crate::k8s::dynamic::KubeResourceClient;
use crate::k8s::observe::{ClientError, ResourceKind, Snapshot};
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::serde_json;
use std::fmt;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Readiness as reported by the pod's `Ready` condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodHealth {
    Ready,
    NotReady,
    Unknown,
}

impl fmt::Display for PodHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => write!(f, "Ready"),
            Self::NotReady => write!(f, "Not Ready"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

#[must_use]
pub fn summarize_pod_status(pod: &Pod) -> PodHealth {
    let ready = pod
        .status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .and_then(|conditions| conditions.iter().find(|c| c.type_ == "Ready"));

    match ready.map(|c| c.status.as_str()) {
        Some("True") => PodHealth::Ready,
        Some("False") => PodHealth::NotReady,
        _ => PodHealth::Unknown,
    }
}

fn pod_from_snapshot(snapshot: Snapshot) -> Result<Pod, ClientError> {
    serde_json::from_value(snapshot.into_value()).map_err(|e| ClientError::Decode(e.to_string()))
}

/// Name and health of every pod matching `label_selector`
///
/// # Errors
///
/// Will return `Err` if the pods cannot be listed
pub async fn pod_health(
    client: &KubeResourceClient,
    namespace: Option<&str>,
    label_selector: Option<&str>,
) -> Result<Vec<(String, PodHealth)>, ClientError> {
    let snapshots = client
        .list(&ResourceKind::pods(), namespace, label_selector)
        .await?;

    snapshots
        .into_iter()
        .map(|snapshot| {
            let pod = pod_from_snapshot(snapshot)?;
            let name = pod.metadata.name.clone().unwrap_or_else(|| "unknown".to_string());
            Ok((name, summarize_pod_status(&pod)))
        })
        .collect()
}

/// Print the health of matching pods every `every` until cancelled.
///
/// A failed listing is logged and retried on the next tick. Returns the number
/// of listings that succeeded.
pub async fn monitor_pod_health(
    client: &KubeResourceClient,
    namespace: Option<&str>,
    label_selector: Option<&str>,
    every: Duration,
    cancel: &CancellationToken,
) -> u32 {
    info!(
        "🩺 Monitoring pod health in {} every {:?}",
        namespace.unwrap_or("all namespaces"),
        every
    );

    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut rounds = 0;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let listed = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            listed = pod_health(client, namespace, label_selector) => listed,
        };

        match listed {
            Ok(pods) => {
                rounds += 1;
                for (name, health) in pods {
                    println!("Pod {name}: {health}");
                }
            }
            Err(e) => warn!("❌ Error listing pods: {}", e),
        }
    }

    info!("🛑 Pod health monitor stopped after {} listings", rounds);
    rounds
}

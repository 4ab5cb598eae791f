use crate::k8s::observe::{EventKind, Snapshot};
use chrono::{Duration, Utc};
use std::collections::BTreeMap;

fn format_labels(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<String>>()
        .join(",")
}

/// Age of the object since its creation timestamp, e.g. `3h`
#[must_use]
pub fn snapshot_age(snapshot: &Snapshot) -> String {
    snapshot.creation_timestamp().map_or_else(String::new, |created| {
        format_duration(Utc::now().signed_duration_since(created))
    })
}

/// One-line description: `Name: web, Namespace: default, Labels: app=web`
#[must_use]
pub fn describe_snapshot(snapshot: &Snapshot) -> String {
    format!(
        "Name: {}, Namespace: {}, Labels: {}",
        snapshot.name().unwrap_or("<unnamed>"),
        snapshot.namespace().unwrap_or("<cluster>"),
        format_labels(&snapshot.labels())
    )
}

/// One-line description of a core `Event` object:
/// `Warning BackOff Pod/web-1: Back-off restarting failed container`
#[must_use]
pub fn describe_cluster_event(snapshot: &Snapshot) -> String {
    let text = |path: &str| {
        snapshot
            .pointer(path)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    };

    let message = text("/message")
        .replace("combined from similar events", "combined ")
        .trim()
        .trim_end_matches(':')
        .to_string();

    format!(
        "{} {} {}/{}: {}",
        text("/type"),
        text("/reason"),
        text("/involvedObject/kind"),
        text("/involvedObject/name"),
        message
    )
}

/// Print a change as `[ADDED] Name: ..., Namespace: ..., Labels: ...`
///
/// # Errors
///
/// Never fails; the signature matches a watch handler.
pub fn print_change(kind: &EventKind, snapshot: &Snapshot) -> anyhow::Result<()> {
    println!("[{kind}] {}", describe_snapshot(snapshot));
    Ok(())
}

/// Print a core `Event` change as `[ADDED] Warning BackOff Pod/web-1: ...`
///
/// # Errors
///
/// Never fails; the signature matches a watch handler.
pub fn print_cluster_event(kind: &EventKind, snapshot: &Snapshot) -> anyhow::Result<()> {
    println!("[{kind}] {}", describe_cluster_event(snapshot));
    Ok(())
}

#[must_use]
pub fn format_duration(duration: Duration) -> String {
    if duration.num_days() > 0 {
        format!("{}d", duration.num_days())
    } else if duration.num_hours() > 0 {
        format!("{}h", duration.num_hours())
    } else if duration.num_minutes() > 0 {
        format!("{}m", duration.num_minutes())
    } else {
        format!("{}s", duration.num_seconds())
    }
}

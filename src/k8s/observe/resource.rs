/**
 * Resource addressing and observed object state
 *
 * Everything the observation core passes around: which kind of object,
 * which object, what it looked like and what happened to it.
 */
use chrono::{DateTime, Utc};
use k8s_openapi::serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Well-known kinds: (short names, plural, version, group, kind)
const KNOWN_KINDS: &[(&[&str], &str, &str, &str, &str)] = &[
    (&["po", "pod"], "pods", "v1", "", "Pod"),
    (&["svc", "service"], "services", "v1", "", "Service"),
    (&["cm", "configmap"], "configmaps", "v1", "", "ConfigMap"),
    (&["secret"], "secrets", "v1", "", "Secret"),
    (&["ev", "event"], "events", "v1", "", "Event"),
    (&["ns", "namespace"], "namespaces", "v1", "", "Namespace"),
    (&["no", "node"], "nodes", "v1", "", "Node"),
    (&["deploy", "deployment"], "deployments", "v1", "apps", "Deployment"),
    (&["rs", "replicaset"], "replicasets", "v1", "apps", "ReplicaSet"),
    (&["sts", "statefulset"], "statefulsets", "v1", "apps", "StatefulSet"),
    (&["ds", "daemonset"], "daemonsets", "v1", "apps", "DaemonSet"),
    (&["job"], "jobs", "v1", "batch", "Job"),
];

/// Core and well-known types that live outside any namespace
const CLUSTER_SCOPED: &[(&str, &str)] = &[
    ("", "namespaces"),
    ("", "nodes"),
    ("", "persistentvolumes"),
    ("apiextensions.k8s.io", "customresourcedefinitions"),
    ("rbac.authorization.k8s.io", "clusterroles"),
    ("rbac.authorization.k8s.io", "clusterrolebindings"),
    ("storage.k8s.io", "storageclasses"),
];

/// The type of object being observed (group, version, kind and URL plural)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKind {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub plural: String,
}

impl ResourceKind {
    #[must_use]
    pub fn new(group: &str, version: &str, kind: &str, plural: &str) -> Self {
        Self {
            group: group.to_string(),
            version: version.to_string(),
            kind: kind.to_string(),
            plural: plural.to_string(),
        }
    }

    #[must_use]
    pub fn pods() -> Self {
        Self::new("", "v1", "Pod", "pods")
    }

    #[must_use]
    pub fn deployments() -> Self {
        Self::new("apps", "v1", "Deployment", "deployments")
    }

    #[must_use]
    pub fn events() -> Self {
        Self::new("", "v1", "Event", "events")
    }

    /// Whether objects of this type are addressed without a namespace
    #[must_use]
    pub fn is_cluster_scoped(&self) -> bool {
        CLUSTER_SCOPED
            .iter()
            .any(|(group, plural)| self.group == *group && self.plural == *plural)
    }

    /// `v1` for the core group, `group/version` otherwise
    #[must_use]
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}.{}", self.plural, self.version)
        } else {
            write!(f, "{}.{}.{}", self.plural, self.version, self.group)
        }
    }
}

/// Guess a PascalCase kind from a plural for types outside the well-known table
fn kind_from_plural(plural: &str) -> String {
    let singular = plural
        .strip_suffix("ies")
        .map(|stem| format!("{stem}y"))
        .or_else(|| plural.strip_suffix("ses").map(|stem| format!("{stem}s")))
        .or_else(|| plural.strip_suffix('s').map(ToString::to_string))
        .unwrap_or_else(|| plural.to_string());
    let mut chars = singular.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

impl FromStr for ResourceKind {
    type Err = String;

    /// Accepts a well-known name (`pods`, `deploy`, `cm`, ...) or
    /// `plural.version` / `plural.version.group`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        if s.is_empty() {
            return Err("resource type must not be empty".to_string());
        }

        for (shorts, plural, version, group, kind) in KNOWN_KINDS {
            if *plural == s || shorts.contains(&s.as_str()) {
                return Ok(Self::new(group, version, kind, plural));
            }
        }

        match s.split_once('.') {
            Some((plural, rest)) if !plural.is_empty() && !rest.is_empty() => {
                let (version, group) = rest.split_once('.').unwrap_or((rest, ""));
                if version.is_empty() {
                    return Err(format!("missing version in resource type '{s}'"));
                }
                Ok(Self::new(group, version, &kind_from_plural(plural), plural))
            }
            _ => Err(format!(
                "unknown resource type '{s}', use plural.version[.group] for other types"
            )),
        }
    }
}

/// Address of a single object
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceIdentity {
    pub kind: ResourceKind,
    /// `None` for cluster-scoped objects
    pub namespace: Option<String>,
    pub name: String,
}

impl ResourceIdentity {
    #[must_use]
    pub fn new(kind: ResourceKind, namespace: Option<&str>, name: &str) -> Self {
        Self {
            kind,
            namespace: namespace.map(ToString::to_string),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} {}/{}", self.kind, ns, self.name),
            None => write!(f, "{} {}", self.kind, self.name),
        }
    }
}

/// Full serialized state of an object at the moment it was observed
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot(Value);

impl Snapshot {
    #[must_use]
    pub const fn new(value: Value) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn as_value(&self) -> &Value {
        &self.0
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        self.0
    }

    /// Look up a nested field by JSON pointer, e.g. `/status/readyReplicas`
    #[must_use]
    pub fn pointer(&self, path: &str) -> Option<&Value> {
        self.0.pointer(path)
    }

    fn metadata(&self) -> Option<&Map<String, Value>> {
        self.0.get("metadata").and_then(Value::as_object)
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.metadata()?.get("name")?.as_str()
    }

    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.metadata()?.get("namespace")?.as_str()
    }

    #[must_use]
    pub fn kind(&self) -> Option<&str> {
        self.0.get("kind")?.as_str()
    }

    #[must_use]
    pub fn labels(&self) -> BTreeMap<String, String> {
        self.metadata()
            .and_then(|meta| meta.get("labels"))
            .and_then(Value::as_object)
            .map(|labels| {
                labels
                    .iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    #[must_use]
    pub fn creation_timestamp(&self) -> Option<DateTime<Utc>> {
        let raw = self.metadata()?.get("creationTimestamp")?.as_str()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|ts| ts.with_timezone(&Utc))
    }
}

impl From<Value> for Snapshot {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// What happened to an object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Added,
    Modified,
    Deleted,
    /// Anything else the server sent (bookmarks and future types), with its raw label
    Unknown(String),
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added => write!(f, "ADDED"),
            Self::Modified => write!(f, "MODIFIED"),
            Self::Deleted => write!(f, "DELETED"),
            Self::Unknown(raw) => write!(f, "{raw}"),
        }
    }
}

/// One entry of a change stream
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub kind: EventKind,
    pub snapshot: Snapshot,
}

impl ChangeEvent {
    #[must_use]
    pub const fn new(kind: EventKind, snapshot: Snapshot) -> Self {
        Self { kind, snapshot }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::serde_json::json;

    #[test]
    fn test_parse_well_known_kinds() {
        let deploy: ResourceKind = "deploy".parse().unwrap();
        assert_eq!(deploy, ResourceKind::deployments());
        assert_eq!(deploy.api_version(), "apps/v1");

        let pods: ResourceKind = "Pods".parse().unwrap();
        assert_eq!(pods.api_version(), "v1");
        assert_eq!(pods.kind, "Pod");
    }

    #[test]
    fn test_parse_qualified_kinds() {
        let crd: ResourceKind = "certificates.v1.cert-manager.io".parse().unwrap();
        assert_eq!(crd.group, "cert-manager.io");
        assert_eq!(crd.version, "v1");
        assert_eq!(crd.plural, "certificates");
        assert_eq!(crd.kind, "Certificate");
        assert_eq!(crd.to_string(), "certificates.v1.cert-manager.io");

        let policies: ResourceKind = "networkpolicies.v1.networking.k8s.io".parse().unwrap();
        assert_eq!(policies.group, "networking.k8s.io");
        assert_eq!(policies.kind, "Networkpolicy");

        let core: ResourceKind = "limitranges.v1".parse().unwrap();
        assert_eq!(core.group, "");
        assert_eq!(core.api_version(), "v1");
    }

    #[test]
    fn test_cluster_scope() {
        assert!("nodes".parse::<ResourceKind>().unwrap().is_cluster_scoped());
        assert!("ns".parse::<ResourceKind>().unwrap().is_cluster_scoped());
        assert!(!ResourceKind::pods().is_cluster_scoped());
        assert!(!ResourceKind::deployments().is_cluster_scoped());
    }

    #[test]
    fn test_parse_rejects_unknown_bare_names() {
        assert!("widgets".parse::<ResourceKind>().is_err());
        assert!("".parse::<ResourceKind>().is_err());
        assert!("widgets.".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn test_snapshot_accessors() {
        let snapshot = Snapshot::new(json!({
            "kind": "Pod",
            "metadata": {
                "name": "echo-1",
                "namespace": "default",
                "creationTimestamp": "2024-01-02T03:04:05Z",
                "labels": { "app": "echo", "tier": "web" }
            },
            "status": { "ready": true }
        }));

        assert_eq!(snapshot.name(), Some("echo-1"));
        assert_eq!(snapshot.namespace(), Some("default"));
        assert_eq!(snapshot.kind(), Some("Pod"));
        assert_eq!(snapshot.labels().get("app").map(String::as_str), Some("echo"));
        assert_eq!(snapshot.pointer("/status/ready"), Some(&json!(true)));
        assert!(snapshot.creation_timestamp().is_some());
    }

    #[test]
    fn test_snapshot_without_metadata() {
        let snapshot = Snapshot::new(json!({ "spec": {} }));
        assert_eq!(snapshot.name(), None);
        assert!(snapshot.labels().is_empty());
    }
}

//! Common predicates to wait for.
//!
//! Conditions are plain functions over a [`Snapshot`]; anything implementing
//! `Fn(&Snapshot) -> bool` is a [`Condition`] and can be combined with
//! [`Condition::and`], [`Condition::or`] and [`Condition::not`].

use super::resource::Snapshot;
use k8s_openapi::serde_json::Value;
use std::str::FromStr;

pub trait Condition {
    fn matches(&self, snapshot: &Snapshot) -> bool;

    /// Holds if `self` does not
    fn not(self) -> Not<Self>
    where
        Self: Sized,
    {
        Not(self)
    }

    /// Holds if `self` and `other` both do
    fn and<Other: Condition>(self, other: Other) -> And<Self, Other>
    where
        Self: Sized,
    {
        And(self, other)
    }

    /// Holds if either `self` or `other` does
    fn or<Other: Condition>(self, other: Other) -> Or<Self, Other>
    where
        Self: Sized,
    {
        Or(self, other)
    }
}

impl<F: Fn(&Snapshot) -> bool> Condition for F {
    fn matches(&self, snapshot: &Snapshot) -> bool {
        self(snapshot)
    }
}

pub struct Not<A>(A);

impl<A: Condition> Condition for Not<A> {
    fn matches(&self, snapshot: &Snapshot) -> bool {
        !self.0.matches(snapshot)
    }
}

pub struct And<A, B>(A, B);

impl<A: Condition, B: Condition> Condition for And<A, B> {
    fn matches(&self, snapshot: &Snapshot) -> bool {
        self.0.matches(snapshot) && self.1.matches(snapshot)
    }
}

pub struct Or<A, B>(A, B);

impl<A: Condition, B: Condition> Condition for Or<A, B> {
    fn matches(&self, snapshot: &Snapshot) -> bool {
        self.0.matches(snapshot) || self.1.matches(snapshot)
    }
}

/// The field at `pointer` is the boolean `true`
#[must_use]
pub fn field_is_true(pointer: &str) -> impl Fn(&Snapshot) -> bool + Send + Sync + 'static {
    let pointer = pointer.to_string();
    move |snapshot: &Snapshot| snapshot.pointer(&pointer) == Some(&Value::Bool(true))
}

/// The field at `pointer` equals `expected`. Strings compare against string
/// values; numbers and booleans compare against their JSON rendering.
#[must_use]
pub fn field_equals(
    pointer: &str,
    expected: &str,
) -> impl Fn(&Snapshot) -> bool + Send + Sync + 'static {
    let pointer = pointer.to_string();
    let expected = expected.to_string();
    move |snapshot: &Snapshot| match snapshot.pointer(&pointer) {
        Some(Value::String(s)) => *s == expected,
        Some(Value::Null) | None => false,
        Some(other) => other.to_string() == expected,
    }
}

/// `status.conditions[type == condition_type].status == "True"`
#[must_use]
pub fn status_condition(
    condition_type: &str,
) -> impl Fn(&Snapshot) -> bool + Send + Sync + 'static {
    let condition_type = condition_type.to_string();
    move |snapshot: &Snapshot| {
        snapshot
            .pointer("/status/conditions")
            .and_then(Value::as_array)
            .and_then(|conditions| {
                conditions.iter().find(|c| {
                    c.get("type").and_then(Value::as_str) == Some(condition_type.as_str())
                })
            })
            .and_then(|c| c.get("status"))
            .and_then(Value::as_str)
            == Some("True")
    }
}

/// A Deployment whose `Available` condition is true
#[must_use]
pub fn deployment_available() -> impl Fn(&Snapshot) -> bool + Send + Sync + 'static {
    status_condition("Available")
}

/// A Pod whose `Ready` condition is true
#[must_use]
pub fn pod_ready() -> impl Fn(&Snapshot) -> bool + Send + Sync + 'static {
    status_condition("Ready")
}

/// A condition given on the command line with `--for`
///
/// * `ready`, `available`: the matching status condition
/// * `condition=Type`: any status condition
/// * `field=/json/pointer`: the field is `true`
/// * `jsonpath=/json/pointer=value`: the field equals `value`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitFor {
    Condition(String),
    FieldTrue(String),
    FieldEquals { pointer: String, value: String },
}

impl WaitFor {
    #[must_use]
    pub fn into_predicate(self) -> Box<dyn Fn(&Snapshot) -> bool + Send + Sync> {
        match self {
            Self::Condition(condition_type) => Box::new(status_condition(&condition_type)),
            Self::FieldTrue(pointer) => Box::new(field_is_true(&pointer)),
            Self::FieldEquals { pointer, value } => Box::new(field_equals(&pointer, &value)),
        }
    }
}

fn check_pointer(pointer: &str) -> Result<String, String> {
    if pointer.starts_with('/') {
        Ok(pointer.to_string())
    } else {
        Err(format!("field path '{pointer}' must be a JSON pointer starting with '/'"))
    }
}

impl FromStr for WaitFor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            None => match s.to_lowercase().as_str() {
                "ready" => Ok(Self::Condition("Ready".to_string())),
                "available" => Ok(Self::Condition("Available".to_string())),
                _ => Err(format!("unknown condition '{s}'")),
            },
            Some(("condition", condition_type)) if !condition_type.is_empty() => {
                Ok(Self::Condition(condition_type.to_string()))
            }
            Some(("field", pointer)) => Ok(Self::FieldTrue(check_pointer(pointer)?)),
            Some(("jsonpath", rest)) => {
                let (pointer, value) = rest
                    .split_once('=')
                    .ok_or_else(|| format!("expected jsonpath=/path=value, got '{s}'"))?;
                Ok(Self::FieldEquals {
                    pointer: check_pointer(pointer)?,
                    value: value.to_string(),
                })
            }
            _ => Err(format!("unknown condition '{s}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::serde_json::json;

    fn deployment(available: &str) -> Snapshot {
        Snapshot::new(json!({
            "metadata": { "name": "web" },
            "status": {
                "readyReplicas": 3,
                "phase": "Running",
                "available": true,
                "conditions": [
                    { "type": "Progressing", "status": "True" },
                    { "type": "Available", "status": available }
                ]
            }
        }))
    }

    #[test]
    fn test_status_conditions() {
        assert!(deployment_available()(&deployment("True")));
        assert!(!deployment_available()(&deployment("False")));
        assert!(!pod_ready()(&deployment("True")));
    }

    #[test]
    fn test_field_conditions() {
        let snapshot = deployment("True");
        assert!(field_is_true("/status/available")(&snapshot));
        assert!(!field_is_true("/status/missing")(&snapshot));
        assert!(field_equals("/status/phase", "Running")(&snapshot));
        assert!(field_equals("/status/readyReplicas", "3")(&snapshot));
        assert!(!field_equals("/status/readyReplicas", "2")(&snapshot));
    }

    #[test]
    fn test_combinators() {
        let snapshot = deployment("True");
        let available = deployment_available();
        let ready = pod_ready();
        assert!(available.matches(&snapshot));
        assert!(!(deployment_available().and(pod_ready())).matches(&snapshot));
        assert!((deployment_available().or(pod_ready())).matches(&snapshot));
        assert!(ready.not().matches(&snapshot));
    }

    #[test]
    fn test_parse_wait_for() {
        assert_eq!(
            "ready".parse::<WaitFor>().unwrap(),
            WaitFor::Condition("Ready".into())
        );
        assert_eq!(
            "condition=Complete".parse::<WaitFor>().unwrap(),
            WaitFor::Condition("Complete".into())
        );
        assert_eq!(
            "field=/status/ready".parse::<WaitFor>().unwrap(),
            WaitFor::FieldTrue("/status/ready".into())
        );
        assert_eq!(
            "jsonpath=/status/phase=Running".parse::<WaitFor>().unwrap(),
            WaitFor::FieldEquals {
                pointer: "/status/phase".into(),
                value: "Running".into()
            }
        );
        assert!("field=status.ready".parse::<WaitFor>().is_err());
        assert!("jsonpath=/status/phase".parse::<WaitFor>().is_err());
        assert!("bogus".parse::<WaitFor>().is_err());
    }

    #[test]
    fn test_wait_for_predicate() {
        let predicate = "available".parse::<WaitFor>().unwrap().into_predicate();
        assert!(predicate(&deployment("True")));
        assert!(!predicate(&deployment("False")));
    }
}

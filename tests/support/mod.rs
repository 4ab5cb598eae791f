#![allow(dead_code)]

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use k8s_openapi::serde_json::json;
use kubeobs::k8s::observe::{
    ChangeEvent, ClientError, EventKind, EventStream, ResourceClient, ResourceIdentity,
    ResourceKind, Snapshot,
};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

type StreamItem = Result<ChangeEvent, ClientError>;

/// What the next `open_stream` call does
#[derive(Clone)]
pub enum OpenStep {
    /// Return this error
    Fail(ClientError),
    /// Never finish opening
    Hang,
    /// Open, yield these items, then close
    Close(Vec<StreamItem>),
    /// Open, yield these items, stay quiet for the given time, then close
    CloseAfter(Duration, Vec<StreamItem>),
    /// Open, yield these items, then stay open without further events
    Idle(Vec<StreamItem>),
}

/// What the next `fetch` call does
#[derive(Clone)]
pub enum FetchStep {
    Found(Snapshot),
    Missing,
    Fail(ClientError),
    Hang,
}

/// A resource client that replays a script. The last step of each script
/// repeats once the others are used up.
pub struct ScriptedClient {
    started: Instant,
    opens: Mutex<VecDeque<OpenStep>>,
    fetches: Mutex<VecDeque<FetchStep>>,
    open_calls: Mutex<Vec<Duration>>,
    fetch_calls: Mutex<Vec<Duration>>,
}

fn next_step<T: Clone>(script: &Mutex<VecDeque<T>>) -> Option<T> {
    let mut script = script.lock().unwrap();
    if script.len() > 1 {
        script.pop_front()
    } else {
        script.front().cloned()
    }
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            opens: Mutex::new(VecDeque::new()),
            fetches: Mutex::new(VecDeque::new()),
            open_calls: Mutex::new(Vec::new()),
            fetch_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_opens(self, steps: impl IntoIterator<Item = OpenStep>) -> Self {
        self.opens.lock().unwrap().extend(steps);
        self
    }

    pub fn with_fetches(self, steps: impl IntoIterator<Item = FetchStep>) -> Self {
        self.fetches.lock().unwrap().extend(steps);
        self
    }

    /// Offsets from construction at which `open_stream` was called
    pub fn open_calls(&self) -> Vec<Duration> {
        self.open_calls.lock().unwrap().clone()
    }

    /// Offsets from construction at which `fetch` was called
    pub fn fetch_calls(&self) -> Vec<Duration> {
        self.fetch_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResourceClient for ScriptedClient {
    async fn open_stream(
        &self,
        _kind: &ResourceKind,
        _namespace: Option<&str>,
        _label_selector: Option<&str>,
        _field_selector: Option<&str>,
    ) -> Result<EventStream, ClientError> {
        self.open_calls.lock().unwrap().push(self.started.elapsed());

        match next_step(&self.opens).unwrap_or(OpenStep::Hang) {
            OpenStep::Fail(e) => Err(e),
            OpenStep::Hang => std::future::pending().await,
            OpenStep::Close(items) => Ok(stream::iter(items).boxed()),
            OpenStep::CloseAfter(quiet, items) => {
                let close = stream::once(tokio::time::sleep(quiet))
                    .filter_map(|()| futures::future::ready(None::<StreamItem>));
                Ok(stream::iter(items).chain(close).boxed())
            }
            OpenStep::Idle(items) => Ok(stream::iter(items).chain(stream::pending()).boxed()),
        }
    }

    async fn fetch(&self, identity: &ResourceIdentity) -> Result<Snapshot, ClientError> {
        self.fetch_calls.lock().unwrap().push(self.started.elapsed());

        match next_step(&self.fetches).unwrap_or(FetchStep::Missing) {
            FetchStep::Found(snapshot) => Ok(snapshot),
            FetchStep::Missing => Err(ClientError::NotFound {
                resource: identity.to_string(),
            }),
            FetchStep::Fail(e) => Err(e),
            FetchStep::Hang => std::future::pending().await,
        }
    }
}

pub fn pod(name: &str) -> Snapshot {
    Snapshot::new(json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": { "name": name, "namespace": "default" }
    }))
}

pub fn deployment(name: &str, available: bool) -> Snapshot {
    Snapshot::new(json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": { "name": name, "namespace": "default" },
        "status": { "available": available }
    }))
}

pub fn event(kind: EventKind, name: &str) -> Result<ChangeEvent, ClientError> {
    Ok(ChangeEvent::new(kind, pod(name)))
}

pub fn connection_refused() -> ClientError {
    ClientError::Connection("connection refused".to_string())
}

pub fn forbidden() -> ClientError {
    ClientError::api(403, "Forbidden", "pods is forbidden")
}

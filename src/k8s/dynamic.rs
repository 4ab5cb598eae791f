/**
 * Kubernetes-backed resource client
 *
 * Works on any resource type through `Api<DynamicObject>`. Watches run in their
 * own task and forward events through a bounded channel, so a slow consumer
 * slows down reading from the API server instead of buffering without limit.
 */
use crate::k8s::observe::config::WATCH_TIMEOUT_SECONDS;
use crate::k8s::observe::{
    ChangeEvent, ClientError, EventKind, EventStream, ResourceClient, ResourceIdentity,
    ResourceKind, Snapshot,
};
use async_trait::async_trait;
use futures::{StreamExt, pin_mut};
use k8s_openapi::serde_json::{self, json};
use kube::api::{
    Api, ApiResource, DeleteParams, DynamicObject, GroupVersionKind, ListParams, TypeMeta,
    WatchEvent, WatchParams,
};
use kube::Client;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

/// Events buffered between the watch task and the dispatcher
pub const EVENT_CHANNEL_CAPACITY: usize = 16;

#[must_use]
pub fn api_resource(kind: &ResourceKind) -> ApiResource {
    ApiResource::from_gvk_with_plural(
        &GroupVersionKind::gvk(&kind.group, &kind.version, &kind.kind),
        &kind.plural,
    )
}

/// Map a kube error to the observation error taxonomy
#[must_use]
pub fn classify(error: kube::Error) -> ClientError {
    match error {
        kube::Error::Api(response) => ClientError::Api {
            code: response.code,
            reason: response.reason,
            message: response.message,
        },
        kube::Error::SerdeError(e) => ClientError::Decode(e.to_string()),
        kube::Error::BuildRequest(e) => ClientError::InvalidRequest(e.to_string()),
        kube::Error::Auth(e) => ClientError::InvalidRequest(format!("auth error: {e}")),
        other => ClientError::Connection(other.to_string()),
    }
}

fn to_snapshot(object: &DynamicObject) -> Result<Snapshot, ClientError> {
    serde_json::to_value(object)
        .map(Snapshot::new)
        .map_err(|e| ClientError::Decode(e.to_string()))
}

/// The API server reports an unserved type as a 404 status line on the watch
/// response, which arrives as the first stream item.
fn to_change_event(
    item: Result<WatchEvent<DynamicObject>, kube::Error>,
    resource: &str,
) -> Result<ChangeEvent, ClientError> {
    let event = item.map_err(|e| match e {
        kube::Error::Api(response) if response.code == 404 => {
            ClientError::UnknownResource(resource.to_string())
        }
        other => classify(other),
    })?;

    match event {
        WatchEvent::Added(object) => Ok(ChangeEvent::new(EventKind::Added, to_snapshot(&object)?)),
        WatchEvent::Modified(object) => {
            Ok(ChangeEvent::new(EventKind::Modified, to_snapshot(&object)?))
        }
        WatchEvent::Deleted(object) => {
            Ok(ChangeEvent::new(EventKind::Deleted, to_snapshot(&object)?))
        }
        WatchEvent::Bookmark(bookmark) => Ok(ChangeEvent::new(
            EventKind::Unknown("BOOKMARK".to_string()),
            Snapshot::new(json!({
                "metadata": { "resourceVersion": bookmark.metadata.resource_version }
            })),
        )),
        WatchEvent::Error(response) => Err(ClientError::Api {
            code: response.code,
            reason: response.reason,
            message: response.message,
        }),
    }
}

/// Resource client over a shared `kube::Client`
#[derive(Clone)]
pub struct KubeResourceClient {
    client: Client,
}

impl KubeResourceClient {
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, kind: &ResourceKind, namespace: Option<&str>) -> Api<DynamicObject> {
        let resource = api_resource(kind);
        let namespace = namespace.filter(|_| !kind.is_cluster_scoped());
        namespace.map_or_else(
            || Api::all_with(self.client.clone(), &resource),
            |ns| Api::namespaced_with(self.client.clone(), ns, &resource),
        )
    }

    /// List objects of `kind`, optionally filtered by a label selector
    ///
    /// # Errors
    ///
    /// Will return `Err` if the list call fails
    pub async fn list(
        &self,
        kind: &ResourceKind,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<Snapshot>, ClientError> {
        let mut lp = ListParams::default();
        if let Some(selector) = label_selector {
            lp = lp.labels(selector);
        }

        let list = self.api(kind, namespace).list(&lp).await.map_err(|e| match e {
            kube::Error::Api(response) if response.code == 404 => {
                ClientError::UnknownResource(kind.to_string())
            }
            other => classify(other),
        })?;
        debug!("📋 Listed {} {}", list.items.len(), kind);

        // List items usually come without apiVersion/kind
        list.items
            .into_iter()
            .map(|mut object| {
                object.types.get_or_insert_with(|| TypeMeta {
                    api_version: kind.api_version(),
                    kind: kind.kind.clone(),
                });
                to_snapshot(&object)
            })
            .collect()
    }

    /// Delete one object
    ///
    /// # Errors
    ///
    /// Returns `ClientError::NotFound` if the object does not exist
    pub async fn delete(&self, identity: &ResourceIdentity) -> Result<(), ClientError> {
        self.api(&identity.kind, identity.namespace.as_deref())
            .delete(&identity.name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| not_found_or(e, identity))
    }
}

fn not_found_or(error: kube::Error, identity: &ResourceIdentity) -> ClientError {
    match error {
        kube::Error::Api(response) if response.code == 404 => ClientError::NotFound {
            resource: identity.to_string(),
        },
        other => classify(other),
    }
}

#[async_trait]
impl ResourceClient for KubeResourceClient {
    async fn open_stream(
        &self,
        kind: &ResourceKind,
        namespace: Option<&str>,
        label_selector: Option<&str>,
        field_selector: Option<&str>,
    ) -> Result<EventStream, ClientError> {
        let api = self.api(kind, namespace);
        let mut wp = WatchParams::default().timeout(WATCH_TIMEOUT_SECONDS);
        if let Some(selector) = label_selector {
            wp = wp.labels(selector);
        }
        if let Some(selector) = field_selector {
            wp = wp.fields(selector);
        }

        let resource = kind.to_string();
        let (mut opened_tx, opened_rx) = oneshot::channel();
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        tokio::spawn(async move {
            let opened = tokio::select! {
                () = opened_tx.closed() => return,
                opened = api.watch(&wp, "0") => opened,
            };
            let stream = match opened {
                Ok(stream) => {
                    if opened_tx.send(Ok(())).is_err() {
                        return;
                    }
                    stream
                }
                Err(kube::Error::Api(response)) if response.code == 404 => {
                    let _ = opened_tx.send(Err(ClientError::UnknownResource(resource)));
                    return;
                }
                Err(e) => {
                    let _ = opened_tx.send(Err(classify(e)));
                    return;
                }
            };
            pin_mut!(stream);

            loop {
                let item = tokio::select! {
                    () = tx.closed() => break,
                    item = stream.next() => item,
                };
                let Some(item) = item else {
                    break;
                };

                let event = to_change_event(item, &resource);
                let failed = event.is_err();
                if tx.send(event).await.is_err() || failed {
                    break;
                }
            }
            trace!("📡 Watch task for {} finished", resource);
        });

        match opened_rx.await {
            Ok(Ok(())) => Ok(futures::stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            })
            .boxed()),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ClientError::Connection(
                "watch task ended before the stream opened".to_string(),
            )),
        }
    }

    async fn fetch(&self, identity: &ResourceIdentity) -> Result<Snapshot, ClientError> {
        let object = self
            .api(&identity.kind, identity.namespace.as_deref())
            .get(&identity.name)
            .await
            .map_err(|e| not_found_or(e, identity))?;
        to_snapshot(&object)
    }
}

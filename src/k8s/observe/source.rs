use super::errors::ClientError;
use super::resource::{ChangeEvent, ResourceIdentity, ResourceKind, Snapshot};
use async_trait::async_trait;
use futures::stream::BoxStream;

/// An open change stream. Items arrive in server order; the stream ends when the
/// server closes the session.
pub type EventStream = BoxStream<'static, Result<ChangeEvent, ClientError>>;

/// The two calls the observation core needs from a cluster
///
/// Implementations are shared read-only between concurrently running watch
/// loops and pollers.
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// Open a change stream. Returns only once the stream is established.
    async fn open_stream(
        &self,
        kind: &ResourceKind,
        namespace: Option<&str>,
        label_selector: Option<&str>,
        field_selector: Option<&str>,
    ) -> Result<EventStream, ClientError>;

    /// Fetch the current state of one object; a missing object is `ClientError::NotFound`
    async fn fetch(&self, identity: &ResourceIdentity) -> Result<Snapshot, ClientError>;
}

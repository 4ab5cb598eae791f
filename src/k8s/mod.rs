pub mod client;
pub mod dynamic;
pub mod events;
pub mod observe;
pub mod pods;

/// Default user agent for `kubeobs` - automatically uses the package version
///
/// Pass it through `client::user_agent` so `KUBEOBS_USER_AGENT` can override it.
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

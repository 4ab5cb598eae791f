// Client creation with kubeconfig selection and custom user-agent support for kube 2.x
use crate::error::Result as KoResult;
use hyper::http::{HeaderName, HeaderValue};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable that overrides the user agent sent to the API server
pub const USER_AGENT_ENV: &str = "KUBEOBS_USER_AGENT";

/// User agent to send: `KUBEOBS_USER_AGENT` if set, otherwise `default`
#[must_use]
pub fn user_agent(default: &str) -> String {
    std::env::var(USER_AGENT_ENV)
        .ok()
        .filter(|ua| !ua.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Expand a leading `~/` to the home directory
#[must_use]
pub fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}

/// Load the cluster configuration
///
/// Uses `kubeconfig` when given, otherwise the inferred configuration
/// (`KUBECONFIG`, `~/.kube/config` or the in-cluster service account).
///
/// # Errors
///
/// Will return `Err` if the configuration cannot be read
pub async fn load_config(kubeconfig: Option<&Path>) -> KoResult<Config> {
    let config = match kubeconfig {
        Some(path) => {
            let path = expand_home(path);
            debug!("🔧 Loading kubeconfig from {}", path.display());
            let kubeconfig = Kubeconfig::read_from(&path)?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?
        }
        None => Config::infer().await?,
    };
    Ok(config)
}

/// Create a new k8s client to interact with k8s cluster api
///
/// # Errors
///
/// Will return `Err` if the client cannot be built from `config`
pub fn new(mut config: Config, custom_user_agent: Option<&str>) -> KoResult<Client> {
    if let Some(user_agent) = custom_user_agent {
        match HeaderValue::from_str(user_agent) {
            Ok(header_value) => config
                .headers
                .push((HeaderName::from_static("user-agent"), header_value)),
            Err(e) => warn!("⚠️ Ignoring invalid user agent '{}': {}", user_agent, e),
        }
    }

    let client = Client::try_from(config)?;

    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_home() {
        let Some(home) = std::env::var_os("HOME") else {
            return;
        };
        assert_eq!(
            expand_home(Path::new("~/.kube/config")),
            PathBuf::from(home).join(".kube/config")
        );
        assert_eq!(
            expand_home(Path::new("/etc/kubeconfig")),
            PathBuf::from("/etc/kubeconfig")
        );
    }

    #[test]
    fn test_user_agent_default() {
        if std::env::var(USER_AGENT_ENV).is_err() {
            assert_eq!(user_agent("kubeobs/0.1.0"), "kubeobs/0.1.0");
        }
    }
}

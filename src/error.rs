use crate::k8s::observe::{ClientError, WaitError, WatchError};
use derive_more::From;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, From)]
pub enum Error {
    #[from]
    Yaml(serde_yaml::Error),

    #[from]
    Kube(kube::Error),

    #[from]
    Infer(kube::config::InferConfigError),

    #[from]
    Kubeconfig(kube::config::KubeconfigError),

    #[from]
    Io(std::io::Error),

    #[from]
    Client(ClientError),

    #[from]
    Watch(WatchError),

    #[from]
    Wait(WaitError),
}

impl core::fmt::Display for Error {
    fn fmt(&self, fmt: &mut core::fmt::Formatter) -> core::result::Result<(), core::fmt::Error> {
        match self {
            Self::Yaml(e) => write!(fmt, "yaml: {e}"),
            Self::Kube(e) => write!(fmt, "kubernetes: {e}"),
            Self::Infer(e) => write!(fmt, "kubeconfig: {e}"),
            Self::Kubeconfig(e) => write!(fmt, "kubeconfig: {e}"),
            Self::Io(e) => write!(fmt, "io: {e}"),
            Self::Client(e) => write!(fmt, "{e}"),
            Self::Watch(e) => write!(fmt, "{e}"),
            Self::Wait(e) => write!(fmt, "{e}"),
        }
    }
}

impl std::error::Error for Error {}

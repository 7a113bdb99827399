use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Bridge is already registered on '{0}'")]
    AlreadyRegistered(String),

    #[error("Bridge is not registered")]
    NotRegistered,

    #[error("Stream registry error: {0}")]
    Registry(#[from] core_streams::RegistryError),

    #[error("Host transport error: {0}")]
    Bridge(#[from] bridge_traits::BridgeError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;

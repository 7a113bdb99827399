use thiserror::Error;

use crate::channel::ChannelError;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("No handler bound to channel: {0}")]
    ChannelNotBound(String),

    #[error("Channel handler refused the request: {0}")]
    Channel(#[from] ChannelError),
}

pub type Result<T> = std::result::Result<T, BridgeError>;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ControlError {
    #[error("Command '{0}' is disabled by policy")]
    CommandDisabled(&'static str),

    #[error("Destination denied: {0}")]
    DestinationDenied(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Extension is not connected")]
    NotConnected,

    #[error("Extension error: {0}")]
    Extension(String),

    #[error("Timed out waiting for extension response")]
    ResponseTimeout,

    #[error("Protocol violation: {0}")]
    Protocol(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

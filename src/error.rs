use thiserror::Error;

pub type Result<T> = std::result::Result<T, DispatchError>;

/// Errors raised by collaborators while an outcome is being computed.
///
/// These never leave [`ExceptionDispatcher::dispatch`](crate::exception::ExceptionDispatcher::dispatch);
/// they are the "secondary failures" that collapse into a bare 500.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Configuration unavailable: {message}")]
    ConfigUnavailable { message: String },

    #[error("Invalid value for setting {key}: {value}")]
    InvalidSetting { key: String, value: String },

    #[error("Handler {handler} could not provide its resource: {message}")]
    ResourceUnavailable { handler: String, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DispatchError {
    pub fn config_unavailable(message: impl Into<String>) -> Self {
        Self::ConfigUnavailable {
            message: message.into(),
        }
    }

    pub fn invalid_setting(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidSetting {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn resource_unavailable(handler: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ResourceUnavailable {
            handler: handler.into(),
            message: message.into(),
        }
    }
}

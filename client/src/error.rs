use thiserror::Error;

/// The request never produced a usable response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("server responded with HTTP {status}")]
    Status { status: u16 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Well-formed envelope with `success: false`. The message is user-displayable.
    #[error("{message}")]
    Envelope { status: u16, message: String },

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("could not encode request body: {0}")]
    Encode(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Envelope { status, .. } => Some(*status),
            ApiError::Transport(TransportError::Status { status }) => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    pub fn user_message(&self) -> String {
        match self {
            ApiError::Envelope { message, .. } => message.clone(),
            ApiError::Transport(TransportError::Timeout) => {
                "The server took too long to respond. Please try again.".to_string()
            }
            ApiError::Transport(_) => "Could not reach the server. Please try again.".to_string(),
            ApiError::Decode(_) | ApiError::Encode(_) => "Something went wrong.".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ThreadError {
    #[error("comment cannot be empty")]
    EmptyContent,

    #[error("page must be at least 1")]
    InvalidPage,

    #[error("sign in to do that")]
    NotAuthenticated,

    #[error("you can only delete your own comments")]
    Forbidden,

    #[error("that action is already in progress")]
    Busy,

    #[error("no reply box is open")]
    NoReplyOpen,

    #[error("comment {0} is not in this thread")]
    UnknownComment(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl ThreadError {
    /// Failures decided locally, before anything was sent.
    pub fn is_validation(&self) -> bool {
        !matches!(self, ThreadError::Api(_))
    }

    pub fn user_message(&self) -> String {
        match self {
            ThreadError::Api(err) => err.user_message(),
            other => other.to_string(),
        }
    }

    pub fn api(&self) -> Option<&ApiError> {
        match self {
            ThreadError::Api(err) => Some(err),
            _ => None,
        }
    }
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("No Anthropic API key configured")]
    MissingApiKey,

    #[error("Invalid chat request: {0}")]
    InvalidRequest(String),

    #[error("Failed to reach the chat provider: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Chat provider error {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Chat provider reported an error: {0}")]
    Provider(String),

    #[error("Failed to decode chat provider event: {0}")]
    Decode(#[from] serde_json::Error),

    /// The receiving side of the relay was dropped.
    #[error("Chat client disconnected")]
    ClientGone,
}

impl ChatError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }
}

use baatein_chat::ChatError;

/// Errors from the Telegram front end.
#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    /// Transport failure. Request URLs are stripped since they carry the
    /// bot token.
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("Telegram API error {code}: {description}")]
    Api { code: i64, description: String },

    #[error(transparent)]
    Chat(#[from] ChatError),
}

impl From<reqwest::Error> for TelegramError {
    fn from(err: reqwest::Error) -> Self {
        TelegramError::Http(err.without_url())
    }
}

pub type Result<T> = std::result::Result<T, TelegramError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = TelegramError::Api {
            code: 400,
            description: "Bad Request: chat not found".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Telegram API error 400: Bad Request: chat not found"
        );
    }

    #[test]
    fn test_chat_error_is_transparent() {
        let err: TelegramError = ChatError::UnknownPersona("Zed".to_string()).into();
        assert_eq!(err.to_string(), "unknown persona: Zed");
    }
}

use finquiz_api_types::ErrorBody;
use serde::Serialize;
use thiserror::Error;

/// Remote failure normalized at the edge into a status and message list.
///
/// `status` is `0` when no response was received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{} (status {status})", first_of(.messages))]
pub struct ApiError {
    pub status: u16,
    pub messages: Vec<String>,
}

impl ApiError {
    pub fn new(status: u16, messages: Vec<String>) -> Self {
        Self { status, messages }
    }

    /// Normalize an error response body, falling back to `fallback` when the
    /// body carries no usable `errors` list.
    pub fn from_body(status: u16, body: &[u8], fallback: &str) -> Self {
        let messages = serde_json::from_slice::<ErrorBody>(body)
            .map(ErrorBody::messages)
            .unwrap_or_default();

        if messages.is_empty() {
            Self::new(status, vec![fallback.to_string()])
        } else {
            Self::new(status, messages)
        }
    }

    pub fn transport(fallback: &str) -> Self {
        Self::new(0, vec![fallback.to_string()])
    }

    /// The message a caller should surface to the user.
    pub fn first_message(&self) -> &str {
        first_of(&self.messages)
    }
}

fn first_of(messages: &[String]) -> &str {
    messages.first().map(String::as_str).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FALLBACK: &str = "Error al obtener la información del curso";

    #[test]
    fn nested_errors_are_used() {
        let error = ApiError::from_body(
            422,
            br#"{"data":{"errors":["Name has already been taken"]}}"#,
            FALLBACK,
        );
        assert_eq!(error.status, 422);
        assert_eq!(error.first_message(), "Name has already been taken");
    }

    #[test]
    fn top_level_errors_are_used() {
        let error = ApiError::from_body(
            401,
            br#"{"success":false,"errors":["Invalid login credentials. Please try again."]}"#,
            FALLBACK,
        );
        assert_eq!(error.status, 401);
        assert_eq!(
            error.messages,
            vec!["Invalid login credentials. Please try again.".to_string()]
        );
    }

    #[test]
    fn missing_or_unparseable_errors_fall_back() {
        let empty = ApiError::from_body(500, br#"{"data":{"errors":[]}}"#, FALLBACK);
        assert_eq!(empty.messages, vec![FALLBACK.to_string()]);

        let html = ApiError::from_body(502, b"<html>Bad Gateway</html>", FALLBACK);
        assert_eq!(html.status, 502);
        assert_eq!(html.first_message(), FALLBACK);
    }

    #[test]
    fn display_shows_first_message_and_status() {
        let error = ApiError::transport(FALLBACK);
        assert_eq!(error.status, 0);
        assert_eq!(error.to_string(), format!("{FALLBACK} (status 0)"));
    }
}

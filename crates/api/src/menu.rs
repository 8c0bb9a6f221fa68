//! The `User.get_menu` endpoint.

use async_trait::async_trait;
use reqwest::Method;
use shm_types::{MenuResponse, SessionToken};
use thiserror::Error;
use tracing::debug;

use crate::ShmClient;

/// Path of the SHM object dispatcher.
pub const MENU_ENDPOINT_PATH: &str = "/shm/object.cgi";

/// Maximum number of response body bytes kept in a [`MenuFetchError::Status`].
const ERROR_BODY_LIMIT: usize = 512;

/// Why the permitted menu could not be obtained.
#[derive(Debug, Error)]
pub enum MenuFetchError {
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),
    #[error("menu request timed out")]
    Timeout,
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("menu response is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<reqwest::Error> for MenuFetchError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            MenuFetchError::Timeout
        } else {
            MenuFetchError::Network(error)
        }
    }
}

/// Supplier of the menu permitted for a session.
#[async_trait]
pub trait MenuSource: Send + Sync {
    async fn fetch_menu(&self, token: &SessionToken) -> Result<MenuResponse, MenuFetchError>;
}

/// Request path for the menu of `token`'s session.
///
/// The token is concatenated into the query string without percent-encoding;
/// the backend receives exactly what was stored.
pub fn menu_request_path(token: &SessionToken) -> String {
    format!(
        "{MENU_ENDPOINT_PATH}?object=User&method=get_menu&session_id={}",
        token.query_value()
    )
}

#[async_trait]
impl MenuSource for ShmClient {
    async fn fetch_menu(&self, token: &SessionToken) -> Result<MenuResponse, MenuFetchError> {
        let response = self.request(Method::GET, &menu_request_path(token)).send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(status = status.as_u16(), bytes = body.len(), "menu response received");

        if !status.is_success() {
            return Err(MenuFetchError::Status {
                status: status.as_u16(),
                body: truncate_body(body),
            });
        }
        Ok(MenuResponse::from_json_str(&body)?)
    }
}

fn truncate_body(mut body: String) -> String {
    if body.len() > ERROR_BODY_LIMIT {
        let mut cut = ERROR_BODY_LIMIT;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_embeds_token_verbatim() {
        assert_eq!(
            menu_request_path(&SessionToken::new("abc123")),
            "/shm/object.cgi?object=User&method=get_menu&session_id=abc123"
        );
        assert_eq!(
            menu_request_path(&SessionToken::new("a&b=c")),
            "/shm/object.cgi?object=User&method=get_menu&session_id=a&b=c"
        );
    }

    #[test]
    fn absent_token_is_still_submitted() {
        assert_eq!(
            menu_request_path(&SessionToken::absent()),
            "/shm/object.cgi?object=User&method=get_menu&session_id=null"
        );
    }

    #[test]
    fn long_error_bodies_are_truncated_on_char_boundary() {
        let body = "ж".repeat(400);
        let truncated = truncate_body(body);
        assert!(truncated.len() <= ERROR_BODY_LIMIT);
        assert!(truncated.chars().all(|c| c == 'ж'));
    }
}

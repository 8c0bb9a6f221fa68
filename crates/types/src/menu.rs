use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Text submitted in place of a session id that was never stored.
///
/// Concatenating a missing storage value into the query string yields this
/// literal, and the backend treats it like any other unknown session.
pub const ABSENT_SESSION_QUERY_VALUE: &str = "null";

/// Opaque credential identifying the current admin session.
///
/// The token is never validated locally. An absent token is still submitted,
/// see [`SessionToken::query_value`].
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SessionToken(Option<String>);

impl SessionToken {
    /// Wrap a stored session id.
    pub fn new(value: impl Into<String>) -> Self {
        Self(Some(value.into()))
    }

    /// A token for a browser that has no stored session.
    pub fn absent() -> Self {
        Self(None)
    }

    pub fn from_option(value: Option<String>) -> Self {
        Self(value)
    }

    pub fn is_absent(&self) -> bool {
        self.0.is_none()
    }

    pub fn as_str(&self) -> Option<&str> {
        self.0.as_deref()
    }

    /// Value embedded verbatim in the `session_id` query parameter.
    pub fn query_value(&self) -> &str {
        self.0.as_deref().unwrap_or(ABSENT_SESSION_QUERY_VALUE)
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(_) => f.write_str("SessionToken(<redacted>)"),
            None => f.write_str("SessionToken(absent)"),
        }
    }
}

/// Machine-readable identifier of one administrative section (e.g. `users`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MenuKey(String);

impl MenuKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MenuKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MenuKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for MenuKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Body returned by `User.get_menu`.
///
/// Only `menu` is consumed. Its order is the render order. A missing,
/// `null`, or non-array `menu` decodes to an empty list, and array elements
/// that are not strings are skipped.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuResponse {
    #[serde(default, deserialize_with = "deserialize_menu_keys")]
    pub menu: Vec<MenuKey>,
}

impl MenuResponse {
    pub fn new<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<MenuKey>,
    {
        Self {
            menu: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Decode a response body.
    ///
    /// Invalid JSON is an error. Valid JSON that is not an object (for
    /// example `[]` or `null`) carries no `menu` field and decodes to an
    /// empty menu.
    pub fn from_json_str(body: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(body)?;
        match value {
            Value::Object(_) => serde_json::from_value(value),
            _ => Ok(Self::default()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.menu.is_empty()
    }
}

fn deserialize_menu_keys<'de, D>(deserializer: D) -> Result<Vec<MenuKey>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let Value::Array(items) = value else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(key) => Some(MenuKey(key)),
            _ => None,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(response: &MenuResponse) -> Vec<&str> {
        response.menu.iter().map(MenuKey::as_str).collect()
    }

    #[test]
    fn decodes_menu_in_order() {
        let response = MenuResponse::from_json_str(r#"{"menu": ["users","roles","audit"]}"#).unwrap();
        assert_eq!(keys(&response), vec!["users", "roles", "audit"]);
    }

    #[test]
    fn missing_menu_is_empty() {
        let response = MenuResponse::from_json_str("{}").unwrap();
        assert!(response.is_empty());
    }

    #[test]
    fn malformed_menu_is_empty() {
        for body in [r#"{"menu": null}"#, r#"{"menu": "users"}"#, r#"{"menu": {"users": 1}}"#, "[]", "null"] {
            let response = MenuResponse::from_json_str(body).unwrap();
            assert!(response.is_empty(), "expected empty menu for {body}");
        }
    }

    #[test]
    fn non_string_elements_are_skipped() {
        let response = MenuResponse::from_json_str(r#"{"menu": ["users", 7, null, "audit"], "extra": true}"#).unwrap();
        assert_eq!(keys(&response), vec!["users", "audit"]);
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(MenuResponse::from_json_str("<html>502</html>").is_err());
    }

    #[test]
    fn absent_token_is_submitted_as_null() {
        assert_eq!(SessionToken::absent().query_value(), "null");
        assert_eq!(SessionToken::new("").query_value(), "");
        assert_eq!(SessionToken::new("abc").query_value(), "abc");
    }

    #[test]
    fn token_debug_hides_value() {
        let rendered = format!("{:?}", SessionToken::new("secret-session"));
        assert!(!rendered.contains("secret-session"));
    }
}

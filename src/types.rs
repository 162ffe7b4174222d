use reqwest::header::HeaderMap;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use urlencoding::encode;

/// Basic credential of the `cf` UAA client (`cf:` in base64).
pub const DEFAULT_LOGIN_AUTH_TOKEN: &str = "Y2Y6";

/// One API action the client can request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Info {
        base_url: String,
    },
    TokenGrant {
        base_url: String,
        username: String,
        password: String,
    },
    TokenRefresh {
        base_url: String,
        refresh_token: String,
    },
    Orgs,
    Apps {
        org_guid: String,
        page: u32,
        search_text: String,
    },
    AppSummary {
        guid: String,
    },
    AppStats {
        guid: String,
    },
    AppUpdate {
        guid: String,
        fields: BTreeMap<String, String>,
    },
    AppSpaces {
        app_guids: Vec<String>,
    },
    Events {
        app_guid: String,
    },
    RecentLogs {
        app_guid: String,
    },
}

impl Operation {
    /// Guids are percent-encoded as single path segments.
    pub fn path(&self) -> String {
        match self {
            Operation::Info { .. } => "/v2/info".to_string(),
            Operation::TokenGrant { .. } | Operation::TokenRefresh { .. } => {
                "/oauth/token".to_string()
            }
            Operation::Orgs => "/v2/organizations".to_string(),
            Operation::Apps { .. } => "/v2/apps".to_string(),
            Operation::AppSummary { guid } => format!("/v2/apps/{}/summary", encode(guid)),
            Operation::AppStats { guid } => format!("/v2/apps/{}/stats", encode(guid)),
            Operation::AppUpdate { guid, .. } => format!("/v2/apps/{}", encode(guid)),
            Operation::AppSpaces { .. } => "/v2/spaces".to_string(),
            Operation::Events { .. } => "/v2/events".to_string(),
            Operation::RecentLogs { app_guid } => format!("/apps/{}/recentlogs", encode(app_guid)),
        }
    }

    pub fn method(&self) -> Method {
        match self {
            Operation::TokenGrant { .. } | Operation::TokenRefresh { .. } => Method::POST,
            Operation::AppUpdate { .. } => Method::PUT,
            _ => Method::GET,
        }
    }

    /// Envelope member holding the payload of list endpoints.
    pub fn keypath(&self) -> Option<&'static str> {
        match self {
            Operation::Apps { .. }
            | Operation::Orgs
            | Operation::AppSpaces { .. }
            | Operation::Events { .. } => Some("resources"),
            _ => None,
        }
    }

    pub fn is_token_request(&self) -> bool {
        matches!(
            self,
            Operation::TokenGrant { .. } | Operation::TokenRefresh { .. }
        )
    }
}

/// Connection and authentication context, owned by the caller.
/// Supports both pre-login (no target) and logged-in states
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_login_auth_token")]
    pub login_auth_token: String,
    // Doppler endpoint from /v2/info, usually wss://
    #[serde(default)]
    pub logging_endpoint: Option<String>,
}

fn default_login_auth_token() -> String {
    DEFAULT_LOGIN_AUTH_TOKEN.to_string()
}

impl Default for Session {
    fn default() -> Self {
        Self {
            target: None,
            access_token: None,
            refresh_token: None,
            login_auth_token: default_login_auth_token(),
            logging_endpoint: None,
        }
    }
}

impl Session {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            ..Self::default()
        }
    }

    /// Store tokens from a grant or refresh response.
    /// A response without a refresh token keeps the previous one.
    pub fn apply_token(&mut self, token: TokenResponse) {
        self.access_token = Some(token.access_token);
        if let Some(refresh_token) = token.refresh_token {
            self.refresh_token = Some(refresh_token);
        }
    }
}

/// OAuth token endpoint response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

/// Login credentials (username/password for storage)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginCredentials {
    pub username: String,
    pub password: String,
}

impl LoginCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Fully formed request, ready for the transport.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    pub base_url: String,
    pub path: String,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<String>,
    pub keypath: Option<&'static str>,
}

impl RequestDescriptor {
    /// Query part of the URL, without the leading `?`.
    pub fn query(&self) -> Option<&str> {
        self.url.split_once('?').map(|(_, query)| query)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// False when no base URL could be resolved (e.g. logs without an endpoint).
    pub fn is_sendable(&self) -> bool {
        !self.base_url.is_empty()
    }
}

/// Status, headers and text body captured by the transport.
/// Headers with non-UTF-8 values are dropped.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_endpoints_unwrap_resources() {
        assert_eq!(Operation::Orgs.keypath(), Some("resources"));
        assert_eq!(
            Operation::Events {
                app_guid: "g".to_string()
            }
            .keypath(),
            Some("resources")
        );
        assert_eq!(
            Operation::AppSummary {
                guid: "g".to_string()
            }
            .keypath(),
            None
        );
    }

    #[test]
    fn guids_are_encoded_as_path_segments() {
        assert_eq!(
            Operation::AppSummary {
                guid: "a b/c".to_string()
            }
            .path(),
            "/v2/apps/a%20b%2Fc/summary"
        );
        assert_eq!(
            Operation::RecentLogs {
                app_guid: "g?1".to_string()
            }
            .path(),
            "/apps/g%3F1/recentlogs"
        );
        assert_eq!(
            Operation::AppStats {
                guid: "6f1c-22".to_string()
            }
            .path(),
            "/v2/apps/6f1c-22/stats"
        );
    }

    #[test]
    fn apply_token_keeps_previous_refresh_token() {
        let mut session = Session::new("https://api.example.com");
        session.refresh_token = Some("old-refresh".to_string());
        session.apply_token(TokenResponse {
            access_token: "new-access".to_string(),
            refresh_token: None,
            token_type: Some("bearer".to_string()),
            expires_in: Some(599),
        });
        assert_eq!(session.access_token.as_deref(), Some("new-access"));
        assert_eq!(session.refresh_token.as_deref(), Some("old-refresh"));
    }

    #[test]
    fn session_defaults_to_cf_client_token() {
        let session: Session = serde_json::from_str(r#"{"target":"https://api.example.com"}"#)
            .expect("session json");
        assert_eq!(session.login_auth_token, DEFAULT_LOGIN_AUTH_TOKEN);
        assert!(session.access_token.is_none());
    }
}

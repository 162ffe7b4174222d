use thiserror::Error;

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Failed to access secure storage: {message}")]
    Storage { message: String },
    #[error("Failed to serialize credentials: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum RequestError {
    #[error("No session established; log in before calling authenticated endpoints")]
    MissingSession,
    #[error("Failed to encode request parameters: {0}")]
    Encoding(String),
    #[error("Invalid {name} header: {message}")]
    InvalidHeader { name: String, message: String },
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to build HTTP client: {0}")]
    Client(reqwest::Error),
    #[error("Request has no base URL: {url}")]
    Unsendable { url: String },
    #[error("Invalid request URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },
    #[error("{method} request failed: {source}")]
    Request {
        method: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Request failed with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Failed to parse response as JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Response has no '{key}' member")]
    MissingKey { key: String },
}

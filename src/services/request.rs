use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use std::collections::BTreeMap;
use tracing::{debug, warn};
use url::Url;
use urlencoding::encode;

use crate::error::RequestError;
use crate::types::{Operation, RequestDescriptor, Session};

const APPS_PAGE_SIZE: &str = "25";
const LIST_PAGE_SIZE: &str = "50";
const ARRAY_SUFFIX: &str = "%5B%5D";

enum Param {
    Single(String),
    List(Vec<String>),
}

fn single(value: impl Into<String>) -> Param {
    Param::Single(value.into())
}

/// Build the HTTP request for `operation` against the given session.
///
/// Pure: the session is read, never stored, so tokens applied to it
/// show up on the next build.
pub fn build_request(
    operation: &Operation,
    session: &Session,
) -> Result<RequestDescriptor, RequestError> {
    let base_url = base_url(operation, session)?;
    let path = operation.path();
    let method = operation.method();
    let mut headers = HeaderMap::new();
    let mut query = None;
    let mut body = None;

    match operation {
        Operation::TokenGrant {
            username, password, ..
        } => {
            token_headers(&mut headers, session)?;
            body = Some(encode_params(&[
                ("grant_type", single("password")),
                ("username", single(username.as_str())),
                ("password", single(password.as_str())),
                ("scope", single("")),
            ]));
        }
        Operation::TokenRefresh { refresh_token, .. } => {
            token_headers(&mut headers, session)?;
            body = Some(encode_params(&[
                ("grant_type", single("refresh_token")),
                ("refresh_token", single(refresh_token.as_str())),
            ]));
        }
        Operation::Apps {
            org_guid,
            page,
            search_text,
        } => {
            query = Some(apps_query(org_guid, *page, search_text)?);
        }
        Operation::AppUpdate { fields, .. } => {
            insert_header(&mut headers, ACCEPT, "application/json")?;
            insert_header(&mut headers, CONTENT_TYPE, "application/json")?;
            body = Some(json_body(fields)?);
        }
        Operation::AppSpaces { app_guids } => {
            query = Some(encode_params(&[
                ("q", single(format!("app_guid IN {}", app_guids.join(",")))),
                ("results-per-page", single(LIST_PAGE_SIZE)),
            ]));
        }
        Operation::Events { app_guid } => {
            query = Some(encode_params(&[
                ("order-direction", single("desc")),
                ("q", single(format!("actee:{}", app_guid))),
                ("results-per-page", single(LIST_PAGE_SIZE)),
            ]));
        }
        Operation::Info { .. }
        | Operation::Orgs
        | Operation::AppSummary { .. }
        | Operation::AppStats { .. }
        | Operation::RecentLogs { .. } => {}
    }

    if !operation.is_token_request() {
        if let Some(ref token) = session.access_token {
            insert_header(&mut headers, AUTHORIZATION, &format!("Bearer {}", token))?;
        }
    }

    let mut url = format!("{}{}", base_url.trim_end_matches('/'), path);
    if let Some(ref query) = query {
        if !query.is_empty() {
            url = format!("{}?{}", url, query);
        }
    }

    debug!(method = %method, url = %url, "built request");

    Ok(RequestDescriptor {
        method,
        base_url,
        path,
        url,
        headers,
        body,
        keypath: operation.keypath(),
    })
}

fn base_url(operation: &Operation, session: &Session) -> Result<String, RequestError> {
    match operation {
        Operation::Info { base_url }
        | Operation::TokenGrant { base_url, .. }
        | Operation::TokenRefresh { base_url, .. } => Ok(base_url.clone()),
        Operation::RecentLogs { .. } => Ok(logging_base_url(session)),
        _ => session.target.clone().ok_or(RequestError::MissingSession),
    }
}

/// Logging endpoint with its scheme forced to https.
///
/// Falls back to an empty base URL when the session has no usable
/// endpoint; the resulting descriptor is not sendable.
fn logging_base_url(session: &Session) -> String {
    let Some(endpoint) = session.logging_endpoint.as_deref() else {
        warn!("session has no logging endpoint; recent logs request has no base URL");
        return String::new();
    };

    let mut url = match Url::parse(endpoint) {
        Ok(url) => url,
        Err(e) => {
            warn!(endpoint = %endpoint, "Invalid logging endpoint: {}", e);
            return String::new();
        }
    };

    if url.set_scheme("https").is_err() {
        warn!(endpoint = %endpoint, "logging endpoint scheme cannot be changed to https");
        return String::new();
    }

    url.as_str().trim_end_matches('/').to_string()
}

fn apps_query(org_guid: &str, page: u32, search_text: &str) -> Result<String, RequestError> {
    let mut filters = vec![format!("organization_guid:{}", org_guid)];

    if !search_text.is_empty() {
        filters.push(format!("name>={}", search_text));
        filters.push(format!("name<={}", bump_last_char(search_text)?));
    }

    let query = encode_params(&[
        ("order-direction", single("desc")),
        ("q", Param::List(filters)),
        ("results-per-page", single(APPS_PAGE_SIZE)),
        ("page", single(page.to_string())),
    ]);

    // The API expects repeated bare `q=` keys, not `q[]=`
    Ok(strip_array_suffix(&query))
}

/// Upper bound of a name range filter: the last character moved one
/// code point up, the rest unchanged.
pub fn bump_last_char(text: &str) -> Result<String, RequestError> {
    let mut chars = text.chars();
    let last = chars
        .next_back()
        .ok_or_else(|| RequestError::Encoding("cannot bump an empty search text".to_string()))?;

    let next = match last as u32 + 1 {
        // skip the surrogate range
        0xD800 => Some('\u{E000}'),
        code => char::from_u32(code),
    }
    .ok_or_else(|| {
        RequestError::Encoding(format!("no character follows U+{:X}", last as u32))
    })?;

    let mut bumped = chars.as_str().to_string();
    bumped.push(next);
    Ok(bumped)
}

/// Percent-encode parameters in declaration order. Lists repeat the key
/// with an array suffix, one pair per element.
fn encode_params(params: &[(&str, Param)]) -> String {
    let mut pairs: Vec<String> = Vec::new();

    for (key, value) in params {
        match value {
            Param::Single(value) => {
                pairs.push(format!("{}={}", encode(key), encode(value)));
            }
            Param::List(values) => {
                for value in values {
                    pairs.push(format!("{}{}={}", encode(key), ARRAY_SUFFIX, encode(value)));
                }
            }
        }
    }

    pairs.join("&")
}

/// Drop the encoded `[]` suffix from keys. Values are left alone so a
/// search text containing brackets survives.
fn strip_array_suffix(query: &str) -> String {
    query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => {
                format!("{}={}", key.strip_suffix(ARRAY_SUFFIX).unwrap_or(key), value)
            }
            None => pair.strip_suffix(ARRAY_SUFFIX).unwrap_or(pair).to_string(),
        })
        .collect::<Vec<String>>()
        .join("&")
}

fn json_body(fields: &BTreeMap<String, String>) -> Result<String, RequestError> {
    serde_json::to_string(fields)
        .map_err(|e| RequestError::Encoding(format!("Failed to serialize request body: {}", e)))
}

fn token_headers(headers: &mut HeaderMap, session: &Session) -> Result<(), RequestError> {
    insert_header(
        headers,
        AUTHORIZATION,
        &format!("Basic {}", session.login_auth_token),
    )?;
    insert_header(headers, CONTENT_TYPE, "application/x-www-form-urlencoded")?;
    insert_header(headers, ACCEPT, "application/json")?;
    Ok(())
}

fn insert_header(
    headers: &mut HeaderMap,
    name: HeaderName,
    value: &str,
) -> Result<(), RequestError> {
    let header_value = HeaderValue::from_str(value).map_err(|e| RequestError::InvalidHeader {
        name: name.to_string(),
        message: e.to_string(),
    })?;
    headers.insert(name, header_value);
    Ok(())
}

use reqwest::blocking::Client;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::string::FromUtf8Error;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Errors returned by the fetch helpers.
#[derive(Debug, Error)]
pub enum HttpError {
    /// The base URL could not be parsed.
    #[error("invalid base URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    /// The HTTP client could not be constructed.
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
    /// The request could not be sent or its body could not be read.
    #[error("failed to make GET request to {url}: {source}")]
    Request {
        url: Url,
        #[source]
        source: reqwest::Error,
    },
    /// The server answered with anything other than `200 OK`.
    #[error("received non-200 response code from {url}: {status}")]
    Status { url: Url, status: StatusCode },
    /// The body is not valid UTF-8.
    #[error("response body from {url} is not valid UTF-8: {source}")]
    Utf8 {
        url: Url,
        #[source]
        source: FromUtf8Error,
    },
    /// The body does not decode into the requested shape.
    #[error("error decoding JSON from {url}: {source}")]
    Decode {
        url: Url,
        #[source]
        source: serde_json::Error,
    },
}

/// Encodes a string for safe inclusion in a URL query component.
///
/// Uses `application/x-www-form-urlencoded` rules, so a space becomes `+`.
/// Only ASCII alphanumerics and `*-._` pass through unescaped; `~` is
/// written as `%7E`. Go's `url.QueryEscape` keeps `~` and escapes `*`, but
/// both forms decode to the same string.
pub fn url_encode(input: &str) -> String {
    url::form_urlencoded::byte_serialize(input.as_bytes()).collect()
}

/// Builds the request URL for `base_url` with `args` as its query.
///
/// Any query already present on `base_url` is replaced. Parameters are
/// deduplicated by key (the last value wins) and encoded in key order.
///
/// # Errors
///
/// Returns `HttpError::InvalidUrl` if `base_url` cannot be parsed.
pub fn build_url<I, K, V>(base_url: &str, args: I) -> Result<Url, HttpError>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let mut url = Url::parse(base_url).map_err(|source| HttpError::InvalidUrl {
        url: base_url.to_string(),
        source,
    })?;

    let args: BTreeMap<String, String> = args
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect();
    url.set_query(None);
    if !args.is_empty() {
        url.query_pairs_mut().extend_pairs(&args);
    }

    Ok(url)
}

fn fetch(url: &Url) -> Result<Vec<u8>, HttpError> {
    let client = Client::builder()
        .timeout(None::<Duration>)
        .build()
        .map_err(HttpError::Client)?;

    debug!(%url, "sending GET request");
    let response = client
        .get(url.clone())
        .send()
        .map_err(|source| HttpError::Request {
            url: url.clone(),
            source,
        })?;

    let status = response.status();
    if status != StatusCode::OK {
        debug!(%url, %status, "request rejected");
        return Err(HttpError::Status {
            url: url.clone(),
            status,
        });
    }

    let body = response.bytes().map_err(|source| HttpError::Request {
        url: url.clone(),
        source,
    })?;
    debug!(%url, bytes = body.len(), "received response body");
    Ok(body.to_vec())
}

/// Sends a GET request to `base_url` with `args` as query parameters and
/// returns the whole response body.
///
/// No timeout is applied, so a peer that never answers blocks the caller.
///
/// # Arguments
///
/// * `base_url` - The URL to request. Its own query, if any, is dropped.
/// * `args` - Query parameters as `(key, value)` pairs.
///
/// # Errors
///
/// Returns `HttpError::InvalidUrl` for an unparsable URL, `HttpError::Request`
/// if the request fails, and `HttpError::Status` unless the status is `200`.
pub fn read_all_bytes<I, K, V>(base_url: &str, args: I) -> Result<Vec<u8>, HttpError>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let url = build_url(base_url, args)?;
    fetch(&url)
}

/// Like [`read_all_bytes`], with the body decoded as UTF-8.
///
/// # Errors
///
/// Everything [`read_all_bytes`] returns, plus `HttpError::Utf8`.
pub fn read_all_text<I, K, V>(base_url: &str, args: I) -> Result<String, HttpError>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let url = build_url(base_url, args)?;
    let body = fetch(&url)?;
    String::from_utf8(body).map_err(|source| HttpError::Utf8 { url, source })
}

/// Like [`read_all_bytes`], with the body decoded as JSON into `T`.
///
/// # Errors
///
/// Everything [`read_all_bytes`] returns, plus `HttpError::Decode` when the
/// body is not valid JSON for `T`.
pub fn read_all_json<T, I, K, V>(base_url: &str, args: I) -> Result<T, HttpError>
where
    T: DeserializeOwned,
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let url = build_url(base_url, args)?;
    let body = fetch(&url)?;
    serde_json::from_slice(&body).map_err(|source| HttpError::Decode { url, source })
}

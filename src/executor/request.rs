use std::time::{Duration, Instant};

use reqwest::{header::HeaderMap, Client, StatusCode};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::EvalError;
use crate::spec::Method;

/// The parts of an HTTP response kept after its body has been consumed.
#[derive(Debug, Clone)]
pub struct CapturedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Final URL of the response, used to resolve relative `Location` headers.
    pub url: Url,
}

/// A completed request/response pair with the body read to completion.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub response: CapturedResponse,
    pub body: Vec<u8>,
    pub duration_ms: f64,
}

/// Sends one request and buffers its response body.
///
/// Transport errors are returned untouched. When `timeout` elapses before
/// the body is fully read the result is [`EvalError::Timeout`].
pub async fn execute(
    client: &Client,
    method: Method,
    url: &str,
    data: Option<&Value>,
    timeout: Option<Duration>,
) -> Result<Exchange, EvalError> {
    debug!("http: > {} {}", method, url);
    let mut request_builder = client.request(method.into(), url);

    if let Some(data) = data {
        let json_body = serde_json::to_vec(data).map_err(EvalError::SerializeData)?;
        if !json_body.is_empty() {
            debug!("http: > {}", preview(&json_body));
        }
        request_builder = request_builder
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(json_body);
    }

    let start = Instant::now();
    let exchange = async {
        let response = request_builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let final_url = response.url().clone();
        debug!("http: < {}", status.as_u16());
        // consumes the response; the connection is released once read
        let body = response.bytes().await?;
        Ok::<_, reqwest::Error>((status, headers, final_url, body))
    };

    let (status, headers, final_url, body) = match timeout {
        Some(limit) => match tokio::time::timeout(limit, exchange).await {
            Ok(result) => result?,
            Err(_) => return Err(EvalError::Timeout(limit)),
        },
        None => exchange.await?,
    };
    let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

    if !body.is_empty() {
        debug!("http: < {}", preview(&body));
    }

    Ok(Exchange {
        response: CapturedResponse {
            status,
            headers,
            url: final_url,
        },
        body: body.to_vec(),
        duration_ms,
    })
}

const PREVIEW_LIMIT: usize = 4096;

/// Text rendering of a body for debug logs; binary content is hex encoded.
fn preview(bytes: &[u8]) -> String {
    let slice = if bytes.len() > PREVIEW_LIMIT {
        &bytes[..PREVIEW_LIMIT]
    } else {
        bytes
    };
    match std::str::from_utf8(slice) {
        Ok(text) => text.to_string(),
        Err(_) => hex::encode(slice),
    }
}

use std::{fmt, future::Future, time::Duration};

use anyhow::{Context as _, Result};
use serde::{Serialize, de::DeserializeOwned};

pub const CONTENT_TYPE_JSON: &str = "application/json";

pub const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub content_type: Option<&'static str>,
    pub body: Vec<u8>,
}

impl Request {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: Vec::new(),
            content_type: None,
            body: Vec::new(),
        }
    }

    pub fn post(url: impl Into<String>, content_type: &'static str, body: Vec<u8>) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            headers: Vec::new(),
            content_type: Some(content_type),
            body,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Request/response seam between the pipeline and the network.
pub trait Transport {
    fn send(&self, request: Request) -> impl Future<Output = Result<Response>> + Send;
}

/// Non-success HTTP status, kept typed so callers can tell a 403 apart.
#[derive(Debug)]
pub struct StatusError {
    pub status: u16,
    pub body: String,
}

impl fmt::Display for StatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.body)
    }
}

impl std::error::Error for StatusError {}

pub fn is_forbidden(err: &anyhow::Error) -> bool {
    err.downcast_ref::<StatusError>()
        .is_some_and(|e| e.status == 403)
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { client })
    }
}

impl Transport for HttpClient {
    async fn send(&self, request: Request) -> Result<Response> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };

        let mut builder = self.client.request(method, &request.url);
        if let Some(content_type) = request.content_type {
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(request.body);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .send()
            .await
            .with_context(|| format!("failed to send request to {}", request.url))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .with_context(|| format!("failed to read response from {}", request.url))?;

        Ok(Response {
            status,
            body: body.to_vec(),
        })
    }
}

pub async fn get_json<T: Transport, R: DeserializeOwned>(transport: &T, url: &str) -> Result<R> {
    let response = transport.send(Request::get(url)).await?;
    if response.status != 200 {
        return Err(status_error(response).into());
    }

    serde_json::from_slice(&response.body)
        .with_context(|| format!("failed to decode response from {url}"))
}

/// Posts `body` as JSON and returns the raw response body of a 2xx response.
pub async fn post_json<T: Transport, B: Serialize>(
    transport: &T,
    url: &str,
    headers: &[(&str, String)],
    body: &B,
) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(body).context("failed to encode request body")?;

    let mut request = Request::post(url, CONTENT_TYPE_JSON, json);
    request.headers = headers
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect();

    post(transport, request).await
}

pub async fn post_data<T: Transport>(
    transport: &T,
    url: &str,
    content_type: &'static str,
    body: Vec<u8>,
) -> Result<Vec<u8>> {
    post(transport, Request::post(url, content_type, body)).await
}

async fn post<T: Transport>(transport: &T, request: Request) -> Result<Vec<u8>> {
    let response = transport.send(request).await?;
    if !(200..=226).contains(&response.status) {
        return Err(status_error(response).into());
    }

    Ok(response.body)
}

fn status_error(response: Response) -> StatusError {
    StatusError {
        status: response.status,
        body: String::from_utf8_lossy(&response.body).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;

    #[tokio::test]
    async fn get_requires_ok_status() {
        let transport = MockTransport::new();
        transport.push_response(204, "");

        let err = get_json::<_, serde_json::Value>(&transport, "http://board/json")
            .await
            .unwrap_err();

        assert_eq!(err.downcast_ref::<StatusError>().unwrap().status, 204);
    }

    #[tokio::test]
    async fn post_accepts_any_success_status() {
        let transport = MockTransport::new();
        transport.push_response(201, "created");

        let body = post_json(&transport, "http://api/feed", &[("X-Pin", "1".into())], &[1, 2])
            .await
            .unwrap();

        assert_eq!(body, b"created");
        let requests = transport.requests();
        assert_eq!(requests[0].method, Method::Post);
        assert_eq!(requests[0].content_type, Some(CONTENT_TYPE_JSON));
        assert_eq!(requests[0].header("x-pin"), Some("1"));
        assert_eq!(requests[0].body, b"[1,2]");
    }

    #[tokio::test]
    async fn forbidden_status_is_detectable() {
        let transport = MockTransport::new();
        transport.push_response(403, "not registered");
        transport.push_response(500, "oops");

        let forbidden = post_data(&transport, "http://api", CONTENT_TYPE_FORM, Vec::new())
            .await
            .unwrap_err();
        let failed = post_data(&transport, "http://api", CONTENT_TYPE_FORM, Vec::new())
            .await
            .unwrap_err();

        assert!(is_forbidden(&forbidden));
        assert_eq!(forbidden.to_string(), "403: not registered");
        assert!(!is_forbidden(&failed));
    }
}

//! Typed client for the transfer backend.
//!
//! All endpoints share one response convention: success bodies are JSON
//! payloads, failure bodies carry an `error` field. Non-success statuses
//! surface as [`ApiError::Status`] with the status code and a
//! best-effort message pulled from the body.

use std::fmt;

use anyhow::{anyhow, Result};
use log::debug;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Body, Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use common::payloads::{
    extract_error, CompleteRequest, CompleteResponse, DownloadUrlResponse, EmailRequest,
    InitRequest, InitResponse, RawTransferRecord, TransferListResponse,
};

#[derive(Clone, Debug)]
pub enum ApiError {
    Transport(String),
    Status { status: u16, message: String },
    Decode(String),
    MissingField(&'static str),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(s) => write!(f, "transport error: {s}"),
            Self::Status { status, message } => write!(f, "status {status}: {message}"),
            Self::Decode(s) => write!(f, "undecodable response: {s}"),
            Self::MissingField(field) => write!(f, "response is missing `{field}`"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value.to_string())
    }
}

/// Backend paths, exactly as the deployment exposes them.
pub(crate) mod paths {
    pub fn init() -> String {
        "/api/transfers/init".to_string()
    }

    pub fn complete() -> String {
        "/api/transfers/complete".to_string()
    }

    pub fn transfer(id: &str) -> String {
        format!("/api/transfers/{id}")
    }

    pub fn file_download(id: &str, index: usize) -> String {
        format!("/api/transfers/{id}/files/{index}/download")
    }

    pub fn zip(id: &str) -> String {
        format!("/api/transfers/{id}/download.zip")
    }

    pub fn email(id: &str) -> String {
        format!("/api/transfers/{id}/email")
    }

    pub fn my() -> String {
        "/api/transfers/my".to_string()
    }
}

fn best_effort_message(body: &str) -> String {
    if let Some(message) = extract_error(body) {
        return message;
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "no response body".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Checks the status, consuming the body for an error message on
/// failure. The response is handed back still unread on success so
/// callers can stream it.
async fn ensure_success(input: reqwest::Result<Response>) -> Result<Response> {
    let res = input.map_err(ApiError::from)?;
    let status = res.status().as_u16();
    if !(200..300).contains(&status) {
        let text = res.text().await.unwrap_or_default();
        let message = best_effort_message(&text);
        return Err(anyhow!(ApiError::Status { status, message }));
    }
    Ok(res)
}

/// Checks the status and decodes the success body.
pub(crate) async fn process_response<Resp: DeserializeOwned>(
    input: reqwest::Result<Response>,
) -> Result<Resp> {
    let res = ensure_success(input).await?;
    let text = res.text().await.map_err(ApiError::from)?;
    serde_json::from_str(&text).map_err(|e| anyhow!(ApiError::Decode(e.to_string())))
}

pub struct ApiClient {
    http: Client,
    base: String,
    bearer: Option<String>,
}

impl ApiClient {
    pub fn new(http: Client, base: impl Into<String>, bearer: Option<String>) -> Self {
        Self {
            http,
            base: base.into(),
            bearer,
        }
    }

    fn request(&self, method: Method, path: String) -> RequestBuilder {
        let url = format!("{}{}", self.base, path);
        debug!("{method} {url}");
        let builder = self.http.request(method, url);
        match &self.bearer {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Registers the selected files, obtaining a transfer id and one
    /// pre-signed upload target per file, in request order.
    pub async fn init(&self, req: &InitRequest) -> Result<InitResponse> {
        let res = self.request(Method::POST, paths::init()).json(req).send().await;
        process_response(res).await
    }

    /// Finalizes the transfer once every upload succeeded.
    pub async fn complete(&self, req: &CompleteRequest) -> Result<CompleteResponse> {
        let res = self
            .request(Method::POST, paths::complete())
            .json(req)
            .send()
            .await;
        process_response(res).await
    }

    pub async fn transfer(&self, id: &str) -> Result<RawTransferRecord> {
        let res = self.request(Method::GET, paths::transfer(id)).send().await;
        process_response(res).await
    }

    pub async fn my_transfers(&self) -> Result<TransferListResponse> {
        let res = self.request(Method::GET, paths::my()).send().await;
        process_response(res).await
    }

    /// Obtains the short-lived download URL for one file. The extra
    /// round trip exists because the storage URL alone cannot carry an
    /// Authorization header.
    pub async fn file_download_url(&self, id: &str, index: usize) -> Result<String> {
        let res = self
            .request(Method::GET, paths::file_download(id, index))
            .send()
            .await;
        let payload: DownloadUrlResponse = process_response(res).await?;
        payload.url.ok_or_else(|| anyhow!(ApiError::MissingField("url")))
    }

    pub async fn send_email(&self, id: &str, req: &EmailRequest) -> Result<()> {
        let res = self
            .request(Method::POST, paths::email(id))
            .json(req)
            .send()
            .await;
        let _: serde_json::Value = process_response(res).await?;
        Ok(())
    }

    /// Raw PUT of file bytes to a pre-signed URL. No Authorization
    /// header; the URL itself is the credential.
    pub async fn upload_presigned(
        &self,
        url: &str,
        content_type: &str,
        size: u64,
        body: Body,
    ) -> Result<()> {
        debug!("PUT {url} ({size} bytes, {content_type})");
        let res = self
            .http
            .put(url)
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_LENGTH, size)
            .body(body)
            .send()
            .await;
        ensure_success(res).await.map(|_| ())
    }

    /// GET of an absolute URL with the bearer attached; the body is
    /// left unread for streaming.
    pub async fn fetch_bytes(&self, url: &str) -> Result<Response> {
        debug!("GET {url}");
        let builder = self.http.get(url);
        let builder = match &self.bearer {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        };
        ensure_success(builder.send().await).await
    }

    /// GET of the pre-built zip bundle; the body is left unread for
    /// streaming.
    pub async fn fetch_zip(&self, id: &str) -> Result<Response> {
        let res = self.request(Method::GET, paths::zip(id)).send().await;
        ensure_success(res).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_paths() {
        assert_eq!(paths::init(), "/api/transfers/init");
        assert_eq!(paths::complete(), "/api/transfers/complete");
        assert_eq!(paths::transfer("tr_1"), "/api/transfers/tr_1");
        assert_eq!(
            paths::file_download("tr_1", 2),
            "/api/transfers/tr_1/files/2/download"
        );
        assert_eq!(paths::zip("tr_1"), "/api/transfers/tr_1/download.zip");
        assert_eq!(paths::email("tr_1"), "/api/transfers/tr_1/email");
        assert_eq!(paths::my(), "/api/transfers/my");
    }

    #[test]
    fn status_error_names_code_and_message() {
        let err = ApiError::Status {
            status: 413,
            message: "payload too large".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("413"));
        assert!(text.contains("payload too large"));
    }

    #[test]
    fn best_effort_message_prefers_the_error_field() {
        assert_eq!(
            best_effort_message(r#"{"error": "quota exceeded"}"#),
            "quota exceeded"
        );
        assert_eq!(best_effort_message("  plain text  "), "plain text");
        assert_eq!(best_effort_message(""), "no response body");
    }
}

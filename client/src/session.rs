//! Stored session and bearer-token handling.
//!
//! The session lives in a JSON file next to the config. Tokens are
//! short-lived; every use re-reads the file and refreshes through the
//! identity provider when the token is inside the refresh window, so a
//! long-lived shell never holds a stale token in memory.

use std::fs;
use std::io::{self, BufRead, Write};

use anyhow::{bail, Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::api::process_response;
use crate::config::Settings;
use crate::helpers::now_ms;

/// Tokens are refreshed this many milliseconds before their recorded
/// expiry.
const REFRESH_WINDOW_MS: u64 = 60_000;

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct StoredSession {
    pub email: String,
    pub token: String,
    pub refresh_token: String,
    /// Epoch milliseconds after which `token` is no longer valid.
    pub expires_at: u64,
}

impl StoredSession {
    pub fn needs_refresh(&self, now_ms: u64) -> bool {
        now_ms + REFRESH_WINDOW_MS >= self.expires_at
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenRequest<'a> {
    grant_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    token: String,
    refresh_token: String,
    /// Validity in seconds.
    expires_in: u64,
}

pub struct Session<'a> {
    settings: &'a Settings,
    http: &'a reqwest::Client,
}

impl<'a> Session<'a> {
    pub fn new(settings: &'a Settings, http: &'a reqwest::Client) -> Self {
        Self { settings, http }
    }

    pub fn load(&self) -> Option<StoredSession> {
        let text = fs::read_to_string(self.settings.session_path()).ok()?;
        serde_json::from_str(&text).ok()
    }

    fn save(&self, session: &StoredSession) -> Result<()> {
        self.settings.ensure_config_dir()?;
        let path = self.settings.session_path();
        let text = serde_json::to_string_pretty(session)?;
        fs::write(&path, text).with_context(|| format!("cannot write {}", path.display()))?;
        Ok(())
    }

    /// Removes the stored session; missing file is a no-op.
    pub fn clear(&self) -> Result<()> {
        let path = self.settings.session_path();
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("cannot remove {}", path.display())),
        }
    }

    fn identity_url(&self) -> Result<String> {
        match &self.settings.identity_url {
            Some(url) => Ok(format!("{url}/v1/token")),
            None => bail!(
                "no identity provider configured; set SKIFF_IDENTITY_URL \
                 or put identity_url in config.toml"
            ),
        }
    }

    async fn exchange(&self, req: &TokenRequest<'_>) -> Result<TokenResponse> {
        let url = self.identity_url()?;
        debug!("POST {url} (grant {})", req.grant_type);
        let res = self.http.post(&url).json(req).send().await;
        process_response(res).await
    }

    fn store_tokens(&self, email: &str, tokens: TokenResponse) -> Result<StoredSession> {
        let session = StoredSession {
            email: email.to_string(),
            token: tokens.token,
            refresh_token: tokens.refresh_token,
            expires_at: now_ms().0 + tokens.expires_in * 1_000,
        };
        self.save(&session)?;
        Ok(session)
    }

    /// Interactive email/password exchange; the session is persisted on
    /// success.
    pub async fn login(&self, email: &str, password: &str) -> Result<StoredSession> {
        let tokens = self
            .exchange(&TokenRequest {
                grant_type: "password",
                email: Some(email),
                password: Some(password),
                refresh_token: None,
            })
            .await?;
        self.store_tokens(email, tokens)
    }

    async fn refresh(&self, stale: StoredSession) -> Result<StoredSession> {
        let tokens = self
            .exchange(&TokenRequest {
                grant_type: "refreshToken",
                email: None,
                password: None,
                refresh_token: Some(&stale.refresh_token),
            })
            .await?;
        self.store_tokens(&stale.email, tokens)
    }

    /// A usable bearer token, or `None` when nobody is signed in.
    /// `force_refresh` requests a provider-side refresh regardless of
    /// the recorded expiry, for endpoints that reject tokens close to
    /// their end of life.
    pub async fn bearer(&self, force_refresh: bool) -> Result<Option<String>> {
        let Some(session) = self.load() else {
            return Ok(None);
        };
        if force_refresh || session.needs_refresh(now_ms().0) {
            debug!("refreshing token for {}", session.email);
            let fresh = self.refresh(session).await?;
            return Ok(Some(fresh.token));
        }
        Ok(Some(session.token))
    }

    /// Guard for protected operations: a bearer token, or an error that
    /// names the command to retry once signed in.
    pub async fn require(&self, force_refresh: bool, action: &str) -> Result<String> {
        match self.bearer(force_refresh).await? {
            Some(token) => Ok(token),
            None => bail!("not signed in; run `skiff login`, then retry `{action}`"),
        }
    }
}

/// Reads one line from stdin with a prompt on stderr.
pub fn prompt_line(label: &str) -> Result<String> {
    eprint!("{label}: ");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("cannot read from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

//! Startup auth-token verification against a remote HTTPS endpoint.
//! Non-200 or a missing echo of the token back from the endpoint is fatal.

use anyhow::{bail, Context, Result};
use std::time::Duration;

/// Verifies `token` against `endpoint`. The endpoint is expected to echo the
/// token back in a `token` field on success.
pub fn verify_auth_token(endpoint: &str, token: &str) -> Result<()> {
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    let resp = client
        .get(endpoint)
        .bearer_auth(token)
        .send()
        .context("auth endpoint unreachable")?;

    if !resp.status().is_success() {
        bail!("auth token rejected: endpoint returned {}", resp.status());
    }

    #[derive(serde::Deserialize)]
    struct AuthResponse {
        token: Option<String>,
    }
    let body: AuthResponse = resp.json().context("auth endpoint returned an unexpected body")?;
    match body.token {
        Some(echoed) if echoed == token => Ok(()),
        _ => bail!("auth endpoint did not echo back the configured token"),
    }
}

/// Resolves the auth token, honoring the `AUTH_TOKEN` env override.
pub fn resolve_auth_token(configured: Option<&str>) -> Option<String> {
    std::env::var("AUTH_TOKEN").ok().or_else(|| configured.map(|s| s.to_string()))
}

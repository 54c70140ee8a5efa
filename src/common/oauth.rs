use crate::common::config::Settings;
use crate::common::credentials::Credentials;
use crate::common::metrics;
use crate::common::strava_client::{ensure_success, parse_json};
use crate::common::types::Result;
use chrono::{DateTime, Utc};
use reqwest_middleware::ClientWithMiddleware;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Serialize)]
struct RefreshTokenRequest<'a> {
    client_id: u64,
    client_secret: &'a str,
    refresh_token: &'a str,
    grant_type: &'static str,
    f: &'static str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub token_type: String,
    pub access_token: String,
    pub expires_at: i64,
    #[serde(default)]
    pub expires_in: i64,
    pub refresh_token: Option<String>,
}

impl TokenResponse {
    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.expires_at, 0)
    }

    /// Expiry as `YYYY-mm-dd HH:MM:SS` in UTC.
    pub fn expiry_display(&self) -> String {
        self.expires_at_utc()
            .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| self.expires_at.to_string())
    }
}

/// Exchange the stored refresh token for a fresh access token.
///
/// The access token lands in `credentials.access_token`. Strava may rotate the
/// refresh token; when it does, `credentials.refresh_code` is replaced so a
/// later [`Credentials::save`] persists it.
pub async fn refresh_access_token(
    client: &ClientWithMiddleware,
    settings: &Settings,
    credentials: &mut Credentials,
) -> Result<TokenResponse> {
    let request = RefreshTokenRequest {
        client_id: credentials.require_client_id()?,
        client_secret: credentials.require_client_secret()?,
        refresh_token: credentials.require_refresh_code()?,
        grant_type: "refresh_token",
        f: "json",
    };

    info!(client_id = request.client_id, "requesting access token");

    let result = async {
        let response = client.post(&settings.oauth_url).form(&request).send().await?;
        let response = ensure_success(response).await?;
        parse_json::<TokenResponse>(response).await
    }
    .await
    .inspect_err(|_| metrics::increment_strava_api_failure())?;

    metrics::increment_strava_api_success();
    metrics::increment_token_refresh();

    credentials.access_token = Some(result.access_token.clone());
    if let Some(rotated) = result.refresh_token.as_ref() {
        if credentials.refresh_code.as_deref() != Some(rotated.as_str()) {
            debug!("refresh token rotated");
            credentials.refresh_code = Some(rotated.clone());
        }
    }

    info!(expires_at = %result.expiry_display(), "access token refreshed");
    Ok(result)
}

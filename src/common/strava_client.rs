use crate::common::config::Settings;
use crate::common::credentials::Credentials;
use crate::common::metrics;
use crate::common::types::{
    ActivityQuery, ActivitySummary, ActivityUpdate, Athlete, AthleteStats, Fault, Gear,
    NewActivity, Result, StravaError, Upload, UploadRequest,
};
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use reqwest_middleware::ClientWithMiddleware;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Instant;
use tracing::{debug, info};

/// Largest page the activities endpoint serves.
const MAX_PER_PAGE: usize = 200;

pub struct StravaClient {
    client: ClientWithMiddleware,
    // Requests that must not be replayed (creates, multipart uploads) skip the retry layer.
    http: reqwest::Client,
    access_token: String,
    settings: Settings,
}

#[derive(Serialize)]
struct CreateActivityForm<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    activity_type: &'a str,
    sport_type: &'a str,
    start_date_local: String,
    elapsed_time: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    distance: Option<f64>,
    trainer: u8,
    commute: u8,
}

impl StravaClient {
    pub fn new(access_token: impl Into<String>, settings: Settings) -> Result<Self> {
        let http = settings.http_client()?;
        let client = settings.retrying_client(http.clone());

        Ok(Self {
            client,
            http,
            access_token: access_token.into(),
            settings,
        })
    }

    /// Build a client from credentials that already hold a refreshed access token.
    pub fn from_credentials(credentials: &Credentials, settings: Settings) -> Result<Self> {
        Self::new(credentials.require_access_token()?, settings)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub async fn get_athlete(&self) -> Result<Athlete> {
        self.get_json("/athlete", &[]).await
    }

    pub async fn get_athlete_stats(&self, athlete_id: u64) -> Result<AthleteStats> {
        self.get_json(&format!("/athletes/{athlete_id}/stats"), &[])
            .await
    }

    pub async fn get_gear(&self, gear_id: &str) -> Result<Gear> {
        self.get_json(&format!("/gear/{gear_id}"), &[]).await
    }

    pub async fn get_activity(&self, activity_id: u64) -> Result<ActivitySummary> {
        self.get_json(&format!("/activities/{activity_id}"), &[])
            .await
    }

    /// List the athlete's activities, newest first unless `after` alone is given.
    ///
    /// Pages are requested with a fixed page size so page offsets stay
    /// consistent; the result is cut to `limit`.
    pub async fn get_activities(&self, query: &ActivityQuery) -> Result<Vec<ActivitySummary>> {
        let per_page = query.limit.map_or(MAX_PER_PAGE, |l| l.clamp(1, MAX_PER_PAGE));
        let mut activities: Vec<ActivitySummary> = Vec::new();

        if query.limit == Some(0) {
            return Ok(activities);
        }

        for page in 1.. {
            let mut params = vec![
                ("page", page.to_string()),
                ("per_page", per_page.to_string()),
            ];
            if let Some(before) = query.before {
                params.push(("before", before.timestamp().to_string()));
            }
            if let Some(after) = query.after {
                params.push(("after", after.timestamp().to_string()));
            }

            let batch: Vec<ActivitySummary> = self.get_json("/athlete/activities", &params).await?;
            let fetched = batch.len();
            activities.extend(batch);
            debug!(page, fetched, total = activities.len(), "fetched activity page");

            let reached_limit = query.limit.is_some_and(|l| activities.len() >= l);
            if fetched < per_page || reached_limit {
                break;
            }
        }

        if let Some(limit) = query.limit {
            activities.truncate(limit);
        }
        Ok(activities)
    }

    pub async fn create_activity(&self, activity: &NewActivity) -> Result<ActivitySummary> {
        let form = CreateActivityForm {
            name: &activity.name,
            activity_type: activity.kind.as_str(),
            sport_type: activity.kind.as_str(),
            start_date_local: activity
                .start_date_local
                .format("%Y-%m-%dT%H:%M:%S")
                .to_string(),
            elapsed_time: activity.elapsed_time,
            description: activity.description.as_deref(),
            distance: activity.distance,
            trainer: activity.trainer.into(),
            commute: activity.commute.into(),
        };

        let request = self
            .http
            .post(self.url("/activities"))
            .bearer_auth(&self.access_token)
            .form(&form);
        let created: ActivitySummary = self.execute(request).await?;
        info!(activity_id = created.id, name = %created.name, "activity created");
        Ok(created)
    }

    pub async fn update_activity(
        &self,
        activity_id: u64,
        update: &ActivityUpdate,
    ) -> Result<ActivitySummary> {
        let result = async {
            let response = self
                .client
                .put(self.url(&format!("/activities/{activity_id}")))
                .bearer_auth(&self.access_token)
                .form(update)
                .send()
                .await?;
            parse_json(self.check(response).await?).await
        }
        .await;
        record(result)
    }

    /// Send an activity file to `/uploads`. Processing is asynchronous; see
    /// [`StravaClient::wait_for_upload`].
    pub async fn upload_activity(&self, upload: &UploadRequest) -> Result<Upload> {
        let bytes = tokio::fs::read(&upload.path)
            .await
            .map_err(|e| StravaError::file_io(&upload.path, e))?;
        let file_name = upload
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("activity.{}", upload.data_type));

        let mut form = Form::new()
            .part(
                "file",
                Part::bytes(bytes)
                    .file_name(file_name)
                    .mime_str("application/octet-stream")?,
            )
            .text("data_type", upload.data_type.as_str());
        if let Some(name) = &upload.name {
            form = form.text("name", name.clone());
        }
        if let Some(description) = &upload.description {
            form = form.text("description", description.clone());
        }
        if let Some(kind) = upload.activity_type {
            form = form.text("activity_type", kind.as_str());
        }
        if let Some(external_id) = &upload.external_id {
            form = form.text("external_id", external_id.clone());
        }

        let request = self
            .http
            .post(self.url("/uploads"))
            .bearer_auth(&self.access_token)
            .multipart(form);
        let created: Upload = self.execute(request).await?;
        info!(upload_id = created.id, status = %created.status, "activity file uploaded");
        Ok(created)
    }

    pub async fn get_upload(&self, upload_id: u64) -> Result<Upload> {
        self.get_json(&format!("/uploads/{upload_id}"), &[]).await
    }

    /// Poll an upload until Strava has turned it into an activity.
    pub async fn wait_for_upload(&self, upload: Upload) -> Result<u64> {
        let started = Instant::now();
        let mut current = upload;

        loop {
            if let Some(error) = current.error.as_deref().filter(|e| !e.is_empty()) {
                return Err(StravaError::Upload(error.to_string()));
            }
            if let Some(activity_id) = current.activity_id {
                info!(upload_id = current.id, activity_id, "upload processed");
                return Ok(activity_id);
            }

            let waited = started.elapsed();
            if waited >= self.settings.upload_timeout {
                return Err(StravaError::UploadTimeout {
                    upload_id: current.id,
                    waited,
                });
            }

            debug!(upload_id = current.id, status = %current.status, "upload still processing");
            tokio::time::sleep(self.settings.upload_poll_interval).await;
            current = self.get_upload(current.id).await?;
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let result = async {
            let response = self
                .client
                .get(self.url(path))
                .bearer_auth(&self.access_token)
                .query(query)
                .send()
                .await?;
            parse_json(self.check(response).await?).await
        }
        .await;
        record(result)
    }

    async fn execute<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let result = async {
            let response = request.send().await?;
            parse_json(self.check(response).await?).await
        }
        .await;
        record(result)
    }

    async fn check(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status() == StatusCode::UNAUTHORIZED {
            let message = fault_message(response).await;
            return Err(StravaError::Unauthorized(message));
        }
        ensure_success(response).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.settings.api_url.trim_end_matches('/'))
    }
}

fn record<T>(result: Result<T>) -> Result<T> {
    match &result {
        Ok(_) => metrics::increment_strava_api_success(),
        Err(_) => metrics::increment_strava_api_failure(),
    }
    result
}

/// Turn a non-2xx response into [`StravaError::Api`], keeping the fault message.
pub(crate) async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = fault_message(response).await;
    Err(StravaError::Api { status, message })
}

pub(crate) async fn parse_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let body = response.text().await?;
    Ok(serde_json::from_str(&body)?)
}

async fn fault_message(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<Fault>(&body) {
        Ok(fault) => fault.to_string(),
        Err(_) if !body.trim().is_empty() => body.trim().to_string(),
        Err(_) => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
    }
}

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StravaError {
    #[error("HTTP {status}: {message}")]
    Api { status: StatusCode, message: String },
    #[error("Access token rejected: {0}")]
    Unauthorized(String),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Network error: {0}")]
    Middleware(#[from] reqwest_middleware::Error),
    #[error("IO error at {}: {source}", .path.display())]
    FileIo {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Credentials file, line {line}: {message}")]
    Credentials { line: usize, message: String },
    #[error("Credential `{0}` is missing from the credentials file")]
    MissingCredential(&'static str),
    #[error("No access token set; refresh the token first")]
    MissingAccessToken,
    #[error("Website login failed: {0}")]
    WebLogin(String),
    #[error("Upload failed: {0}")]
    Upload(String),
    #[error("Upload {upload_id} still processing after {waited:?}")]
    UploadTimeout { upload_id: u64, waited: Duration },
    #[error("Unsupported activity file type: {0}")]
    UnsupportedFileType(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl StravaError {
    pub(crate) fn file_io(path: &Path, source: std::io::Error) -> Self {
        StravaError::FileIo {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, StravaError>;

/// Error body returned by the Strava API on 4xx/5xx.
#[derive(Debug, Deserialize)]
pub struct Fault {
    pub message: String,
    #[serde(default)]
    pub errors: Vec<FaultDetail>,
}

#[derive(Debug, Deserialize)]
pub struct FaultDetail {
    #[serde(default)]
    pub resource: String,
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub code: String,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        let details: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}.{} {}", e.resource, e.field, e.code))
            .collect();
        if !details.is_empty() {
            write!(f, " ({})", details.join(", "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GearSummary {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub distance: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Athlete {
    pub id: u64,
    pub username: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub profile: Option<String>,
    #[serde(default)]
    pub bikes: Vec<GearSummary>,
    #[serde(default)]
    pub shoes: Vec<GearSummary>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ActivityTotal {
    pub count: u64,
    pub distance: f64,
    pub moving_time: u64,
    pub elapsed_time: u64,
    pub elevation_gain: f64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AthleteStats {
    pub all_run_totals: ActivityTotal,
    pub all_ride_totals: ActivityTotal,
    pub all_swim_totals: ActivityTotal,
    pub ytd_run_totals: ActivityTotal,
    pub ytd_ride_totals: ActivityTotal,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Gear {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub distance: f64,
    pub brand_name: Option<String>,
    pub model_name: Option<String>,
    pub description: Option<String>,
}

impl fmt::Display for Gear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)?;
        match (&self.brand_name, &self.model_name) {
            (Some(brand), Some(model)) => write!(f, " - {brand} {model}")?,
            (Some(brand), None) => write!(f, " - {brand}")?,
            _ => {}
        }
        write!(f, ", {:.1} km", self.distance / 1000.0)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ActivitySummary {
    pub id: u64,
    pub name: String,
    #[serde(rename = "type")]
    pub activity_type: String,
    pub sport_type: Option<String>,
    pub start_date_local: Option<DateTime<Utc>>,
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub moving_time: u64,
    #[serde(default)]
    pub elapsed_time: u64,
    #[serde(default)]
    pub kudos_count: u64,
    pub gear_id: Option<String>,
    #[serde(default)]
    pub trainer: bool,
    #[serde(default)]
    pub commute: bool,
    #[serde(default)]
    pub manual: bool,
    pub description: Option<String>,
}

/// Activity kinds this crate creates, uploads and filters on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    Run,
    Ride,
    VirtualRide,
    VirtualRun,
    Walk,
    Hike,
    Swim,
    Workout,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 8] = [
        ActivityKind::Run,
        ActivityKind::Ride,
        ActivityKind::VirtualRide,
        ActivityKind::VirtualRun,
        ActivityKind::Walk,
        ActivityKind::Hike,
        ActivityKind::Swim,
        ActivityKind::Workout,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Run => "Run",
            ActivityKind::Ride => "Ride",
            ActivityKind::VirtualRide => "VirtualRide",
            ActivityKind::VirtualRun => "VirtualRun",
            ActivityKind::Walk => "Walk",
            ActivityKind::Hike => "Hike",
            ActivityKind::Swim => "Swim",
            ActivityKind::Workout => "Workout",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        ActivityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown activity type `{s}`"))
    }
}

/// Selects which fetched activities to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityFilter {
    All,
    Kind(ActivityKind),
}

impl ActivityFilter {
    pub fn matches(&self, activity: &ActivitySummary) -> bool {
        match self {
            ActivityFilter::All => true,
            ActivityFilter::Kind(kind) => {
                activity.activity_type.eq_ignore_ascii_case(kind.as_str())
            }
        }
    }
}

impl FromStr for ActivityFilter {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(ActivityFilter::All)
        } else {
            s.parse().map(ActivityFilter::Kind)
        }
    }
}

/// Window and size of an activity listing.
#[derive(Debug, Clone, Default)]
pub struct ActivityQuery {
    pub before: Option<DateTime<Utc>>,
    pub after: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl ActivityQuery {
    pub fn latest(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }
}

/// A manually entered activity.
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub name: String,
    pub kind: ActivityKind,
    pub start_date_local: chrono::NaiveDateTime,
    pub elapsed_time: u64,
    pub description: Option<String>,
    /// Meters.
    pub distance: Option<f64>,
    pub trainer: bool,
    pub commute: bool,
}

/// Fields to change on an existing activity; unset fields are left alone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActivityUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sport_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gear_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trainer: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commute: Option<bool>,
}

/// File formats accepted by the upload endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileDataType {
    Fit,
    FitGz,
    Tcx,
    TcxGz,
    Gpx,
    GpxGz,
}

impl FileDataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileDataType::Fit => "fit",
            FileDataType::FitGz => "fit.gz",
            FileDataType::Tcx => "tcx",
            FileDataType::TcxGz => "tcx.gz",
            FileDataType::Gpx => "gpx",
            FileDataType::GpxGz => "gpx.gz",
        }
    }
}

impl fmt::Display for FileDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileDataType {
    type Err = StravaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "fit" => Ok(FileDataType::Fit),
            "fit.gz" => Ok(FileDataType::FitGz),
            "tcx" => Ok(FileDataType::Tcx),
            "tcx.gz" => Ok(FileDataType::TcxGz),
            "gpx" => Ok(FileDataType::Gpx),
            "gpx.gz" => Ok(FileDataType::GpxGz),
            other => Err(StravaError::UnsupportedFileType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub path: PathBuf,
    pub data_type: FileDataType,
    pub name: Option<String>,
    pub description: Option<String>,
    pub activity_type: Option<ActivityKind>,
    pub external_id: Option<String>,
}

/// Upload status as reported by `/uploads`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Upload {
    pub id: u64,
    pub id_str: Option<String>,
    pub external_id: Option<String>,
    pub error: Option<String>,
    #[serde(default)]
    pub status: String,
    pub activity_id: Option<u64>,
}

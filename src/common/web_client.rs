use crate::common::config::Settings;
use crate::common::credentials::Credentials;
use crate::common::metrics;
use crate::common::strava_client::ensure_success;
use crate::common::types::{Result, StravaError};
use futures::StreamExt;
use regex::Regex;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_DISPOSITION, LOCATION};
use reqwest::redirect::Policy;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

static INPUT_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<input\b[^>]*>").expect("valid input regex"));
static META_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<meta\b[^>]*>").expect("valid meta regex"));
static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("valid attribute regex")
});

/// Export formats offered by the activity page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataFormat {
    #[default]
    Original,
    Gpx,
    Tcx,
}

impl DataFormat {
    fn export_path(&self) -> &'static str {
        match self {
            DataFormat::Original => "export_original",
            DataFormat::Gpx => "export_gpx",
            DataFormat::Tcx => "export_tcx",
        }
    }

    /// Extension used when the server does not name the file.
    pub fn fallback_extension(&self) -> &'static str {
        match self {
            DataFormat::Original => "fit",
            DataFormat::Gpx => "gpx",
            DataFormat::Tcx => "tcx",
        }
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DataFormat::Original => "original",
            DataFormat::Gpx => "gpx",
            DataFormat::Tcx => "tcx",
        })
    }
}

impl FromStr for DataFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "original" => Ok(DataFormat::Original),
            "gpx" => Ok(DataFormat::Gpx),
            "tcx" => Ok(DataFormat::Tcx),
            other => Err(format!("unknown export format `{other}` (original, gpx, tcx)")),
        }
    }
}

/// An exported activity file whose body has not been read yet.
pub struct ActivityFile {
    pub filename: String,
    response: reqwest::Response,
}

impl ActivityFile {
    /// Stream the file into `dir` under its server-provided name.
    pub async fn save_to(self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(&self.filename);
        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| StravaError::file_io(&path, e))?;

        let mut stream = self.response.bytes_stream();
        let mut written = 0usize;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if chunk.is_empty() {
                break;
            }
            file.write_all(&chunk)
                .await
                .map_err(|e| StravaError::file_io(&path, e))?;
            written += chunk.len();
        }
        file.flush().await.map_err(|e| StravaError::file_io(&path, e))?;

        debug!(path = %path.display(), bytes = written, "activity file written");
        Ok(path)
    }

    pub async fn bytes(self) -> Result<Vec<u8>> {
        Ok(self.response.bytes().await?.to_vec())
    }
}

/// Logged-in session on the Strava website.
///
/// Covers what the public API does not offer: original file export and
/// activity deletion.
pub struct WebClient {
    http: reqwest::Client,
    settings: Settings,
    csrf_token: String,
}

impl WebClient {
    pub async fn login(email: &str, password: &str, settings: Settings) -> Result<Self> {
        let http = settings
            .http_client_builder()
            .cookie_store(true)
            .redirect(Policy::none())
            .build()?;

        let result = Self::establish_session(&http, &settings, email, password).await;
        let csrf_token = match result {
            Ok(token) => {
                metrics::increment_strava_web_success();
                token
            }
            Err(e) => {
                metrics::increment_strava_web_failure();
                return Err(e);
            }
        };

        info!(email, "logged into strava website");
        Ok(Self {
            http,
            settings,
            csrf_token,
        })
    }

    pub async fn from_credentials(credentials: &Credentials, settings: Settings) -> Result<Self> {
        Self::login(
            credentials.require_email()?,
            credentials.require_password()?,
            settings,
        )
        .await
    }

    async fn establish_session(
        http: &reqwest::Client,
        settings: &Settings,
        email: &str,
        password: &str,
    ) -> Result<String> {
        let login_page = ensure_success(http.get(web_url(settings, "/login")).send().await?)
            .await?
            .text()
            .await?;
        let utf8 =
            find_input_value(&login_page, "utf8").unwrap_or_else(|| "\u{2713}".to_string());
        let token = find_input_value(&login_page, "authenticity_token").ok_or_else(|| {
            StravaError::WebLogin("login page has no authenticity token".to_string())
        })?;

        let response = http
            .post(web_url(settings, "/session"))
            .form(&[
                ("utf8", utf8.as_str()),
                ("authenticity_token", token.as_str()),
                ("plan", ""),
                ("email", email),
                ("password", password),
            ])
            .send()
            .await?;
        if !redirects_to(&response, "/dashboard") {
            return Err(StravaError::WebLogin(format!(
                "unexpected response {} (wrong email or password?)",
                response.status()
            )));
        }

        let dashboard = ensure_success(http.get(web_url(settings, "/dashboard")).send().await?)
            .await?
            .text()
            .await?;
        find_meta_content(&dashboard, "csrf-token")
            .ok_or_else(|| StravaError::WebLogin("dashboard has no csrf token".to_string()))
    }

    /// Open the export of an activity; the body is streamed by [`ActivityFile::save_to`].
    pub async fn get_activity_data(
        &self,
        activity_id: u64,
        format: DataFormat,
    ) -> Result<ActivityFile> {
        let url = web_url(
            &self.settings,
            &format!("/activities/{activity_id}/{}", format.export_path()),
        );
        let response = self.http.get(url).send().await?;

        if response.status() != StatusCode::OK {
            metrics::increment_strava_web_failure();
            return Err(StravaError::Api {
                status: response.status(),
                message: format!("cannot export activity {activity_id} as {format}"),
            });
        }
        metrics::increment_strava_web_success();

        let filename = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(filename_from_disposition)
            .unwrap_or_else(|| format!("{activity_id}.{}", format.fallback_extension()));

        Ok(ActivityFile { filename, response })
    }

    pub async fn delete_activity(&self, activity_id: u64) -> Result<()> {
        let response = self
            .http
            .post(web_url(&self.settings, &format!("/activities/{activity_id}")))
            .form(&[
                ("_method", "delete"),
                ("authenticity_token", self.csrf_token.as_str()),
            ])
            .send()
            .await?;

        if !redirects_to(&response, "/athlete/training") {
            metrics::increment_strava_web_failure();
            return Err(StravaError::Api {
                status: response.status(),
                message: format!("failed to delete activity {activity_id}"),
            });
        }

        metrics::increment_strava_web_success();
        info!(activity_id, "activity deleted");
        Ok(())
    }
}

fn web_url(settings: &Settings, path: &str) -> String {
    format!("{}{path}", settings.web_url.trim_end_matches('/'))
}

fn redirects_to(response: &reqwest::Response, path: &str) -> bool {
    response.status() == StatusCode::FOUND
        && response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|location| location.trim_end_matches('/').ends_with(path))
}

fn tag_attributes(tag: &str) -> Vec<(String, String)> {
    ATTRIBUTE
        .captures_iter(tag)
        .map(|caps| {
            let value = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
            (caps[1].to_ascii_lowercase(), decode_entities(value))
        })
        .collect()
}

fn find_attribute(html: &str, tag: &Regex, key: (&str, &str), wanted: &str) -> Option<String> {
    tag.find_iter(html).find_map(|m| {
        let attributes = tag_attributes(m.as_str());
        let has_key = attributes.iter().any(|(name, value)| name == key.0 && value == key.1);
        if !has_key {
            return None;
        }
        attributes
            .into_iter()
            .find(|(name, _)| name == wanted)
            .map(|(_, value)| value)
    })
}

fn find_input_value(html: &str, name: &str) -> Option<String> {
    find_attribute(html, &INPUT_TAG, ("name", name), "value")
}

fn find_meta_content(html: &str, name: &str) -> Option<String> {
    find_attribute(html, &META_TAG, ("name", name), "content")
}

fn decode_entities(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }

    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let decoded = tail.find(';').and_then(|end| {
            let entity = &tail[1..end];
            let ch = match entity {
                "amp" => Some('&'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "lt" => Some('<'),
                "gt" => Some('>'),
                _ if entity.starts_with("#x") || entity.starts_with("#X") => {
                    u32::from_str_radix(&entity[2..], 16).ok().and_then(char::from_u32)
                }
                _ if entity.starts_with('#') => entity[1..].parse().ok().and_then(char::from_u32),
                _ => None,
            };
            ch.map(|c| (c, end))
        });
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Extract the file name from a `Content-Disposition` header value.
fn filename_from_disposition(header: &str) -> Option<String> {
    let params: Vec<&str> = header.split(';').map(str::trim).collect();

    let extended = params
        .iter()
        .find_map(|p| p.strip_prefix("filename*="))
        .and_then(|v| {
            let encoded = v.rsplit("''").next()?;
            urlencoding::decode(encoded.trim_matches('"')).ok()
        })
        .and_then(|name| sanitize_filename(&name));

    extended.or_else(|| {
        params
            .iter()
            .find_map(|p| p.strip_prefix("filename="))
            .and_then(|v| sanitize_filename(v.trim_matches('"')))
    })
}

/// Reduce a server-provided name to a bare file name.
fn sanitize_filename(name: &str) -> Option<String> {
    let name = name.rsplit(['/', '\\']).next()?.trim();
    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name.to_string())
    }
}

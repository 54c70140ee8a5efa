use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use strava_tools::activities::{
    create_manual_activity, delete_strava_activity, display_last_activity, display_n_activities,
    get_first_n_activities,
};
use strava_tools::common::oauth::{TokenResponse, refresh_access_token};
use strava_tools::common::types::{ActivityFilter, ActivityKind, NewActivity};
use strava_tools::common::web_client::DataFormat;
use strava_tools::display::{display_athlete, parse_duration};
use strava_tools::download::download_activity;
use strava_tools::upload::upload_existing_activity;
use strava_tools::{Credentials, Settings, StravaClient, WebClient};

#[derive(Parser)]
#[command(version, about = "Read, create, upload and delete Strava activities")]
struct Cli {
    /// Credentials file with `Key:Value` lines (ID, SecretClient, RefreshCode, Email, Password)
    #[arg(short, long, env = "STRAVA_CREDENTIALS", default_value = "credentials.txt")]
    credentials: PathBuf,

    /// Write a rotated refresh token back to the credentials file
    #[arg(long, env = "STRAVA_SAVE_CREDENTIALS")]
    save_credentials: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh the access token and print it
    Token,
    /// Show the athlete profile and all-time totals
    Athlete,
    /// Show the most recent activity with its gear
    Last,
    /// List the most recent activities
    List {
        /// Number of activities
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,
    },
    /// Search activities in a date window, oldest first
    Search {
        /// Only activities starting after this date (YYYY-MM-DD or RFC 3339)
        #[arg(long, value_parser = parse_date)]
        after: Option<DateTime<Utc>>,
        /// Only activities starting before this date (YYYY-MM-DD or RFC 3339)
        #[arg(long, value_parser = parse_date)]
        before: Option<DateTime<Utc>>,
        /// All, Run, Ride, VirtualRide, ...
        #[arg(short = 't', long = "type", default_value = "All")]
        filter: ActivityFilter,
        /// Maximum number of activities fetched
        #[arg(short = 'n', long, default_value_t = 30)]
        count: usize,
    },
    /// Create a manual activity
    Create {
        #[arg(long)]
        name: Option<String>,
        #[arg(short = 't', long = "type", default_value = "Run")]
        kind: ActivityKind,
        /// Elapsed time as H:MM:SS
        #[arg(long, value_parser = parse_duration, default_value = "1:04:05")]
        elapsed: u64,
        #[arg(long, default_value_t = 15.2)]
        distance_km: f64,
        #[arg(long)]
        description: Option<String>,
        /// Local start time (YYYY-MM-DDTHH:MM:SS), defaults to now
        #[arg(long, value_parser = parse_local_datetime)]
        start: Option<NaiveDateTime>,
    },
    /// Download an activity file through the website
    Download {
        /// Activity ID
        #[arg(short, long)]
        id: u64,
        /// original, gpx or tcx
        #[arg(short, long, default_value = "original")]
        format: DataFormat,
        /// Directory to save the file into
        #[arg(short, long = "output", default_value = ".")]
        output_dir: PathBuf,
    },
    /// Upload an exported activity file (fit, tcx, gpx, optionally gzipped)
    Upload {
        file: PathBuf,
        /// Upload as VirtualRide and attach the home trainer bike
        #[arg(long)]
        r#virtual: bool,
    },
    /// Delete an activity through the website
    Delete {
        /// Activity ID
        #[arg(short, long)]
        id: u64,
    },
}

fn parse_date(value: &str) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date.and_time(chrono::NaiveTime::MIN).and_utc());
    }
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| format!("invalid date `{value}`, expected YYYY-MM-DD or RFC 3339"))
}

fn parse_local_datetime(value: &str) -> std::result::Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .map_err(|_| format!("invalid start `{value}`, expected YYYY-MM-DDTHH:MM:SS"))
}

async fn refresh_token(
    settings: &Settings,
    credentials: &mut Credentials,
    credentials_path: &Path,
    save: bool,
) -> Result<TokenResponse> {
    let client = settings.retrying_http_client()?;
    let token = refresh_access_token(&client, settings, credentials)
        .await
        .context("Failed to refresh access token")?;
    println!("New token will expire at:\t{}", token.expiry_display());

    if save {
        credentials
            .save(credentials_path)
            .context("Failed to save credentials")?;
    }
    Ok(token)
}

async fn login(credentials: &Credentials, settings: &Settings) -> Result<WebClient> {
    WebClient::from_credentials(credentials, settings.clone())
        .await
        .context("Failed to log into the Strava website")
}

pub async fn cli_main() -> Result<()> {
    let args = Cli::parse();
    let settings = Settings::from_env()?;

    let mut credentials = Credentials::load(&args.credentials)?;
    let token = refresh_token(
        &settings,
        &mut credentials,
        &args.credentials,
        args.save_credentials,
    )
    .await?;
    let client = StravaClient::from_credentials(&credentials, settings.clone())?;

    match args.command {
        Commands::Token => {
            println!("Access Token = {}", token.access_token);
        }
        Commands::Athlete => display_athlete(&client).await?,
        Commands::Last => display_last_activity(&client).await?,
        Commands::List { count } => display_n_activities(&client, count).await?,
        Commands::Search {
            after,
            before,
            filter,
            count,
        } => {
            let activities = get_first_n_activities(&client, after, before, filter, count).await?;
            for activity in &activities {
                println!("{}", strava_tools::activities::activity_line(activity));
            }
            println!("{} activities", activities.len());
        }
        Commands::Create {
            name,
            kind,
            elapsed,
            distance_km,
            description,
            start,
        } => {
            let mut activity =
                NewActivity::sample_run(start.unwrap_or_else(|| Local::now().naive_local()));
            if let Some(name) = name {
                activity.name = name;
            }
            if description.is_some() {
                activity.description = description;
            }
            activity.kind = kind;
            activity.elapsed_time = elapsed;
            activity.distance = Some(distance_km * 1000.0);
            create_manual_activity(&client, &activity)
                .await
                .context("Failed to create activity")?;
        }
        Commands::Download {
            id,
            format,
            output_dir,
        } => {
            let web = login(&credentials, &settings).await?;
            download_activity(&web, id, format, &output_dir)
                .await
                .with_context(|| format!("Failed to download activity {id}"))?;
        }
        Commands::Upload { file, r#virtual } => {
            upload_existing_activity(&client, &file, r#virtual)
                .await
                .with_context(|| format!("Failed to upload {}", file.display()))?;
        }
        Commands::Delete { id } => {
            let activity = client
                .get_activity(id)
                .await
                .with_context(|| format!("Activity {id} not found"))?;
            let web = login(&credentials, &settings).await?;
            delete_strava_activity(&web, &activity).await?;
        }
    }

    Ok(())
}

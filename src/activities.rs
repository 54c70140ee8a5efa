use crate::common::strava_client::StravaClient;
use crate::common::types::{
    ActivityFilter, ActivityKind, ActivityQuery, ActivitySummary, NewActivity, Result,
};
use crate::common::web_client::WebClient;
use crate::display::format_duration;
use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::{info, warn};

impl NewActivity {
    /// The stock manual run: 15.2 km in 1:04:05, starting at `start`.
    pub fn sample_run(start: NaiveDateTime) -> Self {
        Self {
            name: "[fake] Test_API_Strava - Envoi via l'API Rust #GEEK".to_string(),
            kind: ActivityKind::Run,
            start_date_local: start,
            elapsed_time: 3845,
            description: Some(
                "Debut de l'utilisation de l'API, ça ouvre pleins de possibilite :P".to_string(),
            ),
            distance: Some(15_200.0),
            trainer: false,
            commute: false,
        }
    }
}

/// `{id} - {name} - {moving time}`
pub fn activity_line(activity: &ActivitySummary) -> String {
    format!(
        "{} - {} - {}",
        activity.id,
        activity.name,
        format_duration(activity.moving_time)
    )
}

pub async fn get_last_activity(client: &StravaClient) -> Result<Option<ActivitySummary>> {
    info!("fetching last activity");
    let activities = client.get_activities(&ActivityQuery::latest(1)).await?;
    Ok(activities.into_iter().next())
}

pub async fn display_activity(client: &StravaClient, activity: &ActivitySummary) -> Result<()> {
    println!("Last activity found:");
    println!(
        "{{id: {}, name: {:?}, kudos: {}, gear_id: {}}}",
        activity.id,
        activity.name,
        activity.kudos_count,
        activity.gear_id.as_deref().unwrap_or("None")
    );

    match activity.gear_id.as_deref() {
        Some(gear_id) => {
            let gear = client.get_gear(gear_id).await?;
            println!("Gear: {gear}");
        }
        None => println!("Gear: none"),
    }
    Ok(())
}

pub async fn display_last_activity(client: &StravaClient) -> Result<()> {
    println!("\nDisplay last activity");
    match get_last_activity(client).await? {
        Some(activity) => display_activity(client, &activity).await,
        None => {
            println!("No activity found");
            Ok(())
        }
    }
}

pub async fn display_n_activities(client: &StravaClient, count: usize) -> Result<()> {
    println!("\nDisplay last {count} activities");
    for activity in client.get_activities(&ActivityQuery::latest(count)).await? {
        println!("{}", activity_line(&activity));
    }
    Ok(())
}

/// Fetch up to `count` activities in the window, keep those passing `filter`
/// and return them in reverse fetch order (oldest first for the default listing).
pub async fn get_first_n_activities(
    client: &StravaClient,
    after: Option<DateTime<Utc>>,
    before: Option<DateTime<Utc>>,
    filter: ActivityFilter,
    count: usize,
) -> Result<Vec<ActivitySummary>> {
    info!(count, ?filter, "fetching activities");
    let query = ActivityQuery {
        before,
        after,
        limit: Some(count),
    };
    let activities = client.get_activities(&query).await?;
    Ok(select_activities(activities, filter))
}

fn select_activities(
    activities: Vec<ActivitySummary>,
    filter: ActivityFilter,
) -> Vec<ActivitySummary> {
    activities
        .into_iter()
        .rev()
        .filter(|activity| filter.matches(activity))
        .collect()
}

pub async fn create_manual_activity(
    client: &StravaClient,
    activity: &NewActivity,
) -> Result<ActivitySummary> {
    println!("\nCreating activity");
    let created = client.create_activity(activity).await?;
    println!(
        "Activity created, see {}",
        client.settings().activity_url(created.id)
    );
    Ok(created)
}

pub async fn delete_strava_activity(web: &WebClient, activity: &ActivitySummary) -> Result<()> {
    println!("Deleting activity: {} --- {}", activity.name, activity.id);
    web.delete_activity(activity.id)
        .await
        .inspect_err(|e| warn!(activity_id = activity.id, error = %e, "delete failed"))
}

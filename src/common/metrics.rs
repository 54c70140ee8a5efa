use metrics::counter;

/// Strava REST API calls
pub fn increment_strava_api_success() {
    counter!("strava_api_total", "result" => "success").increment(1);
}

pub fn increment_strava_api_failure() {
    counter!("strava_api_total", "result" => "failure").increment(1);
}

/// Website session calls (login, export, delete)
pub fn increment_strava_web_success() {
    counter!("strava_web_total", "result" => "success").increment(1);
}

pub fn increment_strava_web_failure() {
    counter!("strava_web_total", "result" => "failure").increment(1);
}

pub fn increment_token_refresh() {
    counter!("strava_token_refresh_total").increment(1);
}

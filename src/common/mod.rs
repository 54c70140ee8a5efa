pub mod config;
pub mod credentials;
pub mod metrics;
pub mod oauth;
pub mod strava_client;
pub mod types;
pub mod web_client;

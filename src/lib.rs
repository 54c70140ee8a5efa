pub mod activities;
pub mod common;
pub mod display;
pub mod download;
pub mod upload;

pub use common::config::Settings;
pub use common::credentials::Credentials;
pub use common::strava_client::StravaClient;
pub use common::types::{Result, StravaError};
pub use common::web_client::WebClient;

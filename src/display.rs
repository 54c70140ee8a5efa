use crate::common::strava_client::StravaClient;
use crate::common::types::{Athlete, AthleteStats, Result};

/// `H:MM:SS`, hours unbounded.
pub fn format_duration(seconds: u64) -> String {
    format!("{}:{:02}:{:02}", seconds / 3600, (seconds % 3600) / 60, seconds % 60)
}

/// Parse `H:MM:SS`, `MM:SS` or plain seconds.
pub fn parse_duration(value: &str) -> std::result::Result<u64, String> {
    let parts: Vec<&str> = value.trim().split(':').collect();
    if parts.len() > 3 || parts.iter().any(|p| p.is_empty()) {
        return Err(format!("invalid duration `{value}`, expected H:MM:SS"));
    }

    let mut seconds = 0u64;
    for (index, part) in parts.iter().enumerate() {
        let n: u64 = part
            .parse()
            .map_err(|_| format!("invalid duration `{value}`, expected H:MM:SS"))?;
        if index > 0 && n >= 60 {
            return Err(format!("invalid duration `{value}`, minutes and seconds must be < 60"));
        }
        seconds = seconds * 60 + n;
    }
    Ok(seconds)
}

pub fn format_km(meters: f64) -> String {
    format!("{:.1} km", meters / 1000.0)
}

pub fn athlete_report(athlete: &Athlete, stats: &AthleteStats) -> String {
    let or_unknown = |v: &Option<String>| v.clone().unwrap_or_else(|| "?".to_string());

    [
        format!(
            "Athlete's name is {} {}, based in {}, {}",
            or_unknown(&athlete.firstname),
            or_unknown(&athlete.lastname),
            or_unknown(&athlete.city),
            or_unknown(&athlete.country),
        ),
        format!("Photo URL {}", athlete.profile.as_deref().unwrap_or("-")),
        format!("all_run_totals : {}", format_km(stats.all_run_totals.distance)),
        format!("all_bike_totals : {}", format_km(stats.all_ride_totals.distance)),
    ]
    .join("\n")
}

pub async fn display_athlete(client: &StravaClient) -> Result<()> {
    let athlete = client.get_athlete().await?;
    let stats = client.get_athlete_stats(athlete.id).await?;

    println!("\n### Display Athlete ###");
    println!("{}", athlete_report(&athlete, &stats));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0:00:00");
        assert_eq!(format_duration(3845), "1:04:05");
        assert_eq!(format_duration(90_061), "25:01:01");
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("1:04:05"), Ok(3845));
        assert_eq!(parse_duration("45:00"), Ok(2700));
        assert_eq!(parse_duration("90"), Ok(90));
        assert!(parse_duration("1:75:00").is_err());
        assert!(parse_duration("1::00").is_err());
        assert!(parse_duration("a:b").is_err());
    }

    #[test]
    fn test_athlete_report() {
        let athlete: Athlete = serde_json::from_value(serde_json::json!({
            "id": 1,
            "firstname": "Marie",
            "lastname": "Curie",
            "city": "Paris",
            "country": "France",
            "profile": "https://example.com/p.jpg"
        }))
        .unwrap();
        let mut stats = AthleteStats::default();
        stats.all_run_totals.distance = 1_234_500.0;
        stats.all_ride_totals.distance = 10_000.0;

        let report = athlete_report(&athlete, &stats);
        assert!(report.starts_with("Athlete's name is Marie Curie, based in Paris, France"));
        assert!(report.contains("all_run_totals : 1234.5 km"));
        assert!(report.contains("all_bike_totals : 10.0 km"));
    }
}

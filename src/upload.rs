use crate::common::strava_client::StravaClient;
use crate::common::types::{
    ActivityKind, ActivityUpdate, FileDataType, GearSummary, Result, StravaError, UploadRequest,
};
use std::path::Path;
use tracing::info;

/// Bike name fragments that mark a home trainer.
const HOME_TRAINER_MARKERS: [&str; 2] = ["HT", "Home Trainer"];

/// Activity name and upload data type derived from a file name.
///
/// `Morning_Ride.fit.gz` becomes (`Morning Ride`, `fit.gz`).
pub fn describe_activity_file(path: &Path) -> Result<(String, FileDataType)> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| StravaError::UnsupportedFileType(path.display().to_string()))?;

    let (stem, extension) = match file_name.rsplit_once('.') {
        Some((rest, ext)) if ext.eq_ignore_ascii_case("gz") => match rest.rsplit_once('.') {
            Some((stem, inner)) => (stem, format!("{inner}.gz")),
            None => (rest, "gz".to_string()),
        },
        Some((stem, ext)) => (stem, ext.to_string()),
        None => (file_name, String::new()),
    };

    let data_type: FileDataType = extension.parse()?;
    Ok((stem.replace('_', " "), data_type))
}

/// First bike whose name marks it as a home trainer.
pub fn find_home_trainer(bikes: &[GearSummary]) -> Option<&GearSummary> {
    bikes
        .iter()
        .find(|bike| HOME_TRAINER_MARKERS.iter().any(|m| bike.name.contains(m)))
}

/// Upload a previously exported activity file and wait for Strava to process it.
///
/// Virtual rides are attached to the athlete's home trainer bike when one exists.
pub async fn upload_existing_activity(
    client: &StravaClient,
    activity_file: &Path,
    virtual_ride: bool,
) -> Result<u64> {
    println!("\nUploading activity");
    let (name, data_type) = describe_activity_file(activity_file)?;
    let kind = if virtual_ride {
        ActivityKind::VirtualRide
    } else {
        ActivityKind::Ride
    };

    println!("activity name : {name}");
    println!("data type     : {data_type}");

    let request = UploadRequest {
        path: activity_file.to_path_buf(),
        data_type,
        name: Some(name),
        description: None,
        activity_type: Some(kind),
        external_id: None,
    };
    let upload = client.upload_activity(&request).await?;
    println!("Upload {}: {}", upload.id, upload.status);

    let activity_id = client.wait_for_upload(upload).await?;
    println!(
        "Activity uploaded, see {}",
        client.settings().activity_url(activity_id)
    );

    if kind == ActivityKind::VirtualRide {
        let athlete = client.get_athlete().await?;
        match find_home_trainer(&athlete.bikes) {
            Some(bike) => {
                println!("Updating activity with bike {} {}", bike.name, bike.id);
                let update = ActivityUpdate {
                    gear_id: Some(bike.id.clone()),
                    ..ActivityUpdate::default()
                };
                client.update_activity(activity_id, &update).await?;
            }
            None => info!(activity_id, "no home trainer bike found; gear left unchanged"),
        }
    }

    Ok(activity_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bike(id: &str, name: &str) -> GearSummary {
        GearSummary {
            id: id.to_string(),
            name: name.to_string(),
            ..GearSummary::default()
        }
    }

    #[test]
    fn test_describe_activity_file() {
        let (name, data_type) =
            describe_activity_file(Path::new("/tmp/Zwift_Morning_Ride.fit")).unwrap();
        assert_eq!(name, "Zwift Morning Ride");
        assert_eq!(data_type, FileDataType::Fit);

        let (name, data_type) =
            describe_activity_file(Path::new("export/Col_du_Galibier.GPX.gz")).unwrap();
        assert_eq!(name, "Col du Galibier");
        assert_eq!(data_type, FileDataType::GpxGz);
    }

    #[test]
    fn test_describe_rejects_unknown_extensions() {
        assert!(matches!(
            describe_activity_file(Path::new("notes.txt")),
            Err(StravaError::UnsupportedFileType(_))
        ));
        assert!(describe_activity_file(Path::new("no_extension")).is_err());
    }

    #[test]
    fn test_find_home_trainer() {
        let bikes = vec![
            bike("b1", "Road bike"),
            bike("b2", "Tacx HT"),
            bike("b3", "Home Trainer"),
        ];
        assert_eq!(find_home_trainer(&bikes).map(|b| b.id.as_str()), Some("b2"));
        assert!(find_home_trainer(&bikes[..1]).is_none());
    }
}

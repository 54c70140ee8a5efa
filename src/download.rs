use crate::common::types::{Result, StravaError};
use crate::common::web_client::{DataFormat, WebClient};
use std::path::{Path, PathBuf};
use tracing::info;

/// Save the export of `activity_id` into `output_dir` using the server-provided name.
pub async fn download_activity(
    web: &WebClient,
    activity_id: u64,
    format: DataFormat,
    output_dir: &Path,
) -> Result<PathBuf> {
    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|e| StravaError::file_io(output_dir, e))?;

    let file = web.get_activity_data(activity_id, format).await?;
    info!(activity_id, filename = %file.filename, %format, "downloading activity file");

    let path = file.save_to(output_dir).await?;
    println!("Activity file saved to: {}", path.display());
    Ok(path)
}

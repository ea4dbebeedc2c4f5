//! Export fan-out runner.
//!
//! Runs every requested export target concurrently and folds each
//! completion into the persisted status array, so a status query during
//! the run always sees the latest per-target view.

use tokio::task::JoinSet;
use tracing::{error, info, warn};

use hark_models::{ExportStatus, ExportStatusSet, ExportType};
use hark_records::{TranscriptRecord, TranscriptStore};
use hark_storage::StorageClient;

use crate::drive::DriveClient;
use crate::error::{ExportError, ExportResult};

/// Media above this size is rejected rather than staged locally.
pub const MAX_MEDIA_EXPORT_BYTES: u64 = 10 * 1024 * 1024 * 1024;

const EXPIRED_MESSAGE: &str =
    "Failed to export transcript - file has expired. Please re-upload the file and try again.";
const FETCH_FAILED_MESSAGE: &str = "Failed to fetch transcript. Please contact support";
const MEDIA_TOO_LARGE_MESSAGE: &str = "Media file too large to export to google drive. \
     Please manually download the file and upload using the google drive UI";

/// One export request against a stored transcript.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    /// Job id the transcript record is keyed by
    pub transcript_id: String,
    /// Targets to export, in the order the caller wants them reported
    pub items: Vec<ExportType>,
    /// Drive folder receiving the exports
    pub folder_id: String,
}

/// Runs requested exports for stored transcripts.
pub struct Exporter {
    store: TranscriptStore,
    storage: StorageClient,
    media_limit_bytes: u64,
}

impl Exporter {
    pub fn new(store: TranscriptStore, storage: StorageClient) -> Self {
        Self {
            store,
            storage,
            media_limit_bytes: MAX_MEDIA_EXPORT_BYTES,
        }
    }

    /// Override the media size ceiling.
    pub fn with_media_limit(mut self, bytes: u64) -> Self {
        self.media_limit_bytes = bytes;
        self
    }

    /// Run all requested targets and return the final status set.
    ///
    /// Targets run independently; one failing neither cancels nor blocks
    /// the others. The status array is persisted after initialization and
    /// after every completion.
    pub async fn run(
        &self,
        drive: &DriveClient,
        request: &ExportRequest,
    ) -> ExportResult<ExportStatusSet> {
        let record = self
            .store
            .get_record(&request.transcript_id)
            .await?
            .ok_or_else(|| ExportError::RecordNotFound(request.transcript_id.clone()))?;

        let mut statuses = ExportStatusSet::initialize(&request.items);
        self.store.set_export_statuses(&record.id, &statuses).await?;

        let mut tasks = JoinSet::new();
        for target in request.items.iter().copied() {
            let storage = self.storage.clone();
            let drive = drive.clone();
            let record = record.clone();
            let folder_id = request.folder_id.clone();
            let limit = self.media_limit_bytes;

            tasks.spawn(async move {
                match target {
                    ExportType::Text | ExportType::Srt => {
                        export_transcript_to_doc(storage, drive, record, target, folder_id).await
                    }
                    ExportType::SourceMedia => {
                        export_media_to_drive(storage, drive, record, folder_id, limit).await
                    }
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let status = match joined {
                Ok(status) => status,
                Err(e) => {
                    error!("Export task failed to complete: {}", e);
                    continue;
                }
            };
            statuses = statuses.update(status);
            self.store.set_export_statuses(&record.id, &statuses).await?;
        }

        // A task that never reported still has to leave its entry
        // terminal; nothing downstream polls a stuck in-progress row.
        let unresolved: Vec<ExportType> = statuses
            .statuses()
            .iter()
            .filter(|s| !s.is_terminal())
            .map(|s| s.export_type)
            .collect();
        for target in unresolved {
            statuses = statuses.update(ExportStatus::failure(target, "Export failed unexpectedly"));
            self.store.set_export_statuses(&record.id, &statuses).await?;
        }

        Ok(statuses)
    }
}

/// Document title for a transcript export.
pub fn doc_title(original_filename: &str, target: ExportType, is_translation: bool) -> String {
    format!(
        "{} transcript{}{}",
        original_filename,
        if matches!(target, ExportType::Srt) {
            " with timecodes"
        } else {
            ""
        },
        if is_translation {
            " (English translation)"
        } else {
            ""
        },
    )
}

/// File name presented in Drive; uploads need an extension even though
/// stored objects are keyed without one.
pub fn drive_file_name(original_filename: &str, extension: Option<&str>) -> String {
    let extension = extension.unwrap_or("mp4");
    if original_filename.ends_with(&format!(".{extension}")) {
        original_filename.to_string()
    } else {
        format!("{original_filename}.{extension}")
    }
}

async fn export_transcript_to_doc(
    storage: StorageClient,
    drive: DriveClient,
    record: TranscriptRecord,
    target: ExportType,
    folder_id: String,
) -> ExportStatus {
    let key = match target {
        ExportType::Srt => record.transcript_keys.srt.clone(),
        _ => record.transcript_keys.text.clone(),
    };

    let text = match storage.get_object_text(&key).await {
        Ok(text) => text,
        Err(e) if e.is_not_found() => {
            warn!("Transcript object {} is gone", key);
            return ExportStatus::failure(target, EXPIRED_MESSAGE);
        }
        Err(e) => {
            error!("Failed to fetch transcript {}: {}", key, e);
            return ExportStatus::failure(target, FETCH_FAILED_MESSAGE);
        }
    };

    let title = doc_title(&record.original_filename, target, record.is_translation);
    match drive.create_doc(&folder_id, &title, &text).await {
        Ok(id) => {
            info!("Transcript export complete, document id: {}", id);
            ExportStatus::success(target, id)
        }
        Err(e) => {
            error!("Failed to create document for transcript {}: {}", record.id, e);
            ExportStatus::failure(
                target,
                format!("Failed to create document for transcript {}", record.id),
            )
        }
    }
}

async fn export_media_to_drive(
    storage: StorageClient,
    drive: DriveClient,
    record: TranscriptRecord,
    folder_id: String,
    limit: u64,
) -> ExportStatus {
    info!("Starting source media export");

    // An unreadable size skips the ceiling check; the download below
    // surfaces whatever is actually wrong.
    match storage.object_size(&record.id).await {
        Ok(size) if size > limit => {
            return ExportStatus::failure(ExportType::SourceMedia, MEDIA_TOO_LARGE_MESSAGE);
        }
        Ok(_) => {}
        Err(e) => warn!("Could not read media size for {}: {}", record.id, e),
    }

    let scratch = match tempfile::tempdir() {
        Ok(dir) => dir,
        Err(e) => {
            error!("Could not create scratch directory: {}", e);
            return ExportStatus::failure(
                ExportType::SourceMedia,
                "Failed to stage media for export",
            );
        }
    };
    let staged = scratch.path().join(record.id.replace('/', "_"));

    if let Err(e) = storage.download_file(&record.id, &staged).await {
        if e.is_not_found() {
            return ExportStatus::failure(ExportType::SourceMedia, EXPIRED_MESSAGE);
        }
        error!("Failed to stage media for {}: {}", record.id, e);
        return ExportStatus::failure(
            ExportType::SourceMedia,
            format!("Failed to export media: {}", e),
        );
    }

    let file_name = drive_file_name(&record.original_filename, None);
    match drive
        .upload_media(&folder_id, &file_name, "application/octet-stream", &staged)
        .await
    {
        Ok(id) => {
            info!("Source media export complete, file id: {}", id);
            ExportStatus::success(ExportType::SourceMedia, id)
        }
        Err(e) => {
            error!("Failed to upload media for {}: {}", record.id, e);
            ExportStatus::failure(
                ExportType::SourceMedia,
                format!("Failed to export media: {}", e),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_titles() {
        assert_eq!(
            doc_title("interview.mp3", ExportType::Text, false),
            "interview.mp3 transcript"
        );
        assert_eq!(
            doc_title("interview.mp3", ExportType::Srt, false),
            "interview.mp3 transcript with timecodes"
        );
        assert_eq!(
            doc_title("interview.mp3", ExportType::Text, true),
            "interview.mp3 transcript (English translation)"
        );
        assert_eq!(
            doc_title("interview.mp3", ExportType::Srt, true),
            "interview.mp3 transcript with timecodes (English translation)"
        );
    }

    #[test]
    fn test_drive_file_name_extension_handling() {
        assert_eq!(drive_file_name("talk.mp4", None), "talk.mp4");
        assert_eq!(drive_file_name("talk", None), "talk.mp4");
        assert_eq!(drive_file_name("talk.mov", None), "talk.mov.mp4");
        assert_eq!(drive_file_name("talk.mov", Some("mov")), "talk.mov");
        assert_eq!(drive_file_name("talk", Some("mov")), "talk.mov");
    }
}

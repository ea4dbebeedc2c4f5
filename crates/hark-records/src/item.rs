//! Transcript record shape and DynamoDB attribute mapping.

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, Utc};

use hark_models::{ExportState, ExportStatus, ExportStatusSet, ExportType, OutputKeys};

use crate::error::{RecordsError, RecordsResult};

/// One completed transcription, keyed by job id.
///
/// Attribute names match the wire casing of the job and result messages
/// so the table reads the same as the queue traffic.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptRecord {
    pub id: String,
    pub original_filename: String,
    pub transcript_keys: OutputKeys,
    pub user_email: String,
    pub completed_at: DateTime<Utc>,
    /// Outputs are an English translation of the source audio
    pub is_translation: bool,
    pub language_code: Option<String>,
    pub export_statuses: Option<ExportStatusSet>,
}

impl TranscriptRecord {
    /// Map to DynamoDB attributes.
    pub fn to_attributes(&self) -> HashMap<String, AttributeValue> {
        let mut item = HashMap::new();
        item.insert("id".to_string(), AttributeValue::S(self.id.clone()));
        item.insert(
            "originalFilename".to_string(),
            AttributeValue::S(self.original_filename.clone()),
        );
        item.insert(
            "transcriptKeys".to_string(),
            AttributeValue::M(HashMap::from([
                (
                    "srt".to_string(),
                    AttributeValue::S(self.transcript_keys.srt.clone()),
                ),
                (
                    "text".to_string(),
                    AttributeValue::S(self.transcript_keys.text.clone()),
                ),
                (
                    "json".to_string(),
                    AttributeValue::S(self.transcript_keys.json.clone()),
                ),
            ])),
        );
        item.insert(
            "userEmail".to_string(),
            AttributeValue::S(self.user_email.clone()),
        );
        item.insert(
            "completedAt".to_string(),
            AttributeValue::S(self.completed_at.to_rfc3339()),
        );
        item.insert(
            "isTranslation".to_string(),
            AttributeValue::Bool(self.is_translation),
        );
        if let Some(code) = &self.language_code {
            item.insert("languageCode".to_string(), AttributeValue::S(code.clone()));
        }
        if let Some(statuses) = &self.export_statuses {
            item.insert("exportStatuses".to_string(), statuses_to_attribute(statuses));
        }
        item
    }

    /// Map from DynamoDB attributes.
    pub fn from_attributes(item: &HashMap<String, AttributeValue>) -> RecordsResult<Self> {
        let keys = item
            .get("transcriptKeys")
            .and_then(|v| v.as_m().ok())
            .ok_or_else(|| RecordsError::malformed("transcriptKeys", "missing or not a map"))?;

        Ok(Self {
            id: required_string(item, "id")?,
            original_filename: required_string(item, "originalFilename")?,
            transcript_keys: OutputKeys {
                srt: required_string(keys, "srt")?,
                text: required_string(keys, "text")?,
                json: required_string(keys, "json")?,
            },
            user_email: required_string(item, "userEmail")?,
            completed_at: required_string(item, "completedAt")?
                .parse::<DateTime<Utc>>()
                .map_err(|e| RecordsError::malformed("completedAt", e.to_string()))?,
            is_translation: item
                .get("isTranslation")
                .and_then(|v| v.as_bool().ok())
                .copied()
                .unwrap_or(false),
            language_code: optional_string(item, "languageCode"),
            export_statuses: item
                .get("exportStatuses")
                .map(attribute_to_statuses)
                .transpose()?,
        })
    }
}

/// Serialize the status array as a native list of maps so the table
/// stores the same shape clients read over the wire.
pub fn statuses_to_attribute(statuses: &ExportStatusSet) -> AttributeValue {
    let entries = statuses
        .statuses()
        .iter()
        .map(|status| {
            let mut entry = HashMap::new();
            entry.insert(
                "exportType".to_string(),
                AttributeValue::S(status.export_type.as_str().to_string()),
            );
            match &status.state {
                ExportState::InProgress => {
                    entry.insert(
                        "status".to_string(),
                        AttributeValue::S("in-progress".to_string()),
                    );
                }
                ExportState::Success { id } => {
                    entry.insert("status".to_string(), AttributeValue::S("success".to_string()));
                    entry.insert("id".to_string(), AttributeValue::S(id.clone()));
                }
                ExportState::Failure { message } => {
                    entry.insert("status".to_string(), AttributeValue::S("failure".to_string()));
                    entry.insert("message".to_string(), AttributeValue::S(message.clone()));
                }
            }
            AttributeValue::M(entry)
        })
        .collect();

    AttributeValue::L(entries)
}

/// Parse the status array back out of its attribute form.
pub fn attribute_to_statuses(value: &AttributeValue) -> RecordsResult<ExportStatusSet> {
    let entries = value
        .as_l()
        .map_err(|_| RecordsError::malformed("exportStatuses", "not a list"))?;

    let mut statuses = Vec::with_capacity(entries.len());
    for entry in entries {
        let map = entry
            .as_m()
            .map_err(|_| RecordsError::malformed("exportStatuses", "entry is not a map"))?;

        let export_type = parse_export_type(&required_string(map, "exportType")?)?;
        let status = match required_string(map, "status")?.as_str() {
            "in-progress" => ExportStatus::in_progress(export_type),
            "success" => ExportStatus::success(export_type, required_string(map, "id")?),
            "failure" => ExportStatus::failure(export_type, required_string(map, "message")?),
            other => {
                return Err(RecordsError::malformed(
                    "exportStatuses",
                    format!("unknown status {}", other),
                ))
            }
        };
        statuses.push(status);
    }

    Ok(ExportStatusSet::from(statuses))
}

fn parse_export_type(raw: &str) -> RecordsResult<ExportType> {
    match raw {
        "text" => Ok(ExportType::Text),
        "srt" => Ok(ExportType::Srt),
        "source-media" => Ok(ExportType::SourceMedia),
        other => Err(RecordsError::malformed(
            "exportType",
            format!("unknown export type {}", other),
        )),
    }
}

fn required_string(
    item: &HashMap<String, AttributeValue>,
    name: &str,
) -> RecordsResult<String> {
    item.get(name)
        .and_then(|v| v.as_s().ok())
        .cloned()
        .ok_or_else(|| RecordsError::malformed(name, "missing or not a string"))
}

fn optional_string(item: &HashMap<String, AttributeValue>, name: &str) -> Option<String> {
    item.get(name).and_then(|v| v.as_s().ok()).cloned()
}

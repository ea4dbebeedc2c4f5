//! Google Drive and Docs client.
//!
//! Thin reqwest wrapper over the Drive v3 and Docs v1 REST APIs,
//! authorized with a caller-supplied OAuth bearer token.

use std::path::Path;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ExportError, ExportResult};

const DRIVE_BASE: &str = "https://www.googleapis.com";
const DOCS_BASE: &str = "https://docs.googleapis.com";

const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
const DOC_MIME: &str = "application/vnd.google-apps.document";

/// Drive client bound to one user token.
#[derive(Clone)]
pub struct DriveClient {
    client: Client,
    token: String,
    drive_base: String,
    docs_base: String,
}

#[derive(Debug, Serialize)]
struct FileMetadata {
    name: String,
    #[serde(rename = "mimeType")]
    mime_type: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    parents: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct FileResource {
    id: String,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<FileResource>,
}

#[derive(Debug, Serialize)]
struct BatchUpdateRequest {
    requests: Vec<DocRequest>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum DocRequest {
    InsertText(InsertText),
    UpdateParagraphStyle(UpdateParagraphStyle),
}

#[derive(Debug, Serialize)]
struct InsertText {
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<Location>,
    #[serde(
        rename = "endOfSegmentLocation",
        skip_serializing_if = "Option::is_none"
    )]
    end_of_segment_location: Option<EndOfSegment>,
}

#[derive(Debug, Serialize)]
struct Location {
    index: i64,
}

#[derive(Debug, Serialize)]
struct EndOfSegment {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateParagraphStyle {
    paragraph_style: ParagraphStyle,
    fields: String,
    range: Range,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ParagraphStyle {
    named_style_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Range {
    start_index: i64,
    end_index: i64,
}

impl DriveClient {
    /// Create a client against the public Google endpoints.
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base_urls(token, DRIVE_BASE, DOCS_BASE)
    }

    /// Create a client against custom endpoints.
    pub fn with_base_urls(
        token: impl Into<String>,
        drive_base: impl Into<String>,
        docs_base: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            token: token.into(),
            drive_base: drive_base.into(),
            docs_base: docs_base.into(),
        }
    }

    /// Find a folder by name, creating it when absent. Multiple folders
    /// can share a name; the first match wins.
    pub async fn get_or_create_folder(&self, name: &str) -> ExportResult<String> {
        let query = format!(
            "mimeType='{FOLDER_MIME}' and name ='{name}' and trashed=false"
        );

        let response = self
            .client
            .get(format!("{}/drive/v3/files", self.drive_base))
            .bearer_auth(&self.token)
            .query(&[("q", query.as_str()), ("spaces", "drive")])
            .send()
            .await
            .map_err(|e| ExportError::drive_request(e.to_string()))?;

        let list: FileList = check(response)
            .await?
            .json()
            .await
            .map_err(|e| ExportError::drive_request(e.to_string()))?;

        if let Some(first) = list.files.first() {
            return Ok(first.id.clone());
        }

        let response = self
            .client
            .post(format!("{}/drive/v3/files", self.drive_base))
            .bearer_auth(&self.token)
            .query(&[("fields", "id")])
            .json(&FileMetadata {
                name: name.to_string(),
                mime_type: FOLDER_MIME.to_string(),
                parents: Vec::new(),
            })
            .send()
            .await
            .map_err(|e| ExportError::drive_request(e.to_string()))?;

        let created: FileResource = check(response)
            .await?
            .json()
            .await
            .map_err(|e| ExportError::drive_request(e.to_string()))?;

        info!("Created folder {} ({})", name, created.id);
        Ok(created.id)
    }

    /// Create a Google Doc under a folder with a heading and body text.
    pub async fn create_doc(
        &self,
        folder_id: &str,
        title: &str,
        body: &str,
    ) -> ExportResult<String> {
        let response = self
            .client
            .post(format!("{}/drive/v3/files", self.drive_base))
            .bearer_auth(&self.token)
            .query(&[("supportsAllDrives", "true")])
            .json(&FileMetadata {
                name: title.to_string(),
                mime_type: DOC_MIME.to_string(),
                parents: vec![folder_id.to_string()],
            })
            .send()
            .await
            .map_err(|e| ExportError::drive_request(e.to_string()))?;

        let doc_id = check(response)
            .await?
            .json::<FileResource>()
            .await
            .map_err(|e| ExportError::drive_request(e.to_string()))?
            .id;

        // Docs ranges count UTF-16 code units, not bytes.
        let title_units = title.encode_utf16().count() as i64;
        let batch = BatchUpdateRequest {
            requests: vec![
                DocRequest::InsertText(InsertText {
                    text: title.to_string(),
                    location: Some(Location { index: 1 }),
                    end_of_segment_location: None,
                }),
                DocRequest::InsertText(InsertText {
                    text: format!("\n{}", body),
                    location: None,
                    end_of_segment_location: Some(EndOfSegment {}),
                }),
                DocRequest::UpdateParagraphStyle(UpdateParagraphStyle {
                    paragraph_style: ParagraphStyle {
                        named_style_type: "HEADING_1".to_string(),
                    },
                    fields: "namedStyleType".to_string(),
                    range: Range {
                        start_index: 1,
                        end_index: title_units,
                    },
                }),
            ],
        };

        let response = self
            .client
            .post(format!("{}/v1/documents/{}:batchUpdate", self.docs_base, doc_id))
            .bearer_auth(&self.token)
            .json(&batch)
            .send()
            .await
            .map_err(|e| ExportError::drive_request(e.to_string()))?;
        check(response).await?;

        info!("Created document {}", doc_id);
        Ok(doc_id)
    }

    /// Upload a file under a folder via the multipart endpoint.
    pub async fn upload_media(
        &self,
        folder_id: &str,
        file_name: &str,
        mime_type: &str,
        path: impl AsRef<Path>,
    ) -> ExportResult<String> {
        let bytes = tokio::fs::read(path.as_ref()).await?;
        let metadata = serde_json::to_string(&FileMetadata {
            name: file_name.to_string(),
            mime_type: mime_type.to_string(),
            parents: vec![folder_id.to_string()],
        })?;

        let boundary = format!("upload-{}", uuid::Uuid::new_v4().simple());
        let mut body = Vec::with_capacity(bytes.len() + metadata.len() + 256);
        body.extend_from_slice(
            format!("--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n")
                .as_bytes(),
        );
        body.extend_from_slice(format!("--{boundary}\r\nContent-Type: {mime_type}\r\n\r\n").as_bytes());
        body.extend_from_slice(&bytes);
        body.extend_from_slice(format!("\r\n--{boundary}--").as_bytes());

        let response = self
            .client
            .post(format!("{}/upload/drive/v3/files", self.drive_base))
            .bearer_auth(&self.token)
            .query(&[("uploadType", "multipart"), ("supportsAllDrives", "true")])
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body)
            .send()
            .await
            .map_err(|e| ExportError::drive_request(e.to_string()))?;

        let id = check(response)
            .await?
            .json::<FileResource>()
            .await
            .map_err(|e| ExportError::drive_request(e.to_string()))?
            .id;

        info!("Uploaded media, file id: {}", id);
        Ok(id)
    }
}

async fn check(response: reqwest::Response) -> ExportResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(ExportError::DriveStatus {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mock_client(server: &MockServer) -> DriveClient {
        DriveClient::with_base_urls("test-token", server.uri(), server.uri())
    }

    #[tokio::test]
    async fn test_create_doc_creates_then_fills() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/drive/v3/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "doc-1"})))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v1/documents/doc-1:batchUpdate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let client = mock_client(&server).await;
        let id = client
            .create_doc("folder-1", "clip.mp4 transcript", "hello there")
            .await
            .unwrap();

        assert_eq!(id, "doc-1");
    }

    #[tokio::test]
    async fn test_upload_media_hits_multipart_endpoint() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/upload/drive/v3/files"))
            .and(query_param("uploadType", "multipart"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "file-9"})))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("clip.mp4");
        std::fs::write(&media, b"not really a video").unwrap();

        let client = mock_client(&server).await;
        let id = client
            .upload_media("folder-1", "clip.mp4", "application/octet-stream", &media)
            .await
            .unwrap();

        assert_eq!(id, "file-9");
    }

    #[tokio::test]
    async fn test_existing_folder_is_reused() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/drive/v3/files"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"files": [{"id": "fold-1"}]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/drive/v3/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "fold-new"})))
            .expect(0)
            .mount(&server)
            .await;

        let client = mock_client(&server).await;
        let id = client.get_or_create_folder("Hark Transcripts").await.unwrap();

        assert_eq!(id, "fold-1");
    }

    #[tokio::test]
    async fn test_error_status_is_surfaced() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/drive/v3/files"))
            .respond_with(ResponseTemplate::new(403).set_body_string("insufficient scope"))
            .mount(&server)
            .await;

        let client = mock_client(&server).await;
        let err = client
            .create_doc("folder-1", "title", "body")
            .await
            .unwrap_err();

        match err {
            ExportError::DriveStatus { status, body } => {
                assert_eq!(status, 403);
                assert!(body.contains("insufficient scope"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

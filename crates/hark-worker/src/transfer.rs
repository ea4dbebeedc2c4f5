//! HTTP media and artifact transfer.
//!
//! The input media arrives over a time-boxed GET URL and the artifact
//! set leaves over time-boxed PUT URLs. Media is streamed to disk;
//! transcripts are small enough to buffer whole.

use std::path::Path;

use tokio::io::AsyncWriteExt;
use tracing::info;

use hark_media::Transcription;
use hark_models::{DestinationRef, Job, OutputKeys};

use crate::error::{WorkerError, WorkerResult};

/// Stream an HTTP response body to a local file. Returns bytes written.
pub async fn download_to_file(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
) -> WorkerResult<u64> {
    let mut response = client
        .get(url)
        .send()
        .await
        .map_err(|e| WorkerError::download_failed(e.to_string()))?;

    if !response.status().is_success() {
        return Err(WorkerError::download_failed(format!(
            "GET returned {}",
            response.status()
        )));
    }

    let mut file = tokio::fs::File::create(dest).await?;
    let mut written: u64 = 0;
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| WorkerError::download_failed(e.to_string()))?
    {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    info!("Downloaded {} bytes to {}", written, dest.display());
    Ok(written)
}

/// PUT one local file to a destination URL.
pub async fn upload_file(client: &reqwest::Client, url: &str, path: &Path) -> WorkerResult<()> {
    let contents = tokio::fs::read(path).await?;
    let response = client
        .put(url)
        .body(contents)
        .send()
        .await
        .map_err(|e| WorkerError::upload_failed(e.to_string()))?;

    if !response.status().is_success() {
        return Err(WorkerError::upload_failed(format!(
            "PUT of {} returned {}",
            path.display(),
            response.status()
        )));
    }
    Ok(())
}

/// Upload the three artifacts in order. The first failure aborts the
/// set; a partial artifact set is never reported as success.
pub async fn upload_artifacts(
    client: &reqwest::Client,
    job: &Job,
    transcription: &Transcription,
) -> WorkerResult<OutputKeys> {
    let targets: [(&DestinationRef, &Path, &str); 3] = [
        (&job.destination_refs.srt, transcription.srt_path.as_path(), "srt"),
        (&job.destination_refs.text, transcription.text_path.as_path(), "text"),
        (&job.destination_refs.json, transcription.json_path.as_path(), "json"),
    ];

    for (dest, path, label) in targets {
        upload_file(client, &dest.url, path).await?;
        info!("Uploaded {} artifact to {}", label, dest.key);
    }

    Ok(job.output_keys())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use hark_models::{DestinationRefs, JobId};
    use wiremock::matchers::{body_string, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn job_against(server_uri: &str) -> Job {
        let dest = |suffix: &str, key: &str| DestinationRef {
            url: format!("{}/{}", server_uri, suffix),
            key: key.to_string(),
        };
        Job {
            id: JobId::from_string("uploads/user/a.mp3"),
            original_filename: "a.mp3".to_string(),
            input_ref: format!("{}/media/a.mp3", server_uri),
            destination_refs: DestinationRefs {
                srt: dest("out/srt", "srt/a.srt"),
                text: dest("out/text", "text/a.txt"),
                json: dest("out/json", "json/a.json"),
            },
            sent_timestamp: Utc::now(),
            user_email: "user@example.com".to_string(),
            language_code: "auto".to_string(),
            translate: false,
        }
    }

    fn transcription_in(dir: &Path) -> Transcription {
        let write = |name: &str, contents: &str| {
            let p = dir.join(name);
            std::fs::write(&p, contents).unwrap();
            p
        };
        Transcription {
            srt_path: write("a.srt", "1\n00:00 --> 00:01\nhi\n"),
            text_path: write("a.txt", "hi\n"),
            json_path: write("a.json", "{}"),
            detected_language: Some("en".to_string()),
            load_time_ms: None,
            total_time_ms: None,
        }
    }

    #[tokio::test]
    async fn test_download_writes_body_to_disk() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/media/a.mp3"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"media-bytes".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a.mp3");
        let client = reqwest::Client::new();
        let written = download_to_file(&client, &format!("{}/media/a.mp3", server.uri()), &dest)
            .await
            .unwrap();

        assert_eq!(written, 11);
        assert_eq!(std::fs::read(&dest).unwrap(), b"media-bytes");
    }

    #[tokio::test]
    async fn test_download_rejects_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = reqwest::Client::new();
        let result = download_to_file(&client, &server.uri(), &dir.path().join("x")).await;
        assert!(matches!(result, Err(WorkerError::DownloadFailed(_))));
    }

    #[tokio::test]
    async fn test_upload_puts_file_contents() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/out/srt"))
            .and(body_string("1\n00:00 --> 00:01\nhi\n"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.srt");
        std::fs::write(&file, "1\n00:00 --> 00:01\nhi\n").unwrap();

        let client = reqwest::Client::new();
        upload_file(&client, &format!("{}/out/srt", server.uri()), &file)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_upload_surfaces_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "hi").unwrap();

        let client = reqwest::Client::new();
        let result = upload_file(&client, &server.uri(), &file).await;
        assert!(matches!(result, Err(WorkerError::UploadFailed(_))));
    }

    #[tokio::test]
    async fn test_artifact_upload_is_all_or_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/out/srt"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/out/text"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/out/json"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let job = job_against(&server.uri());
        let transcription = transcription_in(dir.path());

        let client = reqwest::Client::new();
        let result = upload_artifacts(&client, &job, &transcription).await;
        assert!(matches!(result, Err(WorkerError::UploadFailed(_))));
    }

    #[tokio::test]
    async fn test_artifact_upload_returns_destination_keys() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(3)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let job = job_against(&server.uri());
        let transcription = transcription_in(dir.path());

        let client = reqwest::Client::new();
        let keys = upload_artifacts(&client, &job, &transcription).await.unwrap();
        assert_eq!(keys.srt, "srt/a.srt");
        assert_eq!(keys.text, "text/a.txt");
        assert_eq!(keys.json, "json/a.json");
    }
}

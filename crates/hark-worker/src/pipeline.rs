//! Media processing pipeline.
//!
//! Ordered fail-fast stages over a per-job scratch directory. Every
//! error is classified into a [`ProcessingOutcome`] here; nothing below
//! the pipeline leaks raw errors to the executor.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use hark_media::{convert_to_wav, transcribe, NormalizedAudio, ToolRunner, TranscribeRequest,
    Transcription};
use hark_models::{Job, LANGUAGE_AUTO};
use hark_queue::{JobQueue, Lease};

use crate::config::WorkerConfig;
use crate::logging::JobLogger;
use crate::metrics;
use crate::outcome::{ProcessingOutcome, Stage};
use crate::transfer;
use crate::translation::decide_translation;

/// Stage-tagged failure, private to the pipeline.
struct StageError {
    stage: Stage,
    message: String,
}

impl StageError {
    fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

type StageResult<T> = Result<T, StageError>;

/// Runs the processing stages for one job.
pub struct MediaPipeline {
    config: WorkerConfig,
    http: reqwest::Client,
    queue: JobQueue,
    runner: ToolRunner,
}

impl MediaPipeline {
    pub fn new(config: WorkerConfig, http: reqwest::Client, queue: JobQueue) -> Self {
        let mut runner = ToolRunner::new();
        if let Some(secs) = config.tool_timeout_secs {
            runner = runner.with_timeout(secs);
        }
        Self {
            config,
            http,
            queue,
            runner,
        }
    }

    /// Run all stages for one job. Failures come back classified, never
    /// as raw errors.
    pub async fn run(&self, job: &Job, lease: &Lease, logger: &JobLogger) -> ProcessingOutcome {
        match self.execute(job, lease, logger).await {
            Ok(outcome) => outcome,
            Err(e) => {
                logger.log_error(&format!("Stage {} failed: {}", e.stage.as_str(), e.message));
                ProcessingOutcome::StageFailure {
                    stage: e.stage,
                    cause: e.message,
                }
            }
        }
    }

    async fn execute(
        &self,
        job: &Job,
        lease: &Lease,
        logger: &JobLogger,
    ) -> StageResult<ProcessingOutcome> {
        let scratch = self
            .scratch_dir()
            .map_err(|e| StageError::new(Stage::Acquire, e))?;

        let source = self.acquire(job, scratch.path(), logger).await?;
        let audio = self.normalize(&source, logger).await?;
        self.extend_lease(lease, audio.duration_secs, logger).await?;

        let run_language = if job.is_auto_language() {
            LANGUAGE_AUTO.to_string()
        } else {
            job.language_code.clone()
        };
        let transcription = self
            .recognize(&audio.wav_path, &run_language, false, logger)
            .await?;

        // A translation pass overwrites the artifact set; the first
        // run's detected language is what gets reported either way.
        let mut artifacts = transcription.clone();
        let mut translated = false;
        if job.translate {
            if let Some(source_language) =
                decide_translation(&job.language_code, transcription.detected_language.as_deref())
            {
                artifacts = self
                    .recognize(&audio.wav_path, &source_language, true, logger)
                    .await?;
                translated = true;
            }
        }

        let output_keys = self.upload(job, &artifacts, logger).await?;

        let language = if job.is_auto_language() {
            transcription.detected_language.clone()
        } else {
            Some(job.language_code.clone())
        };

        Ok(ProcessingOutcome::Success {
            output_keys,
            language,
            translated,
        })
    }

    async fn acquire(&self, job: &Job, dir: &Path, logger: &JobLogger) -> StageResult<PathBuf> {
        let dest = dir.join(source_file_name(&job.original_filename));
        logger.log_stage(
            Stage::Acquire.as_str(),
            &format!("Fetching {}", job.original_filename),
        );

        let started = Instant::now();
        let result = transfer::download_to_file(&self.http, &job.input_ref, &dest).await;
        metrics::record_stage_duration(
            Stage::Acquire.as_str(),
            started.elapsed().as_millis() as f64,
        );

        result.map_err(|e| StageError::new(Stage::Acquire, e.to_string()))?;
        Ok(dest)
    }

    async fn normalize(&self, source: &Path, logger: &JobLogger) -> StageResult<NormalizedAudio> {
        logger.log_stage(Stage::Normalize.as_str(), "Converting to mono 16kHz wav");

        let started = Instant::now();
        let result = convert_to_wav(&self.runner, source).await;
        metrics::record_stage_duration(
            Stage::Normalize.as_str(),
            started.elapsed().as_millis() as f64,
        );

        result.map_err(|e| StageError::new(Stage::Normalize, e.to_string()))
    }

    async fn extend_lease(
        &self,
        lease: &Lease,
        duration_secs: u64,
        logger: &JobLogger,
    ) -> StageResult<()> {
        let visibility = duration_secs + self.config.lease_margin_secs;
        logger.log_stage(
            Stage::LeaseExtension.as_str(),
            &format!("Extending lease to {} seconds", visibility),
        );

        self.queue
            .extend(lease, Duration::from_secs(visibility))
            .await
            .map_err(|e| StageError::new(Stage::LeaseExtension, e.to_string()))
    }

    async fn recognize(
        &self,
        wav: &Path,
        language: &str,
        translate: bool,
        logger: &JobLogger,
    ) -> StageResult<Transcription> {
        let stage = if translate {
            Stage::Translate
        } else {
            Stage::Transcribe
        };
        logger.log_stage(
            stage.as_str(),
            &format!("Running recognition with language {}", language),
        );

        let request = TranscribeRequest {
            wav_path: wav.to_path_buf(),
            model_path: PathBuf::from(&self.config.whisper_model),
            threads: self.config.whisper_threads,
            language: language.to_string(),
            translate,
        };

        let started = Instant::now();
        let result = transcribe(&self.runner, &self.config.whisper_bin, &request).await;
        metrics::record_stage_duration(stage.as_str(), started.elapsed().as_millis() as f64);

        result.map_err(|e| StageError::new(stage, e.to_string()))
    }

    async fn upload(
        &self,
        job: &Job,
        artifacts: &Transcription,
        logger: &JobLogger,
    ) -> StageResult<hark_models::OutputKeys> {
        logger.log_stage(Stage::Upload.as_str(), "Uploading artifact set");

        let started = Instant::now();
        let result = transfer::upload_artifacts(&self.http, job, artifacts).await;
        metrics::record_stage_duration(
            Stage::Upload.as_str(),
            started.elapsed().as_millis() as f64,
        );

        result.map_err(|e| StageError::new(Stage::Upload, e.to_string()))
    }

    fn scratch_dir(&self) -> Result<tempfile::TempDir, String> {
        std::fs::create_dir_all(&self.config.work_dir).map_err(|e| e.to_string())?;
        tempfile::Builder::new()
            .prefix("hark-job-")
            .tempdir_in(&self.config.work_dir)
            .map_err(|e| e.to_string())
    }
}

/// Local name for the downloaded media inside the scratch directory.
fn source_file_name(original: &str) -> String {
    Path::new(original)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "input.media".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::os::unix::fs::PermissionsExt;

    use chrono::Utc;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use hark_models::{DestinationRef, DestinationRefs, JobId};
    use hark_queue::QueueConfig;

    #[test]
    fn test_source_file_name_strips_directories() {
        assert_eq!(source_file_name("audio.mp3"), "audio.mp3");
        assert_eq!(source_file_name("uploads/user/audio.mp3"), "audio.mp3");
    }

    #[test]
    fn test_source_file_name_falls_back_when_unusable() {
        assert_eq!(source_file_name(""), "input.media");
        assert_eq!(source_file_name("uploads/.."), "input.media");
    }

    // Stand-ins for the real tools: same argv contract, same stderr
    // banners, instant output files.
    const FAKE_FFMPEG: &str = r#"#!/bin/sh
for a in "$@"; do out="$a"; done
echo "  Duration: 00:02:00.00, start: 0.000000, bitrate: 128 kb/s" >&2
: > "$out"
"#;

    const FAKE_WHISPER: &str = r#"#!/bin/sh
base=""
prev=""
for a in "$@"; do
  if [ "$prev" = "--output-file" ]; then base="$a"; fi
  prev="$a"
done
echo "whisper_full_with_state: auto-detected language: fr (p = 0.958535)" >&2
echo "whisper_print_timings:     load time =   100.00 ms" >&2
echo "whisper_print_timings:    total time =  1000.00 ms" >&2
printf '1\n00:00:00,000 --> 00:00:01,000\nbonjour\n' > "$base.srt"
printf 'bonjour\n' > "$base.txt"
printf '{}' > "$base.json"
"#;

    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let script = dir.join(name);
        std::fs::write(&script, body).unwrap();
        let mut perms = std::fs::metadata(&script).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&script, perms).unwrap();
        script
    }

    #[tokio::test]
    async fn test_auto_language_job_translates_and_uploads() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/media/a.mp3"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"media-bytes".to_vec()))
            .expect(1)
            .mount(&server)
            .await;
        // 120s of media plus the 300s margin
        Mock::given(method("POST"))
            .and(header("x-amz-target", "AmazonSQS.ChangeMessageVisibility"))
            .and(body_partial_json(serde_json::json!({
                "ReceiptHandle": "rh-1",
                "VisibilityTimeout": 420
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("{}", "application/x-amz-json-1.0"),
            )
            .expect(1)
            .mount(&server)
            .await;
        for artifact in ["srt", "text", "json"] {
            Mock::given(method("PUT"))
                .and(path(format!("/out/{artifact}")))
                .respond_with(ResponseTemplate::new(200))
                .expect(1)
                .mount(&server)
                .await;
        }

        let tools = tempfile::tempdir().unwrap();
        write_script(tools.path(), "ffmpeg", FAKE_FFMPEG);
        let whisper = write_script(tools.path(), "whisper-cli", FAKE_WHISPER);
        std::env::set_var(
            "PATH",
            format!(
                "{}:{}",
                tools.path().display(),
                std::env::var("PATH").unwrap_or_default()
            ),
        );

        let work = tempfile::tempdir().unwrap();
        let config = WorkerConfig {
            results_queue_url: "https://sqs.test/123/results".to_string(),
            poll_interval: Duration::from_secs(1),
            lease_margin_secs: 300,
            work_dir: work.path().to_string_lossy().to_string(),
            whisper_bin: whisper.to_string_lossy().to_string(),
            whisper_model: "/models/ggml-medium.bin".to_string(),
            whisper_threads: 1,
            tool_timeout_secs: None,
            autoscaling_group: None,
            imds_base_url: "http://unused.invalid".to_string(),
            preemption_interval: Duration::from_secs(10),
        };

        let sqs_config = aws_sdk_sqs::Config::builder()
            .behavior_version(aws_sdk_sqs::config::BehaviorVersion::latest())
            .endpoint_url(server.uri())
            .region(aws_sdk_sqs::config::Region::new("us-east-1"))
            .credentials_provider(aws_sdk_sqs::config::Credentials::new(
                "test", "test", None, None, "test",
            ))
            .retry_config(aws_sdk_sqs::config::retry::RetryConfig::disabled())
            .build();
        let queue = JobQueue::with_client(
            aws_sdk_sqs::Client::from_conf(sqs_config),
            QueueConfig {
                task_queue_url: format!("{}/123/tasks", server.uri()),
                dead_letter_queue_url: None,
                endpoint_url: None,
                visibility_timeout: Duration::from_secs(300),
                max_receive_count: 3,
            },
        );

        let dest = |suffix: &str, key: &str| DestinationRef {
            url: format!("{}/out/{}", server.uri(), suffix),
            key: key.to_string(),
        };
        let job = Job {
            id: JobId::from_string("uploads/user/a.mp3"),
            original_filename: "a.mp3".to_string(),
            input_ref: format!("{}/media/a.mp3", server.uri()),
            destination_refs: DestinationRefs {
                srt: dest("srt", "srt/a.srt"),
                text: dest("text", "text/a.txt"),
                json: dest("json", "json/a.json"),
            },
            sent_timestamp: Utc::now(),
            user_email: "user@example.com".to_string(),
            language_code: "auto".to_string(),
            translate: true,
        };

        let pipeline = MediaPipeline::new(config, reqwest::Client::new(), queue);
        let logger = JobLogger::new(&job.id, "transcription");
        let outcome = pipeline.run(&job, &Lease::new("rh-1"), &logger).await;

        match outcome {
            ProcessingOutcome::Success {
                output_keys,
                language,
                translated,
            } => {
                assert_eq!(language.as_deref(), Some("fr"));
                assert!(translated);
                assert_eq!(output_keys.srt, "srt/a.srt");
            }
            other => panic!("expected success, got {other:?}"),
        }
    }
}

//! whisper.cpp invocation and output parsing.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::command::{ToolCommand, ToolRunner};
use crate::error::{MediaError, MediaResult};

/// One recognition run over a normalized wav.
#[derive(Debug, Clone)]
pub struct TranscribeRequest {
    /// Normalized wav input
    pub wav_path: PathBuf,
    /// ggml model file
    pub model_path: PathBuf,
    /// Worker threads for the recognition tool
    pub threads: u32,
    /// Input language code, or `auto` to detect
    pub language: String,
    /// Emit an English translation instead of a same-language transcript
    pub translate: bool,
}

/// Artifacts and metadata from a completed recognition run.
#[derive(Debug, Clone)]
pub struct Transcription {
    pub srt_path: PathBuf,
    pub text_path: PathBuf,
    pub json_path: PathBuf,
    /// Two-letter code the tool detected, when it ran detection
    pub detected_language: Option<String>,
    pub load_time_ms: Option<u64>,
    pub total_time_ms: Option<u64>,
}

/// Output base path: the wav stem beside the wav itself. The tool
/// appends `.srt`/`.txt`/`.json` to this base.
pub fn output_base(wav_path: &Path) -> PathBuf {
    let stem = wav_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    wav_path.with_file_name(stem)
}

/// Argument list for one recognition run.
pub fn transcribe_args(request: &TranscribeRequest) -> Vec<String> {
    let base = output_base(&request.wav_path);
    let mut args = vec![
        "--model".to_string(),
        request.model_path.to_string_lossy().to_string(),
        "--threads".to_string(),
        request.threads.to_string(),
        "--file".to_string(),
        request.wav_path.to_string_lossy().to_string(),
        "--output-srt".to_string(),
        "--output-txt".to_string(),
        "--output-json".to_string(),
        "--output-file".to_string(),
        base.to_string_lossy().to_string(),
        "--language".to_string(),
        request.language.clone(),
    ];
    if request.translate {
        args.push("--translate".to_string());
    }
    args
}

/// Run the recognition tool and collect its three output artifacts.
pub async fn transcribe(
    runner: &ToolRunner,
    binary: &str,
    request: &TranscribeRequest,
) -> MediaResult<Transcription> {
    let cmd = ToolCommand::new(binary).args(transcribe_args(request));
    let output = runner.run(&cmd).await?;

    let detected_language = parse_detected_language(&output.stderr);
    let load_time_ms = parse_timing_ms(&output.stderr, "load time");
    let total_time_ms = parse_timing_ms(&output.stderr, "total time");

    info!(
        detected_language = detected_language.as_deref().unwrap_or("none"),
        load_time_ms, total_time_ms, "Recognition finished"
    );

    let base = output_base(&request.wav_path);
    Ok(Transcription {
        srt_path: require_output(appended(&base, "srt"))?,
        text_path: require_output(appended(&base, "txt"))?,
        json_path: require_output(appended(&base, "json"))?,
        detected_language,
        load_time_ms,
        total_time_ms,
    })
}

/// Detected language line: `auto-detected language: en (p = 0.96)`.
/// Absent when the run was given an explicit language.
pub fn parse_detected_language(stderr: &str) -> Option<String> {
    const MARKER: &str = "auto-detected language:";
    let idx = stderr.find(MARKER)?;
    let rest = stderr[idx + MARKER.len()..].trim_start();

    let code: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();

    if code.len() == 2 {
        Some(code.to_lowercase())
    } else {
        None
    }
}

/// Timing summary lines: `whisper_print_timings: <label> = <n>.<f> ms`.
pub fn parse_timing_ms(stderr: &str, label: &str) -> Option<u64> {
    for line in stderr.lines() {
        let Some(rest) = line.trim_start().strip_prefix("whisper_print_timings:") else {
            continue;
        };
        let Some(value) = rest.trim_start().strip_prefix(label) else {
            continue;
        };
        let Some(value) = value.trim_start().strip_prefix('=') else {
            continue;
        };

        let millis = value.trim();
        let millis = millis.strip_suffix("ms").unwrap_or(millis).trim_end();
        let whole = millis.split('.').next().unwrap_or(millis);
        if let Ok(parsed) = whole.parse() {
            return Some(parsed);
        }
    }
    None
}

// Appends rather than Path::with_extension: the base itself usually
// contains dots ("audio.mp3-converted").
fn appended(base: &Path, ext: &str) -> PathBuf {
    let mut os = base.as_os_str().to_os_string();
    os.push(".");
    os.push(ext);
    PathBuf::from(os)
}

fn require_output(path: PathBuf) -> MediaResult<PathBuf> {
    if path.exists() {
        Ok(path)
    } else {
        Err(MediaError::MissingOutput(path))
    }
}

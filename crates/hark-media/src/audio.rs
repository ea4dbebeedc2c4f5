//! Waveform normalization for speech recognition input.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::command::{ToolCommand, ToolRunner};
use crate::error::{MediaError, MediaResult};

/// A normalized waveform ready for the recognition tool.
#[derive(Debug, Clone)]
pub struct NormalizedAudio {
    /// Path to the converted wav file
    pub wav_path: PathBuf,
    /// Source duration in whole seconds, read from the converter banner
    pub duration_secs: u64,
}

/// Path of the converted wav next to the source file.
pub fn wav_output_path(source: &Path) -> PathBuf {
    let mut name = source
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    name.push_str("-converted.wav");
    source.with_file_name(name)
}

/// Argument list converting any input container to 16kHz mono pcm wav.
pub fn convert_args(source: &Path, wav: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-i".to_string(),
        source.to_string_lossy().to_string(),
        "-ar".to_string(),
        "16000".to_string(),
        "-ac".to_string(),
        "1".to_string(),
        "-c:a".to_string(),
        "pcm_s16le".to_string(),
        wav.to_string_lossy().to_string(),
    ]
}

/// Convert source media to a recognition-ready wav and extract the
/// source duration.
///
/// The converter prints the input duration on stderr; a run that exits
/// zero but yields no parseable duration is still an error because the
/// lease extension needs the number before transcription starts.
pub async fn convert_to_wav(runner: &ToolRunner, source: &Path) -> MediaResult<NormalizedAudio> {
    let wav_path = wav_output_path(source);
    let cmd = ToolCommand::new("ffmpeg").args(convert_args(source, &wav_path));

    let output = runner.run(&cmd).await?;

    let duration_secs = match parse_duration_secs(&output.stderr) {
        Some(duration) => duration,
        None => {
            warn!("Could not retrieve duration from the converter output");
            return Err(MediaError::DurationNotFound);
        }
    };

    info!("File duration is {} seconds", duration_secs);

    Ok(NormalizedAudio {
        wav_path,
        duration_secs,
    })
}

/// Extract the input duration from the converter's stderr banner.
///
/// The banner line reads `Duration: HH:MM:SS.cc, start: ...`.
pub fn parse_duration_secs(stderr: &str) -> Option<u64> {
    let rest = &stderr[stderr.find("Duration: ")? + "Duration: ".len()..];
    let (timestamp, _) = rest.split_once(',')?;
    let (clock, _fraction) = timestamp.split_once('.')?;

    let mut parts = clock.splitn(3, ':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds: u64 = parts.next()?.parse().ok()?;

    Some(hours * 3600 + minutes * 60 + seconds)
}

//! External media tooling.
//!
//! This crate provides:
//! - A tool command builder and runner with timeout and cancellation
//! - Waveform normalization via ffmpeg, with duration extraction
//! - Speech recognition via whisper.cpp, with stderr metadata parsing

pub mod audio;
pub mod command;
pub mod error;
pub mod whisper;

pub use audio::{convert_to_wav, parse_duration_secs, NormalizedAudio};
pub use command::{check_ffmpeg, check_tool, ToolCommand, ToolOutput, ToolRunner};
pub use error::{MediaError, MediaResult};
pub use whisper::{transcribe, TranscribeRequest, Transcription};

//! Text-to-speech through an external program.

use super::SpeechEngine;
use crate::errors::BinError;
use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Runs `<program> -v <voice> -- <text>` and waits for it to exit.
///
/// Line text comes from operators, so it is always passed after `--` and
/// never parsed as program options. The child is killed when the
/// cancellation token fires.
pub struct CommandSpeechEngine {
    program: String,
    voice: String,
}

impl CommandSpeechEngine {
    #[must_use]
    pub fn new(program: impl Into<String>, voice: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            voice: voice.into(),
        }
    }
}

#[async_trait]
impl SpeechEngine for CommandSpeechEngine {
    async fn speak(&self, text: &str, cancel_token: &CancellationToken) -> Result<(), BinError> {
        let mut child = Command::new(&self.program)
            .arg("-v")
            .arg(&self.voice)
            .arg("--")
            .arg(text)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BinError::Speech(format!("failed to start {}: {e}", self.program)))?;

        tokio::select! {
            () = cancel_token.cancelled() => {
                if let Err(e) = child.kill().await {
                    warn!(
                        target: "grumpybin.devices.speech",
                        error = %e,
                        "Failed to stop speech process"
                    );
                }
                debug!(target: "grumpybin.devices.speech", "Speech cancelled");
                Ok(())
            }
            status = child.wait() => {
                let status = status
                    .map_err(|e| BinError::Speech(format!("failed to wait for {}: {e}", self.program)))?;
                if status.success() {
                    Ok(())
                } else {
                    Err(BinError::Speech(format!("{} exited with {status}", self.program)))
                }
            }
        }
    }
}

#[cfg(all(test, unix))]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use tempfile::TempDir;

    /// Writes a fake TTS program that parses options like espeak-ng does
    /// and records each option and the remaining text to `log`.
    fn write_fake_tts(dir: &Path, log: &Path) -> String {
        let script = dir.join("fake-tts");
        let body = format!(
            r#"#!/bin/sh
while getopts "v:f:w:" opt; do
  echo "option $opt=$OPTARG" >> "{log}"
done
shift $((OPTIND - 1))
echo "text=$1" >> "{log}"
"#,
            log = log.display()
        );
        std::fs::write(&script, body).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script.display().to_string()
    }

    #[tokio::test]
    async fn test_successful_program() {
        let engine = CommandSpeechEngine::new("true", "de");
        engine
            .speak("hallo", &CancellationToken::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_failing_program_is_speech_error() {
        let engine = CommandSpeechEngine::new("false", "de");
        assert!(matches!(
            engine.speak("hallo", &CancellationToken::new()).await,
            Err(BinError::Speech(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_program_is_speech_error() {
        let engine = CommandSpeechEngine::new("grumpybin-no-such-tts-program", "de");
        let err = engine
            .speak("hallo", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to start"));
    }

    #[tokio::test]
    async fn test_leading_dash_line_is_spoken_as_text() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("calls.log");
        let engine = CommandSpeechEngine::new(write_fake_tts(dir.path(), &log), "de");

        engine
            .speak("-f/etc/passwd", &CancellationToken::new())
            .await
            .unwrap();

        let calls = std::fs::read_to_string(&log).unwrap();
        assert_eq!(calls, "option v=de\ntext=-f/etc/passwd\n");
    }
}

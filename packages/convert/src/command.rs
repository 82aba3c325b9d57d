//! External-program converter.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::{ConversionError, DocumentConverter, html_path_for};

/// Default converter invocation. `{input}` and `{outdir}` are substituted
/// per document.
pub const DEFAULT_COMMAND: &str = "soffice --headless --convert-to html --outdir {outdir} {input}";

/// Default per-document timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(45);

/// Bytes of stderr kept in [`ConversionError::Failed`].
const STDERR_TAIL: usize = 300;

/// Runs an external program once per document.
#[derive(Debug, Clone)]
pub struct CommandConverter {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandConverter {
    /// Creates a converter running `program` with `args`. Each argument may
    /// contain `{input}` and `{outdir}` placeholders.
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    /// Parses a whitespace-separated command template such as
    /// [`DEFAULT_COMMAND`]. Returns `None` for an empty template.
    #[must_use]
    pub fn from_template(template: &str, timeout: Duration) -> Option<Self> {
        let mut words = template.split_whitespace().map(str::to_string);
        let program = words.next()?;
        Some(Self::new(program, words.collect(), timeout))
    }

    /// The program this converter runs.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    fn expand_args(&self, input: &Path, outdir: &Path) -> Vec<String> {
        let input = input.to_string_lossy();
        let outdir = outdir.to_string_lossy();
        self.args
            .iter()
            .map(|arg| arg.replace("{input}", &input).replace("{outdir}", &outdir))
            .collect()
    }
}

impl Default for CommandConverter {
    fn default() -> Self {
        Self::from_template(DEFAULT_COMMAND, DEFAULT_TIMEOUT)
            .unwrap_or_else(|| Self::new("soffice", Vec::new(), DEFAULT_TIMEOUT))
    }
}

#[async_trait]
impl DocumentConverter for CommandConverter {
    async fn convert(&self, input: &Path, outdir: &Path) -> Result<PathBuf, ConversionError> {
        let args = self.expand_args(input, outdir);
        log::debug!("Running {} {}", self.program, args.join(" "));

        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ConversionError::NotFound(self.program.clone())
                } else {
                    ConversionError::Spawn(e)
                }
            })?;

        // Dropping the timed-out future drops the child, which kills it.
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ConversionError::Timeout(self.timeout))?
            .map_err(ConversionError::Spawn)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            let start = stderr.len().saturating_sub(STDERR_TAIL);
            let start = (start..stderr.len())
                .find(|&i| stderr.is_char_boundary(i))
                .unwrap_or(stderr.len());
            return Err(ConversionError::Failed {
                status: output.status.to_string(),
                stderr: stderr[start..].to_string(),
            });
        }

        let stem = input.file_stem().unwrap_or_default();
        let expected = html_path_for(&outdir.join(stem));
        if expected.exists() {
            Ok(expected)
        } else {
            Err(ConversionError::MissingOutput(expected))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str, timeout: Duration) -> CommandConverter {
        CommandConverter::new("sh", vec!["-c".to_string(), script.to_string()], timeout)
    }

    #[test]
    fn parses_default_template() {
        let converter = CommandConverter::default();
        assert_eq!(converter.program(), "soffice");
        assert_eq!(
            converter.expand_args(Path::new("d/TX1_2023.doc"), Path::new("d")),
            ["--headless", "--convert-to", "html", "--outdir", "d", "d/TX1_2023.doc"]
        );
        assert!(CommandConverter::from_template("   ", DEFAULT_TIMEOUT).is_none());
    }

    #[tokio::test]
    async fn successful_conversion_returns_html_path() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("TX1_2023.doc");
        std::fs::write(&input, b"doc").unwrap();

        let converter = sh("echo '<html></html>' > {outdir}/TX1_2023.html", DEFAULT_TIMEOUT);
        let html = converter.convert(&input, dir.path()).await.unwrap();
        assert_eq!(html, dir.path().join("TX1_2023.html"));
    }

    #[tokio::test]
    async fn missing_output_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("TX1_2023.doc");
        let result = sh("true", DEFAULT_TIMEOUT).convert(&input, dir.path()).await;
        assert!(matches!(result, Err(ConversionError::MissingOutput(_))));
    }

    #[tokio::test]
    async fn nonzero_exit_is_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("TX1_2023.doc");
        let result = sh("echo broken >&2; exit 3", DEFAULT_TIMEOUT)
            .convert(&input, dir.path())
            .await;
        match result {
            Err(ConversionError::Failed { stderr, .. }) => assert_eq!(stderr, "broken"),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_converter_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("TX1_2023.doc");
        let result = sh("sleep 5", Duration::from_millis(100))
            .convert(&input, dir.path())
            .await;
        assert!(matches!(result, Err(ConversionError::Timeout(_))));
    }

    #[tokio::test]
    async fn missing_program_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let converter = CommandConverter::new(
            "ccr-map-no-such-converter",
            Vec::new(),
            DEFAULT_TIMEOUT,
        );
        let result = converter
            .convert(&dir.path().join("TX1_2023.doc"), dir.path())
            .await;
        assert!(matches!(result, Err(ConversionError::NotFound(_))));
    }
}

//! Ghostscript as the [`CompressionTool`].
//!
//! Re-renders the input through the `pdfwrite` device with one of the
//! built-in `PDFSETTINGS` profiles. The process is bounded by a timeout and
//! killed if it overruns.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use pdfpress_core::job::CompressionMode;
use pdfpress_core::ports::{CompressionTool, ToolError};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

/// Default executable name, resolved through `PATH`.
pub const DEFAULT_BINARY: &str = "gs";

/// Default upper bound on a single compression.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Maximum diagnostic text kept from a failed run (64 KiB).
///
/// Ghostscript can be extremely verbose on malformed input; the tail holds
/// the actual error.
const MAX_DIAGNOSTIC_BYTES: usize = 64 * 1024;

const TOOL_NAME: &str = "Ghostscript";

pub struct GhostscriptTool {
    binary: PathBuf,
    timeout: Duration,
}

impl Default for GhostscriptTool {
    fn default() -> Self {
        Self::new(DEFAULT_BINARY, DEFAULT_TIMEOUT)
    }
}

impl GhostscriptTool {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    /// `PDFSETTINGS` profile for a preset.
    ///
    /// - `/screen`: 72 dpi, smallest output
    /// - `/ebook`: 150 dpi
    /// - `/prepress`: 300 dpi, colour preserving
    pub fn pdf_settings(mode: CompressionMode) -> &'static str {
        match mode {
            CompressionMode::Low => "/screen",
            CompressionMode::Balanced => "/ebook",
            CompressionMode::High => "/prepress",
        }
    }

    /// Full argument list passed to the binary.
    pub fn args(input: &Path, output: &Path, mode: CompressionMode) -> Vec<OsString> {
        let mut output_arg = OsString::from("-sOutputFile=");
        output_arg.push(output);

        vec![
            "-sDEVICE=pdfwrite".into(),
            "-dCompatibilityLevel=1.4".into(),
            format!("-dPDFSETTINGS={}", Self::pdf_settings(mode)).into(),
            "-dNOPAUSE".into(),
            "-dBATCH".into(),
            output_arg,
            input.as_os_str().to_owned(),
        ]
    }
}

/// Drain a child's output stream, holding at most twice
/// [`MAX_DIAGNOSTIC_BYTES`] in memory and keeping the most recent bytes.
///
/// The pipe is read to EOF so a chatty child never blocks on a full pipe.
async fn read_tail<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut tail = Vec::new();
    let Some(mut stream) = handle else {
        return tail;
    };

    let mut chunk = [0u8; 8 * 1024];
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                tail.extend_from_slice(&chunk[..n]);
                if tail.len() > 2 * MAX_DIAGNOSTIC_BYTES {
                    tail.drain(..tail.len() - MAX_DIAGNOSTIC_BYTES);
                }
            }
        }
    }
    tail
}

/// Keep at most the last [`MAX_DIAGNOSTIC_BYTES`] of a stream, lossily decoded.
fn diagnostic_tail(bytes: &[u8]) -> String {
    let start = bytes.len().saturating_sub(MAX_DIAGNOSTIC_BYTES);
    String::from_utf8_lossy(&bytes[start..]).trim().to_string()
}

#[async_trait]
impl CompressionTool for GhostscriptTool {
    async fn compress(
        &self,
        input: &Path,
        output: &Path,
        mode: CompressionMode,
    ) -> Result<(), ToolError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(Self::args(input, output, mode))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Returning on timeout drops the child, which then gets killed.
            .kill_on_drop(true);

        tracing::info!(
            binary = %self.binary.display(),
            settings = Self::pdf_settings(mode),
            input = %input.display(),
            "Running Ghostscript",
        );

        let mut child = cmd.spawn().map_err(ToolError::Spawn)?;
        let stdout_task = tokio::spawn(read_tail(child.stdout.take()));
        let stderr_task = tokio::spawn(read_tail(child.stderr.take()));

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(status) => status.map_err(ToolError::Spawn)?,
            Err(_elapsed) => {
                tracing::warn!(timeout_secs = self.timeout.as_secs(), "Ghostscript timed out");
                return Err(ToolError::Timeout {
                    secs: self.timeout.as_secs(),
                });
            }
        };

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();

        if status.success() {
            tracing::debug!("Ghostscript completed successfully");
            return Ok(());
        }

        // Ghostscript reports some errors on stdout rather than stderr.
        let diagnostic = match diagnostic_tail(&stderr) {
            s if s.is_empty() => diagnostic_tail(&stdout),
            s => s,
        };
        Err(ToolError::Failed {
            tool: TOOL_NAME.to_string(),
            exit_code: status.code(),
            stderr: diagnostic,
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn presets_map_to_pdf_settings() {
        assert_eq!(GhostscriptTool::pdf_settings(CompressionMode::Low), "/screen");
        assert_eq!(GhostscriptTool::pdf_settings(CompressionMode::Balanced), "/ebook");
        assert_eq!(GhostscriptTool::pdf_settings(CompressionMode::High), "/prepress");
    }

    #[test]
    fn argument_order_matches_gs_cli() {
        let args = GhostscriptTool::args(
            Path::new("/tmp/job/original.pdf"),
            Path::new("/tmp/job/compressed.pdf"),
            CompressionMode::High,
        );
        let args: Vec<_> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            vec![
                "-sDEVICE=pdfwrite",
                "-dCompatibilityLevel=1.4",
                "-dPDFSETTINGS=/prepress",
                "-dNOPAUSE",
                "-dBATCH",
                "-sOutputFile=/tmp/job/compressed.pdf",
                "/tmp/job/original.pdf",
            ]
        );
    }

    #[test]
    fn diagnostic_keeps_the_tail() {
        let mut noisy = vec![b'x'; MAX_DIAGNOSTIC_BYTES];
        noisy.extend_from_slice(b"\nUnrecoverable error, exit code 1\n");
        let tail = diagnostic_tail(&noisy);
        assert!(tail.ends_with("Unrecoverable error, exit code 1"));
        assert!(tail.len() <= MAX_DIAGNOSTIC_BYTES);
    }

    #[tokio::test]
    async fn stream_reader_keeps_a_bounded_tail() {
        let mut noisy = vec![b'x'; 5 * MAX_DIAGNOSTIC_BYTES];
        noisy.extend_from_slice(b"\nError: /ioerror in --showpage--\n");

        let tail = read_tail(Some(&noisy[..])).await;

        assert!(tail.len() <= 2 * MAX_DIAGNOSTIC_BYTES);
        assert!(tail.ends_with(b"Error: /ioerror in --showpage--\n"));
        assert!(read_tail(None::<&[u8]>).await.is_empty());
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let tool = GhostscriptTool::new(dir.path().join("no-such-gs"), DEFAULT_TIMEOUT);
        let result = tool
            .compress(
                &dir.path().join("in.pdf"),
                &dir.path().join("out.pdf"),
                CompressionMode::Balanced,
            )
            .await;
        assert_matches!(result, Err(ToolError::Spawn(_)));
    }

    /// Drives the real subprocess path with stand-in shell scripts. Kept in
    /// one test so script files are never written while another test forks.
    #[cfg(unix)]
    #[tokio::test]
    async fn subprocess_outcomes() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.pdf");
        let output = dir.path().join("out.pdf");
        std::fs::write(&input, b"%PDF-1.4 original").unwrap();

        let script = |name: &str, body: &str| {
            let path = dir.path().join(name);
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        };

        let ok = script(
            "gs-ok",
            r#"for arg in "$@"; do
  case "$arg" in
    -sOutputFile=*) out="${arg#-sOutputFile=}" ;;
  esac
done
printf 'small' > "$out""#,
        );
        let failing = script("gs-fail", "echo 'Error: /syntaxerror in pdf' >&2\nexit 3");
        let slow = script("gs-slow", "sleep 10");
        let chatty = script(
            "gs-chatty",
            "head -c 1000000 /dev/zero | tr '\\0' 'x' >&2\necho >&2\necho 'Error: /rangecheck in --run--' >&2\nexit 1",
        );

        GhostscriptTool::new(&ok, DEFAULT_TIMEOUT)
            .compress(&input, &output, CompressionMode::Low)
            .await
            .unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), b"small");

        let err = GhostscriptTool::new(&failing, DEFAULT_TIMEOUT)
            .compress(&input, &output, CompressionMode::Low)
            .await
            .unwrap_err();
        assert_matches!(
            &err,
            ToolError::Failed { exit_code: Some(3), stderr, .. }
                if stderr == "Error: /syntaxerror in pdf"
        );
        assert!(err.to_string().starts_with("Ghostscript failed with exit code 3."));

        let err = GhostscriptTool::new(&slow, Duration::from_millis(200))
            .compress(&input, &output, CompressionMode::Low)
            .await
            .unwrap_err();
        assert_matches!(err, ToolError::Timeout { .. });

        let err = GhostscriptTool::new(&chatty, DEFAULT_TIMEOUT)
            .compress(&input, &output, CompressionMode::Low)
            .await
            .unwrap_err();
        let stderr = assert_matches!(err, ToolError::Failed { stderr, .. } => stderr);
        assert!(stderr.len() <= MAX_DIAGNOSTIC_BYTES);
        assert!(stderr.ends_with("Error: /rangecheck in --run--"));
    }
}

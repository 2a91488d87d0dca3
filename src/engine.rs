//! External compression engine invocation.
//!
//! The actual lossy compression happens in an out-of-process tool that
//! takes its parameters as command-line flags, reads the original image
//! from stdin until end-of-input, and writes the compressed image to
//! stdout. This module defines the [`CompressionEngine`] seam the
//! pipeline calls through, plus the real subprocess-backed implementation.
//!
//! The engine is assumed deterministic: a failure is never retried, since
//! a retry would reproduce it.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::error::EngineError;
use crate::params::CompressionParams;

/// Default engine binary name, resolved through PATH.
pub const DEFAULT_ENGINE_PROGRAM: &str = "pngloss";

/// Default ceiling on one engine invocation.
///
/// A wedged engine process would pin an admission slot forever.
pub const DEFAULT_ENGINE_TIMEOUT_SECS: u64 = 30;

/// Longest stderr excerpt carried into an error.
const MAX_STDERR_EXCERPT: usize = 256;

// =============================================================================
// Engine Trait
// =============================================================================

/// The seam between the pipeline and the external compressor.
///
/// Tests substitute a mock here to count invocations and fake output.
#[async_trait]
pub trait CompressionEngine: Send + Sync {
    /// Compress `original` with `params`, returning the compressed bytes.
    async fn compress(
        &self,
        original: Bytes,
        params: &CompressionParams,
    ) -> Result<Bytes, EngineError>;
}

// =============================================================================
// Subprocess Engine
// =============================================================================

/// Subprocess-backed engine invoking the `pngloss` binary.
pub struct SubprocessEngine {
    program: PathBuf,
    timeout: Duration,
}

impl SubprocessEngine {
    /// Create an engine using the default program name and timeout.
    pub fn new() -> Self {
        Self::with_program(DEFAULT_ENGINE_PROGRAM)
    }

    /// Create an engine invoking a specific binary.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: Duration::from_secs(DEFAULT_ENGINE_TIMEOUT_SECS),
        }
    }

    /// Override the invocation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the flag list for one invocation: `-s<strength> -b<bleed>
    /// [--strip] -`, where the trailing `-` selects stdin/stdout mode.
    fn build_args(params: &CompressionParams) -> Vec<String> {
        let mut args = vec![
            format!("-s{}", params.strength()),
            format!("-b{}", params.bleed()),
        ];
        if params.strip() {
            args.push("--strip".to_string());
        }
        args.push("-".to_string());
        args
    }
}

impl Default for SubprocessEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompressionEngine for SubprocessEngine {
    async fn compress(
        &self,
        original: Bytes,
        params: &CompressionParams,
    ) -> Result<Bytes, EngineError> {
        let args = Self::build_args(params);
        debug!(program = %self.program.display(), ?args, input = original.len(), "invoking engine");

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| EngineError::Spawn(err.to_string()))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| EngineError::Io("stdin not captured".to_string()))?;

        // Feed input concurrently with output collection so neither side
        // of the pipe can fill up and deadlock the other.
        let writer = tokio::spawn(async move {
            stdin.write_all(&original).await?;
            stdin.shutdown().await
        });

        let output = match timeout(self.timeout, child.wait_with_output()).await {
            // Dropping the wait future drops the child; kill_on_drop
            // reaps the wedged process.
            Err(_) => {
                writer.abort();
                return Err(EngineError::TimedOut {
                    seconds: self.timeout.as_secs(),
                });
            }
            Ok(result) => result.map_err(|err| EngineError::Io(err.to_string()))?,
        };

        // A non-zero exit is the authoritative failure; a broken-pipe
        // write error merely accompanies it.
        if !output.status.success() {
            let excerpt = &output.stderr[..output.stderr.len().min(MAX_STDERR_EXCERPT)];
            let stderr = String::from_utf8_lossy(excerpt).trim().to_string();
            return Err(EngineError::Failed {
                status: output.status.code().unwrap_or(-1),
                stderr,
            });
        }

        match writer.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(EngineError::Io(err.to_string())),
            Err(err) => return Err(EngineError::Io(err.to_string())),
        }

        Ok(Bytes::from(output.stdout))
    }
}

// =============================================================================
// Tests
// =============================================================================

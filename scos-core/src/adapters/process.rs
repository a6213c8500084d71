//! Bounded external process execution shared by the process-backed collaborators.

use crate::error::{Result, ScosError};
use std::ffi::OsStr;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

/// Longest stderr excerpt carried in an error.
const MAX_STDERR_CHARS: usize = 2000;

/// Run `program` with `args`, failing on spawn error, timeout or non-zero exit.
pub async fn run<I, S>(program: &str, args: I, limit: Duration) -> Result<Output>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::new(program);
    cmd.args(args).stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
    cmd.kill_on_drop(true);

    debug!("running {:?}", cmd.as_std());

    let output = timeout(limit, cmd.output())
        .await
        .map_err(|_| ScosError::CollaboratorTimeout {
            tool: program.to_string(),
            secs: limit.as_secs(),
        })?
        .map_err(|e| ScosError::collaborator(program, format!("failed to spawn: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ScosError::collaborator(
            program,
            format!("{} ({})", excerpt(&stderr), output.status),
        ));
    }

    Ok(output)
}

/// Trailing part of `text`, trimmed; the tail of stderr is the useful part.
pub fn excerpt(text: &str) -> String {
    let text = text.trim();
    let count = text.chars().count();
    if count <= MAX_STDERR_CHARS {
        return text.to_string();
    }
    let tail: String = text.chars().skip(count - MAX_STDERR_CHARS).collect();
    format!("...{}", tail)
}

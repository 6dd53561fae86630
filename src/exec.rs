use std::{process::Stdio, time::Duration};

use anyhow::{Context as _, Result, bail};
use log::debug;
use tokio::{process::Command, time::timeout};

/// Runs `command` through `/bin/sh -c`, killing it once `limit` elapses.
pub async fn execute(command: &str, limit: Duration) -> Result<()> {
    let child = Command::new("/bin/sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("failed to spawn {command:?}"))?;

    let Ok(output) = timeout(limit, child.wait_with_output()).await else {
        bail!("timeout ({limit:?}): {command:?}, killed");
    };
    let output = output.with_context(|| format!("failed to wait for {command:?}"))?;

    for line in String::from_utf8_lossy(&output.stdout).lines() {
        debug!("STDOUT: {line}");
    }
    for line in String::from_utf8_lossy(&output.stderr).lines() {
        debug!("STDERR: {line}");
    }

    if !output.status.success() {
        bail!("{command:?} failed: {}", output.status);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn succeeds_on_zero_exit_status() {
        execute("echo ok", Duration::from_secs(5)).await.unwrap();
    }

    #[tokio::test]
    async fn fails_on_non_zero_exit_status() {
        let err = execute("exit 3", Duration::from_secs(5)).await.unwrap_err();

        assert!(err.to_string().contains("exit status: 3"), "{err}");
    }

    #[tokio::test]
    async fn kills_command_after_timeout() {
        let err = execute("sleep 10", Duration::from_millis(100))
            .await
            .unwrap_err();

        assert!(err.to_string().starts_with("timeout"), "{err}");
    }
}

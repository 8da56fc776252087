// src/exec/command.rs

//! Shell command execution for `cmd = "..."` tasks.

use std::path::Path;
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Run `cmd` through the platform shell in `cwd`.
///
/// Output lines are forwarded to the log. A non-zero exit status is an
/// error carrying the exit code.
pub async fn run_shell(cmd: &str, cwd: &Path) -> Result<()> {
    debug!(%cmd, ?cwd, "spawning shell command");

    let mut command = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    };

    command
        .current_dir(cwd)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .with_context(|| format!("spawning command `{cmd}`"))?;

    let stdout_task = child.stdout.take().map(|stdout| {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                info!("{}", line);
            }
        })
    });
    let stderr_task = child.stderr.take().map(|stderr| {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                warn!("{}", line);
            }
        })
    });

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for command `{cmd}`"))?;

    for task in [stdout_task, stderr_task].into_iter().flatten() {
        let _ = task.await;
    }

    if !status.success() {
        bail!(
            "command `{cmd}` exited with code {}",
            status.code().unwrap_or(-1)
        );
    }
    Ok(())
}

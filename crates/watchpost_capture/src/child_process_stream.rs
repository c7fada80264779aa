use std::process::Stdio;
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, info};
use watchpost_core::error::{Result, WatchpostError};

///Spawns `cmd` with its stdout piped back to us. The child is killed when the returned `Child`
///is dropped.
pub(crate) fn start_child_process(cmd: &str, args: &[String]) -> Result<(Child, ChildStdout)> {
    info!("spawning child process {} ...", cmd);
    debug!("args: {}", args.join(" "));
    let mut child = Command::new(cmd)
        .args(args)
        .stdin(Stdio::null())
        .stderr(Stdio::inherit())
        .stdout(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|err| WatchpostError::capture(format!("unable to spawn {}: {}", cmd, err)))?;

    let child_out = child.stdout.take().ok_or_else(|| {
        WatchpostError::capture("unable to open stdout stream from child process")
    })?;

    debug!("child process started, pid {:?}", child.id());
    Ok((child, child_out))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_program_is_capture_error() {
        let res = start_child_process("watchpost-no-such-binary", &[]);
        assert!(matches!(res, Err(WatchpostError::Capture(_))));
    }
}

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};
use vigil_model::ScanHost;

use super::{
    ScanError, ScanExecutor, check_args, parse_grepable, validate_target,
};

/// Runs the nmap binary with grepable output on stdout.
#[derive(Debug, Clone)]
pub struct NmapExecutor {
    program: String,
}

impl NmapExecutor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl ScanExecutor for NmapExecutor {
    async fn scan(
        &self,
        target: &str,
        args: &[String],
    ) -> Result<Vec<ScanHost>, ScanError> {
        validate_target(target)?;
        check_args(args)?;

        info!(target, args = %args.join(" "), "starting scan");
        let output = Command::new(&self.program)
            .args(args)
            .args(["-oG", "-"])
            .arg(target.trim())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ScanError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr =
                String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(ScanError::Failed {
                status: output.status.to_string(),
                stderr: if stderr.is_empty() {
                    "no diagnostic output".to_string()
                } else {
                    stderr
                },
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let hosts = parse_grepable(&stdout);
        debug!(target, hosts = hosts.len(), "scan finished");
        Ok(hosts)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    use super::*;

    fn script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("fake-nmap");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    #[tokio::test]
    async fn parses_scanner_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(
            dir.path(),
            "printf 'Host: 10.0.0.5 (cam)\\tStatus: Up\\nHost: 10.0.0.5 (cam)\\tPorts: 554/open/tcp//rtsp///\\n'",
        );
        let executor = NmapExecutor::new(program.to_string_lossy());
        let hosts = executor
            .scan("10.0.0.5", &["-p".into(), "554".into()])
            .await
            .unwrap();
        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].hostnames, vec!["cam".to_string()]);
        assert_eq!(hosts[0].ports.len(), 1);
    }

    #[tokio::test]
    async fn nonzero_exit_carries_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(
            dir.path(),
            "echo 'Failed to resolve \"nowhere\"' >&2; exit 1",
        );
        let executor = NmapExecutor::new(program.to_string_lossy());
        let err = executor.scan("nowhere", &[]).await.unwrap_err();
        match err {
            ScanError::Failed { stderr, .. } => {
                assert!(stderr.contains("Failed to resolve"))
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let executor = NmapExecutor::new("/nonexistent/nmap-binary");
        let err = executor.scan("10.0.0.1", &[]).await.unwrap_err();
        assert!(matches!(err, ScanError::Spawn { .. }));
        assert!(!err.is_validation());
    }

    #[tokio::test]
    async fn unsafe_input_never_spawns() {
        let executor = NmapExecutor::new("/nonexistent/nmap-binary");
        let err = executor
            .scan("10.0.0.1", &["-oN".into(), "/tmp/x".into()])
            .await
            .unwrap_err();
        assert!(err.is_validation());
        let err = executor.scan("-iL", &[]).await.unwrap_err();
        assert!(err.is_validation());
    }
}

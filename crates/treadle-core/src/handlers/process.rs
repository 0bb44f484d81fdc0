//! Shared plumbing for handlers that spawn an external command.
//!
//! Order matters: the log header is flushed before the child starts, and the
//! child writes into the same open file.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use serde::{Deserialize, Deserializer};
use tokio::process::Command;

use crate::domain::TreadleError;
use crate::ports::ProcessLogSink;
use crate::typed::Invocation;

/// A fully resolved command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    /// Config path; its stem names the log file.
    pub config_file: String,
}

impl CommandSpec {
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

/// Grandparent of the script path, `.` when there is none.
///
/// `tools/train.py` is usually run from the repository root.
pub fn default_working_dir(script: &str) -> PathBuf {
    Path::new(script)
        .parent()
        .and_then(Path::parent)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Run `spec`, sending both output streams to a fresh process log.
///
/// With `invocation.timeout` set, waiting stops at the deadline and
/// `ProcessTimeout` is returned. The child is not killed; it keeps running
/// detached and its output keeps going to the log file.
pub async fn run_logged(
    sink: Arc<dyn ProcessLogSink>,
    task_type: &str,
    spec: &CommandSpec,
    invocation: &Invocation,
) -> Result<(), TreadleError> {
    let argv = spec.argv();
    let command_line = argv.join(" ");

    let (log_path, stdout, stderr) = {
        let task_type = task_type.to_string();
        let config_file = spec.config_file.clone();
        let payload = invocation.payload.clone();
        let argv = argv.clone();
        // file creation and the header flush block
        tokio::task::spawn_blocking(move || {
            let mut log = sink.open(&task_type, &config_file)?;
            log.write_header(&payload, &argv)?;
            let (stdout, stderr) = log.stdio()?;
            Ok::<_, TreadleError>((log.path().to_path_buf(), stdout, stderr))
        })
        .await
        .map_err(|join| TreadleError::HandlerAborted(format!("opening process log: {join}")))??
    };

    tracing::info!(
        task_type,
        command = %command_line,
        working_dir = %spec.working_dir.display(),
        "starting command"
    );
    tracing::info!(
        log_file = %log_path.display(),
        "follow with: tail -f \"{}\"",
        log_path.display()
    );

    let mut child = Command::new(&spec.program)
        .args(&spec.args)
        .current_dir(&spec.working_dir)
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(stderr)
        .spawn()
        .map_err(|source| TreadleError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

    let waited = match invocation.timeout {
        Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
            Ok(waited) => waited,
            Err(_) => {
                tracing::warn!(
                    pid = ?child.id(),
                    command = %command_line,
                    "timeout reached; process left running"
                );
                return Err(TreadleError::ProcessTimeout { after: limit });
            }
        },
        None => child.wait().await,
    };

    let status = waited.map_err(|source| TreadleError::Spawn {
        program: spec.program.clone(),
        source,
    })?;
    if status.success() {
        tracing::info!(task_type, command = %command_line, "command finished");
        Ok(())
    } else {
        Err(TreadleError::ProcessExecutionFailure {
            exit_code: status.code(),
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Arguments {
    List(Vec<String>),
    Line(String),
}

/// Extra arguments as a list, or as one whitespace-separated string
/// (older payloads stored `""` when there were none).
pub fn deserialize_arguments<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Arguments>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(Arguments::List(args)) => args,
        Some(Arguments::Line(line)) => line.split_whitespace().map(str::to_string).collect(),
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::impls::FsProcessLog;
    use crate::ports::ProcessLog;
    use rstest::rstest;
    use std::time::Duration;

    fn sh(script: &str, working_dir: &Path) -> CommandSpec {
        CommandSpec {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            working_dir: working_dir.to_path_buf(),
            config_file: "probe.py".to_string(),
        }
    }

    fn only_log_file(root: &Path) -> PathBuf {
        let dir = root.join("handler_log").join("shell");
        let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(entries.len(), 1);
        entries.remove(0)
    }

    #[rstest]
    #[case("train.py", ".")]
    #[case("tools/train.py", ".")]
    #[case("/opt/mmrotate/tools/train.py", "/opt/mmrotate")]
    #[case("", ".")]
    fn working_dir_defaults_to_script_grandparent(#[case] script: &str, #[case] expected: &str) {
        assert_eq!(default_working_dir(script), PathBuf::from(expected));
    }

    #[tokio::test]
    async fn output_lands_after_the_header() {
        let logs = tempfile::tempdir().unwrap();
        let sink: Arc<dyn ProcessLogSink> = Arc::new(FsProcessLog::new(logs.path()));
        let spec = sh("echo out; echo err >&2", logs.path());
        let invocation = Invocation::new(serde_json::json!({"k": "v"}));

        run_logged(sink, "shell", &spec, &invocation).await.unwrap();

        let text = std::fs::read_to_string(only_log_file(logs.path())).unwrap();
        let header_end = text.rfind(&"=".repeat(50)).unwrap();
        assert!(text.contains("config:\n{\n    \"k\": \"v\"\n}\n"));
        assert!(text.contains("command:\nsh -c echo out; echo err >&2\n"));
        assert!(text[header_end..].contains("out\n"));
        assert!(text[header_end..].contains("err\n"));
    }

    #[tokio::test]
    async fn non_zero_exit_carries_the_code() {
        let logs = tempfile::tempdir().unwrap();
        let sink: Arc<dyn ProcessLogSink> = Arc::new(FsProcessLog::new(logs.path()));
        let spec = sh("exit 3", logs.path());

        let err = run_logged(sink, "shell", &spec, &Invocation::new(serde_json::json!({})))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TreadleError::ProcessExecutionFailure { exit_code: Some(3) }
        ));
    }

    #[tokio::test]
    async fn deadline_yields_timeout_not_failure() {
        let logs = tempfile::tempdir().unwrap();
        let sink: Arc<dyn ProcessLogSink> = Arc::new(FsProcessLog::new(logs.path()));
        let spec = sh("sleep 2", logs.path());
        let invocation =
            Invocation::new(serde_json::json!({})).with_timeout(Duration::from_millis(100));

        let err = run_logged(sink, "shell", &spec, &invocation).await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let logs = tempfile::tempdir().unwrap();
        let sink: Arc<dyn ProcessLogSink> = Arc::new(FsProcessLog::new(logs.path()));
        let spec = CommandSpec {
            program: "/definitely/not/here".to_string(),
            args: vec![],
            working_dir: logs.path().to_path_buf(),
            config_file: "x.py".to_string(),
        };

        let err = run_logged(sink, "shell", &spec, &Invocation::new(serde_json::json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, TreadleError::Spawn { .. }));
        // header is written before the spawn attempt
        assert!(only_log_file(logs.path()).exists());
    }

    struct PanickingLog;

    impl ProcessLogSink for PanickingLog {
        fn open(&self, _task_type: &str, _config_file: &str) -> Result<ProcessLog, TreadleError> {
            panic!("log directory vanished");
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn log_preparation_panic_becomes_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let spec = sh("echo never", dir.path());

        let err = run_logged(
            Arc::new(PanickingLog),
            "shell",
            &spec,
            &Invocation::new(serde_json::json!({})),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TreadleError::HandlerAborted(_)));
        assert!(!dir.path().join("handler_log").exists());
    }
}

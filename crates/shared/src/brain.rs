use serde_json::{Map, Value};
use std::path::PathBuf;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::cache::{DiskCache, DEFAULT_TTL};

#[derive(Debug, Error)]
pub enum BrainError {
    #[error("failed to start brain program {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("brain I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode brain request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("brain exited with {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },

    #[error("brain returned an empty reply")]
    EmptyReply,
}

/// An external assistant program reached over stdin/stdout.
///
/// Each call starts the program, writes one JSON request
/// `{"command": ..., "context": {...}}` to its stdin and takes the trimmed
/// stdout as the reply.
#[derive(Debug, Clone)]
pub struct ExternalBrain {
    program: PathBuf,
    args: Vec<String>,
    cache: Option<DiskCache>,
}

impl ExternalBrain {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cache: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Reuse replies for identical requests for a day
    pub fn with_cache(mut self, cache: DiskCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub async fn execute(
        &self,
        command: &str,
        context: Map<String, Value>,
    ) -> Result<String, BrainError> {
        let request = serde_json::to_string(&serde_json::json!({
            "command": command,
            "context": context,
        }))?;

        match &self.cache {
            Some(cache) => {
                let key = format!("brain:{}", request);
                cache.memoize(&key, DEFAULT_TTL, || self.run(&request)).await
            }
            None => self.run(&request).await,
        }
    }

    async fn run(&self, request: &str) -> Result<String, BrainError> {
        debug!(program = %self.program.display(), "starting brain");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| BrainError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(request.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(BrainError::Failed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let reply = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if reply.is_empty() {
            return Err(BrainError::EmptyReply);
        }
        Ok(reply)
    }

    pub async fn social_post(&self, platform: &str, prompt: &str) -> Result<String, BrainError> {
        let command = format!("Create a {} post: {}", platform, prompt);
        self.execute(&command, Map::new()).await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn shell(script: &str) -> ExternalBrain {
        ExternalBrain::new("sh").arg("-c").arg(script)
    }

    #[tokio::test]
    async fn test_reply_is_trimmed_stdout() {
        let brain = shell("cat > /dev/null; echo '  great post  '");
        assert_eq!(brain.execute("hi", Map::new()).await.unwrap(), "great post");
    }

    #[tokio::test]
    async fn test_request_is_sent_as_json() {
        let brain = shell("cat");
        let reply = brain.social_post("facebook", "launch day").await.unwrap();
        let request: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(request["command"], "Create a facebook post: launch day");
        assert_eq!(request["context"], serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_non_zero_exit_reports_stderr() {
        let brain = shell("cat > /dev/null; echo broken >&2; exit 3");
        match brain.execute("hi", Map::new()).await {
            Err(BrainError::Failed { code, stderr }) => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "broken");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_reply_is_an_error() {
        let brain = shell("cat > /dev/null");
        assert!(matches!(
            brain.execute("hi", Map::new()).await,
            Err(BrainError::EmptyReply)
        ));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let brain = ExternalBrain::new("/definitely/not/a/brain");
        assert!(matches!(
            brain.execute("hi", Map::new()).await,
            Err(BrainError::Spawn { .. })
        ));
    }

    #[tokio::test]
    async fn test_cached_reply_skips_the_program() {
        let dir = TempDir::new().unwrap();
        let cache = DiskCache::in_output_dir(dir.path()).unwrap();

        let first = shell("cat > /dev/null; echo fresh").with_cache(cache.clone());
        assert_eq!(first.execute("same", Map::new()).await.unwrap(), "fresh");

        let second = shell("exit 1").with_cache(cache);
        assert_eq!(second.execute("same", Map::new()).await.unwrap(), "fresh");
    }

    #[tokio::test]
    async fn test_cache_key_covers_context() {
        let dir = TempDir::new().unwrap();
        let cache = DiskCache::in_output_dir(dir.path()).unwrap();
        let brain = shell("cat").with_cache(cache);

        let mut first = Map::new();
        first.insert("book".to_string(), Value::from("A"));
        let mut second = Map::new();
        second.insert("book".to_string(), Value::from("B"));

        let reply_a = brain.execute("same", first).await.unwrap();
        let reply_b = brain.execute("same", second).await.unwrap();
        assert_ne!(reply_a, reply_b);

        let echoed: Value = serde_json::from_str(&reply_b).unwrap();
        assert_eq!(echoed["context"]["book"], "B");
    }

    #[tokio::test]
    async fn test_failed_reply_is_not_cached() {
        let dir = TempDir::new().unwrap();
        let cache = DiskCache::in_output_dir(dir.path()).unwrap();

        let broken = shell("cat > /dev/null; exit 2").with_cache(cache.clone());
        assert!(broken.execute("retry me", Map::new()).await.is_err());

        let fixed = shell("cat > /dev/null; echo recovered").with_cache(cache);
        assert_eq!(fixed.execute("retry me", Map::new()).await.unwrap(), "recovered");
    }
}

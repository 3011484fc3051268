//! Read a text file from the configured workspace.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use sieve_core::types::ActionArgs;

use crate::error::ActionError;
use crate::handler::{required_str, single_string_schema, ActionHandler};

/// Files larger than this are cut off and marked.
const MAX_READ_BYTES: usize = 64 * 1024;

/// Reads files relative to a workspace root. Absolute paths and `..`
/// components are rejected, so the handler never leaves the root.
pub struct ReadFileHandler {
    root: PathBuf,
}

impl ReadFileHandler {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn resolve(&self, relative: &str) -> Result<PathBuf, ActionError> {
        let path = Path::new(relative);
        let escapes = path.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if path.is_absolute() || escapes {
            return Err(ActionError::InvalidArguments(format!(
                "path '{}' is outside the workspace",
                relative
            )));
        }
        Ok(self.root.join(path))
    }
}

#[async_trait]
impl ActionHandler for ReadFileHandler {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a text file from the workspace."
    }

    fn parameters(&self) -> serde_json::Value {
        single_string_schema("path", "Path of the file, relative to the workspace")
    }

    async fn invoke(&self, args: &ActionArgs) -> Result<String, ActionError> {
        let relative = required_str(args, "path")?;
        let path = self.resolve(relative)?;

        let mut content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ActionError::HandlerFailed(format!("{}: {}", relative, e)))?;

        if content.len() > MAX_READ_BYTES {
            let mut cut = MAX_READ_BYTES;
            while !content.is_char_boundary(cut) {
                cut -= 1;
            }
            content.truncate(cut);
            content.push_str("\n[truncated]");
        }

        tracing::debug!(path = %path.display(), bytes = content.len(), "File read");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn read(handler: &ReadFileHandler, path: &str) -> Result<String, ActionError> {
        let args = json!({ "path": path });
        handler.invoke(args.as_object().unwrap()).await
    }

    #[tokio::test]
    async fn test_reads_file_in_workspace() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("requirements.txt"), "serde\ntokio\n").unwrap();
        let handler = ReadFileHandler::new(dir.path());

        let text = read(&handler, "requirements.txt").await.unwrap();
        assert_eq!(text, "serde\ntokio\n");
    }

    #[tokio::test]
    async fn test_rejects_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let handler = ReadFileHandler::new(dir.path());
        let err = read(&handler, "../secret.txt").await.unwrap_err();
        assert!(matches!(err, ActionError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn test_rejects_absolute_path() {
        let dir = tempfile::tempdir().unwrap();
        let handler = ReadFileHandler::new(dir.path());
        let err = read(&handler, "/etc/passwd").await.unwrap_err();
        assert!(matches!(err, ActionError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn test_missing_file_is_handler_failure() {
        let dir = tempfile::tempdir().unwrap();
        let handler = ReadFileHandler::new(dir.path());
        let err = read(&handler, "nope.txt").await.unwrap_err();
        assert!(matches!(err, ActionError::HandlerFailed(ref m) if m.starts_with("nope.txt")));
    }

    #[tokio::test]
    async fn test_large_file_truncated() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("big.txt"), "a".repeat(MAX_READ_BYTES + 10)).unwrap();
        let handler = ReadFileHandler::new(dir.path());

        let text = read(&handler, "big.txt").await.unwrap();
        assert!(text.ends_with("[truncated]"));
        assert_eq!(text.len(), MAX_READ_BYTES + "\n[truncated]".len());
    }
}

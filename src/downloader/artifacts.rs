//! Locating, listing and serving finished artifacts in the download directory

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tokio::fs;

use crate::engine::EngineOutput;
use crate::error::{Error, Result};
use crate::types::OutputFormat;

/// One artifact file found in the download directory
#[derive(Debug, Clone)]
pub(crate) struct ArtifactFile {
    pub(crate) path: PathBuf,
    pub(crate) name: String,
    pub(crate) modified: SystemTime,
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
}

/// Regular files in `dir` whose extension is one of `extensions`
///
/// Entries whose metadata cannot be read are skipped with a warning.
pub(crate) async fn list(dir: &Path, extensions: &[String]) -> Result<Vec<ArtifactFile>> {
    let mut entries = fs::read_dir(dir).await?;
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !has_extension(&path, extensions) {
            continue;
        }
        let metadata = match entry.metadata().await {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!(?path, error = %e, "failed to read artifact metadata");
                continue;
            }
        };
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        let name = entry.file_name().to_string_lossy().into_owned();
        files.push(ArtifactFile {
            path,
            name,
            modified,
        });
    }
    Ok(files)
}

/// Number of artifacts in `dir`, 0 if the directory cannot be read
pub(crate) async fn count(dir: &Path, extensions: &[String]) -> usize {
    match list(dir, extensions).await {
        Ok(files) => files.len(),
        Err(e) => {
            tracing::warn!(?dir, error = %e, "failed to list download directory");
            0
        }
    }
}

async fn is_file(path: &Path) -> bool {
    fs::metadata(path).await.is_ok_and(|m| m.is_file())
}

/// Find the artifact an engine run produced
///
/// The path the engine reports is tried first, with its extension replaced
/// by the requested one (audio extraction renames the file after the engine
/// records it). Otherwise the newest file in `dir` whose name contains the
/// media id and carries the requested extension wins; equal timestamps are
/// broken by name so the choice is deterministic.
pub(crate) async fn locate(
    dir: &Path,
    output: &EngineOutput,
    format: OutputFormat,
) -> Option<PathBuf> {
    let extension = format.extension();

    if let Some(reported) = &output.filepath {
        let candidate = reported.with_extension(extension);
        if is_file(&candidate).await {
            return Some(candidate);
        }
    }

    if output.id.is_empty() {
        return None;
    }

    let files = match list(dir, &[extension.to_string()]).await {
        Ok(files) => files,
        Err(e) => {
            tracing::warn!(?dir, error = %e, "failed to scan download directory");
            return None;
        }
    };

    files
        .into_iter()
        .filter(|f| f.name.contains(&output.id))
        .max_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.name.cmp(&b.name)))
        .map(|f| f.path)
}

/// Resolve a caller-supplied artifact name to a file in `dir`
///
/// Names with path separators or parent references are rejected, as are
/// extensions that are not a supported output format.
pub(crate) async fn served_path(dir: &Path, filename: &str) -> Result<(PathBuf, OutputFormat)> {
    if filename.is_empty()
        || filename.contains('/')
        || filename.contains('\\')
        || filename.contains("..")
        || filename.contains('\0')
    {
        return Err(Error::InvalidInput(format!("invalid file name '{}'", filename)));
    }

    let format = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .and_then(OutputFormat::from_extension)
        .ok_or_else(|| Error::InvalidInput(format!("unsupported file type '{}'", filename)))?;

    let path = dir.join(filename);
    if !is_file(&path).await {
        return Err(Error::NotFound(format!("file {}", filename)));
    }
    Ok((path, format))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    fn output(id: &str, filepath: Option<PathBuf>) -> EngineOutput {
        EngineOutput {
            id: id.into(),
            title: "Song".into(),
            filepath,
        }
    }

    fn touch(path: &Path, modified: SystemTime) {
        let file = std::fs::File::create(path).unwrap();
        file.set_modified(modified).unwrap();
    }

    #[tokio::test]
    async fn reported_path_with_requested_extension_wins() {
        let dir = tempdir().unwrap();
        let final_path = dir.path().join("Song-abc.m4a");
        touch(&final_path, SystemTime::now());

        // Engine reported the pre-extraction container
        let reported = dir.path().join("Song-abc.webm");
        let found = locate(dir.path(), &output("abc", Some(reported)), OutputFormat::M4a).await;
        assert_eq!(found, Some(final_path));
    }

    #[tokio::test]
    async fn falls_back_to_newest_file_containing_id() {
        let dir = tempdir().unwrap();
        let now = SystemTime::now();
        touch(&dir.path().join("Old title-abc.m4a"), now - Duration::from_secs(60));
        touch(&dir.path().join("New title-abc.m4a"), now);
        touch(&dir.path().join("Other-xyz.m4a"), now + Duration::from_secs(60));
        touch(&dir.path().join("New title-abc.mp4"), now + Duration::from_secs(60));

        let found = locate(dir.path(), &output("abc", None), OutputFormat::M4a).await;
        assert_eq!(found, Some(dir.path().join("New title-abc.m4a")));
    }

    #[tokio::test]
    async fn equal_timestamps_break_ties_by_name() {
        let dir = tempdir().unwrap();
        let now = SystemTime::now();
        touch(&dir.path().join("A-abc.mp4"), now);
        touch(&dir.path().join("B-abc.mp4"), now);

        let found = locate(dir.path(), &output("abc", None), OutputFormat::Mp4).await;
        assert_eq!(found, Some(dir.path().join("B-abc.mp4")));
    }

    #[tokio::test]
    async fn missing_artifact_is_none() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("Song-abc.mp4"), SystemTime::now());

        assert_eq!(
            locate(dir.path(), &output("abc", None), OutputFormat::M4a).await,
            None
        );
        assert_eq!(
            locate(dir.path(), &output("", None), OutputFormat::Mp4).await,
            None
        );
    }

    #[tokio::test]
    async fn count_only_includes_artifact_extensions() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("a.m4a"), SystemTime::now());
        touch(&dir.path().join("b.MP4"), SystemTime::now());
        touch(&dir.path().join("c.part"), SystemTime::now());
        std::fs::create_dir(dir.path().join("d.mp4")).unwrap();

        let extensions = vec!["m4a".to_string(), "mp4".to_string()];
        assert_eq!(count(dir.path(), &extensions).await, 2);
        assert_eq!(count(&dir.path().join("missing"), &extensions).await, 0);
    }

    #[tokio::test]
    async fn served_path_rejects_traversal() {
        let dir = tempdir().unwrap();
        for name in ["../secret.m4a", "a/b.m4a", "..\\x.mp4", "", "..m4a"] {
            assert!(
                matches!(served_path(dir.path(), name).await, Err(Error::InvalidInput(_))),
                "{name:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn served_path_resolves_existing_artifacts() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("Song-abc.mp4"), SystemTime::now());

        let (path, format) = served_path(dir.path(), "Song-abc.mp4").await.unwrap();
        assert_eq!(path, dir.path().join("Song-abc.mp4"));
        assert_eq!(format, OutputFormat::Mp4);

        assert!(matches!(
            served_path(dir.path(), "Missing-abc.m4a").await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            served_path(dir.path(), "notes.txt").await,
            Err(Error::InvalidInput(_))
        ));
    }
}

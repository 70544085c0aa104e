//! Deterministic recursive directory walk.

use crate::ArtifactError;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Lists every regular file below `root`, depth first.
///
/// Entries of each directory are visited in lexicographic file-name order, so
/// two walks over the same tree always yield the same sequence. Symbolic links
/// are not followed. A subdirectory that cannot be read is logged and skipped;
/// only failure to read `root` itself is an error.
pub async fn walk_files(root: &Path) -> Result<Vec<PathBuf>, ArtifactError> {
	let mut entries = read_sorted(root)
		.await
		.map_err(|e| ArtifactError::Io(format!("{}: {}", root.display(), e)))?;
	entries.reverse();

	let mut files = Vec::new();
	while let Some((path, is_dir)) = entries.pop() {
		if !is_dir {
			files.push(path);
			continue;
		}
		match read_sorted(&path).await {
			Ok(children) => entries.extend(children.into_iter().rev()),
			Err(e) => {
				tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable directory");
			},
		}
	}

	Ok(files)
}

async fn read_sorted(dir: &Path) -> std::io::Result<Vec<(PathBuf, bool)>> {
	let mut reader = fs::read_dir(dir).await?;
	let mut entries = Vec::new();

	while let Some(entry) = reader.next_entry().await? {
		let file_type = entry.file_type().await?;
		if file_type.is_symlink() {
			continue;
		}
		entries.push((entry.file_name(), entry.path(), file_type.is_dir()));
	}

	entries.sort_by(|a, b| a.0.cmp(&b.0));
	Ok(entries
		.into_iter()
		.map(|(_, path, is_dir)| (path, is_dir))
		.collect())
}

//! Naming of shard directories and stored objects.

use std::path::{Component, Path, PathBuf};

use chrono::NaiveDate;
use uuid::Uuid;

/// Shard directory for a user on a given day: `{root}/{user_id}/{YYYY-MM-DD}`.
pub fn shard_dir(root: &Path, user_id: i64, day: NaiveDate) -> PathBuf {
    root.join(user_id.to_string())
        .join(day.format("%Y-%m-%d").to_string())
}

/// Fresh opaque object name `{uuid}.{ext}`.
pub fn object_name(extension: &str) -> String {
    format!("{}.{}", Uuid::new_v4(), extension)
}

/// Hidden sibling used while an object is being written.
pub fn temp_path_for(target: &Path) -> Option<PathBuf> {
    let name = target.file_name()?.to_str()?;
    Some(target.with_file_name(format!(".{}.tmp", name)))
}

/// Stored extensions are short lowercase alphanumerics.
pub fn is_valid_extension(extension: &str) -> bool {
    !extension.is_empty()
        && extension.len() <= 16
        && extension
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
}

/// True when `path` lies under `root` without any `..` component.
pub fn is_within(root: &Path, path: &Path) -> bool {
    if path
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::CurDir))
    {
        return false;
    }
    path.starts_with(root) && path != root
}

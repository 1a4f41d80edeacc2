//! Sanitization of caller-supplied folder paths and file names.
//!
//! Folder paths are logical tags stored on file records. They never reach the
//! filesystem, but they are still normalized into a single canonical form so
//! that prefix matching during folder rename and delete is exact.

/// Normalize a logical folder path.
///
/// Trims whitespace, turns `\` into `/`, strips every `..`, collapses repeated
/// separators and strips leading and trailing separators. The empty string is
/// the root folder. Applying it twice yields the same result as once.
pub fn sanitize_folder_path(raw: &str) -> String {
    let unified = raw.trim().replace('\\', "/").replace("..", "");

    let mut collapsed = String::with_capacity(unified.len());
    let mut previous_slash = false;
    for c in unified.chars() {
        if c == '/' {
            if previous_slash {
                continue;
            }
            previous_slash = true;
        } else {
            previous_slash = false;
        }
        collapsed.push(c);
    }

    collapsed
        .trim_matches(|c: char| c == '/' || c.is_whitespace())
        .to_string()
}

/// Reduce a caller-supplied file name to a safe display name.
///
/// Keeps only the final path component, drops control characters and
/// surrounding whitespace. Returns an empty string when nothing usable is
/// left; callers treat that as invalid input.
pub fn sanitize_filename(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or("");

    let cleaned: String = base
        .chars()
        .filter(|c| (*c as u32) >= 32 && (*c as u32) != 127)
        .collect();

    let trimmed = cleaned.trim();
    if trimmed == "." || trimmed == ".." {
        return String::new();
    }
    trimmed.to_string()
}

/// Lowercased extension of `name`, if any.
///
/// A bare dotfile such as `.htaccess` yields `htaccess`.
pub fn file_extension(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_folder_path_basic() {
        assert_eq!(sanitize_folder_path("docs/reports"), "docs/reports");
        assert_eq!(sanitize_folder_path("  /docs//reports/ "), "docs/reports");
        assert_eq!(sanitize_folder_path("docs\\reports\\2024"), "docs/reports/2024");
        assert_eq!(sanitize_folder_path("///"), "");
        assert_eq!(sanitize_folder_path(""), "");
    }

    #[test]
    fn test_sanitize_folder_path_strips_traversal() {
        assert_eq!(sanitize_folder_path("../../etc/passwd"), "etc/passwd");
        assert_eq!(sanitize_folder_path("a/../b"), "a/b");
        assert_eq!(sanitize_folder_path("..\\..\\secret"), "secret");
        assert!(!sanitize_folder_path("a/..../b").contains(".."));
        assert!(!sanitize_folder_path("a/.../b").contains(".."));
    }

    #[test]
    fn test_sanitize_folder_path_idempotent() {
        let inputs = [
            "  /a//b/ ",
            " / a",
            "a/ /b",
            "../x/../y",
            "....//....",
            "\\\\server\\share\\",
            "a/./b",
            "photos / 2024 ",
            "",
        ];
        for input in inputs {
            let once = sanitize_folder_path(input);
            assert_eq!(sanitize_folder_path(&once), once, "input {:?}", input);
        }
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("report.pdf"), "report.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\notes.txt"), "notes.txt");
        assert_eq!(sanitize_filename("  spaced name.txt  "), "spaced name.txt");
        assert_eq!(sanitize_filename("bad\u{0}\u{7f}name\n.txt"), "badname.txt");
    }

    #[test]
    fn test_sanitize_filename_rejects_dots_and_empty() {
        assert_eq!(sanitize_filename(".."), "");
        assert_eq!(sanitize_filename("dir/."), "");
        assert_eq!(sanitize_filename("dir/"), "");
        assert_eq!(sanitize_filename("   "), "");
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("photo.JPG"), Some("jpg".to_string()));
        assert_eq!(file_extension("archive.tar.gz"), Some("gz".to_string()));
        assert_eq!(file_extension(".htaccess"), Some("htaccess".to_string()));
        assert_eq!(file_extension("README"), None);
        assert_eq!(file_extension("trailing."), None);
    }
}

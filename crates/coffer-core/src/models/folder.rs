use serde::Serialize;

/// Folder tree node derived from the folder paths of a user's files.
///
/// Folders are never stored; a node exists because some file lives in it or
/// in one of its descendants.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FolderNode {
    pub name: String,
    /// Full canonical path from the root
    pub path: String,
    #[serde(default)]
    pub children: Vec<FolderNode>,
}

/// Build a folder tree from canonical folder paths, adding implied ancestors.
///
/// Empty paths (root) are skipped. Siblings are sorted by name.
pub fn build_folder_tree<I, S>(paths: I) -> Vec<FolderNode>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut roots: Vec<FolderNode> = Vec::new();

    for path in paths {
        let mut level = &mut roots;
        let mut current = String::new();

        for segment in path.as_ref().split('/').filter(|s| !s.is_empty()) {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(segment);

            let idx = match level.iter().position(|node| node.name == segment) {
                Some(idx) => idx,
                None => {
                    level.push(FolderNode {
                        name: segment.to_string(),
                        path: current.clone(),
                        children: Vec::new(),
                    });
                    level.len() - 1
                }
            };
            level = &mut level[idx].children;
        }
    }

    fn sort_children(nodes: &mut [FolderNode]) {
        nodes.sort_by(|a, b| a.name.cmp(&b.name));
        for node in nodes {
            sort_children(&mut node.children);
        }
    }

    sort_children(&mut roots);
    roots
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_tree_adds_implied_ancestors() {
        let tree = build_folder_tree(["work/reports/2024", "photos", "work/drafts"]);

        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].name, "photos");
        assert_eq!(tree[1].name, "work");
        assert_eq!(tree[1].path, "work");

        let work_children: Vec<&str> = tree[1].children.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(work_children, vec!["drafts", "reports"]);
        assert_eq!(tree[1].children[1].children[0].path, "work/reports/2024");
    }

    #[test]
    fn test_build_tree_skips_root_and_duplicates() {
        let tree = build_folder_tree(["", "a", "a", "a/b"]);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].children.len(), 1);
        assert_eq!(tree[0].children[0].path, "a/b");
    }
}

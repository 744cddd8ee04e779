//! File and directory node types.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Type of node in the traversal tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    /// Regular file.
    File,
    /// Directory.
    Directory {
        /// Total number of files in this subtree.
        file_count: u64,
        /// Total number of directories in this subtree.
        dir_count: u64,
    },
    /// Symbolic link to a file inside the scan root.
    ///
    /// Links to directories are re-homed as [`NodeKind::Directory`] nodes
    /// carrying the link's name, so a symlink node is always a leaf whose
    /// content is the target file's content.
    Symlink {
        /// Canonical path of the link target.
        target: PathBuf,
    },
}

impl NodeKind {
    /// Check if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, NodeKind::Directory { .. })
    }

    /// Check if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, NodeKind::File)
    }

    /// Check if this is a symlink.
    pub fn is_symlink(&self) -> bool {
        matches!(self, NodeKind::Symlink { .. })
    }
}

/// A single entry in the traversal tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Entry name (not full path).
    pub name: CompactString,

    /// Node type and associated metadata.
    pub kind: NodeKind,

    /// Size in bytes (aggregate for directories).
    pub size: u64,

    /// Depth below the scan root (root = 0).
    pub depth: u32,

    /// Path relative to the source's local path, as the user sees it.
    pub relative_path: PathBuf,

    /// Path the content is read from (the resolved target for links).
    pub absolute_path: PathBuf,

    /// Children (directories only), directories first then by name.
    pub children: Vec<Node>,
}

impl Node {
    /// Create a new file node.
    pub fn new_file(
        name: impl Into<CompactString>,
        size: u64,
        depth: u32,
        relative_path: impl Into<PathBuf>,
        absolute_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::File,
            size,
            depth,
            relative_path: relative_path.into(),
            absolute_path: absolute_path.into(),
            children: Vec::new(),
        }
    }

    /// Create a new, empty directory node.
    pub fn new_directory(
        name: impl Into<CompactString>,
        depth: u32,
        relative_path: impl Into<PathBuf>,
        absolute_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Directory {
                file_count: 0,
                dir_count: 0,
            },
            size: 0,
            depth,
            relative_path: relative_path.into(),
            absolute_path: absolute_path.into(),
            children: Vec::new(),
        }
    }

    /// Create a symlink leaf pointing at a file.
    pub fn new_symlink(
        name: impl Into<CompactString>,
        target: impl Into<PathBuf>,
        size: u64,
        depth: u32,
        relative_path: impl Into<PathBuf>,
    ) -> Self {
        let target = target.into();
        Self {
            name: name.into(),
            kind: NodeKind::Symlink {
                target: target.clone(),
            },
            size,
            depth,
            relative_path: relative_path.into(),
            absolute_path: target,
            children: Vec::new(),
        }
    }

    /// Check if this node is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    /// Check if this node is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// Whether this node contributes text to the digest.
    pub fn has_content(&self) -> bool {
        !self.is_dir()
    }

    /// Get the number of direct children.
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Get file count for directories, 1 for files and symlinks.
    pub fn file_count(&self) -> u64 {
        match &self.kind {
            NodeKind::Directory { file_count, .. } => *file_count,
            NodeKind::File | NodeKind::Symlink { .. } => 1,
        }
    }

    /// Get directory count for directories.
    pub fn dir_count(&self) -> u64 {
        match &self.kind {
            NodeKind::Directory { dir_count, .. } => *dir_count,
            NodeKind::File | NodeKind::Symlink { .. } => 0,
        }
    }

    /// Relative path with `/` separators regardless of platform.
    pub fn display_path(&self) -> String {
        to_slash(&self.relative_path)
    }

    /// Sort children: directories before files, then by name.
    ///
    /// This is the only ordering the digest ever uses.
    pub fn sort_children(&mut self) {
        self.children.sort_by(compare_nodes);
    }

    /// Recompute size and counts from the direct children.
    pub fn update_counts(&mut self) {
        if let NodeKind::Directory {
            ref mut file_count,
            ref mut dir_count,
        } = self.kind
        {
            *file_count = 0;
            *dir_count = 0;
            self.size = 0;

            for child in &self.children {
                self.size += child.size;
                match &child.kind {
                    NodeKind::File | NodeKind::Symlink { .. } => *file_count += 1,
                    NodeKind::Directory {
                        file_count: fc,
                        dir_count: dc,
                    } => {
                        *file_count += fc;
                        *dir_count += dc + 1;
                    }
                }
            }
        }
    }

    /// Visit every content-bearing node in digest order.
    pub fn for_each_file<'a>(&'a self, visit: &mut impl FnMut(&'a Node)) {
        match &self.kind {
            NodeKind::Directory { .. } => {
                for child in &self.children {
                    child.for_each_file(visit);
                }
            }
            NodeKind::File | NodeKind::Symlink { .. } => visit(self),
        }
    }
}

fn compare_nodes(a: &Node, b: &Node) -> Ordering {
    b.is_dir()
        .cmp(&a.is_dir())
        .then_with(|| a.name.cmp(&b.name))
}

/// Render a path with `/` separators.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dir_with(children: Vec<Node>) -> Node {
        let mut dir = Node::new_directory("root", 0, "", "/root");
        dir.children = children;
        dir
    }

    #[test]
    fn test_file_node_creation() {
        let node = Node::new_file("test.txt", 1024, 1, "test.txt", "/r/test.txt");
        assert!(node.is_file());
        assert!(!node.is_dir());
        assert_eq!(node.size, 1024);
        assert_eq!(node.file_count(), 1);
    }

    #[test]
    fn test_symlink_counts_as_file() {
        let node = Node::new_symlink("link", "/r/target.txt", 3, 1, "link");
        assert!(node.kind.is_symlink());
        assert!(node.has_content());
        assert_eq!(node.file_count(), 1);
        assert_eq!(node.absolute_path, PathBuf::from("/r/target.txt"));
    }

    #[test]
    fn test_sort_directories_first() {
        let mut root = dir_with(vec![
            Node::new_file("b.txt", 1, 1, "b.txt", "/root/b.txt"),
            Node::new_file("a.txt", 1, 1, "a.txt", "/root/a.txt"),
            Node::new_directory("sub", 1, "sub", "/root/sub"),
        ]);
        root.sort_children();

        let names: Vec<_> = root.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["sub", "a.txt", "b.txt"]);
    }

    #[test]
    fn test_update_counts() {
        let mut sub = Node::new_directory("sub", 1, "sub", "/root/sub");
        sub.children
            .push(Node::new_file("c.txt", 5, 2, "sub/c.txt", "/root/sub/c.txt"));
        sub.update_counts();

        let mut root = dir_with(vec![
            sub,
            Node::new_file("a.txt", 2, 1, "a.txt", "/root/a.txt"),
        ]);
        root.update_counts();

        assert_eq!(root.size, 7);
        assert_eq!(root.file_count(), 2);
        assert_eq!(root.dir_count(), 1);
    }

    #[test]
    fn test_to_slash() {
        let path: PathBuf = ["src", "lib", "mod.rs"].iter().collect();
        assert_eq!(to_slash(&path), "src/lib/mod.rs");
        assert_eq!(to_slash(Path::new("")), "");
    }
}

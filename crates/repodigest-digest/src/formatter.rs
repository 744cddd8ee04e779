//! Rendering of the summary, tree and content sections.

use std::path::Path;

use repodigest_core::{IngestConfig, Node, NodeKind, SourceInfo, SourceTree, to_slash};

use crate::tokens::{TokenCounter, default_counter, estimate};

/// Banner line around every content header.
pub const SEPARATOR: &str = "================================================";

/// Header of the tree section.
const TREE_HEADER: &str = "Directory structure:\n";

/// The three sections of a digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    /// Source identity, counts and token estimate.
    pub summary: String,
    /// Indented directory listing.
    pub tree: String,
    /// Concatenated file contents.
    pub content: String,
}

impl Digest {
    /// Full digest text as written to disk.
    pub fn to_text(&self) -> String {
        format!("{}\n\n{}\n{}", self.summary, self.tree, self.content)
    }
}

/// Text of one file ready to be placed in the content section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileText {
    /// Path relative to the source.
    pub relative_path: std::path::PathBuf,
    /// Resolved target when the file is reached through a symlink.
    pub link_target: Option<std::path::PathBuf>,
    /// Text to render: content, a placeholder or a read error.
    pub text: String,
}

/// Renders digests; owns the token counter.
pub struct DigestFormatter {
    counter: Box<dyn TokenCounter>,
}

impl DigestFormatter {
    /// Formatter using the default token counter.
    pub fn new() -> Self {
        Self::with_counter(default_counter())
    }

    /// Formatter using a specific token counter.
    pub fn with_counter(counter: Box<dyn TokenCounter>) -> Self {
        Self { counter }
    }

    /// Digest for a scanned directory; `files` must be in tree order.
    pub fn format_directory(&self, tree: &SourceTree, files: &[FileText]) -> Digest {
        let config = &tree.config;
        let mut summary = identity_line(&config.source);
        summary.push_str(&format!("Files analyzed: {}\n", tree.total_files()));
        if !config.is_root_subpath() {
            summary.push_str(&format!("Subpath: {}\n", config.subpath));
        }
        push_revision(&mut summary, &config.source);

        let tree_text = render_tree(&tree.root);
        let content: String = files.iter().map(content_block).collect();

        if let Some(tokens) = estimate(self.counter.as_ref(), &format!("{tree_text}{content}")) {
            summary.push_str(&format!("\nEstimated tokens: {tokens}"));
        }

        Digest {
            summary,
            tree: tree_text,
            content,
        }
    }

    /// Digest for a source that is a single file.
    pub fn format_single_file(&self, config: &IngestConfig, file: &FileText, size: u64) -> Digest {
        let name = file
            .relative_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| to_slash(&file.relative_path));

        let mut summary = identity_line(&config.source);
        summary.push_str(&format!("File: {name}\n"));
        summary.push_str(&format!("Size: {size} bytes\n"));
        summary.push_str(&format!("Lines: {}\n", file.text.lines().count()));
        push_revision(&mut summary, &config.source);

        let content = content_block(file);
        if let Some(tokens) = estimate(self.counter.as_ref(), &content) {
            summary.push_str(&format!("\nEstimated tokens: {tokens}"));
        }

        Digest {
            summary,
            tree: format!("{TREE_HEADER}└── {name}\n"),
            content,
        }
    }
}

impl Default for DigestFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn identity_line(source: &SourceInfo) -> String {
    match (&source.user_name, &source.repo_name) {
        (Some(user), Some(repo)) => format!("Repository: {user}/{repo}\n"),
        _ => format!("Directory: {}\n", source.slug),
    }
}

fn push_revision(summary: &mut String, source: &SourceInfo) {
    if let Some(commit) = &source.commit {
        summary.push_str(&format!("Commit: {commit}\n"));
    } else if let Some(branch) = &source.branch {
        if branch != "main" && branch != "master" {
            summary.push_str(&format!("Branch: {branch}\n"));
        }
    }
}

/// Indented tree listing, directories suffixed with `/`.
pub fn render_tree(root: &Node) -> String {
    let mut out = String::from(TREE_HEADER);
    render_node(root, "", true, &mut out);
    out
}

fn render_node(node: &Node, prefix: &str, is_last: bool, out: &mut String) {
    out.push_str(prefix);
    out.push_str(if is_last { "└── " } else { "├── " });
    out.push_str(&node.name);
    match &node.kind {
        NodeKind::Directory { .. } => out.push('/'),
        NodeKind::Symlink { target } => {
            out.push_str(" -> ");
            out.push_str(&target_name(target));
        }
        NodeKind::File => {}
    }
    out.push('\n');

    if node.is_dir() {
        let child_prefix = format!("{prefix}{}", if is_last { "    " } else { "│   " });
        let last = node.children.len().saturating_sub(1);
        for (i, child) in node.children.iter().enumerate() {
            render_node(child, &child_prefix, i == last, out);
        }
    }
}

/// Banner, path header, banner, text, blank line.
pub fn content_block(file: &FileText) -> String {
    let header = match &file.link_target {
        Some(target) => format!(
            "SYMLINK: {} -> {}",
            to_slash(&file.relative_path),
            target_name(target)
        ),
        None => format!("FILE: {}", to_slash(&file.relative_path)),
    };
    format!("{SEPARATOR}\n{header}\n{SEPARATOR}\n{}\n\n", file.text)
}

fn target_name(target: &Path) -> String {
    target
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| to_slash(target))
}

use crate::files::{FileHandle, FileStatus, ViewedState};
use crate::styles;
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use std::collections::BTreeMap;

// Glyphs for tree rendering (GitHub-style collapsed tree)
const DIR_ICON: &str = "▸ ";
const FILE_ICON: &str = "• ";
const GLYPH_VIEWED: &str = "✓";
const GLYPH_UNVIEWED: &str = "○";
const GLYPH_DISMISSED: &str = "−";

/// One node of the intermediate directory tree.
///
/// Exactly one of `children` / `file` is populated: directories never carry
/// a file reference and vice versa.
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub name: String,
    /// Back-reference to the changed file (leaves only)
    pub file: Option<FileHandle>,
    /// Child name → node, ordered by name
    pub children: BTreeMap<String, TreeNode>,
}

impl TreeNode {
    fn dir(name: impl Into<String>) -> Self {
        TreeNode {
            name: name.into(),
            file: None,
            children: BTreeMap::new(),
        }
    }

    fn leaf(name: impl Into<String>, file: FileHandle) -> Self {
        TreeNode {
            name: name.into(),
            file: Some(file),
            children: BTreeMap::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.file.is_some()
    }
}

/// Flattened render output: one styled line per node plus the leaf index.
/// Both are constructed fresh on every render — never shared, never patched.
#[derive(Debug, Default)]
pub struct RenderedTree {
    pub lines: Vec<Line<'static>>,
    /// (1-based render line, file) for every leaf, in emission order
    pub leaves: Vec<(usize, FileHandle)>,
}

/// Build the nested directory tree from a flat file list.
/// Paths are `/`-delimited with no `.`/`..` segments.
pub fn build(files: &[FileHandle]) -> TreeNode {
    let mut root = TreeNode::dir("");
    for file in files {
        let path = file.borrow().path.clone();
        let mut node = &mut root;
        let segments: Vec<&str> = path.split('/').collect();
        for (i, segment) in segments.iter().enumerate() {
            if i + 1 == segments.len() {
                node.children
                    .insert(segment.to_string(), TreeNode::leaf(*segment, file.clone()));
            } else {
                node = node
                    .children
                    .entry(segment.to_string())
                    .or_insert_with(|| TreeNode::dir(*segment));
            }
        }
    }
    root
}

/// Collapse single-directory chains, GitHub style: a directory whose only
/// child is itself a directory merges into `"parent/child"`. Post-order, so
/// chains of any depth fully collapse in one pass. Files never collapse.
pub fn collapse(node: &mut TreeNode) {
    let children = std::mem::take(&mut node.children);
    for (_, mut child) in children {
        collapse(&mut child);
        if !child.is_leaf() {
            while child.children.len() == 1 {
                let Some((sub_name, sub)) = child.children.pop_first() else { break };
                if sub.is_leaf() {
                    // A leaf-only single child never merges
                    child.children.insert(sub_name, sub);
                    break;
                }
                child.name = format!("{}/{}", child.name, sub_name);
                child.children = sub.children;
            }
        }
        node.children.insert(child.name.clone(), child);
    }
}

/// Render the collapsed tree to styled lines.
///
/// Pre-order; at each level directories come before files, then
/// lexicographically by name. Total and deterministic: the same tree always
/// produces byte-identical lines and an identical leaf index.
pub fn render(root: &TreeNode) -> RenderedTree {
    let mut out = RenderedTree::default();
    let ordered = ordered_children(root);
    for (i, child) in ordered.iter().enumerate() {
        let last = i + 1 == ordered.len();
        render_node(child, "", last, true, &mut out);
    }
    out
}

/// Convenience: build + collapse + render in one step
pub fn build_and_render(files: &[FileHandle]) -> RenderedTree {
    let mut root = build(files);
    collapse(&mut root);
    render(&root)
}

fn ordered_children(node: &TreeNode) -> Vec<&TreeNode> {
    let (dirs, files): (Vec<&TreeNode>, Vec<&TreeNode>) =
        node.children.values().partition(|c| !c.is_leaf());
    dirs.into_iter().chain(files).collect()
}

fn render_node(node: &TreeNode, prefix: &str, last: bool, root_level: bool, out: &mut RenderedTree) {
    // Root-level items carry no branch glyph or indentation
    let own_prefix = if root_level {
        String::new()
    } else {
        format!("{}{} ", prefix, if last { "└" } else { "├" })
    };

    if let Some(file) = &node.file {
        out.lines.push(leaf_line(&own_prefix, node, file));
        out.leaves.push((out.lines.len(), file.clone()));
        return;
    }

    out.lines.push(Line::from(vec![
        Span::styled(own_prefix.clone(), styles::dim_style()),
        Span::styled(DIR_ICON.to_string(), styles::muted_style()),
        Span::styled(node.name.clone(), styles::text_style()),
    ]));

    let child_prefix = if root_level {
        String::new()
    } else {
        format!("{}{}", prefix, if last { "  " } else { "│ " })
    };
    let ordered = ordered_children(node);
    for (i, child) in ordered.iter().enumerate() {
        let child_last = i + 1 == ordered.len();
        render_node(child, &child_prefix, child_last, false, out);
    }
}

fn leaf_line(prefix: &str, node: &TreeNode, file: &FileHandle) -> Line<'static> {
    let entry = file.borrow();
    let name_style = status_style(&entry.status);

    let mut spans = vec![
        Span::styled(prefix.to_string(), styles::dim_style()),
        Span::styled(FILE_ICON.to_string(), name_style),
        Span::styled(node.name.clone(), name_style),
    ];

    let stats = compact_stats(entry.adds, entry.dels);
    if !stats.is_empty() {
        spans.push(Span::styled(format!(" {stats}"), styles::muted_style()));
    }

    spans.push(Span::styled(
        format!(" {}", viewed_glyph(entry.viewed)),
        viewed_style(entry.viewed),
    ));

    Line::from(spans)
}

fn status_style(status: &FileStatus) -> Style {
    match status {
        FileStatus::Added => styles::status_added(),
        FileStatus::Deleted => styles::status_deleted(),
        FileStatus::Modified => styles::status_modified(),
        FileStatus::Renamed(_) => styles::status_renamed(),
    }
}

/// Compact stat suffix: `+A -D`, omitting a zero side, separating space
/// only when both are present
fn compact_stats(adds: usize, dels: usize) -> String {
    match (adds, dels) {
        (0, 0) => String::new(),
        (a, 0) => format!("+{a}"),
        (0, d) => format!("-{d}"),
        (a, d) => format!("+{a} -{d}"),
    }
}

fn viewed_glyph(state: ViewedState) -> &'static str {
    match state {
        ViewedState::Viewed => GLYPH_VIEWED,
        ViewedState::Dismissed => GLYPH_DISMISSED,
        ViewedState::Unviewed => GLYPH_UNVIEWED,
    }
}

fn viewed_style(state: ViewedState) -> Style {
    match state {
        ViewedState::Viewed => styles::status_added(),
        ViewedState::Dismissed => styles::dim_style(),
        ViewedState::Unviewed => styles::muted_style(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::{file_handle, FileEntry};

    fn handles(paths: &[&str]) -> Vec<FileHandle> {
        paths
            .iter()
            .map(|p| file_handle(FileEntry::new(*p, FileStatus::Modified, 1, 1)))
            .collect()
    }

    fn plain(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    fn rendered_names(tree: &RenderedTree) -> Vec<String> {
        tree.lines.iter().map(plain).collect()
    }

    #[test]
    fn single_chain_collapses_fully() {
        // a/b/c/file.txt with no siblings anywhere → one dir node "a/b/c"
        let files = handles(&["a/b/c/file.txt"]);
        let mut root = build(&files);
        collapse(&mut root);
        assert_eq!(root.children.len(), 1);
        let dir = root.children.values().next().unwrap();
        assert_eq!(dir.name, "a/b/c");
        assert_eq!(dir.children.len(), 1);
        assert!(dir.children.values().next().unwrap().is_leaf());
    }

    #[test]
    fn sibling_file_blocks_collapse() {
        // A file directly under a/b keeps a/b separate from c
        let files = handles(&["a/b/c/file.txt", "a/b/other.txt"]);
        let mut root = build(&files);
        collapse(&mut root);
        let dir = root.children.values().next().unwrap();
        assert_eq!(dir.name, "a/b");
        assert_eq!(dir.children.len(), 2);
        // The inner chain still collapsed on its own
        assert!(dir.children.contains_key("c"));
    }

    #[test]
    fn leaf_only_single_child_never_collapses() {
        let files = handles(&["a/file.txt"]);
        let mut root = build(&files);
        collapse(&mut root);
        let dir = root.children.values().next().unwrap();
        assert_eq!(dir.name, "a");
        assert!(dir.children.values().next().unwrap().is_leaf());
    }

    #[test]
    fn mixed_tree_shape_two_files_and_root_leaf() {
        // ["a/b/x.go","a/b/y.go","c.go"] → root entries "a/b" (dir, two
        // children) and "c.go" (leaf); "a" alone never appears
        let files = handles(&["a/b/x.go", "a/b/y.go", "c.go"]);
        let mut root = build(&files);
        collapse(&mut root);
        assert_eq!(root.children.len(), 2);
        assert!(root.children.contains_key("a/b"));
        assert!(!root.children.contains_key("a"));
        let ab = &root.children["a/b"];
        assert_eq!(ab.children.len(), 2);
        assert!(root.children["c.go"].is_leaf());
    }

    #[test]
    fn directories_render_before_files() {
        let files = handles(&["zz.txt", "a/one.txt", "a/two.txt"]);
        let tree = build_and_render(&files);
        let names = rendered_names(&tree);
        // dir "a" first, then its children, then the root-level file
        assert!(names[0].contains("a"));
        assert!(names[1].contains("one.txt"));
        assert!(names[2].contains("two.txt"));
        assert!(names[3].contains("zz.txt"));
    }

    #[test]
    fn branch_glyphs_mark_last_sibling() {
        let files = handles(&["d/a.txt", "d/b.txt"]);
        let tree = build_and_render(&files);
        let names = rendered_names(&tree);
        assert!(names[1].starts_with("├ "));
        assert!(names[2].starts_with("└ "));
    }

    #[test]
    fn nested_prefix_uses_pipe_for_open_branch() {
        // dir "a" has a subdir and a file, so the subdir's child carries
        // the "│ " continuation segment
        let files = handles(&["a/b/deep.txt", "a/tail1.txt", "a/tail2.txt"]);
        let tree = build_and_render(&files);
        let names = rendered_names(&tree);
        // a (root) / ├ b / │ └ deep.txt / ├ tail1.txt / └ tail2.txt
        assert!(names[2].starts_with("│ └ "), "got {:?}", names[2]);
    }

    #[test]
    fn render_is_deterministic() {
        let files = handles(&["a/b/x.go", "a/b/y.go", "c.go", "src/lib.rs"]);
        let first = build_and_render(&files);
        let second = build_and_render(&files);
        assert_eq!(rendered_names(&first), rendered_names(&second));
        let idx = |t: &RenderedTree| {
            t.leaves
                .iter()
                .map(|(n, f)| (*n, f.borrow().path.clone()))
                .collect::<Vec<_>>()
        };
        assert_eq!(idx(&first), idx(&second));
    }

    #[test]
    fn every_file_indexed_exactly_once() {
        let files = handles(&["a/b/x.go", "a/b/y.go", "c.go"]);
        let tree = build_and_render(&files);
        assert_eq!(tree.leaves.len(), files.len());
        let mut paths: Vec<String> = tree
            .leaves
            .iter()
            .map(|(_, f)| f.borrow().path.clone())
            .collect();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), files.len());
    }

    #[test]
    fn leaf_index_lines_match_emitted_lines() {
        let files = handles(&["a/b/x.go", "c.go"]);
        let tree = build_and_render(&files);
        for (line_no, file) in &tree.leaves {
            let text = plain(&tree.lines[line_no - 1]);
            let name = file.borrow().basename().to_string();
            assert!(text.contains(&name), "{text:?} missing {name}");
        }
    }

    #[test]
    fn stat_suffix_omits_zero_sides() {
        assert_eq!(compact_stats(3, 2), "+3 -2");
        assert_eq!(compact_stats(3, 0), "+3");
        assert_eq!(compact_stats(0, 2), "-2");
        assert_eq!(compact_stats(0, 0), "");
    }

    #[test]
    fn viewed_glyph_defaults_to_unviewed() {
        assert_eq!(viewed_glyph(ViewedState::default()), GLYPH_UNVIEWED);
        assert_eq!(viewed_glyph(ViewedState::Viewed), GLYPH_VIEWED);
        assert_eq!(viewed_glyph(ViewedState::Dismissed), GLYPH_DISMISSED);
    }
}

use crate::files::{FileHandle, FileList};
use crate::host::{Host, SurfaceId, WorkspaceId};
use crate::review::{Commit, CommitList, ReviewLevel};
use crate::styles;
use crate::tree;
use crate::util::word_wrap;
use ratatui::text::{Line, Span};
use std::collections::HashMap;

/// What a commit-selector line points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitTarget {
    /// The synthetic "All commits" entry: PR-level review
    AllCommits,
    /// Index into the shared commit list
    Commit(usize),
}

/// What the cursor is on
#[derive(Debug, Clone)]
pub enum PanelEntity {
    File(FileHandle),
    Commit(CommitTarget),
}

/// Mapping from 1-based render lines to entities.
///
/// Rebuilt in full on every render and never partially patched, so it can
/// never point at a stale line after the file set or commit list changes.
/// Always constructed fresh per panel instance — no shared defaults.
#[derive(Debug, Default)]
pub struct LineIndex {
    files: HashMap<usize, FileHandle>,
    commits: HashMap<usize, CommitTarget>,
}

impl LineIndex {
    fn new() -> Self {
        LineIndex {
            files: HashMap::new(),
            commits: HashMap::new(),
        }
    }

    pub fn file_at(&self, line: usize) -> Option<&FileHandle> {
        self.files.get(&line)
    }

    pub fn commit_at(&self, line: usize) -> Option<&CommitTarget> {
        self.commits.get(&line)
    }

    pub fn entity_at(&self, line: usize) -> Option<PanelEntity> {
        if let Some(file) = self.files.get(&line) {
            return Some(PanelEntity::File(file.clone()));
        }
        self.commits.get(&line).cloned().map(PanelEntity::Commit)
    }

    /// Sorted union of file lines and commit lines
    pub fn navigable_lines(&self) -> Vec<usize> {
        let mut lines: Vec<usize> = self.files.keys().chain(self.commits.keys()).copied().collect();
        lines.sort_unstable();
        lines
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

/// The scrollable side panel: collapsed file tree on top, commit selector
/// below. Owns the render output and the line index; holds shared references
/// to the review's file and commit lists, never copies.
pub struct FilePanel {
    pub surface: Option<SurfaceId>,
    files: FileList,
    commits: CommitList,
    width: u16,
    index: LineIndex,
    highlighted: Option<usize>,
}

impl FilePanel {
    pub fn new(files: FileList, commits: CommitList, width: u16) -> Self {
        FilePanel {
            surface: None,
            files,
            commits,
            width,
            index: LineIndex::new(),
            highlighted: None,
        }
    }

    pub fn index(&self) -> &LineIndex {
        &self.index
    }

    pub fn is_open(&self) -> bool {
        self.surface.is_some()
    }

    /// Open the docked panel surface. Its position depends on the workspace
    /// frame, so recovery always closes and reopens it.
    pub fn open(&mut self, host: &mut dyn Host, ws: WorkspaceId) {
        self.surface = Some(host.open_dock(ws, self.width));
        self.highlighted = None;
    }

    pub fn close(&mut self, host: &mut dyn Host) {
        if let Some(surface) = self.surface.take() {
            host.close_surface(surface);
        }
        self.highlighted = None;
    }

    /// Re-render both sections and rebuild the line index from scratch
    pub fn render(&mut self, host: &mut dyn Host, level: &ReviewLevel) {
        let mut index = LineIndex::new();
        let mut lines: Vec<Line<'static>> = Vec::new();

        // ── File tree section ──
        let rendered = tree::build_and_render(&self.files.borrow());
        for (line_no, file) in rendered.leaves {
            index.files.insert(line_no, file);
        }
        lines.extend(rendered.lines);

        // ── Commit selector section ──
        lines.push(Line::from(""));
        let pr_selected = matches!(level, ReviewLevel::Pr);
        lines.push(selector_line(pr_selected, None, "All commits"));
        index.commits.insert(lines.len(), CommitTarget::AllCommits);

        let commits = self.commits.borrow();
        if commits.is_empty() {
            lines.push(Line::from(Span::styled(
                "  Loading commits...".to_string(),
                styles::muted_style(),
            )));
        } else {
            // " ● abc1234 " = indicator + short sha column
            let subject_width = (self.width as usize).saturating_sub(12).max(1);
            for (i, commit) in commits.iter().enumerate() {
                let selected = matches!(level, ReviewLevel::Commit(sha) if *sha == commit.sha);
                let wrapped = word_wrap(commit.subject_line(), subject_width);
                lines.push(selector_line(
                    selected,
                    Some(commit),
                    wrapped.first().map(String::as_str).unwrap_or(""),
                ));
                // Only a commit's first wrapped line is navigable
                index.commits.insert(lines.len(), CommitTarget::Commit(i));
                for segment in wrapped.iter().skip(1) {
                    lines.push(Line::from(vec![
                        Span::styled(" ".repeat(12), styles::dim_style()),
                        Span::styled(segment.clone(), styles::commit_style()),
                    ]));
                }
            }
        }
        drop(commits);

        self.index = index;
        self.highlighted = None;
        if let Some(surface) = self.surface {
            host.set_lines(surface, lines);
        }
    }

    /// Entity under the given 1-based cursor line — O(1) index lookup
    pub fn entity_under_cursor(&self, line: usize) -> Option<PanelEntity> {
        self.index.entity_at(line)
    }

    /// Locate a file's render line (linear scan — the index is only keyed
    /// line → file) and mark it with the single-line highlight, clearing
    /// any prior highlight first.
    pub fn highlight_file(&mut self, host: &mut dyn Host, file: &FileHandle) {
        let Some(surface) = self.surface else { return };
        let found = self
            .index
            .files
            .iter()
            .find(|(_, f)| std::rc::Rc::ptr_eq(f, file))
            .map(|(line, _)| *line);
        if self.highlighted.is_some() {
            host.clear_highlight(surface);
            self.highlighted = None;
        }
        if let Some(line) = found {
            host.place_highlight(surface, line);
            self.highlighted = Some(line);
        }
    }

    /// Next navigable line strictly after `line`; stops at the end
    /// (no wraparound)
    pub fn next_navigable(&self, line: usize) -> Option<usize> {
        self.index
            .navigable_lines()
            .into_iter()
            .find(|&l| l > line)
    }

    /// Previous navigable line strictly before `line`; stops at the start
    pub fn prev_navigable(&self, line: usize) -> Option<usize> {
        self.index
            .navigable_lines()
            .into_iter()
            .rev()
            .find(|&l| l < line)
    }
}

fn selector_line(selected: bool, commit: Option<&Commit>, text: &str) -> Line<'static> {
    let indicator = if selected { "●" } else { "○" };
    let indicator_style = if selected {
        styles::selected_style()
    } else {
        styles::dim_style()
    };
    let mut spans = vec![Span::styled(format!(" {indicator} "), indicator_style)];
    if let Some(commit) = commit {
        spans.push(Span::styled(
            format!("{:8} ", commit.short_sha()),
            styles::muted_style(),
        ));
    }
    spans.push(Span::styled(
        text.to_string(),
        if selected {
            styles::selected_style()
        } else {
            styles::commit_style()
        },
    ));
    Line::from(spans)
}

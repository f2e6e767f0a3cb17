use crate::files::{FileHandle, FileList, ViewedState};
use crate::host::{Host, SplitSide, SurfaceId, WorkspaceId};
use crate::panel::FilePanel;
use crate::provider::FileContent;
use crate::rev::Rev;
use crate::review::{Commit, CommitList, ReviewLevel};
use anyhow::{bail, Result};
use std::rc::Rc;
use std::time::Duration;

/// Which comparison surface takes input focus after a file selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusSide {
    Left,
    Right,
}

/// Lifecycle of the diff view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutPhase {
    Uninitialized,
    /// Both comparison surfaces and the panel exist; selection ops allowed
    Ready,
    /// External disruption detected, repair in progress
    Recovering,
    /// Terminal
    Closed,
}

/// Knobs the session config feeds into the layout
#[derive(Debug, Clone)]
pub struct LayoutOptions {
    pub focus: FocusSide,
    pub panel_width: u16,
    pub fetch_timeout: Duration,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        LayoutOptions {
            focus: FocusSide::Right,
            panel_width: 40,
            fetch_timeout: Duration::from_millis(1500),
        }
    }
}

/// The diff-view state machine: two comparison surfaces plus the file panel.
///
/// Owns the surface handles and the selection cursor; holds shared references
/// to the review's file and commit lists. Survives the user destroying
/// windows out from under it via `validate`/`recover` — desync is routine
/// self-healing, never an error.
pub struct Layout {
    phase: LayoutPhase,
    workspace: Option<WorkspaceId>,
    left: Option<SurfaceId>,
    right: Option<SurfaceId>,
    panel: FilePanel,
    files: FileList,
    /// 0-based index into `files`; meaningful only while the list is
    /// non-empty
    selected: Option<usize>,
    current_file: Option<FileHandle>,
    /// PR-level endpoints, kept to restore after a commit pivot
    pr_base: Rev,
    pr_head: Rev,
    left_rev: Rev,
    right_rev: Rev,
    level: ReviewLevel,
    focus_side: FocusSide,
    fetch_timeout: Duration,
}

impl Layout {
    pub fn new(
        files: FileList,
        commits: CommitList,
        pr_base: Rev,
        pr_head: Rev,
        options: LayoutOptions,
    ) -> Self {
        Layout {
            phase: LayoutPhase::Uninitialized,
            workspace: None,
            left: None,
            right: None,
            panel: FilePanel::new(files.clone(), commits, options.panel_width),
            files,
            selected: None,
            current_file: None,
            left_rev: pr_base.clone(),
            right_rev: pr_head.clone(),
            pr_base,
            pr_head,
            level: ReviewLevel::Pr,
            focus_side: options.focus,
            fetch_timeout: options.fetch_timeout,
        }
    }

    pub fn phase(&self) -> LayoutPhase {
        self.phase
    }

    pub fn level(&self) -> &ReviewLevel {
        &self.level
    }

    pub fn left_rev(&self) -> &Rev {
        &self.left_rev
    }

    pub fn right_rev(&self) -> &Rev {
        &self.right_rev
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn current_file(&self) -> Option<&FileHandle> {
        self.current_file.as_ref()
    }

    pub fn panel(&self) -> &FilePanel {
        &self.panel
    }

    pub fn panel_mut(&mut self) -> &mut FilePanel {
        &mut self.panel
    }

    pub fn surfaces(&self) -> Option<(SurfaceId, SurfaceId)> {
        self.left.zip(self.right)
    }

    // ── Lifecycle ──

    /// First surface acquisition; enters `Ready`
    pub fn open(&mut self, host: &mut dyn Host) -> Result<()> {
        if self.phase == LayoutPhase::Closed {
            bail!("review layout already closed");
        }
        self.rebuild_all(host);
        Ok(())
    }

    pub fn close(&mut self, host: &mut dyn Host) {
        self.panel.close(host);
        if let Some(surface) = self.left.take() {
            host.close_surface(surface);
        }
        if let Some(surface) = self.right.take() {
            host.close_surface(surface);
        }
        self.workspace = None;
        self.current_file = None;
        self.phase = LayoutPhase::Closed;
    }

    /// Probe the workspace and both comparison surfaces; true means nothing
    /// was destroyed externally since we last looked
    pub fn validate(&self, host: &dyn Host) -> bool {
        let ws_ok = self
            .workspace
            .map(|ws| host.workspace_valid(ws))
            .unwrap_or(false);
        let left_ok = self.left.map(|s| host.surface_valid(s)).unwrap_or(false);
        let right_ok = self.right.map(|s| host.surface_valid(s)).unwrap_or(false);
        ws_ok && left_ok && right_ok
    }

    /// Repair whatever the user destroyed. Workspace gone means everything
    /// is rebuilt; a single lost surface is recreated as a split off the
    /// survivor with a fixed direction so left stays visually left. The
    /// panel's docking position depends on the workspace frame, so it is
    /// closed and reopened no matter which element broke.
    pub fn recover(&mut self, host: &mut dyn Host) {
        if self.phase == LayoutPhase::Closed {
            return;
        }
        self.phase = LayoutPhase::Recovering;

        let ws = match self.workspace.filter(|ws| host.workspace_valid(*ws)) {
            Some(ws) => ws,
            None => {
                self.rebuild_all(host);
                return;
            }
        };

        let left = self.left.filter(|s| host.surface_valid(*s));
        let right = self.right.filter(|s| host.surface_valid(*s));
        match (left, right) {
            (Some(_), Some(_)) => {}
            (None, Some(survivor)) => {
                self.left = Some(host.create_split(ws, Some((survivor, SplitSide::LeftOf))));
            }
            (Some(survivor), None) => {
                self.right = Some(host.create_split(ws, Some((survivor, SplitSide::RightOf))));
            }
            (None, None) => {
                let l = host.create_split(ws, None);
                self.right = Some(host.create_split(ws, Some((l, SplitSide::RightOf))));
                self.left = Some(l);
            }
        }

        self.panel.close(host);
        self.panel.open(host, ws);
        self.phase = LayoutPhase::Ready;
        self.render_panel(host);
    }

    /// Validate-or-recover; call on every re-entry to the session
    pub fn ensure_ready(&mut self, host: &mut dyn Host) -> Result<()> {
        match self.phase {
            LayoutPhase::Closed => bail!("review layout already closed"),
            LayoutPhase::Uninitialized => self.open(host),
            _ => {
                if !self.validate(host) {
                    self.recover(host);
                }
                Ok(())
            }
        }
    }

    fn rebuild_all(&mut self, host: &mut dyn Host) {
        let ws = host.create_workspace();
        let left = host.create_split(ws, None);
        let right = host.create_split(ws, Some((left, SplitSide::RightOf)));
        self.workspace = Some(ws);
        self.left = Some(left);
        self.right = Some(right);
        self.panel.close(host);
        self.panel.open(host, ws);
        self.phase = LayoutPhase::Ready;
        self.render_panel(host);
    }

    pub fn render_panel(&mut self, host: &mut dyn Host) {
        self.panel.render(host, &self.level);
    }

    // ── Selection ──

    /// Switch both comparison surfaces to `file`.
    ///
    /// If the content is not ready this blocks up to the configured timeout;
    /// on timeout the whole operation fails naming the path and the previous
    /// selection is untouched.
    pub fn set_current_file(
        &mut self,
        host: &mut dyn Host,
        provider: &mut dyn FileContent,
        file: &FileHandle,
        focus: Option<FocusSide>,
    ) -> Result<()> {
        if self.phase != LayoutPhase::Ready {
            bail!("review layout is not ready");
        }
        let (left, right) = match (self.left, self.right) {
            (Some(l), Some(r)) => (l, r),
            _ => bail!("comparison surfaces are missing"),
        };

        if !provider.is_ready_to_render(&file.borrow()) {
            let arrived = provider.fetch(&mut file.borrow_mut(), true, self.fetch_timeout);
            if !arrived {
                bail!("timed out loading {}", file.borrow().path);
            }
        }

        if let Some(prev) = self.current_file.take() {
            provider.detach(&prev.borrow());
        }
        host.clear_diff_flags(left);
        host.clear_diff_flags(right);
        provider.load_into(&file.borrow(), left, right);
        self.panel.highlight_file(host, file);
        host.focus(match focus.unwrap_or(self.focus_side) {
            FocusSide::Left => left,
            FocusSide::Right => right,
        });

        self.selected = self
            .files
            .borrow()
            .iter()
            .position(|f| Rc::ptr_eq(f, file));
        self.current_file = Some(file.clone());
        Ok(())
    }

    /// Select by index (wrapped into range). An empty list shows the
    /// placeholders instead.
    pub fn select_index(
        &mut self,
        host: &mut dyn Host,
        provider: &mut dyn FileContent,
        idx: usize,
    ) -> Result<()> {
        let file = {
            let files = self.files.borrow();
            if files.is_empty() {
                drop(files);
                self.show_empty(host);
                return Ok(());
            }
            files[idx % files.len()].clone()
        };
        self.set_current_file(host, provider, &file, None)
    }

    /// Cyclic: wraps past the end back to the first file
    pub fn next_file(&mut self, host: &mut dyn Host, provider: &mut dyn FileContent) -> Result<()> {
        let idx = self.selected.map(|i| i + 1).unwrap_or(0);
        self.select_index(host, provider, idx)
    }

    /// Cyclic: wraps past the start back to the last file
    pub fn prev_file(&mut self, host: &mut dyn Host, provider: &mut dyn FileContent) -> Result<()> {
        let len = self.files.borrow().len();
        if len == 0 {
            self.show_empty(host);
            return Ok(());
        }
        let idx = self.selected.map(|i| i + len - 1).unwrap_or(len - 1);
        self.select_index(host, provider, idx)
    }

    /// Next file whose viewed state is not `Viewed`, scanning at most one
    /// full cycle. Falls back to plain next when everything else is viewed,
    /// so progress is always made.
    pub fn next_unviewed(
        &mut self,
        host: &mut dyn Host,
        provider: &mut dyn FileContent,
    ) -> Result<()> {
        match self.scan_unviewed(true) {
            Some(idx) => self.select_index(host, provider, idx),
            None => self.next_file(host, provider),
        }
    }

    pub fn prev_unviewed(
        &mut self,
        host: &mut dyn Host,
        provider: &mut dyn FileContent,
    ) -> Result<()> {
        match self.scan_unviewed(false) {
            Some(idx) => self.select_index(host, provider, idx),
            None => self.prev_file(host, provider),
        }
    }

    fn scan_unviewed(&self, forward: bool) -> Option<usize> {
        let files = self.files.borrow();
        let len = files.len();
        if len == 0 {
            return None;
        }
        let start = self.selected.unwrap_or(len - 1);
        for step in 1..=len {
            let idx = if forward {
                (start + step) % len
            } else {
                (start + len - step) % len
            };
            if files[idx].borrow().viewed != ViewedState::Viewed {
                return Some(idx);
            }
        }
        None
    }

    /// Empty-list safeguard: explicit placeholders, never stale content
    pub fn show_empty(&mut self, host: &mut dyn Host) {
        if let Some(left) = self.left {
            host.show_placeholder(left, "No file selected");
        }
        if let Some(right) = self.right {
            host.show_placeholder(right, "No file selected");
        }
        self.selected = None;
        self.current_file = None;
    }

    /// Feed a resolved commit message to every endpoint carrying that sha.
    /// `Rev::set_message` is first-writer-wins, so a late remote reply never
    /// clobbers a local answer.
    pub fn set_rev_message(&mut self, sha: &str, msg: &str) {
        for rev in [
            &mut self.left_rev,
            &mut self.right_rev,
            &mut self.pr_base,
            &mut self.pr_head,
        ] {
            if rev.sha == sha {
                rev.set_message(msg);
            }
        }
    }

    // ── Commit pivot ──

    /// Pivot the comparison to one commit: endpoints become (first parent,
    /// commit), or (PR base, commit) for a root commit. A missing parent is
    /// substituted silently, never an error.
    pub fn select_commit(&mut self, host: &mut dyn Host, commit: &Commit) {
        let base_sha = commit
            .parents
            .first()
            .cloned()
            .unwrap_or_else(|| self.pr_base.sha.clone());
        self.left_rev = Rev::new(base_sha);
        self.right_rev = Rev::new(commit.sha.clone());
        self.level = ReviewLevel::Commit(commit.sha.clone());
        self.render_panel(host);
    }

    /// Back to PR level: restore the original base/head endpoints
    pub fn select_all_commits(&mut self, host: &mut dyn Host) {
        self.left_rev = self.pr_base.clone();
        self.right_rev = self.pr_head.clone();
        self.level = ReviewLevel::Pr;
        self.render_panel(host);
    }
}

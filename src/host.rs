use ratatui::text::Line;

/// Host-level handle for the workspace frame (tabpage) the review runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkspaceId(pub u64);

/// Host-level handle for one editable split/window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u64);

/// Stable handle into a live text range. The host keeps the range tracking
/// user edits, so reading it back always reflects the current text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionId(pub u64);

/// Where a new split lands relative to its anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitSide {
    LeftOf,
    RightOf,
}

/// Capability interface over the editor's windowing and text surface.
///
/// Everything here is synchronous; the engine consumes it, the editor
/// front end implements it. Layout logic stays pure state-machine code and
/// is unit-tested against the fake below.
pub trait Host {
    fn workspace_valid(&self, ws: WorkspaceId) -> bool;
    fn surface_valid(&self, surface: SurfaceId) -> bool;

    fn create_workspace(&mut self) -> WorkspaceId;
    /// Create a split inside `ws`. With an anchor the new surface is placed
    /// on the given side of it; without one the host picks the default spot.
    fn create_split(&mut self, ws: WorkspaceId, anchor: Option<(SurfaceId, SplitSide)>)
        -> SurfaceId;
    /// Open the docked panel surface on the workspace edge
    fn open_dock(&mut self, ws: WorkspaceId, width: u16) -> SurfaceId;
    fn close_surface(&mut self, surface: SurfaceId);
    fn focus(&mut self, surface: SurfaceId);

    /// Replace a surface's displayed content with styled lines
    fn set_lines(&mut self, surface: SurfaceId, lines: Vec<Line<'static>>);
    /// Display an explicit "no content" placeholder
    fn show_placeholder(&mut self, surface: SurfaceId, text: &str);
    /// Clear transient diff-mode display flags left by the previous file
    fn clear_diff_flags(&mut self, surface: SurfaceId);

    /// Place the single-line highlight (there is at most one per surface)
    fn place_highlight(&mut self, surface: SurfaceId, line: usize);
    fn clear_highlight(&mut self, surface: SurfaceId);

    /// Register an editable region over a 1-based inclusive line range
    fn create_region(&mut self, surface: SurfaceId, first: usize, last: usize) -> RegionId;
    /// Current text extent of a region; None when the region (or its
    /// surface) has been torn down
    fn region_text(&self, region: RegionId) -> Option<String>;
    /// Re-register a region against an updated line range, returning the new
    /// handle. The old handle is invalidated.
    fn re_register_region(&mut self, region: RegionId, first: usize, last: usize) -> RegionId;
    fn remove_region(&mut self, region: RegionId);
}

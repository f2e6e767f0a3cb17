use std::cell::RefCell;
use std::rc::Rc;

/// Change status of a file within the pull request diff
#[derive(Debug, Clone, PartialEq)]
pub enum FileStatus {
    Added,
    Modified,
    Deleted,
    /// Carries the pre-rename path
    Renamed(String),
}

/// Reviewer-facing viewed state of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewedState {
    Viewed,
    Unviewed,
    Dismissed,
}

impl Default for ViewedState {
    fn default() -> Self {
        ViewedState::Unviewed
    }
}

/// Opaque content handle issued by the file content provider for one
/// comparison side. Cleared when the entry is destroyed.
pub type ContentHandle = u64;

/// One changed file in the review.
///
/// Created once per file-list fetch, mutated in place when viewed state or
/// stats change, destroyed when the review closes.
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// Repo-relative path, `/`-delimited, no `.`/`..` segments
    pub path: String,
    pub status: FileStatus,
    pub adds: usize,
    pub dels: usize,
    pub viewed: ViewedState,
    /// Loaded content for the base side of the comparison
    pub left_content: Option<ContentHandle>,
    /// Loaded content for the head side of the comparison
    pub right_content: Option<ContentHandle>,
}

impl FileEntry {
    pub fn new(path: impl Into<String>, status: FileStatus, adds: usize, dels: usize) -> Self {
        FileEntry {
            path: path.into(),
            status,
            adds,
            dels,
            viewed: ViewedState::Unviewed,
            left_content: None,
            right_content: None,
        }
    }

    /// Final path component
    pub fn basename(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Extension without the dot, if any
    pub fn extension(&self) -> Option<&str> {
        let name = self.basename();
        name.rsplit_once('.').map(|(_, ext)| ext).filter(|e| !e.is_empty())
    }

    /// Release both comparison-side content handles
    pub fn destroy(&mut self) {
        self.left_content = None;
        self.right_content = None;
    }
}

/// Shared-by-reference file handle. The Review owns the list; Layout and the
/// File Panel hold the same `Rc`s, so viewed-state and stat edits are visible
/// everywhere without propagation.
pub type FileHandle = Rc<RefCell<FileEntry>>;

/// The review's ordered file list, shared between Review, Layout and panel.
/// Only the Review mutates membership.
pub type FileList = Rc<RefCell<Vec<FileHandle>>>;

pub fn file_handle(entry: FileEntry) -> FileHandle {
    Rc::new(RefCell::new(entry))
}

pub fn file_list(entries: Vec<FileEntry>) -> FileList {
    Rc::new(RefCell::new(entries.into_iter().map(file_handle).collect()))
}

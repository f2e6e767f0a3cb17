//! Review-session engine for a GitHub PR review client embedded in an
//! editor.
//!
//! The crate covers three things: building and rendering the collapsed
//! changed-file tree with stable line-to-entity mappings ([`tree`],
//! [`panel`]); the diff-layout state machine over two comparison surfaces
//! plus the side panel, including recovery from externally destroyed windows
//! ([`layout`]); and the comment/thread reconciliation protocol that submits
//! optimistic local edits and matches remote-issued ids back to live
//! editable regions ([`buffer`], [`review`]).
//!
//! The editor front end supplies the capability interfaces in [`host`],
//! [`provider`] and [`remote`]; `gh`-CLI and git-CLI implementations of the
//! remote and local-VCS sides live in [`github`] and [`git`].

pub mod buffer;
pub mod config;
pub mod files;
pub mod git;
pub mod github;
pub mod host;
pub mod layout;
pub mod panel;
pub mod provider;
pub mod remote;
pub mod rev;
pub mod review;
pub mod styles;
pub mod tree;
mod util;

pub use buffer::{CommentKind, Notice, RegionMeta, ReviewBuffer, SaveContext, SENTINEL_ID};
pub use config::{load_config, SessionConfig};
pub use files::{file_handle, file_list, FileEntry, FileHandle, FileList, FileStatus, ViewedState};
pub use git::{parse_head_diff, FilePatch, GitCli, HunkRange, LocalVcs, Side};
pub use github::{parse_github_pr_url, GhStore, PrRef};
pub use host::{Host, RegionId, SplitSide, SurfaceId, WorkspaceId};
pub use layout::{FocusSide, Layout, LayoutOptions, LayoutPhase};
pub use panel::{CommitTarget, FilePanel, LineIndex, PanelEntity};
pub use provider::FileContent;
pub use remote::{CallId, CallIds, RemoteReply, RemoteStore, RestMethod};
pub use rev::Rev;
pub use review::{
    commit_list, BufferId, BufferRegistry, Commit, CommitList, PullRequest, Review, ReviewLevel,
    Thread,
};

use crate::buffer::{Notice, ReviewBuffer, SaveContext};
use crate::files::{file_list, FileEntry, FileList};
use crate::git::{FilePatch, LocalVcs};
use crate::github::{gql, PrRef};
use crate::host::Host;
use crate::layout::{Layout, LayoutOptions};
use crate::remote::{CallId, CallIds, RemoteReply, RemoteStore};
use crate::rev::Rev;
use anyhow::{bail, Result};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Whether the comparison covers the whole PR or pivots on one commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewLevel {
    Pr,
    /// Sha of the pivot commit
    Commit(String),
}

/// One commit in the PR's commit list
#[derive(Debug, Clone)]
pub struct Commit {
    pub sha: String,
    pub parents: Vec<String>,
    pub subject: String,
}

impl Commit {
    pub fn short_sha(&self) -> &str {
        let end = self.sha.len().min(7);
        &self.sha[..end]
    }

    pub fn subject_line(&self) -> &str {
        self.subject.lines().next().unwrap_or("")
    }
}

/// The PR's commit list, shared by reference with Layout and the panel.
/// Only the Review mutates membership.
pub type CommitList = Rc<RefCell<Vec<Commit>>>;

pub fn commit_list(commits: Vec<Commit>) -> CommitList {
    Rc::new(RefCell::new(commits))
}

/// One known review thread on the PR
#[derive(Debug, Clone)]
pub struct Thread {
    pub id: i64,
    pub path: String,
}

/// The pull request being reviewed
#[derive(Debug, Clone)]
pub struct PullRequest {
    pub pr: PrRef,
    /// GraphQL node id, used as the subject of mutations
    pub node_id: String,
    pub title: String,
    pub body: String,
    pub base_sha: String,
    pub head_sha: String,
}

/// Handle into the buffer registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub u64);

/// Explicit registry of live review buffers: insert on creation, remove on
/// teardown, passed by reference wherever needed — no ambient lookup table.
#[derive(Default)]
pub struct BufferRegistry {
    next: u64,
    buffers: HashMap<BufferId, ReviewBuffer>,
}

impl BufferRegistry {
    pub fn new() -> Self {
        BufferRegistry::default()
    }

    pub fn insert(&mut self, buffer: ReviewBuffer) -> BufferId {
        self.next += 1;
        let id = BufferId(self.next);
        self.buffers.insert(id, buffer);
        id
    }

    pub fn remove(&mut self, id: BufferId) -> Option<ReviewBuffer> {
        self.buffers.remove(&id)
    }

    pub fn get(&self, id: BufferId) -> Option<&ReviewBuffer> {
        self.buffers.get(&id)
    }

    pub fn get_mut(&mut self, id: BufferId) -> Option<&mut ReviewBuffer> {
        self.buffers.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = (&BufferId, &mut ReviewBuffer)> {
        self.buffers.iter_mut()
    }
}

/// Replies the session itself (not a buffer) is waiting for
enum PendingTarget {
    /// Remote commit-message fallback for a Rev
    RevMessage { sha: String },
}

/// One review session: the pull request, its commit list and thread list,
/// the diff layout, the buffer registry and the pending-call table.
///
/// All remote completions come back through [`Review::complete`]; nothing
/// else consumes [`RemoteReply`]s.
pub struct Review {
    pub pr: PullRequest,
    files: FileList,
    commits: CommitList,
    threads: Vec<Thread>,
    pub layout: Layout,
    pub buffers: BufferRegistry,
    calls: CallIds,
    pending: HashMap<CallId, PendingTarget>,
}

impl Review {
    pub fn new(pr: PullRequest, options: LayoutOptions) -> Self {
        let files = file_list(vec![]);
        let commits = commit_list(vec![]);
        let layout = Layout::new(
            files.clone(),
            commits.clone(),
            Rev::new(pr.base_sha.clone()),
            Rev::head(pr.head_sha.clone()),
            options,
        );
        Review {
            pr,
            files,
            commits,
            threads: Vec::new(),
            layout,
            buffers: BufferRegistry::new(),
            calls: CallIds::new(),
            pending: HashMap::new(),
        }
    }

    pub fn files(&self) -> FileList {
        self.files.clone()
    }

    pub fn commits(&self) -> CommitList {
        self.commits.clone()
    }

    pub fn threads(&self) -> &[Thread] {
        &self.threads
    }

    pub fn call_ids(&mut self) -> &mut CallIds {
        &mut self.calls
    }

    // ── Session lifecycle ──

    pub fn open(&mut self, host: &mut dyn Host) -> Result<()> {
        self.layout.ensure_ready(host)
    }

    /// Tear down the session: surfaces closed, file content handles
    /// released, buffers dropped. Terminal.
    pub fn close(&mut self, host: &mut dyn Host) {
        self.layout.close(host);
        for file in self.files.borrow().iter() {
            file.borrow_mut().destroy();
        }
        self.buffers = BufferRegistry::new();
        self.pending.clear();
    }

    // ── List ownership (fetch completion lands here) ──

    /// Replace the file list. The shared `Rc` means Layout and panel see the
    /// change immediately; an emptied list forces the placeholder state.
    pub fn set_files(&mut self, host: &mut dyn Host, entries: Vec<FileEntry>) {
        {
            let mut files = self.files.borrow_mut();
            files.clear();
            files.extend(entries.into_iter().map(crate::files::file_handle));
        }
        if self.files.borrow().is_empty() {
            self.layout.show_empty(host);
        }
        self.layout.render_panel(host);
    }

    pub fn set_commits(&mut self, host: &mut dyn Host, commits: Vec<Commit>) {
        *self.commits.borrow_mut() = commits;
        self.layout.render_panel(host);
    }

    /// The only cross-buffer thread-update entry point: buffers never reach
    /// into each other's metadata, they observe thread changes through here.
    pub fn update_threads(&mut self, threads: Vec<Thread>) {
        self.threads = threads;
    }

    // ── Commit message resolution ──

    /// Resolve a commit's one-line message: local VCS first, remote
    /// fallback only when the object is not available locally.
    pub fn resolve_commit_message(
        &mut self,
        vcs: &dyn LocalVcs,
        remote: &dyn RemoteStore,
        sha: &str,
    ) {
        if let Ok(msg) = vcs.commit_message(sha) {
            self.layout.set_rev_message(sha, &msg);
            return;
        }
        let call = self.calls.next();
        remote.query(
            call,
            gql::COMMIT_MESSAGE,
            json!({
                "owner": self.pr.pr.owner,
                "repo": self.pr.pr.repo,
                "oid": sha,
            }),
        );
        self.pending
            .insert(call, PendingTarget::RevMessage { sha: sha.to_string() });
    }

    // ── Buffer persistence ──

    /// Save one buffer's dirty state, threading the session context through
    pub fn save_buffer(
        &mut self,
        host: &mut dyn Host,
        remote: &dyn RemoteStore,
        id: BufferId,
        head_patches: &[FilePatch],
    ) -> Result<()> {
        let level = self.layout.level().clone();
        let ctx = SaveContext {
            pr: &self.pr.pr,
            pr_node_id: &self.pr.node_id,
            level: &level,
            head_patches,
        };
        match self.buffers.get_mut(id) {
            Some(buffer) => buffer.save(host, remote, &mut self.calls, &ctx),
            None => bail!("review buffer was torn down"),
        }
    }

    // ── Completion routing ──

    /// Route one remote completion to its consumer: the session's own
    /// pending table first, then whichever buffer owns the call. A reply for
    /// a torn-down buffer is a no-op.
    pub fn complete(&mut self, host: &mut dyn Host, reply: &RemoteReply) -> Option<Notice> {
        if let Some(target) = self.pending.remove(&reply.call) {
            return match target {
                PendingTarget::RevMessage { sha } => {
                    self.finish_rev_message(&sha, &reply.result)
                }
            };
        }
        for (_, buffer) in self.buffers.iter_mut() {
            if buffer.owns_call(reply.call) {
                return buffer.complete(host, reply.call, &reply.result);
            }
        }
        None
    }

    fn finish_rev_message(&mut self, sha: &str, result: &Result<Value, String>) -> Option<Notice> {
        match result {
            Ok(value) => {
                let headline = value
                    .get("data")
                    .and_then(|d| d.get("repository"))
                    .and_then(|r| r.get("object"))
                    .and_then(|o| o.get("messageHeadline"))
                    .and_then(Value::as_str);
                if let Some(msg) = headline {
                    self.layout.set_rev_message(sha, msg);
                }
                None
            }
            Err(msg) => Some(format!("commit message lookup failed: {msg}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{CommentKind, SENTINEL_ID};
    use crate::host::fake::FakeHost;
    use crate::files::FileStatus;
    use crate::remote::fake::FakeRemote;

    fn pull_request() -> PullRequest {
        PullRequest {
            pr: PrRef {
                owner: "octo".into(),
                repo: "hello".into(),
                number: 7,
            },
            node_id: "PR_node".into(),
            title: "Add parser".into(),
            body: "Description".into(),
            base_sha: "basebasebase".into(),
            head_sha: "headheadhead".into(),
        }
    }

    fn open_review() -> (Review, FakeHost) {
        let mut review = Review::new(pull_request(), LayoutOptions::default());
        let mut host = FakeHost::new();
        review.open(&mut host).unwrap();
        (review, host)
    }

    struct NoLocal;
    impl LocalVcs for NoLocal {
        fn commit_message(&self, _sha: &str) -> Result<String> {
            anyhow::bail!("not a local object")
        }
    }

    struct LocalSubject(&'static str);
    impl LocalVcs for LocalSubject {
        fn commit_message(&self, _sha: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    fn buffer_with_draft(review: &mut Review, host: &mut FakeHost) -> (BufferId, crate::host::RegionId) {
        let (_, right) = review.layout.surfaces().unwrap();
        let title = host.create_region(right, 1, 1);
        let body = host.create_region(right, 3, 5);
        host.set_region_text(title, "Add parser");
        host.set_region_text(body, "Description");
        let mut buffer = ReviewBuffer::new(title, body, "Add parser".into(), "Description".into());
        let region = host.create_region(right, 8, 9);
        buffer.insert_draft(region, CommentKind::IssueComment);
        host.set_region_text(region, "lgtm");
        (review.buffers.insert(buffer), region)
    }

    #[test]
    fn registry_inserts_and_removes_explicitly() {
        let (mut review, mut host) = open_review();
        let (id, _) = buffer_with_draft(&mut review, &mut host);
        assert_eq!(review.buffers.len(), 1);
        assert!(review.buffers.remove(id).is_some());
        assert!(review.buffers.is_empty());
        assert!(review.buffers.remove(id).is_none());
    }

    #[test]
    fn complete_routes_reply_to_owning_buffer() {
        let (mut review, mut host) = open_review();
        let remote = FakeRemote::new();
        let (id, region) = buffer_with_draft(&mut review, &mut host);
        review.save_buffer(&mut host, &remote, id, &[]).unwrap();
        let call = remote.take_sent()[0].call_id();

        let reply = RemoteReply {
            call,
            result: Ok(serde_json::json!({
                "data": { "addComment": { "commentEdge": { "node": {
                    "databaseId": 42, "body": "lgtm"
                }}}}
            })),
        };
        assert!(review.complete(&mut host, &reply).is_none());
        let meta = review.buffers.get(id).unwrap().comment(region).unwrap();
        assert_eq!(meta.id, 42);
        assert_ne!(meta.id, SENTINEL_ID);
    }

    #[test]
    fn reply_for_torn_down_buffer_is_a_noop() {
        let (mut review, mut host) = open_review();
        let remote = FakeRemote::new();
        let (id, _) = buffer_with_draft(&mut review, &mut host);
        review.save_buffer(&mut host, &remote, id, &[]).unwrap();
        let call = remote.take_sent()[0].call_id();

        review.buffers.remove(id);
        let reply = RemoteReply {
            call,
            result: Ok(serde_json::json!({})),
        };
        assert!(review.complete(&mut host, &reply).is_none());
    }

    #[test]
    fn save_of_removed_buffer_fails() {
        let (mut review, mut host) = open_review();
        let remote = FakeRemote::new();
        let (id, _) = buffer_with_draft(&mut review, &mut host);
        review.buffers.remove(id);
        assert!(review.save_buffer(&mut host, &remote, id, &[]).is_err());
    }

    #[test]
    fn commit_message_resolves_locally_without_remote_call() {
        let (mut review, _) = open_review();
        let remote = FakeRemote::new();
        review.resolve_commit_message(&LocalSubject("Fix parser"), &remote, "basebasebase");
        assert_eq!(remote.sent_count(), 0);
        assert_eq!(review.layout.left_rev().message(), Some("Fix parser"));
    }

    #[test]
    fn commit_message_falls_back_to_remote_query() {
        let (mut review, mut host) = open_review();
        let remote = FakeRemote::new();
        review.resolve_commit_message(&NoLocal, &remote, "headheadhead");
        let sent = remote.take_sent();
        assert_eq!(sent.len(), 1);
        let call = sent[0].call_id();

        let reply = RemoteReply {
            call,
            result: Ok(serde_json::json!({
                "data": { "repository": { "object": {
                    "messageHeadline": "Remote subject"
                }}}
            })),
        };
        review.complete(&mut host, &reply);
        assert_eq!(review.layout.right_rev().message(), Some("Remote subject"));
    }

    #[test]
    fn failed_message_lookup_produces_notice() {
        let (mut review, mut host) = open_review();
        let remote = FakeRemote::new();
        review.resolve_commit_message(&NoLocal, &remote, "headheadhead");
        let call = remote.take_sent()[0].call_id();
        let reply = RemoteReply {
            call,
            result: Err("api unavailable".into()),
        };
        let notice = review.complete(&mut host, &reply).unwrap();
        assert!(notice.contains("commit message lookup failed"));
    }

    #[test]
    fn set_files_repopulates_shared_list() {
        let (mut review, mut host) = open_review();
        review.set_files(
            &mut host,
            vec![FileEntry::new("a.rs", FileStatus::Modified, 1, 0)],
        );
        assert_eq!(review.files().borrow().len(), 1);
        // Layout sees the same list through the shared reference
        assert_eq!(review.layout.panel().index().file_count(), 1);
    }

    #[test]
    fn emptied_file_list_forces_placeholders() {
        let (mut review, mut host) = open_review();
        review.set_files(&mut host, vec![]);
        let (left, right) = review.layout.surfaces().unwrap();
        assert!(host.placeholders.contains_key(&left));
        assert!(host.placeholders.contains_key(&right));
    }

    #[test]
    fn update_threads_replaces_the_list() {
        let (mut review, _) = open_review();
        review.update_threads(vec![Thread {
            id: 900,
            path: "src/main.rs".into(),
        }]);
        assert_eq!(review.threads().len(), 1);
        review.update_threads(vec![]);
        assert!(review.threads().is_empty());
    }
}

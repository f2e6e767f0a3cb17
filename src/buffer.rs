use crate::git::{patch_for, FilePatch, Side};
use crate::github::{gql, reply_path, PrRef};
use crate::host::{Host, RegionId};
use crate::remote::{CallId, CallIds, RemoteStore, RestMethod};
use crate::review::ReviewLevel;
use crate::util::trim_eq;
use anyhow::{bail, Result};
use serde_json::{json, Value};
use std::collections::HashMap;

/// Id of a comment or thread that has not been created remotely yet
pub const SENTINEL_ID: i64 = -1;

/// User-visible notice produced by a failed remote call
pub type Notice = String;

/// What kind of remote object a comment region maps to; selects the create
/// operation dispatched for a sentinel-id region.
#[derive(Debug, Clone, PartialEq)]
pub enum CommentKind {
    /// Plain PR/issue comment
    IssueComment,
    DiscussionComment {
        discussion_id: String,
    },
    /// Reply into an existing review thread
    ThreadReply {
        reply_to: i64,
    },
    /// A review thread that does not exist remotely yet
    NewThread {
        path: String,
        side: Side,
        first: usize,
        last: usize,
    },
}

/// Editable-region state for one comment or thread-comment.
///
/// `dirty` is recomputed from the live text by [`ReviewBuffer::update_metadata`]
/// before every persistence action and marker redraw, never carried across
/// edits.
#[derive(Debug, Clone)]
pub struct RegionMeta {
    pub region: RegionId,
    pub kind: CommentKind,
    /// Current live text
    pub body: String,
    /// Last known remote text
    pub saved_body: String,
    pub dirty: bool,
    /// Real remote id, or [`SENTINEL_ID`] until the create call confirms
    pub id: i64,
    /// A create for this region has been dispatched and not yet answered;
    /// guards against double-submitting across overlapping saves
    pub in_flight: bool,
}

/// Remote thread identity for a thread rooted at a comment region
#[derive(Debug, Clone)]
pub struct ThreadMeta {
    pub thread_id: i64,
}

/// Title-or-body field state (the two singleton regions)
#[derive(Debug, Clone)]
struct FieldMeta {
    region: RegionId,
    text: String,
    saved: String,
    dirty: bool,
}

impl FieldMeta {
    fn new(region: RegionId, text: String) -> Self {
        FieldMeta {
            region,
            saved: text.clone(),
            text,
            dirty: false,
        }
    }
}

/// One dispatched call awaiting its reply
#[derive(Debug, Clone)]
enum PendingOp {
    TitleBody {
        title: String,
        body: String,
    },
    CommentCreate {
        region: RegionId,
        body: String,
    },
    CommentUpdate {
        region: RegionId,
        body: String,
    },
    ThreadCreate {
        region: RegionId,
        body: String,
        first: usize,
        last: usize,
    },
}

impl PendingOp {
    fn describe(&self) -> &'static str {
        match self {
            PendingOp::TitleBody { .. } => "title/body update",
            PendingOp::CommentCreate { .. } => "comment create",
            PendingOp::CommentUpdate { .. } => "comment update",
            PendingOp::ThreadCreate { .. } => "review thread create",
        }
    }

    fn region(&self) -> Option<RegionId> {
        match self {
            PendingOp::TitleBody { .. } => None,
            PendingOp::CommentCreate { region, .. }
            | PendingOp::CommentUpdate { region, .. }
            | PendingOp::ThreadCreate { region, .. } => Some(*region),
        }
    }
}

/// Session data a save needs beyond the buffer's own state
pub struct SaveContext<'a> {
    pub pr: &'a PrRef,
    /// GraphQL node id of the pull request
    pub pr_node_id: &'a str,
    pub level: &'a ReviewLevel,
    /// Parsed PR-head diff, for the new-thread containment check
    pub head_patches: &'a [FilePatch],
}

/// Reconciliation engine for one editable review surface.
///
/// Tracks title, body and comment regions with dirty flags; `save` diffs
/// local text against last-known-remote text per region and dispatches
/// create/update calls; `complete` reconciles provisional sentinel ids with
/// remote-issued ids as each reply lands. Metadata here is exclusively owned:
/// other buffers reach it only through the review's thread-update entry
/// point, never directly.
pub struct ReviewBuffer {
    title: FieldMeta,
    body: FieldMeta,
    comments: HashMap<RegionId, RegionMeta>,
    threads: HashMap<RegionId, ThreadMeta>,
    pending: HashMap<CallId, PendingOp>,
}

impl ReviewBuffer {
    pub fn new(title_region: RegionId, body_region: RegionId, title: String, body: String) -> Self {
        ReviewBuffer {
            title: FieldMeta::new(title_region, title),
            body: FieldMeta::new(body_region, body),
            comments: HashMap::new(),
            threads: HashMap::new(),
            pending: HashMap::new(),
        }
    }

    // ── Region registration ──

    /// Register a region over a comment that already exists remotely
    pub fn insert_existing_comment(
        &mut self,
        region: RegionId,
        kind: CommentKind,
        body: String,
        id: i64,
    ) {
        self.comments.insert(
            region,
            RegionMeta {
                region,
                kind,
                saved_body: body.clone(),
                body,
                dirty: false,
                id,
                in_flight: false,
            },
        );
    }

    /// Register a draft region: empty remote state, sentinel id
    pub fn insert_draft(&mut self, region: RegionId, kind: CommentKind) {
        if let CommentKind::NewThread { .. } = &kind {
            self.threads.insert(
                region,
                ThreadMeta {
                    thread_id: SENTINEL_ID,
                },
            );
        }
        self.comments.insert(
            region,
            RegionMeta {
                region,
                kind,
                body: String::new(),
                saved_body: String::new(),
                dirty: false,
                id: SENTINEL_ID,
                in_flight: false,
            },
        );
    }

    /// Register the remote thread identity for a thread-rooted region
    pub fn insert_thread(&mut self, region: RegionId, thread_id: i64) {
        self.threads.insert(region, ThreadMeta { thread_id });
    }

    /// Tear down one comment region
    pub fn remove_comment(&mut self, host: &mut dyn Host, region: RegionId) {
        self.comments.remove(&region);
        self.threads.remove(&region);
        host.remove_region(region);
    }

    pub fn comment(&self, region: RegionId) -> Option<&RegionMeta> {
        self.comments.get(&region)
    }

    pub fn thread(&self, region: RegionId) -> Option<&ThreadMeta> {
        self.threads.get(&region)
    }

    pub fn owns_call(&self, call: CallId) -> bool {
        self.pending.contains_key(&call)
    }

    // ── Dirty tracking ──

    /// Re-read every region's live text and recompute its dirty flag.
    /// Called before any persistence action and before any dirty-marker
    /// redraw; the flags are never trusted across user edits.
    pub fn update_metadata(&mut self, host: &dyn Host) {
        if let Some(text) = host.region_text(self.title.region) {
            self.title.text = text;
        }
        self.title.dirty = !trim_eq(&self.title.text, &self.title.saved);
        if let Some(text) = host.region_text(self.body.region) {
            self.body.text = text;
        }
        self.body.dirty = !trim_eq(&self.body.text, &self.body.saved);
        for meta in self.comments.values_mut() {
            if let Some(text) = host.region_text(meta.region) {
                meta.body = text;
            }
            meta.dirty = !trim_eq(&meta.body, &meta.saved_body);
        }
    }

    /// Regions currently dirty, for marker redraws
    pub fn dirty_regions(&self) -> Vec<RegionId> {
        self.comments
            .values()
            .filter(|m| m.dirty)
            .map(|m| m.region)
            .collect()
    }

    // ── Save ──

    /// Persist everything dirty: one combined title/body mutation first, then
    /// an independent create or update per dirty comment region. Creates and
    /// updates for distinct regions do not wait on each other; reconciliation
    /// is keyed by matching text and id, not call order.
    pub fn save(
        &mut self,
        host: &mut dyn Host,
        remote: &dyn RemoteStore,
        calls: &mut CallIds,
        ctx: &SaveContext,
    ) -> Result<()> {
        self.update_metadata(host);

        if self.title.dirty || self.body.dirty {
            let title = self.title.text.trim();
            if title.is_empty() {
                bail!("title cannot be blank");
            }
            if title.contains('\n') {
                bail!("title cannot span multiple lines");
            }
            let call = calls.next();
            remote.mutate(
                call,
                gql::UPDATE_PULL_REQUEST,
                json!({
                    "pullRequestId": ctx.pr_node_id,
                    "title": title,
                    "body": self.body.text,
                }),
            );
            self.pending.insert(
                call,
                PendingOp::TitleBody {
                    title: title.to_string(),
                    body: self.body.text.clone(),
                },
            );
        }

        let dirty: Vec<RegionId> = self
            .comments
            .values()
            .filter(|m| m.dirty && !m.in_flight)
            .filter(|m| host.region_text(m.region).is_some())
            .map(|m| m.region)
            .collect();
        for region in dirty {
            self.dispatch_comment(region, remote, calls, ctx);
        }
        Ok(())
    }

    fn dispatch_comment(
        &mut self,
        region: RegionId,
        remote: &dyn RemoteStore,
        calls: &mut CallIds,
        ctx: &SaveContext,
    ) {
        let Some(meta) = self.comments.get_mut(&region) else { return };
        let call = calls.next();
        meta.in_flight = true;

        if meta.id != SENTINEL_ID {
            remote.mutate(
                call,
                gql::UPDATE_COMMENT,
                json!({ "pullRequestReviewCommentId": meta.id, "body": meta.body }),
            );
            self.pending.insert(
                call,
                PendingOp::CommentUpdate {
                    region,
                    body: meta.body.clone(),
                },
            );
            return;
        }

        match meta.kind.clone() {
            CommentKind::IssueComment => {
                remote.mutate(
                    call,
                    gql::ADD_COMMENT,
                    json!({ "subjectId": ctx.pr_node_id, "body": meta.body }),
                );
                self.pending.insert(
                    call,
                    PendingOp::CommentCreate {
                        region,
                        body: meta.body.clone(),
                    },
                );
            }
            CommentKind::DiscussionComment { discussion_id } => {
                remote.mutate(
                    call,
                    gql::ADD_DISCUSSION_COMMENT,
                    json!({ "discussionId": discussion_id, "body": meta.body }),
                );
                self.pending.insert(
                    call,
                    PendingOp::CommentCreate {
                        region,
                        body: meta.body.clone(),
                    },
                );
            }
            CommentKind::ThreadReply { reply_to } => {
                remote.rest_call(
                    call,
                    RestMethod::Post,
                    &reply_path(ctx.pr),
                    Some(json!({ "body": meta.body, "in_reply_to": reply_to })),
                );
                self.pending.insert(
                    call,
                    PendingOp::CommentCreate {
                        region,
                        body: meta.body.clone(),
                    },
                );
            }
            CommentKind::NewThread {
                path,
                side,
                first,
                last,
            } => {
                let (input, sent_body) =
                    new_thread_input(ctx, &path, side, first, last, &meta.body);
                remote.mutate(call, gql::ADD_REVIEW_THREAD, input);
                self.pending.insert(
                    call,
                    PendingOp::ThreadCreate {
                        region,
                        body: sent_body,
                        first,
                        last,
                    },
                );
            }
        }
    }

    // ── Reconciliation ──

    /// Feed one remote reply back into the buffer. Returns a user-visible
    /// notice on transport failure, None otherwise. Unknown calls and replies
    /// whose region was torn down in the meantime are no-ops.
    pub fn complete(
        &mut self,
        host: &mut dyn Host,
        call: CallId,
        result: &Result<Value, String>,
    ) -> Option<Notice> {
        let op = self.pending.remove(&call)?;

        let value = match result {
            Ok(value) => value,
            Err(msg) => {
                // Region stays dirty, sentinel stays sentinel; the next
                // explicit save retries. No automatic backoff.
                if let Some(region) = op.region() {
                    if let Some(meta) = self.comments.get_mut(&region) {
                        meta.in_flight = false;
                    }
                }
                return Some(format!("{} failed: {msg}", op.describe()));
            }
        };

        match op {
            PendingOp::TitleBody { title, body } => {
                let echoed = value
                    .get("data")
                    .and_then(|d| d.get("updatePullRequest"))
                    .and_then(|d| d.get("pullRequest"));
                self.title.saved = echoed
                    .and_then(|p| p.get("title"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or(title);
                self.body.saved = echoed
                    .and_then(|p| p.get("body"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or(body);
                self.title.dirty = !trim_eq(&self.title.text, &self.title.saved);
                self.body.dirty = !trim_eq(&self.body.text, &self.body.saved);
                None
            }
            PendingOp::CommentCreate { region, body } => {
                let echo = create_echo(value);
                self.reconcile(host, region, &body, echo);
                None
            }
            PendingOp::CommentUpdate { region, body } => {
                let echo = comment_node(value, &["data", "updatePullRequestReviewComment", "pullRequestReviewComment"]);
                self.reconcile(host, region, &body, echo);
                None
            }
            PendingOp::ThreadCreate {
                region,
                body,
                first,
                last,
            } => {
                let echo = value
                    .get("data")
                    .and_then(|d| d.get("addPullRequestReviewThread"))
                    .and_then(|d| d.get("thread"))
                    .and_then(|t| t.get("comments"))
                    .and_then(|c| c.get("nodes"))
                    .and_then(|n| n.get(0))
                    .and_then(id_and_body);
                if let Some(comment_id) = self.reconcile(host, region, &body, echo) {
                    self.backfill_thread(host, value, region, comment_id, first, last);
                }
                None
            }
        }
    }

    /// Match one reply against its region: the sentinel (or stale) id is
    /// replaced only when the trimmed request body equals the trimmed echoed
    /// body. A mismatch is a transient condition, not an error — the region
    /// stays dirty and the next save retries it. Returns the confirmed id on
    /// a match.
    fn reconcile(
        &mut self,
        host: &dyn Host,
        region: RegionId,
        sent_body: &str,
        echo: Option<(i64, String)>,
    ) -> Option<i64> {
        // Torn-down target: tolerate the late reply
        if host.region_text(region).is_none() {
            return None;
        }
        let meta = self.comments.get_mut(&region)?;
        meta.in_flight = false;

        let (id, echoed_body) = echo?;
        if !trim_eq(sent_body, &echoed_body) {
            return None;
        }
        // Applying the same response twice must not mint a second id
        if meta.id != SENTINEL_ID && meta.id != id {
            return None;
        }
        meta.id = id;
        meta.saved_body = echoed_body;
        meta.dirty = false;
        Some(id)
    }

    /// After a thread create reconciles its first comment, locate the remote
    /// thread containing that comment id and record the real thread id; then
    /// re-key the comment and thread tables under the region handle obtained
    /// by re-registering the live range (thread regions shift as other edits
    /// land above them).
    fn backfill_thread(
        &mut self,
        host: &mut dyn Host,
        value: &Value,
        region: RegionId,
        comment_id: i64,
        first: usize,
        last: usize,
    ) {
        let thread_id = value
            .get("data")
            .and_then(|d| d.get("addPullRequestReviewThread"))
            .and_then(|d| d.get("pullRequest"))
            .and_then(|p| p.get("reviewThreads"))
            .and_then(|t| t.get("nodes"))
            .and_then(Value::as_array)
            .and_then(|threads| {
                threads.iter().find(|t| {
                    t.get("comments")
                        .and_then(|c| c.get("nodes"))
                        .and_then(Value::as_array)
                        .map(|nodes| {
                            nodes
                                .iter()
                                .any(|n| n.get("databaseId").and_then(Value::as_i64) == Some(comment_id))
                        })
                        .unwrap_or(false)
                })
            })
            .and_then(|t| t.get("databaseId"))
            .and_then(Value::as_i64);

        let fresh = host.re_register_region(region, first, last);
        if let Some(mut meta) = self.comments.remove(&region) {
            meta.region = fresh;
            self.comments.insert(fresh, meta);
        }
        let mut thread = self
            .threads
            .remove(&region)
            .unwrap_or(ThreadMeta {
                thread_id: SENTINEL_ID,
            });
        if let Some(id) = thread_id {
            thread.thread_id = id;
        }
        self.threads.insert(fresh, thread);
    }
}

/// Build the AddPullRequestReviewThread input under the line-targeting
/// policy: PR level anchors at the region's own snippet range; commit level
/// first checks the range still exists in the current PR-head diff and falls
/// back to a file-level thread with an attribution prefix when it does not
/// (the API only accepts line anchors valid at the PR's current head).
fn new_thread_input(
    ctx: &SaveContext,
    path: &str,
    side: Side,
    first: usize,
    last: usize,
    body: &str,
) -> (Value, String) {
    let anchored = match ctx.level {
        ReviewLevel::Pr => true,
        ReviewLevel::Commit(_) => patch_for(ctx.head_patches, path)
            .map(|p| p.contains_range(side, first, last))
            .unwrap_or(false),
    };

    if anchored {
        let mut input = json!({
            "pullRequestId": ctx.pr_node_id,
            "path": path,
            "side": side.as_str(),
            "line": last,
            "body": body,
        });
        if first < last {
            input["startLine"] = json!(first);
            input["startSide"] = json!(side.as_str());
        }
        return (input, body.to_string());
    }

    let commit = match ctx.level {
        ReviewLevel::Commit(sha) => &sha[..sha.len().min(7)],
        ReviewLevel::Pr => "",
    };
    let attributed = format!(
        "*Originally targeting side {} lines {}-{} at commit {}*\n\n{}",
        side.as_str(),
        first,
        last,
        commit,
        body
    );
    let input = json!({
        "pullRequestId": ctx.pr_node_id,
        "path": path,
        "subjectType": "FILE",
        "body": attributed,
    });
    (input, attributed)
}

/// Echoed (id, body) from a create reply: GraphQL comment shapes first,
/// then the flat REST reply shape
fn create_echo(value: &Value) -> Option<(i64, String)> {
    comment_node(value, &["data", "addComment", "commentEdge", "node"])
        .or_else(|| comment_node(value, &["data", "addDiscussionComment", "comment"]))
        .or_else(|| id_and_body(value))
}

fn comment_node(value: &Value, path: &[&str]) -> Option<(i64, String)> {
    let mut node = value;
    for key in path {
        node = node.get(key)?;
    }
    id_and_body(node)
}

fn id_and_body(node: &Value) -> Option<(i64, String)> {
    Some((
        node.get("databaseId").or_else(|| node.get("id"))?.as_i64()?,
        node.get("body")?.as_str()?.to_string(),
    ))
}

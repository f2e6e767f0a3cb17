use crate::remote::{CallId, RemoteReply, RemoteStore, RestMethod};
use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::mpsc;

/// Parsed reference to a GitHub PR
#[derive(Debug, Clone)]
pub struct PrRef {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

/// Parse a GitHub PR URL into its components.
/// Supports: https://github.com/owner/repo/pull/42
/// Also handles: trailing /files, /commits, /checks, etc.
/// Also handles: github.com/owner/repo/pull/42 (no scheme)
pub fn parse_github_pr_url(url: &str) -> Option<PrRef> {
    let stripped = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);

    let rest = stripped.strip_prefix("github.com/")?;

    let parts: Vec<&str> = rest.split('/').collect();
    if parts.len() < 4 {
        return None;
    }
    if parts[2] != "pull" {
        return None;
    }

    let owner = parts[0].to_string();
    let repo = parts[1].to_string();
    let number = parts[3].parse::<u64>().ok()?;

    if owner.is_empty() || repo.is_empty() || number == 0 {
        return None;
    }

    Some(PrRef { owner, repo, number })
}

/// Check if `gh` CLI is installed and authenticated
pub fn ensure_gh_installed() -> Result<()> {
    let output = Command::new("gh")
        .args(["--version"])
        .output()
        .context("GitHub CLI (gh) is not installed. Install it: https://cli.github.com")?;

    if !output.status.success() {
        anyhow::bail!("GitHub CLI (gh) is not working properly");
    }

    let auth = Command::new("gh")
        .args(["auth", "status"])
        .output()
        .context("Failed to check gh auth status")?;

    if !auth.status.success() {
        anyhow::bail!("GitHub CLI is not authenticated. Run: gh auth login");
    }

    Ok(())
}

// ── GraphQL documents / REST paths ──
//
// The operations the reconciliation engine dispatches. Inputs are built by
// the buffer; only the operation shape lives here.

pub mod gql {
    /// Combined title/body update (at most one per save, dispatched first)
    pub const UPDATE_PULL_REQUEST: &str = "\
mutation($input: UpdatePullRequestInput!) {
  updatePullRequest(input: $input) {
    pullRequest { title body }
  }
}";

    /// Plain issue/PR comment
    pub const ADD_COMMENT: &str = "\
mutation($input: AddCommentInput!) {
  addComment(input: $input) {
    commentEdge { node { databaseId body } }
  }
}";

    /// Discussion comment
    pub const ADD_DISCUSSION_COMMENT: &str = "\
mutation($input: AddDiscussionCommentInput!) {
  addDiscussionComment(input: $input) {
    comment { databaseId body }
  }
}";

    /// New review thread (line-anchored or file-level)
    pub const ADD_REVIEW_THREAD: &str = "\
mutation($input: AddPullRequestReviewThreadInput!) {
  addPullRequestReviewThread(input: $input) {
    thread {
      comments(first: 1) { nodes { databaseId body } }
    }
    pullRequest {
      reviewThreads(last: 50) {
        nodes { databaseId comments(first: 10) { nodes { databaseId } } }
      }
    }
  }
}";

    /// Edit an existing review comment by id
    pub const UPDATE_COMMENT: &str = "\
mutation($input: UpdatePullRequestReviewCommentInput!) {
  updatePullRequestReviewComment(input: $input) {
    pullRequestReviewComment { databaseId body }
  }
}";

    /// Fallback commit-message lookup when the object is not local
    pub const COMMIT_MESSAGE: &str = "\
query($owner: String!, $repo: String!, $oid: GitObjectID!) {
  repository(owner: $owner, name: $repo) {
    object(oid: $oid) { ... on Commit { messageHeadline } }
  }
}";
}

/// REST path for replying to an existing review thread
pub fn reply_path(pr: &PrRef) -> String {
    format!("repos/{}/{}/pulls/{}/comments", pr.owner, pr.repo, pr.number)
}

// ── gh-CLI transport ──

/// `RemoteStore` backed by the `gh` CLI.
///
/// Each call runs on its own worker thread and posts a [`RemoteReply`] to
/// the channel; the host app drains the receiver on its control thread and
/// hands replies to `Review::complete`. Nothing here blocks the engine.
pub struct GhStore {
    repo_root: String,
    tx: mpsc::Sender<RemoteReply>,
}

impl GhStore {
    pub fn new(repo_root: impl Into<String>) -> (Self, mpsc::Receiver<RemoteReply>) {
        let (tx, rx) = mpsc::channel();
        (
            GhStore {
                repo_root: repo_root.into(),
                tx,
            },
            rx,
        )
    }

    fn spawn(&self, call: CallId, args: Vec<String>, stdin_body: Option<String>) {
        let tx = self.tx.clone();
        let repo_root = self.repo_root.clone();
        std::thread::spawn(move || {
            let result = run_gh(&repo_root, &args, stdin_body.as_deref());
            // Receiver gone means the session closed; nothing to deliver to
            let _ = tx.send(RemoteReply { call, result });
        });
    }
}

impl RemoteStore for GhStore {
    fn query(&self, call: CallId, document: &str, variables: Value) {
        let payload = json!({ "query": document, "variables": variables });
        self.spawn(
            call,
            vec!["api".into(), "graphql".into(), "--input".into(), "-".into()],
            Some(payload.to_string()),
        );
    }

    fn mutate(&self, call: CallId, document: &str, input: Value) {
        let payload = json!({ "query": document, "variables": { "input": input } });
        self.spawn(
            call,
            vec!["api".into(), "graphql".into(), "--input".into(), "-".into()],
            Some(payload.to_string()),
        );
    }

    fn rest_call(&self, call: CallId, method: RestMethod, path: &str, body: Option<Value>) {
        let mut args = vec![
            "api".to_string(),
            "-X".to_string(),
            method.as_str().to_string(),
            path.to_string(),
        ];
        let stdin_body = body.map(|b| {
            args.push("--input".into());
            args.push("-".into());
            b.to_string()
        });
        self.spawn(call, args, stdin_body);
    }
}

/// Run one gh invocation, feeding `stdin_body` when present
fn run_gh(repo_root: &str, args: &[String], stdin_body: Option<&str>) -> Result<Value, String> {
    let mut cmd = Command::new("gh");
    cmd.args(args)
        .current_dir(repo_root)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if stdin_body.is_some() {
        cmd.stdin(Stdio::piped());
    }

    let mut child = cmd.spawn().map_err(|e| format!("Failed to run gh: {e}"))?;

    if let (Some(body), Some(mut stdin)) = (stdin_body, child.stdin.take()) {
        if let Err(e) = stdin.write_all(body.as_bytes()) {
            return Err(format!("Failed to write gh input: {e}"));
        }
    }

    let output = child
        .wait_with_output()
        .map_err(|e| format!("Failed to wait for gh: {e}"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(stderr.trim().to_string());
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(&stdout).map_err(|e| format!("Failed to parse gh output: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_standard_url() {
        let pr = parse_github_pr_url("https://github.com/owner/repo/pull/42").unwrap();
        assert_eq!(pr.owner, "owner");
        assert_eq!(pr.repo, "repo");
        assert_eq!(pr.number, 42);
    }

    #[test]
    fn parse_url_with_trailing_path() {
        let pr = parse_github_pr_url("https://github.com/owner/repo/pull/42/files").unwrap();
        assert_eq!(pr.number, 42);
    }

    #[test]
    fn parse_url_no_scheme() {
        let pr = parse_github_pr_url("github.com/owner/repo/pull/42").unwrap();
        assert_eq!(pr.owner, "owner");
        assert_eq!(pr.number, 42);
    }

    #[test]
    fn parse_invalid_not_github() {
        assert!(parse_github_pr_url("https://gitlab.com/owner/repo/pull/42").is_none());
    }

    #[test]
    fn parse_invalid_not_pull() {
        assert!(parse_github_pr_url("https://github.com/owner/repo/issues/42").is_none());
    }

    #[test]
    fn parse_invalid_non_numeric() {
        assert!(parse_github_pr_url("https://github.com/owner/repo/pull/abc").is_none());
    }

    #[test]
    fn parse_invalid_zero_pr_number() {
        assert!(parse_github_pr_url("https://github.com/owner/repo/pull/0").is_none());
    }

    #[test]
    fn reply_path_shape() {
        let pr = PrRef {
            owner: "octo".into(),
            repo: "hello".into(),
            number: 7,
        };
        assert_eq!(reply_path(&pr), "repos/octo/hello/pulls/7/comments");
    }
}

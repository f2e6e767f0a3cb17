use crate::git::LocalVcs;

/// One endpoint of a comparison: a commit, or the moving head of the PR.
///
/// The one-line commit message is resolved lazily: a fast local lookup is
/// tried first; when that fails the session falls back to a remote query and
/// feeds the answer back through [`Rev::set_message`]. Resolution is cached
/// and idempotent.
#[derive(Debug, Clone)]
pub struct Rev {
    pub sha: String,
    /// True when this endpoint tracks the PR head rather than a fixed commit
    pub is_head: bool,
    message: Option<String>,
}

impl Rev {
    pub fn new(sha: impl Into<String>) -> Self {
        Rev {
            sha: sha.into(),
            is_head: false,
            message: None,
        }
    }

    pub fn head(sha: impl Into<String>) -> Self {
        Rev {
            sha: sha.into(),
            is_head: true,
            message: None,
        }
    }

    /// Abbreviated sha for display
    pub fn short(&self) -> &str {
        let end = self.sha.len().min(7);
        &self.sha[..end]
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Try to resolve the commit message from the local VCS. Returns true if
    /// the message is available afterwards (already cached or newly found).
    /// A false return means the caller should dispatch the remote fallback.
    pub fn resolve_local(&mut self, vcs: &dyn LocalVcs) -> bool {
        if self.message.is_some() {
            return true;
        }
        if let Ok(msg) = vcs.commit_message(&self.sha) {
            self.set_message(msg);
            return true;
        }
        false
    }

    /// Cache a resolved message. First writer wins; later calls are no-ops,
    /// so a late remote reply cannot clobber a local result.
    pub fn set_message(&mut self, msg: impl Into<String>) {
        if self.message.is_none() {
            let msg = msg.into();
            let first_line = msg.lines().next().unwrap_or("").to_string();
            self.message = Some(first_line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    struct StubVcs {
        known: Option<&'static str>,
    }

    impl LocalVcs for StubVcs {
        fn commit_message(&self, _sha: &str) -> Result<String> {
            match self.known {
                Some(msg) => Ok(msg.to_string()),
                None => anyhow::bail!("unknown object"),
            }
        }
    }

    #[test]
    fn short_truncates_to_seven_chars() {
        let rev = Rev::new("0123456789abcdef");
        assert_eq!(rev.short(), "0123456");
    }

    #[test]
    fn short_of_short_sha_is_whole_sha() {
        let rev = Rev::new("abc12");
        assert_eq!(rev.short(), "abc12");
    }

    #[test]
    fn resolve_local_success_caches_first_line() {
        let mut rev = Rev::new("abc");
        let vcs = StubVcs { known: Some("Fix parser\n\nLong body here") };
        assert!(rev.resolve_local(&vcs));
        assert_eq!(rev.message(), Some("Fix parser"));
    }

    #[test]
    fn resolve_local_failure_requests_fallback() {
        let mut rev = Rev::new("abc");
        let vcs = StubVcs { known: None };
        assert!(!rev.resolve_local(&vcs));
        assert_eq!(rev.message(), None);
    }

    #[test]
    fn set_message_is_idempotent() {
        let mut rev = Rev::new("abc");
        rev.set_message("first");
        rev.set_message("second");
        assert_eq!(rev.message(), Some("first"));
    }

    #[test]
    fn resolve_after_cache_skips_vcs() {
        let mut rev = Rev::new("abc");
        rev.set_message("remote answer");
        // Would fail if consulted
        let vcs = StubVcs { known: None };
        assert!(rev.resolve_local(&vcs));
        assert_eq!(rev.message(), Some("remote answer"));
    }
}

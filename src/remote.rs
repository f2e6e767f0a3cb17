use serde_json::Value;

/// Token matching an asynchronous remote call to its completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallId(pub u64);

/// Monotonic [`CallId`] source. One per session; never reuses a token.
#[derive(Debug, Default)]
pub struct CallIds {
    next: u64,
}

impl CallIds {
    pub fn new() -> Self {
        CallIds::default()
    }

    pub fn next(&mut self) -> CallId {
        self.next += 1;
        CallId(self.next)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestMethod {
    Get,
    Post,
    Patch,
    Delete,
}

impl RestMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RestMethod::Get => "GET",
            RestMethod::Post => "POST",
            RestMethod::Patch => "PATCH",
            RestMethod::Delete => "DELETE",
        }
    }
}

/// Completion of one remote call, delivered back onto the control thread.
/// The error arm is an owned message so replies can cross the channel.
#[derive(Debug, Clone)]
pub struct RemoteReply {
    pub call: CallId,
    pub result: Result<Value, String>,
}

/// Capability interface over the GitHub API transport.
///
/// Every method is fire-and-forget: the implementation performs the call
/// off-thread and delivers a [`RemoteReply`] tagged with the same [`CallId`]
/// back to the session (see `Review::complete`). Authentication and wire
/// details live entirely behind this trait.
pub trait RemoteStore {
    fn query(&self, call: CallId, document: &str, variables: Value);
    fn mutate(&self, call: CallId, document: &str, input: Value);
    fn rest_call(&self, call: CallId, method: RestMethod, path: &str, body: Option<Value>);
}

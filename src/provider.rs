use crate::files::FileEntry;
use crate::host::SurfaceId;
use std::time::Duration;

/// Capability interface over file-content loading for the two comparison
/// sides. The Layout drives it; the front end implements it (blob fetches,
/// buffer attach/detach).
pub trait FileContent {
    /// Whether both sides of this file can be rendered right now
    fn is_ready_to_render(&self, file: &FileEntry) -> bool;

    /// Fetch the file's content. When `blocking` the call waits up to
    /// `timeout` for the data; returns false if it did not arrive in time.
    /// Non-blocking fetches kick off the load and return immediately.
    fn fetch(&mut self, file: &mut FileEntry, blocking: bool, timeout: Duration) -> bool;

    /// Attach the file's two sides to the comparison surfaces
    fn load_into(&mut self, file: &FileEntry, left: SurfaceId, right: SurfaceId);

    /// Detach the file from whatever surfaces currently show it
    fn detach(&mut self, file: &FileEntry);
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::collections::HashSet;

    /// Provider where readiness is controlled per path by the test.
    #[derive(Default)]
    pub struct FakeProvider {
        pub ready: HashSet<String>,
        /// Paths whose blocking fetch should time out
        pub stuck: HashSet<String>,
        pub loaded: Vec<String>,
        pub detached: Vec<String>,
    }

    impl FakeProvider {
        pub fn new() -> Self {
            FakeProvider::default()
        }

        pub fn mark_ready(&mut self, path: &str) {
            self.ready.insert(path.to_string());
        }
    }

    impl FileContent for FakeProvider {
        fn is_ready_to_render(&self, file: &FileEntry) -> bool {
            self.ready.contains(&file.path)
        }

        fn fetch(&mut self, file: &mut FileEntry, blocking: bool, _timeout: Duration) -> bool {
            if self.stuck.contains(&file.path) {
                return false;
            }
            if blocking {
                self.ready.insert(file.path.clone());
            }
            true
        }

        fn load_into(&mut self, file: &FileEntry, _left: SurfaceId, _right: SurfaceId) {
            self.loaded.push(file.path.clone());
        }

        fn detach(&mut self, file: &FileEntry) {
            self.detached.push(file.path.clone());
        }
    }
}

/// Which side of the comparison a line anchor refers to: LEFT is the base
/// (old) side, RIGHT the head (new) side — GitHub API terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Left => "LEFT",
            Side::Right => "RIGHT",
        }
    }
}

/// Line ranges covered by one hunk of a file's patch
#[derive(Debug, Clone, PartialEq)]
pub struct HunkRange {
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
}

impl HunkRange {
    /// Whether the 1-based inclusive range `[first, last]` falls entirely
    /// inside this hunk on the given side
    pub fn contains(&self, side: Side, first: usize, last: usize) -> bool {
        let (start, count) = match side {
            Side::Left => (self.old_start, self.old_count),
            Side::Right => (self.new_start, self.new_count),
        };
        count > 0 && first >= start && last < start + count
    }
}

/// Hunk ranges for one file in the PR-head diff
#[derive(Debug, Clone)]
pub struct FilePatch {
    pub path: String,
    pub hunks: Vec<HunkRange>,
}

impl FilePatch {
    /// Range-containment check used by new-thread targeting: the remote API
    /// only accepts line anchors valid at the PR's current head, so a
    /// commit-time range must still sit inside one head-diff hunk.
    pub fn contains_range(&self, side: Side, first: usize, last: usize) -> bool {
        self.hunks.iter().any(|h| h.contains(side, first, last))
    }
}

/// Parse a unified diff of the whole PR head into per-file hunk ranges.
/// Content lines are skipped; only file boundaries and `@@` headers matter.
pub fn parse_head_diff(raw: &str) -> Vec<FilePatch> {
    let mut files: Vec<FilePatch> = Vec::new();

    for line in raw.lines() {
        if line.starts_with("diff --git") {
            let path = line.split(" b/").last().unwrap_or("").to_string();
            files.push(FilePatch {
                path,
                hunks: Vec::new(),
            });
            continue;
        }
        if line.starts_with("@@") {
            if let (Some(file), Some(hunk)) = (files.last_mut(), parse_hunk_header(line)) {
                file.hunks.push(hunk);
            }
        }
    }

    files
}

/// Find the patch for one path in a parsed head diff
pub fn patch_for<'a>(patches: &'a [FilePatch], path: &str) -> Option<&'a FilePatch> {
    patches.iter().find(|p| p.path == path)
}

/// Parse a hunk header like "@@ -10,4 +10,15 @@ fn foo()"
fn parse_hunk_header(line: &str) -> Option<HunkRange> {
    let after_first = line.strip_prefix("@@ ")?;
    let end_idx = after_first.find(" @@")?;
    let range_str = &after_first[..end_idx];

    let parts: Vec<&str> = range_str.split_whitespace().collect();
    if parts.len() < 2 {
        return None;
    }

    let (old_start, old_count) = parse_range(parts[0].trim_start_matches('-'))?;
    let (new_start, new_count) = parse_range(parts[1].trim_start_matches('+'))?;

    Some(HunkRange {
        old_start,
        old_count,
        new_start,
        new_count,
    })
}

/// Parse "start,count" or just "start" (count defaults to 1)
fn parse_range(s: &str) -> Option<(usize, usize)> {
    if let Some((start, count)) = s.split_once(',') {
        Some((start.parse().ok()?, count.parse().ok()?))
    } else {
        Some((s.parse().ok()?, 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = "\
diff --git a/src/main.rs b/src/main.rs
index abc123..def456 100644
--- a/src/main.rs
+++ b/src/main.rs
@@ -1,3 +1,4 @@ fn main()
 fn main() {
+    println!(\"hello\");
     let x = 1;
 }
@@ -20,5 +21,2 @@
 context
-gone
-gone too
-and this
 context
diff --git a/new.rs b/new.rs
new file mode 100644
--- /dev/null
+++ b/new.rs
@@ -0,0 +1,2 @@
+fn hello() {}
+fn world() {}
";

    #[test]
    fn parses_files_and_hunk_ranges() {
        let patches = parse_head_diff(RAW);
        assert_eq!(patches.len(), 2);
        assert_eq!(patches[0].path, "src/main.rs");
        assert_eq!(patches[0].hunks.len(), 2);
        assert_eq!(
            patches[0].hunks[0],
            HunkRange { old_start: 1, old_count: 3, new_start: 1, new_count: 4 }
        );
        assert_eq!(patches[1].path, "new.rs");
        assert_eq!(
            patches[1].hunks[0],
            HunkRange { old_start: 0, old_count: 0, new_start: 1, new_count: 2 }
        );
    }

    #[test]
    fn header_without_counts_defaults_to_one() {
        let hunk = parse_hunk_header("@@ -5 +7 @@").unwrap();
        assert_eq!(hunk.old_count, 1);
        assert_eq!(hunk.new_count, 1);
    }

    #[test]
    fn contains_range_right_side() {
        let patches = parse_head_diff(RAW);
        let patch = patch_for(&patches, "src/main.rs").unwrap();
        // First hunk covers new lines 1..=4
        assert!(patch.contains_range(Side::Right, 1, 4));
        assert!(patch.contains_range(Side::Right, 2, 3));
        // Line 5 is outside both hunks' new ranges (second covers 21..=22)
        assert!(!patch.contains_range(Side::Right, 4, 5));
        assert!(patch.contains_range(Side::Right, 21, 22));
    }

    #[test]
    fn contains_range_left_side() {
        let patches = parse_head_diff(RAW);
        let patch = patch_for(&patches, "src/main.rs").unwrap();
        // Second hunk covers old lines 20..=24
        assert!(patch.contains_range(Side::Left, 20, 24));
        assert!(!patch.contains_range(Side::Left, 20, 25));
    }

    #[test]
    fn zero_count_side_contains_nothing() {
        let patches = parse_head_diff(RAW);
        let patch = patch_for(&patches, "new.rs").unwrap();
        // Added file: old side is empty
        assert!(!patch.contains_range(Side::Left, 1, 1));
        assert!(patch.contains_range(Side::Right, 1, 2));
    }

    #[test]
    fn range_spanning_two_hunks_is_not_contained() {
        let patches = parse_head_diff(RAW);
        let patch = patch_for(&patches, "src/main.rs").unwrap();
        // 1..=22 touches both hunks but fits in neither
        assert!(!patch.contains_range(Side::Right, 1, 22));
    }

    #[test]
    fn unknown_path_has_no_patch() {
        let patches = parse_head_diff(RAW);
        assert!(patch_for(&patches, "missing.rs").is_none());
    }
}

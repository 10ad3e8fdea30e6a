use std::fmt;

use serde::{Deserialize, Serialize};

/// A source folder and what has been replicated of it so far.
///
/// `dest_id` is set exactly once, right after the destination folder was
/// created; `structure_done` and `content_done` summarize the whole subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderNode {
    pub source_id: String,
    pub name: String,
    #[serde(default)]
    pub dest_id: Option<String>,
    #[serde(default)]
    pub structure_done: bool,
    #[serde(default)]
    pub content_done: bool,
    #[serde(default)]
    pub files: Vec<FileNode>,
    #[serde(default)]
    pub children: Vec<FolderNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNode {
    pub source_id: String,
    pub name: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub dest_id: Option<String>,
}

impl FolderNode {
    pub fn new(source_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            name: name.into(),
            dest_id: None,
            structure_done: false,
            content_done: false,
            files: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn is_done(&self) -> bool {
        self.structure_done && self.content_done
    }

    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats::default();
        self.accumulate(&mut stats);
        stats
    }

    fn accumulate(&self, stats: &mut TreeStats) {
        stats.folders_total += 1;
        if self.dest_id.is_some() {
            stats.folders_created += 1;
        }
        stats.files_total += self.files.len();
        stats.files_copied += self.files.iter().filter(|f| f.dest_id.is_some()).count();
        for child in &self.children {
            child.accumulate(stats);
        }
    }
}

impl FileNode {
    pub fn new(
        source_id: impl Into<String>,
        name: impl Into<String>,
        mime_type: Option<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            name: name.into(),
            mime_type,
            dest_id: None,
        }
    }
}

/// Running copied/total counters for progress logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    pub folders_total: usize,
    pub folders_created: usize,
    pub files_total: usize,
    pub files_copied: usize,
}

impl fmt::Display for TreeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "folders {}/{}, files {}/{}",
            self.folders_created, self.folders_total, self.files_copied, self.files_total
        )
    }
}

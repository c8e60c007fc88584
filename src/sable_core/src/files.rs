use crate::loc::Position;
use serde::{Deserialize, Serialize};

/// Id of a file in the global file table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct FileRef(pub u32);

impl FileRef {
    pub fn none() -> FileRef {
        FileRef(u32::MAX)
    }

    pub fn exists(self) -> bool {
        self.0 != u32::MAX
    }

    pub fn id(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceType {
    /// Registered but contents not ingested yet.
    NotYetRead,
    Normal,
    /// Part of the serialized core snapshot.
    Payload,
    Stdlib,
    /// Removed file; the id stays allocated and the entry stays out of the
    /// live set.
    TombStone,
}

/// Per-file diagnostic gate, from the `# typed:` magic comment. Ordered:
/// a diagnostic is emitted only when the file's level is at or above the
/// code's minimum level.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum StrictnessLevel {
    Ignore,
    False,
    True,
    Strict,
    Strong,
}

impl StrictnessLevel {
    /// Scan the leading comment block for a `# typed:` sigil. Defaults to
    /// `False` when absent or unrecognized.
    pub fn from_source(source: &str) -> StrictnessLevel {
        for line in source.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if !trimmed.starts_with('#') {
                break;
            }
            let rest = trimmed.trim_start_matches('#').trim();
            if let Some(word) = rest.strip_prefix("typed:") {
                return match word.trim() {
                    "ignore" => StrictnessLevel::Ignore,
                    "false" => StrictnessLevel::False,
                    "true" => StrictnessLevel::True,
                    "strict" => StrictnessLevel::Strict,
                    "strong" => StrictnessLevel::Strong,
                    _ => StrictnessLevel::False,
                };
            }
        }
        StrictnessLevel::False
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct File {
    pub path: String,
    pub source: String,
    pub source_type: SourceType,
    pub strictness: StrictnessLevel,
    /// Byte offsets of line starts, always beginning with 0.
    line_starts: Vec<u32>,
}

impl File {
    pub fn new(path: String, source: String, source_type: SourceType) -> File {
        let strictness = StrictnessLevel::from_source(&source);
        let line_starts = compute_line_starts(&source);
        File {
            path,
            source,
            source_type,
            strictness,
            line_starts,
        }
    }

    pub fn is_tombstone(&self) -> bool {
        matches!(self.source_type, SourceType::TombStone)
    }

    /// Replace the contents, recomputing strictness and the line index.
    pub fn update_source(&mut self, source: String) {
        self.strictness = StrictnessLevel::from_source(&source);
        self.line_starts = compute_line_starts(&source);
        self.source = source;
        if matches!(self.source_type, SourceType::NotYetRead) {
            self.source_type = SourceType::Normal;
        }
    }

    /// 1-based line/column for a byte offset.
    pub fn offset_to_position(&self, offset: u32) -> Position {
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        Position {
            line: line_idx as u32 + 1,
            column: offset - self.line_starts[line_idx] + 1,
        }
    }

    /// Byte offset for a 1-based line/column; clamped to the file.
    pub fn position_to_offset(&self, line: u32, column: u32) -> u32 {
        if line == 0 {
            return 0;
        }
        let idx = (line as usize - 1).min(self.line_starts.len() - 1);
        let start = self.line_starts[idx];
        let line_end = self
            .line_starts
            .get(idx + 1)
            .map(|s| s.saturating_sub(1))
            .unwrap_or(self.source.len() as u32);
        (start + column.saturating_sub(1)).min(line_end)
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

fn compute_line_starts(source: &str) -> Vec<u32> {
    let mut starts = vec![0u32];
    for (i, b) in source.bytes().enumerate() {
        if b == b'\n' {
            starts.push(i as u32 + 1);
        }
    }
    starts
}

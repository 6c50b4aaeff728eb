//! Splitting study content into contiguous, roughly equal chunks.
//!
//! Every discrete splitter (pages, paragraphs, words) uses the same rule:
//! with `base = extent / k` and `rem = extent % k`, the first `rem` chunks
//! get `base + 1` units and the rest get `base`. Exactly `k` chunks always
//! come back, some of them empty when `k` exceeds the extent.

use std::ops::Range;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, StudyError};
use crate::storage::{self, KeyValueStore};
use crate::timer::format_clock;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum ChunkRange {
    /// Inclusive, 1-based page numbers. Empty when `end_page < start_page`.
    Pages { start_page: u32, end_page: u32 },
    /// Seconds from the start of the video.
    Time { start: f64, end: f64 },
    Text { text: String, word_count: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    pub id: usize,
    #[serde(flatten)]
    pub range: ChunkRange,
    #[serde(default)]
    pub completed: bool,
}

impl Chunk {
    fn new(id: usize, range: ChunkRange) -> Self {
        Self {
            id,
            range,
            completed: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        match &self.range {
            ChunkRange::Pages { start_page, end_page } => end_page < start_page,
            ChunkRange::Time { start, end } => end <= start,
            ChunkRange::Text { word_count, .. } => *word_count == 0,
        }
    }

    pub fn title(&self) -> String {
        match &self.range {
            ChunkRange::Pages { start_page, end_page } => {
                format!("Pages {}-{}", start_page, end_page)
            }
            ChunkRange::Time { start, end } => format!(
                "Segment {} ({} - {})",
                self.id + 1,
                format_clock(*start as u64),
                format_clock(*end as u64)
            ),
            ChunkRange::Text { word_count, .. } => {
                format!("Chunk {} ({} words)", self.id + 1, word_count)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TextChunkMode {
    #[default]
    Paragraph,
    Word,
}

fn check_count(k: usize) -> Result<()> {
    if k == 0 {
        return Err(StudyError::InvalidChunkCount(k));
    }
    Ok(())
}

/// Index ranges of `k` balanced partitions of `extent` units.
pub fn balanced_ranges(extent: usize, k: usize) -> Result<Vec<Range<usize>>> {
    check_count(k)?;
    let base = extent / k;
    let rem = extent % k;

    let mut ranges = Vec::with_capacity(k);
    let mut cursor = 0;
    for i in 0..k {
        let size = base + usize::from(i < rem);
        ranges.push(cursor..cursor + size);
        cursor += size;
    }
    Ok(ranges)
}

/// Split the inclusive page range `start..=end` into `k` chunks.
pub fn page_chunks(start: u32, end: u32, k: usize) -> Result<Vec<Chunk>> {
    let extent = if end >= start { (end - start + 1) as usize } else { 0 };
    let chunks = balanced_ranges(extent, k)?
        .into_iter()
        .enumerate()
        .map(|(id, r)| {
            let start_page = start + r.start as u32;
            // An empty range ends one page before it starts.
            let end_page = (start + r.end as u32).saturating_sub(1);
            Chunk::new(id, ChunkRange::Pages { start_page, end_page })
        })
        .collect();
    Ok(chunks)
}

/// Split `duration` seconds into `k` equal segments.
pub fn duration_chunks(duration: f64, k: usize) -> Result<Vec<Chunk>> {
    check_count(k)?;
    let duration = duration.max(0.0);
    let step = duration / k as f64;
    let chunks = (0..k)
        .map(|i| {
            let start = i as f64 * step;
            let end = if i + 1 == k {
                duration
            } else {
                ((i + 1) as f64 * step).min(duration)
            };
            Chunk::new(i, ChunkRange::Time { start, end })
        })
        .collect();
    Ok(chunks)
}

/// Parse a cut-point like `1:02:03`, `5:30` or `90` into seconds.
pub fn parse_timestamp(raw: &str) -> Option<f64> {
    let parts: Vec<&str> = raw.trim().split(':').collect();
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }
    let mut secs = 0.0;
    for part in &parts {
        let value: f64 = part.trim().parse().ok()?;
        if value < 0.0 {
            return None;
        }
        secs = secs * 60.0 + value;
    }
    Some(secs)
}

/// Segments bounded by user-supplied cut points. Unparseable or out of range
/// points are ignored; the segments always cover `[0, duration]`.
pub fn manual_video_chunks(timestamps: &str, duration: f64) -> Vec<Chunk> {
    let duration = duration.max(0.0);
    let mut cuts: Vec<f64> = timestamps
        .split(|c: char| c == ',' || c == '\n' || c == ';')
        .filter(|s| !s.trim().is_empty())
        .filter_map(parse_timestamp)
        .filter(|&t| t > 0.0 && t < duration)
        .collect();
    cuts.sort_by(|a, b| a.total_cmp(b));
    cuts.dedup();

    let mut bounds = Vec::with_capacity(cuts.len() + 2);
    bounds.push(0.0);
    bounds.extend(cuts);
    bounds.push(duration);

    bounds
        .windows(2)
        .enumerate()
        .map(|(id, w)| Chunk::new(id, ChunkRange::Time { start: w[0], end: w[1] }))
        .collect()
}

pub fn split_paragraphs(text: &str) -> Vec<&str> {
    let mut paragraphs = Vec::new();
    let mut start: Option<usize> = None;
    let mut end = 0;

    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        if line.trim().is_empty() {
            if let Some(s) = start.take() {
                paragraphs.push(text[s..end].trim());
            }
        } else {
            if start.is_none() {
                start = Some(line_start);
            }
            end = offset;
        }
    }
    if let Some(s) = start {
        paragraphs.push(text[s..end].trim());
    }
    paragraphs
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Split text into `k` chunks of paragraphs or words.
pub fn text_chunks(text: &str, k: usize, mode: TextChunkMode) -> Result<Vec<Chunk>> {
    let (units, sep): (Vec<&str>, &str) = match mode {
        TextChunkMode::Paragraph => (split_paragraphs(text), "\n\n"),
        TextChunkMode::Word => (text.split_whitespace().collect(), " "),
    };

    let chunks = balanced_ranges(units.len(), k)?
        .into_iter()
        .enumerate()
        .map(|(id, r)| {
            let text = units[r].join(sep);
            let words = word_count(&text);
            Chunk::new(id, ChunkRange::Text { text, word_count: words })
        })
        .collect();
    Ok(chunks)
}

/// Minutes needed to read `words` at `wpm`, rounded up.
pub fn estimated_reading_minutes(words: usize, wpm: u32) -> u32 {
    if words == 0 {
        return 0;
    }
    let wpm = wpm.max(1) as usize;
    ((words + wpm - 1) / wpm) as u32
}

// ══════════════════════════════════════════════════════════════════════════
// Chunk Progress
// ══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Pdf,
    Video,
    Text,
}

impl ContentKind {
    pub fn store_key(&self) -> &'static str {
        match self {
            ContentKind::Pdf => "pdf.chunks",
            ContentKind::Video => "video.chunks",
            ContentKind::Text => "text.chunks",
        }
    }
}

#[derive(Debug, Serialize)]
struct ChunkSnapshot {
    version: u32,
    chunks: Vec<Chunk>,
}

#[derive(Deserialize)]
struct StoredChunks {
    #[serde(default)]
    chunks: Vec<serde_json::Value>,
}

/// Navigation and completion tracking over one content kind's chunks.
pub struct ChunkProgress {
    kind: ContentKind,
    chunks: Vec<Chunk>,
    index: usize,
}

impl ChunkProgress {
    pub fn new(kind: ContentKind) -> Self {
        Self {
            kind,
            chunks: Vec::new(),
            index: 0,
        }
    }

    /// Restore persisted chunks, resuming at the first incomplete one.
    pub fn load(kind: ContentKind, store: &dyn KeyValueStore) -> Self {
        let key = kind.store_key();
        let items = storage::load::<StoredChunks>(store, key)
            .map(|s| s.chunks)
            .unwrap_or_default();
        let chunks: Vec<Chunk> = storage::decode_items(store, key, items);
        let index = chunks
            .iter()
            .position(|c| !c.completed)
            .unwrap_or(chunks.len().saturating_sub(1));
        Self { kind, chunks, index }
    }

    pub fn set_chunks(&mut self, chunks: Vec<Chunk>, store: &dyn KeyValueStore) {
        info!(kind = ?self.kind, count = chunks.len(), "built study chunks");
        self.chunks = chunks;
        self.index = 0;
        self.save(store);
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current(&self) -> Option<&Chunk> {
        self.chunks.get(self.index)
    }

    pub fn mark_completed(&mut self, store: &dyn KeyValueStore) {
        if let Some(chunk) = self.chunks.get_mut(self.index) {
            chunk.completed = true;
            debug!(kind = ?self.kind, chunk = chunk.id, "chunk completed");
            self.save(store);
        }
    }

    /// Completes the current chunk and moves on. False at the last chunk.
    pub fn next(&mut self, store: &dyn KeyValueStore) -> bool {
        if self.index + 1 < self.chunks.len() {
            self.mark_completed(store);
            self.index += 1;
            true
        } else {
            false
        }
    }

    pub fn prev(&mut self) -> bool {
        if self.index > 0 {
            self.index -= 1;
            true
        } else {
            false
        }
    }

    pub fn progress_percent(&self) -> u32 {
        if self.chunks.is_empty() {
            return 0;
        }
        (self.index as f64 / self.chunks.len() as f64 * 100.0).round() as u32
    }

    fn save(&self, store: &dyn KeyValueStore) {
        let snapshot = ChunkSnapshot {
            version: 1,
            chunks: self.chunks.clone(),
        };
        storage::save(store, self.kind.store_key(), &snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use pretty_assertions::assert_eq;

    fn pages(chunks: &[Chunk]) -> Vec<(u32, u32)> {
        chunks
            .iter()
            .map(|c| match c.range {
                ChunkRange::Pages { start_page, end_page } => (start_page, end_page),
                _ => panic!("not a page chunk"),
            })
            .collect()
    }

    #[test]
    fn ten_pages_three_chunks() {
        let chunks = page_chunks(1, 10, 3).unwrap();
        assert_eq!(pages(&chunks), vec![(1, 4), (5, 7), (8, 10)]);
        assert_eq!(chunks[0].title(), "Pages 1-4");
    }

    #[test]
    fn balanced_ranges_cover_extent() {
        for extent in 0..40 {
            for k in 1..12 {
                let ranges = balanced_ranges(extent, k).unwrap();
                assert_eq!(ranges.len(), k);
                assert_eq!(ranges.first().unwrap().start, 0);
                assert_eq!(ranges.last().unwrap().end, extent);
                for pair in ranges.windows(2) {
                    assert_eq!(pair[0].end, pair[1].start);
                }
                let sizes: Vec<usize> = ranges.iter().map(|r| r.len()).collect();
                let max = *sizes.iter().max().unwrap();
                let min = *sizes.iter().min().unwrap();
                assert!(max - min <= 1);
            }
        }
    }

    #[test]
    fn more_chunks_than_pages_yields_empty_chunks() {
        let chunks = page_chunks(1, 2, 4).unwrap();
        assert_eq!(chunks.len(), 4);
        assert_eq!(pages(&chunks), vec![(1, 1), (2, 2), (3, 2), (3, 2)]);
        assert!(!chunks[1].is_empty());
        assert!(chunks[2].is_empty());
        assert!(chunks[3].is_empty());
    }

    #[test]
    fn zero_pages_gives_k_empty_chunks() {
        let chunks = page_chunks(5, 4, 3).unwrap();
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(Chunk::is_empty));
    }

    #[test]
    fn zero_chunk_count_is_rejected() {
        assert!(matches!(page_chunks(1, 10, 0), Err(StudyError::InvalidChunkCount(0))));
        assert!(duration_chunks(60.0, 0).is_err());
        assert!(text_chunks("a", 0, TextChunkMode::Word).is_err());
    }

    #[test]
    fn duration_chunks_end_at_duration() {
        let chunks = duration_chunks(100.0, 3).unwrap();
        assert_eq!(chunks.len(), 3);
        let mut cursor = 0.0;
        for chunk in &chunks {
            let ChunkRange::Time { start, end } = chunk.range else {
                panic!("not a time chunk")
            };
            assert_eq!(start, cursor);
            cursor = end;
        }
        assert_eq!(cursor, 100.0);
        assert_eq!(chunks[0].title(), "Segment 1 (00:00 - 00:33)");
    }

    #[test]
    fn duration_chunks_cover_any_length() {
        for duration in [0.0, 1.0, 59.5, 100.0, 3600.0, 5423.25] {
            for k in 1..=9 {
                let chunks = duration_chunks(duration, k).unwrap();
                assert_eq!(chunks.len(), k);

                let mut cursor = 0.0;
                for chunk in &chunks {
                    let ChunkRange::Time { start, end } = chunk.range else {
                        panic!("not a time chunk")
                    };
                    assert_eq!(start, cursor, "gap at {} for duration={} k={}", start, duration, k);
                    assert!(end >= start);
                    cursor = end;
                }
                assert!((cursor - duration).abs() < 1e-9, "duration={} k={}", duration, k);
            }
        }
    }

    #[test]
    fn zero_duration_gives_empty_segments() {
        let chunks = duration_chunks(0.0, 2).unwrap();
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(Chunk::is_empty));
    }

    #[test]
    fn manual_timestamps_cover_video() {
        let chunks = manual_video_chunks("5:00, 1:00, junk, 99:00, 1:00", 600.0);
        let bounds: Vec<(f64, f64)> = chunks
            .iter()
            .map(|c| match c.range {
                ChunkRange::Time { start, end } => (start, end),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(bounds, vec![(0.0, 60.0), (60.0, 300.0), (300.0, 600.0)]);
    }

    #[test]
    fn timestamp_parsing() {
        assert_eq!(parse_timestamp("1:02:03"), Some(3723.0));
        assert_eq!(parse_timestamp(" 90 "), Some(90.0));
        assert_eq!(parse_timestamp("a:10"), None);
    }

    #[test]
    fn paragraph_chunks_use_remainder_distribution() {
        let text = "one\n\ntwo two\n\n\nthree\n  \nfour four four\n\nfive";
        let chunks = text_chunks(text, 2, TextChunkMode::Paragraph).unwrap();
        let texts: Vec<(&str, usize)> = chunks
            .iter()
            .map(|c| match &c.range {
                ChunkRange::Text { text, word_count } => (text.as_str(), *word_count),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(
            texts,
            vec![("one\n\ntwo two\n\nthree", 4), ("four four four\n\nfive", 4)]
        );
    }

    #[test]
    fn word_chunks_cover_all_words() {
        let chunks = text_chunks("a b c d e f g", 3, TextChunkMode::Word).unwrap();
        let counts: Vec<usize> = chunks
            .iter()
            .map(|c| match c.range {
                ChunkRange::Text { word_count, .. } => word_count,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(counts, vec![3, 2, 2]);
        assert_eq!(chunks[2].title(), "Chunk 3 (2 words)");
    }

    #[test]
    fn reading_time_rounds_up() {
        assert_eq!(estimated_reading_minutes(0, 250), 0);
        assert_eq!(estimated_reading_minutes(1, 250), 1);
        assert_eq!(estimated_reading_minutes(500, 250), 2);
        assert_eq!(estimated_reading_minutes(501, 250), 3);
    }

    #[test]
    fn progress_marks_and_persists() {
        let store = MemoryStore::new();
        let mut progress = ChunkProgress::new(ContentKind::Pdf);
        progress.set_chunks(page_chunks(1, 9, 3).unwrap(), &store);

        assert!(!progress.prev());
        assert!(progress.next(&store));
        assert!(progress.next(&store));
        assert!(!progress.next(&store));
        assert_eq!(progress.progress_percent(), 67);

        let restored = ChunkProgress::load(ContentKind::Pdf, &store);
        let done: Vec<bool> = restored.chunks().iter().map(|c| c.completed).collect();
        assert_eq!(done, vec![true, true, false]);
        assert_eq!(restored.index(), 2);
    }

    #[test]
    fn unreadable_chunk_is_skipped_and_kept_aside() {
        let store = MemoryStore::new();
        let mut progress = ChunkProgress::new(ContentKind::Pdf);
        progress.set_chunks(page_chunks(1, 9, 3).unwrap(), &store);

        let key = ContentKind::Pdf.store_key();
        let mut raw: serde_json::Value =
            serde_json::from_str(&store.get(key).unwrap().unwrap()).unwrap();
        raw["chunks"][1] = serde_json::json!({"id": "broken"});
        store.set(key, &raw.to_string()).unwrap();

        let restored = ChunkProgress::load(ContentKind::Pdf, &store);
        assert_eq!(restored.chunks().len(), 2);
        assert!(store.get(&storage::corrupt_key(key)).unwrap().is_some());
    }
}

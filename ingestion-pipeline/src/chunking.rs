//! Recursive character text splitter (spec §4.6.3): normalize, then split on
//! an ordered separator list with a fixed chunk size and overlap. Hand-rolled
//! rather than built on the `text-splitter` crate — that crate's API takes a
//! single capacity *range*, which can't express an exact separator list plus
//! a fixed, non-zero `chunk_overlap`; see DESIGN.md.

const CHUNK_SIZE: usize = 1000;
const CHUNK_OVERLAP: usize = 200;
const SEPARATORS: &[&str] = &["\n\n## ", "\n\n### ", "\n\n", "\n", ". ", " ", ""];

/// Collapses blank-line runs and inline whitespace, strips trailing
/// whitespace per line, and trims leading/trailing blank lines. Idempotent:
/// `normalize(normalize(x)) == normalize(x)`.
#[must_use]
pub fn normalize(text: &str) -> String {
    let collapsed = collapse_excess_newlines(text);
    let lines: Vec<String> = collapsed
        .lines()
        .map(|line| coalesce_inline_whitespace(line).trim_end().to_string())
        .collect();
    lines.join("\n").trim_matches('\n').to_string()
}

fn collapse_excess_newlines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut run = 0u32;
    for ch in text.chars() {
        if ch == '\n' {
            run += 1;
            if run <= 2 {
                out.push(ch);
            }
        } else {
            run = 0;
            out.push(ch);
        }
    }
    out
}

fn coalesce_inline_whitespace(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut in_run = false;
    for ch in line.chars() {
        if ch == ' ' || ch == '\t' {
            if !in_run {
                out.push(' ');
            }
            in_run = true;
        } else {
            in_run = false;
            out.push(ch);
        }
    }
    out
}

/// Splits `raw_text` into chunks with monotonically meaningful order (the
/// caller assigns `chunk_index` by position). Empty chunks after trimming are
/// dropped.
#[must_use]
pub fn chunk_text(raw_text: &str) -> Vec<String> {
    let normalized = normalize(raw_text);
    if normalized.is_empty() {
        return Vec::new();
    }

    let pieces = recursive_split(&normalized, SEPARATORS, CHUNK_SIZE);
    merge_with_overlap(pieces, CHUNK_SIZE, CHUNK_OVERLAP)
        .into_iter()
        .map(|chunk| chunk.trim().to_string())
        .filter(|chunk| !chunk.is_empty())
        .collect()
}

fn recursive_split(text: &str, separators: &[&str], chunk_size: usize) -> Vec<String> {
    if text.len() <= chunk_size {
        return vec![text.to_string()];
    }

    let Some((sep, rest)) = separators.split_first() else {
        return vec![text.to_string()];
    };

    let parts = split_keep_separator(text, sep);
    if parts.len() <= 1 {
        return recursive_split(text, rest, chunk_size);
    }

    let mut result = Vec::new();
    for part in parts {
        if part.is_empty() {
            continue;
        }
        if part.len() > chunk_size {
            result.extend(recursive_split(&part, rest, chunk_size));
        } else {
            result.push(part);
        }
    }
    result
}

/// Splits on `sep`, keeping it attached to the end of each piece but the
/// last so downstream merges don't lose separator characters.
fn split_keep_separator(text: &str, sep: &str) -> Vec<String> {
    if sep.is_empty() {
        return text.chars().map(|c| c.to_string()).collect();
    }

    let segments: Vec<&str> = text.split(sep).collect();
    let last = segments.len().saturating_sub(1);
    segments
        .into_iter()
        .enumerate()
        .map(|(i, segment)| {
            if i < last {
                format!("{segment}{sep}")
            } else {
                segment.to_string()
            }
        })
        .collect()
}

fn merge_with_overlap(pieces: Vec<String>, chunk_size: usize, overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for piece in pieces {
        if !current.is_empty() && current.len() + piece.len() > chunk_size {
            chunks.push(std::mem::take(&mut current));
            current = tail_from_byte(&chunks[chunks.len() - 1], overlap);
        }
        current.push_str(&piece);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Last up-to-`overlap` bytes of `s`, snapped forward to a char boundary.
fn tail_from_byte(s: &str, overlap: usize) -> String {
    let mut start = s.len().saturating_sub(overlap);
    while start < s.len() && !s.is_char_boundary(start) {
        start += 1;
    }
    s[start..].to_string()
}

//! Streaming merge of sorted record lines.

use std::io::{self, BufRead, Write};

/// Outcome of one merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Lines in the merged file
    pub written: u64,
    /// New lines that were already present
    pub deduplicated: u64,
}

/// Merge sorted `new` lines into the sorted `old` stream, writing the union
/// to `out`.
///
/// A new line is skipped when it equals the old line it is flushed before,
/// or the new line written just before it. Blank old lines are dropped.
/// Merging the same lines twice is a no-op.
pub fn merge_sorted<R, W, S>(old: R, new: &[S], out: &mut W) -> io::Result<MergeStats>
where
    R: BufRead,
    W: Write,
    S: AsRef<str>,
{
    let mut stats = MergeStats::default();
    let mut pending = new
        .iter()
        .map(|line| {
            let line = line.as_ref();
            line.strip_suffix('\n').unwrap_or(line)
        })
        .peekable();
    let mut last_new: Option<&str> = None;

    for old_line in old.lines() {
        let old_line = old_line?;
        if old_line.is_empty() {
            continue;
        }

        while let Some(&line) = pending.peek() {
            if line > old_line.as_str() {
                break;
            }
            pending.next();
            if line == old_line || last_new == Some(line) {
                stats.deduplicated += 1;
                continue;
            }
            writeln!(out, "{line}")?;
            stats.written += 1;
            last_new = Some(line);
        }

        writeln!(out, "{old_line}")?;
        stats.written += 1;
    }

    for line in pending {
        if last_new == Some(line) {
            stats.deduplicated += 1;
            continue;
        }
        writeln!(out, "{line}")?;
        stats.written += 1;
        last_new = Some(line);
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| format!("{s}\n")).collect()
    }

    fn merge(old: &str, new: &[&str]) -> (String, MergeStats) {
        let mut out = Vec::new();
        let stats = merge_sorted(old.as_bytes(), &lines(new), &mut out).unwrap();
        (String::from_utf8(out).unwrap(), stats)
    }

    #[test]
    fn test_merge_into_empty() {
        let (out, stats) = merge("", &["a", "b", "b", "c"]);
        assert_eq!(out, "a\nb\nc\n");
        assert_eq!(stats.written, 3);
        assert_eq!(stats.deduplicated, 1);
    }

    #[test]
    fn test_interleave_with_old() {
        let (out, stats) = merge("b\nd\n", &["a", "c", "d", "e"]);
        assert_eq!(out, "a\nb\nc\nd\ne\n");
        assert_eq!(stats.deduplicated, 1);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let (first, _) = merge("b\nd\n", &["a", "c"]);
        let (second, stats) = merge(&first, &["a", "c"]);
        assert_eq!(first, second);
        assert_eq!(stats.deduplicated, 2);
    }

    #[test]
    fn test_blank_old_lines_are_dropped() {
        let (out, _) = merge("a\n\n\nc\n", &["b"]);
        assert_eq!(out, "a\nb\nc\n");
    }

    #[test]
    fn test_byte_order() {
        // '{' sorts after every ASCII letter and digit.
        let (out, _) = merge("{\"loc\":\"00002:0\"}\n", &["{\"loc\":\"00001:4\"}"]);
        assert_eq!(out, "{\"loc\":\"00001:4\"}\n{\"loc\":\"00002:0\"}\n");
    }
}

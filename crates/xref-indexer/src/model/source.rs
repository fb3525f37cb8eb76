//! Source positions and the source manager.
//!
//! A [`SourceLoc`] is a spelling position (file + byte offset). Tokens that
//! were produced by a macro expansion also carry a [`MacroOrigin`] naming the
//! outermost expansion site, so the same spelling can appear at many
//! expansion sites and stay distinct.

use serde::{Deserialize, Serialize};

/// Index of a file in [`super::TranslationUnit::files`].
pub type FileId = u32;

/// A byte position inside a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileLoc {
    pub file: FileId,
    pub offset: u32,
}

/// Where a macro-produced token came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MacroOrigin {
    /// File position of the outermost invocation's name token
    pub site: FileLoc,
    /// Token was spelled in a macro body rather than passed as an argument
    #[serde(default)]
    pub from_body: bool,
    /// Ordinal of the token within the expansion
    #[serde(default)]
    pub token: u32,
}

/// A source position, possibly inside a macro expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceLoc {
    pub file: FileId,
    pub offset: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub macro_origin: Option<MacroOrigin>,
}

impl SourceLoc {
    /// A plain file position.
    pub fn new(file: FileId, offset: u32) -> Self {
        Self {
            file,
            offset,
            macro_origin: None,
        }
    }

    /// A position produced by a macro expansion.
    pub fn in_macro(file: FileId, offset: u32, origin: MacroOrigin) -> Self {
        Self {
            file,
            offset,
            macro_origin: Some(origin),
        }
    }

    pub fn is_macro(&self) -> bool {
        self.macro_origin.is_some()
    }

    /// Produced by a macro and spelled in the macro's body.
    pub fn is_macro_body(&self) -> bool {
        self.macro_origin.is_some_and(|o| o.from_body)
    }

    /// Where the characters were written.
    pub fn spelling(&self) -> SourceLoc {
        SourceLoc::new(self.file, self.offset)
    }

    /// Where the text ended up after expansion.
    pub fn expansion(&self) -> SourceLoc {
        match self.macro_origin {
            Some(origin) => SourceLoc::new(origin.site.file, origin.site.offset),
            None => *self,
        }
    }

    pub fn file_loc(&self) -> FileLoc {
        FileLoc {
            file: self.file,
            offset: self.offset,
        }
    }

    /// The same spelling position moved forward by `delta` bytes.
    pub fn advanced(&self, delta: u32) -> SourceLoc {
        SourceLoc {
            offset: self.offset + delta,
            ..*self
        }
    }
}

impl From<FileLoc> for SourceLoc {
    fn from(loc: FileLoc) -> Self {
        SourceLoc::new(loc.file, loc.offset)
    }
}

/// A range whose end is the start of the last token (or an exclusive end for
/// character ranges, depending on the producer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRange {
    pub begin: SourceLoc,
    pub end: SourceLoc,
}

impl SourceRange {
    pub fn new(begin: SourceLoc, end: SourceLoc) -> Self {
        Self { begin, end }
    }

    /// Zero-width range at `loc`.
    pub fn point(loc: SourceLoc) -> Self {
        Self {
            begin: loc,
            end: loc,
        }
    }

    /// Smallest range covering both, as long as they share a file.
    pub fn combine(a: Option<SourceRange>, b: Option<SourceRange>) -> Option<SourceRange> {
        match (a, b) {
            (None, b) => b,
            (a, None) => a,
            (Some(a), Some(b)) => {
                if a.begin.file != b.begin.file {
                    return Some(b);
                }
                let begin = if a.begin.offset <= b.begin.offset {
                    a.begin
                } else {
                    b.begin
                };
                let end = if a.end.offset >= b.end.offset {
                    a.end
                } else {
                    b.end
                };
                Some(SourceRange { begin, end })
            }
        }
    }
}

/// One file of the translation unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    /// Absolute path as the front-end saw it
    pub path: String,
    /// Full contents; may be empty for files that only need classifying
    #[serde(default)]
    pub text: String,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }
}

pub(crate) const PUNCTUATORS: &[&str] = &[
    "<<=", ">>=", "...", "->*", "<=>", "::", "->", "++", "--", "<<", ">>", "<=", ">=", "==", "!=",
    "&&", "||", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", ".*", "##",
];

/// Character-level view of the translation unit's files.
pub struct SourceManager<'a> {
    files: &'a [SourceFile],
    line_starts: Vec<Vec<u32>>,
}

impl<'a> SourceManager<'a> {
    pub fn new(files: &'a [SourceFile]) -> Self {
        let line_starts = files
            .iter()
            .map(|f| {
                std::iter::once(0)
                    .chain(
                        f.text
                            .bytes()
                            .enumerate()
                            .filter(|(_, b)| *b == b'\n')
                            .map(|(i, _)| i as u32 + 1),
                    )
                    .collect()
            })
            .collect();
        Self { files, line_starts }
    }

    pub fn path(&self, file: FileId) -> Option<&'a str> {
        self.files.get(file as usize).map(|f| f.path.as_str())
    }

    fn bytes(&self, file: FileId) -> &'a [u8] {
        self.files
            .get(file as usize)
            .map(|f| f.text.as_bytes())
            .unwrap_or(&[])
    }

    /// 1-based line and 0-based column of a spelling position.
    pub fn line_col(&self, loc: &SourceLoc) -> Option<(u32, u32)> {
        let starts = self.line_starts.get(loc.file as usize)?;
        if loc.offset as usize > self.bytes(loc.file).len() {
            return None;
        }
        let line = starts.partition_point(|&s| s <= loc.offset);
        let col = loc.offset - starts[line - 1];
        Some((line as u32, col))
    }

    pub fn line(&self, loc: &SourceLoc) -> Option<u32> {
        self.line_col(loc).map(|(line, _)| line)
    }

    pub fn byte_at(&self, file: FileId, offset: u32) -> Option<u8> {
        self.bytes(file).get(offset as usize).copied()
    }

    /// Raw text of `len` bytes at a spelling position.
    pub fn text(&self, loc: &SourceLoc, len: u32) -> Option<&'a str> {
        let file = self.files.get(loc.file as usize)?;
        let start = loc.offset as usize;
        file.text.get(start..start + len as usize)
    }

    /// First non-whitespace offset at or after `offset`.
    pub fn skip_whitespace(&self, file: FileId, mut offset: u32) -> u32 {
        let bytes = self.bytes(file);
        while bytes
            .get(offset as usize)
            .is_some_and(|b| b.is_ascii_whitespace())
        {
            offset += 1;
        }
        offset
    }

    /// Length in bytes of the token starting at a spelling position.
    pub fn token_length(&self, loc: &SourceLoc) -> u32 {
        let bytes = self.bytes(loc.file);
        let start = loc.offset as usize;
        let Some(&first) = bytes.get(start) else {
            return 0;
        };
        if first.is_ascii_whitespace() {
            return 0;
        }

        if is_ident_start(first) {
            let end = scan_while(bytes, start, is_ident_continue);
            let prefix = &bytes[start..end];
            if matches!(prefix, b"L" | b"u" | b"U" | b"u8")
                && matches!(bytes.get(end), Some(b'"' | b'\''))
            {
                return (scan_quoted(bytes, end) - start) as u32;
            }
            return (end - start) as u32;
        }

        if first.is_ascii_digit()
            || (first == b'.' && bytes.get(start + 1).is_some_and(u8::is_ascii_digit))
        {
            let mut end = start + 1;
            while let Some(&b) = bytes.get(end) {
                let exponent_sign = matches!(b, b'+' | b'-')
                    && matches!(bytes[end - 1], b'e' | b'E' | b'p' | b'P');
                if is_ident_continue(b) || b == b'.' || b == b'\'' || exponent_sign {
                    end += 1;
                } else {
                    break;
                }
            }
            return (end - start) as u32;
        }

        if first == b'"' || first == b'\'' {
            return (scan_quoted(bytes, start) - start) as u32;
        }

        let rest = &bytes[start..];
        PUNCTUATORS
            .iter()
            .find(|p| rest.starts_with(p.as_bytes()))
            .map(|p| p.len() as u32)
            .unwrap_or(1)
    }
}

pub(crate) fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$' || b >= 0x80
}

pub(crate) fn is_ident_continue(b: u8) -> bool {
    is_ident_start(b) || b.is_ascii_digit()
}

fn scan_while(bytes: &[u8], start: usize, pred: impl Fn(u8) -> bool) -> usize {
    let mut end = start;
    while bytes.get(end).is_some_and(|&b| pred(b)) {
        end += 1;
    }
    end
}

/// End (exclusive) of the quoted literal opening at `start`.
fn scan_quoted(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut end = start + 1;
    while let Some(&b) = bytes.get(end) {
        match b {
            b'\\' => end += 2,
            b'\n' => return end,
            _ if b == quote => return end + 1,
            _ => end += 1,
        }
    }
    bytes.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(text: &str) -> Vec<SourceFile> {
        vec![SourceFile::new("/src/a.cpp", text)]
    }

    #[test]
    fn test_line_col() {
        let files = files("int a;\nint bb;\n");
        let sm = SourceManager::new(&files);
        assert_eq!(sm.line_col(&SourceLoc::new(0, 0)), Some((1, 0)));
        assert_eq!(sm.line_col(&SourceLoc::new(0, 4)), Some((1, 4)));
        assert_eq!(sm.line_col(&SourceLoc::new(0, 11)), Some((2, 4)));
        assert_eq!(sm.line_col(&SourceLoc::new(0, 100)), None);
        assert_eq!(sm.line_col(&SourceLoc::new(3, 0)), None);
    }

    #[test]
    fn test_token_length() {
        let files = files("foo_1(x) += 0x1F; \"a\\\"b\" u8\"s\" 1.5e+3 ->*");
        let sm = SourceManager::new(&files);
        let len = |off| sm.token_length(&SourceLoc::new(0, off));
        assert_eq!(len(0), 5); // foo_1
        assert_eq!(len(5), 1); // (
        assert_eq!(len(9), 2); // +=
        assert_eq!(len(12), 4); // 0x1F
        assert_eq!(len(18), 6); // "a\"b"
        assert_eq!(len(25), 5); // u8"s"
        assert_eq!(len(31), 6); // 1.5e+3
        assert_eq!(len(38), 3); // ->*
        assert_eq!(len(17), 0); // whitespace
    }

    #[test]
    fn test_expansion_and_spelling() {
        let origin = MacroOrigin {
            site: FileLoc { file: 0, offset: 40 },
            from_body: true,
            token: 2,
        };
        let loc = SourceLoc::in_macro(0, 12, origin);
        assert!(loc.is_macro_body());
        assert_eq!(loc.spelling(), SourceLoc::new(0, 12));
        assert_eq!(loc.expansion(), SourceLoc::new(0, 40));
        assert_ne!(loc, loc.spelling());
    }

    #[test]
    fn test_combine_ranges() {
        let r = |a, b| Some(SourceRange::new(SourceLoc::new(0, a), SourceLoc::new(0, b)));
        let combined = SourceRange::combine(r(10, 20), r(2, 12)).unwrap();
        assert_eq!(combined.begin.offset, 2);
        assert_eq!(combined.end.offset, 20);
        assert_eq!(SourceRange::combine(None, r(1, 2)), r(1, 2));
    }
}

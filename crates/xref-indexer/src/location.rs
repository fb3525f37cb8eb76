//! Location classification and location strings.
//!
//! Every physical file is classified once: files under the build root are
//! re-rooted under [`GENERATED_PREFIX`], files strictly under the source root
//! lose the root, and everything else (system headers, ...) is ignored.

use std::cell::OnceCell;

use xref_core::IndexerConfig;

use crate::model::{FileId, SourceFile, SourceLoc, SourceManager, SourceRange};

/// Virtual directory generated files are reported under.
pub const GENERATED_PREFIX: &str = "__GENERATED__/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// Neither in the source tree nor in the build tree
    Unknown,
    Source,
    Generated,
}

/// Per-file classification result.
#[derive(Debug, Clone)]
pub struct FileInfo {
    /// Path relative to the source root, or under [`GENERATED_PREFIX`]
    pub realname: String,
    pub file_type: FileType,
}

impl FileInfo {
    pub fn is_interesting(&self) -> bool {
        self.file_type != FileType::Unknown
    }

    pub fn is_generated(&self) -> bool {
        self.file_type == FileType::Generated
    }
}

/// Path-prefix classifier for absolute paths.
#[derive(Debug, Clone)]
pub struct LocationClassifier {
    src_root: Option<String>,
    obj_root: Option<String>,
}

impl LocationClassifier {
    pub fn new(config: &IndexerConfig) -> Self {
        let root = |dir: &std::path::Path, trimmed: String| {
            (!dir.as_os_str().is_empty()).then_some(trimmed)
        };
        Self {
            src_root: root(&config.src_dir, config.src_root()),
            obj_root: root(&config.obj_dir, config.obj_root()),
        }
    }

    /// Classify an absolute path and return its canonical relative name.
    pub fn relativize(&self, path: &str) -> (String, FileType) {
        if let Some(rest) = strip_root(path, self.obj_root.as_deref()) {
            return (format!("{GENERATED_PREFIX}{rest}"), FileType::Generated);
        }
        match strip_root(path, self.src_root.as_deref()) {
            Some(rest) if !rest.is_empty() => (rest.to_string(), FileType::Source),
            _ => (String::new(), FileType::Unknown),
        }
    }
}

/// `path` with `root` and the following separator removed, when `path` lies
/// under `root`.
fn strip_root<'p>(path: &'p str, root: Option<&str>) -> Option<&'p str> {
    let rest = path.strip_prefix(root?)?;
    rest.strip_prefix('/')
        .or_else(|| rest.strip_prefix(std::path::MAIN_SEPARATOR))
}

/// Memoized classification of the translation unit's files.
pub struct FileRegistry<'a> {
    classifier: LocationClassifier,
    files: &'a [SourceFile],
    infos: Vec<OnceCell<FileInfo>>,
}

impl<'a> FileRegistry<'a> {
    pub fn new(config: &IndexerConfig, files: &'a [SourceFile]) -> Self {
        Self {
            classifier: LocationClassifier::new(config),
            files,
            infos: files.iter().map(|_| OnceCell::new()).collect(),
        }
    }

    pub fn classifier(&self) -> &LocationClassifier {
        &self.classifier
    }

    /// Classification of a file, computed on first use.
    pub fn info(&self, file: FileId) -> &FileInfo {
        static UNKNOWN: FileInfo = FileInfo {
            realname: String::new(),
            file_type: FileType::Unknown,
        };
        match self.infos.get(file as usize) {
            Some(cell) => cell.get_or_init(|| {
                let (realname, file_type) =
                    self.classifier.relativize(&self.files[file as usize].path);
                FileInfo {
                    realname,
                    file_type,
                }
            }),
            None => &UNKNOWN,
        }
    }

    /// Whether records at this position are worth writing. Text from a
    /// macro body is judged by the expansion site, macro arguments by where
    /// they were spelled.
    pub fn is_interesting(&self, loc: &SourceLoc) -> bool {
        let loc = if loc.is_macro_body() {
            loc.expansion()
        } else {
            loc.spelling()
        };
        self.info(loc.file).is_interesting()
    }
}

/// `LLLLL:C`, or `LLLLL:C-E` for a token of `len` bytes.
pub fn location_string(sm: &SourceManager<'_>, loc: &SourceLoc, len: u32) -> Option<String> {
    let (line, col) = sm.line_col(loc)?;
    if len > 0 {
        Some(format!("{line:05}:{col}-{}", col + len))
    } else {
        Some(format!("{line:05}:{col}"))
    }
}

/// `L1-L2`; with `omit_end`, a single-line range prints as `L1`.
pub fn line_range_string(
    sm: &SourceManager<'_>,
    range: &SourceRange,
    omit_end: bool,
) -> Option<String> {
    let begin = sm.line(&range.begin)?;
    let end = sm.line(&range.end)?;
    if omit_end && begin == end {
        Some(format!("{begin}"))
    } else {
        Some(format!("{begin}-{end}"))
    }
}

/// `L1:C1-L2:C2`.
pub fn full_range_string(sm: &SourceManager<'_>, range: &SourceRange) -> Option<String> {
    let (l1, c1) = sm.line_col(&range.begin)?;
    let (l2, c2) = sm.line_col(&range.end)?;
    Some(format!("{l1}:{c1}-{l2}:{c2}"))
}

/// `#L1-L2` when the range is in `current`'s file, `path#L1-L2` otherwise.
pub fn path_and_line_range_string(
    sm: &SourceManager<'_>,
    registry: &FileRegistry<'_>,
    current: FileId,
    range: &SourceRange,
) -> Option<String> {
    let lines = line_range_string(sm, range, true)?;
    if range.begin.file == current {
        Some(format!("#{lines}"))
    } else {
        let info = registry.info(range.begin.file);
        Some(format!("{}#{lines}", info.realname))
    }
}

/// The range if it lies in `loc`'s file and ends after it begins.
pub fn validate_range(loc: &SourceLoc, range: Option<SourceRange>) -> Option<SourceRange> {
    let range = range?;
    if range.begin.file != loc.file || range.end.file != loc.file {
        return None;
    }
    if range.begin.offset >= range.end.offset {
        return None;
    }
    Some(range)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> LocationClassifier {
        LocationClassifier::new(&IndexerConfig::new("/work/src", "/work/obj/", "/out"))
    }

    #[test]
    fn test_relativize_source() {
        let (name, ty) = classifier().relativize("/work/src/dom/base/Node.cpp");
        assert_eq!(name, "dom/base/Node.cpp");
        assert_eq!(ty, FileType::Source);
    }

    #[test]
    fn test_relativize_generated() {
        let (name, ty) = classifier().relativize("/work/obj/dist/include/Gen.h");
        assert_eq!(name, "__GENERATED__/dist/include/Gen.h");
        assert_eq!(ty, FileType::Generated);
    }

    #[test]
    fn test_relativize_outside_roots() {
        let c = classifier();
        assert_eq!(c.relativize("/usr/include/stdio.h").1, FileType::Unknown);
        // Equal to the root, or sharing a prefix without a separator.
        assert_eq!(c.relativize("/work/src").1, FileType::Unknown);
        assert_eq!(c.relativize("/work/src/").1, FileType::Unknown);
        assert_eq!(c.relativize("/work/srcfoo/a.h").1, FileType::Unknown);
    }

    #[test]
    fn test_registry_memoizes() {
        let files = vec![
            SourceFile::new("/work/src/a.cpp", "int a;\n"),
            SourceFile::new("/usr/include/b.h", ""),
        ];
        let config = IndexerConfig::new("/work/src", "/work/obj", "/out");
        let registry = FileRegistry::new(&config, &files);
        assert!(registry.is_interesting(&SourceLoc::new(0, 0)));
        assert!(!registry.is_interesting(&SourceLoc::new(1, 0)));
        assert!(!registry.is_interesting(&SourceLoc::new(9, 0)));
        let first = registry.info(0) as *const FileInfo;
        assert_eq!(first, registry.info(0) as *const FileInfo);
    }

    #[test]
    fn test_macro_body_judged_at_expansion_site() {
        use crate::model::{FileLoc, MacroOrigin};

        let files = vec![
            SourceFile::new("/work/src/a.cpp", "int a = M;\n"),
            SourceFile::new("/usr/include/m.h", "#define M f()\n"),
        ];
        let config = IndexerConfig::new("/work/src", "/work/obj", "/out");
        let registry = FileRegistry::new(&config, &files);
        let origin = |from_body| MacroOrigin {
            site: FileLoc { file: 0, offset: 8 },
            from_body,
            token: 0,
        };
        assert!(registry.is_interesting(&SourceLoc::in_macro(1, 10, origin(true))));
        assert!(!registry.is_interesting(&SourceLoc::in_macro(1, 10, origin(false))));
    }

    #[test]
    fn test_location_strings() {
        let files = vec![SourceFile::new("/work/src/a.cpp", "int a;\nint foo() {\n}\n")];
        let sm = SourceManager::new(&files);
        assert_eq!(
            location_string(&sm, &SourceLoc::new(0, 11), 3).as_deref(),
            Some("00002:4-7")
        );
        assert_eq!(
            location_string(&sm, &SourceLoc::new(0, 4), 0).as_deref(),
            Some("00001:4")
        );
        let range = SourceRange::new(SourceLoc::new(0, 17), SourceLoc::new(0, 19));
        assert_eq!(full_range_string(&sm, &range).as_deref(), Some("2:10-3:0"));
        assert_eq!(line_range_string(&sm, &range, false).as_deref(), Some("2-3"));
        let single = SourceRange::point(SourceLoc::new(0, 4));
        assert_eq!(line_range_string(&sm, &single, true).as_deref(), Some("1"));
    }

    #[test]
    fn test_validate_range() {
        let loc = SourceLoc::new(0, 5);
        let ok = SourceRange::new(SourceLoc::new(0, 1), SourceLoc::new(0, 9));
        let backwards = SourceRange::new(SourceLoc::new(0, 9), SourceLoc::new(0, 1));
        let other_file = SourceRange::new(SourceLoc::new(1, 1), SourceLoc::new(1, 9));
        assert_eq!(validate_range(&loc, Some(ok)), Some(ok));
        assert_eq!(validate_range(&loc, Some(backwards)), None);
        assert_eq!(validate_range(&loc, Some(other_file)), None);
        assert_eq!(validate_range(&loc, None), None);
    }
}

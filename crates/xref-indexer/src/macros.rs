//! Macro expansion tracking.
//!
//! At most one expansion is active at a time. Invocations nested inside it
//! (as arguments or produced by its body) become dependencies of the active
//! one; anything else closes it. While active, every lexed token appends its
//! spelling to the expansion text and identifiers remember their offset so
//! records emitted for them can point back into the text.

use std::collections::HashMap;
use std::path::Path;

use xref_core::MacroReflowConfig;

use crate::model::{is_ident_continue, SourceLoc, SourceRange, Token, TokenKind, PUNCTUATORS};

const HEADER_EXTENSIONS: [&str; 5] = [".h", ".hpp", ".hxx", ".inc", ".def"];

/// Whether expansions located in `path` use the header reflow threshold.
pub fn is_header_like(path: &str) -> bool {
    let Some(name) = Path::new(path).file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let lower = name.to_ascii_lowercase();
    HEADER_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// A macro invocation reported by the preprocessor.
#[derive(Debug, Clone)]
pub struct MacroInvocation {
    pub name: String,
    /// Location of the macro name token
    pub name_loc: SourceLoc,
    /// Whole invocation, arguments included
    pub range: SourceRange,
    /// Location of the macro name in its `#define`
    pub definition: SourceLoc,
    /// `M_` symbol of the macro
    pub symbol: String,
    /// The expansion site is in a header-like file
    pub in_header: bool,
}

/// A finished expansion, retained for the records emitted inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandedMacro {
    pub symbol: String,
    /// Symbol followed by the sorted dependency symbols, comma separated
    pub key: String,
    pub text: String,
    pub token_offsets: HashMap<SourceLoc, usize>,
}

/// The invocation whose expansion was just closed. The caller emits its
/// macro use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedExpansion {
    pub name: String,
    pub name_loc: SourceLoc,
    pub symbol: String,
}

#[derive(Debug, PartialEq, Eq)]
pub enum BeginOutcome {
    /// Folded into the active expansion. The caller emits a macro use for
    /// the nested invocation.
    Nested,
    /// A new expansion started, possibly closing the previous one.
    Started(Option<ClosedExpansion>),
}

#[derive(Debug)]
struct ActiveExpansion {
    invocation: MacroInvocation,
    range: SourceRange,
    dependencies: Vec<String>,
    text: String,
    token_offsets: HashMap<SourceLoc, usize>,
    prev: Option<Token>,
}

impl ActiveExpansion {
    fn contains(&self, range: &SourceRange) -> bool {
        let begin = range.begin.expansion();
        let end = range.end.expansion();
        begin.file == self.range.begin.file
            && end.file == self.range.end.file
            && self.range.begin.offset <= begin.offset
            && end.offset <= self.range.end.offset
    }
}

#[derive(Debug)]
pub struct MacroTracker {
    reflow: MacroReflowConfig,
    active: Option<ActiveExpansion>,
    expanded: HashMap<SourceLoc, ExpandedMacro>,
}

impl MacroTracker {
    pub fn new(reflow: MacroReflowConfig) -> Self {
        Self {
            reflow,
            active: None,
            expanded: HashMap::new(),
        }
    }

    pub fn is_expanding(&self) -> bool {
        self.active.is_some()
    }

    /// Handle a macro invocation at an interesting location.
    pub fn begin(&mut self, invocation: MacroInvocation) -> BeginOutcome {
        let mut closed = None;
        if let Some(active) = self.active.as_mut() {
            let in_args = active.contains(&invocation.range);
            let in_body =
                invocation.name_loc.expansion() == active.invocation.name_loc.expansion();
            if in_args || in_body {
                if active.invocation.definition != invocation.definition {
                    active.dependencies.push(invocation.symbol);
                }
                return BeginOutcome::Nested;
            }
            closed = self.close();
        }

        let range = SourceRange::new(
            invocation.range.begin.expansion(),
            invocation.range.end.expansion(),
        );
        self.active = Some(ActiveExpansion {
            invocation,
            range,
            dependencies: Vec::new(),
            text: String::new(),
            token_offsets: HashMap::new(),
            prev: None,
        });
        BeginOutcome::Started(closed)
    }

    /// Feed one lexed token. A token outside any macro closes the active
    /// expansion.
    pub fn on_token(&mut self, token: &Token) -> Option<ClosedExpansion> {
        let active = self.active.as_mut()?;
        if !token.loc.is_macro() {
            return self.close();
        }

        if let Some(prev) = &active.prev {
            if needs_space(prev, token) {
                active.text.push(' ');
            }
        }
        if token.kind == TokenKind::Identifier {
            active.token_offsets.insert(token.loc, active.text.len());
        }
        active.text.push_str(&token.spelling);
        active.prev = Some(token.clone());
        None
    }

    /// An `#include` whose file name was produced by the active expansion.
    /// The quoted path becomes the tail of the expansion text, which is then
    /// closed so the file reference can find it.
    pub fn note_inclusion(&mut self, filename: SourceLoc, path: &str) -> Option<ClosedExpansion> {
        let active = self.active.as_mut()?;
        active.token_offsets.insert(filename, active.text.len());
        active.text.push('"');
        active.text.push_str(path);
        active.text.push('"');
        self.close()
    }

    /// Finish the active expansion, if any.
    pub fn close(&mut self) -> Option<ClosedExpansion> {
        let ActiveExpansion {
            invocation,
            mut dependencies,
            mut text,
            mut token_offsets,
            ..
        } = self.active.take()?;

        let threshold = if invocation.in_header {
            self.reflow.header_threshold
        } else {
            self.reflow.main_threshold
        };
        if self.reflow.enabled && text.len() < threshold {
            let (formatted, shift) = reflow(&text);
            for offset in token_offsets.values_mut() {
                *offset = shift[*offset];
            }
            text = formatted;
        }

        dependencies.sort();
        dependencies.dedup();
        let mut key = invocation.symbol.clone();
        for dependency in &dependencies {
            key.push(',');
            key.push_str(dependency);
        }

        tracing::trace!(macro_name = %invocation.name, %key, len = text.len(), "macro expansion closed");

        self.expanded.insert(
            invocation.name_loc.expansion(),
            ExpandedMacro {
                symbol: invocation.symbol.clone(),
                key,
                text,
                token_offsets,
            },
        );

        Some(ClosedExpansion {
            name: invocation.name,
            name_loc: invocation.name_loc,
            symbol: invocation.symbol,
        })
    }

    /// The finished expansion whose name token sits at `site`.
    pub fn lookup(&self, site: &SourceLoc) -> Option<&ExpandedMacro> {
        self.expanded.get(site)
    }
}

/// Whether printing `next` right after `prev` would lex differently.
pub fn needs_space(prev: &Token, next: &Token) -> bool {
    let (Some(&last), Some(&first)) = (
        prev.spelling.as_bytes().last(),
        next.spelling.as_bytes().first(),
    ) else {
        return false;
    };

    match prev.kind {
        TokenKind::Identifier | TokenKind::Keyword => is_ident_continue(first),
        TokenKind::Number => {
            is_ident_continue(first)
                || first == b'.'
                || ((first == b'+' || first == b'-') && matches!(last, b'e' | b'E' | b'p' | b'P'))
        }
        // User-defined literal suffixes.
        TokenKind::Literal => is_ident_continue(first) && !first.is_ascii_digit(),
        TokenKind::Punctuation => {
            if last == b'.' && first.is_ascii_digit() {
                return true;
            }
            let mut joined = prev.spelling.clone();
            joined.push(first as char);
            joined == "//"
                || joined == "/*"
                || PUNCTUATORS.iter().any(|p| p.starts_with(joined.as_str()))
        }
        TokenKind::Annotation => is_ident_continue(last) && is_ident_continue(first),
    }
}

/// Re-flow expansion text for display: a space after `,`, a newline after
/// `;` and `{`, and before `}`. String and character literals are copied
/// unchanged. Returns the new text and, for every byte offset of the input
/// (plus its end), the matching offset in the output.
pub fn reflow(text: &str) -> (String, Vec<usize>) {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    let mut shift = vec![0; text.len() + 1];
    let mut quote: Option<char> = None;
    let mut escaped = false;

    let mut chars = text.char_indices().peekable();
    while let Some((i, ch)) = chars.next() {
        let next = chars.peek().map(|&(_, c)| c);

        if let Some(q) = quote {
            shift[i] = out.len();
            out.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }

        if ch == '}' && !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        shift[i] = out.len();
        out.push(ch);

        match ch {
            '"' | '\'' => quote = Some(ch),
            ',' if next.is_some_and(|n| n != ' ') => out.push(' '),
            ';' | '{' if next.is_some_and(|n| n != '\n') => {
                out.push('\n');
                // The space that separated the tokens is now redundant.
                if next == Some(' ') {
                    chars.next();
                    shift[i + 1] = out.len();
                }
            }
            _ => {}
        }
    }
    // Offsets inside multi-byte characters follow their first byte.
    for i in 1..bytes.len() {
        if !text.is_char_boundary(i) {
            shift[i] = shift[i - 1];
        }
    }
    shift[text.len()] = out.len();

    (out, shift)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FileLoc, MacroOrigin};

    fn origin(site: u32, token: u32) -> MacroOrigin {
        MacroOrigin {
            site: FileLoc { file: 0, offset: site },
            from_body: true,
            token,
        }
    }

    fn token(kind: TokenKind, spelling: &str, loc: SourceLoc) -> Token {
        Token {
            kind,
            spelling: spelling.to_string(),
            loc,
        }
    }

    fn invocation(name: &str, at: u32, len: u32, definition: u32) -> MacroInvocation {
        MacroInvocation {
            name: name.to_string(),
            name_loc: SourceLoc::new(0, at),
            range: SourceRange::new(SourceLoc::new(0, at), SourceLoc::new(0, at + len)),
            definition: SourceLoc::new(0, definition),
            symbol: format!("M_{name}"),
            in_header: false,
        }
    }

    fn punct(spelling: &str, site: u32, n: u32) -> Token {
        token(TokenKind::Punctuation, spelling, SourceLoc::in_macro(0, 20, origin(site, n)))
    }

    #[test]
    fn test_square_expansion() {
        let mut tracker = MacroTracker::new(MacroReflowConfig::default());
        assert_eq!(
            tracker.begin(invocation("SQ", 40, 5, 8)),
            BeginOutcome::Started(None)
        );
        let three = |n| token(TokenKind::Number, "3", SourceLoc::in_macro(0, 43, origin(40, n)));
        for tok in [
            punct("(", 40, 0),
            punct("(", 40, 1),
            three(2),
            punct(")", 40, 3),
            punct("*", 40, 4),
            punct("(", 40, 5),
            three(6),
            punct(")", 40, 7),
            punct(")", 40, 8),
        ] {
            assert!(tracker.on_token(&tok).is_none());
        }
        let closed = tracker
            .on_token(&token(TokenKind::Punctuation, ";", SourceLoc::new(0, 45)))
            .unwrap();
        assert_eq!(closed.name, "SQ");
        assert!(!tracker.is_expanding());

        let expanded = tracker.lookup(&SourceLoc::new(0, 40)).unwrap();
        assert_eq!(expanded.text, "((3)*(3))");
        assert_eq!(expanded.key, "M_SQ");
    }

    #[test]
    fn test_identifier_offsets_and_spacing() {
        let mut tracker = MacroTracker::new(MacroReflowConfig::default());
        let _ = tracker.begin(invocation("DECL", 0, 4, 100));
        let int_loc = SourceLoc::in_macro(0, 110, origin(0, 0));
        let x_loc = SourceLoc::in_macro(0, 114, origin(0, 1));
        tracker.on_token(&token(TokenKind::Keyword, "int", int_loc));
        tracker.on_token(&token(TokenKind::Identifier, "x", x_loc));
        tracker.on_token(&punct(";", 0, 2));
        tracker.close().unwrap();

        let expanded = tracker.lookup(&SourceLoc::new(0, 0)).unwrap();
        assert_eq!(expanded.text, "int x;");
        assert_eq!(expanded.token_offsets[&x_loc], 4);
        assert!(!expanded.token_offsets.contains_key(&int_loc));
    }

    #[test]
    fn test_dependency_key_is_order_independent() {
        let run = |deps: &[(&str, u32)]| {
            let mut tracker = MacroTracker::new(MacroReflowConfig::default());
            let _ = tracker.begin(invocation("OUTER", 0, 50, 500));
            for &(name, def) in deps {
                let mut nested = invocation(name, 10, 3, def);
                nested.name_loc = SourceLoc::in_macro(0, def, origin(0, 1));
                assert_eq!(tracker.begin(nested), BeginOutcome::Nested);
            }
            tracker.close().unwrap();
            tracker.lookup(&SourceLoc::new(0, 0)).unwrap().key.clone()
        };
        let forward = run(&[("A", 600), ("B", 700), ("A", 600)]);
        let backward = run(&[("B", 700), ("A", 600)]);
        assert_eq!(forward, "M_OUTER,M_A,M_B");
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_recursive_use_is_not_a_dependency() {
        let mut tracker = MacroTracker::new(MacroReflowConfig::default());
        let _ = tracker.begin(invocation("F", 0, 20, 300));
        assert_eq!(tracker.begin(invocation("F", 5, 3, 300)), BeginOutcome::Nested);
        tracker.close().unwrap();
        assert_eq!(tracker.lookup(&SourceLoc::new(0, 0)).unwrap().key, "M_F");
    }

    #[test]
    fn test_disjoint_invocation_closes_previous() {
        let mut tracker = MacroTracker::new(MacroReflowConfig::default());
        let _ = tracker.begin(invocation("A", 0, 3, 300));
        let outcome = tracker.begin(invocation("B", 10, 3, 400));
        match outcome {
            BeginOutcome::Started(Some(closed)) => assert_eq!(closed.name, "A"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(tracker.lookup(&SourceLoc::new(0, 0)).is_some());
        assert!(tracker.is_expanding());
    }

    #[test]
    fn test_include_closes_expansion() {
        let mut tracker = MacroTracker::new(MacroReflowConfig::default());
        let _ = tracker.begin(invocation("HEADER", 9, 6, 0));
        let filename = SourceLoc::new(0, 9);
        let closed = tracker.note_inclusion(filename, "/src/foo.h").unwrap();
        assert_eq!(closed.symbol, "M_HEADER");
        let expanded = tracker.lookup(&SourceLoc::new(0, 9)).unwrap();
        assert_eq!(expanded.text, "\"/src/foo.h\"");
        assert_eq!(expanded.token_offsets[&filename], 0);
        assert!(tracker.note_inclusion(filename, "/src/foo.h").is_none());
    }

    #[test]
    fn test_reflow() {
        let (text, shift) = reflow("struct S{int a;int b;};f(a,b)");
        assert_eq!(text, "struct S{\nint a;\nint b;\n};\nf(a, b)");
        // `b` in `int b` moved by two inserted newlines.
        assert_eq!(shift[19], 21);
        assert_eq!(&text[shift[25]..shift[25] + 1], "a");
        assert_eq!(&text[shift[27]..shift[27] + 1], "b");

        let (text, _) = reflow("puts(\"a;b,{c}\");");
        assert_eq!(text, "puts(\"a;b,{c}\");");

        let (text, shift) = reflow("a; b");
        assert_eq!(text, "a;\nb");
        assert_eq!(shift[3], 3);
    }

    #[test]
    fn test_reflow_thresholds() {
        let config = MacroReflowConfig {
            enabled: true,
            header_threshold: 4,
            main_threshold: 100,
        };
        let mut tracker = MacroTracker::new(config);
        let mut header = invocation("H", 0, 3, 300);
        header.in_header = true;
        let _ = tracker.begin(header);
        tracker.on_token(&punct("a;", 0, 0));
        tracker.on_token(&punct("b;", 0, 1));
        tracker.close();
        assert_eq!(tracker.lookup(&SourceLoc::new(0, 0)).unwrap().text, "a;b;");

        let _ = tracker.begin(invocation("M", 10, 3, 300));
        tracker.on_token(&punct("a;", 10, 0));
        tracker.on_token(&punct("b;", 10, 1));
        tracker.close();
        assert_eq!(tracker.lookup(&SourceLoc::new(0, 10)).unwrap().text, "a;\nb;");
    }

    #[test]
    fn test_concat_avoidance() {
        let loc = SourceLoc::new(0, 0);
        let t = |kind, s| token(kind, s, loc);
        assert!(needs_space(&t(TokenKind::Keyword, "int"), &t(TokenKind::Identifier, "x")));
        assert!(!needs_space(&t(TokenKind::Identifier, "x"), &t(TokenKind::Punctuation, ";")));
        assert!(needs_space(&t(TokenKind::Punctuation, "-"), &t(TokenKind::Punctuation, ">")));
        assert!(needs_space(&t(TokenKind::Punctuation, "+"), &t(TokenKind::Punctuation, "+")));
        assert!(needs_space(&t(TokenKind::Punctuation, "/"), &t(TokenKind::Punctuation, "*")));
        assert!(!needs_space(&t(TokenKind::Punctuation, ")"), &t(TokenKind::Punctuation, "*")));
        assert!(needs_space(&t(TokenKind::Number, "1e"), &t(TokenKind::Punctuation, "+")));
    }

    #[test]
    fn test_header_like_paths() {
        assert!(is_header_like("/src/foo.h"));
        assert!(is_header_like("/src/FOO.HPP"));
        assert!(is_header_like("/src/list.def"));
        assert!(!is_header_like("/src/foo.cpp"));
        assert!(!is_header_like("/src/h"));
    }
}

//! Preprocessor callbacks and the lexed token stream, in the order the
//! front-end produced them.

use serde::{Deserialize, Serialize};

use super::source::{SourceLoc, SourceRange};

/// The macro definition a reference resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroRef {
    /// Location of the macro name in its `#define`
    pub definition: SourceLoc,
    /// Predefined by the compiler
    #[serde(default)]
    pub builtin: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MacroDirective {
    Undef,
    Defined,
    Ifdef,
    Ifndef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Identifier,
    Keyword,
    Number,
    Literal,
    Punctuation,
    /// A token standing for an already-parsed construct
    Annotation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub spelling: String,
    pub loc: SourceLoc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PpEvent {
    /// The lexer entered a file (main file or `#include`)
    FileEntered { loc: SourceLoc },
    /// An `#include` directive
    Inclusion {
        /// Range of the file name as written, quotes included
        filename_range: SourceRange,
        /// Absolute path the directive resolved to
        #[serde(default)]
        path: Option<String>,
    },
    MacroDefined {
        name: String,
        loc: SourceLoc,
        #[serde(default)]
        builtin: bool,
    },
    MacroExpands {
        name: String,
        /// Location of the macro name token
        loc: SourceLoc,
        /// Whole invocation, arguments included
        range: SourceRange,
        #[serde(default)]
        macro_def: Option<MacroRef>,
    },
    /// `#undef`, `defined()`, `#ifdef`, `#ifndef`
    MacroReferenced {
        directive: MacroDirective,
        name: String,
        loc: SourceLoc,
        #[serde(default)]
        macro_def: Option<MacroRef>,
    },
    Token(Token),
}

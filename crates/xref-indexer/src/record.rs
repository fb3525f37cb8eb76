//! Analysis records, one compact JSON object per line.
//!
//! Field order is the serialization order, so two runs over the same input
//! produce byte-identical lines and the merge step can deduplicate them by
//! plain string equality.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::IndexerError;

/// How an occurrence relates to its symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Def,
    Decl,
    Use,
    Forward,
    Alias,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Def => "def",
            Role::Decl => "decl",
            Role::Use => "use",
            Role::Forward => "forward",
            Role::Alias => "alias",
        }
    }
}

/// What kind of entity an occurrence names, as shown to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxKind {
    Function,
    Type,
    Variable,
    Namespace,
    Field,
    Enum,
    EnumConstant,
    Destructor,
    Constructor,
    Macro,
    File,
}

impl SyntaxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyntaxKind::Function => "function",
            SyntaxKind::Type => "type",
            SyntaxKind::Variable => "variable",
            SyntaxKind::Namespace => "namespace",
            SyntaxKind::Field => "field",
            SyntaxKind::Enum => "enum",
            SyntaxKind::EnumConstant => "enum constant",
            SyntaxKind::Destructor => "destructor",
            SyntaxKind::Constructor => "constructor",
            SyntaxKind::Macro => "macro",
            SyntaxKind::File => "file",
        }
    }
}

/// Emission flags of an occurrence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordFlags {
    /// Only a source record, with empty syntax. Used for locals.
    pub no_crossref: bool,
    /// The text at the location need not look like an identifier.
    pub not_identifier: bool,
    /// The end of the given range is meaningful; otherwise the token at the
    /// start is measured.
    pub range_end_valid: bool,
    /// Produced by heuristic template resolution.
    pub heuristic: bool,
}

impl RecordFlags {
    pub fn no_crossref() -> Self {
        Self {
            no_crossref: true,
            ..Self::default()
        }
    }

    pub fn heuristic() -> Self {
        Self {
            heuristic: true,
            ..Self::default()
        }
    }

    /// Non-identifier text with an explicit extent (files, literals).
    pub fn literal_range() -> Self {
        Self {
            not_identifier: true,
            range_end_valid: true,
            ..Self::default()
        }
    }
}

pub const HEURISTIC_CONFIDENCE: &str = "cppTemplateHeuristic";

/// Platform-keyed payloads. The key is empty here and filled in when
/// per-platform databases are combined.
pub type PlatformMap<T> = BTreeMap<String, T>;

/// Cross-reference target: "this symbol is defined/used here".
#[derive(Debug, Clone, Serialize)]
pub struct TargetRecord {
    pub loc: String,
    pub target: u8,
    pub kind: Role,
    pub pretty: String,
    pub sym: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contextsym: Option<String>,
    #[serde(rename = "peekRange", skip_serializing_if = "Option::is_none")]
    pub peek_range: Option<String>,
    #[serde(rename = "argRanges", skip_serializing_if = "Option::is_none")]
    pub arg_ranges: Option<Vec<String>>,
}

/// Source highlighting record for the token.
#[derive(Debug, Clone, Serialize)]
pub struct SourceRecord {
    pub loc: String,
    pub source: u8,
    #[serde(rename = "nestingRange", skip_serializing_if = "Option::is_none")]
    pub nesting_range: Option<String>,
    pub syntax: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub ty: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typesym: Option<String>,
    pub pretty: String,
    pub sym: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_crossref: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Vec<&'static str>>,
    #[serde(rename = "argRanges", skip_serializing_if = "Option::is_none")]
    pub arg_ranges: Option<Vec<String>>,
    #[serde(rename = "expandsTo", skip_serializing_if = "Option::is_none")]
    pub expands_to: Option<BTreeMap<String, PlatformMap<String>>>,
    #[serde(rename = "inExpansionAt", skip_serializing_if = "Option::is_none")]
    pub in_expansion_at: Option<BTreeMap<String, PlatformMap<Vec<usize>>>>,
}

/// Layout and signature metadata of a definition.
#[derive(Debug, Clone, Serialize)]
pub struct StructuredRecord {
    pub loc: String,
    pub structured: u8,
    pub pretty: String,
    pub sym: String,
    #[serde(flatten)]
    pub info: StructuredInfo,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum StructuredInfo {
    Record(RecordStructure),
    Function(FunctionStructure),
    /// Enums, enumerators, fields and variables
    Simple(SimpleStructure),
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordStructure {
    pub kind: &'static str,
    #[serde(rename = "sizeBytes", skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(rename = "alignmentBytes", skip_serializing_if = "Option::is_none")]
    pub alignment_bytes: Option<u64>,
    #[serde(rename = "ownVFPtrBytes", skip_serializing_if = "Option::is_none")]
    pub own_vfptr_bytes: Option<u64>,
    pub supers: Vec<SuperInfo>,
    pub methods: Vec<MethodInfo>,
    pub fields: Vec<FieldStructure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuperInfo {
    pub sym: String,
    #[serde(rename = "offsetBytes", skip_serializing_if = "Option::is_none")]
    pub offset_bytes: Option<u64>,
    pub props: Vec<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MethodInfo {
    pub pretty: String,
    pub sym: String,
    pub props: Vec<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldStructure {
    #[serde(rename = "lineRange")]
    pub line_range: String,
    pub pretty: String,
    pub sym: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typesym: Option<String>,
    #[serde(rename = "offsetBytes", skip_serializing_if = "Option::is_none")]
    pub offset_bytes: Option<u64>,
    #[serde(rename = "bitPositions", skip_serializing_if = "Option::is_none")]
    pub bit_positions: Option<BitPositions>,
    #[serde(rename = "sizeBytes", skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BitPositions {
    pub begin: u64,
    pub width: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArgInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typesym: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OverrideInfo {
    pub sym: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionStructure {
    pub args: Vec<ArgInfo>,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parentsym: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overrides: Option<Vec<OverrideInfo>>,
    pub props: Vec<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimpleStructure {
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parentsym: Option<String>,
}

/// Serialize a record as one newline-terminated line.
pub fn to_line<T: Serialize>(record: &T) -> Result<String, IndexerError> {
    let mut line = serde_json::to_string(record)?;
    line.push('\n');
    Ok(line)
}

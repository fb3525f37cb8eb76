//! Expressions and statements as handed over by the front-end.

use serde::{Deserialize, Serialize};

use super::decl::{DeclId, TypeRef};
use super::source::{SourceLoc, SourceRange};

/// Index of an expression in [`super::TranslationUnit::exprs`].
pub type ExprId = usize;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,

    /// The location a user would point at (callee name, member name, ...)
    pub loc: SourceLoc,

    #[serde(default)]
    pub range: Option<SourceRange>,

    /// Sub-expressions in evaluation order
    #[serde(default)]
    pub children: Vec<ExprId>,

    #[serde(default)]
    pub ty: Option<TypeRef>,

    /// Type depends on a template parameter
    #[serde(default)]
    pub type_dependent: bool,

    /// Compiler-generated
    #[serde(default)]
    pub implicit: bool,
}

impl Expr {
    pub fn new(kind: ExprKind, loc: SourceLoc) -> Self {
        Self {
            kind,
            loc,
            range: None,
            children: Vec::new(),
            ty: None,
            type_dependent: false,
            implicit: false,
        }
    }

    pub fn begin(&self) -> SourceLoc {
        self.range.map(|r| r.begin).unwrap_or(self.loc)
    }

    /// Sub-expressions visited by a depth-first traversal.
    pub fn sub_exprs(&self) -> Vec<ExprId> {
        match &self.kind {
            ExprKind::Call(call) => std::iter::once(call.callee)
                .chain(call.args.iter().copied())
                .chain(self.children.iter().copied())
                .collect(),
            ExprKind::Lambda(lambda) => self
                .children
                .iter()
                .copied()
                .chain(lambda.body)
                .collect(),
            _ => self.children.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExprKind {
    /// `{ ... }`; the range spans the braces
    Compound,
    Call(CallInfo),
    Construct(ConstructInfo),
    DeclRef(DeclRefInfo),
    Member(MemberInfo),
    /// `obj.name` / `ptr->name` where the object type is dependent
    DependentMember(DependentLookup),
    /// `T::name` where `T` is dependent
    DependentDeclRef(DependentScopeInfo),
    /// Unresolved reference to a set of overloads
    Overload(OverloadInfo),
    New(NewInfo),
    StringLiteral(StringLiteralInfo),
    Lambda(LambdaInfo),
    /// A type written in source
    TypeName(TypeNameKind),
    /// Declarations nested in a statement context
    DeclStmt(DeclStmtInfo),
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallInfo {
    pub callee: ExprId,
    #[serde(default)]
    pub args: Vec<ExprId>,
    /// Resolved target, when the front-end could resolve one
    #[serde(default)]
    pub callee_decl: Option<DeclId>,
    /// Location of the operator token for overloaded operator calls
    #[serde(default)]
    pub operator_loc: Option<SourceLoc>,
    #[serde(default)]
    pub return_type: Option<TypeRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstructInfo {
    pub constructor: DeclId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeclRefInfo {
    pub decl: DeclId,
    /// Location of the unqualified name when the reference is qualified
    #[serde(default)]
    pub name_loc: Option<SourceLoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberInfo {
    pub member: DeclId,
}

/// A name that could only be looked up once template arguments are known.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependentLookup {
    pub name: String,
    /// Record to search when the dependent type names a known template
    #[serde(default)]
    pub base: Option<DeclId>,
    /// Candidates the front-end already proposed
    #[serde(default)]
    pub candidates: Vec<DeclId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependentScopeInfo {
    pub lookup: DependentLookup,
    /// Locations of the dependent components of the qualifier
    #[serde(default)]
    pub qualifier_locs: Vec<SourceLoc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OverloadInfo {
    pub candidates: Vec<DeclId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInfo {
    /// Start of the allocated type as written
    pub type_loc: SourceLoc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StringLiteralInfo {
    pub value: String,
    /// Bytes per character; only narrow literals are indexed
    #[serde(default = "default_char_width")]
    pub char_width: u8,
}

fn default_char_width() -> u8 {
    1
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LambdaInfo {
    #[serde(default)]
    pub body: Option<ExprId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeNameKind {
    Tag(DeclId),
    Typedef(DeclId),
    InjectedClassName(DeclId),
    /// `Name<Args>`; refers to the template declaration
    TemplateSpecialization(DeclId),
    DependentName(DependentLookup),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeclStmtInfo {
    pub decls: Vec<DeclId>,
}

//! Declarations as handed over by the front-end.

use serde::{Deserialize, Serialize};

use super::source::{SourceLoc, SourceRange};
use super::ExprId;

/// Index of a declaration in [`super::TranslationUnit::decls`].
pub type DeclId = usize;

/// A named (or anonymous) declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decl {
    pub kind: DeclKind,

    /// Identifier; `None` for anonymous entities
    #[serde(default)]
    pub name: Option<String>,

    /// Location of the name
    pub loc: SourceLoc,

    /// Extent shown when peeking: the signature of a function, the head of a
    /// record or enum, the whole declaration otherwise
    #[serde(default)]
    pub range: Option<SourceRange>,

    /// Semantic parent
    #[serde(default)]
    pub parent: Option<DeclId>,

    /// Children traversed in order (record members, namespace contents, ...)
    #[serde(default)]
    pub members: Vec<DeclId>,

    /// Type names written in the declaration
    #[serde(default)]
    pub type_refs: Vec<ExprId>,

    /// Attached documentation comment
    #[serde(default)]
    pub comment: Option<SourceRange>,

    #[serde(default)]
    pub is_definition: bool,

    /// Compiler-generated
    #[serde(default)]
    pub implicit: bool,

    /// Declared inside a dependent (uninstantiated) template context
    #[serde(default)]
    pub templated: bool,

    /// ABI mangled name produced by the front-end
    #[serde(default)]
    pub mangled: Option<String>,
}

impl Decl {
    pub fn new(kind: DeclKind, name: Option<&str>, loc: SourceLoc) -> Self {
        Self {
            kind,
            name: name.map(str::to_string),
            loc,
            range: None,
            parent: None,
            members: Vec::new(),
            type_refs: Vec::new(),
            comment: None,
            is_definition: false,
            implicit: false,
            templated: false,
            mangled: None,
        }
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    pub fn is_anonymous(&self) -> bool {
        self.name.as_deref().map_or(true, str::is_empty)
    }

    pub fn as_function(&self) -> Option<&FunctionInfo> {
        match &self.kind {
            DeclKind::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&RecordInfo> {
        match &self.kind {
            DeclKind::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Short description used in error messages and logs.
    pub fn kind_name(&self) -> &'static str {
        self.kind.name()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclKind {
    Namespace(NamespaceInfo),
    NamespaceAlias,
    LinkageSpec,
    Record(RecordInfo),
    Enum(EnumInfo),
    EnumConstant,
    Typedef(TypedefInfo),
    Function(FunctionInfo),
    Field(FieldInfo),
    Var(VarInfo),
    ClassTemplate(ClassTemplateInfo),
    FunctionTemplate(FunctionTemplateInfo),
    AliasTemplate(AliasTemplateInfo),
    UsingShadow(UsingShadowInfo),
}

impl DeclKind {
    pub fn name(&self) -> &'static str {
        match self {
            DeclKind::Namespace(_) => "namespace",
            DeclKind::NamespaceAlias => "namespace alias",
            DeclKind::LinkageSpec => "linkage spec",
            DeclKind::Record(_) => "record",
            DeclKind::Enum(_) => "enum",
            DeclKind::EnumConstant => "enum constant",
            DeclKind::Typedef(_) => "typedef",
            DeclKind::Function(_) => "function",
            DeclKind::Field(_) => "field",
            DeclKind::Var(_) => "variable",
            DeclKind::ClassTemplate(_) => "class template",
            DeclKind::FunctionTemplate(_) => "function template",
            DeclKind::AliasTemplate(_) => "alias template",
            DeclKind::UsingShadow(_) => "using shadow",
        }
    }
}

/// A type as written, with the tag declarations it resolves to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeRef {
    /// Printed type
    pub spelling: String,
    /// Record/enum the type names directly
    #[serde(default)]
    pub tag: Option<DeclId>,
    /// Record/enum behind one level of pointer or reference
    #[serde(default)]
    pub pointee_tag: Option<DeclId>,
}

impl TypeRef {
    pub fn new(spelling: impl Into<String>) -> Self {
        Self {
            spelling: spelling.into(),
            tag: None,
            pointee_tag: None,
        }
    }

    pub fn with_tag(spelling: impl Into<String>, tag: DeclId) -> Self {
        Self {
            tag: Some(tag),
            ..Self::new(spelling)
        }
    }

    /// Tag the type refers to, looking through one pointer level.
    pub fn tag_or_pointee(&self) -> Option<DeclId> {
        self.tag.or(self.pointee_tag)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NamespaceInfo {
    #[serde(default)]
    pub inline: bool,
    /// `{` .. `}` of this namespace body
    #[serde(default)]
    pub braces: Option<SourceRange>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagKind {
    #[default]
    Struct,
    Class,
    Union,
}

impl TagKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TagKind::Struct => "struct",
            TagKind::Class => "class",
            TagKind::Union => "union",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseSpec {
    pub record: DeclId,
    #[serde(default, rename = "virtual")]
    pub is_virtual: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseOffset {
    pub record: DeclId,
    pub offset_bytes: u64,
}

/// ABI layout computed by the front-end.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordLayout {
    pub size_bytes: u64,
    pub align_bytes: u64,
    /// Size of the vtable pointer this record introduces itself
    #[serde(default)]
    pub own_vfptr_bytes: Option<u64>,
    #[serde(default)]
    pub base_offsets: Vec<BaseOffset>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecializationKind {
    #[default]
    Implicit,
    Explicit,
    ExplicitInstantiation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecializationInfo {
    /// The class template this record specializes
    pub template: DeclId,
    /// Printed argument list, e.g. `<int, 3>`
    pub args: String,
    #[serde(default)]
    pub kind: SpecializationKind,
    /// Pattern the record was instantiated from
    #[serde(default)]
    pub pattern: Option<DeclId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordInfo {
    #[serde(default)]
    pub tag: TagKind,
    #[serde(default)]
    pub bases: Vec<BaseSpec>,
    #[serde(default)]
    pub braces: Option<SourceRange>,
    #[serde(default)]
    pub layout: Option<RecordLayout>,
    #[serde(default)]
    pub specialization: Option<SpecializationInfo>,
    /// The implicit self-reference a class carries inside its own scope
    #[serde(default)]
    pub injected_class_name: bool,
    /// Depends on template parameters
    #[serde(default)]
    pub dependent: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnumInfo {
    #[serde(default)]
    pub scoped: bool,
    #[serde(default)]
    pub braces: Option<SourceRange>,
    #[serde(default)]
    pub dependent: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypedefInfo {
    pub underlying: TypeRef,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionRole {
    #[default]
    Plain,
    Method,
    Constructor,
    Destructor,
    Conversion,
}

/// A member initializer in a constructor's init list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CtorInitializer {
    /// Field being initialized (base initializers carry none)
    #[serde(default)]
    pub member: Option<DeclId>,
    pub loc: SourceLoc,
    /// Spelled in source rather than synthesized
    #[serde(default = "default_true")]
    pub written: bool,
    #[serde(default)]
    pub init: Option<ExprId>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionInfo {
    #[serde(default)]
    pub role: FunctionRole,
    #[serde(default)]
    pub params: Vec<DeclId>,
    /// Compound statement of the body
    #[serde(default)]
    pub body: Option<ExprId>,
    /// The redeclaration holding the body, when it is not this one
    #[serde(default)]
    pub definition: Option<DeclId>,
    #[serde(default)]
    pub return_type: Option<TypeRef>,
    #[serde(default)]
    pub initializers: Vec<CtorInitializer>,
    #[serde(default)]
    pub overrides: Vec<DeclId>,
    /// Declaration this one was instantiated from
    #[serde(default)]
    pub pattern: Option<DeclId>,
    /// Explicit specialization of a function template
    #[serde(default)]
    pub explicit_specialization: bool,
    /// Number of arguments a call needs; defaults to the parameters
    /// without default arguments
    #[serde(default)]
    pub min_args: Option<usize>,
    #[serde(default)]
    pub is_main: bool,
    #[serde(default)]
    pub extern_c: bool,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_virtual: bool,
    #[serde(default)]
    pub is_pure: bool,
    #[serde(default)]
    pub user_provided: bool,
    #[serde(default)]
    pub defaulted: bool,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub constexpr: bool,
    #[serde(default)]
    pub variadic: bool,
}

impl FunctionInfo {
    pub fn is_instantiation(&self) -> bool {
        self.pattern.is_some()
    }

    pub fn is_method(&self) -> bool {
        self.role != FunctionRole::Plain
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldInfo {
    pub ty: TypeRef,
    #[serde(default)]
    pub bit_width: Option<u32>,
    /// Offset from the start of the record, in bits
    #[serde(default)]
    pub offset_bits: Option<u64>,
    #[serde(default)]
    pub size_bytes: Option<u64>,
    /// Default member initializer
    #[serde(default)]
    pub init: Option<ExprId>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarScope {
    #[default]
    Global,
    StaticMember,
    Local,
    Param,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VarInfo {
    pub ty: TypeRef,
    #[serde(default)]
    pub scope: VarScope,
    #[serde(default)]
    pub init: Option<ExprId>,
    /// Function parameter pack
    #[serde(default)]
    pub pack: bool,
    /// Parameter with a default argument
    #[serde(default)]
    pub has_default: bool,
}

impl VarInfo {
    pub fn is_local(&self) -> bool {
        matches!(self.scope, VarScope::Local | VarScope::Param)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassTemplateInfo {
    /// Pattern record
    pub templated: DeclId,
    /// Redeclarations of each partial specialization
    #[serde(default)]
    pub partial_specializations: Vec<Vec<DeclId>>,
    /// Redeclarations of each specialization
    #[serde(default)]
    pub specializations: Vec<Vec<DeclId>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionTemplateInfo {
    /// Pattern function
    pub templated: DeclId,
    /// First declaration of the template
    #[serde(default = "default_true")]
    pub canonical: bool,
    /// Redeclarations of each specialization
    #[serde(default)]
    pub specializations: Vec<Vec<DeclId>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AliasTemplateInfo {
    pub templated: DeclId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsingShadowInfo {
    pub target: DeclId,
}

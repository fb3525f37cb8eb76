//! Structured metadata of definitions: record layout, members, signatures.
//!
//! Only reads what the front-end already computed; bodies are never walked.

use crate::location::{location_string, path_and_line_range_string, FileRegistry};
use crate::mangle::Mangler;
use crate::model::{
    DeclId, DeclKind, FunctionInfo, RecordInfo, SourceLoc, SourceManager, SourceRange,
    TranslationUnit, TypeRef, VarScope,
};
use crate::record::{
    ArgInfo, BitPositions, FieldStructure, FunctionStructure, MethodInfo, OverrideInfo,
    RecordStructure, SimpleStructure, StructuredInfo, StructuredRecord, SuperInfo,
};
use crate::IndexerError;

/// Whether `id` gets a structured record. Nothing inside a template frame
/// qualifies, and neither do dependent or templated declarations.
pub fn is_eligible(tu: &TranslationUnit, id: DeclId, in_template: bool) -> bool {
    if in_template {
        return false;
    }
    let decl = tu.decl(id);
    match &decl.kind {
        DeclKind::Record(r) => decl.is_definition && !r.dependent,
        DeclKind::Enum(e) => decl.is_definition && !e.dependent,
        DeclKind::EnumConstant | DeclKind::Field(_) | DeclKind::Var(_) => !decl.templated,
        DeclKind::Function(f) => {
            (decl.is_definition || f.is_pure)
                && !f.is_instantiation()
                && !f.explicit_specialization
        }
        _ => false,
    }
}

pub struct StructuredExtractor<'a> {
    tu: &'a TranslationUnit,
    sm: &'a SourceManager<'a>,
    registry: &'a FileRegistry<'a>,
    mangler: &'a Mangler<'a>,
}

impl<'a> StructuredExtractor<'a> {
    pub fn new(
        tu: &'a TranslationUnit,
        sm: &'a SourceManager<'a>,
        registry: &'a FileRegistry<'a>,
        mangler: &'a Mangler<'a>,
    ) -> Self {
        Self {
            tu,
            sm,
            registry,
            mangler,
        }
    }

    /// Structured record for the declaration named at `loc`. `None` when the
    /// declaration kind carries no structure or the location is unmapped.
    pub fn extract(
        &self,
        loc: &SourceLoc,
        id: DeclId,
    ) -> Result<Option<StructuredRecord>, IndexerError> {
        let decl = self.tu.decl(id);
        let info = match &decl.kind {
            DeclKind::Record(r) => StructuredInfo::Record(self.record(loc, id, r)?),
            DeclKind::Enum(_) => simple("enum", None),
            DeclKind::EnumConstant => simple("enumConstant", None),
            DeclKind::Function(f) => StructuredInfo::Function(self.function(id, f)?),
            DeclKind::Field(_) => {
                let parentsym = decl.parent.map(|p| self.mangler.symbol(p)).transpose()?;
                simple("field", parentsym)
            }
            DeclKind::Var(v) => {
                let record_parent = decl
                    .parent
                    .filter(|&p| matches!(self.tu.decl(p).kind, DeclKind::Record(_)));
                let kind = if record_parent.is_some() || v.scope == VarScope::StaticMember {
                    "field"
                } else {
                    match v.scope {
                        VarScope::Param => "parameter",
                        VarScope::Local => "localVar",
                        _ => "variable",
                    }
                };
                let parentsym = record_parent.map(|p| self.mangler.symbol(p)).transpose()?;
                simple(kind, parentsym)
            }
            _ => return Ok(None),
        };

        let Some(loc_str) = location_string(self.sm, loc, self.sm.token_length(loc)) else {
            return Ok(None);
        };
        Ok(Some(StructuredRecord {
            loc: loc_str,
            structured: 1,
            pretty: self.mangler.qualified_name(id),
            sym: self.mangler.symbol(id)?,
            info,
        }))
    }

    fn typesym(&self, ty: &TypeRef) -> Result<Option<String>, IndexerError> {
        ty.tag_or_pointee()
            .map(|tag| self.mangler.symbol(tag))
            .transpose()
    }

    fn record(
        &self,
        loc: &SourceLoc,
        id: DeclId,
        info: &RecordInfo,
    ) -> Result<RecordStructure, IndexerError> {
        let decl = self.tu.decl(id);
        let layout = info.layout.as_ref();

        let mut supers = Vec::with_capacity(info.bases.len());
        for base in &info.bases {
            let offset_bytes = layout.and_then(|l| {
                l.base_offsets
                    .iter()
                    .find(|o| o.record == base.record)
                    .map(|o| o.offset_bytes)
            });
            supers.push(SuperInfo {
                sym: self.mangler.symbol(base.record)?,
                offset_bytes,
                props: if base.is_virtual { vec!["virtual"] } else { Vec::new() },
            });
        }

        let mut methods = Vec::new();
        let mut fields = Vec::new();
        for &member in &decl.members {
            let member_decl = self.tu.decl(member);
            match &member_decl.kind {
                DeclKind::Function(f) if f.is_method() => methods.push(MethodInfo {
                    pretty: self.mangler.qualified_name(member),
                    sym: self.mangler.symbol(member)?,
                    props: method_props(f),
                }),
                DeclKind::Field(field) => {
                    let range = member_decl
                        .range
                        .unwrap_or_else(|| SourceRange::point(member_decl.loc));
                    let range =
                        SourceRange::new(range.begin.expansion(), range.end.expansion());
                    let line_range =
                        path_and_line_range_string(self.sm, self.registry, loc.file, &range)
                            .unwrap_or_default();
                    let offset_bytes = field.offset_bits.map(|bits| bits / 8);
                    let bit_positions = match (field.bit_width, field.offset_bits) {
                        (Some(width), Some(bits)) => Some(BitPositions {
                            begin: bits - (bits / 8) * 8,
                            width,
                        }),
                        _ => None,
                    };
                    fields.push(FieldStructure {
                        line_range,
                        pretty: self.mangler.qualified_name(member),
                        sym: self.mangler.symbol(member)?,
                        ty: field.ty.spelling.clone(),
                        typesym: self.typesym(&field.ty)?,
                        offset_bytes,
                        size_bytes: if field.bit_width.is_some() {
                            None
                        } else {
                            field.size_bytes
                        },
                        bit_positions,
                    });
                }
                _ => {}
            }
        }

        Ok(RecordStructure {
            kind: info.tag.as_str(),
            size_bytes: layout.map(|l| l.size_bytes),
            alignment_bytes: layout.map(|l| l.align_bytes),
            own_vfptr_bytes: layout.and_then(|l| l.own_vfptr_bytes),
            supers,
            methods,
            fields,
        })
    }

    fn function(&self, id: DeclId, info: &FunctionInfo) -> Result<FunctionStructure, IndexerError> {
        let decl = self.tu.decl(id);

        let mut args = Vec::with_capacity(info.params.len());
        for &param in &info.params {
            let param_decl = self.tu.decl(param);
            let DeclKind::Var(var) = &param_decl.kind else {
                continue;
            };
            args.push(ArgInfo {
                name: param_decl.name().to_string(),
                ty: var.ty.spelling.clone(),
                typesym: self.typesym(&var.ty)?,
            });
        }

        if !info.is_method() {
            return Ok(FunctionStructure {
                args,
                kind: "function",
                parentsym: None,
                overrides: None,
                props: function_props(info),
            });
        }

        let parentsym = decl.parent.map(|p| self.mangler.symbol(p)).transpose()?;
        let overrides = info
            .overrides
            .iter()
            .map(|&o| self.mangler.symbol(o).map(|sym| OverrideInfo { sym }))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(FunctionStructure {
            args,
            kind: "method",
            parentsym,
            overrides: Some(overrides),
            props: method_props(info),
        })
    }
}

fn simple(kind: &'static str, parentsym: Option<String>) -> StructuredInfo {
    StructuredInfo::Simple(SimpleStructure { kind, parentsym })
}

fn method_props(f: &FunctionInfo) -> Vec<&'static str> {
    let mut props = Vec::new();
    if f.is_static {
        props.push("static");
    } else {
        props.push("instance");
    }
    if f.is_virtual {
        props.push("virtual");
    }
    if f.user_provided {
        props.push("user");
    }
    props.extend(function_props(f));
    props
}

fn function_props(f: &FunctionInfo) -> Vec<&'static str> {
    let mut props = Vec::new();
    if f.defaulted {
        props.push("defaulted");
    }
    if f.deleted {
        props.push("deleted");
    }
    if f.constexpr {
        props.push("constexpr");
    }
    props
}

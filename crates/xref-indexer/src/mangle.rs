//! Deterministic symbol identifiers.
//!
//! A symbol depends only on the declaration's identity: its qualified name,
//! the ABI name the front-end computed, or the position it was declared at.
//! Two runs over the same header from different translation units therefore
//! agree on every symbol.

use sha2::{Digest, Sha256};

use crate::location::{location_string, FileInfo, FileRegistry, FileType};
use crate::model::{
    DeclId, DeclKind, SourceLoc, SourceManager, SpecializationKind, TranslationUnit,
};
use crate::IndexerError;

/// Short stable hash used inside symbols.
pub fn hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let result = hasher.finalize();
    format!("{:x}", result)[..16].to_string()
}

fn is_acceptable_symbol_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '/'
}

/// Sanitize a path so it can be embedded in a symbol.
///
/// Alphanumerics, `_` and `/` survive; every other byte becomes `@XX`.
/// Since `@` itself is always encoded, distinct paths stay distinct.
pub fn mangle_file(name: &str, file_type: FileType, platform: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if is_acceptable_symbol_char(c) {
            out.push(c);
        } else {
            let mut buf = [0u8; 4];
            for b in c.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("@{:02X}", b));
            }
        }
    }
    if file_type == FileType::Generated {
        format!("{platform}@{out}")
    } else {
        out
    }
}

/// `FILE_` symbol of a classified file.
pub fn file_symbol(info: &FileInfo, platform: &str) -> String {
    format!("FILE_{}", mangle_file(&info.realname, info.file_type, platform))
}

/// `URL_` symbol of a URL found in a string literal.
pub fn url_symbol(url: &str) -> String {
    format!("URL_{}", mangle_file(url, FileType::Source, ""))
}

fn mangle_qualified_name(name: &str) -> String {
    name.replace(' ', "_")
}

/// Computes symbols for the declarations of one translation unit.
pub struct Mangler<'m> {
    tu: &'m TranslationUnit,
    sm: &'m SourceManager<'m>,
    registry: &'m FileRegistry<'m>,
    platform: &'m str,
}

impl<'m> Mangler<'m> {
    pub fn new(
        tu: &'m TranslationUnit,
        sm: &'m SourceManager<'m>,
        registry: &'m FileRegistry<'m>,
        platform: &'m str,
    ) -> Self {
        Self {
            tu,
            sm,
            registry,
            platform,
        }
    }

    fn file_key(&self, loc: &SourceLoc) -> Option<String> {
        let info = self.registry.info(loc.file);
        if info.realname.is_empty() {
            return None;
        }
        let position = location_string(self.sm, loc, 0)?;
        let file = if info.is_generated() {
            format!("{}@{}", self.platform, info.realname)
        } else {
            info.realname.clone()
        };
        Some(format!("{file}@{position}"))
    }

    /// Hash of a declaration position.
    ///
    /// Positions inside macro expansions combine the expansion site with the
    /// spelling position, so one macro body expanded twice yields two
    /// symbols. When the position has no usable file, `backup` is returned
    /// as is (if non-empty).
    pub fn location_hash(&self, loc: &SourceLoc, backup: &str) -> String {
        let key = if loc.is_macro() {
            match (self.file_key(&loc.expansion()), self.file_key(&loc.spelling())) {
                (Some(site), Some(spelling)) => Some(format!("{site}@{spelling}")),
                (site, spelling) => site.or(spelling),
            }
        } else {
            self.file_key(loc)
        };
        match key {
            Some(key) => hash(&key),
            None if !backup.is_empty() => backup.to_string(),
            None => hash("@"),
        }
    }

    /// `M_` symbol of a macro defined at `definition`.
    pub fn macro_symbol(&self, definition: &SourceLoc, name: &str) -> String {
        format!("M_{}", self.location_hash(definition, name))
    }

    /// `::`-joined name, skipping anonymous and inline namespaces and
    /// unscoped anonymous enums.
    pub fn qualified_name(&self, id: DeclId) -> String {
        let decl = self.tu.decl(id);
        let mut parts: Vec<String> = Vec::new();
        let mut ctx = decl.parent;

        while let Some(parent_id) = ctx {
            let parent = self.tu.decl(parent_id);
            match &parent.kind {
                DeclKind::LinkageSpec => break,
                DeclKind::Namespace(ns) => {
                    if !parent.is_anonymous() && !ns.inline {
                        parts.push(parent.name().to_string());
                    }
                }
                DeclKind::Record(record) => {
                    let mut part = if parent.is_anonymous() {
                        "(anonymous)".to_string()
                    } else {
                        parent.name().to_string()
                    };
                    if let Some(spec) = &record.specialization {
                        if spec.kind == SpecializationKind::Explicit {
                            part.push_str(&spec.args);
                        }
                    }
                    parts.push(part);
                }
                DeclKind::Enum(e) => {
                    if e.scoped || !parent.is_anonymous() {
                        parts.push(parent.name().to_string());
                    }
                }
                _ => parts.push(parent.name().to_string()),
            }
            ctx = parent.parent;
        }

        parts.reverse();
        parts.push(if decl.is_anonymous() {
            "(anonymous)".to_string()
        } else {
            decl.name().to_string()
        });
        parts.join("::")
    }

    /// Symbol of a declaration.
    ///
    /// Templates, using-shadows and linkage specs have no symbol of their
    /// own; callers unwrap them first. Asking for one is a contract violation.
    pub fn symbol(&self, id: DeclId) -> Result<String, IndexerError> {
        let decl = self.tu.decl(id);
        let violation = |reason: &'static str| IndexerError::Mangle {
            decl: id,
            kind: decl.kind_name(),
            reason,
        };

        match &decl.kind {
            DeclKind::Function(f) if f.is_main => {
                Ok(format!("MF_{}", self.location_hash(&decl.loc, "")))
            }
            DeclKind::Function(f) if f.extern_c => Ok(decl.name().to_string()),
            DeclKind::Function(_) | DeclKind::Var(_) => {
                let abi_scope = match decl.parent {
                    None => true,
                    Some(parent) => matches!(
                        self.tu.decl(parent).kind,
                        DeclKind::Namespace(_)
                            | DeclKind::LinkageSpec
                            | DeclKind::Record(_)
                            | DeclKind::Enum(_)
                    ),
                };
                if abi_scope {
                    decl.mangled
                        .clone()
                        .filter(|m| !m.is_empty())
                        .ok_or_else(|| violation("missing ABI mangled name"))
                } else {
                    Ok(format!(
                        "V_{}_{}",
                        self.location_hash(&decl.loc, ""),
                        hash(decl.name())
                    ))
                }
            }
            DeclKind::Record(_) | DeclKind::Enum(_) => Ok(self.named_symbol("T_", id)),
            DeclKind::Typedef(_) => Ok(self.named_symbol("TA_", id)),
            DeclKind::Namespace(_) | DeclKind::NamespaceAlias => Ok(self.named_symbol("NS_", id)),
            DeclKind::Field(_) => {
                let parent = decl.parent.ok_or_else(|| violation("field without a record"))?;
                Ok(format!("F_<{}>_{}", self.symbol(parent)?, decl.name()))
            }
            DeclKind::EnumConstant => {
                let parent = decl
                    .parent
                    .ok_or_else(|| violation("enumerator without an enum"))?;
                Ok(format!("E_<{}>_{}", self.symbol(parent)?, decl.name()))
            }
            DeclKind::LinkageSpec
            | DeclKind::ClassTemplate(_)
            | DeclKind::FunctionTemplate(_)
            | DeclKind::AliasTemplate(_)
            | DeclKind::UsingShadow(_) => Err(violation("no symbol category")),
        }
    }

    fn named_symbol(&self, prefix: &str, id: DeclId) -> String {
        let decl = self.tu.decl(id);
        if decl.is_anonymous() {
            format!("{prefix}{}", self.location_hash(&decl.loc, ""))
        } else {
            format!("{prefix}{}", mangle_qualified_name(&self.qualified_name(id)))
        }
    }
}

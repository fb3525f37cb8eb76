//! Input model: one parsed translation unit.
//!
//! The front-end (type checking, overload resolution, layout and ABI
//! mangling) is external. It hands the engine arenas of declarations and
//! expressions addressed by id, the text of every file and the ordered
//! stream of preprocessor events.

mod decl;
mod expr;
mod pp;
mod source;

pub use decl::*;
pub use expr::*;
pub use pp::*;
pub use source::*;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::IndexerError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranslationUnit {
    /// The file compiled
    pub main_file: FileId,
    pub files: Vec<SourceFile>,
    #[serde(default)]
    pub decls: Vec<Decl>,
    #[serde(default)]
    pub exprs: Vec<Expr>,
    /// Declarations directly under the translation unit, in source order
    #[serde(default)]
    pub top_level: Vec<DeclId>,
    #[serde(default)]
    pub preprocessor: Vec<PpEvent>,
}

impl TranslationUnit {
    /// Read a unit dumped as JSON by the front-end.
    pub fn from_json_file(path: &Path) -> Result<Self, IndexerError> {
        let content = std::fs::read_to_string(path)?;
        let unit: TranslationUnit = serde_json::from_str(&content)?;
        unit.validate()?;
        Ok(unit)
    }

    pub fn add_file(&mut self, file: SourceFile) -> FileId {
        self.files.push(file);
        (self.files.len() - 1) as FileId
    }

    pub fn add_decl(&mut self, decl: Decl) -> DeclId {
        self.decls.push(decl);
        self.decls.len() - 1
    }

    pub fn add_expr(&mut self, expr: Expr) -> ExprId {
        self.exprs.push(expr);
        self.exprs.len() - 1
    }

    pub fn decl(&self, id: DeclId) -> &Decl {
        &self.decls[id]
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id]
    }

    pub fn decl_mut(&mut self, id: DeclId) -> &mut Decl {
        &mut self.decls[id]
    }

    pub fn expr_mut(&mut self, id: ExprId) -> &mut Expr {
        &mut self.exprs[id]
    }

    /// Check that every id and file reference points into the arenas.
    ///
    /// The engine indexes the arenas directly afterwards.
    pub fn validate(&self) -> Result<(), IndexerError> {
        let files = self.files.len();
        let check_file = |loc: &SourceLoc, what: &str| -> Result<(), IndexerError> {
            let origin_ok = loc
                .macro_origin
                .map_or(true, |o| (o.site.file as usize) < files);
            if (loc.file as usize) < files && origin_ok {
                Ok(())
            } else {
                Err(IndexerError::InvalidInput(format!(
                    "{what} refers to unknown file {}",
                    loc.file
                )))
            }
        };
        let check_decl = |id: DeclId, what: &str| -> Result<(), IndexerError> {
            if id < self.decls.len() {
                Ok(())
            } else {
                Err(IndexerError::InvalidInput(format!(
                    "{what} refers to unknown declaration #{id}"
                )))
            }
        };
        let check_expr = |id: ExprId, what: &str| -> Result<(), IndexerError> {
            if id < self.exprs.len() {
                Ok(())
            } else {
                Err(IndexerError::InvalidInput(format!(
                    "{what} refers to unknown expression #{id}"
                )))
            }
        };

        if (self.main_file as usize) >= files {
            return Err(IndexerError::InvalidInput(format!(
                "main file {} is not in the file table",
                self.main_file
            )));
        }

        for &id in &self.top_level {
            check_decl(id, "translation unit")?;
        }

        for (id, decl) in self.decls.iter().enumerate() {
            let what = format!("declaration #{id}");
            check_file(&decl.loc, &what)?;
            for child in decl.members.iter().chain(decl.parent.iter()) {
                check_decl(*child, &what)?;
            }
            for e in &decl.type_refs {
                check_expr(*e, &what)?;
            }
            for d in decl_refs(&decl.kind) {
                check_decl(d, &what)?;
            }
            for e in decl_exprs(&decl.kind) {
                check_expr(e, &what)?;
            }
        }

        for (id, expr) in self.exprs.iter().enumerate() {
            let what = format!("expression #{id}");
            check_file(&expr.loc, &what)?;
            for e in expr.sub_exprs() {
                check_expr(e, &what)?;
            }
            for d in expr_decl_refs(&expr.kind) {
                check_decl(d, &what)?;
            }
        }

        self.check_parent_chains()?;
        self.check_containment()?;

        for event in &self.preprocessor {
            let loc = match event {
                PpEvent::FileEntered { loc } => loc,
                PpEvent::Inclusion { filename_range, .. } => &filename_range.begin,
                PpEvent::MacroDefined { loc, .. } => loc,
                PpEvent::MacroExpands { loc, .. } => loc,
                PpEvent::MacroReferenced { loc, .. } => loc,
                PpEvent::Token(token) => &token.loc,
            };
            check_file(loc, "preprocessor event")?;
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    Fresh,
    Open,
    Done,
}

#[derive(Debug, Clone, Copy)]
enum Node {
    Decl(DeclId),
    Expr(ExprId),
}

impl TranslationUnit {
    /// Every `parent` chain must end at the translation unit.
    fn check_parent_chains(&self) -> Result<(), IndexerError> {
        let mut state = vec![Visit::Fresh; self.decls.len()];
        for start in 0..self.decls.len() {
            let mut path = Vec::new();
            let mut current = Some(start);
            while let Some(id) = current {
                match state[id] {
                    Visit::Done => break,
                    Visit::Open => {
                        return Err(IndexerError::InvalidInput(format!(
                            "declaration #{id} is its own ancestor"
                        )))
                    }
                    Visit::Fresh => {
                        state[id] = Visit::Open;
                        path.push(id);
                        current = self.decls[id].parent;
                    }
                }
            }
            for id in path {
                state[id] = Visit::Done;
            }
        }
        Ok(())
    }

    /// The declarations and expressions the traversal descends into must
    /// form a forest.
    fn check_containment(&self) -> Result<(), IndexerError> {
        let mut decls = vec![Visit::Fresh; self.decls.len()];
        let mut exprs = vec![Visit::Fresh; self.exprs.len()];

        let roots = (0..self.decls.len())
            .map(Node::Decl)
            .chain((0..self.exprs.len()).map(Node::Expr));
        for root in roots {
            let state = match root {
                Node::Decl(id) => &mut decls[id],
                Node::Expr(id) => &mut exprs[id],
            };
            if *state != Visit::Fresh {
                continue;
            }
            *state = Visit::Open;
            // (node, children, next child)
            let mut stack: Vec<(Node, Vec<Node>, usize)> = vec![(root, self.contained(root), 0)];

            while let Some((node, children, next)) = stack.last_mut() {
                let Some(&child) = children.get(*next) else {
                    match *node {
                        Node::Decl(id) => decls[id] = Visit::Done,
                        Node::Expr(id) => exprs[id] = Visit::Done,
                    }
                    stack.pop();
                    continue;
                };
                *next += 1;

                let state = match child {
                    Node::Decl(id) => &mut decls[id],
                    Node::Expr(id) => &mut exprs[id],
                };
                match *state {
                    Visit::Done => {}
                    Visit::Open => {
                        let what = match child {
                            Node::Decl(id) => format!("declaration #{id}"),
                            Node::Expr(id) => format!("expression #{id}"),
                        };
                        return Err(IndexerError::InvalidInput(format!(
                            "{what} contains itself"
                        )));
                    }
                    Visit::Fresh => {
                        *state = Visit::Open;
                        let grandchildren = self.contained(child);
                        stack.push((child, grandchildren, 0));
                    }
                }
            }
        }
        Ok(())
    }

    /// Nodes the traversal descends into from `node`.
    fn contained(&self, node: Node) -> Vec<Node> {
        match node {
            Node::Decl(id) => {
                let decl = &self.decls[id];
                let mut children: Vec<Node> = decl.members.iter().map(|&d| Node::Decl(d)).collect();
                let nested: Vec<DeclId> = match &decl.kind {
                    DeclKind::Function(f) => f.params.clone(),
                    DeclKind::ClassTemplate(t) => std::iter::once(t.templated)
                        .chain(t.partial_specializations.iter().flatten().copied())
                        .chain(t.specializations.iter().flatten().copied())
                        .collect(),
                    DeclKind::FunctionTemplate(t) => std::iter::once(t.templated)
                        .chain(t.specializations.iter().flatten().copied())
                        .collect(),
                    DeclKind::AliasTemplate(t) => vec![t.templated],
                    _ => Vec::new(),
                };
                children.extend(nested.into_iter().map(Node::Decl));
                children.extend(decl.type_refs.iter().map(|&e| Node::Expr(e)));
                children.extend(decl_exprs(&decl.kind).into_iter().map(Node::Expr));
                children
            }
            Node::Expr(id) => {
                let expr = &self.exprs[id];
                let mut children: Vec<Node> = expr.sub_exprs().into_iter().map(Node::Expr).collect();
                if let ExprKind::DeclStmt(stmt) = &expr.kind {
                    children.extend(stmt.decls.iter().map(|&d| Node::Decl(d)));
                }
                children
            }
        }
    }
}

fn decl_refs(kind: &DeclKind) -> Vec<DeclId> {
    match kind {
        DeclKind::Record(r) => {
            let mut ids: Vec<DeclId> = r.bases.iter().map(|b| b.record).collect();
            if let Some(layout) = &r.layout {
                ids.extend(layout.base_offsets.iter().map(|b| b.record));
            }
            if let Some(spec) = &r.specialization {
                ids.push(spec.template);
                ids.extend(spec.pattern);
            }
            ids
        }
        DeclKind::Function(f) => f
            .params
            .iter()
            .chain(f.overrides.iter())
            .copied()
            .chain(f.definition)
            .chain(f.pattern)
            .chain(f.initializers.iter().filter_map(|i| i.member))
            .collect(),
        DeclKind::ClassTemplate(t) => std::iter::once(t.templated)
            .chain(t.partial_specializations.iter().flatten().copied())
            .chain(t.specializations.iter().flatten().copied())
            .collect(),
        DeclKind::FunctionTemplate(t) => std::iter::once(t.templated)
            .chain(t.specializations.iter().flatten().copied())
            .collect(),
        DeclKind::AliasTemplate(t) => vec![t.templated],
        DeclKind::UsingShadow(u) => vec![u.target],
        _ => Vec::new(),
    }
}

fn decl_exprs(kind: &DeclKind) -> Vec<ExprId> {
    match kind {
        DeclKind::Function(f) => f
            .body
            .into_iter()
            .chain(f.initializers.iter().filter_map(|i| i.init))
            .collect(),
        DeclKind::Field(f) => f.init.into_iter().collect(),
        DeclKind::Var(v) => v.init.into_iter().collect(),
        _ => Vec::new(),
    }
}

fn expr_decl_refs(kind: &ExprKind) -> Vec<DeclId> {
    let lookup = |l: &DependentLookup| -> Vec<DeclId> {
        l.base.into_iter().chain(l.candidates.iter().copied()).collect()
    };
    match kind {
        ExprKind::Call(c) => c.callee_decl.into_iter().collect(),
        ExprKind::Construct(c) => vec![c.constructor],
        ExprKind::DeclRef(d) => vec![d.decl],
        ExprKind::Member(m) => vec![m.member],
        ExprKind::DependentMember(l) => lookup(l),
        ExprKind::DependentDeclRef(d) => lookup(&d.lookup),
        ExprKind::Overload(o) => o.candidates.clone(),
        ExprKind::TypeName(TypeNameKind::Tag(d))
        | ExprKind::TypeName(TypeNameKind::Typedef(d))
        | ExprKind::TypeName(TypeNameKind::InjectedClassName(d))
        | ExprKind::TypeName(TypeNameKind::TemplateSpecialization(d)) => vec![*d],
        ExprKind::TypeName(TypeNameKind::DependentName(l)) => lookup(l),
        ExprKind::DeclStmt(s) => s.decls.clone(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_dangling_ids() {
        let mut unit = TranslationUnit::default();
        let file = unit.add_file(SourceFile::new("/src/a.cpp", "int x;"));
        let decl = unit.add_decl(Decl::new(
            DeclKind::Var(VarInfo::default()),
            Some("x"),
            SourceLoc::new(file, 4),
        ));
        unit.top_level.push(decl);
        assert!(unit.validate().is_ok());

        unit.decl_mut(decl).members.push(42);
        let err = unit.validate().unwrap_err();
        assert!(err.to_string().contains("#42"));
    }

    #[test]
    fn test_validate_rejects_parent_cycle() {
        let mut unit = TranslationUnit::default();
        let file = unit.add_file(SourceFile::new("/src/a.cpp", "struct S {};"));
        let outer = unit.add_decl(Decl::new(
            DeclKind::Record(RecordInfo::default()),
            Some("S"),
            SourceLoc::new(file, 7),
        ));
        unit.top_level.push(outer);
        unit.decl_mut(outer).parent = Some(outer);

        let err = unit.validate().unwrap_err();
        assert!(matches!(err, IndexerError::InvalidInput(_)));
        assert!(err.to_string().contains("own ancestor"));

        // A longer loop through a second declaration.
        let inner = unit.add_decl(Decl::new(
            DeclKind::Record(RecordInfo::default()),
            Some("T"),
            SourceLoc::new(file, 7),
        ));
        unit.decl_mut(outer).parent = Some(inner);
        unit.decl_mut(inner).parent = Some(outer);
        assert!(unit.validate().is_err());

        unit.decl_mut(inner).parent = None;
        assert!(unit.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_member_cycle() {
        let mut unit = TranslationUnit::default();
        let file = unit.add_file(SourceFile::new("/src/a.cpp", "namespace a { namespace b {} }"));
        let a = unit.add_decl(Decl::new(
            DeclKind::Namespace(NamespaceInfo::default()),
            Some("a"),
            SourceLoc::new(file, 10),
        ));
        let b = unit.add_decl(Decl::new(
            DeclKind::Namespace(NamespaceInfo::default()),
            Some("b"),
            SourceLoc::new(file, 24),
        ));
        unit.top_level.push(a);
        unit.decl_mut(a).members.push(b);
        unit.decl_mut(b).parent = Some(a);
        assert!(unit.validate().is_ok());

        unit.decl_mut(b).members.push(a);
        let err = unit.validate().unwrap_err();
        assert!(err.to_string().contains("contains itself"));
    }

    #[test]
    fn test_validate_rejects_expression_cycle() {
        let mut unit = TranslationUnit::default();
        let file = unit.add_file(SourceFile::new("/src/a.cpp", "void f() {}"));
        let body = unit.add_expr(Expr::new(ExprKind::Compound, SourceLoc::new(file, 9)));
        let inner = unit.add_expr(Expr::new(ExprKind::Compound, SourceLoc::new(file, 9)));
        unit.expr_mut(body).children.push(inner);
        unit.expr_mut(inner).children.push(body);
        assert!(matches!(
            unit.validate(),
            Err(IndexerError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_validate_rejects_unknown_file() {
        let mut unit = TranslationUnit::default();
        unit.add_file(SourceFile::new("/src/a.cpp", ""));
        unit.preprocessor.push(PpEvent::FileEntered {
            loc: SourceLoc::new(3, 0),
        });
        assert!(matches!(
            unit.validate(),
            Err(IndexerError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_json_round_trip_of_events() {
        let event = PpEvent::MacroExpands {
            name: "SQ".to_string(),
            loc: SourceLoc::new(0, 10),
            range: SourceRange::new(SourceLoc::new(0, 10), SourceLoc::new(0, 14)),
            macro_def: Some(MacroRef {
                definition: SourceLoc::new(0, 8),
                builtin: false,
            }),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"macro_expands\""));
        let parsed: PpEvent = serde_json::from_str(&json).unwrap();
        assert!(matches!(parsed, PpEvent::MacroExpands { name, .. } if name == "SQ"));
    }
}

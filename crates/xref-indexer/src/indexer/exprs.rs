//! Expression traversal: calls, references, constructions, literals and the
//! heuristic fallback for names inside templates.

use crate::context::Context;
use crate::heuristic::HeuristicResolver;
use crate::location::FileType;
use crate::mangle::{mangle_file, url_symbol};
use crate::model::{DeclId, DeclKind, ExprId, ExprKind, SourceLoc, SourceRange, TypeNameKind};
use crate::record::{RecordFlags, Role, SyntaxKind};
use crate::IndexerError;

use super::emit::Occurrence;
use super::Indexer;

impl<'a> Indexer<'a> {
    pub(crate) fn traverse_exprs(&mut self, ids: &[ExprId]) -> Result<(), IndexerError> {
        for &id in ids {
            self.traverse_expr(id)?;
        }
        Ok(())
    }

    pub(crate) fn traverse_expr(&mut self, id: ExprId) -> Result<(), IndexerError> {
        let tu = self.tu;
        let expr = tu.expr(id);
        if expr.implicit && !self.context.visit_implicit() {
            return Ok(());
        }

        match &expr.kind {
            ExprKind::Call(_) => {
                let saved = self.current_call.replace(id);
                let result = self
                    .visit_call(id)
                    .and_then(|()| self.traverse_exprs(&expr.sub_exprs()));
                self.current_call = saved;
                return result;
            }
            ExprKind::Lambda(_) => {
                self.context.push(None, true);
                let result = self.traverse_exprs(&expr.sub_exprs());
                self.context.pop();
                return result;
            }
            ExprKind::DeclStmt(stmt) => {
                for &decl in &stmt.decls {
                    self.traverse_decl(decl)?;
                }
            }
            ExprKind::Construct(_) => self.visit_construct(id)?,
            ExprKind::DeclRef(_) => self.visit_decl_ref(id)?,
            ExprKind::Member(_) => self.visit_member(id)?,
            ExprKind::Overload(_) | ExprKind::DependentMember(_) | ExprKind::DependentDeclRef(_) => {
                self.visit_dependent_ref(id)?
            }
            ExprKind::New(new) => {
                if self.templates.in_gather_mode() && expr.type_dependent {
                    self.templates.visit_dependent(new.type_loc.expansion());
                    self.forwarding.mark_location(new.type_loc);
                }
            }
            ExprKind::StringLiteral(_) => self.visit_string_literal(id)?,
            ExprKind::TypeName(_) => self.visit_type_name(id)?,
            ExprKind::Compound | ExprKind::Other => {}
        }

        self.traverse_exprs(&expr.sub_exprs())
    }

    /// Arguments of the enclosing call when `id` is its callee.
    fn call_arity(&self, id: ExprId) -> Option<usize> {
        let call = self.current_call?;
        match &self.tu.expr(call).kind {
            ExprKind::Call(info) if info.callee == id => Some(info.args.len()),
            _ => None,
        }
    }

    fn visit_call(&mut self, id: ExprId) -> Result<(), IndexerError> {
        let tu = self.tu;
        let expr = tu.expr(id);
        let ExprKind::Call(call) = &expr.kind else {
            return Ok(());
        };
        let callee = tu.expr(call.callee);

        if self.templates.is_active() {
            let callee_loc = match &callee.kind {
                ExprKind::DeclRef(r) => r.name_loc.unwrap_or(callee.loc),
                _ => callee.loc,
            };
            if self.templates.in_gather_mode() {
                if callee.type_dependent {
                    self.templates.visit_dependent(callee_loc.expansion());
                    self.forwarding.mark_location(callee_loc);
                }
            } else if self.forwarding.is_forwarded(&callee_loc) {
                if let Some(inst) = self.context.current_instantiation(tu) {
                    self.forwarding.register(inst, id);
                }
            }
        }

        let Some(callee_decl) = call.callee_decl else {
            return Ok(());
        };
        let DeclKind::Function(func) = &tu.decl(callee_decl).kind else {
            return Ok(());
        };
        let target = func.pattern.unwrap_or(callee_decl);

        // Plain calls are reported by the callee's name reference.
        let (loc, flags) = match (call.operator_loc, &callee.kind) {
            (Some(op), _) => (
                op,
                RecordFlags {
                    not_identifier: true,
                    ..RecordFlags::default()
                },
            ),
            (None, ExprKind::Member(_)) => (callee.loc, RecordFlags::default()),
            _ => return Ok(()),
        };
        if !self.registry.is_interesting(&loc) {
            return Ok(());
        }
        if func.is_instantiation() {
            self.visit_forwarded(id, loc)?;
        }

        let arg_ranges: Vec<SourceRange> = call
            .args
            .iter()
            .map(|&arg| {
                let arg = tu.expr(arg);
                arg.range.unwrap_or(SourceRange::point(arg.loc))
            })
            .collect();

        let mut occ = Occurrence::new(
            Role::Use,
            SyntaxKind::Function,
            self.mangler.qualified_name(target),
            loc,
            self.mangler.symbol(target)?,
        )
        .with_type(call.return_type.as_ref())
        .with_context(self.current_context(&loc)?)
        .with_flags(flags);
        occ.arg_ranges = (!arg_ranges.is_empty()).then_some(arg_ranges);
        self.visit_identifier(occ)
    }

    /// Report every construction a forwarding instantiation reaches, as if
    /// it happened at `loc`.
    fn visit_forwarded(&mut self, start: ExprId, loc: SourceLoc) -> Result<(), IndexerError> {
        if self.forwarding.is_forwarded(&loc) {
            return Ok(());
        }
        for construct in self.forwarding.collect_constructions(self.tu, start) {
            self.emit_construct(construct, loc)?;
        }
        Ok(())
    }

    fn emit_construct(&mut self, id: ExprId, loc: SourceLoc) -> Result<(), IndexerError> {
        let tu = self.tu;
        let ExprKind::Construct(construct) = &tu.expr(id).kind else {
            return Ok(());
        };
        let ctor = construct.constructor;
        let target = match &tu.decl(ctor).kind {
            DeclKind::Function(f) => f.pattern.unwrap_or(ctor),
            _ => ctor,
        };
        let occ = Occurrence::new(
            Role::Use,
            SyntaxKind::Constructor,
            self.mangler.qualified_name(target),
            loc,
            self.mangler.symbol(target)?,
        )
        .with_context(self.current_context(&loc)?);
        self.visit_identifier(occ)
    }

    fn visit_construct(&mut self, id: ExprId) -> Result<(), IndexerError> {
        let tu = self.tu;
        let begin = tu.expr(id).begin();

        // A construction at a forwarded location belongs to the
        // instantiation; its callers report it.
        if self.templates.is_active()
            && !self.templates.in_gather_mode()
            && self.forwarding.is_forwarded(&begin)
        {
            if let Some(inst) = self.context.current_instantiation(tu) {
                self.forwarding.register(inst, id);
            }
            return Ok(());
        }

        if !self.registry.is_interesting(&begin) {
            return Ok(());
        }
        self.emit_construct(id, begin)
    }

    fn visit_decl_ref(&mut self, id: ExprId) -> Result<(), IndexerError> {
        let tu = self.tu;
        let expr = tu.expr(id);
        let ExprKind::DeclRef(r) = &expr.kind else {
            return Ok(());
        };
        let loc = r.name_loc.unwrap_or(expr.loc);
        if !self.registry.is_interesting(&loc) {
            return Ok(());
        }

        let decl = tu.decl(r.decl);
        match &decl.kind {
            DeclKind::Var(var) => {
                let flags = if var.is_local() {
                    RecordFlags::no_crossref()
                } else {
                    RecordFlags::default()
                };
                let occ = Occurrence::new(
                    Role::Use,
                    SyntaxKind::Variable,
                    self.mangler.qualified_name(r.decl),
                    loc,
                    self.mangler.symbol(r.decl)?,
                )
                .with_type(Some(&var.ty))
                .with_context(self.current_context(&loc)?)
                .with_flags(flags);
                self.visit_identifier(occ)
            }
            DeclKind::Function(func) => {
                let target = func.pattern.unwrap_or(r.decl);
                let occ = Occurrence::new(
                    Role::Use,
                    SyntaxKind::Function,
                    self.mangler.qualified_name(target),
                    loc,
                    self.mangler.symbol(target)?,
                )
                .with_context(self.current_context(&loc)?);
                self.visit_identifier(occ)?;
                if func.is_instantiation() {
                    self.visit_forwarded(id, loc)?;
                }
                Ok(())
            }
            DeclKind::EnumConstant => {
                let occ = Occurrence::new(
                    Role::Use,
                    SyntaxKind::Enum,
                    self.mangler.qualified_name(r.decl),
                    loc,
                    self.mangler.symbol(r.decl)?,
                )
                .with_type(expr.ty.as_ref())
                .with_context(self.current_context(&loc)?);
                self.visit_identifier(occ)
            }
            _ => Ok(()),
        }
    }

    fn visit_member(&mut self, id: ExprId) -> Result<(), IndexerError> {
        let tu = self.tu;
        let expr = tu.expr(id);
        let ExprKind::Member(m) = &expr.kind else {
            return Ok(());
        };
        let DeclKind::Field(field) = &tu.decl(m.member).kind else {
            return Ok(());
        };
        if !self.registry.is_interesting(&expr.loc) {
            return Ok(());
        }
        let occ = Occurrence::new(
            Role::Use,
            SyntaxKind::Field,
            self.mangler.qualified_name(m.member),
            expr.loc,
            self.mangler.symbol(m.member)?,
        )
        .with_type(Some(&field.ty))
        .with_context(self.current_context(&expr.loc)?);
        self.visit_identifier(occ)
    }

    /// Unresolved names: overload sets and dependent member / scope lookups.
    fn visit_dependent_ref(&mut self, id: ExprId) -> Result<(), IndexerError> {
        let tu = self.tu;
        let expr = tu.expr(id);
        let loc = expr.loc.spelling();
        if !self.registry.is_interesting(&loc) {
            return Ok(());
        }

        let resolver = HeuristicResolver::new(tu);
        let candidates = match &expr.kind {
            ExprKind::Overload(o) => o.candidates.clone(),
            ExprKind::DependentMember(lookup) => resolver.resolve(lookup),
            ExprKind::DependentDeclRef(scope) => resolver.resolve(&scope.lookup),
            _ => return Ok(()),
        };
        let arity = self.call_arity(id);
        let context = self.current_context(&expr.loc)?;
        for candidate in candidates {
            if resolver.arity_matches(candidate, arity) {
                self.visit_heuristic(candidate, loc, &context)?;
            }
        }

        if self.templates.is_active() {
            self.templates.visit_dependent(loc.expansion());
            if let ExprKind::DependentDeclRef(scope) = &expr.kind {
                for qualifier in &scope.qualifier_locs {
                    self.templates.visit_dependent(qualifier.expansion());
                }
            }
        }
        Ok(())
    }

    /// A use proposed by heuristic lookup.
    fn visit_heuristic(
        &mut self,
        candidate: DeclId,
        loc: SourceLoc,
        context: &Context,
    ) -> Result<(), IndexerError> {
        let tu = self.tu;
        let target = HeuristicResolver::new(tu).unwrap_candidate(candidate);
        let decl = tu.decl(target);
        let (syntax, ty) = match &decl.kind {
            DeclKind::Function(_) => (SyntaxKind::Function, None),
            DeclKind::Field(field) => (SyntaxKind::Field, Some(&field.ty)),
            DeclKind::EnumConstant => (SyntaxKind::Enum, None),
            DeclKind::Typedef(typedef) => (SyntaxKind::Type, Some(&typedef.underlying)),
            _ => return Ok(()),
        };
        let occ = Occurrence::new(
            Role::Use,
            syntax,
            self.mangler.qualified_name(target),
            loc,
            self.mangler.symbol(target)?,
        )
        .with_type(ty)
        .with_context(context.clone())
        .with_flags(RecordFlags::heuristic());
        self.visit_identifier(occ)
    }

    /// Narrow ASCII literals starting with a configured URL scheme.
    fn visit_string_literal(&mut self, id: ExprId) -> Result<(), IndexerError> {
        let tu = self.tu;
        let expr = tu.expr(id);
        let ExprKind::StringLiteral(lit) = &expr.kind else {
            return Ok(());
        };
        let value = lit.value.as_str();
        if lit.char_width != 1 || !value.is_ascii() {
            return Ok(());
        }

        let source_scheme = self.config.source_url_scheme.as_str();
        let symbol = if !source_scheme.is_empty() && value.starts_with(source_scheme) {
            let path = &value[source_scheme.len()..];
            format!("FILE_{}", mangle_file(path, FileType::Source, &self.config.platform))
        } else if self
            .config
            .url_schemes
            .iter()
            .any(|scheme| !scheme.is_empty() && value.starts_with(scheme.as_str()))
        {
            url_symbol(value)
        } else {
            return Ok(());
        };

        if !self.registry.is_interesting(&expr.loc) {
            return Ok(());
        }
        let occ = Occurrence::new(Role::Use, SyntaxKind::File, value, expr.loc, symbol)
            .with_range(expr.range.unwrap_or(SourceRange::point(expr.loc)))
            .with_flags(RecordFlags::literal_range());
        self.visit_identifier(occ)
    }

    fn visit_type_name(&mut self, id: ExprId) -> Result<(), IndexerError> {
        let tu = self.tu;
        let expr = tu.expr(id);
        let ExprKind::TypeName(kind) = &expr.kind else {
            return Ok(());
        };
        if !self.registry.is_interesting(&expr.loc) {
            return Ok(());
        }

        let (target, ty) = match kind {
            TypeNameKind::Tag(d) | TypeNameKind::Typedef(d) | TypeNameKind::InjectedClassName(d) => {
                (*d, expr.ty.as_ref())
            }
            TypeNameKind::TemplateSpecialization(d) => match &tu.decl(*d).kind {
                DeclKind::ClassTemplate(t) => (t.templated, None),
                DeclKind::AliasTemplate(t) => (t.templated, None),
                _ => return Ok(()),
            },
            TypeNameKind::DependentName(lookup) => {
                let resolver = HeuristicResolver::new(tu);
                let context = self.current_context(&expr.loc)?;
                for candidate in resolver.resolve(lookup) {
                    self.visit_heuristic(candidate, expr.loc, &context)?;
                }
                return Ok(());
            }
        };

        let occ = Occurrence::new(
            Role::Use,
            SyntaxKind::Type,
            self.mangler.qualified_name(target),
            expr.loc,
            self.mangler.symbol(target)?,
        )
        .with_type(ty)
        .with_context(self.current_context(&expr.loc)?);
        self.visit_identifier(occ)
    }
}

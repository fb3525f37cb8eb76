//! Declaration traversal, including the template passes.

use crate::location::validate_range;
use crate::model::{DeclId, DeclKind, ExprKind, FunctionRole, SourceRange, VarScope};
use crate::record::{to_line, RecordFlags, Role, SyntaxKind};
use crate::structured::{is_eligible, StructuredExtractor};
use crate::IndexerError;

use super::emit::Occurrence;
use super::Indexer;

impl<'a> Indexer<'a> {
    pub(crate) fn traverse_decl(&mut self, id: DeclId) -> Result<(), IndexerError> {
        let tu = self.tu;
        let decl = tu.decl(id);
        if decl.implicit && !self.context.visit_implicit() {
            return Ok(());
        }

        match &decl.kind {
            DeclKind::Namespace(_) => {
                self.visit_named_decl(id)?;
                for &member in &decl.members {
                    self.traverse_decl(member)?;
                }
            }
            DeclKind::NamespaceAlias => self.visit_named_decl(id)?,
            DeclKind::LinkageSpec => {
                for &member in &decl.members {
                    self.traverse_decl(member)?;
                }
            }
            DeclKind::Record(info) => {
                if info.injected_class_name {
                    return Ok(());
                }
                self.context.push(Some(id), false);
                self.visit_named_decl(id)?;
                self.traverse_exprs(&decl.type_refs)?;
                for &member in &decl.members {
                    self.traverse_decl(member)?;
                }
                self.context.pop();
            }
            DeclKind::Enum(_) => {
                self.context.push(Some(id), false);
                self.visit_named_decl(id)?;
                self.traverse_exprs(&decl.type_refs)?;
                for &member in &decl.members {
                    self.traverse_decl(member)?;
                }
                self.context.pop();
            }
            DeclKind::EnumConstant | DeclKind::Typedef(_) => {
                self.visit_named_decl(id)?;
                self.traverse_exprs(&decl.type_refs)?;
            }
            DeclKind::Field(field) => {
                self.visit_named_decl(id)?;
                self.traverse_exprs(&decl.type_refs)?;
                if let Some(init) = field.init {
                    self.traverse_expr(init)?;
                }
            }
            DeclKind::Var(var) => {
                self.visit_named_decl(id)?;
                self.traverse_exprs(&decl.type_refs)?;
                if let Some(init) = var.init {
                    self.traverse_expr(init)?;
                }
            }
            DeclKind::Function(_) => self.traverse_function(id, true)?,
            DeclKind::ClassTemplate(_) => self.traverse_class_template(id)?,
            DeclKind::FunctionTemplate(_) => self.traverse_function_template(id)?,
            DeclKind::AliasTemplate(t) => self.traverse_decl(t.templated)?,
            DeclKind::UsingShadow(_) => {}
        }
        Ok(())
    }

    fn traverse_function(&mut self, id: DeclId, follow_definition: bool) -> Result<(), IndexerError> {
        let tu = self.tu;
        let decl = tu.decl(id);
        let DeclKind::Function(func) = &decl.kind else {
            return Ok(());
        };

        let is_ctor = func.role == FunctionRole::Constructor;
        self.context.push(Some(id), is_ctor);

        // An out-of-line definition of a member of a template is analyzed
        // from inside the template's scope.
        if follow_definition && self.templates.is_active() {
            if let Some(def) = func.definition.filter(|&def| def != id) {
                let saved = self.context.detach();
                self.traverse_function(def, false)?;
                self.context.restore(saved);
            }
        }

        self.visit_named_decl(id)?;
        if is_ctor {
            self.visit_ctor_initializers(id)?;
        }
        self.traverse_exprs(&decl.type_refs)?;
        for &param in &func.params {
            self.traverse_decl(param)?;
        }
        for init in &func.initializers {
            if !init.written && !self.context.visit_implicit() {
                continue;
            }
            if let Some(expr) = init.init {
                self.traverse_expr(expr)?;
            }
        }
        if let Some(body) = func.body {
            self.traverse_expr(body)?;
        }

        self.context.pop();
        Ok(())
    }

    /// Gather over the pattern and partial specializations, then, when
    /// dependent locations turned up, analyze every specialization.
    fn traverse_class_template(&mut self, id: DeclId) -> Result<(), IndexerError> {
        let tu = self.tu;
        let DeclKind::ClassTemplate(template) = &tu.decl(id).kind else {
            return Ok(());
        };

        self.templates.push();
        self.traverse_decl(template.templated)?;
        for redecls in &template.partial_specializations {
            for &rd in redecls {
                self.traverse_decl(rd)?;
            }
        }

        if self.templates.needs_analysis() {
            self.templates.switch_to_analyze();
            // Specializations are walked only from the definition.
            if tu.decl(template.templated).is_definition {
                for redecls in &template.specializations {
                    for &rd in redecls {
                        self.traverse_decl(rd)?;
                    }
                }
            }
        }

        self.templates.pop();
        Ok(())
    }

    fn traverse_function_template(&mut self, id: DeclId) -> Result<(), IndexerError> {
        let tu = self.tu;
        let DeclKind::FunctionTemplate(template) = &tu.decl(id).kind else {
            return Ok(());
        };

        self.templates.push();
        if self.templates.in_gather_mode() {
            self.traverse_decl(template.templated)?;
        }

        if self.templates.needs_analysis() {
            self.templates.switch_to_analyze();
            // Specializations are walked only from the canonical declaration.
            if template.canonical {
                for redecls in &template.specializations {
                    for &rd in redecls {
                        self.traverse_decl(rd)?;
                    }
                }
            }
        }

        self.templates.pop();
        Ok(())
    }

    /// Definition / declaration records of a named declaration, plus its
    /// structured record when it has one.
    fn visit_named_decl(&mut self, id: DeclId) -> Result<(), IndexerError> {
        let tu = self.tu;
        let decl = tu.decl(id);
        let mut loc = decl.loc;
        if !self.registry.is_interesting(&loc) {
            return Ok(());
        }

        let expansion_loc = if loc.is_macro_body() {
            loc.expansion()
        } else {
            loc.spelling()
        };

        let mut flags = RecordFlags::default();
        let mut symbol_decl = id;
        let mut peek_range = decl.range;
        let mut nesting_range = None;
        let mut ty = None;
        let (role, mut syntax) = match &decl.kind {
            DeclKind::Function(func) => {
                if let Some(pattern) = func.pattern {
                    symbol_decl = pattern;
                }
                if decl.is_definition && !func.is_instantiation() {
                    nesting_range = func.body.and_then(|body| {
                        let body = tu.expr(body);
                        match body.kind {
                            ExprKind::Compound => body.range,
                            _ => None,
                        }
                    });
                }
                let role = if decl.is_definition || func.is_pure {
                    Role::Def
                } else {
                    Role::Decl
                };
                (role, SyntaxKind::Function)
            }
            DeclKind::Record(_) | DeclKind::Enum(_) => {
                if decl.is_definition {
                    nesting_range = match &decl.kind {
                        DeclKind::Record(r) => r.braces,
                        DeclKind::Enum(e) => e.braces,
                        _ => None,
                    };
                    (Role::Def, SyntaxKind::Type)
                } else {
                    peek_range = None;
                    (Role::Forward, SyntaxKind::Type)
                }
            }
            DeclKind::Typedef(typedef) => {
                peek_range = Some(SourceRange::point(expansion_loc));
                ty = Some(&typedef.underlying);
                (Role::Alias, SyntaxKind::Type)
            }
            DeclKind::Var(var) => {
                if var.scope == VarScope::Param && decl.is_anonymous() {
                    return Ok(());
                }
                if var.is_local() {
                    flags = RecordFlags::no_crossref();
                }
                ty = Some(&var.ty);
                let role = if decl.is_definition {
                    Role::Def
                } else {
                    Role::Decl
                };
                (role, SyntaxKind::Variable)
            }
            DeclKind::Namespace(ns) => {
                peek_range = Some(SourceRange::point(expansion_loc));
                nesting_range = ns.braces;
                (Role::Def, SyntaxKind::Namespace)
            }
            DeclKind::NamespaceAlias => {
                peek_range = Some(SourceRange::point(expansion_loc));
                (Role::Def, SyntaxKind::Namespace)
            }
            DeclKind::Field(field) => {
                ty = Some(&field.ty);
                (Role::Def, SyntaxKind::Field)
            }
            DeclKind::EnumConstant => (Role::Def, SyntaxKind::EnumConstant),
            _ => return Ok(()),
        };

        let peek_range = validate_range(&loc, SourceRange::combine(peek_range, decl.comment));
        let nesting_range = validate_range(&loc, nesting_range);
        let symbol = self.mangler.symbol(symbol_decl)?;

        // Destructor names start at `~`; the record points at the class name
        // after it. Destructors without one (lambda internals) are dropped.
        let is_dtor = matches!(&decl.kind, DeclKind::Function(f) if f.role == FunctionRole::Destructor);
        if is_dtor {
            syntax = SyntaxKind::Destructor;
            if self.sm.byte_at(loc.file, loc.offset) != Some(b'~') {
                return Ok(());
            }
            let name_start = self.sm.skip_whitespace(loc.file, loc.offset + 1);
            loc = loc.advanced(name_start - loc.offset);
        }

        let mut occ = Occurrence::new(
            role,
            syntax,
            self.mangler.qualified_name(symbol_decl),
            loc,
            symbol,
        )
        .with_type(ty)
        .with_context(self.decl_context(id)?)
        .with_flags(flags);
        occ.peek_range = peek_range;
        occ.nesting_range = nesting_range;
        self.visit_identifier(occ)?;

        if is_eligible(tu, id, self.templates.is_active()) {
            let extractor = StructuredExtractor::new(tu, self.sm, self.registry, &self.mangler);
            if let Some(record) = extractor.extract(&expansion_loc, id)? {
                let line = to_line(&record)?;
                self.push_line(expansion_loc.file, line);
                self.metrics.record_structured();
            }
        }
        Ok(())
    }

    /// Written member initializers of a constructor, reported with the
    /// constructor as their context.
    fn visit_ctor_initializers(&mut self, id: DeclId) -> Result<(), IndexerError> {
        let tu = self.tu;
        let decl = tu.decl(id);
        let DeclKind::Function(func) = &decl.kind else {
            return Ok(());
        };
        if !self.registry.is_interesting(&decl.loc) {
            return Ok(());
        }

        for init in &func.initializers {
            let Some(member) = init.member else {
                continue;
            };
            if !init.written || !self.registry.is_interesting(&init.loc) {
                continue;
            }
            let DeclKind::Field(field) = &tu.decl(member).kind else {
                continue;
            };
            let occ = Occurrence::new(
                Role::Use,
                SyntaxKind::Field,
                self.mangler.qualified_name(member),
                init.loc,
                self.mangler.symbol(member)?,
            )
            .with_type(Some(&field.ty))
            .with_context(self.translate_context(id)?);
            self.visit_identifier(occ)?;
        }
        Ok(())
    }
}

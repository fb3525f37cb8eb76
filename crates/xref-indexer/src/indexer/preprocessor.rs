//! Replay of preprocessor events: files, includes and macros.

use crate::location::FileType;
use crate::macros::{is_header_like, BeginOutcome, ClosedExpansion, MacroInvocation};
use crate::mangle::{file_symbol, mangle_file};
use crate::model::{MacroRef, PpEvent, SourceLoc, SourceRange};
use crate::record::{RecordFlags, Role, SyntaxKind};
use crate::IndexerError;

use super::emit::Occurrence;
use super::Indexer;

impl<'a> Indexer<'a> {
    pub(crate) fn replay_preprocessor(&mut self) -> Result<(), IndexerError> {
        let tu = self.tu;
        for event in &tu.preprocessor {
            match event {
                PpEvent::FileEntered { loc } => self.file_entered(loc)?,
                PpEvent::Inclusion {
                    filename_range,
                    path: Some(path),
                } => self.inclusion(filename_range, path)?,
                PpEvent::Inclusion { path: None, .. } => {}
                PpEvent::MacroDefined { name, loc, builtin } => {
                    if !*builtin && self.registry.is_interesting(loc) {
                        let symbol = self.mangler.macro_symbol(loc, name);
                        let occ = Occurrence::new(Role::Def, SyntaxKind::Macro, name, *loc, symbol);
                        self.visit_identifier(occ)?;
                    }
                }
                PpEvent::MacroExpands {
                    name,
                    loc,
                    range,
                    macro_def,
                } => self.macro_expands(name, *loc, *range, *macro_def)?,
                PpEvent::MacroReferenced {
                    name,
                    loc,
                    macro_def: Some(def),
                    ..
                } if !def.builtin => {
                    let symbol = self.mangler.macro_symbol(&def.definition, name);
                    self.macro_used(name, *loc, symbol)?;
                }
                PpEvent::MacroReferenced { .. } => {}
                PpEvent::Token(token) => {
                    if let Some(closed) = self.macros.on_token(token) {
                        self.closed_expansion(closed)?;
                    }
                }
            }
        }

        if let Some(closed) = self.macros.close() {
            self.closed_expansion(closed)?;
        }
        Ok(())
    }

    /// Definition record of a file, at its first byte.
    fn file_entered(&mut self, loc: &SourceLoc) -> Result<(), IndexerError> {
        if !self.registry.is_interesting(loc) {
            return Ok(());
        }
        let info = self.registry.info(loc.file);
        let occ = Occurrence::new(
            Role::Def,
            SyntaxKind::File,
            info.realname.clone(),
            *loc,
            file_symbol(info, &self.config.platform),
        )
        .with_flags(RecordFlags::literal_range());
        self.visit_identifier(occ)
    }

    fn inclusion(&mut self, filename_range: &SourceRange, path: &str) -> Result<(), IndexerError> {
        let (realname, file_type) = self.registry.classifier().relativize(path);
        if file_type == FileType::Unknown {
            return Ok(());
        }
        let symbol = format!("FILE_{}", mangle_file(&realname, file_type, &self.config.platform));

        if filename_range.begin.is_macro() {
            if let Some(closed) = self.macros.note_inclusion(filename_range.begin, path) {
                self.closed_expansion(closed)?;
            }
        }

        if !self.registry.is_interesting(&filename_range.begin) {
            return Ok(());
        }
        let occ = Occurrence::new(Role::Use, SyntaxKind::File, realname, filename_range.begin, symbol)
            .with_range(*filename_range)
            .with_flags(RecordFlags::literal_range());
        self.visit_identifier(occ)
    }

    fn macro_expands(
        &mut self,
        name: &str,
        loc: SourceLoc,
        range: SourceRange,
        macro_def: Option<MacroRef>,
    ) -> Result<(), IndexerError> {
        let Some(def) = macro_def.filter(|d| !d.builtin) else {
            return Ok(());
        };
        if !self.registry.is_interesting(&loc.spelling()) {
            return Ok(());
        }

        let symbol = self.mangler.macro_symbol(&def.definition, name);
        let in_header = self
            .sm
            .path(loc.expansion().file)
            .is_some_and(is_header_like);
        let invocation = MacroInvocation {
            name: name.to_string(),
            name_loc: loc,
            range,
            definition: def.definition,
            symbol: symbol.clone(),
            in_header,
        };

        // The use record of an outermost invocation waits until its
        // expansion is closed, so it can carry the expansion text.
        match self.macros.begin(invocation) {
            BeginOutcome::Nested => self.macro_used(name, loc, symbol),
            BeginOutcome::Started(Some(closed)) => self.closed_expansion(closed),
            BeginOutcome::Started(None) => Ok(()),
        }
    }

    fn closed_expansion(&mut self, closed: ClosedExpansion) -> Result<(), IndexerError> {
        self.macro_used(&closed.name, closed.name_loc, closed.symbol)
    }

    fn macro_used(&mut self, name: &str, loc: SourceLoc, symbol: String) -> Result<(), IndexerError> {
        if !self.registry.is_interesting(&loc) {
            return Ok(());
        }
        let occ = Occurrence::new(Role::Use, SyntaxKind::Macro, name, loc, symbol);
        self.visit_identifier(occ)
    }
}

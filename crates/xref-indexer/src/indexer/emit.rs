//! The record emitter. Every target and source record goes through
//! [`Indexer::visit_identifier`].

use std::collections::BTreeMap;

use crate::context::Context;
use crate::location::{full_range_string, line_range_string, location_string};
use crate::model::{SourceLoc, SourceRange, TypeRef};
use crate::record::{
    to_line, PlatformMap, RecordFlags, Role, SourceRecord, SyntaxKind, TargetRecord,
    HEURISTIC_CONFIDENCE,
};
use crate::IndexerError;

use super::Indexer;

/// One occurrence of a symbol, before it is turned into records.
#[derive(Debug, Clone)]
pub(crate) struct Occurrence<'o> {
    pub role: Role,
    pub syntax: SyntaxKind,
    pub pretty: String,
    pub range: SourceRange,
    pub symbol: String,
    pub ty: Option<&'o TypeRef>,
    pub context: Context,
    pub flags: RecordFlags,
    pub peek_range: Option<SourceRange>,
    pub nesting_range: Option<SourceRange>,
    pub arg_ranges: Option<Vec<SourceRange>>,
}

impl<'o> Occurrence<'o> {
    pub fn new(
        role: Role,
        syntax: SyntaxKind,
        pretty: impl Into<String>,
        loc: SourceLoc,
        symbol: String,
    ) -> Self {
        Self {
            role,
            syntax,
            pretty: pretty.into(),
            range: SourceRange::point(loc),
            symbol,
            ty: None,
            context: Context::default(),
            flags: RecordFlags::default(),
            peek_range: None,
            nesting_range: None,
            arg_ranges: None,
        }
    }

    pub fn with_range(mut self, range: SourceRange) -> Self {
        self.range = range;
        self
    }

    pub fn with_type(mut self, ty: Option<&'o TypeRef>) -> Self {
        self.ty = ty;
        self
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    pub fn with_flags(mut self, flags: RecordFlags) -> Self {
        self.flags = flags;
        self
    }
}

/// Identifier-shaped text. Empty text counts as valid.
fn is_valid_identifier(text: &str) -> bool {
    text.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

impl<'a> Indexer<'a> {
    /// Emit the target and source records of an occurrence.
    pub(crate) fn visit_identifier(&mut self, occ: Occurrence<'_>) -> Result<(), IndexerError> {
        let loc = occ.range.begin;

        // The spelling site gets its own records.
        let spelling = loc.spelling();
        if spelling != loc {
            let at_spelling = occ
                .clone()
                .with_range(SourceRange::new(spelling, occ.range.end.spelling()));
            self.visit_identifier(at_spelling)?;
        }

        let expansion = loc.expansion();
        if !self.templates.should_visit(&expansion) {
            return Ok(());
        }

        let mut flags = occ.flags;
        if expansion != loc {
            flags.range_end_valid = false;
        }

        let len = if flags.range_end_valid {
            occ.range.end.offset.saturating_sub(expansion.offset)
        } else {
            self.sm.token_length(&expansion)
        };
        let Some(loc_str) = location_string(self.sm, &expansion, len) else {
            self.metrics.record_dropped();
            return Ok(());
        };

        if !flags.not_identifier {
            let valid = self
                .sm
                .text(&expansion, len)
                .is_some_and(is_valid_identifier);
            if !valid {
                self.metrics.record_dropped();
                return Ok(());
            }
        }

        let arg_ranges = occ.arg_ranges.as_ref().map(|ranges| {
            ranges
                .iter()
                .filter_map(|r| full_range_string(self.sm, r))
                .collect::<Vec<_>>()
        });

        if !flags.no_crossref {
            let record = TargetRecord {
                loc: loc_str.clone(),
                target: 1,
                kind: occ.role,
                pretty: occ.pretty.clone(),
                sym: occ.symbol.clone(),
                context: (!occ.context.name.is_empty()).then(|| occ.context.name.clone()),
                contextsym: (!occ.context.symbol.is_empty()).then(|| occ.context.symbol.clone()),
                peek_range: occ
                    .peek_range
                    .and_then(|r| line_range_string(self.sm, &r, false)),
                arg_ranges: arg_ranges.clone(),
            };
            self.push_line(expansion.file, to_line(&record)?);
            self.metrics.record_target();
        }

        let typesym = match occ.ty.and_then(TypeRef::tag_or_pointee) {
            Some(tag) => Some(self.mangler.symbol(tag)?),
            None => None,
        };

        let mut record = SourceRecord {
            loc: loc_str,
            source: 1,
            nesting_range: occ
                .nesting_range
                .and_then(|r| full_range_string(self.sm, &r)),
            syntax: if flags.no_crossref {
                String::new()
            } else {
                format!("{},{}", occ.role.as_str(), occ.syntax.as_str())
            },
            ty: occ.ty.map(|t| t.spelling.clone()),
            typesym,
            pretty: format!("{} {}", occ.syntax.as_str(), occ.pretty),
            sym: occ.symbol.clone(),
            no_crossref: flags.no_crossref.then_some(1),
            confidence: flags.heuristic.then(|| vec![HEURISTIC_CONFIDENCE]),
            arg_ranges,
            expands_to: None,
            in_expansion_at: None,
        };

        if let Some(expanded) = self.macros.lookup(&expansion) {
            if expanded.symbol == occ.symbol {
                let mut by_platform = PlatformMap::new();
                by_platform.insert(String::new(), expanded.text.clone());
                record.expands_to = Some(BTreeMap::from([(expanded.key.clone(), by_platform)]));
            } else if let Some(&offset) = expanded.token_offsets.get(&loc) {
                let mut by_platform = PlatformMap::new();
                by_platform.insert(String::new(), vec![offset]);
                record.in_expansion_at =
                    Some(BTreeMap::from([(expanded.key.clone(), by_platform)]));
            }
        }

        self.push_line(expansion.file, to_line(&record)?);
        self.metrics.record_source();
        Ok(())
    }
}

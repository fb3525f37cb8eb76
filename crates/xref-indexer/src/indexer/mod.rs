//! Translation-unit indexer.
//!
//! One [`Indexer`] walks one translation unit: the preprocessor events are
//! replayed first, then every top-level declaration is traversed depth-first.
//! Records accumulate in per-file buffers and are handed back as an
//! [`IndexOutput`] for the merge step.

mod decls;
mod emit;
mod exprs;
mod preprocessor;

use std::collections::BTreeMap;
use std::time::Instant;

use tracing::{debug, info};
use xref_core::{IndexerConfig, RunMetrics};

use crate::context::{Context, ContextStack};
use crate::forwarding::ForwardingTracker;
use crate::location::FileRegistry;
use crate::macros::MacroTracker;
use crate::mangle::Mangler;
use crate::model::{DeclId, DeclKind, ExprId, FileId, SourceLoc, SourceManager, TranslationUnit};
use crate::template::TemplateStack;
use crate::IndexerError;

/// Records produced for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutput {
    /// Relative name (under `__GENERATED__/` for generated files)
    pub path: String,
    /// Newline-terminated records, sorted
    pub lines: Vec<String>,
}

/// Everything a translation unit contributes to the database.
#[derive(Debug, Clone, Default)]
pub struct IndexOutput {
    pub files: Vec<FileOutput>,
}

impl IndexOutput {
    pub fn file(&self, path: &str) -> Option<&FileOutput> {
        self.files.iter().find(|f| f.path == path)
    }

    pub fn line_count(&self) -> usize {
        self.files.iter().map(|f| f.lines.len()).sum()
    }
}

/// Index a translation unit and return its records per interesting file.
pub fn index_translation_unit(
    config: &IndexerConfig,
    tu: &TranslationUnit,
    metrics: &RunMetrics,
) -> Result<IndexOutput, IndexerError> {
    tu.validate()?;
    let start = Instant::now();

    let sm = SourceManager::new(&tu.files);
    let registry = FileRegistry::new(config, &tu.files);
    let mut indexer = Indexer::new(config, tu, &sm, &registry, metrics);
    indexer.run()?;
    let output = indexer.finish();

    info!(
        main_file = %sm.path(tu.main_file).unwrap_or_default(),
        files = output.files.len(),
        lines = output.line_count(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Indexed translation unit"
    );
    Ok(output)
}

pub struct Indexer<'a> {
    config: &'a IndexerConfig,
    tu: &'a TranslationUnit,
    sm: &'a SourceManager<'a>,
    registry: &'a FileRegistry<'a>,
    mangler: Mangler<'a>,
    metrics: &'a RunMetrics,

    context: ContextStack,
    templates: TemplateStack,
    forwarding: ForwardingTracker,
    macros: MacroTracker,
    /// Innermost call expression being traversed
    current_call: Option<ExprId>,

    outputs: BTreeMap<FileId, Vec<String>>,
}

impl<'a> Indexer<'a> {
    pub fn new(
        config: &'a IndexerConfig,
        tu: &'a TranslationUnit,
        sm: &'a SourceManager<'a>,
        registry: &'a FileRegistry<'a>,
        metrics: &'a RunMetrics,
    ) -> Self {
        Self {
            config,
            tu,
            sm,
            registry,
            mangler: Mangler::new(tu, sm, registry, &config.platform),
            metrics,
            context: ContextStack::new(),
            templates: TemplateStack::new(),
            forwarding: ForwardingTracker::new(),
            macros: MacroTracker::new(config.macro_reflow.clone()),
            current_call: None,
            outputs: BTreeMap::new(),
        }
    }

    pub fn mangler(&self) -> &Mangler<'a> {
        &self.mangler
    }

    /// Replay the preprocessor, then traverse every top-level declaration.
    pub fn run(&mut self) -> Result<(), IndexerError> {
        self.replay_preprocessor()?;
        for &id in &self.tu.top_level {
            self.traverse_decl(id)?;
        }
        Ok(())
    }

    /// Sorted records of every interesting file.
    pub fn finish(self) -> IndexOutput {
        let mut files = Vec::new();
        for (file, mut lines) in self.outputs {
            let info = self.registry.info(file);
            if !info.is_interesting() {
                debug!(file, dropped = lines.len(), "Discarding records of uninteresting file");
                continue;
            }
            lines.sort();
            lines.dedup();
            files.push(FileOutput {
                path: info.realname.clone(),
                lines,
            });
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));
        IndexOutput { files }
    }

    fn push_line(&mut self, file: FileId, line: String) {
        self.outputs.entry(file).or_default().push(line);
    }

    /// Context reported for a declaration or use inside `id`. Instantiations
    /// report their pattern.
    fn translate_context(&self, id: DeclId) -> Result<Context, IndexerError> {
        let id = match &self.tu.decl(id).kind {
            DeclKind::Function(f) => f.pattern.unwrap_or(id),
            _ => id,
        };
        Ok(Context {
            name: self.mangler.qualified_name(id),
            symbol: self.mangler.symbol(id)?,
        })
    }

    /// Context of a use at `loc` under the current traversal position.
    /// Uses written in a macro body get none.
    fn current_context(&self, loc: &SourceLoc) -> Result<Context, IndexerError> {
        if loc.is_macro_body() {
            return Ok(Context::default());
        }
        match self.context.nearest(None) {
            Some(id) => self.translate_context(id),
            None => Ok(Context::default()),
        }
    }

    /// Context of a declaration already on the stack. Declarations written
    /// in a macro body get none.
    fn decl_context(&self, id: DeclId) -> Result<Context, IndexerError> {
        if self.tu.decl(id).loc.is_macro_body() {
            return Ok(Context::default());
        }
        match self.context.nearest(Some(id)) {
            Some(parent) => self.translate_context(parent),
            None => Ok(Context::default()),
        }
    }
}

pub mod diagnostics;
pub mod include;
pub mod sourcemap;

use diagnostics::*;
use sourcemap::SourceMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorsEmitted;

/// State shared between the compilations run by one compiler.
pub struct Session<D: DiagnosticEmitter> {
    pub sources: SourceMap,
    pub diagnostics: D,
}

impl<D: DiagnosticEmitter> Session<D> {
    pub fn new(diagnostics: D) -> Self {
        Self {
            sources: SourceMap::default(),
            diagnostics,
        }
    }

    pub fn report(&mut self, diagnostic: impl IntoDiagnostic) -> Result<(), ErrorsEmitted> {
        self.report_all([diagnostic])
    }

    /// Emits every diagnostic, returning them so the caller can keep a copy.
    pub fn report_all<I>(&mut self, diagnostics: I) -> Result<(), ErrorsEmitted>
    where
        I: IntoIterator,
        I::Item: IntoDiagnostic,
    {
        let mut had_error = false;

        for diagnostic in diagnostics {
            let diagnostic = diagnostic.into_diagnostic();
            had_error = true;
            self.diagnostics.emit_diagnostic(diagnostic, &self.sources);
        }

        if had_error {
            Err(ErrorsEmitted)
        } else {
            Ok(())
        }
    }
}

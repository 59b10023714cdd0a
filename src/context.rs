use crate::diagnostics::Diagnostics;
use crate::emitter::Emitter;
use crate::id_gen::Label;

#[derive(Debug, Clone, Copy)]
pub struct CompileOptions {
    /// Write the `# ...` annotations next to generated instructions.
    pub emit_comments: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            emit_comments: true,
        }
    }
}

/// State shared by the passes of a single compilation: the diagnostics (whose
/// non-emptiness is the sticky failure flag), the instruction emitter with its
/// label counter, and the options.
#[derive(Debug, Default)]
pub struct CompilationContext {
    pub diagnostics: Diagnostics,
    pub emitter: Emitter,
    pub options: CompileOptions,
}

impl CompilationContext {
    pub fn new(options: CompileOptions) -> Self {
        CompilationContext {
            diagnostics: Diagnostics::new(),
            emitter: Emitter::new(),
            options,
        }
    }

    pub fn failed(&self) -> bool {
        self.diagnostics.failed()
    }

    pub fn next_label(&mut self) -> Label {
        self.emitter.next_label()
    }
}

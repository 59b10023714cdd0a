pub mod asm;
pub mod ast;
pub mod codegen;
pub mod context;
pub mod decompile;
pub mod diagnostics;
pub mod emitter;
pub mod id_gen;
pub mod resolve;
pub mod symbol_table;
pub mod typecheck;
pub mod types;

#[cfg(test)]
mod testing;

use crate::context::{CompilationContext, CompileOptions};
use crate::diagnostics::Diagnostic;
use std::io::Write;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Compilation failed with {} semantic error(s)", .0.len())]
    Semantic(Vec<Diagnostic>),

    #[error(transparent)]
    Emitter(#[from] emitter::EmitterError),
}

/// Runs name analysis, type checking and code generation over `program` and writes
/// the assembly to `sink`.
///
/// Nothing is written unless both analyses succeed. Every diagnostic of the passes
/// that ran is returned.
pub fn compile(
    program: &mut ast::Program,
    sink: &mut impl Write,
    options: CompileOptions,
) -> Result<(), Error> {
    let mut ctx = CompilationContext::new(options);

    log::info!("Compiling class {}", program.name.name);
    log::debug!("AST: {program:#?}");

    resolve::analyse(program, &mut ctx);
    if ctx.failed() {
        return Err(Error::Semantic(ctx.diagnostics.into_vec()));
    }

    typecheck::check(program, &mut ctx);
    if ctx.failed() {
        return Err(Error::Semantic(ctx.diagnostics.into_vec()));
    }

    let assembly = codegen::generate(program, &mut ctx);
    log::debug!(
        "Generated {} instructions",
        assembly.instructions().count()
    );

    emitter::emit(&assembly, sink, &ctx.options)?;

    Ok(())
}

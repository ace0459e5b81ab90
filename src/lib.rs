//! Single-pass compiler for a small Pascal-like language.
//!
//! A source string goes in; a token trace, an instruction stream for a
//! stack-based virtual machine, and any non-fatal lexical warnings come
//! out. There is no separate parse/typecheck/codegen pipeline — scanning,
//! parsing, type checking, and emission all happen in one recursive
//! descent over the token stream, see [`parser`].

pub mod config;
pub mod diagnostics;
pub mod emitter;
pub mod parser;
pub mod scanner;
pub mod symbol;
pub mod token;
pub mod types;

pub use config::CompilerConfig;
pub use diagnostics::{Diagnostic, LexError};
pub use parser::Parser;
pub use types::Type;

/// The trace stream, the code stream, and any lexical diagnostics
/// accumulated during a successful compilation.
#[derive(Debug, Clone)]
pub struct CompileOutput {
    /// `TOKEN: ... LEXEME: ...` lines, plus `<LHS> -> <RHS>` grammar-rule
    /// lines when [`CompilerConfig::debug`] is set. Empty when
    /// [`CompilerConfig::suppress`] is set.
    pub trace: String,

    /// The emitted instruction stream for the stack machine.
    pub code: String,

    /// Malformed integer/character lexemes encountered and discarded while
    /// scanning. Their presence does not fail compilation.
    pub warnings: Vec<LexError>,
}

/// Compile `source` under `config`, producing both output streams or the
/// first diagnostic encountered.
///
/// On failure nothing is returned of either stream: callers that want a
/// partial trace on error should re-run with logging instead, since the
/// streams for a failed compilation are not a well-formed compiler output.
pub fn compile(source: &str, config: &CompilerConfig) -> Result<CompileOutput, Diagnostic> {
    tracing::debug!(debug = config.debug, suppress = config.suppress, "starting compilation");

    let parser = Parser::new(source, config.debug, config.suppress);
    let output = parser.parse()?;

    tracing::debug!(warnings = output.warnings.len(), "compilation finished");

    Ok(CompileOutput {
        trace: output.trace,
        code: output.code,
        warnings: output.warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_minimal_program() {
        let config = CompilerConfig::new();
        let out = compile("program p; begin end.", &config).unwrap();
        assert!(out.code.contains("halt"));
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn reports_first_diagnostic_on_failure() {
        let config = CompilerConfig::new();
        let err = compile("program p; begin x := 1 end.", &config).unwrap_err();
        assert_eq!(err, Diagnostic::Undefined(1));
    }

    #[test]
    fn suppress_yields_empty_trace() {
        let config = CompilerConfig::new().with_suppress(true);
        let out = compile("program p; begin end.", &config).unwrap();
        assert!(out.trace.is_empty());
    }
}

//! Compiler configuration.
//!
//! Kept separate from the CLI's `Cli` struct so the library itself never
//! depends on `clap` — `main.rs` is the only place a `CompilerConfig` gets
//! built from command-line flags.
//!
//! # Example
//!
//! ```
//! use pzc::CompilerConfig;
//!
//! let config = CompilerConfig::new().with_debug(true);
//! ```

/// Configuration for a single compilation. Neither flag affects the
/// emitted code stream — both only govern the trace stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompilerConfig {
    /// Enable grammar-rule lines (`<LHS> -> <RHS>`) in the trace stream.
    pub debug: bool,

    /// Suppress the trace stream entirely, including token lines.
    pub suppress: bool,
}

impl CompilerConfig {
    pub fn new() -> Self {
        CompilerConfig::default()
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_suppress(mut self, suppress: bool) -> Self {
        self.suppress = suppress;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_quiet_and_untraced() {
        let config = CompilerConfig::new();
        assert!(!config.debug);
        assert!(!config.suppress);
    }

    #[test]
    fn builder_methods_chain() {
        let config = CompilerConfig::new().with_debug(true).with_suppress(true);
        assert!(config.debug);
        assert!(config.suppress);
    }
}

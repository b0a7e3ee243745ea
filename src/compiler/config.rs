//! Configuration for the compilation pipeline.
//!
//! This module provides the configuration type controlling which stages
//! [`compile_function`](super::compile_function) runs and which register file
//! it allocates for.

use crate::regalloc::TargetRegisters;

/// Configuration for [`compile_function`](super::compile_function).
///
/// Controls the number of colors used during graph simplification, the
/// physical register file, and the optional pipeline stages.
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// Number of colors `K` used to simplify the interference graph
    /// (default: 4).
    pub num_colors: usize,

    /// The physical register file registers are allocated from.
    ///
    /// Defaults to a single class of four registers `r0..r3`.
    pub registers: TargetRegisters,

    /// Insert loop preheaders and run loop-invariant code motion
    /// (default: true).
    pub licm: bool,

    /// Verify the function after every pass that changed it and the
    /// allocation at the end (default: true).
    pub verify: bool,

    /// Upper bound on how often the pass list is repeated while it keeps
    /// changing the function (default: 8).
    pub max_iterations: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            num_colors: 4,
            registers: TargetRegisters::default(),
            licm: true,
            verify: true,
            max_iterations: 8,
        }
    }
}

impl CompilerConfig {
    /// Creates a new configuration with default settings.
    ///
    /// # Returns
    ///
    /// A new `CompilerConfig` with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration for a uniform register file of `count`
    /// registers, simplifying with `count` colors.
    #[must_use]
    pub fn uniform(count: u16) -> Self {
        Self {
            num_colors: usize::from(count),
            registers: TargetRegisters::uniform(count),
            ..Self::default()
        }
    }

    /// Sets the number of simplification colors.
    #[must_use]
    pub fn with_num_colors(mut self, num_colors: usize) -> Self {
        self.num_colors = num_colors;
        self
    }

    /// Sets the physical register file.
    #[must_use]
    pub fn with_registers(mut self, registers: TargetRegisters) -> Self {
        self.registers = registers;
        self
    }

    /// Enables or disables preheader insertion and LICM.
    #[must_use]
    pub fn with_licm(mut self, enabled: bool) -> Self {
        self.licm = enabled;
        self
    }

    /// Enables or disables verification.
    #[must_use]
    pub fn with_verify(mut self, enabled: bool) -> Self {
        self.verify = enabled;
        self
    }

    /// Sets the maximum number of pass list iterations.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CompilerConfig::default();
        assert_eq!(config.num_colors, 4);
        assert_eq!(config.registers.num_regs(), 4);
        assert!(config.licm);
        assert!(config.verify);
        assert_eq!(config.max_iterations, 8);
    }

    #[test]
    fn test_builder_methods() {
        let config = CompilerConfig::uniform(8).with_licm(false).with_verify(false);
        assert_eq!(config.num_colors, 8);
        assert_eq!(config.registers.num_regs(), 8);
        assert!(!config.licm);
        assert!(!config.verify);

        let config = CompilerConfig::new().with_num_colors(2).with_max_iterations(1);
        assert_eq!(config.num_colors, 2);
        assert_eq!(config.max_iterations, 1);
        assert_eq!(config.registers.num_regs(), 4);
    }
}

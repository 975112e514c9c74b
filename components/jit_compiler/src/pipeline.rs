//! The fixed optimization pipeline applied to every compilation unit.
//!
//! Units are optimized at a light level and never inlined across function
//! boundaries: generated code is never deoptimized, so any assumption baked
//! into materialized code (inline-cache guards in particular) must stay local
//! to the function whose slow path can correct it.

use cranelift_codegen::ir::Function;
use cranelift_codegen::isa::{OwnedTargetIsa, TargetIsa};
use cranelift_codegen::settings::{self, Configurable};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Cranelift optimization level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptLevel {
    /// No optimization; fastest compilation
    None,
    /// Light optimization (the default)
    #[default]
    Speed,
    /// Light optimization that also weighs code size
    SpeedAndSize,
}

impl OptLevel {
    fn setting(self) -> &'static str {
        match self {
            OptLevel::None => "none",
            OptLevel::Speed => "speed",
            OptLevel::SpeedAndSize => "speed_and_size",
        }
    }
}

/// Code generator settings shared by every unit an engine compiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimizationPipeline {
    opt_level: OptLevel,
    verify: bool,
}

impl OptimizationPipeline {
    /// Creates a pipeline.
    pub fn new(opt_level: OptLevel, verify: bool) -> Self {
        OptimizationPipeline { opt_level, verify }
    }

    /// Optimization level.
    pub fn opt_level(&self) -> OptLevel {
        self.opt_level
    }

    /// Whether the IR verifier runs on submission and inside the backend.
    pub fn verifies(&self) -> bool {
        self.verify
    }

    /// Builds the shared Cranelift flags.
    ///
    /// NaN canonicalization keeps every arithmetic result inside the number
    /// encoding of tagged values.
    pub fn flags(&self) -> Result<settings::Flags, EngineError> {
        let mut flag_builder = settings::builder();
        let verifier = if self.verify { "true" } else { "false" };
        for (name, value) in [
            ("opt_level", self.opt_level.setting()),
            ("is_pic", "false"),
            ("enable_verifier", verifier),
            ("enable_nan_canonicalization", "true"),
        ] {
            flag_builder
                .set(name, value)
                .map_err(|e| EngineError::Configuration(format!("{}={}: {}", name, value, e)))?;
        }
        Ok(settings::Flags::new(flag_builder))
    }

    /// Detects the host and builds its target ISA with this pipeline's flags.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::TargetDetection`] when the host is not supported
    /// or is not a 64-bit target.
    pub fn build_isa(&self) -> Result<OwnedTargetIsa, EngineError> {
        let isa_builder = cranelift_native::builder()
            .map_err(|e| EngineError::TargetDetection(e.to_string()))?;
        let isa = isa_builder
            .finish(self.flags()?)
            .map_err(|e| EngineError::TargetDetection(e.to_string()))?;
        if isa.pointer_bits() != 64 {
            return Err(EngineError::TargetDetection(format!(
                "{} has {}-bit pointers; tagged values need 64",
                isa.triple(),
                isa.pointer_bits()
            )));
        }
        Ok(isa)
    }

    /// Runs the IR verifier over one function.
    pub fn verify(&self, function: &Function, isa: &dyn TargetIsa) -> Result<(), String> {
        if !self.verify {
            return Ok(());
        }
        cranelift_codegen::verify_function(function, isa).map_err(|errors| errors.to_string())
    }
}

impl Default for OptimizationPipeline {
    fn default() -> Self {
        OptimizationPipeline::new(OptLevel::Speed, true)
    }
}

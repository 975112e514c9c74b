//! Engine and session configuration

use serde::{Deserialize, Serialize};
use std::thread;

use crate::error::SessionResult;
use crate::pipeline::{OptLevel, OptimizationPipeline};

/// Compilation engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Background threads materializing units; at least one is started
    pub worker_threads: usize,
    /// Optimization level of the pipeline
    pub opt_level: OptLevel,
    /// Whether units are run through the IR verifier
    pub verify: bool,
}

impl EngineConfig {
    /// Sets the worker count.
    pub fn with_worker_threads(mut self, workers: usize) -> Self {
        self.worker_threads = workers;
        self
    }

    /// Sets the optimization level.
    pub fn with_opt_level(mut self, opt_level: OptLevel) -> Self {
        self.opt_level = opt_level;
        self
    }

    /// Enables or disables IR verification.
    pub fn with_verification(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// The optimization pipeline these settings describe.
    pub fn pipeline(&self) -> OptimizationPipeline {
        OptimizationPipeline::new(self.opt_level, self.verify)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            worker_threads: thread::available_parallelism().map_or(1, |n| n.get()),
            opt_level: OptLevel::default(),
            verify: true,
        }
    }
}

/// Session settings.
///
/// # Example
///
/// ```
/// use jit_compiler::SessionConfig;
///
/// let config = SessionConfig::from_json(r#"{ "max_call_depth": 64 }"#).unwrap();
/// assert_eq!(config.max_call_depth, 64);
/// assert!(config.engine.verify);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Engine settings
    pub engine: EngineConfig,
    /// Nesting limit for calls before a stack overflow is reported
    pub max_call_depth: usize,
}

impl SessionConfig {
    /// Default call depth limit.
    pub const DEFAULT_MAX_CALL_DEPTH: usize = 1024;

    /// Parses a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> SessionResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Sets the engine settings.
    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    /// Sets the call depth limit.
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            engine: EngineConfig::default(),
            max_call_depth: Self::DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

//! Host-facing session
//!
//! A `Session` owns one runtime and one compilation engine and runs resolved
//! programs through them:
//! - the code generator lowers the program into a compilation unit
//! - the engine materializes the unit
//! - the unit's entry runs with the runtime activated on the calling thread
//!
//! Globals, interned strings and classes persist across submissions.

use ast::{Expr, Stmt};
use core_types::Value;
use std::io::Write;
use tracing::{debug, trace};

use crate::codegen::CodeGenerator;
use crate::config::SessionConfig;
use crate::engine::{Engine, EngineStats};
use crate::error::{SessionError, SessionResult};
use crate::runtime::{CacheStats, Runtime};
use crate::runtime_support;

/// A runtime and engine pair executing resolved programs.
pub struct Session {
    /// Heap, globals and state shared with generated code
    runtime: Runtime,
    /// Compilation engine
    engine: Engine,
    /// Number of units submitted so far; names the next unit
    submissions: usize,
    config: SessionConfig,
}

impl Session {
    /// Create a session with default settings
    ///
    /// # Errors
    /// Returns `SessionError::Engine` if the host target is unsupported
    ///
    /// # Example
    /// ```
    /// use jit_compiler::Session;
    ///
    /// let session = Session::new().unwrap();
    /// assert!(session.global("clock").is_some());
    /// ```
    pub fn new() -> SessionResult<Self> {
        Self::with_config(SessionConfig::default())
    }

    /// Create a session with explicit settings
    pub fn with_config(config: SessionConfig) -> SessionResult<Self> {
        let runtime = Runtime::new(config.max_call_depth)?;
        let engine = Engine::new(config.engine.clone(), runtime_support::host_symbols())?;
        debug!(target = %engine.target(), max_call_depth = config.max_call_depth, "session created");
        Ok(Session {
            runtime,
            engine,
            submissions: 0,
            config,
        })
    }

    /// Redirect `print` output
    pub fn with_output(self, output: Box<dyn Write>) -> Self {
        self.runtime.set_output(output);
        self
    }

    /// Compile and run a program
    ///
    /// # Arguments
    /// * `program` - Resolved top-level statements
    ///
    /// # Returns
    /// The value of the last top-level expression statement executed, or nil
    ///
    /// # Errors
    /// Returns `SessionError` if lowering or compilation fails, or if the
    /// program raises a runtime error
    ///
    /// # Example
    /// ```
    /// use ast::{BinaryOp, Expr, Stmt};
    /// use jit_compiler::Session;
    ///
    /// let mut session = Session::new().unwrap();
    /// let program = vec![Stmt::expression(Expr::binary(
    ///     BinaryOp::Multiply,
    ///     Expr::number(6.0),
    ///     Expr::number(7.0),
    /// ))];
    /// let value = session.run(&program).unwrap();
    /// assert_eq!(value.as_number().unwrap(), 42.0);
    /// ```
    pub fn run(&mut self, program: &[Stmt]) -> SessionResult<Value> {
        let name = self.next_unit_name();
        let unit = CodeGenerator::new(&self.runtime, self.engine.call_conv()).compile_script(&name, program)?;
        self.execute(&name, unit)
    }

    /// Compile and evaluate a single expression
    pub fn evaluate(&mut self, expr: &Expr) -> SessionResult<Value> {
        let name = self.next_unit_name();
        let unit = CodeGenerator::new(&self.runtime, self.engine.call_conv()).compile_expression(&name, expr)?;
        self.execute(&name, unit)
    }

    fn next_unit_name(&mut self) -> String {
        let name = format!("__script{}", self.submissions);
        self.submissions += 1;
        name
    }

    fn execute(&mut self, name: &str, unit: crate::unit::CompilationUnit) -> SessionResult<Value> {
        self.engine.add_unit(unit)?;
        let entry = self.engine.lookup(name)?;

        let value = {
            let _active = self.runtime.activate();
            // SAFETY: the unit was generated against this runtime, which stays
            // active for the duration of the call.
            unsafe { entry.invoke() }
        };

        match self.runtime.take_error() {
            Some(error) => {
                debug!(unit = name, %error, "script raised a runtime error");
                Err(SessionError::Runtime(error))
            }
            None => {
                trace!(unit = name, heap_objects = self.runtime.heap_len(), "script finished");
                Ok(value)
            }
        }
    }

    /// The `print` rendering of a value
    pub fn render(&self, value: Value) -> String {
        self.runtime.render(value)
    }

    /// Current value of a global
    pub fn global(&self, name: &str) -> Option<Value> {
        self.runtime.global(name)
    }

    /// Inline-cache counters accumulated over every submission
    pub fn cache_stats(&self) -> CacheStats {
        self.runtime.cache_stats()
    }

    /// Engine counters
    pub fn engine_stats(&self) -> EngineStats {
        self.engine.stats()
    }

    /// The runtime
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// The compilation engine
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// The settings the session was created with
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("engine", &self.engine)
            .field("submissions", &self.submissions)
            .field("config", &self.config)
            .finish()
    }
}

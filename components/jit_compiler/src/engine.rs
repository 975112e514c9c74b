//! The compilation engine.
//!
//! The engine detects the host target once, accepts closed compilation units,
//! materializes them into executable code on a pool of background workers and
//! resolves exported names to entry points.
//!
//! `add_unit` never waits for compilation. `lookup` blocks until the unit
//! owning the requested name has been materialized (or has failed), and only
//! that unit: lookups of other names proceed as soon as their own unit is
//! ready. Materialized code stays mapped until the engine is dropped.

use cranelift_codegen::ir::{Function, UserExternalName, UserFuncName};
use cranelift_codegen::isa::{CallConv, OwnedTargetIsa};
use cranelift_jit::{JITBuilder, JITModule};
use cranelift_module::{FuncId, Module};
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::any::Any;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

use core_types::Value;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::pipeline::OptimizationPipeline;
use crate::unit::{CompilationUnit, Declaration, Definition, Linkage};

/// Identifier of a submitted unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnitId(usize);

impl UnitId {
    /// Submission order of the unit.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Host routines every unit may import by name.
#[derive(Debug, Clone, Default)]
pub struct HostSymbols {
    addresses: HashMap<String, usize>,
}

impl HostSymbols {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a routine.
    pub fn with(mut self, name: impl Into<String>, address: *const u8) -> Self {
        self.insert(name, address);
        self
    }

    /// Adds or replaces a routine.
    pub fn insert(&mut self, name: impl Into<String>, address: *const u8) {
        self.addresses.insert(name.into(), address as usize);
    }

    /// Address of `name`, if registered.
    pub fn resolve(&self, name: &str) -> Option<*const u8> {
        self.addresses.get(name).map(|&address| address as *const u8)
    }

    /// Number of registered routines.
    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    /// True when no routine is registered.
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

/// Description of the detected host target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetDescription {
    /// Target triple
    pub triple: String,
    /// Pointer width in bits
    pub pointer_bits: u8,
    /// Default calling convention used by generated code
    pub call_conv: String,
}

impl fmt::Display for TargetDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}-bit, {})",
            self.triple, self.pointer_bits, self.call_conv
        )
    }
}

/// Engine counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    /// Units accepted by `add_unit`
    pub units_submitted: u64,
    /// Units turned into executable code
    pub units_materialized: u64,
    /// Units whose materialization failed
    pub units_failed: u64,
    /// Function bodies compiled
    pub functions_compiled: u64,
}

/// Callable entry point of an exported zero-argument function.
///
/// Borrowing the engine keeps the code mapped while the entry point exists.
#[derive(Debug)]
pub struct EntryPoint<'engine> {
    name: String,
    address: usize,
    _engine: PhantomData<&'engine Engine>,
}

impl EntryPoint<'_> {
    /// Exported name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Address of the native code.
    pub fn address(&self) -> *const u8 {
        self.address as *const u8
    }

    /// Calls the entry point.
    ///
    /// # Safety
    ///
    /// The function must have been declared as `() -> i64`. Units produced by
    /// the code generator also require the runtime they were generated
    /// against to be active on the calling thread.
    pub unsafe fn invoke(&self) -> Value {
        let function: extern "C" fn() -> u64 = std::mem::transmute(self.address);
        Value::from_bits(function())
    }
}

#[derive(Debug, Clone)]
enum UnitStatus {
    Queued,
    Ready,
    Failed(String),
}

#[derive(Debug)]
struct UnitRecord {
    name: String,
    status: UnitStatus,
}

#[derive(Debug, Clone, Copy)]
enum SymbolState {
    Pending(UnitId),
    Ready(usize),
}

#[derive(Debug, Default)]
struct EngineState {
    symbols: HashMap<String, SymbolState>,
    units: Vec<UnitRecord>,
    stats: EngineStats,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<EngineState>,
    settled: Condvar,
}

impl Shared {
    fn publish(&self, id: UnitId, exports: Vec<(String, usize)>, functions: usize) {
        let mut state = self.state.lock();
        for (name, address) in exports {
            state.symbols.insert(name, SymbolState::Ready(address));
        }
        state.units[id.0].status = UnitStatus::Ready;
        state.stats.units_materialized += 1;
        state.stats.functions_compiled += functions as u64;
        drop(state);
        self.settled.notify_all();
    }

    fn fail(&self, id: UnitId, reason: String) {
        let mut state = self.state.lock();
        state.units[id.0].status = UnitStatus::Failed(reason);
        state.stats.units_failed += 1;
        drop(state);
        self.settled.notify_all();
    }
}

struct Job {
    id: UnitId,
    unit: CompilationUnit,
}

/// The just-in-time compilation engine.
///
/// Engines are independent: each owns its target description, symbol table
/// and worker pool, and several may coexist in one process.
///
/// # Example
///
/// ```
/// use jit_compiler::{EngineConfig, Engine, HostSymbols};
///
/// let engine = Engine::new(EngineConfig::default(), HostSymbols::new()).unwrap();
/// assert_eq!(engine.target().pointer_bits, 64);
/// assert!(engine.lookup("missing").is_err());
/// ```
pub struct Engine {
    isa: OwnedTargetIsa,
    pipeline: OptimizationPipeline,
    target: TargetDescription,
    shared: Arc<Shared>,
    queue: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl Engine {
    /// Detects the host target and starts the worker pool.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::TargetDetection`] or
    /// [`EngineError::Configuration`] when no usable target can be built.
    pub fn new(config: EngineConfig, host: HostSymbols) -> Result<Self, EngineError> {
        let pipeline = config.pipeline();
        let isa = pipeline.build_isa()?;
        let target = TargetDescription {
            triple: isa.triple().to_string(),
            pointer_bits: isa.pointer_bits(),
            call_conv: isa.default_call_conv().to_string(),
        };

        let shared = Arc::new(Shared::default());
        let host = Arc::new(host);
        let (sender, receiver) = channel::unbounded::<Job>();
        let worker_count = config.worker_threads.max(1);
        let mut workers = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let (isa, host, shared, jobs) = (
                Arc::clone(&isa),
                Arc::clone(&host),
                Arc::clone(&shared),
                receiver.clone(),
            );
            // Modules never leave the thread that built them.
            let handle = thread::Builder::new()
                .name(format!("jit-worker-{}", index))
                .spawn(move || {
                    Worker {
                        isa,
                        host,
                        shared,
                        jobs,
                        modules: Vec::new(),
                    }
                    .run()
                })
                .map_err(|e| EngineError::Configuration(format!("spawning worker: {}", e)))?;
            workers.push(handle);
        }

        debug!(target = %target, workers = worker_count, "compilation engine started");
        Ok(Engine {
            isa,
            pipeline,
            target,
            shared,
            queue: Some(sender),
            workers,
        })
    }

    /// The detected host target.
    pub fn target(&self) -> &TargetDescription {
        &self.target
    }

    /// Calling convention generated code must use.
    pub fn call_conv(&self) -> CallConv {
        self.isa.default_call_conv()
    }

    /// The optimization pipeline applied to every unit.
    pub fn pipeline(&self) -> &OptimizationPipeline {
        &self.pipeline
    }

    /// Snapshot of the engine counters.
    pub fn stats(&self) -> EngineStats {
        self.shared.state.lock().stats.clone()
    }

    /// Submits a unit for background materialization.
    ///
    /// The unit is verified and its exports registered before this returns;
    /// compilation itself happens on a worker.
    ///
    /// # Errors
    ///
    /// - [`EngineError::MalformedUnit`] if the unit fails verification
    /// - [`EngineError::DuplicateSymbol`] if an export is already registered
    /// - [`EngineError::ShutDown`] if the worker pool is gone
    pub fn add_unit(&self, unit: CompilationUnit) -> Result<UnitId, EngineError> {
        self.validate(&unit)?;
        let exports: Vec<String> = unit.exports().map(str::to_string).collect();

        let id = {
            let mut state = self.shared.state.lock();
            if let Some(name) = exports.iter().find(|n| state.symbols.contains_key(*n)) {
                return Err(EngineError::DuplicateSymbol(name.clone()));
            }
            let id = UnitId(state.units.len());
            state.units.push(UnitRecord {
                name: unit.name().to_string(),
                status: UnitStatus::Queued,
            });
            for name in &exports {
                state.symbols.insert(name.clone(), SymbolState::Pending(id));
            }
            state.stats.units_submitted += 1;
            id
        };

        debug!(unit = unit.name(), exports = exports.len(), "queued compilation unit");
        let sent = match &self.queue {
            Some(queue) => queue.send(Job { id, unit }).is_ok(),
            None => false,
        };
        if !sent {
            self.shared.fail(id, "compilation engine is shut down".to_string());
            return Err(EngineError::ShutDown);
        }
        Ok(id)
    }

    /// Resolves an exported name, waiting for its unit to materialize.
    ///
    /// # Errors
    ///
    /// - [`EngineError::UnresolvedSymbol`] if no unit exports `name`
    /// - [`EngineError::Materialization`] if the owning unit failed
    pub fn lookup(&self, name: &str) -> Result<EntryPoint<'_>, EngineError> {
        let mut state = self.shared.state.lock();
        loop {
            let owner = match state.symbols.get(name) {
                None => return Err(EngineError::UnresolvedSymbol(name.to_string())),
                Some(SymbolState::Ready(address)) => {
                    return Ok(EntryPoint {
                        name: name.to_string(),
                        address: *address,
                        _engine: PhantomData,
                    })
                }
                Some(SymbolState::Pending(owner)) => *owner,
            };
            let record = &state.units[owner.0];
            if let UnitStatus::Failed(reason) = &record.status {
                return Err(EngineError::Materialization {
                    unit: record.name.clone(),
                    reason: reason.clone(),
                });
            }
            self.shared.settled.wait(&mut state);
        }
    }

    fn validate(&self, unit: &CompilationUnit) -> Result<(), EngineError> {
        let malformed = |reason: String| EngineError::MalformedUnit {
            unit: unit.name().to_string(),
            reason,
        };
        let declarations = unit.declarations();

        let mut names = HashSet::new();
        for decl in declarations {
            if decl.name.is_empty() {
                return Err(malformed("empty symbol name".to_string()));
            }
            if !names.insert(decl.name.as_str()) {
                return Err(malformed(format!("'{}' declared twice", decl.name)));
            }
        }

        let mut defined = vec![false; declarations.len()];
        for def in unit.definitions() {
            let index = def.declaration as usize;
            let decl = declarations
                .get(index)
                .ok_or_else(|| malformed(format!("definition of undeclared function {}", index)))?;
            if decl.linkage == Linkage::Import {
                return Err(malformed(format!("import '{}' has a body", decl.name)));
            }
            if std::mem::replace(&mut defined[index], true) {
                return Err(malformed(format!("'{}' defined twice", decl.name)));
            }
            if def.function.signature != decl.signature {
                return Err(malformed(format!("'{}' does not match its signature", decl.name)));
            }
            for (_, name) in def.function.params.user_named_funcs().iter() {
                if name.namespace != 0 || name.index as usize >= declarations.len() {
                    return Err(malformed(format!(
                        "'{}' references undeclared function {}:{}",
                        decl.name, name.namespace, name.index
                    )));
                }
            }
            self.pipeline
                .verify(&def.function, &*self.isa)
                .map_err(|errors| malformed(format!("'{}': {}", decl.name, errors)))?;
        }

        for (decl, defined) in declarations.iter().zip(defined) {
            if decl.linkage != Linkage::Import && !defined {
                return Err(malformed(format!("'{}' has no body", decl.name)));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("target", &self.target)
            .field("workers", &self.workers.len())
            .finish()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.queue.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                warn!("compilation worker panicked");
            }
        }
    }
}

struct Worker {
    isa: OwnedTargetIsa,
    host: Arc<HostSymbols>,
    shared: Arc<Shared>,
    jobs: Receiver<Job>,
    /// Every module this worker materialized; dropping one would unmap code
    /// that entry points may still reference.
    modules: Vec<JITModule>,
}

impl Worker {
    fn run(mut self) {
        while let Ok(Job { id, unit }) = self.jobs.recv() {
            let name = unit.name().to_string();
            match guarded(|| self.materialize(unit)) {
                Ok((module, exports, functions)) => {
                    debug!(unit = %name, functions, "materialized compilation unit");
                    self.modules.push(module);
                    self.shared.publish(id, exports, functions);
                }
                Err(reason) => {
                    warn!(unit = %name, %reason, "materialization failed");
                    self.shared.fail(id, reason);
                }
            }
        }
    }

    fn materialize(
        &self,
        unit: CompilationUnit,
    ) -> Result<(JITModule, Vec<(String, usize)>, usize), String> {
        let mut builder =
            JITBuilder::with_isa(Arc::clone(&self.isa), cranelift_module::default_libcall_names());
        let host = Arc::clone(&self.host);
        builder.symbol_lookup_fn(Box::new(move |name| host.resolve(name)));
        let mut module = JITModule::new(builder);

        let (_, declarations, definitions) = unit.into_parts();
        if let Some(missing) = declarations
            .iter()
            .find(|decl| decl.linkage == Linkage::Import && self.host.resolve(&decl.name).is_none())
        {
            return Err(format!("no host routine named '{}'", missing.name));
        }
        let ids = declare_all(&mut module, &declarations)?;

        let mut ctx = module.make_context();
        let functions = definitions.len();
        for Definition {
            declaration,
            mut function,
        } in definitions
        {
            let id = ids[declaration as usize];
            remap_references(&mut function, &ids);
            function.name = UserFuncName::user(0, id.as_u32());
            ctx.func = function;
            module
                .define_function(id, &mut ctx)
                .map_err(|e| format!("defining '{}': {}", declarations[declaration as usize].name, e))?;
            module.clear_context(&mut ctx);
        }
        module.finalize_definitions().map_err(|e| e.to_string())?;

        let exports = declarations
            .iter()
            .zip(&ids)
            .filter(|(decl, _)| decl.linkage == Linkage::Export)
            .map(|(decl, &id)| (decl.name.clone(), module.get_finalized_function(id) as usize))
            .collect();
        Ok((module, exports, functions))
    }
}

/// Runs one materialization, turning a panic inside the code generator
/// backend into an ordinary failure so the unit still settles and the worker
/// keeps serving its queue.
fn guarded<T>(job: impl FnOnce() -> Result<T, String>) -> Result<T, String> {
    panic::catch_unwind(AssertUnwindSafe(job))
        .unwrap_or_else(|payload| Err(format!("compiler panicked: {}", panic_message(&*payload))))
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown cause"
    }
}

fn declare_all(module: &mut JITModule, declarations: &[Declaration]) -> Result<Vec<FuncId>, String> {
    declarations
        .iter()
        .map(|decl| {
            module
                .declare_function(&decl.name, decl.linkage.into(), &decl.signature)
                .map_err(|e| format!("declaring '{}': {}", decl.name, e))
        })
        .collect()
}

/// Rewrites declaration-table indices into this module's function ids.
fn remap_references(function: &mut Function, ids: &[FuncId]) {
    let references: Vec<_> = function
        .params
        .user_named_funcs()
        .iter()
        .map(|(reference, name)| (reference, name.index))
        .collect();
    for (reference, index) in references {
        let id = ids[index as usize];
        function
            .params
            .reset_user_func_name(reference, UserExternalName::new(0, id.as_u32()));
    }
}

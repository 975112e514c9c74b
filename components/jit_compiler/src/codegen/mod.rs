//! Lowering of resolved syntax trees to Cranelift IR.
//!
//! One call to [`CodeGenerator::compile_script`] produces one closed
//! [`CompilationUnit`]: an exported zero-argument entry function plus one
//! local function per function or method declaration in the program, and an
//! import for each runtime helper the code calls.
//!
//! Values are tagged 64-bit words throughout. Every compiled function uses
//! the uniform signature `(closure, receiver, arg0, ..) -> value`, so any
//! function value can be called indirectly once the runtime has resolved its
//! entry address.

mod capture;
mod function;
mod helpers;
mod scope;
mod tagging;

pub use helpers::Helper;

use ast::{Expr, Stmt};
use cranelift_codegen::ir::{types, AbiParam, Function, Signature, UserFuncName};
use cranelift_codegen::isa::CallConv;
use cranelift_frontend::{FunctionBuilder, FunctionBuilderContext, Variable};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::error::CodegenError;
use crate::runtime::Runtime;
use crate::unit::{CompilationUnit, DeclIndex, Linkage};
use function::{FunctionCompiler, FunctionKind};
use scope::{DeclKey, ScopeStack};

/// Most parameters or arguments a call may have.
pub const MAX_ARITY: usize = 255;

/// Lowers programs into compilation units for one runtime.
///
/// Constants, global slots, prototypes and inline-cache sites are registered
/// in the runtime while lowering, so the resulting units must run against
/// that same runtime.
#[derive(Debug, Clone, Copy)]
pub struct CodeGenerator<'rt> {
    runtime: &'rt Runtime,
    call_conv: CallConv,
}

impl<'rt> CodeGenerator<'rt> {
    /// Creates a generator emitting code for `call_conv`, normally
    /// [`Engine::call_conv`](crate::Engine::call_conv).
    pub fn new(runtime: &'rt Runtime, call_conv: CallConv) -> Self {
        CodeGenerator { runtime, call_conv }
    }

    /// Wraps a statement sequence into a unit exporting `name` as a
    /// zero-argument function. The function returns the value of the last
    /// top-level expression statement executed, or nil.
    ///
    /// # Errors
    ///
    /// Fails on trees that break the resolver's guarantees.
    pub fn compile_script(&self, name: &str, program: &[Stmt]) -> Result<CompilationUnit, CodegenError> {
        let mut ctx = UnitContext {
            runtime: self.runtime,
            call_conv: self.call_conv,
            unit: CompilationUnit::new(name),
            helpers: HashMap::new(),
            scopes: ScopeStack::default(),
            bindings: HashMap::new(),
            captured: capture::analyze(program),
            next_frame: 1,
            functions: 0,
        };

        let mut signature = Signature::new(self.call_conv);
        signature.returns.push(AbiParam::new(types::I64));
        let index = ctx.unit.declare(name, Linkage::Export, signature.clone());
        let mut function = Function::with_name_signature(UserFuncName::user(0, index), signature);
        let mut builder_ctx = FunctionBuilderContext::new();
        {
            let builder = FunctionBuilder::new(&mut function, &mut builder_ctx);
            FunctionCompiler::new(&mut ctx, builder, 0, FunctionKind::Script).compile_script(program)?;
        }
        ctx.unit.define(index, function);

        debug!(
            unit = name,
            functions = ctx.unit.definitions().len(),
            imports = ctx.helpers.len(),
            "generated compilation unit"
        );
        Ok(ctx.unit)
    }

    /// Wraps a single expression; the unit's function returns its value.
    ///
    /// # Errors
    ///
    /// Fails on trees that break the resolver's guarantees.
    pub fn compile_expression(&self, name: &str, expr: &Expr) -> Result<CompilationUnit, CodegenError> {
        self.compile_script(name, &[Stmt::Expression(expr.clone())])
    }
}

#[derive(Debug, Clone, Copy)]
enum Storage {
    /// SSA variable holding the value
    Direct(Variable),
    /// SSA variable holding the cell the value lives in
    Boxed(Variable),
}

#[derive(Debug, Clone, Copy)]
struct Binding {
    frame: usize,
    storage: Storage,
}

/// A function body emitted into the unit.
struct CompiledFunction {
    declaration: DeclIndex,
    /// Declarations whose cells the closure must carry, in cell order
    upvalues: Vec<DeclKey>,
}

/// State shared by every function of the unit being generated.
struct UnitContext<'rt> {
    runtime: &'rt Runtime,
    call_conv: CallConv,
    unit: CompilationUnit,
    helpers: HashMap<Helper, DeclIndex>,
    scopes: ScopeStack,
    bindings: HashMap<DeclKey, Binding>,
    captured: HashSet<DeclKey>,
    next_frame: usize,
    functions: usize,
}

impl<'rt> UnitContext<'rt> {
    fn signature(&self, params: usize) -> Signature {
        let mut signature = Signature::new(self.call_conv);
        signature
            .params
            .extend(std::iter::repeat(AbiParam::new(types::I64)).take(params));
        signature.returns.push(AbiParam::new(types::I64));
        signature
    }

    /// Signature of a compiled function with `arity` parameters.
    fn function_signature(&self, arity: usize) -> Signature {
        self.signature(arity + 2)
    }

    fn helper_declaration(&mut self, helper: Helper) -> DeclIndex {
        if let Some(&index) = self.helpers.get(&helper) {
            return index;
        }
        let signature = self.signature(helper.arity());
        let index = self.unit.declare(helper.symbol(), Linkage::Import, signature);
        self.helpers.insert(helper, index);
        index
    }

    fn compile_function(
        &mut self,
        decl: &ast::FunctionDecl,
        kind: FunctionKind,
    ) -> Result<CompiledFunction, CodegenError> {
        if decl.params.len() > MAX_ARITY {
            return Err(CodegenError::TooManyArguments {
                what: "parameters",
                line: decl.name.line,
            });
        }
        let frame = self.next_frame;
        self.next_frame += 1;
        let symbol = format!("{}::{}#{}", self.unit.name(), decl.name.name, self.functions);
        self.functions += 1;

        let signature = self.function_signature(decl.params.len());
        let declaration = self.unit.declare(symbol, Linkage::Local, signature.clone());
        let mut function =
            Function::with_name_signature(UserFuncName::user(0, declaration), signature);
        let mut builder_ctx = FunctionBuilderContext::new();
        let upvalues = {
            let builder = FunctionBuilder::new(&mut function, &mut builder_ctx);
            FunctionCompiler::new(self, builder, frame, kind).compile_function(decl)?
        };
        self.unit.define(declaration, function);
        Ok(CompiledFunction {
            declaration,
            upvalues,
        })
    }
}

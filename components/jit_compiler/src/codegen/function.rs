//! Lowering of one function body.

use ast::{
    BinaryOp, ClassDecl, Expr, FunctionDecl, Identifier, Literal, LogicalOp, Resolution, Stmt,
    UnaryOp,
};
use core_types::{Value, NIL_BITS};
use cranelift_codegen::ir::condcodes::{FloatCC, IntCC};
use cranelift_codegen::ir::{
    types, Block, ExtFuncData, ExternalName, FuncRef, InstBuilder, MemFlags, SigRef,
    StackSlotData, StackSlotKind, UserExternalName, Value as IrValue,
};
use cranelift_frontend::{FunctionBuilder, Variable};
use memory_manager::Instance;
use std::collections::HashMap;

use super::helpers::Helper;
use super::scope::DeclKey;
use super::{tagging, Binding, Storage, UnitContext, MAX_ARITY};
use crate::error::CodegenError;
use crate::runtime::{CallTarget, HotState, PropertySite, SiteKind};
use crate::unit::DeclIndex;

type CodegenResult<T> = Result<T, CodegenError>;

/// What a function body is compiled as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum FunctionKind {
    /// The unit's zero-argument entry
    Script,
    /// Function declaration
    Function,
    /// Method other than `init`
    Method,
    /// `init`; always returns the receiver
    Initializer,
}

impl FunctionKind {
    fn has_receiver(self) -> bool {
        matches!(self, FunctionKind::Method | FunctionKind::Initializer)
    }
}

pub(super) struct FunctionCompiler<'a, 'rt> {
    ctx: &'a mut UnitContext<'rt>,
    builder: FunctionBuilder<'a>,
    frame: usize,
    kind: FunctionKind,
    closure: IrValue,
    receiver: IrValue,
    params: Vec<IrValue>,
    exit: Block,
    error: Option<Block>,
    /// Outer declarations reached through the closure's cells, in cell order.
    upvalues: Vec<DeclKey>,
    helper_refs: HashMap<Helper, FuncRef>,
    call_signatures: HashMap<usize, SigRef>,
    next_variable: u32,
    /// Value of the last top-level expression statement (scripts only).
    result: Option<Variable>,
}

impl<'a, 'rt> FunctionCompiler<'a, 'rt> {
    pub(super) fn new(
        ctx: &'a mut UnitContext<'rt>,
        mut builder: FunctionBuilder<'a>,
        frame: usize,
        kind: FunctionKind,
    ) -> Self {
        let entry = builder.create_block();
        builder.append_block_params_for_function_params(entry);
        builder.switch_to_block(entry);
        builder.seal_block(entry);

        let incoming = builder.block_params(entry).to_vec();
        let (closure, receiver, params) = match incoming.as_slice() {
            [closure, receiver, params @ ..] => (*closure, *receiver, params.to_vec()),
            _ => {
                let nil = builder.ins().iconst(types::I64, NIL_BITS as i64);
                (nil, nil, Vec::new())
            }
        };
        let exit = builder.create_block();
        builder.append_block_param(exit, types::I64);

        FunctionCompiler {
            ctx,
            builder,
            frame,
            kind,
            closure,
            receiver,
            params,
            exit,
            error: None,
            upvalues: Vec::new(),
            helper_refs: HashMap::new(),
            call_signatures: HashMap::new(),
            next_variable: 0,
            result: None,
        }
    }

    /// Emits the unit entry for a top-level statement sequence.
    pub(super) fn compile_script(mut self, program: &[Stmt]) -> CodegenResult<()> {
        self.prologue();
        let result = self.new_variable();
        let nil = self.nil();
        self.builder.def_var(result, nil);
        self.result = Some(result);

        self.statements(program)?;
        let value = self.builder.use_var(result);
        self.finish(value);
        Ok(())
    }

    /// Emits a function or method body and returns the declarations its
    /// closure must capture.
    pub(super) fn compile_function(mut self, decl: &FunctionDecl) -> CodegenResult<Vec<DeclKey>> {
        self.prologue();
        if self.kind.has_receiver() {
            self.ctx.scopes.push(self.frame);
            let receiver = self.receiver;
            self.declare_local("this", DeclKey::this(decl), receiver);
        }
        self.ctx.scopes.push(self.frame);
        let params = self.params.clone();
        for (param, value) in decl.params.iter().zip(params) {
            self.declare_local(&param.name, DeclKey::name(param), value);
        }

        self.statements(&decl.body)?;

        self.ctx.scopes.pop();
        if self.kind.has_receiver() {
            self.ctx.scopes.pop();
        }
        let value = self.default_return();
        Ok(self.finish(value))
    }

    // ----- frame -----

    fn prologue(&mut self) {
        let depth = self.adjust_depth(1);
        let hot = self.hot_state();
        let limit = self.builder.ins().load(
            types::I64,
            MemFlags::trusted(),
            hot,
            HotState::MAX_CALL_DEPTH_OFFSET,
        );
        let overflow = self.builder.ins().icmp(IntCC::UnsignedGreaterThan, depth, limit);

        let overflow_block = self.builder.create_block();
        let body = self.builder.create_block();
        self.builder.ins().brif(overflow, overflow_block, &[], body, &[]);

        self.builder.switch_to_block(overflow_block);
        let nil = self.emit_helper(Helper::StackOverflow, &[]);
        self.builder.ins().jump(self.exit, &[nil]);

        self.builder.switch_to_block(body);
    }

    fn adjust_depth(&mut self, delta: i64) -> IrValue {
        let hot = self.hot_state();
        let depth = self.builder.ins().load(
            types::I64,
            MemFlags::trusted(),
            hot,
            HotState::CALL_DEPTH_OFFSET,
        );
        let depth = self.builder.ins().iadd_imm(depth, delta);
        self.builder
            .ins()
            .store(MemFlags::trusted(), depth, hot, HotState::CALL_DEPTH_OFFSET);
        depth
    }

    fn finish(mut self, value: IrValue) -> Vec<DeclKey> {
        self.builder.ins().jump(self.exit, &[value]);

        if let Some(error) = self.error {
            self.builder.switch_to_block(error);
            let nil = self.nil();
            self.builder.ins().jump(self.exit, &[nil]);
        }

        self.builder.switch_to_block(self.exit);
        let result = self.builder.block_params(self.exit)[0];
        self.adjust_depth(-1);
        self.builder.ins().return_(&[result]);

        self.builder.seal_all_blocks();
        self.builder.finalize();
        self.upvalues
    }

    fn default_return(&mut self) -> IrValue {
        match self.kind {
            FunctionKind::Initializer => self.receiver,
            _ => self.nil(),
        }
    }

    fn error_block(&mut self) -> Block {
        match self.error {
            Some(block) => block,
            None => {
                let block = self.builder.create_block();
                self.error = Some(block);
                block
            }
        }
    }

    /// Leaves the function through the error block when a runtime error is
    /// pending.
    fn check_pending(&mut self) {
        let hot = self.hot_state();
        let pending = self.builder.ins().load(
            types::I64,
            MemFlags::trusted(),
            hot,
            HotState::PENDING_ERROR_OFFSET,
        );
        let error = self.error_block();
        let next = self.builder.create_block();
        self.builder.ins().brif(pending, error, &[], next, &[]);
        self.builder.switch_to_block(next);
    }

    // ----- constants and imports -----

    fn constant(&mut self, bits: u64) -> IrValue {
        self.builder.ins().iconst(types::I64, bits as i64)
    }

    fn nil(&mut self) -> IrValue {
        self.constant(NIL_BITS)
    }

    fn hot_state(&mut self) -> IrValue {
        let address = self.ctx.runtime.hot_state_address();
        self.builder.ins().iconst(types::I64, address)
    }

    fn symbol_constant(&mut self, name: &str) -> IrValue {
        let symbol = self.ctx.runtime.intern_symbol(name);
        self.constant(symbol.as_u32() as u64)
    }

    fn new_variable(&mut self) -> Variable {
        let variable = Variable::from_u32(self.next_variable);
        self.next_variable += 1;
        self.builder.declare_var(variable, types::I64);
        variable
    }

    fn import_declaration(&mut self, declaration: DeclIndex, params: usize) -> FuncRef {
        let signature = self.builder.import_signature(self.ctx.signature(params));
        let name = self
            .builder
            .func
            .declare_imported_user_function(UserExternalName::new(0, declaration));
        self.builder.import_function(ExtFuncData {
            name: ExternalName::user(name),
            signature,
            colocated: false,
        })
    }

    fn emit_helper(&mut self, helper: Helper, args: &[IrValue]) -> IrValue {
        let function = match self.helper_refs.get(&helper) {
            Some(&function) => function,
            None => {
                let declaration = self.ctx.helper_declaration(helper);
                let function = self.import_declaration(declaration, helper.arity());
                self.helper_refs.insert(helper, function);
                function
            }
        };
        let call = self.builder.ins().call(function, args);
        self.builder.inst_results(call)[0]
    }

    fn call_helper(&mut self, helper: Helper, args: &[IrValue]) -> IrValue {
        let result = self.emit_helper(helper, args);
        if helper.fallible() {
            self.check_pending();
        }
        result
    }

    fn call_signature(&mut self, arity: usize) -> SigRef {
        if let Some(&signature) = self.call_signatures.get(&arity) {
            return signature;
        }
        let signature = self
            .builder
            .import_signature(self.ctx.function_signature(arity));
        self.call_signatures.insert(arity, signature);
        signature
    }

    // ----- variables -----

    fn declare_local(&mut self, name: &str, key: DeclKey, value: IrValue) {
        let variable = self.new_variable();
        let storage = if self.ctx.captured.contains(&key) {
            let cell = self.call_helper(Helper::NewCell, &[value]);
            self.builder.def_var(variable, cell);
            Storage::Boxed(variable)
        } else {
            self.builder.def_var(variable, value);
            Storage::Direct(variable)
        };
        self.ctx.bindings.insert(
            key,
            Binding {
                frame: self.frame,
                storage,
            },
        );
        self.ctx.scopes.declare(name, key);
    }

    fn define_global(&mut self, name: &str, value: IrValue) {
        let slot = self.ctx.runtime.global_slot(name);
        let slot = self.constant(slot as u64);
        self.call_helper(Helper::GlobalDefine, &[slot, value]);
    }

    fn global_slot(&mut self, name: &str) -> IrValue {
        let slot = self.ctx.runtime.global_slot(name);
        self.constant(slot as u64)
    }

    fn resolve(&self, name: &Identifier, depth: usize) -> CodegenResult<DeclKey> {
        self.ctx
            .scopes
            .resolve(&name.name, depth)
            .map(|(_, key)| key)
            .ok_or_else(|| CodegenError::UnresolvedLocal {
                name: name.name.clone(),
                depth,
                line: name.line,
            })
    }

    fn binding(&self, key: DeclKey) -> CodegenResult<Binding> {
        self.ctx
            .bindings
            .get(&key)
            .copied()
            .ok_or_else(|| CodegenError::CaptureMismatch(format!("{:?}", key)))
    }

    /// The cell holding a captured declaration, as seen from this function.
    fn cell_of(&mut self, key: DeclKey) -> CodegenResult<IrValue> {
        let binding = self.binding(key)?;
        match binding.storage {
            Storage::Boxed(variable) if binding.frame == self.frame => {
                Ok(self.builder.use_var(variable))
            }
            Storage::Boxed(_) => {
                let index = match self.upvalues.iter().position(|&k| k == key) {
                    Some(index) => index,
                    None => {
                        self.upvalues.push(key);
                        self.upvalues.len() - 1
                    }
                };
                let index = self.constant(index as u64);
                let closure = self.closure;
                Ok(self.call_helper(Helper::ClosureCell, &[closure, index]))
            }
            Storage::Direct(_) => Err(CodegenError::CaptureMismatch(format!("{:?}", key))),
        }
    }

    fn read_key(&mut self, key: DeclKey) -> CodegenResult<IrValue> {
        let binding = self.binding(key)?;
        match binding.storage {
            Storage::Direct(variable) if binding.frame == self.frame => {
                Ok(self.builder.use_var(variable))
            }
            _ => {
                let cell = self.cell_of(key)?;
                Ok(self.call_helper(Helper::CellGet, &[cell]))
            }
        }
    }

    fn assign_key(&mut self, key: DeclKey, value: IrValue) -> CodegenResult<()> {
        let binding = self.binding(key)?;
        match binding.storage {
            Storage::Direct(variable) if binding.frame == self.frame => {
                self.builder.def_var(variable, value);
            }
            _ => {
                let cell = self.cell_of(key)?;
                self.call_helper(Helper::CellSet, &[cell, value]);
            }
        }
        Ok(())
    }

    fn read_variable(&mut self, name: &Identifier, resolution: Resolution) -> CodegenResult<IrValue> {
        match resolution {
            Resolution::Global => {
                let slot = self.global_slot(&name.name);
                Ok(self.call_helper(Helper::GlobalGet, &[slot]))
            }
            Resolution::Local { depth } => {
                let key = self.resolve(name, depth)?;
                self.read_key(key)
            }
        }
    }

    fn assign_variable(
        &mut self,
        name: &Identifier,
        resolution: Resolution,
        value: IrValue,
    ) -> CodegenResult<()> {
        match resolution {
            Resolution::Global => {
                let slot = self.global_slot(&name.name);
                self.call_helper(Helper::GlobalSet, &[slot, value]);
                Ok(())
            }
            Resolution::Local { depth } => {
                let key = self.resolve(name, depth)?;
                self.assign_key(key, value)
            }
        }
    }

    /// `this` or `super` at `depth`.
    fn read_receiver(&mut self, keyword: &Identifier, name: &str, depth: usize) -> CodegenResult<IrValue> {
        let invalid = || CodegenError::InvalidReceiver {
            keyword: keyword.name.clone(),
            line: keyword.line,
        };
        let (_, key) = self.ctx.scopes.resolve(name, depth).ok_or_else(invalid)?;
        self.read_key(key)
    }

    // ----- statements -----

    fn statements(&mut self, statements: &[Stmt]) -> CodegenResult<()> {
        statements.iter().try_for_each(|statement| self.statement(statement))
    }

    fn statement(&mut self, statement: &Stmt) -> CodegenResult<()> {
        match statement {
            Stmt::Expression(expr) => {
                let value = self.expr(expr)?;
                if let Some(result) = self.result {
                    if self.ctx.scopes.is_empty() {
                        self.builder.def_var(result, value);
                    }
                }
            }
            Stmt::Print(expr) => {
                let value = self.expr(expr)?;
                self.call_helper(Helper::Print, &[value]);
            }
            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(initializer) => self.expr(initializer)?,
                    None => self.nil(),
                };
                if self.ctx.scopes.is_empty() {
                    self.define_global(&name.name, value);
                } else {
                    self.declare_local(&name.name, DeclKey::name(name), value);
                }
            }
            Stmt::Block(statements) => {
                self.ctx.scopes.push(self.frame);
                self.statements(statements)?;
                self.ctx.scopes.pop();
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let condition = self.expr(condition)?;
                let falsy = tagging::is_falsy(&mut self.builder, condition);
                let then_block = self.builder.create_block();
                let else_block = self.builder.create_block();
                let merge = self.builder.create_block();
                self.builder
                    .ins()
                    .brif(falsy, else_block, &[], then_block, &[]);

                self.builder.switch_to_block(then_block);
                self.statement(then_branch)?;
                self.builder.ins().jump(merge, &[]);

                self.builder.switch_to_block(else_block);
                if let Some(else_branch) = else_branch {
                    self.statement(else_branch)?;
                }
                self.builder.ins().jump(merge, &[]);

                self.builder.switch_to_block(merge);
            }
            Stmt::While { condition, body } => {
                let header = self.builder.create_block();
                let body_block = self.builder.create_block();
                let done = self.builder.create_block();
                self.builder.ins().jump(header, &[]);

                self.builder.switch_to_block(header);
                let condition = self.expr(condition)?;
                let falsy = tagging::is_falsy(&mut self.builder, condition);
                self.builder.ins().brif(falsy, done, &[], body_block, &[]);

                self.builder.switch_to_block(body_block);
                self.statement(body)?;
                self.builder.ins().jump(header, &[]);

                self.builder.switch_to_block(done);
            }
            Stmt::Function(decl) => {
                if self.ctx.scopes.is_empty() {
                    let closure = self.closure(decl, FunctionKind::Function)?;
                    self.define_global(&decl.name.name, closure);
                } else {
                    // Declared before the body so the function can call itself.
                    let key = DeclKey::name(&decl.name);
                    let nil = self.nil();
                    self.declare_local(&decl.name.name, key, nil);
                    let closure = self.closure(decl, FunctionKind::Function)?;
                    self.assign_key(key, closure)?;
                }
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(value) => self.expr(value)?,
                    None => self.default_return(),
                };
                self.builder.ins().jump(self.exit, &[value]);
                let unreachable = self.builder.create_block();
                self.builder.switch_to_block(unreachable);
            }
            Stmt::Class(class) => self.class(class)?,
        }
        Ok(())
    }

    fn class(&mut self, class: &ClassDecl) -> CodegenResult<()> {
        let global = self.ctx.scopes.is_empty();
        let key = DeclKey::name(&class.name);
        if !global {
            let nil = self.nil();
            self.declare_local(&class.name.name, key, nil);
        }

        let (has_superclass, superclass) = match &class.superclass {
            Some(superclass) => (1, self.expr(superclass)?),
            None => (0, self.nil()),
        };
        let name = self.symbol_constant(&class.name.name);
        let has_superclass = self.constant(has_superclass);
        let value = self.call_helper(Helper::NewClass, &[name, has_superclass, superclass]);
        if global {
            self.define_global(&class.name.name, value);
        } else {
            self.assign_key(key, value)?;
        }

        if class.superclass.is_some() {
            self.ctx.scopes.push(self.frame);
            self.declare_local("super", DeclKey::superclass(class), superclass);
        }
        for method in &class.methods {
            let kind = if method.name.name == "init" {
                FunctionKind::Initializer
            } else {
                FunctionKind::Method
            };
            let closure = self.closure(method, kind)?;
            let name = self.symbol_constant(&method.name.name);
            self.call_helper(Helper::AddMethod, &[value, name, closure]);
        }
        if class.superclass.is_some() {
            self.ctx.scopes.pop();
        }
        Ok(())
    }

    /// Compiles `decl` into the unit and emits the creation of its closure.
    fn closure(&mut self, decl: &FunctionDecl, kind: FunctionKind) -> CodegenResult<IrValue> {
        let compiled = self.ctx.compile_function(decl, kind)?;
        let arity = decl.params.len();
        let prototype = self.ctx.runtime.register_prototype(&decl.name.name, arity);

        let function = self.import_declaration(compiled.declaration, arity + 2);
        let entry = self.builder.ins().func_addr(types::I64, function);

        let count = compiled.upvalues.len();
        let cells = if count == 0 {
            self.constant(0)
        } else {
            let slot = self.builder.create_sized_stack_slot(StackSlotData::new(
                StackSlotKind::ExplicitSlot,
                (count * 8) as u32,
                3,
            ));
            for (index, key) in compiled.upvalues.iter().enumerate() {
                let cell = self.cell_of(*key)?;
                self.builder.ins().stack_store(cell, slot, (index * 8) as i32);
            }
            self.builder.ins().stack_addr(types::I64, slot, 0)
        };

        let prototype = self.constant(prototype as u64);
        let count = self.constant(count as u64);
        Ok(self.call_helper(Helper::MakeClosure, &[prototype, entry, cells, count]))
    }

    // ----- expressions -----

    fn expr(&mut self, expr: &Expr) -> CodegenResult<IrValue> {
        match expr {
            Expr::Literal(literal) => self.literal(literal),
            Expr::Grouping(inner) => self.expr(inner),
            Expr::Unary { op, operand } => {
                let operand = self.expr(operand)?;
                Ok(match op {
                    UnaryOp::Negate => self.negate(operand),
                    UnaryOp::Not => {
                        let falsy = tagging::is_falsy(&mut self.builder, operand);
                        tagging::bool_from_flag(&mut self.builder, falsy)
                    }
                })
            }
            Expr::Binary { op, left, right } => {
                let left = self.expr(left)?;
                let right = self.expr(right)?;
                Ok(self.binary(*op, left, right))
            }
            Expr::Logical { op, left, right } => self.logical(*op, left, right),
            Expr::Variable { name, resolution } => self.read_variable(name, *resolution),
            Expr::Assign {
                name,
                value,
                resolution,
            } => {
                let value = self.expr(value)?;
                self.assign_variable(name, *resolution, value)?;
                Ok(value)
            }
            Expr::Call {
                callee,
                arguments,
                line,
            } => self.call(callee, arguments, *line),
            Expr::Get { object, name } => {
                let object = self.expr(object)?;
                Ok(self.get_property(object, &name.name))
            }
            Expr::Set {
                object,
                name,
                value,
            } => {
                let object = self.expr(object)?;
                let value = self.expr(value)?;
                Ok(self.set_property(object, &name.name, value))
            }
            Expr::This {
                keyword,
                resolution,
            } => match resolution {
                Resolution::Local { depth } => self.read_receiver(keyword, "this", *depth),
                Resolution::Global => Err(CodegenError::InvalidReceiver {
                    keyword: keyword.name.clone(),
                    line: keyword.line,
                }),
            },
            Expr::Super {
                keyword,
                method,
                resolution,
            } => {
                let depth = match resolution {
                    Resolution::Local { depth } if *depth > 0 => *depth,
                    _ => {
                        return Err(CodegenError::InvalidReceiver {
                            keyword: keyword.name.clone(),
                            line: keyword.line,
                        })
                    }
                };
                let superclass = self.read_receiver(keyword, "super", depth)?;
                let receiver = self.read_receiver(keyword, "this", depth - 1)?;
                let name = self.symbol_constant(&method.name);
                Ok(self.call_helper(Helper::GetSuper, &[superclass, receiver, name]))
            }
        }
    }

    fn literal(&mut self, literal: &Literal) -> CodegenResult<IrValue> {
        let bits = match literal {
            Literal::Nil => NIL_BITS,
            Literal::Bool(value) => Value::from_bool(*value).to_bits(),
            Literal::Number(value) => Value::from_number(*value).to_bits(),
            Literal::String(text) => self.ctx.runtime.intern_string(text)?.to_bits(),
        };
        Ok(self.constant(bits))
    }

    fn negate(&mut self, operand: IrValue) -> IrValue {
        let fast = self.builder.create_block();
        let slow = self.builder.create_block();
        let merge = self.builder.create_block();
        self.builder.append_block_param(merge, types::I64);

        let plain = tagging::is_plain_number(&mut self.builder, operand);
        self.builder.ins().brif(plain, fast, &[], slow, &[]);

        self.builder.switch_to_block(fast);
        let number = tagging::as_f64(&mut self.builder, operand);
        let negated = self.builder.ins().fneg(number);
        let result = tagging::from_f64(&mut self.builder, negated);
        self.builder.ins().jump(merge, &[result]);

        self.builder.switch_to_block(slow);
        let result = self.call_helper(Helper::Negate, &[operand]);
        self.builder.ins().jump(merge, &[result]);

        self.builder.switch_to_block(merge);
        self.builder.block_params(merge)[0]
    }

    fn binary(&mut self, op: BinaryOp, left: IrValue, right: IrValue) -> IrValue {
        let fast = self.builder.create_block();
        let slow = self.builder.create_block();
        let merge = self.builder.create_block();
        self.builder.append_block_param(merge, types::I64);

        let numbers = tagging::both_plain_numbers(&mut self.builder, left, right);
        self.builder.ins().brif(numbers, fast, &[], slow, &[]);

        self.builder.switch_to_block(fast);
        let a = tagging::as_f64(&mut self.builder, left);
        let b = tagging::as_f64(&mut self.builder, right);
        let result = match op {
            BinaryOp::Add => self.builder.ins().fadd(a, b),
            BinaryOp::Subtract => self.builder.ins().fsub(a, b),
            BinaryOp::Multiply => self.builder.ins().fmul(a, b),
            BinaryOp::Divide => self.builder.ins().fdiv(a, b),
            comparison => {
                let flag = self.builder.ins().fcmp(float_condition(comparison), a, b);
                tagging::bool_from_flag(&mut self.builder, flag)
            }
        };
        let result = match op {
            BinaryOp::Add | BinaryOp::Subtract | BinaryOp::Multiply | BinaryOp::Divide => {
                tagging::from_f64(&mut self.builder, result)
            }
            _ => result,
        };
        self.builder.ins().jump(merge, &[result]);

        self.builder.switch_to_block(slow);
        let result = match op {
            BinaryOp::Equal => self.call_helper(Helper::ValuesEqual, &[left, right]),
            BinaryOp::NotEqual => {
                let equal = self.call_helper(Helper::ValuesEqual, &[left, right]);
                self.builder.ins().bxor_imm(equal, 1)
            }
            _ => {
                let op = self.constant(op.index() as u64);
                self.call_helper(Helper::Binary, &[op, left, right])
            }
        };
        self.builder.ins().jump(merge, &[result]);

        self.builder.switch_to_block(merge);
        self.builder.block_params(merge)[0]
    }

    fn logical(&mut self, op: LogicalOp, left: &Expr, right: &Expr) -> CodegenResult<IrValue> {
        let left = self.expr(left)?;
        let rhs = self.builder.create_block();
        let merge = self.builder.create_block();
        self.builder.append_block_param(merge, types::I64);

        let falsy = tagging::is_falsy(&mut self.builder, left);
        match op {
            LogicalOp::And => self.builder.ins().brif(falsy, merge, &[left], rhs, &[]),
            LogicalOp::Or => self.builder.ins().brif(falsy, rhs, &[], merge, &[left]),
        };

        self.builder.switch_to_block(rhs);
        let right = self.expr(right)?;
        self.builder.ins().jump(merge, &[right]);

        self.builder.switch_to_block(merge);
        Ok(self.builder.block_params(merge)[0])
    }

    fn call(&mut self, callee: &Expr, arguments: &[Expr], line: u32) -> CodegenResult<IrValue> {
        if arguments.len() > MAX_ARITY {
            return Err(CodegenError::TooManyArguments {
                what: "arguments",
                line,
            });
        }
        let callee = self.expr(callee)?;
        let mut args = Vec::with_capacity(arguments.len() + 2);
        args.extend([callee, callee]);
        for argument in arguments {
            args.push(self.expr(argument)?);
        }

        let target = self.builder.create_sized_stack_slot(StackSlotData::new(
            StackSlotKind::ExplicitSlot,
            CallTarget::SIZE,
            3,
        ));
        let target_address = self.builder.ins().stack_addr(types::I64, target, 0);
        let argc = self.constant(arguments.len() as u64);
        let entry = self.call_helper(Helper::PrepareCall, &[callee, argc, target_address]);

        let ready = self.builder.create_block();
        let error = self.error_block();
        self.builder.ins().brif(entry, ready, &[], error, &[]);
        self.builder.switch_to_block(ready);

        args[0] = self
            .builder
            .ins()
            .stack_load(types::I64, target, CallTarget::CLOSURE_OFFSET);
        args[1] = self
            .builder
            .ins()
            .stack_load(types::I64, target, CallTarget::RECEIVER_OFFSET);
        let signature = self.call_signature(arguments.len());
        let call = self.builder.ins().call_indirect(signature, entry, &args);
        let result = self.builder.inst_results(call)[0];
        self.check_pending();
        Ok(result)
    }

    /// Emits the guard shared by both property paths: branches to `slow`
    /// unless `object` is an instance whose shape matches the site, and
    /// otherwise leaves the builder in a block where the returned instance
    /// and slot-array pointers are valid.
    fn cache_guard(&mut self, object: IrValue, site: i64, slow: Block) -> (IrValue, IrValue) {
        let lookup = self.builder.create_block();
        let compare = self.builder.create_block();
        let hit = self.builder.create_block();

        let is_object = tagging::is_object(&mut self.builder, object);
        self.builder.ins().brif(is_object, lookup, &[], slow, &[]);

        self.builder.switch_to_block(lookup);
        let index = tagging::object_index(&mut self.builder, object);
        let hot = self.hot_state();
        let table = self.builder.ins().load(
            types::I64,
            MemFlags::trusted(),
            hot,
            HotState::INSTANCE_TABLE_OFFSET,
        );
        let offset = self.builder.ins().ishl_imm(index, 3);
        let entry = self.builder.ins().iadd(table, offset);
        let instance = self
            .builder
            .ins()
            .load(types::I64, MemFlags::trusted(), entry, 0);
        self.builder.ins().brif(instance, compare, &[], slow, &[]);

        self.builder.switch_to_block(compare);
        let shape = self.builder.ins().load(
            types::I64,
            MemFlags::trusted(),
            instance,
            Instance::SHAPE_OFFSET as i32,
        );
        let site = self.builder.ins().iconst(types::I64, site);
        let cached = self.builder.ins().load(
            types::I64,
            MemFlags::trusted(),
            site,
            PropertySite::SHAPE_OFFSET,
        );
        let matches = self.builder.ins().icmp(IntCC::Equal, shape, cached);
        self.builder.ins().brif(matches, hit, &[], slow, &[]);

        self.builder.switch_to_block(hit);
        let slot = self.builder.ins().load(
            types::I64,
            MemFlags::trusted(),
            site,
            PropertySite::SLOT_OFFSET,
        );
        let slots = self.builder.ins().load(
            types::I64,
            MemFlags::trusted(),
            instance,
            Instance::SLOTS_OFFSET as i32,
        );
        let offset = self.builder.ins().ishl_imm(slot, 3);
        let field = self.builder.ins().iadd(slots, offset);

        let hits = self.builder.ins().load(
            types::I64,
            MemFlags::trusted(),
            site,
            PropertySite::HITS_OFFSET,
        );
        let hits = self.builder.ins().iadd_imm(hits, 1);
        self.builder
            .ins()
            .store(MemFlags::trusted(), hits, site, PropertySite::HITS_OFFSET);
        (instance, field)
    }

    fn get_property(&mut self, object: IrValue, name: &str) -> IrValue {
        let (site, address) = self.ctx.runtime.new_property_site(SiteKind::Get);
        let slow = self.builder.create_block();
        let merge = self.builder.create_block();
        self.builder.append_block_param(merge, types::I64);

        let (_, field) = self.cache_guard(object, address, slow);
        let value = self
            .builder
            .ins()
            .load(types::I64, MemFlags::trusted(), field, 0);
        self.builder.ins().jump(merge, &[value]);

        self.builder.switch_to_block(slow);
        let name = self.symbol_constant(name);
        let site = self.constant(site as u64);
        let value = self.call_helper(Helper::GetProperty, &[object, name, site]);
        self.builder.ins().jump(merge, &[value]);

        self.builder.switch_to_block(merge);
        self.builder.block_params(merge)[0]
    }

    fn set_property(&mut self, object: IrValue, name: &str, value: IrValue) -> IrValue {
        let (site, address) = self.ctx.runtime.new_property_site(SiteKind::Set);
        let slow = self.builder.create_block();
        let merge = self.builder.create_block();
        self.builder.append_block_param(merge, types::I64);

        let (_, field) = self.cache_guard(object, address, slow);
        self.builder
            .ins()
            .store(MemFlags::trusted(), value, field, 0);
        self.builder.ins().jump(merge, &[value]);

        self.builder.switch_to_block(slow);
        let name = self.symbol_constant(name);
        let site = self.constant(site as u64);
        let stored = self.call_helper(Helper::SetProperty, &[object, name, value, site]);
        self.builder.ins().jump(merge, &[stored]);

        self.builder.switch_to_block(merge);
        self.builder.block_params(merge)[0]
    }
}

fn float_condition(op: BinaryOp) -> FloatCC {
    match op {
        BinaryOp::Equal => FloatCC::Equal,
        BinaryOp::NotEqual => FloatCC::NotEqual,
        BinaryOp::Less => FloatCC::LessThan,
        BinaryOp::LessEqual => FloatCC::LessThanOrEqual,
        BinaryOp::Greater => FloatCC::GreaterThan,
        // Arithmetic operators never reach here.
        _ => FloatCC::GreaterThanOrEqual,
    }
}

// src/semantic/lowering.rs
use crate::error::compile_error::CompileError;
use crate::parser::ast::{Expr, Function, Stmt};
use crate::semantic::unit::{
    SemBlock, SemBlockId, SemFunc, SemInst, SemTerminator, SemUnit, SemValue, SlotId,
};
use std::collections::HashMap;

/// Lowers parsed functions into the flat block form. Produces diagnostics
/// for undeclared variables and duplicate declarations in the same scope.
pub fn lower_unit(functions: &[Function]) -> (SemUnit, Vec<CompileError>) {
    let mut unit = SemUnit::default();
    let mut errors = Vec::new();

    for function in functions {
        let mut lowering = FuncLowering::new(&function.name);
        lowering.lower_body(&function.body);
        let (func, mut func_errors) = lowering.finish();
        unit.funcs.push(func);
        errors.append(&mut func_errors);
    }

    (unit, errors)
}

struct FuncLowering {
    name: String,
    blocks: Vec<SemBlock>,
    current: SemBlockId,
    scopes: Vec<HashMap<String, SlotId>>,
    next_value: u32,
    next_slot: u32,
    errors: Vec<CompileError>,
}

impl FuncLowering {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            blocks: vec![SemBlock::default()],
            current: SemBlockId(0),
            scopes: vec![HashMap::new()],
            next_value: 0,
            next_slot: 0,
            errors: Vec::new(),
        }
    }

    fn finish(mut self) -> (SemFunc, Vec<CompileError>) {
        // Falling off the end of the body behaves as `return 0`.
        if matches!(self.blocks[self.current.index()].terminator, SemTerminator::None) {
            let zero = self.emit_const(0);
            self.terminate(SemTerminator::Return(Some(zero)));
        }

        let func = SemFunc {
            name: self.name,
            blocks: self.blocks,
            num_values: self.next_value,
            num_slots: self.next_slot,
        };
        (func, self.errors)
    }

    fn new_block(&mut self) -> SemBlockId {
        let id = SemBlockId(u32::try_from(self.blocks.len()).expect("block count fits in u32"));
        self.blocks.push(SemBlock::default());
        id
    }

    fn new_value(&mut self) -> SemValue {
        let value = SemValue(self.next_value);
        self.next_value += 1;
        value
    }

    fn emit(&mut self, inst: SemInst) {
        self.blocks[self.current.index()].insts.push(inst);
    }

    fn emit_const(&mut self, value: u64) -> SemValue {
        let dst = self.new_value();
        self.emit(SemInst::ConstInt { dst, value });
        dst
    }

    /// Terminates the current block unless it already ended (code after a
    /// `return` lands in an unreachable block and is dropped later).
    fn terminate(&mut self, terminator: SemTerminator) {
        let block = &mut self.blocks[self.current.index()];
        if matches!(block.terminator, SemTerminator::None) {
            block.terminator = terminator;
        }
    }

    fn terminate_block(&mut self, block: SemBlockId, terminator: SemTerminator) {
        let block = &mut self.blocks[block.index()];
        if matches!(block.terminator, SemTerminator::None) {
            block.terminator = terminator;
        }
    }

    fn lookup(&self, name: &str) -> Option<SlotId> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name).copied())
    }

    fn lower_body(&mut self, statements: &[Stmt]) {
        for stmt in statements {
            self.lower_stmt(stmt);
        }
    }

    fn lower_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block { statements, .. } => {
                self.scopes.push(HashMap::new());
                self.lower_body(statements);
                self.scopes.pop();
            }

            Stmt::VarDecl { name, init, span } => {
                let value = self.lower_expr(init);
                let scope = self.scopes.last_mut().expect("at least the function scope");
                if scope.contains_key(name) {
                    self.errors.push(CompileError::Semantic {
                        message: format!("variable '{name}' is already declared in this scope"),
                        span: span.clone(),
                    });
                    return;
                }
                let slot = SlotId(self.next_slot);
                self.next_slot += 1;
                self.scopes.last_mut().expect("scope").insert(name.clone(), slot);
                if let Some(src) = value {
                    self.emit(SemInst::StoreSlot { slot, src });
                }
            }

            Stmt::Expression { expr } => {
                self.lower_expr(expr);
            }

            Stmt::Return { value, .. } => {
                let value = value.as_ref().and_then(|expr| self.lower_expr(expr));
                self.terminate(SemTerminator::Return(value));
                // Anything following the return is unreachable; give it a
                // fresh block so lowering can keep going.
                self.current = self.new_block();
            }

            Stmt::If { condition, then_branch, else_branch, .. } => {
                let Some(cond) = self.lower_expr(condition) else { return };
                let head = self.current;

                let then_head = self.new_block();
                self.current = then_head;
                self.lower_stmt(then_branch);
                let then_tail = self.current;

                if let Some(else_branch) = else_branch {
                    let else_head = self.new_block();
                    self.current = else_head;
                    self.lower_stmt(else_branch);
                    let else_tail = self.current;

                    let join = self.new_block();
                    self.terminate_block(head, SemTerminator::Branch {
                        cond,
                        then_block: then_head,
                        else_block: else_head,
                    });
                    self.terminate_block(then_tail, SemTerminator::Goto(join));
                    self.terminate_block(else_tail, SemTerminator::Goto(join));
                    self.current = join;
                } else {
                    let join = self.new_block();
                    self.terminate_block(head, SemTerminator::Branch {
                        cond,
                        then_block: then_head,
                        else_block: join,
                    });
                    self.terminate_block(then_tail, SemTerminator::Goto(join));
                    self.current = join;
                }
            }

            Stmt::While { condition, body, .. } => {
                let head = self.new_block();
                self.terminate(SemTerminator::Goto(head));
                self.current = head;

                let Some(cond) = self.lower_expr(condition) else { return };
                let head_tail = self.current;

                let body_head = self.new_block();
                self.current = body_head;
                self.lower_stmt(body);
                let body_tail = self.current;

                let exit = self.new_block();
                self.terminate_block(body_tail, SemTerminator::Goto(head));
                self.terminate_block(head_tail, SemTerminator::Branch {
                    cond,
                    then_block: body_head,
                    else_block: exit,
                });
                self.current = exit;
            }
        }
    }

    fn lower_expr(&mut self, expr: &Expr) -> Option<SemValue> {
        match expr {
            Expr::Integer { value, .. } => Some(self.emit_const(*value)),

            Expr::Variable { name, span } => match self.lookup(name) {
                Some(slot) => {
                    let dst = self.new_value();
                    self.emit(SemInst::LoadSlot { dst, slot });
                    Some(dst)
                }
                None => {
                    self.errors.push(CompileError::Semantic {
                        message: format!("use of undeclared variable '{name}'"),
                        span: span.clone(),
                    });
                    None
                }
            },

            Expr::Assign { name, name_span, value, .. } => {
                let src = self.lower_expr(value)?;
                match self.lookup(name) {
                    Some(slot) => {
                        self.emit(SemInst::StoreSlot { slot, src });
                        Some(src)
                    }
                    None => {
                        self.errors.push(CompileError::Semantic {
                            message: format!("assignment to undeclared variable '{name}'"),
                            span: name_span.clone(),
                        });
                        None
                    }
                }
            }

            Expr::Binary { op, left, right, .. } => {
                let lhs = self.lower_expr(left);
                let rhs = self.lower_expr(right);
                let (lhs, rhs) = (lhs?, rhs?);
                let dst = self.new_value();
                self.emit(SemInst::Binary { op: *op, dst, lhs, rhs });
                Some(dst)
            }
        }
    }
}

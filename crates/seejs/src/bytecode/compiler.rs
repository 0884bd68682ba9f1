//! Single-pass AST-to-bytecode compiler (spec §4.6).
//!
//! One `Compiler` per function body (including the top-level program,
//! which is compiled as an implicit nullary function). Nested function
//! expressions/statements recurse into a fresh `Compiler` sharing the same
//! `&mut Interpreter`, mirroring `code1.c`'s `compile_function`.

use std::rc::Rc;

use crate::{
    ast::{
        AssignOp, BinaryOp, CatchClause, Expr, ExprKind, ForInTarget, ForInit, FunctionExpr, Literal, Program, Stmt, StmtKind, SwitchCase, UnaryOp,
    },
    bytecode::{
        builder::CodeBuilder,
        code::Code,
        op::{assign_op_to_binary, binary_op_to_inst, unary_op_to_inst, Op},
    },
    exception::RunResult,
    function::Function,
    host::CompatFlags,
    input::Input,
    intern::Atom,
    interp::Interpreter,
    parser,
    value::Value,
};

/// Target for a `break <label>?`, captured when the matching loop/switch/
/// labeled statement begins compiling.
struct BreakCtx {
    label: Option<Atom>,
    /// Offsets of unpatched `BAlways` instructions still waiting for the
    /// construct's exit point.
    patches: Vec<u32>,
    /// Block-stack depth a `break` targeting this construct must unwind to.
    unwind_depth: u32,
}

/// Target for a `continue <label>?`; only iteration statements push one of
/// these (`switch` and plain labeled blocks are not continuable).
struct ContinueCtx {
    label: Option<Atom>,
    patches: Vec<u32>,
    unwind_depth: u32,
}

struct Compiler<'i> {
    interp: &'i mut Interpreter,
    builder: CodeBuilder,
    filename: Rc<str>,
    undefined_idx: u32,
    breakables: Vec<BreakCtx>,
    continuables: Vec<ContinueCtx>,
}

pub fn compile_program(interp: &mut Interpreter, source: &str, filename: &str) -> RunResult<Code> {
    let program = parse(interp, source, filename)?;
    let mut var_names = Vec::new();
    parser::collect_var_names(&program.body, &mut var_names);
    let mut compiler = Compiler::new(interp, Rc::from(filename));
    for name in var_names {
        compiler.builder.var_name(name);
    }
    compiler.hoist_functions(&program.body)?;
    compiler.compile_stmts(&program.body)?;
    compiler.finish_top_level()
}

pub fn compile_function(interp: &mut Interpreter, name: &str, params: &[&str], body: &str, filename: &str) -> RunResult<Rc<Function>> {
    let func_source = format!("function {name}({}) {{{body}}}", params.join(", "));
    let program = parse(interp, &func_source, filename)?;
    let Some(Stmt { kind: StmtKind::FunctionDecl(fn_name, func_expr), .. }) = program.body.into_iter().next() else {
        return Err(interp.syntax_error("expected a function declaration"));
    };
    let mut compiler = Compiler::new(interp, Rc::from(filename));
    let code = compiler.compile_function_body(&func_expr)?;
    Ok(Rc::new(Function::new(fn_name, func_expr.params, code.var_names.clone(), code)))
}

fn parse(interp: &mut Interpreter, source: &str, filename: &str) -> RunResult<Program> {
    let mut input = Input::from_str(source, filename);
    input.utf8_unsafe = interp.compat.contains(CompatFlags::UTF_UNSAFE);
    let sgml_comment = interp.compat.contains(CompatFlags::SGMLCOMMENT);
    let js15 = interp.compat.contains(CompatFlags::JS15);
    parser::parse_source(input, &mut interp.interner, sgml_comment, js15)
}

impl<'i> Compiler<'i> {
    fn new(interp: &'i mut Interpreter, filename: Rc<str>) -> Self {
        let mut builder = CodeBuilder::new(filename.clone());
        let undefined_idx = builder.literal(Value::Undefined);
        Self { interp, builder, filename, undefined_idx, breakables: Vec::new(), continuables: Vec::new() }
    }

    fn finish_top_level(self) -> RunResult<Code> {
        Ok(self.builder.close())
    }

    /// Compiles a nested/standalone function body into its own `Code`,
    /// with its own hoisting prologue and variable-name table.
    fn compile_function_body(&mut self, func: &FunctionExpr) -> RunResult<Code> {
        let mut var_names = Vec::new();
        parser::collect_var_names(&func.body, &mut var_names);
        let mut inner = Compiler::new(&mut *self.interp, self.filename.clone());
        for name in &var_names {
            inner.builder.var_name(name.clone());
        }
        inner.hoist_functions(&func.body)?;
        inner.compile_stmts(&func.body)?;
        Ok(inner.builder.close())
    }

    // ---------------- hoisting ----------------

    /// Emits, in document order, `Func(idx); Ref(name); PutValue(None)` for
    /// every function declaration anywhere in `body` (mirroring
    /// `parser::collect_var_names`'s traversal) -- the ed.3 §10.1.3
    /// variable-instantiation step that must run *before* the rest of the
    /// body, regardless of where the declaration textually sits.
    fn hoist_functions(&mut self, body: &[Stmt]) -> RunResult<()> {
        for stmt in body {
            self.hoist_functions_stmt(stmt)?;
        }
        Ok(())
    }

    fn hoist_functions_stmt(&mut self, stmt: &Stmt) -> RunResult<()> {
        match &stmt.kind {
            StmtKind::FunctionDecl(name, func) => {
                let code = self.compile_function_body(func)?;
                let template = Rc::new(Function::new(name.clone(), func.params.clone(), code.var_names.clone(), code));
                let idx = self.builder.function(template);
                self.builder.emit(Op::Func(idx));
                let name_idx = self.lit_atom(name.clone());
                self.builder.emit(Op::Ref(name_idx));
                self.builder.emit(Op::PutValue(None));
            }
            StmtKind::Block(body) => self.hoist_functions(body)?,
            StmtKind::If(_, cons, alt) => {
                self.hoist_functions_stmt(cons)?;
                if let Some(alt) = alt {
                    self.hoist_functions_stmt(alt)?;
                }
            }
            StmtKind::For(_, _, _, body)
            | StmtKind::ForIn(_, _, body)
            | StmtKind::While(_, body)
            | StmtKind::DoWhile(body, _)
            | StmtKind::With(_, body)
            | StmtKind::Labeled(_, body) => self.hoist_functions_stmt(body)?,
            StmtKind::Switch(_, cases) => {
                for case in cases {
                    self.hoist_functions(&case.body)?;
                }
            }
            StmtKind::Try(block, catch, finally) => {
                self.hoist_functions(block)?;
                if let Some(c) = catch {
                    self.hoist_functions(&c.body)?;
                }
                if let Some(f) = finally {
                    self.hoist_functions(f)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    // ---------------- small helpers ----------------

    fn lit_atom(&mut self, name: Atom) -> u32 {
        self.builder.literal(Value::String(name))
    }

    fn push_undefined(&mut self) {
        self.builder.emit(Op::Literal(self.undefined_idx));
    }

    fn push_literal(&mut self, value: Value) {
        let idx = self.builder.literal(value);
        self.builder.emit(Op::Literal(idx));
    }

    /// Compiles `target` down to exactly one `Reference` on the stack,
    /// without resolving it to a value -- the shared building block for
    /// assignment, `++`/`--`, `delete`, and `for-in`'s per-iteration write.
    fn push_reference(&mut self, target: &Expr) -> RunResult<()> {
        match &target.kind {
            ExprKind::Ident(name) => {
                let idx = self.lit_atom(name.clone());
                self.builder.emit(Op::Ref(idx));
            }
            ExprKind::Member(obj, name) => {
                self.compile_expr(obj)?;
                let idx = self.lit_atom(name.clone());
                self.builder.emit(Op::Literal(idx));
                self.builder.emit(Op::VRef);
            }
            ExprKind::Index(obj, key) => {
                self.compile_expr(obj)?;
                self.compile_expr(key)?;
                self.builder.emit(Op::VRef);
            }
            _ => return Err(self.interp.syntax_error("invalid assignment target")),
        }
        Ok(())
    }

    // ---------------- statements ----------------

    fn compile_stmts(&mut self, body: &[Stmt]) -> RunResult<()> {
        for stmt in body {
            self.compile_stmt(stmt, None)?;
        }
        Ok(())
    }

    fn compile_stmt(&mut self, stmt: &Stmt, label: Option<Atom>) -> RunResult<()> {
        self.builder.emit(Op::Loc(stmt.loc.line));
        match &stmt.kind {
            StmtKind::Empty | StmtKind::FunctionDecl(..) => {}
            StmtKind::Expr(expr) => {
                self.compile_expr(expr)?;
                self.builder.emit(Op::SetC);
            }
            StmtKind::VarDecl(decls) => {
                for decl in decls {
                    if let Some(init) = &decl.init {
                        self.compile_expr(init)?;
                        let idx = self.lit_atom(decl.name.clone());
                        self.builder.emit(Op::Ref(idx));
                        self.builder.emit(Op::PutValue(None));
                    }
                }
            }
            StmtKind::Block(body) => self.compile_stmts(body)?,
            StmtKind::If(test, cons, alt) => self.compile_if(test, cons, alt.as_deref())?,
            StmtKind::While(test, body) => self.compile_while(test, body, label)?,
            StmtKind::DoWhile(body, test) => self.compile_do_while(body, test, label)?,
            StmtKind::For(init, test, update, body) => self.compile_for(init, test.as_ref(), update.as_ref(), body, label)?,
            StmtKind::ForIn(target, obj, body) => self.compile_for_in(target, obj, body, label)?,
            StmtKind::Continue(target_label) => self.compile_continue(target_label.as_ref())?,
            StmtKind::Break(target_label) => self.compile_break(target_label.as_ref())?,
            StmtKind::Return(value) => self.compile_return(value.as_ref())?,
            StmtKind::With(obj, body) => self.compile_with(obj, body)?,
            StmtKind::Switch(disc, cases) => self.compile_switch(disc, cases, label)?,
            StmtKind::Throw(expr) => {
                self.compile_expr(expr)?;
                self.builder.emit(Op::Throw);
            }
            StmtKind::Try(block, catch, finally) => self.compile_try(block, catch.as_ref(), finally.as_ref())?,
            StmtKind::Labeled(name, inner) => self.compile_labeled(name.clone(), inner)?,
        }
        Ok(())
    }

    fn compile_labeled(&mut self, name: Atom, inner: &Stmt) -> RunResult<()> {
        // Loops/switches absorb the label directly into their own
        // break/continue contexts, so `continue outer;` reaching an outer
        // `for` labeled `outer:` doesn't need an extra wrapping frame.
        if matches!(inner.kind, StmtKind::For(..) | StmtKind::ForIn(..) | StmtKind::While(..) | StmtKind::DoWhile(..) | StmtKind::Switch(..)) {
            return self.compile_stmt(inner, Some(name));
        }
        let unwind_depth = self.builder.block_depth();
        self.breakables.push(BreakCtx { label: Some(name), patches: Vec::new(), unwind_depth });
        self.compile_stmt(inner, None)?;
        let end = self.builder.here();
        let ctx = self.breakables.pop().expect("pushed above");
        for p in ctx.patches {
            self.builder.patch(p, end);
        }
        Ok(())
    }

    fn compile_if(&mut self, test: &Expr, cons: &Stmt, alt: Option<&Stmt>) -> RunResult<()> {
        // No "branch if false" opcode exists, so false-branch code is
        // emitted first and the true branch reached via an extra jump.
        self.compile_expr(test)?;
        let to_true = self.builder.emit(Op::BTrue(0));
        if let Some(alt) = alt {
            self.compile_stmt(alt, None)?;
        }
        let to_end = self.builder.emit(Op::BAlways(0));
        self.builder.patch_here(to_true);
        self.compile_stmt(cons, None)?;
        self.builder.patch_here(to_end);
        Ok(())
    }

    fn compile_while(&mut self, test: &Expr, body: &Stmt, label: Option<Atom>) -> RunResult<()> {
        let unwind_depth = self.builder.block_depth();
        self.breakables.push(BreakCtx { label: label.clone(), patches: Vec::new(), unwind_depth });
        self.continuables.push(ContinueCtx { label, patches: Vec::new(), unwind_depth });

        let jump_to_test = self.builder.emit(Op::BAlways(0));
        let body_start = self.builder.here();
        self.compile_stmt(body, None)?;
        self.builder.patch_here(jump_to_test);
        let test_start = self.builder.here();
        self.compile_expr(test)?;
        self.builder.emit(Op::BTrue(body_start));
        let end = self.builder.here();

        self.finish_loop_ctxs(test_start, end);
        Ok(())
    }

    fn compile_do_while(&mut self, body: &Stmt, test: &Expr, label: Option<Atom>) -> RunResult<()> {
        let unwind_depth = self.builder.block_depth();
        self.breakables.push(BreakCtx { label: label.clone(), patches: Vec::new(), unwind_depth });
        self.continuables.push(ContinueCtx { label, patches: Vec::new(), unwind_depth });

        let body_start = self.builder.here();
        self.compile_stmt(body, None)?;
        let test_start = self.builder.here();
        self.compile_expr(test)?;
        self.builder.emit(Op::BTrue(body_start));
        let end = self.builder.here();

        self.finish_loop_ctxs(test_start, end);
        Ok(())
    }

    fn compile_for(&mut self, init: &ForInit, test: Option<&Expr>, update: Option<&Expr>, body: &Stmt, label: Option<Atom>) -> RunResult<()> {
        match init {
            ForInit::None => {}
            ForInit::Expr(expr) => {
                self.compile_expr(expr)?;
                self.builder.emit(Op::Pop);
            }
            ForInit::VarDecl(decls) => {
                for decl in decls {
                    if let Some(init) = &decl.init {
                        self.compile_expr(init)?;
                        let idx = self.lit_atom(decl.name.clone());
                        self.builder.emit(Op::Ref(idx));
                        self.builder.emit(Op::PutValue(None));
                    }
                }
            }
        }

        let unwind_depth = self.builder.block_depth();
        self.breakables.push(BreakCtx { label: label.clone(), patches: Vec::new(), unwind_depth });
        self.continuables.push(ContinueCtx { label, patches: Vec::new(), unwind_depth });

        let jump_to_test = self.builder.emit(Op::BAlways(0));
        let body_start = self.builder.here();
        self.compile_stmt(body, None)?;
        let continue_target = self.builder.here();
        if let Some(update) = update {
            self.compile_expr(update)?;
            self.builder.emit(Op::Pop);
        }
        self.builder.patch_here(jump_to_test);
        match test {
            Some(test) => {
                self.compile_expr(test)?;
                self.builder.emit(Op::BTrue(body_start));
            }
            None => {
                self.builder.emit(Op::BAlways(body_start));
            }
        }
        let end = self.builder.here();

        self.finish_loop_ctxs(continue_target, end);
        Ok(())
    }

    fn finish_loop_ctxs(&mut self, continue_target: u32, end: u32) {
        let cctx = self.continuables.pop().expect("pushed by the caller");
        for p in cctx.patches {
            self.builder.patch(p, continue_target);
        }
        let bctx = self.breakables.pop().expect("pushed by the caller");
        for p in bctx.patches {
            self.builder.patch(p, end);
        }
    }

    fn compile_for_in(&mut self, target: &ForInTarget, obj: &Expr, body: &Stmt, label: Option<Atom>) -> RunResult<()> {
        self.compile_expr(obj)?;
        self.builder.emit(Op::SEnum);

        let continue_depth = self.builder.block_depth();
        let break_depth = continue_depth - 1;
        self.breakables.push(BreakCtx { label: label.clone(), patches: Vec::new(), unwind_depth: break_depth });
        self.continuables.push(ContinueCtx { label, patches: Vec::new(), unwind_depth: continue_depth });

        let loop_start = self.builder.here();
        let to_end = self.builder.emit(Op::BEnum(0));
        match target {
            ForInTarget::Var(name) => {
                let idx = self.lit_atom(name.clone());
                self.builder.emit(Op::Ref(idx));
            }
            ForInTarget::Expr(expr) => self.push_reference(expr)?,
        }
        self.builder.emit(Op::PutValue(None));
        self.compile_stmt(body, None)?;
        self.builder.emit(Op::BAlways(loop_start));
        self.builder.patch_here(to_end);
        self.builder.emit(Op::End(1));
        let end = self.builder.here();

        let cctx = self.continuables.pop().expect("pushed above");
        for p in cctx.patches {
            self.builder.patch(p, loop_start);
        }
        let bctx = self.breakables.pop().expect("pushed above");
        for p in bctx.patches {
            self.builder.patch(p, end);
        }
        Ok(())
    }

    fn compile_continue(&mut self, label: Option<&Atom>) -> RunResult<()> {
        let idx = match label {
            Some(l) => self.continuables.iter().rposition(|c| c.label.as_ref() == Some(l)),
            None => self.continuables.len().checked_sub(1),
        };
        let Some(idx) = idx else {
            return Err(self.interp.syntax_error("continue statement outside of a loop"));
        };
        self.emit_unwind_to(self.continuables[idx].unwind_depth);
        let at = self.builder.emit(Op::BAlways(0));
        self.continuables[idx].patches.push(at);
        Ok(())
    }

    fn compile_break(&mut self, label: Option<&Atom>) -> RunResult<()> {
        let idx = match label {
            Some(l) => self.breakables.iter().rposition(|c| c.label.as_ref() == Some(l)),
            None => self.breakables.len().checked_sub(1),
        };
        let Some(idx) = idx else {
            return Err(self.interp.syntax_error("break statement outside of a loop or switch"));
        };
        self.emit_unwind_to(self.breakables[idx].unwind_depth);
        let at = self.builder.emit(Op::BAlways(0));
        self.breakables[idx].patches.push(at);
        Ok(())
    }

    fn emit_unwind_to(&mut self, target_depth: u32) {
        let n = self.builder.block_depth().saturating_sub(target_depth);
        if n > 0 {
            self.builder.emit(Op::End(n));
        }
    }

    fn compile_return(&mut self, value: Option<&Expr>) -> RunResult<()> {
        match value {
            Some(expr) => self.compile_expr(expr)?,
            None => self.push_undefined(),
        }
        // No preceding `End(n)`: `Op::Return` unwinds the whole block stack
        // itself, carrying the return value as its completion through any
        // `finally` it crosses (see `bytecode/vm/exceptions.rs`). A plain
        // `End` here would hand the VM an unwind with no way to remember
        // "a value is pending", losing it if a `finally` ran in between.
        self.builder.emit(Op::Return);
        Ok(())
    }

    fn compile_with(&mut self, obj: &Expr, body: &Stmt) -> RunResult<()> {
        self.compile_expr(obj)?;
        self.builder.emit(Op::SWith);
        self.compile_stmt(body, None)?;
        self.builder.emit(Op::End(1));
        Ok(())
    }

    /// Evaluates the discriminant once, compares it against each `case` in
    /// turn, then dispatches through small per-case "trampolines" that each
    /// drop the discriminant exactly once -- a bare `Pop` at the front of
    /// every case body would double-pop on ordinary fallthrough from one
    /// case into the next.
    fn compile_switch(&mut self, disc: &Expr, cases: &[SwitchCase], label: Option<Atom>) -> RunResult<()> {
        self.compile_expr(disc)?;

        let unwind_depth = self.builder.block_depth();
        self.breakables.push(BreakCtx { label, patches: Vec::new(), unwind_depth });

        let mut trampolines = Vec::with_capacity(cases.len());
        let mut default_idx = None;
        for (i, case) in cases.iter().enumerate() {
            match &case.test {
                Some(test) => {
                    self.builder.emit(Op::Dup);
                    self.compile_expr(test)?;
                    self.builder.emit(Op::SEq);
                    let to_trampoline = self.builder.emit(Op::BTrue(0));
                    trampolines.push((i, to_trampoline));
                }
                None => default_idx = Some(i),
            }
        }
        let to_default_or_end = self.builder.emit(Op::BAlways(0));

        let mut case_entries = vec![None; cases.len()];
        for (i, to_trampoline) in trampolines {
            self.builder.patch_here(to_trampoline);
            self.builder.emit(Op::Pop);
            let enter = self.builder.emit(Op::BAlways(0));
            case_entries[i] = Some(enter);
        }
        match default_idx {
            Some(i) => {
                self.builder.patch_here(to_default_or_end);
                self.builder.emit(Op::Pop);
                let enter = self.builder.emit(Op::BAlways(0));
                case_entries[i] = Some(enter);
            }
            None => {
                // No `default`: the no-match path still owns the
                // discriminant and must drop it before falling through.
                self.builder.patch_here(to_default_or_end);
                self.builder.emit(Op::Pop);
                let skip_all = self.builder.emit(Op::BAlways(0));
                self.compile_case_bodies(cases, &mut case_entries)?;
                self.builder.patch_here(skip_all);
                return self.finish_switch();
            }
        }
        self.compile_case_bodies(cases, &mut case_entries)?;
        self.finish_switch()
    }

    fn compile_case_bodies(&mut self, cases: &[SwitchCase], case_entries: &mut [Option<u32>]) -> RunResult<()> {
        for (i, case) in cases.iter().enumerate() {
            if let Some(at) = case_entries[i] {
                self.builder.patch_here(at);
            }
            self.compile_stmts(&case.body)?;
        }
        Ok(())
    }

    fn finish_switch(&mut self) -> RunResult<()> {
        let end = self.builder.here();
        let ctx = self.breakables.pop().expect("pushed by compile_switch");
        for p in ctx.patches {
            self.builder.patch(p, end);
        }
        Ok(())
    }

    /// Compiles a `try` statement (spec §4.7's `STRYC`/`STRYF`/`END`
    /// machinery).
    ///
    /// A caught exception converts the `try`-catch marker into a `with`
    /// scope bound to the caught value (net zero change to the *runtime*
    /// block stack), but the `End(1)` right after the protected body
    /// already recorded the compile-time `-1` a clean exit takes. The catch
    /// body must therefore compile at the depth it actually runs at --
    /// `builder.set_block_depth` restores that before `compile_stmts(&catch.body)`
    /// so any `break`/`continue`/`return` inside it unwinds the right
    /// number of levels either way.
    ///
    /// `finally` needs no such fixup: ending the protected body always
    /// redirects into the handler rather than falling through (finally
    /// always runs), and nothing is pushed back onto the block stack for
    /// its duration, so the compiler and the VM agree on the depth
    /// throughout. `Op::EndFinally` closes it.
    fn compile_try(&mut self, block: &[Stmt], catch: Option<&CatchClause>, finally: Option<&Vec<Stmt>>) -> RunResult<()> {
        match (catch, finally) {
            (Some(catch), None) => {
                self.compile_catch(block, catch)?;
            }
            (None, Some(finally_body)) => {
                let finally_marker = self.builder.emit(Op::STryF(0));
                self.compile_stmts(block)?;
                self.builder.emit(Op::End(1));
                let finally_start = self.builder.here();
                self.builder.patch(finally_marker, finally_start);
                self.compile_stmts(finally_body)?;
                self.builder.emit(Op::EndFinally);
            }
            (Some(catch), Some(finally_body)) => {
                // `try { } catch (e) { } finally { }` is a `try`-finally
                // wrapping a `try`-catch.
                let finally_marker = self.builder.emit(Op::STryF(0));
                self.compile_catch(block, catch)?;
                self.builder.emit(Op::End(1));
                let finally_start = self.builder.here();
                self.builder.patch(finally_marker, finally_start);
                self.compile_stmts(finally_body)?;
                self.builder.emit(Op::EndFinally);
            }
            (None, None) => {
                self.compile_stmts(block)?;
            }
        }
        Ok(())
    }

    /// Compiles the `try { block } catch (param) { catch.body }` core
    /// shared by the catch-only and catch-and-finally arms of
    /// [`Self::compile_try`]; the caller emits whatever follows once both
    /// paths have rejoined.
    fn compile_catch(&mut self, block: &[Stmt], catch: &CatchClause) -> RunResult<()> {
        let param_idx = self.lit_atom(catch.param.clone());
        self.builder.emit(Op::Literal(param_idx));
        let catch_target = self.builder.emit(Op::STryC(0));
        self.compile_stmts(block)?;
        self.builder.emit(Op::End(1));
        let to_end = self.builder.emit(Op::BAlways(0));
        self.builder.patch_here(catch_target);
        // The VM converts the unwound TRYC marker into a `with` scope bound
        // to the propagating exception, then resumes here; the catch
        // parameter resolves through that scope like any other identifier.
        // Restore the depth the conversion actually leaves the block stack
        // at (see the doc comment above) before compiling the catch body.
        let depth_in_try = self.builder.block_depth() + 1;
        self.builder.set_block_depth(depth_in_try);
        self.compile_stmts(&catch.body)?;
        self.builder.emit(Op::End(1));
        self.builder.patch_here(to_end);
        Ok(())
    }

    // ---------------- expressions ----------------

    fn compile_expr(&mut self, expr: &Expr) -> RunResult<()> {
        match &expr.kind {
            ExprKind::This => {
                self.builder.emit(Op::This);
            }
            ExprKind::Ident(name) => {
                let idx = self.lit_atom(name.clone());
                self.builder.emit(Op::Ref(idx));
                self.builder.emit(Op::GetValue);
            }
            ExprKind::Literal(lit) => self.compile_literal(lit)?,
            ExprKind::ArrayLiteral(elements) => self.compile_array_literal(elements)?,
            ExprKind::ObjectLiteral(props) => self.compile_object_literal(props)?,
            ExprKind::Function(func_expr) => self.compile_function_literal(func_expr)?,
            ExprKind::Unary(op, inner) => self.compile_unary(*op, inner)?,
            ExprKind::Binary(op, l, r) => self.compile_binary(*op, l, r)?,
            ExprKind::Logical(op, l, r) => self.compile_logical(*op, l, r)?,
            ExprKind::Assign(op, target, value) => self.compile_assign(*op, target, value)?,
            ExprKind::Conditional(test, cons, alt) => self.compile_conditional(test, cons, alt)?,
            ExprKind::Call(callee, args) => self.compile_call(callee, args)?,
            ExprKind::New(callee, args) => self.compile_new(callee, args)?,
            ExprKind::Member(obj, name) => {
                self.compile_expr(obj)?;
                let idx = self.lit_atom(name.clone());
                self.builder.emit(Op::Literal(idx));
                self.builder.emit(Op::VRef);
                self.builder.emit(Op::GetValue);
            }
            ExprKind::Index(obj, key) => {
                self.compile_expr(obj)?;
                self.compile_expr(key)?;
                self.builder.emit(Op::VRef);
                self.builder.emit(Op::GetValue);
            }
            ExprKind::Comma(l, r) => {
                self.compile_expr(l)?;
                self.builder.emit(Op::Pop);
                self.compile_expr(r)?;
            }
        }
        Ok(())
    }

    fn compile_literal(&mut self, lit: &Literal) -> RunResult<()> {
        match lit {
            Literal::Undefined => self.push_undefined(),
            Literal::Null => self.push_literal(Value::Null),
            Literal::Boolean(b) => self.push_literal(Value::Boolean(*b)),
            Literal::Number(n) => self.push_literal(Value::Number(*n)),
            Literal::String(s) => self.push_literal(Value::String(s.clone())),
            Literal::Regex { pattern, flags } => {
                // Folded into a `new RegExp(pattern, flags)` against the
                // host-registered global, same as array/object literals
                // (SPEC_FULL.md §4.6) -- this engine does not own the
                // RegExp constructor itself.
                self.push_global_constructor("RegExp")?;
                self.push_literal(Value::String(pattern.clone()));
                self.push_literal(Value::String(flags.clone()));
                self.builder.emit(Op::New(2));
            }
        }
        Ok(())
    }

    fn push_global_constructor(&mut self, name: &str) -> RunResult<()> {
        let idx = self.lit_atom(Atom::new(name));
        self.builder.emit(Op::Ref(idx));
        self.builder.emit(Op::GetValue);
        Ok(())
    }

    fn compile_array_literal(&mut self, elements: &[Option<Expr>]) -> RunResult<()> {
        self.push_global_constructor("Array")?;
        self.builder.emit(Op::New(0));
        for (i, element) in elements.iter().enumerate() {
            let Some(element) = element else { continue };
            self.builder.emit(Op::Dup);
            let idx = self.lit_atom(Atom::new(i.to_string()));
            self.builder.emit(Op::Literal(idx));
            self.builder.emit(Op::VRef);
            self.compile_expr(element)?;
            self.builder.emit(Op::Exch);
            self.builder.emit(Op::PutValue(None));
        }
        Ok(())
    }

    fn compile_object_literal(&mut self, props: &[crate::ast::PropertyInit]) -> RunResult<()> {
        self.push_global_constructor("Object")?;
        self.builder.emit(Op::New(0));
        for prop in props {
            self.builder.emit(Op::Dup);
            let idx = self.lit_atom(prop.key.clone());
            self.builder.emit(Op::Literal(idx));
            self.builder.emit(Op::VRef);
            self.compile_expr(&prop.value)?;
            self.builder.emit(Op::Exch);
            self.builder.emit(Op::PutValue(None));
        }
        Ok(())
    }

    fn compile_function_literal(&mut self, func: &FunctionExpr) -> RunResult<()> {
        let code = self.compile_function_body(func)?;
        let name = func.name.clone().unwrap_or_else(|| Atom::new(""));
        let template = Rc::new(Function::new(name, func.params.clone(), code.var_names.clone(), code));
        let idx = self.builder.function(template);
        self.builder.emit(Op::Func(idx));
        Ok(())
    }

    fn compile_unary(&mut self, op: UnaryOp, inner: &Expr) -> RunResult<()> {
        match op {
            UnaryOp::Void => {
                self.compile_expr(inner)?;
                self.builder.emit(Op::Pop);
                self.push_undefined();
            }
            UnaryOp::Delete => self.compile_delete(inner)?,
            UnaryOp::TypeOf => self.compile_typeof(inner)?,
            UnaryOp::PreIncr | UnaryOp::PreDecr => self.compile_update(op, inner, true)?,
            UnaryOp::PostIncr | UnaryOp::PostDecr => self.compile_update(op, inner, false)?,
            UnaryOp::Neg | UnaryOp::Plus | UnaryOp::Not | UnaryOp::BitNot => {
                self.compile_expr(inner)?;
                let inst = unary_op_to_inst(op).expect("handled above");
                self.builder.emit(inst);
            }
        }
        Ok(())
    }

    fn compile_delete(&mut self, inner: &Expr) -> RunResult<()> {
        match &inner.kind {
            ExprKind::Ident(_) | ExprKind::Member(..) | ExprKind::Index(..) => {
                self.push_reference(inner)?;
                self.builder.emit(Op::Delete);
            }
            _ => {
                self.compile_expr(inner)?;
                self.builder.emit(Op::Pop);
                self.push_literal(Value::Boolean(true));
            }
        }
        Ok(())
    }

    fn compile_typeof(&mut self, inner: &Expr) -> RunResult<()> {
        match &inner.kind {
            ExprKind::Ident(_) | ExprKind::Member(..) | ExprKind::Index(..) => self.push_reference(inner)?,
            _ => self.compile_expr(inner)?,
        }
        self.builder.emit(Op::TypeOf);
        Ok(())
    }

    /// `++`/`--`, prefix or postfix. `ref` is duplicated so the old value
    /// can be read while the new one is computed; `Roll3` then puts the
    /// reference back on top for `PutValue`, leaving whichever value
    /// (`old` for postfix, `new` for prefix) the expression evaluates to.
    fn compile_update(&mut self, op: UnaryOp, target: &Expr, prefix: bool) -> RunResult<()> {
        self.push_reference(target)?;
        self.builder.emit(Op::Dup);
        self.builder.emit(Op::GetValue);
        self.builder.emit(Op::ToNumber);
        if !prefix {
            self.builder.emit(Op::Dup);
        }
        let one = self.builder.literal(Value::Number(1.0));
        self.builder.emit(Op::Literal(one));
        self.builder.emit(if matches!(op, UnaryOp::PreIncr | UnaryOp::PostIncr) { Op::Add } else { Op::Sub });
        if prefix {
            self.builder.emit(Op::Dup);
        }
        self.builder.emit(Op::Roll3);
        self.builder.emit(Op::PutValue(None));
        Ok(())
    }

    fn compile_binary(&mut self, op: BinaryOp, l: &Expr, r: &Expr) -> RunResult<()> {
        self.compile_expr(l)?;
        self.compile_expr(r)?;
        self.builder.emit(binary_op_to_inst(op));
        if matches!(op, BinaryOp::Ne | BinaryOp::StrictNe) {
            self.builder.emit(Op::Not);
        }
        Ok(())
    }

    /// `&&`/`||` short circuit: evaluate `l`, and if its truthiness already
    /// decides the result, keep it and skip `r` entirely.
    fn compile_logical(&mut self, op: crate::ast::LogicalOp, l: &Expr, r: &Expr) -> RunResult<()> {
        self.compile_expr(l)?;
        self.builder.emit(Op::Dup);
        if matches!(op, crate::ast::LogicalOp::And) {
            self.builder.emit(Op::Not);
        }
        let short_circuit = self.builder.emit(Op::BTrue(0));
        self.builder.emit(Op::Pop);
        self.compile_expr(r)?;
        self.builder.patch_here(short_circuit);
        Ok(())
    }

    fn compile_assign(&mut self, op: AssignOp, target: &Expr, value: &Expr) -> RunResult<()> {
        self.push_reference(target)?;
        match assign_op_to_binary(op) {
            None => {
                self.compile_expr(value)?;
                self.builder.emit(Op::Dup);
                self.builder.emit(Op::Roll3);
                self.builder.emit(Op::PutValue(None));
            }
            Some(binop) => {
                self.builder.emit(Op::Dup);
                self.builder.emit(Op::GetValue);
                self.compile_expr(value)?;
                self.builder.emit(binary_op_to_inst(binop));
                self.builder.emit(Op::Dup);
                self.builder.emit(Op::Roll3);
                self.builder.emit(Op::PutValue(None));
            }
        }
        Ok(())
    }

    fn compile_conditional(&mut self, test: &Expr, cons: &Expr, alt: &Expr) -> RunResult<()> {
        self.compile_expr(test)?;
        let to_cons = self.builder.emit(Op::BTrue(0));
        self.compile_expr(alt)?;
        let to_end = self.builder.emit(Op::BAlways(0));
        self.builder.patch_here(to_cons);
        self.compile_expr(cons)?;
        self.builder.patch_here(to_end);
        Ok(())
    }

    /// `f(args)`: non-method calls push `undefined` as `this`. Method
    /// calls (`obj.m(args)`/`obj[k](args)`) push the base object as `this`
    /// per ECMA-262 §11.2.3 -- a plain identifier reference's base is
    /// never used as `this` even though `Ref` resolves it to one.
    fn compile_call(&mut self, callee: &Expr, args: &[Expr]) -> RunResult<()> {
        match &callee.kind {
            ExprKind::Member(obj, name) => {
                self.compile_expr(obj)?;
                self.builder.emit(Op::Dup);
                let idx = self.lit_atom(name.clone());
                self.builder.emit(Op::Literal(idx));
                self.builder.emit(Op::VRef);
                self.builder.emit(Op::GetValue);
            }
            ExprKind::Index(obj, key) => {
                self.compile_expr(obj)?;
                self.builder.emit(Op::Dup);
                self.compile_expr(key)?;
                self.builder.emit(Op::VRef);
                self.builder.emit(Op::GetValue);
            }
            _ => {
                self.push_undefined();
                self.compile_expr(callee)?;
            }
        }
        for arg in args {
            self.compile_expr(arg)?;
        }
        self.builder.emit(Op::Call(args.len() as u32));
        Ok(())
    }

    fn compile_new(&mut self, callee: &Expr, args: &[Expr]) -> RunResult<()> {
        self.compile_expr(callee)?;
        for arg in args {
            self.compile_expr(arg)?;
        }
        self.builder.emit(Op::New(args.len() as u32));
        Ok(())
    }
}

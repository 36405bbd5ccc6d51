//! Statement/expression bytecode compiler.
//!
//! This walks the AST a second time (the checker has already walked it
//! once to build the `TypeMap`) guided by `tsz_lowering`'s closure and
//! state-machine plans, emitting one `Chunk` per function. Nothing here
//! re-derives scope or capture information — that is `tsz-lowering`'s job;
//! this module only turns a planned shape plus the raw syntax into opcodes.

use rustc_hash::FxHashMap;

use tsz_common::{limits, Atom, Interner, Span};
use tsz_lowering::{plan_all_suspensions, plan_closures, plan_state_machine, ClosurePlan, ClosurePlanResult, EnvId};
use tsz_parser::{
    ArrayElement, AssignOp, BinaryOp, ClassMember, ClassMemberKind, FunctionModifiers, FunctionSig, LogicalOp, Node, NodeArena,
    NodeIndex, ObjectPatternProperty, Param, PatternElement, PropertyKey, UnaryOp, VarKind,
};

use crate::artifact::{
    Artifact, ClassArtifact, ClassMemberArtifact, DisplayClassArtifact, FunctionArtifact, StateMachineArtifact, StateMachineKind,
    TryRegionArtifact,
};
use crate::chunk::{Constant, OpCode};
use crate::compiler::{build_upvalue_sources, ArtifactBuilder, FnCompiler, Loc, LoopCtx};
use crate::error::{CompileError, EmitError};

/// Compiles a whole checked program into a loadable `Artifact`. `type_map` is accepted for
/// parity with the documented entry point and future use (e.g. numeric
/// literal widening decisions); the bytecode shape itself is untyped.
pub fn emit(
    arena: &NodeArena,
    atoms: &Interner,
    binder: &tsz_binder::BinderState,
    program: NodeIndex,
    _type_map: &tsz_checker::TypeMap,
) -> Result<Artifact, EmitError> {
    let closures = plan_closures(arena, binder, program);
    let suspensions = plan_all_suspensions(arena, program);
    let mut builder = ArtifactBuilder::new();

    let Node::Program(stmts) = arena.get(program).clone() else {
        unreachable!("parser always produces a Program root")
    };

    let top_plan = closures.top_level.clone();
    let mut top = FnCompiler::new(arena, atoms, &closures, top_plan.clone());
    for &stmt in &stmts {
        compile_statement(&mut top, &mut builder, &closures, &suspensions, stmt)?;
    }
    let entry_name = top.string_const("<program>");
    let _ = entry_name;

    let process_display_class = top_plan.environment_class.map(|env| builder.ensure_display_class(env, &top_plan, atoms));
    if let Some(class_idx) = process_display_class {
        // Prologue: the program's own environment is allocated before any
        // top-level statement runs, mirroring a function body's own
        // `AllocEnvironment` prologue.
        let mut code = vec![OpCode::AllocEnvironment];
        code.extend(top.chunk.code.iter().copied());
        top.chunk.code = code;
        let span = top.chunk.spans.first().copied().unwrap_or_default();
        top.chunk.spans.insert(0, span);
        let _ = class_idx;
    }

    let entry_artifact = FunctionArtifact {
        name: Some("<program>".to_string()),
        arity: 0,
        has_rest: false,
        chunk: top.chunk,
        environment: process_display_class,
        environment_fields: builder.env_field_names.get(&top_plan.environment_class.unwrap_or(EnvId(u32::MAX))).cloned().unwrap_or_default(),
        upvalues: Vec::new(),
        state_machine: None,
    };
    let entry = builder.push_function(entry_artifact);

    let mut artifact = Artifact::new(entry);
    artifact.functions = builder.functions;
    artifact.classes = builder.classes;
    artifact.display_classes = builder.display_classes;
    artifact.process_display_class = process_display_class;
    Ok(artifact)
}

type Suspensions = FxHashMap<NodeIndex, (FunctionModifiers, tsz_lowering::SuspensionPlan)>;

/// Compiles one statement, possibly recursing into nested function/class
/// declarations (which get their own `FnCompiler` and land in `builder`).
fn compile_statement(
    fc: &mut FnCompiler,
    builder: &mut ArtifactBuilder,
    closures: &ClosurePlanResult,
    suspensions: &Suspensions,
    stmt: NodeIndex,
) -> Result<(), EmitError> {
    let span = fc.arena.span(stmt);
    match fc.arena.get(stmt).clone() {
        Node::Empty | Node::Interface { .. } | Node::TypeAlias { .. } | Node::ImportAlias { .. } => Ok(()),
        Node::Import { .. } => Ok(()),
        Node::Namespace { body, .. } => {
            for s in body {
                compile_statement(fc, builder, closures, suspensions, s)?;
            }
            Ok(())
        }
        Node::Export { decl, .. } => {
            if let Some(d) = decl {
                compile_statement(fc, builder, closures, suspensions, d)?;
            }
            Ok(())
        }
        Node::VarDecl { declarations, .. } => {
            for (pattern, _ty, init) in declarations {
                match init {
                    Some(init) => compile_expr(fc, builder, closures, suspensions, init)?,
                    None => {
                        fc.chunk.emit(OpCode::Constant(fc.chunk.add_constant(Constant::Undefined)), span);
                    }
                }
                bind_pattern(fc, builder, closures, suspensions, pattern)?;
            }
            Ok(())
        }
        Node::ExprStmt(e) => {
            compile_expr(fc, builder, closures, suspensions, e)?;
            fc.chunk.emit(OpCode::Pop, span);
            Ok(())
        }
        Node::Block(stmts) => {
            let mark = fc.mark_scope();
            for s in stmts {
                compile_statement(fc, builder, closures, suspensions, s)?;
            }
            fc.pop_scope(mark);
            Ok(())
        }
        Node::If { cond, then_branch, else_branch } => {
            compile_expr(fc, builder, closures, suspensions, cond)?;
            let jf = fc.chunk.emit(OpCode::JumpIfFalse(0), span);
            fc.chunk.emit(OpCode::Pop, span);
            compile_statement(fc, builder, closures, suspensions, then_branch)?;
            if let Some(else_branch) = else_branch {
                let jend = fc.chunk.emit(OpCode::Jump(0), span);
                fc.chunk.patch_jump_to_here(jf);
                fc.chunk.emit(OpCode::Pop, span);
                compile_statement(fc, builder, closures, suspensions, else_branch)?;
                fc.chunk.patch_jump_to_here(jend);
            } else {
                fc.chunk.patch_jump_to_here(jf);
                fc.chunk.emit(OpCode::Pop, span);
            }
            Ok(())
        }
        Node::While { cond, body } => {
            let loop_start = fc.chunk.here();
            fc.loop_stack.push(LoopCtx { label: None, break_jumps: Vec::new(), continue_jumps: Vec::new() });
            compile_expr(fc, builder, closures, suspensions, cond)?;
            let jf = fc.chunk.emit(OpCode::JumpIfFalse(0), span);
            fc.chunk.emit(OpCode::Pop, span);
            compile_statement(fc, builder, closures, suspensions, body)?;
            fc.chunk.emit(OpCode::Jump(loop_start), span);
            fc.chunk.patch_jump_to_here(jf);
            fc.chunk.emit(OpCode::Pop, span);
            finish_loop(fc, span);
            Ok(())
        }
        Node::DoWhile { body, cond } => {
            let loop_start = fc.chunk.here();
            fc.loop_stack.push(LoopCtx { label: None, break_jumps: Vec::new(), continue_jumps: Vec::new() });
            compile_statement(fc, builder, closures, suspensions, body)?;
            let continue_target = fc.chunk.here();
            compile_expr(fc, builder, closures, suspensions, cond)?;
            let jt = fc.chunk.emit(OpCode::JumpIfTrue(loop_start), span);
            let _ = jt;
            fc.chunk.emit(OpCode::Pop, span);
            patch_loop_continues(fc, continue_target);
            finish_loop(fc, span);
            Ok(())
        }
        Node::For { init, test, update, body } => {
            let mark = fc.mark_scope();
            if let Some(init) = init {
                compile_statement(fc, builder, closures, suspensions, init)?;
            }
            let loop_start = fc.chunk.here();
            fc.loop_stack.push(LoopCtx { label: None, break_jumps: Vec::new(), continue_jumps: Vec::new() });
            let jf = if let Some(test) = test {
                compile_expr(fc, builder, closures, suspensions, test)?;
                let j = fc.chunk.emit(OpCode::JumpIfFalse(0), span);
                fc.chunk.emit(OpCode::Pop, span);
                Some(j)
            } else {
                None
            };
            compile_statement(fc, builder, closures, suspensions, body)?;
            let continue_target = fc.chunk.here();
            if let Some(update) = update {
                compile_expr(fc, builder, closures, suspensions, update)?;
                fc.chunk.emit(OpCode::Pop, span);
            }
            fc.chunk.emit(OpCode::Jump(loop_start), span);
            if let Some(jf) = jf {
                fc.chunk.patch_jump_to_here(jf);
                fc.chunk.emit(OpCode::Pop, span);
            }
            patch_loop_continues(fc, continue_target);
            finish_loop(fc, span);
            fc.pop_scope(mark);
            Ok(())
        }
        Node::ForOf { iterable, pattern, body, is_await, .. } => {
            let mark = fc.mark_scope();
            compile_expr(fc, builder, closures, suspensions, iterable)?;
            fc.chunk.emit(if is_await { OpCode::MakeAsyncIterator } else { OpCode::MakeIterator }, span);
            let loop_start = fc.chunk.here();
            fc.loop_stack.push(LoopCtx { label: None, break_jumps: Vec::new(), continue_jumps: Vec::new() });
            fc.chunk.emit(OpCode::Dup, span);
            fc.chunk.emit(OpCode::IteratorMoveNext, span);
            if is_await {
                let state = fc.next_state();
                fc.chunk.emit(OpCode::Await(state), span);
                fc.mark_resume_point(state);
            }
            let jf = fc.chunk.emit(OpCode::JumpIfFalse(0), span);
            fc.chunk.emit(OpCode::Pop, span);
            fc.chunk.emit(OpCode::Dup, span);
            fc.chunk.emit(OpCode::IteratorCurrent, span);
            bind_pattern(fc, builder, closures, suspensions, pattern)?;
            compile_statement(fc, builder, closures, suspensions, body)?;
            fc.chunk.emit(OpCode::Jump(loop_start), span);
            fc.chunk.patch_jump_to_here(jf);
            fc.chunk.emit(OpCode::Pop, span);
            fc.chunk.emit(OpCode::Pop, span); // drop the iterator itself
            patch_loop_continues(fc, loop_start);
            finish_loop(fc, span);
            fc.pop_scope(mark);
            Ok(())
        }
        Node::ForIn { pattern, object, body, .. } => {
            // Lowered the same way as for-of over `Object.keys(object)`; the
            // interpreter's host object model supplies that iterable.
            let mark = fc.mark_scope();
            compile_expr(fc, builder, closures, suspensions, object)?;
            fc.chunk.emit(OpCode::MakeIterator, span);
            let loop_start = fc.chunk.here();
            fc.loop_stack.push(LoopCtx { label: None, break_jumps: Vec::new(), continue_jumps: Vec::new() });
            fc.chunk.emit(OpCode::Dup, span);
            fc.chunk.emit(OpCode::IteratorMoveNext, span);
            let jf = fc.chunk.emit(OpCode::JumpIfFalse(0), span);
            fc.chunk.emit(OpCode::Pop, span);
            fc.chunk.emit(OpCode::Dup, span);
            fc.chunk.emit(OpCode::IteratorCurrent, span);
            bind_pattern(fc, builder, closures, suspensions, pattern)?;
            compile_statement(fc, builder, closures, suspensions, body)?;
            fc.chunk.emit(OpCode::Jump(loop_start), span);
            fc.chunk.patch_jump_to_here(jf);
            fc.chunk.emit(OpCode::Pop, span);
            fc.chunk.emit(OpCode::Pop, span);
            patch_loop_continues(fc, loop_start);
            finish_loop(fc, span);
            fc.pop_scope(mark);
            Ok(())
        }
        Node::Return(value) => {
            match value {
                Some(v) => compile_expr(fc, builder, closures, suspensions, v)?,
                None => {
                    fc.chunk.emit(OpCode::Constant(fc.chunk.add_constant(Constant::Undefined)), span);
                }
            }
            fc.chunk.emit(OpCode::Return, span);
            Ok(())
        }
        Node::Break(_label) => {
            let j = fc.chunk.emit(OpCode::Jump(0), span);
            if let Some(top) = fc.loop_stack.last_mut() {
                top.break_jumps.push(j);
            }
            Ok(())
        }
        Node::Continue(_label) => {
            let j = fc.chunk.emit(OpCode::Jump(0), span);
            if let Some(top) = fc.loop_stack.last_mut() {
                top.continue_jumps.push(j);
            }
            Ok(())
        }
        Node::Throw(e) => {
            compile_expr(fc, builder, closures, suspensions, e)?;
            fc.chunk.emit(OpCode::Throw, span);
            Ok(())
        }
        Node::LabeledStatement { body, .. } => compile_statement(fc, builder, closures, suspensions, body),
        Node::TryCatch { try_block, catch_param, catch_block, finally_block, .. } => {
            compile_statement(fc, builder, closures, suspensions, try_block)?;
            if let Some(cb) = catch_block {
                let mark = fc.mark_scope();
                if let Some(param) = catch_param {
                    bind_pattern(fc, builder, closures, suspensions, param)?;
                }
                compile_statement(fc, builder, closures, suspensions, cb)?;
                fc.pop_scope(mark);
            }
            if let Some(fb) = finally_block {
                compile_statement(fc, builder, closures, suspensions, fb)?;
            }
            Ok(())
        }
        Node::Switch { discriminant, cases } => {
            // Three passes: a dispatch chain comparing the discriminant
            // against every `case` test, a set of tiny stubs (one per
            // matched case) that drop the now-unneeded comparison values
            // before jumping into the body, and the bodies themselves laid
            // out sequentially so execution falls through from one case
            // into the next exactly like the source, unless a `break`
            // (handled through `loop_stack`) jumps out.
            compile_expr(fc, builder, closures, suspensions, discriminant)?;
            fc.loop_stack.push(LoopCtx { label: None, break_jumps: Vec::new(), continue_jumps: Vec::new() });

            let mut test_jumps: Vec<usize> = Vec::new();
            let mut default_index = None;
            for (i, case) in cases.iter().enumerate() {
                match case.test {
                    Some(test) => {
                        fc.chunk.emit(OpCode::Dup, span);
                        compile_expr(fc, builder, closures, suspensions, test)?;
                        fc.chunk.emit(OpCode::StrictEq, span);
                        let j = fc.chunk.emit(OpCode::JumpIfTrue(0), span);
                        fc.chunk.emit(OpCode::Pop, span);
                        test_jumps.push(j);
                    }
                    None => default_index = Some(i),
                }
            }
            let no_match_jump = fc.chunk.emit(OpCode::Jump(0), span);

            // One stub per tested case, in the same order as `test_jumps`;
            // `stub_to_body[i]` is the `Jump` instruction a stub ends with,
            // patched to that case's body start once bodies are laid out.
            let mut stub_to_body: FxHashMap<usize, usize> = FxHashMap::default();
            let mut tested_index = 0usize;
            for (i, case) in cases.iter().enumerate() {
                if case.test.is_none() {
                    continue;
                }
                fc.chunk.patch_jump_to_here(test_jumps[tested_index]);
                fc.chunk.emit(OpCode::Pop, span); // discard the comparison bool
                fc.chunk.emit(OpCode::Pop, span); // discard the discriminant
                let to_body = fc.chunk.emit(OpCode::Jump(0), span);
                stub_to_body.insert(i, to_body);
                tested_index += 1;
            }
            let default_jump = default_index.map(|_| {
                fc.chunk.patch_jump_to_here(no_match_jump);
                fc.chunk.emit(OpCode::Pop, span); // discard the discriminant
                fc.chunk.emit(OpCode::Jump(0), span)
            });
            if default_jump.is_none() {
                fc.chunk.patch_jump_to_here(no_match_jump);
                fc.chunk.emit(OpCode::Pop, span); // discard the discriminant; falls through to end
            }

            let mut body_starts = Vec::with_capacity(cases.len());
            for case in &cases {
                body_starts.push(fc.chunk.here());
                for &s in &case.body {
                    compile_statement(fc, builder, closures, suspensions, s)?;
                }
            }
            for (i, &jump_at) in &stub_to_body {
                fc.chunk.patch_jump(jump_at, body_starts[*i]);
            }
            if let (Some(jump_at), Some(default_index)) = (default_jump, default_index) {
                fc.chunk.patch_jump(jump_at, body_starts[default_index]);
            }

            let popped = fc.loop_stack.pop().expect("switch pushed its own loop context");
            for j in popped.break_jumps {
                fc.chunk.patch_jump_to_here(j);
            }
            Ok(())
        }
        Node::Function(sig) => {
            let loc = fc.declare(sig.name.expect("function declarations are named"));
            compile_function_expr(fc, builder, closures, suspensions, stmt, &sig, span)?;
            let name = fc.name_const(sig.name.unwrap());
            fc.emit_set_prevalued(loc, |s| name_const_of(s, name), span);
            Ok(())
        }
        Node::Class { .. } => {
            compile_class(fc, builder, closures, suspensions, stmt, span)?;
            Ok(())
        }
        Node::Enum { name, is_const, members } => compile_enum(fc, builder, closures, suspensions, name, is_const, &members, span),
        other => unreachable!("compile_statement saw an expression node {other:?}"),
    }
}

fn name_const_of(_fc: &mut FnCompiler, idx: u32) -> u32 {
    idx
}

fn finish_loop(fc: &mut FnCompiler, span: Span) {
    let popped = fc.loop_stack.pop().expect("finish_loop called without a matching push");
    for j in popped.break_jumps {
        fc.chunk.patch_jump_to_here(j);
    }
    let _ = span;
}

fn patch_loop_continues(fc: &mut FnCompiler, target: u32) {
    if let Some(top) = fc.loop_stack.last() {
        for &j in &top.continue_jumps {
            fc.chunk.patch_jump(j, target);
        }
    }
}

/// Binds a (possibly destructuring) pattern against the value currently on
/// top of stack, consuming it.
fn bind_pattern(
    fc: &mut FnCompiler,
    builder: &mut ArtifactBuilder,
    closures: &ClosurePlanResult,
    suspensions: &Suspensions,
    pattern: NodeIndex,
) -> Result<(), EmitError> {
    let span = fc.arena.span(pattern);
    match fc.arena.get(pattern).clone() {
        Node::Identifier(name) => {
            let loc = fc.declare(name);
            let name_idx = fc.name_const(name);
            fc.emit_set_prevalued(loc, |s| name_const_of(s, name_idx), span);
            Ok(())
        }
        Node::ArrayPattern { elements, rest } => {
            for (i, el) in elements.iter().enumerate() {
                let Some(PatternElement { pattern: el_pattern, default }) = el else { continue };
                fc.chunk.emit(OpCode::Dup, span);
                fc.chunk.emit(OpCode::Constant(fc.chunk.add_constant(Constant::Number(i as f64))), span);
                fc.chunk.emit(OpCode::GetIndex, span);
                if let Some(default) = default {
                    apply_default(fc, builder, closures, suspensions, *default, span)?;
                }
                bind_pattern(fc, builder, closures, suspensions, *el_pattern)?;
            }
            if let Some(rest_pattern) = rest {
                fc.chunk.emit(OpCode::Dup, span);
                fc.chunk.emit(OpCode::CollectRestArray(u32::try_from(elements.len()).unwrap_or(0)), span);
                bind_pattern(fc, builder, closures, suspensions, rest_pattern)?;
            }
            fc.chunk.emit(OpCode::Pop, span);
            Ok(())
        }
        Node::ObjectPattern { properties, rest } => {
            let mut taken_key_consts = Vec::new();
            for ObjectPatternProperty { key, value, default, .. } in &properties {
                fc.chunk.emit(OpCode::Dup, span);
                match key {
                    PropertyKey::Ident(name) | PropertyKey::StringLit(name) => {
                        let idx = fc.name_const(*name);
                        taken_key_consts.push(idx);
                        fc.chunk.emit(OpCode::GetField(idx), span);
                    }
                    PropertyKey::NumberLit(n) => {
                        let idx = fc.chunk.add_constant(Constant::Number(*n));
                        fc.chunk.emit(OpCode::Constant(idx), span);
                        fc.chunk.emit(OpCode::GetIndex, span);
                    }
                    PropertyKey::Computed(expr) => {
                        compile_expr(fc, builder, closures, suspensions, *expr)?;
                        fc.chunk.emit(OpCode::GetIndex, span);
                    }
                }
                if let Some(default) = default {
                    apply_default(fc, builder, closures, suspensions, *default, span)?;
                }
                bind_pattern(fc, builder, closures, suspensions, *value)?;
            }
            if let Some(rest_pattern) = rest {
                fc.chunk.emit(OpCode::Dup, span);
                for idx in &taken_key_consts {
                    fc.chunk.emit(OpCode::Constant(*idx), span);
                }
                fc.chunk.emit(OpCode::CollectRestObject(u32::try_from(taken_key_consts.len()).unwrap_or(0)), span);
                bind_pattern(fc, builder, closures, suspensions, rest_pattern)?;
            }
            fc.chunk.emit(OpCode::Pop, span);
            Ok(())
        }
        _ => Err(EmitError::UnresolvedCapture { node: pattern, span }),
    }
}

fn apply_default(
    fc: &mut FnCompiler,
    builder: &mut ArtifactBuilder,
    closures: &ClosurePlanResult,
    suspensions: &Suspensions,
    default: NodeIndex,
    span: Span,
) -> Result<(), EmitError> {
    fc.chunk.emit(OpCode::Dup, span);
    fc.chunk.emit(OpCode::Constant(fc.chunk.add_constant(Constant::Undefined)), span);
    fc.chunk.emit(OpCode::StrictEq, span);
    let jf = fc.chunk.emit(OpCode::JumpIfFalse(0), span);
    fc.chunk.emit(OpCode::Pop, span);
    fc.chunk.emit(OpCode::Pop, span);
    compile_expr(fc, builder, closures, suspensions, default)?;
    let je = fc.chunk.emit(OpCode::Jump(0), span);
    fc.chunk.patch_jump_to_here(jf);
    fc.chunk.emit(OpCode::Pop, span);
    fc.chunk.patch_jump_to_here(je);
    Ok(())
}

fn compile_expr(
    fc: &mut FnCompiler,
    builder: &mut ArtifactBuilder,
    closures: &ClosurePlanResult,
    suspensions: &Suspensions,
    expr: NodeIndex,
) -> Result<(), EmitError> {
    let span = fc.arena.span(expr);
    match fc.arena.get(expr).clone() {
        Node::NumberLit(n) => {
            let idx = fc.chunk.add_constant(Constant::Number(n));
            fc.chunk.emit(OpCode::Constant(idx), span);
        }
        Node::BigIntLit(s) => {
            let idx = fc.chunk.add_constant(Constant::BigInt(s));
            fc.chunk.emit(OpCode::Constant(idx), span);
        }
        Node::StringLit(s) => {
            let idx = fc.string_const(&fc.atoms.resolve(s));
            fc.chunk.emit(OpCode::Constant(idx), span);
        }
        Node::BoolLit(b) => {
            let idx = fc.chunk.add_constant(Constant::Bool(b));
            fc.chunk.emit(OpCode::Constant(idx), span);
        }
        Node::NullLit => {
            let idx = fc.chunk.add_constant(Constant::Null);
            fc.chunk.emit(OpCode::Constant(idx), span);
        }
        Node::UndefinedLit => {
            let idx = fc.chunk.add_constant(Constant::Undefined);
            fc.chunk.emit(OpCode::Constant(idx), span);
        }
        Node::Identifier(name) => {
            let loc = fc.resolve(name);
            let idx = fc.name_const(name);
            fc.emit_get(loc, |s| name_const_of(s, idx), span);
        }
        Node::This => fc.emit_get_this(span),
        Node::Super => {
            fc.chunk.emit(OpCode::GetSuper, span);
        }
        Node::Binary { op, left, right } => {
            compile_expr(fc, builder, closures, suspensions, left)?;
            compile_expr(fc, builder, closures, suspensions, right)?;
            fc.chunk.emit(binary_op(op), span);
        }
        Node::Logical { op, left, right } => {
            compile_expr(fc, builder, closures, suspensions, left)?;
            let j = match op {
                LogicalOp::And => fc.chunk.emit(OpCode::JumpIfFalse(0), span),
                LogicalOp::Or => fc.chunk.emit(OpCode::JumpIfTrue(0), span),
            };
            fc.chunk.emit(OpCode::Pop, span);
            compile_expr(fc, builder, closures, suspensions, right)?;
            fc.chunk.patch_jump_to_here(j);
        }
        Node::NullishCoalescing { left, right } => {
            compile_expr(fc, builder, closures, suspensions, left)?;
            let j = fc.chunk.emit(OpCode::JumpIfNullish(0), span);
            let jend = fc.chunk.emit(OpCode::Jump(0), span);
            fc.chunk.patch_jump_to_here(j);
            fc.chunk.emit(OpCode::Pop, span);
            compile_expr(fc, builder, closures, suspensions, right)?;
            fc.chunk.patch_jump_to_here(jend);
        }
        Node::Unary { op, operand } => {
            match op {
                UnaryOp::Delete => {
                    // Lowered as `GetIndex`'s dual: the interpreter's object
                    // model deletes the evaluated key. Only meaningful on a
                    // `Get`/`GetIndex` operand; anything else is a no-op
                    // `true` per the original ECMAScript semantics for
                    // deleting a non-reference.
                    compile_delete(fc, builder, closures, suspensions, operand, span)?;
                }
                _ => {
                    compile_expr(fc, builder, closures, suspensions, operand)?;
                    fc.chunk.emit(unary_op(op), span);
                }
            }
        }
        Node::Grouping(e) => compile_expr(fc, builder, closures, suspensions, e)?,
        Node::NonNullAssertion(e) | Node::TypeAssertion { expr: e, .. } => compile_expr(fc, builder, closures, suspensions, e)?,
        Node::Call { callee, args, optional, .. } => {
            compile_call(fc, builder, closures, suspensions, callee, &args, optional, span)?;
        }
        Node::New { callee, args, .. } => {
            compile_expr(fc, builder, closures, suspensions, callee)?;
            let argc = compile_args(fc, builder, closures, suspensions, &args)?;
            fc.chunk.emit(OpCode::New(argc), span);
        }
        Node::Get { object, name, optional } => {
            compile_expr(fc, builder, closures, suspensions, object)?;
            let idx = fc.name_const(name);
            fc.chunk.emit(if optional { OpCode::GetFieldOptional(idx) } else { OpCode::GetField(idx) }, span);
        }
        Node::GetIndex { object, index, optional } => {
            compile_expr(fc, builder, closures, suspensions, object)?;
            compile_expr(fc, builder, closures, suspensions, index)?;
            fc.chunk.emit(if optional { OpCode::GetIndexOptional } else { OpCode::GetIndex }, span);
        }
        Node::Assign { target, value } => compile_assign(fc, builder, closures, suspensions, target, value, span)?,
        Node::CompoundSet { op, target, value } => compile_compound_set(fc, builder, closures, suspensions, op, target, value, span)?,
        Node::PrefixIncrement { decrement, operand } => {
            compile_incr(fc, builder, closures, suspensions, operand, decrement, true, span)?;
        }
        Node::PostfixIncrement { decrement, operand } => {
            compile_incr(fc, builder, closures, suspensions, operand, decrement, false, span)?;
        }
        Node::Ternary { cond, then_expr, else_expr } => {
            compile_expr(fc, builder, closures, suspensions, cond)?;
            let jf = fc.chunk.emit(OpCode::JumpIfFalse(0), span);
            fc.chunk.emit(OpCode::Pop, span);
            compile_expr(fc, builder, closures, suspensions, then_expr)?;
            let je = fc.chunk.emit(OpCode::Jump(0), span);
            fc.chunk.patch_jump_to_here(jf);
            fc.chunk.emit(OpCode::Pop, span);
            compile_expr(fc, builder, closures, suspensions, else_expr)?;
            fc.chunk.patch_jump_to_here(je);
        }
        Node::TemplateLiteral { quasis, expressions } => {
            let mut count = 0u32;
            for (i, quasi) in quasis.iter().enumerate() {
                let idx = fc.string_const(&fc.atoms.resolve(*quasi));
                fc.chunk.emit(OpCode::Constant(idx), span);
                count += 1;
                if let Some(&e) = expressions.get(i) {
                    compile_expr(fc, builder, closures, suspensions, e)?;
                    count += 1;
                }
            }
            fc.chunk.emit(OpCode::BuildTemplate(count), span);
        }
        Node::TaggedTemplate { tag, quasi } => {
            // Compiled as a call to `tag` with the quasi's cooked strings
            // array followed by the interpolated expressions — the tagged
            // form's raw-strings array is an interpreter-side host helper
            // over the same `BuildTemplate` payload.
            compile_expr(fc, builder, closures, suspensions, tag)?;
            compile_expr(fc, builder, closures, suspensions, quasi)?;
            fc.chunk.emit(OpCode::Call(1), span);
        }
        Node::ArrayLiteral(elements) => {
            let mut count = 0u32;
            for el in elements {
                match el {
                    ArrayElement::Item(e) => {
                        compile_expr(fc, builder, closures, suspensions, e)?;
                        count += 1;
                    }
                    ArrayElement::Spread(e) => {
                        compile_expr(fc, builder, closures, suspensions, e)?;
                        fc.chunk.emit(OpCode::Spread, span);
                        count += 1;
                    }
                    ArrayElement::Hole => {
                        let idx = fc.chunk.add_constant(Constant::Undefined);
                        fc.chunk.emit(OpCode::Constant(idx), span);
                        count += 1;
                    }
                }
            }
            fc.chunk.emit(OpCode::BuildArray(count), span);
        }
        Node::ObjectLiteral(props) => {
            let mut count = 0u32;
            for prop in props {
                if prop.spread {
                    compile_expr(fc, builder, closures, suspensions, prop.value)?;
                    fc.chunk.emit(OpCode::Spread, span);
                    count += 1;
                    continue;
                }
                match prop.key {
                    PropertyKey::Ident(name) | PropertyKey::StringLit(name) => {
                        let idx = fc.string_const(&fc.atoms.resolve(name));
                        fc.chunk.emit(OpCode::Constant(idx), span);
                    }
                    PropertyKey::NumberLit(n) => {
                        let idx = fc.chunk.add_constant(Constant::Number(n));
                        fc.chunk.emit(OpCode::Constant(idx), span);
                    }
                    PropertyKey::Computed(e) => compile_expr(fc, builder, closures, suspensions, e)?,
                }
                compile_expr(fc, builder, closures, suspensions, prop.value)?;
                count += 1;
            }
            fc.chunk.emit(OpCode::BuildObject(count), span);
        }
        Node::ArrowFunction(sig) => compile_function_expr(fc, builder, closures, suspensions, expr, &sig, span)?,
        Node::Await(operand) => {
            compile_expr(fc, builder, closures, suspensions, operand)?;
            let state = fc.next_state();
            fc.chunk.emit(OpCode::Await(state), span);
            fc.mark_resume_point(state);
        }
        Node::Yield { delegate, argument } => {
            match argument {
                Some(a) => compile_expr(fc, builder, closures, suspensions, a)?,
                None => {
                    let idx = fc.chunk.add_constant(Constant::Undefined);
                    fc.chunk.emit(OpCode::Constant(idx), span);
                }
            }
            let state = fc.next_state();
            fc.chunk.emit(if delegate { OpCode::YieldStar(state) } else { OpCode::Yield(state) }, span);
            fc.mark_resume_point(state);
        }
        Node::Spread(e) => {
            compile_expr(fc, builder, closures, suspensions, e)?;
            fc.chunk.emit(OpCode::Spread, span);
        }
        Node::Sequence(exprs) => {
            for (i, e) in exprs.iter().enumerate() {
                compile_expr(fc, builder, closures, suspensions, *e)?;
                if i + 1 != exprs.len() {
                    fc.chunk.emit(OpCode::Pop, span);
                }
            }
        }
        other => unreachable!("compile_expr saw a non-expression node {other:?}"),
    }
    Ok(())
}

fn compile_delete(
    fc: &mut FnCompiler,
    builder: &mut ArtifactBuilder,
    closures: &ClosurePlanResult,
    suspensions: &Suspensions,
    operand: NodeIndex,
    span: Span,
) -> Result<(), EmitError> {
    match fc.arena.get(operand).clone() {
        Node::Get { object, name, .. } => {
            compile_expr(fc, builder, closures, suspensions, object)?;
            let idx = fc.name_const(name);
            fc.chunk.emit(OpCode::Constant(idx), span);
            fc.chunk.emit(OpCode::SetIndex, span);
        }
        Node::GetIndex { object, index, .. } => {
            compile_expr(fc, builder, closures, suspensions, object)?;
            compile_expr(fc, builder, closures, suspensions, index)?;
            fc.chunk.emit(OpCode::SetIndex, span);
        }
        _ => {
            let idx = fc.chunk.add_constant(Constant::Bool(true));
            fc.chunk.emit(OpCode::Constant(idx), span);
        }
    }
    Ok(())
}

fn binary_op(op: BinaryOp) -> OpCode {
    match op {
        BinaryOp::Add => OpCode::Add,
        BinaryOp::Sub => OpCode::Sub,
        BinaryOp::Mul => OpCode::Mul,
        BinaryOp::Div => OpCode::Div,
        BinaryOp::Mod => OpCode::Mod,
        BinaryOp::Pow => OpCode::Pow,
        BinaryOp::Shl => OpCode::Shl,
        BinaryOp::Shr => OpCode::Shr,
        BinaryOp::UShr => OpCode::UShr,
        BinaryOp::BitAnd => OpCode::BitAnd,
        BinaryOp::BitOr => OpCode::BitOr,
        BinaryOp::BitXor => OpCode::BitXor,
        BinaryOp::Lt => OpCode::Lt,
        BinaryOp::Gt => OpCode::Gt,
        BinaryOp::Le => OpCode::Le,
        BinaryOp::Ge => OpCode::Ge,
        BinaryOp::EqEq => OpCode::LooseEq,
        BinaryOp::NotEq => OpCode::LooseNotEq,
        BinaryOp::EqEqEq => OpCode::StrictEq,
        BinaryOp::NotEqEq => OpCode::StrictNotEq,
        BinaryOp::In => OpCode::In,
        BinaryOp::Instanceof => OpCode::Instanceof,
    }
}

fn unary_op(op: UnaryOp) -> OpCode {
    match op {
        UnaryOp::Plus => OpCode::Pos,
        UnaryOp::Minus => OpCode::Neg,
        UnaryOp::Not => OpCode::Not,
        UnaryOp::BitNot => OpCode::BitNot,
        UnaryOp::Typeof => OpCode::Typeof,
        UnaryOp::Void => OpCode::VoidOp,
        UnaryOp::Delete => unreachable!("delete is handled by compile_delete"),
    }
}

fn compile_args(
    fc: &mut FnCompiler,
    builder: &mut ArtifactBuilder,
    closures: &ClosurePlanResult,
    suspensions: &Suspensions,
    args: &[tsz_parser::Argument],
) -> Result<u32, EmitError> {
    let span = fc.chunk.spans.last().copied().unwrap_or_default();
    for arg in args {
        compile_expr(fc, builder, closures, suspensions, arg.value)?;
        if arg.spread {
            fc.chunk.emit(OpCode::Spread, span);
        }
    }
    Ok(u32::try_from(args.len()).expect("argument count overflow"))
}

fn compile_call(
    fc: &mut FnCompiler,
    builder: &mut ArtifactBuilder,
    closures: &ClosurePlanResult,
    suspensions: &Suspensions,
    callee: NodeIndex,
    args: &[tsz_parser::Argument],
    optional: bool,
    span: Span,
) -> Result<(), EmitError> {
    // A method call (`obj.m(...)`/`obj[k](...)`) pushes the receiver ahead
    // of the callee so the interpreter can bind it as `this`; a bare call
    // pushes `undefined` as its receiver.
    match fc.arena.get(callee).clone() {
        Node::Get { object, name, optional: member_optional } => {
            compile_expr(fc, builder, closures, suspensions, object)?;
            fc.chunk.emit(OpCode::Dup, span);
            let idx = fc.name_const(name);
            fc.chunk.emit(if member_optional || optional { OpCode::GetFieldOptional(idx) } else { OpCode::GetField(idx) }, span);
        }
        Node::GetIndex { object, index, optional: member_optional } => {
            compile_expr(fc, builder, closures, suspensions, object)?;
            fc.chunk.emit(OpCode::Dup, span);
            compile_expr(fc, builder, closures, suspensions, index)?;
            fc.chunk.emit(if member_optional || optional { OpCode::GetIndexOptional } else { OpCode::GetIndex }, span);
        }
        Node::Super => {
            fc.chunk.emit(OpCode::GetThis, span);
            fc.chunk.emit(OpCode::GetSuper, span);
        }
        _ => {
            let undef = fc.chunk.add_constant(Constant::Undefined);
            fc.chunk.emit(OpCode::Constant(undef), span);
            compile_expr(fc, builder, closures, suspensions, callee)?;
        }
    }
    let argc = compile_args(fc, builder, closures, suspensions, args)?;
    fc.chunk.emit(OpCode::Call(argc), span);
    Ok(())
}

fn compile_assign(
    fc: &mut FnCompiler,
    builder: &mut ArtifactBuilder,
    closures: &ClosurePlanResult,
    suspensions: &Suspensions,
    target: NodeIndex,
    value: NodeIndex,
    span: Span,
) -> Result<(), EmitError> {
    match fc.arena.get(target).clone() {
        Node::Identifier(name) => {
            let loc = fc.resolve(name);
            let idx = fc.name_const(name);
            fc.emit_set(loc, |s| name_const_of(s, idx), |s| { let _ = compile_expr(s, builder, closures, suspensions, value); }, span);
            // leave the assigned value itself on the stack as the
            // expression's result.
            fc.emit_get(loc, |s| name_const_of(s, idx), span);
        }
        Node::Get { object, name, .. } => {
            compile_expr(fc, builder, closures, suspensions, object)?;
            compile_expr(fc, builder, closures, suspensions, value)?;
            let tmp = fc.temp_slot();
            fc.chunk.emit(OpCode::Dup, span);
            fc.chunk.emit(OpCode::SetLocal(tmp), span);
            let idx = fc.name_const(name);
            fc.chunk.emit(OpCode::SetField(idx), span);
            fc.chunk.emit(OpCode::GetLocal(tmp), span);
        }
        Node::GetIndex { object, index, .. } => {
            compile_expr(fc, builder, closures, suspensions, object)?;
            compile_expr(fc, builder, closures, suspensions, index)?;
            compile_expr(fc, builder, closures, suspensions, value)?;
            let tmp = fc.temp_slot();
            fc.chunk.emit(OpCode::Dup, span);
            fc.chunk.emit(OpCode::SetLocal(tmp), span);
            fc.chunk.emit(OpCode::SetIndex, span);
            fc.chunk.emit(OpCode::GetLocal(tmp), span);
        }
        Node::ArrayPattern { .. } | Node::ObjectPattern { .. } => {
            compile_expr(fc, builder, closures, suspensions, value)?;
            fc.chunk.emit(OpCode::Dup, span);
            bind_pattern(fc, builder, closures, suspensions, target)?;
        }
        other => unreachable!("invalid assignment target {other:?}"),
    }
    Ok(())
}

fn compile_compound_set(
    fc: &mut FnCompiler,
    builder: &mut ArtifactBuilder,
    closures: &ClosurePlanResult,
    suspensions: &Suspensions,
    op: AssignOp,
    target: NodeIndex,
    value: NodeIndex,
    span: Span,
) -> Result<(), EmitError> {
    // `x op= y` desugars to `x = x op y` for every arithmetic/bitwise
    // compound operator; the three logical-assignment operators
    // (`&&=`, `||=`, `??=`) short-circuit instead, so they must not
    // evaluate the RHS unless the guard condition holds.
    if matches!(op, AssignOp::AndAnd | AssignOp::OrOr | AssignOp::NullishCoalesce) {
        compile_expr(fc, builder, closures, suspensions, target)?;
        let j = match op {
            AssignOp::AndAnd => fc.chunk.emit(OpCode::JumpIfFalse(0), span),
            AssignOp::OrOr => fc.chunk.emit(OpCode::JumpIfTrue(0), span),
            AssignOp::NullishCoalesce => fc.chunk.emit(OpCode::JumpIfNullish(0), span),
            _ => unreachable!(),
        };
        let jend = fc.chunk.emit(OpCode::Jump(0), span);
        fc.chunk.patch_jump_to_here(j);
        fc.chunk.emit(OpCode::Pop, span);
        compile_assign(fc, builder, closures, suspensions, target, value, span)?;
        fc.chunk.patch_jump_to_here(jend);
        return Ok(());
    }
    let bin_op = compound_binary_op(op);
    match fc.arena.get(target).clone() {
        Node::Identifier(name) => {
            let loc = fc.resolve(name);
            let idx = fc.name_const(name);
            fc.emit_get(loc, |s| name_const_of(s, idx), span);
            compile_expr(fc, builder, closures, suspensions, value)?;
            fc.chunk.emit(bin_op, span);
            fc.chunk.emit(OpCode::Dup, span);
            fc.emit_set_prevalued(loc, |s| name_const_of(s, idx), span);
        }
        Node::Get { object, name, .. } => {
            compile_expr(fc, builder, closures, suspensions, object)?;
            fc.chunk.emit(OpCode::Dup, span);
            let idx = fc.name_const(name);
            fc.chunk.emit(OpCode::GetField(idx), span);
            compile_expr(fc, builder, closures, suspensions, value)?;
            fc.chunk.emit(bin_op, span);
            let tmp = fc.temp_slot();
            fc.chunk.emit(OpCode::Dup, span);
            fc.chunk.emit(OpCode::SetLocal(tmp), span);
            fc.chunk.emit(OpCode::SetField(idx), span);
            fc.chunk.emit(OpCode::GetLocal(tmp), span);
        }
        Node::GetIndex { object, index, .. } => {
            // `object`/`index` are evaluated exactly once (re-evaluating
            // either to get a second copy for the later `SetIndex` would
            // duplicate any side effect they carry), so both are stashed
            // in scratch locals between the read and the write.
            compile_expr(fc, builder, closures, suspensions, object)?;
            let obj_tmp = fc.temp_slot();
            fc.chunk.emit(OpCode::Dup, span);
            fc.chunk.emit(OpCode::SetLocal(obj_tmp), span);
            compile_expr(fc, builder, closures, suspensions, index)?;
            let idx_tmp = fc.temp_slot();
            fc.chunk.emit(OpCode::Dup, span);
            fc.chunk.emit(OpCode::SetLocal(idx_tmp), span);
            fc.chunk.emit(OpCode::GetIndex, span);
            compile_expr(fc, builder, closures, suspensions, value)?;
            fc.chunk.emit(bin_op, span);
            let result_tmp = fc.temp_slot();
            fc.chunk.emit(OpCode::Dup, span);
            fc.chunk.emit(OpCode::SetLocal(result_tmp), span);
            fc.chunk.emit(OpCode::GetLocal(obj_tmp), span);
            fc.chunk.emit(OpCode::GetLocal(idx_tmp), span);
            fc.chunk.emit(OpCode::GetLocal(result_tmp), span);
            fc.chunk.emit(OpCode::SetIndex, span);
        }
        other => unreachable!("invalid compound-assignment target {other:?}"),
    }
    Ok(())
}

fn compound_binary_op(op: AssignOp) -> OpCode {
    match op {
        AssignOp::Add => OpCode::Add,
        AssignOp::Sub => OpCode::Sub,
        AssignOp::Mul => OpCode::Mul,
        AssignOp::Div => OpCode::Div,
        AssignOp::Mod => OpCode::Mod,
        AssignOp::Pow => OpCode::Pow,
        AssignOp::Shl => OpCode::Shl,
        AssignOp::Shr => OpCode::Shr,
        AssignOp::UShr => OpCode::UShr,
        AssignOp::BitAnd => OpCode::BitAnd,
        AssignOp::BitOr => OpCode::BitOr,
        AssignOp::BitXor => OpCode::BitXor,
        AssignOp::Plain | AssignOp::AndAnd | AssignOp::OrOr | AssignOp::NullishCoalesce => {
            unreachable!("handled separately")
        }
    }
}

fn compile_incr(
    fc: &mut FnCompiler,
    builder: &mut ArtifactBuilder,
    closures: &ClosurePlanResult,
    suspensions: &Suspensions,
    operand: NodeIndex,
    decrement: bool,
    is_prefix: bool,
    span: Span,
) -> Result<(), EmitError> {
    let op = match (decrement, is_prefix) {
        (false, true) => OpCode::PrefixIncrement,
        (true, true) => OpCode::PrefixDecrement,
        (false, false) => OpCode::PostfixIncrement,
        (true, false) => OpCode::PostfixDecrement,
    };
    match fc.arena.get(operand).clone() {
        Node::Identifier(name) => {
            let loc = fc.resolve(name);
            let idx = fc.name_const(name);
            fc.emit_get(loc, |s| name_const_of(s, idx), span);
            fc.chunk.emit(op, span);
            fc.chunk.emit(OpCode::Dup, span);
            fc.emit_set_prevalued(loc, |s| name_const_of(s, idx), span);
            if !is_prefix {
                // The interpreter's `PostfixIncrement`/`PostfixDecrement`
                // push both the pre- and post-update values so the
                // expression result (pre-update) survives the store above;
                // drop the post-update copy this emitter pushed for SetX.
                fc.chunk.emit(OpCode::Pop, span);
            }
        }
        Node::Get { object, name, .. } => {
            compile_expr(fc, builder, closures, suspensions, object)?;
            let obj_tmp = fc.temp_slot();
            fc.chunk.emit(OpCode::Dup, span);
            fc.chunk.emit(OpCode::SetLocal(obj_tmp), span);
            let idx = fc.name_const(name);
            fc.chunk.emit(OpCode::GetField(idx), span);
            fc.chunk.emit(op, span);
            let result = stash_incr_result(fc, is_prefix, span);
            fc.chunk.emit(OpCode::GetLocal(obj_tmp), span);
            fc.chunk.emit(OpCode::GetLocal(result.store), span);
            fc.chunk.emit(OpCode::SetField(idx), span);
            fc.chunk.emit(OpCode::GetLocal(result.expr), span);
        }
        Node::GetIndex { object, index, .. } => {
            compile_expr(fc, builder, closures, suspensions, object)?;
            let obj_tmp = fc.temp_slot();
            fc.chunk.emit(OpCode::Dup, span);
            fc.chunk.emit(OpCode::SetLocal(obj_tmp), span);
            compile_expr(fc, builder, closures, suspensions, index)?;
            let idx_tmp = fc.temp_slot();
            fc.chunk.emit(OpCode::Dup, span);
            fc.chunk.emit(OpCode::SetLocal(idx_tmp), span);
            fc.chunk.emit(OpCode::GetIndex, span);
            fc.chunk.emit(op, span);
            let result = stash_incr_result(fc, is_prefix, span);
            fc.chunk.emit(OpCode::GetLocal(obj_tmp), span);
            fc.chunk.emit(OpCode::GetLocal(idx_tmp), span);
            fc.chunk.emit(OpCode::GetLocal(result.store), span);
            fc.chunk.emit(OpCode::SetIndex, span);
            fc.chunk.emit(OpCode::GetLocal(result.expr), span);
        }
        other => unreachable!("invalid increment/decrement target {other:?}"),
    }
    Ok(())
}

struct StashedIncr {
    /// Local slot holding the value to store back (the updated value, for
    /// both prefix and postfix forms).
    store: u32,
    /// Local slot holding the expression's result (same as `store` for
    /// prefix; the pre-update value for postfix).
    expr: u32,
}

/// Pops `PrefixIncrement`/`PostfixIncrement`'s (or the decrement variants')
/// output off the stack into scratch locals, so the caller can freely push
/// other values (the receiver, an index) before writing the result back
/// without losing track of which copy is which.
fn stash_incr_result(fc: &mut FnCompiler, is_prefix: bool, span: Span) -> StashedIncr {
    if is_prefix {
        let slot = fc.temp_slot();
        fc.chunk.emit(OpCode::SetLocal(slot), span);
        StashedIncr { store: slot, expr: slot }
    } else {
        let post = fc.temp_slot();
        fc.chunk.emit(OpCode::SetLocal(post), span);
        let pre = fc.temp_slot();
        fc.chunk.emit(OpCode::SetLocal(pre), span);
        StashedIncr { store: post, expr: pre }
    }
}

/// Compiles a `Function`/`ArrowFunction` node into its own `FunctionArtifact`
/// (pushed into `builder`), then emits the `Closure` construction op that
/// leaves the new closure value on the caller's stack.
fn compile_function_expr(
    fc: &mut FnCompiler,
    builder: &mut ArtifactBuilder,
    closures: &ClosurePlanResult,
    suspensions: &Suspensions,
    node: NodeIndex,
    sig: &FunctionSig,
    span: Span,
) -> Result<(), EmitError> {
    let own_plan = closures.functions.get(&node).cloned().unwrap_or_default();
    let upvalues = build_upvalue_sources(&fc.own_plan, &own_plan);
    let function_idx = compile_function_body(fc.arena, fc.atoms, closures, suspensions, builder, node, sig, &own_plan, upvalues)?;
    let const_idx = fc.chunk.add_constant(Constant::Function(function_idx));
    fc.chunk.emit(OpCode::Closure(const_idx), span);
    Ok(())
}

/// Standalone compiler for one function body, used both for nested
/// expressions (`compile_function_expr`) and for top-level/class-member
/// declarations that already know their own `NodeIndex`.
#[allow(clippy::too_many_arguments)]
fn compile_function_body(
    arena: &NodeArena,
    atoms: &Interner,
    closures: &ClosurePlanResult,
    suspensions: &Suspensions,
    builder: &mut ArtifactBuilder,
    node: NodeIndex,
    sig: &FunctionSig,
    own_plan: &ClosurePlan,
    upvalues: Vec<crate::artifact::UpvalueSource>,
) -> Result<u32, EmitError> {
    let mut body_fc = FnCompiler::new(arena, atoms, closures, own_plan.clone());
    for param in &sig.params {
        declare_param(&mut body_fc, builder, closures, suspensions, param)?;
    }

    let state_machine = if sig.modifiers != FunctionModifiers::Plain {
        let suspension_plan = suspensions
            .get(&node)
            .map(|(_, plan)| plan.clone())
            .unwrap_or_else(|| tsz_lowering::plan_suspensions(arena, sig));
        if suspension_plan.suspension_points.len() > limits::MAX_SUSPENSION_POINTS as usize {
            return Err(EmitError::TooManySuspensionPoints { node, span: arena.span(node) });
        }
        let sm_plan = plan_state_machine(sig.modifiers, own_plan, &suspension_plan);
        body_fc.suspend_state = Some(crate::compiler::new_suspend_state(sm_plan.fields.clone()));
        Some((sm_plan, suspension_plan))
    } else {
        None
    };

    if let Some(body) = sig.body {
        match arena.get(body) {
            Node::Block(_) => {
                compile_statement(&mut body_fc, builder, closures, suspensions, body)?;
                let span = arena.span(body);
                let undef = body_fc.chunk.add_constant(Constant::Undefined);
                body_fc.chunk.emit(OpCode::Constant(undef), span);
                body_fc.chunk.emit(OpCode::Return, span);
            }
            _ => {
                let span = arena.span(body);
                compile_expr(&mut body_fc, builder, closures, suspensions, body)?;
                body_fc.chunk.emit(OpCode::Return, span);
            }
        }
    }

    let environment = own_plan.environment_class.map(|env| builder.ensure_display_class(env, own_plan, atoms));
    let environment_fields = environment.map(|_| builder.env_field_names.get(&own_plan.environment_class.unwrap()).cloned().unwrap_or_default()).unwrap_or_default();

    let arity = u32::try_from(sig.params.iter().take_while(|p| !p.optional && !p.rest && p.default.is_none()).count()).unwrap_or(0);
    let has_rest = sig.params.last().is_some_and(|p| p.rest);

    let state_machine_artifact = state_machine.map(|(sm_plan, suspension_plan)| {
        let try_regions = suspension_plan
            .try_regions
            .iter()
            .map(|r| TryRegionArtifact {
                id: r.id,
                parent_id: r.parent_id,
                has_suspension_in_finally: r.has_suspension_in_finally,
                catch_ip: None,
                finally_ip: None,
            })
            .collect();
        let kind = match sig.modifiers {
            FunctionModifiers::Async => StateMachineKind::Async,
            FunctionModifiers::Generator => StateMachineKind::Generator,
            FunctionModifiers::AsyncGenerator => StateMachineKind::AsyncGenerator,
            FunctionModifiers::Plain => unreachable!(),
        };
        let fields = sm_plan.fields.iter().map(|f| atoms.resolve(f.name).to_string()).collect();
        StateMachineArtifact {
            kind,
            state_count: u32::try_from(sm_plan.state_count).unwrap_or(0),
            fields,
            chunk: body_fc.chunk.clone(),
            resume_ips: body_fc.suspend_state.as_ref().map(|s| s.resume_ips.clone()).unwrap_or_default(),
            try_regions,
        }
    });

    let artifact = FunctionArtifact {
        name: sig.name.map(|n| atoms.resolve(n).to_string()),
        arity,
        has_rest,
        chunk: if state_machine_artifact.is_some() { crate::chunk::Chunk::new() } else { body_fc.chunk },
        environment,
        environment_fields,
        upvalues,
        state_machine: state_machine_artifact,
    };
    Ok(builder.push_function(artifact))
}

fn declare_param(
    fc: &mut FnCompiler,
    builder: &mut ArtifactBuilder,
    closures: &ClosurePlanResult,
    suspensions: &Suspensions,
    param: &Param,
) -> Result<(), EmitError> {
    let span = fc.arena.span(param.pattern);
    let is_destructured = matches!(fc.arena.get(param.pattern).clone(), Node::ArrayPattern { .. } | Node::ObjectPattern { .. });

    if is_destructured {
        // A state-machine chunk's locals are all hoisted into named state
        // fields by `plan_state_machine`, one field per declared
        // identifier; it has no notion of an anonymous field holding a raw
        // pre-destructuring parameter value for `bind_pattern` to unpack
        // later from across a suspend. Parameter patterns stay a plain
        // positional local everywhere else.
        if fc.suspend_state.is_some() {
            return Err(CompileError::DestructuringPatternTooComplex { node: param.pattern, span }.into());
        }
        let Loc::Local(slot) = fc.declare(Atom::EMPTY) else {
            unreachable!("a non-suspension-bearing function's parameter always gets its own local slot")
        };
        fc.chunk.emit(OpCode::GetLocal(slot), span);
        if let Some(default) = param.default {
            apply_default(fc, builder, closures, suspensions, default, span)?;
        }
        bind_pattern(fc, builder, closures, suspensions, param.pattern)?;
        return Ok(());
    }

    match fc.arena.get(param.pattern).clone() {
        Node::Identifier(name) => {
            let loc = fc.declare(name);
            if let Some(default) = param.default {
                // Parameter values are pulled implicitly by local-slot
                // position at call time; a default is applied by checking
                // for `undefined` immediately after entry.
                let idx = fc.name_const(name);
                fc.emit_get(loc, |s| name_const_of(s, idx), span);
                apply_default(fc, builder, closures, suspensions, default, span)?;
                fc.emit_set_prevalued(loc, |s| name_const_of(s, idx), span);
            }
        }
        _ => {}
    }
    Ok(())
}

fn compile_enum(
    fc: &mut FnCompiler,
    builder: &mut ArtifactBuilder,
    closures: &ClosurePlanResult,
    suspensions: &Suspensions,
    name: Atom,
    is_const: bool,
    members: &[(Atom, Option<NodeIndex>)],
    span: Span,
) -> Result<(), EmitError> {
    let mut count = 0u32;
    let mut next_numeric = 0f64;
    for (member_name, init) in members {
        let member_name_str = fc.atoms.resolve(*member_name).to_string();
        let key_idx = fc.string_const(&member_name_str);
        fc.chunk.emit(OpCode::Constant(key_idx), span);
        match init {
            Some(e) => {
                compile_expr(fc, builder, closures, suspensions, *e)?;
                count += 1;
            }
            None => {
                let idx = fc.chunk.add_constant(Constant::Number(next_numeric));
                fc.chunk.emit(OpCode::Constant(idx), span);
                count += 1;
                if !is_const {
                    // Auto-incremented members are always numeric, so they
                    // also get the reverse value -> name mapping in the
                    // same object. Members with an explicit initializer are
                    // skipped here: this emitter has no type information to
                    // tell a numeric initializer from a string one, and a
                    // `const enum`'s members are inlined at use sites
                    // rather than read back through this object anyway.
                    let reverse_key_idx = fc.string_const(&next_numeric.to_string());
                    fc.chunk.emit(OpCode::Constant(reverse_key_idx), span);
                    let reverse_val_idx = fc.string_const(&member_name_str);
                    fc.chunk.emit(OpCode::Constant(reverse_val_idx), span);
                    count += 1;
                }
            }
        }
        next_numeric += 1.0;
    }
    fc.chunk.emit(OpCode::BuildObject(count), span);
    let loc = fc.declare(name);
    let name_idx = fc.name_const(name);
    fc.emit_set_prevalued(loc, |s| name_const_of(s, name_idx), span);
    Ok(())
}

fn compile_class(
    fc: &mut FnCompiler,
    builder: &mut ArtifactBuilder,
    closures: &ClosurePlanResult,
    suspensions: &Suspensions,
    node: NodeIndex,
    span: Span,
) -> Result<(), EmitError> {
    let Node::Class { name, super_class, members, .. } = fc.arena.get(node).clone() else {
        unreachable!()
    };

    let super_idx = match super_class {
        Some(super_expr) => {
            let Node::Identifier(super_name) = fc.arena.get(super_expr).clone() else {
                return Err(EmitError::UnresolvedCapture { node: super_expr, span: fc.arena.span(super_expr) });
            };
            builder.classes.iter().position(|c| c.name == fc.atoms.resolve(super_name).to_string()).map(|i| u32::try_from(i).unwrap())
        }
        None => None,
    };

    // Class methods have no dedicated `ClosurePlan` entry (the planner
    // walks their bodies in the enclosing frame); compile every method
    // against the *enclosing* function's own plan, same as the class
    // declaration statement itself, rather than trying to derive a
    // per-method plan that does not exist.
    let mut constructor = None;
    let mut methods = Vec::new();
    let mut getters = Vec::new();
    let mut setters = Vec::new();
    let mut fields = Vec::new();

    for member in &members {
        match member.kind {
            ClassMemberKind::Field => {
                let field_name = member.name.map(|n| fc.atoms.resolve(n).to_string()).unwrap_or_default();
                let init_fn = match member.initializer {
                    Some(init) => {
                        let sig = FunctionSig {
                            name: None,
                            type_params: Vec::new(),
                            params: Vec::new(),
                            return_type: None,
                            body: Some(init),
                            modifiers: FunctionModifiers::Plain,
                            is_arrow: false,
                        };
                        Some(compile_function_body(fc.arena, fc.atoms, closures, suspensions, builder, init, &sig, &fc.own_plan, Vec::new())?)
                    }
                    None => None,
                };
                fields.push((field_name, init_fn));
            }
            ClassMemberKind::StaticBlock => {
                // Executed once at class-definition time; lowered as an
                // immediately-invoked field initializer with no name.
                if let Some(init) = member.initializer {
                    let sig = FunctionSig {
                        name: None,
                        type_params: Vec::new(),
                        params: Vec::new(),
                        return_type: None,
                        body: Some(init),
                        modifiers: FunctionModifiers::Plain,
                        is_arrow: false,
                    };
                    let idx = compile_function_body(fc.arena, fc.atoms, closures, suspensions, builder, init, &sig, &fc.own_plan, Vec::new())?;
                    fields.push((String::new(), Some(idx)));
                }
            }
            ClassMemberKind::Constructor | ClassMemberKind::Method | ClassMemberKind::Getter | ClassMemberKind::Setter => {
                let Some(sig) = &member.sig else { continue };
                let method_node = member.initializer.unwrap_or(node);
                let fn_idx = compile_function_body(fc.arena, fc.atoms, closures, suspensions, builder, method_node, sig, &fc.own_plan, Vec::new())?;
                match member.kind {
                    ClassMemberKind::Constructor => constructor = Some(fn_idx),
                    ClassMemberKind::Method => methods.push(ClassMemberArtifact {
                        name: member.name.map(|n| fc.atoms.resolve(n).to_string()).unwrap_or_default(),
                        function: fn_idx,
                        is_static: member.is_static,
                    }),
                    ClassMemberKind::Getter => getters.push(ClassMemberArtifact {
                        name: member.name.map(|n| fc.atoms.resolve(n).to_string()).unwrap_or_default(),
                        function: fn_idx,
                        is_static: member.is_static,
                    }),
                    ClassMemberKind::Setter => setters.push(ClassMemberArtifact {
                        name: member.name.map(|n| fc.atoms.resolve(n).to_string()).unwrap_or_default(),
                        function: fn_idx,
                        is_static: member.is_static,
                    }),
                    _ => unreachable!(),
                }
            }
        }
    }

    let class_artifact = ClassArtifact {
        name: name.map(|n| fc.atoms.resolve(n).to_string()).unwrap_or_default(),
        super_class: super_idx,
        constructor,
        methods,
        getters,
        setters,
        fields,
    };
    let class_idx = builder.push_class(class_artifact);

    if let Some(name) = name {
        let const_idx = fc.chunk.add_constant(Constant::Class(class_idx));
        fc.chunk.emit(OpCode::Constant(const_idx), span);
        let loc = fc.declare(name);
        let name_idx = fc.name_const(name);
        fc.emit_set_prevalued(loc, |s| name_const_of(s, name_idx), span);
    }
    Ok(())
}

//! Shared per-function compiler state: local-slot allocation, capture
//! resolution against a `tsz_lowering::ClosurePlan`, and loop/try
//! bookkeeping used while walking statements.

use rustc_hash::FxHashMap;

use tsz_common::{Atom, Interner, Span};
use tsz_lowering::{ClosurePlan, ClosurePlanResult, EnvId, FieldId, StateField, StateFieldKind};
use tsz_parser::NodeArena;

use crate::artifact::{DisplayClassArtifact, UpvalueSource};
use crate::chunk::{Chunk, OpCode};

/// Where a resolved identifier lives at compile time.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Loc {
    /// Ordinary-function local slot.
    Local(u32),
    /// A raw field on this function's own instance (`GetEnvironmentField`):
    /// either a closure's own display-class field (a nested function
    /// captures it) or — inside a state-machine chunk — a hoisted
    /// parameter/local/`this` field that must outlive a suspend.
    OwnEnvField(u32),
    /// Read through an ordinary closure's upvalue list
    /// (`FunctionArtifact::upvalues`): push the referenced environment,
    /// then `GetField`/`SetField` the captured name on it.
    Upvalue(u32),
    /// Inside a state-machine chunk: an `OuterEnvironment` field on this
    /// function's own instance holds the captured environment reference
    /// (copied in at construction, since the upvalue list itself may not
    /// outlive a suspend) — push it via `GetEnvironmentField`, then
    /// `GetField`/`SetField` the captured name on it.
    OuterEnvField { field: u32 },
    Global,
}

/// Where a `this` read resolves:
/// either the current function's own receiver, or — for an arrow body that
/// closed over its defining function's `this` — a captured reference
/// reached exactly like any other captured variable.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ThisLoc {
    Own,
    Upvalue(u32),
    OuterEnvField { field: u32 },
}

/// Shared, whole-artifact output accumulated while compiling every function
/// in the program.
pub(crate) struct ArtifactBuilder {
    pub functions: Vec<crate::artifact::FunctionArtifact>,
    pub classes: Vec<crate::artifact::ClassArtifact>,
    pub display_classes: Vec<DisplayClassArtifact>,
    pub env_field_names: FxHashMap<EnvId, Vec<String>>,
}

impl ArtifactBuilder {
    pub fn new() -> Self {
        ArtifactBuilder {
            functions: Vec::new(),
            classes: Vec::new(),
            display_classes: Vec::new(),
            env_field_names: FxHashMap::default(),
        }
    }

    pub fn push_function(&mut self, f: crate::artifact::FunctionArtifact) -> u32 {
        self.functions.push(f);
        u32::try_from(self.functions.len() - 1).expect("function table overflow")
    }

    pub fn push_class(&mut self, c: crate::artifact::ClassArtifact) -> u32 {
        self.classes.push(c);
        u32::try_from(self.classes.len() - 1).expect("class table overflow")
    }

    /// Registers (if not already registered) the display class for `env`,
    /// sized from its owning `ClosurePlan`.
    pub fn ensure_display_class(&mut self, env: EnvId, plan: &ClosurePlan, atoms: &Interner) -> u32 {
        if let Some(idx) = self.display_classes.iter().position(|d| d.id == env.0) {
            return u32::try_from(idx).expect("display class table overflow");
        }
        let mut named: Vec<(FieldId, String)> = plan
            .environment_fields
            .iter()
            .map(|(&name, &field)| (field, atoms.resolve(name).to_string()))
            .collect();
        named.sort_by_key(|(field, _)| field.0);
        let field_names: Vec<String> = named.into_iter().map(|(_, name)| name).collect();
        self.env_field_names.insert(env, field_names.clone());
        let artifact = DisplayClassArtifact {
            id: env.0,
            field_names,
            has_this_field: plan.environment_this_field.is_some(),
        };
        self.display_classes.push(artifact);
        u32::try_from(self.display_classes.len() - 1).expect("display class table overflow")
    }
}

/// Resolve which outer environment (by position in `own_plan.uses_outer_environments`)
/// owns a given captured name, and that environment's field id for it.
pub(crate) fn resolve_capture(
    closures: &ClosurePlanResult,
    own_plan: &ClosurePlan,
    name: Atom,
) -> Option<(u32, FieldId)> {
    for (idx, env) in own_plan.uses_outer_environments.iter().enumerate() {
        if let Some(field) = env_owner_fields(closures, *env).and_then(|fields| fields.get(&name).copied()) {
            return Some((u32::try_from(idx).expect("upvalue overflow"), field));
        }
    }
    None
}

/// Resolve the upvalue position + field id holding `this` for an arrow
/// function that captured it lexically.
pub(crate) fn resolve_this_capture(closures: &ClosurePlanResult, own_plan: &ClosurePlan) -> Option<(u32, FieldId)> {
    for (idx, env) in own_plan.uses_outer_environments.iter().enumerate() {
        if let Some(field) = env_owner_this_field(closures, *env) {
            return Some((u32::try_from(idx).expect("upvalue overflow"), field));
        }
    }
    None
}

fn env_owner_fields(closures: &ClosurePlanResult, env: EnvId) -> Option<&FxHashMap<Atom, FieldId>> {
    if closures.top_level.environment_class == Some(env) {
        return Some(&closures.top_level.environment_fields);
    }
    closures
        .functions
        .values()
        .find(|p| p.environment_class == Some(env))
        .map(|p| &p.environment_fields)
}

fn env_owner_this_field(closures: &ClosurePlanResult, env: EnvId) -> Option<FieldId> {
    if closures.top_level.environment_class == Some(env) {
        return closures.top_level.environment_this_field;
    }
    closures
        .functions
        .values()
        .find(|p| p.environment_class == Some(env))
        .and_then(|p| p.environment_this_field)
}

/// Given a *child* closure's own plan, compute how each of its
/// `uses_outer_environments` entries should be sourced from the
/// *enclosing* function's frame at `Closure` construction time.
pub(crate) fn build_upvalue_sources(enclosing_plan: &ClosurePlan, child_plan: &ClosurePlan) -> Vec<UpvalueSource> {
    child_plan
        .uses_outer_environments
        .iter()
        .map(|env| {
            if enclosing_plan.environment_class == Some(*env) {
                UpvalueSource::FromEnclosingOwn
            } else {
                let idx = enclosing_plan
                    .uses_outer_environments
                    .iter()
                    .position(|e| e == env)
                    .expect("closure planner guarantees the enclosing frame already forwards every environment a nested frame needs");
                UpvalueSource::FromEnclosingOuter { index: u32::try_from(idx).expect("upvalue overflow") }
            }
        })
        .collect()
}

/// Per-function compiler: local-slot table, the chunk being built, and the
/// closure/loop bookkeeping needed while walking one function body.
pub(crate) struct FnCompiler<'a> {
    pub arena: &'a NodeArena,
    pub atoms: &'a Interner,
    pub closures: &'a ClosurePlanResult,
    pub own_plan: ClosurePlan,
    pub chunk: Chunk,
    /// Declaration-order stack of `(name, Loc)`; shadowing resolves by
    /// scanning from the end.
    locals: Vec<(Atom, Loc)>,
    next_slot: u32,
    pub has_own_environment: bool,
    pub loop_stack: Vec<LoopCtx>,
    /// `state >= 0` dispatch is only meaningful while compiling a
    /// suspension-bearing function; `None` for an ordinary function.
    pub suspend_state: Option<SuspendState>,
}

pub(crate) struct LoopCtx {
    pub label: Option<Atom>,
    pub break_jumps: Vec<usize>,
    pub continue_jumps: Vec<usize>,
}

/// Bookkeeping threaded through compilation of a suspension-bearing
/// function's single chunk. `fields` is `StateMachinePlan`'s
/// field table verbatim — field position doubles as the
/// `GetEnvironmentField`/`SetEnvironmentField` operand.
pub(crate) struct SuspendState {
    pub next_state_id: u32,
    /// `resume_ips[i]` filled in once state `i`'s resume label is emitted.
    pub resume_ips: Vec<u32>,
    pub fields: Vec<StateField>,
}

impl SuspendState {
    fn field_index(&self, name: Atom, kind: StateFieldKind) -> Option<u32> {
        self.fields
            .iter()
            .position(|f| f.name == name && f.kind == kind)
            .map(|i| u32::try_from(i).expect("state field table overflow"))
    }

    fn this_field_index(&self) -> Option<u32> {
        self.fields
            .iter()
            .position(|f| f.kind == StateFieldKind::This)
            .map(|i| u32::try_from(i).expect("state field table overflow"))
    }

    fn outer_env_field_index(&self, env: EnvId) -> Option<u32> {
        self.fields
            .iter()
            .position(|f| f.kind == StateFieldKind::OuterEnvironment(env))
            .map(|i| u32::try_from(i).expect("state field table overflow"))
    }
}

impl<'a> FnCompiler<'a> {
    pub fn new(arena: &'a NodeArena, atoms: &'a Interner, closures: &'a ClosurePlanResult, own_plan: ClosurePlan) -> Self {
        let has_own_environment = own_plan.environment_class.is_some();
        FnCompiler {
            arena,
            atoms,
            closures,
            own_plan,
            chunk: Chunk::new(),
            locals: Vec::new(),
            next_slot: 0,
            has_own_environment,
            loop_stack: Vec::new(),
            suspend_state: None,
        }
    }

    /// Declares `name` as a new binding. Inside a state-machine chunk every
    /// declaration was already hoisted into the field table by
    /// `plan_state_machine`, so
    /// this only looks the field up; otherwise a captured-by-a-nested-
    /// closure name lives in this function's own environment field, and anything else gets an ordinary local slot.
    pub fn declare(&mut self, name: Atom) -> Loc {
        if let Some(state) = &self.suspend_state {
            let loc = state
                .field_index(name, StateFieldKind::Parameter)
                .or_else(|| state.field_index(name, StateFieldKind::Local))
                .map(Loc::OwnEnvField)
                .unwrap_or(Loc::Global);
            self.locals.push((name, loc));
            return loc;
        }
        if let Some(field) = self.own_env_field(name) {
            self.locals.push((name, Loc::OwnEnvField(field.0)));
            return Loc::OwnEnvField(field.0);
        }
        let slot = self.next_slot;
        self.next_slot += 1;
        self.locals.push((name, Loc::Local(slot)));
        Loc::Local(slot)
    }

    fn own_env_field(&self, name: Atom) -> Option<FieldId> {
        self.own_plan.environment_fields.get(&name).copied()
    }

    /// Allocates a fresh raw local slot for a codegen-internal scratch
    /// value (e.g. preserving an assignment expression's result while its
    /// target is a field/index write). Unlike `declare`, this never
    /// consults the state-machine hoisting policy: a scratch value used
    /// and consumed entirely within one non-suspending expression does not
    /// need to survive a suspend, so it is always a plain local slot even
    /// inside a state-machine chunk.
    pub fn temp_slot(&mut self) -> u32 {
        let slot = self.next_slot;
        self.next_slot += 1;
        slot
    }

    /// Resolves an identifier read/write target.
    pub fn resolve(&self, name: Atom) -> Loc {
        for (decl_name, loc) in self.locals.iter().rev() {
            if *decl_name == name {
                return *loc;
            }
        }
        if self.own_plan.captures.contains(&name) {
            if let Some((idx, _field)) = resolve_capture(self.closures, &self.own_plan, name) {
                if let Some(state) = &self.suspend_state {
                    let env = self.own_plan.uses_outer_environments[idx as usize];
                    if let Some(field) = state.outer_env_field_index(env) {
                        return Loc::OuterEnvField { field };
                    }
                }
                return Loc::Upvalue(idx);
            }
        }
        Loc::Global
    }

    /// Resolves a lexical `this` read: an arrow body that reads outer `this` (`own_plan.
    /// captures_this`) reaches it exactly like any other captured
    /// variable; a non-arrow function always owns its own `this`.
    pub fn resolve_this(&self) -> ThisLoc {
        if self.own_plan.captures_this {
            if let Some((idx, _)) = resolve_this_capture(self.closures, &self.own_plan) {
                if let Some(state) = &self.suspend_state {
                    let env = self.own_plan.uses_outer_environments[idx as usize];
                    if let Some(field) = state.outer_env_field_index(env) {
                        return ThisLoc::OuterEnvField { field };
                    }
                }
                return ThisLoc::Upvalue(idx);
            }
        }
        ThisLoc::Own
    }

    /// Upvalues name the *environment* this function holds a non-owning
    /// reference to, not the captured variable directly — `GetUpvalue`
    /// pushes that environment object, and a further `GetField`/`SetField`
    /// by name reaches the specific captured binding inside it.
    pub fn emit_get(&mut self, loc: Loc, name_const: impl FnOnce(&mut Self) -> u32, span: Span) {
        match loc {
            Loc::Local(slot) => {
                self.chunk.emit(OpCode::GetLocal(slot), span);
            }
            Loc::OwnEnvField(field) => {
                self.chunk.emit(OpCode::GetEnvironmentField(field), span);
            }
            Loc::Upvalue(idx) => {
                self.chunk.emit(OpCode::GetUpvalue(idx), span);
                let name = name_const(self);
                self.chunk.emit(OpCode::GetField(name), span);
            }
            Loc::OuterEnvField { field } => {
                self.chunk.emit(OpCode::GetEnvironmentField(field), span);
                let name = name_const(self);
                self.chunk.emit(OpCode::GetField(name), span);
            }
            Loc::Global => {
                let idx = name_const(self);
                self.chunk.emit(OpCode::GetGlobal(idx), span);
            }
        }
    }

    /// Stores into `loc`. `compile_value` runs at the point in the emitted
    /// stream where the value must be pushed — *after* `GetUpvalue` for a
    /// captured variable (so `SetField` sees `[environment, value]`), but
    /// that is the only ordering-sensitive case, so callers that already
    /// pushed the value (the common case — an assignment's RHS) should use
    /// [`FnCompiler::emit_set_prevalued`] instead.
    pub fn emit_set(&mut self, loc: Loc, name_const: impl FnOnce(&mut Self) -> u32, compile_value: impl FnOnce(&mut Self), span: Span) {
        match loc {
            Loc::Upvalue(idx) => {
                self.chunk.emit(OpCode::GetUpvalue(idx), span);
                compile_value(self);
                let name = name_const(self);
                self.chunk.emit(OpCode::SetField(name), span);
            }
            Loc::OuterEnvField { field } => {
                self.chunk.emit(OpCode::GetEnvironmentField(field), span);
                compile_value(self);
                let name = name_const(self);
                self.chunk.emit(OpCode::SetField(name), span);
            }
            other => {
                compile_value(self);
                self.emit_set_prevalued(other, name_const, span);
            }
        }
    }

    /// Stores into `loc` assuming the value is already on top of stack.
    /// Only valid for `Loc::Upvalue`/`Loc::OuterEnvField` if the environment
    /// reference was already pushed immediately before the value (rare —
    /// prefer `emit_set`).
    pub fn emit_set_prevalued(&mut self, loc: Loc, name_const: impl FnOnce(&mut Self) -> u32, span: Span) {
        match loc {
            Loc::Local(slot) => {
                self.chunk.emit(OpCode::SetLocal(slot), span);
            }
            Loc::OwnEnvField(field) => {
                self.chunk.emit(OpCode::SetEnvironmentField(field), span);
            }
            Loc::Upvalue(_) | Loc::OuterEnvField { .. } => {
                let name = name_const(self);
                self.chunk.emit(OpCode::SetField(name), span);
            }
            Loc::Global => {
                let idx = name_const(self);
                self.chunk.emit(OpCode::SetGlobal(idx), span);
            }
        }
    }

    pub fn emit_get_this(&mut self, span: Span) {
        match self.resolve_this() {
            ThisLoc::Own => {
                self.chunk.emit(OpCode::GetThis, span);
            }
            ThisLoc::Upvalue(idx) => {
                self.chunk.emit(OpCode::GetUpvalue(idx), span);
                let name = self.string_const("this");
                self.chunk.emit(OpCode::GetField(name), span);
            }
            ThisLoc::OuterEnvField { field } => {
                self.chunk.emit(OpCode::GetEnvironmentField(field), span);
                let name = self.string_const("this");
                self.chunk.emit(OpCode::GetField(name), span);
            }
        }
    }

    pub fn string_const(&mut self, text: &str) -> u32 {
        self.chunk.add_constant(crate::chunk::Constant::String(text.to_string()))
    }

    pub fn name_const(&mut self, name: Atom) -> u32 {
        let text = self.atoms.resolve(name);
        self.string_const(&text)
    }

    pub fn mark_scope(&self) -> usize {
        self.locals.len()
    }

    pub fn pop_scope(&mut self, mark: usize) {
        self.locals.truncate(mark);
    }

    /// Allocates the next dispatch state id for a suspend op, returning it.
    /// Must only be called while `suspend_state` is `Some`. The suspension
    /// analyzer already numbered points in program order; this just mirrors
    /// that numbering while walking a second time during codegen.
    pub fn next_state(&mut self) -> u32 {
        let state = self.suspend_state.as_mut().expect("next_state called outside a suspension-bearing function");
        let id = state.next_state_id;
        state.next_state_id += 1;
        id
    }

    /// Records that state `id`'s resume point is the chunk's current end,
    /// so the driver's dispatch table can jump straight past the suspend
    /// instruction on resume.
    pub fn mark_resume_point(&mut self, id: u32) {
        let ip = self.chunk.here();
        let state = self.suspend_state.as_mut().expect("mark_resume_point called outside a suspension-bearing function");
        if (id as usize) >= state.resume_ips.len() {
            state.resume_ips.resize(id as usize + 1, 0);
        }
        state.resume_ips[id as usize] = ip;
    }
}

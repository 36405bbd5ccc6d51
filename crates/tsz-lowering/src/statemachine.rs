//! State-machine lowering plan: combines a function's
//! `ClosurePlan` and `SuspensionPlan` into the concrete field layout and
//! dispatch shape the emitter/interpreter build a resumable object from.
//! This module only produces the plan — the actual dispatch-table codegen
//! lives in `tsz-emitter`, and the tree-walking equivalent lives in
//! `tsz-interpreter`; both consume the same `StateMachinePlan`.

use rustc_hash::FxHashMap;

use tsz_common::Atom;
use tsz_parser::FunctionModifiers;

use crate::closure::{ClosurePlan, EnvId};
use crate::suspension::SuspensionPlan;

/// A field in the state record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateFieldId(pub u32);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateFieldKind {
    /// One per hoisted parameter.
    Parameter,
    /// One per local that is (conservatively) hoisted — see
    /// `suspension::SuspensionPlan`'s liveness-approximation note.
    Local,
    /// The lexical `this` the function closed over, if any.
    This,
    /// A non-owning reference to an outer display-class environment the
    /// body reads captures through.
    OuterEnvironment(EnvId),
}

#[derive(Debug, Clone)]
pub struct StateField {
    pub id: StateFieldId,
    pub name: Atom,
    pub kind: StateFieldKind,
}

/// Maps a suspension point's resume-state index to the metadata needed to
/// re-enter its try regions and resume after it.
#[derive(Debug, Clone)]
pub struct DispatchArm {
    pub state: u32,
    pub kind: crate::suspension::SuspensionKind,
    pub try_region_id: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct StateMachinePlan {
    pub kind: FunctionModifiers,
    /// Total dispatch states: `suspension_points.len() + 1`.
    pub state_count: usize,
    pub fields: Vec<StateField>,
    pub dispatch: Vec<DispatchArm>,
    pub try_regions: Vec<crate::suspension::TryRegion>,
    /// `this.environment_this_field`/`captures_this`, surfaced again here so
    /// the emitter doesn't need to hold onto the `ClosurePlan` separately.
    pub captures_this: bool,
}

#[must_use]
pub fn plan_state_machine(kind: FunctionModifiers, closure: &ClosurePlan, suspension: &SuspensionPlan) -> StateMachinePlan {
    let mut fields = Vec::new();
    let mut next_id = 0u32;
    let mut alloc = |name: Atom, field_kind: StateFieldKind| {
        let id = StateFieldId(next_id);
        next_id += 1;
        StateField { id, name, kind: field_kind }
    };

    for &name in &suspension.hoisted_parameters {
        fields.push(alloc(name, StateFieldKind::Parameter));
    }
    for &name in &suspension.hoisted_locals {
        if !suspension.hoisted_parameters.contains(&name) {
            fields.push(alloc(name, StateFieldKind::Local));
        }
    }
    if closure.captures_this {
        fields.push(alloc(Atom::EMPTY, StateFieldKind::This));
    }
    for &env in &closure.uses_outer_environments {
        fields.push(alloc(Atom::EMPTY, StateFieldKind::OuterEnvironment(env)));
    }

    let dispatch = suspension
        .suspension_points
        .iter()
        .map(|p| DispatchArm { state: p.id, kind: p.kind, try_region_id: p.try_region_id })
        .collect();

    StateMachinePlan {
        kind,
        state_count: suspension.state_count(),
        fields,
        dispatch,
        try_regions: suspension.try_regions.clone(),
        captures_this: closure.captures_this,
    }
}

/// Convenience: plan every capturing/suspending function in one
/// `plan_closures` + per-function `plan_suspensions` result. Kept separate
/// from `plan_state_machine` itself so callers that already have both plans
/// in hand (the common case, from `tsz-checker`'s per-function walk) can
/// call the single-function entry point directly.
#[must_use]
pub fn plan_state_machines(
    closures: &FxHashMap<tsz_parser::NodeIndex, ClosurePlan>,
    suspensions: &FxHashMap<tsz_parser::NodeIndex, (FunctionModifiers, SuspensionPlan)>,
) -> FxHashMap<tsz_parser::NodeIndex, StateMachinePlan> {
    let mut out = FxHashMap::default();
    for (node, (kind, suspension)) in suspensions {
        let default_plan;
        let closure = match closures.get(node) {
            Some(c) => c,
            None => {
                default_plan = ClosurePlan::default();
                &default_plan
            }
        };
        out.insert(*node, plan_state_machine(*kind, closure, suspension));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::closure::plan_closures;
    use crate::suspension::plan_suspensions;
    use tsz_binder::bind_program;
    use tsz_parser::{Node, Parser};

    #[test]
    fn async_function_state_count_matches_suspension_points_plus_one() {
        let src = "async function f(x: number) { let y = x; await g(); await h(); }";
        let parser = Parser::new(src, "test.ts");
        let (program, arena, interner, diags) = parser.parse_program();
        assert!(diags.is_empty());
        let binder = bind_program(&arena, &interner, program, "test.ts");
        let closures = plan_closures(&arena, &binder, program);

        let Node::Program(stmts) = arena.get(program).clone() else { unreachable!() };
        let fn_node = stmts[0];
        let Node::Function(sig) = arena.get(fn_node).clone() else { unreachable!() };
        let suspension = plan_suspensions(&arena, &sig);
        let closure_plan = closures.functions.get(&fn_node).cloned().unwrap_or_default();
        let plan = plan_state_machine(sig.modifiers, &closure_plan, &suspension);

        assert_eq!(plan.state_count, 3);
        assert_eq!(plan.dispatch.len(), 2);
        // `x` and `y` both hoisted as fields.
        assert_eq!(plan.fields.iter().filter(|f| f.kind == StateFieldKind::Parameter).count(), 1);
        assert_eq!(plan.fields.iter().filter(|f| f.kind == StateFieldKind::Local).count(), 1);
    }
}

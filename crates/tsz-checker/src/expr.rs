//! Expression type-checking and the Narrowing Engine's expression-level
//! combinators. Statement-level join-point merging
//! lives in `control_flow`; this module owns everything that happens
//! *inside* a single expression: literal/operator typing, narrowing-path
//! resolution, and the positive/negative narrowing a condition produces.

use std::rc::Rc;

use rustc_hash::FxHashMap;

use tsz_parser::{
    ArrayElement, BinaryOp, LogicalOp, Node, NodeIndex, ObjectProperty, PropertyKey, UnaryOp,
};
use tsz_solver::{
    ElementKey, LiteralValue, NarrowingContext, NarrowingPath, PropertyInfo, TypeData, TypeId,
    TypeInterner,
};

use crate::context::CheckerState;
use crate::declarations::to_type_atom;

/// Best-effort human-readable rendering of a `TypeId` for diagnostics.
pub fn describe_type(types: &TypeInterner, ty: TypeId) -> String {
    match types.lookup(ty) {
        None => "?".to_string(),
        Some(TypeData::Intrinsic(i)) => format!("{i:?}").to_lowercase(),
        Some(TypeData::Literal(LiteralValue::String(a))) => format!("\"{}\"", types.resolve_atom(a)),
        Some(TypeData::Literal(LiteralValue::Number(n))) => n.0.to_string(),
        Some(TypeData::Literal(LiteralValue::Boolean(b))) => b.to_string(),
        Some(TypeData::Literal(LiteralValue::BigInt(a))) => format!("{}n", types.resolve_atom(a)),
        Some(TypeData::Array(elem)) => format!("{}[]", describe_type(types, elem)),
        Some(TypeData::Tuple(list)) => {
            let elems: Vec<String> = types
                .tuple_list(list)
                .iter()
                .map(|e| describe_type(types, e.type_id))
                .collect();
            format!("[{}]", elems.join(", "))
        }
        Some(TypeData::Object(shape_id)) => {
            let shape = types.object_shape(shape_id);
            let props: Vec<String> = shape
                .properties
                .iter()
                .map(|p| format!("{}: {}", types.resolve_atom(p.name), describe_type(types, p.type_id)))
                .collect();
            format!("{{ {} }}", props.join("; "))
        }
        Some(TypeData::Function(shape_id)) => {
            let shape = types.function_shape(shape_id);
            format!("(...) => {}", describe_type(types, shape.return_type))
        }
        Some(TypeData::Union(list)) => {
            let members: Vec<String> = types.type_list(list).iter().map(|&t| describe_type(types, t)).collect();
            members.join(" | ")
        }
        Some(TypeData::Intersection(list)) => {
            let members: Vec<String> = types.type_list(list).iter().map(|&t| describe_type(types, t)).collect();
            members.join(" & ")
        }
        Some(TypeData::Promise(inner)) => format!("Promise<{}>", describe_type(types, inner)),
        Some(TypeData::Generator(inner)) => format!("Generator<{}>", describe_type(types, inner)),
        Some(TypeData::AsyncGenerator(inner)) => format!("AsyncGenerator<{}>", describe_type(types, inner)),
        Some(TypeData::Class(def)) => types
            .class_shape(def)
            .map(|c| format!("typeof {}", types.resolve_atom(c.name)))
            .unwrap_or_else(|| "class".to_string()),
        Some(TypeData::Instance(def)) => types
            .class_shape(def)
            .map(|c| types.resolve_atom(c.name).to_string())
            .unwrap_or_else(|| "object".to_string()),
        Some(TypeData::Enum(def)) => types
            .enum_shape(def)
            .map(|e| types.resolve_atom(e.name).to_string())
            .unwrap_or_else(|| "enum".to_string()),
        Some(TypeData::TypeParameter(info)) => types.resolve_atom(info.name).to_string(),
        Some(TypeData::Generic(def)) => types
            .class_shape(def)
            .map(|c| types.resolve_atom(c.name).to_string())
            .unwrap_or_else(|| "generic".to_string()),
        Some(TypeData::InstantiatedGeneric { def, args }) => {
            let base = types
                .class_shape(def)
                .map(|c| types.resolve_atom(c.name).to_string())
                .unwrap_or_else(|| "generic".to_string());
            let args: Vec<String> = types.type_list(args).iter().map(|&t| describe_type(types, t)).collect();
            format!("{base}<{}>", args.join(", "))
        }
        Some(TypeData::KeyOf(inner)) => format!("keyof {}", describe_type(types, inner)),
        Some(TypeData::IndexedAccess { obj, index }) => {
            format!("{}[{}]", describe_type(types, obj), describe_type(types, index))
        }
        Some(TypeData::Mapped(_)) => "{ [K in ...]: ... }".to_string(),
        Some(TypeData::Conditional(_)) => "conditional type".to_string(),
    }
}

/// Resolve an expression to a `NarrowingPath` when it is a variable or a
/// property/element-access chain rooted at one;
/// anything else (a call, a binary expression, ...) has no stable path and
/// returns `None`.
pub fn path_of(state: &CheckerState, node: NodeIndex) -> Option<Rc<NarrowingPath>> {
    match state.arena.get(node).clone() {
        Node::Identifier(name) => Some(Rc::new(NarrowingPath::Variable(name))),
        Node::This => Some(Rc::new(NarrowingPath::Variable(state.atoms.intern("this")))),
        Node::Get { object, name, .. } => {
            let base = path_of(state, object)?;
            Some(Rc::new(NarrowingPath::PropertyAccess(base, name)))
        }
        Node::GetIndex { object, index, .. } => {
            let base = path_of(state, object)?;
            let key = match state.arena.get(index).clone() {
                Node::StringLit(s) => ElementKey::String(s),
                Node::NumberLit(n) => ElementKey::Number(n as i64),
                _ => return None,
            };
            Some(Rc::new(NarrowingPath::ElementAccess(base, key)))
        }
        Node::Grouping(inner) | Node::NonNullAssertion(inner) => path_of(state, inner),
        _ => None,
    }
}

fn declared_type_of_path(state: &mut CheckerState, node: NodeIndex) -> TypeId {
    if let Some(sym) = state.binder.references.get(&node).copied() {
        state.symbol_types.get(&sym).copied().unwrap_or(TypeId::ANY)
    } else {
        TypeId::ANY
    }
}

/// Look up the effective type of a path: the narrowing context first
///, falling back to the
/// declared type.
fn narrowed_or_declared(state: &CheckerState, path: &NarrowingPath, declared: TypeId) -> TypeId {
    state.narrowing.get(path).unwrap_or(declared)
}

pub fn check_expr(state: &mut CheckerState, node: NodeIndex) -> TypeId {
    let n = state.arena.get(node).clone();
    let ty = match n {
        Node::NumberLit(v) => state.types.literal_number(v),
        Node::BigIntLit(_) => TypeId::BIGINT,
        Node::StringLit(s) => {
            let text = state.atoms.resolve(s);
            state.types.literal_string(&text)
        }
        Node::BoolLit(b) => state.types.literal_boolean(b),
        Node::NullLit => TypeId::NULL,
        Node::UndefinedLit => TypeId::UNDEFINED,
        Node::Identifier(_) | Node::This => {
            let declared = declared_type_of_path(state, node);
            match path_of(state, node) {
                Some(path) => narrowed_or_declared(state, &path, declared),
                None => declared,
            }
        }
        Node::Super => TypeId::ANY,
        Node::Binary { op, left, right } => check_binary(state, op, left, right),
        Node::Logical { op, left, right } => check_logical(state, op, left, right),
        Node::Unary { op, operand } => check_unary(state, op, operand),
        Node::Grouping(inner) => check_expr(state, inner),
        Node::Call { callee, args, type_args, .. } => {
            crate::generic_checker::check_call(state, node, callee, &type_args, &args)
        }
        Node::New { callee, args, type_args } => {
            crate::generic_checker::check_new(state, callee, &type_args, &args)
        }
        Node::Get { object, name, optional } => check_get(state, node, object, name, optional),
        Node::GetIndex { object, index, optional } => check_get_index(state, object, index, optional),
        Node::Assign { target, value } => check_assign(state, target, value),
        Node::CompoundSet { target, value, .. } => {
            let _ = check_expr(state, value);
            let target_ty = check_expr(state, target);
            invalidate_on_write(state, target);
            target_ty
        }
        Node::PrefixIncrement { operand, .. } | Node::PostfixIncrement { operand, .. } => {
            check_expr(state, operand);
            invalidate_on_write(state, operand);
            TypeId::NUMBER
        }
        Node::Ternary { cond, then_expr, else_expr } => check_ternary(state, cond, then_expr, else_expr),
        Node::NullishCoalescing { left, right } => {
            let left_ty = check_expr(state, left);
            let right_ty = check_expr(state, right);
            let narrowed_left = narrow_non_nullish(state.types, left_ty);
            state.types.union2(narrowed_left, right_ty)
        }
        Node::TemplateLiteral { expressions, .. } => {
            for e in expressions {
                check_expr(state, e);
            }
            TypeId::STRING
        }
        Node::TaggedTemplate { tag, quasi } => {
            check_expr(state, tag);
            check_expr(state, quasi);
            TypeId::ANY
        }
        Node::ArrayLiteral(elements) => check_array_literal(state, &elements),
        Node::ObjectLiteral(props) => check_object_literal(state, &props),
        Node::ArrowFunction(sig) => crate::declarations::check_function_sig(state, node, &sig),
        Node::Await(inner) => check_await(state, inner),
        Node::Yield { delegate, argument } => check_yield(state, node, delegate, argument),
        Node::Spread(inner) => check_expr(state, inner),
        Node::TypeAssertion { type_node, expr } => {
            check_expr(state, expr);
            crate::declarations::resolve_type_node(state, &FxHashMap::default(), type_node)
        }
        Node::NonNullAssertion(inner) => {
            let ty = check_expr(state, inner);
            narrow_non_nullish(state.types, ty)
        }
        Node::ArrayPattern { .. } | Node::ObjectPattern { .. } => TypeId::ANY,
        Node::Type(_) => TypeId::ANY,
        _ => TypeId::ANY,
    };
    state.record_type(node, ty)
}

fn invalidate_on_write(state: &mut CheckerState, target: NodeIndex) {
    if let Some(path) = path_of(state, target) {
        state.narrowing = state.narrowing.invalidate(&path);
    }
}

fn check_assign(state: &mut CheckerState, target: NodeIndex, value: NodeIndex) -> TypeId {
    let value_ty = check_expr(state, value);
    let target_ty = check_expr(state, target);
    if !tsz_solver::compatible(state.types, target_ty, value_ty) {
        state.not_assignable(state.arena.span(value), target_ty, value_ty);
    }
    invalidate_on_write(state, target);
    value_ty
}

fn check_get(state: &mut CheckerState, node: NodeIndex, object: NodeIndex, name: tsz_common::Atom, optional: bool) -> TypeId {
    let _ = node;
    let obj_ty = check_expr(state, object);
    let access_ty = if optional { narrow_non_nullish(state.types, obj_ty) } else { obj_ty };
    let prop_ty = member_type(state, access_ty, name);
    if optional && is_nullish_possible(state.types, obj_ty) {
        state.types.union2(prop_ty, TypeId::UNDEFINED)
    } else {
        prop_ty
    }
}

fn member_type(state: &mut CheckerState, obj_ty: TypeId, name: tsz_common::Atom) -> TypeId {
    let type_name = to_type_atom(state, name);
    match state.types.lookup(obj_ty) {
        Some(TypeData::Object(shape_id)) => {
            let shape = state.types.object_shape(shape_id);
            if let Some(p) = shape.find(type_name) {
                return p.type_id;
            }
            if let Some(idx) = &shape.string_index {
                return idx.value_type;
            }
            TypeId::ANY
        }
        Some(TypeData::Instance(def)) => {
            if let Some(class) = state.types.class_shape(def) {
                let shape = state.types.object_shape(class.instance_shape);
                if let Some(p) = shape.find(type_name) {
                    return p.type_id;
                }
            }
            TypeId::ANY
        }
        Some(TypeData::Array(elem)) => {
            let text = state.types.resolve_atom(type_name);
            if &*text == "length" {
                TypeId::NUMBER
            } else {
                elem
            }
        }
        Some(TypeData::Union(list)) => {
            let members: Vec<TypeId> = state
                .types
                .type_list(list)
                .into_iter()
                .map(|m| member_type(state, m, name))
                .collect();
            state.types.union(members)
        }
        _ => TypeId::ANY,
    }
}

fn check_get_index(state: &mut CheckerState, object: NodeIndex, index: NodeIndex, optional: bool) -> TypeId {
    let obj_ty = check_expr(state, object);
    let obj_ty = if optional { narrow_non_nullish(state.types, obj_ty) } else { obj_ty };
    let index_ty = check_expr(state, index);
    match state.types.lookup(obj_ty) {
        Some(TypeData::Array(elem)) => elem,
        Some(TypeData::Tuple(list)) => {
            if let Some(TypeData::Literal(LiteralValue::Number(n))) = state.types.lookup(index_ty) {
                let elems = state.types.tuple_list(list);
                elems.get(n.0 as usize).map(|e| e.type_id).unwrap_or(TypeId::ANY)
            } else {
                let elems = state.types.tuple_list(list);
                let members: Vec<TypeId> = elems.into_iter().map(|e| e.type_id).collect();
                state.types.union(members)
            }
        }
        Some(TypeData::Object(shape_id)) => {
            if let Some(TypeData::Literal(LiteralValue::String(s))) = state.types.lookup(index_ty) {
                let shape = state.types.object_shape(shape_id);
                if let Some(p) = shape.find(s) {
                    return p.type_id;
                }
            }
            let shape = state.types.object_shape(shape_id);
            shape.string_index.map(|i| i.value_type).unwrap_or(TypeId::ANY)
        }
        _ => TypeId::ANY,
    }
}

fn check_binary(state: &mut CheckerState, op: BinaryOp, left: NodeIndex, right: NodeIndex) -> TypeId {
    let left_ty = check_expr(state, left);
    let right_ty = check_expr(state, right);
    match op {
        BinaryOp::Add => {
            if left_ty == TypeId::STRING || right_ty == TypeId::STRING {
                TypeId::STRING
            } else {
                TypeId::NUMBER
            }
        }
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod | BinaryOp::Pow
        | BinaryOp::Shl | BinaryOp::Shr | BinaryOp::UShr | BinaryOp::BitAnd | BinaryOp::BitOr
        | BinaryOp::BitXor => TypeId::NUMBER,
        BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge | BinaryOp::EqEq
        | BinaryOp::NotEq | BinaryOp::EqEqEq | BinaryOp::NotEqEq | BinaryOp::In
        | BinaryOp::Instanceof => TypeId::BOOLEAN,
    }
}

fn check_unary(state: &mut CheckerState, op: UnaryOp, operand: NodeIndex) -> TypeId {
    let ty = check_expr(state, operand);
    match op {
        UnaryOp::Plus | UnaryOp::Minus | UnaryOp::BitNot => TypeId::NUMBER,
        UnaryOp::Not => TypeId::BOOLEAN,
        // `typeof null === "object"`.
        UnaryOp::Typeof => TypeId::STRING,
        UnaryOp::Void => TypeId::UNDEFINED,
        UnaryOp::Delete => {
            let _ = ty;
            TypeId::BOOLEAN
        }
    }
}

fn check_logical(state: &mut CheckerState, op: LogicalOp, left: NodeIndex, right: NodeIndex) -> TypeId {
    let left_ty = check_expr(state, left);
    let saved = state.narrowing.clone();
    let (left_pos, left_neg) = narrow_condition(state, left);
    let right_ty = match op {
        LogicalOp::And => {
            state.narrowing = left_pos;
            let ty = check_expr(state, right);
            state.narrowing = saved;
            ty
        }
        LogicalOp::Or => {
            state.narrowing = left_neg;
            let ty = check_expr(state, right);
            state.narrowing = saved;
            ty
        }
    };
    match op {
        LogicalOp::And => state.types.union2(narrow_falsy_only(state.types, left_ty), right_ty),
        LogicalOp::Or => state.types.union2(narrow_non_falsy(state.types, left_ty), right_ty),
    }
}

fn check_ternary(state: &mut CheckerState, cond: NodeIndex, then_expr: NodeIndex, else_expr: NodeIndex) -> TypeId {
    check_expr(state, cond);
    let saved = state.narrowing.clone();
    let (pos, neg) = narrow_condition(state, cond);
    state.narrowing = pos;
    let then_ty = check_expr(state, then_expr);
    state.narrowing = neg;
    let else_ty = check_expr(state, else_expr);
    state.narrowing = saved;
    state.types.union2(then_ty, else_ty)
}

fn check_array_literal(state: &mut CheckerState, elements: &[ArrayElement]) -> TypeId {
    let mut member_types = Vec::new();
    for el in elements {
        match el {
            ArrayElement::Item(n) => member_types.push(check_expr(state, *n)),
            ArrayElement::Spread(n) => {
                let spread_ty = check_expr(state, *n);
                if let Some(TypeData::Array(elem)) = state.types.lookup(spread_ty) {
                    member_types.push(elem);
                }
            }
            ArrayElement::Hole => member_types.push(TypeId::UNDEFINED),
        }
    }
    let widened: Vec<TypeId> = member_types.into_iter().map(|t| tsz_solver::widen_type(state.types, t)).collect();
    let elem = state.types.union(widened);
    state.types.array(elem)
}

fn check_object_literal(state: &mut CheckerState, props: &[ObjectProperty]) -> TypeId {
    let mut properties = Vec::new();
    for p in props {
        if p.spread {
            let spread_ty = check_expr(state, p.value);
            if let Some(TypeData::Object(shape_id)) = state.types.lookup(spread_ty) {
                properties.extend(state.types.object_shape(shape_id).properties);
            }
            continue;
        }
        let name = match &p.key {
            PropertyKey::Ident(a) | PropertyKey::StringLit(a) => to_type_atom(state, *a),
            PropertyKey::NumberLit(n) => state.types.intern_string(&n.to_string()),
            PropertyKey::Computed(n) => {
                check_expr(state, *n);
                state.types.intern_string("[computed]")
            }
        };
        let value_ty = check_expr(state, p.value);
        properties.push(PropertyInfo::new(name, value_ty));
    }
    // Fresh object literals are eligible for excess-property checking
    // against a target until they're widened into a binding.
    state.types.fresh_object(properties)
}

fn check_await(state: &mut CheckerState, inner: NodeIndex) -> TypeId {
    let ty = check_expr(state, inner);
    let is_async = state.functions.last().map(|f| f.is_async).unwrap_or(false);
    if !is_async {
        state.error(
            tsz_common::diagnostics::codes::AWAIT_OUTSIDE_ASYNC_FUNCTION,
            state.arena.span(inner),
            "'await' expressions are only allowed within async functions.",
        );
    }
    match state.types.lookup(ty) {
        Some(TypeData::Promise(inner_ty)) => inner_ty,
        _ => ty,
    }
}

fn check_yield(state: &mut CheckerState, node: NodeIndex, delegate: bool, argument: Option<NodeIndex>) -> TypeId {
    let is_generator = state.functions.last().map(|f| f.is_generator).unwrap_or(false);
    if !is_generator {
        state.error(
            tsz_common::diagnostics::codes::YIELD_OUTSIDE_GENERATOR,
            state.arena.span(node),
            "'yield' expressions are only allowed within generator functions.",
        );
    }
    let arg_ty = argument.map(|a| check_expr(state, a)).unwrap_or(TypeId::UNDEFINED);
    let yielded = if delegate {
        match state.types.lookup(arg_ty) {
            Some(TypeData::Generator(inner)) | Some(TypeData::AsyncGenerator(inner)) => inner,
            _ => arg_ty,
        }
    } else {
        arg_ty
    };
    if let Some(frame) = state.functions.last_mut() {
        frame.yielded_types.push(yielded);
    }
    // The value a driver resumes `yield` with is not tracked
    // per-call-site; `any` is the honest static type for "what `next(v)`
    // passed in".
    TypeId::ANY
}

fn is_nullish_possible(types: &TypeInterner, ty: TypeId) -> bool {
    match types.lookup(ty) {
        Some(TypeData::Intrinsic(tsz_solver::Intrinsic::Null | tsz_solver::Intrinsic::Undefined)) => true,
        Some(TypeData::Union(list)) => types.type_list(list).iter().any(|&t| is_nullish_possible(types, t)),
        _ => false,
    }
}

fn narrow_non_nullish(types: &TypeInterner, ty: TypeId) -> TypeId {
    remove_from_union(types, ty, |types, t| {
        matches!(
            types.lookup(t),
            Some(TypeData::Intrinsic(tsz_solver::Intrinsic::Null | tsz_solver::Intrinsic::Undefined))
        )
    })
}

/// Truthiness narrowing: loses `null`, `undefined`, `false`,
/// `0`, `""`.
fn narrow_non_falsy(types: &TypeInterner, ty: TypeId) -> TypeId {
    remove_from_union(types, ty, is_falsy_member)
}

fn narrow_falsy_only(types: &TypeInterner, ty: TypeId) -> TypeId {
    match types.lookup(ty) {
        Some(TypeData::Union(list)) => {
            let falsy: Vec<TypeId> = types.type_list(list).into_iter().filter(|&t| is_falsy_member(types, t)).collect();
            types.union(falsy)
        }
        _ if is_falsy_member(types, ty) => ty,
        _ => TypeId::NEVER,
    }
}

fn is_falsy_member(types: &TypeInterner, t: TypeId) -> bool {
    match types.lookup(t) {
        Some(TypeData::Intrinsic(tsz_solver::Intrinsic::Null | tsz_solver::Intrinsic::Undefined)) => true,
        Some(TypeData::Literal(LiteralValue::Boolean(false))) => true,
        Some(TypeData::Literal(LiteralValue::Number(n))) => n.0 == 0.0,
        Some(TypeData::Literal(LiteralValue::String(s))) => types.resolve_atom(s).is_empty(),
        _ => false,
    }
}

fn remove_from_union(types: &TypeInterner, ty: TypeId, pred: impl Fn(&TypeInterner, TypeId) -> bool + Copy) -> TypeId {
    match types.lookup(ty) {
        Some(TypeData::Union(list)) => {
            let kept: Vec<TypeId> = types.type_list(list).into_iter().filter(|&t| !pred(types, t)).collect();
            types.union(kept)
        }
        _ if pred(types, ty) => TypeId::NEVER,
        _ => ty,
    }
}

/// `target ← source` narrowing rule for `typeof x === "<kind>"`. `"object"` excludes `undefined` but retains
/// `null` ("the historical anomaly").
fn typeof_positive_type(types: &TypeInterner, kind: &str, declared: TypeId) -> TypeId {
    let primitive = match kind {
        "string" => TypeId::STRING,
        "number" => TypeId::NUMBER,
        "boolean" => TypeId::BOOLEAN,
        "undefined" => TypeId::UNDEFINED,
        "symbol" => TypeId::SYMBOL,
        "bigint" => TypeId::BIGINT,
        "function" => {
            return match types.lookup(declared) {
                Some(TypeData::Union(list)) => {
                    let members: Vec<TypeId> = types
                        .type_list(list)
                        .into_iter()
                        .filter(|&t| matches!(types.lookup(t), Some(TypeData::Function(_))))
                        .collect();
                    types.union(members)
                }
                Some(TypeData::Function(_)) => declared,
                _ => TypeId::NEVER,
            };
        }
        "object" => {
            return match types.lookup(declared) {
                Some(TypeData::Union(list)) => {
                    let members: Vec<TypeId> = types
                        .type_list(list)
                        .into_iter()
                        .filter(|&t| t != TypeId::UNDEFINED && !matches!(types.lookup(t), Some(TypeData::Function(_))))
                        .collect();
                    types.union(members)
                }
                _ => declared,
            };
        }
        _ => return declared,
    };
    primitive
}

/// Positive/negative narrowing produced by a condition expression. Both contexts extend `state.narrowing` (the caller's current
/// context); neither mutates it.
pub fn narrow_condition(state: &mut CheckerState, cond: NodeIndex) -> (NarrowingContext, NarrowingContext) {
    let base = state.narrowing.clone();
    match state.arena.get(cond).clone() {
        Node::Unary { op: UnaryOp::Not, operand } => {
            let (pos, neg) = narrow_condition(state, operand);
            (neg, pos)
        }
        Node::Logical { op: LogicalOp::And, left, right } => {
            let (left_pos, left_neg) = narrow_condition(state, left);
            let saved = std::mem::replace(&mut state.narrowing, left_pos.clone());
            let (right_pos, _right_neg) = narrow_condition(state, right);
            state.narrowing = saved;
            (right_pos, base.merge(&left_neg, state.types))
        }
        Node::Logical { op: LogicalOp::Or, left, right } => {
            let (left_pos, left_neg) = narrow_condition(state, left);
            let saved = std::mem::replace(&mut state.narrowing, left_neg.clone());
            let (right_pos, right_neg) = narrow_condition(state, right);
            state.narrowing = saved;
            (left_pos.merge(&right_pos, state.types), right_neg)
        }
        Node::Grouping(inner) => narrow_condition(state, inner),
        Node::Binary { op: BinaryOp::EqEqEq | BinaryOp::EqEq, left, right } => {
            narrow_equality(state, left, right, true)
        }
        Node::Binary { op: BinaryOp::NotEqEq | BinaryOp::NotEq, left, right } => {
            narrow_equality(state, left, right, false)
        }
        Node::Binary { op: BinaryOp::Instanceof, left, right } => narrow_instanceof(state, left, right),
        Node::Binary { op: BinaryOp::In, left, right } => narrow_in(state, left, right),
        _ => {
            // Plain truthiness test.
            let ty = check_expr(state, cond);
            let Some(path) = path_of(state, cond) else {
                return (base.clone(), base);
            };
            let declared = ty;
            let pos = base.insert(Rc::clone(&path), narrow_non_falsy(state.types, declared));
            let neg = base.insert(path, narrow_falsy_only(state.types, declared));
            (pos, neg)
        }
    }
}

fn narrow_equality(state: &mut CheckerState, left: NodeIndex, right: NodeIndex, positive_is_eq: bool) -> (NarrowingContext, NarrowingContext) {
    let base = state.narrowing.clone();

    // `typeof x === "string"`.
    if let Node::Unary { op: UnaryOp::Typeof, operand } = state.arena.get(left).clone() {
        if let Node::StringLit(kind) = state.arena.get(right).clone() {
            let kind_text = state.atoms.resolve(kind).to_string();
            let declared = check_expr(state, operand);
            if let Some(path) = path_of(state, operand) {
                let pos_ty = typeof_positive_type(state.types, &kind_text, declared);
                let neg_ty = remove_from_union(state.types, declared, |types, t| {
                    types.lookup(t) == types.lookup(pos_ty)
                });
                let pos = base.insert(Rc::clone(&path), pos_ty);
                let neg = base.insert(path, neg_ty);
                return if positive_is_eq { (pos, neg) } else { (neg, pos) };
            }
        }
    }

    // `x === null` / `x === undefined` / discriminant/literal equality: one
    // side is a literal-ish expression, the other is the narrowing target.
    let left_is_literal_like = matches!(
        state.arena.get(left).clone(),
        Node::NullLit | Node::UndefinedLit | Node::StringLit(_) | Node::NumberLit(_) | Node::BoolLit(_)
    );
    check_expr(state, left);
    check_expr(state, right);

    let (target_node, literal_node) = if left_is_literal_like { (right, left) } else { (left, right) };

    if let Some(path) = path_of(state, target_node) {
        let declared = narrowed_or_declared(state, &path, declared_type_of_path(state, target_node));
        let literal_ty = check_expr(state, literal_node);
        let literal_data = state.types.lookup(literal_ty);
        let pos = base.insert(Rc::clone(&path), literal_ty);
        let neg_ty = remove_from_union(state.types, declared, |types, t| types.lookup(t) == literal_data);
        let neg = base.insert(path, neg_ty);
        return if positive_is_eq { (pos, neg) } else { (neg, pos) };
    }

    // `obj.tag === "Foo"` discriminated-union narrowing.
    if let Node::Get { object, name, .. } = state.arena.get(target_node).clone() {
        if let Some(obj_path) = path_of(state, object) {
            let obj_declared = narrowed_or_declared(state, &obj_path, declared_type_of_path(state, object));
            let literal_ty = check_expr(state, literal_node);
            let (members_match, members_rest) = split_union_by_discriminant(state, obj_declared, name, literal_ty);
            let pos = base.insert(Rc::clone(&obj_path), members_match);
            let neg = base.insert(obj_path, members_rest);
            return if positive_is_eq { (pos, neg) } else { (neg, pos) };
        }
    }

    (base.clone(), base)
}

/// Split a union of object-like members into the subset whose `key`
/// property is (structurally) `literal`, and the rest.
fn split_union_by_discriminant(
    state: &mut CheckerState,
    union_ty: TypeId,
    key: tsz_common::Atom,
    literal: TypeId,
) -> (TypeId, TypeId) {
    let type_key = to_type_atom(state, key);
    let members = match state.types.lookup(union_ty) {
        Some(TypeData::Union(list)) => state.types.type_list(list),
        _ => vec![union_ty],
    };
    let mut matching = Vec::new();
    let mut rest = Vec::new();
    let literal_data = state.types.lookup(literal);
    for m in members {
        let tag = member_type(state, m, key);
        let _ = type_key;
        if state.types.lookup(tag) == literal_data {
            matching.push(m);
        } else {
            rest.push(m);
        }
    }
    (state.types.union(matching), state.types.union(rest))
}

fn narrow_instanceof(state: &mut CheckerState, left: NodeIndex, right: NodeIndex) -> (NarrowingContext, NarrowingContext) {
    let base = state.narrowing.clone();
    let declared = check_expr(state, left);
    let ctor_ty = check_expr(state, right);
    let Some(path) = path_of(state, left) else {
        return (base.clone(), base);
    };
    let instance_ty = match state.types.lookup(ctor_ty) {
        Some(TypeData::Class(def)) => state.types.intern(TypeData::Instance(def)),
        _ => declared,
    };
    let pos = base.insert(Rc::clone(&path), instance_ty);
    (pos, base)
}

fn narrow_in(state: &mut CheckerState, left: NodeIndex, right: NodeIndex) -> (NarrowingContext, NarrowingContext) {
    let base = state.narrowing.clone();
    let key_ty = check_expr(state, left);
    let declared = check_expr(state, right);
    let Some(path) = path_of(state, right) else {
        return (base.clone(), base);
    };
    let Some(TypeData::Literal(LiteralValue::String(key))) = state.types.lookup(key_ty) else {
        return (base.clone(), base);
    };
    let members = match state.types.lookup(declared) {
        Some(TypeData::Union(list)) => state.types.type_list(list),
        _ => vec![declared],
    };
    let mut matching = Vec::new();
    for m in members {
        if member_has_key(state, m, key) {
            matching.push(m);
        }
    }
    let pos = base.insert(Rc::clone(&path), state.types.union(matching));
    (pos, base)
}

fn member_has_key(state: &CheckerState, ty: TypeId, key: tsz_common::Atom) -> bool {
    match state.types.lookup(ty) {
        Some(TypeData::Object(shape_id)) => state.types.object_shape(shape_id).find(key).is_some(),
        _ => true,
    }
}

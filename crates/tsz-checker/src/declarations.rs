//! Declaration checking: resolves parsed `TypeNode` syntax into solver
//! `TypeId`s, and type-checks `Function`/`Class`/`Interface`/`Enum`/
//! `TypeAlias`/`Namespace`/`Import`/`Export` statements.

use rustc_hash::FxHashMap;

use tsz_binder::SymbolId;
use tsz_common::{diagnostics::codes, Atom};
use tsz_parser::{
    ClassMemberKind, FunctionModifiers, FunctionSig, Node, NodeIndex, PropertyKey, TypeLiteralValue,
    TypeMember, TypeNode, TypeParamDecl, VarKind,
};
use tsz_solver::{
    ClassShape, ConditionalType, EnumKind, EnumShape, FunctionShape, IndexSignature, LiteralValue,
    MappedModifier, MappedType, ParamInfo, PropertyInfo, TypeData, TypeId, TypeParamInfo,
};

use crate::context::CheckerState;

/// Re-intern a name atom from the program's (scanner/binder-shared)
/// `Interner` into the solver's own `TypeInterner` atom table — the two
/// interners are independent arenas (see `tsz-solver::intern`'s
/// single-thread `RefCell` table doc comment), so every `PropertyInfo`/
/// `TypeParamInfo` name must cross this bridge explicitly.
pub fn to_type_atom(state: &CheckerState, name: Atom) -> Atom {
    let text = state.atoms.resolve(name);
    state.types.intern_string(&text)
}

/// Resolve a type-parameter scope's names (`T`, `K`, ...) visible while
/// resolving a type node, so `Reference { name: "T", .. }` becomes a
/// `TypeParameter` instead of an unresolved name error.
pub fn resolve_type_node(
    state: &mut CheckerState,
    type_params: &FxHashMap<Atom, TypeId>,
    node: NodeIndex,
) -> TypeId {
    let Node::Type(ty) = state.arena.get(node).clone() else {
        // A non-type-syntax node in type position (shouldn't happen from a
        // well-formed parse) degrades to `Any` rather than panicking.
        return TypeId::ANY;
    };
    match ty {
        TypeNode::Reference { name, type_args } => {
            resolve_reference(state, type_params, name, &type_args, node)
        }
        TypeNode::QualifiedReference { path, type_args } => {
            let last = *path.last().unwrap_or(&name_any(state));
            resolve_reference(state, type_params, last, &type_args, node)
        }
        TypeNode::Array(elem) => {
            let elem_ty = resolve_type_node(state, type_params, elem);
            state.types.array(elem_ty)
        }
        TypeNode::Tuple { elements } => {
            let elems = elements
                .into_iter()
                .map(|e| tsz_solver::TupleElement {
                    type_id: resolve_type_node(state, type_params, e.type_node),
                    name: e.label.map(|a| to_type_atom(state, a)),
                    optional: e.optional,
                    rest: e.rest,
                })
                .collect();
            state.types.tuple(elems)
        }
        TypeNode::ObjectLiteral { members } => resolve_object_literal(state, type_params, &members),
        TypeNode::Function {
            type_params: fn_type_params,
            params,
            return_type,
        } => {
            let mut inner_params = type_params.clone();
            let tp_infos = bind_type_params(state, &mut inner_params, &fn_type_params);
            let param_infos = params
                .iter()
                .map(|p| resolve_param(state, &inner_params, p))
                .collect();
            let ret = resolve_type_node(state, &inner_params, return_type);
            state.types.function(FunctionShape {
                params: param_infos,
                this_type: None,
                return_type: ret,
                type_params: tp_infos,
                type_predicate: None,
                is_constructor: false,
                is_method: false,
            })
        }
        TypeNode::Union(members) => {
            let ids = members
                .into_iter()
                .map(|m| resolve_type_node(state, type_params, m))
                .collect();
            state.types.union(ids)
        }
        TypeNode::Intersection(members) => {
            let ids = members
                .into_iter()
                .map(|m| resolve_type_node(state, type_params, m))
                .collect();
            state.types.intersection(ids)
        }
        TypeNode::Literal(lit) => resolve_type_literal(state, &lit),
        TypeNode::Keyof(inner) => {
            let inner_ty = resolve_type_node(state, type_params, inner);
            let k = state.types.keyof(inner_ty);
            tsz_solver::evaluate_type(state.types, k)
        }
        TypeNode::IndexedAccess { obj, index } => {
            let obj_ty = resolve_type_node(state, type_params, obj);
            let index_ty = resolve_type_node(state, type_params, index);
            let ia = state.types.indexed_access(obj_ty, index_ty);
            tsz_solver::evaluate_type(state.types, ia)
        }
        TypeNode::Mapped {
            param,
            constraint,
            value,
            as_clause,
            add_optional,
            add_readonly,
        } => {
            let constraint_ty = resolve_type_node(state, type_params, constraint);
            let mut inner = type_params.clone();
            let param_atom = to_type_atom(state, param);
            let type_param_info = TypeParamInfo {
                name: param_atom,
                constraint: Some(constraint_ty),
                default: None,
                is_const: false,
            };
            let param_ty = state.types.type_parameter(type_param_info.clone());
            inner.insert(param, param_ty);
            let template = resolve_type_node(state, &inner, value);
            let name_type = as_clause.map(|c| resolve_type_node(state, &inner, c));
            let mapped = state.types.mapped(MappedType {
                type_param: type_param_info,
                constraint: constraint_ty,
                name_type,
                template,
                optional_modifier: add_optional.map(|add| {
                    if add {
                        MappedModifier::Add
                    } else {
                        MappedModifier::Remove
                    }
                }),
                readonly_modifier: add_readonly.map(|add| {
                    if add {
                        MappedModifier::Add
                    } else {
                        MappedModifier::Remove
                    }
                }),
            });
            tsz_solver::evaluate_type(state.types, mapped)
        }
        TypeNode::Conditional {
            check,
            extends,
            true_type,
            false_type,
        } => {
            let check_ty = resolve_type_node(state, type_params, check);
            let extends_ty = resolve_type_node(state, type_params, extends);
            let true_ty = resolve_type_node(state, type_params, true_type);
            let false_ty = resolve_type_node(state, type_params, false_type);
            let is_distributive = matches!(
                state.types.lookup(check_ty),
                Some(TypeData::TypeParameter(_))
            );
            let cond = state.types.conditional(ConditionalType {
                check_type: check_ty,
                extends_type: extends_ty,
                true_type: true_ty,
                false_type: false_ty,
                is_distributive,
            });
            tsz_solver::evaluate_type(state.types, cond)
        }
        TypeNode::Infer(name) => {
            // `infer X` outside a conditional's extends clause has no
            // binding site to unify against; model it as a fresh, unbound
            // type parameter so it at least behaves like `any`-adjacent
            // placeholder rather than erroring the whole type expression.
            let atom = to_type_atom(state, name);
            state.types.type_parameter(TypeParamInfo {
                name: atom,
                constraint: None,
                default: None,
                is_const: false,
            })
        }
        TypeNode::Typeof(_path) => TypeId::ANY,
        TypeNode::Parenthesized(inner) => resolve_type_node(state, type_params, inner),
        TypeNode::Predicate { asserted, .. } => {
            // The predicate's static type (used e.g. as a return-type
            // annotation) is `boolean`; `TypePredicate` narrowing info is
            // attached to the enclosing function's `FunctionShape`
            // separately (see `declarations::check_function`).
            let _ = resolve_type_node(state, type_params, asserted);
            TypeId::BOOLEAN
        }
        TypeNode::Rest(inner) => resolve_type_node(state, type_params, inner),
        TypeNode::Optional(inner) => {
            let inner_ty = resolve_type_node(state, type_params, inner);
            state.types.union2(inner_ty, TypeId::UNDEFINED)
        }
    }
}

fn name_any(state: &CheckerState) -> Atom {
    state.atoms.intern("")
}

fn resolve_reference(
    state: &mut CheckerState,
    type_params: &FxHashMap<Atom, TypeId>,
    name: Atom,
    type_args: &[NodeIndex],
    node: NodeIndex,
) -> TypeId {
    if let Some(&bound) = type_params.get(&name) {
        return bound;
    }
    let text: std::rc::Rc<str> = state.atoms.resolve(name);
    let resolved = match &*text {
        "string" => TypeId::STRING,
        "number" => TypeId::NUMBER,
        "boolean" => TypeId::BOOLEAN,
        "any" => TypeId::ANY,
        "unknown" => TypeId::UNKNOWN,
        "never" => TypeId::NEVER,
        "void" => TypeId::VOID,
        "null" => TypeId::NULL,
        "undefined" => TypeId::UNDEFINED,
        "symbol" => TypeId::SYMBOL,
        "bigint" => TypeId::BIGINT,
        "object" => state.types.object(vec![]),
        "Array" | "ReadonlyArray" => {
            let elem = type_args
                .first()
                .map(|&t| resolve_type_node(state, type_params, t))
                .unwrap_or(TypeId::ANY);
            state.types.array(elem)
        }
        "Promise" => {
            let inner = type_args
                .first()
                .map(|&t| resolve_type_node(state, type_params, t))
                .unwrap_or(TypeId::VOID);
            state.types.promise(inner)
        }
        "Partial" | "Required" | "Readonly" | "Record" | "Pick" | "Omit" => {
            resolve_utility_type(state, type_params, &text, type_args)
        }
        "Uppercase" | "Lowercase" | "Capitalize" | "Uncapitalize" => {
            let inner = type_args
                .first()
                .map(|&t| resolve_type_node(state, type_params, t))
                .unwrap_or(TypeId::STRING);
            apply_intrinsic_string_op(state, &text, inner)
        }
        _ => {
            if let Some(sym) = state.binder.references.get(&node).copied() {
                resolve_symbol_reference(state, type_params, sym, type_args)
            } else {
                state.error(
                    codes::CANNOT_FIND_NAME,
                    state.arena.span(node),
                    format!("Cannot find name '{text}'."),
                );
                TypeId::ANY
            }
        }
    };
    resolved
}

fn resolve_symbol_reference(
    state: &mut CheckerState,
    type_params: &FxHashMap<Atom, TypeId>,
    sym: SymbolId,
    type_args: &[NodeIndex],
) -> TypeId {
    let Some(&declared) = state.symbol_types.get(&sym) else {
        return TypeId::ANY;
    };
    match state.types.lookup(declared) {
        Some(TypeData::Generic(def)) => {
            let args: Vec<TypeId> = type_args
                .iter()
                .map(|&t| resolve_type_node(state, type_params, t))
                .collect();
            state.types.instantiated_generic(def, args)
        }
        Some(TypeData::Class(def)) => state.types.intern(TypeData::Instance(def)),
        _ => declared,
    }
}

fn resolve_utility_type(
    state: &mut CheckerState,
    type_params: &FxHashMap<Atom, TypeId>,
    name: &str,
    type_args: &[NodeIndex],
) -> TypeId {
    let source = type_args
        .first()
        .map(|&t| resolve_type_node(state, type_params, t))
        .unwrap_or(TypeId::ANY);
    match name {
        "Partial" => map_all_properties(state, source, Some(MappedModifier::Add), None),
        "Required" => map_all_properties(state, source, Some(MappedModifier::Remove), None),
        "Readonly" => map_all_properties(state, source, None, Some(MappedModifier::Add)),
        "Record" => {
            let key_ty = type_args
                .first()
                .map(|&t| resolve_type_node(state, type_params, t))
                .unwrap_or(TypeId::STRING);
            let value_ty = type_args
                .get(1)
                .map(|&t| resolve_type_node(state, type_params, t))
                .unwrap_or(TypeId::ANY);
            record_from_keys(state, key_ty, value_ty)
        }
        "Pick" => {
            let keys_ty = type_args
                .get(1)
                .map(|&t| resolve_type_node(state, type_params, t))
                .unwrap_or(TypeId::NEVER);
            pick_or_omit(state, source, keys_ty, true)
        }
        "Omit" => {
            let keys_ty = type_args
                .get(1)
                .map(|&t| resolve_type_node(state, type_params, t))
                .unwrap_or(TypeId::NEVER);
            pick_or_omit(state, source, keys_ty, false)
        }
        _ => TypeId::ANY,
    }
}

/// Eager expansion of `Partial<T>`/`Required<T>`/`Readonly<T>` when `T` is
/// already a concrete object.
fn map_all_properties(
    state: &mut CheckerState,
    source: TypeId,
    optional_modifier: Option<MappedModifier>,
    readonly_modifier: Option<MappedModifier>,
) -> TypeId {
    match state.types.lookup(source) {
        Some(TypeData::Object(shape_id)) => {
            let shape = state.types.object_shape(shape_id);
            let props = shape
                .properties
                .into_iter()
                .map(|mut p| {
                    match optional_modifier {
                        Some(MappedModifier::Add) => p.optional = true,
                        Some(MappedModifier::Remove) => p.optional = false,
                        None => {}
                    }
                    match readonly_modifier {
                        Some(MappedModifier::Add) => p.readonly = true,
                        Some(MappedModifier::Remove) => p.readonly = false,
                        None => {}
                    }
                    p
                })
                .collect();
            state.types.object(props)
        }
        // Free type parameter: fall back to a lazy `MappedType` over
        // `keyof T`.
        _ => {
            let keyof = state.types.keyof(source);
            let key_name = state.types.intern_string("K");
            let type_param = TypeParamInfo {
                name: key_name,
                constraint: Some(keyof),
                default: None,
                is_const: false,
            };
            let param_ty = state.types.type_parameter(type_param.clone());
            let index = state.types.indexed_access(source, param_ty);
            let mapped = state.types.mapped(MappedType {
                type_param,
                constraint: keyof,
                name_type: None,
                template: index,
                optional_modifier,
                readonly_modifier,
            });
            tsz_solver::evaluate_type(state.types, mapped)
        }
    }
}

fn record_from_keys(state: &mut CheckerState, key_ty: TypeId, value_ty: TypeId) -> TypeId {
    let mut keys = Vec::new();
    collect_literal_keys(state, key_ty, &mut keys);
    if keys.is_empty() {
        let string_index = IndexSignature {
            key_type: TypeId::STRING,
            value_type: value_ty,
            readonly: false,
        };
        return state
            .types
            .object_with_indices(vec![], Some(string_index), None, None);
    }
    let props = keys
        .into_iter()
        .map(|name| PropertyInfo::new(name, value_ty))
        .collect();
    state.types.object(props)
}

fn collect_literal_keys(state: &CheckerState, ty: TypeId, out: &mut Vec<Atom>) {
    match state.types.lookup(ty) {
        Some(TypeData::Literal(LiteralValue::String(a))) => out.push(a),
        Some(TypeData::Union(list)) => {
            for member in state.types.type_list(list) {
                collect_literal_keys(state, member, out);
            }
        }
        _ => {}
    }
}

fn pick_or_omit(state: &mut CheckerState, source: TypeId, keys_ty: TypeId, keep: bool) -> TypeId {
    let mut keys = Vec::new();
    collect_literal_keys(state, keys_ty, &mut keys);
    match state.types.lookup(source) {
        Some(TypeData::Object(shape_id)) => {
            let shape = state.types.object_shape(shape_id);
            let props = shape
                .properties
                .into_iter()
                .filter(|p| keys.contains(&p.name) == keep)
                .collect();
            state.types.object(props)
        }
        _ => source,
    }
}

fn apply_intrinsic_string_op(state: &CheckerState, op: &str, ty: TypeId) -> TypeId {
    match state.types.lookup(ty) {
        Some(TypeData::Literal(LiteralValue::String(a))) => {
            let text = state.types.resolve_atom(a);
            let transformed = match op {
                "Uppercase" => text.to_uppercase(),
                "Lowercase" => text.to_lowercase(),
                "Capitalize" => capitalize(&text),
                "Uncapitalize" => uncapitalize(&text),
                _ => text.to_string(),
            };
            state.types.literal_string(&transformed)
        }
        _ => TypeId::STRING,
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn uncapitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_lowercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn resolve_type_literal(state: &CheckerState, lit: &TypeLiteralValue) -> TypeId {
    match lit {
        TypeLiteralValue::String(s) => state.types.literal_string(&state.atoms.resolve(*s)),
        TypeLiteralValue::Number(n) => state.types.literal_number(*n),
        TypeLiteralValue::Boolean(b) => state.types.literal_boolean(*b),
        TypeLiteralValue::Null => TypeId::NULL,
        TypeLiteralValue::Undefined => TypeId::UNDEFINED,
        TypeLiteralValue::BigInt(_) => TypeId::BIGINT,
    }
}

fn resolve_object_literal(
    state: &mut CheckerState,
    type_params: &FxHashMap<Atom, TypeId>,
    members: &[TypeMember],
) -> TypeId {
    let mut props = Vec::new();
    let mut string_index = None;
    let mut number_index = None;
    for m in members {
        if let Some(index_key) = m.index_key_type {
            let key_ty = resolve_type_node(state, type_params, index_key);
            let value_ty = m
                .type_node
                .map(|t| resolve_type_node(state, type_params, t))
                .unwrap_or(TypeId::ANY);
            let sig = IndexSignature {
                key_type: key_ty,
                value_type: value_ty,
                readonly: m.readonly,
            };
            if key_ty == TypeId::NUMBER {
                number_index = Some(sig);
            } else {
                string_index = Some(sig);
            }
            continue;
        }
        let name = match &m.key {
            PropertyKey::Ident(a) | PropertyKey::StringLit(a) => to_type_atom(state, *a),
            PropertyKey::NumberLit(n) => state.types.intern_string(&n.to_string()),
            PropertyKey::Computed(_) => state.types.intern_string("[computed]"),
        };
        let ty = if let Some(sig) = &m.sig {
            resolve_method_signature(state, type_params, sig)
        } else {
            m.type_node
                .map(|t| resolve_type_node(state, type_params, t))
                .unwrap_or(TypeId::ANY)
        };
        let mut info = PropertyInfo::new(name, ty);
        info.optional = m.optional;
        info.readonly = m.readonly;
        props.push(info);
    }
    state.types.object_with_indices(props, string_index, number_index, None)
}

fn resolve_method_signature(
    state: &mut CheckerState,
    type_params: &FxHashMap<Atom, TypeId>,
    sig: &FunctionSig,
) -> TypeId {
    let mut inner = type_params.clone();
    let tp_infos = bind_type_params(state, &mut inner, &sig.type_params);
    let param_infos = sig.params.iter().map(|p| resolve_param(state, &inner, p)).collect();
    let ret = sig
        .return_type
        .map(|t| resolve_type_node(state, &inner, t))
        .unwrap_or(TypeId::ANY);
    state.types.function(FunctionShape {
        params: param_infos,
        this_type: None,
        return_type: ret,
        type_params: tp_infos,
        type_predicate: None,
        is_constructor: false,
        is_method: true,
    })
}

fn resolve_param(
    state: &mut CheckerState,
    type_params: &FxHashMap<Atom, TypeId>,
    param: &tsz_parser::Param,
) -> ParamInfo {
    let name = match state.arena.get(param.pattern).clone() {
        Node::Identifier(a) => Some(a),
        _ => None,
    };
    let ty = param
        .type_ann
        .map(|t| resolve_type_node(state, type_params, t))
        .unwrap_or(TypeId::ANY);
    ParamInfo {
        name,
        type_id: ty,
        optional: param.optional || param.default.is_some(),
        rest: param.rest,
    }
}

pub fn bind_type_params(
    state: &mut CheckerState,
    scope: &mut FxHashMap<Atom, TypeId>,
    decls: &[TypeParamDecl],
) -> Vec<TypeParamInfo> {
    let mut infos = Vec::with_capacity(decls.len());
    // Two passes: declare every parameter as an unconstrained placeholder
    // first so `T extends U, U extends T`-shaped mutual references (rare,
    // but legal) resolve, then fill in constraints/defaults.
    for decl in decls {
        let atom = to_type_atom(state, decl.name);
        let placeholder = TypeParamInfo {
            name: atom,
            constraint: None,
            default: None,
            is_const: false,
        };
        let ty = state.types.type_parameter(placeholder);
        scope.insert(decl.name, ty);
    }
    for decl in decls {
        let atom = to_type_atom(state, decl.name);
        let constraint = decl.constraint.map(|c| resolve_type_node(state, scope, c));
        let default = decl.default.map(|d| resolve_type_node(state, scope, d));
        let info = TypeParamInfo {
            name: atom,
            constraint,
            default,
            is_const: false,
        };
        let ty = state.types.type_parameter(info.clone());
        scope.insert(decl.name, ty);
        infos.push(info);
    }
    infos
}

/// Type-check a `Function` statement/declaration. Returns the function's
/// `FunctionShape` type, which is also recorded into `symbol_types` for its
/// bound name (if any) by the caller.
pub fn check_function(state: &mut CheckerState, node: NodeIndex) -> TypeId {
    let Node::Function(sig) | Node::ArrowFunction(sig) = state.arena.get(node).clone() else {
        return TypeId::ANY;
    };
    check_function_sig(state, node, &sig)
}

pub fn check_function_sig(state: &mut CheckerState, node: NodeIndex, sig: &FunctionSig) -> TypeId {
    let mut type_scope = FxHashMap::default();
    let tp_infos = bind_type_params(state, &mut type_scope, &sig.type_params);
    let param_infos: Vec<ParamInfo> = sig
        .params
        .iter()
        .map(|p| resolve_param(state, &type_scope, p))
        .collect();
    let declared_return = sig.return_type.map(|t| resolve_type_node(state, &type_scope, t));

    let is_async = sig.modifiers.is_async();
    let is_generator = sig.modifiers.is_generator();
    state.functions.push(crate::context::FunctionFrame {
        expected_return: declared_return,
        is_async,
        is_generator,
        yielded_types: Vec::new(),
        returned_types: Vec::new(),
    });

    let saved_narrowing = state.narrowing.clone();
    state.narrowing = tsz_solver::NarrowingContext::empty();

    if let Some(body) = sig.body {
        match state.arena.get(body).clone() {
            Node::Block(_) => {
                crate::control_flow::check_block(state, body);
            }
            _ => {
                // Arrow function with an expression body: its type is the
                // implicit return value.
                let expr_ty = crate::expr::check_expr(state, body);
                if let Some(frame) = state.functions.last_mut() {
                    frame.returned_types.push(expr_ty);
                }
            }
        }
    }

    let frame = state.functions.pop().unwrap();

    // A closure holds a live reference to its captures; a narrowing on one
    // established before the closure was created can't be trusted once the
    // closure might run later (e.g. as an async callback), after whatever
    // reassignment invalidated it in real execution order. Drop those paths
    // from the context we're about to restore rather than carrying them
    // back out unchanged.
    state.narrowing = match state.closures.functions.get(&node) {
        Some(plan) => plan
            .captures
            .iter()
            .fold(saved_narrowing, |ctx, &name| ctx.invalidate(&tsz_solver::NarrowingPath::Variable(name))),
        None => saved_narrowing,
    };

    let inferred_return = if is_generator && !is_async {
        let yielded = state.types.union(frame.yielded_types);
        state.types.generator(yielded)
    } else if is_generator && is_async {
        let yielded = state.types.union(frame.yielded_types);
        state.types.async_generator(yielded)
    } else {
        let mut returned = frame.returned_types;
        if returned.is_empty() {
            returned.push(TypeId::VOID);
        }
        let widened: Vec<TypeId> = returned
            .into_iter()
            .map(|t| tsz_solver::widen_type(state.types, t))
            .collect();
        let ret = state.types.union(widened);
        if is_async {
            state.types.promise(ret)
        } else {
            ret
        }
    };

    let return_type = declared_return.unwrap_or(inferred_return);
    let fn_ty = state.types.function(FunctionShape {
        params: param_infos,
        this_type: None,
        return_type,
        type_params: tp_infos,
        type_predicate: None,
        is_constructor: false,
        is_method: false,
    });
    state.record_type(node, fn_ty)
}

pub fn check_class(state: &mut CheckerState, node: NodeIndex) -> TypeId {
    let Node::Class {
        name,
        type_params,
        super_class,
        members,
        ..
    } = state.arena.get(node).clone()
    else {
        return TypeId::ANY;
    };
    let mut type_scope = FxHashMap::default();
    let tp_infos = bind_type_params(state, &mut type_scope, &type_params);

    let super_def = super_class.and_then(|sc| {
        let super_ty = resolve_type_node(state, &type_scope, sc);
        match state.types.lookup(super_ty) {
            Some(TypeData::Class(def)) => Some(def),
            _ => None,
        }
    });

    let mut instance_props = Vec::new();
    let mut static_props = Vec::new();
    for member in &members {
        let member_name = member.name.map(|a| to_type_atom(state, a));
        let Some(member_name) = member_name else {
            continue;
        };
        let ty = if let Some(sig) = &member.sig {
            resolve_method_signature(state, &type_scope, sig)
        } else {
            member
                .type_ann
                .map(|t| resolve_type_node(state, &type_scope, t))
                .unwrap_or(TypeId::ANY)
        };
        let mut info = PropertyInfo::new(member_name, ty);
        info.optional = member.is_optional;
        info.readonly = member.is_readonly;
        info.visibility = match member.access {
            tsz_parser::AccessModifier::Public => tsz_solver::Visibility::Public,
            tsz_parser::AccessModifier::Private => tsz_solver::Visibility::Private,
            tsz_parser::AccessModifier::Protected => tsz_solver::Visibility::Protected,
        };
        if matches!(member.kind, ClassMemberKind::Constructor | ClassMemberKind::StaticBlock) {
            continue;
        }
        if member.is_static {
            static_props.push(info);
        } else {
            instance_props.push(info);
        }
    }
    let instance_shape_ty = state.types.object(instance_props);
    let static_shape_ty = state.types.object(static_props);
    let instance_shape = match state.types.lookup(instance_shape_ty) {
        Some(TypeData::Object(id)) => id,
        _ => unreachable!(),
    };
    let static_shape = match state.types.lookup(static_shape_ty) {
        Some(TypeData::Object(id)) => id,
        _ => unreachable!(),
    };

    let class_name = name.map(|n| to_type_atom(state, n)).unwrap_or(Atom::EMPTY);
    let def = state.types.define_class(ClassShape {
        name: class_name,
        super_class: super_def,
        type_params: tp_infos.clone(),
        instance_shape,
        static_shape,
        is_abstract: false,
    });
    let class_ty = state.types.intern(TypeData::Class(def));
    let result_ty = if tp_infos.is_empty() {
        class_ty
    } else {
        state.types.intern(TypeData::Generic(def))
    };
    state.record_type(node, result_ty);
    if let Some(name) = name {
        if let Some(sym) = state.binder.references.get(&node).copied() {
            state.symbol_types.insert(sym, result_ty);
        }
    }
    result_ty
}

pub fn check_interface(state: &mut CheckerState, node: NodeIndex) -> TypeId {
    let Node::Interface {
        type_params,
        members,
        extends,
        ..
    } = state.arena.get(node).clone()
    else {
        return TypeId::ANY;
    };
    let mut type_scope = FxHashMap::default();
    bind_type_params(state, &mut type_scope, &type_params);
    let mut ty = resolve_object_literal(state, &type_scope, &members);
    if !extends.is_empty() {
        let mut members_ty = vec![ty];
        for &ext in &extends {
            members_ty.push(resolve_type_node(state, &type_scope, ext));
        }
        ty = state.types.intersection(members_ty);
    }
    state.record_type(node, ty)
}

pub fn check_enum(state: &mut CheckerState, node: NodeIndex) -> TypeId {
    let Node::Enum { name, is_const, members } = state.arena.get(node).clone() else {
        return TypeId::ANY;
    };
    let mut next_numeric = 0.0f64;
    let mut kind = EnumKind::Numeric;
    let mut entries = Vec::new();
    for (member_name, init) in &members {
        let atom = to_type_atom(state, *member_name);
        let value = if let Some(init) = init {
            let v = crate::expr::check_expr(state, *init);
            match state.types.lookup(v) {
                Some(TypeData::Literal(LiteralValue::String(s))) => {
                    kind = EnumKind::String;
                    LiteralValue::String(s)
                }
                Some(TypeData::Literal(LiteralValue::Number(n))) => {
                    next_numeric = n.0 + 1.0;
                    LiteralValue::Number(n)
                }
                _ => LiteralValue::Number(tsz_solver::OrderedFloat(next_numeric)),
            }
        } else {
            let n = next_numeric;
            next_numeric += 1.0;
            LiteralValue::Number(tsz_solver::OrderedFloat(n))
        };
        entries.push((atom, value));
    }
    if is_const {
        kind = EnumKind::Const;
    }
    let enum_name = to_type_atom(state, name);
    let def = state.types.define_enum(EnumShape {
        name: enum_name,
        members: entries,
        kind,
    });
    let ty = state.types.intern(TypeData::Enum(def));
    state.record_type(node, ty);
    if let Some(sym) = state.binder.references.get(&node).copied() {
        state.symbol_types.insert(sym, ty);
    }
    ty
}

pub fn check_type_alias(state: &mut CheckerState, node: NodeIndex) -> TypeId {
    let Node::TypeAlias { type_params, value, .. } = state.arena.get(node).clone() else {
        return TypeId::ANY;
    };
    let mut type_scope = FxHashMap::default();
    bind_type_params(state, &mut type_scope, &type_params);
    let ty = resolve_type_node(state, &type_scope, value);
    state.record_type(node, ty);
    if let Some(sym) = state.binder.references.get(&node).copied() {
        state.symbol_types.insert(sym, ty);
    }
    ty
}

//! Node-kind classification shared by the checker's own passes.
//!
//! `check_stmt`/`check_expr` (`control_flow`/`expr`) already match on every
//! `Node` variant they handle directly — that per-variant match *is* the
//! dispatch. What lives here is the coarser classification other checker
//! modules need without re-deriving it from the full `Node` match: "is this
//! a statement or an expression", and "does checking this node directly
//! introduce a suspension point" (the latter feeds
//! `declarations::check_function_sig`'s async/generator bookkeeping).

use tsz_parser::{Node, NodeArena, NodeIndex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeCategory {
    Statement,
    Expression,
    Type,
}

#[must_use]
pub fn categorize(arena: &NodeArena, node: NodeIndex) -> NodeCategory {
    match arena.get(node) {
        Node::Program(_)
        | Node::VarDecl { .. }
        | Node::ExprStmt(_)
        | Node::If { .. }
        | Node::While { .. }
        | Node::DoWhile { .. }
        | Node::For { .. }
        | Node::ForOf { .. }
        | Node::ForIn { .. }
        | Node::Block(_)
        | Node::Return(_)
        | Node::Break(_)
        | Node::Continue(_)
        | Node::TryCatch { .. }
        | Node::Throw(_)
        | Node::Switch { .. }
        | Node::LabeledStatement { .. }
        | Node::Function(_)
        | Node::Class { .. }
        | Node::Interface { .. }
        | Node::Enum { .. }
        | Node::TypeAlias { .. }
        | Node::Namespace { .. }
        | Node::Import { .. }
        | Node::Export { .. }
        | Node::ImportAlias { .. }
        | Node::Empty => NodeCategory::Statement,
        Node::Type(_) => NodeCategory::Type,
        _ => NodeCategory::Expression,
    }
}

/// Whether `node` is itself a suspension point: `await`,
/// `yield`, and `yield*` (`Yield` covers both via its `delegate` flag).
/// Does not descend into nested function bodies — those have their own,
/// independent suspension plan.
#[must_use]
pub fn is_suspension_point(arena: &NodeArena, node: NodeIndex) -> bool {
    matches!(arena.get(node), Node::Await(_) | Node::Yield { .. })
}

/// Whether `node` introduces a new lexical function boundary:
/// suspension/capture analysis never crosses this without explicitly
/// recursing into a fresh, independent plan for the nested function.
#[must_use]
pub fn is_function_boundary(arena: &NodeArena, node: NodeIndex) -> bool {
    matches!(arena.get(node), Node::Function(_) | Node::ArrowFunction(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsz_common::Span;
    use tsz_parser::{FunctionModifiers, FunctionSig};

    #[test]
    fn classifies_statements_and_expressions() {
        let mut arena = NodeArena::new();
        let lit = arena.alloc(Node::NumberLit(1.0), Span::dummy());
        let stmt = arena.alloc(Node::ExprStmt(lit), Span::dummy());
        assert_eq!(categorize(&arena, lit), NodeCategory::Expression);
        assert_eq!(categorize(&arena, stmt), NodeCategory::Statement);
    }

    #[test]
    fn await_and_yield_are_suspension_points() {
        let mut arena = NodeArena::new();
        let lit = arena.alloc(Node::NumberLit(1.0), Span::dummy());
        let await_node = arena.alloc(Node::Await(lit), Span::dummy());
        let yield_node = arena.alloc(Node::Yield { delegate: false, argument: Some(lit) }, Span::dummy());
        assert!(is_suspension_point(&arena, await_node));
        assert!(is_suspension_point(&arena, yield_node));
        assert!(!is_suspension_point(&arena, lit));
    }

    #[test]
    fn function_and_arrow_are_boundaries() {
        let mut arena = NodeArena::new();
        let sig = FunctionSig {
            name: None,
            type_params: Vec::new(),
            params: Vec::new(),
            return_type: None,
            body: None,
            modifiers: FunctionModifiers::Plain,
            is_arrow: true,
        };
        let arrow = arena.alloc(Node::ArrowFunction(sig), Span::dummy());
        assert!(is_function_boundary(&arena, arrow));
    }
}

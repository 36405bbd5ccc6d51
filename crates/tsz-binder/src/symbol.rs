//! Symbols: one per declared name, carrying every declaration site that
//! contributes to it (a `function`/interface pair of the same name merges,
//! for instance).

use tsz_common::Atom;
use tsz_parser::NodeIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub u32);

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SymbolFlags: u16 {
        const VARIABLE          = 1 << 0;
        const BLOCK_SCOPED      = 1 << 1;
        const FUNCTION          = 1 << 2;
        const CLASS             = 1 << 3;
        const INTERFACE         = 1 << 4;
        const ENUM              = 1 << 5;
        const TYPE_ALIAS        = 1 << 6;
        const NAMESPACE         = 1 << 7;
        const IMPORT            = 1 << 8;
        const PARAMETER         = 1 << 9;
        const CATCH_PARAMETER   = 1 << 10;
    }
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: Atom,
    pub flags: SymbolFlags,
    pub declarations: Vec<NodeIndex>,
    /// `let`/`const`/class declarations are only usable after their
    /// declaration point in program order (temporal dead zone); `var` and
    /// `function` are hoisted and have no TDZ.
    pub has_tdz: bool,
}

impl Symbol {
    #[must_use]
    pub fn new(name: Atom, flags: SymbolFlags) -> Self {
        Symbol {
            name,
            flags,
            declarations: Vec::new(),
            has_tdz: flags.intersects(SymbolFlags::BLOCK_SCOPED | SymbolFlags::CLASS),
        }
    }
}

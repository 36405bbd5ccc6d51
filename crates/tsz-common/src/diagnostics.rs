//! Diagnostic taxonomy shared by every compilation phase.
//!
//! Full TypeScript conformance (and its ~17k curated diagnostic messages)
//! is out of scope; this module carries a small, hand-picked table covering
//! the diagnostic kinds the scanner, parser, binder, solver, checker, and
//! lowering passes actually raise.

use crate::span::Span;
use serde::{Deserialize, Serialize};

/// Severity of a diagnostic.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticCategory {
    Error,
    Warning,
    Suggestion,
    Message,
}

/// A stable numeric code identifying the diagnostic kind, for tooling that
/// wants to filter or suppress by code rather than matching message text.
pub type DiagnosticCode = u32;

pub mod codes {
    use super::DiagnosticCode;

    // Scanner (1000-1099)
    pub const UNTERMINATED_STRING_LITERAL: DiagnosticCode = 1001;
    pub const UNTERMINATED_COMMENT: DiagnosticCode = 1002;
    pub const INVALID_NUMERIC_LITERAL: DiagnosticCode = 1003;
    pub const INVALID_CHARACTER: DiagnosticCode = 1004;

    // Parser (1100-1199)
    pub const UNEXPECTED_TOKEN: DiagnosticCode = 1100;
    pub const EXPECTED_TOKEN: DiagnosticCode = 1101;
    pub const EXPRESSION_EXPECTED: DiagnosticCode = 1102;
    pub const DECLARATION_EXPECTED: DiagnosticCode = 1103;
    pub const PARSER_RECURSION_LIMIT_EXCEEDED: DiagnosticCode = 1104;

    // Binder (2000-2099)
    pub const CANNOT_FIND_NAME: DiagnosticCode = 2000;
    pub const DUPLICATE_IDENTIFIER: DiagnosticCode = 2001;
    pub const USED_BEFORE_DECLARATION: DiagnosticCode = 2002;

    // Type checker / solver (2100-2299)
    pub const TYPE_NOT_ASSIGNABLE: DiagnosticCode = 2100;
    pub const PROPERTY_MISSING: DiagnosticCode = 2101;
    pub const EXCESS_PROPERTY: DiagnosticCode = 2102;
    pub const ARGUMENT_COUNT_MISMATCH: DiagnosticCode = 2103;
    pub const CONSTRAINT_VIOLATION: DiagnosticCode = 2104;
    pub const NOT_CALLABLE: DiagnosticCode = 2105;
    pub const CANNOT_INFER_TYPE_PARAMETER: DiagnosticCode = 2106;
    pub const TOO_COMPLEX: DiagnosticCode = 2107;
    pub const FOR_OF_ASYNC_ITERABLE_IN_SYNC_FUNCTION: DiagnosticCode = 2108;
    pub const REVERSE_MAPPING_OF_CONST_ENUM: DiagnosticCode = 2109;
    pub const AWAIT_OUTSIDE_ASYNC_FUNCTION: DiagnosticCode = 2110;
    pub const YIELD_OUTSIDE_GENERATOR: DiagnosticCode = 2111;

    // Lowering / emit (2300-2399)
    pub const UNRESOLVED_CAPTURE: DiagnosticCode = 2300;
    pub const TOO_MANY_SUSPENSION_POINTS: DiagnosticCode = 2301;
    pub const MODULE_CYCLE: DiagnosticCode = 2302;
}

/// A related piece of context attached to a diagnostic, e.g. the earlier
/// declaration site in a duplicate-identifier error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticRelatedInformation {
    pub file: String,
    pub span: Span,
    pub message: String,
}

impl DiagnosticRelatedInformation {
    #[must_use]
    pub fn new(file: impl Into<String>, span: Span, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            span,
            message: message.into(),
        }
    }
}

/// A single compiler diagnostic: an error, warning, suggestion, or
/// informational message tied to a source location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub category: DiagnosticCategory,
    pub code: DiagnosticCode,
    pub file: String,
    pub span: Span,
    pub message: String,
    pub related: Vec<DiagnosticRelatedInformation>,
}

impl Diagnostic {
    #[must_use]
    pub fn new(
        category: DiagnosticCategory,
        code: DiagnosticCode,
        file: impl Into<String>,
        span: Span,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            code,
            file: file.into(),
            span,
            message: message.into(),
            related: Vec::new(),
        }
    }

    #[must_use]
    pub fn error(
        code: DiagnosticCode,
        file: impl Into<String>,
        span: Span,
        message: impl Into<String>,
    ) -> Self {
        Self::new(DiagnosticCategory::Error, code, file, span, message)
    }

    #[must_use]
    pub fn warning(
        code: DiagnosticCode,
        file: impl Into<String>,
        span: Span,
        message: impl Into<String>,
    ) -> Self {
        Self::new(DiagnosticCategory::Warning, code, file, span, message)
    }

    #[must_use]
    pub fn with_related(
        mut self,
        file: impl Into<String>,
        span: Span,
        message: impl Into<String>,
    ) -> Self {
        self.related
            .push(DiagnosticRelatedInformation::new(file, span, message));
        self
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.category == DiagnosticCategory::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_carries_category_and_code() {
        let d = Diagnostic::error(
            codes::TYPE_NOT_ASSIGNABLE,
            "a.ts",
            Span::new(0, 3),
            "Type 'string' is not assignable to type 'number'.",
        );
        assert!(d.is_error());
        assert_eq!(d.code, codes::TYPE_NOT_ASSIGNABLE);
    }

    #[test]
    fn with_related_appends_context() {
        let d = Diagnostic::error(
            codes::DUPLICATE_IDENTIFIER,
            "a.ts",
            Span::new(10, 13),
            "Duplicate identifier 'foo'.",
        )
        .with_related("a.ts", Span::new(0, 3), "'foo' was first declared here.");
        assert_eq!(d.related.len(), 1);
        assert_eq!(d.related[0].message, "'foo' was first declared here.");
    }
}

//! Diagnostic rendering for a terminal: a plain single-line form
//! (`file(line,col): error TScode: message`) and a `--pretty` form
//! (`file:line:col - error TScode: message` plus a source snippet with an
//! aligned line number and a `~~~` underline, closed off by a `Found N
//! error(s) in ...` summary).

use std::collections::BTreeSet;
use std::fmt::Write as _;

use tsz_common::{Diagnostic, DiagnosticCategory, LineMap};

pub struct Reporter {
    pretty: bool,
}

impl Reporter {
    #[must_use]
    pub fn new(pretty: bool) -> Self {
        Reporter { pretty }
    }

    pub fn set_pretty(&mut self, pretty: bool) {
        self.pretty = pretty;
    }

    #[must_use]
    pub fn render(&self, diagnostics: &[Diagnostic]) -> String {
        if self.pretty {
            self.render_pretty(diagnostics)
        } else {
            self.render_plain(diagnostics)
        }
    }

    fn render_plain(&self, diagnostics: &[Diagnostic]) -> String {
        let mut out = String::new();
        for d in diagnostics {
            let source = read_source(&d.file);
            let pos = LineMap::build(&source).offset_to_position(d.span.start, &source);
            let _ = writeln!(out, "{}({},{}): {}{}", d.file, pos.line + 1, pos.character + 1, category_word(d.category), code_suffix(d.code, &d.message));
        }
        out
    }

    fn render_pretty(&self, diagnostics: &[Diagnostic]) -> String {
        let mut out = String::new();
        let mut error_count = 0usize;
        let mut files = BTreeSet::new();
        for d in diagnostics {
            if d.is_error() {
                error_count += 1;
            }
            files.insert(d.file.clone());
            let source = read_source(&d.file);
            let line_map = LineMap::build(&source);
            let pos = line_map.offset_to_position(d.span.start, &source);
            let _ = writeln!(out, "{}:{}:{} - {}{}", d.file, pos.line + 1, pos.character + 1, category_word(d.category), code_suffix(d.code, &d.message));
            if let Some(line_text) = source.lines().nth(pos.line as usize) {
                let line_no = (pos.line + 1).to_string();
                let _ = writeln!(out, "{line_no} {line_text}");
                let gutter = " ".repeat(line_no.len() + 1);
                let underline_len = d.span.end.saturating_sub(d.span.start).max(1) as usize;
                let _ = writeln!(out, "{gutter}{}{}", " ".repeat(pos.character as usize), "~".repeat(underline_len));
            }
            out.push('\n');
        }
        if let Some(first_file) = files.iter().next() {
            let plural = if error_count == 1 { "" } else { "s" };
            if files.len() == 1 {
                let _ = writeln!(out, "Found {error_count} error{plural} in {first_file}");
            } else {
                let _ = writeln!(out, "Found {error_count} error{plural} in {} files", files.len());
            }
        }
        out
    }
}

fn code_suffix(code: u32, message: &str) -> String {
    if code == 0 {
        format!(": {message}")
    } else {
        format!(" TS{code}: {message}")
    }
}

fn category_word(category: DiagnosticCategory) -> &'static str {
    match category {
        DiagnosticCategory::Error => "error",
        DiagnosticCategory::Warning => "warning",
        DiagnosticCategory::Suggestion => "suggestion",
        DiagnosticCategory::Message => "message",
    }
}

/// Diagnostics carry only a file path, not the source text, so rendering
/// re-reads it from disk; a missing file degrades to an empty snippet
/// rather than a panic, since a diagnostic can outlive the file it named
/// (e.g. one produced from an in-memory buffer in a test).
fn read_source(path: &str) -> String {
    std::fs::read_to_string(path).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsz_common::Span;
    use std::io::Write;

    fn temp_file(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().expect("temp file");
        f.write_all(contents.as_bytes()).expect("write temp file");
        f
    }

    #[test]
    fn plain_mode_formats_diagnostic_with_location() {
        let file = temp_file("let x = 1;\nlet y = 2;\n");
        let path = file.path().to_string_lossy().into_owned();
        let diagnostic = Diagnostic::error(2304, path.clone(), Span::new(11, 12), "Cannot find name 'y'.");

        let reporter = Reporter::new(false);
        let output = reporter.render(std::slice::from_ref(&diagnostic));
        assert_eq!(output, format!("{path}(2,1): error TS2304: Cannot find name 'y'.\n"));
    }

    #[test]
    fn plain_mode_omits_code_when_zero() {
        let diagnostic = Diagnostic::error(0, "missing.ts", Span::new(0, 0), "Parse error");
        let reporter = Reporter::new(false);
        let output = reporter.render(&[diagnostic]);
        assert!(output.contains(": error: Parse error"), "{output}");
    }

    #[test]
    fn plain_mode_no_source_snippets() {
        let file = temp_file("let x: number = \"string\";\n");
        let path = file.path().to_string_lossy().into_owned();
        let diagnostic = Diagnostic::error(2322, path, Span::new(16, 24), "Type 'string' is not assignable to type 'number'.");

        let reporter = Reporter::new(false);
        let output = reporter.render(&[diagnostic]);
        assert!(!output.contains("let x: number"));
        assert!(!output.contains('~'));
        assert_eq!(output.lines().count(), 1);
    }

    #[test]
    fn pretty_mode_uses_colon_separated_location() {
        let file = temp_file("let x = 1;\nlet y = 2;\n");
        let path = file.path().to_string_lossy().into_owned();
        let diagnostic = Diagnostic::error(2304, path.clone(), Span::new(11, 12), "Cannot find name 'y'.");

        let mut reporter = Reporter::new(false);
        reporter.set_pretty(true);
        let output = reporter.render(std::slice::from_ref(&diagnostic));
        assert!(output.contains(&format!("{path}:2:1 - error TS2304: ")));
    }

    #[test]
    fn pretty_mode_includes_source_snippet_and_underline() {
        let file = temp_file("let x: number = \"string\";\n");
        let path = file.path().to_string_lossy().into_owned();
        let diagnostic = Diagnostic::error(2322, path, Span::new(16, 24), "Type 'string' is not assignable to type 'number'.");

        let mut reporter = Reporter::new(false);
        reporter.set_pretty(true);
        let output = reporter.render(&[diagnostic]);
        assert!(output.contains("1 let x: number = \"string\";"), "{output}");
        assert!(output.contains("~~~~~~~~"), "{output}");
    }

    #[test]
    fn pretty_mode_summary_single_error_single_file() {
        let file = temp_file("let x = unknownVar;\n");
        let path = file.path().to_string_lossy().into_owned();
        let diagnostic = Diagnostic::error(2304, path.clone(), Span::new(8, 18), "Cannot find name 'unknownVar'.");

        let mut reporter = Reporter::new(false);
        reporter.set_pretty(true);
        let output = reporter.render(std::slice::from_ref(&diagnostic));
        assert!(output.contains(&format!("Found 1 error in {path}")), "{output}");
    }
}

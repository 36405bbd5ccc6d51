//! Source map: associates a file name with its text and `LineMap` so any
//! phase can turn a `Span` into a human-facing `file:line:column` location
//! without re-deriving the line table.

use crate::position::{LineMap, Position};
use crate::span::Span;

/// One source file registered with a compilation: its name, text, and a
/// precomputed `LineMap` for offset <-> position conversion.
pub struct SourceFile {
    pub file_name: String,
    pub text: String,
    line_map: LineMap,
}

impl SourceFile {
    #[must_use]
    pub fn new(file_name: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let line_map = LineMap::build(&text);
        Self {
            file_name: file_name.into(),
            text,
            line_map,
        }
    }

    #[must_use]
    pub fn position_of(&self, offset: u32) -> Position {
        self.line_map.offset_to_position(offset, &self.text)
    }

    #[must_use]
    pub fn slice(&self, span: Span) -> &str {
        span.slice_safe(&self.text)
    }
}

/// A registry of source files, keyed by insertion order. Diagnostics carry
/// a file name; the `SourceMap` is how a reporter turns that name plus a
/// byte span into a renderable `line:column` location.
#[derive(Default)]
pub struct SourceMap {
    files: Vec<SourceFile>,
}

impl SourceMap {
    #[must_use]
    pub fn new() -> Self {
        Self { files: Vec::new() }
    }

    pub fn add(&mut self, file_name: impl Into<String>, text: impl Into<String>) -> usize {
        self.files.push(SourceFile::new(file_name, text));
        self.files.len() - 1
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&SourceFile> {
        self.files.get(index)
    }

    #[must_use]
    pub fn find_by_name(&self, file_name: &str) -> Option<&SourceFile> {
        self.files.iter().find(|f| f.file_name == file_name)
    }

    #[must_use]
    pub fn render_location(&self, file_name: &str, offset: u32) -> String {
        match self.find_by_name(file_name) {
            Some(file) => {
                let pos = file.position_of(offset);
                format!("{}:{}:{}", file_name, pos.line + 1, pos.character + 1)
            }
            None => format!("{file_name}:{offset}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_line_and_column() {
        let mut map = SourceMap::new();
        map.add("a.ts", "let x = 1;\nlet y = 2;\n");
        // offset 11 is the start of the second line ('l' of "let y")
        let loc = map.render_location("a.ts", 11);
        assert_eq!(loc, "a.ts:2:1");
    }

    #[test]
    fn unknown_file_falls_back_to_offset() {
        let map = SourceMap::new();
        assert_eq!(map.render_location("missing.ts", 5), "missing.ts:5");
    }
}

//! Syntax highlighting of fenced code blocks with tree-sitter.
//!
//! Colours follow the VS Code "Dark+" palette on a fixed `#1e1e1e`
//! background regardless of the terminal theme.

use std::sync::OnceLock;

use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use tree_sitter_highlight::{HighlightConfiguration, HighlightEvent, Highlighter};

pub const CODE_BG: Color = Color::Rgb(0x1e, 0x1e, 0x1e);
pub const CODE_FG: Color = Color::Rgb(0xd4, 0xd4, 0xd4);

/// Capture names we assign colours to, in the order passed to `configure`.
const HIGHLIGHT_NAMES: &[&str] = &[
    "attribute",
    "comment",
    "constant",
    "constant.builtin",
    "constructor",
    "escape",
    "function",
    "function.builtin",
    "function.method",
    "keyword",
    "label",
    "module",
    "number",
    "operator",
    "property",
    "punctuation",
    "string",
    "string.special",
    "tag",
    "type",
    "type.builtin",
    "variable",
    "variable.builtin",
    "variable.parameter",
];

fn capture_color(name: &str) -> Color {
    let rgb = |r, g, b| Color::Rgb(r, g, b);
    match name.split('.').next().unwrap_or(name) {
        "comment" => rgb(0x6a, 0x99, 0x55),
        "keyword" | "label" => rgb(0x56, 0x9c, 0xd6),
        "string" | "escape" => rgb(0xce, 0x91, 0x78),
        "number" => rgb(0xb5, 0xce, 0xa8),
        "function" => rgb(0xdc, 0xdc, 0xaa),
        "type" | "constructor" | "module" => rgb(0x4e, 0xc9, 0xb0),
        "constant" => rgb(0x4f, 0xc1, 0xff),
        "variable" | "property" | "attribute" => rgb(0x9c, 0xdc, 0xfe),
        "tag" => rgb(0x56, 0x9c, 0xd6),
        _ => CODE_FG,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeLanguage {
    Python,
    Rust,
    JavaScript,
    Bash,
    Json,
}

impl CodeLanguage {
    const ALL: [CodeLanguage; 5] = [
        CodeLanguage::Python,
        CodeLanguage::Rust,
        CodeLanguage::JavaScript,
        CodeLanguage::Bash,
        CodeLanguage::Json,
    ];

    /// Map a fence tag such as `py` or `shell` to a grammar.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_lowercase().as_str() {
            "python" | "py" | "python3" => Some(CodeLanguage::Python),
            "rust" | "rs" => Some(CodeLanguage::Rust),
            "javascript" | "js" | "jsx" | "mjs" | "node" => Some(CodeLanguage::JavaScript),
            "bash" | "sh" | "shell" | "zsh" | "console" => Some(CodeLanguage::Bash),
            "json" | "jsonc" => Some(CodeLanguage::Json),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CodeLanguage::Python => "python",
            CodeLanguage::Rust => "rust",
            CodeLanguage::JavaScript => "javascript",
            CodeLanguage::Bash => "bash",
            CodeLanguage::Json => "json",
        }
    }

    fn index(self) -> usize {
        Self::ALL.iter().position(|l| *l == self).unwrap_or(0)
    }

    fn build_config(self) -> Option<HighlightConfiguration> {
        let (language, highlights, injections, locals): (tree_sitter::Language, &str, &str, &str) = match self {
            CodeLanguage::Python => (
                tree_sitter_python::LANGUAGE.into(),
                tree_sitter_python::HIGHLIGHTS_QUERY,
                "",
                "",
            ),
            CodeLanguage::Rust => (
                tree_sitter_rust::LANGUAGE.into(),
                tree_sitter_rust::HIGHLIGHTS_QUERY,
                "",
                "",
            ),
            CodeLanguage::JavaScript => (
                tree_sitter_javascript::LANGUAGE.into(),
                tree_sitter_javascript::HIGHLIGHT_QUERY,
                "",
                "",
            ),
            CodeLanguage::Bash => (
                tree_sitter_bash::LANGUAGE.into(),
                tree_sitter_bash::HIGHLIGHT_QUERY,
                "",
                "",
            ),
            CodeLanguage::Json => (
                tree_sitter_json::LANGUAGE.into(),
                tree_sitter_json::HIGHLIGHTS_QUERY,
                "",
                "",
            ),
        };
        match HighlightConfiguration::new(language, self.name(), highlights, injections, locals) {
            Ok(mut config) => {
                config.configure(HIGHLIGHT_NAMES);
                Some(config)
            }
            Err(err) => {
                tracing::warn!(language = self.name(), error = ?err, "invalid highlight query");
                None
            }
        }
    }

    fn config(self) -> Option<&'static HighlightConfiguration> {
        static CONFIGS: [OnceLock<Option<HighlightConfiguration>>; 5] =
            [const { OnceLock::new() }; 5];
        CONFIGS[self.index()]
            .get_or_init(|| self.build_config())
            .as_ref()
    }
}

fn base_style() -> Style {
    Style::default().fg(CODE_FG).bg(CODE_BG)
}

/// Split `source` into plain lines on the code background.
pub fn plain_lines(source: &str) -> Vec<Line<'static>> {
    source
        .split('\n')
        .map(|line| Line::from(Span::styled(line.to_string(), base_style())))
        .collect()
}

/// Highlight `source` for the fence tag `tag`, one [`Line`] per source line.
///
/// Unknown tags and highlighter failures yield [`plain_lines`].
pub fn highlight_code(tag: &str, source: &str) -> Vec<Line<'static>> {
    let Some(config) = CodeLanguage::from_tag(tag).and_then(CodeLanguage::config) else {
        return plain_lines(source);
    };
    match highlight_with(config, source) {
        Some(lines) => lines,
        None => plain_lines(source),
    }
}

fn highlight_with(config: &HighlightConfiguration, source: &str) -> Option<Vec<Line<'static>>> {
    let mut highlighter = Highlighter::new();
    let events = highlighter
        .highlight(config, source.as_bytes(), None, |_| None)
        .ok()?;

    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut current: Vec<Span<'static>> = Vec::new();
    let mut stack: Vec<usize> = Vec::new();

    for event in events {
        match event.ok()? {
            HighlightEvent::HighlightStart(h) => stack.push(h.0),
            HighlightEvent::HighlightEnd => {
                stack.pop();
            }
            HighlightEvent::Source { start, end } => {
                let style = match stack.last() {
                    Some(&i) => base_style().fg(capture_color(HIGHLIGHT_NAMES[i])),
                    None => base_style(),
                };
                let text = source.get(start..end)?;
                let mut parts = text.split('\n');
                if let Some(first) = parts.next() {
                    if !first.is_empty() {
                        current.push(Span::styled(first.to_string(), style));
                    }
                }
                for part in parts {
                    lines.push(Line::from(std::mem::take(&mut current)));
                    if !part.is_empty() {
                        current.push(Span::styled(part.to_string(), style));
                    }
                }
            }
        }
    }
    lines.push(Line::from(current));
    Some(lines)
}

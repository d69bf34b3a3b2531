//! GitHub-flavoured Markdown to styled terminal lines.
//!
//! Only assistant messages go through here. Fenced blocks with a language tag
//! get a header row and tree-sitter highlighting, everything else maps onto
//! plain ratatui styles.

use std::sync::OnceLock;

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use regex::Regex;

use crate::highlight::{self, CODE_BG};

const INLINE_CODE_BG: Color = Color::Rgb(0x27, 0x27, 0x2a);
const CODE_HEADER_BG: Color = Color::Rgb(0x3f, 0x3f, 0x46);
const CODE_BORDER: Color = Color::Rgb(0x52, 0x52, 0x5b);
const LINK_FG: Color = Color::Rgb(0x60, 0xa5, 0xfa);

/// Language tag of a fenced block: the first word of its info string.
pub fn fence_language(info: &str) -> Option<String> {
    static FENCE_TAG: OnceLock<Regex> = OnceLock::new();
    let re = FENCE_TAG.get_or_init(|| Regex::new(r"^\s*(\w+)").expect("fence tag pattern is valid"));
    re.captures(info).map(|caps| caps[1].to_string())
}

pub fn render_markdown(content: &str) -> Vec<Line<'static>> {
    let options = Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TABLES
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_FOOTNOTES;
    let mut renderer = Renderer::default();
    for event in Parser::new_ext(content, options) {
        renderer.event(event);
    }
    renderer.finish()
}

struct ListLevel {
    next: Option<u64>,
    indent: usize,
}

struct CodeBlock {
    language: Option<String>,
    source: String,
}

#[derive(Default)]
struct Table {
    rows: Vec<Vec<String>>,
    row: Vec<String>,
    cell: String,
    header_rows: usize,
}

#[derive(Default)]
struct Renderer {
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    styles: Vec<Style>,
    lists: Vec<ListLevel>,
    pending_marker: Option<String>,
    quote_depth: usize,
    code: Option<CodeBlock>,
    links: Vec<(String, usize)>,
    table: Option<Table>,
}

impl Renderer {
    fn style(&self) -> Style {
        self.styles.last().copied().unwrap_or_default()
    }

    fn push_style(&mut self, style: Style) {
        let merged = self.style().patch(style);
        self.styles.push(merged);
    }

    fn pop_style(&mut self) {
        self.styles.pop();
    }

    fn text(&mut self, text: &str) {
        if let Some(code) = self.code.as_mut() {
            code.source.push_str(text);
            return;
        }
        if let Some(table) = self.table.as_mut() {
            table.cell.push_str(text);
            return;
        }
        let style = self.style();
        let mut parts = text.split('\n');
        if let Some(first) = parts.next() {
            if !first.is_empty() {
                self.current.push(Span::styled(first.to_string(), style));
            }
        }
        for part in parts {
            self.flush();
            if !part.is_empty() {
                self.current.push(Span::styled(part.to_string(), style));
            }
        }
    }

    fn prefix(&mut self) -> Vec<Span<'static>> {
        let mut spans = Vec::new();
        if self.quote_depth > 0 {
            spans.push(Span::styled(
                "▌ ".repeat(self.quote_depth),
                Style::default().fg(Color::DarkGray),
            ));
        }
        if let Some((last, outer)) = self.lists.split_last() {
            let outer_indent: usize = outer.iter().map(|l| l.indent).sum();
            let lead = " ".repeat(outer_indent);
            match self.pending_marker.take() {
                Some(marker) => {
                    spans.push(Span::raw(lead));
                    spans.push(Span::styled(marker, Style::default().fg(Color::Cyan)));
                }
                None => spans.push(Span::raw(format!("{}{}", lead, " ".repeat(last.indent)))),
            }
        }
        spans
    }

    fn flush(&mut self) {
        if self.current.is_empty() && self.pending_marker.is_none() {
            return;
        }
        let mut spans = self.prefix();
        spans.append(&mut self.current);
        self.lines.push(Line::from(spans));
    }

    fn blank_line(&mut self) {
        if self.lines.last().is_some_and(|l| l.width() > 0) {
            self.lines.push(Line::default());
        }
    }

    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => self.text(&text),
            Event::Code(code) => {
                if let Some(table) = self.table.as_mut() {
                    table.cell.push_str(&code);
                } else {
                    self.current.push(Span::styled(
                        code.to_string(),
                        self.style().fg(Color::Rgb(0xe4, 0xe4, 0xe7)).bg(INLINE_CODE_BG),
                    ));
                }
            }
            Event::Html(html) | Event::InlineHtml(html) => {
                self.push_style(Style::default().fg(Color::DarkGray));
                self.text(&html);
                self.pop_style();
            }
            Event::FootnoteReference(label) => {
                self.current.push(Span::styled(
                    format!("[^{}]", label),
                    Style::default().fg(Color::DarkGray),
                ));
            }
            Event::SoftBreak => self.text(" "),
            Event::HardBreak => self.flush(),
            Event::Rule => {
                self.flush();
                self.lines.push(Line::from(Span::styled(
                    "─".repeat(32),
                    Style::default().fg(Color::DarkGray),
                )));
                self.blank_line();
            }
            Event::TaskListMarker(checked) => {
                let (mark, color) = if checked {
                    ("[x] ", Color::Green)
                } else {
                    ("[ ] ", Color::DarkGray)
                };
                self.current.push(Span::styled(mark, Style::default().fg(color)));
            }
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {}
            Tag::Heading { level, .. } => {
                self.flush();
                let style = match level {
                    HeadingLevel::H1 => Style::default()
                        .fg(Color::White)
                        .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
                    HeadingLevel::H2 => Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
                    _ => Style::default().add_modifier(Modifier::BOLD),
                };
                self.push_style(style);
            }
            Tag::BlockQuote => {
                self.flush();
                self.quote_depth += 1;
            }
            Tag::CodeBlock(kind) => {
                self.flush();
                let language = match kind {
                    CodeBlockKind::Fenced(info) => fence_language(&info),
                    CodeBlockKind::Indented => None,
                };
                self.code = Some(CodeBlock {
                    language,
                    source: String::new(),
                });
            }
            Tag::List(start) => {
                self.flush();
                self.lists.push(ListLevel {
                    next: start,
                    indent: 2,
                });
            }
            Tag::Item => {
                self.flush();
                if let Some(level) = self.lists.last_mut() {
                    let marker = match level.next.as_mut() {
                        Some(n) => {
                            let marker = format!("{}. ", n);
                            *n += 1;
                            marker
                        }
                        None => "• ".to_string(),
                    };
                    level.indent = marker.chars().count();
                    self.pending_marker = Some(marker);
                }
            }
            Tag::FootnoteDefinition(label) => {
                self.flush();
                self.current.push(Span::styled(
                    format!("[^{}]: ", label),
                    Style::default().fg(Color::DarkGray),
                ));
            }
            Tag::Table(_) => {
                self.flush();
                self.table = Some(Table::default());
            }
            Tag::TableHead | Tag::TableRow => {}
            Tag::TableCell => {}
            Tag::Emphasis => self.push_style(Style::default().add_modifier(Modifier::ITALIC)),
            Tag::Strong => self.push_style(Style::default().add_modifier(Modifier::BOLD)),
            Tag::Strikethrough => self.push_style(Style::default().add_modifier(Modifier::CROSSED_OUT)),
            Tag::Link { dest_url, .. } => {
                // Inside a table the link text accumulates in the cell, not in spans
                let start = match &self.table {
                    Some(table) => table.cell.len(),
                    None => self.current.len(),
                };
                self.links.push((dest_url.to_string(), start));
                self.push_style(Style::default().fg(LINK_FG).add_modifier(Modifier::UNDERLINED));
            }
            Tag::Image { dest_url, .. } => {
                let label = format!("[image: {}] ", dest_url);
                match self.table.as_mut() {
                    Some(table) => table.cell.push_str(&label),
                    None => self
                        .current
                        .push(Span::styled(label, Style::default().fg(Color::DarkGray))),
                }
                self.push_style(Style::default().add_modifier(Modifier::ITALIC));
            }
            Tag::HtmlBlock | Tag::MetadataBlock(_) => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => {
                self.flush();
                if self.lists.is_empty() {
                    self.blank_line();
                }
            }
            TagEnd::Heading(_) => {
                self.pop_style();
                self.flush();
                self.blank_line();
            }
            TagEnd::BlockQuote => {
                self.flush();
                self.quote_depth = self.quote_depth.saturating_sub(1);
                self.blank_line();
            }
            TagEnd::CodeBlock => {
                if let Some(block) = self.code.take() {
                    self.code_block(block);
                }
            }
            TagEnd::List(_) => {
                self.flush();
                self.lists.pop();
                if self.lists.is_empty() {
                    self.blank_line();
                }
            }
            TagEnd::Item => self.flush(),
            TagEnd::FootnoteDefinition => {
                self.flush();
                self.blank_line();
            }
            TagEnd::Table => {
                if let Some(table) = self.table.take() {
                    self.table_block(table);
                }
            }
            TagEnd::TableHead => {
                if let Some(table) = self.table.as_mut() {
                    let row = std::mem::take(&mut table.row);
                    table.rows.push(row);
                    table.header_rows = table.rows.len();
                }
            }
            TagEnd::TableRow => {
                if let Some(table) = self.table.as_mut() {
                    let row = std::mem::take(&mut table.row);
                    table.rows.push(row);
                }
            }
            TagEnd::TableCell => {
                if let Some(table) = self.table.as_mut() {
                    let cell = std::mem::take(&mut table.cell);
                    table.row.push(cell.trim().to_string());
                }
            }
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough | TagEnd::Image => {
                self.pop_style()
            }
            TagEnd::Link => {
                self.pop_style();
                if let Some((url, start)) = self.links.pop() {
                    if let Some(table) = self.table.as_mut() {
                        let text = table.cell.get(start..).unwrap_or("");
                        if text != url && !url.is_empty() {
                            table.cell.push_str(&format!(" <{}>", url));
                        }
                        return;
                    }
                    let text: String = self.current[start.min(self.current.len())..]
                        .iter()
                        .map(|s| s.content.as_ref())
                        .collect();
                    if text != url && !url.is_empty() {
                        self.current.push(Span::styled(
                            format!(" <{}>", url),
                            Style::default().fg(Color::DarkGray),
                        ));
                    }
                }
            }
            TagEnd::HtmlBlock | TagEnd::MetadataBlock(_) => {}
        }
    }

    fn code_block(&mut self, block: CodeBlock) {
        let source = block.source.strip_suffix('\n').unwrap_or(&block.source);
        let border = Style::default().fg(CODE_BORDER).bg(CODE_BG);

        let body = match &block.language {
            Some(language) => {
                let mut header = self.prefix();
                header.extend([
                    Span::styled(
                        format!(" {} ", language),
                        Style::default().fg(Color::Rgb(0xa1, 0xa1, 0xaa)).bg(CODE_HEADER_BG),
                    ),
                    Span::styled(
                        " ⧉ copy ",
                        Style::default().fg(Color::Rgb(0x71, 0x71, 0x7a)).bg(CODE_HEADER_BG),
                    ),
                ]);
                self.lines.push(Line::from(header));
                highlight::highlight_code(language, source)
            }
            None => highlight::plain_lines(source),
        };

        for line in body {
            // Keeps list indentation and quote bars around nested blocks
            let mut spans = self.prefix();
            spans.push(Span::styled("│ ", border));
            spans.extend(line.spans);
            self.lines.push(Line::from(spans));
        }
        self.blank_line();
    }

    fn table_block(&mut self, table: Table) {
        let columns = table.rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut widths = vec![0usize; columns];
        for row in &table.rows {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }

        let border = Style::default().fg(Color::DarkGray);
        for (r, row) in table.rows.iter().enumerate() {
            let cell_style = if r < table.header_rows {
                Style::default().add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            let mut spans = Vec::new();
            for (i, width) in widths.iter().enumerate() {
                if i > 0 {
                    spans.push(Span::styled(" │ ", border));
                }
                let cell = row.get(i).map(String::as_str).unwrap_or("");
                let pad = width.saturating_sub(cell.chars().count());
                spans.push(Span::styled(format!("{}{}", cell, " ".repeat(pad)), cell_style));
            }
            self.lines.push(Line::from(spans));

            if r + 1 == table.header_rows {
                let rule: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
                self.lines.push(Line::from(Span::styled(rule.join("─┼─"), border)));
            }
        }
        self.blank_line();
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.flush();
        while self.lines.last().is_some_and(|l| l.width() == 0) {
            self.lines.pop();
        }
        self.lines
    }
}

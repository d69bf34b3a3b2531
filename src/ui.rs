use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{
        Block, Borders, Clear, List, ListItem, Paragraph, Scrollbar, ScrollbarOrientation,
        ScrollbarState, Wrap,
    },
};
use crate::app::{App, Backend, FocusPane, InputMode};
use crate::markdown::render_markdown;
use crate::model::{ChatMessage, ChatRole, Mode};

/// Lines for one transcript entry: role label, body, source tags, spacer.
///
/// Assistant bodies are Markdown; user bodies are shown verbatim.
pub fn message_lines(message: &ChatMessage) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();

    match message.role {
        ChatRole::User => {
            lines.push(Line::from(Span::styled(
                "You:",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )));
            for line in message.content.split('\n') {
                lines.push(Line::from(line.to_string()));
            }
        }
        ChatRole::Assistant => {
            lines.push(Line::from(Span::styled(
                "AI:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            lines.extend(render_markdown(&message.content));
        }
    }

    if !message.sources.is_empty() {
        lines.push(Line::from(Span::styled(
            "─".repeat(24),
            Style::default().fg(Color::DarkGray),
        )));
        lines.push(Line::from(Span::styled(
            "Sources:",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::BOLD),
        )));
        let mut tags: Vec<Span<'static>> = Vec::new();
        for (i, source) in message.sources.iter().enumerate() {
            if i > 0 {
                tags.push(Span::raw(" "));
            }
            tags.push(Span::styled(
                format!("[{}]", source.source),
                Style::default().fg(Color::Gray).bg(Color::Rgb(0x18, 0x18, 0x1b)),
            ));
        }
        lines.push(Line::from(tags));
    }

    lines.push(Line::default());
    lines
}

/// Rows a block-less `paragraph` occupies at `width` columns, wrapped the
/// same way it will be drawn.
fn wrapped_height(paragraph: &Paragraph, width: u16) -> u16 {
    paragraph.line_count(width.max(1)).min(u16::MAX as usize) as u16
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    let [explorer_area, chat_area] = Layout::horizontal([
        Constraint::Percentage(33),
        Constraint::Percentage(67),
    ])
    .areas(body_area);

    render_explorer(app, frame, explorer_area);
    render_chat(app, frame, chat_area);
    render_footer(app, frame, footer_area);

    if app.alert.is_some() {
        render_alert(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let backend = match &app.backend {
        Backend::Unknown => Span::styled(" ○ connecting ", Style::default().fg(Color::Gray)),
        Backend::Online(status) => Span::styled(
            format!(" ● {} ", status.status),
            Style::default().fg(Color::Green),
        ),
        Backend::Unreachable => Span::styled(" ● backend unreachable ", Style::default().fg(Color::Red)),
    };

    let title = Line::from(vec![
        Span::styled(" Portable RAG ", Style::default().fg(Color::Cyan).bold()),
        backend,
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style) = match app.mode {
        Mode::Local => (" PRIVATE ", Style::default().bg(Color::Green).fg(Color::Black)),
        Mode::Cloud => (" TURBO ", Style::default().bg(Color::Rgb(0xf9, 0x73, 0x16)).fg(Color::Black)),
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut hints = vec![Span::styled(mode_text, mode_style)];
    let pairs: &[(&str, &str)] = match (app.input_mode, app.focus) {
        (InputMode::Editing, _) => &[(" Enter ", " send "), (" Esc ", " done ")],
        (InputMode::Normal, FocusPane::Explorer) => &[
            (" j/k ", " move "),
            (" Space ", " select "),
            (" Enter ", " open "),
            (" h ", " up "),
            (" a ", " analyze "),
            (" r ", " refresh "),
        ],
        (InputMode::Normal, _) => &[
            (" j/k ", " scroll "),
            (" G ", " latest "),
            (" i ", " ask "),
        ],
    };
    for (key, label) in pairs {
        hints.push(Span::styled(*key, key_style));
        hints.push(Span::styled(*label, label_style));
    }
    if app.input_mode == InputMode::Normal {
        for (key, label) in [(" Tab ", " focus "), (" m ", " mode "), (" q ", " quit ")] {
            hints.push(Span::styled(key, key_style));
            hints.push(Span::styled(label, label_style));
        }
    }

    let footer = Paragraph::new(Line::from(hints));
    frame.render_widget(footer, area);
}

fn render_explorer(app: &mut App, frame: &mut Frame, area: Rect) {
    let [crumb_area, list_area, action_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(4),
    ])
    .areas(area);

    app.explorer_area = Some(list_area);

    let crumb = Paragraph::new(Span::styled(
        format!(" {}", app.explorer.breadcrumb()),
        Style::default().fg(Color::Gray),
    ));
    frame.render_widget(crumb, crumb_area);

    let focused = app.focus == FocusPane::Explorer;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };
    let mut title = String::from(" Explorer ");
    if app.is_listing() {
        title.push_str("(loading) ");
    }
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    let items: Vec<ListItem> = app
        .explorer
        .entries()
        .iter()
        .map(|entry| {
            let icon_color = if entry.is_dir() {
                Color::Yellow
            } else if entry.icon() == "λ" {
                Color::Green
            } else {
                Color::Gray
            };
            let selected = app.explorer.is_selected(entry);
            let name_style = if selected {
                Style::default().fg(Color::LightBlue).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(Line::from(vec![
                Span::styled(if selected { "● " } else { "  " }, Style::default().fg(Color::LightBlue)),
                Span::styled(format!("{} ", entry.icon()), Style::default().fg(icon_color)),
                Span::styled(entry.name.clone(), name_style),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, list_area, &mut app.explorer.list_state);

    let button = if app.is_ingesting() {
        let spinner = ["◐", "◓", "◑"][app.animation_frame as usize % 3];
        Span::styled(
            format!(" {} Analyzing... ", spinner),
            Style::default().fg(Color::White).bg(Color::Blue),
        )
    } else if app.can_ingest() {
        Span::styled(" [a] Analyze selection ", Style::default().fg(Color::White).bg(Color::Blue).bold())
    } else {
        Span::styled(" [a] Analyze selection ", Style::default().fg(Color::Gray).bg(Color::DarkGray))
    };
    let selection = app
        .explorer
        .selected_path()
        .map(|p| format!(" {}", p))
        .unwrap_or_else(|| " nothing selected".to_string());
    let action = Paragraph::new(vec![
        Line::from(button),
        Line::from(Span::styled(selection, Style::default().fg(Color::LightBlue))),
        Line::from(Span::styled(
            " Select a folder or file to add it to the context.",
            Style::default().fg(Color::DarkGray),
        )),
    ])
    .wrap(Wrap { trim: false });
    frame.render_widget(action, action_area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let [engine_area, transcript_area, input_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(area);

    app.chat_area = Some(transcript_area);

    let dot_color = match app.mode {
        Mode::Local => Color::Green,
        Mode::Cloud => Color::Rgb(0xf9, 0x73, 0x16),
    };
    let engine = Paragraph::new(Line::from(vec![
        Span::styled(" ● ", Style::default().fg(dot_color)),
        Span::styled(app.mode.engine(), Style::default().fg(Color::Gray)),
        Span::styled(
            format!("  ({} mode)", app.mode.display_name()),
            Style::default().fg(Color::DarkGray),
        ),
    ]));
    frame.render_widget(engine, engine_area);

    let focused = app.focus == FocusPane::Chat;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Chat ");

    let mut lines = app.chat_lines.clone();
    if app.is_chatting() {
        lines.push(Line::from(Span::styled(
            "AI:",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Thinking{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    let inner_width = transcript_area.width.saturating_sub(2);
    app.chat_height = transcript_area.height.saturating_sub(2);
    let chat = Paragraph::new(Text::from(lines)).wrap(Wrap { trim: false });
    let total = wrapped_height(&chat, inner_width);
    let max_scroll = total.saturating_sub(app.chat_height);
    if app.follow_tail || app.chat_scroll > max_scroll {
        app.chat_scroll = max_scroll;
    }
    if app.chat_scroll >= max_scroll {
        app.follow_tail = true;
    }

    let chat = chat.block(block).scroll((app.chat_scroll, 0));
    frame.render_widget(chat, transcript_area);

    if max_scroll > 0 {
        let mut state = ScrollbarState::new(max_scroll as usize).position(app.chat_scroll as usize);
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight),
            transcript_area,
            &mut state,
        );
    }

    render_input(app, frame, input_area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let input_border_color = if editing { Color::Yellow } else { Color::DarkGray };
    let title = if app.is_chatting() {
        " Ask (waiting for answer) "
    } else {
        " Ask a question about your documents (i) "
    };
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(input_border_color))
        .title(title);

    // Inner width = total width - 2 (for borders)
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.input_cursor;

    // Calculate scroll offset to keep cursor visible
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app
        .input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);
    frame.render_widget(input, area);

    if editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_alert(app: &App, frame: &mut Frame, area: Rect) {
    let Some(message) = app.alert.as_deref() else {
        return;
    };

    let popup_width = 60.min(area.width.saturating_sub(4));
    let mut lines: Vec<Line> = message.split('\n').map(|l| Line::from(l.to_string())).collect();
    lines.push(Line::default());
    let popup = Paragraph::new(lines).wrap(Wrap { trim: false });
    let text_rows = wrapped_height(&popup, popup_width.saturating_sub(2));
    let popup_height = (text_rows + 4).min(area.height.saturating_sub(2));
    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;
    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title(" Error (Enter to dismiss) ");

    frame.render_widget(popup.block(block), popup_area);
}

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use crate::app::{App, FocusPane, InputMode};
use crate::tui::AppEvent;

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.tick_animation();
        }
    }
    app.poll_tasks().await;
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    // An open alert swallows keys until dismissed
    if app.alert.is_some() {
        if matches!(key.code, KeyCode::Enter | KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char(' ')) {
            app.alert = None;
        }
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        KeyCode::Tab | KeyCode::BackTab => {
            app.focus = match app.focus {
                FocusPane::Explorer => FocusPane::Chat,
                FocusPane::Chat | FocusPane::Input => FocusPane::Explorer,
            };
        }

        KeyCode::Char('i') | KeyCode::Char('/') => {
            app.focus = FocusPane::Input;
            app.input_mode = InputMode::Editing;
        }

        KeyCode::Char('m') => app.toggle_mode(),
        KeyCode::Char('a') => app.start_ingest(),
        KeyCode::Char('r') => app.refresh(),

        _ => match app.focus {
            FocusPane::Explorer => handle_explorer_keys(app, key),
            FocusPane::Chat | FocusPane::Input => handle_chat_keys(app, key),
        },
    }
}

fn handle_explorer_keys(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.explorer.next(),
        KeyCode::Char('k') | KeyCode::Up => app.explorer.previous(),
        KeyCode::Char('g') | KeyCode::Home => app.explorer.first(),
        KeyCode::Char('G') | KeyCode::End => app.explorer.last(),
        KeyCode::Char(' ') => app.explorer.select_cursor(),
        KeyCode::Enter | KeyCode::Char('l') | KeyCode::Right => app.open_cursor(),
        KeyCode::Char('h') | KeyCode::Left | KeyCode::Backspace => app.go_up(),
        _ => {}
    }
}

fn handle_chat_keys(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            let half = app.half_page();
            app.scroll_chat_down(half);
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            let half = app.half_page();
            app.scroll_chat_up(half);
        }
        KeyCode::Char('j') | KeyCode::Down => app.scroll_chat_down(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_chat_up(1),
        KeyCode::PageDown => app.scroll_chat_down(app.chat_height.max(1)),
        KeyCode::PageUp => app.scroll_chat_up(app.chat_height.max(1)),
        KeyCode::Char('g') | KeyCode::Home => app.scroll_chat_up(u16::MAX),
        KeyCode::Char('G') | KeyCode::End => app.scroll_chat_to_bottom(),
        KeyCode::Char('h') | KeyCode::Left => app.focus = FocusPane::Explorer,
        KeyCode::Enter => {
            app.focus = FocusPane::Input;
            app.input_mode = InputMode::Editing;
        }
        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
            app.focus = FocusPane::Chat;
        }
        KeyCode::Enter => {
            // Stay in the input while an answer is pending; the text is kept
            if app.can_send() {
                app.send_chat();
            }
        }
        KeyCode::Backspace => app.delete_before_cursor(),
        KeyCode::Delete => app.delete_at_cursor(),
        KeyCode::Left => app.cursor_left(),
        KeyCode::Right => app.cursor_right(),
        KeyCode::Home => app.cursor_home(),
        KeyCode::End => app.cursor_end(),
        KeyCode::Char('a') if key.modifiers.contains(KeyModifiers::CONTROL) => app.cursor_home(),
        KeyCode::Char('e') if key.modifiers.contains(KeyModifiers::CONTROL) => app.cursor_end(),
        KeyCode::Char(c) => app.insert_char(c),
        _ => {}
    }
}

fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

/// Row index in the explorer listing under the pointer, if any.
fn explorer_row(app: &App, x: u16, y: u16, area: Rect) -> Option<usize> {
    // Inside the border only
    let inner = Rect::new(
        area.x + 1,
        area.y + 1,
        area.width.saturating_sub(2),
        area.height.saturating_sub(2),
    );
    if !point_in_rect(x, y, inner) {
        return None;
    }
    let index = (y - inner.y) as usize + app.explorer.list_state.offset();
    (index < app.explorer.entries().len()).then_some(index)
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    if app.alert.is_some() {
        return;
    }

    let x = mouse.column;
    let y = mouse.row;

    let in_explorer = app.explorer_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);
    let in_chat = app.chat_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);

    match mouse.kind {
        MouseEventKind::ScrollDown => {
            if in_chat {
                app.scroll_chat_down(3);
            } else if in_explorer {
                app.explorer.next();
            }
        }
        MouseEventKind::ScrollUp => {
            if in_chat {
                app.scroll_chat_up(3);
            } else if in_explorer {
                app.explorer.previous();
            }
        }
        MouseEventKind::Down(MouseButton::Left) => {
            if in_explorer {
                app.focus = FocusPane::Explorer;
                app.input_mode = InputMode::Normal;
                let row = app.explorer_area.and_then(|area| explorer_row(app, x, y, area));
                if let Some(index) = row {
                    app.click_entry(index);
                }
            } else if in_chat {
                app.focus = FocusPane::Chat;
                app.input_mode = InputMode::Normal;
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::RagClient;
    use crate::model::{EntryKind, FileEntry, Mode};
    use crossterm::event::KeyEventState;

    fn key(code: KeyCode) -> AppEvent {
        AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn click(column: u16, row: u16) -> AppEvent {
        AppEvent::Mouse(MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column,
            row,
            modifiers: KeyModifiers::NONE,
        })
    }

    fn app_with_listing() -> App {
        let mut app = App::new(RagClient::new("http://localhost:1"), Mode::Local);
        app.explorer.apply_listing(
            "",
            vec![
                FileEntry { name: "docs".into(), kind: EntryKind::Directory, path: "docs".into() },
                FileEntry { name: "a.py".into(), kind: EntryKind::File, path: "a.py".into() },
                FileEntry { name: "b.txt".into(), kind: EntryKind::File, path: "b.txt".into() },
            ],
        );
        app
    }

    #[tokio::test]
    async fn test_typing_and_escape() {
        let mut app = app_with_listing();

        handle_event(&mut app, key(KeyCode::Char('i'))).await.unwrap();
        assert_eq!(app.input_mode, InputMode::Editing);
        for c in "hq".chars() {
            handle_event(&mut app, key(KeyCode::Char(c))).await.unwrap();
        }
        assert_eq!(app.input, "hq");
        assert!(!app.should_quit);

        handle_event(&mut app, key(KeyCode::Backspace)).await.unwrap();
        handle_event(&mut app, key(KeyCode::Esc)).await.unwrap();
        assert_eq!(app.input, "h");
        assert_eq!(app.input_mode, InputMode::Normal);
        assert_eq!(app.focus, FocusPane::Chat);
    }

    #[tokio::test]
    async fn test_space_selects_cursor_entry() {
        let mut app = app_with_listing();

        handle_event(&mut app, key(KeyCode::Char('j'))).await.unwrap();
        handle_event(&mut app, key(KeyCode::Char(' '))).await.unwrap();
        assert_eq!(app.explorer.selected_path(), Some("a.py"));

        // Opening a file only selects it
        handle_event(&mut app, key(KeyCode::Char('j'))).await.unwrap();
        handle_event(&mut app, key(KeyCode::Enter)).await.unwrap();
        assert_eq!(app.explorer.selected_path(), Some("b.txt"));
        assert_eq!(app.explorer.current_path(), "");

        // Going up from the root is a no-op
        handle_event(&mut app, key(KeyCode::Char('h'))).await.unwrap();
        assert_eq!(app.explorer.selected_path(), Some("b.txt"));
        assert!(!app.is_listing());
    }

    #[tokio::test]
    async fn test_alert_swallows_keys_until_dismissed() {
        let mut app = app_with_listing();
        app.alert = Some("boom".to_string());

        handle_event(&mut app, key(KeyCode::Char('j'))).await.unwrap();
        assert!(app.alert.is_some());
        assert_eq!(app.explorer.list_state.selected(), Some(0));

        handle_event(&mut app, key(KeyCode::Enter)).await.unwrap();
        assert!(app.alert.is_none());
        assert!(!app.should_quit);
    }

    #[tokio::test]
    async fn test_ctrl_c_quits_while_editing() {
        let mut app = app_with_listing();
        app.input_mode = InputMode::Editing;

        let event = KeyEvent {
            code: KeyCode::Char('c'),
            modifiers: KeyModifiers::CONTROL,
            kind: crossterm::event::KeyEventKind::Press,
            state: KeyEventState::NONE,
        };
        handle_event(&mut app, AppEvent::Key(event)).await.unwrap();
        assert!(app.should_quit);
        assert!(app.input.is_empty());
    }

    #[tokio::test]
    async fn test_click_hits_listing_row() {
        let mut app = app_with_listing();
        app.explorer_area = Some(Rect::new(0, 2, 30, 10));
        app.focus = FocusPane::Chat;

        // Border row selects nothing
        handle_event(&mut app, click(5, 2)).await.unwrap();
        assert_eq!(app.focus, FocusPane::Explorer);
        assert_eq!(app.explorer.selected_path(), None);

        handle_event(&mut app, click(5, 4)).await.unwrap();
        assert_eq!(app.explorer.selected_path(), Some("a.py"));

        // Below the last entry
        handle_event(&mut app, click(5, 9)).await.unwrap();
        assert_eq!(app.explorer.selected_path(), Some("a.py"));
    }

    #[tokio::test]
    async fn test_tab_cycles_focus() {
        let mut app = app_with_listing();
        assert_eq!(app.focus, FocusPane::Explorer);
        handle_event(&mut app, key(KeyCode::Tab)).await.unwrap();
        assert_eq!(app.focus, FocusPane::Chat);
        handle_event(&mut app, key(KeyCode::Tab)).await.unwrap();
        assert_eq!(app.focus, FocusPane::Explorer);
    }
}

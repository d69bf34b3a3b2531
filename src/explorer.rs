//! Directory navigation over the backend's mounted file tree.
//!
//! The explorer never performs IO itself. Transitions that change the
//! current path hand back a [`Fetch`] command which the caller dispatches to
//! the API client; the reply comes back through [`Explorer::apply_listing`].

use ratatui::widgets::ListState;

use crate::model::FileEntry;

/// Request to (re)load the listing of `path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetch {
    pub path: String,
}

#[derive(Debug, Default)]
pub struct Explorer {
    current_path: String,
    selected_path: Option<String>,
    entries: Vec<FileEntry>,
    /// Path `entries` were listed for; lags `current_path` while a fetch is pending.
    listing_path: Option<String>,
    /// Cursor over `entries`, separate from the selection.
    pub list_state: ListState,
}

impl Explorer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Command for the initial listing of the root.
    pub fn mount(&self) -> Fetch {
        self.refresh()
    }

    pub fn refresh(&self) -> Fetch {
        Fetch {
            path: self.current_path.clone(),
        }
    }

    pub fn current_path(&self) -> &str {
        &self.current_path
    }

    pub fn selected_path(&self) -> Option<&str> {
        self.selected_path.as_deref()
    }

    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    /// True once the displayed entries belong to `current_path`.
    ///
    /// Until then the previous listing stays on screen but cannot be acted on.
    pub fn is_listing_current(&self) -> bool {
        self.listing_path.as_deref() == Some(self.current_path.as_str())
    }

    pub fn is_root(&self) -> bool {
        self.current_path.is_empty()
    }

    pub fn breadcrumb(&self) -> String {
        format!("ROOT/{}", self.current_path)
    }

    pub fn enter(&mut self, name: &str) -> Fetch {
        self.current_path = if self.current_path.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.current_path, name)
        };
        self.selected_path = None;
        tracing::debug!(path = %self.current_path, "enter directory");
        self.refresh()
    }

    pub fn go_up(&mut self) -> Option<Fetch> {
        if self.is_root() {
            return None;
        }
        match self.current_path.rfind('/') {
            Some(idx) => self.current_path.truncate(idx),
            None => self.current_path.clear(),
        }
        self.selected_path = None;
        tracing::debug!(path = %self.current_path, "go up");
        Some(self.refresh())
    }

    /// Select an entry of the current listing. Ignored while the listing is stale.
    pub fn select(&mut self, entry: &FileEntry) {
        if !self.is_listing_current() || !self.entries.iter().any(|e| e.path == entry.path) {
            return;
        }
        self.selected_path = Some(entry.path.clone());
    }

    /// Replace the listing if it belongs to the current path.
    ///
    /// Returns false when the reply is for a path the user already left.
    pub fn apply_listing(&mut self, path: &str, entries: Vec<FileEntry>) -> bool {
        if path != self.current_path {
            tracing::debug!(%path, current = %self.current_path, "dropping stale listing");
            return false;
        }
        self.entries = entries;
        self.listing_path = Some(path.to_string());
        if let Some(selected) = &self.selected_path {
            if !self.entries.iter().any(|e| &e.path == selected) {
                self.selected_path = None;
            }
        }
        let cursor = if self.entries.is_empty() {
            None
        } else {
            Some(self.list_state.selected().unwrap_or(0).min(self.entries.len() - 1))
        };
        self.list_state.select(cursor);
        true
    }

    // Cursor movement

    pub fn cursor_entry(&self) -> Option<&FileEntry> {
        self.list_state.selected().and_then(|i| self.entries.get(i))
    }

    pub fn next(&mut self) {
        let len = self.entries.len();
        if len > 0 {
            let i = self.list_state.selected().map_or(0, |i| (i + 1).min(len - 1));
            self.list_state.select(Some(i));
        }
    }

    pub fn previous(&mut self) {
        if !self.entries.is_empty() {
            let i = self.list_state.selected().unwrap_or(0).saturating_sub(1);
            self.list_state.select(Some(i));
        }
    }

    pub fn first(&mut self) {
        if !self.entries.is_empty() {
            self.list_state.select(Some(0));
        }
    }

    pub fn last(&mut self) {
        if !self.entries.is_empty() {
            self.list_state.select(Some(self.entries.len() - 1));
        }
    }

    pub fn select_cursor(&mut self) {
        if let Some(entry) = self.cursor_entry().cloned() {
            self.select(&entry);
        }
    }

    /// Enter the entry under the cursor if it is a directory.
    pub fn open_cursor(&mut self) -> Option<Fetch> {
        if !self.is_listing_current() {
            return None;
        }
        let entry = self.cursor_entry()?.clone();
        if !entry.is_dir() {
            return None;
        }
        self.list_state.select(Some(0));
        Some(self.enter(&entry.name))
    }

    pub fn is_selected(&self, entry: &FileEntry) -> bool {
        self.selected_path.as_deref() == Some(entry.path.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntryKind;

    fn root_listing() -> Vec<FileEntry> {
        vec![
            FileEntry {
                name: "docs".to_string(),
                kind: EntryKind::Directory,
                path: "docs".to_string(),
            },
            FileEntry {
                name: "readme.md".to_string(),
                kind: EntryKind::File,
                path: "readme.md".to_string(),
            },
        ]
    }

    #[test]
    fn test_initial_state_fetches_root() {
        let explorer = Explorer::new();
        assert_eq!(explorer.current_path(), "");
        assert_eq!(explorer.selected_path(), None);
        assert_eq!(explorer.mount(), Fetch { path: String::new() });
        assert_eq!(explorer.breadcrumb(), "ROOT/");
    }

    #[test]
    fn test_enter_and_go_up_track_joined_path() {
        let mut explorer = Explorer::new();
        assert_eq!(explorer.enter("a").path, "a");
        assert_eq!(explorer.enter("b").path, "a/b");
        assert_eq!(explorer.enter("c").path, "a/b/c");
        assert_eq!(explorer.breadcrumb(), "ROOT/a/b/c");

        assert_eq!(explorer.go_up().map(|f| f.path), Some("a/b".to_string()));
        assert_eq!(explorer.go_up().map(|f| f.path), Some("a".to_string()));
        assert_eq!(explorer.go_up().map(|f| f.path), Some(String::new()));
        assert_eq!(explorer.go_up(), None);
        assert_eq!(explorer.current_path(), "");
    }

    #[test]
    fn test_select_does_not_navigate() {
        let mut explorer = Explorer::new();
        explorer.apply_listing("", root_listing());

        let readme = explorer.entries()[1].clone();
        explorer.select(&readme);
        assert_eq!(explorer.selected_path(), Some("readme.md"));
        assert_eq!(explorer.current_path(), "");

        // Directories are selectable as a whole without descending.
        let docs = explorer.entries()[0].clone();
        explorer.select(&docs);
        assert_eq!(explorer.selected_path(), Some("docs"));
        assert_eq!(explorer.current_path(), "");
    }

    #[test]
    fn test_path_change_clears_selection() {
        let mut explorer = Explorer::new();
        explorer.apply_listing("", root_listing());
        explorer.select_cursor();
        assert_eq!(explorer.selected_path(), Some("docs"));

        let fetch = explorer.open_cursor();
        assert_eq!(fetch, Some(Fetch { path: "docs".to_string() }));
        assert_eq!(explorer.current_path(), "docs");
        assert_eq!(explorer.selected_path(), None);

        let child = FileEntry {
            name: "x".to_string(),
            kind: EntryKind::File,
            path: "docs/x".to_string(),
        };
        explorer.apply_listing("docs", vec![child.clone()]);
        explorer.select(&child);
        assert_eq!(explorer.selected_path(), Some("docs/x"));
        explorer.go_up();
        assert_eq!(explorer.selected_path(), None);
    }

    #[test]
    fn test_open_cursor_ignores_files() {
        let mut explorer = Explorer::new();
        explorer.apply_listing("", root_listing());
        explorer.last();
        assert_eq!(explorer.open_cursor(), None);
        assert_eq!(explorer.current_path(), "");
    }

    #[test]
    fn test_stale_listing_is_dropped() {
        let mut explorer = Explorer::new();
        explorer.apply_listing("", root_listing());
        explorer.enter("docs");

        assert!(!explorer.apply_listing("", vec![]));
        assert_eq!(explorer.entries().len(), 2);

        assert!(explorer.apply_listing("docs", vec![]));
        assert!(explorer.entries().is_empty());
        assert_eq!(explorer.list_state.selected(), None);
    }

    #[test]
    fn test_refresh_drops_selection_of_vanished_entry() {
        let mut explorer = Explorer::new();
        explorer.apply_listing("", root_listing());
        explorer.last();
        explorer.select_cursor();
        assert_eq!(explorer.selected_path(), Some("readme.md"));

        explorer.apply_listing("", root_listing());
        assert_eq!(explorer.selected_path(), Some("readme.md"));

        explorer.apply_listing("", root_listing()[..1].to_vec());
        assert_eq!(explorer.selected_path(), None);
        assert_eq!(explorer.list_state.selected(), Some(0));
    }

    #[test]
    fn test_second_open_before_reply_is_ignored() {
        let mut explorer = Explorer::new();
        explorer.apply_listing("", root_listing());
        assert!(explorer.is_listing_current());

        assert_eq!(explorer.open_cursor(), Some(Fetch { path: "docs".to_string() }));
        assert!(!explorer.is_listing_current());
        assert_eq!(explorer.open_cursor(), None);
        assert_eq!(explorer.current_path(), "docs");

        // The parent's rows stay visible but cannot be selected
        assert_eq!(explorer.entries().len(), 2);
        explorer.last();
        explorer.select_cursor();
        let readme = explorer.entries()[1].clone();
        explorer.select(&readme);
        assert_eq!(explorer.selected_path(), None);

        explorer.apply_listing("docs", vec![]);
        assert!(explorer.is_listing_current());
    }

    #[test]
    fn test_select_requires_listed_entry() {
        let mut explorer = Explorer::new();
        let readme = root_listing()[1].clone();
        explorer.select(&readme);
        assert_eq!(explorer.selected_path(), None);

        explorer.apply_listing("", root_listing()[..1].to_vec());
        explorer.select(&readme);
        assert_eq!(explorer.selected_path(), None);
    }

    #[test]
    fn test_cursor_movement_is_clamped() {
        let mut explorer = Explorer::new();
        explorer.previous();
        assert_eq!(explorer.list_state.selected(), None);

        explorer.apply_listing("", root_listing());
        explorer.next();
        explorer.next();
        assert_eq!(explorer.list_state.selected(), Some(1));
        explorer.previous();
        explorer.previous();
        assert_eq!(explorer.list_state.selected(), Some(0));
    }
}

//! Wire and transcript types shared by the API client and the UI.
//!
//! Nothing in here depends on ratatui; the same values are printed by the
//! non-interactive subcommands.

use serde::{Deserialize, Serialize};

/// Kind of a listed entry, as reported by `/api/browse`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Directory,
    File,
}

/// One child of the browsed directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub path: String,
}

impl FileEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn icon(&self) -> &'static str {
        if self.is_dir() {
            return "▸";
        }
        let ext = self
            .name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "py" | "rs" | "js" | "ts" | "jsx" | "tsx" | "sh" | "go" | "java" | "c" | "cpp"
            | "h" | "rb" => "λ",
            _ => "·",
        }
    }
}

/// A retrieved document cited by an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub source: String,
    pub path: String,
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// A chat message in the transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Source>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            sources: Vec::new(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            sources: Vec::new(),
        }
    }

    pub fn with_sources(mut self, sources: Vec<Source>) -> Self {
        self.sources = sources;
        self
    }
}

/// Which backend inference profile answers a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Local,
    Cloud,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Local => "local",
            Mode::Cloud => "cloud",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "local" => Some(Mode::Local),
            "cloud" => Some(Mode::Cloud),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Mode::Local => Mode::Cloud,
            Mode::Cloud => Mode::Local,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Mode::Local => "Private",
            Mode::Cloud => "Turbo",
        }
    }

    pub fn engine(&self) -> &'static str {
        match self {
            Mode::Local => "Engine: Mistral (local CPU)",
            Mode::Cloud => "Engine: Llama3-70b (Groq cloud)",
        }
    }
}

/// How many fragments an ingestion reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkCount {
    Known(u64),
    Unknown,
}

impl std::fmt::Display for ChunkCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChunkCount::Known(n) => write!(f, "{}", n),
            ChunkCount::Unknown => f.write_str("several"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub count: ChunkCount,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatReply {
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<Source>,
}

/// Health of the backend (`GET /`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BackendStatus {
    pub status: String,
    #[serde(default)]
    pub system: String,
}

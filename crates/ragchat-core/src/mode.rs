use serde::{Deserialize, Serialize};

/// Query mode; selects which chat endpoint the next send goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Mode {
    #[default]
    Chat,
    Architecture,
    CodeReview,
}

struct ModeInfo {
    key: &'static str,
    endpoint: &'static str,
    display_name: &'static str,
}

// Indexed by `Mode as usize`; keep in declaration order.
const MODES: [ModeInfo; 3] = [
    ModeInfo { key: "chat", endpoint: "/api/chat", display_name: "Chat" },
    ModeInfo { key: "architecture", endpoint: "/api/chat/explain-architecture", display_name: "Explain Architecture" },
    ModeInfo { key: "codeReview", endpoint: "/api/chat/code-review", display_name: "Code Review" },
];

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Chat, Mode::Architecture, Mode::CodeReview];

    fn info(self) -> &'static ModeInfo {
        &MODES[self as usize]
    }

    pub fn endpoint(self) -> &'static str {
        self.info().endpoint
    }

    pub fn as_str(self) -> &'static str {
        self.info().key
    }

    pub fn display_name(self) -> &'static str {
        self.info().display_name
    }

    /// Accepts the wire key in any case, with or without `-`/`_` separators
    /// (`codeReview`, `code-review`, `CODE_REVIEW`).
    pub fn from_str(s: &str) -> Option<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_lowercase();
        Mode::ALL
            .into_iter()
            .find(|m| m.as_str().to_lowercase() == normalized)
    }

    /// The mode after this one, wrapping around.
    pub fn next(self) -> Self {
        Mode::ALL[(self as usize + 1) % Mode::ALL.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints() {
        assert_eq!(Mode::Chat.endpoint(), "/api/chat");
        assert_eq!(Mode::Architecture.endpoint(), "/api/chat/explain-architecture");
        assert_eq!(Mode::CodeReview.endpoint(), "/api/chat/code-review");
    }

    #[test]
    fn test_table_matches_declaration_order() {
        for (i, mode) in Mode::ALL.iter().enumerate() {
            assert_eq!(*mode as usize, i);
        }
        assert_eq!(MODES.len(), Mode::ALL.len());
    }

    #[test]
    fn test_from_str_aliases() {
        assert_eq!(Mode::from_str("chat"), Some(Mode::Chat));
        assert_eq!(Mode::from_str("Architecture"), Some(Mode::Architecture));
        assert_eq!(Mode::from_str("codeReview"), Some(Mode::CodeReview));
        assert_eq!(Mode::from_str("code-review"), Some(Mode::CodeReview));
        assert_eq!(Mode::from_str("CODE_REVIEW"), Some(Mode::CodeReview));
        assert_eq!(Mode::from_str("summarize"), None);
    }

    #[test]
    fn test_next_cycles() {
        assert_eq!(Mode::Chat.next(), Mode::Architecture);
        assert_eq!(Mode::Architecture.next(), Mode::CodeReview);
        assert_eq!(Mode::CodeReview.next(), Mode::Chat);
    }

    #[test]
    fn test_serde_uses_wire_keys() {
        assert_eq!(serde_json::to_string(&Mode::CodeReview).unwrap(), "\"codeReview\"");
        let mode: Mode = serde_json::from_str("\"architecture\"").unwrap();
        assert_eq!(mode, Mode::Architecture);
    }
}

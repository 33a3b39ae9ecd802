pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// A model id offered to the user, with a one-line note on when to pick it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelInfo {
    pub id: &'static str,
    pub note: &'static str,
}

pub const OPENAI_MODELS: &[ModelInfo] = &[
    ModelInfo {
        id: "gpt-4o-mini",
        note: "fast and cheap, fine for summaries",
    },
    ModelInfo {
        id: "gpt-4o",
        note: "better refactors on larger files",
    },
    ModelInfo {
        id: "gpt-4.1",
        note: "strongest code edits",
    },
    ModelInfo {
        id: "gpt-4.1-mini",
        note: "cheap with a long context window",
    },
    ModelInfo {
        id: "o3",
        note: "slow, for tricky reasoning",
    },
];

/// Known models whose id starts with `query`, ignoring case. A blank query lists all.
pub fn suggest_models(query: &str) -> Vec<ModelInfo> {
    let query = query.trim().to_lowercase();
    OPENAI_MODELS
        .iter()
        .filter(|model| model.id.starts_with(&query))
        .copied()
        .collect()
}

pub fn is_known_model(model_id: &str) -> bool {
    OPENAI_MODELS.iter().any(|model| model.id == model_id.trim())
}

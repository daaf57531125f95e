//! Personality settings and their closed-vocabulary prompt clauses (§4.6,
//! §9 Glossary: "a closed set of categorical levers ... translated to
//! fixed prompt clauses").

use serde_json::Value as Json;

const BASE_SYSTEM_PROMPT: &str = "You are a private, local-first AI assistant. Everything you know about the user stays on their device. Be informative, relevant, and easy to talk to.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Style {
    #[default]
    Helpful,
    Professional,
    Friendly,
    Concise,
    Detailed,
}

impl Style {
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "professional" => Self::Professional,
            "friendly" => Self::Friendly,
            "concise" => Self::Concise,
            "detailed" => Self::Detailed,
            _ => Self::Helpful,
        }
    }

    #[must_use]
    pub const fn clause(self) -> &'static str {
        match self {
            Self::Helpful => "Focus on giving accurate, useful answers.",
            Self::Professional => "Keep a formal tone focused on accuracy and efficiency.",
            Self::Friendly => "Keep things conversational and build rapport while staying helpful.",
            Self::Concise => "Favor brief, to-the-point answers.",
            Self::Detailed => "Favor comprehensive, thorough answers.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Formality {
    Casual,
    #[default]
    Neutral,
    Formal,
}

impl Formality {
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "casual" => Self::Casual,
            "formal" => Self::Formal,
            _ => Self::Neutral,
        }
    }

    #[must_use]
    pub const fn clause(self) -> &'static str {
        match self {
            Self::Casual => "Use a relaxed, casual tone.",
            Self::Neutral => "Use a balanced tone, neither too formal nor too casual.",
            Self::Formal => "Use a formal tone with professional phrasing.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    Minimal,
    #[default]
    Balanced,
    Detailed,
}

impl Verbosity {
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "minimal" => Self::Minimal,
            "detailed" => Self::Detailed,
            _ => Self::Balanced,
        }
    }

    #[must_use]
    pub const fn clause(self) -> &'static str {
        match self {
            Self::Minimal => "Keep responses brief and to the point.",
            Self::Balanced => "Balance brevity and thoroughness in responses.",
            Self::Detailed => "Thoroughly address every aspect of the query.",
        }
    }
}

/// The shared five-level scale `empathy`/`humor`/`creativity` each use;
/// the clause text differs per category even at the same level, so each
/// category gets its own accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Level {
    #[default]
    None,
    Minimal,
    Light,
    Medium,
    High,
}

impl Level {
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "minimal" => Self::Minimal,
            "light" => Self::Light,
            "medium" => Self::Medium,
            "high" => Self::High,
            _ => Self::None,
        }
    }

    #[must_use]
    pub const fn is_none(self) -> bool {
        matches!(self, Self::None)
    }

    #[must_use]
    pub const fn empathy_clause(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Minimal => "Show basic understanding of the user's feelings when it's relevant.",
            Self::Light => "Be somewhat empathetic toward the user's situation.",
            Self::Medium => "Show clear empathy and understanding of the user's perspective.",
            Self::High => "Prioritize emotional intelligence and deep empathy in responses.",
        }
    }

    #[must_use]
    pub const fn humor_clause(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Minimal => "Occasionally use mild humor when it fits.",
            Self::Light => "Incorporate light humor when it fits naturally.",
            Self::Medium => "Be moderately humorous and conversational.",
            Self::High => "Use humor often to keep the conversation engaging.",
        }
    }

    #[must_use]
    pub const fn creativity_clause(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Minimal => "Stick close to factual information with minimal embellishment.",
            Self::Light => "Add a touch of creative framing where it helps.",
            Self::Medium => "Balance factual information with creative expression.",
            Self::High => "Emphasize creative and original thinking.",
        }
    }
}

/// The six-lever personality configuration §4.6/§3.1's `default_personality`
/// JSON shape is parsed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PersonalitySettings {
    pub style: Style,
    pub formality: Formality,
    pub verbosity: Verbosity,
    pub empathy: Level,
    pub humor: Level,
    pub creativity: Level,
}

impl PersonalitySettings {
    /// Reads the `{style, formality, verbosity, empathy, humor,
    /// creativity}` keys out of a settings JSON blob (§3.1's
    /// `default_personality()` shape), falling back to the default level
    /// for any key that is absent or holds an unrecognized value — mirrors
    /// the source's `dict.get(key, default)` tolerance rather than failing
    /// the whole assembly over one bad setting.
    #[must_use]
    pub fn from_json(value: &Json) -> Self {
        let get = |key: &str| value.get(key).and_then(Json::as_str);
        Self {
            style: get("style").map_or_else(Style::default, Style::parse),
            formality: get("formality").map_or_else(Formality::default, Formality::parse),
            verbosity: get("verbosity").map_or_else(Verbosity::default, Verbosity::parse),
            empathy: get("empathy").map_or_else(Level::default, Level::parse),
            humor: get("humor").map_or_else(Level::default, Level::parse),
            creativity: get("creativity").map_or_else(Level::default, Level::parse),
        }
    }
}

/// Deterministic concatenation of base prompt, the three mandatory
/// personality clauses, any non-"none" optional clauses, and the
/// (already-formatted) context block (§4.6).
#[must_use]
pub fn build_system_prompt(personality: PersonalitySettings, context: Option<&str>) -> String {
    let mut parts = vec![BASE_SYSTEM_PROMPT.to_string()];
    parts.push(personality.style.clause().to_string());
    parts.push(personality.formality.clause().to_string());
    parts.push(personality.verbosity.clause().to_string());
    if !personality.empathy.is_none() {
        parts.push(personality.empathy.empathy_clause().to_string());
    }
    if !personality.humor.is_none() {
        parts.push(personality.humor.humor_clause().to_string());
    }
    if !personality.creativity.is_none() {
        parts.push(personality.creativity.creativity_clause().to_string());
    }
    if let Some(context) = context {
        if !context.is_empty() {
            parts.push(context.to_string());
        }
    }
    parts.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_personality_values_fall_back_to_defaults() {
        let settings = PersonalitySettings::from_json(&serde_json::json!({"style": "grumpy"}));
        assert_eq!(settings.style, Style::Helpful);
    }

    #[test]
    fn none_level_clauses_are_omitted_from_the_system_prompt() {
        let settings = PersonalitySettings::default();
        let prompt = build_system_prompt(settings, None);
        assert!(!prompt.contains("empathy"));
        assert!(!prompt.is_empty());
    }

    #[test]
    fn non_none_optional_clauses_are_included() {
        let settings = PersonalitySettings { humor: Level::High, ..PersonalitySettings::default() };
        let prompt = build_system_prompt(settings, None);
        assert!(prompt.contains("engaging"));
    }

    #[test]
    fn context_block_is_appended_last_when_present() {
        let settings = PersonalitySettings::default();
        let prompt = build_system_prompt(settings, Some("here is context"));
        assert!(prompt.trim_end().ends_with("here is context"));
    }

    #[test]
    fn from_json_reads_every_lever() {
        let settings = PersonalitySettings::from_json(&serde_json::json!({
            "style": "concise",
            "formality": "formal",
            "verbosity": "detailed",
            "empathy": "medium",
            "humor": "light",
            "creativity": "high",
        }));
        assert_eq!(settings.style, Style::Concise);
        assert_eq!(settings.formality, Formality::Formal);
        assert_eq!(settings.verbosity, Verbosity::Detailed);
        assert_eq!(settings.empathy, Level::Medium);
        assert_eq!(settings.humor, Level::Light);
        assert_eq!(settings.creativity, Level::High);
    }
}

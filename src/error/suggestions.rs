//! Fix suggestion database for genpool errors.
//!
//! Provides actionable fix suggestions mapped to specific error types,
//! including commands, context explanations, and prevention tips.

// =============================================================================
// Fix Suggestion Types
// =============================================================================

/// A fix suggestion for an error.
///
/// Contains actionable information to help users resolve errors.
#[derive(Debug, Clone)]
pub struct FixSuggestion {
    /// Primary fix commands in order of preference.
    /// These should be copy-paste ready for the terminal.
    pub commands: Vec<String>,

    /// Explanation of why this error occurred.
    pub context: String,

    /// Tips to prevent this error in the future.
    pub prevention: Option<String>,
}

impl FixSuggestion {
    /// Creates a new fix suggestion with required fields.
    #[must_use]
    pub fn new(commands: Vec<String>, context: impl Into<String>) -> Self {
        Self {
            commands,
            context: context.into(),
            prevention: None,
        }
    }

    /// Builder: adds prevention tips.
    #[must_use]
    pub fn with_prevention(mut self, prevention: impl Into<String>) -> Self {
        self.prevention = Some(prevention.into());
        self
    }
}

// =============================================================================
// Suggestion Generators
// =============================================================================

/// Generates fix suggestions for config parse errors.
#[must_use]
pub fn config_parse_suggestions(path: &str, message: &str) -> Vec<FixSuggestion> {
    vec![
        FixSuggestion::new(
            vec![format!("$EDITOR {path}"), "genpool keys".to_string()],
            format!("The config file has a syntax error. The TOML parser reported: {message}"),
        )
        .with_prevention(
            "Run `genpool keys` after editing the config; it loads every provider \
             and reports problems without generating anything.",
        ),
    ]
}

/// Generates fix suggestions for invalid config value errors.
#[must_use]
pub fn config_invalid_suggestions(key: &str, value: &str, message: &str) -> Vec<FixSuggestion> {
    vec![FixSuggestion::new(
        vec![format!("# set {key} to a valid value in the config file")],
        format!("Invalid config value for '{key}': '{value}'. {message}"),
    )]
}

/// Generates fix suggestions for unparseable batch files.
#[must_use]
pub fn batch_parse_suggestions(path: &str, message: &str) -> Vec<FixSuggestion> {
    vec![
        FixSuggestion::new(
            vec![format!("$EDITOR {path}")],
            format!("The batch file could not be parsed: {message}"),
        )
        .with_prevention(
            "A batch file is a JSON array of objects with `id` and `payload` fields; \
             `targets` and `fallbacks` are optional.",
        ),
    ]
}

/// Generates fix suggestions when a credential source cannot be read.
#[must_use]
pub fn credential_source_suggestions(provider: &str, reason: &str) -> Vec<FixSuggestion> {
    vec![FixSuggestion::new(
        vec![
            format!("genpool keys --provider {provider}"),
            "# check the `credentials` entry of the provider in the config".to_string(),
        ],
        format!("Credentials for {provider} could not be loaded: {reason}"),
    )]
}

/// Generates fix suggestions when a credential source yields nothing.
#[must_use]
pub fn no_credentials_suggestions(provider: &str) -> Vec<FixSuggestion> {
    vec![
        FixSuggestion::new(
            vec![format!("genpool keys --provider {provider}")],
            format!(
                "The credential source for {provider} was read but contained no usable \
                 credentials. Directory sources only pick up strings matching the \
                 configured pattern."
            ),
        )
        .with_prevention("Keep one credential per line; duplicates are dropped."),
    ]
}

/// Generates fix suggestions for unknown provider names.
#[must_use]
pub fn unknown_provider_suggestions(name: &str) -> Vec<FixSuggestion> {
    vec![FixSuggestion::new(
        vec!["genpool keys".to_string()],
        format!("No provider named '{name}' is configured. `genpool keys` lists the known ones."),
    )]
}

/// Generates fix suggestions for batches with failed units.
#[must_use]
pub fn batch_incomplete_suggestions(failed: usize) -> Vec<FixSuggestion> {
    vec![
        FixSuggestion::new(
            vec![
                "genpool keys".to_string(),
                "genpool run --batch <file>".to_string(),
            ],
            format!(
                "{failed} work unit(s) exhausted every credential and target. Re-running \
                 skips units whose artifacts already exist."
            ),
        )
        .with_prevention(
            "Add more credentials or configure a fallback provider for units that hit \
             content policy rejections.",
        ),
    ]
}

// =============================================================================
// Tests
// =============================================================================

use std::env;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Language drawn from when the caller does not pick one.
    pub default_language: String,
    /// Minimum number of player assignments a session needs.
    pub min_session_players: usize,
    /// Cap on concurrent word range reads per sample.
    pub max_parallel_word_fetches: usize,
    /// When true, session status may only move setup -> active -> finished.
    pub enforce_status_transitions: bool,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self {
            default_language: env::var("WORDS_LANGUAGE").unwrap_or_else(|_| "en".to_string()),
            min_session_players: env::var("MIN_SESSION_PLAYERS")
                .unwrap_or_else(|_| "2".to_string())
                .parse()
                .expect("Invalid MIN_SESSION_PLAYERS"),
            max_parallel_word_fetches: env::var("MAX_PARALLEL_WORD_FETCHES")
                .unwrap_or_else(|_| "4".to_string())
                .parse()
                .expect("Invalid MAX_PARALLEL_WORD_FETCHES"),
            enforce_status_transitions: env::var("SESSION_ENFORCE_TRANSITIONS")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .expect("Invalid SESSION_ENFORCE_TRANSITIONS"),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

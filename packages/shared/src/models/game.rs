use serde::{Deserialize, Serialize};

/// Games a challenge can be issued for when nothing else is configured.
pub const DEFAULT_SUPPORTED_GAMES: [&str; 4] = [
    "Littoral Commander",
    "Battlegroup Clash Baltics",
    "Down Range",
    "Take That Street",
];

/// The fixed set of board games players may challenge each other to.
/// Matching is exact, so "down range" is not "Down Range".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SupportedGames {
    games: Vec<String>,
}

impl SupportedGames {
    /// Builds the set from configured names, dropping blanks and repeats
    /// while keeping the configured order.
    pub fn new<I, S>(games: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut unique: Vec<String> = Vec::new();
        for game in games {
            let name = game.as_ref().trim();
            if !name.is_empty() && !unique.iter().any(|g| g == name) {
                unique.push(name.to_string());
            }
        }
        SupportedGames { games: unique }
    }

    /// Parses a comma-separated list such as `"Down Range, Take That Street"`.
    pub fn from_csv(value: &str) -> Self {
        Self::new(value.split(','))
    }

    pub fn contains(&self, game: &str) -> bool {
        self.games.iter().any(|g| g == game)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.games
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }
}

impl Default for SupportedGames {
    fn default() -> Self {
        Self::new(DEFAULT_SUPPORTED_GAMES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_games() {
        let games = SupportedGames::default();

        assert_eq!(games.as_slice().len(), 4);
        assert!(games.contains("Littoral Commander"));
        assert!(games.contains("Take That Street"));
    }

    #[test]
    fn test_matching_is_exact() {
        let games = SupportedGames::default();

        assert!(!games.contains("down range"));
        assert!(!games.contains(" Down Range"));
        assert!(!games.contains("Chess"));
    }

    #[test]
    fn test_from_csv_trims_and_dedups() {
        let games = SupportedGames::from_csv(" Down Range ,, Chess,Down Range, ");

        assert_eq!(games.as_slice(), &["Down Range".to_string(), "Chess".to_string()]);
    }

    #[test]
    fn test_serializes_as_plain_list() {
        let games = SupportedGames::new(["Go", "Chess"]);

        let serialized = serde_json::to_string(&games).unwrap();
        assert_eq!(serialized, r#"["Go","Chess"]"#);
    }
}

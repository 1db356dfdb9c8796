//! Process configuration: TOML file with env overrides.
//!
//! Every field has a default so an empty file (or no file at all) yields
//! a runnable local-mode server. `HALLI_PORT`, `HALLI_USE_DATABASE`, and
//! `HALLI_DATABASE_URL` override the file, which is what container
//! deployments want.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use halli_room::{GameRules, RoomDefaults, Tempo};

use crate::ServerError;

fn default_port() -> u16 {
    8080
}

fn default_database_url() -> String {
    // `mode=rwc` creates the file on first run.
    "sqlite:halli.db?mode=rwc".into()
}

fn default_starting_cards() -> u32 {
    5
}

fn default_game_time_limit() -> u64 {
    120
}

fn default_emotion_cooldown() -> u64 {
    1
}

fn default_max_rooms() -> usize {
    6
}

fn default_room_name() -> String {
    "Halli Galli".into()
}

fn default_max_players() -> u8 {
    4
}

fn default_min_players_bound() -> u8 {
    2
}

fn default_max_players_bound() -> u8 {
    8
}

fn default_fruit_variation() -> u8 {
    3
}

fn default_bell_target() -> u8 {
    5
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// TCP port the websocket listener binds to. 0 picks a free port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// When false the server runs in local mode: accounts are accepted
    /// without persistence and no database is touched.
    #[serde(default)]
    pub use_database: bool,

    #[serde(default = "default_database_url")]
    pub database_url: String,

    #[serde(default)]
    pub game: GameSection,

    #[serde(default)]
    pub rooms: RoomsSection,
}

/// `[game]`: constants shared by every room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSection {
    #[serde(default = "default_starting_cards")]
    pub starting_cards: u32,
    #[serde(default = "default_game_time_limit")]
    pub game_time_limit_secs: u64,
    #[serde(default = "default_emotion_cooldown")]
    pub emotion_cooldown_secs: u64,
}

/// `[rooms]`: the room cap and the settings used when a client enters a
/// room id that does not exist yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomsSection {
    #[serde(default = "default_max_rooms")]
    pub max_rooms: usize,
    /// Bounds on `maxPlayerCount` accepted by CreateRoom.
    #[serde(default = "default_min_players_bound")]
    pub min_players: u8,
    #[serde(default = "default_max_players_bound")]
    pub max_players: u8,
    #[serde(default = "default_room_name")]
    pub default_name: String,
    #[serde(default = "default_max_players")]
    pub default_max_players: u8,
    #[serde(default = "default_fruit_variation")]
    pub default_fruit_variation: u8,
    #[serde(default = "default_bell_target")]
    pub default_bell_target: u8,
    /// Tempo 0–3, same scale as the wire `speed` field.
    #[serde(default)]
    pub default_speed: u8,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            use_database: false,
            database_url: default_database_url(),
            game: GameSection::default(),
            rooms: RoomsSection::default(),
        }
    }
}

impl Default for GameSection {
    fn default() -> Self {
        Self {
            starting_cards: default_starting_cards(),
            game_time_limit_secs: default_game_time_limit(),
            emotion_cooldown_secs: default_emotion_cooldown(),
        }
    }
}

impl Default for RoomsSection {
    fn default() -> Self {
        Self {
            max_rooms: default_max_rooms(),
            min_players: default_min_players_bound(),
            max_players: default_max_players_bound(),
            default_name: default_room_name(),
            default_max_players: default_max_players(),
            default_fruit_variation: default_fruit_variation(),
            default_bell_target: default_bell_target(),
            default_speed: 0,
        }
    }
}

impl ServerConfig {
    /// Loads configuration: file (when present), then env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ServerError> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let text = std::fs::read_to_string(path)?;
                toml::from_str(&text)
                    .map_err(|e| ServerError::Config(e.to_string()))?
            }
            _ => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(port) = std::env::var("HALLI_PORT") {
            if let Ok(port) = port.parse() {
                self.port = port;
            }
        }
        if let Ok(flag) = std::env::var("HALLI_USE_DATABASE") {
            self.use_database = flag == "1" || flag.eq_ignore_ascii_case("true");
        }
        if let Ok(url) = std::env::var("HALLI_DATABASE_URL") {
            self.database_url = url;
        }
    }

    pub fn game_rules(&self) -> GameRules {
        GameRules {
            starting_cards: self.game.starting_cards,
            game_time_limit: Duration::from_secs(self.game.game_time_limit_secs),
            emotion_cooldown: Duration::from_secs(
                self.game.emotion_cooldown_secs,
            ),
        }
    }

    pub fn room_defaults(&self) -> RoomDefaults {
        RoomDefaults {
            name: self.rooms.default_name.clone(),
            max_players: self.rooms.default_max_players,
            fruit_variation: self.rooms.default_fruit_variation,
            bell_target: self.rooms.default_bell_target,
            tempo: Tempo::from_wire(self.rooms.default_speed)
                .unwrap_or(Tempo::Slow),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_make_a_local_mode_server() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8080);
        assert!(!config.use_database);
        assert_eq!(config.game.starting_cards, 5);
        assert_eq!(config.rooms.max_rooms, 6);
    }

    #[test]
    fn test_partial_toml_fills_in_defaults() {
        let config: ServerConfig = toml::from_str(
            r#"
            port = 9000

            [game]
            starting_cards = 7
            "#,
        )
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.game.starting_cards, 7);
        assert_eq!(config.game.game_time_limit_secs, 120);
        assert_eq!(config.rooms.default_bell_target, 5);
    }

    #[test]
    fn test_sections_convert_to_room_types() {
        let config = ServerConfig::default();
        let rules = config.game_rules();
        assert_eq!(rules.starting_cards, 5);
        assert_eq!(rules.game_time_limit, Duration::from_secs(120));

        let defaults = config.room_defaults();
        assert_eq!(defaults.bell_target, 5);
        assert_eq!(defaults.tempo, Tempo::Slow);
    }
}

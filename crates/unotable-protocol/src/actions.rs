//! Inbound client messages.
//!
//! Browsers send a loose envelope, `{action, game_id?, extra?}`. The
//! gateway decodes the envelope, then calls [`ClientEnvelope::into_action`]
//! to get a typed [`ClientAction`], so every later layer works with
//! validated values instead of raw JSON.

use serde::Deserialize;
use serde_json::Value as Json;

use crate::{Card, Color, GameSettings, PlayerId, ProtocolError, RoomCode};

/// The raw inbound envelope.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClientEnvelope {
    pub action: String,
    #[serde(default)]
    pub game_id: Option<String>,
    #[serde(default)]
    pub extra: Option<Json>,
}

/// Options for `create_game`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct CreateOptions {
    #[serde(default = "default_max_players")]
    pub max_players: usize,
    #[serde(default = "default_buy_in")]
    pub buy_in: f64,
    #[serde(default)]
    pub is_private: bool,
}

fn default_max_players() -> usize {
    10
}

fn default_buy_in() -> f64 {
    1.0
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            max_players: default_max_players(),
            buy_in: default_buy_in(),
            is_private: false,
        }
    }
}

/// One move inside a hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnAction {
    PlayCard(Card),
    /// `advance_turn = false` keeps the turn so the drawn card can be played.
    DrawCard { advance_turn: bool },
    ChangeColor(Color),
    ChangeColorDraw4(Color),
}

impl TurnAction {
    /// The wire name of this move.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PlayCard(_) => "play_card",
            Self::DrawCard { .. } => "draw_card_from_middle",
            Self::ChangeColor(_) => "change_color_with_wild",
            Self::ChangeColorDraw4(_) => "change_color_with_wild_and_draw4",
        }
    }
}

/// A validated client request.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientAction {
    StatusCheck,
    CreateGame(CreateOptions),
    JoinGame { game_id: RoomCode },
    /// Re-bind a retained seat to this connection.
    ResumeSession { game_id: RoomCode, player_id: PlayerId },
    LeaveGame,
    StartGame,
    EndGame,
    BackToLobby,
    SaveGameSettings(GameSettings),
    ProcessTurn(TurnAction),
}

impl ClientAction {
    /// The wire name of this action, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::StatusCheck => "status_check",
            Self::CreateGame(_) => "create_game",
            Self::JoinGame { .. } => "join_game",
            Self::ResumeSession { .. } => "resume_session",
            Self::LeaveGame => "leave_game",
            Self::StartGame => "start_game",
            Self::EndGame => "end_game",
            Self::BackToLobby => "back_to_lobby",
            Self::SaveGameSettings(_) => "save_game_settings",
            Self::ProcessTurn(_) => "process_turn",
        }
    }
}

// ---------------------------------------------------------------------------
// Envelope interpretation
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct TurnExtra {
    action: String,
    #[serde(default)]
    card: Option<String>,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    advance_turn: Option<bool>,
}

#[derive(Deserialize)]
struct SettingsExtra {
    settings: GameSettings,
}

impl ClientEnvelope {
    /// Interprets the envelope as a typed action.
    pub fn into_action(self) -> Result<ClientAction, ProtocolError> {
        match self.action.as_str() {
            "status_check" => Ok(ClientAction::StatusCheck),
            "create_game" => {
                let opts = match self.extra {
                    Some(extra) => parse_extra(extra)?,
                    None => CreateOptions::default(),
                };
                Ok(ClientAction::CreateGame(opts))
            }
            "join_game" => Ok(ClientAction::JoinGame {
                game_id: self.room_code()?,
            }),
            "resume_session" => {
                let game_id = self.room_code()?;
                let player_id = self
                    .extra_str("player_id")
                    .ok_or(ProtocolError::MissingField("player_id"))?;
                Ok(ClientAction::ResumeSession {
                    game_id,
                    player_id: PlayerId(player_id.to_owned()),
                })
            }
            "leave_game" => Ok(ClientAction::LeaveGame),
            "start_game" => Ok(ClientAction::StartGame),
            "end_game" => Ok(ClientAction::EndGame),
            "back_to_lobby" => Ok(ClientAction::BackToLobby),
            "save_game_settings" => {
                let extra =
                    self.extra.ok_or(ProtocolError::MissingField("settings"))?;
                let SettingsExtra { settings } = parse_extra(extra)?;
                Ok(ClientAction::SaveGameSettings(settings))
            }
            "process_turn" => {
                let extra =
                    self.extra.ok_or(ProtocolError::MissingField("action"))?;
                parse_turn(parse_extra(extra)?).map(ClientAction::ProcessTurn)
            }
            other => Err(ProtocolError::UnknownAction(other.to_owned())),
        }
    }

    /// `game_id` at the top level, falling back to `extra.game_id`.
    fn room_code(&self) -> Result<RoomCode, ProtocolError> {
        let raw = self
            .game_id
            .as_deref()
            .or_else(|| self.extra_str("game_id"))
            .ok_or(ProtocolError::MissingField("game_id"))?;
        RoomCode::parse(raw)
    }

    fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.as_ref()?.get(key)?.as_str()
    }
}

fn parse_extra<T: serde::de::DeserializeOwned>(
    extra: Json,
) -> Result<T, ProtocolError> {
    serde_json::from_value(extra).map_err(ProtocolError::Decode)
}

fn parse_turn(extra: TurnExtra) -> Result<TurnAction, ProtocolError> {
    match extra.action.as_str() {
        "play_card" => {
            let card = extra.card.ok_or(ProtocolError::MissingField("card"))?;
            Ok(TurnAction::PlayCard(card.parse()?))
        }
        "draw_card_from_middle" => Ok(TurnAction::DrawCard {
            advance_turn: extra.advance_turn.unwrap_or(true),
        }),
        "change_color_with_wild" => {
            Ok(TurnAction::ChangeColor(chosen_color(extra)?))
        }
        "change_color_with_wild_and_draw4" => {
            Ok(TurnAction::ChangeColorDraw4(chosen_color(extra)?))
        }
        other => Err(ProtocolError::UnknownAction(format!(
            "process_turn/{other}"
        ))),
    }
}

/// Older clients put the chosen colour in `card`.
fn chosen_color(extra: TurnExtra) -> Result<Color, ProtocolError> {
    extra
        .color
        .or(extra.card)
        .ok_or(ProtocolError::MissingField("color"))?
        .parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{StackingMode, Value};

    fn envelope(json: &str) -> ClientEnvelope {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_into_action_create_game_defaults() {
        let action = envelope(r#"{"action":"create_game"}"#)
            .into_action()
            .unwrap();
        assert_eq!(action, ClientAction::CreateGame(CreateOptions::default()));
    }

    #[test]
    fn test_into_action_create_game_reads_extra() {
        let action = envelope(
            r#"{"action":"create_game","extra":{"max_players":4,"buy_in":0,"is_private":true}}"#,
        )
        .into_action()
        .unwrap();
        let ClientAction::CreateGame(opts) = action else {
            panic!("expected create_game");
        };
        assert_eq!(opts.max_players, 4);
        assert_eq!(opts.buy_in, 0.0);
        assert!(opts.is_private);
    }

    #[test]
    fn test_into_action_join_game_uppercases_code() {
        let action = envelope(r#"{"action":"join_game","game_id":"qzpd"}"#)
            .into_action()
            .unwrap();
        assert_eq!(
            action,
            ClientAction::JoinGame {
                game_id: RoomCode::parse("QZPD").unwrap()
            }
        );
    }

    #[test]
    fn test_into_action_join_game_reads_code_from_extra() {
        let action =
            envelope(r#"{"action":"join_game","extra":{"game_id":"AB12"}}"#)
                .into_action()
                .unwrap();
        assert!(matches!(action, ClientAction::JoinGame { .. }));
    }

    #[test]
    fn test_into_action_join_game_without_code_fails() {
        let err = envelope(r#"{"action":"join_game"}"#)
            .into_action()
            .unwrap_err();
        assert!(matches!(err, ProtocolError::MissingField("game_id")));
    }

    #[test]
    fn test_into_action_resume_session() {
        let action = envelope(
            r#"{"action":"resume_session","game_id":"QZPD","extra":{"player_id":"u1"}}"#,
        )
        .into_action()
        .unwrap();
        assert_eq!(
            action,
            ClientAction::ResumeSession {
                game_id: RoomCode::parse("QZPD").unwrap(),
                player_id: PlayerId::from("u1"),
            }
        );
    }

    #[test]
    fn test_into_action_play_card() {
        let action = envelope(
            r#"{"action":"process_turn","game_id":"QZPD","extra":{"action":"play_card","card":"B-D2"}}"#,
        )
        .into_action()
        .unwrap();
        assert_eq!(
            action,
            ClientAction::ProcessTurn(TurnAction::PlayCard(Card::new(
                Color::Blue,
                Value::DrawTwo
            )))
        );
    }

    #[test]
    fn test_into_action_draw_defaults_to_advancing() {
        let action = envelope(
            r#"{"action":"process_turn","extra":{"action":"draw_card_from_middle"}}"#,
        )
        .into_action()
        .unwrap();
        assert_eq!(
            action,
            ClientAction::ProcessTurn(TurnAction::DrawCard { advance_turn: true })
        );
    }

    #[test]
    fn test_into_action_change_color_falls_back_to_card_field() {
        let action = envelope(
            r#"{"action":"process_turn","extra":{"action":"change_color_with_wild","card":"G"}}"#,
        )
        .into_action()
        .unwrap();
        assert_eq!(
            action,
            ClientAction::ProcessTurn(TurnAction::ChangeColor(Color::Green))
        );
    }

    #[test]
    fn test_into_action_save_settings() {
        let action = envelope(
            r#"{"action":"save_game_settings","extra":{"settings":{"stacking_mode":"off","turn_timeout_seconds":15}}}"#,
        )
        .into_action()
        .unwrap();
        let ClientAction::SaveGameSettings(settings) = action else {
            panic!("expected save_game_settings");
        };
        assert_eq!(settings.stacking_mode, StackingMode::Off);
        assert_eq!(settings.turn_timeout_seconds, 15);
    }

    #[test]
    fn test_into_action_unknown_action_fails() {
        let err = envelope(r#"{"action":"fly"}"#).into_action().unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownAction(a) if a == "fly"));
    }

    #[test]
    fn test_into_action_unknown_turn_action_fails() {
        let err = envelope(
            r#"{"action":"process_turn","extra":{"action":"cheat"}}"#,
        )
        .into_action()
        .unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownAction(_)));
    }

    #[test]
    fn test_into_action_bad_card_code_fails() {
        let err = envelope(
            r#"{"action":"process_turn","extra":{"action":"play_card","card":"Q-9"}}"#,
        )
        .into_action()
        .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidMessage(_)));
    }
}

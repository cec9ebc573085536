//! Cards and their string codes.
//!
//! A card is identified on the wire by `"{color}-{value}"`, e.g. `R-7`,
//! `B-D2`, `W-Wild`, `W-W4`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Card colour. `Wild` only appears on wild cards; it is never an
/// active colour.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Color {
    #[serde(rename = "R")]
    Red,
    #[serde(rename = "B")]
    Blue,
    #[serde(rename = "G")]
    Green,
    #[serde(rename = "Y")]
    Yellow,
    #[serde(rename = "W")]
    Wild,
}

impl Color {
    /// The four colours a deck is built from and a wild can name.
    pub const PLAYABLE: [Color; 4] =
        [Color::Red, Color::Blue, Color::Green, Color::Yellow];

    /// Single-letter wire code.
    pub fn code(self) -> &'static str {
        match self {
            Self::Red => "R",
            Self::Blue => "B",
            Self::Green => "G",
            Self::Yellow => "Y",
            Self::Wild => "W",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Color {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "R" => Ok(Self::Red),
            "B" => Ok(Self::Blue),
            "G" => Ok(Self::Green),
            "Y" => Ok(Self::Yellow),
            "W" => Ok(Self::Wild),
            other => Err(ProtocolError::InvalidMessage(format!(
                "unknown color '{other}'"
            ))),
        }
    }
}

/// Face value of a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Value {
    Number(u8),
    Skip,
    Reverse,
    DrawTwo,
    Wild,
    WildDrawFour,
}

impl Value {
    /// Whether this value belongs on a wild (colourless) card.
    pub fn is_wild(self) -> bool {
        matches!(self, Self::Wild | Self::WildDrawFour)
    }

    /// Cards a draw-forcing value makes the next player take.
    pub fn draw_penalty(self) -> Option<u32> {
        match self {
            Self::DrawTwo => Some(2),
            Self::WildDrawFour => Some(4),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Skip => f.write_str("S"),
            Self::Reverse => f.write_str("R"),
            Self::DrawTwo => f.write_str("D2"),
            Self::Wild => f.write_str("Wild"),
            Self::WildDrawFour => f.write_str("W4"),
        }
    }
}

impl FromStr for Value {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "S" => Ok(Self::Skip),
            "R" => Ok(Self::Reverse),
            "D2" => Ok(Self::DrawTwo),
            "Wild" => Ok(Self::Wild),
            "W4" => Ok(Self::WildDrawFour),
            digit if digit.len() == 1 => digit
                .parse::<u8>()
                .map(Self::Number)
                .map_err(|_| invalid_value(s)),
            _ => Err(invalid_value(s)),
        }
    }
}

fn invalid_value(s: &str) -> ProtocolError {
    ProtocolError::InvalidMessage(format!("unknown card value '{s}'"))
}

/// An immutable card.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct Card {
    pub color: Color,
    pub value: Value,
}

impl Card {
    pub const fn new(color: Color, value: Value) -> Self {
        Self { color, value }
    }

    pub fn is_wild(&self) -> bool {
        self.color == Color::Wild
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.color, self.value)
    }
}

impl FromStr for Card {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (color, value) = s.split_once('-').ok_or_else(|| {
            ProtocolError::InvalidMessage(format!("invalid card '{s}'"))
        })?;
        let color: Color = color.parse()?;
        let value: Value = value.parse()?;
        // Wild values only come in the wild colour, and vice versa.
        if (color == Color::Wild) != value.is_wild() {
            return Err(ProtocolError::InvalidMessage(format!(
                "invalid card '{s}'"
            )));
        }
        Ok(Self { color, value })
    }
}

impl TryFrom<String> for Card {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Card> for String {
    fn from(card: Card) -> Self {
        card.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_code_format() {
        assert_eq!(Card::new(Color::Red, Value::Number(7)).to_string(), "R-7");
        assert_eq!(Card::new(Color::Blue, Value::DrawTwo).to_string(), "B-D2");
        assert_eq!(Card::new(Color::Wild, Value::Wild).to_string(), "W-Wild");
        assert_eq!(
            Card::new(Color::Wild, Value::WildDrawFour).to_string(),
            "W-W4"
        );
    }

    #[test]
    fn test_card_parse_action_cards() {
        let card: Card = "G-S".parse().unwrap();
        assert_eq!(card, Card::new(Color::Green, Value::Skip));
        let card: Card = "Y-R".parse().unwrap();
        assert_eq!(card, Card::new(Color::Yellow, Value::Reverse));
    }

    #[test]
    fn test_card_parse_rejects_coloured_wild() {
        assert!("R-Wild".parse::<Card>().is_err());
        assert!("W-5".parse::<Card>().is_err());
    }

    #[test]
    fn test_card_parse_rejects_garbage() {
        assert!("R7".parse::<Card>().is_err());
        assert!("R-10".parse::<Card>().is_err());
        assert!("X-1".parse::<Card>().is_err());
    }

    #[test]
    fn test_card_serializes_as_code_string() {
        let json =
            serde_json::to_string(&Card::new(Color::Wild, Value::WildDrawFour))
                .unwrap();
        assert_eq!(json, "\"W-W4\"");
    }

    #[test]
    fn test_color_serializes_as_letter() {
        assert_eq!(serde_json::to_string(&Color::Yellow).unwrap(), "\"Y\"");
    }

    #[test]
    fn test_value_draw_penalty() {
        assert_eq!(Value::DrawTwo.draw_penalty(), Some(2));
        assert_eq!(Value::WildDrawFour.draw_penalty(), Some(4));
        assert_eq!(Value::Skip.draw_penalty(), None);
    }
}

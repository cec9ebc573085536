//! The standard 108-card deck.

use unotable_protocol::{Card, Color, Value};

/// Cards in a full deck.
pub const DECK_SIZE: usize = 108;

/// Cards dealt to each player.
pub const HAND_SIZE: usize = 7;

/// Builds an unshuffled deck: per colour one `0`, two each of `1`–`9`,
/// `S`, `R` and `D2`; plus four `W-Wild` and four `W-W4`.
pub fn standard_deck() -> Vec<Card> {
    let mut deck = Vec::with_capacity(DECK_SIZE);
    for color in Color::PLAYABLE {
        deck.push(Card::new(color, Value::Number(0)));
        for _ in 0..2 {
            deck.extend((1..=9).map(|n| Card::new(color, Value::Number(n))));
            deck.push(Card::new(color, Value::Skip));
            deck.push(Card::new(color, Value::Reverse));
            deck.push(Card::new(color, Value::DrawTwo));
        }
    }
    for _ in 0..4 {
        deck.push(Card::new(Color::Wild, Value::Wild));
        deck.push(Card::new(Color::Wild, Value::WildDrawFour));
    }
    deck
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(deck: &[Card], pred: impl Fn(&Card) -> bool) -> usize {
        deck.iter().filter(|c| pred(c)).count()
    }

    #[test]
    fn test_standard_deck_has_108_cards() {
        assert_eq!(standard_deck().len(), DECK_SIZE);
    }

    #[test]
    fn test_standard_deck_composition() {
        let deck = standard_deck();
        assert_eq!(count(&deck, |c| c.value == Value::Number(0)), 4);
        assert_eq!(count(&deck, |c| c.value == Value::Number(7)), 8);
        assert_eq!(count(&deck, |c| c.value == Value::DrawTwo), 8);
        assert_eq!(count(&deck, |c| c.value == Value::Wild), 4);
        assert_eq!(count(&deck, |c| c.value == Value::WildDrawFour), 4);
        assert_eq!(count(&deck, |c| c.color == Color::Red), 25);
    }
}

//! Pure move validation.

use unotable_protocol::{Card, Color, PlayerId, StackingMode, TurnAction, Value};

use crate::{Phase, RuleError, Table};

impl Table {
    /// Checks whether `player` may make `action` right now.
    ///
    /// Never mutates; [`Table::apply`] calls this first.
    pub fn validate(
        &self,
        player: &PlayerId,
        action: &TurnAction,
    ) -> Result<(), RuleError> {
        if self.is_finished() {
            return Err(RuleError::HandOver);
        }
        let idx = self.seat_index(player).ok_or(RuleError::NotSeated)?;
        if !self.seats[idx].active {
            return Err(RuleError::Forfeited);
        }
        if idx != self.current {
            return Err(RuleError::NotYourTurn);
        }

        match *action {
            TurnAction::ChangeColor(color) => self.check_color_choice(color, false),
            TurnAction::ChangeColorDraw4(color) => {
                self.check_color_choice(color, true)
            }
            _ if matches!(self.phase, Phase::AwaitingColor { .. }) => {
                Err(RuleError::ColorChoicePending)
            }
            TurnAction::PlayCard(card) => self.check_play(idx, card),
            TurnAction::DrawCard { .. } => Ok(()),
        }
    }

    fn check_color_choice(&self, color: Color, draw4: bool) -> Result<(), RuleError> {
        match self.phase {
            Phase::AwaitingColor { draw4: pending, .. } if pending == draw4 => {}
            Phase::AwaitingColor { .. } => return Err(RuleError::WrongColorAction),
            _ => return Err(RuleError::NoPendingWild),
        }
        if color == Color::Wild {
            return Err(RuleError::InvalidColor);
        }
        Ok(())
    }

    fn check_play(&self, idx: usize, card: Card) -> Result<(), RuleError> {
        if !self.seats[idx].hand.contains(&card) {
            return Err(RuleError::CardNotInHand(card));
        }

        if self.pending_draw > 0 {
            return if self.can_stack(card) {
                Ok(())
            } else {
                Err(RuleError::MustStackOrDraw {
                    penalty: self.pending_draw,
                })
            };
        }

        if card.is_wild()
            || card.color == self.active_color
            || card.value == self.top.value
        {
            Ok(())
        } else {
            Err(RuleError::IllegalPlay {
                card,
                top: self.top,
                active: self.active_color,
            })
        }
    }

    /// Whether `card` may answer the pending draw penalty.
    fn can_stack(&self, card: Card) -> bool {
        match self.settings.stacking_mode {
            StackingMode::Off => false,
            StackingMode::Standard => card.value == Value::DrawTwo,
            StackingMode::Aggressive => card.value.draw_penalty().is_some(),
        }
    }
}

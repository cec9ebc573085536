//! Table state and the effects of each move.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::debug;
use unotable_protocol::{
    AfkBehavior, Card, Color, GameEvent, GameEventKind, GameSettings,
    PlayerId, StackingMode, TurnAction, Value,
};

use crate::{DECK_SIZE, HAND_SIZE, RuleError, standard_deck};

// ---------------------------------------------------------------------------
// Direction / Phase
// ---------------------------------------------------------------------------

/// Traversal direction over the fixed seat order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    /// `+1` or `-1`, as sent to clients.
    pub fn as_i8(self) -> i8 {
        match self {
            Self::Forward => 1,
            Self::Backward => -1,
        }
    }

    fn flipped(self) -> Self {
        match self {
            Self::Forward => Self::Backward,
            Self::Backward => Self::Forward,
        }
    }
}

/// Where the hand is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// The current player may play or draw.
    Playing,
    /// The current player played a wild and must name a colour.
    AwaitingColor {
        draw4: bool,
        /// Colour that was active before the wild.
        previous: Color,
    },
    /// Someone won, or nobody is left.
    Finished { winner: Option<PlayerId> },
}

#[derive(Debug, Clone)]
pub(crate) struct Seat {
    pub(crate) player: PlayerId,
    pub(crate) hand: Vec<Card>,
    /// `false` once the player left or forfeited.
    pub(crate) active: bool,
    pub(crate) afk_strikes: u32,
}

/// What a turn timeout did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutOutcome {
    /// The player whose turn timed out.
    pub player: PlayerId,
    /// The move applied on their behalf.
    pub event: GameEvent,
    pub strikes: u32,
    /// The player was removed from rotation.
    pub forfeited: bool,
    /// Set when the forfeit left a single player in rotation.
    pub win: Option<GameEvent>,
}

/// An explicit arrangement of cards, for building a table in a known
/// state instead of dealing.
#[derive(Debug, Clone)]
pub struct Layout {
    /// Seats in turn order; the first player starts.
    pub hands: Vec<(PlayerId, Vec<Card>)>,
    pub top: Card,
    /// Bottom first; the last card is drawn next.
    pub draw_pile: Vec<Card>,
    /// Cards beneath `top`.
    pub discard: Vec<Card>,
    /// Defaults to the colour of `top` (red for a wild).
    pub active_color: Option<Color>,
    pub settings: GameSettings,
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// One hand of the game.
#[derive(Debug)]
pub struct Table {
    pub(crate) seats: Vec<Seat>,
    pub(crate) draw_pile: Vec<Card>,
    pub(crate) discard: Vec<Card>,
    pub(crate) top: Card,
    pub(crate) current: usize,
    pub(crate) direction: Direction,
    pub(crate) active_color: Color,
    pub(crate) phase: Phase,
    pub(crate) pending_draw: u32,
    pub(crate) drawn_this_turn: bool,
    pub(crate) turn_seq: u64,
    pub(crate) settings: GameSettings,
    total_cards: usize,
    rng: StdRng,
}

impl Table {
    pub const MIN_PLAYERS: usize = 2;

    /// Shuffles a fresh deck and deals [`HAND_SIZE`] cards to each
    /// player. The first non-wild card from the top of the draw pile
    /// starts the discard pile; its effect is not applied.
    pub fn deal(
        players: &[PlayerId],
        settings: GameSettings,
        mut rng: StdRng,
    ) -> Result<Self, RuleError> {
        if players.len() < Self::MIN_PLAYERS {
            return Err(RuleError::NotEnoughPlayers {
                min: Self::MIN_PLAYERS,
                got: players.len(),
            });
        }

        let mut deck = standard_deck();
        deck.shuffle(&mut rng);

        let mut seats: Vec<Seat> = players
            .iter()
            .map(|p| Seat {
                player: p.clone(),
                hand: Vec::with_capacity(HAND_SIZE),
                active: true,
                afk_strikes: 0,
            })
            .collect();
        for _ in 0..HAND_SIZE {
            for seat in &mut seats {
                let card = deck.pop().ok_or_else(|| {
                    RuleError::Invariant("deck too small to deal".into())
                })?;
                seat.hand.push(card);
            }
        }

        let start = deck.iter().rposition(|c| !c.is_wild()).ok_or_else(|| {
            RuleError::Invariant("no non-wild card left to start".into())
        })?;
        let top = deck.remove(start);

        debug!(players = players.len(), %top, "hand dealt");

        Ok(Self {
            seats,
            draw_pile: deck,
            discard: Vec::new(),
            top,
            current: 0,
            direction: Direction::Forward,
            active_color: top.color,
            phase: Phase::Playing,
            pending_draw: 0,
            drawn_this_turn: false,
            turn_seq: 0,
            settings,
            total_cards: DECK_SIZE,
            rng,
        })
    }

    /// Builds a table from an explicit card arrangement.
    pub fn from_layout(layout: Layout) -> Result<Self, RuleError> {
        if layout.hands.len() < Self::MIN_PLAYERS {
            return Err(RuleError::NotEnoughPlayers {
                min: Self::MIN_PLAYERS,
                got: layout.hands.len(),
            });
        }
        let seats: Vec<Seat> = layout
            .hands
            .into_iter()
            .map(|(player, hand)| Seat {
                player,
                hand,
                active: true,
                afk_strikes: 0,
            })
            .collect();
        let active_color = layout.active_color.unwrap_or(if layout.top.is_wild() {
            Color::Red
        } else {
            layout.top.color
        });

        let mut table = Self {
            seats,
            draw_pile: layout.draw_pile,
            discard: layout.discard,
            top: layout.top,
            current: 0,
            direction: Direction::Forward,
            active_color,
            phase: Phase::Playing,
            pending_draw: 0,
            drawn_this_turn: false,
            turn_seq: 0,
            settings: layout.settings,
            total_cards: 0,
            rng: StdRng::seed_from_u64(0),
        };
        table.total_cards = table.cards_in_play();
        Ok(table)
    }

    // -----------------------------------------------------------------------
    // Moves
    // -----------------------------------------------------------------------

    /// Validates and applies one move by `player`.
    ///
    /// On `Err` the table is unchanged.
    pub fn apply(
        &mut self,
        player: &PlayerId,
        action: TurnAction,
    ) -> Result<GameEvent, RuleError> {
        self.validate(player, &action)?;
        let idx = self.current;

        let event = match action {
            TurnAction::PlayCard(card) => self.play(idx, card),
            TurnAction::DrawCard { advance_turn } => {
                self.draw(idx, advance_turn)
            }
            TurnAction::ChangeColor(color) => self.choose_color(color, false),
            TurnAction::ChangeColorDraw4(color) => {
                self.choose_color(color, true)
            }
        };
        Ok(event)
    }

    /// Applies the AFK policy to the current player after their turn
    /// timer ran out. Returns `None` when the hand is already over.
    pub fn apply_timeout(&mut self) -> Option<TimeoutOutcome> {
        if self.is_finished() {
            return None;
        }
        let idx = self.current;
        let player = self.seats[idx].player.clone();
        self.seats[idx].afk_strikes += 1;
        let strikes = self.seats[idx].afk_strikes;

        let event = match self.phase {
            Phase::AwaitingColor { draw4, previous } => {
                self.choose_color(previous, draw4)
            }
            _ if self.pending_draw > 0 => self.draw(idx, true),
            _ => match self.settings.afk_behavior {
                AfkBehavior::DrawSkip => self.draw(idx, true),
                AfkBehavior::Skip => {
                    self.pass_turn(false);
                    GameEvent::new(GameEventKind::Skip, player.clone())
                        .affecting(player.clone())
                }
            },
        };

        let forfeited = self.settings.forfeit_enabled()
            && strikes > self.settings.max_afk_strikes
            && !self.is_finished();
        let win = if forfeited {
            debug!(%player, strikes, "player forfeited after repeated timeouts");
            self.withdraw(idx)
        } else {
            None
        };

        Some(TimeoutOutcome {
            player,
            event,
            strikes,
            forfeited,
            win,
        })
    }

    /// Takes `player` out of rotation (left the room or their grace
    /// period expired). Their hand is shuffled into the draw pile.
    ///
    /// Returns a `win` event when only one player remains.
    pub fn remove_player(
        &mut self,
        player: &PlayerId,
    ) -> Result<Option<GameEvent>, RuleError> {
        let idx = self.seat_index(player).ok_or(RuleError::NotSeated)?;
        if self.is_finished() || !self.seats[idx].active {
            return Ok(None);
        }
        Ok(self.withdraw(idx))
    }

    // -----------------------------------------------------------------------
    // Effects
    // -----------------------------------------------------------------------

    fn play(&mut self, idx: usize, card: Card) -> GameEvent {
        let player = self.seats[idx].player.clone();
        let hand = &mut self.seats[idx].hand;
        if let Some(pos) = hand.iter().position(|c| *c == card) {
            hand.swap_remove(pos);
        }
        self.discard.push(self.top);
        self.top = card;
        if !card.is_wild() {
            self.active_color = card.color;
        }

        if self.seats[idx].hand.is_empty() {
            return self.finish(Some(idx));
        }

        match card.value {
            Value::Number(_) => {
                self.pass_turn(false);
                GameEvent::new(GameEventKind::PlayCard, player)
            }
            Value::Skip => {
                let skipped = self.seats[self.next_active(idx)].player.clone();
                self.pass_turn(true);
                GameEvent::new(GameEventKind::Skip, player).affecting(skipped)
            }
            Value::Reverse => {
                let event = GameEvent::new(GameEventKind::Reverse, player);
                if self.active_count() == 2 {
                    let skipped =
                        self.seats[self.next_active(idx)].player.clone();
                    self.pass_turn(true);
                    event.affecting(skipped)
                } else {
                    self.direction = self.direction.flipped();
                    self.pass_turn(false);
                    event
                }
            }
            Value::DrawTwo => self.apply_penalty(player, 2, GameEventKind::Draw2),
            Value::Wild | Value::WildDrawFour => {
                let draw4 = card.value == Value::WildDrawFour;
                self.phase = Phase::AwaitingColor {
                    draw4,
                    previous: self.active_color,
                };
                let kind = if draw4 {
                    GameEventKind::WildColorPickDraw4
                } else {
                    GameEventKind::WildColorPick
                };
                GameEvent::new(kind, player)
            }
        }
    }

    fn draw(&mut self, idx: usize, advance_turn: bool) -> GameEvent {
        let player = self.seats[idx].player.clone();
        if self.pending_draw > 0 {
            let penalty = std::mem::take(&mut self.pending_draw);
            self.draw_into(idx, penalty);
            self.pass_turn(false);
        } else {
            self.draw_into(idx, 1);
            if advance_turn || self.drawn_this_turn {
                self.pass_turn(false);
            } else {
                self.drawn_this_turn = true;
            }
        }
        GameEvent::new(GameEventKind::DrawCard, player)
    }

    fn choose_color(&mut self, color: Color, draw4: bool) -> GameEvent {
        let player = self.seats[self.current].player.clone();
        self.active_color = color;
        self.phase = Phase::Playing;
        if draw4 {
            self.apply_penalty(player, 4, GameEventKind::Draw4)
        } else {
            self.pass_turn(false);
            GameEvent::new(GameEventKind::PlayCard, player)
        }
    }

    /// Either hands the next player `amount` cards and skips them, or,
    /// when stacking allows answering this card, adds to the pending
    /// penalty and passes the turn to them.
    fn apply_penalty(
        &mut self,
        player: PlayerId,
        amount: u32,
        kind: GameEventKind,
    ) -> GameEvent {
        let target = self.next_active(self.current);
        let target_id = self.seats[target].player.clone();
        let stackable = match self.settings.stacking_mode {
            StackingMode::Off => false,
            StackingMode::Standard => kind == GameEventKind::Draw2,
            StackingMode::Aggressive => true,
        };

        if stackable {
            self.pending_draw += amount;
            self.pass_turn(false);
        } else {
            self.draw_into(target, amount);
            self.pass_turn(true);
        }
        GameEvent::new(kind, player).affecting(target_id)
    }

    /// Removes a seat from rotation. A wild awaiting that player's colour
    /// resolves to the previous colour first.
    fn withdraw(&mut self, idx: usize) -> Option<GameEvent> {
        if idx == self.current {
            if let Phase::AwaitingColor { draw4, previous } = self.phase {
                self.choose_color(previous, draw4);
            }
        }
        let was_current = idx == self.current;

        let hand = std::mem::take(&mut self.seats[idx].hand);
        self.draw_pile.extend(hand);
        self.draw_pile.shuffle(&mut self.rng);
        self.seats[idx].active = false;
        debug!(player = %self.seats[idx].player, "player removed from rotation");

        if self.active_count() <= 1 {
            let last = self.seats.iter().position(|s| s.active);
            let event = self.finish(last);
            return last.map(|_| event);
        }

        if was_current {
            // A penalty aimed at the leaving player lapses.
            self.pending_draw = 0;
            let next = self.next_active(idx);
            self.begin_turn(next);
        }
        None
    }

    fn finish(&mut self, winner: Option<usize>) -> GameEvent {
        let winner_id = winner.map(|i| self.seats[i].player.clone());
        self.phase = Phase::Finished {
            winner: winner_id.clone(),
        };
        self.pending_draw = 0;
        self.turn_seq += 1;
        debug!(winner = ?winner_id, "hand finished");
        let player = winner_id
            .unwrap_or_else(|| self.seats[self.current].player.clone());
        GameEvent::new(GameEventKind::Win, player)
    }

    // -----------------------------------------------------------------------
    // Turn order and piles
    // -----------------------------------------------------------------------

    /// The next seat in rotation after `from`, in the current direction.
    pub(crate) fn next_active(&self, from: usize) -> usize {
        let n = self.seats.len();
        let mut idx = from;
        for _ in 0..n {
            idx = match self.direction {
                Direction::Forward => (idx + 1) % n,
                Direction::Backward => (idx + n - 1) % n,
            };
            if self.seats[idx].active {
                return idx;
            }
        }
        from
    }

    fn pass_turn(&mut self, skip_next: bool) {
        let mut next = self.next_active(self.current);
        if skip_next {
            next = self.next_active(next);
        }
        self.begin_turn(next);
    }

    fn begin_turn(&mut self, idx: usize) {
        self.current = idx;
        self.turn_seq += 1;
        self.drawn_this_turn = false;
    }

    fn draw_into(&mut self, idx: usize, count: u32) {
        for _ in 0..count {
            let Some(card) = self.take_from_draw_pile() else {
                debug!("no cards left to draw");
                break;
            };
            self.seats[idx].hand.push(card);
        }
    }

    fn take_from_draw_pile(&mut self) -> Option<Card> {
        if self.draw_pile.is_empty() && !self.discard.is_empty() {
            self.draw_pile.append(&mut self.discard);
            self.draw_pile.shuffle(&mut self.rng);
            debug!(cards = self.draw_pile.len(), "discard pile reshuffled");
        }
        self.draw_pile.pop()
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    fn cards_in_play(&self) -> usize {
        self.seats.iter().map(|s| s.hand.len()).sum::<usize>()
            + self.draw_pile.len()
            + self.discard.len()
            + 1
    }

    /// Verifies no card was created or destroyed.
    pub fn check_conservation(&self) -> Result<(), RuleError> {
        let counted = self.cards_in_play();
        if counted != self.total_cards {
            return Err(RuleError::Invariant(format!(
                "card count {counted} != {}",
                self.total_cards
            )));
        }
        Ok(())
    }

    /// Removes the next card of the draw pile without accounting for it,
    /// so the next conservation check fails.
    #[cfg(any(test, feature = "test-util"))]
    pub fn lose_card(&mut self) -> Option<Card> {
        self.draw_pile.pop()
    }

    pub(crate) fn seat_index(&self, player: &PlayerId) -> Option<usize> {
        self.seats.iter().position(|s| &s.player == player)
    }

    fn active_count(&self) -> usize {
        self.seats.iter().filter(|s| s.active).count()
    }

    pub fn current_player(&self) -> &PlayerId {
        &self.seats[self.current].player
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, Phase::Finished { .. })
    }

    pub fn winner(&self) -> Option<&PlayerId> {
        match &self.phase {
            Phase::Finished { winner } => winner.as_ref(),
            _ => None,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn active_color(&self) -> Color {
        self.active_color
    }

    pub fn top_card(&self) -> Card {
        self.top
    }

    /// Increments every time the turn changes hands (including back to
    /// the same player) and when the hand ends.
    pub fn turn_seq(&self) -> u64 {
        self.turn_seq
    }

    /// Cards the current player must draw unless they stack.
    pub fn pending_draw(&self) -> u32 {
        self.pending_draw
    }

    pub fn hand(&self, player: &PlayerId) -> Option<&[Card]> {
        self.seat_index(player).map(|i| self.seats[i].hand.as_slice())
    }

    pub fn afk_strikes(&self, player: &PlayerId) -> u32 {
        self.seat_index(player)
            .map_or(0, |i| self.seats[i].afk_strikes)
    }

    /// Players still in rotation, in seat order.
    pub fn players_in_rotation(&self) -> Vec<PlayerId> {
        self.seats
            .iter()
            .filter(|s| s.active)
            .map(|s| s.player.clone())
            .collect()
    }

    pub fn is_in_rotation(&self, player: &PlayerId) -> bool {
        self.seat_index(player)
            .is_some_and(|i| self.seats[i].active)
    }

    pub fn draw_pile_len(&self) -> usize {
        self.draw_pile.len()
    }

    pub fn discard_len(&self) -> usize {
        self.discard.len() + 1
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(id: &str) -> PlayerId {
        PlayerId::from(id)
    }

    fn players(n: usize) -> Vec<PlayerId> {
        (1..=n).map(|i| pid(&format!("p{i}"))).collect()
    }

    #[test]
    fn test_deal_gives_each_player_seven_cards() {
        let table = Table::deal(
            &players(4),
            GameSettings::default(),
            StdRng::seed_from_u64(7),
        )
        .unwrap();

        for p in players(4) {
            assert_eq!(table.hand(&p).unwrap().len(), HAND_SIZE);
        }
        assert_eq!(table.draw_pile_len(), DECK_SIZE - 4 * HAND_SIZE - 1);
        assert!(table.check_conservation().is_ok());
    }

    #[test]
    fn test_lost_card_breaks_conservation() {
        let mut table = Table::deal(
            &players(2),
            GameSettings::default(),
            StdRng::seed_from_u64(3),
        )
        .unwrap();

        table.lose_card();

        assert!(matches!(
            table.check_conservation(),
            Err(RuleError::Invariant(_))
        ));
    }

    #[test]
    fn test_deal_starts_with_non_wild_and_first_player() {
        for seed in 0..50 {
            let table = Table::deal(
                &players(3),
                GameSettings::default(),
                StdRng::seed_from_u64(seed),
            )
            .unwrap();
            assert!(!table.top_card().is_wild());
            assert_eq!(table.active_color(), table.top_card().color);
            assert_eq!(table.current_player(), &pid("p1"));
            assert_eq!(table.direction(), Direction::Forward);
        }
    }

    #[test]
    fn test_deal_same_seed_same_hands() {
        let a = Table::deal(&players(2), GameSettings::default(), StdRng::seed_from_u64(42))
            .unwrap();
        let b = Table::deal(&players(2), GameSettings::default(), StdRng::seed_from_u64(42))
            .unwrap();
        assert_eq!(a.hand(&pid("p1")), b.hand(&pid("p1")));
        assert_eq!(a.top_card(), b.top_card());
    }

    #[test]
    fn test_deal_single_player_rejected() {
        let result = Table::deal(
            &players(1),
            GameSettings::default(),
            StdRng::seed_from_u64(0),
        );
        assert!(matches!(
            result,
            Err(RuleError::NotEnoughPlayers { min: 2, got: 1 })
        ));
    }

    #[test]
    fn test_next_active_skips_inactive_seats() {
        let mut table = Table::deal(
            &players(4),
            GameSettings::default(),
            StdRng::seed_from_u64(1),
        )
        .unwrap();
        table.seats[1].active = false;
        assert_eq!(table.next_active(0), 2);
        table.direction = Direction::Backward;
        assert_eq!(table.next_active(2), 0);
    }
}

//! Room actor: an isolated Tokio task that owns one game session.
//!
//! The actor owns the roster, the settings, the current [`Table`] and the
//! turn timer. Everything else talks to it through an mpsc channel, so
//! all changes to a session happen one at a time.

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::{mpsc, oneshot};
use unotable_protocol::{
    GameEvent, GameSettings, PlayerId, PlayerState, Recipient, RoomCode,
    Roster, ServerEvent, TurnAction,
};
use unotable_rules::Table;
use unotable_timer::{TimerFired, TurnTimer};
use unotable_transport::ConnectionId;

use crate::{
    Ledger, LobbyBoard, RoomError, RoomInfo, RoomOptions, SessionStatus,
};

/// Channel sender for delivering events to a player's connection task.
pub type PlayerSender = mpsc::UnboundedSender<ServerEvent>;

/// A player arriving at a room over a live connection.
#[derive(Debug, Clone)]
pub struct Occupant {
    pub player_id: PlayerId,
    pub name: String,
    pub conn: ConnectionId,
    pub sender: PlayerSender,
}

/// A request from a seated player.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomAction {
    SaveSettings(GameSettings),
    Start,
    End,
    BackToLobby,
    Turn(TurnAction),
}

impl RoomAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SaveSettings(_) => "save_game_settings",
            Self::Start => "start_game",
            Self::End => "end_game",
            Self::BackToLobby => "back_to_lobby",
            Self::Turn(action) => action.name(),
        }
    }
}

/// Result of a successful leave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaveOutcome {
    /// Players still seated.
    pub remaining: usize,
}

impl LeaveOutcome {
    /// The last player left; the room should be torn down.
    pub fn closed(&self) -> bool {
        self.remaining == 0
    }
}

/// Commands sent to a room actor through its channel.
pub(crate) enum RoomCommand {
    Join {
        occupant: Occupant,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    /// Re-bind a retained seat to a new connection.
    Resume {
        occupant: Occupant,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    /// The connection dropped. The seat is kept.
    Detach {
        player_id: PlayerId,
        conn: ConnectionId,
    },

    Leave {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<LeaveOutcome, RoomError>>,
    },

    Act {
        player_id: PlayerId,
        action: RoomAction,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    GetInfo {
        reply: oneshot::Sender<RoomInfo>,
    },

    Shutdown,
}

/// Handle to a running room actor.
///
/// Cheap to clone; it wraps an `mpsc::Sender`. The registry holds one
/// per room.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    code: RoomCode,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    /// Seats a new player. The buy-in must already be taken.
    pub async fn join(&self, occupant: Occupant) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Join { occupant, reply })
            .await?
    }

    /// Re-binds `occupant`'s retained seat and sends them a snapshot.
    pub async fn resume(&self, occupant: Occupant) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Resume { occupant, reply })
            .await?
    }

    /// Unlinks `conn` from the player's seat (fire-and-forget).
    pub async fn detach(
        &self,
        player_id: PlayerId,
        conn: ConnectionId,
    ) -> Result<(), RoomError> {
        self.send(RoomCommand::Detach { player_id, conn }).await
    }

    pub async fn leave(
        &self,
        player_id: PlayerId,
    ) -> Result<LeaveOutcome, RoomError> {
        self.request(|reply| RoomCommand::Leave { player_id, reply })
            .await?
    }

    pub async fn act(
        &self,
        player_id: PlayerId,
        action: RoomAction,
    ) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Act {
            player_id,
            action,
            reply,
        })
        .await?
    }

    pub async fn info(&self) -> Result<RoomInfo, RoomError> {
        self.request(|reply| RoomCommand::GetInfo { reply }).await
    }

    /// Tells the room to shut down.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.send(RoomCommand::Shutdown).await
    }

    async fn send(&self, cmd: RoomCommand) -> Result<(), RoomError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))
    }

    async fn request<T>(
        &self,
        cmd: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(cmd(reply_tx)).await?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

struct Link {
    conn: ConnectionId,
    sender: PlayerSender,
}

struct Member {
    id: PlayerId,
    name: String,
    state: PlayerState,
    /// `None` while disconnected within the grace period.
    link: Option<Link>,
    /// Holds an unspent buy-in.
    staked: bool,
}

struct RoomActor<L: Ledger> {
    code: RoomCode,
    options: RoomOptions,
    settings: GameSettings,
    status: SessionStatus,
    host: PlayerId,
    /// Join order, which is also turn order.
    members: Vec<Member>,
    table: Option<Table>,
    pot: f64,
    timer: TurnTimer,
    ledger: Arc<L>,
    lobby: Arc<LobbyBoard>,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl<L: Ledger> RoomActor<L> {
    /// Runs the actor loop until shutdown or until every handle is gone.
    async fn run(mut self) {
        tracing::info!(code = %self.code, host = %self.host, "room actor started");
        self.announce_created();
        self.publish().await;

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else { break };
                    if !self.handle(cmd).await {
                        break;
                    }
                }
                fired = self.timer.expired() => self.on_timeout(fired).await,
            }
        }

        tracing::info!(code = %self.code, "room actor stopped");
    }

    /// Returns `false` when the actor should stop.
    async fn handle(&mut self, cmd: RoomCommand) -> bool {
        match cmd {
            RoomCommand::Join { occupant, reply } => {
                let result = self.handle_join(occupant);
                self.publish().await;
                let _ = reply.send(result);
            }
            RoomCommand::Resume { occupant, reply } => {
                let _ = reply.send(self.handle_resume(occupant));
            }
            RoomCommand::Detach { player_id, conn } => {
                self.handle_detach(&player_id, conn);
            }
            RoomCommand::Leave { player_id, reply } => {
                let result = self.handle_leave(&player_id).await;
                self.publish().await;
                let _ = reply.send(result);
            }
            RoomCommand::Act {
                player_id,
                action,
                reply,
            } => {
                let name = action.name();
                let result = self.handle_act(&player_id, action).await;
                if let Err(e) = &result {
                    tracing::debug!(code = %self.code, player = %player_id, action = name, error = %e, "action rejected");
                }
                self.publish().await;
                let _ = reply.send(result);
            }
            RoomCommand::GetInfo { reply } => {
                let _ = reply.send(self.info());
            }
            RoomCommand::Shutdown => {
                tracing::info!(code = %self.code, "room shutting down");
                self.timer.disarm();
                return false;
            }
        }
        true
    }

    // -----------------------------------------------------------------------
    // Roster
    // -----------------------------------------------------------------------

    fn announce_created(&self) {
        let Some(host) = self.member(&self.host) else {
            return;
        };
        let event = ServerEvent::GameCreated {
            game_id: self.code.clone(),
            creator: host.id.clone(),
            roster: self.roster(),
            message: format!("{} created game {}", host.name, self.code),
        };
        self.dispatch(Recipient::Player(host.id.clone()), event);
    }

    fn handle_join(&mut self, occupant: Occupant) -> Result<(), RoomError> {
        if self.member(&occupant.player_id).is_some() {
            return Err(RoomError::AlreadyInRoom(self.code.clone()));
        }
        // The last member left; the registry is tearing the room down.
        if self.members.is_empty() {
            return Err(RoomError::Unavailable(self.code.clone()));
        }
        if !self.status.is_joinable() {
            return Err(RoomError::InvalidState(format!(
                "Game {} has already started",
                self.code
            )));
        }
        if self.members.len() >= self.options.max_players {
            return Err(RoomError::RoomFull(self.code.clone()));
        }

        let Occupant {
            player_id,
            name,
            conn,
            sender,
        } = occupant;
        self.members.push(Member {
            id: player_id.clone(),
            name: name.clone(),
            state: PlayerState::Ready,
            link: Some(Link { conn, sender }),
            staked: true,
        });
        tracing::info!(
            code = %self.code,
            player = %player_id,
            players = self.members.len(),
            "player joined"
        );

        let event = ServerEvent::PlayerJoined {
            game_id: self.code.clone(),
            roster: self.roster(),
            new_player_id: player_id,
            message: format!("{name} joined the game"),
            new_player_name: name,
        };
        self.dispatch(Recipient::All, event);
        Ok(())
    }

    fn handle_resume(&mut self, occupant: Occupant) -> Result<(), RoomError> {
        let Occupant {
            player_id,
            conn,
            sender,
            ..
        } = occupant;
        let member = self
            .members
            .iter_mut()
            .find(|m| m.id == player_id)
            .ok_or(RoomError::NotInRoom)?;
        member.link = Some(Link { conn, sender });
        tracing::info!(code = %self.code, player = %player_id, %conn, "player resumed");

        let joined = ServerEvent::GameJoined {
            game_id: self.code.clone(),
            roster: self.roster(),
        };
        self.dispatch(Recipient::Player(player_id.clone()), joined);
        if self.status == SessionStatus::InProgress {
            if let Some(snapshot) = self.snapshot_for(&player_id, None) {
                self.dispatch(Recipient::Player(player_id), snapshot);
            }
        }
        Ok(())
    }

    fn handle_detach(&mut self, player_id: &PlayerId, conn: ConnectionId) {
        let Some(member) = self.members.iter_mut().find(|m| m.id == *player_id)
        else {
            return;
        };
        // A newer connection may already have resumed the seat.
        if member.link.as_ref().is_some_and(|l| l.conn == conn) {
            member.link = None;
            tracing::debug!(code = %self.code, player = %player_id, %conn, "player detached");
        }
    }

    async fn handle_leave(
        &mut self,
        player_id: &PlayerId,
    ) -> Result<LeaveOutcome, RoomError> {
        let idx = self
            .members
            .iter()
            .position(|m| m.id == *player_id)
            .ok_or(RoomError::NotInRoom)?;
        let member = self.members.remove(idx);

        if member.staked {
            self.pay_out(&member.id, self.options.buy_in).await;
        }

        let mut win = None;
        if self.status == SessionStatus::InProgress {
            if let Some(table) = self.table.as_mut() {
                match table.remove_player(&member.id) {
                    Ok(event) => win = event,
                    Err(e) => {
                        tracing::warn!(code = %self.code, player = %member.id, error = %e, "leaver had no seat at the table");
                    }
                }
            }
        }

        tracing::info!(
            code = %self.code,
            player = %member.id,
            players = self.members.len(),
            "player left"
        );

        if self.members.is_empty() {
            self.timer.disarm();
            return Ok(LeaveOutcome { remaining: 0 });
        }

        if self.host == member.id {
            self.host = self.members[0].id.clone();
            tracing::info!(code = %self.code, host = %self.host, "host transferred");
        }

        let event = ServerEvent::PlayerLeft {
            player_id: member.id,
            host_id: self.host.clone(),
            message: format!("{} left the game", member.name),
            player_name: member.name,
        };
        self.dispatch(Recipient::All, event);

        if self.status == SessionStatus::InProgress {
            self.after_table_change(win).await;
        }

        Ok(LeaveOutcome {
            remaining: self.members.len(),
        })
    }

    // -----------------------------------------------------------------------
    // Actions
    // -----------------------------------------------------------------------

    async fn handle_act(
        &mut self,
        player_id: &PlayerId,
        action: RoomAction,
    ) -> Result<(), RoomError> {
        if self.member(player_id).is_none() {
            return Err(RoomError::NotInRoom);
        }
        match action {
            RoomAction::SaveSettings(settings) => {
                self.save_settings(player_id, settings)
            }
            RoomAction::Start => self.start(player_id).await,
            RoomAction::End => self.end(player_id).await,
            RoomAction::BackToLobby => self.back_to_lobby(player_id).await,
            RoomAction::Turn(action) => self.take_turn(player_id, action).await,
        }
    }

    fn require_host(&self, player_id: &PlayerId) -> Result<(), RoomError> {
        if self.host != *player_id {
            return Err(RoomError::NotHost);
        }
        Ok(())
    }

    fn save_settings(
        &mut self,
        player_id: &PlayerId,
        settings: GameSettings,
    ) -> Result<(), RoomError> {
        self.require_host(player_id)?;
        if self.status != SessionStatus::Waiting {
            return Err(RoomError::InvalidState(
                "Settings can only be changed before the game starts".into(),
            ));
        }
        settings.validate()?;

        self.settings = settings;
        tracing::debug!(code = %self.code, ?settings, "settings saved");
        self.dispatch(Recipient::All, ServerEvent::GameSettingsSaved { settings });
        Ok(())
    }

    async fn start(&mut self, player_id: &PlayerId) -> Result<(), RoomError> {
        self.require_host(player_id)?;
        match self.status {
            SessionStatus::Waiting => {}
            SessionStatus::InProgress => {
                return Err(RoomError::InvalidState(
                    "Game already in progress".into(),
                ));
            }
            SessionStatus::Ended => {
                return Err(RoomError::InvalidState(
                    "Return to the lobby before starting a new game".into(),
                ));
            }
        }
        if self.members.len() < RoomOptions::MIN_PLAYERS {
            return Err(RoomError::InvalidState(format!(
                "At least {} players are needed to start",
                RoomOptions::MIN_PLAYERS
            )));
        }
        if self
            .members
            .iter()
            .any(|m| m.id != self.host && m.state != PlayerState::Ready)
        {
            return Err(RoomError::NotReady);
        }
        self.ready_up(player_id).await?;

        let players: Vec<PlayerId> =
            self.members.iter().map(|m| m.id.clone()).collect();
        let rng = StdRng::from_rng(&mut rand::rng());
        let table = Table::deal(&players, self.settings, rng)?;

        self.pot = self.options.buy_in * players.len() as f64;
        for member in &mut self.members {
            member.staked = false;
            member.state = PlayerState::Playing;
        }
        self.table = Some(table);
        self.status = SessionStatus::InProgress;
        tracing::info!(code = %self.code, players = players.len(), pot = self.pot, "game started");

        self.dispatch(
            Recipient::All,
            ServerEvent::GameStarted {
                game_id: self.code.clone(),
            },
        );
        self.after_table_change(None).await;
        Ok(())
    }

    async fn end(&mut self, player_id: &PlayerId) -> Result<(), RoomError> {
        self.require_host(player_id)?;
        if self.status != SessionStatus::InProgress {
            return Err(RoomError::InvalidState("No game in progress".into()));
        }
        tracing::info!(code = %self.code, "game ended by host");
        self.abandon_hand("ended_by_host").await;
        Ok(())
    }

    async fn back_to_lobby(
        &mut self,
        player_id: &PlayerId,
    ) -> Result<(), RoomError> {
        if self.status == SessionStatus::InProgress {
            return Err(RoomError::InvalidState(
                "The game is still in progress".into(),
            ));
        }
        self.ready_up(player_id).await?;
        if self.status == SessionStatus::Ended {
            self.status = SessionStatus::Waiting;
            self.table = None;
            tracing::info!(code = %self.code, "room back to waiting");
        }

        let event = ServerEvent::PlayerBackToLobby {
            player_states: self.player_states(),
        };
        self.dispatch(Recipient::All, event);
        Ok(())
    }

    /// Takes the player's buy-in again if it was spent and marks them
    /// ready.
    async fn ready_up(&mut self, player_id: &PlayerId) -> Result<(), RoomError> {
        let staked = self.member(player_id).is_some_and(|m| m.staked);
        if !staked {
            self.ledger.debit(player_id, self.options.buy_in).await?;
        }
        if let Some(member) =
            self.members.iter_mut().find(|m| m.id == *player_id)
        {
            member.staked = true;
            member.state = PlayerState::Ready;
        }
        Ok(())
    }

    async fn take_turn(
        &mut self,
        player_id: &PlayerId,
        action: TurnAction,
    ) -> Result<(), RoomError> {
        let table = match (self.status, self.table.as_mut()) {
            (SessionStatus::InProgress, Some(table)) => table,
            _ => {
                return Err(RoomError::InvalidState(
                    "No game in progress".into(),
                ));
            }
        };
        let event = table.apply(player_id, action)?;
        tracing::debug!(code = %self.code, player = %player_id, kind = ?event.kind, "turn applied");
        self.after_table_change(Some(event)).await;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Hand lifecycle
    // -----------------------------------------------------------------------

    async fn on_timeout(&mut self, fired: TimerFired) {
        let Some(table) = self.table.as_mut() else {
            return;
        };
        if self.status != SessionStatus::InProgress {
            return;
        }
        if fired.turn_seq != table.turn_seq() {
            tracing::trace!(code = %self.code, fired = fired.turn_seq, "stale turn timer");
            let (timeout, seq) =
                (table.settings().turn_timeout(), table.turn_seq());
            self.timer.arm(timeout, seq);
            return;
        }
        let Some(outcome) = table.apply_timeout() else {
            return;
        };
        tracing::info!(
            code = %self.code,
            player = %outcome.player,
            strikes = outcome.strikes,
            forfeited = outcome.forfeited,
            late_by_ms = fired.late_by.as_millis() as u64,
            "turn timed out"
        );

        if outcome.forfeited {
            let name = self
                .member(&outcome.player)
                .map_or_else(|| outcome.player.to_string(), |m| m.name.clone());
            self.dispatch(
                Recipient::All,
                ServerEvent::system(format!(
                    "{name} was removed after {} missed turns",
                    outcome.strikes
                )),
            );
        }

        match outcome.win {
            Some(win) => {
                self.broadcast_update(Some(outcome.event));
                self.after_table_change(Some(win)).await;
            }
            None => self.after_table_change(Some(outcome.event)).await,
        }
        self.publish().await;
    }

    /// Runs after every table mutation: checks card conservation, sends
    /// every member their view, then settles the hand or re-arms the
    /// turn timer.
    async fn after_table_change(&mut self, event: Option<GameEvent>) {
        let Some(table) = self.table.as_ref() else {
            return;
        };
        if let Err(e) = table.check_conservation() {
            tracing::error!(code = %self.code, error = %e, "table invariant violated, ending hand");
            self.abandon_hand("internal_error").await;
            return;
        }

        let finished = table.is_finished();
        let winner = table.winner().cloned();
        let seq = table.turn_seq();
        let timeout = table.settings().turn_timeout();

        self.broadcast_update(event);

        if finished {
            self.settle(winner).await;
        } else if self.timer.armed_for() != Some(seq) {
            self.timer.arm(timeout, seq);
        }
    }

    /// Pays the pot to the winner and ends the hand.
    async fn settle(&mut self, winner: Option<PlayerId>) {
        self.timer.disarm();
        self.status = SessionStatus::Ended;
        let pot = std::mem::take(&mut self.pot);
        match winner {
            Some(winner) => {
                tracing::info!(code = %self.code, %winner, pot, "hand won");
                self.pay_out(&winner, pot).await;
            }
            None => {
                tracing::warn!(code = %self.code, pot, "hand finished without a winner");
            }
        }
    }

    /// Ends the hand without a winner, refunding everyone still in
    /// rotation.
    async fn abandon_hand(&mut self, reason: &str) {
        self.timer.disarm();
        self.status = SessionStatus::Ended;
        self.pot = 0.0;
        let refunds = self
            .table
            .take()
            .map(|t| t.players_in_rotation())
            .unwrap_or_default();
        for player in &refunds {
            self.pay_out(player, self.options.buy_in).await;
        }

        self.dispatch(
            Recipient::All,
            ServerEvent::GameEnded {
                game_id: self.code.clone(),
                reason: reason.to_owned(),
                winner: None,
            },
        );
    }

    async fn pay_out(&self, player: &PlayerId, amount: f64) {
        if amount <= 0.0 {
            return;
        }
        if let Err(e) = self.ledger.credit(player, amount).await {
            tracing::error!(code = %self.code, %player, amount, error = %e, "ledger credit failed");
        }
    }

    // -----------------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------------

    fn snapshot_for(
        &self,
        player: &PlayerId,
        game_event: Option<GameEvent>,
    ) -> Option<ServerEvent> {
        let view = self.table.as_ref()?.view_for(player);
        Some(ServerEvent::GameUpdate {
            game_id: self.code.clone(),
            current_active_color: view.active_color,
            top_card: view.top_card,
            current_player: view.current_player,
            hand: view.hand,
            card_counts: view.card_counts,
            player_states: self.player_states(),
            direction: view.direction,
            game_event,
        })
    }

    /// Sends each connected member their own view of the table.
    fn broadcast_update(&self, event: Option<GameEvent>) {
        for member in self.members.iter().filter(|m| m.link.is_some()) {
            if let Some(update) = self.snapshot_for(&member.id, event.clone()) {
                self.send_to(member, update);
            }
        }
    }

    /// Dispatches an event to the addressed, connected members.
    fn dispatch(&self, recipient: Recipient, event: ServerEvent) {
        for member in self.members.iter().filter(|m| recipient.includes(&m.id)) {
            self.send_to(member, event.clone());
        }
    }

    /// Silently drops the event if the member is disconnected.
    fn send_to(&self, member: &Member, event: ServerEvent) {
        if let Some(link) = &member.link {
            let _ = link.sender.send(event);
        }
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------

    fn member(&self, player_id: &PlayerId) -> Option<&Member> {
        self.members.iter().find(|m| m.id == *player_id)
    }

    fn player_states(&self) -> BTreeMap<PlayerId, PlayerState> {
        self.members
            .iter()
            .map(|m| (m.id.clone(), m.state))
            .collect()
    }

    fn roster(&self) -> Roster {
        Roster {
            host_id: self.host.clone(),
            players: self.members.iter().map(|m| m.id.clone()).collect(),
            player_names: self
                .members
                .iter()
                .map(|m| (m.id.clone(), m.name.clone()))
                .collect(),
            player_states: self.player_states(),
        }
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            code: self.code.clone(),
            host_id: self.host.clone(),
            host_name: self
                .member(&self.host)
                .map(|m| m.name.clone())
                .unwrap_or_default(),
            player_count: self.members.len(),
            max_players: self.options.max_players,
            buy_in: self.options.buy_in,
            is_private: self.options.is_private,
            status: self.status,
        }
    }

    async fn publish(&self) {
        // An empty room is about to be retired by the registry.
        if self.members.is_empty() {
            return;
        }
        self.lobby.publish(self.info()).await;
    }
}

/// Spawns a room actor with `host` as its only member and returns a
/// handle to it. The host's buy-in must already be taken.
///
/// `channel_size` bounds the command queue; senders wait when it fills.
pub(crate) fn spawn_room<L: Ledger>(
    code: RoomCode,
    host: Occupant,
    options: RoomOptions,
    ledger: Arc<L>,
    lobby: Arc<LobbyBoard>,
    channel_size: usize,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(channel_size);

    let Occupant {
        player_id,
        name,
        conn,
        sender,
    } = host;
    let actor = RoomActor {
        code: code.clone(),
        options,
        settings: GameSettings::default(),
        status: SessionStatus::Waiting,
        host: player_id.clone(),
        members: vec![Member {
            id: player_id,
            name,
            state: PlayerState::Ready,
            link: Some(Link { conn, sender }),
            staked: true,
        }],
        table: None,
        pot: 0.0,
        timer: TurnTimer::new(),
        ledger,
        lobby,
        receiver: rx,
    };

    tokio::spawn(actor.run());

    RoomHandle { code, sender: tx }
}

#[cfg(test)]
mod tests {
    use unotable_protocol::Card;
    use unotable_rules::Layout;

    use super::*;
    use crate::InMemoryLedger;

    type Events = mpsc::UnboundedReceiver<ServerEvent>;

    fn card(code: &str) -> Card {
        code.parse().unwrap()
    }

    fn playing(id: &str, conn: u64) -> (Member, Events) {
        let (sender, rx) = mpsc::unbounded_channel();
        let member = Member {
            id: PlayerId::from(id),
            name: id.to_owned(),
            state: PlayerState::Playing,
            link: Some(Link {
                conn: ConnectionId::new(conn),
                sender,
            }),
            staked: false,
        };
        (member, rx)
    }

    /// An in-progress room whose table has lost a card.
    fn broken_room(
        ledger: Arc<InMemoryLedger>,
        members: Vec<Member>,
    ) -> RoomActor<InMemoryLedger> {
        let mut table = Table::from_layout(Layout {
            hands: members
                .iter()
                .map(|m| (m.id.clone(), vec![card("R-1"), card("B-2")]))
                .collect(),
            top: card("R-5"),
            draw_pile: vec![card("G-3"), card("Y-4")],
            discard: Vec::new(),
            active_color: None,
            settings: GameSettings::default(),
        })
        .unwrap();
        assert!(table.lose_card().is_some());

        let (_tx, rx) = mpsc::channel(1);
        RoomActor {
            code: RoomCode::parse("ABCD").unwrap(),
            options: RoomOptions {
                max_players: 4,
                buy_in: 2.0,
                is_private: false,
            },
            settings: GameSettings::default(),
            status: SessionStatus::InProgress,
            host: members[0].id.clone(),
            pot: 2.0 * members.len() as f64,
            members,
            table: Some(table),
            timer: TurnTimer::new(),
            ledger,
            lobby: Arc::new(LobbyBoard::new()),
            receiver: rx,
        }
    }

    #[tokio::test]
    async fn test_lost_card_ends_hand_with_internal_error_and_refunds() {
        let ledger = Arc::new(InMemoryLedger::new(10.0));
        let (h, mut h_rx) = playing("h", 1);
        let (p2, mut p_rx) = playing("p2", 2);
        for member in [&h, &p2] {
            ledger.debit(&member.id, 2.0).await.unwrap();
        }
        let mut room = broken_room(Arc::clone(&ledger), vec![h, p2]);

        room.after_table_change(None).await;

        assert_eq!(room.status, SessionStatus::Ended);
        assert!(room.table.is_none());
        assert_eq!(room.pot, 0.0);
        assert_eq!(room.timer.armed_for(), None);
        for rx in [&mut h_rx, &mut p_rx] {
            match rx.try_recv().unwrap() {
                ServerEvent::GameEnded {
                    game_id,
                    reason,
                    winner,
                } => {
                    assert_eq!(game_id.as_str(), "ABCD");
                    assert_eq!(reason, "internal_error");
                    assert_eq!(winner, None);
                }
                other => panic!("expected game_ended, got {other:?}"),
            }
            assert!(rx.try_recv().is_err(), "no update after the failure");
        }
        assert_eq!(ledger.balance(&PlayerId::from("h")).await, 10.0);
        assert_eq!(ledger.balance(&PlayerId::from("p2")).await, 10.0);
    }
}

use engine::{InputAction, InputSnapshot, Scene, SceneCommand};
use rand::rngs::StdRng;
use tracing::{debug, info};

use super::battle::{BattleCommand, BattleSession, TrainerBattle, WildBattle};
use super::entities::Entity;
use super::remote::{ChatBubbles, RemotePlayerView};
use super::shop::{FeaturedItem, StockSource};
use super::state::GameState;
use crate::app::online::{PlayerId, PlayerUpdate, SharedOnline};

pub const PLAYER_SPRITE: &str = "character/ow1.png";

/// Connection to the presence poller as seen from the simulation.
#[derive(Debug, Clone)]
pub struct OnlineLink {
    pub shared: SharedOnline,
    pub local_id: Option<PlayerId>,
}

/// Battle key map: Interact attacks, Encounter throws a ball, Up, Left and
/// Right use the heal, strength and defense potions, Down runs.
fn battle_command(input: &InputSnapshot) -> Option<BattleCommand> {
    [
        (InputAction::Interact, BattleCommand::Attack),
        (InputAction::Encounter, BattleCommand::Capture),
        (InputAction::MoveUp, BattleCommand::HealPotion),
        (InputAction::MoveLeft, BattleCommand::StrengthPotion),
        (InputAction::MoveRight, BattleCommand::DefensePotion),
        (InputAction::MoveDown, BattleCommand::Run),
    ]
    .into_iter()
    .find(|(action, _)| input.was_pressed(*action))
    .map(|(_, command)| command)
}

/// Overworld scene. While a battle is active the overworld is suspended
/// and input drives the battle instead.
pub struct GameplayScene {
    state: GameState,
    battle: Option<BattleSession>,
    featured: Option<FeaturedItem>,
    battle_triggered: bool,
    rng: StdRng,
    online: Option<OnlineLink>,
    remote_view: RemotePlayerView,
    chat: ChatBubbles,
}

impl GameplayScene {
    pub fn new(state: GameState, rng: StdRng) -> Self {
        Self {
            state,
            battle: None,
            featured: None,
            battle_triggered: false,
            rng,
            online: None,
            remote_view: RemotePlayerView::default(),
            chat: ChatBubbles::default(),
        }
    }

    pub fn with_online(mut self, link: OnlineLink) -> Self {
        self.online = Some(link);
        self
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut GameState {
        &mut self.state
    }

    pub fn into_state(self) -> GameState {
        self.state
    }

    pub fn battle(&self) -> Option<&BattleSession> {
        self.battle.as_ref()
    }

    pub fn featured_item(&self) -> Option<&FeaturedItem> {
        self.featured.as_ref()
    }

    pub fn remote_view(&self) -> &RemotePlayerView {
        &self.remote_view
    }

    pub fn chat_bubbles(&self) -> &ChatBubbles {
        &self.chat
    }

    /// Queues a chat line for the poller. False when offline.
    pub fn send_chat(&self, text: &str) -> bool {
        match &self.online {
            Some(link) if link.local_id.is_some() && !text.is_empty() => {
                link.shared.queue_chat(text);
                true
            }
            _ => false,
        }
    }

    fn start_battle(&mut self, session: BattleSession) {
        if self.state.autowalk.interrupt() {
            info!("navigation_interrupted_by_battle");
        }
        self.featured = None;
        self.battle = Some(session);
    }

    fn update_battle(&mut self, dt: f32, input: &InputSnapshot) {
        let Some(battle) = self.battle.as_mut() else {
            return;
        };
        let mut outcome = battle_command(input)
            .and_then(|command| battle.apply(command, &mut self.state.bag, &mut self.rng));
        if outcome.is_none() {
            outcome = battle.update(dt, &mut self.state.bag);
        }
        if let Some(outcome) = outcome {
            info!(outcome = ?outcome, coins = self.state.bag.coins(), "battle_exited");
            self.battle = None;
        }
    }

    fn update_movement(&mut self, dt: f32, input: &InputSnapshot) {
        if input.has_movement_input() {
            if self.state.autowalk.interrupt() {
                info!("navigation_interrupted_by_input");
            }
            self.state.move_player(dt, input.movement_axes());
        } else if self.state.autowalk.is_navigating() {
            self.state.advance_autowalk(dt);
        } else {
            self.state.move_player(dt, (0, 0));
        }
    }

    fn update_interaction(&mut self, input: &InputSnapshot) {
        let detected_npc = self.state.detected_shop_npc_index();
        if let Some(featured) = &self.featured {
            let still_in_front = match featured.source {
                StockSource::Npc(index) => detected_npc == Some(index),
                StockSource::General => true,
            };
            if !still_in_front {
                debug!("shop_closed");
                self.featured = None;
            } else if input.was_pressed(InputAction::Interact) {
                let featured = featured.clone();
                self.state.purchase_featured(&featured);
            }
            return;
        }

        if !input.was_pressed(InputAction::Interact) {
            return;
        }
        if let Some(trainer) = self.state.detected_trainer() {
            let Some(opponent) = trainer.lead_monster().cloned() else {
                debug!("trainer_has_no_monsters");
                return;
            };
            if let Some(battle) = TrainerBattle::start(&self.state.bag, &opponent) {
                self.start_battle(BattleSession::Trainer(battle));
            }
            return;
        }
        if let Some(index) = detected_npc {
            self.featured = self.state.open_npc_shop(Some(index), &mut self.rng);
        }
    }

    /// Tall grass starts at most one wild battle per visit; the latch only
    /// resets once the player is out of the grass.
    fn update_encounter(&mut self, input: &InputSnapshot) {
        if !self.state.player_in_encounter_zone() {
            self.battle_triggered = false;
            return;
        }
        if self.battle_triggered || !input.was_pressed(InputAction::Encounter) {
            return;
        }
        self.battle_triggered = true;
        if let Some(battle) = WildBattle::start(&self.state.bag, &mut self.rng) {
            self.start_battle(BattleSession::Wild(battle));
        }
    }

    fn sync_online(&mut self, dt: f32) {
        let Some(link) = &self.online else {
            return;
        };
        if let Some(id) = link.local_id {
            let player = self.state.player();
            link.shared.queue_position(PlayerUpdate {
                id,
                x: player.position().x,
                y: player.position().y,
                map: self.state.current_map_key().to_string(),
                direction: Some(player.facing().as_lower().to_string()),
                sprite: Some(PLAYER_SPRITE.to_string()),
            });
        }
        let snapshot = link.shared.snapshot();
        self.remote_view.update(&snapshot.roster, dt);
        self.chat.advance(dt);
        self.chat.ingest(&snapshot.chat);
    }
}

impl Scene for GameplayScene {
    fn load(&mut self) {
        let position = self.state.player().position();
        info!(
            map = self.state.current_map_key(),
            x = position.x,
            y = position.y,
            monsters = self.state.bag.monsters.len(),
            online = self.online.is_some(),
            "overworld_loaded"
        );
    }

    fn update(&mut self, fixed_dt_seconds: f32, input: &InputSnapshot) -> SceneCommand {
        self.state.shop.tick(fixed_dt_seconds * 1000.0);

        if self.battle.is_some() {
            self.update_battle(fixed_dt_seconds, input);
            self.sync_online(fixed_dt_seconds);
            return SceneCommand::None;
        }

        self.update_movement(fixed_dt_seconds, input);
        self.state.refresh_detection();
        self.update_interaction(input);
        if self.battle.is_none() {
            self.update_encounter(input);
        }
        self.state.check_teleport_trigger();
        self.sync_online(fixed_dt_seconds);

        if self.state.try_switch_map() {
            self.featured = None;
        }
        SceneCommand::None
    }

    fn unload(&mut self) {
        let position = self.state.player().position();
        info!(
            map = self.state.current_map_key(),
            x = position.x,
            y = position.y,
            coins = self.state.bag.coins(),
            "overworld_unloaded"
        );
    }

    fn debug_title(&self) -> Option<String> {
        Some(format!("overworld {}", self.state.current_map_key()))
    }
}

//! Turn-based battles: trainer battles and wild capture battles.
//!
//! Both variants are explicit state machines advanced once per tick by
//! [`BattleSession::update`]. Animation windows are countdowns, never
//! sleeps; while one is running every control is disabled so a command
//! cannot be submitted twice. Monster HP is session-local until the battle
//! exits, when the player's HP is written back into the first bag monster.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info, warn};

use super::bag::{Bag, MonsterRecord};

pub const ATTACK_ANIMATION_SECONDS: f32 = 1.0;
pub const TERMINAL_DISPLAY_SECONDS: f32 = 2.0;

pub const HEAL_POTION: &str = "Heal Potion";
pub const ATTACK_POTION: &str = "Attack Potion";
pub const DEFENSE_POTION: &str = "Defense Potion";

const TRAINER_PLAYER_DAMAGE: i32 = 30;
const TRAINER_ENEMY_DAMAGE: i32 = 20;
const TRAINER_WIN_COINS: u32 = 10;
const HEAL_AMOUNT: i32 = 20;
const STRENGTH_BUFF: i32 = 20;
const DEFENSE_BUFF: i32 = 15;

const WILD_PLAYER_DAMAGE: i32 = 30;
const WILD_ENEMY_DAMAGE: i32 = 20;
const WILD_DEFEAT_COINS: u32 = 5;
const CAPTURE_BASE_PERCENT: f32 = 25.0;

struct WildTemplate {
    name: &'static str,
    sprite_path: &'static str,
    base_hp: i32,
    base_level: u32,
}

const WILD_TEMPLATES: [WildTemplate; 6] = [
    WildTemplate {
        name: "Pikachu",
        sprite_path: "menu_sprites/menusprite1.png",
        base_hp: 80,
        base_level: 5,
    },
    WildTemplate {
        name: "Charizard",
        sprite_path: "menu_sprites/menusprite2.png",
        base_hp: 150,
        base_level: 10,
    },
    WildTemplate {
        name: "Blastoise",
        sprite_path: "menu_sprites/menusprite3.png",
        base_hp: 140,
        base_level: 10,
    },
    WildTemplate {
        name: "Venusaur",
        sprite_path: "menu_sprites/menusprite4.png",
        base_hp: 145,
        base_level: 10,
    },
    WildTemplate {
        name: "Gengar",
        sprite_path: "menu_sprites/menusprite5.png",
        base_hp: 90,
        base_level: 8,
    },
    WildTemplate {
        name: "Dragonite",
        sprite_path: "menu_sprites/menusprite6.png",
        base_hp: 160,
        base_level: 15,
    },
];

impl WildTemplate {
    fn spawn(&self) -> MonsterRecord {
        MonsterRecord {
            name: self.name.to_string(),
            hp: self.base_hp,
            max_hp: self.base_hp,
            level: self.base_level,
            sprite_path: self.sprite_path.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    PlayerTurn,
    PlayerAttackAnimation,
    EnemyAttackAnimation,
    /// Trainer battle over; waits for the player to leave.
    End,
    EndDefeat,
    EndCapture,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BattleControls {
    pub attack: bool,
    pub run: bool,
    pub heal: bool,
    pub strength: bool,
    pub defense: bool,
    pub capture: bool,
}

impl BattleControls {
    fn disabled() -> Self {
        Self::default()
    }

    fn trainer_turn(bag: &Bag) -> Self {
        Self {
            attack: true,
            run: true,
            heal: bag.item_count(HEAL_POTION) > 0,
            strength: bag.item_count(ATTACK_POTION) > 0,
            defense: bag.item_count(DEFENSE_POTION) > 0,
            capture: false,
        }
    }

    fn wild_turn() -> Self {
        Self {
            attack: true,
            run: true,
            capture: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PotionOutcome {
    Applied,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BattleOutcome {
    Won,
    Lost,
    Captured,
    Fled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BattleCommand {
    Attack,
    Capture,
    HealPotion,
    StrengthPotion,
    DefensePotion,
    Run,
}

/// Percent chance that a capture attempt succeeds: 25 scaled by how hurt
/// the target is, the multiplier clamped to `0.1..=1.0`.
pub fn capture_chance(current_hp: i32, max_hp: i32) -> f32 {
    let ratio = if max_hp > 0 {
        current_hp.max(0) as f32 / max_hp as f32
    } else {
        0.0
    };
    let multiplier = (1.0 - ratio * 0.9).clamp(0.1, 1.0);
    CAPTURE_BASE_PERCENT * multiplier
}

/// Fields shared by both variants.
#[derive(Debug, Clone, PartialEq)]
struct Combatants {
    player: MonsterRecord,
    enemy: MonsterRecord,
    state: TurnState,
    timer: f32,
    controls: BattleControls,
}

impl Combatants {
    fn new(player: MonsterRecord, enemy: MonsterRecord, controls: BattleControls) -> Self {
        Self {
            player,
            enemy,
            state: TurnState::PlayerTurn,
            timer: 0.0,
            controls,
        }
    }

    fn enter_animation(&mut self, state: TurnState, seconds: f32) {
        self.state = state;
        self.timer = seconds;
        self.controls = BattleControls::disabled();
    }

    /// Counts the timer down; true once it has expired.
    fn countdown(&mut self, dt: f32) -> bool {
        self.timer -= dt;
        self.timer <= 0.0
    }

    fn write_back(&self, bag: &mut Bag) {
        if let Some(lead) = bag.lead_monster_mut() {
            lead.hp = self.player.hp;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainerBattle {
    core: Combatants,
    strength_buff: i32,
    defense_buff: i32,
}

impl TrainerBattle {
    /// Copies the bag's lead monster and the trainer's lead monster. Either
    /// side missing a monster means no battle.
    pub fn start(bag: &Bag, opponent: &MonsterRecord) -> Option<Self> {
        let Some(player) = bag.lead_monster() else {
            warn!("battle_skipped_no_player_monster");
            return None;
        };
        info!(
            player = player.name.as_str(),
            enemy = opponent.name.as_str(),
            "trainer_battle_started"
        );
        Some(Self {
            core: Combatants::new(
                player.clone(),
                opponent.clone(),
                BattleControls::trainer_turn(bag),
            ),
            strength_buff: 0,
            defense_buff: 0,
        })
    }

    pub fn state(&self) -> TurnState {
        self.core.state
    }

    pub fn controls(&self) -> BattleControls {
        self.core.controls
    }

    pub fn player_monster(&self) -> &MonsterRecord {
        &self.core.player
    }

    pub fn enemy_monster(&self) -> &MonsterRecord {
        &self.core.enemy
    }

    pub fn strength_buff(&self) -> i32 {
        self.strength_buff
    }

    pub fn defense_buff(&self) -> i32 {
        self.defense_buff
    }

    pub fn attack(&mut self) -> bool {
        if self.core.state != TurnState::PlayerTurn {
            return false;
        }
        self.core
            .enter_animation(TurnState::PlayerAttackAnimation, ATTACK_ANIMATION_SECONDS);
        true
    }

    pub fn use_heal_potion(&mut self, bag: &mut Bag) -> PotionOutcome {
        if !self.consume_on_turn(bag, HEAL_POTION) {
            return PotionOutcome::Rejected;
        }
        let player = &mut self.core.player;
        player.hp = (player.hp + HEAL_AMOUNT).min(player.max_hp);
        self.core
            .enter_animation(TurnState::EnemyAttackAnimation, ATTACK_ANIMATION_SECONDS);
        PotionOutcome::Applied
    }

    pub fn use_strength_potion(&mut self, bag: &mut Bag) -> PotionOutcome {
        if !self.consume_on_turn(bag, ATTACK_POTION) {
            return PotionOutcome::Rejected;
        }
        self.strength_buff += STRENGTH_BUFF;
        self.core
            .enter_animation(TurnState::EnemyAttackAnimation, ATTACK_ANIMATION_SECONDS);
        PotionOutcome::Applied
    }

    pub fn use_defense_potion(&mut self, bag: &mut Bag) -> PotionOutcome {
        if !self.consume_on_turn(bag, DEFENSE_POTION) {
            return PotionOutcome::Rejected;
        }
        self.defense_buff += DEFENSE_BUFF;
        self.core
            .enter_animation(TurnState::EnemyAttackAnimation, ATTACK_ANIMATION_SECONDS);
        PotionOutcome::Applied
    }

    fn consume_on_turn(&self, bag: &mut Bag, item: &str) -> bool {
        self.core.state == TurnState::PlayerTurn && bag.consume_item(item, 1)
    }

    /// Leaves the battle when the run control is enabled, writing the
    /// player's HP back into the bag.
    pub fn run(&mut self, bag: &mut Bag) -> Option<BattleOutcome> {
        if !self.core.controls.run {
            return None;
        }
        self.core.write_back(bag);
        let outcome = match self.core.state {
            TurnState::End if self.core.enemy.is_fainted() => BattleOutcome::Won,
            TurnState::End => BattleOutcome::Lost,
            _ => BattleOutcome::Fled,
        };
        info!(outcome = ?outcome, "trainer_battle_exited");
        Some(outcome)
    }

    pub fn update(&mut self, dt: f32, bag: &mut Bag) {
        let state = self.core.state;
        match state {
            TurnState::PlayerAttackAnimation if self.core.countdown(dt) => {
                let damage = TRAINER_PLAYER_DAMAGE + self.strength_buff;
                self.strength_buff = 0;
                self.core.enemy.hp -= damage;
                debug!(damage, enemy_hp = self.core.enemy.hp, "player_attack_resolved");
                if self.core.enemy.hp <= 0 {
                    self.core.enemy.hp = 0;
                    bag.add_coins(TRAINER_WIN_COINS);
                    self.core.state = TurnState::End;
                    self.core.controls = BattleControls::trainer_turn(bag);
                } else {
                    self.core
                        .enter_animation(TurnState::EnemyAttackAnimation, ATTACK_ANIMATION_SECONDS);
                }
            }
            TurnState::EnemyAttackAnimation if self.core.countdown(dt) => {
                let damage = (TRAINER_ENEMY_DAMAGE - self.defense_buff).max(0);
                self.defense_buff = 0;
                self.core.player.hp -= damage;
                debug!(damage, player_hp = self.core.player.hp, "enemy_attack_resolved");
                if self.core.player.hp <= 0 {
                    self.core.player.hp = 0;
                    self.core.state = TurnState::End;
                } else {
                    self.core.state = TurnState::PlayerTurn;
                }
                self.core.controls = BattleControls::trainer_turn(bag);
            }
            _ => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WildBattle {
    core: Combatants,
}

impl WildBattle {
    /// Picks a random wild monster to face the bag's lead monster.
    pub fn start(bag: &Bag, rng: &mut impl Rng) -> Option<Self> {
        let Some(player) = bag.lead_monster() else {
            warn!("battle_skipped_no_player_monster");
            return None;
        };
        let template = WILD_TEMPLATES.choose(rng)?;
        info!(
            player = player.name.as_str(),
            wild = template.name,
            "wild_battle_started"
        );
        Some(Self::against(player.clone(), template.spawn()))
    }

    pub fn against(player: MonsterRecord, wild: MonsterRecord) -> Self {
        Self {
            core: Combatants::new(player, wild, BattleControls::wild_turn()),
        }
    }

    pub fn state(&self) -> TurnState {
        self.core.state
    }

    pub fn controls(&self) -> BattleControls {
        self.core.controls
    }

    pub fn player_monster(&self) -> &MonsterRecord {
        &self.core.player
    }

    pub fn wild_monster(&self) -> &MonsterRecord {
        &self.core.enemy
    }

    pub fn attack(&mut self) -> bool {
        if self.core.state != TurnState::PlayerTurn {
            return false;
        }
        self.core
            .enter_animation(TurnState::PlayerAttackAnimation, ATTACK_ANIMATION_SECONDS);
        true
    }

    /// Rolls a capture. Success adds the wild monster to the bag at its
    /// current HP; failure hands the turn to the wild monster. Returns
    /// `None` outside the player's turn.
    pub fn capture(&mut self, bag: &mut Bag, rng: &mut impl Rng) -> Option<bool> {
        if self.core.state != TurnState::PlayerTurn {
            return None;
        }
        let chance = capture_chance(self.core.enemy.hp, self.core.enemy.max_hp);
        let roll: f32 = rng.gen_range(0.0..100.0);
        let captured = roll < chance;
        debug!(chance, roll, captured, "capture_rolled");
        if captured {
            bag.monsters.push(self.core.enemy.clone());
            self.core
                .enter_animation(TurnState::EndCapture, TERMINAL_DISPLAY_SECONDS);
        } else {
            self.core
                .enter_animation(TurnState::EnemyAttackAnimation, ATTACK_ANIMATION_SECONDS);
        }
        Some(captured)
    }

    pub fn run(&mut self, bag: &mut Bag) -> Option<BattleOutcome> {
        if !self.core.controls.run {
            return None;
        }
        self.core.write_back(bag);
        info!("wild_battle_fled");
        Some(BattleOutcome::Fled)
    }

    /// Advances the current countdown. Returns the outcome once a terminal
    /// display window has elapsed.
    pub fn update(&mut self, dt: f32, bag: &mut Bag) -> Option<BattleOutcome> {
        let state = self.core.state;
        match state {
            TurnState::PlayerAttackAnimation if self.core.countdown(dt) => {
                self.core.enemy.hp -= WILD_PLAYER_DAMAGE;
                if self.core.enemy.hp <= 0 {
                    self.core.enemy.hp = 0;
                    bag.add_coins(WILD_DEFEAT_COINS);
                    self.core
                        .enter_animation(TurnState::EndDefeat, TERMINAL_DISPLAY_SECONDS);
                } else {
                    self.core
                        .enter_animation(TurnState::EnemyAttackAnimation, ATTACK_ANIMATION_SECONDS);
                }
                None
            }
            TurnState::EnemyAttackAnimation if self.core.countdown(dt) => {
                self.core.player.hp -= WILD_ENEMY_DAMAGE;
                if self.core.player.hp <= 0 {
                    self.core.player.hp = 0;
                    self.core
                        .enter_animation(TurnState::EndDefeat, TERMINAL_DISPLAY_SECONDS);
                } else {
                    self.core.state = TurnState::PlayerTurn;
                    self.core.controls = BattleControls::wild_turn();
                }
                None
            }
            TurnState::EndDefeat | TurnState::EndCapture if self.core.countdown(dt) => {
                self.core.write_back(bag);
                let outcome = match self.core.state {
                    TurnState::EndCapture => BattleOutcome::Captured,
                    _ if self.core.player.is_fainted() => BattleOutcome::Lost,
                    _ => BattleOutcome::Won,
                };
                info!(outcome = ?outcome, "wild_battle_finished");
                Some(outcome)
            }
            _ => None,
        }
    }
}

/// The battle currently suspending the overworld.
#[derive(Debug, Clone, PartialEq)]
pub enum BattleSession {
    Trainer(TrainerBattle),
    Wild(WildBattle),
}

impl BattleSession {
    pub fn state(&self) -> TurnState {
        match self {
            Self::Trainer(battle) => battle.state(),
            Self::Wild(battle) => battle.state(),
        }
    }

    pub fn controls(&self) -> BattleControls {
        match self {
            Self::Trainer(battle) => battle.controls(),
            Self::Wild(battle) => battle.controls(),
        }
    }

    /// Applies one player command. Commands the current variant or state
    /// does not accept are ignored. Returns an outcome when the command
    /// left the battle.
    pub fn apply(
        &mut self,
        command: BattleCommand,
        bag: &mut Bag,
        rng: &mut impl Rng,
    ) -> Option<BattleOutcome> {
        match (self, command) {
            (Self::Trainer(battle), BattleCommand::Attack) => {
                battle.attack();
                None
            }
            (Self::Trainer(battle), BattleCommand::HealPotion) => {
                battle.use_heal_potion(bag);
                None
            }
            (Self::Trainer(battle), BattleCommand::StrengthPotion) => {
                battle.use_strength_potion(bag);
                None
            }
            (Self::Trainer(battle), BattleCommand::DefensePotion) => {
                battle.use_defense_potion(bag);
                None
            }
            (Self::Trainer(battle), BattleCommand::Run) => battle.run(bag),
            (Self::Wild(battle), BattleCommand::Attack) => {
                battle.attack();
                None
            }
            (Self::Wild(battle), BattleCommand::Capture) => {
                battle.capture(bag, rng);
                None
            }
            (Self::Wild(battle), BattleCommand::Run) => battle.run(bag),
            _ => None,
        }
    }

    pub fn update(&mut self, dt: f32, bag: &mut Bag) -> Option<BattleOutcome> {
        match self {
            Self::Trainer(battle) => {
                battle.update(dt, bag);
                None
            }
            Self::Wild(battle) => battle.update(dt, bag),
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::app::gameplay::bag::ItemRecord;

    fn monster(name: &str, hp: i32, max_hp: i32) -> MonsterRecord {
        MonsterRecord {
            name: name.to_string(),
            hp,
            max_hp,
            level: 5,
            sprite_path: String::new(),
        }
    }

    fn bag_with(items: &[(&str, u32)]) -> Bag {
        Bag::new(
            vec![monster("Pikachu", 80, 100)],
            items
                .iter()
                .map(|(name, count)| ItemRecord::new(*name, *count, ""))
                .collect(),
        )
    }

    fn run_until_state(battle: &mut TrainerBattle, bag: &mut Bag, state: TurnState) {
        for _ in 0..10 {
            if battle.state() == state {
                return;
            }
            battle.update(0.5, bag);
        }
        assert_eq!(battle.state(), state);
    }

    #[test]
    fn capture_chance_bounds_and_monotonicity() {
        assert!((capture_chance(100, 100) - 2.5).abs() < 1e-4);
        assert!((capture_chance(0, 100) - 25.0).abs() < 1e-4);
        let mut previous = f32::INFINITY;
        for hp in 0..=100 {
            let chance = capture_chance(hp, 100);
            assert!(chance <= previous + 1e-6, "hp {hp}");
            assert!((2.5..=25.0).contains(&chance));
            previous = chance;
        }
    }

    #[test]
    fn strength_buff_adds_twenty_damage_once() {
        let mut bag = bag_with(&[(ATTACK_POTION, 1)]);
        let mut battle = TrainerBattle::start(&bag, &monster("Gengar", 200, 200)).expect("battle");

        assert_eq!(battle.use_strength_potion(&mut bag), PotionOutcome::Applied);
        assert_eq!(bag.item_count(ATTACK_POTION), 0);
        assert_eq!(battle.strength_buff(), 20);
        assert_eq!(battle.state(), TurnState::EnemyAttackAnimation);
        assert_eq!(battle.controls(), BattleControls::default());

        run_until_state(&mut battle, &mut bag, TurnState::PlayerTurn);
        assert!(battle.attack());
        run_until_state(&mut battle, &mut bag, TurnState::EnemyAttackAnimation);
        assert_eq!(battle.enemy_monster().hp, 150);
        assert_eq!(battle.strength_buff(), 0);

        run_until_state(&mut battle, &mut bag, TurnState::PlayerTurn);
        battle.attack();
        run_until_state(&mut battle, &mut bag, TurnState::EnemyAttackAnimation);
        assert_eq!(battle.enemy_monster().hp, 120);
    }

    #[test]
    fn animation_resolves_exactly_once_after_countdown() {
        let mut bag = bag_with(&[]);
        let mut battle = TrainerBattle::start(&bag, &monster("Gengar", 200, 200)).expect("battle");
        battle.attack();
        battle.update(0.6, &mut bag);
        assert_eq!(battle.enemy_monster().hp, 200);
        assert!(!battle.attack(), "attack ignored during animation");
        battle.update(0.6, &mut bag);
        assert_eq!(battle.enemy_monster().hp, 170);
        assert_eq!(battle.state(), TurnState::EnemyAttackAnimation);
    }

    #[test]
    fn defense_buff_floors_enemy_damage_and_resets() {
        let mut bag = bag_with(&[(DEFENSE_POTION, 2)]);
        let mut battle = TrainerBattle::start(&bag, &monster("Gengar", 200, 200)).expect("battle");
        battle.use_defense_potion(&mut bag);
        run_until_state(&mut battle, &mut bag, TurnState::PlayerTurn);
        assert_eq!(battle.player_monster().hp, 75);
        assert_eq!(battle.defense_buff(), 0);
        assert!(battle.controls().defense);

        battle.use_defense_potion(&mut bag);
        assert!(!battle.controls().defense);
        battle.update(1.0, &mut bag);
        assert_eq!(battle.player_monster().hp, 70);
        assert!(!battle.controls().defense, "no potions left");
    }

    #[test]
    fn potion_without_stock_is_a_no_op() {
        let mut bag = bag_with(&[(HEAL_POTION, 0)]);
        let mut battle = TrainerBattle::start(&bag, &monster("Gengar", 200, 200)).expect("battle");
        assert!(!battle.controls().heal);
        assert_eq!(battle.use_heal_potion(&mut bag), PotionOutcome::Rejected);
        assert_eq!(battle.state(), TurnState::PlayerTurn);
        assert_eq!(battle.player_monster().hp, 80);
    }

    #[test]
    fn heal_caps_at_max_hp() {
        let mut bag = bag_with(&[(HEAL_POTION, 1)]);
        let mut battle = TrainerBattle::start(&bag, &monster("Gengar", 200, 200)).expect("battle");
        assert_eq!(battle.use_heal_potion(&mut bag), PotionOutcome::Applied);
        assert_eq!(battle.player_monster().hp, 100);
    }

    #[test]
    fn trainer_win_rewards_coins_and_writes_back_hp() {
        let mut bag = bag_with(&[]);
        let mut battle = TrainerBattle::start(&bag, &monster("Gengar", 30, 30)).expect("battle");
        battle.attack();
        battle.update(1.0, &mut bag);
        assert_eq!(battle.state(), TurnState::End);
        assert_eq!(battle.enemy_monster().hp, 0);
        assert_eq!(bag.coins(), 10);
        assert!(!battle.attack());

        assert_eq!(battle.run(&mut bag), Some(BattleOutcome::Won));
        assert_eq!(bag.monsters[0].hp, 80);
    }

    #[test]
    fn run_is_refused_mid_animation() {
        let mut bag = bag_with(&[]);
        let mut battle = TrainerBattle::start(&bag, &monster("Gengar", 300, 300)).expect("battle");
        battle.attack();
        assert_eq!(battle.run(&mut bag), None);
    }

    #[test]
    fn trainer_loss_ends_battle() {
        let mut bag = Bag::new(vec![monster("Pikachu", 15, 100)], Vec::new());
        let mut battle = TrainerBattle::start(&bag, &monster("Gengar", 300, 300)).expect("battle");
        battle.attack();
        battle.update(1.0, &mut bag);
        battle.update(1.0, &mut bag);
        assert_eq!(battle.state(), TurnState::End);
        assert_eq!(battle.player_monster().hp, 0);
        assert_eq!(battle.run(&mut bag), Some(BattleOutcome::Lost));
        assert_eq!(bag.monsters[0].hp, 0);
    }

    #[test]
    fn no_lead_monster_means_no_battle() {
        let bag = Bag::default();
        assert!(TrainerBattle::start(&bag, &monster("Gengar", 1, 1)).is_none());
        let mut rng = StdRng::seed_from_u64(1);
        assert!(WildBattle::start(&bag, &mut rng).is_none());
    }

    #[test]
    fn wild_battle_picks_a_template() {
        let bag = bag_with(&[]);
        let mut rng = StdRng::seed_from_u64(42);
        let battle = WildBattle::start(&bag, &mut rng).expect("battle");
        let wild = battle.wild_monster();
        assert!(WILD_TEMPLATES.iter().any(|template| template.name == wild.name));
        assert_eq!(wild.hp, wild.max_hp);
        assert!(battle.controls().capture);
    }

    #[test]
    fn wild_defeat_pays_out_after_display_delay() {
        let mut bag = bag_with(&[]);
        let mut battle = WildBattle::against(bag.monsters[0].clone(), monster("Pikachu", 30, 80));
        battle.attack();
        assert_eq!(battle.update(1.0, &mut bag), None);
        assert_eq!(battle.state(), TurnState::EndDefeat);
        assert_eq!(bag.coins(), 5);
        assert_eq!(battle.update(1.5, &mut bag), None);
        assert_eq!(battle.update(0.5, &mut bag), Some(BattleOutcome::Won));
    }

    #[test]
    fn wild_loss_writes_fainted_hp_back() {
        let mut bag = Bag::new(vec![monster("Pikachu", 20, 100)], Vec::new());
        let mut battle = WildBattle::against(bag.monsters[0].clone(), monster("Dragonite", 160, 160));
        battle.attack();
        battle.update(1.0, &mut bag);
        battle.update(1.0, &mut bag);
        assert_eq!(battle.state(), TurnState::EndDefeat);
        assert_eq!(battle.update(2.0, &mut bag), Some(BattleOutcome::Lost));
        assert_eq!(bag.monsters[0].hp, 0);
    }

    #[test]
    fn capture_outcomes_follow_the_roll() {
        let mut bag = bag_with(&[]);
        let mut successes = 0;
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let mut battle =
                WildBattle::against(bag.monsters[0].clone(), monster("Gengar", 0, 90));
            match battle.capture(&mut bag, &mut rng) {
                Some(true) => {
                    successes += 1;
                    assert_eq!(battle.state(), TurnState::EndCapture);
                }
                Some(false) => assert_eq!(battle.state(), TurnState::EnemyAttackAnimation),
                None => panic!("capture refused on player turn"),
            }
            assert_eq!(battle.controls(), BattleControls::default());
        }
        assert_eq!(bag.monsters.len(), 1 + successes);
        assert!(successes > 20 && successes < 90, "successes {successes}");
    }

    #[test]
    fn captured_battle_exits_with_captured() {
        let mut bag = bag_with(&[]);
        let mut rng = StdRng::seed_from_u64(3);
        let outcome = loop {
            let mut battle =
                WildBattle::against(bag.monsters[0].clone(), monster("Gengar", 0, 90));
            if battle.capture(&mut bag, &mut rng) == Some(true) {
                break battle.update(TERMINAL_DISPLAY_SECONDS, &mut bag);
            }
        };
        assert_eq!(outcome, Some(BattleOutcome::Captured));
        assert_eq!(bag.monsters.last().map(|m| m.name.as_str()), Some("Gengar"));
    }

    #[test]
    fn session_ignores_commands_the_variant_lacks() {
        let mut bag = bag_with(&[(HEAL_POTION, 1)]);
        let mut rng = StdRng::seed_from_u64(0);
        let mut session =
            BattleSession::Wild(WildBattle::against(bag.monsters[0].clone(), monster("Gengar", 90, 90)));
        assert_eq!(session.apply(BattleCommand::HealPotion, &mut bag, &mut rng), None);
        assert_eq!(bag.item_count(HEAL_POTION), 1);
        assert_eq!(session.state(), TurnState::PlayerTurn);
        assert_eq!(
            session.apply(BattleCommand::Run, &mut bag, &mut rng),
            Some(BattleOutcome::Fled)
        );
    }
}

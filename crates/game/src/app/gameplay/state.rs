use std::collections::HashMap;

use engine::{find_path, Rect, TileCoord, Vec2};
use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::autowalk::AutowalkFollower;
use super::bag::{Bag, ItemRecord};
use super::entities::{Entity, Player, ShopNpc, Sighted, StationaryTrainer};
use super::map::GameMap;
use super::shop::{FeaturedItem, ShopState, StockSource};
use super::teleport::PendingTransition;

const DEFAULT_PLACES: [(&str, TileCoord); 3] = [
    ("ShopNPC", TileCoord::new(18, 29)),
    ("Gym", TileCoord::new(35, 25)),
    ("NewMap", TileCoord::new(24, 25)),
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("map '{0}' is not loaded")]
pub struct UnknownMap(pub String);

/// Result of a navigation request. None of these are errors: a request
/// that cannot start simply leaves manual control in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationOutcome {
    Started { waypoints: usize },
    AlreadyThere,
    UnknownPlace,
    OutsideMap,
    NoPath,
}

/// Simulation root: maps, the player, per-map entities, inventory, shop
/// stock, the pending map switch and the autowalk follower.
#[derive(Debug, Clone)]
pub struct GameState {
    maps: Vec<GameMap>,
    current: usize,
    player: Player,
    trainers: HashMap<String, Vec<StationaryTrainer>>,
    shop_npcs: HashMap<String, Vec<ShopNpc>>,
    pub bag: Bag,
    pub shop: ShopState,
    pub autowalk: AutowalkFollower,
    transition: PendingTransition,
    places: Vec<(String, TileCoord)>,
}

fn slice_for<'a, T>(by_map: &'a HashMap<String, Vec<T>>, key: &str) -> &'a [T] {
    by_map.get(key).map(Vec::as_slice).unwrap_or(&[])
}

fn blocked_by(
    map: &GameMap,
    trainers: &[StationaryTrainer],
    shop_npcs: &[ShopNpc],
    rect: Rect,
) -> bool {
    map.check_collision(rect)
        || trainers
            .iter()
            .any(|trainer| trainer.bounding_rect().intersects(&rect))
        || shop_npcs
            .iter()
            .any(|npc| npc.bounding_rect().intersects(&rect))
}

impl GameState {
    pub fn new(maps: Vec<GameMap>, current_map: &str, player: Player) -> Result<Self, UnknownMap> {
        let current = maps
            .iter()
            .position(|map| map.key() == current_map)
            .ok_or_else(|| UnknownMap(current_map.to_string()))?;
        Ok(Self {
            maps,
            current,
            player,
            trainers: HashMap::new(),
            shop_npcs: HashMap::new(),
            bag: Bag::default(),
            shop: ShopState::default(),
            autowalk: AutowalkFollower::default(),
            transition: PendingTransition::default(),
            places: DEFAULT_PLACES
                .iter()
                .map(|(name, tile)| (name.to_string(), *tile))
                .collect(),
        })
    }

    pub fn maps(&self) -> &[GameMap] {
        &self.maps
    }

    pub fn map(&self, key: &str) -> Option<&GameMap> {
        self.maps.iter().find(|map| map.key() == key)
    }

    pub fn current_map(&self) -> &GameMap {
        &self.maps[self.current]
    }

    pub fn current_map_key(&self) -> &str {
        self.current_map().key()
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut Player {
        &mut self.player
    }

    pub fn set_trainers(&mut self, map_key: &str, trainers: Vec<StationaryTrainer>) {
        self.trainers.insert(map_key.to_string(), trainers);
    }

    pub fn set_shop_npcs(&mut self, map_key: &str, shop_npcs: Vec<ShopNpc>) {
        self.shop_npcs.insert(map_key.to_string(), shop_npcs);
    }

    pub fn trainers_on(&self, map_key: &str) -> &[StationaryTrainer] {
        slice_for(&self.trainers, map_key)
    }

    pub fn shop_npcs_on(&self, map_key: &str) -> &[ShopNpc] {
        slice_for(&self.shop_npcs, map_key)
    }

    pub fn current_trainers(&self) -> &[StationaryTrainer] {
        self.trainers_on(self.current_map_key())
    }

    pub fn current_shop_npcs(&self) -> &[ShopNpc] {
        self.shop_npcs_on(self.current_map_key())
    }

    pub fn current_shop_npc_mut(&mut self, index: usize) -> Option<&mut ShopNpc> {
        let key = self.maps[self.current].key();
        self.shop_npcs.get_mut(key)?.get_mut(index)
    }

    /// Static tiles of the current map plus every trainer and shop NPC on it.
    pub fn check_collision(&self, rect: Rect) -> bool {
        blocked_by(
            self.current_map(),
            self.current_trainers(),
            self.current_shop_npcs(),
            rect,
        )
    }

    /// Walkability probe used by the pathfinder: a player-sized rectangle at
    /// the tile origin must not collide with anything.
    pub fn is_walkable(&self, tile: TileCoord) -> bool {
        !self.check_collision(Rect::at(tile.origin(), self.player.size()))
    }

    pub fn player_in_encounter_zone(&self) -> bool {
        self.current_map()
            .overlaps_encounter(self.player.bounding_rect())
    }

    /// One tick of manual movement against full collision.
    pub fn move_player(&mut self, dt: f32, raw_axes: (i32, i32)) {
        let map = &self.maps[self.current];
        let trainers = slice_for(&self.trainers, map.key());
        let shop_npcs = slice_for(&self.shop_npcs, map.key());
        self.player
            .apply_input(dt, raw_axes, |rect| blocked_by(map, trainers, shop_npcs, rect));
    }

    /// One tick of autowalk, against the current map's static tiles only.
    pub fn advance_autowalk(&mut self, dt: f32) {
        let map = &self.maps[self.current];
        self.autowalk
            .step(&mut self.player, dt, |rect| map.check_collision(rect));
    }

    pub fn refresh_detection(&mut self) {
        let player_rect = self.player.bounding_rect();
        let key = self.maps[self.current].key();
        if let Some(trainers) = self.trainers.get_mut(key) {
            for trainer in trainers {
                trainer.refresh_detection(player_rect);
            }
        }
        if let Some(shop_npcs) = self.shop_npcs.get_mut(key) {
            for npc in shop_npcs {
                npc.refresh_detection(player_rect);
            }
        }
    }

    pub fn detected_trainer(&self) -> Option<&StationaryTrainer> {
        self.current_trainers()
            .iter()
            .find(|trainer| trainer.is_detected())
    }

    pub fn detected_shop_npc_index(&self) -> Option<usize> {
        self.current_shop_npcs()
            .iter()
            .position(|npc| npc.is_detected())
    }

    pub fn pending_transition(&self) -> &PendingTransition {
        &self.transition
    }

    pub fn request_map_change(&mut self, teleporter: &super::map::Teleporter) -> bool {
        self.transition.request(teleporter)
    }

    /// Requests a switch when the player overlaps a teleporter of the current
    /// map. Suppressed while autowalk drives the player.
    pub fn check_teleport_trigger(&mut self) -> bool {
        if self.autowalk.is_navigating() || self.transition.is_pending() {
            return false;
        }
        let Some(teleporter) = self
            .current_map()
            .check_teleport(self.player.bounding_rect())
            .cloned()
        else {
            return false;
        };
        self.transition.request(&teleporter)
    }

    /// Commit point for a pending switch: reassigns the current map and
    /// moves the player to the grid-snapped destination. Returns whether a
    /// switch was applied.
    pub fn try_switch_map(&mut self) -> bool {
        let Some((destination, position)) = self.transition.take() else {
            return false;
        };
        let Some(index) = self.maps.iter().position(|map| map.key() == destination) else {
            warn!(
                destination = destination.as_str(),
                "teleport_destination_unknown"
            );
            return false;
        };
        let from = self.current;
        self.current = index;
        self.player.set_position(position.snapped_to_grid());
        info!(
            from = self.maps[from].key(),
            to = destination.as_str(),
            x = self.player.position().x,
            y = self.player.position().y,
            "map_switched"
        );
        true
    }

    pub fn places(&self) -> &[(String, TileCoord)] {
        &self.places
    }

    pub fn place(&self, name: &str) -> Option<TileCoord> {
        self.places
            .iter()
            .find(|(place, _)| place == name)
            .map(|(_, tile)| *tile)
    }

    pub fn select_place(&mut self, name: &str) -> NavigationOutcome {
        let Some(goal) = self.place(name) else {
            warn!(place = name, "navigation_unknown_place");
            return NavigationOutcome::UnknownPlace;
        };
        self.navigate_to(goal)
    }

    /// Fresh BFS from the player's tile to `goal`; any previous walk is
    /// discarded first.
    pub fn navigate_to(&mut self, goal: TileCoord) -> NavigationOutcome {
        self.autowalk.interrupt();
        let map = self.current_map();
        if !map.nav_grid().contains(goal) {
            warn!(x = goal.x, y = goal.y, "navigation_target_outside_map");
            return NavigationOutcome::OutsideMap;
        }
        let start = self.player.position().to_tile();
        let Some(mut path) = find_path(map.nav_grid(), start, goal, |tile| self.is_walkable(tile))
        else {
            warn!(
                start_x = start.x,
                start_y = start.y,
                goal_x = goal.x,
                goal_y = goal.y,
                "navigation_no_path"
            );
            return NavigationOutcome::NoPath;
        };
        if path.first() == Some(&start) {
            path.remove(0);
        }
        if path.is_empty() && self.player.position() == goal.origin() {
            return NavigationOutcome::AlreadyThere;
        }
        if path.is_empty() {
            path.push(goal);
        }
        let waypoints = path.len();
        self.autowalk.start(path, goal);
        info!(x = goal.x, y = goal.y, waypoints, "navigation_started");
        NavigationOutcome::Started { waypoints }
    }

    pub fn spawn_point(&self) -> Vec2 {
        self.current_map().spawn()
    }

    fn stock(&self, source: StockSource) -> Option<&[ItemRecord]> {
        match source {
            StockSource::Npc(index) => self
                .current_shop_npcs()
                .get(index)
                .map(|npc| npc.shop_items()),
            StockSource::General => Some(self.shop.items.as_slice()),
        }
    }

    fn stock_mut(&mut self, source: StockSource) -> Option<&mut Vec<ItemRecord>> {
        match source {
            StockSource::Npc(index) => self
                .current_shop_npc_mut(index)
                .map(|npc| npc.shop_items_mut()),
            StockSource::General => Some(&mut self.shop.items),
        }
    }

    /// Picks one random item to offer: from the NPC's own stock, or from the
    /// general stock when the NPC has none.
    pub fn open_npc_shop(
        &self,
        npc_index: Option<usize>,
        rng: &mut impl Rng,
    ) -> Option<FeaturedItem> {
        let npc_source = npc_index
            .map(StockSource::Npc)
            .filter(|source| self.stock(*source).is_some_and(|items| !items.is_empty()));
        let source = npc_source.unwrap_or(StockSource::General);
        let Some(item) = self.stock(source).and_then(|items| items.choose(rng)) else {
            warn!("shop_stock_empty");
            return None;
        };
        info!(item = item.name.as_str(), source = ?source, "shop_item_featured");
        Some(FeaturedItem {
            source,
            name: item.name.clone(),
        })
    }

    /// Buys one unit of the featured item. Sold-out stock or too few coins
    /// make this a no-op returning false.
    pub fn purchase_featured(&mut self, featured: &FeaturedItem) -> bool {
        let listing = self
            .stock(featured.source)
            .and_then(|items| {
                items
                    .iter()
                    .find(|item| item.name == featured.name && item.count > 0)
            })
            .map(|item| (item.price.unwrap_or(0), item.sprite_path.clone()));
        let Some((price, sprite_path)) = listing else {
            debug!(item = featured.name.as_str(), "purchase_rejected_sold_out");
            return false;
        };
        if price > 0 && !self.bag.spend_coins(price) {
            debug!(
                item = featured.name.as_str(),
                price,
                coins = self.bag.coins(),
                "purchase_rejected_insufficient_coins"
            );
            return false;
        }
        if let Some(item) = self.stock_mut(featured.source).and_then(|items| {
            items
                .iter_mut()
                .find(|item| item.name == featured.name && item.count > 0)
        }) {
            item.count -= 1;
        }
        self.bag.add_item(&featured.name, &sprite_path);
        info!(item = featured.name.as_str(), price, "item_purchased");
        true
    }
}

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::bag::ItemRecord;

pub const SHOP_REFRESH_MS: f32 = 120_000.0;

pub fn default_shop_stock() -> Vec<ItemRecord> {
    vec![
        ItemRecord::new("Potion", 5, "ingame_ui/potion.png").priced(30),
        ItemRecord::new("Pokeball", 5, "ingame_ui/ball.png").priced(50),
    ]
}

/// Where a featured item is sold from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockSource {
    /// Index of a shop NPC on the current map.
    Npc(usize),
    General,
}

/// The single item a shop currently offers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeaturedItem {
    pub source: StockSource,
    pub name: String,
}

/// General shop stock plus its restock countdown in milliseconds.
///
/// The countdown keeps running whether or not any shop UI is open. Expiry
/// restocks the default stock and resets the countdown to the full interval;
/// overshoot past zero is discarded rather than carried into the next cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopState {
    #[serde(default = "default_shop_stock")]
    pub items: Vec<ItemRecord>,
    #[serde(default)]
    pub time_until_refresh: f32,
    #[serde(skip, default = "default_refresh_interval")]
    refresh_interval_ms: f32,
}

fn default_refresh_interval() -> f32 {
    SHOP_REFRESH_MS
}

impl Default for ShopState {
    fn default() -> Self {
        Self {
            items: default_shop_stock(),
            time_until_refresh: 0.0,
            refresh_interval_ms: SHOP_REFRESH_MS,
        }
    }
}

impl ShopState {
    pub fn with_refresh_interval(mut self, refresh_interval_ms: f32) -> Self {
        self.refresh_interval_ms = refresh_interval_ms;
        self
    }

    pub fn refresh_interval_ms(&self) -> f32 {
        self.refresh_interval_ms
    }

    /// Advances the countdown by `dt_ms`. Returns true when this call
    /// restocked.
    pub fn tick(&mut self, dt_ms: f32) -> bool {
        self.time_until_refresh -= dt_ms;
        if self.time_until_refresh > 0.0 {
            return false;
        }
        self.items = default_shop_stock();
        self.time_until_refresh = self.refresh_interval_ms;
        debug!(
            next_refresh_ms = self.time_until_refresh,
            "shop_restocked"
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restock_happens_once_and_resets_to_full_interval() {
        let mut shop = ShopState {
            time_until_refresh: 1.0,
            ..ShopState::default()
        };
        shop.items.clear();

        assert!(shop.tick(5.0));
        assert_eq!(shop.time_until_refresh, SHOP_REFRESH_MS);
        assert_eq!(shop.items, default_shop_stock());
        assert!(!shop.tick(5.0));
        assert_eq!(shop.time_until_refresh, SHOP_REFRESH_MS - 5.0);
    }

    #[test]
    fn fresh_state_restocks_on_first_tick() {
        let mut shop = ShopState::default();
        assert!(shop.tick(16.0));
        assert!(shop.time_until_refresh > 0.0);
    }

    #[test]
    fn custom_interval_is_used_for_reset() {
        let mut shop = ShopState::default().with_refresh_interval(1_000.0);
        shop.tick(1.0);
        assert_eq!(shop.time_until_refresh, 1_000.0);
        for _ in 0..9 {
            assert!(!shop.tick(100.0));
        }
        assert!(shop.tick(100.0));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let shop: ShopState = serde_json::from_str("{}").expect("parse");
        assert_eq!(shop.items, default_shop_stock());
        assert_eq!(shop.time_until_refresh, 0.0);
        assert_eq!(shop.refresh_interval_ms(), SHOP_REFRESH_MS);
    }
}

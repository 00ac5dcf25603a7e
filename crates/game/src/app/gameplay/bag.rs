use serde::{Deserialize, Serialize};

pub const COINS_ITEM: &str = "Coins";
const COIN_SPRITE: &str = "ingame_ui/coin.png";

/// One inventory or shop stock line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub name: String,
    pub count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<u32>,
    #[serde(default)]
    pub sprite_path: String,
}

impl ItemRecord {
    pub fn new(name: impl Into<String>, count: u32, sprite_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            count,
            price: None,
            sprite_path: sprite_path.into(),
        }
    }

    pub fn priced(mut self, price: u32) -> Self {
        self.price = Some(price);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonsterRecord {
    pub name: String,
    pub hp: i32,
    pub max_hp: i32,
    pub level: u32,
    #[serde(default)]
    pub sprite_path: String,
}

impl MonsterRecord {
    pub fn is_fainted(&self) -> bool {
        self.hp <= 0
    }
}

/// Player inventory. Item names are not unique in storage; every name
/// lookup resolves to the first matching entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bag {
    #[serde(default)]
    pub monsters: Vec<MonsterRecord>,
    #[serde(default)]
    pub items: Vec<ItemRecord>,
}

impl Bag {
    pub fn new(monsters: Vec<MonsterRecord>, items: Vec<ItemRecord>) -> Self {
        Self { monsters, items }
    }

    pub fn item(&self, name: &str) -> Option<&ItemRecord> {
        self.items.iter().find(|item| item.name == name)
    }

    pub fn item_count(&self, name: &str) -> u32 {
        self.item(name).map_or(0, |item| item.count)
    }

    pub fn coins(&self) -> u32 {
        self.item_count(COINS_ITEM)
    }

    pub fn add_coins(&mut self, amount: u32) {
        match self.items.iter_mut().find(|item| item.name == COINS_ITEM) {
            Some(coins) => coins.count = coins.count.saturating_add(amount),
            None => self
                .items
                .push(ItemRecord::new(COINS_ITEM, amount, COIN_SPRITE)),
        }
    }

    /// Only the first "Coins" entry is consulted; an insufficient balance
    /// leaves the bag untouched.
    pub fn spend_coins(&mut self, amount: u32) -> bool {
        match self.items.iter_mut().find(|item| item.name == COINS_ITEM) {
            Some(coins) if coins.count >= amount => {
                coins.count -= amount;
                true
            }
            _ => false,
        }
    }

    /// Decrements the first entry named `name` holding at least `amount`.
    pub fn consume_item(&mut self, name: &str, amount: u32) -> bool {
        match self
            .items
            .iter_mut()
            .find(|item| item.name == name && item.count >= amount)
        {
            Some(item) => {
                item.count -= amount;
                true
            }
            None => false,
        }
    }

    /// Adds one unit of `name`, incrementing the first same-name entry or
    /// appending a new one.
    pub fn add_item(&mut self, name: &str, sprite_path: &str) {
        match self.items.iter_mut().find(|item| item.name == name) {
            Some(item) => item.count = item.count.saturating_add(1),
            None => self.items.push(ItemRecord::new(name, 1, sprite_path)),
        }
    }

    pub fn lead_monster(&self) -> Option<&MonsterRecord> {
        self.monsters.first()
    }

    pub fn lead_monster_mut(&mut self) -> Option<&mut MonsterRecord> {
        self.monsters.first_mut()
    }
}

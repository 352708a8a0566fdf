//! Process-wide card catalog and per-player holdings.
//!
//! Only the dispatcher task writes to this. Everyone else reads an immutable
//! snapshot handed out through [`crate::gateway::Session::inventory`].

use std::collections::{HashMap, HashSet};

use tradebot_common::{Card, CardId, Player};

use crate::gateway::events::{CardCounts, CardType, LibraryCard, LibraryView};

/// Tradable copies per card for one player.
pub type Stock = CardCounts;

/// Rarity breakdown of a player's whole library.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Holdings {
    pub commons: usize,
    pub uncommons: usize,
    pub rares: usize,
    /// Distinct catalog cards with at least one copy.
    pub distinct: usize,
    pub catalog: usize,
}

impl Holdings {
    /// Share of the catalog held, in whole percent.
    pub fn catalog_percent(&self) -> usize {
        if self.catalog == 0 {
            return 0;
        }
        100 * self.distinct / self.catalog
    }
}

#[derive(Debug, Clone, Default)]
pub struct Inventory {
    /// Catalog: card-type id to canonical name. Append-only.
    pub card_types: HashMap<CardId, Card>,
    /// Catalog: card name to rarity tier (0 common, 1 uncommon, 2 rare).
    pub rarities: HashMap<Card, u8>,
    /// Last full library view per player.
    pub libraries: HashMap<Player, LibraryView>,
    pub stocks: HashMap<Player, Stock>,
    /// Display name to the protocol's profile id.
    pub player_ids: HashMap<Player, String>,
    /// The bot's own display name, once the server has told us.
    pub bot: Player,
    pub gold: i64,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge catalog entries. Existing entries are never evicted.
    pub fn learn_card_types(&mut self, card_types: &[CardType]) {
        for card_type in card_types {
            self.card_types.insert(card_type.id, card_type.name.clone());
            self.rarities.insert(card_type.name.clone(), card_type.rarity);
        }
    }

    pub fn learn_player(&mut self, player: Player, profile_id: String) {
        self.player_ids.insert(player, profile_id);
    }

    pub fn player_for_profile(&self, profile_id: &str) -> Option<&Player> {
        self.player_ids
            .iter()
            .find(|(_, id)| id.as_str() == profile_id)
            .map(|(player, _)| player)
    }

    /// Replace a player's library and rebuild their stock from it.
    ///
    /// Every catalog card starts at zero so "not owned" and "unknown" read
    /// the same; each tradable copy then counts once.
    pub fn apply_library(&mut self, player: Player, view: LibraryView) {
        let mut stock: Stock = self.card_types.values().map(|card| (card.clone(), 0)).collect();
        for card in view.cards.iter().filter(|c| c.tradable) {
            match self.card_types.get(&card.type_id) {
                Some(name) => *stock.entry(name.clone()).or_insert(0) += 1,
                None => tracing::debug!(type_id = card.type_id, "library card not in catalog"),
            }
        }
        self.libraries.insert(player.clone(), view);
        self.stocks.insert(player, stock);
    }

    /// A copy of a player's stock, empty if unknown.
    pub fn stock_of(&self, player: &Player) -> Stock {
        self.stocks.get(player).cloned().unwrap_or_default()
    }

    pub fn count(&self, player: &Player, card: &Card) -> u32 {
        self.stocks
            .get(player)
            .and_then(|stock| stock.get(card))
            .copied()
            .unwrap_or(0)
    }

    /// Catalog cards the player holds no tradable copy of, sorted by name.
    pub fn missing_cards(&self, player: &Player) -> Vec<Card> {
        let mut missing: Vec<Card> = self
            .card_types
            .values()
            .filter(|card| self.count(player, card) == 0)
            .cloned()
            .collect();
        missing.sort();
        missing
    }

    /// Count every copy in the player's last library view by rarity,
    /// tradable or not.
    pub fn holdings(&self, player: &Player) -> Holdings {
        let mut holdings = Holdings {
            catalog: self.card_types.len(),
            ..Holdings::default()
        };
        let Some(library) = self.libraries.get(player) else {
            return holdings;
        };

        let mut distinct = HashSet::new();
        for card in &library.cards {
            let Some(name) = self.card_types.get(&card.type_id) else {
                continue;
            };
            distinct.insert(name);
            match self.rarities.get(name) {
                Some(0) => holdings.commons += 1,
                Some(1) => holdings.uncommons += 1,
                Some(2) => holdings.rares += 1,
                _ => {}
            }
        }
        holdings.distinct = distinct.len();
        holdings
    }

    /// Count card names from a list of library cards.
    pub fn count_cards<'a>(&self, cards: impl IntoIterator<Item = &'a LibraryCard>) -> CardCounts {
        let mut counts = CardCounts::new();
        for card in cards {
            if let Some(name) = self.card_types.get(&card.type_id) {
                *counts.entry(name.clone()).or_insert(0) += 1;
            }
        }
        counts
    }
}

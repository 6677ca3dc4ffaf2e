//! Per-token limit order book.
//!
//! Two `BTreeMap`s, one per side, keyed by a price wrapper whose `Ord`
//! flips direction between bids (descending) and asks (ascending). Top-N
//! is an in-order traversal truncated at `n`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::types::{Level, Micros, Side};

#[derive(Debug, Clone, Copy, PartialEq)]
struct OrderedPrice {
    price: Micros,
    descending: bool,
}

impl Eq for OrderedPrice {}

impl PartialOrd for OrderedPrice {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedPrice {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        if self.descending {
            other.price.cmp(&self.price)
        } else {
            self.price.cmp(&other.price)
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct LevelData {
    size: Micros,
    updated_at: DateTime<Utc>,
}

/// A single token's bid/ask book.
///
/// Invariants maintained by every mutating method: no two levels on the
/// same side share a price; every stored level has `size > 0`; a level
/// whose size drops to zero or below is removed, never stored as zero.
#[derive(Debug)]
pub struct OrderBook {
    bids: BTreeMap<OrderedPrice, LevelData>,
    asks: BTreeMap<OrderedPrice, LevelData>,
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderBook {
    pub fn new() -> Self {
        Self {
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
        }
    }

    fn side_map(&self, side: Side) -> &BTreeMap<OrderedPrice, LevelData> {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    fn side_map_mut(&mut self, side: Side) -> &mut BTreeMap<OrderedPrice, LevelData> {
        match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        }
    }

    fn key(side: Side, price: Micros) -> OrderedPrice {
        OrderedPrice {
            price,
            descending: matches!(side, Side::Bid),
        }
    }

    /// Replace the absolute size at `price`. `size <= 0` removes the level.
    pub fn set(&mut self, price: Micros, size: Micros, side: Side, event_time: DateTime<Utc>) {
        let key = Self::key(side, price);
        let map = self.side_map_mut(side);
        if !size.is_positive() {
            map.remove(&key);
        } else {
            map.insert(
                key,
                LevelData {
                    size,
                    updated_at: event_time,
                },
            );
        }
    }

    /// Apply a signed delta. New size = (existing size or 0) + delta. A
    /// delta that would overflow the existing size is logged and dropped
    /// rather than silently wrapping.
    pub fn update(&mut self, price: Micros, delta: Micros, side: Side, event_time: DateTime<Utc>) {
        let key = Self::key(side, price);
        let map = self.side_map_mut(side);
        let existing = map.get(&key).map(|l| l.size).unwrap_or(Micros::ZERO);
        let new_size = match existing.checked_add(delta) {
            Some(size) => size,
            None => {
                warn!(price = %price, side = side.as_str(), "delta overflowed existing size, dropping update");
                return;
            }
        };
        if !new_size.is_positive() {
            map.remove(&key);
        } else {
            map.insert(
                key,
                LevelData {
                    size: new_size,
                    updated_at: event_time,
                },
            );
        }
    }

    /// Clear a side entirely, then insert the given `(price, size)` pairs,
    /// each stamped with `event_time`. Used to apply an absolute snapshot
    /// ("book" event) so the stored side matches the event exactly.
    pub fn replace_side(
        &mut self,
        side: Side,
        levels: &[(Micros, Micros)],
        event_time: DateTime<Utc>,
    ) {
        let map = self.side_map_mut(side);
        map.clear();
        for &(price, size) in levels {
            if size.is_positive() {
                map.insert(
                    Self::key(side, price),
                    LevelData {
                        size,
                        updated_at: event_time,
                    },
                );
            }
        }
    }

    /// Up to `n` levels on `side`, best first.
    pub fn top_n(&self, side: Side, n: usize) -> Vec<Level> {
        self.side_map(side)
            .iter()
            .take(n)
            .map(|(key, data)| Level {
                price: key.price,
                size: data.size,
                updated_at: data.updated_at,
            })
            .collect()
    }

    pub fn len(&self, side: Side) -> usize {
        self.side_map(side).len()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

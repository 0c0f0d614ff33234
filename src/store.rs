use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

pub type LocalHighId = u64;
pub type PositionId = u64;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("book file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("book encoding error: {0}")]
    Codec(#[from] bincode::Error),
}

/// A recorded peak of the primary series and the buy thresholds derived
/// from it for both series. Rolled forward in place when the same record is
/// reused for a fresh peak; the cascade after a first fill creates a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalHigh {
    pub id: LocalHighId,
    pub higher: Decimal,
    pub buy_limit: Decimal,
    pub leveraged_higher: Decimal,
    pub leveraged_buy_limit: Decimal,
    pub primary_date: NaiveDate,
    pub secondary_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    Waiting,
    Running,
    Closed,
}

/// One rung of a three-position ladder staged under a local high.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub local_high: LocalHighId,
    pub slot: u8,
    pub buy_target: Decimal,
    pub sell_target: Option<Decimal>,
    pub leveraged_buy_target: Decimal,
    pub leveraged_sell_target: Option<Decimal>,
    pub quantity: i64,
    pub quantity_to_sell: Option<i64>,
    pub buy_date: Option<NaiveDate>,
    pub sell_date: Option<NaiveDate>,
    pub status: PositionStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub capital: Option<Decimal>,
    pub local_high: Option<LocalHighId>,
    pub last_processed: Option<NaiveDate>,
}

/// One user's trading state: wallet, local highs and positions, with
/// deterministic id allocation. BTreeMaps keep every enumeration in id
/// order, which the update cycle relies on for reproducibility.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserBook {
    pub user_id: String,
    pub wallet: Wallet,
    local_highs: BTreeMap<LocalHighId, LocalHigh>,
    positions: BTreeMap<PositionId, Position>,
    next_local_high_id: u64,
    next_position_id: u64,
}

impl UserBook {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    /// Inserts the record under the next free id and returns that id.
    pub fn add_local_high(&mut self, mut high: LocalHigh) -> LocalHighId {
        self.next_local_high_id += 1;
        high.id = self.next_local_high_id;
        self.local_highs.insert(high.id, high);
        self.next_local_high_id
    }

    pub fn add_position(&mut self, mut position: Position) -> PositionId {
        self.next_position_id += 1;
        position.id = self.next_position_id;
        self.positions.insert(position.id, position);
        self.next_position_id
    }

    pub fn local_high(&self, id: LocalHighId) -> Option<&LocalHigh> {
        self.local_highs.get(&id)
    }

    pub fn local_high_mut(&mut self, id: LocalHighId) -> Option<&mut LocalHigh> {
        self.local_highs.get_mut(&id)
    }

    pub fn position(&self, id: PositionId) -> Option<&Position> {
        self.positions.get(&id)
    }

    pub fn position_mut(&mut self, id: PositionId) -> Option<&mut Position> {
        self.positions.get_mut(&id)
    }

    pub fn remove_position(&mut self, id: PositionId) -> Option<Position> {
        self.positions.remove(&id)
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn positions_by_status(&self, status: PositionStatus) -> Vec<PositionId> {
        self.positions
            .values()
            .filter(|p| p.status == status)
            .map(|p| p.id)
            .collect()
    }

    pub fn running_positions(&self) -> impl Iterator<Item = &Position> {
        self.positions
            .values()
            .filter(|p| p.status == PositionStatus::Running)
    }

    pub fn waiting_with_high(&self, high: LocalHighId) -> Vec<PositionId> {
        self.positions
            .values()
            .filter(|p| p.status == PositionStatus::Waiting && p.local_high == high)
            .map(|p| p.id)
            .collect()
    }

    pub fn running_count_with_high(&self, high: LocalHighId) -> usize {
        self.positions
            .values()
            .filter(|p| p.status == PositionStatus::Running && p.local_high == high)
            .count()
    }

    /// Waiting positions grouped by local high, excluding one high, in
    /// ascending high order.
    pub fn waiting_groups_excluding(
        &self,
        high: LocalHighId,
    ) -> BTreeMap<LocalHighId, Vec<PositionId>> {
        let mut groups: BTreeMap<LocalHighId, Vec<PositionId>> = BTreeMap::new();
        for p in self.positions.values() {
            if p.status == PositionStatus::Waiting && p.local_high != high {
                groups.entry(p.local_high).or_default().push(p.id);
            }
        }
        groups
    }

    pub fn total_running_quantity(&self) -> i64 {
        self.running_positions().map(|p| p.quantity).sum()
    }

    /// (waiting, running, closed) counts for status reporting.
    pub fn status_counts(&self) -> (usize, usize, usize) {
        let mut counts = (0, 0, 0);
        for p in self.positions.values() {
            match p.status {
                PositionStatus::Waiting => counts.0 += 1,
                PositionStatus::Running => counts.1 += 1,
                PositionStatus::Closed => counts.2 += 1,
            }
        }
        counts
    }

    pub fn save_to(&self, path: &Path) -> Result<(), StoreError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let encoded = bincode::serialize(self)?;
        fs::write(path, encoded)?;
        Ok(())
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>, StoreError> {
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(path)?;
        Ok(Some(bincode::deserialize(&bytes)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn high(higher: Decimal) -> LocalHigh {
        LocalHigh {
            id: 0,
            higher,
            buy_limit: dec!(940),
            leveraged_higher: dec!(500),
            leveraged_buy_limit: dec!(440),
            primary_date: "2024-01-02".parse().unwrap(),
            secondary_date: "2024-01-02".parse().unwrap(),
        }
    }

    fn position(local_high: LocalHighId, status: PositionStatus) -> Position {
        Position {
            id: 0,
            local_high,
            slot: 0,
            buy_target: dec!(940),
            sell_target: None,
            leveraged_buy_target: dec!(440),
            leveraged_sell_target: None,
            quantity: 2,
            quantity_to_sell: None,
            buy_date: None,
            sell_date: None,
            status,
        }
    }

    #[test]
    fn ids_are_allocated_sequentially() {
        let mut book = UserBook::new("alice");
        let h1 = book.add_local_high(high(dec!(1000)));
        let h2 = book.add_local_high(high(dec!(1010)));
        assert_eq!((h1, h2), (1, 2));

        let p1 = book.add_position(position(h1, PositionStatus::Waiting));
        let p2 = book.add_position(position(h1, PositionStatus::Waiting));
        assert_eq!((p1, p2), (1, 2));
        assert_eq!(book.position(p2).unwrap().local_high, h1);
    }

    #[test]
    fn grouping_excludes_the_given_high_and_non_waiting() {
        let mut book = UserBook::new("alice");
        let h1 = book.add_local_high(high(dec!(1000)));
        let h2 = book.add_local_high(high(dec!(1010)));
        let h3 = book.add_local_high(high(dec!(1020)));
        book.add_position(position(h1, PositionStatus::Waiting));
        book.add_position(position(h2, PositionStatus::Waiting));
        book.add_position(position(h2, PositionStatus::Running));
        book.add_position(position(h3, PositionStatus::Waiting));

        let groups = book.waiting_groups_excluding(h3);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[&h1].len(), 1);
        assert_eq!(groups[&h2].len(), 1);
        assert_eq!(book.running_count_with_high(h2), 1);
    }

    #[test]
    fn running_quantity_ignores_other_statuses() {
        let mut book = UserBook::new("alice");
        let h1 = book.add_local_high(high(dec!(1000)));
        let mut open = position(h1, PositionStatus::Running);
        open.quantity = 5;
        book.add_position(open);
        book.add_position(position(h1, PositionStatus::Waiting));
        book.add_position(position(h1, PositionStatus::Closed));

        assert_eq!(book.total_running_quantity(), 5);
        assert_eq!(book.status_counts(), (1, 1, 1));
    }

    #[test]
    fn snapshot_roundtrip_preserves_the_book() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alice.book");

        let mut book = UserBook::new("alice");
        book.wallet.capital = Some(dec!(1500.50));
        let h1 = book.add_local_high(high(dec!(1000)));
        book.wallet.local_high = Some(h1);
        book.wallet.last_processed = Some("2024-01-02".parse().unwrap());
        book.add_position(position(h1, PositionStatus::Waiting));
        book.save_to(&path).unwrap();

        let restored = UserBook::load_from(&path).unwrap().unwrap();
        assert_eq!(restored.user_id, "alice");
        assert_eq!(restored.wallet, book.wallet);
        assert_eq!(restored.positions_by_status(PositionStatus::Waiting).len(), 1);

        // ids keep advancing after a reload
        let mut restored = restored;
        let p2 = restored.add_position(position(h1, PositionStatus::Waiting));
        assert_eq!(p2, 2);
    }

    #[test]
    fn load_from_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let missing = UserBook::load_from(&dir.path().join("nobody.book")).unwrap();
        assert!(missing.is_none());
    }
}

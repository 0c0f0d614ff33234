use chrono::{NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::time::{sleep, Duration};

use crate::config::LadderConfig;
use crate::integrity_notifier::notify_data_integrity;
use crate::ports::market_data::{MarketData, MarketError, PricePoint};
use crate::ports::replay_market::ReplayMarket;
use crate::store::{
    LocalHigh, LocalHighId, Position, PositionId, PositionStatus, StoreError, UserBook,
};

/// Base discount below a local high that fixes the primary buy limit.
const SPREAD: Decimal = dec!(0.06);
/// The secondary instrument carries 2x leverage, doubling every offset.
const LEVERAGE_FACTOR: Decimal = dec!(2);
/// Capital allocated per ladder rung, used to size quantities.
const LINE_VALUE: Decimal = dec!(750);
const LADDER_SIZE: usize = 3;
// Rungs are staged at 0, -2 and -4 % on the primary side; doubled for the
// leveraged secondary side.
const PRIMARY_OFFSETS_PCT: [Decimal; LADDER_SIZE] = [dec!(0), dec!(2), dec!(4)];
const SECONDARY_OFFSETS_PCT: [Decimal; LADDER_SIZE] = [dec!(0), dec!(4), dec!(8)];
const PRIMARY_SELL_MULT: Decimal = dec!(1.1);
const SECONDARY_SELL_MULT: Decimal = dec!(1.2);
/// Running exposure is recovered down to this share of the valorisation.
const MAX_INVESTMENT_PCT: Decimal = dec!(75);
const RECOVERY_RATIO: Decimal = dec!(75);
const FULL_EXIT_RATIO: Decimal = dec!(50);
const PARTIAL_EXIT_RATIO: Decimal = dec!(25);
const HUNDRED: Decimal = dec!(100);

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no secondary point recorded for primary date {date}")]
    MissingSecondary { date: NaiveDate },
    #[error("no primary point available to seed a local high")]
    EmptyPrimarySeries,
    #[error("funding amount must be positive, got {0}")]
    InvalidAmount(Decimal),
    #[error("investment ratio is undefined at zero valorisation")]
    ZeroValorisation,
    #[error("quantity out of range computing {0}")]
    QuantityRange(Decimal),
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Market(#[from] MarketError),
    #[error("failed to persist book for {user}")]
    Store {
        user: String,
        #[source]
        source: StoreError,
    },
}

/// Prices round to 2 decimals, half away from zero.
fn round_price(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn round_units(value: Decimal) -> Result<i64, EngineError> {
    value
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(EngineError::QuantityRange(value))
}

/// Derives a local-high record from a primary point and its same-day
/// secondary counterpart. The id is assigned when the record enters a book.
fn derive_local_high(primary: &PricePoint, secondary: &PricePoint) -> LocalHigh {
    let higher = primary.higher;
    let buy_limit = round_price(higher - higher * SPREAD);
    let leveraged_higher = secondary.higher;
    let leveraged_buy_limit =
        round_price(leveraged_higher - leveraged_higher * (SPREAD * LEVERAGE_FACTOR));
    LocalHigh {
        id: 0,
        higher,
        buy_limit,
        leveraged_higher,
        leveraged_buy_limit,
        primary_date: primary.date,
        secondary_date: secondary.date,
    }
}

/// Strict comparison: an equal high does not count as a new one.
pub fn has_new_high(candidate: &PricePoint, current: &LocalHigh) -> bool {
    candidate.higher > current.higher
}

fn roll_local_high(
    book: &mut UserBook,
    id: LocalHighId,
    primary: &PricePoint,
    secondary: &PricePoint,
) {
    let fresh = derive_local_high(primary, secondary);
    if let Some(high) = book.local_high_mut(id) {
        high.higher = fresh.higher;
        high.buy_limit = fresh.buy_limit;
        high.leveraged_higher = fresh.leveraged_higher;
        high.leveraged_buy_limit = fresh.leveraged_buy_limit;
        high.primary_date = fresh.primary_date;
        high.secondary_date = fresh.secondary_date;
    }
}

/// Unrealized result of all running positions. Positions holding without a
/// sell target contribute nothing.
pub fn latent_gain_or_loss(book: &UserBook) -> Decimal {
    book.running_positions()
        .map(|p| match (p.leveraged_sell_target, p.quantity_to_sell) {
            (Some(sell), Some(qty)) => (sell - p.leveraged_buy_target) * Decimal::from(qty),
            _ => Decimal::ZERO,
        })
        .sum()
}

pub fn valorisation(book: &UserBook) -> Decimal {
    book.wallet.capital.unwrap_or_default() + latent_gain_or_loss(book)
}

/// Unrealized result as a percentage of the valorisation. Calling this with
/// a zero valorisation is a caller error.
pub fn investment_ratio(book: &UserBook) -> Result<Decimal, EngineError> {
    let total = valorisation(book);
    if total.is_zero() {
        return Err(EngineError::ZeroValorisation);
    }
    Ok(round_price(latent_gain_or_loss(book) * HUNDRED / total))
}

#[derive(Debug, Serialize)]
pub struct UserStatus {
    pub ts: i64,
    pub user: String,
    pub capital: Decimal,
    pub latent_gain_or_loss: Decimal,
    pub valorisation: Decimal,
    pub investment_ratio: Option<Decimal>,
    pub waiting: usize,
    pub running: usize,
    pub closed: usize,
    pub last_processed: Option<NaiveDate>,
}

/// Drives the position lifecycle for every configured user: local-high
/// tracking, ladder staging, fills, exits and the exposure-tiered sell
/// sizing, all from incoming daily points.
pub struct LadderEngine {
    cfg: LadderConfig,
    market: Arc<dyn MarketData>,
    replay: Option<Arc<ReplayMarket>>,
    books: RwLock<HashMap<String, Arc<Mutex<UserBook>>>>,
}

impl LadderEngine {
    pub fn new(cfg: LadderConfig) -> Result<Self, EngineError> {
        if !cfg.backtest_mode {
            return Err(EngineError::Config(
                "live mode requires an external MarketData implementation; use with_market"
                    .to_string(),
            ));
        }
        let path = cfg
            .replay_file
            .clone()
            .ok_or_else(|| EngineError::Config("replay mode requires replay_file".to_string()))?;
        let replay = Arc::new(ReplayMarket::new(&path)?);
        Ok(Self {
            cfg,
            market: replay.clone(),
            replay: Some(replay),
            books: RwLock::new(HashMap::new()),
        })
    }

    /// Builds an engine on top of a caller-provided price series accessor.
    pub fn with_market(cfg: LadderConfig, market: Arc<dyn MarketData>) -> Self {
        Self {
            cfg,
            market,
            replay: None,
            books: RwLock::new(HashMap::new()),
        }
    }

    pub async fn run(&self) -> Result<(), EngineError> {
        log::info!("[CONFIG] processing users: {:?}", self.cfg.users);
        if let Some(replay) = self.replay.clone() {
            log::info!("[BACKTEST] Running in replay mode.");
            loop {
                self.process_all_users().await;
                self.write_status_snapshots().await;
                if !replay.tick() {
                    log::info!("[BACKTEST] End of data file reached. Replay finished.");
                    break;
                }
            }
        } else {
            log::info!("[LIVE] Running in live mode.");
            loop {
                self.process_all_users().await;
                self.write_status_snapshots().await;
                sleep(Duration::from_secs(self.cfg.interval_secs)).await;
            }
        }
        Ok(())
    }

    async fn process_all_users(&self) {
        for user in &self.cfg.users {
            if let Err(err) = self.process_updates_for_user(user).await {
                log::error!("[CYCLE] update failed for {}: {:?}", user, err);
            }
        }
    }

    /// Catches one user up with every primary point newer than their
    /// last-processed date, oldest first. Each date commits before the next
    /// is attempted; a missing secondary counterpart aborts the cycle with
    /// the earlier dates already durable.
    pub async fn process_updates_for_user(&self, user: &str) -> Result<(), EngineError> {
        let handle = self.book_handle(user).await?;
        let mut book = handle.lock().await;
        self.ensure_initial_locked(&mut book).await?;

        let points = self
            .market
            .primary_points_after(book.wallet.last_processed)
            .await?;
        if points.is_empty() {
            log::debug!("[CYCLE] no new primary points for {}", book.user_id);
            return Ok(());
        }
        log::info!(
            "[CYCLE] processing {} primary point(s) for {}",
            points.len(),
            book.user_id
        );

        for primary in points {
            let secondary = self.secondary_for(&book.user_id, &primary).await?;

            if let Some(high_id) = book.wallet.local_high {
                let exceeded = book
                    .local_high(high_id)
                    .map(|high| has_new_high(&primary, high))
                    .unwrap_or(false);
                if exceeded {
                    self.roll_forward(&mut book, high_id, &primary, &secondary)
                        .await?;
                }
            }

            book.wallet.last_processed = Some(primary.date);

            self.check_waiting_positions(&mut book, &primary, &secondary)
                .await?;
            self.check_running_positions(&mut book, &secondary);
            self.persist_book(&book)?;
        }
        Ok(())
    }

    /// Bootstraps a brand-new user from the latest primary point. No ladder
    /// is staged until the wallet is first funded.
    pub async fn ensure_initial_local_high(&self, user: &str) -> Result<LocalHigh, EngineError> {
        let handle = self.book_handle(user).await?;
        let mut book = handle.lock().await;
        self.ensure_initial_locked(&mut book).await
    }

    /// Credits the wallet. The first funding stages the initial ladder under
    /// the user's current local high and returns the created positions;
    /// later fundings only increase capital.
    pub async fn fund_wallet(
        &self,
        user: &str,
        amount: Decimal,
    ) -> Result<Vec<Position>, EngineError> {
        if amount <= Decimal::ZERO {
            return Err(EngineError::InvalidAmount(amount));
        }
        let handle = self.book_handle(user).await?;
        let mut book = handle.lock().await;

        let first_funding = book.wallet.capital.is_none();
        let high = self.ensure_initial_locked(&mut book).await?;

        let capital = book.wallet.capital.unwrap_or_default() + amount;
        book.wallet.capital = Some(capital);
        log::info!(
            "[WALLET] {} funded with {}; capital now {}",
            book.user_id,
            amount,
            capital
        );

        let mut created = Vec::new();
        if first_funding {
            let ids = self.build_ladder(&mut book, &high, &[]).await?;
            created = ids
                .iter()
                .filter_map(|&id| book.position(id).cloned())
                .collect();
            log::info!(
                "[LADDER] initial ladder of {} staged for {}",
                created.len(),
                book.user_id
            );
        }
        self.persist_book(&book)?;
        Ok(created)
    }

    pub async fn status(&self, user: &str) -> Result<UserStatus, EngineError> {
        let handle = self.book_handle(user).await?;
        let book = handle.lock().await;
        let latent = latent_gain_or_loss(&book);
        let total = valorisation(&book);
        let ratio = if total.is_zero() {
            None
        } else {
            Some(investment_ratio(&book)?)
        };
        let (waiting, running, closed) = book.status_counts();
        Ok(UserStatus {
            ts: Utc::now().timestamp(),
            user: book.user_id.clone(),
            capital: book.wallet.capital.unwrap_or_default(),
            latent_gain_or_loss: latent,
            valorisation: total,
            investment_ratio: ratio,
            waiting,
            running,
            closed,
            last_processed: book.wallet.last_processed,
        })
    }

    async fn ensure_initial_locked(&self, book: &mut UserBook) -> Result<LocalHigh, EngineError> {
        if let Some(id) = book.wallet.local_high {
            if let Some(high) = book.local_high(id) {
                return Ok(high.clone());
            }
        }
        let primary = self
            .market
            .latest_primary_point()
            .await?
            .ok_or(EngineError::EmptyPrimarySeries)?;
        let secondary = self.secondary_for(&book.user_id, &primary).await?;

        let mut high = derive_local_high(&primary, &secondary);
        let id = book.add_local_high(high.clone());
        high.id = id;
        book.wallet.local_high = Some(id);
        book.wallet.last_processed = Some(primary.date);
        log::info!(
            "[BOOTSTRAP] seeded local high {} for {} (buy limit {})",
            high.higher,
            book.user_id,
            high.buy_limit
        );
        self.persist_book(book)?;
        Ok(high)
    }

    /// Resolves the same-day secondary counterpart of a primary point.
    /// Its absence is a data-integrity failure, never papered over.
    async fn secondary_for(
        &self,
        user: &str,
        primary: &PricePoint,
    ) -> Result<PricePoint, EngineError> {
        match self.market.secondary_point(primary.date).await? {
            Some(secondary) => Ok(secondary),
            None => {
                let err = EngineError::MissingSecondary { date: primary.date };
                log::error!("[CYCLE] {} (user {}); aborting this update", err, user);
                notify_data_integrity("secondary series lookup", &err.to_string());
                Err(err)
            }
        }
    }

    /// A fresh peak reuses the current record: thresholds are re-derived in
    /// place and the waiting ladder under it is re-staged at the new levels.
    async fn roll_forward(
        &self,
        book: &mut UserBook,
        high_id: LocalHighId,
        primary: &PricePoint,
        secondary: &PricePoint,
    ) -> Result<(), EngineError> {
        roll_local_high(book, high_id, primary, secondary);
        let Some(high) = book.local_high(high_id).cloned() else {
            return Ok(());
        };
        log::info!(
            "[HIGH] {} rolled local high {} to {} (buy limit {})",
            book.user_id,
            high_id,
            high.higher,
            high.buy_limit
        );

        let waiting = book.waiting_with_high(high_id);
        if waiting.is_empty() {
            if book.wallet.capital.is_some() {
                self.build_ladder(&mut *book, &high, &[]).await?;
            } else {
                log::debug!("[LADDER] wallet unfunded; rolled high without staging a ladder");
            }
        } else {
            self.build_ladder(&mut *book, &high, &waiting).await?;
        }
        Ok(())
    }

    /// Stages the three-rung ladder under a local high. An existing group is
    /// re-hydrated in place only when it is complete; a group that lost a
    /// member to `running` stays frozen until it resolves.
    async fn build_ladder(
        &self,
        book: &mut UserBook,
        high: &LocalHigh,
        existing: &[PositionId],
    ) -> Result<Vec<PositionId>, EngineError> {
        if !existing.is_empty() && existing.len() != LADDER_SIZE {
            log::info!(
                "[LADDER] skipping regeneration: {} waiting position(s) under buy limit {} instead of {}",
                existing.len(),
                high.buy_limit,
                LADDER_SIZE
            );
            return Ok(Vec::new());
        }

        let total = valorisation(book);
        let ratio = if total.is_zero() {
            Decimal::ZERO
        } else {
            investment_ratio(book)?
        };

        let mut ids = Vec::with_capacity(LADDER_SIZE);
        for slot in 0..LADDER_SIZE {
            let buy_limit = high.buy_limit;
            let primary_entry_raw = buy_limit - buy_limit * PRIMARY_OFFSETS_PCT[slot] / HUNDRED;
            let primary_entry = round_price(primary_entry_raw);

            let leveraged_limit = high.leveraged_buy_limit;
            let leveraged_entry_raw =
                leveraged_limit - leveraged_limit * SECONDARY_OFFSETS_PCT[slot] / HUNDRED;
            let leveraged_entry = round_price(leveraged_entry_raw);

            // quantity and the sell candidate derive from the unrounded entry
            let quantity = round_units(LINE_VALUE / leveraged_entry_raw)?;
            let candidate = round_price(leveraged_entry_raw * SECONDARY_SELL_MULT);

            let quantity_to_sell = self.sell_quantity(book, ratio, quantity, candidate).await?;
            let leveraged_sell_target = quantity_to_sell.map(|_| candidate);
            let sell_target = quantity_to_sell.map(|_| round_price(primary_entry * PRIMARY_SELL_MULT));

            let id = match existing.get(slot) {
                Some(&pid) => {
                    if let Some(position) = book.position_mut(pid) {
                        position.local_high = high.id;
                        position.slot = slot as u8;
                        position.buy_target = primary_entry;
                        position.sell_target = sell_target;
                        position.leveraged_buy_target = leveraged_entry;
                        position.leveraged_sell_target = leveraged_sell_target;
                        position.quantity = quantity;
                        position.quantity_to_sell = quantity_to_sell;
                        position.buy_date = Some(high.primary_date);
                        position.sell_date = None;
                        position.status = PositionStatus::Waiting;
                    }
                    pid
                }
                None => book.add_position(Position {
                    id: 0,
                    local_high: high.id,
                    slot: slot as u8,
                    buy_target: primary_entry,
                    sell_target,
                    leveraged_buy_target: leveraged_entry,
                    leveraged_sell_target,
                    quantity,
                    quantity_to_sell,
                    buy_date: Some(high.primary_date),
                    sell_date: None,
                    status: PositionStatus::Waiting,
                }),
            };
            ids.push(id);
        }
        log::debug!(
            "[LADDER] staged {} rung(s) under buy limit {} (ratio {})",
            ids.len(),
            high.buy_limit,
            ratio
        );
        Ok(ids)
    }

    /// Quantity to liquidate for a candidate sell target, by exposure tier.
    /// The tiers are ordered strict inequalities; at or below the lowest one
    /// the position is kept with no exit computed.
    async fn sell_quantity(
        &self,
        book: &UserBook,
        ratio: Decimal,
        quantity: i64,
        candidate: Decimal,
    ) -> Result<Option<i64>, EngineError> {
        if ratio > RECOVERY_RATIO {
            let recovery = self.target_recovery_capital(book, candidate, quantity).await?;
            return Ok(Some(round_units(recovery / candidate)?));
        }
        if ratio > FULL_EXIT_RATIO {
            return Ok(Some(quantity));
        }
        if ratio > PARTIAL_EXIT_RATIO {
            return Ok(Some(round_units(LINE_VALUE / candidate)?));
        }
        Ok(None)
    }

    /// Amount to sell so that running exposure falls back to 75 % of the
    /// valorisation, floored at the value of the trade itself.
    async fn target_recovery_capital(
        &self,
        book: &UserBook,
        candidate: Decimal,
        quantity: i64,
    ) -> Result<Decimal, EngineError> {
        let total = valorisation(book);
        let closing = match self.market.latest_secondary_closing().await? {
            Some(closing) => closing,
            None => {
                log::warn!("[EXPOSURE] no secondary closing available; assuming zero exposure");
                Decimal::ZERO
            }
        };
        let running_exposure =
            round_price(closing * Decimal::from(book.total_running_quantity()));
        let max_investment = total * MAX_INVESTMENT_PCT / HUNDRED;
        let min_sell = running_exposure - max_investment;
        let trade = candidate * Decimal::from(quantity);
        Ok(min_sell.max(trade))
    }

    /// Promotes waiting positions whose leveraged buy target was touched by
    /// the day's low. The first fill of a ladder re-bases every other
    /// pending ladder on a local high taken from the triggering points.
    async fn check_waiting_positions(
        &self,
        book: &mut UserBook,
        primary: &PricePoint,
        secondary: &PricePoint,
    ) -> Result<(), EngineError> {
        for id in book.positions_by_status(PositionStatus::Waiting) {
            let Some(position) = book.position(id) else {
                // pruned by an earlier roll in this same pass
                continue;
            };
            if position.status != PositionStatus::Waiting {
                continue;
            }
            if secondary.lower > position.leveraged_buy_target {
                continue;
            }
            let high_id = position.local_high;
            let target = position.leveraged_buy_target;
            if let Some(position) = book.position_mut(id) {
                position.status = PositionStatus::Running;
                position.buy_date = Some(secondary.date);
            }
            log::info!(
                "[POSITION] opened {} on {} (leveraged target {})",
                id,
                secondary.date,
                target
            );
            if book.running_count_with_high(high_id) == 1 {
                self.roll_pending_ladders(book, primary, secondary, high_id)
                    .await?;
            }
        }
        Ok(())
    }

    /// First fill under a local high: record a fresh high from the
    /// triggering points, prune waiting groups that are no longer complete
    /// and re-base the complete ones on the new high.
    async fn roll_pending_ladders(
        &self,
        book: &mut UserBook,
        primary: &PricePoint,
        secondary: &PricePoint,
        opened_high: LocalHighId,
    ) -> Result<(), EngineError> {
        let mut high = derive_local_high(primary, secondary);
        let id = book.add_local_high(high.clone());
        high.id = id;
        book.wallet.local_high = Some(id);
        log::info!(
            "[HIGH] first fill under local high {}; rebasing pending ladders on new local high {} at {}",
            opened_high,
            id,
            high.higher
        );

        let groups = book.waiting_groups_excluding(opened_high);
        let mut complete: Vec<Vec<PositionId>> = Vec::new();
        for (group_high, members) in groups {
            if members.len() == LADDER_SIZE {
                complete.push(members);
            } else {
                log::info!(
                    "[LADDER] pruning incomplete waiting group of {} under local high {}",
                    members.len(),
                    group_high
                );
                for pid in members {
                    book.remove_position(pid);
                }
            }
        }

        if complete.is_empty() {
            if book.wallet.capital.is_some() {
                self.build_ladder(book, &high, &[]).await?;
            }
        } else {
            for members in complete {
                self.build_ladder(book, &high, &members).await?;
            }
        }
        Ok(())
    }

    /// Closes running positions whose leveraged sell target was exceeded by
    /// the day's high. Positions without a target hold indefinitely.
    fn check_running_positions(&self, book: &mut UserBook, secondary: &PricePoint) {
        for id in book.positions_by_status(PositionStatus::Running) {
            let Some(position) = book.position(id) else {
                continue;
            };
            let Some(sell_target) = position.leveraged_sell_target else {
                continue;
            };
            if secondary.higher > sell_target {
                self.close_position(book, id, secondary);
            }
        }
    }

    /// Closing a rung abandons the unfilled remainder of its ladder and
    /// credits the realized result to the wallet.
    fn close_position(&self, book: &mut UserBook, id: PositionId, secondary: &PricePoint) {
        let Some(position) = book.position_mut(id) else {
            return;
        };
        position.status = PositionStatus::Closed;
        position.sell_date = Some(secondary.date);
        let high_id = position.local_high;
        let gain = match (position.leveraged_sell_target, position.quantity_to_sell) {
            (Some(sell), Some(qty)) => (sell - position.leveraged_buy_target) * Decimal::from(qty),
            _ => Decimal::ZERO,
        };
        log::info!(
            "[POSITION] closed {} on {} (result {})",
            id,
            secondary.date,
            gain
        );

        let orphans = book.waiting_with_high(high_id);
        if !orphans.is_empty() {
            log::info!(
                "[LADDER] abandoning {} unfilled rung(s) under local high {}",
                orphans.len(),
                high_id
            );
            for pid in orphans {
                book.remove_position(pid);
            }
        }

        if book.wallet.capital.is_none() {
            log::warn!("[WALLET] crediting an unfunded wallet for {}", book.user_id);
        }
        let capital = book.wallet.capital.unwrap_or_default() + gain;
        book.wallet.capital = Some(round_price(capital));
    }

    async fn book_handle(&self, user: &str) -> Result<Arc<Mutex<UserBook>>, EngineError> {
        {
            let books = self.books.read().await;
            if let Some(handle) = books.get(user) {
                return Ok(handle.clone());
            }
        }
        let mut books = self.books.write().await;
        if let Some(handle) = books.get(user) {
            return Ok(handle.clone());
        }
        let book = match self.book_path(user) {
            Some(path) => UserBook::load_from(&path)
                .map_err(|source| EngineError::Store {
                    user: user.to_string(),
                    source,
                })?
                .unwrap_or_else(|| UserBook::new(user)),
            None => UserBook::new(user),
        };
        let handle = Arc::new(Mutex::new(book));
        books.insert(user.to_string(), handle.clone());
        Ok(handle)
    }

    fn book_path(&self, user: &str) -> Option<PathBuf> {
        self.cfg
            .store_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.book", user)))
    }

    fn persist_book(&self, book: &UserBook) -> Result<(), EngineError> {
        let Some(path) = self.book_path(&book.user_id) else {
            return Ok(());
        };
        book.save_to(&path).map_err(|source| EngineError::Store {
            user: book.user_id.clone(),
            source,
        })
    }

    async fn write_status_snapshots(&self) {
        let Some(path) = &self.cfg.status_file else {
            return;
        };
        let mut statuses = Vec::new();
        for user in &self.cfg.users {
            match self.status(user).await {
                Ok(status) => statuses.push(status),
                Err(err) => log::warn!("[STATUS] failed to build status for {}: {:?}", user, err),
            }
        }
        match serde_json::to_string_pretty(&statuses) {
            Ok(json) => {
                if let Err(err) = fs::write(path, json) {
                    log::warn!("[STATUS] failed to write status: {:?}", err);
                }
            }
            Err(err) => log::warn!("[STATUS] failed to encode status: {:?}", err),
        }
    }
}

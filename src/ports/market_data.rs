use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One daily quotation of a series. Points are immutable once recorded;
/// ingestion happens outside this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub opening: Decimal,
    pub closing: Decimal,
    pub lower: Decimal,
    pub higher: Decimal,
}

#[derive(Debug, Error)]
pub enum MarketError {
    #[error("failed to read market data: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse market data: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{0}")]
    Other(String),
}

/// Read-only access to the two correlated daily series: the primary index
/// and the leveraged secondary instrument, matched by date.
#[async_trait]
pub trait MarketData: Send + Sync {
    async fn primary_point(&self, date: NaiveDate) -> Result<Option<PricePoint>, MarketError>;

    async fn secondary_point(&self, date: NaiveDate) -> Result<Option<PricePoint>, MarketError>;

    /// Primary points strictly newer than `after`, oldest first. `None`
    /// returns the whole series.
    async fn primary_points_after(
        &self,
        after: Option<NaiveDate>,
    ) -> Result<Vec<PricePoint>, MarketError>;

    /// Most recent primary point, used to seed a brand-new user.
    async fn latest_primary_point(&self) -> Result<Option<PricePoint>, MarketError>;

    /// Most recent secondary closing price, used to value running exposure.
    async fn latest_secondary_closing(&self) -> Result<Option<Decimal>, MarketError>;
}

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use crate::ports::market_data::{MarketData, MarketError, PricePoint};

// Data structures that mirror the JSONL series file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpedDailyQuote {
    pub opening: Decimal,
    pub closing: Decimal,
    pub lower: Decimal,
    pub higher: Decimal,
}

/// One line of the series file: a trading day with whichever of the two
/// series had a quotation. A day may legitimately miss one side; the engine
/// decides whether that is fatal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpedDataEntry {
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary: Option<DumpedDailyQuote>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary: Option<DumpedDailyQuote>,
}

fn to_point(date: NaiveDate, quote: &DumpedDailyQuote) -> PricePoint {
    PricePoint {
        date,
        opening: quote.opening,
        closing: quote.closing,
        lower: quote.lower,
        higher: quote.higher,
    }
}

/// Replays a recorded pair of daily series. Only entries at or before the
/// cursor are visible, so an update cycle sees history exactly as it would
/// have accrued day by day.
#[derive(Debug)]
pub struct ReplayMarket {
    data: Vec<DumpedDataEntry>,
    cursor: AtomicUsize,
}

impl ReplayMarket {
    pub fn new(path: &str) -> Result<Self, MarketError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut data: Vec<DumpedDataEntry> = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: DumpedDataEntry = serde_json::from_str(&line)?;
            if let Some(prev) = data.last() {
                if entry.date <= prev.date {
                    return Err(MarketError::Other(format!(
                        "replay file is not in ascending date order at {}",
                        entry.date
                    )));
                }
            }
            data.push(entry);
        }

        if data.is_empty() {
            return Err(MarketError::Other(
                "replay file is empty or invalid".to_string(),
            ));
        }

        Ok(Self {
            data,
            cursor: AtomicUsize::new(0),
        })
    }

    // Advances the replay by one trading day. Returns false if the end is reached.
    pub fn tick(&self) -> bool {
        let current_cursor = self.cursor.load(AtomicOrdering::SeqCst);
        if current_cursor < self.data.len() - 1 {
            self.cursor.fetch_add(1, AtomicOrdering::SeqCst);
            true
        } else {
            false
        }
    }

    pub fn current_date(&self) -> Option<NaiveDate> {
        let current_cursor = self.cursor.load(AtomicOrdering::SeqCst);
        self.data.get(current_cursor).map(|e| e.date)
    }

    fn visible(&self) -> &[DumpedDataEntry] {
        let current_cursor = self.cursor.load(AtomicOrdering::SeqCst);
        &self.data[..=current_cursor.min(self.data.len() - 1)]
    }
}

#[async_trait]
impl MarketData for ReplayMarket {
    async fn primary_point(&self, date: NaiveDate) -> Result<Option<PricePoint>, MarketError> {
        Ok(self
            .visible()
            .iter()
            .find(|e| e.date == date)
            .and_then(|e| e.primary.as_ref().map(|q| to_point(e.date, q))))
    }

    async fn secondary_point(&self, date: NaiveDate) -> Result<Option<PricePoint>, MarketError> {
        Ok(self
            .visible()
            .iter()
            .find(|e| e.date == date)
            .and_then(|e| e.secondary.as_ref().map(|q| to_point(e.date, q))))
    }

    async fn primary_points_after(
        &self,
        after: Option<NaiveDate>,
    ) -> Result<Vec<PricePoint>, MarketError> {
        Ok(self
            .visible()
            .iter()
            .filter(|e| after.map_or(true, |a| e.date > a))
            .filter_map(|e| e.primary.as_ref().map(|q| to_point(e.date, q)))
            .collect())
    }

    async fn latest_primary_point(&self) -> Result<Option<PricePoint>, MarketError> {
        Ok(self
            .visible()
            .iter()
            .rev()
            .find_map(|e| e.primary.as_ref().map(|q| to_point(e.date, q))))
    }

    async fn latest_secondary_closing(&self) -> Result<Option<Decimal>, MarketError> {
        Ok(self
            .visible()
            .iter()
            .rev()
            .find_map(|e| e.secondary.as_ref().map(|q| q.closing)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;

    fn quote(value: Decimal) -> DumpedDailyQuote {
        DumpedDailyQuote {
            opening: value,
            closing: value,
            lower: value,
            higher: value,
        }
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn replay_file(entries: &[DumpedDataEntry]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for entry in entries {
            writeln!(file, "{}", serde_json::to_string(entry).unwrap()).unwrap();
        }
        file
    }

    fn three_day_market() -> (ReplayMarket, tempfile::NamedTempFile) {
        let file = replay_file(&[
            DumpedDataEntry {
                date: date("2024-01-02"),
                primary: Some(quote(dec!(1000))),
                secondary: Some(quote(dec!(500))),
            },
            DumpedDataEntry {
                date: date("2024-01-03"),
                primary: Some(quote(dec!(1010))),
                secondary: None,
            },
            DumpedDataEntry {
                date: date("2024-01-04"),
                primary: Some(quote(dec!(1020))),
                secondary: Some(quote(dec!(510))),
            },
        ]);
        let market = ReplayMarket::new(file.path().to_str().unwrap()).unwrap();
        (market, file)
    }

    #[tokio::test]
    async fn cursor_hides_future_entries() {
        let (market, _file) = three_day_market();
        assert_eq!(market.current_date(), Some(date("2024-01-02")));

        let points = market.primary_points_after(None).await.unwrap();
        assert_eq!(points.len(), 1);

        assert!(market.tick());
        let points = market.primary_points_after(None).await.unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].date, date("2024-01-03"));

        assert!(market.tick());
        assert!(!market.tick());
        assert_eq!(market.current_date(), Some(date("2024-01-04")));
    }

    #[tokio::test]
    async fn points_after_excludes_the_boundary_date() {
        let (market, _file) = three_day_market();
        market.tick();
        market.tick();

        let points = market
            .primary_points_after(Some(date("2024-01-02")))
            .await
            .unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].date, date("2024-01-03"));
    }

    #[tokio::test]
    async fn missing_secondary_side_is_none() {
        let (market, _file) = three_day_market();
        market.tick();

        let missing = market.secondary_point(date("2024-01-03")).await.unwrap();
        assert!(missing.is_none());

        let closing = market.latest_secondary_closing().await.unwrap();
        assert_eq!(closing, Some(dec!(500)));
    }

    #[test]
    fn rejects_out_of_order_files() {
        let file = replay_file(&[
            DumpedDataEntry {
                date: date("2024-01-03"),
                primary: Some(quote(dec!(1000))),
                secondary: None,
            },
            DumpedDataEntry {
                date: date("2024-01-02"),
                primary: Some(quote(dec!(1000))),
                secondary: None,
            },
        ]);
        assert!(ReplayMarket::new(file.path().to_str().unwrap()).is_err());
    }
}

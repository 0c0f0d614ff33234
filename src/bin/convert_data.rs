use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use ladderbot::ports::replay_market::{DumpedDailyQuote, DumpedDataEntry};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;
use std::fs::File;
use std::io::{BufWriter, Write};

// One row of a daily quotation CSV export
#[derive(Debug, Deserialize)]
struct CsvQuote {
    date: NaiveDate,
    opening: Decimal,
    closing: Decimal,
    lower: Decimal,
    higher: Decimal,
}

fn read_series(path: &str) -> Result<BTreeMap<NaiveDate, DumpedDailyQuote>> {
    let mut reader =
        csv::Reader::from_path(path).with_context(|| format!("failed to open {}", path))?;
    let mut series = BTreeMap::new();
    for record in reader.deserialize() {
        let quote: CsvQuote = record.with_context(|| format!("bad row in {}", path))?;
        series.insert(
            quote.date,
            DumpedDailyQuote {
                opening: quote.opening,
                closing: quote.closing,
                lower: quote.lower,
                higher: quote.higher,
            },
        );
    }
    Ok(series)
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() != 4 {
        bail!("usage: convert-data <primary.csv> <secondary.csv> <out.jsonl>");
    }
    let primary = read_series(&args[1])?;
    let secondary = read_series(&args[2])?;

    let mut dates: Vec<NaiveDate> = primary.keys().chain(secondary.keys()).copied().collect();
    dates.sort();
    dates.dedup();

    let out = File::create(&args[3]).with_context(|| format!("failed to create {}", args[3]))?;
    let mut writer = BufWriter::new(out);
    let mut lines = 0usize;
    for date in dates {
        let entry = DumpedDataEntry {
            date,
            primary: primary.get(&date).cloned(),
            secondary: secondary.get(&date).cloned(),
        };
        writeln!(writer, "{}", serde_json::to_string(&entry)?)?;
        lines += 1;
    }
    writer.flush()?;
    eprintln!("wrote {} day(s) to {}", lines, args[3]);
    Ok(())
}

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::{mpsc, Semaphore};
use tracing::{info, warn};

use super::{RatingResolver, RatingSource};
use crate::table::Table;

pub const FIRST_AVG_COLUMN: &str = "First Actor Avg";
pub const SECOND_AVG_COLUMN: &str = "Second Actor Avg";

/// Input column names for the rating run.
#[derive(Debug, Clone)]
pub struct ActorColumns {
    pub first: String,
    pub second: String,
}

impl Default for ActorColumns {
    fn default() -> Self {
        Self {
            first: "First Actor".into(),
            second: "Second Actor".into(),
        }
    }
}

/// Both averages of one row. Each side is computed independently.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RatingPair {
    pub first: Option<f64>,
    pub second: Option<f64>,
}

pub struct RatingStats {
    pub total: usize,
    pub first_rated: usize,
    pub second_rated: usize,
}

impl RatingStats {
    pub fn print(&self) {
        println!(
            "Rated {} rows: {} first actors, {} second actors.",
            self.total, self.first_rated, self.second_rated
        );
    }
}

fn format_rating(r: Option<f64>) -> Option<String> {
    r.map(|v| format!("{:.2}", v))
}

/// Compute both actors' averages for every row on a bounded worker pool.
///
/// Workers send `(row, pair)` to this task, which is the only writer of
/// the result map. A row whose task dies stays empty.
pub async fn run_ratings<S: RatingSource + 'static>(
    resolver: Arc<RatingResolver<S>>,
    input: &Table,
    columns: &ActorColumns,
) -> Result<(Table, RatingStats)> {
    let first_col = input.require_column(&columns.first)?;
    let second_col = input.require_column(&columns.second)?;
    let workers = resolver.config().workers;

    let semaphore = Arc::new(Semaphore::new(workers));
    let total = input.len();

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    let (tx, mut rx) = mpsc::channel::<(usize, RatingPair)>(workers * 2);

    for row in 0..total {
        let first = input.cell(row, first_col).map(str::to_string);
        let second = input.cell(row, second_col).map(str::to_string);
        let resolver = Arc::clone(&resolver);
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();

        tokio::spawn(async move {
            let Ok(_permit) = sem.acquire().await else {
                return;
            };
            let first = match first {
                Some(name) => resolver.average_rating(&name).await,
                None => None,
            };
            let second = match second {
                Some(name) => resolver.average_rating(&name).await,
                None => None,
            };
            let _ = tx.send((row, RatingPair { first, second })).await;
        });
    }

    // rx closes once every task has dropped its sender
    drop(tx);

    let mut results: BTreeMap<usize, RatingPair> = BTreeMap::new();
    while let Some((row, pair)) = rx.recv().await {
        results.insert(row, pair);
        pb.inc(1);
    }
    pb.finish_and_clear();

    if results.len() < total {
        warn!("{} rows produced no result", total - results.len());
    }

    let mut firsts = vec![None; total];
    let mut seconds = vec![None; total];
    for (row, pair) in &results {
        firsts[*row] = format_rating(pair.first);
        seconds[*row] = format_rating(pair.second);
    }

    let stats = RatingStats {
        total,
        first_rated: results.values().filter(|p| p.first.is_some()).count(),
        second_rated: results.values().filter(|p| p.second.is_some()).count(),
    };
    info!(
        "Rated {} rows ({} first, {} second)",
        stats.total, stats.first_rated, stats.second_rated
    );

    let table = input.with_columns(&[(FIRST_AVG_COLUMN, firsts), (SECOND_AVG_COLUMN, seconds)]);
    Ok((table, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratings::tests::{cfg, today, FakeRatings};
    use crate::ratings::LookupCache;

    fn input(rows: &[(&str, &str)]) -> Table {
        Table {
            headers: vec!["Movie".into(), "First Actor".into(), "Second Actor".into()],
            rows: rows
                .iter()
                .enumerate()
                .map(|(i, (a, b))| vec![format!("m{}", i), a.to_string(), b.to_string()])
                .collect(),
        }
    }

    fn resolver() -> Arc<RatingResolver<FakeRatings>> {
        Arc::new(
            RatingResolver::new(FakeRatings::sample(), Arc::new(LookupCache::new()), cfg())
                .with_today(today()),
        )
    }

    #[tokio::test]
    async fn failed_partner_does_not_block_row() {
        let r = resolver();
        let rows = input(&[("Down Under", "Keanu")]);
        let (table, stats) = run_ratings(Arc::clone(&r), &rows, &ActorColumns::default())
            .await
            .unwrap();

        assert_eq!(table.headers[3], FIRST_AVG_COLUMN);
        assert_eq!(table.rows[0][3], "");
        assert_eq!(table.rows[0][4], "7.73");
        assert_eq!(stats.first_rated, 0);
        assert_eq!(stats.second_rated, 1);
        // three attempts for the unreachable actor, one for the partner
        assert_eq!(r.source.person_calls(), 4);
    }

    #[tokio::test]
    async fn rows_land_at_their_index() {
        let rows = [
            ("Keanu", "Carrie"),
            ("", "Keanu"),
            ("Carrie", "Nobody"),
            ("Keanu", "Keanu"),
            ("Nobody", ""),
        ];
        let (table, stats) = run_ratings(resolver(), &input(&rows), &ActorColumns::default())
            .await
            .unwrap();

        let got: Vec<(&str, &str)> = table
            .rows
            .iter()
            .map(|r| (r[3].as_str(), r[4].as_str()))
            .collect();
        assert_eq!(
            got,
            vec![
                ("7.73", "8.70"),
                ("", "7.73"),
                ("8.70", ""),
                ("7.73", "7.73"),
                ("", ""),
            ]
        );
        assert_eq!(stats.total, 5);
        assert_eq!(stats.first_rated, 3);
        assert_eq!(stats.second_rated, 3);
    }

    #[tokio::test]
    async fn missing_actor_column_is_an_error() {
        let cols = ActorColumns {
            second: "Co-Star".into(),
            ..ActorColumns::default()
        };
        let err = run_ratings(resolver(), &input(&[]), &cols).await.err().unwrap();
        assert!(err.to_string().contains("Co-Star"));
    }
}

use std::collections::BTreeMap;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::checkpoint::Checkpointer;
use crate::settings::PlotConfig;
use crate::table::Table;
use crate::wiki::resolver::PlotResolver;
use crate::wiki::{PlotOutcome, WikiSource};

pub const PLOT_COLUMN: &str = "Wikipedia Plot";
pub const PAGE_COLUMN: &str = "Wiki Page Used";
pub const METHOD_COLUMN: &str = "Method";

/// Input column names for the plot run.
#[derive(Debug, Clone)]
pub struct PlotColumns {
    pub title: String,
    pub year: String,
}

impl Default for PlotColumns {
    fn default() -> Self {
        Self {
            title: "Title".into(),
            year: "Year".into(),
        }
    }
}

/// Counts reported after a plot run.
#[derive(Debug, Default)]
pub struct PlotStats {
    pub total: usize,
    pub found: usize,
    pub by_method: BTreeMap<&'static str, usize>,
}

impl PlotStats {
    fn record(&mut self, outcome: &PlotOutcome) {
        self.total += 1;
        if outcome.is_found() {
            self.found += 1;
        }
        *self.by_method.entry(outcome.method_tag()).or_default() += 1;
    }

    pub fn print(&self) {
        println!("Found plots for {}/{} titles.", self.found, self.total);
        for (method, n) in &self.by_method {
            println!("  {:<14} {}", method, n);
        }
    }
}

/// Results accumulated so far, one entry per processed row.
#[derive(Default)]
struct PlotColumnsOut {
    plots: Vec<Option<String>>,
    pages: Vec<Option<String>>,
    methods: Vec<Option<String>>,
}

impl PlotColumnsOut {
    fn push(&mut self, outcome: &PlotOutcome) {
        self.plots.push(outcome.text().map(str::to_string));
        self.pages.push(outcome.page().map(str::to_string));
        self.methods.push(Some(outcome.method_tag().to_string()));
    }

    /// Input table plus result columns; rows not yet processed stay empty.
    fn apply(&self, input: &Table) -> Table {
        input.with_columns(&[
            (PLOT_COLUMN, self.plots.clone()),
            (PAGE_COLUMN, self.pages.clone()),
            (METHOD_COLUMN, self.methods.clone()),
        ])
    }
}

/// Resolve a plot for every row, one title at a time.
pub async fn run_plots<W: WikiSource>(
    wiki: &W,
    cfg: PlotConfig,
    input: &Table,
    columns: &PlotColumns,
    checkpoints: &mut Checkpointer,
) -> Result<(Table, PlotStats)> {
    let title_col = input.require_column(&columns.title)?;
    let year_col = input.column(&columns.year);
    if year_col.is_none() {
        info!("No '{}' column, searching by title only", columns.year);
    }

    let resolver = PlotResolver::new(wiki, cfg);
    let mut out = PlotColumnsOut::default();
    let mut stats = PlotStats::default();

    let pb = ProgressBar::new(input.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    for row in 0..input.len() {
        let title = input.cell(row, title_col);
        let year = year_col.and_then(|c| input.cell(row, c));

        let outcome = resolver.resolve(title, year).await;
        stats.record(&outcome);
        out.push(&outcome);
        pb.inc(1);

        checkpoints.maybe_write(row + 1, || out.apply(input));
    }

    pb.finish_and_clear();
    info!("Resolved {} rows ({} with plots)", stats.total, stats.found);

    Ok((out.apply(input), stats))
}

mod checkpoint;
mod error;
mod plots;
mod ratings;
mod settings;
mod table;
mod wiki;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};

use checkpoint::{Checkpointer, CsvCheckpoints, SqliteCheckpoints};
use plots::PlotColumns;
use ratings::client::TmdbOmdbClient;
use ratings::pool::ActorColumns;
use ratings::{LookupCache, RatingResolver};
use settings::Settings;
use table::Table;
use wiki::client::WikiClient;

#[derive(Parser)]
#[command(name = "movie_meta", about = "Movie plot and cast rating collector")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve each title to a Wikipedia plot
    Plots {
        /// Input CSV with a title column and optional year column
        #[arg(short, long, default_value = "movies_input.csv")]
        input: PathBuf,
        /// Output CSV
        #[arg(short, long, default_value = "Movies_Wikipedia_Plots_FINAL.csv")]
        output: PathBuf,
        #[arg(long, default_value = "Title")]
        title_column: String,
        #[arg(long, default_value = "Year")]
        year_column: String,
        /// Directory for periodic CSV snapshots
        #[arg(long, default_value = ".")]
        checkpoint_dir: PathBuf,
        /// Also snapshot into this SQLite database
        #[arg(long)]
        checkpoint_db: Option<PathBuf>,
        /// Max rows to process (default: all)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Average IMDb rating of each row's two lead actors
    Ratings {
        /// Input CSV with two actor-name columns
        #[arg(short, long, default_value = "actors_input.csv")]
        input: PathBuf,
        /// Output CSV
        #[arg(short, long, default_value = "actors_with_average_ratings.csv")]
        output: PathBuf,
        #[arg(long, default_value = "First Actor")]
        first_column: String,
        #[arg(long, default_value = "Second Actor")]
        second_column: String,
        /// Max rows to process (default: all)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load()?;

    let result = match cli.command {
        Commands::Plots {
            input,
            output,
            title_column,
            year_column,
            checkpoint_dir,
            checkpoint_db,
            limit,
        } => {
            let mut table = Table::read(&input)?;
            if let Some(n) = limit {
                table.truncate(n);
            }
            if table.is_empty() {
                println!("No rows in {}.", input.display());
                return Ok(());
            }

            let prefix = output
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("plots")
                .trim_end_matches("_FINAL")
                .to_string();
            let mut checkpoints = Checkpointer::new(settings.checkpoint_interval)
                .with_sink(Box::new(CsvCheckpoints::new(checkpoint_dir, prefix)));
            if let Some(db) = checkpoint_db {
                checkpoints = checkpoints.with_sink(Box::new(SqliteCheckpoints::open(&db)?));
            }

            let wiki = WikiClient::new(&settings)?;
            let columns = PlotColumns {
                title: title_column,
                year: year_column,
            };
            println!("Resolving plots for {} titles...", table.len());
            let (out, stats) = plots::run_plots(
                &wiki,
                settings.plot_config(),
                &table,
                &columns,
                &mut checkpoints,
            )
            .await?;
            out.write(&output)?;
            stats.print();
            println!("Saved {}", output.display());
            Ok(())
        }
        Commands::Ratings {
            input,
            output,
            first_column,
            second_column,
            limit,
        } => {
            let mut table = Table::read(&input)?;
            if let Some(n) = limit {
                table.truncate(n);
            }
            if table.is_empty() {
                println!("No rows in {}.", input.display());
                return Ok(());
            }

            let source = TmdbOmdbClient::new(&settings)?;
            let cache = Arc::new(LookupCache::new());
            let resolver = Arc::new(RatingResolver::new(
                source,
                Arc::clone(&cache),
                settings.rating_config(),
            ));
            let columns = ActorColumns {
                first: first_column,
                second: second_column,
            };
            println!(
                "Rating actors for {} rows ({} workers)...",
                table.len(),
                settings.rating_config().workers
            );
            let (out, stats) = ratings::pool::run_ratings(resolver, &table, &columns).await?;
            out.write(&output)?;
            stats.print();
            println!(
                "Looked up {} people, {} distinct actors.",
                cache.person_count(),
                cache.average_count()
            );
            println!("Saved {}", output.display());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn plots_defaults() {
        let cli = Cli::parse_from(["movie_meta", "plots", "-n", "10"]);
        match cli.command {
            Commands::Plots {
                input,
                title_column,
                limit,
                checkpoint_db,
                ..
            } => {
                assert_eq!(input, PathBuf::from("movies_input.csv"));
                assert_eq!(title_column, "Title");
                assert_eq!(limit, Some(10));
                assert!(checkpoint_db.is_none());
            }
            _ => panic!("expected plots"),
        }
    }

    #[test]
    fn durations() {
        use std::time::Duration;
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h 2m 5s");
    }
}

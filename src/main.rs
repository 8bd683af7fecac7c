//! Binary entry point for the reelmatch CLI.
#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use reelmatch_lib::{
    artifact, catalog,
    metadata_client::{self, EnrichedRecommendation, Enrichment},
    Recommendation, RecommenderConfig, RecommenderError, TmdbClient, DEFAULT_K,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "reelmatch",
    version,
    about = "Content-based movie recommendations from TF-IDF tag similarity",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(long, global = true, value_name = "FILE", help = "Config file (defaults to the user config dir)")]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format"
    )]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Build the similarity model from CSV and save it")]
    Build {
        #[arg(long, value_name = "FILE", help = "Movies CSV")]
        movies: PathBuf,
        #[arg(long, value_name = "FILE", help = "Credits CSV joined by title")]
        credits: Option<PathBuf>,
        #[arg(long, value_name = "FILE", help = "Artifact output path")]
        out: PathBuf,
    },
    #[command(about = "Recommend movies similar to a title")]
    Recommend {
        #[arg(long, value_name = "FILE", help = "Saved artifact")]
        artifact: PathBuf,
        #[arg(long, help = "Exact title of the selected movie")]
        title: String,
        #[arg(short = 'k', long, default_value_t = DEFAULT_K, help = "Number of recommendations")]
        k: usize,
        #[arg(long, value_name = "FILE", help = "Validate the artifact against this movies CSV")]
        movies: Option<PathBuf>,
        #[arg(long, value_name = "FILE", requires = "movies", help = "Credits CSV used with --movies")]
        credits: Option<PathBuf>,
        #[arg(long, help = "Fetch details for the selection and each result from TMDB")]
        enrich: bool,
    },
    #[command(about = "List the titles available for selection")]
    Titles {
        #[arg(long, value_name = "FILE", help = "Saved artifact")]
        artifact: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        match err.downcast_ref::<RecommenderError>() {
            Some(e) => eprintln!("error: {}", e.user_message()),
            None => eprintln!("error: {err:#}"),
        }
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = RecommenderConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Command::Build { movies, credits, out } => {
            let (recommender, report) = reelmatch_lib::build_from_csv(&movies, credits.as_deref(), &config)?;
            if let Some(report) = report.as_ref().filter(|r| r.is_degraded()) {
                eprintln!(
                    "warning: duplicated titles after join resolve to their first row: {}",
                    report.duplicated_titles.join(", ")
                );
            }
            let header = artifact::save(&out, &recommender, &config.artifact)?;
            match cli.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&header)?),
                OutputFormat::Text => println!(
                    "Saved {} ({} items, {} features)",
                    out.display(),
                    header.row_count,
                    header.vocabulary_size
                ),
            }
        }
        Command::Recommend {
            artifact: artifact_path,
            title,
            k,
            movies,
            credits,
            enrich,
        } => {
            let recommender = match movies {
                Some(movies) => {
                    let (current, _) = catalog::load_catalog(&movies, credits.as_deref(), &config.catalog)?;
                    artifact::load_for_catalog(&artifact_path, &current)?
                }
                None => artifact::load(&artifact_path)?,
            };

            let recommendations = recommender.recommend(&title, k);
            if recommendations.is_empty() && recommender.catalog().find_by_title(&title).is_none() {
                eprintln!("No movie titled '{}' in the catalog", title);
            }

            if enrich {
                let client = TmdbClient::new(config.tmdb.clone()).map_err(RecommenderError::from)?;
                let cast_size = config.tmdb.max_cast;
                let selected = recommender
                    .catalog()
                    .find_by_title(&title)
                    .and_then(|index| recommender.catalog().get(index));
                let selection = match selected {
                    Some(item) => Some(metadata_client::enrich_selection(item, &client, cast_size).await),
                    None => None,
                };
                let enriched = metadata_client::enrich(recommendations, &client, cast_size).await;
                print_enriched(cli.format, &title, selection.as_ref(), &enriched)?;
            } else {
                print_recommendations(cli.format, &recommendations)?;
            }
        }
        Command::Titles { artifact: artifact_path } => {
            let recommender = artifact::load(&artifact_path)?;
            let titles = recommender.catalog().sorted_unique_titles();
            match cli.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&titles)?),
                OutputFormat::Text => titles.iter().for_each(|t| println!("{t}")),
            }
        }
    }

    Ok(())
}

fn print_recommendations(format: OutputFormat, recommendations: &[Recommendation]) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(recommendations)?),
        OutputFormat::Text => {
            for rec in recommendations {
                println!("{:>2}. {} (id {}, score {:.4})", rec.rank + 1, rec.title, rec.id, rec.score);
            }
        }
    }
    Ok(())
}

fn print_enrichment(enrichment: &Enrichment) {
    match enrichment {
        Enrichment::Available { details, cast } => {
            let rating = details.rating.map(|r| format!("{r:.1}")).unwrap_or_else(|| "N/A".to_string());
            println!(
                "    {} | rating {} | {}",
                details.release_date.as_deref().unwrap_or("N/A"),
                rating,
                details.genres.join(", ")
            );
            if !details.tagline.is_empty() {
                println!("    \"{}\"", details.tagline);
            }
            println!("    poster: {}", details.poster_url);
            if let Some(trailer) = &details.trailer_url {
                println!("    trailer: {trailer}");
            }
            let names: Vec<&str> = cast.iter().map(|c| c.name.as_str()).collect();
            if !names.is_empty() {
                println!("    cast: {}", names.join(", "));
            }
        }
        Enrichment::Unavailable { reason } => println!("    details unavailable: {reason}"),
    }
}

fn print_enriched(
    format: OutputFormat,
    title: &str,
    selection: Option<&Enrichment>,
    enriched: &[EnrichedRecommendation],
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "selection": selection,
                "recommendations": enriched,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Text => {
            if let Some(selection) = selection {
                println!("{title}");
                print_enrichment(selection);
                println!();
            }
            for entry in enriched {
                let rec = &entry.recommendation;
                println!("{:>2}. {} (id {}, score {:.4})", rec.rank + 1, rec.title, rec.id, rec.score);
                print_enrichment(&entry.enrichment);
            }
        }
    }
    Ok(())
}

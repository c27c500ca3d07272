use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod access;
mod aggregate;
mod config;
mod error;
mod grades;
mod import;
mod markup;
mod models;
mod ranking;
mod report;
mod resolver;
mod server;
mod service;
mod subjects;
mod upstream;

use crate::access::AccessPolicy;
use crate::config::Config;
use crate::grades::GradeScale;
use crate::models::{AggregationResult, Metric, OverrideEntry};
use crate::ranking::RankingService;
use crate::server::AppState;
use crate::service::TranscriptService;
use crate::subjects::SubjectClassifier;
use crate::upstream::{HttpGpaSource, HttpTranscriptSource};

#[derive(Parser)]
#[command(name = "transcript-gpa")]
#[command(about = "Transcript GPA aggregation and cohort ranking for Group Scholar", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the credit, GPA and rank endpoints
    Serve {
        #[arg(long, env = "PORT", default_value_t = 3001)]
        port: u16,
    },
    /// Fetch a transcript and print its credit sums
    Credits {
        #[arg(long)]
        stnum: String,
        #[arg(long)]
        rlevel: String,
        /// Session forwarded to the transcript source
        #[arg(long)]
        token: Option<String>,
        /// Retake result as SUBJECT=GRADE, may be repeated
        #[arg(long = "retake", value_parser = parse_retake)]
        retakes: Vec<OverrideEntry>,
    },
    /// Aggregate attempt rows from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long = "retake", value_parser = parse_retake)]
        retakes: Vec<OverrideEntry>,
    },
    /// Rank a student within a range of student numbers
    Rank {
        #[arg(long)]
        start: u32,
        #[arg(long)]
        end: u32,
        #[arg(long)]
        stnum: u32,
        #[arg(long, default_value = "total")]
        metric: Metric,
    },
    /// Generate a markdown GPA report
    Report {
        #[arg(long)]
        stnum: String,
        #[arg(long)]
        rlevel: String,
        #[arg(long)]
        token: Option<String>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn parse_retake(value: &str) -> Result<OverrideEntry, String> {
    let (subject_id, grade) = value
        .split_once('=')
        .ok_or_else(|| format!("expected SUBJECT=GRADE, got `{value}`"))?;

    Ok(OverrideEntry {
        subject_id: subject_id.trim().to_owned(),
        grade: grade.trim().to_owned(),
    })
}

fn init_logging() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("transcript_gpa=debug,info"))?;

    let subscriber = FmtSubscriber::builder()
        .compact()
        .with_env_filter(filter)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("unable to set global default subscriber")
}

fn transcript_service(config: &Config, client: reqwest::Client) -> TranscriptService {
    let source = HttpTranscriptSource::new(
        client,
        config.transcript_url.clone(),
        config.transcript_referer.clone(),
    );

    TranscriptService::new(
        Arc::new(source),
        AccessPolicy::new(
            config.blocked_stnums.iter().cloned(),
            config.deceased_stnums.iter().cloned(),
        ),
        GradeScale::standard(),
        SubjectClassifier::new(config.non_credit_subjects.iter().cloned()),
    )
}

fn ranking_service(config: &Config, client: reqwest::Client) -> RankingService {
    let source = HttpGpaSource::new(client, config.gpa_url.clone(), config.gpa_token.clone());

    RankingService::new(
        Arc::new(source),
        config.rank_level.clone(),
        config.rank_concurrency,
        config.rank_cache_ttl,
    )
}

fn print_sums(result: &AggregationResult) {
    for metric in Metric::ALL {
        let totals = result.scope(metric);

        println!(
            "- {}: {} credits, {:.2} grade points, GPA {}",
            metric,
            totals.credits,
            totals.grade_points,
            aggregate::format_ratio(totals.ratio())
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();
    init_logging()?;

    let cli = Cli::parse();
    let config = Config::from_env().context("invalid configuration")?;
    let client = upstream::build_client(config.request_timeout)
        .context("failed to build HTTP client")?;

    match cli.command {
        Commands::Serve { port } => {
            let state = AppState {
                transcripts: transcript_service(&config, client.clone()),
                ranking: ranking_service(&config, client),
            };

            server::run(Arc::new(state), port).await?;
        }
        Commands::Credits {
            stnum,
            rlevel,
            token,
            retakes,
        } => {
            let evaluation = transcript_service(&config, client)
                .evaluate(&stnum, &rlevel, token.as_deref(), &retakes)
                .await
                .with_context(|| format!("failed to aggregate credits for {stnum}"))?;

            println!("Credit sums for {stnum} at level {rlevel}:");
            print_sums(&evaluation.aggregation);
        }
        Commands::Import { csv, retakes } => {
            let rows = import::read_rows(&csv)?;
            let evaluation = service::evaluate_rows(
                &GradeScale::standard(),
                &SubjectClassifier::new(config.non_credit_subjects.iter().cloned()),
                &rows,
                &retakes,
            )?;

            println!(
                "Resolved {} subjects from {} rows in {}:",
                evaluation.canonical.len(),
                rows.len(),
                csv.display()
            );
            print_sums(&evaluation.aggregation);
        }
        Commands::Rank {
            start,
            end,
            stnum,
            metric,
        } => {
            let stats = ranking_service(&config, client)
                .rank(start, end, metric, stnum)
                .await?;

            match stats.rank {
                Some(rank) => println!("{stnum} ranks {rank} of {} by {metric} GPA.", stats.total_count),
                None => println!("{stnum} is not part of the ranked cohort of {}.", stats.total_count),
            }

            println!(
                "Highest {:.2}, lowest {:.2}, average {:.2}.",
                stats.highest_gpa, stats.lowest_gpa, stats.average_gpa
            );
        }
        Commands::Report {
            stnum,
            rlevel,
            token,
            out,
        } => {
            let evaluation = transcript_service(&config, client)
                .evaluate(&stnum, &rlevel, token.as_deref(), &[])
                .await
                .with_context(|| format!("failed to aggregate credits for {stnum}"))?;
            let report = report::build_report(
                &stnum,
                &rlevel,
                chrono::Utc::now().date_naive(),
                &evaluation,
            );

            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

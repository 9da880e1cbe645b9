use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};

use api_doc_scraper::config::{CrawlConfig, Overrides, Renderer};
use api_doc_scraper::crawler::{self, RunSummary};
use api_doc_scraper::fetch::{HttpFetcher, PageFetcher, Retrying, SpiderFetcher};
use api_doc_scraper::sink::{JsonDirSink, BUNDLE};

#[derive(Parser)]
#[command(name = "api_doc_scraper", about = "Scripting API reference crawler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl index, entity and method pages and write all artifacts
    Run {
        /// Max entities to enrich (default: all)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Pages fetched at once
        #[arg(short, long)]
        concurrency: Option<usize>,
        /// Reference root; relative links resolve against it
        #[arg(long)]
        base_url: Option<String>,
        /// Output directory
        #[arg(short, long)]
        out: Option<PathBuf>,
        #[arg(long, value_enum)]
        renderer: Option<Renderer>,
        /// Retries per page on rate limits, 5xx and timeouts
        #[arg(long)]
        retries: Option<u32>,
    },
    /// Show record counts of written artifacts
    Stats {
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Merge all artifacts into a single <prefix>api.json
    Bundle {
        #[arg(short, long)]
        out: Option<PathBuf>,
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

    let result = match cli.command {
        Commands::Run {
            limit,
            concurrency,
            base_url,
            out,
            renderer,
            retries,
        } => {
            let cfg = CrawlConfig::load(&Overrides {
                base_url,
                output_dir: out,
                concurrency,
                retries,
                renderer,
                limit,
            })?;
            println!(
                "Crawling {} ({} at a time, {} renderer)...",
                cfg.index_url(),
                cfg.concurrency,
                cfg.renderer.as_str()
            );

            let summary = match cfg.renderer {
                Renderer::Http => crawl(HttpFetcher::new(cfg.timeout())?, &cfg).await?,
                Renderer::Spider => crawl(SpiderFetcher::from_env()?, &cfg).await?,
            };
            summary.print();
            Ok(())
        }
        Commands::Stats { out } => {
            let sink = open_sink(out)?;
            for (name, count) in sink.stats()? {
                match count {
                    Some(n) => println!("{:<12} {}", name, n),
                    None => println!("{:<12} -", name),
                }
            }
            Ok(())
        }
        Commands::Bundle { out } => {
            let sink = open_sink(out)?;
            let total = sink
                .bundle()
                .context("bundle needs all four artifacts; run 'run' first")?;
            println!("Bundled {} records into {}", total, sink.path(BUNDLE).display());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn crawl<F: PageFetcher>(fetcher: F, cfg: &CrawlConfig) -> anyhow::Result<RunSummary> {
    let fetcher = Arc::new(Retrying::new(fetcher, cfg.retries, cfg.backoff()));
    let sink = JsonDirSink::new(&cfg.output_dir, &cfg.file_prefix);
    let summary = crawler::run(fetcher, &sink, cfg)
        .await
        .with_context(|| format!("crawl of {} failed", cfg.base_url))?;
    Ok(summary)
}

fn open_sink(out: Option<PathBuf>) -> anyhow::Result<JsonDirSink> {
    let cfg = CrawlConfig::load(&Overrides {
        output_dir: out,
        ..Default::default()
    })?;
    Ok(JsonDirSink::new(cfg.output_dir, cfg.file_prefix))
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

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use entry_scrape::config::{find_config_file, get_config, load_config, Config};
use entry_scrape::models::{Draft, Payload, WebContent};
use entry_scrape::utils::HttpClient;
use entry_scrape::EntryScrapeService;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Entry Scrape - Turn PDFs, exports and web pages into bibliographic drafts
#[derive(Parser, Debug)]
#[command(name = "entry-scrape")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Turn PDFs, exports and web pages into bibliographic drafts", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (can be used multiple times for more verbosity: -v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short)]
    quiet: bool,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Output format for results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Automatic based on terminal (plain if TTY, JSON otherwise)
    Auto,
    /// JSON format (machine-readable)
    Json,
    /// Plain text format
    Plain,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scrape files and URLs into drafts
    #[command(alias = "s")]
    Scrape {
        /// Local paths or http(s) URLs
        inputs: Vec<String>,

        /// JSON file holding an array of raw `{type, value}` payloads
        #[arg(long)]
        payloads: Option<PathBuf>,

        /// Ask the remote recognition service before the local PDF heuristic
        #[arg(long)]
        remote: bool,

        /// Download PDFs linked from web pages
        #[arg(long)]
        download_pdf: bool,

        /// Output format
        #[arg(long, short, value_enum, default_value_t = OutputFormat::Auto)]
        output: OutputFormat,
    },

    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity
    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let env_filter = if cli.quiet { "error" } else { log_level };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("entry_scrape={}", env_filter)),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration from file if specified or found in default locations
    let mut config = if let Some(config_path) = &cli.config {
        load_config(config_path)?
    } else if let Some(config_path) = find_config_file() {
        tracing::info!("Using config file: {}", config_path.display());
        load_config(&config_path)?
    } else {
        get_config()
    };

    match cli.command {
        Some(Commands::Scrape {
            inputs,
            payloads,
            remote,
            download_pdf,
            output,
        }) => {
            if remote {
                config.scrape.local_pdf_parse = false;
            }
            if download_pdf {
                config.scrape.download_pdf = true;
            }

            let service = EntryScrapeService::new(&config)?;
            let mut batch = Vec::new();
            if let Some(path) = payloads {
                let json = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read payloads from {}", path.display()))?;
                batch.extend(Payload::from_json_array(&json)?);
            }
            batch.extend(input_payloads(&inputs, &config).await?);

            if batch.is_empty() {
                anyhow::bail!("Nothing to scrape: pass paths, URLs, or --payloads");
            }

            let drafts = service.scrape(batch).await;
            service.dispose();
            output_drafts(&drafts, output)?;
        }
        Some(Commands::Config) => {
            print!("{}", config.to_toml()?);
        }
        None => {
            println!("No command specified. Use --help for usage information.");
        }
    }

    Ok(())
}

/// Turn command line inputs into payloads, fetching web pages as needed
async fn input_payloads(inputs: &[String], config: &Config) -> Result<Vec<Payload>> {
    let needs_http = inputs.iter().any(|i| is_url(i));
    let http = if needs_http {
        Some(HttpClient::new(config.downloads.default_path.clone())?)
    } else {
        None
    };

    let mut payloads = Vec::with_capacity(inputs.len());
    for input in inputs {
        match &http {
            Some(http) if is_url(input) => payloads.push(web_payload(http, input).await),
            _ => {
                let path = std::fs::canonicalize(input).unwrap_or_else(|_| PathBuf::from(input));
                payloads.push(Payload::file(path.to_string_lossy().into_owned()));
            }
        }
    }
    Ok(payloads)
}

fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Fetch a page; a page that cannot be fetched still goes through by URL
async fn web_payload(http: &HttpClient, url: &str) -> Payload {
    let mut web = WebContent::new(url, "");
    web.document = None;

    let is_pdf = Path::new(url.split(['?', '#']).next().unwrap_or(url))
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if is_pdf {
        return Payload::WebContent(web);
    }

    match http.get_text(url, None).await {
        Ok(document) => web.document = Some(document),
        Err(e) => tracing::warn!(url, error = %e, "Could not fetch page"),
    }
    Payload::WebContent(web)
}

fn output_drafts(drafts: &[Draft], format: OutputFormat) -> Result<()> {
    let actual_format = if format == OutputFormat::Auto {
        if std::io::stdout().is_terminal() {
            OutputFormat::Plain
        } else {
            OutputFormat::Json
        }
    } else {
        format
    };

    match actual_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(drafts)?);
        }
        OutputFormat::Plain => {
            for draft in drafts {
                println!(
                    "{} - {}",
                    draft.title.as_deref().unwrap_or("(untitled)"),
                    draft.authors.as_deref().unwrap_or("unknown authors")
                );
                if let Some(ref publication) = draft.publication {
                    println!("  Venue: {}", publication);
                }
                if let Some(ref year) = draft.pub_time {
                    println!("  Year: {}", year);
                }
                if let Some(ref doi) = draft.doi {
                    println!("  DOI: {}", doi);
                }
                if let Some(ref arxiv) = draft.arxiv {
                    println!("  arXiv: {}", arxiv);
                }
                if let Some(ref url) = draft.main_url {
                    println!("  File: {}", url);
                }
                println!();
            }
            if drafts.is_empty() {
                println!("No drafts found.");
            }
        }
        OutputFormat::Auto => unreachable!(),
    }
    Ok(())
}

mod cli;

use crate::cli::{Command, LogFormat, StorageBackendArg, CLI};
use anyhow::Context;
use clap::Parser;
use snip_batch::BatcherConfig;
use snip_core::ShortCode;
use snip_generator::DigestGenerator;
use snip_shortener::{
    BatchShortenRequest, OwnerUrls, ShortenOutcome, Shortener, ShortenerService,
    ShortenerSettings,
};
use snip_storage::{Backend, FileRepository, FileSettings, InMemoryRepository, MySqlRepository};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

type Service = ShortenerService<Backend, DigestGenerator>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CLI::parse();
    init_tracing(config.log_format);

    let backend = open_backend(&config).await?;
    info!(storage_backend = backend.kind(), "storage opened");

    let settings = ShortenerSettings::builder()
        .base_url(config.base_url)
        .delete_batch(
            BatcherConfig::builder()
                .max_batch(config.delete_max_batch)
                .wait(Duration::from_millis(config.delete_wait_ms))
                .build(),
        )
        .build();
    let service = ShortenerService::new(backend, DigestGenerator::new(), settings);

    let result = run(&service, config.command).await;
    // Drains queued deletes and writes the final file snapshot.
    service.shutdown().await.context("failed to shut down")?;
    result
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn open_backend(config: &CLI) -> anyhow::Result<Backend> {
    let backend: Backend = match config.storage {
        StorageBackendArg::InMemory => InMemoryRepository::new().into(),
        StorageBackendArg::File => {
            let settings = FileSettings::builder()
                .path(config.file_path.clone())
                .snapshot_interval(Duration::from_secs(config.snapshot_interval_secs))
                .build();
            FileRepository::open(settings)
                .await
                .with_context(|| format!("failed to open {}", config.file_path.display()))?
                .into()
        }
        StorageBackendArg::Mysql => {
            let mysql_dsn = config
                .mysql_dsn
                .as_deref()
                .context("mysql dsn is required when storage backend is mysql")?;
            let repository = MySqlRepository::connect(mysql_dsn)
                .await
                .context("failed to connect to mysql")?;
            repository
                .migrate()
                .await
                .context("failed to prepare mysql schema")?;
            repository.into()
        }
    };
    Ok(backend)
}

fn status(outcome: &ShortenOutcome) -> &'static str {
    match outcome {
        ShortenOutcome::Created(_) => "created",
        ShortenOutcome::Existing(_) => "existing",
    }
}

fn parse_codes(codes: Vec<String>) -> anyhow::Result<Vec<ShortCode>> {
    codes
        .into_iter()
        .map(|code| ShortCode::new(&code).with_context(|| format!("invalid short code '{code}'")))
        .collect()
}

async fn run(service: &Service, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Shorten { url, owner } => {
            let outcome = service.shorten(&url, &owner).await?;
            println!("{}\t{}", status(&outcome), service.build_url(outcome.code()));
        }
        Command::ShortenBatch { urls, owner } => {
            let requests = urls
                .into_iter()
                .enumerate()
                .map(|(i, url)| BatchShortenRequest::new(i.to_string(), url))
                .collect();
            for response in service.shorten_batch(requests, &owner).await? {
                match response.outcome {
                    Ok(outcome) => println!(
                        "{}\t{}\t{}",
                        response.correlation_id,
                        status(&outcome),
                        service.build_url(outcome.code())
                    ),
                    Err(e) => println!("{}\terror\t{e}", response.correlation_id),
                }
            }
        }
        Command::Expand { code } => {
            let code = ShortCode::new(&code)?;
            let record = service.expand(&code).await?;
            println!("{}", record.original_url);
        }
        Command::List { owner } => match service.expand_user(&owner).await? {
            OwnerUrls::Empty => println!("no urls for {owner}"),
            OwnerUrls::Urls(records) => {
                for record in records {
                    let state = if record.deleted { "deleted" } else { "active" };
                    println!(
                        "{}\t{}\t{state}",
                        service.build_url(&record.code),
                        record.original_url
                    );
                }
            }
        },
        Command::Delete { codes, owner } => {
            let queued = service.delete_batch(parse_codes(codes)?, &owner).await;
            println!("queued {queued} deletes");
        }
        Command::Stats => {
            let stats = service.stats().await?;
            println!("urls\t{}\nusers\t{}", stats.urls, stats.users);
        }
        Command::Ping => {
            service.ping().await?;
            println!("ok");
        }
    }
    Ok(())
}

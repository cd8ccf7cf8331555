// ABOUTME: CLI entrypoint for folio command
// ABOUTME: Sets up logging, resolves settings, dispatches commands, maps exit codes

use clap::Parser;
use folio::{
    api::{ApiClient, RemoteStore},
    cli::{Cli, Commands},
    codec, frontmatter,
    settings::{self, Settings},
    storage::{TargetStore, VaultStore},
    sync::{SyncOptions, Syncer},
    Error, Result,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("folio: [E{}] {}", e.exit_code(), e);
        std::process::exit(e.exit_code());
    }
}

fn init_logging(verbose: bool) {
    let fallback = if verbose { "folio=debug" } else { "folio=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let settings = settings::resolve(cli.overrides())?;
    let client = build_client(&cli, &settings)?;
    let vault = VaultStore::new(absolute(&settings.vault)?);
    vault.ensure_dirs().await?;

    let options = SyncOptions {
        post_concurrency: settings.concurrency,
        ..SyncOptions::default()
    };

    match cli.command() {
        Commands::FetchAll => {
            let syncer = Syncer::new(client, vault, options).with_progress(progress_bar());
            let report = syncer.fetch_all().await?;
            for (id, err) in report.failed() {
                eprintln!("  {}: {}", id, err);
            }
            let fetched = report.into_result()?;
            println!("Fetched {} posts", fetched.len());
        }
        Commands::Fetch { id } => {
            let syncer = Syncer::new(client, vault, options);
            let fetched = syncer.fetch_post(&id).await?;
            println!("{}", fetched.document.display());
        }
        Commands::FetchOpen { path } => {
            let document = vault.relative(&path)?;
            let syncer = Syncer::new(client, vault, options);
            let fetched = syncer.fetch_open(&document).await?;
            println!("{}", fetched.document.display());
        }
        Commands::Push { path } => {
            let document = vault.relative(&path)?;
            let syncer = Syncer::new(client, vault, options);
            let pushed = syncer.push_post(&document).await?;
            println!(
                "Pushed {} (markdown {}, {} new resources)",
                pushed.id,
                pushed.markdown_id,
                pushed.uploaded.len()
            );
        }
        Commands::List => {
            for id in client.list_post_ids().await? {
                println!("{}", id);
            }
        }
        Commands::Unpack { path } => {
            let document = vault.relative(&path)?;
            let bytes = vault.read_file(&document).await?;
            let text = String::from_utf8(bytes).map_err(|_| Error::Encoding {
                address: document.display().to_string(),
            })?;
            let (header, _) = frontmatter::parse(&text)?;
            let record = client.get_post(&header.id).await?;
            let unpacked = codec::unpack(&text, &record.resources)?;
            println!("{}", serde_json::to_string_pretty(&unpacked)?);
        }
    }

    Ok(())
}

fn build_client(cli: &Cli, settings: &Settings) -> Result<ApiClient> {
    let mut client = ApiClient::new(settings.secret.clone(), Some(settings.domain.clone()))?;
    if cli.no_throttle {
        client = client.disable_throttle();
    } else if let Some((min, max)) = cli.throttle_ms {
        client = client.with_throttle(min, max);
    }
    Ok(client)
}

fn absolute(path: &Path) -> Result<std::path::PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{bar:40}] {pos}/{len} posts")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
    );
    pb
}

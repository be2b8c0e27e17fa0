use anyhow::{Context, Result};
use clap::Parser;
use movie_enricher::{
    run, Cli, CsvCheckpointStore, CsvRecordSource, OpenRouterClient, RecordEnricher,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let api_key = cli.require_api_key()?;
    let client = OpenRouterClient::new(cli.client_settings(api_key))?;
    let enricher = RecordEnricher::new(client, cli.retry_policy());
    let source = CsvRecordSource::new(cli.input.clone());
    let store = CsvCheckpointStore::new(cli.output.clone());

    tracing::info!(
        input = %source.path().display(),
        output = %store.path().display(),
        model = %cli.model,
        concurrency = cli.concurrency,
        "starting enrichment run"
    );
    let summary = run(&source, &store, &enricher, &cli.run_options())
        .with_context(|| format!("enrichment run over {:?} failed", cli.input))?;

    tracing::info!(
        enriched = summary.enriched_total,
        catalog = summary.catalog_len,
        attempted = summary.attempted,
        empty = summary.exhausted,
        elapsed_secs = summary.elapsed.as_secs(),
        output = %store.path().display(),
        "done"
    );
    Ok(())
}

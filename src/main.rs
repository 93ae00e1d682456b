mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use kodex_index::{InMemoryStore, OllamaEmbedder, QdrantStore, VectorStore, run_ingestion};

use crate::config::{Config, LoggingConfig, split_list};

/// Index a source tree into a vector store for semantic code search.
#[derive(Debug, Parser)]
#[command(name = "kodex", version)]
struct Cli {
    /// TOML configuration file [default: $KODEX_CONFIG or config/default.toml]
    #[arg(long)]
    config: Option<PathBuf>,

    /// Source directory to scan (overrides input.source_dir)
    #[arg(long)]
    source: Option<PathBuf>,

    /// Target collection, recreated on every run (overrides qdrant.collection_name)
    #[arg(long)]
    collection: Option<String>,

    /// Comma-separated language ids (overrides processing.languages)
    #[arg(long)]
    languages: Option<String>,

    /// Index into a process-local store instead of Qdrant
    #[arg(long)]
    dry_run: bool,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(source) = &self.source {
            config.input.source_dir.clone_from(source);
        }
        if let Some(collection) = &self.collection {
            config.qdrant.collection_name.clone_from(collection);
        }
        if let Some(languages) = &self.languages {
            config.processing.languages = split_list(languages);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = resolve_config_path(cli.config.as_deref());
    let mut config = Config::load(&config_path)?;
    let rejected_env = config.apply_env_overrides();
    cli.apply(&mut config);

    init_subscriber(&config.logging);
    for message in rejected_env {
        tracing::warn!("{message}");
    }
    config.validate()?;

    let ignore_spec = read_ignore_spec(&config.ignore_path())?;
    let ingest = config.to_ingest(ignore_spec)?;

    let store: Arc<dyn VectorStore> = if cli.dry_run {
        tracing::info!("dry run: indexing into an in-memory store");
        Arc::new(InMemoryStore::new())
    } else {
        Arc::new(QdrantStore::new(&config.qdrant).context("failed to create Qdrant client")?)
    };
    let embedder = OllamaEmbedder::new(&config.embedding);

    tokio::select! {
        result = run_ingestion(&ingest, store, &embedder) => match result {
            Ok(summary) => {
                println!("{summary}");
                Ok(())
            }
            Err(failure) => {
                eprintln!("progress before failure: {}", failure.progress);
                Err(failure).context("ingestion failed")
            }
        },
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("interrupted");
            anyhow::bail!("ingestion interrupted")
        }
    }
}

fn resolve_config_path(cli_path: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_path {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("KODEX_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("config/default.toml")
}

/// Ignore file contents; a missing file means no patterns.
fn read_ignore_spec(path: &Path) -> anyhow::Result<String> {
    match std::fs::read_to_string(path) {
        Ok(spec) => Ok(spec),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no ignore file");
            Ok(String::new())
        }
        Err(e) => {
            Err(e).with_context(|| format!("failed to read ignore file {}", path.display()))
        }
    }
}

fn init_subscriber(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    if let Some(path) = &logging.file {
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
        {
            Ok(file) => {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_ansi(false)
                    .with_writer(file)
                    .init();
                return;
            }
            Err(e) => eprintln!("cannot open log file {}, logging to stderr: {e}", path.display()),
        }
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use serial_test::serial;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn cli_flags_override_config() {
        let cli = Cli::parse_from([
            "kodex",
            "--source",
            "/repo",
            "--collection",
            "repo_units",
            "--languages",
            "go,java",
            "--dry-run",
        ]);
        let mut config = Config::default();
        cli.apply(&mut config);
        assert!(cli.dry_run);
        assert_eq!(config.input.source_dir, PathBuf::from("/repo"));
        assert_eq!(config.qdrant.collection_name, "repo_units");
        assert_eq!(config.processing.languages, vec!["go", "java"]);
    }

    #[test]
    #[serial]
    fn config_path_resolution_order() {
        unsafe { std::env::remove_var("KODEX_CONFIG") };
        assert_eq!(
            resolve_config_path(None),
            PathBuf::from("config/default.toml")
        );
        unsafe { std::env::set_var("KODEX_CONFIG", "/etc/kodex.toml") };
        assert_eq!(resolve_config_path(None), PathBuf::from("/etc/kodex.toml"));
        assert_eq!(
            resolve_config_path(Some(Path::new("local.toml"))),
            PathBuf::from("local.toml")
        );
        unsafe { std::env::remove_var("KODEX_CONFIG") };
    }

    #[test]
    fn missing_ignore_file_is_empty_spec() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_ignore_spec(&dir.path().join(".ragignore")).unwrap(), "");
        std::fs::write(dir.path().join(".ragignore"), "*.pyc\n").unwrap();
        assert_eq!(
            read_ignore_spec(&dir.path().join(".ragignore")).unwrap(),
            "*.pyc\n"
        );
    }
}

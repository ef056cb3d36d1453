//! Command implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use bundlefetch::{
    affinity_key, AffinityStore, BundleIdentity, BundleRegistry, EndpointPool, FetchConfig,
    FileAffinityStore, HttpBundleSource, LoadRequest, ProgressFn,
};

use crate::error::CliError;
use crate::{Cli, Command};

pub async fn run(cli: Cli) -> Result<(), CliError> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Preload => preload(&config).await,
        Command::Fetch { bundle, dir, paths } => fetch(&config, bundle, dir, paths).await,
        Command::Status => status(&config),
    }
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bundlefetch")
        .join("bundles.json")
}

fn load_config(path: Option<&Path>) -> Result<FetchConfig, CliError> {
    match path {
        Some(p) => {
            debug!(path = %p.display(), "loading configuration");
            Ok(FetchConfig::load(p)?)
        }
        None => {
            let default = default_config_path();
            if default.exists() {
                debug!(path = %default.display(), "loading configuration from default location");
                Ok(FetchConfig::load(&default)?)
            } else {
                Err(CliError::Usage(format!(
                    "no configuration found; pass --config or create {}",
                    default.display()
                )))
            }
        }
    }
}

fn affinity_store(config: &FetchConfig) -> Arc<FileAffinityStore> {
    let path = config
        .affinity_file
        .clone()
        .unwrap_or_else(FileAffinityStore::default_path);
    Arc::new(FileAffinityStore::open(path))
}

fn build_registry(config: &FetchConfig) -> Result<BundleRegistry, CliError> {
    let source = Arc::new(HttpBundleSource::new()?);
    let registry = BundleRegistry::from_config(config, source, affinity_store(config))?;
    Ok(registry)
}

async fn preload(config: &FetchConfig) -> Result<(), CliError> {
    let registry = build_registry(config)?;
    let started = Instant::now();
    let handles = registry.preload_all().await?;
    info!(bundles = handles.len(), elapsed = ?started.elapsed(), "preload complete");
    for handle in &handles {
        println!("  {} {}", style("resolved").green(), handle.base());
    }
    println!(
        "{} {} bundle(s) in {:.2?}",
        style("done:").bold(),
        handles.len(),
        started.elapsed()
    );
    Ok(())
}

async fn fetch(
    config: &FetchConfig,
    bundle: Option<String>,
    dir: Option<String>,
    paths: Vec<String>,
) -> Result<(), CliError> {
    if dir.is_none() && paths.is_empty() {
        return Err(CliError::Usage(
            "nothing to fetch: give asset paths or --dir".to_string(),
        ));
    }

    let registry = build_registry(config)?;
    let mut builder = match dir {
        Some(d) => LoadRequest::dir(d),
        None => LoadRequest::paths(paths),
    };
    if let Some(name) = bundle {
        builder = builder.bundle(name);
    }
    let request = builder.build();

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{bar:30.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    let progress_bar = bar.clone();
    let progress: ProgressFn = Arc::new(move |finished, total, item| {
        progress_bar.set_length(total as u64);
        progress_bar.set_position(finished as u64);
        progress_bar.set_message(item.to_string());
    });

    let assets = registry.load(&request, Some(progress)).await?;
    bar.finish_and_clear();
    info!(assets = assets.len(), "fetch complete");

    let mut total = 0usize;
    for asset in &assets {
        total += asset.bytes.len();
        println!("  {}  {} bytes", asset.path, asset.bytes.len());
    }
    println!(
        "{} {} asset(s), {} bytes",
        style("fetched:").bold(),
        assets.len(),
        total
    );
    Ok(())
}

fn status(config: &FetchConfig) -> Result<(), CliError> {
    if config.bundles.is_empty() {
        println!("no bundles configured");
        return Ok(());
    }

    let affinity = affinity_store(config);
    for bundle in &config.bundles {
        let identity = BundleIdentity::new(&bundle.name, &bundle.version);
        let version = if identity.is_versioned() {
            identity.version.clone()
        } else {
            "unversioned".to_string()
        };
        println!("{} ({})", style(&bundle.name).bold(), version);

        let pool = if config.remote_enabled {
            let bases = if bundle.cdn_pool.is_empty() {
                &config.default_pool
            } else {
                &bundle.cdn_pool
            };
            EndpointPool::remote(&identity, bases)
        } else {
            EndpointPool::local(&identity)
        };
        for (i, url) in pool.candidates().iter().enumerate() {
            println!("  [{}] {}", i, url);
        }

        match affinity.get(&affinity_key(&bundle.name)) {
            Some(url) => println!("  affinity: {}", style(url).green()),
            None => println!("  affinity: {}", style("none").dim()),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_is_usage_error() {
        let result = load_config(Some(Path::new("/nonexistent/bundles.json")));
        assert!(result.is_err());
    }

    #[test]
    fn test_explicit_config_is_loaded() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "default_pool": ["http://cdn-a"], "bundles": [{{ "name": "main" }}] }}"#
        )
        .unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.bundles.len(), 1);
        assert_eq!(config.bundles[0].name, "main");
    }

    #[test]
    fn test_default_config_path_ends_with_bundles_json() {
        assert!(default_config_path().ends_with("bundlefetch/bundles.json"));
    }
}

use log::{error, info, warn, LevelFilter};
use log4rs::append::console::ConsoleAppender;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config as LogConfig, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use log4rs::filter::threshold::ThresholdFilter;
use paperback_cache_warmer::archive;
use paperback_cache_warmer::cache::CompletionCache;
use paperback_cache_warmer::config::{Config, ProxyConfig};
use paperback_cache_warmer::error::StartupError;
use paperback_cache_warmer::forwarder::ProxyForwarder;
use paperback_cache_warmer::http_client::Fetch;
use paperback_cache_warmer::models::LibraryEntry;
use paperback_cache_warmer::pipeline::Pipeline;
use paperback_cache_warmer::rate_limit::RateLimiter;
use paperback_cache_warmer::sources::{build_adapters, SourceContext};
use std::process::ExitCode;
use std::sync::Arc;

const EXIT_INTERRUPTED: u8 = 130;

const FILE_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)} {l} {t} - {m}{n}";

/// Same streams as the shipped `log4rs.yml`: terminal, full log, warnings and errors
fn fallback_logging() -> Result<LogConfig, Box<dyn std::error::Error>> {
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{d(%Y-%m-%d %H:%M:%S)} {h({l})} {m}{n}")))
        .build();
    let output = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(FILE_PATTERN)))
        .build("logs/output.log")?;
    let errors = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(FILE_PATTERN)))
        .build("logs/error.log")?;

    Ok(LogConfig::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .appender(Appender::builder().build("output", Box::new(output)))
        .appender(
            Appender::builder()
                .filter(Box::new(ThresholdFilter::new(LevelFilter::Warn)))
                .build("errors", Box::new(errors)),
        )
        .logger(Logger::builder().build("headless_chrome", LevelFilter::Warn))
        .logger(Logger::builder().build("html5ever", LevelFilter::Warn))
        .build(
            Root::builder()
                .appenders(["stdout", "output", "errors"])
                .build(LevelFilter::Info),
        )?)
}

fn init_logging() {
    if let Err(e) = log4rs::init_file("log4rs.yml", Default::default()) {
        match fallback_logging().and_then(|config| Ok(log4rs::init_config(config)?)) {
            Ok(_) => warn!("log4rs.yml not loaded ({}), using built-in logging config", e),
            Err(config_err) => eprintln!("Logging disabled: {} / {}", e, config_err),
        }
    }
}

fn prepare(config: &Config) -> Result<(Pipeline, Vec<LibraryEntry>), StartupError> {
    let proxy = ProxyConfig::from_env()?;

    let archive_path = archive::find_archive(&config.pipeline.archive_dir)?;
    info!("Reading library from {}", archive_path.display());
    let entries = archive::read_library(&archive_path)?;

    let cache = CompletionCache::load(&config.pipeline.cache_file)?;
    info!(
        "Loaded cache {}: {} chapters complete, {} failed",
        cache.path().display(),
        cache.completed_count(),
        cache.failed_count()
    );

    let client = config
        .http
        .create_http_client()
        .map_err(|e| StartupError::HttpClient(e.to_string()))?;
    let fetch: Arc<dyn Fetch> = Arc::new(client);

    let context = SourceContext {
        fetch: fetch.clone(),
        gate: Arc::new(RateLimiter::new("discovery", config.pipeline.discovery_interval())),
    };
    let forwarder = ProxyForwarder::new(
        fetch,
        proxy,
        config.pipeline.chunk_size,
        RateLimiter::new("forward", config.pipeline.forward_interval()),
    );
    let adapters = build_adapters(config, context);

    Ok((Pipeline::new(adapters, forwarder, cache, &config.pipeline), entries))
}

/// Resolves on Ctrl-C; if the handler cannot be installed, never resolves
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Could not listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    let config = Config::load();
    let (mut pipeline, entries) = match prepare(&config) {
        Ok(ready) => ready,
        Err(e) => {
            error!("Startup failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let interrupted = tokio::select! {
        _ = pipeline.run(&entries) => false,
        _ = shutdown_signal() => true,
    };

    if interrupted {
        warn!("Interrupted, saving cache and exiting");
        pipeline.flush();
        pipeline.stats().log_summary();
        return ExitCode::from(EXIT_INTERRUPTED);
    }

    pipeline.stats().log_summary();
    ExitCode::SUCCESS
}

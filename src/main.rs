mod cli;

use chrono::Utc;
use clap::Parser;
use cli::Cli;
use database::open_store;
use post_cache::{CacheConfig, CacheManager, WorkingSet};
use reddit_client::RedditClient;
use seddit_core::{
    load_config, AppConfig, ConfigError, CoreError, ErrorReporter, DEFAULT_CONFIG_PATH,
};
use std::path::PathBuf;
use term_analysis::{
    load_filtered_words, load_term_groups, AnalysisOptions, FrequencyAnalyzer, ScoreTable,
    TermFilter, TermGroupResolver,
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str =
    "seddit=info,post_cache=info,reddit_client=info,database=info,term_analysis=info";
const VERBOSE_LOG_FILTER: &str =
    "seddit=debug,post_cache=debug,reddit_client=debug,database=debug,term_analysis=debug";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let reporter = ErrorReporter::new();
    if let Err(error) = run(cli, &reporter).await {
        reporter.report_error(&error);
        return Err(error.into());
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        VERBOSE_LOG_FILTER
    } else {
        DEFAULT_LOG_FILTER
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli, reporter: &ErrorReporter) -> Result<(), CoreError> {
    let config = load_settings(&cli)?;

    // Bad patterns and missing term files fail the run before any network traffic.
    let analyzer = build_analyzer(&config)?;

    let (db, store) = open_store(&config.cache.store_path()).await?;
    let cache_config = CacheConfig::from_settings(&config.cache).with_force_refresh(cli.force);
    let mut cache = CacheManager::new(store, cache_config);

    let working_set = refresh_subreddit(&mut cache, &config, &cli.subreddit, reporter).await;
    summarize_refresh(&working_set);

    if !working_set.report.refreshed.is_empty() {
        if let Err(error) = db.save_store(cache.store()).await {
            reporter.report_warning(&CoreError::from(error));
        }
    }
    db.close().await;

    let table = analyzer.analyze(&working_set.titles);
    print_results(&table);
    Ok(())
}

fn load_settings(cli: &Cli) -> Result<AppConfig, ConfigError> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let mut config = match load_config(&path) {
        Ok(config) => config,
        Err(ConfigError::FileNotFound { .. }) if cli.config.is_none() => {
            info!("No configuration at {}, using defaults", path.display());
            let mut config = AppConfig::default();
            config.apply_env_overrides();
            config
        }
        Err(error) => return Err(error),
    };

    cli.apply_overrides(&mut config);
    Ok(config)
}

fn build_analyzer(config: &AppConfig) -> Result<FrequencyAnalyzer, ConfigError> {
    let case_sensitive = config.filters.case_sensitive;

    let resolver = match (&config.files.search_terms, &config.files.term_groups) {
        (Some(search_terms), term_groups) => {
            if term_groups.is_some() {
                warn!("Search terms are set; term groups will be ignored");
            }
            TermGroupResolver::search_terms(&load_term_groups(search_terms)?)
        }
        (None, Some(term_groups)) => {
            TermGroupResolver::group_substitution(&load_term_groups(term_groups)?, case_sensitive)
        }
        (None, None) => TermGroupResolver::all_words(case_sensitive),
    };

    let filtered_words = load_filtered_words(&config.files.word_filters)?;
    let filter = TermFilter::new(&config.regex, filtered_words, case_sensitive)?;
    debug!(
        "Analyzing in {:?} mode with {} filtered words",
        resolver.mode(),
        filter.filtered_word_count()
    );

    Ok(FrequencyAnalyzer::new(
        filter,
        resolver,
        AnalysisOptions {
            threshold: config.filters.threshold,
            rank_cutoff: config.filters.rank_limit(),
        },
    ))
}

/// Bring the subreddit's cache up to date. Reddit is only contacted when a
/// feed is stale, so a fresh cache works without credentials.
async fn refresh_subreddit(
    cache: &mut CacheManager,
    config: &AppConfig,
    subreddit: &str,
    reporter: &ErrorReporter,
) -> WorkingSet {
    let stale = cache.stale_feeds(subreddit, Utc::now());
    if stale.is_empty() {
        debug!("Every enabled feed of r/{} is fresh", subreddit);
        return cache.cached_working_set(subreddit);
    }

    match RedditClient::from_settings(&config.reddit, &config.cache) {
        Ok(client) => cache.get_working_set(&client, subreddit).await,
        Err(error) => {
            reporter.report_warning(&error);
            warn!("Continuing with cached posts for r/{}", subreddit);
            cache.cached_working_set(subreddit)
        }
    }
}

fn summarize_refresh(working_set: &WorkingSet) {
    let report = &working_set.report;
    if !report.refreshed.is_empty() {
        info!(
            "r/{}: refreshed {} feed(s), {} new posts",
            working_set.subreddit,
            report.refreshed.len(),
            report.new_posts
        );
    }
    for failure in &report.failed {
        debug!("r/{}/{} was not refreshed", working_set.subreddit, failure.feed);
    }
    info!(
        "r/{}: analyzing {} titles",
        working_set.subreddit,
        working_set.titles.len()
    );
}

fn print_results(table: &ScoreTable) {
    if table.is_empty() {
        println!("No results.");
        return;
    }

    println!("===============================================");
    println!("================  RESULTS  ====================");
    println!("===============================================\n");
    println!("Popularity score:\n");
    for (rank, entry) in table.iter().enumerate() {
        println!("{}) {} - {}", rank + 1, entry.label, entry.count);
    }
}

use clap::Parser;
use seddit_core::AppConfig;
use std::path::PathBuf;

/// Count the most common terms in a subreddit's post titles.
#[derive(Parser, Debug)]
#[command(name = "seddit", version)]
pub struct Cli {
    /// Subreddit to analyze, without the `r/` prefix
    pub subreddit: String,

    /// Configuration file (defaults to config/default.toml)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// CSV of search terms; only these terms are counted, matched case-insensitively
    #[arg(long, visible_alias = "st", value_name = "PATH")]
    pub search_terms: Option<PathBuf>,

    /// CSV of synonym groups; each row's first cell is the reported name
    #[arg(long, visible_alias = "tg", value_name = "PATH")]
    pub term_groups: Option<PathBuf>,

    /// CSV files of words to exclude; pass the flag with no paths to disable filtering
    #[arg(long, visible_alias = "wf", value_name = "PATH", num_args = 0..)]
    pub word_filter: Option<Vec<PathBuf>>,

    /// Drop results counted fewer times than this
    #[arg(long, visible_alias = "th")]
    pub threshold: Option<u64>,

    /// Report at most this many results; negative means unlimited
    #[arg(short, long, allow_negative_numbers = true)]
    pub rank_cutoff: Option<i64>,

    /// Posts to request per feed; zero means as many as Reddit allows
    #[arg(short = 'l', long, allow_negative_numbers = true)]
    pub feed_limit: Option<i64>,

    /// Refresh every enabled feed regardless of its age
    #[arg(short, long)]
    pub force: bool,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Command-line values replace whatever the configuration file said.
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(path) = &self.search_terms {
            config.files.search_terms = Some(path.clone());
        }
        if let Some(path) = &self.term_groups {
            config.files.term_groups = Some(path.clone());
        }
        if let Some(paths) = &self.word_filter {
            config.files.word_filters = paths.clone();
        }
        if let Some(threshold) = self.threshold {
            config.filters.threshold = threshold;
        }
        if let Some(cutoff) = self.rank_cutoff {
            config.filters.rank_cutoff = cutoff;
        }
        if let Some(limit) = self.feed_limit {
            config.cache.feed_limit = limit;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_command_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_aliases_and_overrides() {
        let cli = Cli::try_parse_from([
            "seddit",
            "KerbalSpaceProgram",
            "--st",
            "terms.csv",
            "--th",
            "3",
            "-r",
            "10",
            "-l",
            "200",
            "-f",
        ])
        .unwrap();
        assert_eq!(cli.subreddit, "KerbalSpaceProgram");
        assert!(cli.force);

        let mut config = AppConfig::default();
        config.files.word_filters = vec![PathBuf::from("words.csv")];
        cli.apply_overrides(&mut config);

        assert_eq!(config.files.search_terms, Some(PathBuf::from("terms.csv")));
        assert_eq!(config.files.word_filters, vec![PathBuf::from("words.csv")]);
        assert_eq!(config.filters.threshold, 3);
        assert_eq!(config.filters.rank_limit(), Some(10));
        assert_eq!(config.cache.effective_feed_limit(), 200);
    }

    #[test]
    fn test_bare_word_filter_disables_filtering() {
        let cli = Cli::try_parse_from(["seddit", "rust", "--wf"]).unwrap();
        assert_eq!(cli.word_filter, Some(Vec::new()));

        let mut config = AppConfig::default();
        config.files.word_filters = vec![PathBuf::from("words.csv")];
        cli.apply_overrides(&mut config);
        assert!(config.files.word_filters.is_empty());
    }

    #[test]
    fn test_negative_rank_cutoff_means_unlimited() {
        let cli = Cli::try_parse_from(["seddit", "rust", "--rank-cutoff", "-1"]).unwrap();
        let mut config = AppConfig::default();
        config.filters.rank_cutoff = 5;
        cli.apply_overrides(&mut config);
        assert_eq!(config.filters.rank_limit(), None);
    }
}

use seddit_core::RegexSettings;
use std::io::Write;
use tempfile::NamedTempFile;
use term_analysis::{
    load_filtered_words, load_term_groups, AnalysisOptions, FrequencyAnalyzer, TermFilter,
    TermGroup, TermGroupResolver,
};

fn all_words(threshold: u64, rank_cutoff: Option<usize>) -> FrequencyAnalyzer {
    FrequencyAnalyzer::new(
        TermFilter::allow_all(),
        TermGroupResolver::all_words(false),
        AnalysisOptions {
            threshold,
            rank_cutoff,
        },
    )
}

#[test]
fn test_single_title_ranking() {
    let table = all_words(0, None).analyze(["KSP Mun Duna KSP"]);
    assert_eq!(table.as_pairs(), vec![("KSP", 2), ("Mun", 1), ("Duna", 1)]);
}

#[test]
fn test_threshold_and_rank_cutoff() {
    let table = all_words(2, Some(1)).analyze(["KSP Mun Duna KSP"]);
    assert_eq!(table.as_pairs(), vec![("KSP", 2)]);

    let table = all_words(3, None).analyze(["KSP Mun Duna KSP"]);
    assert!(table.is_empty());
}

#[test]
fn test_ties_keep_first_seen_order() {
    let table = all_words(0, None).analyze(["cat dog", "dog cat"]);
    assert_eq!(table.as_pairs(), vec![("cat", 2), ("dog", 2)]);

    let table = all_words(0, None).analyze(["dog cat", "cat dog"]);
    assert_eq!(table.as_pairs(), vec![("dog", 2), ("cat", 2)]);
}

#[test]
fn test_longest_phrase_counted_once() {
    let groups = vec![
        TermGroup::new(["New York"]).unwrap(),
        TermGroup::new(["New York City"]).unwrap(),
    ];
    let analyzer = FrequencyAnalyzer::new(
        TermFilter::allow_all(),
        TermGroupResolver::search_terms(&groups),
        AnalysisOptions {
            threshold: 1,
            rank_cutoff: None,
        },
    );

    let table = analyzer.analyze(["I love New York City"]);
    assert_eq!(table.as_pairs(), vec![("New York City", 1)]);
}

#[test]
fn test_first_group_claims_shared_alias() {
    let groups = vec![
        TermGroup::new(["A", "x"]).unwrap(),
        TermGroup::new(["B", "x"]).unwrap(),
    ];
    let analyzer = FrequencyAnalyzer::new(
        TermFilter::allow_all(),
        TermGroupResolver::group_substitution(&groups, false),
        AnalysisOptions::default(),
    );

    let table = analyzer.analyze(["x x b"]);
    assert_eq!(table.as_pairs(), vec![("A", 2), ("B", 1)]);
}

#[test]
fn test_title_rules_drop_whole_titles() {
    let rules = RegexSettings {
        ignore_title: Some("(?i)meme".to_string()),
        require_title: None,
        ignore_word: Some(r"^\d+$".to_string()),
        require_word: None,
    };
    let analyzer = FrequencyAnalyzer::new(
        TermFilter::new(&rules, Vec::new(), false).unwrap(),
        TermGroupResolver::all_words(false),
        AnalysisOptions::default(),
    );

    let table = analyzer.analyze(["Jool meme", "Jool 64 Eve", "Eve"]);
    assert_eq!(table.as_pairs(), vec![("Eve", 2), ("Jool", 1)]);
}

#[test]
fn test_files_drive_group_mode() {
    let mut groups_file = NamedTempFile::new().unwrap();
    writeln!(groups_file, "KSP,Kerbal Space Program,\"kerbal, space program\"").unwrap();
    writeln!(groups_file, "# moons").unwrap();
    groups_file.write_all(b"\xff\xfe,broken\n").unwrap();
    writeln!(groups_file, "Mun,moon").unwrap();

    let mut filter_file = NamedTempFile::new().unwrap();
    writeln!(filter_file, "the,a,on").unwrap();

    let groups = load_term_groups(groups_file.path()).unwrap();
    assert_eq!(groups.len(), 2);
    let words = load_filtered_words(&[filter_file.path().to_path_buf()]).unwrap();

    let analyzer = FrequencyAnalyzer::new(
        TermFilter::new(&RegexSettings::default(), words, false).unwrap(),
        TermGroupResolver::group_substitution(&groups, false),
        AnalysisOptions::default(),
    );
    let table = analyzer.analyze([
        "Landed on the Moon in Kerbal Space Program",
        "KSP: a Mun base",
    ]);

    assert_eq!(
        table.as_pairs(),
        vec![("Mun", 2), ("KSP", 2), ("Landed", 1), ("in", 1), ("base", 1)]
    );
}

#[test]
fn test_search_term_with_symbols_is_not_inflated() {
    let groups = vec![TermGroup::new(["C++"]).unwrap()];
    let analyzer = FrequencyAnalyzer::new(
        TermFilter::allow_all(),
        TermGroupResolver::search_terms(&groups),
        AnalysisOptions {
            threshold: 1,
            rank_cutoff: None,
        },
    );

    assert!(analyzer.analyze(["Plan C for the Mun", "C# is nice"]).is_empty());
    assert_eq!(
        analyzer.analyze(["C++ or C?", "modern c++"]).as_pairs(),
        vec![("C++", 2)]
    );
}

#[test]
fn test_dotted_canonical_collects_its_aliases() {
    let groups = vec![TermGroup::new(["U.S.", "USA", "United States"]).unwrap()];
    let analyzer = FrequencyAnalyzer::new(
        TermFilter::allow_all(),
        TermGroupResolver::group_substitution(&groups, false),
        AnalysisOptions::default(),
    );

    let table = analyzer.analyze(["USA wins", "United States again"]);
    assert_eq!(
        table.as_pairs(),
        vec![("U.S.", 2), ("wins", 1), ("again", 1)]
    );
}

#[test]
fn test_exclaimed_search_term() {
    let groups = vec![TermGroup::new(["Mun!"]).unwrap(), TermGroup::new(["Duna"]).unwrap()];
    let analyzer = FrequencyAnalyzer::new(
        TermFilter::allow_all(),
        TermGroupResolver::search_terms(&groups),
        AnalysisOptions::default(),
    );

    let table = analyzer.analyze(["Mun! Mun. Duna!"]);
    assert_eq!(table.as_pairs(), vec![("Mun!", 1), ("Duna", 1)]);
}

#[test]
fn test_no_titles_is_not_an_error() {
    let table = all_words(0, None).analyze(Vec::<String>::new());
    assert!(table.is_empty());
}

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::cli::{
    CompareArgs, ImportArgs, ScoreArgs, SummarizeArgs, SummarizeRefreshMode,
};
use crate::model::ComparisonReport;
use crate::stats::paired_t_test;

use super::{compare, import, score, summarize};

fn write_input_csv(path: &Path) {
    let rows = [
        "paper_id,title,abstract",
        "2401.00001,Feline Agility,Felines exhibit remarkable agility across varied terrain. Their reflexes enable rapid responses to moving prey. Domestic cats retain strong hunting instincts even indoors.",
        "2401.00002,Empty Row,",
        "2401.00003,Canine Cognition,Dogs display advanced social cognition around humans. They follow pointing gestures better than most primates. Selective breeding shaped these cooperative skills over millennia.",
    ];
    fs::write(path, rows.join("\n")).unwrap();
}

fn two_model_cohort() -> Vec<String> {
    vec!["lead-v1".to_string(), "centroid-tf-v1".to_string()]
}

fn import_args(cache_root: &Path, input_path: &Path) -> ImportArgs {
    ImportArgs {
        cache_root: cache_root.to_path_buf(),
        input_path: input_path.to_path_buf(),
        db_path: None,
        dry_run: false,
    }
}

fn summarize_args(cache_root: &Path, models: Vec<String>) -> SummarizeArgs {
    SummarizeArgs {
        cache_root: cache_root.to_path_buf(),
        db_path: None,
        models,
        refresh_mode: SummarizeRefreshMode::MissingOrStale,
        max_input_chars: 1024,
        min_summary_words: 5,
        max_summary_words: 60,
        summaries_csv_path: None,
    }
}

fn score_args(cache_root: &Path, models: Vec<String>) -> ScoreArgs {
    ScoreArgs {
        cache_root: cache_root.to_path_buf(),
        db_path: None,
        models,
        embedding_model_id: "lexical-hash-384-v1".to_string(),
        scores_csv_path: None,
        embedding_model_lock_path: None,
    }
}

fn compare_args(cache_root: &Path, models: Vec<String>) -> CompareArgs {
    CompareArgs {
        cache_root: cache_root.to_path_buf(),
        models,
        scores_csv_path: None,
        report_path: None,
    }
}

fn read_report(path: &PathBuf) -> ComparisonReport {
    serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
}

#[test]
fn end_to_end_pipeline_with_a_blank_abstract() {
    let tmp = TempDir::new().unwrap();
    let cache_root = tmp.path().join("cache");
    let input_path = tmp.path().join("papers.csv");
    write_input_csv(&input_path);

    import::run(import_args(&cache_root, &input_path)).unwrap();
    summarize::run(summarize_args(&cache_root, two_model_cohort())).unwrap();
    score::run(score_args(&cache_root, two_model_cohort())).unwrap();
    compare::run(compare_args(&cache_root, two_model_cohort())).unwrap();

    let connection = import::open_store_ro(&import::default_db_path(&cache_root)).unwrap();

    let paper_count: i64 = connection
        .query_row("SELECT COUNT(*) FROM papers", [], |row| row.get(0))
        .unwrap();
    assert_eq!(paper_count, 3);

    let flagged_status: String = connection
        .query_row(
            "SELECT abstract_status FROM papers WHERE paper_id = '2401.00002'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(flagged_status, "missing");

    let summary_count: i64 = connection
        .query_row("SELECT COUNT(*) FROM summaries", [], |row| row.get(0))
        .unwrap();
    assert_eq!(summary_count, 6);

    let skipped: Vec<(String, String)> = {
        let mut statement = connection
            .prepare("SELECT summary, status FROM summaries WHERE paper_id = '2401.00002'")
            .unwrap();
        let rows = statement
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        rows
    };
    assert_eq!(skipped.len(), 2);
    for (summary, status) in &skipped {
        assert_eq!(summary, "");
        assert_eq!(status, "skipped");
    }

    let score_count: i64 = connection
        .query_row("SELECT COUNT(*) FROM similarity_scores", [], |row| row.get(0))
        .unwrap();
    assert_eq!(score_count, 6);

    let skipped_score: f64 = connection
        .query_row(
            "SELECT score FROM similarity_scores WHERE paper_id = '2401.00002' AND model_id = 'lead-v1'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(skipped_score, 0.0);

    let out_of_range: i64 = connection
        .query_row(
            "SELECT COUNT(*) FROM similarity_scores WHERE score < -1.0 OR score > 1.0",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(out_of_range, 0);

    let summaries_csv =
        fs::read_to_string(cache_root.join("artifacts").join("abstract_with_summaries.csv"))
            .unwrap();
    let header = summaries_csv.lines().next().unwrap();
    assert!(header.contains("lead-v1_summary"));
    assert!(header.contains("centroid-tf-v1_summary"));
    assert_eq!(summaries_csv.lines().count(), 4);

    let report = read_report(&cache_root.join("manifests").join("comparison_report.json"));
    assert_eq!(report.pairs.len(), 1);
    let pair = &report.pairs[0];
    assert_eq!(pair.model_a, "lead-v1");
    assert_eq!(pair.model_b, "centroid-tf-v1");
    assert_eq!(pair.sample_size, 3);
    assert!(pair.statistic.is_finite());
    assert!(pair.p_value >= 0.0 && pair.p_value <= 1.0);
}

#[test]
fn rerunning_summarize_reuses_fresh_rows() {
    let tmp = TempDir::new().unwrap();
    let cache_root = tmp.path().join("cache");
    let input_path = tmp.path().join("papers.csv");
    write_input_csv(&input_path);

    import::run(import_args(&cache_root, &input_path)).unwrap();
    summarize::run(summarize_args(&cache_root, two_model_cohort())).unwrap();
    summarize::run(summarize_args(&cache_root, two_model_cohort())).unwrap();

    let manifest: serde_json::Value = serde_json::from_slice(
        &fs::read(cache_root.join("manifests").join("summarize_run.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(manifest["summaries_reused"], 6);
    assert_eq!(manifest["summaries_generated"], 0);
    assert_eq!(manifest["summaries_skipped"], 0);
}

#[test]
fn score_fails_loudly_when_summaries_are_missing() {
    let tmp = TempDir::new().unwrap();
    let cache_root = tmp.path().join("cache");
    let input_path = tmp.path().join("papers.csv");
    write_input_csv(&input_path);

    import::run(import_args(&cache_root, &input_path)).unwrap();
    let error = score::run(score_args(&cache_root, two_model_cohort())).unwrap_err();
    assert!(error.to_string().contains("run summarize first"));
}

#[test]
fn dry_run_import_leaves_the_store_untouched() {
    let tmp = TempDir::new().unwrap();
    let cache_root = tmp.path().join("cache");
    let input_path = tmp.path().join("papers.csv");
    write_input_csv(&input_path);

    let mut args = import_args(&cache_root, &input_path);
    args.dry_run = true;
    import::run(args).unwrap();

    assert!(!import::default_db_path(&cache_root).exists());
    assert!(cache_root.join("manifests").join("import_run.json").exists());
}

#[test]
fn single_model_cohort_compares_to_zero_pairs() {
    let tmp = TempDir::new().unwrap();
    let cache_root = tmp.path().join("cache");
    let scores_csv_path = tmp.path().join("scores.csv");
    fs::write(&scores_csv_path, "paper_id,lead-v1\np1,0.5\np2,0.75\n").unwrap();

    let report_path = tmp.path().join("report.json");
    let args = CompareArgs {
        cache_root,
        models: vec!["lead-v1".to_string()],
        scores_csv_path: Some(scores_csv_path),
        report_path: Some(report_path.clone()),
    };
    compare::run(args).unwrap();

    let report = read_report(&report_path);
    assert!(report.pairs.is_empty());
    assert!(!report.warnings.is_empty());
}

#[test]
fn three_model_cohort_produces_three_pairs() {
    let tmp = TempDir::new().unwrap();
    let cache_root = tmp.path().join("cache");
    let scores_csv_path = tmp.path().join("scores.csv");
    fs::write(
        &scores_csv_path,
        "paper_id,a,b,c\np1,0.1,0.2,0.3\np2,0.4,0.5,0.6\np3,0.7,0.6,0.5\n",
    )
    .unwrap();

    let report_path = tmp.path().join("report.json");
    let args = CompareArgs {
        cache_root,
        models: vec!["a".to_string(), "b".to_string(), "c".to_string()],
        scores_csv_path: Some(scores_csv_path),
        report_path: Some(report_path.clone()),
    };
    compare::run(args).unwrap();

    let report = read_report(&report_path);
    assert_eq!(report.pairs.len(), 3);
    let pair_names = report
        .pairs
        .iter()
        .map(|pair| (pair.model_a.as_str(), pair.model_b.as_str()))
        .collect::<Vec<(&str, &str)>>();
    assert_eq!(pair_names, vec![("a", "b"), ("a", "c"), ("b", "c")]);
}

#[test]
fn persisted_scores_round_trip_through_the_tester() {
    let left = [0.912_345_678_901_234, 0.523_456_789_012_345, 0.734_567_890_123_456, 0.645_678_901_234_567];
    let right = [0.812_345_678_901_234, 0.623_456_789_012_345, 0.534_567_890_123_456, 0.745_678_901_234_568];
    let expected = paired_t_test(&left, &right).unwrap();

    let tmp = TempDir::new().unwrap();
    let scores_csv_path = tmp.path().join("scores.csv");
    let mut rows = vec!["paper_id,m1,m2".to_string()];
    for (index, (left_value, right_value)) in left.iter().zip(right.iter()).enumerate() {
        rows.push(format!("p{index},{left_value},{right_value}"));
    }
    fs::write(&scores_csv_path, rows.join("\n")).unwrap();

    let report_path = tmp.path().join("report.json");
    let args = CompareArgs {
        cache_root: tmp.path().join("cache"),
        models: vec!["m1".to_string(), "m2".to_string()],
        scores_csv_path: Some(scores_csv_path),
        report_path: Some(report_path.clone()),
    };
    compare::run(args).unwrap();

    let report = read_report(&report_path);
    assert_eq!(report.pairs.len(), 1);
    let pair = &report.pairs[0];
    assert_eq!(pair.statistic, expected.statistic);
    assert_eq!(pair.p_value, expected.p_value);
    assert_eq!(pair.sample_size, expected.sample_size);
}

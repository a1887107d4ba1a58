use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result, bail};
use regex::Regex;

use crate::corpus::{AbstractStatus, Paper};
use crate::util::normalize_whitespace;

pub const DEFAULT_MAX_INPUT_CHARS: usize = 1024;
pub const DEFAULT_MIN_SUMMARY_WORDS: usize = 30;
pub const DEFAULT_MAX_SUMMARY_WORDS: usize = 130;

pub const DEFAULT_COHORT: [&str; 3] = ["lead-v1", "centroid-tf-v1", "mmr-l07-v1"];

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum SummaryStrategy {
    Lead,
    Centroid,
    Mmr { lambda: f64 },
}

impl SummaryStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lead => "lead",
            Self::Centroid => "centroid",
            Self::Mmr { .. } => "mmr",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SummarizerConfig {
    pub model_id: String,
    pub strategy: SummaryStrategy,
    pub max_input_chars: usize,
    pub min_summary_words: usize,
    pub max_summary_words: usize,
}

pub fn resolve_summarizer_config(
    model_id: &str,
    max_input_chars: usize,
    min_summary_words: usize,
    max_summary_words: usize,
) -> Result<SummarizerConfig> {
    let trimmed = model_id.trim();
    let strategy = match trimmed {
        "lead-v1" => SummaryStrategy::Lead,
        "centroid-tf-v1" => SummaryStrategy::Centroid,
        "mmr-l07-v1" => SummaryStrategy::Mmr { lambda: 0.7 },
        other => bail!("unknown summarizer model id '{other}'"),
    };

    if max_input_chars == 0 {
        bail!("max_input_chars must be at least 1");
    }
    if min_summary_words == 0 {
        bail!("min_summary_words must be at least 1");
    }
    if max_summary_words < min_summary_words {
        bail!(
            "max_summary_words ({max_summary_words}) must not be below min_summary_words ({min_summary_words})"
        );
    }

    Ok(SummarizerConfig {
        model_id: trimmed.to_string(),
        strategy,
        max_input_chars,
        min_summary_words,
        max_summary_words,
    })
}

pub fn resolve_cohort(raw_models: &[String]) -> Result<Vec<String>> {
    let cohort = if raw_models.is_empty() {
        DEFAULT_COHORT
            .iter()
            .map(|model_id| model_id.to_string())
            .collect::<Vec<String>>()
    } else {
        raw_models
            .iter()
            .map(|model_id| model_id.trim().to_string())
            .collect::<Vec<String>>()
    };

    let mut seen = HashSet::<String>::new();
    for model_id in &cohort {
        if model_id.is_empty() {
            bail!("cohort contains an empty model id");
        }
        if !seen.insert(model_id.clone()) {
            bail!("cohort lists model '{model_id}' more than once");
        }
    }

    Ok(cohort)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryOutcome {
    Generated(String),
    Skipped,
}

impl SummaryOutcome {
    pub fn status_str(&self) -> &'static str {
        match self {
            Self::Generated(_) => "generated",
            Self::Skipped => "skipped",
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Generated(text) => text,
            Self::Skipped => "",
        }
    }
}

pub struct Summarizer {
    config: SummarizerConfig,
    sentence_boundary: Regex,
}

impl Summarizer {
    pub fn new(config: SummarizerConfig) -> Result<Self> {
        let sentence_boundary = Regex::new(r#"[.!?]+["')\]]*\s+"#)
            .context("failed to compile sentence boundary pattern")?;
        Ok(Self {
            config,
            sentence_boundary,
        })
    }

    pub fn config(&self) -> &SummarizerConfig {
        &self.config
    }

    /// Papers flagged at import, and papers whose abstract collapses to
    /// nothing under whitespace normalization, are skipped before any
    /// sentence ranking runs.
    pub fn summarize(&self, paper: &Paper) -> SummaryOutcome {
        if paper.abstract_status == AbstractStatus::Missing {
            return SummaryOutcome::Skipped;
        }

        let normalized = normalize_whitespace(&paper.abstract_text);
        if normalized.is_empty() {
            return SummaryOutcome::Skipped;
        }

        let truncated = truncate_chars(&normalized, self.config.max_input_chars);
        let sentences = self.split_sentences(truncated);
        if sentences.is_empty() {
            return SummaryOutcome::Skipped;
        }

        let ranking = match self.config.strategy {
            SummaryStrategy::Lead => (0..sentences.len()).collect::<Vec<usize>>(),
            SummaryStrategy::Centroid => rank_by_centroid(&sentences),
            SummaryStrategy::Mmr { lambda } => rank_by_mmr(&sentences, lambda),
        };

        let text = assemble_summary(
            &sentences,
            &ranking,
            self.config.min_summary_words,
            self.config.max_summary_words,
        );
        SummaryOutcome::Generated(text)
    }

    pub fn summarize_batch(&self, papers: &[Paper]) -> Vec<SummaryOutcome> {
        papers.iter().map(|paper| self.summarize(paper)).collect()
    }

    fn split_sentences(&self, text: &str) -> Vec<String> {
        let mut sentences = Vec::<String>::new();
        let mut start = 0usize;

        for boundary in self.sentence_boundary.find_iter(text) {
            let sentence = text[start..boundary.end()].trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            start = boundary.end();
        }

        let tail = text[start..].trim();
        if !tail.is_empty() {
            sentences.push(tail.to_string());
        }

        sentences
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

fn tokenize_words(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|character| character.is_ascii_alphanumeric())
                .collect::<String>()
                .to_ascii_lowercase()
        })
        .filter(|word| !word.is_empty())
        .collect()
}

fn rank_by_centroid(sentences: &[String]) -> Vec<usize> {
    let tokenized = sentences
        .iter()
        .map(|sentence| tokenize_words(sentence))
        .collect::<Vec<Vec<String>>>();

    let mut document_tf = HashMap::<&str, f64>::new();
    for tokens in &tokenized {
        for token in tokens {
            *document_tf.entry(token.as_str()).or_insert(0.0) += 1.0;
        }
    }

    let mut scored = tokenized
        .iter()
        .enumerate()
        .map(|(index, tokens)| {
            if tokens.is_empty() {
                return (index, 0.0);
            }
            let total = tokens
                .iter()
                .map(|token| document_tf.get(token.as_str()).copied().unwrap_or(0.0))
                .sum::<f64>();
            (index, total / tokens.len() as f64)
        })
        .collect::<Vec<(usize, f64)>>();

    scored.sort_by(|left, right| right.1.total_cmp(&left.1).then(left.0.cmp(&right.0)));
    scored.into_iter().map(|(index, _)| index).collect()
}

fn rank_by_mmr(sentences: &[String], lambda: f64) -> Vec<usize> {
    let tokenized = sentences
        .iter()
        .map(|sentence| tokenize_words(sentence))
        .collect::<Vec<Vec<String>>>();

    let vectors = tokenized
        .iter()
        .map(|tokens| TermVector::from_tokens(tokens))
        .collect::<Vec<TermVector>>();

    let document_tokens = tokenized
        .iter()
        .flat_map(|tokens| tokens.iter().cloned())
        .collect::<Vec<String>>();
    let document_vector = TermVector::from_tokens(&document_tokens);

    let relevance = vectors
        .iter()
        .map(|vector| vector.cosine(&document_vector))
        .collect::<Vec<f64>>();

    let mut selected = Vec::<usize>::new();
    let mut remaining = (0..sentences.len()).collect::<Vec<usize>>();

    while !remaining.is_empty() {
        let mut best_index = remaining[0];
        let mut best_score = f64::NEG_INFINITY;
        for &candidate in &remaining {
            let redundancy = selected
                .iter()
                .map(|&chosen| vectors[candidate].cosine(&vectors[chosen]))
                .fold(0.0_f64, f64::max);
            let score = lambda * relevance[candidate] - (1.0 - lambda) * redundancy;
            if score > best_score {
                best_score = score;
                best_index = candidate;
            }
        }
        selected.push(best_index);
        remaining.retain(|&index| index != best_index);
    }

    selected
}

// Selection stops once the minimum word budget is met; the final word-level
// cut enforces the maximum. Sentences are re-emitted in document order.
fn assemble_summary(
    sentences: &[String],
    ranking: &[usize],
    min_words: usize,
    max_words: usize,
) -> String {
    let mut selected = Vec::<usize>::new();
    let mut total_words = 0usize;

    for &index in ranking {
        if total_words >= min_words {
            break;
        }
        selected.push(index);
        total_words += sentences[index].split_whitespace().count();
    }

    selected.sort_unstable();
    let words = selected
        .iter()
        .flat_map(|&index| sentences[index].split_whitespace())
        .collect::<Vec<&str>>();

    words[..words.len().min(max_words)].join(" ")
}

#[derive(Debug, Clone, Default)]
struct TermVector {
    weights: HashMap<String, f64>,
    norm: f64,
}

impl TermVector {
    fn from_tokens(tokens: &[String]) -> Self {
        let mut weights = HashMap::<String, f64>::new();
        for token in tokens {
            *weights.entry(token.clone()).or_insert(0.0) += 1.0;
        }
        let norm = weights
            .values()
            .map(|weight| weight * weight)
            .sum::<f64>()
            .sqrt();
        Self { weights, norm }
    }

    fn cosine(&self, other: &TermVector) -> f64 {
        if self.norm == 0.0 || other.norm == 0.0 {
            return 0.0;
        }
        let mut dot = 0.0;
        for (term, weight) in &self.weights {
            if let Some(other_weight) = other.weights.get(term) {
                dot += weight * other_weight;
            }
        }
        dot / (self.norm * other.norm)
    }
}

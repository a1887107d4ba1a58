use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::Serialize;

use crate::util::normalize_whitespace;

pub const DEFAULT_EMBEDDING_MODEL_ID: &str = "lexical-hash-384-v1";
pub const DEFAULT_EMBEDDING_DIM: usize = 384;
pub const DEFAULT_NORMALIZATION: &str = "l2";
pub const DEFAULT_BACKEND: &str = "hashed-features-v1";

#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingModelConfig {
    pub model_id: String,
    pub dimensions: usize,
    pub normalization: String,
    pub backend: String,
}

pub fn resolve_embedding_config(model_id: &str) -> EmbeddingModelConfig {
    let trimmed = model_id.trim();
    let resolved_id = if trimmed.is_empty() {
        DEFAULT_EMBEDDING_MODEL_ID
    } else {
        trimmed
    };

    EmbeddingModelConfig {
        model_id: resolved_id.to_string(),
        dimensions: DEFAULT_EMBEDDING_DIM,
        normalization: DEFAULT_NORMALIZATION.to_string(),
        backend: DEFAULT_BACKEND.to_string(),
    }
}

/// One encoder instance is built per run and shared across originals and
/// every model's summaries, so all vectors live in the same metric space.
pub struct EmbeddingEncoder {
    config: EmbeddingModelConfig,
}

impl EmbeddingEncoder {
    pub fn new(config: EmbeddingModelConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EmbeddingModelConfig {
        &self.config
    }

    pub fn encode(&self, text: &str) -> Vec<f32> {
        let dims = self.config.dimensions.max(8);
        let mut vector = vec![0_f32; dims];

        let features = text_features(text);
        if features.is_empty() {
            return vector;
        }

        for feature in features {
            let hash = stable_hash(&feature);
            let index = (hash as usize) % dims;
            let sign = if (hash >> 63) & 1 == 0 { 1.0 } else { -1.0 };
            let weight = 1.0 + (((hash >> 48) & 0xFF) as f32 / 255.0);
            vector[index] += sign * weight;
        }

        l2_normalize(&mut vector);
        vector
    }

    pub fn encode_batch(&self, texts: &[&str]) -> Vec<Vec<f32>> {
        texts.iter().map(|text| self.encode(text)).collect()
    }
}

pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f64 {
    if left.len() != right.len() || left.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0_f64;
    let mut left_squared = 0.0_f64;
    let mut right_squared = 0.0_f64;
    for (left_value, right_value) in left.iter().zip(right.iter()) {
        let l = f64::from(*left_value);
        let r = f64::from(*right_value);
        dot += l * r;
        left_squared += l * l;
        right_squared += r * r;
    }

    if left_squared <= 0.0 || right_squared <= 0.0 {
        return 0.0;
    }

    (dot / (left_squared.sqrt() * right_squared.sqrt())).clamp(-1.0, 1.0)
}

fn stable_hash(value: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

fn text_features(text: &str) -> Vec<String> {
    let normalized = normalize_whitespace(text);
    if normalized.is_empty() {
        return Vec::new();
    }

    let words = normalized
        .split(' ')
        .map(|value| {
            value
                .chars()
                .filter(|character| character.is_ascii_alphanumeric())
                .collect::<String>()
                .to_ascii_lowercase()
        })
        .filter(|value| !value.is_empty())
        .collect::<Vec<String>>();

    if words.is_empty() {
        return Vec::new();
    }

    let mut features = Vec::<String>::with_capacity(words.len() * 2);
    for (index, word) in words.iter().enumerate() {
        features.push(format!("w:{word}"));
        if let Some(next) = words.get(index + 1) {
            features.push(format!("b:{word}_{next}"));
        }
    }
    features
}

fn l2_normalize(values: &mut [f32]) {
    let squared_norm = values
        .iter()
        .map(|value| f64::from(*value) * f64::from(*value))
        .sum::<f64>();

    if squared_norm <= 0.0 {
        return;
    }

    let norm = squared_norm.sqrt() as f32;
    if norm == 0.0 {
        return;
    }

    for value in values {
        *value /= norm;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoder() -> EmbeddingEncoder {
        EmbeddingEncoder::new(resolve_embedding_config(DEFAULT_EMBEDDING_MODEL_ID))
    }

    #[test]
    fn encoding_is_deterministic() {
        let encoder = encoder();
        let first = encoder.encode("transformers compress long abstracts into short claims");
        let second = encoder.encode("transformers compress long abstracts into short claims");
        assert_eq!(first, second);
    }

    #[test]
    fn encoded_vectors_have_unit_norm() {
        let encoder = encoder();
        let vector = encoder.encode("a small abstract about spectral graph clustering");
        let norm = vector
            .iter()
            .map(|value| f64::from(*value) * f64::from(*value))
            .sum::<f64>()
            .sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn empty_text_encodes_to_the_zero_vector() {
        let encoder = encoder();
        let vector = encoder.encode("   ");
        assert_eq!(vector.len(), DEFAULT_EMBEDDING_DIM);
        assert!(vector.iter().all(|value| *value == 0.0));
    }

    #[test]
    fn cosine_of_a_vector_with_itself_is_one() {
        let encoder = encoder();
        let vector = encoder.encode("contrastive pretraining for dense retrieval");
        assert!((cosine_similarity(&vector, &vector) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_is_symmetric() {
        let encoder = encoder();
        let left = encoder.encode("masked language modeling");
        let right = encoder.encode("policy gradients in robotics");
        let forward = cosine_similarity(&left, &right);
        let backward = cosine_similarity(&right, &left);
        assert!((forward - backward).abs() < 1e-12);
    }

    #[test]
    fn cosine_with_zero_or_mismatched_vectors_is_zero() {
        let zero = vec![0.0_f32; DEFAULT_EMBEDDING_DIM];
        let encoder = encoder();
        let vector = encoder.encode("any text at all");
        assert_eq!(cosine_similarity(&zero, &vector), 0.0);
        assert_eq!(cosine_similarity(&vector[..10], &vector), 0.0);
    }

    #[test]
    fn related_texts_score_higher_than_unrelated_texts() {
        let encoder = encoder();
        let original = encoder.encode(
            "graph neural networks aggregate neighborhood features to classify nodes in citation graphs",
        );
        let related = encoder
            .encode("graph neural networks classify nodes by aggregating neighborhood features");
        let unrelated = encoder.encode("sourdough fermentation benefits from a cool kitchen");
        assert!(
            cosine_similarity(&original, &related) > cosine_similarity(&original, &unrelated)
        );
    }

    #[test]
    fn encode_batch_preserves_input_order() {
        let encoder = encoder();
        let texts = ["first text", "second text"];
        let batch = encoder.encode_batch(&texts);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], encoder.encode("first text"));
        assert_eq!(batch[1], encoder.encode("second text"));
    }
}

use crate::config::DedupeConfig;
use crate::domain::{DuplicateReason, EventRecord};
use crate::pipeline::image_diff;
use tracing::warn;

/// Pairwise duplicate detection between two records.
///
/// Checks run in a fixed order and the first match wins: exact title,
/// Levenshtein ratio, perceptual image distance. The image check is
/// skipped for records from the same source, where coincidental visual
/// similarity produces too many false positives.
pub struct SimilarityEngine {
    config: DedupeConfig,
}

impl SimilarityEngine {
    pub fn new(config: DedupeConfig) -> Self {
        Self { config }
    }

    pub fn are_duplicates(&self, left: &EventRecord, right: &EventRecord) -> DuplicateReason {
        if left.title == right.title {
            return DuplicateReason::SameTitle;
        }

        let average_length =
            (left.title.chars().count() + right.title.chars().count()) as f64 / 2.0;
        let distance = levenshtein_distance(&left.title, &right.title);
        if distance as f64 <= self.config.edit_distance_ratio * average_length {
            return DuplicateReason::EditDistance;
        }

        if left.source == right.source {
            return DuplicateReason::None;
        }
        if self.image_mismatch(left, right) < self.config.image_mismatch_threshold {
            return DuplicateReason::ImageSimilarity;
        }

        DuplicateReason::None
    }

    /// Perceptual mismatch between the two records' cached images. A
    /// record without a local image, or any comparison failure, scores
    /// maximum mismatch so it can never be claimed as a duplicate.
    fn image_mismatch(&self, left: &EventRecord, right: &EventRecord) -> f64 {
        let (Some(left_image), Some(right_image)) =
            (&left.local_image_path, &right.local_image_path)
        else {
            return image_diff::MAX_MISMATCH;
        };

        match image_diff::mismatch_percentage(left_image, right_image) {
            Ok(percentage) => percentage,
            Err(e) => {
                warn!(
                    "Error comparing event images {} / {}: {}",
                    left.link, right.link, e
                );
                image_diff::MAX_MISMATCH
            }
        }
    }
}

/// Levenshtein distance between two strings, char-based.
fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let chars1: Vec<char> = s1.chars().collect();
    let chars2: Vec<char> = s2.chars().collect();
    let len1 = chars1.len();
    let len2 = chars2.len();

    let mut matrix = vec![vec![0; len2 + 1]; len1 + 1];

    for i in 0..=len1 {
        matrix[i][0] = i;
    }
    for j in 0..=len2 {
        matrix[0][j] = j;
    }

    for i in 1..=len1 {
        for j in 1..=len2 {
            let cost = if chars1[i - 1] == chars2[j - 1] { 0 } else { 1 };
            matrix[i][j] = (matrix[i - 1][j] + 1)
                .min(matrix[i][j - 1] + 1)
                .min(matrix[i - 1][j - 1] + cost);
        }
    }

    matrix[len1][len2]
}

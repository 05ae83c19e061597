use crate::config::DedupeConfig;
use crate::domain::{DuplicateReason, EventRecord};
use crate::pipeline::similarity::SimilarityEngine;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Groups a single day's records into duplicate clusters and keeps one
/// survivor per cluster, chosen by source trust score.
///
/// Must only be invoked on records belonging to one calendar day;
/// clustering across days would merge legitimately repeating events
/// (a weekly meetup) into one.
///
/// Clustering is single-pass: each unclaimed record seeds a cluster and
/// claims every later unclaimed record the similarity engine matches
/// against the seed. Claimed records are never re-evaluated, so the
/// result is order-dependent rather than a transitive closure. This
/// mirrors the behavior the trust table was tuned against.
pub struct DuplicateClusterer {
    similarity: SimilarityEngine,
    trust_scores: HashMap<String, f64>,
    default_trust_score: f64,
    warned_sources: Mutex<HashSet<String>>,
}

impl DuplicateClusterer {
    pub fn new(config: DedupeConfig, trust_scores: HashMap<String, f64>) -> Self {
        let default_trust_score = config.default_trust_score;
        Self {
            similarity: SimilarityEngine::new(config),
            trust_scores,
            default_trust_score,
            warned_sources: Mutex::new(HashSet::new()),
        }
    }

    pub fn cluster(&self, records: Vec<EventRecord>) -> Vec<EventRecord> {
        let mut records = records;
        for record in records.iter_mut() {
            record.is_duplicated = false;
            record.duplicate_reason = DuplicateReason::None;
        }

        let mut clusters: Vec<Vec<usize>> = Vec::new();
        for seed in 0..records.len() {
            if records[seed].is_duplicated {
                continue;
            }
            let mut members = vec![seed];
            for other in (seed + 1)..records.len() {
                if records[other].is_duplicated {
                    continue;
                }
                let reason = self.similarity.are_duplicates(&records[seed], &records[other]);
                if reason != DuplicateReason::None {
                    records[seed].is_duplicated = true;
                    records[seed].duplicate_reason = reason;
                    records[other].is_duplicated = true;
                    records[other].duplicate_reason = reason;
                    members.push(other);
                }
            }
            clusters.push(members);
        }

        let mut survivors = Vec::with_capacity(clusters.len());
        for members in clusters {
            let mut best = members[0];
            let mut best_score = self.trust_score(&records[best].source);
            records[best].score = best_score;
            for &member in &members[1..] {
                let score = self.trust_score(&records[member].source);
                records[member].score = score;
                // Strict comparison keeps the first-seen member on ties.
                if score > best_score {
                    best = member;
                    best_score = score;
                }
            }
            if members.len() > 1 {
                debug!(
                    "Cluster of {} resolved to '{}' from {} (score {})",
                    members.len(),
                    records[best].title,
                    records[best].source,
                    best_score
                );
            }
            survivors.push(records[best].clone());
        }

        survivors
    }

    fn trust_score(&self, source: &str) -> f64 {
        if let Some(score) = self.trust_scores.get(source) {
            return *score;
        }
        if let Ok(mut warned) = self.warned_sources.lock() {
            if warned.insert(source.to_string()) {
                warn!(
                    "No trust score for source '{}', using default {}",
                    source, self.default_trust_score
                );
            }
        }
        self.default_trust_score
    }
}

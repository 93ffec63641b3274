use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Cross-subset averages per model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Averages {
    /// Weighted by each subset's item count.
    pub macro_averages: BTreeMap<String, f64>,
    /// Every subset counts once, regardless of size.
    pub micro_averages: BTreeMap<String, f64>,
}

/// Combine per-subset accuracies into macro and micro averages.
///
/// Only models scored in every subset of `per_subset` take part. A subset
/// without an entry in `weights` weighs 0; a zero total weight gives a macro
/// average of 0.
pub fn macro_micro_averages(
    per_subset: &BTreeMap<String, BTreeMap<String, f64>>,
    weights: &BTreeMap<String, usize>,
) -> Averages {
    let mut averages = Averages::default();
    let Some(complete) = models_in_every_subset(per_subset) else {
        return averages;
    };

    for model in complete {
        let mut weighted_sum = 0.0;
        let mut total_weight = 0.0;
        let mut plain_sum = 0.0;
        for (subset, scores) in per_subset {
            let score = scores[model];
            let weight = weights.get(subset).copied().unwrap_or(0) as f64;
            weighted_sum += score * weight;
            total_weight += weight;
            plain_sum += score;
        }

        let macro_average = if total_weight > 0.0 {
            weighted_sum / total_weight
        } else {
            0.0
        };
        averages.macro_averages.insert(model.to_string(), macro_average);
        averages
            .micro_averages
            .insert(model.to_string(), plain_sum / per_subset.len() as f64);
    }
    averages
}

fn models_in_every_subset(
    per_subset: &BTreeMap<String, BTreeMap<String, f64>>,
) -> Option<BTreeSet<&str>> {
    let mut subsets = per_subset.values();
    let mut common: BTreeSet<&str> = subsets.next()?.keys().map(String::as_str).collect();
    for scores in subsets {
        common.retain(|model| scores.contains_key(*model));
    }
    Some(common)
}

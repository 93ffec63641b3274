use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use tally_core::group::by_question;
use tally_core::record::EvaluationRecord;

/// How one question fared across every model that attempted it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuestionProfile {
    /// Sum of scores.
    pub correct_count: f64,
    /// Number of attempts.
    pub total_count: usize,
    /// `correct_count / total_count`, at most 1, and 0 when nothing was
    /// attempted.
    pub ratio: f64,
}

impl QuestionProfile {
    pub fn from_scores(scores: impl IntoIterator<Item = f64>) -> Self {
        let (correct_count, total_count) = scores
            .into_iter()
            .fold((0.0, 0usize), |(sum, n), s| (sum + s, n + 1));
        let ratio = if total_count == 0 {
            0.0
        } else {
            (correct_count / total_count as f64).min(1.0)
        };
        Self {
            correct_count,
            total_count,
            ratio,
        }
    }

    /// Summed score reaches the attempt count. Scores above 1 can push a
    /// question over the line; ingestion policy decides whether they exist.
    pub fn is_universally_correct(&self) -> bool {
        self.total_count > 0 && self.correct_count >= self.total_count as f64
    }
}

/// Per-question profiles for one subset.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CorrectnessReport {
    pub profiles: BTreeMap<String, QuestionProfile>,
    pub universally_correct: BTreeSet<String>,
}

impl CorrectnessReport {
    /// `question_id → ratio`.
    pub fn ratios(&self) -> BTreeMap<String, f64> {
        self.profiles
            .iter()
            .map(|(id, p)| (id.clone(), p.ratio))
            .collect()
    }

    /// Distinct questions seen.
    pub fn total_questions(&self) -> usize {
        self.profiles.len()
    }

    /// Questions at least one model got wrong.
    pub fn hard_questions(&self) -> usize {
        self.profiles.len() - self.universally_correct.len()
    }
}

/// Profile every question of one subset.
pub fn analyze(records: &[EvaluationRecord]) -> CorrectnessReport {
    let mut report = CorrectnessReport::default();
    for (question_id, group) in by_question(records) {
        let profile = QuestionProfile::from_scores(group.iter().map(|r| r.is_correct));
        if profile.is_universally_correct() {
            report.universally_correct.insert(question_id.to_string());
        }
        report.profiles.insert(question_id.to_string(), profile);
    }
    report
}

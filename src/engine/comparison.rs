// src/engine/comparison.rs

use std::collections::HashMap;

use crate::models::result::{ComparisonSnapshot, LeaderboardEntry, TestResult};

/// Compares `target` against every result of its test.
///
/// `rank` is 1 + the number of results with a strictly higher percentage, so
/// equal percentages share a rank. `population` is expected to contain the
/// target itself; the leaderboard is capped at `limit` rows.
pub fn compare(
    target: &TestResult,
    population: &[TestResult],
    viewer_id: &str,
    limit: usize,
) -> ComparisonSnapshot {
    let participant_count = population.len();
    let rank = 1 + population
        .iter()
        .filter(|r| r.percentage > target.percentage)
        .count();

    let (average_score_percent, top_score_percent) = if population.is_empty() {
        (target.percentage, target.percentage)
    } else {
        let sum: f64 = population.iter().map(|r| r.percentage).sum();
        let top = population
            .iter()
            .map(|r| r.percentage)
            .fold(f64::NEG_INFINITY, f64::max);
        (sum / participant_count as f64, top)
    };

    ComparisonSnapshot {
        rank,
        participant_count,
        average_score_percent,
        top_score_percent,
        leaderboard: leaderboard(population, viewer_id, limit),
    }
}

/// Best result per distinct user, highest first.
///
/// Ties keep population order: the first result seen wins within a user, and
/// the stable sort keeps earlier users ahead of later ones with equal scores.
pub fn leaderboard(population: &[TestResult], viewer_id: &str, limit: usize) -> Vec<LeaderboardEntry> {
    let mut best: Vec<&TestResult> = Vec::new();
    let mut slot_of_user: HashMap<&str, usize> = HashMap::new();

    for result in population {
        let existing = slot_of_user.get(result.user_id.as_str()).copied();
        match existing {
            Some(slot) => {
                if result.percentage > best[slot].percentage {
                    best[slot] = result;
                }
            }
            None => {
                slot_of_user.insert(result.user_id.as_str(), best.len());
                best.push(result);
            }
        }
    }

    best.sort_by(|a, b| b.percentage.total_cmp(&a.percentage));

    best.into_iter()
        .take(limit)
        .enumerate()
        .map(|(position, result)| LeaderboardEntry {
            rank: position + 1,
            display_name: result.user_name.clone(),
            score_percent: result.percentage,
            is_current_user: result.user_id == viewer_id,
        })
        .collect()
}

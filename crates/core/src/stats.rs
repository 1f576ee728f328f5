//! Pure derivations over the full set of a user's progress records.
//!
//! No mutation, no network calls; inputs are whatever the caller already
//! materialized. An empty record set yields all-zero figures rather than
//! an error.

use std::collections::BTreeMap;

use crate::model::{CategoryId, CertificationId, ProgressRecord};

//
// ─── OVERVIEW ──────────────────────────────────────────────────────────────────
//

/// Cross-certification dashboard figures.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProgressOverview {
    pub total_certifications: u32,
    pub completed_certifications: u32,
    pub in_progress_certifications: u32,
    /// Mean score across completed records, rounded to the nearest integer
    /// percentage; `0` when nothing is completed.
    pub average_score: u32,
    pub total_points: u32,
}

impl ProgressOverview {
    #[must_use]
    pub fn from_records(records: &[ProgressRecord]) -> Self {
        let completed: Vec<&ProgressRecord> =
            records.iter().filter(|r| r.is_completed).collect();
        let in_progress = records.iter().filter(|r| r.is_in_progress()).count();

        Self {
            total_certifications: count_u32(records.len()),
            completed_certifications: count_u32(completed.len()),
            in_progress_certifications: count_u32(in_progress),
            average_score: average_score(&completed),
            total_points: records.iter().map(|r| r.points).sum(),
        }
    }
}

//
// ─── CATEGORY ROLLUP ───────────────────────────────────────────────────────────
//

/// Per-category slice of the same figures, plus a completion ratio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRollup {
    pub category_id: CategoryId,
    pub total: u32,
    pub completed: u32,
    pub in_progress: u32,
    pub average_score: u32,
    pub total_points: u32,
    /// Completed over total, as a rounded integer percentage.
    pub progress: u32,
}

/// Group records by certification category and compute per-group figures.
///
/// `category_of` resolves a certification to its category; records whose
/// certification has no known category are skipped. Output is ordered by
/// category id for deterministic rendering.
#[must_use]
pub fn rollup_by_category(
    records: &[ProgressRecord],
    category_of: impl Fn(CertificationId) -> Option<CategoryId>,
) -> Vec<CategoryRollup> {
    let mut groups: BTreeMap<CategoryId, Vec<&ProgressRecord>> = BTreeMap::new();
    for record in records {
        if let Some(category) = category_of(record.certification_id) {
            groups.entry(category).or_default().push(record);
        }
    }

    groups
        .into_iter()
        .map(|(category_id, group)| {
            let completed: Vec<&ProgressRecord> =
                group.iter().filter(|r| r.is_completed).copied().collect();
            let total = count_u32(group.len());
            let completed_count = count_u32(completed.len());
            CategoryRollup {
                category_id,
                total,
                completed: completed_count,
                in_progress: count_u32(group.iter().filter(|r| r.is_in_progress()).count()),
                average_score: average_score(&completed),
                total_points: group.iter().map(|r| r.points).sum(),
                progress: ratio_percent(completed_count, total),
            }
        })
        .collect()
}

fn average_score(completed: &[&ProgressRecord]) -> u32 {
    if completed.is_empty() {
        return 0;
    }
    let sum: f64 = completed.iter().map(|r| r.score_percentage()).sum();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    {
        (sum / completed.len() as f64).round() as u32
    }
}

fn ratio_percent(part: u32, whole: u32) -> u32 {
    if whole == 0 {
        return 0;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    {
        (f64::from(part) / f64::from(whole) * 100.0).round() as u32
    }
}

fn count_u32(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProgressId;
    use crate::time::fixed_now;

    fn record(
        id: u64,
        cert: u64,
        current: u32,
        total: u32,
        correct: u32,
        points: u32,
        completed: bool,
    ) -> ProgressRecord {
        ProgressRecord {
            id: ProgressId::new(id),
            certification_id: CertificationId::new(cert),
            current_question: current,
            total_questions: total,
            correct_answers: correct,
            points,
            is_completed: completed,
            last_active_at: fixed_now(),
        }
    }

    #[test]
    fn overview_matches_reference_figures() {
        let records = vec![
            record(1, 1, 10, 10, 8, 80, true),
            record(2, 2, 3, 10, 0, 0, false),
            record(3, 3, 10, 10, 10, 100, true),
        ];
        let overview = ProgressOverview::from_records(&records);
        assert_eq!(overview.total_certifications, 3);
        assert_eq!(overview.completed_certifications, 2);
        assert_eq!(overview.in_progress_certifications, 1);
        assert_eq!(overview.average_score, 90);
        assert_eq!(overview.total_points, 180);
    }

    #[test]
    fn overview_of_nothing_is_all_zeros() {
        let overview = ProgressOverview::from_records(&[]);
        assert_eq!(overview, ProgressOverview::default());
    }

    #[test]
    fn unstarted_records_are_neither_completed_nor_in_progress() {
        let records = vec![record(1, 1, 0, 10, 0, 0, false)];
        let overview = ProgressOverview::from_records(&records);
        assert_eq!(overview.total_certifications, 1);
        assert_eq!(overview.completed_certifications, 0);
        assert_eq!(overview.in_progress_certifications, 0);
    }

    #[test]
    fn average_score_rounds_to_nearest_integer() {
        let records = vec![
            record(1, 1, 10, 10, 9, 90, true),
            record(2, 2, 12, 12, 10, 100, true),
        ];
        // 90% and 83.333..% average to 86.67 -> 87
        let overview = ProgressOverview::from_records(&records);
        assert_eq!(overview.average_score, 87);
    }

    #[test]
    fn rollup_groups_by_category_and_orders_deterministically() {
        let records = vec![
            record(1, 1, 10, 10, 8, 80, true),
            record(2, 2, 3, 10, 0, 0, false),
            record(3, 3, 10, 10, 10, 100, true),
        ];
        // certifications 1 and 2 share a category, 3 has its own
        let category_of = |cert: CertificationId| match cert.value() {
            1 | 2 => Some(CategoryId::new(7)),
            3 => Some(CategoryId::new(9)),
            _ => None,
        };

        let rollups = rollup_by_category(&records, category_of);
        assert_eq!(rollups.len(), 2);

        let cloud = &rollups[0];
        assert_eq!(cloud.category_id, CategoryId::new(7));
        assert_eq!(cloud.total, 2);
        assert_eq!(cloud.completed, 1);
        assert_eq!(cloud.in_progress, 1);
        assert_eq!(cloud.average_score, 80);
        assert_eq!(cloud.total_points, 80);
        assert_eq!(cloud.progress, 50);

        let security = &rollups[1];
        assert_eq!(security.category_id, CategoryId::new(9));
        assert_eq!(security.total, 1);
        assert_eq!(security.completed, 1);
        assert_eq!(security.average_score, 100);
        assert_eq!(security.progress, 100);
    }

    #[test]
    fn rollup_skips_records_without_a_category() {
        let records = vec![record(1, 1, 10, 10, 8, 80, true)];
        let rollups = rollup_by_category(&records, |_| None);
        assert!(rollups.is_empty());
    }
}

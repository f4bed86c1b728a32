//! Planning: which migrations run, in what order.
//!
//! Progress is tracked by a single watermark, the highest applied id. A
//! migration older than the watermark that is missing from the ledger is not
//! detected as pending.

use super::types::{Migration, MigrationDirection, MigrationError, PlannedMigration};
use std::sync::Arc;

/// Sort definitions by id, rejecting duplicates.
pub fn sort_migrations(
    mut migrations: Vec<Migration>,
) -> Result<Vec<Arc<Migration>>, MigrationError> {
    migrations.sort_by(|a, b| a.id.cmp(&b.id));

    if let Some(pair) = migrations.windows(2).find(|pair| pair[0].id == pair[1].id) {
        return Err(MigrationError::DuplicateId(pair[0].id.clone()));
    }

    Ok(migrations.into_iter().map(Arc::new).collect())
}

/// Select the migrations to run from an id-sorted slice.
///
/// Up yields everything after the watermark, ascending. Down yields
/// everything up to and including it, newest first. A watermark that is not
/// itself among the definitions still splits the slice at the nearest lower id.
pub fn to_apply(
    sorted: &[Arc<Migration>],
    watermark: Option<&str>,
    direction: MigrationDirection,
) -> Vec<Arc<Migration>> {
    let applied = match watermark {
        Some(current) => sorted.partition_point(|m| m.id.as_str() <= current),
        None => 0,
    };

    match direction {
        MigrationDirection::Up => sorted[applied..].to_vec(),
        MigrationDirection::Down => sorted[..applied].iter().rev().cloned().collect(),
    }
}

/// Build the plan for one run.
///
/// `max` caps the number of migrations; 0 means no limit.
pub fn plan_migrations(
    migrations: Vec<Migration>,
    watermark: Option<&str>,
    direction: MigrationDirection,
    max: usize,
) -> Result<Vec<PlannedMigration>, MigrationError> {
    let sorted = sort_migrations(migrations)?;

    let mut pending = to_apply(&sorted, watermark, direction);
    if max > 0 {
        pending.truncate(max);
    }

    Ok(pending
        .into_iter()
        .map(|migration| PlannedMigration::new(migration, direction))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migration(id: &str) -> Migration {
        Migration::new(
            id,
            vec![format!("-- up {id}")],
            vec![format!("-- down {id}")],
        )
    }

    fn definitions(ids: &[&str]) -> Vec<Migration> {
        ids.iter().map(|id| migration(id)).collect()
    }

    fn ids(plan: &[PlannedMigration]) -> Vec<&str> {
        plan.iter().map(|p| p.id()).collect()
    }

    #[test]
    fn test_up_from_empty_ledger_plans_everything_sorted() {
        let plan = plan_migrations(
            definitions(&["003", "001", "002"]),
            None,
            MigrationDirection::Up,
            0,
        )
        .unwrap();
        assert_eq!(ids(&plan), vec!["001", "002", "003"]);
    }

    #[test]
    fn test_up_returns_suffix_after_watermark() {
        let all = &["001", "002", "003", "004"];
        for (position, watermark) in all.iter().enumerate() {
            let plan = plan_migrations(
                definitions(all),
                Some(*watermark),
                MigrationDirection::Up,
                0,
            )
            .unwrap();
            assert_eq!(ids(&plan), all[position + 1..].to_vec());
        }
    }

    #[test]
    fn test_down_returns_prefix_newest_first() {
        let all = &["001", "002", "003", "004"];
        for (position, watermark) in all.iter().enumerate() {
            let plan = plan_migrations(
                definitions(all),
                Some(*watermark),
                MigrationDirection::Down,
                0,
            )
            .unwrap();
            let mut expected = all[..=position].to_vec();
            expected.reverse();
            assert_eq!(ids(&plan), expected);
        }
    }

    #[test]
    fn test_down_with_empty_ledger_is_empty() {
        let plan = plan_migrations(
            definitions(&["001", "002"]),
            None,
            MigrationDirection::Down,
            0,
        )
        .unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_up_at_latest_is_empty() {
        let plan = plan_migrations(
            definitions(&["001", "002"]),
            Some("002"),
            MigrationDirection::Up,
            0,
        )
        .unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_cap_keeps_smallest_pending_ids() {
        let plan = plan_migrations(
            definitions(&["005", "004", "003", "002", "001"]),
            Some("001"),
            MigrationDirection::Up,
            2,
        )
        .unwrap();
        assert_eq!(ids(&plan), vec!["002", "003"]);
    }

    #[test]
    fn test_cap_on_down_keeps_newest() {
        let plan = plan_migrations(
            definitions(&["001", "002", "003"]),
            Some("003"),
            MigrationDirection::Down,
            1,
        )
        .unwrap();
        assert_eq!(ids(&plan), vec!["003"]);
    }

    #[test]
    fn test_cap_larger_than_pending() {
        let plan = plan_migrations(
            definitions(&["001", "002"]),
            None,
            MigrationDirection::Up,
            10,
        )
        .unwrap();
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn test_queries_follow_direction() {
        let up = plan_migrations(definitions(&["001"]), None, MigrationDirection::Up, 0).unwrap();
        assert_eq!(up[0].queries, vec!["-- up 001"]);

        let down = plan_migrations(
            definitions(&["001"]),
            Some("001"),
            MigrationDirection::Down,
            0,
        )
        .unwrap();
        assert_eq!(down[0].queries, vec!["-- down 001"]);
    }

    #[test]
    fn test_watermark_missing_from_definitions_uses_nearest_lower_id() {
        // "002" was applied and later removed from the source
        let all = definitions(&["001", "003"]);

        let up = plan_migrations(all.clone(), Some("002"), MigrationDirection::Up, 0).unwrap();
        assert_eq!(ids(&up), vec!["003"]);

        let down = plan_migrations(all, Some("002"), MigrationDirection::Down, 0).unwrap();
        assert_eq!(ids(&down), vec!["001"]);
    }

    #[test]
    fn test_watermark_below_every_definition() {
        let up = plan_migrations(
            definitions(&["010", "020"]),
            Some("005"),
            MigrationDirection::Up,
            0,
        )
        .unwrap();
        assert_eq!(ids(&up), vec!["010", "020"]);

        let down = plan_migrations(
            definitions(&["010", "020"]),
            Some("005"),
            MigrationDirection::Down,
            0,
        )
        .unwrap();
        assert!(down.is_empty());
    }

    #[test]
    fn test_skipped_older_migration_is_not_pending() {
        // Only the watermark matters: "002" is never re-detected once "003" is applied
        let up = plan_migrations(
            definitions(&["001", "002", "003", "004"]),
            Some("003"),
            MigrationDirection::Up,
            0,
        )
        .unwrap();
        assert_eq!(ids(&up), vec!["004"]);
    }

    #[test]
    fn test_ordering_is_lexicographic() {
        let plan = plan_migrations(
            definitions(&["10_b", "9_a", "001_c"]),
            None,
            MigrationDirection::Up,
            0,
        )
        .unwrap();
        assert_eq!(ids(&plan), vec!["001_c", "10_b", "9_a"]);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let result = plan_migrations(
            definitions(&["001", "002", "001"]),
            None,
            MigrationDirection::Up,
            0,
        );
        assert!(matches!(
            result,
            Err(MigrationError::DuplicateId(id)) if id == "001"
        ));
    }
}

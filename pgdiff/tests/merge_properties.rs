use std::collections::{BTreeMap, BTreeSet};

use pgdiff::diff::{DiffContext, DiffEngine, MergeBranch, MergeStats, OutputLine, Statement};
use pgdiff::objects::GrantAttributeComparator;
use pgdiff::objects::grant_attribute::{
    ATTRIBUTE_ACL, ATTRIBUTE_NAME, COMPARE_NAME, RELATIONSHIP_NAME, SCHEMA_NAME,
};
use pgdiff::types::CatalogRow;
use proptest::prelude::*;

/// `(relation, attribute, role, grantor)` indexes mapped to the permission codes granted.
///
/// One grantee may hold several items on a column, one per grantor.
type Side = BTreeMap<(u8, u8, u8, u8), Vec<char>>;

/// Merge key of a row: compare name and grantee.
type Key = Vec<String>;

fn side() -> impl Strategy<Value = Side> {
    prop::collection::btree_map(
        (0..3u8, 0..2u8, 0..3u8, 0..3u8),
        prop::sample::subsequence(vec!['r', 'w', 'a', 'd', 'x'], 0..=5),
        0..16,
    )
}

/// A side together with its rows in an arbitrary catalog order.
fn shuffled_side() -> impl Strategy<Value = (Side, Vec<CatalogRow>)> {
    side().prop_flat_map(|side| {
        let rows = rows(&side);
        (Just(side), Just(rows).prop_shuffle())
    })
}

fn role_name(role: u8) -> String {
    // Role 0 is PUBLIC.
    if role == 0 {
        String::new()
    } else {
        format!("role{role}")
    }
}

fn compare_name(relation: u8, attribute: u8) -> String {
    format!("r.t{relation}.c{attribute}")
}

fn key(relation: u8, attribute: u8, role: u8) -> Key {
    vec![compare_name(relation, attribute), role_name(role)]
}

fn rows(side: &Side) -> Vec<CatalogRow> {
    side.iter()
        .map(|(&(relation, attribute, role, grantor), permissions)| {
            let codes: String = permissions.iter().collect();
            [
                (SCHEMA_NAME, "public".to_string()),
                (COMPARE_NAME, compare_name(relation, attribute)),
                (RELATIONSHIP_NAME, format!("t{relation}")),
                (ATTRIBUTE_NAME, format!("c{attribute}")),
                (
                    ATTRIBUTE_ACL,
                    format!("{}={codes}/grantor{grantor}", role_name(role)),
                ),
            ]
            .into_iter()
            .collect()
        })
        .collect()
}

fn merge(source: Vec<CatalogRow>, target: Vec<CatalogRow>) -> (Vec<Statement>, MergeStats) {
    let context = DiffContext::default();
    let mut source = GrantAttributeComparator::new(source, context.clone());
    let mut target = GrantAttributeComparator::new(target, context);
    let mut lines: Vec<OutputLine> = Vec::new();

    let stats = DiffEngine::default()
        .run(&mut source, &mut target, &mut lines)
        .unwrap();

    let statements = lines
        .into_iter()
        .map(|line| match line {
            OutputLine::Statement(statement) => statement,
            OutputLine::Comment(text) => panic!("unexpected comment `{text}`"),
        })
        .collect();

    (statements, stats)
}

/// Number of items per merge key, and how many of them carry any permission.
fn items_per_key(side: &Side) -> BTreeMap<Key, (usize, usize)> {
    let mut counts: BTreeMap<Key, (usize, usize)> = BTreeMap::new();
    for (&(relation, attribute, role, _), permissions) in side {
        let entry = counts.entry(key(relation, attribute, role)).or_default();
        entry.0 += 1;
        if !permissions.is_empty() {
            entry.1 += 1;
        }
    }
    counts
}

fn statements_per_key(statements: &[Statement], branch: MergeBranch) -> BTreeMap<Key, usize> {
    let mut counts: BTreeMap<Key, usize> = BTreeMap::new();
    for statement in statements.iter().filter(|statement| statement.branch == branch) {
        *counts.entry(statement.key.clone()).or_default() += 1;
    }
    counts
}

proptest! {
    #[test]
    fn exhaustion_fallbacks_are_never_taken(
        (_, source) in shuffled_side(),
        (_, target) in shuffled_side()
    ) {
        let (_, stats) = merge(source, target);

        prop_assert_eq!(stats.fallbacks, 0);
    }

    #[test]
    fn emitted_keys_never_decrease(
        (_, source) in shuffled_side(),
        (_, target) in shuffled_side()
    ) {
        let (statements, _) = merge(source, target);

        for pair in statements.windows(2) {
            prop_assert!(pair[0].key <= pair[1].key, "{:?} before {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn diffing_a_side_against_any_reordering_of_itself_is_a_no_op(
        (side, shuffled) in shuffled_side()
    ) {
        let (statements, stats) = merge(rows(&side), shuffled);

        prop_assert!(statements.is_empty(), "{:?}", statements);
        prop_assert_eq!(stats.adds + stats.drops, 0);
    }

    #[test]
    fn items_pair_up_per_key_and_the_rest_is_added_or_dropped(
        (source_side, source) in shuffled_side(),
        (target_side, target) in shuffled_side()
    ) {
        let (statements, stats) = merge(source, target);

        let source_items = items_per_key(&source_side);
        let target_items = items_per_key(&target_side);
        let adds = statements_per_key(&statements, MergeBranch::Add);
        let drops = statements_per_key(&statements, MergeBranch::Drop);

        let keys: BTreeSet<&Key> = source_items.keys().chain(target_items.keys()).collect();
        let (mut expected_adds, mut expected_drops, mut expected_changes) = (0, 0, 0);
        for key in keys {
            let (in_source, granting_source) = source_items.get(key).copied().unwrap_or_default();
            let (in_target, granting_target) = target_items.get(key).copied().unwrap_or_default();
            let added = adds.get(key).copied().unwrap_or_default();
            let dropped = drops.get(key).copied().unwrap_or_default();

            expected_adds += in_source.saturating_sub(in_target);
            expected_drops += in_target.saturating_sub(in_source);
            expected_changes += in_source.min(in_target);

            prop_assert!(added <= in_source.saturating_sub(in_target), "adds for {:?}", key);
            prop_assert!(dropped <= in_target.saturating_sub(in_source), "drops for {:?}", key);
            if in_target == 0 {
                prop_assert_eq!(added, granting_source, "adds for {:?}", key);
            }
            if in_source == 0 {
                prop_assert_eq!(dropped, granting_target, "drops for {:?}", key);
            }
        }

        prop_assert_eq!(stats.adds, expected_adds);
        prop_assert_eq!(stats.drops, expected_drops);
        prop_assert_eq!(stats.changes, expected_changes);
    }

    #[test]
    fn changes_only_touch_shared_keys(
        (source_side, source) in shuffled_side(),
        (target_side, target) in shuffled_side()
    ) {
        let (statements, _) = merge(source, target);

        let source_items = items_per_key(&source_side);
        let target_items = items_per_key(&target_side);
        for key in statements_per_key(&statements, MergeBranch::Change).keys() {
            prop_assert!(
                source_items.contains_key(key) && target_items.contains_key(key),
                "change for one-sided key {:?}",
                key
            );
        }
    }
}

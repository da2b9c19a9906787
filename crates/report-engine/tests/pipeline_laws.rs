//! Property tests for the pipeline's algebraic contracts: filter
//! composition, aggregation cardinality/conservation, and the pivot/melt
//! round trip.

use proptest::prelude::*;
use std::collections::BTreeSet;

use report_engine::{aggregate, filter, melt, pivot, AggregateSpec, Predicate, Totals};
use report_model::{Table, Value};

fn category() -> impl Strategy<Value = Value> {
    prop_oneof![
        4 => prop::sample::select(vec!["AIFS", "Cirrus", "TIG", "Tempest"]).prop_map(Value::from),
        1 => Just(Value::Null),
    ]
}

fn account() -> impl Strategy<Value = Value> {
    prop::sample::select(vec!["P1", "P2", "P3"]).prop_map(Value::from)
}

/// Whole hours keep floating-point sums exact, so the conservation law can
/// compare with `==`.
fn hours() -> impl Strategy<Value = Value> {
    prop_oneof![
        5 => (1i64..100).prop_map(Value::from),
        1 => Just(Value::Null),
    ]
}

fn usage_table() -> impl Strategy<Value = Table> {
    prop::collection::vec((category(), account(), hours()), 0..40).prop_map(|rows| {
        Table::new(
            vec!["PROJECT".to_string(), "ACCOUNT".to_string(), "HRS".to_string()],
            rows.into_iter().map(|(p, a, h)| vec![p, a, h]).collect(),
        )
        .expect("generated rows share one schema")
    })
}

fn predicate() -> impl Strategy<Value = Predicate> {
    prop_oneof![
        Just(Predicate::True),
        prop::sample::select(vec!["AIFS", "Cirrus", "TIG", "Tempest"])
            .prop_map(|p| Predicate::equals("PROJECT", p)),
        Just(Predicate::not_in("PROJECT", ["Tempest"])),
        (1i64..100, 1i64..100).prop_map(|(a, b)| {
            Predicate::number_range("HRS", a.min(b) as f64, a.max(b) as f64)
        }),
        Just(Predicate::is_null("PROJECT")),
        Just(Predicate::not_null("HRS")),
    ]
}

proptest! {
    #[test]
    fn filter_composition_equals_conjunction(
        table in usage_table(),
        p1 in predicate(),
        p2 in predicate(),
    ) {
        let chained = filter(&filter(&table, &p1).unwrap(), &p2).unwrap();
        let combined = filter(&table, &p1.clone().and(p2.clone())).unwrap();
        prop_assert_eq!(chained, combined);
    }

    #[test]
    fn filter_never_changes_schema_or_invents_rows(
        table in usage_table(),
        p in predicate(),
    ) {
        let filtered = filter(&table, &p).unwrap();
        prop_assert_eq!(filtered.headers(), table.headers());
        prop_assert!(filtered.row_count() <= table.row_count());
    }

    #[test]
    fn aggregate_has_one_row_per_distinct_group(table in usage_table()) {
        let out = aggregate(
            &table,
            &["PROJECT", "ACCOUNT"],
            &[AggregateSpec::sum("HRS", "HRS")],
            Totals::None,
        ).unwrap();

        let distinct: BTreeSet<Vec<report_model::Key>> = table
            .rows()
            .iter()
            .map(|row| vec![row[0].to_key(), row[1].to_key()])
            .collect();
        prop_assert_eq!(out.row_count(), distinct.len());
    }

    #[test]
    fn sum_aggregation_conserves_the_total(table in usage_table()) {
        let out = aggregate(
            &table,
            &["PROJECT"],
            &[AggregateSpec::sum("HRS", "HRS")],
            Totals::None,
        ).unwrap();

        let input_total: f64 = table.rows().iter().filter_map(|r| r[2].as_f64()).sum();
        let output_total: f64 = out.rows().iter().filter_map(|r| r[1].as_f64()).sum();
        prop_assert_eq!(input_total, output_total);
    }

    #[test]
    fn totals_row_matches_the_sum_of_the_groups(table in usage_table()) {
        let out = aggregate(
            &table,
            &["PROJECT"],
            &[AggregateSpec::sum("HRS", "HRS")],
            Totals::Append("Total".to_string()),
        ).unwrap();

        // The totals row is always appended, so the output is never empty.
        prop_assert!(!out.rows().is_empty());
        let (totals, groups) = out.rows().split_last().unwrap();
        let group_total: f64 = groups.iter().filter_map(|r| r[1].as_f64()).sum();
        match totals[1].as_f64() {
            Some(n) => prop_assert_eq!(n, group_total),
            // An input with no numeric values totals to null and the groups
            // to an empty sum.
            None => prop_assert_eq!(group_total, 0.0),
        }
    }

    #[test]
    fn pivot_then_melt_reproduces_the_aggregate(table in usage_table()) {
        // Aggregate first so the pivot contract holds, and keep null project
        // groups out: a null row key would melt back as "(blank)" text.
        let table = filter(&table, &Predicate::not_null("PROJECT")).unwrap();
        let aggregated = aggregate(
            &table,
            &["PROJECT", "ACCOUNT"],
            &[AggregateSpec::sum("HRS", "HRS")],
            Totals::None,
        ).unwrap();

        let wide = pivot(&aggregated, "PROJECT", "ACCOUNT", "HRS", Value::from(0.0)).unwrap();
        let long = melt(&wide, "PROJECT", "ACCOUNT", "HRS").unwrap();
        // Hours are positive, so exactly the filled-in combinations are zero.
        let observed = filter(&long, &Predicate::equals("HRS", 0.0).not()).unwrap();
        let observed = filter(&observed, &Predicate::not_null("HRS")).unwrap();

        let roundtrip = aggregate(
            &observed,
            &["PROJECT", "ACCOUNT"],
            &[AggregateSpec::sum("HRS", "HRS")],
            Totals::None,
        ).unwrap();
        let expected = filter(&aggregated, &Predicate::equals("HRS", 0.0).not()).unwrap();
        let expected = filter(&expected, &Predicate::not_null("HRS")).unwrap();
        prop_assert_eq!(roundtrip, expected);
    }
}

//! End-to-end normalization tests: imputation followed by type correction.

use bip_model::Dataset;
use bip_normalization::{
    FillStrategy, NormalizationError, correct_datatypes, impute_missing_values,
};
use polars::df;
use polars::prelude::*;
use proptest::prelude::*;

fn mixed_dataset() -> Dataset {
    df! {
        "A" => [Some(1i64), Some(2), None, Some(4)],
        "B" => [Some("x"), None, Some("z"), Some("w")],
        "C" => [Some(10.5), Some(20.3), Some(30.1), None],
    }
    .unwrap()
    .into()
}

#[test]
fn imputation_fills_median_and_mode() {
    let outcome = impute_missing_values(mixed_dataset()).unwrap();
    let ds = &outcome.dataset;

    assert_eq!(ds.height(), 4);
    assert_eq!(ds.null_count(), 0);
    assert_eq!(outcome.report.remaining_nulls, 0);

    assert_eq!(ds.column("A").unwrap().i64().unwrap().get(2), Some(2));
    assert_eq!(ds.column("B").unwrap().str().unwrap().get(1), Some("x"));
    assert_eq!(ds.column("C").unwrap().f64().unwrap().get(3), Some(20.3));

    let report = &outcome.report;
    assert_eq!(report.column("A").unwrap().strategy, FillStrategy::Median);
    assert_eq!(report.column("B").unwrap().strategy, FillStrategy::Mode);
    assert_eq!(report.column("C").unwrap().fill_value.as_deref(), Some("20.3"));
    assert_eq!(report.column("C").unwrap().null_percent, 25.0);
    assert!(report.critical_columns.is_empty());
    assert_eq!(report.with_missing().count(), 3);
}

#[test]
fn invoice_dates_are_coerced() {
    let dataset: Dataset = df! {
        "InvoiceDate" => ["2024-01-15", "not-a-date", "2024-01-17"],
    }
    .unwrap()
    .into();

    let outcome = correct_datatypes(dataset).unwrap();
    let column = outcome.dataset.column("InvoiceDate").unwrap();

    assert_eq!(
        column.dtype(),
        &DataType::Datetime(TimeUnit::Microseconds, None)
    );
    assert_eq!(column.null_count(), 1);

    let coercion = &outcome.report.datetime_coercions[0];
    assert_eq!(coercion.column, "InvoiceDate");
    assert_eq!(coercion.parsed, 2);
    assert_eq!(coercion.coerced_to_null, 1);

    let first = bip_common::any_to_naive_datetime(column.get(0).unwrap()).unwrap();
    assert_eq!(first.to_string(), "2024-01-15 00:00:00");
}

#[test]
fn stages_thread_the_dataset() {
    let dataset: Dataset = df! {
        "InvoiceNo" => ["536365", "536365", "536366"],
        "Quantity" => [Some(6.0), None, Some(8.0)],
        "InvoiceDate" => [Some("12/1/2010 8:26"), None, Some("12/1/2010 8:28")],
        "Country" => ["United Kingdom", "United Kingdom", "France"],
    }
    .unwrap()
    .into();

    let imputed = impute_missing_values(dataset).unwrap();
    let corrected = correct_datatypes(imputed.dataset).unwrap();
    let ds = &corrected.dataset;

    assert_eq!(ds.height(), 3);
    assert_eq!(ds.column("Quantity").unwrap().dtype(), &DataType::UInt8);
    assert_eq!(ds.column("Quantity").unwrap().u8().unwrap().get(1), Some(7));
    assert_eq!(ds.column("InvoiceDate").unwrap().null_count(), 0);
    assert_eq!(corrected.report.before.len(), 4);
    assert_eq!(corrected.report.after[1].dtype, "u8");
}

#[test]
fn stages_require_a_dataset() {
    assert!(matches!(
        impute_missing_values(None),
        Err(NormalizationError::NotLoaded)
    ));
    assert!(matches!(
        correct_datatypes(None),
        Err(NormalizationError::NotLoaded)
    ));
}

proptest! {
    #[test]
    fn imputation_leaves_no_nulls_and_keeps_rows(
        numbers in prop::collection::vec(prop::option::of(-1000i64..1000), 1..40),
        labels in prop::collection::vec(prop::option::of("[a-c]"), 1..40),
    ) {
        let rows = numbers.len().min(labels.len());
        let numbers = &numbers[..rows];
        let labels: Vec<Option<&str>> = labels[..rows].iter().map(|l| l.as_deref()).collect();
        let has_number = numbers.iter().any(Option::is_some);

        let dataset: Dataset = DataFrame::new(vec![
            Column::new("n".into(), numbers),
            Column::new("s".into(), &labels),
        ])
        .unwrap()
        .into();

        let outcome = impute_missing_values(dataset).unwrap();
        prop_assert_eq!(outcome.dataset.height(), rows);
        prop_assert_eq!(outcome.dataset.column("s").unwrap().null_count(), 0);
        if has_number {
            prop_assert_eq!(outcome.dataset.null_count(), 0);
        }
    }
}

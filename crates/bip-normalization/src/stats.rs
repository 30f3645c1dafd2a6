//! Per-column statistics computed on demand during normalization.

use bip_model::ColumnKind;
use polars::prelude::*;
use serde::Serialize;

/// Null count and numeric range of a column.
///
/// `min`, `max` and `all_integral` only consider non-null values and are
/// `None`/`false` for non-numeric or all-null columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnStats {
    pub rows: usize,
    pub null_count: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub all_integral: bool,
}

impl ColumnStats {
    pub fn compute(column: &Column) -> PolarsResult<Self> {
        let rows = column.len();
        let null_count = column.null_count();

        if !ColumnKind::from_dtype(column.dtype()).is_numeric() {
            return Ok(Self {
                rows,
                null_count,
                min: None,
                max: None,
                all_integral: false,
            });
        }

        let values = column.cast(&DataType::Float64)?;
        let mut min: Option<f64> = None;
        let mut max: Option<f64> = None;
        let mut all_integral = true;
        for v in values.f64()?.into_iter().flatten() {
            if !v.is_finite() || v.trunc() != v {
                all_integral = false;
            }
            min = Some(min.map_or(v, |m| m.min(v)));
            max = Some(max.map_or(v, |m| m.max(v)));
        }

        Ok(Self {
            rows,
            null_count,
            min,
            max,
            all_integral: all_integral && min.is_some(),
        })
    }

    /// Share of null cells, 0 to 100.
    pub fn null_percent(&self) -> f64 {
        if self.rows == 0 {
            0.0
        } else {
            self.null_count as f64 / self.rows as f64 * 100.0
        }
    }

    pub fn is_all_null(&self) -> bool {
        self.rows > 0 && self.null_count == self.rows
    }
}

/// Median of the non-null values of a numeric column.
///
/// Even counts average the two middle values. `None` when every value is null.
pub fn median(column: &Column) -> PolarsResult<Option<f64>> {
    let values = column.cast(&DataType::Float64)?;
    let mut present: Vec<f64> = values.f64()?.into_iter().flatten().collect();
    if present.is_empty() {
        return Ok(None);
    }
    present.sort_by(f64::total_cmp);
    let mid = present.len() / 2;
    let value = if present.len() % 2 == 0 {
        (present[mid - 1] + present[mid]) / 2.0
    } else {
        present[mid]
    };
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn float_column(values: &[Option<f64>]) -> Column {
        Column::new("v".into(), values)
    }

    #[test]
    fn test_stats_integral_floats() {
        let stats = ColumnStats::compute(&float_column(&[Some(0.0), Some(255.0), None])).unwrap();
        assert_eq!(stats.rows, 3);
        assert_eq!(stats.null_count, 1);
        assert_eq!(stats.min, Some(0.0));
        assert_eq!(stats.max, Some(255.0));
        assert!(stats.all_integral);
        assert!((stats.null_percent() - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_stats_fractional() {
        let stats = ColumnStats::compute(&float_column(&[Some(1.5), Some(2.0)])).unwrap();
        assert!(!stats.all_integral);
    }

    #[test]
    fn test_stats_all_null() {
        let stats = ColumnStats::compute(&float_column(&[None, None])).unwrap();
        assert!(stats.is_all_null());
        assert!(!stats.all_integral);
        assert_eq!(stats.min, None);
    }

    #[test]
    fn test_stats_text_column() {
        let column = Column::new("s".into(), &[Some("a"), None]);
        let stats = ColumnStats::compute(&column).unwrap();
        assert_eq!(stats.null_count, 1);
        assert_eq!(stats.max, None);
    }

    #[test]
    fn test_median_odd_and_even() {
        let odd = float_column(&[Some(1.0), Some(2.0), None, Some(4.0)]);
        assert_eq!(median(&odd).unwrap(), Some(2.0));

        let even = float_column(&[Some(4.0), Some(1.0), Some(3.0), Some(2.0)]);
        assert_eq!(median(&even).unwrap(), Some(2.5));

        let empty = float_column(&[None]);
        assert_eq!(median(&empty).unwrap(), None);
    }

    proptest! {
        #[test]
        fn median_lies_within_range(values in prop::collection::vec(-1e6f64..1e6, 1..50)) {
            let column = Column::new("v".into(), &values);
            let m = median(&column).unwrap().unwrap();
            let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
            let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            prop_assert!(lo <= m && m <= hi);
        }
    }
}

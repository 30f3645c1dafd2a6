use bip_common::any_to_string;
use bip_ingest::Dataset;
use bip_normalization::{FillStrategy, ImputationReport, TypeCorrectionReport};
use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use bip_cli::pipeline::{PersistOutcome, Verification};

pub fn print_imputation(report: &ImputationReport) {
    println!("Rows: {}", report.rows);
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Column"),
        header_cell("Kind"),
        header_cell("Missing"),
        header_cell("Missing %"),
        header_cell("Strategy"),
        header_cell("Fill value"),
    ]);
    apply_summary_table_style(&mut table);
    align_column(&mut table, 2, CellAlignment::Right);
    align_column(&mut table, 3, CellAlignment::Right);
    for column in report.with_missing() {
        let critical = report.critical_columns.contains(&column.column);
        table.add_row(vec![
            Cell::new(&column.column),
            dim_cell(column.kind),
            Cell::new(column.null_count),
            percent_cell(column.null_percent, critical),
            strategy_cell(column.strategy),
            column
                .fill_value
                .as_deref()
                .map_or_else(|| dim_cell("-"), Cell::new),
        ]);
    }
    if table.row_count() == 0 {
        println!("No missing values.");
    } else {
        println!("{table}");
    }
    for failure in &report.failures {
        eprintln!("- {}: {}", failure.column, failure.message);
    }
    println!("Remaining nulls: {}", report.remaining_nulls);
}

pub fn print_types(report: &TypeCorrectionReport) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Column"),
        header_cell("Before"),
        header_cell("After"),
        header_cell("Note"),
    ]);
    apply_table_style(&mut table);
    for (before, after) in report.before.iter().zip(&report.after) {
        let note = if let Some(narrowing) = report
            .narrowings
            .iter()
            .find(|n| n.column == after.name)
        {
            Cell::new(format!("narrowed to {}", narrowing.to)).fg(Color::Green)
        } else if let Some(coercion) = report
            .datetime_coercions
            .iter()
            .find(|c| c.column == after.name)
        {
            count_note(coercion.coerced_to_null, "coerced to null")
        } else if report.kept_float.contains(&after.name) {
            dim_cell("fractional values")
        } else {
            dim_cell("-")
        };
        let after_cell = if before.dtype == after.dtype {
            dim_cell(&after.dtype)
        } else {
            Cell::new(&after.dtype).add_attribute(Attribute::Bold)
        };
        table.add_row(vec![
            Cell::new(&after.name),
            Cell::new(&before.dtype),
            after_cell,
            note,
        ]);
    }
    println!("{table}");
    for failure in &report.failures {
        eprintln!("- {}: {}", failure.column, failure.message);
    }
    println!(
        "Memory: {} -> {} bytes (saved {})",
        report.memory_before,
        report.memory_after,
        report.memory_saved()
    );
}

pub fn print_load(outcome: &PersistOutcome, verification: Option<&Verification>) {
    let mut table = Table::new();
    table.set_header(vec![header_cell("Table"), header_cell("Rows"), header_cell("Details")]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    let details = match outcome {
        PersistOutcome::Upserted { summary, .. } => format!(
            "upsert, {} checkpoints, {} commits",
            summary.checkpoints, summary.commits
        ),
        PersistOutcome::Written(summary) => format!(
            "{} mode, {} batches{}",
            summary.mode,
            summary.batches,
            if summary.created { ", table created" } else { "" }
        ),
    };
    table.add_row(vec![
        Cell::new(outcome.table()).add_attribute(Attribute::Bold),
        Cell::new(outcome.rows()),
        Cell::new(details),
    ]);
    if let Some(verification) = verification {
        let color = if verification.is_complete() {
            Color::Green
        } else {
            Color::Red
        };
        table.add_row(vec![
            dim_cell("read back"),
            Cell::new(verification.table_rows).fg(color),
            dim_cell(format!("rows in table, {} expected", verification.expected_rows)),
        ]);
    }
    println!("{table}");
}

/// Prints up to `limit` rows of a dataset.
pub fn print_dataset(dataset: &Dataset, limit: usize) {
    let frame = dataset.frame();
    let mut table = Table::new();
    table.set_header(
        frame
            .get_column_names()
            .into_iter()
            .map(|name| header_cell(name.as_str()))
            .collect::<Vec<_>>(),
    );
    apply_table_style(&mut table);
    let shown = dataset.height().min(limit);
    for row in 0..shown {
        let cells = frame.get_columns().iter().map(|column| match column.get(row) {
            Ok(value) if !value.is_null() => Cell::new(any_to_string(value)),
            _ => dim_cell("null"),
        });
        table.add_row(cells.collect::<Vec<_>>());
    }
    println!("{table}");
    if dataset.height() > shown {
        println!("({} of {} rows shown)", shown, dataset.height());
    } else {
        println!("({} rows)", dataset.height());
    }
}

fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn apply_summary_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::DynamicFullWidth)
        .set_width(120);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn percent_cell(percent: f64, critical: bool) -> Cell {
    let cell = Cell::new(format!("{percent:.2}"));
    if critical {
        cell.fg(Color::Red).add_attribute(Attribute::Bold)
    } else {
        cell
    }
}

fn strategy_cell(strategy: FillStrategy) -> Cell {
    match strategy {
        FillStrategy::Median | FillStrategy::Mode => Cell::new(strategy.as_str()).fg(Color::Green),
        FillStrategy::Sentinel => Cell::new(strategy.as_str()).fg(Color::Yellow),
        FillStrategy::Skipped => Cell::new(strategy.as_str())
            .fg(Color::Red)
            .add_attribute(Attribute::Bold),
        FillStrategy::Untouched => dim_cell(strategy.as_str()),
    }
}

fn count_note(count: usize, label: &str) -> Cell {
    if count > 0 {
        Cell::new(format!("{count} {label}")).fg(Color::Yellow)
    } else {
        dim_cell("parsed")
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}

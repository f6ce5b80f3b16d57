//! Behavior-driven tests for warehouse storage.
//!
//! These tests verify HOW the warehouse stores instruments and daily bars,
//! focusing on idempotent merging and sync bookkeeping.

use barsync_tests::temp_warehouse;
use barsync_warehouse::{DailyBarRow, InstrumentRow, Warehouse, WarehouseConfig};
use time::macros::{date, datetime};

fn bar_row(code: &str, date: time::Date, close: i64) -> DailyBarRow {
    DailyBarRow {
        code: code.to_string(),
        date,
        open: close - 100,
        high: close + 200,
        low: close - 300,
        close,
        volume: 2_000_000,
        traded_value: 140_000_000_000,
        prev_day_delta: 300,
        change_rate_bp: 42,
    }
}

fn instrument_row(code: &str, name: &str) -> InstrumentRow {
    InstrumentRow {
        code: code.to_string(),
        name: name.to_string(),
        market: Some("kospi".to_string()),
        is_active: true,
        last_synced_date: None,
        last_synced_at: None,
    }
}

// =============================================================================
// Warehouse: Daily Bar Merging
// =============================================================================

#[test]
fn when_the_same_bars_are_merged_twice_storage_is_unchanged() {
    // Given: A fresh warehouse
    let (warehouse, _temp) = temp_warehouse();
    let rows = vec![
        bar_row("005930", date!(2025 - 03 - 04), 70_000),
        bar_row("005930", date!(2025 - 03 - 05), 71_500),
    ];

    // When: The same rows are merged twice
    warehouse.upsert_daily_bars(&rows).expect("first merge");
    warehouse.upsert_daily_bars(&rows).expect("second merge");

    // Then: No duplicates appear
    let status = warehouse.status().expect("status");
    assert_eq!(status.bar_count, 2);
    assert_eq!(status.latest_bar_date, Some(date!(2025 - 03 - 05)));
}

#[test]
fn when_a_revised_bar_arrives_it_replaces_the_stored_one() {
    // Given: A bar already stored for March 5th
    let (warehouse, _temp) = temp_warehouse();
    warehouse
        .upsert_daily_bars(&[bar_row("005930", date!(2025 - 03 - 05), 70_000)])
        .expect("initial merge");

    // When: A revised bar for the same day is merged
    warehouse
        .upsert_daily_bars(&[bar_row("005930", date!(2025 - 03 - 05), 72_000)])
        .expect("revised merge");

    // Then: One row remains, carrying the revision
    let status = warehouse.status().expect("status");
    assert_eq!(status.bar_count, 1);
}

#[test]
fn when_bars_for_many_instruments_are_merged_latest_date_is_per_code() {
    let (warehouse, _temp) = temp_warehouse();
    warehouse
        .upsert_daily_bars(&[
            bar_row("005930", date!(2025 - 03 - 05), 71_500),
            bar_row("000660", date!(2025 - 03 - 04), 180_000),
        ])
        .expect("merge");

    assert_eq!(
        warehouse.latest_bar_date("005930").expect("query"),
        Some(date!(2025 - 03 - 05))
    );
    assert_eq!(
        warehouse.latest_bar_date("000660").expect("query"),
        Some(date!(2025 - 03 - 04))
    );
    assert_eq!(warehouse.latest_bar_date("035420").expect("query"), None);
}

// =============================================================================
// Warehouse: Instrument Tracking
// =============================================================================

#[test]
fn when_an_instrument_is_tracked_twice_the_first_registration_wins() {
    // Given: An instrument registered with its proper name
    let (warehouse, _temp) = temp_warehouse();
    warehouse
        .ensure_tracked(&instrument_row("005930", "Samsung Electronics"))
        .expect("track");

    // When: A second registration arrives with a placeholder name
    warehouse
        .ensure_tracked(&instrument_row("005930", "005930"))
        .expect("re-track");

    // Then: The original name is kept
    let row = warehouse
        .instrument("005930")
        .expect("lookup")
        .expect("present");
    assert_eq!(row.name, "Samsung Electronics");
}

#[test]
fn when_sync_bookkeeping_advances_it_round_trips_through_storage() {
    // Given: A tracked instrument
    let (warehouse, _temp) = temp_warehouse();
    warehouse
        .ensure_tracked(&instrument_row("000660", "SK hynix"))
        .expect("track");

    // When: It is marked synced through Wednesday at 10:00 KST
    warehouse
        .mark_synced(
            "000660",
            date!(2025 - 03 - 05),
            datetime!(2025-03-05 10:00 +9),
        )
        .expect("mark");

    // Then: Both the date and the UTC instant read back
    let row = warehouse
        .instrument("000660")
        .expect("lookup")
        .expect("present");
    assert_eq!(row.last_synced_date, Some(date!(2025 - 03 - 05)));
    assert_eq!(row.last_synced_at, Some(datetime!(2025-03-05 01:00 UTC)));
}

#[test]
fn when_the_warehouse_reopens_its_data_survives() {
    // Given: A warehouse with data, then closed
    let temp = tempfile::tempdir().expect("tempdir");
    let config = WarehouseConfig {
        db_path: temp.path().join("warehouse.duckdb"),
        max_pool_size: 2,
    };
    {
        let warehouse = Warehouse::open(config.clone()).expect("open");
        warehouse
            .upsert_daily_bars(&[bar_row("005930", date!(2025 - 03 - 05), 71_500)])
            .expect("merge");
    }

    // When: The same file is opened again
    let warehouse = Warehouse::open(config).expect("reopen");

    // Then: The data is still there and migrations did not reset it
    assert_eq!(warehouse.status().expect("status").bar_count, 1);
}

//! Earnings ledger over the database store: monotonic accumulation with
//! the percentage in effect at each sale, and percentage administration.

mod common;

use common::TestApp;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use storefront_api::errors::ServiceError;
use uuid::Uuid;

#[tokio::test]
async fn total_is_the_sum_of_per_sale_earnings() {
    let app = TestApp::new().await;
    let user = Uuid::new_v4();

    // 15% (default), then 10%, then 0%.
    let subtotals = [dec!(1000), dec!(500), dec!(800)];
    let percentages = [dec!(15), dec!(10), dec!(0)];

    let first = app
        .earnings
        .add_earning(subtotals[0], "pago-1", user)
        .await
        .expect("first");
    assert_eq!(first.amount, dec!(150));

    app.earnings.set_percentage(percentages[1]).await.expect("set 10");
    app.earnings
        .add_earning(subtotals[1], "pago-2", user)
        .await
        .expect("second");

    app.earnings.set_percentage(percentages[2]).await.expect("set 0");
    app.earnings
        .add_earning(subtotals[2], "pago-3", user)
        .await
        .expect("third");

    let snapshot = app.earnings.get_earnings().await.expect("snapshot");

    let expected: Decimal = subtotals
        .iter()
        .zip(percentages.iter())
        .map(|(subtotal, pct)| *subtotal * *pct / Decimal::from(100))
        .sum();
    assert_eq!(snapshot.total, expected);
    assert_eq!(snapshot.total, dec!(200));

    // History keeps the percentage applied at the time of each sale and a
    // running total after every entry.
    assert_eq!(snapshot.history.len(), 3);
    assert_eq!(snapshot.history[0].percentage, dec!(15));
    assert_eq!(snapshot.history[0].total_after, dec!(150));
    assert_eq!(snapshot.history[1].percentage, dec!(10));
    assert_eq!(snapshot.history[1].total_after, dec!(200));
    assert_eq!(snapshot.history[2].percentage, dec!(0));
    assert_eq!(snapshot.history[2].total_after, dec!(200));
}

#[tokio::test]
async fn snapshot_starts_with_defaults() {
    let app = TestApp::new().await;

    let snapshot = app.earnings.get_earnings().await.expect("snapshot");
    assert_eq!(snapshot.total, Decimal::ZERO);
    assert_eq!(snapshot.percentage, dec!(15));
    assert!(snapshot.history.is_empty());
}

#[tokio::test]
async fn percentage_bounds_are_enforced_on_the_db_store() {
    let app = TestApp::new().await;

    assert!(matches!(
        app.earnings.set_percentage(dec!(150)).await,
        Err(ServiceError::ValidationError(_))
    ));
    assert!(app.earnings.set_percentage(dec!(25)).await.is_ok());

    let snapshot = app.earnings.get_earnings().await.expect("snapshot");
    assert_eq!(snapshot.percentage, dec!(25));
}

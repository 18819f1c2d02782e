//! Cart behavior: accumulation on re-add, quantity replacement, and the
//! read-time repricing that lets a later add change the discount applied
//! to earlier units.

mod common;

use common::TestApp;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use storefront_api::{errors::ServiceError, services::cart::LinePricing};

#[tokio::test]
async fn re_adding_a_product_accumulates_quantity() {
    let app = TestApp::new().await;
    let user = app.seed_user("comprador1").await;
    let product = app.seed_product("Yerba", dec!(4500), 50).await;

    app.cart.add(user.id, product.id, 2).await.expect("add 2");
    app.cart.add(user.id, product.id, 3).await.expect("add 3");

    let cart = app.cart.get(user.id).await.expect("cart");
    assert_eq!(cart.lines.len(), 1);
    assert_eq!(cart.lines[0].quantity, 5);
}

#[tokio::test]
async fn set_quantity_replaces_instead_of_accumulating() {
    let app = TestApp::new().await;
    let user = app.seed_user("comprador2").await;
    let product = app.seed_product("Cafe", dec!(8000), 50).await;

    app.cart.add(user.id, product.id, 2).await.expect("add");
    app.cart
        .set_quantity(user.id, product.id, 4)
        .await
        .expect("set");

    let cart = app.cart.get(user.id).await.expect("cart");
    assert_eq!(cart.lines[0].quantity, 4);

    // Setting quantity on a line that does not exist is an error, and so
    // is a non-positive quantity.
    let missing = app
        .cart
        .set_quantity(user.id, uuid::Uuid::new_v4(), 1)
        .await;
    assert!(matches!(missing, Err(ServiceError::NotFound(_))));

    let zero = app.cart.set_quantity(user.id, product.id, 0).await;
    assert!(matches!(zero, Err(ServiceError::ValidationError(_))));
}

#[tokio::test]
async fn later_add_retroactively_changes_the_line_discount() {
    let app = TestApp::new().await;
    let user = app.seed_user("comprador3").await;
    let product = app.seed_product("Cacao", dec!(1000), 50).await;
    app.seed_standard_tiers(product.id).await;

    // Two units: no tier reached yet.
    app.cart.add(user.id, product.id, 2).await.expect("add 2");
    let cart = app.cart.get(user.id).await.expect("cart");
    assert_eq!(
        cart.lines[0].pricing,
        LinePricing::Undiscounted { unit_price: dec!(1000) }
    );
    assert_eq!(cart.total, dec!(2000));

    // Three more units push the line to 5, where the 10% tier applies to
    // every unit, including the two added earlier.
    app.cart.add(user.id, product.id, 3).await.expect("add 3");
    let cart = app.cart.get(user.id).await.expect("cart");
    assert_eq!(
        cart.lines[0].pricing,
        LinePricing::Discounted {
            original_price: dec!(1000),
            final_price: dec!(900),
            percentage: dec!(10),
        }
    );
    assert_eq!(cart.lines[0].subtotal, dec!(4500));
    assert_eq!(cart.total, dec!(4500));
}

#[tokio::test]
async fn tier_scenario_seven_units_takes_the_min_five_tier() {
    let app = TestApp::new().await;
    let user = app.seed_user("comprador4").await;
    let product = app.seed_product("Te", dec!(1000), 50).await;
    app.seed_standard_tiers(product.id).await;

    app.cart.add(user.id, product.id, 7).await.expect("add");

    let cart = app.cart.get(user.id).await.expect("cart");
    assert_eq!(cart.lines[0].pricing.percentage(), dec!(10));
    assert_eq!(cart.lines[0].pricing.final_unit_price(), dec!(900));
}

#[tokio::test]
async fn remove_and_clear() {
    let app = TestApp::new().await;
    let user = app.seed_user("comprador5").await;
    let yerba = app.seed_product("Yerba", dec!(4500), 50).await;
    let cafe = app.seed_product("Cafe", dec!(8000), 50).await;

    app.cart.add(user.id, yerba.id, 1).await.expect("add");
    app.cart.add(user.id, cafe.id, 2).await.expect("add");

    app.cart.remove(user.id, yerba.id).await.expect("remove");
    let cart = app.cart.get(user.id).await.expect("cart");
    assert_eq!(cart.lines.len(), 1);
    assert_eq!(cart.lines[0].product_id, cafe.id);

    // Removing an absent line reports not-found.
    let again = app.cart.remove(user.id, yerba.id).await;
    assert!(matches!(again, Err(ServiceError::NotFound(_))));

    // Clearing is idempotent.
    app.cart.clear(user.id).await.expect("clear");
    app.cart.clear(user.id).await.expect("clear twice");
    let cart = app.cart.get(user.id).await.expect("cart");
    assert!(cart.lines.is_empty());
    assert_eq!(cart.total, Decimal::ZERO);
}

#[tokio::test]
async fn adding_unknown_product_fails() {
    let app = TestApp::new().await;
    let user = app.seed_user("comprador6").await;

    let result = app.cart.add(user.id, uuid::Uuid::new_v4(), 1).await;
    assert!(matches!(result, Err(ServiceError::NotFound(_))));

    let product = app.seed_product("Te", dec!(1000), 5).await;
    let result = app.cart.add(user.id, product.id, 0).await;
    assert!(matches!(result, Err(ServiceError::ValidationError(_))));
}

//! Sales history and user account behavior over the database stores.

mod common;

use common::TestApp;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use storefront_api::{
    entities::SaleStatus,
    errors::ServiceError,
    services::{history::SaleLineInput, users::CreateUserInput},
};
use uuid::Uuid;

fn line(name: &str, quantity: i32, unit_price: Decimal) -> SaleLineInput {
    SaleLineInput {
        product_id: Uuid::new_v4(),
        name: name.to_string(),
        quantity,
        unit_price,
        discount_percentage: Decimal::ZERO,
        subtotal: unit_price * Decimal::from(quantity),
    }
}

// ==================== Sales History ====================

#[tokio::test]
async fn recorded_sales_are_found_by_payment_id() {
    let app = TestApp::new().await;
    let user = app.seed_user("historia1").await;

    let recorded = app
        .history
        .record_sale(user.id, vec![line("Yerba", 2, dec!(4500))], "pago-h1", dec!(9000))
        .await
        .expect("record");

    assert_eq!(recorded.sale.status, SaleStatus::Completada);
    assert_eq!(recorded.items.len(), 1);

    let found = app
        .history
        .find_by_payment_id("pago-h1")
        .await
        .expect("lookup")
        .expect("present");
    assert_eq!(found.sale.id, recorded.sale.id);
    assert_eq!(found.items[0].name, "Yerba");

    assert!(app
        .history
        .find_by_payment_id("pago-desconocido")
        .await
        .expect("lookup")
        .is_none());
}

#[tokio::test]
async fn a_sale_requires_line_items() {
    let app = TestApp::new().await;
    let user = app.seed_user("historia2").await;

    let result = app
        .history
        .record_sale(user.id, Vec::new(), "pago-h2", Decimal::ZERO)
        .await;
    assert!(matches!(result, Err(ServiceError::ValidationError(_))));
}

#[tokio::test]
async fn user_history_only_contains_that_users_sales() {
    let app = TestApp::new().await;
    let ana = app.seed_user("ana").await;
    let pedro = app.seed_user("pedro").await;

    app.history
        .record_sale(ana.id, vec![line("Cafe", 1, dec!(8000))], "pago-h3", dec!(8000))
        .await
        .expect("ana sale");
    app.history
        .record_sale(pedro.id, vec![line("Te", 3, dec!(1000))], "pago-h4", dec!(3000))
        .await
        .expect("pedro sale");

    let ana_history = app.history.history_for_user(ana.id).await.expect("history");
    assert_eq!(ana_history.len(), 1);
    assert_eq!(ana_history[0].sale.payment_id, "pago-h3");

    let all = app.history.all_history().await.expect("all");
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn admin_can_move_a_sale_through_statuses() {
    let app = TestApp::new().await;
    let user = app.seed_user("historia3").await;

    let recorded = app
        .history
        .record_sale(user.id, vec![line("Miel", 1, dec!(8000))], "pago-h5", dec!(8000))
        .await
        .expect("record");

    let updated = app
        .history
        .update_status(recorded.sale.id, SaleStatus::Cancelada)
        .await
        .expect("update");
    assert_eq!(updated.status, SaleStatus::Cancelada);

    let missing = app
        .history
        .update_status(Uuid::new_v4(), SaleStatus::Pendiente)
        .await;
    assert!(matches!(missing, Err(ServiceError::NotFound(_))));
}

// ==================== Discount Tiers (database store) ====================

#[tokio::test]
async fn tier_upsert_overwrites_and_reactivates_on_the_db_store() {
    let app = TestApp::new().await;
    let product = app.seed_product("Cacao", dec!(3000), 10).await;

    let created = app
        .discounts
        .upsert_tier(product.id, 5, dec!(10))
        .await
        .expect("create");
    app.discounts
        .deactivate_tier(created.id)
        .await
        .expect("deactivate");

    // Inactive tier no longer applies...
    assert_eq!(
        app.discounts
            .resolve_discount(product.id, 6)
            .await
            .expect("resolve"),
        Decimal::ZERO
    );

    // ...until the same (product, min) is upserted again.
    let updated = app
        .discounts
        .upsert_tier(product.id, 5, dec!(12))
        .await
        .expect("upsert");
    assert_eq!(updated.id, created.id);
    assert_eq!(
        app.discounts
            .resolve_discount(product.id, 6)
            .await
            .expect("resolve"),
        dec!(12)
    );

    // The soft-deleted row was reused, not duplicated.
    let all = app
        .discounts
        .list_tiers(product.id, true)
        .await
        .expect("list");
    assert_eq!(all.len(), 1);
}

// ==================== User Accounts ====================

#[tokio::test]
async fn duplicate_username_and_email_are_distinct_conflicts() {
    let app = TestApp::new().await;
    app.seed_user("marta").await;

    let input = |username: &str, email: &str| CreateUserInput {
        username: username.to_string(),
        email: email.to_string(),
        password: "contrasena-larga".to_string(),
        phone: "+56 9 5555 0202".to_string(),
        address: "Calle Falsa 123".to_string(),
        city: "Valparaiso".to_string(),
        region: "V".to_string(),
        role: None,
    };

    let result = app
        .users
        .create_user(input("marta", "otra@example.com"))
        .await;
    match result {
        Err(ServiceError::Conflict(code)) => assert_eq!(code, "USERNAME_EXISTS"),
        other => panic!("expected username conflict, got {:?}", other.map(|u| u.id)),
    }

    let result = app
        .users
        .create_user(input("marta2", "marta@example.com"))
        .await;
    match result {
        Err(ServiceError::Conflict(code)) => assert_eq!(code, "EMAIL_EXISTS"),
        other => panic!("expected email conflict, got {:?}", other.map(|u| u.id)),
    }
}

#[tokio::test]
async fn credentials_are_verified_against_the_stored_hash() {
    let app = TestApp::new().await;
    let user = app.seed_user("lucia").await;

    let valid = app
        .users
        .validate_user("lucia", "contrasena-larga")
        .await
        .expect("validate");
    assert_eq!(valid.expect("match").id, user.id);

    let wrong_password = app
        .users
        .validate_user("lucia", "incorrecta")
        .await
        .expect("validate");
    assert!(wrong_password.is_none());

    let unknown_user = app
        .users
        .validate_user("nadie", "contrasena-larga")
        .await
        .expect("validate");
    assert!(unknown_user.is_none());
}

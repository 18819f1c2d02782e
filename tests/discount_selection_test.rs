//! Property test for the tier selection rule: the winning tier is always
//! the active one with the largest minimum quantity not exceeding the
//! requested quantity, regardless of the percentages involved.

use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::Decimal;
use storefront_api::entities::DiscountTierModel;
use storefront_api::services::discounts::select_percentage;
use uuid::Uuid;

fn arb_tier(product_id: Uuid) -> impl Strategy<Value = DiscountTierModel> {
    (1i32..50, 0u32..=100, any::<bool>()).prop_map(move |(min_quantity, pct, active)| {
        DiscountTierModel {
            id: Uuid::new_v4(),
            product_id,
            min_quantity,
            percentage: Decimal::from(pct),
            active,
            created_at: Utc::now(),
        }
    })
}

proptest! {
    #[test]
    fn selection_matches_the_brute_force_reference(
        tiers in prop::collection::vec(arb_tier(Uuid::nil()), 0..12),
        quantity in 0i32..60,
    ) {
        let selected = select_percentage(&tiers, quantity);

        let expected = tiers
            .iter()
            .filter(|t| t.active && t.min_quantity <= quantity)
            .max_by_key(|t| t.min_quantity)
            .map(|t| t.percentage)
            .unwrap_or(Decimal::ZERO);

        prop_assert_eq!(selected, expected);
    }

    #[test]
    fn result_is_always_a_valid_percentage(
        tiers in prop::collection::vec(arb_tier(Uuid::nil()), 0..12),
        quantity in 0i32..60,
    ) {
        let selected = select_percentage(&tiers, quantity);
        prop_assert!(selected >= Decimal::ZERO);
        prop_assert!(selected <= Decimal::from(100));
    }

    #[test]
    fn inactive_tiers_never_win(
        mut tiers in prop::collection::vec(arb_tier(Uuid::nil()), 1..12),
        quantity in 0i32..60,
    ) {
        for tier in &mut tiers {
            tier.active = false;
        }
        prop_assert_eq!(select_percentage(&tiers, quantity), Decimal::ZERO);
    }
}

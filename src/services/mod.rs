/// Storefront business services
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod discounts;
pub mod earnings;
pub mod history;
pub mod payment_provider;
pub mod users;

pub use cart::CartService;
pub use catalog::CatalogService;
pub use checkout::CheckoutService;
pub use discounts::DiscountService;
pub use earnings::EarningsService;
pub use history::SaleHistoryService;
pub use payment_provider::PaymentProvider;
pub use users::UserService;

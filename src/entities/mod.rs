/// Storefront entities
pub mod cart_item;
pub mod category;
pub mod discount_tier;
pub mod earnings_config;
pub mod earnings_entry;
pub mod product;
pub mod product_category;
pub mod sale;
pub mod sale_item;
pub mod user;

// Re-export entities
pub use cart_item::{Entity as CartItem, Model as CartItemModel};
pub use category::{Entity as Category, Model as CategoryModel};
pub use discount_tier::{Entity as DiscountTier, Model as DiscountTierModel};
pub use earnings_config::{Entity as EarningsConfig, Model as EarningsConfigModel};
pub use earnings_entry::{Entity as EarningsEntry, Model as EarningsEntryModel};
pub use product::{Entity as Product, Model as ProductModel};
pub use product_category::{Entity as ProductCategory, Model as ProductCategoryModel};
pub use sale::{Entity as Sale, Model as SaleModel, SaleStatus};
pub use sale_item::{Entity as SaleItem, Model as SaleItemModel};
pub use user::{Entity as User, Model as UserModel, UserRole};

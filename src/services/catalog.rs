use crate::{
    entities::{
        category, product, product_category, Category, CategoryModel, Product, ProductCategory,
        ProductCategoryModel, ProductModel,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};
use uuid::Uuid;

const CATALOG_FILE: &str = "catalog.json";

/// Input for creating a product
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProductInput {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: i32,
    pub image_url: Option<String>,
    #[serde(default)]
    pub categories: Vec<Uuid>,
}

/// Partial update for a product; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProductInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
    pub image_url: Option<String>,
    pub categories: Option<Vec<Uuid>>,
}

/// Storage backend for the product catalog. Implemented by the database
/// store and the local-file fallback; selected once at startup.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list_products(&self) -> Result<Vec<ProductModel>, ServiceError>;
    async fn get_product(&self, id: Uuid) -> Result<Option<ProductModel>, ServiceError>;
    async fn create_product(&self, input: CreateProductInput) -> Result<ProductModel, ServiceError>;
    async fn update_product(
        &self,
        id: Uuid,
        input: UpdateProductInput,
    ) -> Result<ProductModel, ServiceError>;
    async fn delete_product(&self, id: Uuid) -> Result<(), ServiceError>;

    async fn list_categories(&self) -> Result<Vec<CategoryModel>, ServiceError>;
    async fn create_category(&self, name: String) -> Result<CategoryModel, ServiceError>;
    async fn categories_of_product(
        &self,
        product_id: Uuid,
    ) -> Result<Vec<CategoryModel>, ServiceError>;
    async fn set_categories(
        &self,
        product_id: Uuid,
        category_ids: Vec<Uuid>,
    ) -> Result<(), ServiceError>;
    async fn add_category(&self, product_id: Uuid, category_id: Uuid) -> Result<(), ServiceError>;
    async fn remove_category(
        &self,
        product_id: Uuid,
        category_id: Uuid,
    ) -> Result<(), ServiceError>;

    /// Reduces stock by up to `quantity`, clamping at zero, and returns the
    /// new stock level. Stock never goes negative; a concurrent oversell
    /// bottoms out at zero (see the checkout service notes).
    async fn decrement_stock(&self, product_id: Uuid, quantity: i32) -> Result<i32, ServiceError>;
}

/// Product catalog service.
#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn CatalogStore>,
    event_sender: Arc<EventSender>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn CatalogStore>, event_sender: Arc<EventSender>) -> Self {
        Self {
            store,
            event_sender,
        }
    }

    pub async fn list_products(&self) -> Result<Vec<ProductModel>, ServiceError> {
        self.store.list_products().await
    }

    pub async fn get_product(&self, id: Uuid) -> Result<Option<ProductModel>, ServiceError> {
        self.store.get_product(id).await
    }

    /// Fetches a product, failing with `NotFound` when absent.
    pub async fn require_product(&self, id: Uuid) -> Result<ProductModel, ServiceError> {
        self.get_product(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))
    }

    #[instrument(skip(self, input))]
    pub async fn create_product(
        &self,
        input: CreateProductInput,
    ) -> Result<ProductModel, ServiceError> {
        if input.name.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Product name is required".to_string(),
            ));
        }
        if input.price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Price must not be negative".to_string(),
            ));
        }
        if input.stock < 0 {
            return Err(ServiceError::ValidationError(
                "Stock must not be negative".to_string(),
            ));
        }

        let product = self.store.create_product(input).await?;
        self.event_sender
            .send_or_log(Event::ProductCreated(product.id))
            .await;
        info!("Created product: {}", product.id);
        Ok(product)
    }

    #[instrument(skip(self, input))]
    pub async fn update_product(
        &self,
        id: Uuid,
        input: UpdateProductInput,
    ) -> Result<ProductModel, ServiceError> {
        if let Some(price) = input.price {
            if price < Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "Price must not be negative".to_string(),
                ));
            }
        }
        if let Some(stock) = input.stock {
            if stock < 0 {
                return Err(ServiceError::ValidationError(
                    "Stock must not be negative".to_string(),
                ));
            }
        }

        let product = self.store.update_product(id, input).await?;
        self.event_sender
            .send_or_log(Event::ProductUpdated(id))
            .await;
        Ok(product)
    }

    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: Uuid) -> Result<(), ServiceError> {
        self.store.delete_product(id).await?;
        self.event_sender
            .send_or_log(Event::ProductDeleted(id))
            .await;
        Ok(())
    }

    pub async fn list_categories(&self) -> Result<Vec<CategoryModel>, ServiceError> {
        self.store.list_categories().await
    }

    #[instrument(skip(self))]
    pub async fn create_category(&self, name: String) -> Result<CategoryModel, ServiceError> {
        if name.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Category name is required".to_string(),
            ));
        }
        let category = self.store.create_category(name).await?;
        self.event_sender
            .send_or_log(Event::CategoryCreated(category.id))
            .await;
        Ok(category)
    }

    pub async fn categories_of_product(
        &self,
        product_id: Uuid,
    ) -> Result<Vec<CategoryModel>, ServiceError> {
        self.store.categories_of_product(product_id).await
    }

    pub async fn set_categories(
        &self,
        product_id: Uuid,
        category_ids: Vec<Uuid>,
    ) -> Result<(), ServiceError> {
        self.store.set_categories(product_id, category_ids).await
    }

    pub async fn add_category(
        &self,
        product_id: Uuid,
        category_id: Uuid,
    ) -> Result<(), ServiceError> {
        self.store.add_category(product_id, category_id).await
    }

    pub async fn remove_category(
        &self,
        product_id: Uuid,
        category_id: Uuid,
    ) -> Result<(), ServiceError> {
        self.store.remove_category(product_id, category_id).await
    }

    pub async fn decrement_stock(
        &self,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<i32, ServiceError> {
        self.store.decrement_stock(product_id, quantity).await
    }
}

// ==================== Database store ====================

pub struct DbCatalogStore {
    db: Arc<DatabaseConnection>,
}

impl DbCatalogStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CatalogStore for DbCatalogStore {
    async fn list_products(&self) -> Result<Vec<ProductModel>, ServiceError> {
        Ok(Product::find()
            .order_by_asc(product::Column::Name)
            .all(&*self.db)
            .await?)
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<ProductModel>, ServiceError> {
        Ok(Product::find_by_id(id).one(&*self.db).await?)
    }

    async fn create_product(&self, input: CreateProductInput) -> Result<ProductModel, ServiceError> {
        let txn = self.db.begin().await?;

        let product_id = Uuid::new_v4();
        let product = product::ActiveModel {
            id: Set(product_id),
            name: Set(input.name),
            description: Set(input.description.unwrap_or_default()),
            price: Set(input.price),
            stock: Set(input.stock),
            image_url: Set(input.image_url),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };
        let product = product.insert(&txn).await?;

        for category_id in input.categories {
            let relation = product_category::ActiveModel {
                product_id: Set(product_id),
                category_id: Set(category_id),
            };
            relation.insert(&txn).await?;
        }

        txn.commit().await?;
        Ok(product)
    }

    async fn update_product(
        &self,
        id: Uuid,
        input: UpdateProductInput,
    ) -> Result<ProductModel, ServiceError> {
        let txn = self.db.begin().await?;

        let product = Product::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))?;

        let mut active: product::ActiveModel = product.into();
        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(description) = input.description {
            active.description = Set(description);
        }
        if let Some(price) = input.price {
            active.price = Set(price);
        }
        if let Some(stock) = input.stock {
            active.stock = Set(stock);
        }
        if let Some(image_url) = input.image_url {
            active.image_url = Set(Some(image_url));
        }
        active.updated_at = Set(Utc::now());
        let product = active.update(&txn).await?;

        if let Some(category_ids) = input.categories {
            ProductCategory::delete_many()
                .filter(product_category::Column::ProductId.eq(id))
                .exec(&txn)
                .await?;
            for category_id in category_ids {
                let relation = product_category::ActiveModel {
                    product_id: Set(id),
                    category_id: Set(category_id),
                };
                relation.insert(&txn).await?;
            }
        }

        txn.commit().await?;
        Ok(product)
    }

    async fn delete_product(&self, id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        let product = Product::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))?;

        ProductCategory::delete_many()
            .filter(product_category::Column::ProductId.eq(id))
            .exec(&txn)
            .await?;
        product.delete(&txn).await?;

        txn.commit().await?;
        Ok(())
    }

    async fn list_categories(&self) -> Result<Vec<CategoryModel>, ServiceError> {
        Ok(Category::find()
            .order_by_asc(category::Column::Name)
            .all(&*self.db)
            .await?)
    }

    async fn create_category(&self, name: String) -> Result<CategoryModel, ServiceError> {
        let existing = Category::find()
            .filter(category::Column::Name.eq(&name))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Category '{}' already exists",
                name
            )));
        }

        let row = category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name),
            created_at: Set(Utc::now()),
        };
        Ok(row.insert(&*self.db).await?)
    }

    async fn categories_of_product(
        &self,
        product_id: Uuid,
    ) -> Result<Vec<CategoryModel>, ServiceError> {
        let product = Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let relations = product
            .find_related(ProductCategory)
            .all(&*self.db)
            .await?;
        let ids: Vec<Uuid> = relations.iter().map(|r| r.category_id).collect();

        Ok(Category::find()
            .filter(category::Column::Id.is_in(ids))
            .all(&*self.db)
            .await?)
    }

    async fn set_categories(
        &self,
        product_id: Uuid,
        category_ids: Vec<Uuid>,
    ) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        Product::find_by_id(product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        ProductCategory::delete_many()
            .filter(product_category::Column::ProductId.eq(product_id))
            .exec(&txn)
            .await?;
        for category_id in category_ids {
            let relation = product_category::ActiveModel {
                product_id: Set(product_id),
                category_id: Set(category_id),
            };
            relation.insert(&txn).await?;
        }

        txn.commit().await?;
        Ok(())
    }

    async fn add_category(&self, product_id: Uuid, category_id: Uuid) -> Result<(), ServiceError> {
        Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let existing = ProductCategory::find()
            .filter(product_category::Column::ProductId.eq(product_id))
            .filter(product_category::Column::CategoryId.eq(category_id))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Ok(());
        }

        let relation = product_category::ActiveModel {
            product_id: Set(product_id),
            category_id: Set(category_id),
        };
        relation.insert(&*self.db).await?;
        Ok(())
    }

    async fn remove_category(
        &self,
        product_id: Uuid,
        category_id: Uuid,
    ) -> Result<(), ServiceError> {
        ProductCategory::delete_many()
            .filter(product_category::Column::ProductId.eq(product_id))
            .filter(product_category::Column::CategoryId.eq(category_id))
            .exec(&*self.db)
            .await?;
        Ok(())
    }

    async fn decrement_stock(&self, product_id: Uuid, quantity: i32) -> Result<i32, ServiceError> {
        let txn = self.db.begin().await?;

        let product = Product::find_by_id(product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        if product.stock < quantity {
            warn!(
                %product_id,
                stock = product.stock,
                requested = quantity,
                "Stock underrun; clamping at zero"
            );
        }
        let new_stock = (product.stock - quantity).max(0);

        let mut active: product::ActiveModel = product.into();
        active.stock = Set(new_stock);
        active.updated_at = Set(Utc::now());
        active.update(&txn).await?;

        txn.commit().await?;
        Ok(new_stock)
    }
}

// ==================== Local-file store ====================

#[derive(Debug, Default, Serialize, Deserialize)]
struct FileCatalogState {
    products: Vec<ProductModel>,
    categories: Vec<CategoryModel>,
    relations: Vec<ProductCategoryModel>,
}

/// Local-file catalog used when the database probe fails at startup.
pub struct FileCatalogStore {
    path: PathBuf,
    state: RwLock<FileCatalogState>,
}

impl FileCatalogStore {
    pub async fn load(data_dir: &Path) -> Result<Self, ServiceError> {
        let path = data_dir.join(CATALOG_FILE);
        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => FileCatalogState::default(),
            Err(e) => {
                return Err(ServiceError::InternalError(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    async fn persist(&self, state: &FileCatalogState) -> Result<(), ServiceError> {
        let bytes = serde_json::to_vec_pretty(state)?;
        tokio::fs::write(&self.path, bytes).await.map_err(|e| {
            ServiceError::InternalError(format!("Failed to write {}: {}", self.path.display(), e))
        })
    }
}

#[async_trait]
impl CatalogStore for FileCatalogStore {
    async fn list_products(&self) -> Result<Vec<ProductModel>, ServiceError> {
        let state = self.state.read().await;
        let mut products = state.products.clone();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<ProductModel>, ServiceError> {
        let state = self.state.read().await;
        Ok(state.products.iter().find(|p| p.id == id).cloned())
    }

    async fn create_product(&self, input: CreateProductInput) -> Result<ProductModel, ServiceError> {
        let mut state = self.state.write().await;

        let product = ProductModel {
            id: Uuid::new_v4(),
            name: input.name,
            description: input.description.unwrap_or_default(),
            price: input.price,
            stock: input.stock,
            image_url: input.image_url,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        state.products.push(product.clone());
        for category_id in input.categories {
            state.relations.push(ProductCategoryModel {
                product_id: product.id,
                category_id,
            });
        }

        self.persist(&state).await?;
        Ok(product)
    }

    async fn update_product(
        &self,
        id: Uuid,
        input: UpdateProductInput,
    ) -> Result<ProductModel, ServiceError> {
        let mut state = self.state.write().await;

        let product = state
            .products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))?;

        if let Some(name) = input.name {
            product.name = name;
        }
        if let Some(description) = input.description {
            product.description = description;
        }
        if let Some(price) = input.price {
            product.price = price;
        }
        if let Some(stock) = input.stock {
            product.stock = stock;
        }
        if let Some(image_url) = input.image_url {
            product.image_url = Some(image_url);
        }
        product.updated_at = Utc::now();
        let product = product.clone();

        if let Some(category_ids) = input.categories {
            state.relations.retain(|r| r.product_id != id);
            for category_id in category_ids {
                state.relations.push(ProductCategoryModel {
                    product_id: id,
                    category_id,
                });
            }
        }

        self.persist(&state).await?;
        Ok(product)
    }

    async fn delete_product(&self, id: Uuid) -> Result<(), ServiceError> {
        let mut state = self.state.write().await;

        let before = state.products.len();
        state.products.retain(|p| p.id != id);
        if state.products.len() == before {
            return Err(ServiceError::NotFound(format!("Product {} not found", id)));
        }
        state.relations.retain(|r| r.product_id != id);

        self.persist(&state).await
    }

    async fn list_categories(&self) -> Result<Vec<CategoryModel>, ServiceError> {
        let state = self.state.read().await;
        let mut categories = state.categories.clone();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn create_category(&self, name: String) -> Result<CategoryModel, ServiceError> {
        let mut state = self.state.write().await;

        if state.categories.iter().any(|c| c.name == name) {
            return Err(ServiceError::Conflict(format!(
                "Category '{}' already exists",
                name
            )));
        }

        let category = CategoryModel {
            id: Uuid::new_v4(),
            name,
            created_at: Utc::now(),
        };
        state.categories.push(category.clone());

        self.persist(&state).await?;
        Ok(category)
    }

    async fn categories_of_product(
        &self,
        product_id: Uuid,
    ) -> Result<Vec<CategoryModel>, ServiceError> {
        let state = self.state.read().await;

        if !state.products.iter().any(|p| p.id == product_id) {
            return Err(ServiceError::NotFound(format!(
                "Product {} not found",
                product_id
            )));
        }

        let ids: Vec<Uuid> = state
            .relations
            .iter()
            .filter(|r| r.product_id == product_id)
            .map(|r| r.category_id)
            .collect();
        Ok(state
            .categories
            .iter()
            .filter(|c| ids.contains(&c.id))
            .cloned()
            .collect())
    }

    async fn set_categories(
        &self,
        product_id: Uuid,
        category_ids: Vec<Uuid>,
    ) -> Result<(), ServiceError> {
        let mut state = self.state.write().await;

        if !state.products.iter().any(|p| p.id == product_id) {
            return Err(ServiceError::NotFound(format!(
                "Product {} not found",
                product_id
            )));
        }

        state.relations.retain(|r| r.product_id != product_id);
        for category_id in category_ids {
            state.relations.push(ProductCategoryModel {
                product_id,
                category_id,
            });
        }

        self.persist(&state).await
    }

    async fn add_category(&self, product_id: Uuid, category_id: Uuid) -> Result<(), ServiceError> {
        let mut state = self.state.write().await;

        if !state.products.iter().any(|p| p.id == product_id) {
            return Err(ServiceError::NotFound(format!(
                "Product {} not found",
                product_id
            )));
        }

        let exists = state
            .relations
            .iter()
            .any(|r| r.product_id == product_id && r.category_id == category_id);
        if !exists {
            state.relations.push(ProductCategoryModel {
                product_id,
                category_id,
            });
            self.persist(&state).await?;
        }
        Ok(())
    }

    async fn remove_category(
        &self,
        product_id: Uuid,
        category_id: Uuid,
    ) -> Result<(), ServiceError> {
        let mut state = self.state.write().await;
        state
            .relations
            .retain(|r| !(r.product_id == product_id && r.category_id == category_id));
        self.persist(&state).await
    }

    async fn decrement_stock(&self, product_id: Uuid, quantity: i32) -> Result<i32, ServiceError> {
        let mut state = self.state.write().await;

        let product = state
            .products
            .iter_mut()
            .find(|p| p.id == product_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        if product.stock < quantity {
            warn!(
                %product_id,
                stock = product.stock,
                requested = quantity,
                "Stock underrun; clamping at zero"
            );
        }
        product.stock = (product.stock - quantity).max(0);
        let new_stock = product.stock;

        self.persist(&state).await?;
        Ok(new_stock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tokio::sync::mpsc;

    fn event_sender() -> Arc<EventSender> {
        let (tx, _rx) = mpsc::channel(16);
        Arc::new(EventSender::new(tx))
    }

    async fn file_service(dir: &Path) -> CatalogService {
        let store = Arc::new(FileCatalogStore::load(dir).await.expect("load"));
        CatalogService::new(store, event_sender())
    }

    fn product_input(name: &str, price: Decimal, stock: i32) -> CreateProductInput {
        CreateProductInput {
            name: name.to_string(),
            description: None,
            price,
            stock,
            image_url: None,
            categories: Vec::new(),
        }
    }

    #[tokio::test]
    async fn create_and_fetch_product() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = file_service(dir.path()).await;

        let created = service
            .create_product(product_input("Yerba mate", dec!(4500), 20))
            .await
            .expect("create");

        let fetched = service
            .require_product(created.id)
            .await
            .expect("fetch");
        assert_eq!(fetched.name, "Yerba mate");
        assert_eq!(fetched.stock, 20);
    }

    #[tokio::test]
    async fn create_rejects_negative_values() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = file_service(dir.path()).await;

        let result = service
            .create_product(product_input("Bad", dec!(-1), 5))
            .await;
        assert!(matches!(result, Err(ServiceError::ValidationError(_))));

        let result = service
            .create_product(product_input("Bad", dec!(1), -5))
            .await;
        assert!(matches!(result, Err(ServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn update_missing_product_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = file_service(dir.path()).await;

        let result = service
            .update_product(Uuid::new_v4(), UpdateProductInput::default())
            .await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn category_assignment_replace_add_remove() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = file_service(dir.path()).await;

        let product = service
            .create_product(product_input("Cafe", dec!(8000), 3))
            .await
            .expect("product");
        let bebidas = service
            .create_category("Bebidas".to_string())
            .await
            .expect("cat1");
        let ofertas = service
            .create_category("Ofertas".to_string())
            .await
            .expect("cat2");

        service
            .set_categories(product.id, vec![bebidas.id])
            .await
            .expect("set");
        service
            .add_category(product.id, ofertas.id)
            .await
            .expect("add");

        let categories = service
            .categories_of_product(product.id)
            .await
            .expect("list");
        assert_eq!(categories.len(), 2);

        service
            .remove_category(product.id, bebidas.id)
            .await
            .expect("remove");
        let categories = service
            .categories_of_product(product.id)
            .await
            .expect("list");
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].id, ofertas.id);
    }

    #[tokio::test]
    async fn duplicate_category_name_conflicts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = file_service(dir.path()).await;

        service
            .create_category("Bebidas".to_string())
            .await
            .expect("first");
        let result = service.create_category("Bebidas".to_string()).await;
        assert!(matches!(result, Err(ServiceError::Conflict(_))));
    }

    #[tokio::test]
    async fn decrement_stock_clamps_at_zero() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = file_service(dir.path()).await;

        let product = service
            .create_product(product_input("Te", dec!(2000), 5))
            .await
            .expect("product");

        assert_eq!(service.decrement_stock(product.id, 3).await.expect("dec"), 2);
        assert_eq!(service.decrement_stock(product.id, 10).await.expect("dec"), 0);
    }

    #[tokio::test]
    async fn state_survives_reload() {
        let dir = tempfile::tempdir().expect("tempdir");
        let id = {
            let service = file_service(dir.path()).await;
            service
                .create_product(product_input("Azucar", dec!(1200), 8))
                .await
                .expect("create")
                .id
        };

        let service = file_service(dir.path()).await;
        let product = service.require_product(id).await.expect("fetch");
        assert_eq!(product.name, "Azucar");
    }
}

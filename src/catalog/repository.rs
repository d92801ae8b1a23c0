// Catalog collaborator interfaces and their Postgres implementations
//
// The ordering core consumes the menu through the MenuCatalog trait and
// restaurant configuration through RestaurantDirectory; both are injected
// so tests can substitute static in-memory implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::catalog::error::CatalogError;
use crate::catalog::models::{
    MenuItem, ModifierGroup, OperatingHours, RestaurantProfile, UpdateMenuItemRequest,
};

/// Live menu data used for price re-validation and listings.
#[async_trait]
pub trait MenuCatalog: Send + Sync {
    /// Fetch a single menu item; `None` if absent or owned by another tenant.
    async fn get_item(
        &self,
        tenant_id: Uuid,
        restaurant_id: Uuid,
        item_id: Uuid,
    ) -> Result<Option<MenuItem>, CatalogError>;

    /// Fetch several menu items at once (order-creation re-validation).
    async fn get_items(
        &self,
        tenant_id: Uuid,
        restaurant_id: Uuid,
        item_ids: &[Uuid],
    ) -> Result<Vec<MenuItem>, CatalogError>;

    /// All menu items for a restaurant, for the cached listing read model.
    async fn list_items(
        &self,
        tenant_id: Uuid,
        restaurant_id: Uuid,
    ) -> Result<Vec<MenuItem>, CatalogError>;

    /// Update the price/availability fields this core re-validates against.
    async fn update_item(
        &self,
        tenant_id: Uuid,
        restaurant_id: Uuid,
        item_id: Uuid,
        update: &UpdateMenuItemRequest,
    ) -> Result<MenuItem, CatalogError>;
}

/// Restaurant configuration: operating hours and pricing parameters.
#[async_trait]
pub trait RestaurantDirectory: Send + Sync {
    async fn get_profile(
        &self,
        tenant_id: Uuid,
        restaurant_id: Uuid,
    ) -> Result<Option<RestaurantProfile>, CatalogError>;
}

#[derive(FromRow)]
struct MenuItemRow {
    id: Uuid,
    tenant_id: Uuid,
    restaurant_id: Uuid,
    name: String,
    category: String,
    base_price: Decimal,
    is_available: bool,
    modifiers: Json<Vec<ModifierGroup>>,
    updated_at: DateTime<Utc>,
}

impl From<MenuItemRow> for MenuItem {
    fn from(row: MenuItemRow) -> Self {
        MenuItem {
            id: row.id,
            tenant_id: row.tenant_id,
            restaurant_id: row.restaurant_id,
            name: row.name,
            category: row.category,
            base_price: row.base_price,
            is_available: row.is_available,
            modifiers: row.modifiers.0,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct ProfileRow {
    tenant_id: Uuid,
    restaurant_id: Uuid,
    tax_rate: Decimal,
    delivery_fee_threshold: Decimal,
    delivery_fee_amount: Decimal,
    operating_hours: Json<OperatingHours>,
}

impl From<ProfileRow> for RestaurantProfile {
    fn from(row: ProfileRow) -> Self {
        RestaurantProfile {
            tenant_id: row.tenant_id,
            restaurant_id: row.restaurant_id,
            tax_rate: row.tax_rate,
            delivery_fee_threshold: row.delivery_fee_threshold,
            delivery_fee_amount: row.delivery_fee_amount,
            operating_hours: row.operating_hours.0,
        }
    }
}

const MENU_ITEM_COLUMNS: &str =
    "id, tenant_id, restaurant_id, name, category, base_price, is_available, modifiers, updated_at";

/// Postgres-backed catalog.
#[derive(Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MenuCatalog for PgCatalog {
    async fn get_item(
        &self,
        tenant_id: Uuid,
        restaurant_id: Uuid,
        item_id: Uuid,
    ) -> Result<Option<MenuItem>, CatalogError> {
        let row = sqlx::query_as::<_, MenuItemRow>(&format!(
            "SELECT {} FROM menu_items WHERE tenant_id = $1 AND restaurant_id = $2 AND id = $3",
            MENU_ITEM_COLUMNS
        ))
        .bind(tenant_id)
        .bind(restaurant_id)
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(MenuItem::from))
    }

    async fn get_items(
        &self,
        tenant_id: Uuid,
        restaurant_id: Uuid,
        item_ids: &[Uuid],
    ) -> Result<Vec<MenuItem>, CatalogError> {
        let rows = sqlx::query_as::<_, MenuItemRow>(&format!(
            "SELECT {} FROM menu_items WHERE tenant_id = $1 AND restaurant_id = $2 AND id = ANY($3)",
            MENU_ITEM_COLUMNS
        ))
        .bind(tenant_id)
        .bind(restaurant_id)
        .bind(item_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(MenuItem::from).collect())
    }

    async fn list_items(
        &self,
        tenant_id: Uuid,
        restaurant_id: Uuid,
    ) -> Result<Vec<MenuItem>, CatalogError> {
        let rows = sqlx::query_as::<_, MenuItemRow>(&format!(
            "SELECT {} FROM menu_items WHERE tenant_id = $1 AND restaurant_id = $2 ORDER BY category, name",
            MENU_ITEM_COLUMNS
        ))
        .bind(tenant_id)
        .bind(restaurant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(MenuItem::from).collect())
    }

    async fn update_item(
        &self,
        tenant_id: Uuid,
        restaurant_id: Uuid,
        item_id: Uuid,
        update: &UpdateMenuItemRequest,
    ) -> Result<MenuItem, CatalogError> {
        let row = sqlx::query_as::<_, MenuItemRow>(&format!(
            r#"
            UPDATE menu_items
            SET base_price = COALESCE($4, base_price),
                is_available = COALESCE($5, is_available),
                updated_at = NOW()
            WHERE tenant_id = $1 AND restaurant_id = $2 AND id = $3
            RETURNING {}
            "#,
            MENU_ITEM_COLUMNS
        ))
        .bind(tenant_id)
        .bind(restaurant_id)
        .bind(item_id)
        .bind(update.base_price)
        .bind(update.is_available)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(CatalogError::ItemNotFound(item_id))?;

        Ok(MenuItem::from(row))
    }
}

#[async_trait]
impl RestaurantDirectory for PgCatalog {
    async fn get_profile(
        &self,
        tenant_id: Uuid,
        restaurant_id: Uuid,
    ) -> Result<Option<RestaurantProfile>, CatalogError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT tenant_id, restaurant_id, tax_rate, delivery_fee_threshold,
                   delivery_fee_amount, operating_hours
            FROM restaurant_profiles
            WHERE tenant_id = $1 AND restaurant_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(restaurant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(RestaurantProfile::from))
    }
}

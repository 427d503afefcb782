use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::product::Product;
use crate::models::render::CreateProductRequest;

const PRODUCT_COLUMNS: &str = "id, name, price, category, material, stock, model_3d_url, \
                               original_model_url, ar_enabled, ar_scale, ar_rotation, \
                               created_at, updated_at";

fn product_from_row(row: &PgRow) -> Result<Product, sqlx::Error> {
    Ok(Product {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        price: row.try_get("price")?,
        category: row.try_get("category")?,
        material: row.try_get("material")?,
        stock: row.try_get("stock")?,
        model_3d_url: row.try_get("model_3d_url")?,
        original_model_url: row.try_get("original_model_url")?,
        ar_enabled: row.try_get("ar_enabled")?,
        ar_scale: row.try_get("ar_scale")?,
        ar_rotation: row.try_get("ar_rotation")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Insert a new product.
pub async fn create_product(
    pool: &PgPool,
    req: &CreateProductRequest,
) -> Result<Product, sqlx::Error> {
    let row = sqlx::query(&format!(
        r#"
        INSERT INTO products (name, price, category, material, stock)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {PRODUCT_COLUMNS}
        "#,
    ))
    .bind(&req.name)
    .bind(req.price)
    .bind(&req.category)
    .bind(&req.material)
    .bind(req.stock)
    .fetch_one(pool)
    .await?;

    product_from_row(&row)
}

/// Get a product by ID
pub async fn get_product(pool: &PgPool, product_id: Uuid) -> Result<Option<Product>, sqlx::Error> {
    let row = sqlx::query(&format!(
        r#"
        SELECT {PRODUCT_COLUMNS}
        FROM products
        WHERE id = $1
        "#,
    ))
    .bind(product_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(product_from_row).transpose()
}

/// Record the uploaded source model on the product. Both URLs point at the
/// original until an optimize pass replaces `model_3d_url`.
pub async fn set_model_urls(
    pool: &PgPool,
    product_id: Uuid,
    model_url: &str,
    original_url: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE products
        SET model_3d_url = $2,
            original_model_url = $3,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(product_id)
    .bind(model_url)
    .bind(original_url)
    .execute(pool)
    .await?;

    Ok(())
}

/// Apply a completed job's outputs to the parent product: the optimized model
/// URL (when present) and the derived AR fields.
pub async fn apply_render_outputs(
    pool: &PgPool,
    product_id: Uuid,
    optimized_model_url: Option<&str>,
    ar_scale: f64,
    ar_rotation: &[f64],
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE products
        SET model_3d_url = COALESCE($2, model_3d_url),
            ar_scale = $3,
            ar_rotation = $4,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(product_id)
    .bind(optimized_model_url)
    .bind(ar_scale)
    .bind(ar_rotation)
    .execute(pool)
    .await?;

    Ok(())
}

/// Flip the AR try-on flag. Returns false if the product does not exist.
pub async fn set_ar_enabled(
    pool: &PgPool,
    product_id: Uuid,
    enabled: bool,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE products
        SET ar_enabled = $2,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(product_id)
    .bind(enabled)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

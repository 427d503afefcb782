use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A catalog product. Only the fields the render pipeline touches live here;
/// the full storefront catalog is managed elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub price: f64,
    pub category: String,
    pub material: String,
    pub stock: i32,
    /// URL of the current (possibly optimized) 3D model, if uploaded.
    pub model_3d_url: Option<String>,
    /// URL of the original upload, kept so re-processing starts from source.
    pub original_model_url: Option<String>,
    pub ar_enabled: bool,
    pub ar_scale: f64,
    /// Euler rotation in degrees, [x, y, z].
    pub ar_rotation: Vec<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

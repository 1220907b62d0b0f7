//! Seed the catalog from a YAML file.
//!
//! # File format
//!
//! ```yaml
//! products:
//!   - category: Health
//!     name: Creatine Monohydrate
//!     initial_price: "39.99"
//!     discounted_price: "29.99"
//!     description: Micronized, unflavoured.
//!     stripe_price_id: price_123
//!   - category: Merchandise
//!     name: Logo Hoodie
//!     initial_price: "60.00"
//!     discounted_price: "55.00"
//!     available_sizes: [S, M, L]
//!     available_colors:
//!       - { hex: "#000000", name: Black }
//! ```

use std::path::Path;

use serde::Deserialize;
use tracing::{error, info};

use boostedlabs_core::Money;
use boostedlabs_storefront::db::{self, CatalogStore, PgStore};
use boostedlabs_storefront::models::NewProduct;

/// Top-level structure of a seed file.
#[derive(Debug, Deserialize)]
pub struct CatalogSeed {
    pub products: Vec<NewProduct>,
}

/// Problems that would make a product unsellable.
pub fn validate(seed: &CatalogSeed) -> Vec<String> {
    let mut errors = Vec::new();

    for (index, product) in seed.products.iter().enumerate() {
        let label = if product.name.trim().is_empty() {
            format!("product #{}", index + 1)
        } else {
            format!("'{}'", product.name)
        };

        if product.name.trim().is_empty() {
            errors.push(format!("{label}: name is empty"));
        }
        if product.initial_price < Money::ZERO || product.discounted_price < Money::ZERO {
            errors.push(format!("{label}: prices must not be negative"));
        }
        if product.discounted_price > product.initial_price {
            errors.push(format!(
                "{label}: discounted price {} exceeds initial price {}",
                product.discounted_price, product.initial_price
            ));
        }
        if product.available_colors.iter().any(|c| !is_hex_color(&c.hex)) {
            errors.push(format!("{label}: colours must be #RRGGBB"));
        }
    }

    errors
}

fn is_hex_color(value: &str) -> bool {
    value
        .strip_prefix('#')
        .is_some_and(|hex| hex.len() == 6 && hex.bytes().all(|b| b.is_ascii_hexdigit()))
}

/// Insert every product in `file_path`.
///
/// With `dry_run` the file is only parsed and validated.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, validation fails,
/// or an insert fails.
pub async fn products(file_path: &str, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading catalog from file");

    // Read and validate YAML before connecting to database
    let content = tokio::fs::read_to_string(path).await?;
    let seed: CatalogSeed = serde_yaml::from_str(&content)?;
    info!(products = seed.products.len(), "Parsed catalog");

    let errors = validate(&seed);
    if !errors.is_empty() {
        error!("Catalog validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    if dry_run {
        info!("Dry run, nothing inserted");
        return Ok(());
    }

    let database_url = super::database_url()?;
    let store = PgStore::new(db::create_pool(&database_url).await?);
    info!("Connected to database");

    for product in &seed.products {
        let inserted = store.insert_product(product).await?;
        info!(id = %inserted.id, name = %inserted.name, "Inserted product");
    }

    info!("Seeding complete! {} products inserted", seed.products.len());
    Ok(())
}

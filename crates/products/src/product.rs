use serde::{Deserialize, Serialize};

use larder_core::{DomainError, DomainResult, OrganizationId, ProductId};

use crate::Recipe;

/// Sellable product, organization-scoped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub organization_id: OrganizationId,
    pub name: String,
    pub category: String,
    pub unit_price: f64,
    #[serde(default)]
    pub recipe: Recipe,
}

impl Product {
    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("product name cannot be empty"));
        }
        if !self.unit_price.is_finite() || self.unit_price < 0.0 {
            return Err(DomainError::validation("unit_price must be a non-negative number"));
        }
        Ok(())
    }

    pub fn has_recipe(&self) -> bool {
        !self.recipe.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_without_recipe_deserializes() {
        let json = format!(
            r#"{{"id":"{}","organization_id":"{}","name":"Espresso","category":"boissons","unit_price":2.1}}"#,
            ProductId::new(),
            OrganizationId::new()
        );
        let product: Product = serde_json::from_str(&json).unwrap();
        assert!(!product.has_recipe());
        assert!(product.validate().is_ok());
    }

    #[test]
    fn negative_price_is_rejected() {
        let product = Product {
            id: ProductId::new(),
            organization_id: OrganizationId::new(),
            name: "Croissant".to_string(),
            category: "viennoiserie".to_string(),
            unit_price: -1.0,
            recipe: Recipe::empty(),
        };
        assert!(matches!(product.validate(), Err(DomainError::Validation(_))));
    }
}

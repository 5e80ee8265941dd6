use serde::{Deserialize, Serialize};

use larder_core::{DomainError, DomainResult, IngredientId, OrganizationId};

use crate::Unit;

/// Raw material, shared across an organization's restaurants.
///
/// `unit` is the inventory unit: stock, thresholds, cost and pack size are all
/// expressed in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: IngredientId,
    pub organization_id: OrganizationId,
    pub name: String,
    pub unit: Unit,
    pub cost_per_unit: f64,
    pub pack_size: Option<f64>,
    pub supplier: Option<String>,
}

impl Ingredient {
    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("ingredient name cannot be empty"));
        }
        if !self.cost_per_unit.is_finite() || self.cost_per_unit < 0.0 {
            return Err(DomainError::validation("cost_per_unit must be a non-negative number"));
        }
        if let Some(pack) = self.pack_size {
            if !pack.is_finite() || pack <= 0.0 {
                return Err(DomainError::validation("pack_size must be positive"));
            }
        }
        Ok(())
    }

    /// Round `quantity` up to whole supplier packs.
    ///
    /// Returns `(rounded_quantity, packs)`; `packs` is `None` when the
    /// ingredient has no pack size.
    pub fn round_to_packs(&self, quantity: f64) -> (f64, Option<u64>) {
        match self.pack_size {
            Some(pack) if quantity > 0.0 => {
                let packs = (quantity / pack).ceil();
                (packs * pack, Some(packs as u64))
            }
            Some(_) => (0.0, Some(0)),
            None => (quantity.max(0.0), None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flour(pack_size: Option<f64>) -> Ingredient {
        Ingredient {
            id: IngredientId::new(),
            organization_id: OrganizationId::new(),
            name: "Farine T55".to_string(),
            unit: Unit::Kilogram,
            cost_per_unit: 1.2,
            pack_size,
            supplier: Some("Moulins Bio".to_string()),
        }
    }

    #[test]
    fn rounds_up_to_whole_packs() {
        assert_eq!(flour(Some(25.0)).round_to_packs(26.0), (50.0, Some(2)));
        assert_eq!(flour(Some(25.0)).round_to_packs(25.0), (25.0, Some(1)));
    }

    #[test]
    fn without_pack_size_quantity_is_kept() {
        assert_eq!(flour(None).round_to_packs(3.3), (3.3, None));
    }

    #[test]
    fn nothing_to_order_is_zero_packs() {
        assert_eq!(flour(Some(10.0)).round_to_packs(0.0), (0.0, Some(0)));
    }

    #[test]
    fn rejects_non_positive_pack_size() {
        assert!(matches!(flour(Some(0.0)).validate(), Err(DomainError::Validation(_))));
        assert!(flour(Some(5.0)).validate().is_ok());
    }

    #[test]
    fn rejects_blank_name() {
        let mut ingredient = flour(None);
        ingredient.name = "  ".to_string();
        assert!(ingredient.validate().is_err());
    }
}

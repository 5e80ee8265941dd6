use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use larder_core::{DomainError, DomainResult, OrganizationId, ProductId, RestaurantId, SaleId};

/// A recorded sale.
///
/// Only the restaurant, product, quantity, and date/hour may change after
/// creation, and only through the lifecycle adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sale {
    pub id: SaleId,
    pub organization_id: OrganizationId,
    pub restaurant_id: RestaurantId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub amount: f64,
    pub sale_date: NaiveDate,
    pub sale_hour: u8,
}

/// Input for recording a sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSale {
    pub restaurant_id: RestaurantId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub amount: f64,
    pub sale_date: NaiveDate,
    pub sale_hour: u8,
}

/// Partial update of a sale; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SalePatch {
    #[serde(default)]
    pub restaurant_id: Option<RestaurantId>,
    #[serde(default)]
    pub product_id: Option<ProductId>,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub sale_date: Option<NaiveDate>,
    #[serde(default)]
    pub sale_hour: Option<u8>,
}

fn validate_quantity(quantity: u32) -> DomainResult<()> {
    if quantity == 0 {
        return Err(DomainError::validation("quantity must be greater than zero"));
    }
    Ok(())
}

fn validate_hour(hour: u8) -> DomainResult<()> {
    if hour > 23 {
        return Err(DomainError::validation("sale_hour must be within 0..=23"));
    }
    Ok(())
}

impl NewSale {
    pub fn validate(&self) -> DomainResult<()> {
        validate_quantity(self.quantity)?;
        validate_hour(self.sale_hour)?;
        if !self.amount.is_finite() || self.amount < 0.0 {
            return Err(DomainError::validation("amount must be a non-negative number"));
        }
        Ok(())
    }

    pub fn into_sale(self, id: SaleId, organization_id: OrganizationId) -> Sale {
        Sale {
            id,
            organization_id,
            restaurant_id: self.restaurant_id,
            product_id: self.product_id,
            quantity: self.quantity,
            amount: self.amount,
            sale_date: self.sale_date,
            sale_hour: self.sale_hour,
        }
    }
}

impl SalePatch {
    pub fn validate(&self) -> DomainResult<()> {
        if let Some(q) = self.quantity {
            validate_quantity(q)?;
        }
        if let Some(h) = self.sale_hour {
            validate_hour(h)?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self == &SalePatch::default()
    }
}

impl Sale {
    /// Return the sale as it looks after `patch`.
    pub fn patched(&self, patch: &SalePatch) -> Sale {
        Sale {
            restaurant_id: patch.restaurant_id.unwrap_or(self.restaurant_id),
            product_id: patch.product_id.unwrap_or(self.product_id),
            quantity: patch.quantity.unwrap_or(self.quantity),
            sale_date: patch.sale_date.unwrap_or(self.sale_date),
            sale_hour: patch.sale_hour.unwrap_or(self.sale_hour),
            ..self.clone()
        }
    }

    /// Whether `other` would consume inventory differently from `self`.
    pub fn consumes_differently(&self, other: &Sale) -> bool {
        self.product_id != other.product_id || self.quantity != other.quantity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_sale(quantity: u32, hour: u8) -> NewSale {
        NewSale {
            restaurant_id: RestaurantId::new(),
            product_id: ProductId::new(),
            quantity,
            amount: 12.5,
            sale_date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
            sale_hour: hour,
        }
    }

    #[test]
    fn zero_quantity_is_rejected() {
        assert!(matches!(new_sale(0, 12).validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn hour_out_of_range_is_rejected() {
        assert!(new_sale(1, 24).validate().is_err());
        assert!(new_sale(1, 23).validate().is_ok());
    }

    #[test]
    fn patch_only_overrides_given_fields() {
        let sale = new_sale(2, 12).into_sale(SaleId::new(), OrganizationId::new());
        let patch = SalePatch {
            quantity: Some(6),
            ..SalePatch::default()
        };
        let after = sale.patched(&patch);

        assert_eq!(after.quantity, 6);
        assert_eq!(after.product_id, sale.product_id);
        assert_eq!(after.restaurant_id, sale.restaurant_id);
        assert!(sale.consumes_differently(&after));
    }

    #[test]
    fn moving_restaurant_alone_consumes_the_same() {
        let sale = new_sale(2, 12).into_sale(SaleId::new(), OrganizationId::new());
        let after = sale.patched(&SalePatch {
            restaurant_id: Some(RestaurantId::new()),
            ..SalePatch::default()
        });
        assert!(!sale.consumes_differently(&after));
    }

    #[test]
    fn patch_validation_checks_present_fields() {
        assert!(SalePatch { quantity: Some(0), ..SalePatch::default() }.validate().is_err());
        assert!(SalePatch::default().validate().is_ok());
        assert!(SalePatch::default().is_empty());
    }
}

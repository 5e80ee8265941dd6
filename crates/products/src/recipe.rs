//! Bill of materials.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use larder_core::{DomainError, DomainResult, IngredientId};
use larder_inventory::{Unit, UnitError, to_inventory_unit};

/// One BOM line: how much of an ingredient a single unit of the product consumes.
///
/// `unit` overrides the unit `quantity_needed` is expressed in; when absent
/// the quantity is already in the ingredient's inventory unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeLine {
    pub ingredient_id: IngredientId,
    pub quantity_needed: f64,
    #[serde(default)]
    pub unit: Option<Unit>,
}

/// Failure while expanding a recipe into inventory quantities.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BomError {
    #[error("recipe references unknown ingredient {0}")]
    UnknownIngredient(IngredientId),

    #[error(transparent)]
    Unit(#[from] UnitError),
}

/// A product's recipe: at most one line per ingredient.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<RecipeLine>", into = "Vec<RecipeLine>")]
pub struct Recipe {
    lines: Vec<RecipeLine>,
}

impl Recipe {
    pub fn new(lines: Vec<RecipeLine>) -> DomainResult<Self> {
        let mut seen = HashSet::with_capacity(lines.len());
        for line in &lines {
            if !seen.insert(line.ingredient_id) {
                return Err(DomainError::invariant(format!(
                    "duplicate recipe line for ingredient {}",
                    line.ingredient_id
                )));
            }
            if !line.quantity_needed.is_finite() || line.quantity_needed <= 0.0 {
                return Err(DomainError::validation("quantity_needed must be positive"));
            }
        }
        Ok(Self { lines })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[RecipeLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn line_for(&self, ingredient_id: IngredientId) -> Option<&RecipeLine> {
        self.lines.iter().find(|l| l.ingredient_id == ingredient_id)
    }

    /// Expand `quantity` units of the product into per-ingredient amounts, each
    /// converted to the ingredient's inventory unit.
    ///
    /// `inventory_unit` resolves an ingredient to its inventory unit. Every line
    /// is converted before anything is returned, so a single incompatible line
    /// fails the whole expansion.
    pub fn consumption<F>(
        &self,
        quantity: f64,
        inventory_unit: F,
    ) -> Result<BTreeMap<IngredientId, f64>, BomError>
    where
        F: Fn(IngredientId) -> Option<Unit>,
    {
        let mut out = BTreeMap::new();
        for line in &self.lines {
            let target = inventory_unit(line.ingredient_id)
                .ok_or(BomError::UnknownIngredient(line.ingredient_id))?;
            let per_unit = to_inventory_unit(line.quantity_needed, line.unit, target)?;
            *out.entry(line.ingredient_id).or_insert(0.0) += per_unit * quantity;
        }
        Ok(out)
    }
}

impl TryFrom<Vec<RecipeLine>> for Recipe {
    type Error = DomainError;

    fn try_from(lines: Vec<RecipeLine>) -> Result<Self, Self::Error> {
        Recipe::new(lines)
    }
}

impl From<Recipe> for Vec<RecipeLine> {
    fn from(recipe: Recipe) -> Self {
        recipe.lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(ingredient_id: IngredientId, qty: f64, unit: Option<Unit>) -> RecipeLine {
        RecipeLine {
            ingredient_id,
            quantity_needed: qty,
            unit,
        }
    }

    #[test]
    fn duplicate_ingredient_is_rejected() {
        let flour = IngredientId::new();
        let err = Recipe::new(vec![line(flour, 150.0, None), line(flour, 10.0, None)]).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn non_positive_quantity_is_rejected() {
        let err = Recipe::new(vec![line(IngredientId::new(), 0.0, None)]).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn consumption_converts_and_multiplies() {
        let flour = IngredientId::new();
        let milk = IngredientId::new();
        let recipe = Recipe::new(vec![
            line(flour, 150.0, Some(Unit::Gram)),
            line(milk, 0.2, None),
        ])
        .unwrap();

        let used = recipe
            .consumption(2.0, |id| if id == flour { Some(Unit::Kilogram) } else { Some(Unit::Liter) })
            .unwrap();

        assert!((used[&flour] - 0.3).abs() < 1e-12);
        assert!((used[&milk] - 0.4).abs() < 1e-12);
    }

    #[test]
    fn incompatible_line_fails_whole_expansion() {
        let flour = IngredientId::new();
        let eggs = IngredientId::new();
        let recipe = Recipe::new(vec![
            line(flour, 150.0, Some(Unit::Gram)),
            line(eggs, 2.0, Some(Unit::Liter)),
        ])
        .unwrap();

        let err = recipe
            .consumption(1.0, |id| if id == flour { Some(Unit::Gram) } else { Some(Unit::Piece) })
            .unwrap_err();
        assert!(matches!(err, BomError::Unit(UnitError::Incompatible { .. })));
    }

    #[test]
    fn unknown_ingredient_is_reported() {
        let ghost = IngredientId::new();
        let recipe = Recipe::new(vec![line(ghost, 1.0, None)]).unwrap();
        assert_eq!(
            recipe.consumption(1.0, |_| None).unwrap_err(),
            BomError::UnknownIngredient(ghost)
        );
    }

    #[test]
    fn empty_recipe_consumes_nothing() {
        assert!(Recipe::empty().consumption(5.0, |_| None).unwrap().is_empty());
    }

    #[test]
    fn deserializing_duplicates_fails() {
        let id = IngredientId::new();
        let json = format!(
            r#"[{{"ingredient_id":"{id}","quantity_needed":1.0}},{{"ingredient_id":"{id}","quantity_needed":2.0}}]"#
        );
        assert!(serde_json::from_str::<Recipe>(&json).is_err());
    }
}

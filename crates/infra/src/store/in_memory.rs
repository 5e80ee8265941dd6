use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use chrono::{DateTime, NaiveDate, Utc};

use larder_core::{
    AlertId, IngredientId, OrganizationId, ProductId, RecommendationId, RestaurantId, SaleId,
};
use larder_inventory::{Ingredient, InventoryRecord};
use larder_planning::{
    Alert, Forecast, PlannedStaffing, Recommendation, RecommendationStatus, RecommendationType,
};
use larder_products::Product;
use larder_sales::Sale;

use super::{
    AlertStore, CatalogStore, ForecastStore, InventoryStore, LedgerStore, LedgerTx,
    OrganizationSettings, RecommendationStore, Restaurant, SalesStore,
};
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Default)]
struct Catalog {
    restaurants: HashMap<RestaurantId, Restaurant>,
    settings: HashMap<OrganizationId, OrganizationSettings>,
    products: HashMap<ProductId, Product>,
    ingredients: HashMap<IngredientId, Ingredient>,
    planned: HashMap<(RestaurantId, NaiveDate, String), PlannedStaffing>,
}

/// Rows written by ledger transactions.
#[derive(Debug, Default)]
struct LedgerState {
    records: HashMap<(RestaurantId, IngredientId), InventoryRecord>,
    sales: HashMap<SaleId, Sale>,
    recommendations: HashMap<RecommendationId, Recommendation>,
}

/// In-memory store.
///
/// Intended for tests/dev. A ledger transaction holds the ledger lock for
/// its whole duration and records its writes in a change set that is
/// applied to the committed state only when the closure succeeds.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    catalog: RwLock<Catalog>,
    ledger: Mutex<LedgerState>,
    forecasts: RwLock<HashMap<(RestaurantId, ProductId, NaiveDate), Forecast>>,
    alerts: RwLock<HashMap<AlertId, Alert>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn catalog(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, Catalog>> {
        self.catalog.read().map_err(|_| StoreError::Poisoned)
    }

    fn catalog_mut(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, Catalog>> {
        self.catalog.write().map_err(|_| StoreError::Poisoned)
    }

    fn ledger(&self) -> StoreResult<std::sync::MutexGuard<'_, LedgerState>> {
        self.ledger.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl CatalogStore for InMemoryStore {
    fn upsert_restaurant(&self, restaurant: Restaurant) -> StoreResult<()> {
        self.catalog_mut()?.restaurants.insert(restaurant.id, restaurant);
        Ok(())
    }

    fn restaurant(&self, id: RestaurantId) -> StoreResult<Option<Restaurant>> {
        Ok(self.catalog()?.restaurants.get(&id).cloned())
    }

    fn restaurants(&self, organization_id: OrganizationId) -> StoreResult<Vec<Restaurant>> {
        let mut out: Vec<Restaurant> = self
            .catalog()?
            .restaurants
            .values()
            .filter(|r| r.organization_id == organization_id)
            .cloned()
            .collect();
        out.sort_by_key(|r| r.id);
        Ok(out)
    }

    fn all_restaurants(&self) -> StoreResult<Vec<Restaurant>> {
        let mut out: Vec<Restaurant> = self.catalog()?.restaurants.values().cloned().collect();
        out.sort_by_key(|r| r.id);
        Ok(out)
    }

    fn upsert_settings(&self, settings: OrganizationSettings) -> StoreResult<()> {
        self.catalog_mut()?
            .settings
            .insert(settings.organization_id, settings);
        Ok(())
    }

    fn settings(&self, organization_id: OrganizationId) -> StoreResult<Option<OrganizationSettings>> {
        Ok(self.catalog()?.settings.get(&organization_id).cloned())
    }

    fn upsert_product(&self, product: Product) -> StoreResult<()> {
        self.catalog_mut()?.products.insert(product.id, product);
        Ok(())
    }

    fn product(&self, id: ProductId) -> StoreResult<Option<Product>> {
        Ok(self.catalog()?.products.get(&id).cloned())
    }

    fn products(&self, organization_id: OrganizationId) -> StoreResult<Vec<Product>> {
        let mut out: Vec<Product> = self
            .catalog()?
            .products
            .values()
            .filter(|p| p.organization_id == organization_id)
            .cloned()
            .collect();
        out.sort_by_key(|p| p.id);
        Ok(out)
    }

    fn upsert_ingredient(&self, ingredient: Ingredient) -> StoreResult<()> {
        self.catalog_mut()?.ingredients.insert(ingredient.id, ingredient);
        Ok(())
    }

    fn ingredient(&self, id: IngredientId) -> StoreResult<Option<Ingredient>> {
        Ok(self.catalog()?.ingredients.get(&id).cloned())
    }

    fn ingredients(&self, organization_id: OrganizationId) -> StoreResult<Vec<Ingredient>> {
        let mut out: Vec<Ingredient> = self
            .catalog()?
            .ingredients
            .values()
            .filter(|i| i.organization_id == organization_id)
            .cloned()
            .collect();
        out.sort_by_key(|i| i.id);
        Ok(out)
    }

    fn upsert_planned_staffing(&self, planned: PlannedStaffing) -> StoreResult<()> {
        let key = (planned.restaurant_id, planned.plan_date, planned.slot_label.clone());
        self.catalog_mut()?.planned.insert(key, planned);
        Ok(())
    }

    fn planned_staffing(
        &self,
        restaurant_id: RestaurantId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<PlannedStaffing>> {
        let mut out: Vec<PlannedStaffing> = self
            .catalog()?
            .planned
            .values()
            .filter(|p| p.restaurant_id == restaurant_id && p.plan_date >= from && p.plan_date <= to)
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            a.plan_date
                .cmp(&b.plan_date)
                .then_with(|| a.slot_label.cmp(&b.slot_label))
        });
        Ok(out)
    }
}

impl InventoryStore for InMemoryStore {
    fn create_inventory_record(&self, record: InventoryRecord) -> StoreResult<()> {
        let mut ledger = self.ledger()?;
        let key = (record.restaurant_id, record.ingredient_id);
        if ledger.records.contains_key(&key) {
            return Err(StoreError::Conflict(format!(
                "ingredient {} is already tracked at restaurant {}",
                record.ingredient_id, record.restaurant_id
            )));
        }
        ledger.records.insert(key, record);
        Ok(())
    }

    fn set_thresholds(
        &self,
        restaurant_id: RestaurantId,
        ingredient_id: IngredientId,
        min_threshold: f64,
        max_threshold: Option<f64>,
    ) -> StoreResult<InventoryRecord> {
        let mut ledger = self.ledger()?;
        let record = ledger
            .records
            .get_mut(&(restaurant_id, ingredient_id))
            .ok_or_else(|| StoreError::NotFound(format!("inventory record {restaurant_id}/{ingredient_id}")))?;
        record.min_threshold = min_threshold;
        record.max_threshold = max_threshold;
        Ok(record.clone())
    }

    fn inventory_records(&self, restaurant_id: RestaurantId) -> StoreResult<Vec<InventoryRecord>> {
        let mut out: Vec<InventoryRecord> = self
            .ledger()?
            .records
            .values()
            .filter(|r| r.restaurant_id == restaurant_id)
            .cloned()
            .collect();
        out.sort_by_key(|r| r.ingredient_id);
        Ok(out)
    }
}

/// Rows a transaction has written so far. Reads consult these first and
/// fall back to the committed state, so only touched rows are copied.
#[derive(Debug, Default)]
struct LedgerChanges {
    records: HashMap<(RestaurantId, IngredientId), InventoryRecord>,
    /// `None` marks a deleted sale.
    sales: HashMap<SaleId, Option<Sale>>,
    recommendations: HashMap<RecommendationId, Recommendation>,
}

impl LedgerChanges {
    fn apply_to(self, state: &mut LedgerState) {
        state.records.extend(self.records);
        for (id, sale) in self.sales {
            match sale {
                Some(sale) => {
                    state.sales.insert(id, sale);
                }
                None => {
                    state.sales.remove(&id);
                }
            }
        }
        state.recommendations.extend(self.recommendations);
    }
}

struct InMemoryTx<'a> {
    committed: &'a LedgerState,
    catalog: &'a RwLock<Catalog>,
    changes: LedgerChanges,
}

impl InMemoryTx<'_> {
    fn current_sale(&self, id: SaleId) -> Option<&Sale> {
        match self.changes.sales.get(&id) {
            Some(staged) => staged.as_ref(),
            None => self.committed.sales.get(&id),
        }
    }
}

impl LedgerTx for InMemoryTx<'_> {
    fn inventory_record(
        &mut self,
        restaurant_id: RestaurantId,
        ingredient_id: IngredientId,
    ) -> StoreResult<Option<InventoryRecord>> {
        let key = (restaurant_id, ingredient_id);
        Ok(self
            .changes
            .records
            .get(&key)
            .or_else(|| self.committed.records.get(&key))
            .cloned())
    }

    fn save_inventory_record(&mut self, record: &InventoryRecord) -> StoreResult<()> {
        let key = (record.restaurant_id, record.ingredient_id);
        if !self.committed.records.contains_key(&key) {
            return Err(StoreError::NotFound(format!(
                "inventory record {}/{}",
                record.restaurant_id, record.ingredient_id
            )));
        }
        self.changes.records.insert(key, record.clone());
        Ok(())
    }

    fn sale(&mut self, id: SaleId) -> StoreResult<Option<Sale>> {
        Ok(self.current_sale(id).cloned())
    }

    fn insert_sale(&mut self, sale: &Sale) -> StoreResult<()> {
        if self.current_sale(sale.id).is_some() {
            return Err(StoreError::Conflict(format!("sale {} already exists", sale.id)));
        }
        self.changes.sales.insert(sale.id, Some(sale.clone()));
        Ok(())
    }

    fn update_sale(&mut self, sale: &Sale) -> StoreResult<()> {
        if self.current_sale(sale.id).is_none() {
            return Err(StoreError::NotFound(format!("sale {}", sale.id)));
        }
        self.changes.sales.insert(sale.id, Some(sale.clone()));
        Ok(())
    }

    fn delete_sale(&mut self, id: SaleId) -> StoreResult<()> {
        if self.current_sale(id).is_none() {
            return Err(StoreError::NotFound(format!("sale {id}")));
        }
        self.changes.sales.insert(id, None);
        Ok(())
    }

    fn product(&mut self, id: ProductId) -> StoreResult<Option<Product>> {
        let catalog = self.catalog.read().map_err(|_| StoreError::Poisoned)?;
        Ok(catalog.products.get(&id).cloned())
    }

    fn recommendation(&mut self, id: RecommendationId) -> StoreResult<Option<Recommendation>> {
        Ok(self
            .changes
            .recommendations
            .get(&id)
            .or_else(|| self.committed.recommendations.get(&id))
            .cloned())
    }

    fn update_recommendation_status(
        &mut self,
        id: RecommendationId,
        status: RecommendationStatus,
    ) -> StoreResult<()> {
        let mut rec = self
            .recommendation(id)?
            .ok_or_else(|| StoreError::NotFound(format!("recommendation {id}")))?;
        rec.status = status;
        self.changes.recommendations.insert(id, rec);
        Ok(())
    }
}

impl LedgerStore for InMemoryStore {
    fn transaction<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&mut dyn LedgerTx) -> Result<R, E>,
        E: From<StoreError>,
    {
        let mut committed = self.ledger()?;
        let mut tx = InMemoryTx {
            committed: &committed,
            catalog: &self.catalog,
            changes: LedgerChanges::default(),
        };
        let out = f(&mut tx)?;
        let changes = tx.changes;
        changes.apply_to(&mut committed);
        Ok(out)
    }
}

impl SalesStore for InMemoryStore {
    fn sale(&self, id: SaleId) -> StoreResult<Option<Sale>> {
        Ok(self.ledger()?.sales.get(&id).cloned())
    }

    fn sales_between(
        &self,
        restaurant_id: RestaurantId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<Sale>> {
        let mut out: Vec<Sale> = self
            .ledger()?
            .sales
            .values()
            .filter(|s| s.restaurant_id == restaurant_id && s.sale_date >= from && s.sale_date < to)
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            (a.sale_date, a.sale_hour, a.id).cmp(&(b.sale_date, b.sale_hour, b.id))
        });
        Ok(out)
    }
}

impl ForecastStore for InMemoryStore {
    fn upsert_forecast(&self, forecast: Forecast) -> StoreResult<Forecast> {
        let mut forecasts = self.forecasts.write().map_err(|_| StoreError::Poisoned)?;
        let key = (forecast.restaurant_id, forecast.product_id, forecast.forecast_date);
        let stored = match forecasts.get(&key) {
            Some(existing) => Forecast {
                id: existing.id,
                ..forecast
            },
            None => forecast,
        };
        forecasts.insert(key, stored.clone());
        Ok(stored)
    }

    fn forecast(
        &self,
        restaurant_id: RestaurantId,
        product_id: ProductId,
        date: NaiveDate,
    ) -> StoreResult<Option<Forecast>> {
        let forecasts = self.forecasts.read().map_err(|_| StoreError::Poisoned)?;
        Ok(forecasts.get(&(restaurant_id, product_id, date)).cloned())
    }

    fn forecasts_between(
        &self,
        restaurant_id: RestaurantId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<Forecast>> {
        let forecasts = self.forecasts.read().map_err(|_| StoreError::Poisoned)?;
        let mut out: Vec<Forecast> = forecasts
            .values()
            .filter(|f| {
                f.restaurant_id == restaurant_id && f.forecast_date >= from && f.forecast_date <= to
            })
            .cloned()
            .collect();
        out.sort_by_key(|f| (f.forecast_date, f.product_id));
        Ok(out)
    }
}

fn newest_first(out: &mut [Recommendation]) {
    out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

impl RecommendationStore for InMemoryStore {
    fn insert_recommendation(&self, recommendation: &Recommendation) -> StoreResult<()> {
        let mut ledger = self.ledger()?;
        if ledger.recommendations.contains_key(&recommendation.id) {
            return Err(StoreError::Conflict(format!(
                "recommendation {} already exists",
                recommendation.id
            )));
        }
        ledger
            .recommendations
            .insert(recommendation.id, recommendation.clone());
        Ok(())
    }

    fn recommendation(&self, id: RecommendationId) -> StoreResult<Option<Recommendation>> {
        Ok(self.ledger()?.recommendations.get(&id).cloned())
    }

    fn recommendations(&self, restaurant_id: RestaurantId) -> StoreResult<Vec<Recommendation>> {
        let mut out: Vec<Recommendation> = self
            .ledger()?
            .recommendations
            .values()
            .filter(|r| r.restaurant_id == restaurant_id)
            .cloned()
            .collect();
        newest_first(&mut out);
        Ok(out)
    }

    fn latest_recommendation(
        &self,
        restaurant_id: RestaurantId,
        kind: RecommendationType,
    ) -> StoreResult<Option<Recommendation>> {
        Ok(self
            .recommendations(restaurant_id)?
            .into_iter()
            .find(|r| r.kind() == kind))
    }
}

impl AlertStore for InMemoryStore {
    fn replace_unresolved_alerts(
        &self,
        restaurant_id: RestaurantId,
        alerts: Vec<Alert>,
    ) -> StoreResult<()> {
        let mut stored = self.alerts.write().map_err(|_| StoreError::Poisoned)?;
        stored.retain(|_, a| a.restaurant_id != restaurant_id || a.resolved);
        for alert in alerts {
            stored.insert(alert.id, alert);
        }
        Ok(())
    }

    fn alerts(&self, restaurant_id: RestaurantId, include_resolved: bool) -> StoreResult<Vec<Alert>> {
        let stored = self.alerts.read().map_err(|_| StoreError::Poisoned)?;
        let mut out: Vec<Alert> = stored
            .values()
            .filter(|a| a.restaurant_id == restaurant_id && (include_resolved || !a.resolved))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(out)
    }

    fn alert(&self, id: AlertId) -> StoreResult<Option<Alert>> {
        let stored = self.alerts.read().map_err(|_| StoreError::Poisoned)?;
        Ok(stored.get(&id).cloned())
    }

    fn resolve_alert(&self, id: AlertId, at: DateTime<Utc>) -> StoreResult<Alert> {
        let mut stored = self.alerts.write().map_err(|_| StoreError::Poisoned)?;
        let alert = stored
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("alert {id}")))?;
        alert
            .resolve(at)
            .map_err(|e| StoreError::Conflict(e.to_string()))?;
        Ok(alert.clone())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use larder_planning::{AlertDraft, AlertType, Severity};

    use super::*;

    fn record(restaurant_id: RestaurantId, stock: f64) -> InventoryRecord {
        InventoryRecord {
            restaurant_id,
            ingredient_id: IngredientId::new(),
            current_stock: stock,
            min_threshold: 0.0,
            max_threshold: None,
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn failed_transaction_leaves_no_trace() {
        let store = InMemoryStore::new();
        let restaurant = RestaurantId::new();
        let r = record(restaurant, 10.0);
        store.create_inventory_record(r.clone()).unwrap();

        let result: Result<(), StoreError> = store.transaction(|tx| {
            let mut rec = tx.inventory_record(restaurant, r.ingredient_id)?.unwrap();
            rec.apply_delta(-4.0, Utc::now());
            tx.save_inventory_record(&rec)?;
            Err(StoreError::Conflict("abort".into()))
        });

        assert!(result.is_err());
        assert_eq!(store.inventory_records(restaurant).unwrap()[0].current_stock, 10.0);
    }

    #[test]
    fn committed_transaction_is_visible() {
        let store = InMemoryStore::new();
        let restaurant = RestaurantId::new();
        let r = record(restaurant, 10.0);
        store.create_inventory_record(r.clone()).unwrap();

        store
            .transaction::<_, StoreError, _>(|tx| {
                let mut rec = tx.inventory_record(restaurant, r.ingredient_id)?.unwrap();
                rec.apply_delta(-4.0, Utc::now());
                tx.save_inventory_record(&rec)
            })
            .unwrap();

        assert_eq!(store.inventory_records(restaurant).unwrap()[0].current_stock, 6.0);
    }

    fn sale(restaurant_id: RestaurantId) -> Sale {
        Sale {
            id: SaleId::new(),
            organization_id: OrganizationId::new(),
            restaurant_id,
            product_id: ProductId::new(),
            quantity: 2,
            amount: 2.4,
            sale_date: Utc::now().date_naive(),
            sale_hour: 12,
        }
    }

    #[test]
    fn transaction_reads_its_own_writes() {
        let store = InMemoryStore::new();
        let restaurant = RestaurantId::new();
        let touched = record(restaurant, 10.0);
        let untouched = record(restaurant, 3.0);
        store.create_inventory_record(touched.clone()).unwrap();
        store.create_inventory_record(untouched.clone()).unwrap();
        let kept = sale(restaurant);
        store
            .transaction::<_, StoreError, _>(|tx| tx.insert_sale(&kept))
            .unwrap();

        let transient = sale(restaurant);
        store
            .transaction::<_, StoreError, _>(|tx| {
                let mut rec = tx.inventory_record(restaurant, touched.ingredient_id)?.unwrap();
                rec.apply_delta(-4.0, Utc::now());
                tx.save_inventory_record(&rec)?;
                let reread = tx.inventory_record(restaurant, touched.ingredient_id)?.unwrap();
                assert_eq!(reread.current_stock, 6.0);

                tx.insert_sale(&transient)?;
                assert!(tx.sale(transient.id)?.is_some());
                assert!(matches!(tx.insert_sale(&transient), Err(StoreError::Conflict(_))));
                tx.delete_sale(transient.id)?;
                assert!(tx.sale(transient.id)?.is_none());
                assert!(matches!(tx.delete_sale(transient.id), Err(StoreError::NotFound(_))));

                tx.delete_sale(kept.id)?;
                assert!(tx.sale(kept.id)?.is_none());
                Ok(())
            })
            .unwrap();

        let stock_of = |ingredient_id: IngredientId| {
            store
                .inventory_records(restaurant)
                .unwrap()
                .into_iter()
                .find(|r| r.ingredient_id == ingredient_id)
                .map(|r| r.current_stock)
        };
        assert_eq!(stock_of(touched.ingredient_id), Some(6.0));
        assert_eq!(stock_of(untouched.ingredient_id), Some(3.0));
        assert!(store.sale(transient.id).unwrap().is_none());
        assert!(store.sale(kept.id).unwrap().is_none());
    }

    #[test]
    fn transaction_reads_products_from_the_catalog() {
        let store = InMemoryStore::new();
        let product = Product {
            id: ProductId::new(),
            organization_id: OrganizationId::new(),
            name: "Croissant".to_string(),
            category: "viennoiserie".to_string(),
            unit_price: 1.4,
            recipe: Default::default(),
        };
        store.upsert_product(product.clone()).unwrap();

        let (found, missing) = store
            .transaction::<_, StoreError, _>(|tx| Ok((tx.product(product.id)?, tx.product(ProductId::new())?)))
            .unwrap();
        assert_eq!(found, Some(product));
        assert_eq!(missing, None);
    }

    #[test]
    fn duplicate_inventory_record_conflicts() {
        let store = InMemoryStore::new();
        let r = record(RestaurantId::new(), 1.0);
        store.create_inventory_record(r.clone()).unwrap();
        assert!(matches!(
            store.create_inventory_record(r),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn replacing_alerts_keeps_resolved_history() {
        let store = InMemoryStore::new();
        let restaurant = RestaurantId::new();
        let draft = || AlertDraft {
            alert_type: AlertType::Shortage,
            severity: Severity::High,
            message: "Stock bas".into(),
        };

        let first = Alert::from_draft(restaurant, draft(), Utc::now());
        let first_id = first.id;
        store.replace_unresolved_alerts(restaurant, vec![first]).unwrap();
        store.resolve_alert(first_id, Utc::now()).unwrap();

        store
            .replace_unresolved_alerts(restaurant, vec![Alert::from_draft(restaurant, draft(), Utc::now())])
            .unwrap();
        store.replace_unresolved_alerts(restaurant, vec![]).unwrap();

        let all = store.alerts(restaurant, true).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, first_id);
        assert!(all[0].resolved);
        assert!(matches!(
            store.resolve_alert(first_id, Utc::now()),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn forecast_upsert_keeps_identity() {
        use larder_planning::ForecastMethod;

        let store = InMemoryStore::new();
        let restaurant = RestaurantId::new();
        let product = ProductId::new();
        let day = NaiveDate::from_ymd_opt(2026, 7, 1).unwrap();
        let make = |qty| Forecast {
            id: larder_core::ForecastId::new(),
            restaurant_id: restaurant,
            product_id: product,
            forecast_date: day,
            forecasted_quantity: qty,
            method: ForecastMethod::MovingAverage,
            confidence: 0.4,
            generated_at: Utc::now(),
        };

        let first = store.upsert_forecast(make(3)).unwrap();
        let second = store.upsert_forecast(make(8)).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.forecast(restaurant, product, day).unwrap().unwrap().forecasted_quantity, 8);
        assert_eq!(store.forecasts_between(restaurant, day, day).unwrap().len(), 1);
    }
}

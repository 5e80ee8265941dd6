//! Restaurant-scoped services over a [`CoreStore`].
//!
//! Every call names its organization explicitly; restaurants, products,
//! ingredients and sales of other organizations are reported as missing.

pub mod alerts;
pub mod catalog;
pub mod forecast;
pub mod inventory;
pub mod orders;
pub mod recommendations;
pub mod sales;
pub mod staffing;

use std::sync::Arc;

pub use alerts::AlertService;
pub use catalog::CatalogService;
pub use forecast::ForecastService;
pub use inventory::InventoryService;
pub use orders::OrderService;
pub use recommendations::RecommendationService;
pub use sales::SaleLifecycle;
pub use staffing::StaffingService;

use crate::config::CoreConfig;
use crate::hooks::{PostCommitHook, RegenerateAlertsHook};
use crate::store::CoreStore;

/// All services wired to one store and one post-commit hook.
pub struct Services<S> {
    pub catalog: CatalogService<S>,
    pub inventory: InventoryService<S>,
    pub sales: SaleLifecycle<S>,
    pub forecasts: ForecastService<S>,
    pub orders: OrderService<S>,
    pub staffing: StaffingService<S>,
    pub alerts: AlertService<S>,
    pub recommendations: RecommendationService<S>,
}

impl<S> Clone for Services<S> {
    fn clone(&self) -> Self {
        Self {
            catalog: self.catalog.clone(),
            inventory: self.inventory.clone(),
            sales: self.sales.clone(),
            forecasts: self.forecasts.clone(),
            orders: self.orders.clone(),
            staffing: self.staffing.clone(),
            alerts: self.alerts.clone(),
            recommendations: self.recommendations.clone(),
        }
    }
}

impl<S: CoreStore> Services<S> {
    /// Services that regenerate alerts synchronously after each commit.
    pub fn new(store: Arc<S>, config: CoreConfig) -> Self {
        let hook = Arc::new(RegenerateAlertsHook::new(AlertService::new(store.clone(), &config)));
        Self::with_hook(store, config, hook)
    }

    pub fn with_hook(store: Arc<S>, config: CoreConfig, hook: Arc<dyn PostCommitHook>) -> Self {
        Self {
            catalog: CatalogService::new(store.clone()),
            inventory: InventoryService::new(store.clone(), hook.clone()),
            sales: SaleLifecycle::new(store.clone(), hook.clone()),
            forecasts: ForecastService::new(store.clone(), &config),
            staffing: StaffingService::new(store.clone()),
            alerts: AlertService::new(store.clone(), &config),
            recommendations: RecommendationService::new(store.clone(), hook),
            orders: OrderService::new(store, config),
        }
    }
}

use axum::{
    Router,
    routing::{get, post, put},
};

use larder_infra::CoreStore;

pub mod alerts;
pub mod catalog;
pub mod forecasts;
pub mod inventory;
pub mod recommendations;
pub mod sales;
pub mod system;

/// Router for all organization-scoped endpoints.
pub fn router<S: CoreStore>() -> Router {
    Router::new()
        .route(
            "/restaurants",
            post(catalog::create_restaurant::<S>).get(catalog::list_restaurants::<S>),
        )
        .route("/settings", put(catalog::update_settings::<S>))
        .route("/ingredients", put(catalog::upsert_ingredient::<S>))
        .route("/products", put(catalog::upsert_product::<S>))
        .route("/restaurants/:id/staffing", post(catalog::plan_staffing::<S>))
        .route(
            "/restaurants/:id/inventory",
            post(inventory::create_record::<S>).get(inventory::list_records::<S>),
        )
        .route(
            "/restaurants/:id/inventory/:ingredient_id/adjust",
            post(inventory::adjust_stock::<S>),
        )
        .route(
            "/restaurants/:id/inventory/:ingredient_id/thresholds",
            put(inventory::set_thresholds::<S>),
        )
        .route("/restaurants/:id/sales", post(sales::record_sale::<S>))
        .route(
            "/restaurants/:id/sales/:sale_id",
            get(sales::get_sale::<S>)
                .patch(sales::update_sale::<S>)
                .delete(sales::delete_sale::<S>),
        )
        .route("/restaurants/:id/forecasts", post(forecasts::run_forecast::<S>))
        .route(
            "/restaurants/:id/forecasts/:product_id/:date",
            get(forecasts::get_forecast::<S>),
        )
        .route(
            "/restaurants/:id/recommendations",
            get(recommendations::list::<S>),
        )
        .route(
            "/restaurants/:id/recommendations/orders",
            post(recommendations::generate_orders::<S>),
        )
        .route(
            "/recommendations/orders",
            post(recommendations::generate_orders_everywhere::<S>),
        )
        .route(
            "/restaurants/:id/recommendations/staffing",
            post(recommendations::generate_staffing::<S>),
        )
        .route("/recommendations/:id/accept", post(recommendations::accept::<S>))
        .route("/recommendations/:id/dismiss", post(recommendations::dismiss::<S>))
        .route("/restaurants/:id/alerts", get(alerts::list::<S>))
        .route("/restaurants/:id/alerts/current", get(alerts::current::<S>))
        .route("/restaurants/:id/alerts/regenerate", post(alerts::regenerate::<S>))
        .route("/alerts/regenerate", post(alerts::regenerate_all::<S>))
        .route("/alerts/:id/resolve", post(alerts::resolve::<S>))
}

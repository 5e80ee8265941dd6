//! Catalog upserts for seeding and development.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::Response,
};
use uuid::Uuid;

use larder_core::RestaurantId;
use larder_infra::{CoreStore, Services};

use crate::app::{blocking, dto};
use crate::context::OrganizationContext;

pub async fn create_restaurant<S: CoreStore>(
    Extension(services): Extension<Arc<Services<S>>>,
    Extension(org): Extension<OrganizationContext>,
    Json(body): Json<dto::CreateRestaurantRequest>,
) -> Response {
    blocking(StatusCode::CREATED, move || {
        services.catalog.create_restaurant(org.organization_id(), body.name)
    })
    .await
}

pub async fn list_restaurants<S: CoreStore>(
    Extension(services): Extension<Arc<Services<S>>>,
    Extension(org): Extension<OrganizationContext>,
) -> Response {
    blocking(StatusCode::OK, move || services.catalog.restaurants(org.organization_id())).await
}

pub async fn update_settings<S: CoreStore>(
    Extension(services): Extension<Arc<Services<S>>>,
    Extension(org): Extension<OrganizationContext>,
    Json(body): Json<dto::SettingsRequest>,
) -> Response {
    blocking(StatusCode::OK, move || {
        services
            .catalog
            .set_default_shrink(org.organization_id(), body.default_shrink_pct)
            .map(|()| serde_json::json!({ "default_shrink_pct": body.default_shrink_pct }))
    })
    .await
}

pub async fn upsert_ingredient<S: CoreStore>(
    Extension(services): Extension<Arc<Services<S>>>,
    Extension(org): Extension<OrganizationContext>,
    Json(body): Json<dto::UpsertIngredientRequest>,
) -> Response {
    let organization_id = org.organization_id();
    blocking(StatusCode::OK, move || {
        services
            .catalog
            .upsert_ingredient(organization_id, body.into_ingredient(organization_id))
    })
    .await
}

pub async fn upsert_product<S: CoreStore>(
    Extension(services): Extension<Arc<Services<S>>>,
    Extension(org): Extension<OrganizationContext>,
    Json(body): Json<dto::UpsertProductRequest>,
) -> Response {
    let organization_id = org.organization_id();
    blocking(StatusCode::OK, move || {
        services
            .catalog
            .upsert_product(organization_id, body.into_product(organization_id))
    })
    .await
}

pub async fn plan_staffing<S: CoreStore>(
    Extension(services): Extension<Arc<Services<S>>>,
    Extension(org): Extension<OrganizationContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<dto::PlanStaffingRequest>,
) -> Response {
    let planned = body.into_planned(RestaurantId::from_uuid(id));
    blocking(StatusCode::OK, move || {
        services.catalog.plan_staffing(org.organization_id(), planned)
    })
    .await
}

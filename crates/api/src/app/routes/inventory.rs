use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::Response,
};
use uuid::Uuid;

use larder_core::{IngredientId, RestaurantId};
use larder_infra::{CoreStore, Services};

use crate::app::{blocking, dto};
use crate::context::OrganizationContext;

pub async fn create_record<S: CoreStore>(
    Extension(services): Extension<Arc<Services<S>>>,
    Extension(org): Extension<OrganizationContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<dto::CreateRecordRequest>,
) -> Response {
    blocking(StatusCode::CREATED, move || {
        services.inventory.create_record(
            org.organization_id(),
            RestaurantId::from_uuid(id),
            IngredientId::from_uuid(body.ingredient_id),
            body.current_stock,
            body.min_threshold,
            body.max_threshold,
        )
    })
    .await
}

pub async fn list_records<S: CoreStore>(
    Extension(services): Extension<Arc<Services<S>>>,
    Extension(org): Extension<OrganizationContext>,
    Path(id): Path<Uuid>,
) -> Response {
    blocking(StatusCode::OK, move || {
        services
            .inventory
            .records(org.organization_id(), RestaurantId::from_uuid(id))
    })
    .await
}

pub async fn adjust_stock<S: CoreStore>(
    Extension(services): Extension<Arc<Services<S>>>,
    Extension(org): Extension<OrganizationContext>,
    Path((id, ingredient_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<dto::AdjustStockRequest>,
) -> Response {
    blocking(StatusCode::OK, move || {
        services.inventory.adjust_stock(
            org.organization_id(),
            RestaurantId::from_uuid(id),
            IngredientId::from_uuid(ingredient_id),
            body.delta,
        )
    })
    .await
}

pub async fn set_thresholds<S: CoreStore>(
    Extension(services): Extension<Arc<Services<S>>>,
    Extension(org): Extension<OrganizationContext>,
    Path((id, ingredient_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<dto::ThresholdsRequest>,
) -> Response {
    blocking(StatusCode::OK, move || {
        services.inventory.set_thresholds(
            org.organization_id(),
            RestaurantId::from_uuid(id),
            IngredientId::from_uuid(ingredient_id),
            body.min_threshold,
            body.max_threshold,
        )
    })
    .await
}

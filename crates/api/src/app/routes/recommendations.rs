//! Order and staffing recommendations, and their accept/dismiss decisions.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::Response,
};
use uuid::Uuid;

use larder_core::{RecommendationId, RestaurantId};
use larder_infra::{CoreStore, Services};

use crate::app::{blocking, dto};
use crate::context::OrganizationContext;

pub async fn list<S: CoreStore>(
    Extension(services): Extension<Arc<Services<S>>>,
    Extension(org): Extension<OrganizationContext>,
    Path(id): Path<Uuid>,
) -> Response {
    blocking(StatusCode::OK, move || {
        services
            .recommendations
            .list(org.organization_id(), RestaurantId::from_uuid(id))
    })
    .await
}

/// Responds with the new recommendation, or `null` when nothing needs ordering.
pub async fn generate_orders<S: CoreStore>(
    Extension(services): Extension<Arc<Services<S>>>,
    Extension(org): Extension<OrganizationContext>,
    Path(id): Path<Uuid>,
    body: Option<Json<dto::OrderRequest>>,
) -> Response {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    blocking(StatusCode::OK, move || {
        services.orders.generate_order_recommendations(
            org.organization_id(),
            RestaurantId::from_uuid(id),
            body.shrink_pct,
            body.horizon_days,
        )
    })
    .await
}

pub async fn generate_orders_everywhere<S: CoreStore>(
    Extension(services): Extension<Arc<Services<S>>>,
    Extension(org): Extension<OrganizationContext>,
    body: Option<Json<dto::OrderRequest>>,
) -> Response {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    blocking(StatusCode::OK, move || {
        services.orders.generate_for_all_restaurants(
            org.organization_id(),
            body.shrink_pct,
            body.horizon_days,
        )
    })
    .await
}

pub async fn generate_staffing<S: CoreStore>(
    Extension(services): Extension<Arc<Services<S>>>,
    Extension(org): Extension<OrganizationContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<dto::StaffingRequest>,
) -> Response {
    blocking(StatusCode::OK, move || {
        services.staffing.generate_staffing_recommendations(
            org.organization_id(),
            RestaurantId::from_uuid(id),
            body.target_date,
        )
    })
    .await
}

pub async fn accept<S: CoreStore>(
    Extension(services): Extension<Arc<Services<S>>>,
    Extension(org): Extension<OrganizationContext>,
    Path(id): Path<Uuid>,
) -> Response {
    blocking(StatusCode::OK, move || {
        services
            .recommendations
            .accept(org.organization_id(), RecommendationId::from_uuid(id))
    })
    .await
}

pub async fn dismiss<S: CoreStore>(
    Extension(services): Extension<Arc<Services<S>>>,
    Extension(org): Extension<OrganizationContext>,
    Path(id): Path<Uuid>,
) -> Response {
    blocking(StatusCode::OK, move || {
        services
            .recommendations
            .dismiss(org.organization_id(), RecommendationId::from_uuid(id))
    })
    .await
}

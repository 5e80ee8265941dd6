use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::Response,
};
use uuid::Uuid;

use larder_core::{AlertId, RestaurantId};
use larder_infra::{CoreStore, Services};

use crate::app::{blocking, dto};
use crate::context::OrganizationContext;

pub async fn list<S: CoreStore>(
    Extension(services): Extension<Arc<Services<S>>>,
    Extension(org): Extension<OrganizationContext>,
    Path(id): Path<Uuid>,
    Query(query): Query<dto::AlertsQuery>,
) -> Response {
    blocking(StatusCode::OK, move || {
        services.alerts.alerts(
            org.organization_id(),
            RestaurantId::from_uuid(id),
            query.include_resolved,
        )
    })
    .await
}

/// Inventory alerts as they stand right now, without persisting anything.
pub async fn current<S: CoreStore>(
    Extension(services): Extension<Arc<Services<S>>>,
    Extension(org): Extension<OrganizationContext>,
    Path(id): Path<Uuid>,
) -> Response {
    blocking(StatusCode::OK, move || {
        services
            .alerts
            .current_alerts_state(org.organization_id(), RestaurantId::from_uuid(id))
    })
    .await
}

pub async fn regenerate<S: CoreStore>(
    Extension(services): Extension<Arc<Services<S>>>,
    Extension(org): Extension<OrganizationContext>,
    Path(id): Path<Uuid>,
) -> Response {
    blocking(StatusCode::OK, move || {
        services
            .alerts
            .regenerate_alerts(org.organization_id(), RestaurantId::from_uuid(id))
    })
    .await
}

pub async fn regenerate_all<S: CoreStore>(
    Extension(services): Extension<Arc<Services<S>>>,
    Extension(org): Extension<OrganizationContext>,
) -> Response {
    blocking(StatusCode::OK, move || services.alerts.regenerate_all(org.organization_id())).await
}

pub async fn resolve<S: CoreStore>(
    Extension(services): Extension<Arc<Services<S>>>,
    Extension(org): Extension<OrganizationContext>,
    Path(id): Path<Uuid>,
) -> Response {
    blocking(StatusCode::OK, move || {
        services
            .alerts
            .resolve_alert(org.organization_id(), AlertId::from_uuid(id))
    })
    .await
}

use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::Response,
};
use chrono::NaiveDate;
use uuid::Uuid;

use larder_core::{ProductId, RestaurantId};
use larder_infra::{CoreStore, ServiceError, Services};

use crate::app::{blocking, dto};
use crate::context::OrganizationContext;

pub async fn run_forecast<S: CoreStore>(
    Extension(services): Extension<Arc<Services<S>>>,
    Extension(org): Extension<OrganizationContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<dto::RunForecastRequest>,
) -> Response {
    blocking(StatusCode::OK, move || {
        services.forecasts.run_forecast(
            org.organization_id(),
            RestaurantId::from_uuid(id),
            ProductId::from_uuid(body.product_id),
            body.date,
            body.method,
        )
    })
    .await
}

pub async fn get_forecast<S: CoreStore>(
    Extension(services): Extension<Arc<Services<S>>>,
    Extension(org): Extension<OrganizationContext>,
    Path((id, product_id, date)): Path<(Uuid, Uuid, NaiveDate)>,
) -> Response {
    blocking(StatusCode::OK, move || {
        services
            .forecasts
            .get_forecast(
                org.organization_id(),
                RestaurantId::from_uuid(id),
                ProductId::from_uuid(product_id),
                date,
            )?
            .ok_or_else(|| ServiceError::not_found(format!("forecast {product_id} on {date}")))
    })
    .await
}

//! Sale lifecycle endpoints. Every write goes through the ledger.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::Response,
};
use uuid::Uuid;

use larder_core::{OrganizationId, RestaurantId, SaleId};
use larder_infra::{CoreStore, ServiceError, Services};
use larder_sales::{Sale, SalePatch};

use crate::app::{blocking, dto};
use crate::context::OrganizationContext;

pub async fn record_sale<S: CoreStore>(
    Extension(services): Extension<Arc<Services<S>>>,
    Extension(org): Extension<OrganizationContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<dto::RecordSaleRequest>,
) -> Response {
    let new_sale = body.into_new_sale(RestaurantId::from_uuid(id));
    blocking(StatusCode::CREATED, move || {
        services.sales.record_sale(org.organization_id(), new_sale)
    })
    .await
}

pub async fn get_sale<S: CoreStore>(
    Extension(services): Extension<Arc<Services<S>>>,
    Extension(org): Extension<OrganizationContext>,
    Path((id, sale_id)): Path<(Uuid, Uuid)>,
) -> Response {
    blocking(StatusCode::OK, move || {
        sale_at(&services, org.organization_id(), id, sale_id)
    })
    .await
}

pub async fn update_sale<S: CoreStore>(
    Extension(services): Extension<Arc<Services<S>>>,
    Extension(org): Extension<OrganizationContext>,
    Path((id, sale_id)): Path<(Uuid, Uuid)>,
    Json(patch): Json<SalePatch>,
) -> Response {
    blocking(StatusCode::OK, move || {
        let organization_id = org.organization_id();
        let sale = sale_at(&services, organization_id, id, sale_id)?;
        services.sales.update_sale(organization_id, sale.id, patch)
    })
    .await
}

pub async fn delete_sale<S: CoreStore>(
    Extension(services): Extension<Arc<Services<S>>>,
    Extension(org): Extension<OrganizationContext>,
    Path((id, sale_id)): Path<(Uuid, Uuid)>,
) -> Response {
    blocking(StatusCode::OK, move || {
        let organization_id = org.organization_id();
        let sale = sale_at(&services, organization_id, id, sale_id)?;
        services.sales.delete_sale(organization_id, sale.id)
    })
    .await
}

/// The sale, provided it belongs to the restaurant named in the path.
fn sale_at<S: CoreStore>(
    services: &Services<S>,
    organization_id: OrganizationId,
    restaurant: Uuid,
    sale_id: Uuid,
) -> Result<Sale, ServiceError> {
    let sale = services
        .sales
        .sale(organization_id, SaleId::from_uuid(sale_id))?;
    if sale.restaurant_id != RestaurantId::from_uuid(restaurant) {
        return Err(ServiceError::not_found(format!("sale {sale_id}")));
    }
    Ok(sale)
}

use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use larder_core::OrganizationId;

use crate::app::errors::json_error;
use crate::context::OrganizationContext;

pub const ORGANIZATION_HEADER: &str = "x-organization-id";

/// Attach an [`OrganizationContext`] or reject the request with 400.
pub async fn organization_middleware(mut req: Request, next: Next) -> Response {
    let organization_id = match extract_organization(req.headers()) {
        Ok(id) => id,
        Err(msg) => return json_error(StatusCode::BAD_REQUEST, "missing_organization", msg),
    };

    req.extensions_mut()
        .insert(OrganizationContext::new(organization_id));

    next.run(req).await
}

fn extract_organization(headers: &HeaderMap) -> Result<OrganizationId, &'static str> {
    let value = headers
        .get(ORGANIZATION_HEADER)
        .ok_or("X-Organization-Id header is required")?;

    let value = value
        .to_str()
        .map_err(|_| "X-Organization-Id must be ASCII")?;

    let uuid: Uuid = value
        .trim()
        .parse()
        .map_err(|_| "X-Organization-Id must be a UUID")?;

    Ok(OrganizationId::from_uuid(uuid))
}

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use larder_core::{OrganizationId, RestaurantId};

use crate::Event;

/// Envelope for an event, carrying the multi-tenant routing metadata.
///
/// Notes:
/// - **Multi-tenancy** is explicit: every envelope names its organization and
///   restaurant, there is no ambient tenant lookup.
/// - `event_type` is copied from the payload so consumers can route without
///   deserializing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    organization_id: OrganizationId,
    restaurant_id: RestaurantId,
    event_type: String,
    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        organization_id: OrganizationId,
        restaurant_id: RestaurantId,
        event_type: impl Into<String>,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            organization_id,
            restaurant_id,
            event_type: event_type.into(),
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }

    pub fn restaurant_id(&self) -> RestaurantId {
        self.restaurant_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}

impl<E: Event> EventEnvelope<E> {
    /// Wrap a typed event, assigning a fresh time-ordered event id.
    pub fn wrap(organization_id: OrganizationId, restaurant_id: RestaurantId, event: E) -> Self {
        let event_type = event.event_type();
        Self::new(Uuid::now_v7(), organization_id, restaurant_id, event_type, event)
    }
}

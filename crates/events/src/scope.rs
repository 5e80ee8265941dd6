use larder_core::{OrganizationId, RestaurantId};

use crate::EventEnvelope;

/// Helper trait for restaurant-scoped messages.
///
/// Workers use it to filter a shared subscription down to the organization they
/// were started for, and to route derived-view work to the right restaurant.
pub trait RestaurantScoped {
    fn organization_id(&self) -> OrganizationId;

    fn restaurant_id(&self) -> RestaurantId;
}

impl<E> RestaurantScoped for EventEnvelope<E> {
    fn organization_id(&self) -> OrganizationId {
        self.organization_id()
    }

    fn restaurant_id(&self) -> RestaurantId {
        self.restaurant_id()
    }
}

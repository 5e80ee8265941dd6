//! Recommendation lifecycle: pending → accepted | dismissed.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};

use larder_core::{OrganizationId, RecommendationId, RestaurantId};
use larder_planning::{Recommendation, RecommendationData, RecommendationStatus};
use larder_sales::{LedgerEvent, RecommendationAccepted};

use super::catalog::owned_restaurant;
use crate::error::ServiceError;
use crate::hooks::PostCommitHook;
use crate::ledger;
use crate::store::CoreStore;

pub struct RecommendationService<S> {
    store: Arc<S>,
    hook: Arc<dyn PostCommitHook>,
}

impl<S> Clone for RecommendationService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            hook: self.hook.clone(),
        }
    }
}

impl<S: CoreStore> RecommendationService<S> {
    pub fn new(store: Arc<S>, hook: Arc<dyn PostCommitHook>) -> Self {
        Self { store, hook }
    }

    fn owned(
        &self,
        organization_id: OrganizationId,
        id: RecommendationId,
    ) -> Result<Recommendation, ServiceError> {
        let recommendation = self
            .store
            .recommendation(id)?
            .ok_or_else(|| ServiceError::not_found(format!("recommendation {id}")))?;
        owned_restaurant(&*self.store, organization_id, recommendation.restaurant_id)
            .map_err(|_| ServiceError::not_found(format!("recommendation {id}")))?;
        Ok(recommendation)
    }

    /// Accept a pending recommendation.
    ///
    /// An ORDER recommendation restocks every line it lists in the same
    /// transaction as the status change; lines for ingredients no longer
    /// tracked are skipped.
    #[instrument(skip(self), err)]
    pub fn accept(
        &self,
        organization_id: OrganizationId,
        id: RecommendationId,
    ) -> Result<Recommendation, ServiceError> {
        self.owned(organization_id, id)?;

        let now = Utc::now();
        let (accepted, restocked) =
            self.store
                .transaction(|tx| -> Result<(Recommendation, usize), ServiceError> {
                    let mut recommendation = tx
                        .recommendation(id)?
                        .ok_or_else(|| ServiceError::not_found(format!("recommendation {id}")))?;
                    recommendation.accept()?;

                    let mut restocked = 0;
                    if let RecommendationData::Order(details) = &recommendation.data {
                        for line in &details.lines {
                            if ledger::apply_delta(
                                tx,
                                recommendation.restaurant_id,
                                line.ingredient_id,
                                line.to_order,
                                now,
                            )? {
                                restocked += 1;
                            }
                        }
                    }
                    tx.update_recommendation_status(id, RecommendationStatus::Accepted)?;
                    Ok((recommendation, restocked))
                })?;

        info!(
            recommendation_id = %id,
            kind = accepted.kind().as_str(),
            restocked,
            "recommendation accepted"
        );

        if matches!(accepted.data, RecommendationData::Order(_)) {
            let event = LedgerEvent::RecommendationAccepted(RecommendationAccepted {
                organization_id,
                restaurant_id: accepted.restaurant_id,
                recommendation_id: id,
                occurred_at: now,
            });
            if let Err(err) = self.hook.after_commit(&event) {
                warn!(
                    recommendation_id = %id,
                    error = %err,
                    "post-commit hook failed after order acceptance"
                );
            }
        }
        Ok(accepted)
    }

    #[instrument(skip(self), err)]
    pub fn dismiss(
        &self,
        organization_id: OrganizationId,
        id: RecommendationId,
    ) -> Result<Recommendation, ServiceError> {
        self.owned(organization_id, id)?;

        let dismissed = self
            .store
            .transaction(|tx| -> Result<Recommendation, ServiceError> {
                let mut recommendation = tx
                    .recommendation(id)?
                    .ok_or_else(|| ServiceError::not_found(format!("recommendation {id}")))?;
                recommendation.dismiss()?;
                tx.update_recommendation_status(id, RecommendationStatus::Dismissed)?;
                Ok(recommendation)
            })?;

        info!(recommendation_id = %id, kind = dismissed.kind().as_str(), "recommendation dismissed");
        Ok(dismissed)
    }

    /// Newest first.
    pub fn list(
        &self,
        organization_id: OrganizationId,
        restaurant_id: RestaurantId,
    ) -> Result<Vec<Recommendation>, ServiceError> {
        owned_restaurant(&*self.store, organization_id, restaurant_id)?;
        Ok(self.store.recommendations(restaurant_id)?)
    }
}

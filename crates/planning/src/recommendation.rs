use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use larder_core::{DomainError, DomainResult, RecommendationId, RestaurantId};

use crate::{OrderDetails, StaffingPlan};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationType {
    Order,
    Staffing,
}

impl RecommendationType {
    pub fn as_str(self) -> &'static str {
        match self {
            RecommendationType::Order => "ORDER",
            RecommendationType::Staffing => "STAFFING",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ORDER" => Some(RecommendationType::Order),
            "STAFFING" => Some(RecommendationType::Staffing),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            _ => None,
        }
    }
}

/// Recommendation status lifecycle: `pending` moves once, to `accepted` or `dismissed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationStatus {
    Pending,
    Accepted,
    Dismissed,
}

impl RecommendationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RecommendationStatus::Pending => "pending",
            RecommendationStatus::Accepted => "accepted",
            RecommendationStatus::Dismissed => "dismissed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RecommendationStatus::Pending),
            "accepted" => Some(RecommendationStatus::Accepted),
            "dismissed" => Some(RecommendationStatus::Dismissed),
            _ => None,
        }
    }
}

/// Typed recommendation payload, keyed by recommendation type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationData {
    Order(OrderDetails),
    Staffing(StaffingPlan),
}

impl RecommendationData {
    pub fn kind(&self) -> RecommendationType {
        match self {
            RecommendationData::Order(_) => RecommendationType::Order,
            RecommendationData::Staffing(_) => RecommendationType::Staffing,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: RecommendationId,
    pub restaurant_id: RestaurantId,
    #[serde(flatten)]
    pub data: RecommendationData,
    pub priority: Priority,
    pub status: RecommendationStatus,
    pub created_at: DateTime<Utc>,
}

impl Recommendation {
    /// New recommendations are always pending.
    pub fn pending(
        restaurant_id: RestaurantId,
        data: RecommendationData,
        priority: Priority,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: RecommendationId::new(),
            restaurant_id,
            data,
            priority,
            status: RecommendationStatus::Pending,
            created_at,
        }
    }

    pub fn kind(&self) -> RecommendationType {
        self.data.kind()
    }

    fn transition(&mut self, to: RecommendationStatus) -> DomainResult<()> {
        if self.status != RecommendationStatus::Pending {
            return Err(DomainError::conflict(format!(
                "recommendation {} is already {}",
                self.id,
                self.status.as_str()
            )));
        }
        self.status = to;
        Ok(())
    }

    pub fn accept(&mut self) -> DomainResult<()> {
        self.transition(RecommendationStatus::Accepted)
    }

    pub fn dismiss(&mut self) -> DomainResult<()> {
        self.transition(RecommendationStatus::Dismissed)
    }
}

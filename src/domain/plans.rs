use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::models::subscriptions::Plan;

/// Price and length of one plan, as shown to technicians.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanTerms {
    pub plan: Plan,
    pub duration_days: i64,
    pub price: f64,
    pub currency: String,
    /// Bookings a technician may accept during the period; `None` is unlimited.
    pub booking_quota: Option<i32>,
}

/// The plan catalogue. Trial terms and the currency come from configuration.
#[derive(Debug, Clone)]
pub struct PlanCatalogue {
    pub trial_days: i64,
    pub trial_booking_quota: i32,
    pub currency: String,
}

impl Default for PlanCatalogue {
    fn default() -> Self {
        Self {
            trial_days: 14,
            trial_booking_quota: 3,
            currency: "XOF".to_string(),
        }
    }
}

impl PlanCatalogue {
    pub fn terms(&self, plan: Plan) -> PlanTerms {
        let (duration_days, price, booking_quota) = match plan {
            Plan::Trial => (self.trial_days, 0.0, Some(self.trial_booking_quota)),
            Plan::Monthly => (30, 5_000.0, None),
            Plan::Quarterly => (90, 13_500.0, None),
            Plan::Yearly => (365, 48_000.0, None),
        };

        PlanTerms {
            plan,
            duration_days,
            price,
            currency: self.currency.clone(),
            booking_quota,
        }
    }

    pub fn all(&self) -> Vec<PlanTerms> {
        [Plan::Trial, Plan::Monthly, Plan::Quarterly, Plan::Yearly]
            .into_iter()
            .map(|plan| self.terms(plan))
            .collect()
    }

    pub fn period_end(&self, plan: Plan, starts_at: DateTime<Utc>) -> DateTime<Utc> {
        starts_at + Duration::days(self.terms(plan).duration_days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_trial_terms_follow_configuration() {
        let catalogue = PlanCatalogue {
            trial_days: 7,
            trial_booking_quota: 5,
            currency: "EUR".to_string(),
        };
        let trial = catalogue.terms(Plan::Trial);
        assert_eq!(trial.duration_days, 7);
        assert_eq!(trial.booking_quota, Some(5));
        assert_eq!(trial.price, 0.0);
        assert_eq!(trial.currency, "EUR");
    }

    #[test]
    fn test_paid_plans_are_unlimited() {
        let catalogue = PlanCatalogue::default();
        for terms in catalogue.all().into_iter().filter(|t| t.plan != Plan::Trial) {
            assert!(terms.booking_quota.is_none());
            assert!(terms.price > 0.0);
        }
    }

    #[test]
    fn test_period_end() {
        let catalogue = PlanCatalogue::default();
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            catalogue.period_end(Plan::Monthly, start),
            Utc.with_ymd_and_hms(2026, 1, 31, 0, 0, 0).unwrap()
        );
        assert_eq!(
            catalogue.period_end(Plan::Yearly, start),
            Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap()
        );
    }
}

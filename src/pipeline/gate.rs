//! Run gate: decide whether a run may start, and reserve its credits.
//!
//! Checks run in a fixed order and the first failure wins:
//!
//! 1. at least one document is selected
//! 2. an organization is available to bill
//! 3. `end_page >= start_page`
//! 4. `start_page >= 1`
//! 5. the ledger accepts a reservation for the estimated cost
//!
//! The range checks come before the reservation so a malformed range is
//! never billed. Nothing here exits the process; the caller receives a
//! [`GateOutcome`] and decides what a halt means.

use crate::config::PageRange;
use crate::error::{BillingError, HaltReason};
use crate::pipeline::cost::estimate_cost;
use crate::platform::{CreditHold, CreditLedger, Document};
use tracing::{info, warn};

/// Result of evaluating the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// All checks passed; the hold must be captured or released later.
    Proceed(CreditHold),
    /// The run must stop; the reason carries the user-facing message.
    Halt(HaltReason),
}

/// Check the page range alone.
pub fn check_range(range: &PageRange) -> Result<(), HaltReason> {
    if range.end_page < range.start_page {
        return Err(HaltReason::EndBeforeStart);
    }
    if range.start_page < 1 {
        return Err(HaltReason::StartBelowOne);
    }
    Ok(())
}

/// Evaluate every check and, if they pass, reserve the run's credits.
pub async fn evaluate(
    documents: &[Document],
    range: &PageRange,
    credits_per_page: u64,
    ledger: &dyn CreditLedger,
) -> GateOutcome {
    if documents.is_empty() {
        return GateOutcome::Halt(HaltReason::NoDocuments);
    }
    if ledger.organization().is_none() {
        return GateOutcome::Halt(HaltReason::NoOrganization);
    }
    if let Err(reason) = check_range(range) {
        return GateOutcome::Halt(reason);
    }

    let cost = estimate_cost(documents, range, credits_per_page);
    info!(
        "Estimated cost: {} credits for {} documents",
        cost,
        documents.len()
    );

    match ledger.reserve(cost).await {
        Ok(hold) => GateOutcome::Proceed(hold),
        Err(BillingError::InsufficientCredits(detail)) => {
            warn!("Credit reservation refused: {}", detail);
            GateOutcome::Halt(HaltReason::InsufficientCredits)
        }
        Err(BillingError::Api(detail)) => {
            warn!("Billing API error: {}", detail);
            GateOutcome::Halt(HaltReason::InsufficientCredits)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FakeLedger {
        org: Option<String>,
        refuse: Option<BillingError>,
        reserved: Mutex<Vec<u64>>,
    }

    impl FakeLedger {
        fn with_org() -> Self {
            Self {
                org: Some("org-1".into()),
                refuse: None,
                reserved: Mutex::new(Vec::new()),
            }
        }

        fn reserved(&self) -> Vec<u64> {
            self.reserved.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CreditLedger for FakeLedger {
        fn organization(&self) -> Option<String> {
            self.org.clone()
        }

        async fn reserve(&self, amount: u64) -> Result<CreditHold, BillingError> {
            if let Some(ref e) = self.refuse {
                return Err(e.clone());
            }
            self.reserved.lock().unwrap().push(amount);
            Ok(CreditHold {
                organization: "org-1".into(),
                amount,
            })
        }

        async fn capture(&self, _hold: CreditHold) -> Result<(), BillingError> {
            Ok(())
        }

        async fn release(&self, _hold: CreditHold) -> Result<(), BillingError> {
            Ok(())
        }
    }

    fn docs(page_counts: &[u32]) -> Vec<Document> {
        page_counts
            .iter()
            .enumerate()
            .map(|(i, &page_count)| Document {
                id: format!("doc-{i}"),
                page_count,
                slug: String::new(),
                asset_url: String::new(),
            })
            .collect()
    }

    #[tokio::test]
    async fn proceeds_and_reserves_estimated_cost() {
        let ledger = FakeLedger::with_org();
        let outcome = evaluate(&docs(&[5, 2]), &PageRange::new(1, 3), 7, &ledger).await;
        assert_eq!(
            outcome,
            GateOutcome::Proceed(CreditHold {
                organization: "org-1".into(),
                amount: 35,
            })
        );
        assert_eq!(ledger.reserved(), vec![35]);
    }

    #[tokio::test]
    async fn halts_without_documents() {
        let ledger = FakeLedger::with_org();
        let outcome = evaluate(&[], &PageRange::new(1, 1), 7, &ledger).await;
        assert_eq!(outcome, GateOutcome::Halt(HaltReason::NoDocuments));
        assert!(ledger.reserved().is_empty());
    }

    #[tokio::test]
    async fn halts_without_organization() {
        let ledger = FakeLedger {
            org: None,
            ..FakeLedger::with_org()
        };
        let outcome = evaluate(&docs(&[3]), &PageRange::new(1, 1), 7, &ledger).await;
        assert_eq!(outcome, GateOutcome::Halt(HaltReason::NoOrganization));
        assert!(ledger.reserved().is_empty());
    }

    #[tokio::test]
    async fn halts_on_insufficient_credits() {
        let ledger = FakeLedger {
            refuse: Some(BillingError::InsufficientCredits("0 left".into())),
            ..FakeLedger::with_org()
        };
        let outcome = evaluate(&docs(&[3]), &PageRange::new(1, 3), 7, &ledger).await;
        assert_eq!(outcome, GateOutcome::Halt(HaltReason::InsufficientCredits));
    }

    #[tokio::test]
    async fn halts_on_billing_api_error() {
        let ledger = FakeLedger {
            refuse: Some(BillingError::Api("HTTP 500".into())),
            ..FakeLedger::with_org()
        };
        let outcome = evaluate(&docs(&[3]), &PageRange::new(1, 3), 7, &ledger).await;
        assert_eq!(outcome, GateOutcome::Halt(HaltReason::InsufficientCredits));
    }

    #[tokio::test]
    async fn halts_on_end_before_start_without_billing() {
        let ledger = FakeLedger::with_org();
        let outcome = evaluate(&docs(&[9]), &PageRange::new(4, 2), 7, &ledger).await;
        assert_eq!(outcome, GateOutcome::Halt(HaltReason::EndBeforeStart));
        assert!(ledger.reserved().is_empty());
    }

    #[tokio::test]
    async fn halts_on_start_below_one_without_billing() {
        let ledger = FakeLedger::with_org();
        let outcome = evaluate(&docs(&[9]), &PageRange::new(0, 2), 7, &ledger).await;
        assert_eq!(outcome, GateOutcome::Halt(HaltReason::StartBelowOne));
        assert!(ledger.reserved().is_empty());
    }

    #[test]
    fn check_range_cases() {
        assert_eq!(check_range(&PageRange::new(1, 1)), Ok(()));
        assert_eq!(check_range(&PageRange::new(2, 9)), Ok(()));
        assert_eq!(check_range(&PageRange::new(3, 2)), Err(HaltReason::EndBeforeStart));
        assert_eq!(check_range(&PageRange::new(-1, 2)), Err(HaltReason::StartBelowOne));
        // Inverted and below one: the ordering check reports first.
        assert_eq!(check_range(&PageRange::new(0, -3)), Err(HaltReason::EndBeforeStart));
    }
}

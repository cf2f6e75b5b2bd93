//! Property-based tests for the transaction status state machine.

use proptest::prelude::*;

use crate::workflow::types::{TransactionStatus, WorkflowAction};

fn arb_status() -> impl Strategy<Value = TransactionStatus> {
    prop_oneof![
        Just(TransactionStatus::Draft),
        Just(TransactionStatus::PendingApproval),
        Just(TransactionStatus::Approved),
        Just(TransactionStatus::Posted),
        Just(TransactionStatus::PartiallyPaid),
        Just(TransactionStatus::Paid),
        Just(TransactionStatus::Voided),
    ]
}

fn arb_action() -> impl Strategy<Value = WorkflowAction> {
    prop_oneof![
        Just(WorkflowAction::Edit),
        Just(WorkflowAction::Submit),
        Just(WorkflowAction::Approve),
        Just(WorkflowAction::Reject),
        Just(WorkflowAction::Post),
        any::<bool>().prop_map(|settled| WorkflowAction::RecordPayment { settled }),
        Just(WorkflowAction::Void),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Terminal statuses refuse every action.
    #[test]
    fn prop_terminal_statuses_are_final(action in arb_action()) {
        prop_assert!(TransactionStatus::Paid.transition(action).is_err());
        prop_assert!(TransactionStatus::Voided.transition(action).is_err());
    }

    /// Only approved transactions reach the posted family from outside it.
    #[test]
    fn prop_posting_requires_approval(from in arb_status(), action in arb_action()) {
        if let Ok(to) = from.transition(action) {
            if to.is_posted() && !from.is_posted() {
                prop_assert_eq!(from, TransactionStatus::Approved);
                prop_assert_eq!(action, WorkflowAction::Post);
            }
        }
    }

    /// A posted transaction only leaves the posted family by being voided.
    #[test]
    fn prop_posted_leaves_only_by_void(from in arb_status(), action in arb_action()) {
        if from.is_posted() {
            if let Ok(to) = from.transition(action) {
                prop_assert!(to.is_posted() || to == TransactionStatus::Voided);
                if to == TransactionStatus::Voided {
                    prop_assert_eq!(action, WorkflowAction::Void);
                }
            }
        }
    }

    /// Any random walk through the machine keeps the refusal error faithful.
    #[test]
    fn prop_random_walk_is_consistent(actions in proptest::collection::vec(arb_action(), 0..20)) {
        let mut status = TransactionStatus::Draft;
        for action in actions {
            match status.transition(action) {
                Ok(next) => status = next,
                Err(err) => {
                    prop_assert_eq!(err.from, status);
                    prop_assert_eq!(err.action, action);
                }
            }
        }
    }
}

//! # Hashlock Attacks
//!
//! Attempts to unlock escrows without the committed preimage.

#[cfg(test)]
mod tests {
    use crate::integration::support::{standard_intent, Harness, T0};
    use escrow_engine::{
        CoordinationState, EscrowCoordinatorApi, EscrowError, SecureSecret, SwapIntentBuilder,
    };

    #[tokio::test]
    async fn test_wrong_secret_changes_nothing() {
        let h = Harness::new();
        let id = h
            .coordinator
            .initiate_swap(standard_intent(&[1u8; 32]))
            .await
            .unwrap();
        h.advance_until(id, CoordinationState::BothFunded, 10).await;
        let before = h.coordinator.get_swap_state(id).unwrap();

        let result = h
            .coordinator
            .reveal_secret(id, SecureSecret::new([2u8; 32]))
            .await;
        assert!(matches!(result, Err(EscrowError::HashlockMismatch)));

        let after = h.coordinator.get_swap_state(id).unwrap();
        assert_eq!(after.coordination_state, CoordinationState::BothFunded);
        assert!(after.secret.is_none());
        assert_eq!(after.events, before.events);
        assert_eq!(h.withdraw_calls(), 0);
    }

    #[tokio::test]
    async fn test_secret_from_other_swap_rejected() {
        let h = Harness::new();
        let a = h
            .coordinator
            .initiate_swap(standard_intent(&[1u8; 32]))
            .await
            .unwrap();
        let b = h
            .coordinator
            .initiate_swap(standard_intent(&[2u8; 32]))
            .await
            .unwrap();
        h.advance_until(a, CoordinationState::BothFunded, 10).await;
        h.advance_until(b, CoordinationState::BothFunded, 10).await;

        h.coordinator
            .reveal_secret(a, SecureSecret::new([1u8; 32]))
            .await
            .unwrap();
        assert!(matches!(
            h.coordinator
                .reveal_secret(b, SecureSecret::new([1u8; 32]))
                .await,
            Err(EscrowError::HashlockMismatch)
        ));
        assert_eq!(h.state(a), CoordinationState::Completed);
        assert_eq!(h.state(b), CoordinationState::BothFunded);
    }

    #[tokio::test]
    async fn test_secret_cannot_be_replaced_after_reveal() {
        let h = Harness::new();
        let secret = [3u8; 32];
        let id = h
            .coordinator
            .initiate_swap(standard_intent(&secret))
            .await
            .unwrap();
        h.advance_until(id, CoordinationState::BothFunded, 10).await;
        h.icp.fail_withdrawals(true);
        h.evm.fail_withdrawals(true);
        h.coordinator
            .reveal_secret(id, SecureSecret::new(secret))
            .await
            .unwrap();

        assert!(matches!(
            h.coordinator
                .reveal_secret(id, SecureSecret::new([4u8; 32]))
                .await,
            Err(EscrowError::HashlockMismatch)
        ));
        let record = h.coordinator.get_swap_state(id).unwrap();
        assert_eq!(record.secret, Some(SecureSecret::new(secret)));
    }

    #[tokio::test]
    async fn test_premature_reveal_rejected() {
        let h = Harness::new();
        let secret = [5u8; 32];
        let id = h
            .coordinator
            .initiate_swap(standard_intent(&secret))
            .await
            .unwrap();
        h.advance_until(id, CoordinationState::DestinationEscrowRequested, 10)
            .await;

        // Maker must not reveal before the resolver has locked funds.
        assert!(matches!(
            h.coordinator
                .reveal_secret(id, SecureSecret::new(secret))
                .await,
            Err(EscrowError::InvalidTransition { .. })
        ));
        assert!(h.coordinator.get_swap_state(id).unwrap().secret.is_none());
        assert_eq!(h.withdraw_calls(), 0);
    }

    #[tokio::test]
    async fn test_zero_hashlock_rejected() {
        let h = Harness::new();
        let intent = SwapIntentBuilder::new([0u8; 32], T0)
            .source_amount(100)
            .destination_amount(200)
            .build();
        assert!(matches!(
            h.coordinator.initiate_swap(intent).await,
            Err(EscrowError::InvalidIntent { .. })
        ));
    }

    #[tokio::test]
    async fn test_secret_never_printed() {
        let h = Harness::new();
        let secret = [0xABu8; 32];
        let id = h
            .coordinator
            .initiate_swap(standard_intent(&secret))
            .await
            .unwrap();
        h.advance_until(id, CoordinationState::BothFunded, 10).await;
        h.evm.fail_withdrawals(true);
        h.coordinator
            .reveal_secret(id, SecureSecret::new(secret))
            .await
            .unwrap();

        let debug = format!("{:?}", h.coordinator.get_swap_state(id).unwrap());
        assert!(!debug.contains(&"ab".repeat(32)));
        assert!(!debug.contains("171, 171, 171, 171"));
    }
}

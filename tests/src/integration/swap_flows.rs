//! # Swap Flow Tests
//!
//! Whole-lifecycle runs through the public coordinator API:
//!
//! 1. **Happy path**: Pending through BothFunded, reveal, both withdrawals, Completed
//! 2. **Destination never created**: retries exhausted, source refunded after its window
//! 3. **Source never created**: swap fails with no funds ever locked
//! 4. **Resolver deposits late**: swap waits in `DestinationEscrowRequested`

#[cfg(test)]
mod tests {
    use super::super::support::{standard_intent, Harness, T0};
    use escrow_engine::{
        CoordinationState, EscrowCoordinatorApi, EscrowError, EscrowSide, EscrowState,
        SecureSecret, SwapEventKind,
    };

    const SECRET: [u8; 32] = [0x42; 32];

    // =============================================================================
    // HAPPY PATH
    // =============================================================================

    #[tokio::test]
    async fn test_full_swap_completes() {
        let h = Harness::new();
        let id = h
            .coordinator
            .initiate_swap(standard_intent(&SECRET))
            .await
            .unwrap();

        h.advance_until(id, CoordinationState::BothFunded, 10).await;
        h.coordinator
            .reveal_secret(id, SecureSecret::new(SECRET))
            .await
            .unwrap();

        let record = h.coordinator.get_swap_state(id).unwrap();
        assert_eq!(record.coordination_state, CoordinationState::Completed);
        assert_eq!(record.source.state, EscrowState::Withdrawn);
        assert_eq!(record.destination.state, EscrowState::Withdrawn);
        assert_eq!(record.source.amount, 100);
        assert_eq!(record.destination.amount, 200);

        // One escrow per chain, both anchored to the source deployment.
        assert_eq!(h.icp.calls().create, 1);
        assert_eq!(h.evm.calls().create, 1);
        assert_eq!(record.source.deployed_at, Some(T0));
        assert_eq!(record.destination.deployed_at, Some(T0));
        assert_eq!(record.source.hashlock, record.destination.hashlock);
    }

    #[tokio::test]
    async fn test_full_swap_visits_every_state_in_order() {
        let h = Harness::new();
        let id = h
            .coordinator
            .initiate_swap(standard_intent(&SECRET))
            .await
            .unwrap();
        h.advance_until(id, CoordinationState::BothFunded, 10).await;
        h.coordinator
            .reveal_secret(id, SecureSecret::new(SECRET))
            .await
            .unwrap();

        let visited: Vec<CoordinationState> = h
            .coordinator
            .get_swap_state(id)
            .unwrap()
            .events
            .iter()
            .filter_map(|e| match e.kind {
                SwapEventKind::StateChanged { to, .. } => Some(to),
                _ => None,
            })
            .collect();
        assert_eq!(
            visited,
            vec![
                CoordinationState::SourceEscrowRequested,
                CoordinationState::SourceEscrowFunded,
                CoordinationState::DestinationEscrowRequested,
                CoordinationState::DestinationEscrowFunded,
                CoordinationState::BothFunded,
                CoordinationState::SecretRevealed,
                CoordinationState::Completed,
            ]
        );
    }

    #[tokio::test]
    async fn test_source_created_before_destination() {
        let h = Harness::new();
        let id = h
            .coordinator
            .initiate_swap(standard_intent(&SECRET))
            .await
            .unwrap();
        h.advance_until(id, CoordinationState::BothFunded, 10).await;

        let events = h.coordinator.get_swap_state(id).unwrap().events;
        let created_at = |side: EscrowSide| {
            events
                .iter()
                .position(|e| matches!(e.kind, SwapEventKind::EscrowCreated { side: s, .. } if s == side))
                .unwrap()
        };
        let source_funded = events
            .iter()
            .position(|e| {
                matches!(
                    e.kind,
                    SwapEventKind::EscrowFunded {
                        side: EscrowSide::Source,
                        ..
                    }
                )
            })
            .unwrap();
        assert!(created_at(EscrowSide::Source) < source_funded);
        assert!(source_funded < created_at(EscrowSide::Destination));
    }

    #[tokio::test]
    async fn test_repeated_reveal_is_idempotent() {
        let h = Harness::new();
        let id = h
            .coordinator
            .initiate_swap(standard_intent(&SECRET))
            .await
            .unwrap();
        h.advance_until(id, CoordinationState::BothFunded, 10).await;
        h.evm.fail_withdrawals(true);

        h.coordinator
            .reveal_secret(id, SecureSecret::new(SECRET))
            .await
            .unwrap();
        h.coordinator
            .reveal_secret(id, SecureSecret::new(SECRET))
            .await
            .unwrap();

        let record = h.coordinator.get_swap_state(id).unwrap();
        assert_eq!(record.coordination_state, CoordinationState::SecretRevealed);
        assert_eq!(
            record.count_events(|k| matches!(k, SwapEventKind::SecretRevealed)),
            1
        );

        h.evm.fail_withdrawals(false);
        h.advance_until(id, CoordinationState::Completed, 3).await;
    }

    // =============================================================================
    // CREATION FAILURES
    // =============================================================================

    #[tokio::test]
    async fn test_destination_never_created_refunds_source() {
        let h = Harness::new();
        h.evm.fail_next_creates(u32::MAX);
        let id = h
            .coordinator
            .initiate_swap(standard_intent(&SECRET))
            .await
            .unwrap();

        h.advance_until(id, CoordinationState::Recovering, 10).await;
        let record = h.coordinator.get_swap_state(id).unwrap();
        assert_eq!(record.source.state, EscrowState::Funded);
        assert_eq!(record.destination.state, EscrowState::Requested);
        assert_eq!(record.destination.create_attempts, 3);
        assert_eq!(h.evm.calls().create, 3);

        // Source window still open: nothing to cancel yet.
        assert_eq!(
            h.coordinator.advance(id).await.unwrap(),
            CoordinationState::Recovering
        );
        assert_eq!(h.icp.calls().cancel, 0);

        h.clock.advance(180);
        assert_eq!(
            h.coordinator.advance(id).await.unwrap(),
            CoordinationState::Refunded
        );
        let record = h.coordinator.get_swap_state(id).unwrap();
        assert_eq!(record.source.state, EscrowState::Cancelled);
        assert_eq!(record.destination.state, EscrowState::Requested);
        assert_eq!(h.evm.escrow_count(), 0);
    }

    #[tokio::test]
    async fn test_source_never_created_fails_safely() {
        let h = Harness::new();
        h.icp.fail_next_creates(u32::MAX);
        let id = h
            .coordinator
            .initiate_swap(standard_intent(&SECRET))
            .await
            .unwrap();

        h.advance_until(id, CoordinationState::Failed, 10).await;
        let record = h.coordinator.get_swap_state(id).unwrap();
        assert_eq!(record.source.state, EscrowState::Failed);
        assert_eq!(record.destination.state, EscrowState::Requested);
        assert!(record.source.deployed_at.is_none());
        assert_eq!(h.icp.escrow_count(), 0);
        assert_eq!(h.evm.calls().create, 0);

        assert!(matches!(
            h.coordinator.advance(id).await,
            Err(EscrowError::AlreadyTerminal(CoordinationState::Failed))
        ));
    }

    #[tokio::test]
    async fn test_transient_creation_failure_recovers() {
        let h = Harness::new();
        h.evm.fail_next_creates(2);
        let id = h
            .coordinator
            .initiate_swap(standard_intent(&SECRET))
            .await
            .unwrap();

        h.advance_until(id, CoordinationState::BothFunded, 10).await;
        let record = h.coordinator.get_swap_state(id).unwrap();
        assert_eq!(record.destination.create_attempts, 3);
        assert_eq!(
            record.count_events(|k| matches!(k, SwapEventKind::CreationFailed { .. })),
            2
        );
    }

    // =============================================================================
    // FUNDING
    // =============================================================================

    #[tokio::test]
    async fn test_swap_waits_for_resolver_deposit() {
        let h = Harness::new();
        h.evm.set_auto_fund(false);
        let id = h
            .coordinator
            .initiate_swap(standard_intent(&SECRET))
            .await
            .unwrap();

        h.advance_until(id, CoordinationState::DestinationEscrowRequested, 10)
            .await;
        for _ in 0..3 {
            assert_eq!(
                h.coordinator.advance(id).await.unwrap(),
                CoordinationState::DestinationEscrowRequested
            );
        }
        assert_eq!(h.evm.calls().create, 1);

        let handle = h.evm.handle_for(id, EscrowSide::Destination).unwrap();
        h.evm.deposit(&handle, 200).unwrap();
        assert_eq!(
            h.coordinator
                .verify_funding(id, EscrowSide::Destination)
                .await
                .unwrap(),
            EscrowState::Funded
        );
        h.advance_until(id, CoordinationState::BothFunded, 2).await;
    }
}

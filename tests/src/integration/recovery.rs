//! # Recovery Liveness Tests
//!
//! Swaps abandoned before the secret is revealed must reach `Refunded`
//! through the recovery scheduler alone, without anyone calling `cancel`.

#[cfg(test)]
mod tests {
    use super::super::support::{standard_intent, Harness, T0};
    use escrow_engine::{
        CoordinationState, EscrowCoordinatorApi, EscrowSide, EscrowState, HashlockManager,
        RecoveryScheduler, SecureSecret, SwapIntentBuilder, TimelockSchedule,
    };
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::watch;

    #[tokio::test]
    async fn test_abandoned_swap_refunded_by_scan() {
        let h = Harness::new();
        let id = h
            .coordinator
            .initiate_swap(standard_intent(&[1u8; 32]))
            .await
            .unwrap();
        h.advance_until(id, CoordinationState::BothFunded, 10).await;
        let scheduler = RecoveryScheduler::new(h.coordinator.clone());

        // Inside the withdrawal windows nothing is cancelled.
        h.clock.advance(179);
        let report = scheduler.scan_once().await;
        assert_eq!(report.cancellations, 0);
        assert_eq!(h.state(id), CoordinationState::BothFunded);

        h.clock.advance(1);
        let report = scheduler.scan_once().await;
        assert_eq!(report.scanned, 1);
        assert_eq!(report.cancellations, 1);

        let record = h.coordinator.get_swap_state(id).unwrap();
        assert_eq!(record.coordination_state, CoordinationState::Refunded);
        assert_eq!(record.source.state, EscrowState::Cancelled);
        assert_eq!(record.destination.state, EscrowState::Cancelled);
        assert_eq!(h.withdraw_calls(), 0);
    }

    #[tokio::test]
    async fn test_staggered_windows_need_two_scans() {
        let h = Harness::new();
        let intent = SwapIntentBuilder::new(HashlockManager::hash_secret(&[2u8; 32]), T0)
            .source_amount(100)
            .destination_amount(200)
            .source_schedule(TimelockSchedule::new(60, 120, 300, 400))
            .destination_schedule(TimelockSchedule::new(30, 60, 120, 200))
            .build();
        let id = h.coordinator.initiate_swap(intent).await.unwrap();
        h.advance_until(id, CoordinationState::BothFunded, 10).await;
        let scheduler = RecoveryScheduler::new(h.coordinator.clone());

        // Destination cancellable, source still in public withdrawal.
        h.clock.advance(120);
        let report = scheduler.scan_once().await;
        assert_eq!(report.cancellations, 1);
        let record = h.coordinator.get_swap_state(id).unwrap();
        assert_eq!(record.coordination_state, CoordinationState::Recovering);
        assert_eq!(record.destination.state, EscrowState::Cancelled);
        assert_eq!(record.source.state, EscrowState::Funded);
        assert_eq!(h.icp.calls().cancel, 0);

        // No progress until the source window opens.
        h.clock.advance(60);
        scheduler.scan_once().await;
        assert_eq!(h.state(id), CoordinationState::Recovering);

        h.clock.advance(120);
        let report = scheduler.scan_once().await;
        assert_eq!(report.advanced, 1);
        let record = h.coordinator.get_swap_state(id).unwrap();
        assert_eq!(record.coordination_state, CoordinationState::Refunded);
        assert_eq!(record.source.state, EscrowState::Cancelled);
    }

    #[tokio::test]
    async fn test_cancellation_retried_after_chain_outage() {
        let h = Harness::new();
        let id = h
            .coordinator
            .initiate_swap(standard_intent(&[3u8; 32]))
            .await
            .unwrap();
        h.advance_until(id, CoordinationState::BothFunded, 10).await;
        h.icp.fail_cancellations(true);
        h.clock.advance(180);

        let scheduler = RecoveryScheduler::new(h.coordinator.clone());
        scheduler.scan_once().await;
        let record = h.coordinator.get_swap_state(id).unwrap();
        assert_eq!(record.coordination_state, CoordinationState::Recovering);
        assert_eq!(record.source.state, EscrowState::Funded);
        assert_eq!(record.destination.state, EscrowState::Cancelled);
        assert_eq!(record.source.action_attempts, 1);

        h.icp.fail_cancellations(false);
        scheduler.scan_once().await;
        assert_eq!(h.state(id), CoordinationState::Refunded);
    }

    #[tokio::test]
    async fn test_scan_skips_finished_swaps() {
        let h = Harness::new();
        let secret = [4u8; 32];
        let id = h
            .coordinator
            .initiate_swap(standard_intent(&secret))
            .await
            .unwrap();
        h.advance_until(id, CoordinationState::BothFunded, 10).await;
        h.coordinator
            .reveal_secret(id, SecureSecret::new(secret))
            .await
            .unwrap();
        h.clock.advance(1_000);

        let report = RecoveryScheduler::new(h.coordinator.clone())
            .scan_once()
            .await;
        assert_eq!(report.scanned, 0);
        assert_eq!(h.state(id), CoordinationState::Completed);
        assert_eq!(h.icp.calls().cancel + h.evm.calls().cancel, 0);
    }

    #[tokio::test]
    async fn test_scan_finishes_pending_withdrawals() {
        let h = Harness::new();
        let secret = [5u8; 32];
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
        assert_eq!(h.state(id), CoordinationState::SecretRevealed);

        h.evm.fail_withdrawals(false);
        let report = RecoveryScheduler::new(h.coordinator.clone())
            .scan_once()
            .await;
        assert_eq!(report.cancellations, 0);
        assert_eq!(h.state(id), CoordinationState::Completed);
    }

    #[tokio::test]
    async fn test_many_expired_swaps_in_one_scan() {
        let h = Harness::new();
        let mut ids = Vec::new();
        for seed in 10..20u8 {
            let id = h
                .coordinator
                .initiate_swap(standard_intent(&[seed; 32]))
                .await
                .unwrap();
            h.advance_until(id, CoordinationState::BothFunded, 10).await;
            ids.push(id);
        }
        h.clock.advance(180);

        let report = RecoveryScheduler::new(h.coordinator.clone())
            .scan_once()
            .await;
        assert_eq!(report.scanned, 10);
        assert_eq!(report.cancellations, 10);
        assert_eq!(report.errors, 0);
        for id in ids {
            assert_eq!(h.state(id), CoordinationState::Refunded);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_scheduler_refunds_without_calls() {
        let h = Harness::new();
        let id = h
            .coordinator
            .initiate_swap(standard_intent(&[6u8; 32]))
            .await
            .unwrap();
        h.advance_until(id, CoordinationState::BothFunded, 10).await;

        let (tx, rx) = watch::channel(false);
        let handle = Arc::new(RecoveryScheduler::new(h.coordinator.clone())).spawn(rx);

        h.clock.advance(180);
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(h.state(id), CoordinationState::Refunded);

        tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_unfunded_destination_cancelled_with_source() {
        let h = Harness::new();
        h.evm.set_auto_fund(false);
        let id = h
            .coordinator
            .initiate_swap(standard_intent(&[7u8; 32]))
            .await
            .unwrap();
        h.advance_until(id, CoordinationState::DestinationEscrowRequested, 10)
            .await;
        h.clock.advance(180);

        RecoveryScheduler::new(h.coordinator.clone())
            .scan_once()
            .await;
        let record = h.coordinator.get_swap_state(id).unwrap();
        assert_eq!(record.coordination_state, CoordinationState::Refunded);
        assert_eq!(record.source.state, EscrowState::Cancelled);
        assert_ne!(record.destination.state, EscrowState::Funded);
        assert_eq!(h.withdraw_calls(), 0);
        let handle = h.evm.handle_for(id, EscrowSide::Destination).unwrap();
        assert!(h.evm.status_of(&handle).is_some());
    }
}

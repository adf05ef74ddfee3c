//! # Concurrency Tests
//!
//! Racing callers against one swap, and many swaps against one coordinator.
//! Each transition must land exactly once no matter how many callers observe
//! the same precondition.

#[cfg(test)]
mod tests {
    use super::super::support::{standard_intent, Harness};
    use escrow_engine::{
        CoordinationState, EscrowCoordinatorApi, EscrowSide, EscrowState, SecureSecret,
        SwapEventKind,
    };
    use futures::future::join_all;
    use std::time::Duration;

    const RACERS: usize = 16;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_verify_records_funding_once() {
        let h = Harness::new();
        h.icp.set_auto_fund(false);
        let id = h
            .coordinator
            .initiate_swap(standard_intent(&[1u8; 32]))
            .await
            .unwrap();
        h.coordinator
            .request_escrow(id, EscrowSide::Source)
            .await
            .unwrap();
        let handle = h.icp.handle_for(id, EscrowSide::Source).unwrap();
        h.icp.deposit(&handle, 100).unwrap();

        let tasks: Vec<_> = (0..RACERS)
            .map(|_| {
                let coordinator = h.coordinator.clone();
                tokio::spawn(async move { coordinator.verify_funding(id, EscrowSide::Source).await })
            })
            .collect();
        for result in join_all(tasks).await {
            result.unwrap().unwrap();
        }

        // Losers of the race may have seen the escrow still being queried.
        h.coordinator
            .verify_funding(id, EscrowSide::Source)
            .await
            .unwrap();

        let record = h.coordinator.get_swap_state(id).unwrap();
        assert_eq!(record.source.state, EscrowState::Funded);
        assert_eq!(record.coordination_state, CoordinationState::SourceEscrowFunded);
        assert_eq!(
            record.count_events(|k| matches!(k, SwapEventKind::EscrowFunded { .. })),
            1
        );
        assert_eq!(
            record.count_events(|k| matches!(
                k,
                SwapEventKind::StateChanged {
                    to: CoordinationState::SourceEscrowFunded,
                    ..
                }
            )),
            1
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_advance_reaches_both_funded_once() {
        let h = Harness::new();
        let id = h
            .coordinator
            .initiate_swap(standard_intent(&[2u8; 32]))
            .await
            .unwrap();
        h.advance_until(id, CoordinationState::DestinationEscrowFunded, 10)
            .await;

        let tasks: Vec<_> = (0..RACERS)
            .map(|_| {
                let coordinator = h.coordinator.clone();
                tokio::spawn(async move { coordinator.advance(id).await })
            })
            .collect();
        for result in join_all(tasks).await {
            assert_eq!(result.unwrap().unwrap(), CoordinationState::BothFunded);
        }

        let record = h.coordinator.get_swap_state(id).unwrap();
        assert_eq!(
            record.count_events(|k| matches!(
                k,
                SwapEventKind::StateChanged {
                    to: CoordinationState::BothFunded,
                    ..
                }
            )),
            1
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_create_one_escrow() {
        let h = Harness::new();
        let id = h
            .coordinator
            .initiate_swap(standard_intent(&[3u8; 32]))
            .await
            .unwrap();

        let tasks: Vec<_> = (0..RACERS)
            .map(|_| {
                let coordinator = h.coordinator.clone();
                tokio::spawn(async move { coordinator.request_escrow(id, EscrowSide::Source).await })
            })
            .collect();
        for result in join_all(tasks).await {
            result.unwrap().unwrap();
        }

        assert_eq!(h.icp.calls().create, 1);
        assert_eq!(h.icp.escrow_count(), 1);
        let record = h.coordinator.get_swap_state(id).unwrap();
        assert_eq!(record.source.create_attempts, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_reveal_and_cancel_race_has_one_winner() {
        let h = Harness::new();
        let secret = [4u8; 32];
        let id = h
            .coordinator
            .initiate_swap(standard_intent(&secret))
            .await
            .unwrap();
        h.advance_until(id, CoordinationState::BothFunded, 10).await;

        let reveal = {
            let coordinator = h.coordinator.clone();
            tokio::spawn(async move {
                coordinator
                    .reveal_secret(id, SecureSecret::new(secret))
                    .await
            })
        };
        let cancel = {
            let coordinator = h.coordinator.clone();
            tokio::spawn(async move { coordinator.cancel(id).await })
        };
        let revealed = reveal.await.unwrap().is_ok();
        let cancelled = cancel.await.unwrap().is_ok();
        assert!(revealed ^ cancelled);

        let record = h.coordinator.get_swap_state(id).unwrap();
        if revealed {
            assert_eq!(record.coordination_state, CoordinationState::Completed);
            assert_eq!(h.icp.calls().cancel + h.evm.calls().cancel, 0);
        } else {
            assert_eq!(record.coordination_state, CoordinationState::Recovering);
            assert!(record.secret.is_none());
            assert_eq!(h.withdraw_calls(), 0);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_swaps_complete_independently() {
        let h = Harness::new();
        let swaps: Vec<_> = (0..20u8)
            .map(|seed| {
                let coordinator = h.coordinator.clone();
                tokio::spawn(async move {
                    let secret = [seed.wrapping_add(100); 32];
                    let id = coordinator.initiate_swap(standard_intent(&secret)).await?;
                    for _ in 0..10 {
                        if coordinator.advance(id).await? == CoordinationState::BothFunded {
                            break;
                        }
                    }
                    coordinator.reveal_secret(id, SecureSecret::new(secret)).await?;
                    Ok::<_, escrow_engine::EscrowError>(id)
                })
            })
            .collect();

        let mut ids = Vec::new();
        for result in join_all(swaps).await {
            ids.push(result.unwrap().unwrap());
        }
        for id in ids {
            assert_eq!(h.state(id), CoordinationState::Completed);
        }
        assert_eq!(h.icp.escrow_count(), 20);
        assert_eq!(h.evm.escrow_count(), 20);
        assert_eq!(h.coordinator.registry().len(), 20);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_reveal_resumes_withdrawals() {
        let h = Harness::new();
        let secret = [6u8; 32];
        let id = h
            .coordinator
            .initiate_swap(standard_intent(&secret))
            .await
            .unwrap();
        h.advance_until(id, CoordinationState::BothFunded, 10).await;

        // Caller gives up while the destination withdrawal is still in flight.
        h.evm.set_latency(Some(Duration::from_millis(500)));
        let abandoned = tokio::time::timeout(
            Duration::from_millis(100),
            h.coordinator.reveal_secret(id, SecureSecret::new(secret)),
        )
        .await;
        assert!(abandoned.is_err());

        let record = h.coordinator.get_swap_state(id).unwrap();
        assert_eq!(record.coordination_state, CoordinationState::SecretRevealed);
        assert!(record.source.in_flight.is_none());
        assert!(record.destination.in_flight.is_none());

        h.evm.set_latency(None);
        assert_eq!(
            h.coordinator.advance(id).await.unwrap(),
            CoordinationState::Completed
        );
        let record = h.coordinator.get_swap_state(id).unwrap();
        assert_eq!(record.source.state, EscrowState::Withdrawn);
        assert_eq!(record.destination.state, EscrowState::Withdrawn);
    }
}

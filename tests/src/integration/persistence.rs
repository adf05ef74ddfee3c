//! # Persistence Tests
//!
//! A coordinator restarted over a `JsonFileSwapStore` picks every swap up
//! where the previous process left it, including a revealed secret.

#[cfg(test)]
mod tests {
    use super::super::support::{standard_intent, Harness};
    use escrow_engine::{
        CoordinationState, EscrowCoordinatorApi, EscrowState, JsonFileSwapStore, SecureSecret,
        SwapRegistry, SwapStore,
    };
    use std::sync::Arc;
    use tempfile::TempDir;

    fn reopen(dir: &TempDir) -> SwapRegistry {
        let store = Arc::new(JsonFileSwapStore::open(dir.path()).unwrap());
        SwapRegistry::recover(store).unwrap()
    }

    #[tokio::test]
    async fn test_restart_mid_swap_continues_to_completion() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(JsonFileSwapStore::open(dir.path()).unwrap());
        let h = Harness::new().persist_to(store);
        let secret = [1u8; 32];
        let id = h
            .coordinator
            .initiate_swap(standard_intent(&secret))
            .await
            .unwrap();
        h.advance_until(id, CoordinationState::SourceEscrowFunded, 10)
            .await;

        let restarted = h.restart(reopen(&dir));
        let record = restarted.get_swap_state(id).unwrap();
        assert_eq!(record.coordination_state, CoordinationState::SourceEscrowFunded);
        assert_eq!(record.source.state, EscrowState::Funded);
        assert!(record.source.chain_escrow_address.is_some());

        for _ in 0..10 {
            if restarted.advance(id).await.unwrap() == CoordinationState::BothFunded {
                break;
            }
        }
        restarted
            .reveal_secret(id, SecureSecret::new(secret))
            .await
            .unwrap();
        assert_eq!(
            restarted.get_swap_state(id).unwrap().coordination_state,
            CoordinationState::Completed
        );
        assert_eq!(h.icp.calls().create, 1);
        assert_eq!(h.evm.calls().create, 1);
    }

    #[tokio::test]
    async fn test_revealed_secret_survives_restart() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(JsonFileSwapStore::open(dir.path()).unwrap());
        let h = Harness::new().persist_to(store);
        let secret = [2u8; 32];
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
        let restarted = h.restart(reopen(&dir));
        let record = restarted.get_swap_state(id).unwrap();
        assert_eq!(record.secret, Some(SecureSecret::new(secret)));
        assert_eq!(record.source.state, EscrowState::Withdrawn);

        assert_eq!(
            restarted.advance(id).await.unwrap(),
            CoordinationState::Completed
        );
    }

    #[tokio::test]
    async fn test_restart_resumes_refund() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(JsonFileSwapStore::open(dir.path()).unwrap());
        let h = Harness::new().persist_to(store);
        let id = h
            .coordinator
            .initiate_swap(standard_intent(&[3u8; 32]))
            .await
            .unwrap();
        h.advance_until(id, CoordinationState::BothFunded, 10).await;
        assert_eq!(
            h.coordinator.cancel(id).await.unwrap(),
            CoordinationState::Recovering
        );

        let restarted = h.restart(reopen(&dir));
        h.clock.advance(180);
        assert_eq!(
            restarted.advance(id).await.unwrap(),
            CoordinationState::Refunded
        );
    }

    #[tokio::test]
    async fn test_store_holds_one_file_per_swap() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(JsonFileSwapStore::open(dir.path()).unwrap());
        let h = Harness::new().persist_to(store.clone());
        for seed in 0..5u8 {
            let id = h
                .coordinator
                .initiate_swap(standard_intent(&[seed + 10; 32]))
                .await
                .unwrap();
            h.advance_until(id, CoordinationState::BothFunded, 10).await;
        }

        let files = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
            .count();
        assert_eq!(files, 5);

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 5);
        assert!(loaded
            .iter()
            .all(|r| r.coordination_state == CoordinationState::BothFunded));
    }
}

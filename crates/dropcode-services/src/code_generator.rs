use dropcode_core::constants::{CODE_ALPHABET, CODE_LENGTH, MAX_CODE_ATTEMPTS};
use dropcode_core::{AppError, TransferCode};
use dropcode_storage::TransferStore;
use rand::Rng;

/// Draw a code from the thread-local CSPRNG.
pub fn random_code() -> Result<TransferCode, AppError> {
    let mut rng = rand::rng();
    let code: String = (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect();
    TransferCode::parse(&code)
}

/// Allocate a fresh code and create its (empty) session.
pub async fn generate_code(store: &TransferStore) -> Result<TransferCode, AppError> {
    generate_code_with(store, MAX_CODE_ATTEMPTS, random_code).await
}

/// Generate-and-reserve loop with an explicit attempt bound. Reserving is a
/// single store mutation, so two concurrent callers can never be handed the
/// same code.
pub async fn generate_code_with<F>(
    store: &TransferStore,
    max_attempts: usize,
    mut next_candidate: F,
) -> Result<TransferCode, AppError>
where
    F: FnMut() -> Result<TransferCode, AppError>,
{
    for attempt in 1..=max_attempts {
        let candidate = next_candidate()?;
        if store.reserve_session(&candidate).await? {
            if attempt > 1 {
                tracing::debug!(code = %candidate, attempt, "Code allocated after collisions");
            }
            return Ok(candidate);
        }
        tracing::debug!(code = %candidate, attempt, "Code already in use");
    }

    tracing::warn!(attempts = max_attempts, "Transfer code space exhausted");
    Err(AppError::CapacityExhausted {
        attempts: max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dropcode_storage::StoreConfig;
    use std::collections::HashSet;
    use tempfile::tempdir;

    #[test]
    fn test_random_codes_are_well_formed() {
        for _ in 0..200 {
            let code = random_code().unwrap();
            assert!(TransferCode::is_well_formed(code.as_str()));
        }
    }

    #[tokio::test]
    async fn test_generated_codes_unique_and_reserved() {
        let dir = tempdir().unwrap();
        let store = TransferStore::open(StoreConfig::new(dir.path())).await.unwrap();

        let mut seen = HashSet::new();
        for _ in 0..50 {
            let code = generate_code(&store).await.unwrap();
            assert!(seen.insert(code.clone()));
            assert!(store.contains(&code).await);
        }
    }

    #[tokio::test]
    async fn test_retries_past_existing_code() {
        let dir = tempdir().unwrap();
        let store = TransferStore::open(StoreConfig::new(dir.path())).await.unwrap();
        let taken = TransferCode::parse("AB3456").unwrap();
        store.create_session(&taken).await.unwrap();

        let mut script = vec!["AB3456", "AB3456", "CD7892"].into_iter();
        let code = generate_code_with(&store, 5, || TransferCode::parse(script.next().unwrap()))
            .await
            .unwrap();
        assert_eq!(code.as_str(), "CD7892");
    }

    #[tokio::test]
    async fn test_exhaustion_is_bounded() {
        let dir = tempdir().unwrap();
        let store = TransferStore::open(StoreConfig::new(dir.path())).await.unwrap();
        let taken = TransferCode::parse("AB3456").unwrap();
        store.create_session(&taken).await.unwrap();

        let mut calls = 0;
        let err = generate_code_with(&store, 4, || {
            calls += 1;
            Ok(taken.clone())
        })
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::CapacityExhausted { attempts: 4 }));
        assert_eq!(calls, 4);
        assert_eq!(store.session_count().await, 1);
    }
}

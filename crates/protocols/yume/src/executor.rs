//! Transaction execution
//!
//! Wraps a wallet signer and reduces its result envelope to a uniform
//! lifecycle: idle, pending, then success with a digest or failure with a
//! message. A resolved executor accepts the next submission, including one
//! whose previous submission was dropped before it finished.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use sui_ptb::ProgrammableTransaction;
use yume_core::TxError;

use crate::poller::Refetch;

/// Wallet-side signing and submission
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// Connected account, `None` when no wallet is connected
    fn active_address(&self) -> Option<String>;

    /// Sign, submit and return the wallet's raw result envelope
    async fn sign_and_execute(&self, tx: &ProgrammableTransaction) -> Result<Value, TxError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum TxState {
    #[default]
    Idle,
    Pending,
    Success {
        digest: String,
    },
    Failure {
        message: String,
    },
}

impl TxState {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn digest(&self) -> Option<&str> {
        match self {
            Self::Success { digest } => Some(digest),
            _ => None,
        }
    }
}

pub struct TransactionExecutor<S> {
    signer: S,
    state: Mutex<TxState>,
}

impl<S: TransactionSigner> TransactionExecutor<S> {
    pub fn new(signer: S) -> Self {
        Self {
            signer,
            state: Mutex::new(TxState::Idle),
        }
    }

    pub fn signer(&self) -> &S {
        &self.signer
    }

    pub fn state(&self) -> TxState {
        self.lock().clone()
    }

    /// Back to idle, unless a submission is in flight
    pub fn reset(&self) {
        let mut state = self.lock();
        if !state.is_pending() {
            *state = TxState::Idle;
        }
    }

    /// Submit a batch and return its digest.
    ///
    /// Every outcome is recorded in [`state`](Self::state); errors are also
    /// returned so callers can branch on them.
    pub async fn execute(&self, tx: &ProgrammableTransaction) -> Result<String, TxError> {
        let sender = self.signer.active_address().filter(|a| !a.trim().is_empty());
        {
            let mut state = self.lock();
            if state.is_pending() {
                return Err(TxError::AlreadyPending);
            }
            if sender.is_none() {
                *state = TxState::Failure {
                    message: "Wallet not connected".to_string(),
                };
                return Err(TxError::NotAuthorized);
            }
            *state = TxState::Pending;
        }
        let mut pending = PendingGuard::new(&self.state);

        tracing::info!(
            sender = sender.as_deref().unwrap_or_default(),
            commands = tx.commands.len(),
            "Submitting transaction"
        );

        let outcome = match self.signer.sign_and_execute(tx).await {
            Ok(envelope) => interpret_envelope(&envelope),
            Err(e) => Err(e),
        };
        pending.disarm();

        let mut state = self.lock();
        match outcome {
            Ok(digest) => {
                tracing::info!(digest = %digest, "Transaction executed");
                *state = TxState::Success {
                    digest: digest.clone(),
                };
                Ok(digest)
            }
            Err(e) => {
                let message = failure_message(&e);
                tracing::warn!(error = %message, "Transaction failed");
                *state = TxState::Failure {
                    message: message.clone(),
                };
                Err(match e {
                    TxError::SubmissionFailed { .. } => e,
                    other => TxError::SubmissionFailed {
                        message: other.to_string(),
                    },
                })
            }
        }
    }

    /// Execute, then ask each reader to refetch once `settle_delay` has passed.
    pub async fn execute_and_refresh(
        &self,
        tx: &ProgrammableTransaction,
        readers: &[&dyn Refetch],
        settle_delay: Duration,
    ) -> Result<String, TxError> {
        let digest = self.execute(tx).await?;
        for reader in readers {
            reader.refetch_after(settle_delay);
        }
        Ok(digest)
    }

    fn lock(&self) -> MutexGuard<'_, TxState> {
        lock_state(&self.state)
    }
}

fn lock_state(state: &Mutex<TxState>) -> MutexGuard<'_, TxState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Resolves a `Pending` state left behind when the submission future is
/// dropped mid-flight.
struct PendingGuard<'a> {
    state: &'a Mutex<TxState>,
    armed: bool,
}

impl<'a> PendingGuard<'a> {
    fn new(state: &'a Mutex<TxState>) -> Self {
        Self { state, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = lock_state(self.state);
        if state.is_pending() {
            tracing::warn!("Submission dropped before completion");
            *state = TxState::Failure {
                message: SUBMISSION_CANCELLED.to_string(),
            };
        }
    }
}

const SUBMISSION_CANCELLED: &str = "Submission cancelled";

fn failure_message(err: &TxError) -> String {
    match err {
        TxError::SubmissionFailed { message } => message.clone(),
        other => other.to_string(),
    }
}

/// Pull the digest out of the shapes wallets return, or the failure reason.
///
/// A result without any digest is still treated as executed.
fn interpret_envelope(envelope: &Value) -> Result<String, TxError> {
    if let Some(failed) = envelope.get("FailedTransaction") {
        let message = failed
            .get("status")
            .and_then(|s| s.get("error"))
            .or_else(|| failed.get("error"))
            .and_then(Value::as_str)
            .unwrap_or("Transaction failed on chain");
        return Err(TxError::SubmissionFailed {
            message: message.to_string(),
        });
    }

    let status = envelope.pointer("/effects/status");
    if let Some(status) = status {
        if status.get("status").and_then(Value::as_str) == Some("failure") {
            let message = status
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("Transaction failed on chain");
            return Err(TxError::SubmissionFailed {
                message: message.to_string(),
            });
        }
    }

    let digest = ["/digest", "/Transaction/digest", "/effects/transactionDigest"]
        .iter()
        .find_map(|path| envelope.pointer(path).and_then(Value::as_str))
        .filter(|d| !d.is_empty());

    match digest {
        Some(digest) => Ok(digest.to_string()),
        None => {
            tracing::warn!("Wallet result carried no digest");
            Ok(String::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FakeSigner {
        address: Option<String>,
        response: Result<Value, TxError>,
        calls: AtomicUsize,
    }

    impl FakeSigner {
        fn returning(response: Result<Value, TxError>) -> Self {
            Self {
                address: Some("0xb0b".to_string()),
                response,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TransactionSigner for FakeSigner {
        fn active_address(&self) -> Option<String> {
            self.address.clone()
        }

        async fn sign_and_execute(&self, _tx: &ProgrammableTransaction) -> Result<Value, TxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.response.clone()
        }
    }

    #[derive(Default)]
    struct RecordingReader {
        delays: Mutex<Vec<Duration>>,
    }

    impl Refetch for RecordingReader {
        fn refetch(&self) {}

        fn refetch_after(&self, delay: Duration) {
            self.delays.lock().unwrap().push(delay);
        }
    }

    fn tx() -> ProgrammableTransaction {
        ProgrammableTransaction::default()
    }

    #[tokio::test]
    async fn test_success_digest_shapes() {
        for envelope in [
            json!({ "digest": "9xQ" }),
            json!({ "Transaction": { "digest": "9xQ" } }),
            json!({ "effects": { "transactionDigest": "9xQ", "status": { "status": "success" } } }),
        ] {
            let executor = TransactionExecutor::new(FakeSigner::returning(Ok(envelope)));
            assert_eq!(executor.execute(&tx()).await.unwrap(), "9xQ");
            assert_eq!(executor.state().digest(), Some("9xQ"));
        }
    }

    #[tokio::test]
    async fn test_failed_effects_resolve_to_failure() {
        let envelope = json!({
            "digest": "9xQ",
            "effects": { "status": { "status": "failure", "error": "MoveAbort(market, 3)" } }
        });
        let executor = TransactionExecutor::new(FakeSigner::returning(Ok(envelope)));
        let err = executor.execute(&tx()).await.unwrap_err();
        assert!(matches!(err, TxError::SubmissionFailed { .. }));
        assert_eq!(
            executor.state(),
            TxState::Failure {
                message: "MoveAbort(market, 3)".to_string()
            }
        );

        let failed = json!({ "FailedTransaction": { "status": { "error": "InsufficientGas" } } });
        let executor = TransactionExecutor::new(FakeSigner::returning(Ok(failed)));
        assert!(executor.execute(&tx()).await.is_err());
        assert_eq!(
            executor.state(),
            TxState::Failure {
                message: "InsufficientGas".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_missing_digest_is_success() {
        let executor = TransactionExecutor::new(FakeSigner::returning(Ok(json!({}))));
        assert_eq!(executor.execute(&tx()).await.unwrap(), "");
        assert!(matches!(executor.state(), TxState::Success { .. }));
    }

    #[tokio::test]
    async fn test_no_wallet_is_not_authorized() {
        let mut signer = FakeSigner::returning(Ok(json!({ "digest": "9xQ" })));
        signer.address = None;
        let executor = TransactionExecutor::new(signer);

        let err = executor.execute(&tx()).await.unwrap_err();
        assert_eq!(err, TxError::NotAuthorized);
        assert_eq!(executor.signer().calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            executor.state(),
            TxState::Failure {
                message: "Wallet not connected".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_signer_error_recorded() {
        let executor = TransactionExecutor::new(FakeSigner::returning(Err(
            TxError::SubmissionFailed {
                message: "User rejected the request".to_string(),
            },
        )));
        let err = executor.execute(&tx()).await.unwrap_err();
        assert_eq!(
            err,
            TxError::SubmissionFailed {
                message: "User rejected the request".to_string()
            }
        );
        assert_eq!(
            executor.state(),
            TxState::Failure {
                message: "User rejected the request".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_resolved_state_is_resubmittable() {
        let executor = TransactionExecutor::new(FakeSigner::returning(Ok(json!({ "digest": "a" }))));
        executor.execute(&tx()).await.unwrap();
        executor.execute(&tx()).await.unwrap();
        assert_eq!(executor.signer().calls.load(Ordering::SeqCst), 2);

        executor.reset();
        assert_eq!(executor.state(), TxState::Idle);
    }

    struct BlockingSigner {
        release: tokio::sync::Notify,
    }

    #[async_trait]
    impl TransactionSigner for BlockingSigner {
        fn active_address(&self) -> Option<String> {
            Some("0xb0b".to_string())
        }

        async fn sign_and_execute(&self, _tx: &ProgrammableTransaction) -> Result<Value, TxError> {
            self.release.notified().await;
            Ok(json!({ "digest": "late" }))
        }
    }

    #[tokio::test]
    async fn test_second_submission_while_pending_rejected() {
        let executor = Arc::new(TransactionExecutor::new(BlockingSigner {
            release: tokio::sync::Notify::new(),
        }));

        let first = {
            let executor = executor.clone();
            tokio::spawn(async move { executor.execute(&tx()).await })
        };
        tokio::task::yield_now().await;
        assert_eq!(executor.state(), TxState::Pending);

        let err = executor.execute(&tx()).await.unwrap_err();
        assert_eq!(err, TxError::AlreadyPending);

        executor.signer().release.notify_one();
        assert_eq!(first.await.unwrap().unwrap(), "late");
        assert_eq!(executor.state().digest(), Some("late"));
    }

    #[tokio::test]
    async fn test_cancelled_submission_can_be_retried() {
        let executor = Arc::new(TransactionExecutor::new(BlockingSigner {
            release: tokio::sync::Notify::new(),
        }));

        let first = {
            let executor = executor.clone();
            tokio::spawn(async move { executor.execute(&tx()).await })
        };
        tokio::task::yield_now().await;
        assert_eq!(executor.state(), TxState::Pending);

        first.abort();
        assert!(first.await.unwrap_err().is_cancelled());
        assert_eq!(
            executor.state(),
            TxState::Failure {
                message: "Submission cancelled".to_string()
            }
        );

        executor.signer().release.notify_one();
        assert_eq!(executor.execute(&tx()).await.unwrap(), "late");
        assert_eq!(executor.state().digest(), Some("late"));
    }

    #[tokio::test]
    async fn test_execute_and_refresh_schedules_refetch() {
        let executor = TransactionExecutor::new(FakeSigner::returning(Ok(json!({ "digest": "d" }))));
        let book = RecordingReader::default();
        let positions = RecordingReader::default();

        executor
            .execute_and_refresh(&tx(), &[&book, &positions], Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(*book.delays.lock().unwrap(), vec![Duration::from_secs(2)]);
        assert_eq!(positions.delays.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_execution_skips_refresh() {
        let executor = TransactionExecutor::new(FakeSigner::returning(Ok(
            json!({ "effects": { "status": { "status": "failure" } } }),
        )));
        let book = RecordingReader::default();
        assert!(executor
            .execute_and_refresh(&tx(), &[&book], Duration::from_secs(2))
            .await
            .is_err());
        assert!(book.delays.lock().unwrap().is_empty());
    }
}

//! Backing-store handle abstraction.

use std::sync::Arc;

use async_trait::async_trait;

use ekv_common::{Command, EkvResult, Frame};
use ekv_engine::{KVEngine, MemoryEngine};

/// Anything that can run one RESP command and return its reply.
///
/// Implementations must be safe to share between concurrent tasks; callers
/// hold them behind an `Arc` and add no locking of their own.
#[async_trait]
pub trait Executor: Send + Sync + 'static {
    /// Sends `command` and returns the raw reply, error replies included.
    async fn execute(&self, command: Command) -> EkvResult<Frame>;

    /// Like `execute`, but turns `-ERR` replies into `EkvError::Store`.
    async fn call(&self, command: Command) -> EkvResult<Frame> {
        self.execute(command).await?.into_result()
    }
}

/// Runs commands directly against an in-process engine.
#[derive(Clone)]
pub struct LocalExecutor {
    engine: Arc<dyn KVEngine>,
}

impl LocalExecutor {
    /// Wraps an existing engine.
    pub fn new(engine: Arc<dyn KVEngine>) -> Self {
        LocalExecutor { engine }
    }

    /// Creates an executor over a fresh `MemoryEngine`.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryEngine::new()))
    }

    /// The engine commands run against.
    pub fn engine(&self) -> &Arc<dyn KVEngine> {
        &self.engine
    }
}

#[async_trait]
impl Executor for LocalExecutor {
    async fn execute(&self, command: Command) -> EkvResult<Frame> {
        tracing::trace!(command = %command.name(), "local execute");
        Ok(ekv_engine::execute(self.engine.as_ref(), command.args()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ekv_common::EkvError;

    #[tokio::test]
    async fn local_executor_round_trip() {
        let executor = LocalExecutor::in_memory();
        let reply = executor
            .call(Command::new("SET").arg("k").arg("v"))
            .await
            .unwrap();
        assert!(reply.is_ok());
        let reply = executor.call(Command::new("GET").arg("k")).await.unwrap();
        assert_eq!(reply, Frame::bulk("v"));
        assert!(executor.engine().exists(b"k").unwrap());
    }

    #[tokio::test]
    async fn call_surfaces_error_replies() {
        let executor = LocalExecutor::in_memory();
        let raw = executor.execute(Command::new("NOPE")).await.unwrap();
        assert!(matches!(raw, Frame::Error(_)));
        let err = executor.call(Command::new("NOPE")).await.unwrap_err();
        assert!(matches!(err, EkvError::Store(msg) if msg.contains("unknown command")));
    }
}

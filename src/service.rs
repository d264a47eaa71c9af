use crate::executor::CommandExecutor;
use crate::history::HistoryLedger;
use crate::resolver::Resolver;
use crate::storage::ExecutionResult;
use tracing::info;

/// Resolve, execute and record one command at a time.
pub struct CommandService {
    resolver: Resolver,
    executor: CommandExecutor,
    history: HistoryLedger,
}

impl CommandService {
    pub fn new(resolver: Resolver, executor: CommandExecutor, history: HistoryLedger) -> Self {
        Self {
            resolver,
            executor,
            history,
        }
    }

    #[cfg(test)]
    pub fn history(&self) -> &HistoryLedger {
        &self.history
    }

    /// `None` for blank input: nothing runs and nothing is recorded.
    pub async fn handle(&self, raw: &str) -> Option<ExecutionResult> {
        let action = self.resolver.resolve(raw)?;
        info!(command = %raw.trim(), ?action, "Executing command");
        let result = self.executor.execute(&action).await;
        self.history.record(result.clone()).await;
        info!(command = %result.command, success = result.success, "Command executed");
        Some(result)
    }
}

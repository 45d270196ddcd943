use crate::cli::actions::{federated, interactive, password, Action};
use anyhow::Result;

/// Execute the provided action.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::Password(args) => password::execute(args).await,
        Action::Federated(args) => federated::execute(args).await,
        Action::Interactive(args) => interactive::execute(args).await,
    }
}

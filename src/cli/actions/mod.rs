pub mod federated;
pub mod interactive;
pub mod password;
pub mod session;

mod run;

#[derive(Debug)]
pub enum Action {
    Password(password::Args),
    Federated(federated::Args),
    Interactive(interactive::Args),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}

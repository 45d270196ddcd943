use crate::cli::actions::session::{self, Session};
use crate::cli::globals::GlobalArgs;
use anyhow::Result;
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub globals: GlobalArgs,
    pub provider: String,
}

/// Handle `google`.
///
/// # Errors
/// Returns an error if the attempt does not end in a redirect.
pub async fn execute(args: Args) -> Result<()> {
    let session = Session::new(&args.globals)?;

    let submission = session
        .form
        .submit_federated(&session.client, &session.navigator, &args.provider)
        .await;
    let destination = session::outcome(submission)?;

    info!("signed in with {}, redirected to {destination}", args.provider);

    Ok(())
}

//! The form as a terminal menu: submit, switch mode, Google, quit.

use crate::cli::actions::session::Session;
use crate::cli::globals::GlobalArgs;
use crate::cli::prompt;
use crate::form::{Submission, ViewMode};
use crate::identity::firebase::GOOGLE_PROVIDER_ID;
use anyhow::Result;
use secrecy::SecretString;
use std::io::BufRead;
use tracing::info;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub globals: GlobalArgs,
}

/// Handle the default action.
///
/// # Errors
/// Returns an error if the session cannot be built or the terminal fails.
pub async fn execute(args: Args) -> Result<()> {
    let session = Session::new(&args.globals)?;
    let mut input = std::io::stdin().lock();

    if let Some(destination) = run(&session, &mut input, prompt::read_password).await? {
        info!("signed in, redirected to {destination}");
    }

    Ok(())
}

fn render(session: &Session) {
    let snapshot = session.form.snapshot();

    eprintln!();
    eprintln!("{}", snapshot.mode.heading());
    if let Some(error) = &snapshot.error {
        eprintln!("  ! {error}");
    }
    eprintln!("  [1] {}", snapshot.mode.action_label());
    eprintln!(
        "  [2] Switch to {}",
        match snapshot.mode.toggled() {
            ViewMode::Login => "Login",
            ViewMode::Signup => "Sign Up",
        }
    );
    if session.federated_enabled() {
        eprintln!("  [3] Continue with Google");
    }
    eprintln!("  [q] Quit");
}

/// Fill the fields, keeping earlier answers as defaults. `false` on end of input.
fn fill<R: BufRead>(
    session: &Session,
    input: &mut R,
    read_password: &impl Fn(&str) -> Result<SecretString>,
) -> Result<bool> {
    let form = &session.form;
    let snapshot = form.snapshot();

    if snapshot.mode == ViewMode::Signup {
        let Some(name) = prompt::read_line_or(input, "Name", &snapshot.name)? else {
            return Ok(false);
        };
        form.set_name(name);
    }

    let Some(email) = prompt::read_line_or(input, "Email", &snapshot.email)? else {
        return Ok(false);
    };
    form.set_email(email);
    form.set_password(read_password("Password")?);

    Ok(true)
}

/// Loop until a submission redirects (`Some`) or the user quits (`None`).
///
/// # Errors
/// Returns an error if reading input fails.
pub async fn run<R: BufRead>(
    session: &Session,
    input: &mut R,
    read_password: impl Fn(&str) -> Result<SecretString>,
) -> Result<Option<Url>> {
    loop {
        render(session);

        let Some(choice) = prompt::read_line(input, "Choice")? else {
            return Ok(None);
        };

        let submission = match choice.as_str() {
            "1" => {
                if !fill(session, input, &read_password)? {
                    return Ok(None);
                }
                session
                    .form
                    .submit_password(&session.client, &session.navigator)
                    .await
            }
            "2" => {
                session.form.toggle_mode();
                continue;
            }
            "3" if session.federated_enabled() => {
                session
                    .form
                    .submit_federated(&session.client, &session.navigator, GOOGLE_PROVIDER_ID)
                    .await
            }
            "q" | "quit" => return Ok(None),
            other => {
                eprintln!("Unknown choice: {other}");
                continue;
            }
        };

        // Failures stay on the form and are shown on the next render.
        if let Submission::Redirected(destination) = submission {
            return Ok(Some(destination));
        }
    }
}

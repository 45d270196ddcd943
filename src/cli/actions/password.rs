use crate::cli::actions::session::{self, Session};
use crate::cli::globals::GlobalArgs;
use crate::cli::prompt;
use crate::handshake::ViewMode;
use anyhow::Result;
use secrecy::SecretString;
use std::io::BufRead;
use tracing::info;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub globals: GlobalArgs,
    pub mode: ViewMode,
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Handle `login` and `signup`.
///
/// # Errors
/// Returns an error if the attempt does not end in a redirect.
pub async fn execute(args: Args) -> Result<()> {
    let session = Session::new(&args.globals)?;
    let mut input = std::io::stdin().lock();

    let destination = submit(
        &session,
        args.mode,
        args.name,
        args.email,
        &mut input,
        prompt::read_password,
    )
    .await?;

    info!("signed in, redirected to {destination}");

    Ok(())
}

/// Fill the form, prompting for what was not given, and submit it once.
///
/// # Errors
/// Returns an error if prompting fails or the attempt does not redirect.
pub async fn submit<R: BufRead>(
    session: &Session,
    mode: ViewMode,
    name: Option<String>,
    email: Option<String>,
    input: &mut R,
    read_password: impl Fn(&str) -> Result<SecretString>,
) -> Result<Url> {
    let form = &session.form;
    if form.mode() != mode {
        form.toggle_mode();
    }

    eprintln!("{}", mode.heading());

    if mode == ViewMode::Signup {
        let name = match name {
            Some(name) => name,
            None => prompt::read_line(input, "Name")?.unwrap_or_default(),
        };
        form.set_name(name);
    }

    let email = match email {
        Some(email) => email,
        None => prompt::read_line(input, "Email")?.unwrap_or_default(),
    };
    form.set_email(email);
    form.set_password(read_password("Password")?);

    session::outcome(form.submit_password(&session.client, &session.navigator).await)
}

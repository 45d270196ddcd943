use clap::{Arg, ArgMatches, Command};

pub const ARG_BACKEND_URL: &str = "backend-url";
pub const ARG_REDIRECT_URL: &str = "redirect-url";

#[derive(Debug, Clone)]
pub struct Options {
    pub backend_url: String,
    pub redirect_url: String,
}

impl Options {
    /// Parse backend arguments from matches.
    ///
    /// # Errors
    /// Returns an error if required arguments are missing.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let read_required = |id: &str| -> anyhow::Result<String> {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow::anyhow!("missing required argument: --{id}"))
        };

        Ok(Self {
            backend_url: read_required(ARG_BACKEND_URL)?,
            redirect_url: read_required(ARG_REDIRECT_URL)?,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_BACKEND_URL)
                .long(ARG_BACKEND_URL)
                .help("Backend base URL, the token is posted to <backend-url>/login")
                .env("TASKSTEER_BACKEND_URL")
                .required(true),
        )
        .arg(
            Arg::new(ARG_REDIRECT_URL)
                .long(ARG_REDIRECT_URL)
                .help("Where to send the user after a successful sign-in")
                .env("TASKSTEER_REDIRECT_URL")
                .required(true),
        )
}

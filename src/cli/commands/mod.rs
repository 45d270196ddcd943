pub mod backend;
pub mod firebase;
pub mod logging;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ArgAction, ColorChoice, Command,
};

pub const CMD_LOGIN: &str = "login";
pub const CMD_SIGNUP: &str = "signup";
pub const CMD_GOOGLE: &str = "google";

pub const ARG_EMAIL: &str = "email";
pub const ARG_NAME: &str = "name";
pub const ARG_NO_BROWSER: &str = "no-browser";

fn email_arg() -> Arg {
    Arg::new(ARG_EMAIL)
        .short('e')
        .long(ARG_EMAIL)
        .help("Account email, prompted for when omitted")
}

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("tasksteer-auth")
        .about("Sign in to TaskSteer")
        .long_about(
            "Sign in to TaskSteer with email/password or Google. Without a subcommand an interactive form is shown.",
        )
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_NO_BROWSER)
                .long(ARG_NO_BROWSER)
                .help("Print URLs instead of opening the system browser")
                .env("TASKSTEER_NO_BROWSER")
                .global(true)
                .action(ArgAction::SetTrue),
        )
        .subcommand(
            Command::new(CMD_LOGIN)
                .about("Sign in with email and password")
                .arg(email_arg()),
        )
        .subcommand(
            Command::new(CMD_SIGNUP)
                .about("Create an account with email and password")
                .arg(
                    Arg::new(ARG_NAME)
                        .short('n')
                        .long(ARG_NAME)
                        .help("Display name, prompted for when omitted"),
                )
                .arg(email_arg()),
        )
        .subcommand(Command::new(CMD_GOOGLE).about("Sign in with Google"));

    let command = backend::with_args(command);
    let command = firebase::with_args(command);
    logging::with_args(command)
}

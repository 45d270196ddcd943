use secrecy::SecretString;

/// Which form the user is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    Login,
    Signup,
}

impl ViewMode {
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::Login => Self::Signup,
            Self::Signup => Self::Login,
        }
    }

    /// Heading shown above the form.
    #[must_use]
    pub fn heading(self) -> &'static str {
        match self {
            Self::Login => "Welcome back! Ready to get started?",
            Self::Signup => "Create an account to begin.",
        }
    }

    /// Label of the submit button.
    #[must_use]
    pub fn action_label(self) -> &'static str {
        match self {
            Self::Login => "Login",
            Self::Signup => "Create Account",
        }
    }
}

/// One password submission. Built from the form, dropped once the handshake resolves.
#[derive(Debug, Clone)]
pub struct SessionIntent {
    pub mode: ViewMode,
    pub name: Option<String>,
    pub email: String,
    pub password: SecretString,
}

impl SessionIntent {
    pub fn login(email: impl Into<String>, password: SecretString) -> Self {
        Self {
            mode: ViewMode::Login,
            name: None,
            email: email.into(),
            password,
        }
    }

    pub fn signup(name: impl Into<String>, email: impl Into<String>, password: SecretString) -> Self {
        Self {
            mode: ViewMode::Signup,
            name: Some(name.into()),
            email: email.into(),
            password,
        }
    }
}

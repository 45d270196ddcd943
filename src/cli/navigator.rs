use crate::form::Navigator;
use tracing::warn;
use url::Url;

/// Announces the destination and hands it to the system browser.
#[derive(Debug, Clone, Copy)]
pub struct BrowserNavigator {
    open_browser: bool,
}

impl BrowserNavigator {
    #[must_use]
    pub fn new(open_browser: bool) -> Self {
        Self { open_browser }
    }
}

impl Navigator for BrowserNavigator {
    fn navigate(&self, destination: &Url) {
        println!("Signed in. Continue at {destination}");

        if self.open_browser {
            if let Err(err) = open::that(destination.as_str()) {
                warn!("Unable to open browser: {err}");
            }
        }
    }
}

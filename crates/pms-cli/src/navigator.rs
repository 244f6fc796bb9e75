use std::sync::Mutex;

use pms_core::auth::Navigator;

/// Tracks which "screen" the running command belongs to and tells the user
/// when their session was ended underneath them.
pub struct CliNavigator {
    path: Mutex<String>,
}

impl CliNavigator {
    pub fn new(screen: &str) -> Self {
        Self {
            path: Mutex::new(screen.to_string()),
        }
    }
}

impl Navigator for CliNavigator {
    fn current_path(&self) -> String {
        self.path
            .lock()
            .map(|path| path.clone())
            .unwrap_or_default()
    }

    fn hard_redirect(&self, path: &str) {
        if let Ok(mut current) = self.path.lock() {
            *current = path.to_string();
        }
        eprintln!("Your session has ended. Run `pms login` to sign in again.");
    }
}

use std::sync::Mutex;

/// Path of the authentication screen
pub const AUTH_PATH: &str = "/auth";

/// Where the user currently is, and how to force them somewhere else.
///
/// `hard_redirect` must discard every piece of in-memory state tied to the old
/// session, the way a full page load does.
pub trait Navigator: Send + Sync {
    fn current_path(&self) -> String;

    fn hard_redirect(&self, path: &str);
}

/// Navigator that only tracks the location, for embedding and tests.
#[derive(Debug)]
pub struct MemoryNavigator {
    state: Mutex<NavigationState>,
}

#[derive(Debug, Default)]
struct NavigationState {
    path: String,
    redirects: Vec<String>,
}

impl MemoryNavigator {
    pub fn new(path: &str) -> Self {
        Self {
            state: Mutex::new(NavigationState {
                path: path.to_string(),
                redirects: Vec::new(),
            }),
        }
    }

    /// Every hard redirect performed so far, oldest first
    pub fn redirects(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|state| state.redirects.clone())
            .unwrap_or_default()
    }
}

impl Navigator for MemoryNavigator {
    fn current_path(&self) -> String {
        self.state
            .lock()
            .map(|state| state.path.clone())
            .unwrap_or_default()
    }

    fn hard_redirect(&self, path: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.path = path.to_string();
            state.redirects.push(path.to_string());
        }
    }
}

//! Auth-gated action guard and the navigation boundary
//!
//! The guard is a decision point, not a security boundary: without an
//! authenticated actor it redirects to sign-in and never runs the wrapped
//! action. Authorization proper is the document store's job.

use crate::model::Actor;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Views the core can send the user to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    SignIn,
    SignUp,
    ForgotPassword,
    NewLinks,
    TopLinks,
    LinkDetail(String),
    CreateLink,
    Search,
}

impl Route {
    pub fn path(&self) -> String {
        match self {
            Route::SignIn => "/signin".to_string(),
            Route::SignUp => "/signup".to_string(),
            Route::ForgotPassword => "/forgot".to_string(),
            Route::NewLinks => "/new".to_string(),
            Route::TopLinks => "/top".to_string(),
            Route::LinkDetail(id) => format!("/links/{}", id),
            Route::CreateLink => "/create".to_string(),
            Route::Search => "/search".to_string(),
        }
    }

    /// Resolve a path; `/` lands on the newest links
    pub fn parse(path: &str) -> Option<Route> {
        let trimmed = path.trim_end_matches('/');
        match trimmed {
            "" | "/new" => Some(Route::NewLinks),
            "/signin" | "/login" => Some(Route::SignIn),
            "/signup" => Some(Route::SignUp),
            "/forgot" => Some(Route::ForgotPassword),
            "/top" => Some(Route::TopLinks),
            "/create" => Some(Route::CreateLink),
            "/search" => Some(Route::Search),
            _ => trimmed
                .strip_prefix("/links/")
                .or_else(|| trimmed.strip_prefix("/link/"))
                .filter(|id| !id.is_empty() && !id.contains('/'))
                .map(|id| Route::LinkDetail(id.to_string())),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// The only way the core changes the current view
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

/// Navigator that remembers every route it was sent to
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    history: Mutex<Vec<Route>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<Route> {
        self.history.lock().map(|h| h.clone()).unwrap_or_default()
    }

    pub fn current(&self) -> Option<Route> {
        self.history.lock().ok().and_then(|h| h.last().cloned())
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: Route) {
        debug!(route = %route, "Navigate");
        if let Ok(mut history) = self.history.lock() {
            history.push(route);
        }
    }
}

/// Outcome of a guarded action
#[derive(Debug, Clone, PartialEq)]
pub enum Guarded<T> {
    /// The action ran with the actor bound
    Completed(T),
    /// No actor; the user was sent to sign-in and nothing ran
    Redirected,
}

impl<T> Guarded<T> {
    pub fn is_redirected(&self) -> bool {
        matches!(self, Guarded::Redirected)
    }

    pub fn completed(self) -> Option<T> {
        match self {
            Guarded::Completed(value) => Some(value),
            Guarded::Redirected => None,
        }
    }
}

#[derive(Clone)]
pub struct ActionGuard {
    navigator: Arc<dyn Navigator>,
}

impl ActionGuard {
    pub fn new(navigator: Arc<dyn Navigator>) -> Self {
        Self { navigator }
    }

    /// Run `action` with the actor bound, or redirect to sign-in exactly once
    pub async fn run<T, F, Fut>(&self, action_name: &str, actor: Option<&Actor>, action: F) -> Guarded<T>
    where
        F: FnOnce(Actor) -> Fut,
        Fut: Future<Output = T>,
    {
        match actor {
            Some(actor) => {
                debug!(action = action_name, actor = %actor.id, "Guard passed");
                Guarded::Completed(action(actor.clone()).await)
            }
            None => {
                warn!(action = action_name, "No signed-in actor, redirecting");
                self.navigator.navigate(Route::SignIn);
                Guarded::Redirected
            }
        }
    }
}

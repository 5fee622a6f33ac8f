use std::sync::Arc;

use crate::mail::Mailer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub mailer: Arc<Mailer>,
}

impl AppState {
    pub fn new(mailer: Mailer) -> Self {
        Self {
            mailer: Arc::new(mailer),
        }
    }
}

// Hakot Operations Backend
// Collection-schedule assignment core plus the staff/collector HTTP surface
// of the municipal waste-collection platform.

use std::sync::Arc;

pub mod assignment;
pub mod auth;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;

use assignment::AssignmentService;
use config::Config;
use services::PostgrestService;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<PostgrestService>,
    pub assignments: Arc<AssignmentService>,
    pub config: Arc<Config>,
}

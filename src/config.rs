// Configuration - Environment variables

use std::env;

/// Application configuration loaded from environment
#[derive(Clone)]
pub struct Config {
    /// Server port
    pub port: u16,
    /// Supabase project URL (PostgREST base)
    pub supabase_url: Option<String>,
    /// Supabase service-role key for server-side queries
    pub supabase_service_key: Option<String>,
    /// Staff webhook invoked when a schedule goes unstaffed
    pub escalation_webhook_url: Option<String>,
    /// Log file path (append-only, next to stdout)
    pub log_file: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            supabase_url: env::var("SUPABASE_URL").ok(),
            supabase_service_key: env::var("SUPABASE_SERVICE_ROLE_KEY").ok(),
            escalation_webhook_url: env::var("ESCALATION_WEBHOOK_URL").ok(),
            log_file: env::var("LOG_FILE").unwrap_or_else(|_| "/tmp/hakot-backend.log".to_string()),
        }
    }

    /// Validate that required configuration is present
    pub fn validate(&self) -> Result<(), String> {
        if self.supabase_url.is_none() {
            tracing::warn!("SUPABASE_URL not set - schedule store calls will fail");
        }
        if self.supabase_service_key.is_none() {
            tracing::warn!("SUPABASE_SERVICE_ROLE_KEY not set - schedule store calls will fail");
        }
        if self.escalation_webhook_url.is_none() {
            tracing::warn!(
                "ESCALATION_WEBHOOK_URL not set - unstaffed escalations will only be logged"
            );
        }
        Ok(())
    }
}

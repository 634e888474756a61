// Services module

pub mod notifier;
pub mod postgrest;

pub use notifier::WebhookNotifier;
pub use postgrest::{PostgrestService, ScheduleListFilter};

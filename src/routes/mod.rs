// Routes module

pub mod assignments;
pub mod collectors;
pub mod health;
pub mod schedules;

pub use assignments::assignments_routes;
pub use collectors::collectors_routes;
pub use health::health_routes;
pub use schedules::schedules_routes;

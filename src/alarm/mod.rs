pub mod model;
pub mod payload;
pub mod recurrence;
pub mod scheduler;
pub mod store;
pub mod trigger;

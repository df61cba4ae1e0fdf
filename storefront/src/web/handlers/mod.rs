// storefront/src/web/handlers/mod.rs

pub mod health;
pub mod offer_handlers;
pub mod order_handlers;
pub mod task_handlers;

pub mod health;
pub mod quick_apply;
pub mod tracking;

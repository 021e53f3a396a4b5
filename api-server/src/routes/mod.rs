pub mod functions;
pub mod health;
pub mod proxy;
pub mod records;

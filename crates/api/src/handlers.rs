pub mod dispatcher;
pub mod health;
pub mod orders;

pub mod api_observability;
pub mod app_config;
pub mod collaborators;
pub mod database;
pub mod dispatcher;
pub mod logging;
pub mod remediation;
pub mod transit;

pub use api_observability::*;
pub use app_config::*;
pub use collaborators::*;
pub use database::*;
pub use dispatcher::*;
pub use logging::*;
pub use remediation::*;
pub use transit::*;

pub mod collaborators;
pub mod http;

pub use collaborators::*;
pub use http::{CollaboratorHttpClient, Envelope};

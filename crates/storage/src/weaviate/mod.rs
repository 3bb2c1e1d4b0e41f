// Private module - only the client and connector are exposed
mod client;
mod connector;
mod schema;

pub use client::WeaviateClient;
pub use connector::WeaviateConnector;

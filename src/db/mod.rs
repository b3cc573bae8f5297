pub mod connection_string;
pub mod connectors;
pub mod executor;
pub mod introspector;
pub mod registry;
pub mod schema;
pub mod translator;

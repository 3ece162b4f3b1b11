// Argos Core - Tool descriptors, registry and dispatch
//
// Plugins build `ToolDescriptor`s, the composition root registers them into a
// `ToolRegistry`, and the frozen `Dispatcher` routes calls from the transport
// to the matching handler.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod registry;
pub mod tool;

pub use config::{ArgosConfig, AwsSettings, ReportSettings, ServerSettings, ToolSettings};
pub use dispatch::Dispatcher;
pub use error::{ArgosError, ArgosResult};
pub use registry::{DuplicatePolicy, ToolRegistry};
pub use tool::{
    default_input_schema, get_arg, get_optional_arg, handler_fn, ToolArguments, ToolContext,
    ToolDefinition, ToolDescriptor, ToolHandler,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

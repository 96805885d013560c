#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Deployment-context handling
//!
//! Translates the nested context document into the six bounded
//! environmental metrics, provides the starter context template, and checks
//! an existing context for schema drift and staleness. The mapper never
//! fails on absent context: everything degrades to the unknown sentinel.

mod drift;
mod mapping;
mod template;

pub use drift::{check_context, DriftOptions, DriftReport};
pub use mapping::derive_env_overrides;
pub use template::{
    context_schema, context_template, init_context, CURRENT_CONTEXT_SCHEMA_VERSION,
};

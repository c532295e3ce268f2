//! Standard interceptors.
//!
//! Every kind here can be built in code or referenced by name from a stack
//! configuration through [`InterceptorCatalog::with_defaults`].
//!
//! | kind          | type                        |
//! |---------------|-----------------------------|
//! | `logging`     | [`LoggingInterceptor`]      |
//! | `tracing`     | [`TracingInterceptor`]      |
//! | `timer`       | [`TimerInterceptor`]        |
//! | `token`       | [`TokenInterceptor`]        |
//! | `dump`        | [`DumpInterceptor`]         |
//! | `retry`       | [`RetryInterceptor`]        |
//! | `conditional` | [`ConditionalInterceptor`]  |
//!
//! [`InterceptorCatalog::with_defaults`]: crate::pipeline::InterceptorCatalog::with_defaults

mod conditional;
mod dump;
mod logging;
mod retry;
mod span;
mod timer;
mod token;

pub use conditional::{ConditionalInterceptor, Predicate};
pub use dump::{DUMP_KEY, DumpInterceptor};
pub use logging::LoggingInterceptor;
pub use retry::RetryInterceptor;
pub use span::TracingInterceptor;
pub use timer::{ELAPSED_KEY, TimerInterceptor};
pub use token::{TOKEN_KEY, TokenInterceptor, TokenMode};

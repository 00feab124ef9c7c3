//! hywire engine
//!
//! The attribute-driven hypermedia engine: reads `hw-*` attributes off
//! a live document, binds triggers, issues requests through a pluggable
//! transport and patches responses back into the tree.
//!
//! # Example
//! ```rust,ignore
//! use hywire_engine::Engine;
//! use hywire_net::MockTransport;
//!
//! let mut engine = Engine::new(MockTransport::new());
//! engine.load_html(r#"<button hw-get="/hi" hw-target="#out">Go</button><div id="out"></div>"#);
//! engine.trigger("button", "click");
//! ```

mod attrs;
mod config;
mod engine;
mod env;
mod event;
mod extensions;
mod history;
mod request;
mod scheduler;
mod signals;
mod state;
mod swap;
mod triggers;

pub use config::{CacheMissPolicy, EngineConfig, ScrollBehavior};
pub use engine::Engine;
pub use env::{
    AcceptAllPrompter, Geometry, LocationApi, MemoryLocation, MemoryStorage, NullGeometry,
    Prompter, Rect, ScriptedPrompter, Storage, StubGeometry,
};
pub use event::DomEvent;
pub use extensions::{Extension, ExtensionRegistry, ResponseContext};
pub use history::{HistoryCache, HistoryEntry};
pub use request::RequestCause;
pub use signals::{names, Signal, SignalHub};

// Re-export sub-crates so hosts need only one dependency
pub use hywire_dom as dom;
pub use hywire_expr as expr;
pub use hywire_net as net;

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

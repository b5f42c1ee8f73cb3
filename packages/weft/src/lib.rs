//! The umbrella crate: re-exports the core renderer and the retained DOM
//! under one roof.
//!
//! ```rust
//! use weft::prelude::*;
//!
//! let mut runtime = Runtime::new();
//! let container = runtime.create_container();
//! let greeting = html(&["<p class=\"", "\">hello</p>"], vec!["fancy".into()]);
//! runtime.mount(greeting, container).unwrap();
//! ```

pub use weft_core::*;

pub mod dom {
    pub use weft_dom::*;
}

pub mod prelude {
    pub use weft_core::prelude::*;
    pub use weft_dom::{outer_html, Document, DomEvent, NodeId};
}

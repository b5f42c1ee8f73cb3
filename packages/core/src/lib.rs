//! # weft-core
//!
//! A concurrent, fine-grained template renderer. Components are functions
//! returning tagged-template values; each template is compiled once into a
//! cloneable plan plus an ordered list of holes, and after that only the
//! holes are reconciled. Updates flow through a cooperative, priority-laned
//! scheduler that commits DOM effects in mutation → layout → passive order.

pub(crate) mod backend;
pub(crate) mod binding;
pub(crate) mod component;
pub(crate) mod directive;
pub(crate) mod error;
pub(crate) mod hooks;
pub(crate) mod hydration;
pub(crate) mod list;
pub(crate) mod part;
pub(crate) mod runtime;
pub(crate) mod scheduler;
pub(crate) mod scope;
pub(crate) mod slot;
pub(crate) mod template;
pub(crate) mod value;

pub(crate) mod innerlude {
    pub use crate::backend::{Backend, CoreBackend};
    pub use crate::binding::{Binding, BindingRef};
    pub use crate::component::{component, Component, VComponent};
    pub use crate::directive::{
        resolve_directive, resolve_primitive, resolve_slot_kind, Directive, DirectiveValue,
    };
    pub use crate::error::{
        DirectiveError, HookError, HydrationError, RenderError, TemplateError,
    };
    pub use crate::hooks::{cleanup, Cleanup, CustomHook, Dispatcher, Hook, RenderContext};
    pub use crate::hydration::HydrationWalker;
    pub use crate::list::{keyed, reconcile_keyed, KeyedList, ListOperation};
    pub use crate::part::Part;
    pub use crate::runtime::{CommitContext, Root, Runtime, RuntimeShared, UpdateContext};
    pub use crate::scheduler::{
        CommitPhase, Coroutine, CoroutineId, Effect, Lanes, Priority, ScheduleOptions, UpdateFrame,
    };
    pub use crate::scope::{ErrorHandler, Scope};
    pub use crate::slot::{Slot, SlotKind};
    pub use crate::template::{
        dynamic_html, dynamic_math, dynamic_svg, html, math, svg, text, Hole, HoleKind, Template,
        TemplateArg, TemplateInstance, TemplateMode, TemplateValue,
    };
    pub use crate::value::{AnyValue, EventHandler, Value};
}

pub use innerlude::*;

pub mod prelude {
    pub use crate::component::{component, Component};
    pub use crate::error::RenderError;
    pub use crate::hooks::{cleanup, Cleanup, Dispatcher, RenderContext};
    pub use crate::list::keyed;
    pub use crate::runtime::{Root, Runtime};
    pub use crate::scheduler::{Lanes, Priority, ScheduleOptions};
    pub use crate::template::{dynamic_html, html, math, svg, text, TemplateArg};
    pub use crate::value::{EventHandler, Value};
    pub use weft_dom::{DomEvent, NodeId};
}

pub mod exports {
    //! Important dependencies used by the rest of the library.
    pub use futures_channel;
    pub use weft_dom;
}

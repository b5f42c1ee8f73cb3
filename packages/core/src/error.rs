use std::rc::Rc;
use thiserror::Error;
use weft_dom::NodeType;

/// A template literal could not be compiled. These are programmer errors and
/// surface synchronously at the call site that produced the template.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("invalid placeholder {placeholder:?}: placeholders must match [0-9a-z_-]+")]
    InvalidPlaceholder { placeholder: String },

    #[error("template hole in unsupported position: {detail}")]
    InvalidHolePosition { detail: String },

    #[error("template declared {holes} holes but received {binds} bindings")]
    BindCountMismatch { holes: usize, binds: usize },

    #[error("could not recover the source attribute name for hole {index} from {chunk:?}")]
    UnnamedAttributeHole { index: usize, chunk: String },
}

/// A directive was asked to bind to a part kind it does not support.
#[derive(Debug, Error)]
#[error("directive `{directive}` cannot bind to part {part}")]
pub struct DirectiveError {
    pub directive: &'static str,
    /// Debug dump of the offending part.
    pub part: String,
}

/// Pre-rendered markup did not match the template plan.
#[derive(Debug, Error)]
pub enum HydrationError {
    #[error("hydration mismatch: expected {expected:?} node, found {found}")]
    Mismatch { expected: NodeType, found: String },

    #[error("hydration ran out of nodes while looking for a {expected:?} node (last visited: {last})")]
    OutOfNodes { expected: NodeType, last: String },
}

/// Hook calls diverged from the positions recorded on the first render.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("Unexpected hook type at position {position}: expected {expected}, found {found}")]
    UnexpectedHookType {
        position: usize,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Unexpected hook type: hook called after finalize")]
    AfterFinalize,
}

/// Any failure raised while rendering or committing.
///
/// The first four variants are programmer errors and are never swallowed.
/// `User` wraps anything a render function, effect or listener returned; it
/// is recoverable if a scope in the chain installs an error handler.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Directive(#[from] DirectiveError),

    #[error(transparent)]
    Hydration(#[from] HydrationError),

    #[error(transparent)]
    Hook(#[from] HookError),

    #[error("component error: {0}")]
    User(Rc<dyn std::error::Error>),
}

impl RenderError {
    pub fn user(err: impl std::error::Error + 'static) -> Self {
        RenderError::User(Rc::new(err))
    }

    pub fn message(msg: impl Into<String>) -> Self {
        #[derive(Debug, Error)]
        #[error("{0}")]
        struct Message(String);
        RenderError::User(Rc::new(Message(msg.into())))
    }

    /// Programmer errors always escape; only user errors may be absorbed by
    /// an error-handler boundary.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RenderError::User(_))
    }
}

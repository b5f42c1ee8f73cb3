use crate::binding::element::ElementDirective;
use crate::binding::event::EventDirective;
use crate::binding::node::{NoValueDirective, NodeDirective, TextDirective};
use crate::binding::property::{AttributeDirective, LiveDirective, PropertyDirective};
use crate::binding::template::TemplateDirective;
use crate::binding::BindingRef;
use crate::component::ComponentDirective;
use crate::error::{DirectiveError, RenderError};
use crate::list::ListDirective;
use crate::part::Part;
use crate::runtime::UpdateContext;
use crate::slot::SlotKind;
use crate::value::Value;
use std::any::Any;
use std::rc::Rc;

/// An identity-bearing descriptor mapping `(value, part)` to a binding.
///
/// Primitive directives are stateless unit types compared by type identity;
/// user directives override [`Directive::equals`] when they carry state.
pub trait Directive {
    fn name(&self) -> &'static str;

    /// Construct a binding for `value` anchored at `part`. Fails with a
    /// [`DirectiveError`] when the part kind is unsupported.
    fn resolve_binding(
        &self,
        value: Value,
        part: Part,
        cx: &mut UpdateContext<'_>,
    ) -> Result<BindingRef, RenderError>;

    fn as_any(&self) -> &dyn Any;

    /// Identity comparison. The default is type identity, which is exact
    /// for the stateless primitives.
    fn equals(&self, other: &dyn Directive) -> bool {
        self.as_any().type_id() == other.as_any().type_id()
    }
}

/// The to-directive protocol: values that know how to produce their own
/// directive for a given part.
pub trait DirectiveValue {
    fn name(&self) -> &'static str;

    fn to_directive(&self, part: &Part) -> Result<Rc<dyn Directive>, RenderError>;

    /// Value identity used by [`Value::same`].
    fn value_equals(&self, other: &dyn DirectiveValue) -> bool;

    /// Downcast support so the resolved binding can reach its payload.
    fn as_any(&self) -> &dyn Any;
}

pub(crate) fn directive_error(directive: &'static str, part: &Part) -> RenderError {
    RenderError::Directive(DirectiveError {
        directive,
        part: format!("{part:?}"),
    })
}

/// Map a value/part pair onto a built-in directive. Values carrying the
/// to-directive protocol are resolved before this table is consulted.
pub fn resolve_primitive(value: &Value, part: &Part) -> Result<Rc<dyn Directive>, RenderError> {
    match part {
        Part::Attribute { .. } => Ok(Rc::new(AttributeDirective)),
        Part::Property { .. } => Ok(Rc::new(PropertyDirective)),
        Part::Live { .. } => Ok(Rc::new(LiveDirective)),
        Part::Event { .. } => Ok(Rc::new(EventDirective)),
        Part::Element { .. } => Ok(Rc::new(ElementDirective)),
        Part::Text { .. } => match value {
            Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Text(_) => {
                Ok(Rc::new(TextDirective))
            }
            // Structured content needs a child-node hole (`<!--${…}-->`),
            // not a text slice.
            other => Err(directive_error(other.type_name(), part)),
        },
        Part::ChildNode { .. } => match value {
            Value::Template(_) => Ok(Rc::new(TemplateDirective)),
            Value::Component(_) => Ok(Rc::new(ComponentDirective)),
            Value::Keyed(_) => Ok(Rc::new(ListDirective)),
            Value::Null => Ok(Rc::new(NoValueDirective)),
            Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Text(_) => {
                Ok(Rc::new(NodeDirective))
            }
            other => Err(directive_error(other.type_name(), part)),
        },
    }
}

/// Slot construction policy: primitive single-shape parts are strict, while
/// child-node content may change directive family between renders and gets
/// a flexible slot.
pub fn resolve_slot_kind(_value: &Value, part: &Part) -> SlotKind {
    match part {
        Part::ChildNode { .. } => SlotKind::Flexible,
        _ => SlotKind::Strict,
    }
}

/// Resolve a value to its directive and slot kind, consulting the
/// to-directive protocol first and the back-end's primitive table after.
pub fn resolve_directive(
    value: &Value,
    part: &Part,
    cx: &UpdateContext<'_>,
) -> Result<(Rc<dyn Directive>, SlotKind), RenderError> {
    let backend = cx.shared.backend().clone();
    if let Value::Directive(custom) = value {
        let directive = custom.to_directive(part)?;
        return Ok((directive, SlotKind::Flexible));
    }
    let directive = backend.resolve_primitive(value, part)?;
    let kind = backend.resolve_slot_kind(value, part);
    Ok((directive, kind))
}

use crate::component::VComponent;
use crate::directive::DirectiveValue;
use crate::list::KeyedList;
use crate::template::TemplateValue;
use std::any::{Any, TypeId};
use std::fmt;
use std::rc::Rc;
use weft_dom::{DomEvent, ListenerOptions, PropertyValue};

/// A dynamic value bound into a template hole.
///
/// This is the runtime's `unknown`: everything a render function can place
/// in a `${…}` position. Identity comparison goes through [`Value::same`],
/// which plays the `Object.is` role of the binding protocol.
#[derive(Clone)]
pub enum Value {
    /// The "no value" nothing; removes attributes and renders no content.
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(Rc<str>),
    /// An event listener plus its registration options.
    Handler(EventHandler),
    /// The result of a tagged template call.
    Template(Rc<TemplateValue>),
    /// A component mount.
    Component(Rc<VComponent>),
    /// A keyed sequence of child values.
    Keyed(Rc<KeyedList>),
    /// An element spread: a mapping of micro-binding names to values.
    Properties(Rc<Vec<(String, Value)>>),
    /// A value carrying the to-directive protocol.
    Directive(Rc<dyn DirectiveValue>),
    /// An opaque value compared by `TypeId` + `PartialEq`.
    Any(Rc<dyn AnyValue>),
}

impl Value {
    pub fn text(value: impl Into<Rc<str>>) -> Self {
        Value::Text(value.into())
    }

    pub fn any<T: PartialEq + 'static>(value: T) -> Self {
        Value::Any(Rc::new(value))
    }

    /// Identity comparison with `Object.is` semantics: `Float` compares by
    /// bit pattern (so NaN equals itself), reference values compare by
    /// pointer identity.
    pub fn same(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(x), Value::Bool(y)) => x == y,
            (Value::Int(x), Value::Int(y)) => x == y,
            (Value::Float(x), Value::Float(y)) => x.to_bits() == y.to_bits(),
            (Value::Text(x), Value::Text(y)) => x == y,
            (Value::Handler(x), Value::Handler(y)) => x.same(y),
            (Value::Template(x), Value::Template(y)) => {
                Rc::ptr_eq(x, y)
                    || (x.same_source(y)
                        && x.binds.len() == y.binds.len()
                        && x.binds.iter().zip(&y.binds).all(|(a, b)| Value::same(a, b)))
            }
            (Value::Component(x), Value::Component(y)) => Rc::ptr_eq(x, y),
            (Value::Keyed(x), Value::Keyed(y)) => Rc::ptr_eq(x, y),
            (Value::Properties(x), Value::Properties(y)) => {
                Rc::ptr_eq(x, y)
                    || (x.len() == y.len()
                        && x.iter()
                            .zip(y.iter())
                            .all(|((ka, va), (kb, vb))| ka == kb && Value::same(va, vb)))
            }
            (Value::Directive(x), Value::Directive(y)) => x.value_equals(y.as_ref()),
            (Value::Any(x), Value::Any(y)) => x.any_cmp(y.as_ref()),
            _ => false,
        }
    }

    /// Stringification used by attribute and text bindings.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Text(t) => t.to_string(),
            other => format!("{other:?}"),
        }
    }

    /// Conversion for property assignment.
    pub fn to_property_value(&self) -> PropertyValue {
        match self {
            Value::Null => PropertyValue::Null,
            Value::Bool(b) => PropertyValue::Bool(*b),
            Value::Int(i) => PropertyValue::Int(*i),
            Value::Float(f) => PropertyValue::Num(*f),
            other => PropertyValue::Str(other.to_display_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Handler(_) => "handler",
            Value::Template(_) => "template",
            Value::Component(_) => "component",
            Value::Keyed(_) => "keyed",
            Value::Properties(_) => "properties",
            Value::Directive(_) => "directive",
            Value::Any(_) => "any",
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Value::Int(i) => f.debug_tuple("Int").field(i).finish(),
            Value::Float(x) => f.debug_tuple("Float").field(x).finish(),
            Value::Text(t) => f.debug_tuple("Text").field(t).finish(),
            Value::Handler(_) => f.debug_tuple("Handler").finish(),
            Value::Template(t) => f.debug_tuple("Template").field(&t.mode).finish(),
            Value::Component(c) => f.debug_tuple("Component").field(&c.name()).finish(),
            Value::Keyed(k) => f.debug_tuple("Keyed").field(&k.len()).finish(),
            Value::Properties(p) => f.debug_tuple("Properties").field(&p.len()).finish(),
            Value::Directive(d) => f.debug_tuple("Directive").field(&d.name()).finish(),
            Value::Any(_) => f.debug_tuple("Any").finish(),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value.into())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<EventHandler> for Value {
    fn from(value: EventHandler) -> Self {
        Value::Handler(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(inner) => inner.into(),
            None => Value::Null,
        }
    }
}

/// An event listener value: the callback plus the options it must be
/// registered with.
#[derive(Clone)]
pub struct EventHandler {
    pub callback: Rc<dyn Fn(&DomEvent)>,
    pub options: ListenerOptions,
}

impl EventHandler {
    pub fn new(callback: impl Fn(&DomEvent) + 'static) -> Self {
        Self {
            callback: Rc::new(callback),
            options: ListenerOptions::default(),
        }
    }

    pub fn with_options(callback: impl Fn(&DomEvent) + 'static, options: ListenerOptions) -> Self {
        Self {
            callback: Rc::new(callback),
            options,
        }
    }

    /// Listener identity: same function object and same options.
    pub fn same(&self, other: &EventHandler) -> bool {
        Rc::ptr_eq(&self.callback, &other.callback) && self.options == other.options
    }
}

/// Identity comparison for opaque values.
pub trait AnyValue {
    fn any_cmp(&self, other: &dyn AnyValue) -> bool;
    fn our_typeid(&self) -> TypeId;
    fn as_any(&self) -> &dyn Any;
}

impl<T: PartialEq + 'static> AnyValue for T {
    fn any_cmp(&self, other: &dyn AnyValue) -> bool {
        if self.type_id() != other.our_typeid() {
            return false;
        }
        other
            .as_any()
            .downcast_ref::<T>()
            .map(|other| self == other)
            .unwrap_or(false)
    }

    fn our_typeid(&self) -> TypeId {
        self.type_id()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_is_reflexive_for_scalars() {
        for value in [
            Value::Null,
            Value::Bool(true),
            Value::Int(3),
            Value::Float(f64::NAN),
            Value::from("hi"),
        ] {
            assert!(Value::same(&value, &value.clone()));
        }
    }

    #[test]
    fn nan_equals_itself() {
        assert!(Value::same(&Value::Float(f64::NAN), &Value::Float(f64::NAN)));
    }

    #[test]
    fn handlers_compare_by_identity() {
        let a = EventHandler::new(|_| {});
        let b = EventHandler::new(|_| {});
        assert!(Value::same(&Value::Handler(a.clone()), &Value::Handler(a.clone())));
        assert!(!Value::same(&Value::Handler(a), &Value::Handler(b)));
    }

    #[test]
    fn any_values_compare_by_type_and_eq() {
        assert!(Value::same(&Value::any([1, 2]), &Value::any([1, 2])));
        assert!(!Value::same(&Value::any([1, 2]), &Value::any([1, 3])));
        assert!(!Value::same(&Value::any([1, 2]), &Value::any("12")));
    }
}

// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Child descriptions: the input the reconciler diffs against the tree.
//!
//! A [`Child`] is an immutable description of what a node's children should
//! look like. Descriptions are cheap to clone (every payload sits behind an
//! [`Rc`]), and props identity ([`Rc::ptr_eq`]) is what lets unchanged
//! subtrees bail out.

use alloc::rc::Rc;
use alloc::string::ToString;
use alloc::vec::Vec;
use core::fmt;

use serde_json::Value;

use crate::hooks::Hooks;

/// Stable identity of a child within its sibling list.
pub type Key = Rc<str>;

/// Behavior of a function component: a pure render over props and state
/// cells.
pub trait Component {
    /// Name used in diagnostics.
    fn name(&self) -> &str;

    /// Produces this component's children.
    ///
    /// State cells must be requested through `hooks` in the same order on
    /// every render.
    fn render(&self, props: &ElementProps, hooks: &mut Hooks<'_>) -> Child;
}

/// A [`Component`] built from a closure.
pub struct FnComponent<F> {
    name: &'static str,
    render: F,
}

impl<F> FnComponent<F>
where
    F: Fn(&ElementProps, &mut Hooks<'_>) -> Child + 'static,
{
    /// Wraps `render` as a shareable component.
    #[must_use]
    pub fn new(name: &'static str, render: F) -> Rc<dyn Component> {
        Rc::new(Self { name, render })
    }
}

impl<F> Component for FnComponent<F>
where
    F: Fn(&ElementProps, &mut Hooks<'_>) -> Child,
{
    fn name(&self) -> &str {
        self.name
    }

    fn render(&self, props: &ElementProps, hooks: &mut Hooks<'_>) -> Child {
        (self.render)(props, hooks)
    }
}

impl<F> fmt::Debug for FnComponent<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnComponent").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Behavior of a component with a single object state and a node-level
/// update queue.
pub trait StatefulComponent {
    /// Name used in diagnostics.
    fn name(&self) -> &str;

    /// State of a freshly mounted instance.
    fn initial_state(&self, props: &ElementProps) -> Value;

    /// Produces this component's children from props and the current state.
    fn render(&self, props: &ElementProps, state: &Value) -> Child;
}

/// The behavior an element instantiates.
#[derive(Clone)]
pub enum ElementType {
    /// A host element with a tag name, rendered by the host renderer.
    Host(Rc<str>),
    /// A function component.
    Function(Rc<dyn Component>),
    /// A component with object state.
    Stateful(Rc<dyn StatefulComponent>),
    /// A grouping with no host presence of its own.
    Fragment,
}

impl ElementType {
    /// Type identity: host tags compare by value, components by allocation.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Host(a), Self::Host(b)) => a == b,
            (Self::Function(a), Self::Function(b)) => same_rc(a, b),
            (Self::Stateful(a), Self::Stateful(b)) => same_rc(a, b),
            (Self::Fragment, Self::Fragment) => true,
            _ => false,
        }
    }

    /// Name for diagnostics.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Host(tag) => tag,
            Self::Function(c) => c.name(),
            Self::Stateful(c) => c.name(),
            Self::Fragment => "Fragment",
        }
    }
}

/// Compares the data pointers of two trait objects.
pub(crate) fn same_rc<T: ?Sized>(a: &Rc<T>, b: &Rc<T>) -> bool {
    core::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}

impl fmt::Debug for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host(tag) => write!(f, "Host({tag})"),
            Self::Function(c) => write!(f, "Function({})", c.name()),
            Self::Stateful(c) => write!(f, "Stateful({})", c.name()),
            Self::Fragment => f.write_str("Fragment"),
        }
    }
}

/// Configuration of an element: host attributes (or component props) and
/// nested children.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ElementProps {
    /// Attributes, usually a JSON object.
    pub attrs: Value,
    /// Children description.
    pub children: Child,
}

impl ElementProps {
    /// Looks up an attribute by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attrs.get(name)
    }
}

/// One element description.
#[derive(Clone)]
pub struct Element {
    /// What the element instantiates.
    pub ty: ElementType,
    /// Optional stable identity among siblings.
    pub key: Option<Key>,
    /// Props, shared so unchanged subtrees can be detected by identity.
    pub props: Rc<ElementProps>,
}

impl Element {
    /// Creates an element of the given type with empty props.
    #[must_use]
    pub fn new(ty: ElementType) -> Self {
        Self {
            ty,
            key: None,
            props: Rc::new(ElementProps {
                attrs: Value::Null,
                children: Child::Empty,
            }),
        }
    }

    /// A host element.
    #[must_use]
    pub fn host(tag: &str) -> Self {
        Self::new(ElementType::Host(tag.into()))
    }

    /// A function component element.
    #[must_use]
    pub fn function(component: &Rc<dyn Component>) -> Self {
        Self::new(ElementType::Function(Rc::clone(component)))
    }

    /// A stateful component element.
    #[must_use]
    pub fn stateful(component: &Rc<dyn StatefulComponent>) -> Self {
        Self::new(ElementType::Stateful(Rc::clone(component)))
    }

    /// A fragment wrapping `children`.
    #[must_use]
    pub fn fragment(children: impl Into<Child>) -> Self {
        Self::new(ElementType::Fragment).with_children(children)
    }

    /// Sets the key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Replaces the attributes.
    #[must_use]
    pub fn with_attrs(mut self, attrs: Value) -> Self {
        Rc::make_mut(&mut self.props).attrs = attrs;
        self
    }

    /// Replaces the children.
    #[must_use]
    pub fn with_children(mut self, children: impl Into<Child>) -> Self {
        Rc::make_mut(&mut self.props).children = children.into();
        self
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Element");
        s.field("ty", &self.ty);
        if let Some(key) = &self.key {
            s.field("key", key);
        }
        s.field("attrs", &self.props.attrs)
            .field("children", &self.props.children)
            .finish()
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.ty.same(&other.ty) && self.key == other.key && self.props == other.props
    }
}

/// A description of zero or more children.
#[derive(Clone, Default)]
pub enum Child {
    /// Nothing.
    #[default]
    Empty,
    /// A text node. The empty string renders nothing.
    Text(Rc<str>),
    /// A single element.
    Element(Element),
    /// An ordered list of children, diffed by key and position.
    List(Rc<[Child]>),
    /// A raw value. Strings and numbers render as text; null and booleans
    /// render nothing; arrays and objects are not valid children.
    Value(Value),
}

impl Child {
    /// A text child.
    #[must_use]
    pub fn text(text: &str) -> Self {
        Self::Text(text.into())
    }

    /// A list child.
    #[must_use]
    pub fn list(children: impl IntoIterator<Item = Self>) -> Self {
        Self::List(children.into_iter().collect::<Vec<_>>().into())
    }

    /// Identity comparison: elements match when type, key and props
    /// allocation are the same, lists when they share an allocation.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Empty, Self::Empty) => true,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Element(a), Self::Element(b)) => {
                a.ty.same(&b.ty) && a.key == b.key && Rc::ptr_eq(&a.props, &b.props)
            }
            (Self::List(a), Self::List(b)) => Rc::ptr_eq(a, b),
            (Self::Value(a), Self::Value(b)) => a == b,
            _ => false,
        }
    }

    /// Normalizes the description for diffing.
    pub(crate) fn view(&self) -> ChildView<'_> {
        match self {
            Self::Empty => ChildView::Empty,
            Self::Text(t) if t.is_empty() => ChildView::Empty,
            Self::Text(t) => ChildView::Text(Rc::clone(t)),
            Self::Element(e) => ChildView::Element(e),
            Self::List(list) => ChildView::List(list),
            Self::Value(v) => match v {
                Value::Null | Value::Bool(_) => ChildView::Empty,
                Value::String(s) if s.is_empty() => ChildView::Empty,
                Value::String(s) => ChildView::Text(s.as_str().into()),
                Value::Number(n) => ChildView::Text(n.to_string().into()),
                Value::Array(_) => ChildView::Invalid("array value"),
                Value::Object(_) => ChildView::Invalid("object value"),
            },
        }
    }
}

impl fmt::Debug for Child {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Text(t) => write!(f, "Text({t:?})"),
            Self::Element(e) => e.fmt(f),
            Self::List(list) => f.debug_list().entries(list.iter()).finish(),
            Self::Value(v) => write!(f, "Value({v})"),
        }
    }
}

impl PartialEq for Child {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Empty, Self::Empty) => true,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Element(a), Self::Element(b)) => a == b,
            (Self::List(a), Self::List(b)) => Rc::ptr_eq(a, b) || a == b,
            (Self::Value(a), Self::Value(b)) => a == b,
            _ => false,
        }
    }
}

impl From<Element> for Child {
    fn from(e: Element) -> Self {
        Self::Element(e)
    }
}

impl From<&str> for Child {
    fn from(t: &str) -> Self {
        Self::text(t)
    }
}

impl From<Vec<Self>> for Child {
    fn from(list: Vec<Self>) -> Self {
        Self::List(list.into())
    }
}

impl From<Vec<Element>> for Child {
    fn from(list: Vec<Element>) -> Self {
        Self::list(list.into_iter().map(Self::Element))
    }
}

/// A normalized view of a [`Child`].
#[derive(Debug)]
pub(crate) enum ChildView<'a> {
    Empty,
    Text(Rc<str>),
    Element(&'a Element),
    List(&'a Rc<[Child]>),
    Invalid(&'static str),
}

/// Props stored on a work node.
#[derive(Clone, Default)]
pub enum Props {
    /// No props (roots).
    #[default]
    None,
    /// Element props.
    Element(Rc<ElementProps>),
    /// Text content.
    Text(Rc<str>),
    /// Children of an unkeyed list fragment.
    List(Rc<[Child]>),
}

impl Props {
    /// Identity comparison.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Element(a), Self::Element(b)) => Rc::ptr_eq(a, b),
            (Self::Text(a), Self::Text(b)) => Rc::ptr_eq(a, b) || a == b,
            (Self::List(a), Self::List(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Element props, if any.
    #[must_use]
    pub fn element(&self) -> Option<&Rc<ElementProps>> {
        match self {
            Self::Element(p) => Some(p),
            _ => None,
        }
    }

    /// Address of the props allocation, for snapshots.
    #[must_use]
    pub fn identity(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Element(p) => Rc::as_ptr(p).addr(),
            Self::Text(t) => Rc::as_ptr(t).cast::<u8>().addr(),
            Self::List(l) => Rc::as_ptr(l).cast::<Child>().addr(),
        }
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Element(p) => write!(f, "Element({})", p.attrs),
            Self::Text(t) => write!(f, "Text({t:?})"),
            Self::List(l) => write!(f, "List(len={})", l.len()),
        }
    }
}

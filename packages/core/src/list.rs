use crate::binding::{Binding, BindingRef};
use crate::directive::{directive_error, Directive};
use crate::error::RenderError;
use crate::part::Part;
use crate::runtime::{CommitContext, UpdateContext};
use crate::scheduler::{CommitPhase, Effect};
use crate::slot::Slot;
use crate::value::Value;
use rustc_hash::FxHashMap;
use smallvec::{smallvec, SmallVec};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use weft_dom::{Namespace, NodeId, NodeType};

/// A keyed sequence of child values.
pub struct KeyedList {
    keys: Vec<Value>,
    values: Vec<Value>,
}

impl KeyedList {
    pub fn new(keys: Vec<Value>, values: Vec<Value>) -> Self {
        assert_eq!(
            keys.len(),
            values.len(),
            "keyed lists need one key per value"
        );
        Self { keys, values }
    }

    pub fn keys(&self) -> &[Value] {
        &self.keys
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Build a keyed-list value from `(key, value)` pairs.
pub fn keyed<K: Into<Value>, V: Into<Value>>(items: impl IntoIterator<Item = (K, V)>) -> Value {
    let mut keys = Vec::new();
    let mut values = Vec::new();
    for (key, value) in items {
        keys.push(key.into());
        values.push(value.into());
    }
    Value::Keyed(Rc::new(KeyedList::new(keys, values)))
}

/// One step of a keyed reconciliation, in the order it must be applied.
/// `Move` implies an update of the moved item's value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListOperation {
    Insert { new_index: usize },
    Update { old_index: usize, new_index: usize },
    Move { old_index: usize, new_index: usize },
    Remove { old_index: usize },
}

/// Key identity wrapper: `Eq` follows [`Value::same`], the hash is a
/// consistent coarsening of it.
struct KeyRef<'a>(&'a Value);

impl PartialEq for KeyRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        Value::same(self.0, other.0)
    }
}

impl Eq for KeyRef<'_> {}

impl Hash for KeyRef<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self.0).hash(state);
        match self.0 {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Text(t) => t.hash(state),
            Value::Handler(h) => (Rc::as_ptr(&h.callback) as *const () as usize).hash(state),
            Value::Template(t) => Rc::as_ptr(t).hash(state),
            Value::Component(c) => Rc::as_ptr(c).hash(state),
            Value::Keyed(k) => Rc::as_ptr(k).hash(state),
            Value::Properties(p) => p.len().hash(state),
            Value::Directive(d) => d.name().hash(state),
            Value::Any(a) => a.our_typeid().hash(state),
        }
    }
}

/// Two-ended keyed diff with a fallback key map.
///
/// The four end comparisons run in the fixed order head-head, tail-tail,
/// head-to-back, tail-to-front; only when all four miss are the key maps
/// built. Non-unique keys degenerate into extra moves, never an error.
pub fn reconcile_keyed(old_keys: &[Value], new_keys: &[Value]) -> Vec<ListOperation> {
    if cfg!(debug_assertions) {
        let mut seen = Vec::new();
        for key in new_keys {
            debug_assert!(
                !seen.iter().any(|other| Value::same(other, key)),
                "keyed siblings should each have a unique key"
            );
            seen.push(key.clone());
        }
    }

    let mut ops = Vec::new();
    let mut used = vec![false; old_keys.len()];

    let mut old_head = 0isize;
    let mut old_tail = old_keys.len() as isize - 1;
    let mut new_head = 0isize;
    let mut new_tail = new_keys.len() as isize - 1;

    while old_head <= old_tail && new_head <= new_tail {
        if used[old_head as usize] {
            old_head += 1;
            continue;
        }
        if used[old_tail as usize] {
            old_tail -= 1;
            continue;
        }
        let oh = &old_keys[old_head as usize];
        let ot = &old_keys[old_tail as usize];
        let nh = &new_keys[new_head as usize];
        let nt = &new_keys[new_tail as usize];

        if Value::same(oh, nh) {
            ops.push(ListOperation::Update {
                old_index: old_head as usize,
                new_index: new_head as usize,
            });
            old_head += 1;
            new_head += 1;
        } else if Value::same(ot, nt) {
            ops.push(ListOperation::Update {
                old_index: old_tail as usize,
                new_index: new_tail as usize,
            });
            old_tail -= 1;
            new_tail -= 1;
        } else if Value::same(oh, nt) {
            // Old head moved to the back.
            ops.push(ListOperation::Move {
                old_index: old_head as usize,
                new_index: new_tail as usize,
            });
            old_head += 1;
            new_tail -= 1;
        } else if Value::same(ot, nh) {
            // Old tail moved to the front.
            ops.push(ListOperation::Move {
                old_index: old_tail as usize,
                new_index: new_head as usize,
            });
            old_tail -= 1;
            new_head += 1;
        } else {
            // Neither end matches: fall back to the key maps.
            let mut new_index_by_key: FxHashMap<KeyRef<'_>, usize> = FxHashMap::default();
            for index in new_head..=new_tail {
                new_index_by_key.insert(KeyRef(&new_keys[index as usize]), index as usize);
            }
            if !new_index_by_key.contains_key(&KeyRef(oh)) {
                ops.push(ListOperation::Remove {
                    old_index: old_head as usize,
                });
                old_head += 1;
                continue;
            }
            if !new_index_by_key.contains_key(&KeyRef(ot)) {
                ops.push(ListOperation::Remove {
                    old_index: old_tail as usize,
                });
                old_tail -= 1;
                continue;
            }
            let mut old_index_by_key: FxHashMap<KeyRef<'_>, usize> = FxHashMap::default();
            for index in old_head..=old_tail {
                if !used[index as usize] {
                    old_index_by_key.insert(KeyRef(&old_keys[index as usize]), index as usize);
                }
            }
            while new_head <= new_tail {
                let key = &new_keys[new_tail as usize];
                match old_index_by_key.get(&KeyRef(key)) {
                    Some(&old_index) if !used[old_index] => {
                        ops.push(ListOperation::Move {
                            old_index,
                            new_index: new_tail as usize,
                        });
                        used[old_index] = true;
                    }
                    _ => ops.push(ListOperation::Insert {
                        new_index: new_tail as usize,
                    }),
                }
                new_tail -= 1;
            }
            break;
        }
    }

    if new_head > new_tail {
        // Whatever old entries remain were not claimed by any new key.
        while old_head <= old_tail {
            if !used[old_head as usize] {
                ops.push(ListOperation::Remove {
                    old_index: old_head as usize,
                });
            }
            old_head += 1;
        }
    } else {
        // Remaining new entries are all fresh.
        while new_head <= new_tail {
            ops.push(ListOperation::Insert {
                new_index: new_head as usize,
            });
            new_head += 1;
        }
    }

    ops
}

/// Keyed children inside a child-node range. Each item owns its own marker
/// comment and slot; reconciliation rewires the item vector and the commit
/// enforces the resulting order on the live tree.
pub struct ListDirective;

impl Directive for ListDirective {
    fn name(&self) -> &'static str {
        "list"
    }

    fn resolve_binding(
        &self,
        value: Value,
        part: Part,
        _cx: &mut UpdateContext<'_>,
    ) -> Result<BindingRef, RenderError> {
        match &part {
            Part::ChildNode { .. } => match value {
                Value::Keyed(_) => Ok(Rc::new(RefCell::new(ListBinding::new(value, part)))),
                other => Err(directive_error(other.type_name(), &part)),
            },
            other => Err(directive_error(self.name(), other)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct Item {
    key: Value,
    marker: NodeId,
    anchor: Rc<Cell<Option<NodeId>>>,
    slot: Slot,
    mounted: bool,
}

impl Item {
    fn head(&self, _doc: &weft_dom::Document) -> NodeId {
        self.anchor.get().unwrap_or(self.marker)
    }
}

pub struct ListBinding {
    part: Part,
    value: Value,
    keys: Vec<Value>,
    items: Vec<Item>,
    /// Markers of removed items, detached at the next commit.
    removed: Vec<NodeId>,
    connected: bool,
    committed: bool,
    enqueued: bool,
}

impl ListBinding {
    fn new(value: Value, part: Part) -> Self {
        Self {
            part,
            value,
            keys: Vec::new(),
            items: Vec::new(),
            removed: Vec::new(),
            connected: false,
            committed: false,
            enqueued: false,
        }
    }

    fn list(&self) -> Result<Rc<KeyedList>, RenderError> {
        match &self.value {
            Value::Keyed(list) => Ok(list.clone()),
            other => Err(directive_error(other.type_name(), &self.part)),
        }
    }

    fn namespace(&self) -> Namespace {
        match &self.part {
            Part::ChildNode { namespace, .. } => *namespace,
            _ => Namespace::Html,
        }
    }

    fn anchor(&self) -> &Rc<Cell<Option<NodeId>>> {
        match &self.part {
            Part::ChildNode { anchor, .. } => anchor,
            other => unreachable!("list binding on {other:?}"),
        }
    }

    fn make_item(
        &self,
        key: Value,
        value: Value,
        cx: &mut UpdateContext<'_>,
    ) -> Result<Item, RenderError> {
        let marker = {
            let document = cx.document();
            let mut doc = document.borrow_mut();
            doc.create_comment("")
        };
        let anchor = Rc::new(Cell::new(None));
        let part = Part::ChildNode {
            node: marker,
            anchor: anchor.clone(),
            namespace: self.namespace(),
        };
        let mut slot = Slot::resolve(value, part, cx)?;
        slot.connect(cx)?;
        Ok(Item {
            key,
            marker,
            anchor,
            slot,
            mounted: false,
        })
    }
}

impl Binding for ListBinding {
    fn directive_name(&self) -> &'static str {
        "list"
    }

    fn part(&self) -> &Part {
        &self.part
    }

    fn value(&self) -> &Value {
        &self.value
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn is_committed(&self) -> bool {
        self.committed
    }

    fn bind(&mut self, new: Value) {
        self.value = new;
    }

    fn connect(&mut self, this: &BindingRef, cx: &mut UpdateContext<'_>) -> Result<(), RenderError> {
        self.connected = true;
        // The list's own commit runs before the items' content effects so
        // fresh markers are live by the time content lands before them.
        if !self.enqueued {
            self.enqueued = true;
            cx.enqueue(CommitPhase::Mutation, Effect::Commit(this.clone()));
        }

        let list = self.list()?;
        let ops = reconcile_keyed(&self.keys, list.keys());

        let mut old: Vec<Option<Item>> = self.items.drain(..).map(Some).collect();
        let mut new: Vec<Option<Item>> = Vec::new();
        new.resize_with(list.len(), || None);

        for op in ops {
            match op {
                ListOperation::Update {
                    old_index,
                    new_index,
                }
                | ListOperation::Move {
                    old_index,
                    new_index,
                } => {
                    let mut item = old[old_index].take().expect("old slot already consumed");
                    item.slot
                        .reconcile(list.values()[new_index].clone(), cx)?;
                    item.key = list.keys()[new_index].clone();
                    new[new_index] = Some(item);
                }
                ListOperation::Insert { new_index } => {
                    let item = self.make_item(
                        list.keys()[new_index].clone(),
                        list.values()[new_index].clone(),
                        cx,
                    )?;
                    new[new_index] = Some(item);
                }
                ListOperation::Remove { old_index } => {
                    let mut item = old[old_index].take().expect("old slot already consumed");
                    item.slot.disconnect(cx);
                    self.removed.push(item.marker);
                }
            }
        }

        self.items = new
            .into_iter()
            .map(|item| item.expect("reconciliation left a hole"))
            .collect();
        self.keys = list.keys().to_vec();
        Ok(())
    }

    fn disconnect(&mut self, this: &BindingRef, cx: &mut UpdateContext<'_>) {
        if self.connected {
            self.connected = false;
            for item in self.items.iter_mut() {
                item.slot.disconnect(cx);
            }
            cx.enqueue(CommitPhase::Mutation, Effect::Rollback(this.clone()));
        }
    }

    fn commit(&mut self, cx: &mut CommitContext<'_>) -> Result<(), RenderError> {
        self.enqueued = false;
        let part_marker = self.part.node();
        let document = cx.document();
        let mut doc = document.borrow_mut();

        for marker in self.removed.drain(..) {
            doc.detach(marker);
        }

        // Normalize order back-to-front: each item's range must sit
        // immediately before the next item's head (or the part marker).
        let mut next_anchor = part_marker;
        for item in self.items.iter_mut().rev() {
            if !item.mounted {
                doc.insert_before(next_anchor, item.marker);
                item.mounted = true;
            } else if doc.next_sibling(item.marker) != Some(next_anchor) {
                let head = item.head(&doc);
                let mut range: SmallVec<[NodeId; 8]> = smallvec![head];
                let mut cursor = head;
                while cursor != item.marker {
                    match doc.next_sibling(cursor) {
                        Some(next) => {
                            range.push(next);
                            cursor = next;
                        }
                        None => break,
                    }
                }
                for node in range {
                    doc.insert_before(next_anchor, node);
                }
            }
            next_anchor = item.head(&doc);
        }

        self.anchor()
            .set(self.items.first().map(|item| item.head(&doc)));
        self.committed = true;
        Ok(())
    }

    fn rollback(&mut self, cx: &mut CommitContext<'_>) -> Result<(), RenderError> {
        if !self.committed {
            return Ok(());
        }
        let document = cx.document();
        let mut doc = document.borrow_mut();
        for marker in self.removed.drain(..) {
            doc.detach(marker);
        }
        for item in self.items.iter_mut() {
            let head = item.head(&doc);
            let mut range: SmallVec<[NodeId; 8]> = smallvec![head];
            let mut cursor = head;
            while cursor != item.marker {
                match doc.next_sibling(cursor) {
                    Some(next) => {
                        range.push(next);
                        cursor = next;
                    }
                    None => break,
                }
            }
            for node in range {
                doc.detach(node);
            }
            item.mounted = false;
        }
        self.anchor().set(None);
        self.committed = false;
        Ok(())
    }

    fn hydrate(&mut self, _this: &BindingRef, cx: &mut UpdateContext<'_>) -> Result<(), RenderError> {
        self.connected = true;
        let list = self.list()?;
        let walker = cx.hydration_walker()?;
        let document = cx.document();

        let mut items = Vec::with_capacity(list.len());
        for (key, value) in list.keys().iter().zip(list.values()) {
            let fresh = document.borrow_mut().create_comment("");
            let anchor = Rc::new(Cell::new(None));
            let part = Part::ChildNode {
                node: fresh,
                anchor: anchor.clone(),
                namespace: self.namespace(),
            };
            let mut slot = Slot::resolve(value.clone(), part, cx)?;
            slot.hydrate(cx)?;
            let live = {
                let doc = document.borrow();
                walker.borrow_mut().next_node(&doc, NodeType::Comment)?
            };
            {
                let mut doc = document.borrow_mut();
                doc.insert_before(live, fresh);
                doc.detach(live);
            }
            items.push(Item {
                key: key.clone(),
                marker: fresh,
                anchor,
                slot,
                mounted: true,
            });
        }
        self.keys = list.keys().to_vec();
        self.items = items;
        {
            let doc = document.borrow();
            self.anchor()
                .set(self.items.first().map(|item| item.head(&doc)));
        }
        self.committed = true;
        Ok(())
    }
}

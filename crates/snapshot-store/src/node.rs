//! Compact HTML node tree.
//!
//! A recorded snapshot encodes its DOM as nested JSON: a string is a text node,
//! `[tag, {attrs}, ...children]` is an element and `[[delta, index]]` reuses a
//! node from a snapshot `delta` positions earlier in the same frame. Nodes are
//! decoded into an arena laid out in pre-order so that per-node caches can be
//! kept in side tables indexed by [`NodeId`].

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::de::{self, DeserializeSeed, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Text(String),
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
        children: Vec<NodeId>,
    },
    Ref {
        delta: i64,
        index: i64,
    },
    /// Anything the recorder did not produce (numbers, objects, empty arrays).
    Invalid,
}

impl Node {
    fn is_flattenable(&self) -> bool {
        matches!(self, Node::Text(_) | Node::Element { .. })
    }
}

#[derive(Debug, Default)]
pub struct NodeTree {
    nodes: Vec<Node>,
    root: Option<NodeId>,
    flat: OnceCell<Vec<NodeId>>,
    rendered: Vec<OnceCell<Arc<str>>>,
}

impl NodeTree {
    pub fn from_nodes(nodes: Vec<Node>, root: Option<NodeId>) -> Self {
        let rendered = (0..nodes.len()).map(|_| OnceCell::new()).collect();
        Self {
            nodes,
            root,
            flat: OnceCell::new(),
            rendered,
        }
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Text and element nodes in pre-order (elements before their children).
    /// Back-references index into this list. Computed once per tree.
    pub fn flattened(&self) -> &[NodeId] {
        self.flat.get_or_init(|| {
            // The arena is already in pre-order.
            self.nodes
                .iter()
                .enumerate()
                .filter(|(_, node)| node.is_flattenable())
                .map(|(idx, _)| NodeId(idx))
                .collect()
        })
    }

    pub(crate) fn memo(&self, id: NodeId) -> Option<&OnceCell<Arc<str>>> {
        self.rendered.get(id.0)
    }
}

impl<'de> Deserialize<'de> for NodeTree {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut nodes = Vec::new();
        let root = NodeSeed { arena: &mut nodes }.deserialize(deserializer)?;
        Ok(NodeTree::from_nodes(nodes, Some(root)))
    }
}

struct NodeSeed<'a> {
    arena: &'a mut Vec<Node>,
}

impl<'a> NodeSeed<'a> {
    fn push(self, node: Node) -> NodeId {
        self.arena.push(node);
        NodeId(self.arena.len() - 1)
    }
}

impl<'de, 'a> DeserializeSeed<'de> for NodeSeed<'a> {
    type Value = NodeId;

    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(self)
    }
}

impl<'de, 'a> Visitor<'de> for NodeSeed<'a> {
    type Value = NodeId;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a text node, an element array or a back-reference")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<NodeId, E> {
        Ok(self.push(Node::Text(v.to_string())))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<NodeId, E> {
        Ok(self.push(Node::Text(v)))
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<NodeId, E> {
        Ok(self.push(Node::Invalid))
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<NodeId, E> {
        Ok(self.push(Node::Invalid))
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<NodeId, E> {
        Ok(self.push(Node::Invalid))
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<NodeId, E> {
        Ok(self.push(Node::Invalid))
    }

    fn visit_unit<E: de::Error>(self) -> Result<NodeId, E> {
        Ok(self.push(Node::Invalid))
    }

    fn visit_none<E: de::Error>(self) -> Result<NodeId, E> {
        Ok(self.push(Node::Invalid))
    }

    fn visit_map<A>(self, mut map: A) -> Result<NodeId, A::Error>
    where
        A: MapAccess<'de>,
    {
        while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
        Ok(self.push(Node::Invalid))
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<NodeId, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let head = match seq.next_element::<Head>()? {
            Some(head) => head,
            None => return Ok(self.push(Node::Invalid)),
        };
        match head {
            Head::Tag(tag) => {
                let attrs = seq.next_element::<Attrs>()?.unwrap_or_default().0;
                let arena = self.arena;
                arena.push(Node::Element {
                    tag,
                    attrs,
                    children: Vec::new(),
                });
                let id = NodeId(arena.len() - 1);
                let mut ids = Vec::new();
                while let Some(child) = seq.next_element_seed(NodeSeed {
                    arena: &mut *arena,
                })? {
                    ids.push(child);
                }
                if let Some(Node::Element { children, .. }) = arena.get_mut(id.0) {
                    *children = ids;
                }
                Ok(id)
            }
            Head::Ref(pair) => {
                while seq.next_element::<IgnoredAny>()?.is_some() {}
                let node = match pair.as_slice() {
                    [delta, index, ..] => Node::Ref {
                        delta: *delta,
                        index: *index,
                    },
                    _ => Node::Invalid,
                };
                Ok(self.push(node))
            }
            Head::Other(_) => {
                while seq.next_element::<IgnoredAny>()?.is_some() {}
                Ok(self.push(Node::Invalid))
            }
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Head {
    Tag(String),
    Ref(Vec<i64>),
    Other(IgnoredAny),
}

/// Attribute map that keeps the recorded key order.
#[derive(Default)]
struct Attrs(Vec<(String, String)>);

impl<'de> Deserialize<'de> for Attrs {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct AttrsVisitor;

        impl<'de> Visitor<'de> for AttrsVisitor {
            type Value = Attrs;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an attribute object")
            }

            fn visit_unit<E: de::Error>(self) -> Result<Attrs, E> {
                Ok(Attrs::default())
            }

            fn visit_none<E: de::Error>(self) -> Result<Attrs, E> {
                Ok(Attrs::default())
            }

            fn visit_map<A>(self, mut map: A) -> Result<Attrs, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut out = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((name, value)) = map.next_entry::<String, AttrValue>()? {
                    out.push((name, value.0));
                }
                Ok(Attrs(out))
            }
        }

        deserializer.deserialize_any(AttrsVisitor)
    }
}

struct AttrValue(String);

impl<'de> Deserialize<'de> for AttrValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(AttrValue(match value {
            serde_json::Value::String(s) => s,
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        }))
    }
}

use super::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(pub(crate) usize);

#[derive(Debug, Clone)]
pub(crate) enum NodeType {
    Document,
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) node_type: NodeType,
}

#[derive(Debug, Clone)]
pub(crate) struct Element {
    pub(crate) tag_name: String,
    pub(crate) attrs: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub(crate) struct Dom {
    pub(crate) nodes: Vec<Node>,
    pub(crate) root: NodeId,
    pub(crate) id_index: HashMap<String, NodeId>,
}

impl Dom {
    pub(crate) fn new() -> Self {
        let root = Node {
            parent: None,
            children: Vec::new(),
            node_type: NodeType::Document,
        };
        Self {
            nodes: vec![root],
            root: NodeId(0),
            id_index: HashMap::new(),
        }
    }

    pub(crate) fn create_node(&mut self, parent: Option<NodeId>, node_type: NodeType) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent,
            children: Vec::new(),
            node_type,
        });
        if let Some(parent_id) = parent {
            self.nodes[parent_id.0].children.push(id);
        }
        id
    }

    pub(crate) fn create_element(
        &mut self,
        parent: Option<NodeId>,
        tag_name: &str,
        attrs: HashMap<String, String>,
    ) -> NodeId {
        let element_id = attrs.get("id").cloned();
        let id = self.create_node(
            parent,
            NodeType::Element(Element {
                tag_name: tag_name.to_ascii_lowercase(),
                attrs,
            }),
        );
        if let Some(element_id) = element_id {
            self.id_index.insert(element_id, id);
        }
        id
    }

    pub(crate) fn create_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        self.create_node(Some(parent), NodeType::Text(text.to_string()))
    }

    pub(crate) fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes[id.0].node_type {
            NodeType::Element(element) => Some(element),
            _ => None,
        }
    }

    pub(crate) fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes[id.0].node_type {
            NodeType::Element(element) => Some(element),
            _ => None,
        }
    }

    pub(crate) fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|element| element.tag_name.as_str())
    }

    pub(crate) fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub(crate) fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub(crate) fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)
            .and_then(|element| element.attrs.get(name))
            .map(String::as_str)
    }

    pub(crate) fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if name == "id" {
            self.id_index.insert(value.to_string(), id);
        }
        if let Some(element) = self.element_mut(id) {
            element.attrs.insert(name.to_string(), value.to_string());
        }
    }

    pub(crate) fn class_tokens(&self, id: NodeId) -> Vec<&str> {
        self.attr(id, "class")
            .map(|value| value.split_ascii_whitespace().collect())
            .unwrap_or_default()
    }

    pub(crate) fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.class_tokens(id).iter().any(|token| *token == class)
    }

    pub(crate) fn add_class(&mut self, id: NodeId, class: &str) {
        if self.has_class(id, class) {
            return;
        }
        let merged = match self.attr(id, "class") {
            Some(existing) if !existing.is_empty() => format!("{existing} {class}"),
            _ => class.to_string(),
        };
        if let Some(element) = self.element_mut(id) {
            element.attrs.insert("class".to_string(), merged);
        }
    }

    /// Preorder walk of the element descendants of `id`, excluding `id` itself.
    pub(crate) fn descendant_elements(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            if self.element(next).is_some() {
                out.push(next);
            }
            for child in self.children(next).iter().rev() {
                stack.push(*child);
            }
        }
        out
    }

    pub(crate) fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id.0].node_type {
            NodeType::Text(text) => {
                if !out.is_empty() && !out.ends_with(' ') {
                    out.push(' ');
                }
                out.push_str(text.trim());
            }
            _ => {
                for child in self.children(id) {
                    self.collect_text(*child, out);
                }
            }
        }
    }

    /// True when walking parent links from `id` reaches the document root.
    /// Detached subtrees stay in the arena, so id lookups must re-check this.
    pub(crate) fn is_connected(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            match self.nodes[current.0].parent {
                Some(parent) => current = parent,
                None => return current == self.root,
            }
        }
    }

    pub(crate) fn element_by_id(&self, element_id: &str) -> Option<NodeId> {
        self.id_index
            .get(element_id)
            .copied()
            .filter(|id| self.is_connected(*id))
    }

    pub(crate) fn detach_children(&mut self, id: NodeId) -> usize {
        let children = std::mem::take(&mut self.nodes[id.0].children);
        let removed = children.len();
        for child in children {
            self.nodes[child.0].parent = None;
        }
        removed
    }

    /// Copies the subtree rooted at `source` in `other` under `parent` here.
    /// Returns the number of nodes grafted.
    pub(crate) fn graft(&mut self, other: &Dom, source: NodeId, parent: NodeId) -> usize {
        let mut grafted = 0usize;
        for child in other.children(source) {
            grafted += self.graft_node(other, *child, parent);
        }
        grafted
    }

    fn graft_node(&mut self, other: &Dom, source: NodeId, parent: NodeId) -> usize {
        let new_id = match &other.nodes[source.0].node_type {
            NodeType::Document => return self.graft(other, source, parent),
            NodeType::Element(element) => {
                self.create_element(Some(parent), &element.tag_name, element.attrs.clone())
            }
            NodeType::Text(text) => self.create_text(parent, text),
        };
        let mut grafted = 1usize;
        for child in other.children(source) {
            grafted += self.graft_node(other, *child, new_id);
        }
        grafted
    }
}

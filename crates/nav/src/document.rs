//! Minimal element tree standing in for the admin page DOM.

use std::fmt::Write;

/// Identifier of the element hosting the navigation menu.
pub const NAV_CONTAINER_ID: &str = "admin-nav";

/// A page element with optional text and ordered children.
///
/// Setting text replaces the children, like assigning `textContent`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Element {
    tag: String,
    id: Option<String>,
    classes: Vec<String>,
    text: Option<String>,
    children: Vec<Element>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.set_text(text);
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.append_child(child);
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children.clear();
        self.text = Some(text.into());
    }

    pub fn append_child(&mut self, child: Element) {
        self.children.push(child);
    }

    /// Remove all children and text.
    pub fn clear_children(&mut self) {
        self.children.clear();
        self.text = None;
    }

    /// Depth-first search for the first element carrying `id`, self included.
    pub fn find_by_id(&self, id: &str) -> Option<&Element> {
        if self.id.as_deref() == Some(id) {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find_by_id(id))
    }

    pub fn find_by_id_mut(&mut self, id: &str) -> Option<&mut Element> {
        if self.id.as_deref() == Some(id) {
            return Some(self);
        }
        self.children.iter_mut().find_map(|child| child.find_by_id_mut(id))
    }

    fn write_html(&self, out: &mut String) {
        let _ = write!(out, "<{}", self.tag);
        if let Some(id) = &self.id {
            let _ = write!(out, " id=\"{}\"", escape_attribute(id));
        }
        if !self.classes.is_empty() {
            let _ = write!(out, " class=\"{}\"", escape_attribute(&self.classes.join(" ")));
        }
        out.push('>');
        if let Some(text) = &self.text {
            out.push_str(&escape_text(text));
        }
        for child in &self.children {
            child.write_html(out);
        }
        let _ = write!(out, "</{}>", self.tag);
    }
}

/// An admin page: a single root element and its subtree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Document {
    root: Element,
}

impl Document {
    pub fn new(root: Element) -> Self {
        Self { root }
    }

    /// Page skeleton with an empty `<ul id="admin-nav">` inside `<nav>`.
    pub fn admin_page() -> Self {
        let head = Element::new("head").with_child(Element::new("title").with_text("SHM Admin"));
        let body = Element::new("body")
            .with_child(Element::new("nav").with_child(Element::new("ul").with_id(NAV_CONTAINER_ID)))
            .with_child(Element::new("main").with_id("admin-content"));
        Self::new(Element::new("html").with_child(head).with_child(body))
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn get_element_by_id(&self, id: &str) -> Option<&Element> {
        self.root.find_by_id(id)
    }

    pub fn get_element_by_id_mut(&mut self, id: &str) -> Option<&mut Element> {
        self.root.find_by_id_mut(id)
    }

    /// Serialize the page as HTML, escaping text and attribute values.
    pub fn to_html(&self) -> String {
        let mut out = String::from("<!DOCTYPE html>");
        self.root.write_html(&mut out);
        out
    }
}

fn escape_text(input: &str) -> String {
    input.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attribute(input: &str) -> String {
    escape_text(input).replace('"', "&quot;")
}

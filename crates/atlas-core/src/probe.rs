//! Read-only environment interface consumed by conditions and `for_each`.
//!
//! The interpreter never talks to a live UI directly. Everything it needs to
//! know about the outside world — does an element exist, what does the page
//! say, which elements match a selector — goes through [`EnvironmentProbe`].
//! Hosts implement it over whatever backend they drive (a browser session, an
//! accessibility tree, a recorded fixture); this crate ships [`NullProbe`]
//! for detached execution and [`StaticProbe`] for simulators and tests.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A UI element returned by [`EnvironmentProbe::find_elements`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementHandle {
    /// The selector this element matched.
    pub selector: String,
    /// The user-visible label, if the backend reports one.
    pub label: Option<String>,
    /// The element's current textual value, if any.
    pub text: Option<String>,
}

impl ElementHandle {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            label: None,
            text: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// The string a `for_each` loop binds its variable to: label, then text,
    /// then the selector itself.
    pub fn binding_value(&self) -> String {
        self.label
            .clone()
            .or_else(|| self.text.clone())
            .unwrap_or_else(|| self.selector.clone())
    }
}

/// Read interface over the live environment.
#[async_trait]
pub trait EnvironmentProbe: Send + Sync {
    async fn element_exists(&self, selector: &str) -> bool;

    async fn page_contains(&self, text: &str) -> bool;

    async fn element_visible(&self, selector: &str) -> bool;

    async fn element_clickable(&self, selector: &str) -> bool;

    async fn url_contains(&self, text: &str) -> bool;

    async fn title_contains(&self, text: &str) -> bool;

    /// All elements matching `selector`, in document order.
    async fn find_elements(&self, selector: &str) -> Vec<ElementHandle>;
}

/// Probe for execution with no environment attached.
///
/// Every predicate is false and every lookup is empty, so scripts still run
/// end to end (conditions simply take their else branches).
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProbe;

#[async_trait]
impl EnvironmentProbe for NullProbe {
    async fn element_exists(&self, _selector: &str) -> bool {
        false
    }

    async fn page_contains(&self, _text: &str) -> bool {
        false
    }

    async fn element_visible(&self, _selector: &str) -> bool {
        false
    }

    async fn element_clickable(&self, _selector: &str) -> bool {
        false
    }

    async fn url_contains(&self, _text: &str) -> bool {
        false
    }

    async fn title_contains(&self, _text: &str) -> bool {
        false
    }

    async fn find_elements(&self, _selector: &str) -> Vec<ElementHandle> {
        Vec::new()
    }
}

/// Probe backed by fixed data, for simulators and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticProbe {
    page_text: String,
    url: String,
    title: String,
    elements: Vec<ElementHandle>,
    visible: HashSet<String>,
    clickable: HashSet<String>,
}

impl StaticProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_text(mut self, text: impl Into<String>) -> Self {
        self.page_text = text.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Register an element. Registered elements exist; mark them visible or
    /// clickable separately.
    pub fn with_element(mut self, element: ElementHandle) -> Self {
        self.elements.push(element);
        self
    }

    pub fn with_visible(mut self, selector: impl Into<String>) -> Self {
        self.visible.insert(selector.into());
        self
    }

    pub fn with_clickable(mut self, selector: impl Into<String>) -> Self {
        self.clickable.insert(selector.into());
        self
    }
}

#[async_trait]
impl EnvironmentProbe for StaticProbe {
    async fn element_exists(&self, selector: &str) -> bool {
        self.elements.iter().any(|e| e.selector == selector)
    }

    async fn page_contains(&self, text: &str) -> bool {
        self.page_text.contains(text)
    }

    async fn element_visible(&self, selector: &str) -> bool {
        self.visible.contains(selector)
    }

    async fn element_clickable(&self, selector: &str) -> bool {
        self.clickable.contains(selector)
    }

    async fn url_contains(&self, text: &str) -> bool {
        self.url.contains(text)
    }

    async fn title_contains(&self, text: &str) -> bool {
        self.title.contains(text)
    }

    async fn find_elements(&self, selector: &str) -> Vec<ElementHandle> {
        self.elements
            .iter()
            .filter(|e| e.selector == selector)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_value_precedence() {
        let with_label = ElementHandle::new("row").with_label("First row").with_text("txt");
        assert_eq!(with_label.binding_value(), "First row");
        let with_text = ElementHandle::new("row").with_text("txt");
        assert_eq!(with_text.binding_value(), "txt");
        assert_eq!(ElementHandle::new("row").binding_value(), "row");
    }

    #[tokio::test]
    async fn test_null_probe_is_all_false() {
        let probe = NullProbe;
        assert!(!probe.element_exists("x").await);
        assert!(!probe.page_contains("x").await);
        assert!(probe.find_elements("x").await.is_empty());
    }

    #[tokio::test]
    async fn test_static_probe() {
        let probe = StaticProbe::new()
            .with_page_text("Welcome back")
            .with_url("https://example.com/home")
            .with_title("Home")
            .with_element(ElementHandle::new("row").with_label("a"))
            .with_element(ElementHandle::new("row").with_label("b"))
            .with_visible("row");

        assert!(probe.element_exists("row").await);
        assert!(!probe.element_exists("missing").await);
        assert!(probe.page_contains("Welcome").await);
        assert!(probe.url_contains("example.com").await);
        assert!(probe.title_contains("Home").await);
        assert!(probe.element_visible("row").await);
        assert!(!probe.element_clickable("row").await);
        assert_eq!(probe.find_elements("row").await.len(), 2);
    }
}

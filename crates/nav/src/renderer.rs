use std::time::Duration;

use shm_api::{MenuFetchError, MenuSource};
use shm_types::{LabelResolver, MenuResponse, SessionToken};
use tracing::{debug, warn};

use crate::{Document, Element, NAV_CONTAINER_ID};

/// Class set on the placeholder item written by [`FailurePolicy::Placeholder`].
pub const NAV_ERROR_CLASS: &str = "nav-error";

/// What a render pass does to the container when the menu cannot be fetched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Keep whatever the container held before the pass.
    #[default]
    LeaveUntouched,
    /// Replace the container's children with one item showing this text.
    Placeholder(String),
}

/// Result of one render pass.
#[derive(Debug)]
pub enum RenderOutcome {
    /// The container was rebuilt with `items` list items.
    Rendered { items: usize },
    /// The menu was fetched but the page has no navigation container.
    ContainerMissing,
    /// The menu could not be fetched or decoded.
    Failed(MenuFetchError),
}

impl RenderOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, RenderOutcome::Failed(_))
    }
}

/// Populates the navigation container with the menu permitted for a session.
///
/// Without a label resolver each key is shown as-is; with one, keys the
/// resolver does not know are skipped.
pub struct MenuRenderer<S> {
    source: S,
    resolver: Option<Box<dyn LabelResolver>>,
    failure_policy: FailurePolicy,
    timeout: Option<Duration>,
    container_id: String,
}

impl<S: MenuSource> MenuRenderer<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            resolver: None,
            failure_policy: FailurePolicy::default(),
            timeout: None,
            container_id: NAV_CONTAINER_ID.to_string(),
        }
    }

    /// Translate keys through `resolver`, dropping keys it cannot resolve.
    pub fn with_labels(mut self, resolver: impl LabelResolver + 'static) -> Self {
        self.resolver = Some(Box::new(resolver));
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Give up on the fetch after `timeout`. Without one the pass waits as
    /// long as the source does.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_container_id(mut self, id: impl Into<String>) -> Self {
        self.container_id = id.into();
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Run one render pass into `document`.
    ///
    /// Issues exactly one fetch. The container is only touched once a menu
    /// arrives, or on failure when the policy asks for a placeholder.
    pub async fn render(&self, document: &mut Document, token: &SessionToken) -> RenderOutcome {
        let menu = match self.fetch(token).await {
            Ok(menu) => menu,
            Err(error) => {
                warn!(error = %error, "Failed to fetch admin menu");
                self.apply_failure_policy(document);
                return RenderOutcome::Failed(error);
            }
        };

        let Some(container) = document.get_element_by_id_mut(&self.container_id) else {
            debug!(container = %self.container_id, "navigation container not found; skipping render");
            return RenderOutcome::ContainerMissing;
        };

        let items = render_items(container, &menu, self.resolver.as_deref());
        debug!(keys = menu.menu.len(), items, "admin menu rendered");
        RenderOutcome::Rendered { items }
    }

    async fn fetch(&self, token: &SessionToken) -> Result<MenuResponse, MenuFetchError> {
        match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.source.fetch_menu(token))
                .await
                .unwrap_or(Err(MenuFetchError::Timeout)),
            None => self.source.fetch_menu(token).await,
        }
    }

    fn apply_failure_policy(&self, document: &mut Document) {
        let FailurePolicy::Placeholder(text) = &self.failure_policy else {
            return;
        };
        if let Some(container) = document.get_element_by_id_mut(&self.container_id) {
            container.clear_children();
            container.append_child(Element::new("li").with_class(NAV_ERROR_CLASS).with_text(text.clone()));
        }
    }
}

/// Replace `container`'s children with one `li` per displayable key.
///
/// Keys keep the order of `menu`. With `resolver` set, keys it returns
/// `None` for are skipped; without one, the raw key is the item text.
/// Returns the number of items appended.
pub fn render_items(container: &mut Element, menu: &MenuResponse, resolver: Option<&dyn LabelResolver>) -> usize {
    container.clear_children();
    let mut rendered = 0;
    for key in &menu.menu {
        let label = match resolver {
            Some(resolver) => match resolver.resolve(key) {
                Some(label) => label,
                None => continue,
            },
            None => key.as_str().to_string(),
        };
        container.append_child(Element::new("li").with_text(label));
        rendered += 1;
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use shm_types::{MenuTitles, RawKeys};
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Reply {
        Menu(MenuResponse),
        Body(&'static str),
        Status(u16),
        Hang,
    }

    struct StubSource {
        reply: Reply,
        calls: AtomicUsize,
    }

    impl StubSource {
        fn new(reply: Reply) -> Self {
            Self {
                reply,
                calls: AtomicUsize::new(0),
            }
        }

        fn menu(keys: &[&str]) -> Self {
            Self::new(Reply::Menu(MenuResponse::new(keys.iter().copied())))
        }
    }

    #[async_trait]
    impl MenuSource for StubSource {
        async fn fetch_menu(&self, _token: &SessionToken) -> Result<MenuResponse, MenuFetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Reply::Menu(menu) => Ok(menu.clone()),
                Reply::Body(body) => Ok(MenuResponse::from_json_str(body)?),
                Reply::Status(status) => Err(MenuFetchError::Status {
                    status: *status,
                    body: String::new(),
                }),
                Reply::Hang => std::future::pending().await,
            }
        }
    }

    fn nav_texts(document: &Document) -> Vec<String> {
        document
            .get_element_by_id(NAV_CONTAINER_ID)
            .expect("nav container")
            .children()
            .iter()
            .map(|item| {
                assert_eq!(item.tag(), "li");
                item.text().unwrap_or_default().to_string()
            })
            .collect()
    }

    fn page_with_stale_item() -> Document {
        let mut document = Document::admin_page();
        document
            .get_element_by_id_mut(NAV_CONTAINER_ID)
            .unwrap()
            .append_child(Element::new("li").with_text("stale"));
        document
    }

    #[tokio::test]
    async fn labeled_menu_renders_titles_in_order() {
        let renderer = MenuRenderer::new(StubSource::menu(&["users", "roles", "audit"])).with_labels(MenuTitles::russian_defaults());
        let mut document = Document::admin_page();

        let outcome = renderer.render(&mut document, &SessionToken::new("abc")).await;

        assert!(matches!(outcome, RenderOutcome::Rendered { items: 3 }));
        assert_eq!(nav_texts(&document), vec!["Пользователи", "Роли", "Аудит"]);
    }

    #[tokio::test]
    async fn labeled_menu_drops_unknown_keys() {
        let renderer = MenuRenderer::new(StubSource::menu(&["users", "unknown_key"])).with_labels(MenuTitles::russian_defaults());
        let mut document = Document::admin_page();

        renderer.render(&mut document, &SessionToken::new("abc")).await;

        assert_eq!(nav_texts(&document), vec!["Пользователи"]);
    }

    #[tokio::test]
    async fn unknown_keys_do_not_shift_known_ones() {
        let renderer = MenuRenderer::new(StubSource::menu(&["x", "settings", "y", "dashboard", "z"]))
            .with_labels(MenuTitles::russian_defaults());
        let mut document = Document::admin_page();

        renderer.render(&mut document, &SessionToken::absent()).await;

        assert_eq!(nav_texts(&document), vec!["Настройки", "Дашборд"]);
    }

    #[tokio::test]
    async fn raw_menu_renders_every_key() {
        let renderer = MenuRenderer::new(StubSource::menu(&["foo", "bar"]));
        let mut document = Document::admin_page();

        let outcome = renderer.render(&mut document, &SessionToken::new("abc")).await;

        assert!(matches!(outcome, RenderOutcome::Rendered { items: 2 }));
        assert_eq!(nav_texts(&document), vec!["foo", "bar"]);
    }

    #[tokio::test]
    async fn raw_resolver_matches_unlabeled_rendering() {
        let keys = ["b", "a", "b", "users", ""];
        let mut plain = Document::admin_page();
        let mut resolved = Document::admin_page();

        MenuRenderer::new(StubSource::menu(&keys))
            .render(&mut plain, &SessionToken::absent())
            .await;
        MenuRenderer::new(StubSource::menu(&keys))
            .with_labels(RawKeys)
            .render(&mut resolved, &SessionToken::absent())
            .await;

        assert_eq!(nav_texts(&plain), keys.to_vec());
        assert_eq!(plain, resolved);
    }

    #[tokio::test]
    async fn missing_menu_field_renders_nothing() {
        for labeled in [false, true] {
            let mut renderer = MenuRenderer::new(StubSource::new(Reply::Body("{}")));
            if labeled {
                renderer = renderer.with_labels(MenuTitles::russian_defaults());
            }
            let mut document = page_with_stale_item();

            let outcome = renderer.render(&mut document, &SessionToken::new("abc")).await;

            assert!(matches!(outcome, RenderOutcome::Rendered { items: 0 }));
            assert!(nav_texts(&document).is_empty());
        }
    }

    #[tokio::test]
    async fn missing_container_is_a_silent_no_op() {
        let renderer = MenuRenderer::new(StubSource::menu(&["users"]));
        let mut document = Document::new(Element::new("html").with_child(Element::new("body")));
        let before = document.clone();

        let outcome = renderer.render(&mut document, &SessionToken::new("abc")).await;

        assert!(matches!(outcome, RenderOutcome::ContainerMissing));
        assert_eq!(document, before);
    }

    #[tokio::test]
    async fn renders_into_custom_container() {
        let renderer = MenuRenderer::new(StubSource::menu(&["users"])).with_container_id("side-nav");
        let mut document = Document::new(Element::new("div").with_child(Element::new("ol").with_id("side-nav")));

        renderer.render(&mut document, &SessionToken::new("abc")).await;

        let container = document.get_element_by_id("side-nav").unwrap();
        assert_eq!(container.children().len(), 1);
    }

    #[tokio::test]
    async fn issues_exactly_one_fetch_per_pass() {
        let renderer = MenuRenderer::new(StubSource::menu(&["users"]));
        let mut document = Document::admin_page();

        renderer.render(&mut document, &SessionToken::new("abc")).await;

        assert_eq!(renderer.source().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_leaves_container_untouched_by_default() {
        let renderer = MenuRenderer::new(StubSource::new(Reply::Status(502)));
        let mut document = page_with_stale_item();

        let outcome = renderer.render(&mut document, &SessionToken::new("abc")).await;

        assert!(matches!(outcome, RenderOutcome::Failed(MenuFetchError::Status { status: 502, .. })));
        assert_eq!(nav_texts(&document), vec!["stale"]);
    }

    #[tokio::test]
    async fn decode_failure_is_reported() {
        let renderer = MenuRenderer::new(StubSource::new(Reply::Body("not json")));
        let mut document = Document::admin_page();

        let outcome = renderer.render(&mut document, &SessionToken::new("abc")).await;

        assert!(matches!(outcome, RenderOutcome::Failed(MenuFetchError::Decode(_))));
        assert!(nav_texts(&document).is_empty());
    }

    #[tokio::test]
    async fn failure_placeholder_replaces_items() {
        let renderer = MenuRenderer::new(StubSource::new(Reply::Status(500)))
            .with_failure_policy(FailurePolicy::Placeholder("Меню недоступно".into()));
        let mut document = page_with_stale_item();

        let outcome = renderer.render(&mut document, &SessionToken::new("abc")).await;

        assert!(outcome.is_failure());
        let container = document.get_element_by_id(NAV_CONTAINER_ID).unwrap();
        assert_eq!(container.children().len(), 1);
        assert_eq!(container.children()[0].classes(), [NAV_ERROR_CLASS.to_string()]);
        assert_eq!(nav_texts(&document), vec!["Меню недоступно"]);
    }

    #[tokio::test]
    async fn hung_fetch_times_out() {
        let renderer = MenuRenderer::new(StubSource::new(Reply::Hang)).with_timeout(Duration::from_millis(20));
        let mut document = Document::admin_page();

        let outcome = renderer.render(&mut document, &SessionToken::new("abc")).await;

        assert!(matches!(outcome, RenderOutcome::Failed(MenuFetchError::Timeout)));
    }

    #[test]
    fn render_items_counts_only_appended() {
        let mut container = Element::new("ul").with_id(NAV_CONTAINER_ID);
        let menu = MenuResponse::new(["users", "nope", "roles"]);
        let titles = MenuTitles::russian_defaults();

        assert_eq!(render_items(&mut container, &menu, Some(&titles)), 2);
        assert_eq!(render_items(&mut container, &menu, None), 3);
        assert_eq!(container.children().len(), 3);
    }
}

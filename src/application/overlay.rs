use crate::domain::content::{extract_main_content, prepare_summary};
use crate::domain::links::{decide_link_click, LinkDecision};
use crate::domain::models::{Appearance, Message};
use crate::domain::theme::{appearance_classes, is_theme_marker, OVERLAY_ID};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::gemini_client::{summarize_or_fallback, PromptVariant, Summarizer};
use crate::infrastructure::page_fetcher::PageFetcher;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use url::Url;

const LOADING_TITLE: &str = "AI Minimalized View";
const CONTENT_TITLE: &str = "AI Summarized";
const LOADING_TEXT: &str = "Generating minimal view with Gemini AI...";

/// The page the overlay sits on top of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub url: Url,
    pub html: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OverlayView {
    Hidden,
    Loading { generation: u64 },
    Content { generation: u64, html: String },
}

impl OverlayView {
    fn is_current(&self, generation: u64) -> bool {
        matches!(self, Self::Loading { generation: current } if *current == generation)
    }
}

/// What the overlay has done to the host document's root element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRoot {
    pub classes: BTreeSet<String>,
    pub scroll_locked: bool,
    pub style_injected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlaySnapshot {
    pub view: OverlayView,
    pub root: DocumentRoot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markup: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkClickOutcome {
    /// Default navigation proceeds.
    PassThrough,
    Summarized(OverlayView),
}

#[derive(Debug, Default)]
struct OverlayInner {
    view: Option<OverlayView>,
    root: DocumentRoot,
    overlay_classes: Vec<String>,
    appearance: Appearance,
    page: Option<PageSnapshot>,
    generation: u64,
}

impl OverlayInner {
    fn view(&self) -> OverlayView {
        self.view.clone().unwrap_or(OverlayView::Hidden)
    }

    fn snapshot(&self) -> OverlaySnapshot {
        let view = self.view();
        let markup = render_markup(&view, &self.overlay_classes);
        OverlaySnapshot {
            view,
            root: self.root.clone(),
            markup,
        }
    }

    fn apply_root_classes(&mut self) {
        self.root.classes.retain(|class| !is_theme_marker(class));
        self.root
            .classes
            .extend(appearance_classes(self.appearance));
    }
}

/// Per-page overlay state machine: Hidden, Loading, Content.
pub struct OverlayController<S, F>
where
    S: Summarizer,
    F: PageFetcher,
{
    summarizer: Arc<S>,
    fetcher: Arc<F>,
    inner: Mutex<OverlayInner>,
    updates: watch::Sender<OverlaySnapshot>,
}

impl<S, F> OverlayController<S, F>
where
    S: Summarizer,
    F: PageFetcher,
{
    pub fn new(summarizer: Arc<S>, fetcher: Arc<F>, appearance: Appearance) -> Self {
        let inner = OverlayInner {
            appearance,
            ..OverlayInner::default()
        };
        let (updates, _) = watch::channel(inner.snapshot());
        Self {
            summarizer,
            fetcher,
            inner: Mutex::new(inner),
            updates,
        }
    }

    /// Receives a snapshot after every visible state change.
    pub fn subscribe(&self) -> watch::Receiver<OverlaySnapshot> {
        self.updates.subscribe()
    }

    pub fn load_page(&self, page: PageSnapshot) -> Result<(), InfraError> {
        let mut inner = self.lock_inner()?;
        if inner.page.as_ref().is_some_and(|current| current.url != page.url) {
            tracing::debug!(url = %page.url, "page replaced; overlay torn down");
            inner.view = None;
            inner.root = DocumentRoot::default();
            inner.overlay_classes.clear();
            inner.generation += 1;
            self.publish(&inner);
        }
        inner.page = Some(page);
        Ok(())
    }

    pub fn view(&self) -> Result<OverlayView, InfraError> {
        Ok(self.lock_inner()?.view())
    }

    pub fn snapshot(&self) -> Result<OverlaySnapshot, InfraError> {
        Ok(self.lock_inner()?.snapshot())
    }

    /// Summarizes the current page into the overlay.
    pub async fn minimalize(&self, variant: PromptVariant) -> Result<OverlayView, InfraError> {
        let (fragment, page_url, generation) = {
            let mut inner = self.lock_inner()?;
            let page = inner
                .page
                .clone()
                .ok_or_else(|| InfraError::InvalidConfig("no page loaded for overlay".to_string()))?;
            let generation = begin_loading(&mut inner);
            self.publish(&inner);
            (extract_main_content(&page.html), page.url, generation)
        };
        self.summarize_into(generation, &fragment, &page_url, variant).await
    }

    pub async fn click_link(&self, href: &str) -> Result<LinkClickOutcome, InfraError> {
        let (target, page_url, previous, generation) = {
            let mut inner = self.lock_inner()?;
            let Some(page) = inner.page.clone() else {
                return Ok(LinkClickOutcome::PassThrough);
            };
            if matches!(inner.view(), OverlayView::Hidden) {
                return Ok(LinkClickOutcome::PassThrough);
            }
            let LinkDecision::Intercept(target) = decide_link_click(href, &page.url) else {
                return Ok(LinkClickOutcome::PassThrough);
            };
            let previous = inner.view.clone();
            let generation = begin_loading(&mut inner);
            self.publish(&inner);
            (target, page.url, previous, generation)
        };

        let html = match self.fetcher.fetch_html(&target).await {
            Ok(html) => html,
            Err(error) => {
                tracing::warn!(url = %target, %error, "in-overlay navigation failed; passing through");
                let mut inner = self.lock_inner()?;
                if inner.view().is_current(generation) {
                    inner.view = previous;
                    self.publish(&inner);
                }
                return Ok(LinkClickOutcome::PassThrough);
            }
        };

        let fragment = extract_main_content(&html);
        let view = self
            .summarize_into(generation, &fragment, &page_url, PromptVariant::Minimal)
            .await?;
        Ok(LinkClickOutcome::Summarized(view))
    }

    /// Removes the overlay and every marker it put on the document root.
    pub fn exit(&self) -> Result<(), InfraError> {
        let mut inner = self.lock_inner()?;
        inner.view = None;
        inner.overlay_classes.clear();
        inner.root.classes.retain(|class| !is_theme_marker(class));
        inner.root.scroll_locked = false;
        self.publish(&inner);
        Ok(())
    }

    /// Restyles in place; any visible content is kept as is.
    pub fn set_theme(&self, appearance: Appearance) -> Result<(), InfraError> {
        let mut inner = self.lock_inner()?;
        inner.appearance = appearance;
        inner.apply_root_classes();
        if inner.view.is_some() {
            inner.overlay_classes = appearance_classes(appearance);
        }
        self.publish(&inner);
        Ok(())
    }

    /// Page-context side of the message bus. Returns false for messages the
    /// page does not handle.
    pub async fn handle_message(&self, message: &Message) -> Result<bool, InfraError> {
        match message {
            Message::AiMinimalize => {
                self.minimalize(PromptVariant::Minimal).await?;
            }
            Message::AiContentOnly => {
                self.minimalize(PromptVariant::ContentOnly).await?;
            }
            Message::ThemeChange { theme, mode } => {
                self.set_theme(Appearance {
                    theme: *theme,
                    mode: *mode,
                })?;
            }
            other => {
                tracing::debug!(message = other.type_name(), "page ignores message");
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn summarize_into(
        &self,
        generation: u64,
        fragment: &str,
        page_url: &Url,
        variant: PromptVariant,
    ) -> Result<OverlayView, InfraError> {
        let raw = summarize_or_fallback(self.summarizer.as_ref(), fragment, variant).await;
        let html = prepare_summary(&raw, page_url);

        let mut inner = self.lock_inner()?;
        if !inner.view().is_current(generation) {
            tracing::debug!(generation, current = inner.generation, "discarding stale summary");
            return Ok(inner.view());
        }
        let view = OverlayView::Content { generation, html };
        inner.view = Some(view.clone());
        self.publish(&inner);
        Ok(view)
    }

    fn publish(&self, inner: &OverlayInner) {
        self.updates.send_replace(inner.snapshot());
    }

    fn lock_inner(&self) -> Result<MutexGuard<'_, OverlayInner>, InfraError> {
        self.inner
            .lock()
            .map_err(|error| InfraError::LockPoisoned(format!("overlay: {error}")))
    }
}

fn begin_loading(inner: &mut OverlayInner) -> u64 {
    inner.generation += 1;
    let generation = inner.generation;
    inner.view = Some(OverlayView::Loading { generation });
    inner.apply_root_classes();
    inner.root.scroll_locked = true;
    inner.root.style_injected = true;
    inner.overlay_classes = appearance_classes(inner.appearance);
    generation
}

fn render_markup(view: &OverlayView, classes: &[String]) -> Option<String> {
    let class_attr = classes.join(" ");
    let (title, body) = match view {
        OverlayView::Hidden => return None,
        OverlayView::Loading { .. } => (
            LOADING_TITLE,
            format!(
                r#"<div class="clavi-overlay-content clavi-loading"><div>{LOADING_TEXT}</div><div class="clavi-spinner"></div></div>"#
            ),
        ),
        OverlayView::Content { html, .. } => (
            CONTENT_TITLE,
            format!(
                r#"<div class="clavi-overlay-content"><section class="clavi-main-content">{html}</section></div>"#
            ),
        ),
    };
    Some(format!(
        r#"<div id="{OVERLAY_ID}" class="{class_attr}"><div class="clavi-overlay-bar"><span>{title}</span><button id="clavi-exit-btn" title="Exit">&times;</button></div>{body}</div>"#
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ColorMode, ThemeName};
    use crate::infrastructure::error::SummarizeError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    #[derive(Default)]
    struct ScriptedSummarizer {
        reply: Mutex<Option<Result<String, SummarizeError>>>,
        prompts: Mutex<Vec<(String, PromptVariant)>>,
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedSummarizer {
        fn replying(reply: Result<String, SummarizeError>) -> Self {
            Self {
                reply: Mutex::new(Some(reply)),
                ..Self::default()
            }
        }

        fn gated(reply: &str, gate: Arc<Notify>) -> Self {
            Self {
                reply: Mutex::new(Some(Ok(reply.to_string()))),
                gate: Some(gate),
                ..Self::default()
            }
        }

        fn prompts(&self) -> Vec<(String, PromptVariant)> {
            self.prompts.lock().expect("prompts").clone()
        }
    }

    #[async_trait]
    impl Summarizer for ScriptedSummarizer {
        async fn summarize(&self, fragment: &str, variant: PromptVariant) -> Result<String, SummarizeError> {
            self.prompts
                .lock()
                .expect("prompts")
                .push((fragment.to_string(), variant));
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.reply
                .lock()
                .expect("reply")
                .clone()
                .unwrap_or(Err(SummarizeError::EmptyResponse))
        }
    }

    #[derive(Default)]
    struct MapFetcher {
        pages: HashMap<String, String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PageFetcher for MapFetcher {
        async fn fetch_html(&self, url: &Url) -> Result<String, InfraError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.pages
                .get(url.as_str())
                .cloned()
                .ok_or_else(|| InfraError::Http(format!("no page at {url}")))
        }
    }

    fn page() -> PageSnapshot {
        PageSnapshot {
            url: Url::parse("https://site.example/articles/today").expect("url"),
            html: "<html><body><nav>menu</nav><main><h1>Story</h1><p>Body</p></main></body></html>"
                .to_string(),
        }
    }

    fn controller(
        summarizer: ScriptedSummarizer,
        fetcher: MapFetcher,
    ) -> OverlayController<ScriptedSummarizer, MapFetcher> {
        let controller = OverlayController::new(
            Arc::new(summarizer),
            Arc::new(fetcher),
            Appearance {
                theme: ThemeName::Gentle,
                mode: ColorMode::Dark,
            },
        );
        controller.load_page(page()).expect("load page");
        controller
    }

    #[tokio::test]
    async fn minimalize_sends_main_content_and_shows_sanitized_result() {
        let overlay = controller(
            ScriptedSummarizer::replying(Ok(
                "```html\n<h1>Story</h1><script>alert(1)</script><a href=\"http://other.example/x\">more</a>\n```"
                    .to_string(),
            )),
            MapFetcher::default(),
        );

        let view = overlay.minimalize(PromptVariant::Minimal).await.expect("minimalize");
        let OverlayView::Content { html, .. } = view else {
            panic!("expected content view");
        };
        assert!(html.contains("<h1>Story</h1>"));
        assert!(!html.contains("script"));
        assert!(html.contains("https://site.example/x"));

        let prompts = overlay.summarizer.prompts();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].0, "<h1>Story</h1><p>Body</p>");
    }

    #[tokio::test]
    async fn showing_marks_the_root_and_exit_clears_it() {
        let overlay = controller(ScriptedSummarizer::replying(Ok("<p>x</p>".to_string())), MapFetcher::default());
        overlay.minimalize(PromptVariant::ContentOnly).await.expect("minimalize");

        let shown = overlay.snapshot().expect("snapshot");
        assert!(shown.root.scroll_locked);
        assert!(shown.root.classes.contains("clavi-theme-gentle"));
        assert!(shown.root.classes.contains("dark"));
        let markup = shown.markup.expect("markup");
        assert!(markup.contains(CONTENT_TITLE));
        assert!(markup.contains(r#"<section class="clavi-main-content"><p>x</p></section>"#));

        overlay.exit().expect("exit");
        let hidden = overlay.snapshot().expect("snapshot");
        assert_eq!(hidden.view, OverlayView::Hidden);
        assert!(hidden.root.classes.is_empty());
        assert!(!hidden.root.scroll_locked);
        assert!(hidden.markup.is_none());
    }

    #[tokio::test]
    async fn summarizer_failure_shows_fallback_markup() {
        let overlay = controller(
            ScriptedSummarizer::replying(Err(SummarizeError::Transport("down".to_string()))),
            MapFetcher::default(),
        );
        let view = overlay.minimalize(PromptVariant::Minimal).await.expect("minimalize");
        assert!(matches!(view, OverlayView::Content { html, .. } if html.contains("AI request failed.")));
    }

    #[tokio::test]
    async fn theme_change_restyles_without_rebuilding_content() {
        let overlay = controller(ScriptedSummarizer::replying(Ok("<p>kept</p>".to_string())), MapFetcher::default());
        let before = overlay.minimalize(PromptVariant::Minimal).await.expect("minimalize");

        let handled = overlay
            .handle_message(&Message::ThemeChange {
                theme: ThemeName::HighContrast,
                mode: ColorMode::Light,
            })
            .await
            .expect("theme change");
        assert!(handled);

        let snapshot = overlay.snapshot().expect("snapshot");
        assert_eq!(snapshot.view, before);
        assert!(snapshot.root.classes.contains("clavi-theme-high-contrast"));
        assert!(snapshot.root.classes.contains("light"));
        assert!(!snapshot.root.classes.contains("clavi-theme-gentle"));
        assert!(!snapshot.root.classes.contains("dark"));
        assert_eq!(overlay.summarizer.prompts().len(), 1);
    }

    #[tokio::test]
    async fn exit_while_loading_discards_the_late_result() {
        let gate = Arc::new(Notify::new());
        let overlay = Arc::new(controller(
            ScriptedSummarizer::gated("<p>late</p>", Arc::clone(&gate)),
            MapFetcher::default(),
        ));

        let pending = {
            let overlay = Arc::clone(&overlay);
            tokio::spawn(async move { overlay.minimalize(PromptVariant::Minimal).await })
        };
        while overlay.summarizer.prompts().is_empty() {
            tokio::task::yield_now().await;
        }
        assert!(matches!(overlay.view().expect("view"), OverlayView::Loading { .. }));

        overlay.exit().expect("exit");
        gate.notify_one();
        let view = pending.await.expect("join").expect("minimalize");

        assert_eq!(view, OverlayView::Hidden);
        assert_eq!(overlay.view().expect("view"), OverlayView::Hidden);
    }

    #[tokio::test]
    async fn newer_request_wins_over_older_one() {
        let gate = Arc::new(Notify::new());
        let overlay = Arc::new(controller(
            ScriptedSummarizer::gated("<p>result</p>", Arc::clone(&gate)),
            MapFetcher::default(),
        ));

        let first = {
            let overlay = Arc::clone(&overlay);
            tokio::spawn(async move { overlay.minimalize(PromptVariant::Minimal).await })
        };
        while overlay.summarizer.prompts().is_empty() {
            tokio::task::yield_now().await;
        }
        let second = {
            let overlay = Arc::clone(&overlay);
            tokio::spawn(async move { overlay.minimalize(PromptVariant::ContentOnly).await })
        };
        while overlay.summarizer.prompts().len() < 2 {
            tokio::task::yield_now().await;
        }

        gate.notify_waiters();
        let first_view = first.await.expect("join").expect("first");
        let second_view = second.await.expect("join").expect("second");

        assert!(matches!(second_view, OverlayView::Content { generation: 2, .. }));
        assert!(!matches!(first_view, OverlayView::Content { generation: 1, .. }));
        assert!(matches!(overlay.view().expect("view"), OverlayView::Content { generation: 2, .. }));
    }

    #[tokio::test]
    async fn same_host_link_is_fetched_and_summarized() {
        let mut fetcher = MapFetcher::default();
        fetcher.pages.insert(
            "https://site.example/next".to_string(),
            "<html><body><article><p>Next page</p></article></body></html>".to_string(),
        );
        let overlay = controller(ScriptedSummarizer::replying(Ok("<p>next</p>".to_string())), fetcher);
        overlay.minimalize(PromptVariant::ContentOnly).await.expect("minimalize");

        let outcome = overlay.click_link("http://site.example/next").await.expect("click");
        assert!(matches!(outcome, LinkClickOutcome::Summarized(OverlayView::Content { .. })));

        let prompts = overlay.summarizer.prompts();
        assert_eq!(prompts[1], ("<p>Next page</p>".to_string(), PromptVariant::Minimal));
    }

    #[tokio::test]
    async fn other_host_link_passes_through_without_fetching() {
        let overlay = controller(ScriptedSummarizer::replying(Ok("<p>x</p>".to_string())), MapFetcher::default());
        overlay.minimalize(PromptVariant::Minimal).await.expect("minimalize");

        let outcome = overlay.click_link("https://elsewhere.example/").await.expect("click");
        assert_eq!(outcome, LinkClickOutcome::PassThrough);
        assert_eq!(overlay.fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_fetch_restores_previous_content() {
        let overlay = controller(ScriptedSummarizer::replying(Ok("<p>first</p>".to_string())), MapFetcher::default());
        let shown = overlay.minimalize(PromptVariant::Minimal).await.expect("minimalize");

        let outcome = overlay.click_link("/missing").await.expect("click");
        assert_eq!(outcome, LinkClickOutcome::PassThrough);
        assert_eq!(overlay.view().expect("view"), shown);
    }

    #[tokio::test]
    async fn subscribers_see_loading_then_content() {
        let overlay = controller(ScriptedSummarizer::replying(Ok("<p>done</p>".to_string())), MapFetcher::default());
        let mut updates = overlay.subscribe();
        assert_eq!(updates.borrow_and_update().view, OverlayView::Hidden);

        overlay.minimalize(PromptVariant::Minimal).await.expect("minimalize");
        assert!(updates.has_changed().expect("sender alive"));
        let latest = updates.borrow_and_update().clone();
        assert!(matches!(latest.view, OverlayView::Content { generation: 1, .. }));
        assert!(latest.markup.expect("markup").contains(CONTENT_TITLE));
    }

    #[test]
    fn loading_markup_shows_spinner_and_loading_title() {
        let markup = render_markup(&OverlayView::Loading { generation: 1 }, &["light".to_string()])
            .expect("markup");
        assert!(markup.contains(LOADING_TITLE));
        assert!(markup.contains("clavi-spinner"));
        assert!(markup.contains(r#"class="light""#));
    }

    #[tokio::test]
    async fn minimalize_without_page_is_an_error() {
        let overlay = OverlayController::new(
            Arc::new(ScriptedSummarizer::default()),
            Arc::new(MapFetcher::default()),
            Appearance::default(),
        );
        assert!(matches!(
            overlay.minimalize(PromptVariant::Minimal).await,
            Err(InfraError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn background_only_messages_are_ignored() {
        let overlay = controller(ScriptedSummarizer::default(), MapFetcher::default());
        let handled = overlay
            .handle_message(&Message::BlocklistUpdate { blocklist: vec![] })
            .await
            .expect("handle");
        assert!(!handled);
        assert_eq!(overlay.view().expect("view"), OverlayView::Hidden);
    }
}

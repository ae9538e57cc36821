use crate::application::background::{BackgroundOutcome, BackgroundService};
use crate::application::commands::{close_surface_impl, dispatch_command, AppState, ControlCommand};
use crate::application::overlay::{LinkClickOutcome, OverlayController, OverlaySnapshot, PageSnapshot};
use crate::application::pomodoro::{run_ticker, TickerSource};
use crate::domain::blocking::RuleUpdate;
use crate::domain::models::{Message, SystemNotification};
use crate::domain::theme::{overlay_stylesheet, OVERLAY_STYLE_ID};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::gemini_client::Summarizer;
use crate::infrastructure::page_fetcher::PageFetcher;
use crate::infrastructure::rule_engine::RuleEngine;
use crate::infrastructure::runtime::RuntimeEvent;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;

/// One inbound JSON line.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HostRequest {
    Command {
        command: ControlCommand,
    },
    Message {
        message: Message,
    },
    /// A message for the page context, optionally carrying the page it runs on.
    Page {
        #[serde(default)]
        page: Option<PageSnapshot>,
        message: Message,
    },
    LinkClick {
        href: String,
    },
    ExitOverlay,
}

/// One outbound JSON line.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HostEvent {
    Ready {
        app_name: String,
        style_id: String,
        stylesheet: String,
    },
    Notification(SystemNotification),
    Message {
        message: Message,
    },
    Rules {
        update: RuleUpdate,
    },
    Overlay {
        snapshot: OverlaySnapshot,
    },
    /// The overlay declined a link click; the browser should navigate normally.
    Navigate {
        href: String,
    },
    CommandResult {
        command: String,
        result: serde_json::Value,
    },
    Error {
        context: String,
        message: String,
    },
}

impl HostEvent {
    fn error(context: &str, message: impl ToString) -> Self {
        Self::Error {
            context: context.to_string(),
            message: message.to_string(),
        }
    }
}

pub struct Host<E, S, F>
where
    E: RuleEngine + 'static,
    S: Summarizer + 'static,
    F: PageFetcher + 'static,
{
    state: Arc<AppState>,
    background: Arc<BackgroundService<E>>,
    overlay: Option<Arc<OverlayController<S, F>>>,
}

impl<E, S, F> Host<E, S, F>
where
    E: RuleEngine + 'static,
    S: Summarizer + 'static,
    F: PageFetcher + 'static,
{
    pub fn new(
        state: Arc<AppState>,
        background: Arc<BackgroundService<E>>,
        overlay: Option<Arc<OverlayController<S, F>>>,
    ) -> Self {
        Self {
            state,
            background,
            overlay,
        }
    }

    /// Runs until the reader reaches EOF, then stops both tickers, waits for
    /// in-flight overlay work and flushes pending events.
    pub async fn run<R, W>(
        self,
        reader: R,
        mut writer: W,
        mut runtime_events: mpsc::UnboundedReceiver<RuntimeEvent>,
    ) -> Result<(), InfraError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel();
        let mut overlay_updates = self.overlay.as_ref().map(|overlay| overlay.subscribe());

        write_event(
            &mut writer,
            &HostEvent::Ready {
                app_name: self.state.config().app_name.clone(),
                style_id: OVERLAY_STYLE_ID.to_string(),
                stylesheet: overlay_stylesheet(),
            },
        )
        .await?;

        match self.background.startup().await {
            Ok(report) => {
                if report.resume_ticker {
                    tracing::info!("resuming running pomodoro");
                }
                write_event(&mut writer, &HostEvent::Rules { update: report.rules.update }).await?;
            }
            Err(error) => write_event(&mut writer, &HostEvent::error("startup", &error)).await?,
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let background_ticker = tokio::spawn(run_ticker(
            Arc::clone(self.state.timer()),
            TickerSource::Background,
            shutdown_rx,
        ));

        let mut tasks = JoinSet::new();
        let mut lines = reader.lines();
        loop {
            tokio::select! {
                line = lines.next_line() => {
                    match line? {
                        Some(line) => self.handle_line(&line, &outbound, &mut tasks).await,
                        None => break,
                    }
                }
                Some(event) = runtime_events.recv() => {
                    self.handle_runtime_event(event, &outbound, &mut tasks).await;
                }
                Some(joined) = tasks.join_next() => log_task_exit(joined),
                Some(event) = outbound_rx.recv() => write_event(&mut writer, &event).await?,
                Some(snapshot) = next_overlay_snapshot(&mut overlay_updates) => {
                    write_event(&mut writer, &HostEvent::Overlay { snapshot }).await?;
                }
            }
        }

        let _ = shutdown.send(true);
        if let Err(error) = close_surface_impl(&self.state) {
            tracing::warn!(%error, "failed closing surface on shutdown");
        }
        if let Err(error) = background_ticker.await {
            tracing::warn!(%error, "background ticker did not stop cleanly");
        }
        while let Ok(event) = runtime_events.try_recv() {
            self.handle_runtime_event(event, &outbound, &mut tasks).await;
        }
        while let Some(joined) = tasks.join_next().await {
            log_task_exit(joined);
        }
        if let Some(receiver) = overlay_updates.as_mut() {
            if receiver.has_changed().unwrap_or(false) {
                let snapshot = receiver.borrow_and_update().clone();
                write_event(&mut writer, &HostEvent::Overlay { snapshot }).await?;
            }
        }
        while let Ok(event) = outbound_rx.try_recv() {
            write_event(&mut writer, &event).await?;
        }
        tracing::info!("host input closed; shut down");
        Ok(())
    }

    async fn handle_line(
        &self,
        line: &str,
        outbound: &mpsc::UnboundedSender<HostEvent>,
        tasks: &mut JoinSet<()>,
    ) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        let request = match serde_json::from_str::<HostRequest>(line) {
            Ok(request) => request,
            Err(error) => {
                tracing::warn!(%error, "unparseable host request");
                let _ = outbound.send(HostEvent::error("request", format!("invalid request: {error}")));
                return;
            }
        };

        match request {
            HostRequest::Command { command } => {
                let name = command.name();
                let event = match dispatch_command(&self.state, command) {
                    Ok(result) => HostEvent::CommandResult {
                        command: name.to_string(),
                        result,
                    },
                    Err(message) => HostEvent::error(name, message),
                };
                let _ = outbound.send(event);
            }
            HostRequest::Message { message } => self.route_message(message, outbound, tasks).await,
            HostRequest::Page { page, message } => {
                if let (Some(page), Some(overlay)) = (page, self.overlay.as_ref()) {
                    if let Err(error) = overlay.load_page(page) {
                        let _ = outbound.send(HostEvent::error("page", &error));
                        return;
                    }
                }
                self.route_message(message, outbound, tasks).await;
            }
            HostRequest::LinkClick { href } => self.spawn_link_click(href, outbound, tasks),
            HostRequest::ExitOverlay => {
                if let Some(overlay) = self.overlay.as_ref() {
                    if let Err(error) = overlay.exit() {
                        let _ = outbound.send(HostEvent::error("exit_overlay", &error));
                    }
                }
            }
        }
    }

    async fn handle_runtime_event(
        &self,
        event: RuntimeEvent,
        outbound: &mpsc::UnboundedSender<HostEvent>,
        tasks: &mut JoinSet<()>,
    ) {
        match event {
            RuntimeEvent::Notification(notification) => {
                let _ = outbound.send(HostEvent::Notification(notification));
            }
            RuntimeEvent::Message(message) => self.route_message(message, outbound, tasks).await,
        }
    }

    /// Delivers a bus message to whichever context listens for it.
    async fn route_message(
        &self,
        message: Message,
        outbound: &mpsc::UnboundedSender<HostEvent>,
        tasks: &mut JoinSet<()>,
    ) {
        match message {
            Message::AiNudge { ref nudge } => {
                if let Err(error) = self.state.record_nudge(nudge) {
                    tracing::warn!(%error, "failed recording nudge");
                }
                let _ = outbound.send(HostEvent::Message { message });
            }
            Message::AiMinimalize | Message::AiContentOnly | Message::ThemeChange { .. } => {
                self.spawn_page_message(message, outbound, tasks);
            }
            message => {
                let kind = message.type_name();
                match self.background.handle(message).await {
                    Ok(BackgroundOutcome::RulesSynced(report)) => {
                        let _ = outbound.send(HostEvent::Rules { update: report.update });
                    }
                    Ok(_) => {}
                    Err(error) => {
                        let _ = outbound.send(HostEvent::error(kind, &error));
                    }
                }
            }
        }
    }

    fn spawn_page_message(
        &self,
        message: Message,
        outbound: &mpsc::UnboundedSender<HostEvent>,
        tasks: &mut JoinSet<()>,
    ) {
        let Some(overlay) = self.overlay.clone() else {
            tracing::debug!(message = message.type_name(), "no overlay; page message dropped");
            if !matches!(message, Message::ThemeChange { .. }) {
                let _ = outbound.send(HostEvent::error(
                    message.type_name(),
                    "summarizer unavailable; set the configured api key variable",
                ));
            }
            return;
        };
        let outbound = outbound.clone();
        tasks.spawn(async move {
            if let Err(error) = overlay.handle_message(&message).await {
                let _ = outbound.send(HostEvent::error(message.type_name(), &error));
            }
        });
    }

    fn spawn_link_click(
        &self,
        href: String,
        outbound: &mpsc::UnboundedSender<HostEvent>,
        tasks: &mut JoinSet<()>,
    ) {
        let Some(overlay) = self.overlay.clone() else {
            let _ = outbound.send(HostEvent::Navigate { href });
            return;
        };
        let outbound = outbound.clone();
        tasks.spawn(async move {
            match overlay.click_link(&href).await {
                Ok(LinkClickOutcome::PassThrough) => {
                    let _ = outbound.send(HostEvent::Navigate { href });
                }
                Ok(LinkClickOutcome::Summarized(_)) => {}
                Err(error) => {
                    let _ = outbound.send(HostEvent::error("link_click", &error));
                }
            }
        });
    }
}

async fn next_overlay_snapshot(
    updates: &mut Option<watch::Receiver<OverlaySnapshot>>,
) -> Option<OverlaySnapshot> {
    let Some(receiver) = updates.as_mut() else {
        return std::future::pending().await;
    };
    if receiver.changed().await.is_err() {
        *updates = None;
        return None;
    }
    Some(receiver.borrow_and_update().clone())
}

fn log_task_exit(joined: Result<(), tokio::task::JoinError>) {
    if let Err(error) = joined {
        tracing::warn!(%error, "overlay task failed");
    }
}

async fn write_event<W>(writer: &mut W, event: &HostEvent) -> Result<(), InfraError>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_string(event)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

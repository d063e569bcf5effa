//! Launcher session
//!
//! [`LauncherSession`] is what a front end drives. It exposes the triggers a
//! UI wires to its controls (started, terms accepted/declined, run the app,
//! exit) and reports back exclusively through the injected [`SyncObserver`].
//!
//! - [`paths`] - install layout and the terms marker
//! - [`starter`] - [`ProcessHandoff`], which starts the installed binary

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::app::client::UpdateClient;
use crate::app::sync::{
    Handoff, SyncEvent, SyncObserver, SyncOptions, SyncOrchestrator, SyncReport,
};
use crate::constants::{install, messages};
use crate::errors::{ErrorKind, LaunchResult, SyncError, SyncResult};

pub mod paths;
pub mod starter;

pub use paths::{InstallLayout, InstallMode};
pub use starter::ProcessHandoff;

/// What `on_started` ended with
#[derive(Debug)]
pub enum StartOutcome {
    /// The terms were shown; waiting for `on_eula_accepted` or `on_eula_declined`
    AwaitingEula,
    /// The terms were already accepted and a sync ran to completion
    Synced(SyncReport),
}

/// One launcher instance bound to an install layout and an update service
pub struct LauncherSession {
    layout: InstallLayout,
    client: UpdateClient,
    observer: Arc<dyn SyncObserver>,
    handoff: Arc<dyn Handoff>,
    options: SyncOptions,
    eula_item: String,
    shutdown: Option<CancellationToken>,
}

impl LauncherSession {
    pub fn new(
        layout: InstallLayout,
        client: UpdateClient,
        observer: Arc<dyn SyncObserver>,
        handoff: Arc<dyn Handoff>,
    ) -> Self {
        Self {
            layout,
            client,
            observer,
            handoff,
            options: SyncOptions::default(),
            eula_item: install::EULA_ITEM.to_string(),
            shutdown: None,
        }
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Service item holding the terms text
    pub fn with_eula_item(mut self, item: impl Into<String>) -> Self {
        self.eula_item = item.into();
        self
    }

    /// Stop between steps once `shutdown` is cancelled, including a
    /// cancellation that happened before this session was created
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn layout(&self) -> &InstallLayout {
        &self.layout
    }

    /// The front end is ready
    ///
    /// Sets the title and header, then either shows the terms (first run) or
    /// goes straight into a sync.
    pub async fn on_started(&self) -> SyncResult<StartOutcome> {
        self.observer
            .notify(SyncEvent::SetTitle(messages::APP_TITLE.to_string()));

        let header = if self.layout.first_install() {
            messages::FIRST_TIME_HEADER_TEXT
        } else {
            messages::HEADER_TEXT
        };
        self.observer.notify(SyncEvent::SetHeaderText(header.to_string()));

        if self.layout.eula_accepted() {
            self.run_sync().await.map(StartOutcome::Synced)
        } else {
            if self.cancelled() {
                return Err(self.report(SyncError::Cancelled));
            }
            info!("Terms not yet accepted, fetching {}", self.eula_item);
            match self.show_eula().await {
                Ok(()) => Ok(StartOutcome::AwaitingEula),
                Err(e) => Err(self.report(e)),
            }
        }
    }

    /// The user accepted the terms: record it and sync
    pub async fn on_eula_accepted(&self) -> SyncResult<SyncReport> {
        if let Err(e) = self.layout.accept_eula().await {
            warn!(
                "Could not create {}: {}",
                self.layout.eula_marker().display(),
                e
            );
        }
        self.run_sync().await
    }

    /// The user declined the terms
    pub fn on_eula_declined(&self) {
        info!("Terms declined");
        self.observer.notify(SyncEvent::Exit);
    }

    /// Start whatever is currently installed
    pub fn on_run_app(&self) -> LaunchResult<()> {
        match self.handoff.hand_off() {
            Ok(()) => {
                self.observer.notify(SyncEvent::Exit);
                Ok(())
            }
            Err(e) => {
                warn!("{}", e);
                self.notify_error(e.to_string(), ErrorKind::LaunchFailure);
                Err(e)
            }
        }
    }

    pub fn on_exit(&self) {
        self.observer.notify(SyncEvent::Exit);
    }

    /// Sync the app folder against the service, then hand off
    pub async fn run_sync(&self) -> SyncResult<SyncReport> {
        let mut orchestrator = SyncOrchestrator::new(
            self.client.clone(),
            Arc::clone(&self.observer),
            Arc::clone(&self.handoff),
        )
        .with_options(self.options);

        if let Some(shutdown) = &self.shutdown {
            orchestrator = orchestrator.with_shutdown(shutdown.clone());
        }

        orchestrator
            .run(self.layout.cache_file(), self.layout.app_dir())
            .await
    }

    pub fn cancelled(&self) -> bool {
        self.shutdown
            .as_ref()
            .map_or(false, CancellationToken::is_cancelled)
    }

    /// Download the terms into the app folder and show them
    async fn show_eula(&self) -> SyncResult<()> {
        let app_dir = self.layout.app_dir();
        tokio::fs::create_dir_all(app_dir)
            .await
            .map_err(|source| SyncError::CreateDirectory {
                path: app_dir.to_path_buf(),
                source,
            })?;

        let destination = app_dir.join(&self.eula_item);
        self.client
            .download_file(&self.eula_item, &destination, |_| {})
            .await?;

        let text = tokio::fs::read(&destination)
            .await
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or_default();
        self.observer.notify(SyncEvent::ShowEula(text));
        Ok(())
    }

    /// Emit the error notification for `error` and hand it back
    fn report(&self, error: SyncError) -> SyncError {
        warn!("{}", error);
        self.notify_error(error.user_message(), error.kind());
        error
    }

    fn notify_error(&self, message: String, kind: ErrorKind) {
        self.observer.notify(SyncEvent::Error {
            message,
            kind,
            previous_install: self.handoff.installed(),
        });
    }
}

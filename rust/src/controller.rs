//! Drives a [`ProposalSession`] against a [`ProposalBackend`] and turns every
//! user action into a [`UiUpdate`] the page can apply as-is.

use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use crate::backend::ProposalBackend;
use crate::messages;
use crate::proposal::ProductForm;
use crate::renderer::{
    document_file_name, render_document, render_image_grid, render_proposal, Letterhead,
    ProposalView,
};
use crate::session::{PhaseName, ProposalSession, SessionError};

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub image_count: usize,
    pub mobile_breakpoint_px: u32,
    pub letterhead: Letterhead,
}

/// What the page must change after an action. Optional parts are only
/// present when that part of the page has to be replaced.
#[derive(Debug, Clone, Serialize)]
pub struct UiUpdate {
    pub phase: PhaseName,
    pub busy: bool,
    pub tile_count: usize,
    pub selected_index: Option<usize>,
    pub generate_enabled: bool,
    pub show_selection_area: bool,
    pub scroll_into_view: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tiles_html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hero_swap: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedDocument {
    pub file_name: String,
    pub html: String,
}

pub struct ProposalController<B> {
    backend: B,
    settings: ControllerSettings,
    session: Mutex<ProposalSession>,
}

impl<B: ProposalBackend> ProposalController<B> {
    pub fn new(backend: B, settings: ControllerSettings) -> Self {
        Self {
            backend,
            settings,
            session: Mutex::new(ProposalSession::new()),
        }
    }

    /// Page load: drops whatever the previous page left behind.
    pub fn init(&self) -> UiUpdate {
        let mut session = self.lock_session();
        session.reset();
        let mut update = self.update(&session);
        update.tiles_html = Some(String::new());
        update
    }

    pub fn snapshot(&self) -> UiUpdate {
        let session = self.lock_session();
        self.update(&session)
    }

    pub async fn search(&self, product_name: &str) -> UiUpdate {
        let (plan, pending) = {
            let mut session = self.lock_session();
            match session.begin_search(product_name, self.settings.image_count) {
                Ok(plan) => (
                    plan,
                    PendingCall::new(&self.session, PendingKind::Search, session.epoch()),
                ),
                Err(err) => return self.rejected(&session, err),
            }
        };

        info!(
            product_name = %plan.search.product_name,
            count = plan.images.count,
            "searching product context and images"
        );
        let result = tokio::try_join!(
            self.backend.search_context(plan.search),
            self.backend.search_images(plan.images),
        );

        let Some(mut session) = pending.finish() else {
            return self.interrupted();
        };

        match result {
            Ok((search, images)) => {
                let image_count = images.images.len();
                if let Err(err) = session
                    .complete_search(search.context, images.images)
                    .map(|_| ())
                {
                    return self.rejected(&session, err);
                }
                info!(image_count, "search completed");

                let mut update = self.update(&session);
                update.tiles_html = Some(render_image_grid(
                    session
                        .catalog()
                        .map(|catalog| catalog.candidates())
                        .unwrap_or_default(),
                    None,
                ));
                if image_count == 0 {
                    update.alert = Some(messages::NO_IMAGES_FOUND.to_string());
                }
                update
            }
            Err(err) => {
                warn!(error = %err, "search failed");
                if let Err(err) = session.fail_search() {
                    debug!(error = %err, "search rollback skipped");
                }
                let mut update = self.update(&session);
                update.alert = Some(messages::SEARCH_FAILED.to_string());
                update
            }
        }
    }

    pub fn select(&self, index: usize) -> UiUpdate {
        let mut session = self.lock_session();
        match session.select_image(index) {
            Ok(hero_swap) => {
                debug!(index, hero_swap = hero_swap.is_some(), "image selected");
                let mut update = self.update(&session);
                update.hero_swap = hero_swap;
                update
            }
            Err(err) => self.rejected(&session, err),
        }
    }

    /// `viewport_width` is the page's inner width; narrow viewports get the
    /// freshly rendered preview scrolled into view.
    pub async fn generate(&self, form: ProductForm, viewport_width: Option<u32>) -> UiUpdate {
        let (request, pending) = {
            let mut session = self.lock_session();
            match session.begin_generate(&form) {
                Ok(request) => (
                    request,
                    PendingCall::new(&self.session, PendingKind::Generate, session.epoch()),
                ),
                Err(err) => return self.rejected(&session, err),
            }
        };

        info!(
            product_name = %request.product_name,
            image_url = %request.image_url,
            context_len = request.context.len(),
            "generating proposal"
        );
        let result = self.backend.generate(request).await;

        let Some(mut session) = pending.finish() else {
            return self.interrupted();
        };

        match result {
            Ok(payload) => {
                if let Err(err) = session.complete_generate(payload).map(|_| ()) {
                    return self.rejected(&session, err);
                }
                let preview_html = session
                    .preview()
                    .map(|preview| {
                        render_proposal(&ProposalView {
                            payload: &preview.payload,
                            image_url: &preview.hero_url,
                            letterhead: &self.settings.letterhead,
                        })
                    })
                    .unwrap_or_default();
                info!("proposal rendered");

                let mut update = self.update(&session);
                update.preview_html = Some(preview_html);
                update.scroll_into_view = viewport_width
                    .is_some_and(|width| width < self.settings.mobile_breakpoint_px);
                update
            }
            Err(err) => {
                warn!(error = %err, "generation failed");
                if let Err(err) = session.fail_generate() {
                    debug!(error = %err, "generation rollback skipped");
                }
                let mut update = self.update(&session);
                update.alert = Some(messages::GENERATE_FAILED.to_string());
                update
            }
        }
    }

    /// Printable document for the proposal currently in the preview.
    pub fn export(&self) -> Option<ExportedDocument> {
        let session = self.lock_session();
        let preview = session.preview()?;
        Some(ExportedDocument {
            file_name: document_file_name(&preview.payload.product_name),
            html: render_document(&ProposalView {
                payload: &preview.payload,
                image_url: &preview.hero_url,
                letterhead: &self.settings.letterhead,
            }),
        })
    }

    fn lock_session(&self) -> MutexGuard<'_, ProposalSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, session: &ProposalSession) -> UiUpdate {
        let catalog = session.catalog();
        UiUpdate {
            phase: session.phase_name(),
            busy: session.is_busy(),
            tile_count: catalog.map_or(0, |catalog| catalog.candidates().len()),
            selected_index: session.selection().map(|selection| selection.index()),
            generate_enabled: session.can_generate(),
            show_selection_area: catalog.is_some_and(|catalog| !catalog.is_empty()),
            scroll_into_view: false,
            tiles_html: None,
            preview_html: None,
            hero_swap: None,
            alert: None,
        }
    }

    fn rejected(&self, session: &ProposalSession, err: SessionError) -> UiUpdate {
        debug!(error = %err, "action rejected");
        let message = match err {
            SessionError::EmptyProductName => messages::ENTER_PRODUCT_NAME,
            SessionError::NoImageSelected => messages::SELECT_IMAGE,
            SessionError::Busy => messages::BUSY,
            SessionError::UnknownImage(_) => messages::UNKNOWN_IMAGE,
            SessionError::NotPending => messages::INTERRUPTED,
        };
        let mut update = self.update(session);
        update.alert = Some(message.to_string());
        update
    }

    fn interrupted(&self) -> UiUpdate {
        warn!("session was reset while a request was pending");
        let session = self.lock_session();
        let mut update = self.update(&session);
        update.alert = Some(messages::INTERRUPTED.to_string());
        update
    }
}

#[derive(Debug, Clone, Copy)]
enum PendingKind {
    Search,
    Generate,
}

/// Puts the session back to its settled state if the call never finishes,
/// e.g. when the HTTP request driving it is dropped.
struct PendingCall<'a> {
    session: &'a Mutex<ProposalSession>,
    kind: PendingKind,
    epoch: u64,
    armed: bool,
}

impl<'a> PendingCall<'a> {
    fn new(session: &'a Mutex<ProposalSession>, kind: PendingKind, epoch: u64) -> Self {
        Self {
            session,
            kind,
            epoch,
            armed: true,
        }
    }

    /// Re-locks the session for completion. `None` when the session was reset
    /// in the meantime and the result must be thrown away.
    fn finish(mut self) -> Option<MutexGuard<'a, ProposalSession>> {
        self.armed = false;
        let session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        (session.epoch() == self.epoch).then_some(session)
    }
}

impl Drop for PendingCall<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        if session.epoch() != self.epoch {
            return;
        }
        let _ = match self.kind {
            PendingKind::Search => session.fail_search(),
            PendingKind::Generate => session.fail_generate(),
        };
        debug!(kind = ?self.kind, "abandoned request rolled back");
    }
}

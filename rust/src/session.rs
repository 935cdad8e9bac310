//! Page-session state for the proposal builder.
//!
//! The session moves through `Idle -> Searching -> AwaitingSelection ->
//! Generating -> Rendered`. The two in-flight states keep the settled state
//! they came from so a failed call can put it back untouched. A generation
//! request can only be built from a [`SelectedImage`], and a
//! [`SelectedImage`] can only be handed out by [`Catalog::select`].

use serde::Serialize;
use std::mem;
use thiserror::Error;

use crate::proposal::{
    GenerateRequest, ImagesRequest, ProductForm, ProposalPayload, SearchRequest,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("product name is empty")]
    EmptyProductName,
    #[error("no image selected")]
    NoImageSelected,
    #[error("another request is still pending")]
    Busy,
    #[error("image index {0} is not in the current candidates")]
    UnknownImage(usize),
    #[error("no request is pending")]
    NotPending,
}

/// Result of the last successful search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    context: String,
    candidates: Vec<String>,
}

impl Catalog {
    pub fn new(context: String, candidates: Vec<String>) -> Self {
        Self {
            context,
            candidates,
        }
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn select(&self, index: usize) -> Option<SelectedImage> {
        self.candidates.get(index).map(|url| SelectedImage {
            index,
            url: url.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedImage {
    index: usize,
    url: String,
}

impl SelectedImage {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// The rendered proposal currently occupying the preview container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub payload: ProposalPayload,
    pub hero_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseName {
    Idle,
    Searching,
    AwaitingSelection,
    Generating,
    Rendered,
}

#[derive(Debug, Clone)]
enum Phase {
    Idle,
    Searching {
        resume: Box<Phase>,
    },
    AwaitingSelection {
        catalog: Catalog,
        selection: Option<SelectedImage>,
    },
    Generating {
        resume: Box<Phase>,
    },
    Rendered {
        catalog: Catalog,
        selection: SelectedImage,
    },
}

/// The two requests a search sends together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPlan {
    pub search: SearchRequest,
    pub images: ImagesRequest,
}

#[derive(Debug, Clone)]
pub struct ProposalSession {
    phase: Phase,
    preview: Option<Preview>,
    epoch: u64,
}

impl Default for ProposalSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ProposalSession {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            preview: None,
            epoch: 0,
        }
    }

    /// Back to `Idle` with an empty preview. Bumps the epoch so calls started
    /// before the reset can tell their session is gone.
    pub fn reset(&mut self) {
        let epoch = self.epoch.wrapping_add(1);
        *self = Self::new();
        self.epoch = epoch;
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn phase_name(&self) -> PhaseName {
        match self.phase {
            Phase::Idle => PhaseName::Idle,
            Phase::Searching { .. } => PhaseName::Searching,
            Phase::AwaitingSelection { .. } => PhaseName::AwaitingSelection,
            Phase::Generating { .. } => PhaseName::Generating,
            Phase::Rendered { .. } => PhaseName::Rendered,
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(
            self.phase,
            Phase::Searching { .. } | Phase::Generating { .. }
        )
    }

    /// Candidates currently on screen. While a call is in flight this is the
    /// catalog from before the call.
    pub fn catalog(&self) -> Option<&Catalog> {
        match self.settled() {
            Phase::AwaitingSelection { catalog, .. } | Phase::Rendered { catalog, .. } => {
                Some(catalog)
            }
            _ => None,
        }
    }

    pub fn selection(&self) -> Option<&SelectedImage> {
        match self.settled() {
            Phase::AwaitingSelection { selection, .. } => selection.as_ref(),
            Phase::Rendered { selection, .. } => Some(selection),
            _ => None,
        }
    }

    pub fn preview(&self) -> Option<&Preview> {
        self.preview.as_ref()
    }

    pub fn can_generate(&self) -> bool {
        !self.is_busy() && self.selection().is_some()
    }

    pub fn begin_search(
        &mut self,
        product_name: &str,
        image_count: usize,
    ) -> Result<SearchPlan, SessionError> {
        if self.is_busy() {
            return Err(SessionError::Busy);
        }
        if product_name.trim().is_empty() {
            return Err(SessionError::EmptyProductName);
        }

        let resume = mem::replace(&mut self.phase, Phase::Idle);
        self.phase = Phase::Searching {
            resume: Box::new(resume),
        };

        Ok(SearchPlan {
            search: SearchRequest {
                product_name: product_name.to_string(),
            },
            images: ImagesRequest {
                product_name: product_name.to_string(),
                count: image_count,
            },
        })
    }

    /// Commits both search results at once. Clears any previous selection;
    /// the preview container is left alone.
    pub fn complete_search(
        &mut self,
        context: String,
        images: Vec<String>,
    ) -> Result<&Catalog, SessionError> {
        if !matches!(self.phase, Phase::Searching { .. }) {
            return Err(SessionError::NotPending);
        }

        self.phase = Phase::AwaitingSelection {
            catalog: Catalog::new(context, images),
            selection: None,
        };
        match &self.phase {
            Phase::AwaitingSelection { catalog, .. } => Ok(catalog),
            _ => Err(SessionError::NotPending),
        }
    }

    pub fn fail_search(&mut self) -> Result<(), SessionError> {
        match mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Searching { resume } => {
                self.phase = *resume;
                Ok(())
            }
            other => {
                self.phase = other;
                Err(SessionError::NotPending)
            }
        }
    }

    /// Marks the tile at `index` as the only selection. Returns the new hero
    /// URL when a preview is already on screen.
    pub fn select_image(&mut self, index: usize) -> Result<Option<String>, SessionError> {
        if self.is_busy() {
            return Err(SessionError::Busy);
        }

        let selected = self
            .catalog()
            .and_then(|catalog| catalog.select(index))
            .ok_or(SessionError::UnknownImage(index))?;

        match &mut self.phase {
            Phase::AwaitingSelection { selection, .. } => *selection = Some(selected.clone()),
            Phase::Rendered { selection, .. } => *selection = selected.clone(),
            _ => return Err(SessionError::UnknownImage(index)),
        }

        Ok(self.preview.as_mut().map(|preview| {
            preview.hero_url = selected.url().to_string();
            preview.hero_url.clone()
        }))
    }

    pub fn begin_generate(&mut self, form: &ProductForm) -> Result<GenerateRequest, SessionError> {
        if self.is_busy() {
            return Err(SessionError::Busy);
        }

        let request = match &self.phase {
            Phase::AwaitingSelection {
                catalog,
                selection: Some(selection),
            }
            | Phase::Rendered { catalog, selection } => {
                generate_request(form, catalog, selection)
            }
            _ => return Err(SessionError::NoImageSelected),
        };

        let resume = mem::replace(&mut self.phase, Phase::Idle);
        self.phase = Phase::Generating {
            resume: Box::new(resume),
        };
        Ok(request)
    }

    /// Replaces the preview with `payload`, heroed by the image the request
    /// was built from.
    pub fn complete_generate(&mut self, payload: ProposalPayload) -> Result<&Preview, SessionError> {
        let resume = match mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Generating { resume } => *resume,
            other => {
                self.phase = other;
                return Err(SessionError::NotPending);
            }
        };

        let (catalog, selection) = match resume {
            Phase::AwaitingSelection {
                catalog,
                selection: Some(selection),
            }
            | Phase::Rendered { catalog, selection } => (catalog, selection),
            other => {
                self.phase = other;
                return Err(SessionError::NoImageSelected);
            }
        };

        let preview = self.preview.insert(Preview {
            payload,
            hero_url: selection.url().to_string(),
        });
        self.phase = Phase::Rendered { catalog, selection };
        Ok(&*preview)
    }

    pub fn fail_generate(&mut self) -> Result<(), SessionError> {
        match mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Generating { resume } => {
                self.phase = *resume;
                Ok(())
            }
            other => {
                self.phase = other;
                Err(SessionError::NotPending)
            }
        }
    }

    fn settled(&self) -> &Phase {
        match &self.phase {
            Phase::Searching { resume } | Phase::Generating { resume } => &**resume,
            phase => phase,
        }
    }
}

fn generate_request(
    form: &ProductForm,
    catalog: &Catalog,
    selection: &SelectedImage,
) -> GenerateRequest {
    GenerateRequest {
        product_name: form.product_name.clone(),
        price: form.price.clone(),
        capacity: form.capacity.clone(),
        image_url: selection.url().to_string(),
        context: catalog.context().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{PhaseName, ProposalSession, SessionError};
    use crate::proposal::{ProductForm, ProposalPayload};

    fn form() -> ProductForm {
        ProductForm {
            product_name: "緑茶".to_string(),
            price: "1,200円".to_string(),
            capacity: "500ml".to_string(),
        }
    }

    fn searched(images: &[&str]) -> ProposalSession {
        let mut session = ProposalSession::new();
        session.begin_search("緑茶", 8).expect("begin search");
        session
            .complete_search(
                "ctx".to_string(),
                images.iter().map(|s| s.to_string()).collect(),
            )
            .expect("complete search");
        session
    }

    #[test]
    fn empty_product_name_is_rejected_without_state_change() {
        let mut session = ProposalSession::new();
        assert_eq!(
            session.begin_search("   ", 8),
            Err(SessionError::EmptyProductName)
        );
        assert_eq!(session.phase_name(), PhaseName::Idle);
    }

    #[test]
    fn search_plan_carries_name_and_count() {
        let mut session = ProposalSession::new();
        let plan = session.begin_search("緑茶", 8).expect("begin search");
        assert_eq!(plan.search.product_name, "緑茶");
        assert_eq!(plan.images.product_name, "緑茶");
        assert_eq!(plan.images.count, 8);
        assert_eq!(session.phase_name(), PhaseName::Searching);
        assert!(session.is_busy());
        assert_eq!(session.begin_search("緑茶", 8), Err(SessionError::Busy));
    }

    #[test]
    fn completed_search_has_no_selection() {
        let session = searched(&["a.png", "b.png"]);
        assert_eq!(session.phase_name(), PhaseName::AwaitingSelection);
        assert_eq!(session.catalog().expect("catalog").candidates().len(), 2);
        assert!(session.selection().is_none());
        assert!(!session.can_generate());
    }

    #[test]
    fn selecting_replaces_previous_selection() {
        let mut session = searched(&["a.png", "b.png"]);
        assert_eq!(session.select_image(0), Ok(None));
        assert_eq!(session.select_image(1), Ok(None));
        let selection = session.selection().expect("selection");
        assert_eq!(selection.index(), 1);
        assert_eq!(selection.url(), "b.png");
        assert!(session.can_generate());
    }

    #[test]
    fn unknown_index_keeps_selection() {
        let mut session = searched(&["a.png"]);
        session.select_image(0).expect("select");
        assert_eq!(session.select_image(5), Err(SessionError::UnknownImage(5)));
        assert_eq!(session.selection().expect("selection").url(), "a.png");
    }

    #[test]
    fn generate_requires_selection() {
        let mut session = searched(&["a.png"]);
        assert_eq!(
            session.begin_generate(&form()),
            Err(SessionError::NoImageSelected)
        );
        assert_eq!(session.phase_name(), PhaseName::AwaitingSelection);

        let mut idle = ProposalSession::new();
        assert_eq!(
            idle.begin_generate(&form()),
            Err(SessionError::NoImageSelected)
        );
    }

    #[test]
    fn generate_request_uses_last_selection_and_context() {
        let mut session = searched(&["a.png", "b.png"]);
        session.select_image(0).expect("select a");
        session.select_image(1).expect("select b");
        let request = session.begin_generate(&form()).expect("begin generate");
        assert_eq!(request.image_url, "b.png");
        assert_eq!(request.context, "ctx");
        assert_eq!(request.price, "1,200円");
        assert_eq!(request.capacity, "500ml");
        assert_eq!(session.phase_name(), PhaseName::Generating);
        assert_eq!(session.select_image(0), Err(SessionError::Busy));
    }

    #[test]
    fn completed_generation_renders_and_hero_follows_selection() {
        let mut session = searched(&["a.png", "b.png"]);
        session.select_image(0).expect("select");
        session.begin_generate(&form()).expect("begin");
        let payload = ProposalPayload {
            product_name: "緑茶".to_string(),
            ..ProposalPayload::default()
        };
        let preview = session.complete_generate(payload.clone()).expect("complete");
        assert_eq!(preview.hero_url, "a.png");
        assert_eq!(session.phase_name(), PhaseName::Rendered);

        assert_eq!(session.select_image(1), Ok(Some("b.png".to_string())));
        let preview = session.preview().expect("preview");
        assert_eq!(preview.hero_url, "b.png");
        assert_eq!(preview.payload, payload);
    }

    #[test]
    fn failed_calls_restore_previous_state() {
        let mut session = searched(&["a.png"]);
        session.select_image(0).expect("select");

        session.begin_search("紅茶", 8).expect("begin search");
        session.fail_search().expect("fail search");
        assert_eq!(session.phase_name(), PhaseName::AwaitingSelection);
        assert_eq!(session.selection().expect("selection").url(), "a.png");
        assert_eq!(session.catalog().expect("catalog").context(), "ctx");

        session.begin_generate(&form()).expect("begin generate");
        session.fail_generate().expect("fail generate");
        assert_eq!(session.phase_name(), PhaseName::AwaitingSelection);
        assert!(session.preview().is_none());
    }

    #[test]
    fn new_search_keeps_preview_but_clears_selection() {
        let mut session = searched(&["a.png"]);
        session.select_image(0).expect("select");
        session.begin_generate(&form()).expect("begin");
        session
            .complete_generate(ProposalPayload::default())
            .expect("complete");

        session.begin_search("紅茶", 8).expect("begin search");
        session
            .complete_search("ctx2".to_string(), Vec::new())
            .expect("complete search");
        assert!(session.selection().is_none());
        assert!(session.catalog().expect("catalog").is_empty());
        assert!(session.preview().is_some());
        assert!(!session.can_generate());
    }

    #[test]
    fn reset_clears_everything_and_bumps_epoch() {
        let mut session = searched(&["a.png"]);
        session.select_image(0).expect("select");
        session.begin_generate(&form()).expect("begin");
        let before = session.epoch();

        session.reset();
        assert_eq!(session.epoch(), before + 1);
        assert_eq!(session.phase_name(), PhaseName::Idle);
        assert!(session.preview().is_none());
        assert!(session.catalog().is_none());
        assert!(!session.is_busy());
    }

    #[test]
    fn completing_without_pending_call_is_rejected() {
        let mut session = ProposalSession::new();
        assert_eq!(
            session.complete_search(String::new(), Vec::new()).err(),
            Some(SessionError::NotPending)
        );
        assert_eq!(
            session.complete_generate(ProposalPayload::default()).err(),
            Some(SessionError::NotPending)
        );
        assert_eq!(session.fail_search(), Err(SessionError::NotPending));
        assert_eq!(session.phase_name(), PhaseName::Idle);
    }
}

//! Record editor: the create/edit lifecycle of a single record form.
//!
//! ```text
//! Closed ──open_for_create──▶ DraftNew ──┐
//!   ▲  ──open_for_edit────▶ DraftEdit ──┤ submit (valid)
//!   │                                     ▼
//!   └────────── success ─────────── Submitting
//!                                         │ failure
//!                        back to the originating draft state
//! ```

use crate::error::Result;
use crate::repository::{BoardConfig, Repository};
use crate::store::DocumentStore;
use crate::types::{Category, CategoryFilter, Draft, DraftOrigin, Kind, Record, RecordId};
use parking_lot::Mutex;
use std::path::Path;
use tracing::{debug, warn};

/// Where the editor is in its lifecycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EditorState {
    Closed,
    DraftNew,
    DraftEdit(RecordId),
    /// A save is in flight for a draft of this origin.
    Submitting(DraftOrigin),
}

impl EditorState {
    pub fn is_draft(&self) -> bool {
        matches!(self, EditorState::DraftNew | EditorState::DraftEdit(_))
    }
}

/// Form fields as the user edits them.
///
/// Optional text fields are plain strings here; empty means absent once
/// submitted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DraftFields {
    pub category: Category,
    pub kind: Kind,
    pub title: String,
    pub body: String,
    pub address: String,
    pub author: String,
    pub attachment_name: Option<String>,
}

impl DraftFields {
    fn blank(category: Category, kind: Kind) -> Self {
        Self {
            category,
            kind,
            title: String::new(),
            body: String::new(),
            address: String::new(),
            author: String::new(),
            attachment_name: None,
        }
    }

    fn from_record(record: &Record) -> Self {
        Self {
            category: record.category,
            kind: record.kind,
            title: record.title.clone(),
            body: record.body.clone(),
            address: record.address.clone().unwrap_or_default(),
            author: record.author.clone().unwrap_or_default(),
            attachment_name: record.attachment_name.clone(),
        }
    }

    fn to_draft(&self, origin: DraftOrigin) -> Draft {
        Draft {
            origin,
            category: self.category,
            kind: self.kind,
            title: self.title.clone(),
            body: self.body.clone(),
            address: Some(self.address.clone()),
            author: Some(self.author.clone()),
            attachment_name: self.attachment_name.clone(),
        }
        .normalized()
    }
}

/// Result of a submit that did not fail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The record was persisted; the editor is closed.
    Saved(Record),
    /// Another submit is in flight; nothing was sent.
    AlreadySubmitting,
    /// The editor holds no draft; nothing was sent.
    NotOpen,
}

struct EditorInner {
    state: EditorState,
    origin: DraftOrigin,
    fields: DraftFields,
    last_error: Option<String>,
}

/// Form state machine for one record at a time.
///
/// Shareable across threads. The internal lock is released while the
/// repository talks to the store, so a concurrent submit sees
/// [`EditorState::Submitting`] and returns without writing.
pub struct Editor {
    default_category: Category,
    default_kind: Kind,
    inner: Mutex<EditorInner>,
}

impl Editor {
    pub fn new(config: &BoardConfig) -> Self {
        Self {
            default_category: config.default_category,
            default_kind: config.default_kind,
            inner: Mutex::new(EditorInner {
                state: EditorState::Closed,
                origin: DraftOrigin::New,
                fields: DraftFields::blank(config.default_category, config.default_kind),
                last_error: None,
            }),
        }
    }

    /// Start a new record. The category follows the caller's current
    /// filter, or the configured default when the filter is "All".
    ///
    /// Returns false while a submit is in flight.
    pub fn open_for_create(&self, filter: CategoryFilter) -> bool {
        let mut inner = self.inner.lock();
        if matches!(inner.state, EditorState::Submitting(_)) {
            return false;
        }

        let category = filter.only().copied().unwrap_or(self.default_category);
        inner.state = EditorState::DraftNew;
        inner.origin = DraftOrigin::New;
        inner.fields = DraftFields::blank(category, self.default_kind);
        inner.last_error = None;
        debug!(%category, "editor opened for create");
        true
    }

    /// Edit an existing record, keeping its id and creation time.
    ///
    /// Returns false while a submit is in flight.
    pub fn open_for_edit(&self, record: &Record) -> bool {
        let mut inner = self.inner.lock();
        if matches!(inner.state, EditorState::Submitting(_)) {
            return false;
        }

        inner.state = EditorState::DraftEdit(record.id.clone());
        inner.origin = DraftOrigin::Existing {
            id: record.id.clone(),
            created_at: record.created_at,
        };
        inner.fields = DraftFields::from_record(record);
        inner.last_error = None;
        debug!(id = %record.id, "editor opened for edit");
        true
    }

    /// Edit the form fields. Only allowed in a draft state.
    pub fn update_fields(&self, edit: impl FnOnce(&mut DraftFields)) -> bool {
        let mut inner = self.inner.lock();
        if !inner.state.is_draft() {
            return false;
        }
        edit(&mut inner.fields);
        true
    }

    /// Reference a local file by name. The file is never read.
    pub fn attach_file(&self, path: impl AsRef<Path>) -> bool {
        let Some(name) = path.as_ref().file_name() else {
            return false;
        };
        let name = name.to_string_lossy().into_owned();
        self.update_fields(|fields| fields.attachment_name = Some(name))
    }

    pub fn clear_attachment(&self) -> bool {
        self.update_fields(|fields| fields.attachment_name = None)
    }

    /// Discard the draft. Refused while a submit is in flight.
    pub fn close(&self) -> bool {
        let mut inner = self.inner.lock();
        if matches!(inner.state, EditorState::Submitting(_)) {
            return false;
        }
        if inner.state.is_draft() {
            debug!("editor closed without submitting");
            self.reset(&mut inner);
        }
        true
    }

    pub fn state(&self) -> EditorState {
        self.inner.lock().state.clone()
    }

    pub fn fields(&self) -> DraftFields {
        self.inner.lock().fields.clone()
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self.inner.lock().state, EditorState::Submitting(_))
    }

    /// Message of the last failed submit, cleared by the next attempt.
    pub fn last_error(&self) -> Option<String> {
        self.inner.lock().last_error.clone()
    }

    /// Validate and persist the draft through `repository`.
    ///
    /// Invalid drafts fail with [`BoardError::Validation`](crate::BoardError)
    /// and never reach the store. A store failure returns the editor to its
    /// draft state with the fields intact.
    pub fn submit<S: DocumentStore>(&self, repository: &Repository<S>) -> Result<SubmitOutcome> {
        let (origin, draft) = {
            let mut inner = self.inner.lock();
            match inner.state {
                EditorState::Closed => return Ok(SubmitOutcome::NotOpen),
                EditorState::Submitting(_) => {
                    debug!("submit ignored, another one is in flight");
                    return Ok(SubmitOutcome::AlreadySubmitting);
                }
                EditorState::DraftNew | EditorState::DraftEdit(_) => {}
            }

            let origin = inner.origin.clone();
            let draft = inner.fields.to_draft(origin.clone());
            if let Err(e) = draft.validate() {
                inner.last_error = Some(e.to_string());
                return Err(e.into());
            }

            inner.state = EditorState::Submitting(origin.clone());
            inner.last_error = None;
            (origin, draft)
        };

        let result = repository.save(draft);

        let mut inner = self.inner.lock();
        match result {
            Ok(record) => {
                debug!(id = %record.id, "editor submitted");
                self.reset(&mut inner);
                Ok(SubmitOutcome::Saved(record))
            }
            Err(e) => {
                warn!(error = %e, "submit failed, draft kept");
                inner.state = match origin {
                    DraftOrigin::New => EditorState::DraftNew,
                    DraftOrigin::Existing { id, .. } => EditorState::DraftEdit(id),
                };
                inner.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    fn reset(&self, inner: &mut EditorInner) {
        inner.state = EditorState::Closed;
        inner.origin = DraftOrigin::New;
        inner.fields = DraftFields::blank(self.default_category, self.default_kind);
        inner.last_error = None;
    }
}

//! Message composer: drafts, validation and the send path.
//!
//! One outgoing message at a time. The draft lives entirely in memory and
//! is cleared on a successful handoff to the connection manager or on a
//! room switch. There is no optimistic echo: a sent message shows up in
//! the log only when the server relays it back over the channel.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::debug;

use telecare_net::ConnectionHandle;
use telecare_shared::constants::{ALLOWED_ATTACHMENT_FORMATS, MAX_ATTACHMENT_BYTES};
use telecare_shared::model::{Drug, PrescriptionDrug, Side};
use telecare_shared::wire::{ChatData, WsFrame};

use crate::error::ComposeError;
use crate::media::MediaUploader;

/// A validated file waiting to be uploaded on the next send.
#[derive(Debug, Clone)]
pub struct StagedFile {
    pub name: String,
    pub format: String,
    pub bytes: Vec<u8>,
}

/// One prescribed drug in the staged prescription, keyed by drug id.
#[derive(Debug, Clone)]
pub struct PrescribedDrug {
    pub name: String,
    pub image: String,
    pub quantity: i32,
    pub note: String,
}

#[derive(Default)]
struct Draft {
    text: String,
    attachment: Option<StagedFile>,
    prescription: BTreeMap<i64, PrescribedDrug>,
}

/// Result of a [`Composer::send`] call that performed no network work.
#[derive(Debug, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// Empty text is never sent.
    EmptyText,
    /// A send is already in flight; this one is rejected, not queued.
    InFlight,
    /// The session has expired; the composer is disabled.
    SessionExpired,
}

pub struct Composer {
    channel: String,
    side: Side,
    uploader: Arc<dyn MediaUploader>,
    handle: ConnectionHandle,
    session_active: watch::Receiver<bool>,
    draft: Mutex<Draft>,
    in_flight: AtomicBool,
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Composer {
    pub fn new(
        channel: String,
        side: Side,
        uploader: Arc<dyn MediaUploader>,
        handle: ConnectionHandle,
        session_active: watch::Receiver<bool>,
    ) -> Self {
        Self {
            channel,
            side,
            uploader,
            handle,
            session_active,
            draft: Mutex::new(Draft::default()),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn set_text(&self, text: impl Into<String>) {
        self.draft.lock().unwrap().text = text.into();
    }

    pub fn text(&self) -> String {
        self.draft.lock().unwrap().text.clone()
    }

    pub fn has_attachment(&self) -> bool {
        self.draft.lock().unwrap().attachment.is_some()
    }

    /// Stage a file for the next send.
    ///
    /// The format is the exact filename suffix and must be one of
    /// png/jpg/jpeg/pdf; the size cap is 2 MB. A rejected file leaves any
    /// previously staged one untouched, and a staged file must be removed
    /// explicitly before another can take its place.
    pub fn attach_file(&self, name: &str, bytes: Vec<u8>) -> Result<(), ComposeError> {
        let format = name.rsplit('.').next().unwrap_or(name);
        if !ALLOWED_ATTACHMENT_FORMATS.contains(&format) {
            return Err(ComposeError::UnsupportedFormat(format.to_string()));
        }
        if bytes.len() > MAX_ATTACHMENT_BYTES {
            return Err(ComposeError::FileTooLarge(bytes.len()));
        }

        let mut draft = self.draft.lock().unwrap();
        if draft.attachment.is_some() {
            return Err(ComposeError::AttachmentAlreadyStaged);
        }
        draft.attachment = Some(StagedFile {
            name: name.to_string(),
            format: format.to_string(),
            bytes,
        });
        Ok(())
    }

    pub fn remove_attachment(&self) {
        self.draft.lock().unwrap().attachment = None;
    }

    /// Stage a prescription, replacing any previous one.
    pub fn attach_prescription(
        &self,
        drugs: BTreeMap<i64, PrescribedDrug>,
    ) -> Result<(), ComposeError> {
        if drugs.is_empty() {
            return Err(ComposeError::EmptyPrescription);
        }
        self.draft.lock().unwrap().prescription = drugs;
        Ok(())
    }

    /// Clear the whole draft, e.g. on room switch.
    pub fn clear(&self) {
        let mut draft = self.draft.lock().unwrap();
        *draft = Draft::default();
    }

    /// Upload the staged attachment (if any), assemble the chat frame and
    /// hand it to the connection manager.
    ///
    /// Failures are recoverable: the draft survives an upload or handoff
    /// error so the user can retry.
    pub async fn send(&self) -> Result<SendOutcome, ComposeError> {
        if !*self.session_active.borrow() {
            return Ok(SendOutcome::SessionExpired);
        }

        // Snapshot the draft; the lock is never held across an await.
        let (text, staged, prescription) = {
            let draft = self.draft.lock().unwrap();
            if draft.text.is_empty() {
                return Ok(SendOutcome::EmptyText);
            }
            (
                draft.text.clone(),
                draft.attachment.clone(),
                draft.prescription.clone(),
            )
        };

        if self.in_flight.swap(true, Ordering::SeqCst) {
            return Ok(SendOutcome::InFlight);
        }
        let _guard = InFlightGuard(&self.in_flight);

        let attachment = match staged {
            Some(file) => {
                let uploaded = self
                    .uploader
                    .upload(&file.name, file.bytes)
                    .await
                    .map_err(ComposeError::Upload)?;
                Some(uploaded)
            }
            None => None,
        };

        let prescription_drugs = prescription
            .into_iter()
            .map(|(drug_id, p)| PrescriptionDrug {
                // The server assigns the entry id on relay.
                id: 0,
                drug: Drug {
                    id: drug_id,
                    name: p.name,
                    image: p.image,
                },
                quantity: p.quantity,
                note: p.note,
            })
            .collect();

        let frame = WsFrame::Chat(ChatData {
            channel: self.channel.clone(),
            side: self.side,
            message: text,
            attachment,
            prescription_drugs,
        });

        self.handle
            .send_frame(frame)
            .await
            .map_err(ComposeError::Connection)?;

        debug!(channel = %self.channel, "Message handed to connection manager");
        self.clear();
        Ok(SendOutcome::Sent)
    }
}

//! Core data models for drafts, payloads, and recognized PDF text.

mod draft;
mod payload;
mod recognition;

pub(crate) use draft::set_if_present;
pub use draft::{Draft, DraftBuilder, PubType};
pub use payload::{
    Cookie, Cookies, FileKind, FilePayload, Payload, WebContent, WebContentOptions,
};
pub use recognition::{Block, Line, Page, RecognitionDocument, Word};

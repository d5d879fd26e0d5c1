//! Shared document container and replicated update exchange.
//!
//! A [`Store`] owns one CRDT document, the replica's origin tag, and the
//! transaction boundary. Every [`Text`](crate::text::Text) created from one
//! store shares its document, so a single transaction scope can cover several
//! texts and one update stream replicates all of them.
//!
//! The store does not talk to the network itself. An external sync channel
//! calls [`Store::encode_update_since`] / [`Store::apply_remote_update`] and
//! ships the opaque payloads however it likes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use yrs::updates::decoder::Decode;
use yrs::updates::encoder::Encode;
use yrs::{Doc, Origin, ReadTxn, StateVector, Transact, TransactionMut, Update};

use crate::text::{RefreshReason, Text};

/// Origin tag attached to transactions that integrate remote updates.
const REMOTE_ORIGIN: &str = "remote";

/// Container for one replicated document.
#[derive(Debug, Clone)]
pub struct Store {
    doc: Doc,
    local_origin: Origin,
    // one marker slot per root text, shared by every wrapper of that root
    refresh_slots: Arc<Mutex<HashMap<String, Arc<Mutex<RefreshReason>>>>>,
}

impl Store {
    /// Create a store with a fresh random replica id.
    pub fn new() -> Self {
        Self::from_doc(Doc::new())
    }

    /// Create a store with an explicit replica id. Collaborating peers must
    /// use distinct ids.
    pub fn with_client_id(client_id: u64) -> Self {
        Self::from_doc(Doc::with_client_id(client_id))
    }

    fn from_doc(doc: Doc) -> Self {
        let local_origin = Origin::from(format!("replica:{}", doc.client_id()).as_str());
        Self {
            doc,
            local_origin,
            refresh_slots: Arc::default(),
        }
    }

    /// The replica id of this store.
    pub fn client_id(&self) -> u64 {
        self.doc.client_id()
    }

    /// Origin tag attached to transactions opened by this replica.
    pub fn local_origin(&self) -> &Origin {
        &self.local_origin
    }

    pub(crate) fn remote_origin() -> Origin {
        Origin::from(REMOTE_ORIGIN)
    }

    /// The underlying CRDT document, for advanced operations.
    /// Prefer the wrapper methods where possible.
    pub fn doc(&self) -> &Doc {
        &self.doc
    }

    /// Run `f` inside one local transaction. Every mutation issued through
    /// the `*_in` text methods within `f` coalesces into a single change
    /// notification when the transaction commits.
    pub fn transact<R>(&self, f: impl FnOnce(&mut TransactionMut) -> R) -> R {
        let mut txn = self.doc.transact_mut_with(self.local_origin.clone());
        f(&mut txn)
    }

    /// Create (or retrieve) the root text keyed by `id`. Wrappers handed out
    /// for one id share the underlying primitive and its refresh marker.
    pub fn create_text(&self, id: &str) -> Text {
        Text::new(self, id)
    }

    /// The refresh-marker slot for the root keyed by `id`.
    pub(crate) fn refresh_slot(&self, id: &str) -> Arc<Mutex<RefreshReason>> {
        let mut slots = self.refresh_slots.lock().unwrap();
        Arc::clone(slots.entry(id.to_string()).or_default())
    }

    /// Current state vector, v1-encoded. Peers use it to request a
    /// differential update.
    pub fn state_vector(&self) -> Vec<u8> {
        let txn = self.doc.transact();
        txn.state_vector().encode_v1()
    }

    /// Full document state as a v1-encoded update.
    pub fn encode_update(&self) -> Vec<u8> {
        let txn = self.doc.transact();
        txn.encode_state_as_update_v1(&StateVector::default())
    }

    /// Everything the peer identified by `state_vector` is missing,
    /// v1-encoded.
    pub fn encode_update_since(&self, state_vector: &[u8]) -> Result<Vec<u8>, StoreError> {
        let sv = StateVector::decode_v1(state_vector)
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        let txn = self.doc.transact();
        Ok(txn.encode_state_as_update_v1(&sv))
    }

    /// Integrate an update received from a peer. The transaction carries the
    /// remote origin, so bound widgets treat the resulting change events as
    /// foreign and push them through.
    pub fn apply_remote_update(&self, update: &[u8]) -> Result<(), StoreError> {
        let decoded =
            Update::decode_v1(update).map_err(|e| StoreError::Decode(e.to_string()))?;

        tracing::debug!(bytes = update.len(), "applying remote update");
        let mut txn = self.doc.transact_mut_with(Self::remote_origin());
        txn.apply_update(decoded)
            .map_err(|e| StoreError::Apply(e.to_string()))?;
        Ok(())
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors from decoding or integrating replicated updates.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to decode update: {0}")]
    Decode(String),

    #[error("failed to apply update: {0}")]
    Apply(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_store_is_empty() {
        let store = Store::new();
        let text = store.create_text("content");
        assert_eq!(text.to_string(), "");
    }

    #[test]
    fn test_with_client_id() {
        let store = Store::with_client_id(7);
        assert_eq!(store.client_id(), 7);
    }

    #[test]
    fn test_state_vector_not_empty_after_edit() {
        let store = Store::new();
        let text = store.create_text("content");
        text.insert(0, "test").unwrap();
        assert!(!store.state_vector().is_empty());
    }

    #[test]
    fn test_full_state_sync() {
        let a = Store::with_client_id(1);
        a.create_text("content").insert(0, "hello").unwrap();

        let b = Store::with_client_id(2);
        b.apply_remote_update(&a.encode_update()).unwrap();

        assert_eq!(b.create_text("content").to_string(), "hello");
    }

    #[test]
    fn test_differential_sync() {
        let a = Store::with_client_id(1);
        let a_text = a.create_text("content");
        a_text.insert(0, "hello").unwrap();

        let b = Store::with_client_id(2);
        b.apply_remote_update(&a.encode_update()).unwrap();

        let sv = b.state_vector();
        a_text.insert(5, " world").unwrap();

        let delta = a.encode_update_since(&sv).unwrap();
        assert!(!delta.is_empty());
        b.apply_remote_update(&delta).unwrap();

        assert_eq!(b.create_text("content").to_string(), "hello world");
    }

    #[test]
    fn test_concurrent_edits_converge() {
        let a = Store::with_client_id(1);
        let b = Store::with_client_id(2);
        let a_text = a.create_text("content");
        let b_text = b.create_text("content");

        a_text.insert(0, "base").unwrap();
        b.apply_remote_update(&a.encode_update()).unwrap();

        a_text.insert(4, "-left").unwrap();
        b_text.insert(4, "-right").unwrap();

        a.apply_remote_update(&b.encode_update()).unwrap();
        b.apply_remote_update(&a.encode_update()).unwrap();

        assert_eq!(a_text.to_string(), b_text.to_string());
    }

    #[test]
    fn test_malformed_update_is_a_decode_error() {
        let store = Store::new();
        let err = store.apply_remote_update(&[0xff, 0x01, 0x02]).unwrap_err();
        assert!(matches!(err, StoreError::Decode(_)));
    }

    #[test]
    fn test_local_origin_embeds_client_id() {
        let store = Store::with_client_id(42);
        let other = Store::with_client_id(43);
        assert_ne!(store.local_origin(), other.local_origin());
    }

    #[test]
    fn test_transact_batches_mutations() {
        let store = Store::new();
        let text = store.create_text("content");
        store.transact(|txn| {
            text.insert_in(txn, 0, "ab").unwrap();
            text.insert_in(txn, 2, "cd").unwrap();
        });
        assert_eq!(text.to_string(), "abcd");
    }
}

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use drm_widevine::{DerivationContext, SessionId};

use crate::error::InterceptError;

/**
    Transaction identifier linking a challenge to its license
    (`request_id` in the protocol messages). Displayed as hex.
*/
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RequestId(Vec<u8>);

impl RequestId {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for RequestId {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for RequestId {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestId({self})")
    }
}

/**
    State kept for one in-flight exchange between its challenge and its
    license.
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeContext {
    /// Token substitution: the exact re-signed request payload.
    Derivation(DerivationContext),
    /// Full negotiation: the DRM client session that produced the challenge.
    Session(SessionId),
}

/**
    A context that could not be stored because its request id is taken.
    The existing entry is left in place; the caller must abandon this one.
*/
#[derive(Debug)]
pub struct Rejected {
    pub request_id: RequestId,
    pub context: ExchangeContext,
}

impl From<&Rejected> for InterceptError {
    fn from(rejected: &Rejected) -> Self {
        Self::DuplicateRequest(rejected.request_id.clone())
    }
}

/**
    Contexts of in-flight exchanges keyed by request id.

    Each entry is written once when its challenge is rewritten and removed
    once when its license arrives. The lock is held only for the map
    operation itself.
*/
#[derive(Debug, Default)]
pub struct CorrelationStore {
    entries: Mutex<HashMap<RequestId, ExchangeContext>>,
}

impl CorrelationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, request_id: RequestId, context: ExchangeContext) -> Result<(), Rejected> {
        let mut entries = self.entries();
        if entries.contains_key(&request_id) {
            return Err(Rejected {
                request_id,
                context,
            });
        }
        entries.insert(request_id, context);
        Ok(())
    }

    /**
        Remove and return the context for `request_id`. An unknown or already
        consumed id is [`InterceptError::Correlation`].
    */
    pub fn take(&self, request_id: &RequestId) -> Result<ExchangeContext, InterceptError> {
        self.entries()
            .remove(request_id)
            .ok_or_else(|| InterceptError::Correlation(request_id.clone()))
    }

    pub fn contains(&self, request_id: &RequestId) -> bool {
        self.entries().contains_key(request_id)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<RequestId, ExchangeContext>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    fn derivation(bytes: &[u8]) -> ExchangeContext {
        ExchangeContext::Derivation(DerivationContext::new(bytes.to_vec()))
    }

    #[test]
    fn take_consumes_once() {
        let store = CorrelationStore::new();
        let id = RequestId::from(b"R1".as_slice());
        store.put(id.clone(), derivation(b"payload")).unwrap();
        assert!(store.contains(&id));

        assert_eq!(store.take(&id).unwrap(), derivation(b"payload"));
        assert!(matches!(store.take(&id), Err(InterceptError::Correlation(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn duplicate_put_keeps_first_entry() {
        let store = CorrelationStore::new();
        let id = RequestId::from(b"R1".as_slice());
        store.put(id.clone(), derivation(b"first")).unwrap();

        let rejected = store.put(id.clone(), derivation(b"second")).unwrap_err();
        assert_eq!(rejected.context, derivation(b"second"));
        assert!(matches!(
            InterceptError::from(&rejected),
            InterceptError::DuplicateRequest(ref dup) if *dup == id
        ));
        assert_eq!(store.len(), 1);
        assert_eq!(store.take(&id).unwrap(), derivation(b"first"));
    }

    #[test]
    fn independent_request_ids() {
        let store = CorrelationStore::new();
        let (a, b) = (RequestId::from(vec![0x0A]), RequestId::from(vec![0x0B]));
        let session = ExchangeContext::Session(SessionId::from_bytes([1; 16]));
        store.put(a.clone(), derivation(b"a")).unwrap();
        store.put(b.clone(), session.clone()).unwrap();

        assert_eq!(store.take(&b).unwrap(), session);
        assert!(store.contains(&a));
    }

    #[test]
    fn concurrent_take_hands_out_context_once() {
        let store = Arc::new(CorrelationStore::new());
        let id = RequestId::from(b"R1".as_slice());
        store.put(id.clone(), derivation(b"payload")).unwrap();

        let winners: usize = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let id = id.clone();
                thread::spawn(move || store.take(&id).is_ok())
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|handle| handle.join().unwrap() as usize)
            .sum();
        assert_eq!(winners, 1);
    }

    #[test]
    fn request_id_displays_as_hex() {
        assert_eq!(RequestId::from(vec![0xAB, 0x01]).to_string(), "ab01");
    }
}

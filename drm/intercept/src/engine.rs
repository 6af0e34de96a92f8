use drm_core::ContentKey;
use drm_widevine::{Cdm, Device};

use crate::error::InterceptResult;
use crate::sink::KeySink;
use crate::store::CorrelationStore;
use crate::strategy::{FullNegotiation, Mode, Strategy, TokenSubstitution};

/**
    The interception engine: one strategy, the store of in-flight exchanges
    and the sink that receives extracted keys.

    `on_challenge` and `on_license` may be called from several threads at
    once for unrelated exchanges.
*/
pub struct Interceptor {
    strategy: Box<dyn Strategy>,
    store: CorrelationStore,
    sink: Box<dyn KeySink>,
}

impl Interceptor {
    pub fn new(strategy: Box<dyn Strategy>, sink: Box<dyn KeySink>) -> Self {
        Self {
            strategy,
            store: CorrelationStore::new(),
            sink,
        }
    }

    /**
        Build the engine for `mode` around a local device. Full negotiation
        runs a [`Cdm`] on that device.
    */
    pub fn from_mode(mode: Mode, device: Device, sink: Box<dyn KeySink>) -> Self {
        let strategy: Box<dyn Strategy> = match mode {
            Mode::TokenSubstitution => Box::new(TokenSubstitution::new(device)),
            Mode::FullNegotiation => Box::new(FullNegotiation::new(Cdm::from_device(device))),
        };
        Self::new(strategy, sink)
    }

    pub fn mode(&self) -> Mode {
        self.strategy.mode()
    }

    pub fn store(&self) -> &CorrelationStore {
        &self.store
    }

    /**
        Rewrite an intercepted challenge. The result is what the application
        should send to the license server instead.
    */
    pub fn on_challenge(
        &self,
        challenge: &[u8],
        service_certificate: Option<&[u8]>,
    ) -> InterceptResult<Vec<u8>> {
        let rewritten =
            self.strategy
                .rewrite_challenge(&self.store, challenge, service_certificate)?;
        tracing::debug!(
            mode = %self.mode(),
            in_flight = self.store.len(),
            "challenge rewritten ({} -> {} bytes)",
            challenge.len(),
            rewritten.len()
        );
        Ok(rewritten)
    }

    /**
        Verify an intercepted license and hand its CONTENT keys to the sink.
        Nothing reaches the sink when verification fails.
    */
    pub fn on_license(&self, license: &[u8]) -> InterceptResult<Vec<ContentKey>> {
        let keys = self.strategy.extract_keys(&self.store, license)?;
        tracing::info!(mode = %self.mode(), keys = keys.len(), "license verified");
        self.sink.receive(&keys);
        Ok(keys)
    }
}

impl std::fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interceptor")
            .field("mode", &self.mode())
            .field("in_flight", &self.store.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::error::InterceptError;
    use crate::test_support::{challenge, license, test_device};

    fn recording() -> (Arc<Mutex<Vec<Vec<ContentKey>>>>, Box<dyn KeySink>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink: Box<dyn KeySink> = {
            let received = Arc::clone(&received);
            Box::new(move |keys: &[ContentKey]| received.lock().unwrap().push(keys.to_vec()))
        };
        (received, sink)
    }

    #[test]
    fn mode_is_fixed_at_construction() {
        let (_, sink) = recording();
        let engine = Interceptor::from_mode(Mode::FullNegotiation, test_device().clone(), sink);
        assert_eq!(engine.mode(), Mode::FullNegotiation);
        let (_, sink) = recording();
        let engine = Interceptor::from_mode(Mode::TokenSubstitution, test_device().clone(), sink);
        assert_eq!(engine.mode(), Mode::TokenSubstitution);
    }

    #[test]
    fn failed_license_reaches_no_sink() {
        let (received, sink) = recording();
        let engine = Interceptor::from_mode(Mode::TokenSubstitution, test_device().clone(), sink);
        engine.on_challenge(&challenge(b"R1", true), None).unwrap();
        assert_eq!(engine.store().len(), 1);

        // Signed with garbage and without a session key.
        let err = engine.on_license(&license(b"R1", &[], None)).unwrap_err();
        assert!(matches!(err, InterceptError::Parse(_)));
        assert!(engine.store().is_empty());
        assert!(received.lock().unwrap().is_empty());
    }
}

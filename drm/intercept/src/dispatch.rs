use std::sync::Arc;

use crate::engine::Interceptor;
use crate::event::{BridgeEvent, BridgeReply};

/**
    Routes bridge events to the engine and decides what goes back.

    Every failure is logged here and ends only the exchange it belongs to.
    A challenge is always answered, so an application blocked on the reply
    resumes even when its challenge could not be rewritten.
*/
#[derive(Debug, Clone)]
pub struct Dispatcher {
    interceptor: Arc<Interceptor>,
}

impl Dispatcher {
    pub fn new(interceptor: Arc<Interceptor>) -> Self {
        Self { interceptor }
    }

    pub fn interceptor(&self) -> &Interceptor {
        &self.interceptor
    }

    pub fn handle(&self, event: BridgeEvent) -> Option<BridgeReply> {
        match event {
            BridgeEvent::Challenge {
                challenge,
                service_certificate,
            } => {
                tracing::info!("received challenge");
                let reply = match self
                    .interceptor
                    .on_challenge(&challenge, service_certificate.as_deref())
                {
                    Ok(rewritten) => BridgeReply::replace(rewritten),
                    Err(e) => {
                        tracing::error!(kind = e.kind(), "challenge not rewritten: {e}");
                        BridgeReply::keep_original()
                    }
                };
                Some(reply)
            }
            BridgeEvent::License { license } => {
                tracing::info!("received license");
                if let Err(e) = self.interceptor.on_license(&license) {
                    tracing::error!(kind = e.kind(), "license rejected: {e}");
                }
                None
            }
            BridgeEvent::Error { description } => {
                tracing::error!("agent error: {description}");
                None
            }
        }
    }

    /**
        Handle one raw JSON line, returning the reply line if there is one.
    */
    pub fn handle_line(&self, line: &str) -> Option<String> {
        let event = match BridgeEvent::parse(line) {
            Ok(Some(event)) => event,
            Ok(None) => {
                tracing::warn!("ignoring agent message of unknown type");
                return None;
            }
            Err(e) => {
                tracing::warn!("skipping malformed agent message: {e}");
                return None;
            }
        };

        let reply = self.handle(event)?;
        match reply.to_line() {
            Ok(line) => Some(line),
            Err(e) => {
                tracing::error!("failed to encode reply: {e}");
                None
            }
        }
    }
}

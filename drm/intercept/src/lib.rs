/*!
    License-exchange interception for Widevine.

    A hooking agent inside the application forwards every license challenge
    and license response over the bridge. The [`Interceptor`] rewrites each
    challenge so that the license is issued to a locally held device,
    verifies the license that comes back and hands its content keys to a
    [`KeySink`].
*/

mod bridge;
mod client;
mod dispatch;
mod engine;
mod envelope;
mod error;
mod event;
mod sink;
mod store;
mod strategy;
mod wire;

pub use self::bridge::{bind, serve};
pub use self::client::LicenseClient;
pub use self::dispatch::Dispatcher;
pub use self::engine::Interceptor;
pub use self::envelope::{ChallengeMessage, LicenseMessage, SignedEnvelope};
pub use self::error::{InterceptError, InterceptResult};
pub use self::event::{BridgeEvent, BridgeReply};
pub use self::sink::{KeyFormat, KeySink, LogSink};
pub use self::store::{CorrelationStore, ExchangeContext, Rejected, RequestId};
pub use self::strategy::{
    FullNegotiation, Mode, Strategy, TokenSubstitution, extract_optional_parameters,
};

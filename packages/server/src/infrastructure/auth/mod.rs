//! Authorization round trip over the message queue.

mod correlator;
mod result_consumer;
mod stub_service;

use crate::domain::RequestId;

pub use correlator::AuthCorrelator;
pub use result_consumer::AuthResultConsumer;
pub use stub_service::{StubAuthorizationService, StubProfileError};

const RESULT_KEY_PREFIX: &str = "chat:auth-result:";

fn result_key(request_id: RequestId) -> String {
    format!("{RESULT_KEY_PREFIX}{request_id}")
}

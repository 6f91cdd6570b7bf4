//! Service caller port: dispatch `domain.service` calls to whoever owns them.

use std::future::Future;

use homelink_domain::error::HubError;
use homelink_domain::service::ServiceCall;

pub trait ServiceCaller {
    /// Run the call and wait for it to be accepted.
    fn call(&self, call: ServiceCall) -> impl Future<Output = Result<(), HubError>> + Send;
}

impl<T: ServiceCaller + Send + Sync> ServiceCaller for std::sync::Arc<T> {
    fn call(&self, call: ServiceCall) -> impl Future<Output = Result<(), HubError>> + Send {
        (**self).call(call)
    }
}

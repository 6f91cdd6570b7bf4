//! TCP client for the native API.

use std::future::Future;
use std::time::Duration;

use tokio::net::{TcpStream, lookup_host};
use tokio::time::timeout;

use homelink_app::ports::{ApiConnectionError, DeviceApiClient};
use homelink_domain::native_api::{ConnectionParams, DeviceInfo};

use crate::codec::{
    self, ConnectRequest, ConnectResponse, DeviceInfoRequest, DeviceInfoResponse,
    DisconnectRequest, DisconnectResponse, HelloRequest, HelloResponse, Message, PingResponse,
    message_type,
};
use crate::config::NativeApiConfig;
use crate::error::NativeApiError;

const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Opens one short-lived connection per request.
#[derive(Debug, Clone, Default)]
pub struct TcpDeviceClient {
    config: NativeApiConfig,
}

impl TcpDeviceClient {
    #[must_use]
    pub fn new(config: NativeApiConfig) -> Self {
        Self { config }
    }

    /// Resolve, connect, and exchange hello messages.
    async fn open(&self, params: &ConnectionParams) -> Result<Connection, NativeApiError> {
        let connect_timeout = self.config.connect_timeout();
        let mut addresses = timeout(connect_timeout, lookup_host((params.host.as_str(), params.port)))
            .await
            .map_err(|_| NativeApiError::Timeout("resolving"))?
            .map_err(|source| NativeApiError::Resolve {
                host: params.host.clone(),
                source,
            })?;
        let address = addresses.next().ok_or_else(|| NativeApiError::NoAddress {
            host: params.host.clone(),
        })?;

        tracing::debug!(%address, "connecting");
        let stream = timeout(connect_timeout, TcpStream::connect(address))
            .await
            .map_err(|_| NativeApiError::Timeout("connecting"))?
            .map_err(|source| NativeApiError::Connect {
                address: address.to_string(),
                source,
            })?;
        stream.set_nodelay(true)?;

        let mut connection = Connection {
            stream,
            request_timeout: self.config.request_timeout(),
        };
        let hello: HelloResponse = connection
            .request(&HelloRequest {
                client_info: self.config.client_info.clone(),
            })
            .await?;
        tracing::debug!(
            server_info = %hello.server_info,
            api_version = %format!("{}.{}", hello.api_version_major, hello.api_version_minor),
            "connected"
        );
        Ok(connection)
    }

    /// Fetch the device info without logging in.
    ///
    /// # Errors
    ///
    /// Returns a [`NativeApiError`] when the device can't be reached or
    /// answers with something unexpected.
    #[tracing::instrument(skip_all, fields(host = %params.host, port = params.port))]
    pub async fn fetch_device_info(
        &self,
        params: &ConnectionParams,
    ) -> Result<DeviceInfo, NativeApiError> {
        let mut connection = self.open(params).await?;
        let result = connection
            .request::<_, DeviceInfoResponse>(&DeviceInfoRequest)
            .await
            .map(|DeviceInfoResponse(info)| info);
        connection.disconnect().await;
        result
    }

    /// Log in with the configured password.
    ///
    /// # Errors
    ///
    /// Returns [`NativeApiError::InvalidPassword`] when the device rejects
    /// the password, or another [`NativeApiError`] when it can't be reached.
    #[tracing::instrument(skip_all, fields(host = %params.host, port = params.port))]
    pub async fn try_login(&self, params: &ConnectionParams) -> Result<(), NativeApiError> {
        let mut connection = self.open(params).await?;
        let result = connection
            .request::<_, ConnectResponse>(&ConnectRequest {
                password: params.password.clone(),
            })
            .await
            .and_then(|response| {
                if response.invalid_password {
                    Err(NativeApiError::InvalidPassword)
                } else {
                    Ok(())
                }
            });
        connection.disconnect().await;
        result
    }
}

impl DeviceApiClient for TcpDeviceClient {
    fn device_info(
        &self,
        params: &ConnectionParams,
    ) -> impl Future<Output = Result<DeviceInfo, ApiConnectionError>> + Send {
        async move { Ok(self.fetch_device_info(params).await?) }
    }

    fn login(
        &self,
        params: &ConnectionParams,
    ) -> impl Future<Output = Result<(), ApiConnectionError>> + Send {
        async move { Ok(self.try_login(params).await?) }
    }
}

struct Connection {
    stream: TcpStream,
    request_timeout: Duration,
}

impl Connection {
    /// Send `request` and wait for the matching response type, answering
    /// pings on the way.
    async fn request<Req: Message, Resp: Message>(
        &mut self,
        request: &Req,
    ) -> Result<Resp, NativeApiError> {
        codec::write_message(&mut self.stream, request).await?;
        timeout(self.request_timeout, self.read_until::<Resp>())
            .await
            .map_err(|_| NativeApiError::Timeout("waiting for a response"))?
    }

    async fn read_until<Resp: Message>(&mut self) -> Result<Resp, NativeApiError> {
        loop {
            let frame = codec::read_frame(&mut self.stream).await?;
            match frame.msg_type {
                t if t == Resp::TYPE => return Resp::decode(&frame.payload),
                message_type::PING_REQUEST => {
                    codec::write_message(&mut self.stream, &PingResponse).await?;
                }
                other => tracing::trace!(msg_type = other, "ignoring message"),
            }
        }
    }

    /// Say goodbye; failures only get logged since the socket is dropped anyway.
    async fn disconnect(mut self) {
        let result = timeout(
            DISCONNECT_TIMEOUT,
            self.request::<_, DisconnectResponse>(&DisconnectRequest),
        )
        .await;
        match result {
            Ok(Ok(_)) => tracing::debug!("disconnected"),
            Ok(Err(err)) => tracing::debug!(error = %err, "disconnect failed"),
            Err(_) => tracing::debug!("disconnect timed out"),
        }
    }
}

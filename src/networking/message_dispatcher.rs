use crate::constants::REQUEST_TIMEOUT_MILLISECONDS;
use crate::networking::codec::{read_frame, write_frame, NetworkError};
use crate::networking::messages::{Request, RequestType, Response, ResponseType};
use log::debug;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;

///
/// Sends requests to coordinator and storage endpoints.
///
/// Each call opens its own connection, exchanges exactly one request/response pair and closes
/// the connection again. The whole exchange is bounded by the dispatcher's timeout.
///
#[derive(Debug, Clone)]
pub struct MessageDispatcher {
    request_timeout: Duration,
}

impl Default for MessageDispatcher {
    fn default() -> Self {
        MessageDispatcher::new(Duration::from_millis(REQUEST_TIMEOUT_MILLISECONDS))
    }
}

impl MessageDispatcher {
    pub fn new(request_timeout: Duration) -> Self {
        MessageDispatcher { request_timeout }
    }

    ///
    /// Sends `request_type` to `address` and waits for the matching response.
    ///
    pub async fn send_request(
        &self,
        address: &str,
        request_type: RequestType,
    ) -> Result<ResponseType, NetworkError> {
        let request = Request::new(request_type);
        debug!("Sending request {} to {}", request, address);

        let response = timeout(self.request_timeout, exchange(address, &request))
            .await
            .map_err(|_| NetworkError::Timeout(address.to_string()))??;

        if response.request_id() != request.request_id() {
            return Err(NetworkError::RequestIdMismatch);
        }
        debug!("Received response {} from {}", response, address);
        Ok(response.into_response_type())
    }
}

async fn exchange(address: &str, request: &Request) -> Result<Response, NetworkError> {
    let mut stream = TcpStream::connect(address).await?;
    write_frame(&mut stream, request).await?;
    let response = read_frame(&mut stream).await?;
    // Best effort; the response is already in hand.
    let _ = stream.shutdown().await;
    response.ok_or_else(|| {
        NetworkError::UnexpectedResponse("connection closed before a response arrived".to_string())
    })
}

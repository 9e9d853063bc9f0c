use crate::networking::codec::{read_frame, write_frame, NetworkError};
use crate::networking::messages::{Request, RequestType, Response, ResponseType};
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use uuid::Uuid;

///
/// Service logic behind an RPC endpoint.
///
/// Handlers are synchronous: they run to completion on the blocking pool and never observe
/// transport failures. Every outcome, including local I/O errors, must be expressed as a
/// `ResponseType`.
///
pub trait RequestHandler: Send + Sync + 'static {
    fn handle(&self, request: RequestType) -> ResponseType;
}

pub struct TcpListenerService {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpListenerService {
    pub async fn bind(address: &str) -> Result<TcpListenerService, NetworkError> {
        let listener = TcpListener::bind(address).await?;
        let local_addr = listener.local_addr()?;
        Ok(TcpListenerService {
            listener,
            local_addr,
        })
    }

    /// Address actually bound, which differs from the requested one when port 0 was asked for.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn get_port(&self) -> u16 {
        self.local_addr.port()
    }

    ///
    /// Accepts connections forever, serving at most `worker_count` of them at a time.
    ///
    pub async fn serve<H: RequestHandler>(
        self,
        handler: Arc<H>,
        worker_count: usize,
    ) -> Result<(), NetworkError> {
        let workers = Arc::new(Semaphore::new(worker_count.max(1)));
        info!("Serving requests on {}", self.local_addr);

        loop {
            let permit = match workers.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    warn!("Worker pool closed, stopping listener on {}", self.local_addr);
                    return Ok(());
                }
            };

            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("Failure while accepting a connection: {}", e);
                    continue;
                }
            };

            let handler = handler.clone();
            tokio::spawn(async move {
                if let Err(e) = serve_connection(stream, handler).await {
                    warn!("Connection from {} ended with an error: {}", peer, e);
                }
                drop(permit);
            });
        }
    }
}

///
/// Serves request frames from one connection until the peer closes it.
///
async fn serve_connection<H: RequestHandler>(
    mut stream: TcpStream,
    handler: Arc<H>,
) -> Result<(), NetworkError> {
    loop {
        let request: Request = match read_frame(&mut stream).await {
            Ok(Some(request)) => request,
            Ok(None) => return Ok(()),
            Err(NetworkError::Serialization(e)) => {
                let response = Response::new(
                    ResponseType::Error {
                        message: format!("Malformed request: {}", e),
                    },
                    Uuid::nil(),
                );
                write_frame(&mut stream, &response).await?;
                continue;
            }
            Err(e) => return Err(e),
        };

        debug!("Received request: {}", request);
        let request_id = request.request_id;
        let handler = handler.clone();
        let response_type =
            match tokio::task::spawn_blocking(move || handler.handle(request.request_type)).await
            {
                Ok(response_type) => response_type,
                Err(e) => {
                    error!("Request handler for {} failed: {}", request_id, e);
                    ResponseType::Error {
                        message: "Internal handler failure".to_string(),
                    }
                }
            };

        let response = Response::new(response_type, request_id);
        debug!("Sending response: {}", response);
        write_frame(&mut stream, &response).await?;
    }
}

//! Entrypoint of the server.
//!
//! The transport below the dispatcher is a collaborator: this module binds
//! a listener, drives connections through hyper, collects each request body
//! and hands the result to [`Mux::serve`]. The core itself never touches a
//! socket.
use std::{convert::Infallible, io, pin::Pin, sync::Arc};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;

use crate::routing::Mux;

/// Entrypoint to run the server.
pub async fn listen(
    addr: impl tokio::net::ToSocketAddrs + std::fmt::Display + Clone,
    mux: Mux,
) -> io::Result<()> {
    use hyper_util::{
        rt::{TokioExecutor, TokioIo},
        server::conn::auto::Builder as Hyper,
    };
    use tokio::net::TcpListener;

    let tcp = match TcpListener::bind(addr.clone()).await {
        Ok(ok) => ok,
        Err(err) => {
            return Err(io::Error::new(
                err.kind(),
                format!("failed to bind \"{addr}\" :{err}"),
            ));
        }
    };

    let service = Serve { mux: Arc::new(mux) };

    loop {
        let service = service.clone();
        match tcp.accept().await {
            Ok((stream, _)) => {
                tokio::spawn(async move {
                    let rt = Hyper::new(TokioExecutor::new());
                    if let Err(_err) = rt
                        .serve_connection_with_upgrades(TokioIo::new(stream), service)
                        .await
                    {
                        #[cfg(feature = "log")]
                        log::error!("{_err}");
                    }
                });
            }
            Err(_err) => {
                #[cfg(feature = "log")]
                log::error!("failed to connect peer: {_err}");
            }
        }
    }
}

/// Service adapter collecting the body before synchronous dispatch.
#[derive(Debug, Clone)]
struct Serve {
    mux: Arc<Mux>,
}

impl hyper::service::Service<http::Request<Incoming>> for Serve {
    type Response = http::Response<Full<Bytes>>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: http::Request<Incoming>) -> Self::Future {
        let mux = self.mux.clone();
        Box::pin(async move {
            let (parts, body) = req.into_parts();
            let body = match body.collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(_err) => {
                    #[cfg(feature = "log")]
                    log::error!("failed to read request body: {_err}");
                    let mut response = http::Response::new(Full::new(Bytes::new()));
                    *response.status_mut() = http::StatusCode::BAD_REQUEST;
                    return Ok(response);
                }
            };
            let response = mux.serve(http::Request::from_parts(parts, body));
            Ok(response.map(Full::new))
        })
    }
}

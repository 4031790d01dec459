//! hyper service adapter for a [`Dispatcher`].

use bytes::Bytes;
use http::{Request, Response, StatusCode};
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Incoming;
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use tracing::warn;

use crate::dispatcher::Dispatcher;
use crate::errors::HttpError;

/// Buffers each request body and hands the request to the dispatcher.
#[derive(Clone, Debug)]
pub struct DispatchService {
    dispatcher: Dispatcher,
    max_body_bytes: usize,
}

impl DispatchService {
    #[must_use]
    pub fn new(dispatcher: Dispatcher, max_body_bytes: usize) -> Self {
        Self {
            dispatcher,
            max_body_bytes,
        }
    }
}

impl hyper::service::Service<Request<Incoming>> for DispatchService {
    type Response = Response<Full<Bytes>>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let dispatcher = self.dispatcher.clone();
        let limit = self.max_body_bytes;

        Box::pin(async move {
            let (parts, incoming) = req.into_parts();
            let body = match Limited::new(incoming, limit).collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(e) => {
                    warn!(
                        method = %parts.method,
                        path = %parts.uri.path(),
                        limit_bytes = limit,
                        error = %e,
                        "Failed to read request body"
                    );
                    let error = if e.is::<http_body_util::LengthLimitError>() {
                        HttpError::rejection(StatusCode::PAYLOAD_TOO_LARGE)
                            .with_info("limitBytes", limit)
                    } else {
                        HttpError::rejection(StatusCode::BAD_REQUEST)
                            .with_message("Failed to read request body")
                    };
                    let request = Request::from_parts(parts, Bytes::new());
                    return Ok(dispatcher.reject(request, error).await.map(Full::new));
                }
            };
            let response = dispatcher.dispatch(Request::from_parts(parts, body)).await;
            Ok(response.map(Full::new))
        })
    }
}

// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! HTTP endpoint exposing the admission engine to the API server.
//!
//! TLS is terminated in front of the operator, so this serves plain HTTP.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::webhooks::admission::{AdmissionEngine, ReviewKind};

pub struct WebhookServer {
    addr: SocketAddr,
    engine: Arc<AdmissionEngine>,
}

impl WebhookServer {
    pub fn new(addr: SocketAddr, engine: Arc<AdmissionEngine>) -> Self {
        Self { addr, engine }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.addr).await?;
        info!("Admission webhook listening on {}", self.addr);

        loop {
            let (stream, _) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let engine = self.engine.clone();

            tokio::spawn(async move {
                let service = service_fn(move |request| handle(engine.clone(), request));
                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    warn!("Webhook connection error: {}", e);
                }
            });
        }
    }
}

async fn handle(
    engine: Arc<AdmissionEngine>,
    request: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let response = match (request.method(), request.uri().path()) {
        (&Method::GET, "/healthz") => text_response(StatusCode::OK, "ok"),
        (&Method::POST, "/mutate") => review(&engine, request, ReviewKind::Mutate).await,
        (&Method::POST, "/validate") => review(&engine, request, ReviewKind::Validate).await,
        _ => text_response(StatusCode::NOT_FOUND, "not found"),
    };
    Ok(response)
}

async fn review(
    engine: &AdmissionEngine,
    request: Request<Incoming>,
    kind: ReviewKind,
) -> Response<Full<Bytes>> {
    let body = match request.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("Failed to read admission review body: {}", e);
            return text_response(StatusCode::BAD_REQUEST, "failed to read body");
        }
    };

    match engine.review(kind, &body) {
        Ok(encoded) => Response::builder()
            .status(StatusCode::OK)
            .header("content-type", "application/json")
            .body(Full::new(Bytes::from(encoded)))
            .unwrap_or_else(|_| Response::new(Full::new(Bytes::new()))),
        Err(e) => {
            warn!("Rejected malformed admission review: {}", e);
            text_response(StatusCode::BAD_REQUEST, &e.to_string())
        }
    }
}

fn text_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("content-type", "text/plain")
        .body(Full::new(Bytes::from(message.to_string())))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())))
}

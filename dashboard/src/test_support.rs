//! In-process stand-in for the Google endpoints, used by unit tests.
//!
//! Binds a hyper HTTP/1 server to a random local port, records every request it
//! receives, and answers with whatever the test's handler returns.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::service::service_fn;
use hyper::{Method, Request, Response, body};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub authorization: Option<String>,
    /// `application/x-www-form-urlencoded` body fields, if any.
    pub form: Vec<(String, String)>,
}

impl RecordedRequest {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn form_field(&self, key: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

type Handler = dyn Fn(&RecordedRequest) -> (u16, serde_json::Value) + Send + Sync;

pub(crate) struct MockApi {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockApi {
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(&RecordedRequest) -> (u16, serde_json::Value) + Send + Sync + 'static,
    {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind to localhost");
        let addr = listener.local_addr().expect("get local address");
        let handler: Arc<Handler> = Arc::new(handler);
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = requests.clone();
        tokio::spawn(async move {
            while let Ok((conn, _)) = listener.accept().await {
                let conn = hyper_util::rt::TokioIo::new(conn);
                let handler = handler.clone();
                let recorded = recorded.clone();
                let service = service_fn(move |req: Request<body::Incoming>| {
                    let handler = handler.clone();
                    let recorded = recorded.clone();
                    async move {
                        let method = req.method().clone();
                        let path = req.uri().path().to_string();
                        let query =
                            form_urlencoded::parse(req.uri().query().unwrap_or("").as_bytes())
                                .into_owned()
                                .collect();
                        let authorization = req
                            .headers()
                            .get(hyper::header::AUTHORIZATION)
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string);
                        let body = req.into_body().collect().await?.to_bytes();
                        let form = form_urlencoded::parse(&body).into_owned().collect();
                        let request = RecordedRequest {
                            method,
                            path,
                            query,
                            authorization,
                            form,
                        };

                        let (status, json) = handler(&request);
                        recorded.lock().unwrap().push(request);

                        let response = Response::builder()
                            .status(status)
                            .header("Content-Type", "application/json")
                            .body(Full::new(Bytes::from(json.to_string())))
                            .expect("static response parts are valid");
                        Ok::<_, hyper::Error>(response)
                    }
                });
                tokio::spawn(async move {
                    let _ = hyper::server::conn::http1::Builder::new()
                        .serve_connection(conn, service)
                        .await;
                });
            }
        });

        Self { addr, requests }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url())
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }
}

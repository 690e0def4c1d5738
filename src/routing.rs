//! Request dispatch.
//!
//! The [`Mux`] matches host, path and method to a registered handler and
//! drives the security pipeline around it: freeze the process mode gate,
//! run the Before phase, run the handler, run the Commit phase, flush.
//! Route resolution is exact — unknown host or path answers 404, a known
//! path with the wrong method answers 405.
//!
//! Registration happens in a single-threaded setup phase; the route table
//! is immutable once the dispatcher serves, and violating that is a usage
//! error that aborts rather than silently reconfiguring a live service.
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use fnv::{FnvHashMap, FnvHashSet};
use http::{Method, Request, Response, StatusCode};

use crate::{
    interceptor::Chain,
    mode,
    request::IncomingRequest,
    response::{Outcome, ResponseWriter},
};

/// A registered request handler.
///
/// Handlers receive the per-request writer and request, and must drive the
/// writer to completion — the returned [`Outcome`] has no other source.
/// Any closure of the right shape is a handler.
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, w: &mut ResponseWriter, req: &mut IncomingRequest) -> Outcome;
}

impl<F> Handler for F
where
    F: Fn(&mut ResponseWriter, &mut IncomingRequest) -> Outcome + Send + Sync + 'static,
{
    fn handle(&self, w: &mut ResponseWriter, req: &mut IncomingRequest) -> Outcome {
        self(w, req)
    }
}

/// The dispatcher: routes requests and enforces the security pipeline.
///
/// Built from a [`Config`](crate::Config); shared read-only across requests
/// once serving starts.
pub struct Mux {
    hosts: FnvHashSet<String>,
    routes: FnvHashMap<String, FnvHashMap<Method, Box<dyn Handler>>>,
    chain: Chain,
    served: AtomicBool,
}

enum Resolution<'a> {
    Matched(&'a dyn Handler),
    NotFound,
    MethodNotAllowed,
}

impl Mux {
    pub(crate) fn new(hosts: FnvHashSet<String>, chain: Chain) -> Self {
        Self {
            hosts,
            routes: FnvHashMap::default(),
            chain,
            served: AtomicBool::new(false),
        }
    }

    /// Register `handler` for `method` requests on `path`.
    ///
    /// # Panics
    ///
    /// Panics once this dispatcher has served a request; the route table is
    /// part of the frozen security configuration.
    pub fn handle(&mut self, path: impl Into<String>, method: Method, handler: impl Handler) {
        if self.served.load(Ordering::Acquire) {
            panic!("routes cannot change once the dispatcher has started serving");
        }
        self.routes
            .entry(path.into())
            .or_default()
            .insert(method, Box::new(handler));
    }

    /// Dispatch one request.
    ///
    /// The first call freezes the process [mode gate](crate::mode); from
    /// here on the security posture and route table are immutable.
    pub fn serve(&self, req: Request<Bytes>) -> Response<Bytes> {
        self.served.store(true, Ordering::Release);
        mode::freeze();

        let mut req = IncomingRequest::new(req);
        let mut w = ResponseWriter::new();

        let handler = match self.resolve(&req) {
            Resolution::Matched(handler) => handler,
            Resolution::NotFound => {
                let _ = w.write_error(StatusCode::NOT_FOUND);
                return w.into_response();
            }
            Resolution::MethodNotAllowed => {
                let _ = w.write_error(StatusCode::METHOD_NOT_ALLOWED);
                return w.into_response();
            }
        };

        let (ran, short) = self.chain.before(&mut w, &mut req);
        if short.is_none()
            && catch_unwind(AssertUnwindSafe(|| handler.handle(&mut w, &mut req))).is_err()
        {
            // The panic is contained to this request; respond with a clean
            // 500 carrying no internal detail.
            #[cfg(feature = "log")]
            log::error!("handler panicked serving {:?}", req.path());
            w = ResponseWriter::new();
            let _ = w.write_error(StatusCode::INTERNAL_SERVER_ERROR);
        }
        if w.is_open() {
            // Unreachable through the public API: every Outcome commits.
            let _ = w.write_error(StatusCode::INTERNAL_SERVER_ERROR);
        }
        self.chain.commit(ran, &mut w, &req);
        w.into_response()
    }

    fn resolve(&self, req: &IncomingRequest) -> Resolution<'_> {
        let Some(host) = req.host() else {
            return Resolution::NotFound;
        };
        if !self.hosts.contains(&host.to_ascii_lowercase()) {
            return Resolution::NotFound;
        }
        let Some(methods) = self.routes.get(req.path()) else {
            return Resolution::NotFound;
        };
        match methods.get(req.method()) {
            Some(handler) => Resolution::Matched(&**handler),
            None => Resolution::MethodNotAllowed,
        }
    }
}

impl std::fmt::Debug for Mux {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mux")
            .field("hosts", &self.hosts)
            .field("routes", &self.routes.len())
            .field("chain", &self.chain)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::Mux;
    use crate::{Config, safe::escape};
    use bytes::Bytes;
    use http::{Method, Request, StatusCode, header};
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    fn get(uri: &str) -> Request<Bytes> {
        Request::builder().uri(uri).body(Bytes::new()).unwrap()
    }

    fn test_mux() -> (Mux, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let mut mux = Config::new(["test.host.example"], "test-xsrf-key").mux();
        mux.handle("/test", Method::GET, move |w: &mut crate::ResponseWriter, _: &mut crate::IncomingRequest| {
            seen.fetch_add(1, Ordering::SeqCst);
            w.write(escape::html("response"))
        });
        (mux, calls)
    }

    #[test]
    fn matched_route_runs_the_handler_once() {
        let (mux, calls) = test_mux();
        let response = mux.serve(get("http://test.host.example/test"));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(&response.body()[..], b"response");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unknown_host_is_not_found() {
        let (mux, calls) = test_mux();
        let response = mux.serve(get("http://evil.example/test"));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn host_match_ignores_case() {
        let (mux, _) = test_mux();
        let response = mux.serve(get("http://TEST.host.EXAMPLE/test"));
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn missing_host_is_not_found() {
        let (mux, _) = test_mux();
        let response = mux.serve(get("/test"));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn unknown_path_is_not_found() {
        let (mux, _) = test_mux();
        let response = mux.serve(get("http://test.host.example/other"));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(&response.body()[..], b"Not Found");
    }

    #[test]
    fn wrong_method_is_method_not_allowed() {
        let (mux, calls) = test_mux();
        let req = Request::builder()
            .method(Method::POST)
            .uri("http://test.host.example/test")
            .body(Bytes::new())
            .unwrap();
        let response = mux.serve(req);
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn handler_panic_becomes_a_clean_500() {
        let mut mux = Config::new(["test.host.example"], "k").mux();
        mux.handle("/boom", Method::GET, |_: &mut crate::ResponseWriter, _: &mut crate::IncomingRequest| {
            panic!("secret detail")
        });
        let response = mux.serve(get("http://test.host.example/boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(&response.body()[..], b"Internal Server Error");
        // Default security headers still apply to the failure response.
        assert_eq!(
            response.headers().get(header::X_CONTENT_TYPE_OPTIONS).unwrap(),
            "nosniff",
        );
    }

    #[test]
    fn registration_after_serving_panics() {
        let (mut mux, _) = test_mux();
        let _ = mux.serve(get("http://test.host.example/test"));
        let err = catch_unwind(AssertUnwindSafe(|| {
            mux.handle("/late", Method::GET, |w: &mut crate::ResponseWriter, _: &mut crate::IncomingRequest| {
                w.no_content()
            });
        }));
        assert!(err.is_err());
    }

    #[test]
    fn default_cookie_is_secure_end_to_end() {
        let mut mux = Config::new(["test.host.example"], "k").mux();
        mux.handle("/cookie", Method::GET, |w: &mut crate::ResponseWriter, _: &mut crate::IncomingRequest| {
            w.add_cookie(crate::Cookie::new("test", "insecure")).unwrap();
            w.write(escape::html("ok"))
        });
        // Plaintext transport; the cookie is still forced secure.
        let response = mux.serve(get("http://test.host.example/cookie"));
        let cookie = response.headers().get(header::SET_COOKIE).unwrap();
        assert!(cookie.to_str().unwrap().contains("; Secure"));
    }

    #[test]
    fn malformed_query_can_reject_cleanly() {
        let mut mux = Config::new(["test.host.example"], "k").mux();
        mux.handle("/q", Method::GET, |w: &mut crate::ResponseWriter, req: &mut crate::IncomingRequest| {
            match req.query() {
                Ok(form) => {
                    let _ = form;
                    w.write(escape::html("ok"))
                }
                Err(_) => w.write_error(StatusCode::BAD_REQUEST),
            }
        });
        let response = mux.serve(get("http://test.host.example/q?broken=%zz"));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

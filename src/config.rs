//! Dispatcher configuration.
//!
//! A [`Config`] collects everything that must be decided before serving:
//! the allowed hosts, the XSRF signing key handed to application
//! interceptors, and the interceptor chain itself. [`Config::mux`] seals it
//! into a [`Mux`]; after the first request, nothing here can change.
use fnv::FnvHashSet;

use crate::{
    interceptor::{Chain, Interceptor, StaticHeaders},
    routing::Mux,
};

/// Pre-serving configuration for a [`Mux`].
///
/// Created with the allowed host set and the XSRF key; carries the default
/// [`StaticHeaders`] interceptor, with more registered through
/// [`intercept`](Config::intercept). Registration order is execution order.
pub struct Config {
    hosts: FnvHashSet<String>,
    xsrf_key: String,
    interceptors: Vec<Box<dyn Interceptor>>,
}

impl Config {
    /// Start a configuration for the given allowed hosts.
    ///
    /// Host matching is exact and case-insensitive; requests for any other
    /// host answer 404.
    pub fn new(
        hosts: impl IntoIterator<Item = impl Into<String>>,
        xsrf_key: impl Into<String>,
    ) -> Self {
        Self {
            hosts: hosts
                .into_iter()
                .map(|host| host.into().to_ascii_lowercase())
                .collect(),
            xsrf_key: xsrf_key.into(),
            interceptors: vec![Box::new(StaticHeaders::default())],
        }
    }

    /// Register an interceptor. Hooks run in registration order.
    pub fn intercept(&mut self, interceptor: impl Interceptor) {
        self.interceptors.push(Box::new(interceptor));
    }

    /// The XSRF signing key, for application interceptors that need it at
    /// registration time.
    pub fn xsrf_key(&self) -> &str {
        &self.xsrf_key
    }

    /// Seal the configuration into a dispatcher.
    pub fn mux(self) -> Mux {
        Mux::new(self.hosts, Chain::new(self.interceptors))
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("hosts", &self.hosts)
            .field("interceptors", &self.interceptors.len())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::Config;
    use crate::{
        interceptor::{Flow, Interceptor},
        request::IncomingRequest,
        response::ResponseWriter,
        safe::escape,
    };
    use bytes::Bytes;
    use http::{HeaderValue, Method, Request, StatusCode, header};

    #[test]
    fn xsrf_key_is_readable_at_setup() {
        let cfg = Config::new(["a.example"], "test-xsrf-key");
        assert_eq!(cfg.xsrf_key(), "test-xsrf-key");
    }

    #[test]
    fn default_chain_applies_static_headers() {
        let mut mux = Config::new(["a.example"], "k").mux();
        mux.handle("/", Method::GET, |w: &mut ResponseWriter, _: &mut IncomingRequest| {
            w.write(escape::html("hi"))
        });
        let response = mux.serve(
            Request::builder()
                .uri("http://a.example/")
                .body(Bytes::new())
                .unwrap(),
        );
        assert_eq!(
            response.headers().get(header::X_CONTENT_TYPE_OPTIONS).unwrap(),
            "nosniff",
        );
        assert_eq!(
            response.headers().get(header::X_FRAME_OPTIONS).unwrap(),
            "SAMEORIGIN",
        );
    }

    #[test]
    fn registered_interceptors_run_in_order() {
        struct Tag(&'static str);

        impl Interceptor for Tag {
            fn commit(
                &self,
                w: &mut crate::response::CommitWriter<'_>,
                _req: &IncomingRequest,
            ) -> Flow {
                // Later hooks overwrite, so the surviving value names the
                // interceptor that committed last.
                w.set_header(header::SERVER, HeaderValue::from_str(self.0).unwrap());
                Flow::Proceed
            }
        }

        let mut cfg = Config::new(["a.example"], "k");
        cfg.intercept(Tag("first"));
        cfg.intercept(Tag("second"));
        let mut mux = cfg.mux();
        mux.handle("/", Method::GET, |w: &mut ResponseWriter, _: &mut IncomingRequest| {
            w.write(escape::html("hi"))
        });

        let response = mux.serve(
            Request::builder()
                .uri("http://a.example/")
                .body(Bytes::new())
                .unwrap(),
        );
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(header::SERVER).unwrap(), "second");
    }

    #[test]
    fn rejecting_interceptor_still_gets_security_headers() {
        struct Deny;

        impl Interceptor for Deny {
            fn before(&self, w: &mut ResponseWriter, _req: &mut IncomingRequest) -> Flow {
                Flow::Done(w.write_error(StatusCode::FORBIDDEN))
            }
        }

        let mut cfg = Config::new(["a.example"], "k");
        cfg.intercept(Deny);
        let mut mux = cfg.mux();
        let handled = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let saw = handled.clone();
        mux.handle("/", Method::GET, move |w: &mut ResponseWriter, _: &mut IncomingRequest| {
            saw.store(true, std::sync::atomic::Ordering::SeqCst);
            w.write(escape::html("hi"))
        });

        let response = mux.serve(
            Request::builder()
                .uri("http://a.example/")
                .body(Bytes::new())
                .unwrap(),
        );
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(!handled.load(std::sync::atomic::Ordering::SeqCst));
        // StaticHeaders registered ahead of Deny, so its Commit still ran.
        assert_eq!(
            response.headers().get(header::X_CONTENT_TYPE_OPTIONS).unwrap(),
            "nosniff",
        );
    }
}

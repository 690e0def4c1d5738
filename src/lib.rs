//! Security-hardened HTTP dispatch.
//!
//! `tate` routes requests to handlers while guaranteeing, by construction, a
//! set of web-security defaults an application cannot accidentally disable:
//! cookies ship `Secure`, response bodies only accept pre-escaped
//! [`SafeOutput`] values, security modules get ordered [interceptor] hooks
//! around every handler, and the relaxed dev-mode posture freezes off
//! permanently the moment the first request is served.
//!
//! ```
//! use http::{Method, Request, StatusCode};
//! use tate::{Config, IncomingRequest, ResponseWriter, escape};
//!
//! let mut mux = Config::new(["api.example"], "secret-xsrf-key").mux();
//! mux.handle("/hello", Method::GET, |w: &mut ResponseWriter, req: &mut IncomingRequest| {
//!     let shout = match req.query() {
//!         Ok(form) => form.bool("shout", false),
//!         Err(_) => return w.write_error(StatusCode::BAD_REQUEST),
//!     };
//!     w.write(escape::html(if shout { "HELLO" } else { "hello" }))
//! });
//!
//! let req = Request::builder()
//!     .uri("http://api.example/hello?shout=true")
//!     .body(bytes::Bytes::new())
//!     .unwrap();
//! let res = mux.serve(req);
//! assert_eq!(res.status(), StatusCode::OK);
//! assert_eq!(&res.body()[..], b"HELLO");
//! ```
//!
//! # Pipeline
//!
//! Every dispatch walks the same path: freeze the [mode gate](mode), resolve
//! host + path + method, run the interceptors' Before hooks in registration
//! order, run the handler, run the Commit hooks, flush. A handler must drive
//! its [`ResponseWriter`] to completion — the [`Outcome`] it returns has no
//! other source — and once the response is committed, headers and cookies
//! are settled except for the Commit-phase window.
//!
//! # Serving
//!
//! The dispatcher core is synchronous and transport-free; the `tokio`
//! feature provides [`listen`], a hyper-backed accept loop, for running it
//! as a real server.
//!
//! [interceptor]: crate::interceptor::Interceptor

#![warn(missing_debug_implementations)]

pub mod cookie;
pub mod form;
pub mod interceptor;
pub mod mode;
pub mod request;
pub mod response;
pub mod routing;
pub mod safe;

mod config;

#[cfg(feature = "tokio")]
pub mod rt;

// ===== reexports =====

pub use config::Config;
pub use cookie::Cookie;
pub use form::Form;
pub use interceptor::{Flow, Interceptor};
pub use mode::{is_dev_mode, set_dev_mode};
pub use request::IncomingRequest;
pub use response::{CommitWriter, Outcome, ResponseWriter};
pub use routing::{Handler, Mux};
pub use safe::{SafeOutput, escape};

#[cfg(feature = "tokio")]
pub use rt::listen;

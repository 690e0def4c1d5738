//! Dev mode relaxes cookie security, and only until the first request.
use bytes::Bytes;
use http::{Method, Request, StatusCode, header};
use tate::{Config, Cookie, IncomingRequest, ResponseWriter, escape};

#[test]
fn dev_mode_applies_until_the_first_request() {
    // Toggled freely before serving; the last value wins.
    tate::set_dev_mode(false);
    tate::set_dev_mode(true);
    assert!(tate::is_dev_mode());

    let mut mux = Config::new(["localhost"], "test-xsrf-key").mux();
    mux.handle(
        "/",
        Method::GET,
        |w: &mut ResponseWriter, _: &mut IncomingRequest| {
            w.add_cookie(Cookie::new("session", "v")).expect("add cookie");
            w.write(escape::html("dev"))
        },
    );

    let req = Request::builder()
        .uri("http://localhost/")
        .body(Bytes::new())
        .unwrap();
    let response = mux.serve(req);
    assert_eq!(response.status(), StatusCode::OK);

    // Local plaintext development: the default cookie may skip `Secure`.
    let cookie = response.headers().get(header::SET_COOKIE).unwrap();
    assert!(!cookie.to_str().unwrap().contains("Secure"));

    // The posture is frozen now, even though it froze in the relaxed state.
    let err = std::panic::catch_unwind(|| tate::set_dev_mode(false));
    assert!(err.is_err(), "want panic on set_dev_mode after serving");
    assert!(tate::is_dev_mode());
}

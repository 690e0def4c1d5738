//! Serving in production mode locks the security posture for good.
use bytes::Bytes;
use http::{Method, Request, StatusCode, header};
use tate::{Config, Cookie, IncomingRequest, ResponseWriter, escape};

#[test]
fn loads_in_prod_mode_and_cannot_change_afterwards() {
    let mut mux = Config::new(["test.host.example"], "test-xsrf-key").mux();
    mux.handle(
        "/test",
        Method::GET,
        |w: &mut ResponseWriter, req: &mut IncomingRequest| {
            let form = req.query().expect("cannot parse GET form");
            assert!(form.bool("test", false), "test parameter, got false, want true");
            w.add_cookie(Cookie::new("test", "insecure")).expect("add cookie");
            w.write(escape::html("response"))
        },
    );

    // Plaintext transport on purpose; the secure defaults must not care.
    let req = Request::builder()
        .uri("http://test.host.example/test?test=true")
        .body(Bytes::new())
        .unwrap();
    let response = mux.serve(req);

    assert_eq!(response.status(), StatusCode::OK, "want 200");
    assert_eq!(&response.body()[..], b"response");

    let cookies: Vec<_> = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .collect();
    assert!(!cookies.is_empty(), "got no cookies, wanted cookies");
    for cookie in cookies {
        let cookie = cookie.to_str().unwrap();
        assert!(
            cookie.contains("; Secure"),
            "got non-secure cookie {cookie:?}, should have been secure",
        );
    }

    // The first dispatch froze the gate; relaxing the posture of a serving
    // process is a fatal usage error, every time.
    for _ in 0..2 {
        let err = std::panic::catch_unwind(|| tate::set_dev_mode(true));
        assert!(
            err.is_err(),
            "got no panic, wanted panic when setting dev mode after serving",
        );
    }
    assert!(!tate::is_dev_mode());
}

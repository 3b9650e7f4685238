//! `HttpClient` behaviour against a scripted transport: request shaping,
//! header capture, error classification and lifecycle.

mod common;

use common::{Exchange, ScriptedTransport};
use http_facade::{
    codes, AuthScheme, ClientError, Form, HttpClient, RequestBody, TransportOption, UploadFile,
    DEFAULT_USER_AGENT,
};

fn client() -> (HttpClient<ScriptedTransport>, ScriptedTransport) {
    let transport = ScriptedTransport::new();
    let client = HttpClient::with_transport(transport.clone()).unwrap();
    (client, transport)
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

#[test]
fn construction_applies_baseline_options() {
    let (_client, transport) = client();
    let options = transport.current_options();
    assert!(options.contains(&TransportOption::UserAgent(DEFAULT_USER_AGENT.to_string())));
    assert!(options.contains(&TransportOption::CaptureRequestHeaders(true)));
    assert!(options.contains(&TransportOption::IncludeHeadersInBody(false)));
    assert!(options.contains(&TransportOption::ReturnTransfer(true)));
    assert!(options.contains(&TransportOption::Encoding("gzip,deflate".to_string())));
    assert!(options.contains(&TransportOption::VerifyPeer(false)));
    assert!(options.contains(&TransportOption::VerifyHost(false)));
}

#[test]
fn unavailable_transport_is_rejected() {
    let result = HttpClient::with_transport(ScriptedTransport::unavailable());
    assert!(matches!(result, Err(ClientError::Unavailable(_))));
}

#[test]
fn make_uses_five_second_timeouts() {
    let client = HttpClient::make().unwrap();
    assert_eq!(client.config().connect_timeout_secs, 5);
    assert_eq!(client.config().timeout_secs, 5);
}

// ---------------------------------------------------------------------------
// Request shaping
// ---------------------------------------------------------------------------

#[test]
fn get_appends_params_as_query() {
    let (mut client, transport) = client();
    client
        .get("https://api.example.com/search", &Form::new().field("q", "keyword"))
        .unwrap();

    let sent = transport.last_sent();
    assert_eq!(sent.method, "GET");
    assert_eq!(sent.url, "https://api.example.com/search?q=keyword");
    assert_eq!(sent.body, RequestBody::Empty);
}

#[test]
fn get_without_params_keeps_url() {
    let (mut client, transport) = client();
    client.get("https://api.example.com/search", &Form::new()).unwrap();
    assert_eq!(transport.last_sent().url, "https://api.example.com/search");
}

#[test]
fn post_sends_url_encoded_body() {
    let (mut client, transport) = client();
    let form = Form::new().field("username", "john").field("password", "doe");
    client.post("https://api.example.com/login", &form, false).unwrap();

    let sent = transport.last_sent();
    assert_eq!(sent.method, "POST");
    assert_eq!(sent.url, "https://api.example.com/login");
    assert_eq!(
        sent.body,
        RequestBody::UrlEncoded("username=john&password=doe".to_string())
    );
}

#[test]
fn post_as_json() {
    let (mut client, transport) = client();
    let form = Form::new().field("username", "john").field("admin", false);
    client.post("https://api.example.com/users", &form, true).unwrap();

    assert_eq!(
        transport.last_sent().body,
        RequestBody::Json(r#"{"username":"john","admin":false}"#.to_string())
    );
}

#[test]
fn post_with_file_passes_structure_through() {
    let (mut client, transport) = client();
    let form = Form::new()
        .field("title", "avatar")
        .file("image", UploadFile::new("/tmp/avatar.png"));
    client.post("https://api.example.com/upload", &form, false).unwrap();

    assert_eq!(transport.last_sent().body, RequestBody::Multipart(form));
}

#[test]
fn post_json_with_file_fails_before_sending() {
    let (mut client, transport) = client();
    let form = Form::new().file("image", UploadFile::new("/tmp/avatar.png"));
    let err = client.post("https://api.example.com/upload", &form, true).unwrap_err();

    assert!(matches!(err, ClientError::Serialization(_)));
    assert!(transport.state.borrow().sent.is_empty());
}

#[test]
fn post_raw_sends_bytes() {
    let (mut client, transport) = client();
    client
        .post_raw("https://api.example.com/raw", "<xml/>", Some("application/xml"))
        .unwrap();

    assert_eq!(
        transport.last_sent().body,
        RequestBody::Raw {
            content_type: Some("application/xml".to_string()),
            data: b"<xml/>".to_vec(),
        }
    );
}

#[test]
fn put_without_payload_uses_query() {
    let (mut client, transport) = client();
    client
        .put("https://api.example.com/items/1", &Form::new().field("name", "x"), false, false)
        .unwrap();

    let sent = transport.last_sent();
    assert_eq!(sent.method, "PUT");
    assert_eq!(sent.url, "https://api.example.com/items/1?name=x");
    assert_eq!(sent.body, RequestBody::Empty);
}

#[test]
fn put_with_json_payload() {
    let (mut client, transport) = client();
    client
        .put("https://api.example.com/items/1", &Form::new().field("name", "x"), true, true)
        .unwrap();

    let sent = transport.last_sent();
    assert_eq!(sent.url, "https://api.example.com/items/1");
    assert_eq!(sent.body, RequestBody::Json(r#"{"name":"x"}"#.to_string()));
}

#[test]
fn patch_with_form_payload() {
    let (mut client, transport) = client();
    client
        .patch("https://api.example.com/items/1", &Form::new().field("done", true), true, false)
        .unwrap();

    let sent = transport.last_sent();
    assert_eq!(sent.method, "PATCH");
    assert_eq!(sent.body, RequestBody::UrlEncoded("done=1".to_string()));
}

#[test]
fn delete_with_payload_sends_body() {
    let (mut client, transport) = client();
    client
        .delete("https://api.example.com/items/1", &Form::new().field("reason", "spam"), true)
        .unwrap();

    let sent = transport.last_sent();
    assert_eq!(sent.method, "DELETE");
    assert_eq!(sent.url, "https://api.example.com/items/1");
    assert_eq!(sent.body, RequestBody::UrlEncoded("reason=spam".to_string()));
}

#[test]
fn delete_without_data_sends_nothing_either_way() {
    let (mut client, transport) = client();
    client.delete("https://api.example.com/items/1", &Form::new(), false).unwrap();
    let sent = transport.last_sent();
    assert_eq!(sent.url, "https://api.example.com/items/1");
    assert_eq!(sent.body, RequestBody::Empty);

    client.delete("https://api.example.com/items/1", &Form::new(), true).unwrap();
    let sent = transport.last_sent();
    assert_eq!(sent.url, "https://api.example.com/items/1");
    assert_eq!(sent.body, RequestBody::Empty);
}

#[test]
fn purge_sets_method_and_host_header() {
    let (mut client, transport) = client();
    client
        .purge("http://10.0.0.5/assets/app.js", Some("www.example.com"))
        .unwrap();

    let sent = transport.last_sent();
    assert_eq!(sent.method, "PURGE");
    assert_eq!(sent.url, "http://10.0.0.5/assets/app.js");
    assert_eq!(sent.headers, vec!["Host: www.example.com".to_string()]);
}

#[test]
fn purge_without_host_adds_no_header() {
    let (mut client, transport) = client();
    client.purge("http://10.0.0.5/", None).unwrap();
    assert!(transport.last_sent().headers.is_empty());
}

// ---------------------------------------------------------------------------
// Headers, cookies, auth
// ---------------------------------------------------------------------------

#[test]
fn headers_accumulate_and_replace_by_name() {
    let (mut client, transport) = client();
    client
        .set_header("X-Requested-With", "XMLHttpRequest")
        .set_header("Accept", "text/html")
        .set_header("Accept", "application/json");
    client.get("https://api.example.com/", &Form::new()).unwrap();

    assert_eq!(
        transport.last_sent().headers,
        vec![
            "Accept: application/json".to_string(),
            "X-Requested-With: XMLHttpRequest".to_string(),
        ]
    );
}

#[test]
fn cookies_serialize_into_one_value() {
    let (mut client, transport) = client();
    client.set_cookie("session", "abc 123").set_cookie("lang", "en");
    client.get("https://api.example.com/", &Form::new()).unwrap();

    assert_eq!(
        transport.last_sent().cookie.as_deref(),
        Some("lang=en; session=abc+123")
    );
}

#[test]
fn basic_authentication_sets_scheme_and_credentials() {
    let (mut client, transport) = client();
    client.set_basic_authentication("john", "doe");

    let options = transport.current_options();
    assert!(options.contains(&TransportOption::HttpAuth(AuthScheme::Basic)));
    assert!(options.contains(&TransportOption::UserPwd("john:doe".to_string())));
}

#[test]
fn setters_push_options() {
    let (mut client, transport) = client();
    client
        .set_user_agent("agent/1.0")
        .set_referer("https://example.com/")
        .set_timeout(3, 7)
        .set_ssl_verify(true, true)
        .set_encoding("gzip")
        .set_verbose(true);

    let options = transport.current_options();
    for expected in [
        TransportOption::UserAgent("agent/1.0".to_string()),
        TransportOption::Referer("https://example.com/".to_string()),
        TransportOption::ConnectTimeout(std::time::Duration::from_secs(3)),
        TransportOption::Timeout(std::time::Duration::from_secs(7)),
        TransportOption::VerifyPeer(true),
        TransportOption::VerifyHost(true),
        TransportOption::Encoding("gzip".to_string()),
        TransportOption::Verbose(true),
    ] {
        assert!(options.contains(&expected), "missing {expected:?}");
    }
}

// ---------------------------------------------------------------------------
// Header capture and classification
// ---------------------------------------------------------------------------

#[test]
fn continue_block_is_not_captured() {
    let (mut client, transport) = client();
    transport.push(Exchange::response(
        &[
            "HTTP/1.1 100 Continue",
            "",
            "HTTP/1.1 200 OK",
            "Content-Type: application/json",
            "Content-Length: 2",
        ],
        "{}",
    ));

    let response = client
        .post("https://api.example.com/upload", &Form::new().field("a", 1), false)
        .unwrap();

    assert_eq!(
        response.header_lines(),
        ["HTTP/1.1 200 OK", "Content-Type: application/json", "Content-Length: 2"]
    );
    assert_eq!(response.status(), 200);
    assert!(response.is_success());
    assert_eq!(response.header("CONTENT-TYPE").as_deref(), Some("application/json"));
    assert_eq!(response.header("X-Missing"), None);
}

#[test]
fn transport_failure_is_recorded_not_thrown() {
    let (mut client, transport) = client();
    transport.push(Exchange::failure(codes::COULDNT_CONNECT, "Connection refused"));

    let response = client.get("http://127.0.0.1:1/", &Form::new()).unwrap();

    assert!(response.is_error());
    assert!(response.is_transport_error());
    assert_eq!(response.error_code(), 7);
    assert_eq!(response.status(), 0);
    assert_eq!(response.error_message(), "Connection refused");
    assert!(response.body().is_none());
}

#[test]
fn http_error_uses_status_and_status_line() {
    let (mut client, transport) = client();
    transport.push(Exchange::response(
        &["HTTP/1.1 404 Not Found", "Content-Type: text/plain"],
        "missing",
    ));

    let response = client.get("https://api.example.com/nope", &Form::new()).unwrap();

    assert!(response.is_error());
    assert!(!response.is_transport_error());
    assert!(response.is_client_error());
    assert_eq!(response.error_code(), 404);
    assert_eq!(response.error_message(), "HTTP/1.1 404 Not Found");
    assert_eq!(response.text(), "missing");
}

#[test]
fn request_headers_are_split_into_lines() {
    let (mut client, _transport) = client();
    client.set_header("X-Trace", "1");
    let response = client.get("https://api.example.com/", &Form::new()).unwrap();

    assert_eq!(
        response.request_headers(),
        ["GET https://api.example.com/ HTTP/1.1", "X-Trace: 1"]
    );
}

#[test]
fn results_do_not_leak_between_requests() {
    let (mut client, transport) = client();
    transport
        .push(Exchange::response(&["HTTP/1.1 500 Internal Server Error", "X-First: 1"], "boom"))
        .push(Exchange::response(&["HTTP/1.1 200 OK"], "fine"));

    let first = client
        .post("https://api.example.com/a", &Form::new().field("x", 1), false)
        .unwrap();
    let second = client.get("https://api.example.com/b", &Form::new()).unwrap();

    assert!(first.is_server_error());
    assert_eq!(first.error_code(), 500);
    assert!(!second.is_error());
    assert_eq!(second.error_code(), 0);
    assert_eq!(second.header("x-first"), None);
    assert_eq!(second.text(), "fine");
    assert_eq!(transport.last_sent().body, RequestBody::Empty);
}

#[test]
fn endpoint_reports_last_url() {
    let (mut client, _transport) = client();
    client
        .get("https://api.example.com/search", &Form::new().field("q", "x"))
        .unwrap();
    assert_eq!(
        client.endpoint().as_deref(),
        Some("https://api.example.com/search?q=x")
    );
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn reset_starts_over_with_a_fresh_handle() {
    let (mut client, transport) = client();
    client.set_header("X-Old", "1").set_cookie("old", "1");
    client.get("https://api.example.com/", &Form::new()).unwrap();

    client.reset().unwrap();
    assert!(client.headers().is_empty());
    assert!(client.cookies().is_empty());
    {
        let state = transport.state.borrow();
        assert_eq!(state.opened, 2);
        assert_eq!(state.closed, 1);
    }
    assert!(transport
        .current_options()
        .contains(&TransportOption::CaptureRequestHeaders(true)));

    let response = client.get("https://api.example.com/", &Form::new()).unwrap();
    let sent = transport.last_sent();
    assert!(sent.headers.is_empty());
    assert_eq!(sent.cookie, None);
    assert!(!response.is_error());
}

#[test]
fn reset_is_repeatable() {
    let (mut client, transport) = client();
    client.reset().unwrap().reset().unwrap();
    let state = transport.state.borrow();
    assert_eq!(state.opened, 3);
    assert_eq!(state.closed, 2);
}

#[test]
fn close_is_idempotent_and_blocks_execution() {
    let (mut client, transport) = client();
    client.close().close();
    assert!(client.is_closed());
    assert_eq!(transport.state.borrow().closed, 1);

    let err = client.get("https://api.example.com/", &Form::new()).unwrap_err();
    assert!(matches!(err, ClientError::Closed));
    assert!(client.info().is_none());
}

#[test]
fn reset_reopens_a_closed_client() {
    let (mut client, _transport) = client();
    client.close();
    client.reset().unwrap();
    assert!(!client.is_closed());
    assert!(client.get("https://api.example.com/", &Form::new()).is_ok());
}

#[test]
fn drop_closes_the_handle() {
    let (client, transport) = client();
    drop(client);
    assert_eq!(transport.state.borrow().closed, 1);
}

use std::path::Path;

use axum::{
    body::{to_bytes, Body},
    extract::DefaultBodyLimit,
    http::{Request, StatusCode},
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use jobboard_backend::{
    config::Config,
    middleware::rate_limit::{new_rps_state, rps_middleware},
    models::job::JobSnapshot,
    routes,
    services::job_directory::InMemoryJobDirectory,
    AppState,
};
use serde_json::Value as JsonValue;
use tower::ServiceExt;

const BOUNDARY: &str = "----quickapplyboundary";
const PDF_BYTES: &[u8] = b"%PDF-1.4\n% resume body\n";

struct TestApp {
    _tmp: tempfile::TempDir,
    config: Config,
    router: Router,
}

fn spawn_app(configure: impl FnOnce(&mut Config)) -> TestApp {
    let tmp = tempfile::tempdir().expect("tempdir");
    let mut config = Config::for_uploads_dir(tmp.path());
    configure(&mut config);

    let jobs = InMemoryJobDirectory::with_jobs([JobSnapshot {
        id: "J1".into(),
        title: "Backend Engineer".into(),
        company_name: "Acme".into(),
        recruiter_email: None,
    }]);
    let state = AppState::in_memory(&config, jobs);

    let router = Router::new()
        .route(
            "/jobs/:id/quick-apply",
            post(routes::quick_apply::quick_apply)
                .layer(DefaultBodyLimit::max(config.max_resume_bytes + 1024 * 1024)),
        )
        .route(
            "/applications/track",
            get(routes::tracking::track_application),
        )
        .route("/health", get(routes::health::health))
        .layer(from_fn_with_state(
            new_rps_state(config.public_rps),
            rps_middleware,
        ))
        .with_state(state);

    TestApp {
        _tmp: tmp,
        config,
        router,
    }
}

fn multipart_body(fields: &[(&str, &str)], resume: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((filename, bytes)) = resume {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"resume\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn quick_apply_request(job_id: &str, email: &str, resume: Option<(&str, &[u8])>) -> Request<Body> {
    let body = multipart_body(
        &[("name", "A"), ("email", email), ("phone", "1"), ("message", "Hello")],
        resume,
    );
    Request::builder()
        .method("POST")
        .uri(format!("/jobs/{}/quick-apply", job_id))
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

fn track_request(query: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(format!("/applications/track{}", query))
        .body(Body::empty())
        .unwrap()
}

async fn send(app: &TestApp, req: Request<Body>) -> (StatusCode, JsonValue) {
    let resp = app.router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        JsonValue::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

#[tokio::test]
async fn quick_apply_then_track_round_trip() {
    let app = spawn_app(|_| {});

    let (status, body) = send(
        &app,
        quick_apply_request("J1", "A@X.com", Some(("r.pdf", PDF_BYTES))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "body: {body}");
    assert_eq!(body["success"], true);

    let application = &body["application"];
    assert_eq!(application["status"], "Pending");
    assert_eq!(application["jobId"], "J1");
    let token = application["trackingToken"].as_str().unwrap().to_string();
    assert_eq!(token.len(), 64);
    assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    assert!(body["trackUrl"].as_str().unwrap().contains(&token));
    assert!(application["resumeUrl"]
        .as_str()
        .unwrap()
        .starts_with("http://localhost:8080/uploads/resumes/"));
    assert!(application["documentUrl"]
        .as_str()
        .unwrap()
        .ends_with(&format!("application-{}.pdf", token)));
    assert!(body["previewUrl"].is_string());

    let uploads = &app.config.uploads_dir;
    assert_eq!(file_count(&uploads.join("resumes")), 1);
    assert_eq!(file_count(&uploads.join("summaries")), 1);

    let (status, body) = send(
        &app,
        track_request(&format!("?token={}&email=a%40x.com", token)),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "body: {body}");
    let tracked = &body["application"];
    assert_eq!(tracked["jobTitle"], "Backend Engineer");
    assert_eq!(tracked["companyName"], "Acme");
    assert_eq!(tracked["applicantName"], "A");
    assert_eq!(tracked["status"], "Pending");
    assert_eq!(tracked["message"], "Hello");
    assert!(tracked.get("trackingToken").is_none());
    assert!(tracked.get("email").is_none());
}

#[tokio::test]
async fn duplicate_submission_is_a_conflict() {
    let app = spawn_app(|_| {});

    let (status, _) = send(
        &app,
        quick_apply_request("J1", "a@x.com", Some(("r.pdf", PDF_BYTES))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &app,
        quick_apply_request("J1", "A@x.COM", Some(("other.pdf", PDF_BYTES))),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "duplicate_application");
    assert_eq!(file_count(&app.config.uploads_dir.join("resumes")), 1);
    assert_eq!(file_count(&app.config.uploads_dir.join("summaries")), 1);
}

#[tokio::test]
async fn disallowed_resume_type_writes_nothing() {
    let app = spawn_app(|_| {});

    let (status, body) = send(
        &app,
        quick_apply_request("J1", "a@x.com", Some(("r.exe", b"MZ\x90\x00"))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "unsupported_media_type");
    assert_eq!(file_count(&app.config.uploads_dir.join("resumes")), 0);
    assert_eq!(file_count(&app.config.uploads_dir.join("summaries")), 0);
}

#[tokio::test]
async fn renamed_executable_is_rejected_by_content() {
    let app = spawn_app(|_| {});

    let (status, body) = send(
        &app,
        quick_apply_request("J1", "a@x.com", Some(("r.pdf", b"MZ\x90\x00"))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "unsupported_media_type");
    assert_eq!(file_count(&app.config.uploads_dir.join("resumes")), 0);
}

#[tokio::test]
async fn oversized_resume_is_rejected_while_streaming() {
    let app = spawn_app(|config| config.max_resume_bytes = 16);

    let mut resume = PDF_BYTES.to_vec();
    resume.extend_from_slice(&[b'x'; 64]);
    let (status, body) = send(
        &app,
        quick_apply_request("J1", "a@x.com", Some(("r.pdf", &resume))),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"], "payload_too_large");
    assert_eq!(file_count(&app.config.uploads_dir.join("resumes")), 0);
}

#[tokio::test]
async fn missing_fields_and_unknown_jobs_are_rejected() {
    let app = spawn_app(|_| {});

    let (status, body) = send(&app, quick_apply_request("J1", "a@x.com", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, body) = send(
        &app,
        quick_apply_request("J1", "not-an-email", Some(("r.pdf", PDF_BYTES))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, body) = send(
        &app,
        quick_apply_request("nope", "a@x.com", Some(("r.pdf", PDF_BYTES))),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    assert_eq!(file_count(&app.config.uploads_dir.join("resumes")), 0);
}

#[tokio::test]
async fn unreachable_mail_relay_does_not_fail_the_submission() {
    let app = spawn_app(|config| {
        config.mail.relay_url = Some("http://127.0.0.1:9/send".into());
        config.mail.relay_api_key = Some("relay-key".into());
    });

    let (status, body) = send(
        &app,
        quick_apply_request("J1", "a@x.com", Some(("r.pdf", PDF_BYTES))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "body: {body}");
    assert!(body.get("previewUrl").is_none());

    let token = body["application"]["trackingToken"].as_str().unwrap();
    let (status, _) = send(
        &app,
        track_request(&format!("?token={}&email=a%40x.com", token)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn tracking_misses_are_indistinguishable() {
    let app = spawn_app(|_| {});

    let (_, body) = send(
        &app,
        quick_apply_request("J1", "a@x.com", Some(("r.pdf", PDF_BYTES))),
    )
    .await;
    let token = body["application"]["trackingToken"]
        .as_str()
        .unwrap()
        .to_string();

    let (wrong_email_status, wrong_email) = send(
        &app,
        track_request(&format!("?token={}&email=b%40x.com", token)),
    )
    .await;
    let (wrong_token_status, wrong_token) = send(
        &app,
        track_request(&format!("?token={}&email=a%40x.com", "0".repeat(64))),
    )
    .await;

    let (upper_token_status, upper_token) = send(
        &app,
        track_request(&format!("?token={}&email=a%40x.com", token.to_uppercase())),
    )
    .await;

    assert_eq!(wrong_email_status, StatusCode::NOT_FOUND);
    assert_eq!(wrong_token_status, StatusCode::NOT_FOUND);
    assert_eq!(upper_token_status, StatusCode::NOT_FOUND);
    assert_eq!(wrong_email, wrong_token);
    assert_eq!(wrong_email, upper_token);
}

#[tokio::test]
async fn tracking_requires_both_parameters() {
    let app = spawn_app(|_| {});

    for query in ["", "?token=abc", "?email=a%40x.com", "?token=&email="] {
        let (status, body) = send(&app, track_request(query)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "query: {query}");
        assert_eq!(body["error"], "validation_error");
    }
}

#[tokio::test]
async fn health_reports_ok() {
    let app = spawn_app(|_| {});
    let req = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

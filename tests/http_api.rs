//! HTTP contract tests driven through the router without a socket

mod common;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_TYPE, COOKIE, SET_COOKIE};
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{jpeg_portrait, png_portrait, TestEnv, ADMIN_PASSWORD};
use flate2::read::GzDecoder;
use http_body_util::BodyExt;
use photobooth::{create_router, AppState, Bucket, StorageManager};
use serde_json::{json, Value};
use tower::ServiceExt;

const BOUNDARY: &str = "photobooth-test-boundary";

enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                        .as_bytes(),
                );
            },
            Part::File(name, filename, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
                body.extend_from_slice(b"\r\n");
            },
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn process_request(parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/process")
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

fn json_request(uri: &str, body: &Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn app(env: &TestEnv) -> Router {
    let state = AppState::new(&env.config);
    state.storage.ensure_layout().await.unwrap();
    create_router(state, &env.config.server)
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

async fn login(app: &Router) -> String {
    let response = app
        .clone()
        .oneshot(json_request(
            "/admin/login",
            &json!({ "password": ADMIN_PASSWORD }),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health() {
    let env = TestEnv::new();
    let response = app(&env).await.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "status": "healthy" }));
}

#[tokio::test]
async fn test_process_without_file_is_rejected() {
    let env = TestEnv::new();
    let response = app(&env)
        .await
        .oneshot(process_request(&[Part::Text("image_set_background", "2")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        json!({ "error": "No image file provided" })
    );
}

#[tokio::test]
async fn test_process_rejects_empty_filename_and_bad_extension() {
    let env = TestEnv::new();
    let app = app(&env).await;
    let image = png_portrait(16, 16);

    let response = app
        .clone()
        .oneshot(process_request(&[Part::File("person_image", "", &image)]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "No selected file");

    let response = app
        .oneshot(process_request(&[Part::File("person_image", "photo.gif", &image)]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Invalid file type");
}

#[tokio::test]
async fn test_process_and_download_round_trip() {
    let env = TestEnv::new();
    let app = app(&env).await;
    let image = jpeg_portrait(4000, 3000);

    let response = app
        .clone()
        .oneshot(process_request(&[
            Part::File("person_image", "guest.jpg", &image),
            Part::Text("image_set_background", "99"),
            Part::Text("name", "Grace"),
        ]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Image processed successfully");
    assert_eq!(body["name"], "Grace");
    assert_eq!(body["number"], "");
    let output_file = body["output_file"].as_str().unwrap().to_string();
    assert!(output_file.ends_with("_output.png"));
    assert_eq!(
        body["download_url"],
        format!("http://booth.test/download/{output_file}")
    );

    let response = app
        .clone()
        .oneshot(get(&format!("/download/{output_file}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "image/png");
    assert!(response.headers()[CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .starts_with("attachment"));
    let served = body_bytes(response).await;
    let on_disk = std::fs::read(env.outputs_dir().join(&output_file)).unwrap();
    assert_eq!(served, on_disk);

    let response = app
        .oneshot(get(&format!("/download/{output_file}?inline=true")))
        .await
        .unwrap();
    assert!(response.headers()[CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .starts_with("inline"));
}

#[tokio::test]
async fn test_non_numeric_frame_selector_uses_frame_one() {
    let env = TestEnv::new();
    let image = png_portrait(40, 80);
    let response = app(&env)
        .await
        .oneshot(process_request(&[
            Part::File("person_image", "me.png", &image),
            Part::Text("image_set_background", "sunset"),
        ]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_missing_frame_is_404() {
    let env = TestEnv::with_frames(&[]);
    let image = png_portrait(40, 80);
    let response = app(&env)
        .await
        .oneshot(process_request(&[
            Part::File("person_image", "me.png", &image),
            Part::Text("image_set_background", "3"),
        ]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "Frame 3 not found");
}

#[tokio::test]
async fn test_segmentation_failure_is_generic_500() {
    let env = TestEnv::new();
    let response = app(&env)
        .await
        .oneshot(process_request(&[Part::File(
            "person_image",
            "broken.jpg",
            b"definitely not a jpeg",
        )]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    let message = body["error"].as_str().unwrap();
    assert!(!message.contains(env.dir.path().to_str().unwrap()));
    assert!(!message.contains("Segmentation"));
}

#[tokio::test]
async fn test_download_missing_and_traversal() {
    let env = TestEnv::new();
    let app = app(&env).await;

    let response = app.clone().oneshot(get("/download/nope.png")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await, json!({ "error": "File not found" }));

    std::fs::write(env.dir.path().join("secret.png"), b"x").unwrap();
    let response = app
        .oneshot(get("/view-upload/..%2Fsecret.png"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_view_upload_is_inline_by_default() {
    let env = TestEnv::new();
    let app = app(&env).await;
    let stored = StorageManager::new(&env.config.storage)
        .store(Bucket::Uploads, b"jpeg-bytes", "me.jpg")
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(get(&format!("/view-upload/{stored}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "image/jpeg");
    assert!(response.headers()[CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .starts_with("inline"));
    assert_eq!(body_bytes(response).await, b"jpeg-bytes");

    let response = app
        .oneshot(get(&format!("/view-upload/{stored}?download=true")))
        .await
        .unwrap();
    assert!(response.headers()[CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .starts_with("attachment"));
}

#[tokio::test]
async fn test_admin_routes_require_session() {
    let env = TestEnv::new();
    let app = app(&env).await;

    let response = app.clone().oneshot(get("/admin/files/outputs")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(json_request(
            "/admin/delete",
            &json!({ "filenames": ["a.png"], "category": "outputs" }),
            Some("forged-token"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(json_request(
            "/admin/login",
            &json!({ "password": "wrong" }),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_session_cookie_and_logout() {
    let env = TestEnv::new();
    let app = app(&env).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "/admin/login",
            &json!({ "password": ADMIN_PASSWORD }),
            None,
        ))
        .await
        .unwrap();
    let cookie = response.headers()[SET_COOKIE]
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("photobooth_session="));

    let with_cookie = |uri: &str, method: &str| {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(COOKIE, cookie.clone())
            .body(Body::empty())
            .unwrap()
    };

    let response = app
        .clone()
        .oneshot(with_cookie("/admin/files/uploads", "GET"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["category"], "uploads");
    assert_eq!(body["files"], json!([]));

    let response = app
        .clone()
        .oneshot(with_cookie("/admin/logout", "POST"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(with_cookie("/admin/files/uploads", "GET"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_list_export_and_delete() {
    let env = TestEnv::new();
    let app = app(&env).await;
    let image = png_portrait(50, 100);

    let response = app
        .clone()
        .oneshot(process_request(&[Part::File("person_image", "me.png", &image)]))
        .await
        .unwrap();
    let output_file = body_json(response).await["output_file"]
        .as_str()
        .unwrap()
        .to_string();

    let token = login(&app).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/admin/files/outputs")
                .header(AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listing = body_json(response).await;
    assert_eq!(listing["files"].as_array().unwrap().len(), 1);
    assert_eq!(listing["files"][0]["filename"], output_file.as_str());
    assert_eq!(
        listing["files"][0]["url"],
        format!("http://booth.test/download/{output_file}")
    );

    let response = app
        .clone()
        .oneshot(json_request(
            "/admin/export",
            &json!({ "filenames": [output_file, "ghost_output.png"], "category": "outputs" }),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "application/gzip");
    let archive = body_bytes(response).await;
    let mut tar = tar::Archive::new(GzDecoder::new(archive.as_slice()));
    let names: Vec<String> = tar
        .entries()
        .unwrap()
        .map(|entry| entry.unwrap().path().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec![output_file.clone()]);

    let delete = json!({ "filenames": [output_file], "category": "outputs" });
    let response = app
        .clone()
        .oneshot(json_request("/admin/delete", &delete, Some(&token)))
        .await
        .unwrap();
    assert_eq!(
        body_json(response).await,
        json!({ "deleted_count": 1, "errors": [] })
    );

    // Deleting again is a no-op
    let response = app
        .clone()
        .oneshot(json_request("/admin/delete", &delete, Some(&token)))
        .await
        .unwrap();
    assert_eq!(
        body_json(response).await,
        json!({ "deleted_count": 0, "errors": [] })
    );

    let response = app
        .oneshot(json_request(
            "/admin/delete",
            &json!({ "filenames": [], "category": "thumbnails" }),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_long_upload_name_remains_manageable() {
    let env = TestEnv::new();
    let app = app(&env).await;
    let image = jpeg_portrait(80, 120);
    let long_name = format!("{}.jpg", "a".repeat(120));

    let response = app
        .clone()
        .oneshot(process_request(&[Part::File("person_image", &long_name, &image)]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let token = login(&app).await;
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/admin/files/uploads")
                .header(AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let listing = body_json(response).await;
    let files = listing["files"].as_array().unwrap();
    assert_eq!(files.len(), 1);
    let upload = files[0]["filename"].as_str().unwrap().to_string();
    assert!(upload.ends_with(".jpg"));

    let response = app
        .clone()
        .oneshot(get(&format!("/view-upload/{upload}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, image);

    let response = app
        .oneshot(json_request(
            "/admin/delete",
            &json!({ "filenames": [upload], "category": "uploads" }),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(
        body_json(response).await,
        json!({ "deleted_count": 1, "errors": [] })
    );
}

use std::sync::atomic::{AtomicUsize, Ordering};

use actix_web::{
    body::MessageBody,
    dev::{Service, ServiceResponse},
    http::StatusCode,
    test, web, App, HttpResponse,
};
use gatekit::{
    auth_token::now_secs,
    config::{AuthConfig, ConfigError},
    error_channel, guard,
    middleware::auth::BODY_SCAN_LIMIT,
    respond, AuthUser, Authenticator, HandlerError,
};
use serde_json::{json, Value};

fn authenticator() -> Authenticator {
    Authenticator::new(&AuthConfig::new("mySecret", "authtoken")).expect("valid authenticator")
}

fn demo_token(auth: &Authenticator) -> String {
    auth.create_token(&json!({"user": "demo", "purpose": "testing"}), 100)
        .expect("create token")
}

async fn whoami(
    user: AuthUser,
    hits: web::Data<AtomicUsize>,
) -> Result<HttpResponse, HandlerError> {
    hits.fetch_add(1, Ordering::SeqCst);
    Ok(respond(
        StatusCode::OK,
        "protected route is working",
        json!({ "tokenData": user.payload() }),
    ))
}

async fn echo_body(
    user: AuthUser,
    body: web::Json<Value>,
) -> Result<HttpResponse, HandlerError> {
    Ok(respond(
        StatusCode::OK,
        "ok",
        json!({ "user": user.get("user"), "body": body.into_inner() }),
    ))
}

async fn test_app(
    auth: &Authenticator,
    hits: web::Data<AtomicUsize>,
) -> impl Service<actix_http::Request, Response = ServiceResponse<impl MessageBody>, Error = actix_web::Error>
{
    test::init_service(
        App::new()
            .app_data(hits)
            .service(
                web::resource("/protected")
                    .wrap(auth.middleware())
                    .route(web::get().to(guard(whoami)))
                    .route(web::post().to(guard(echo_body))),
            )
            .service(
                web::resource("/items/{authtoken}")
                    .wrap(auth.middleware())
                    .route(web::get().to(guard(whoami))),
            )
            .service(web::resource("/open").route(web::get().to(guard(whoami))))
            .wrap(error_channel()),
    )
    .await
}

#[actix_web::test]
async fn test_missing_credential_is_rejected() {
    let auth = authenticator();
    let hits = web::Data::new(AtomicUsize::new(0));
    let app = test_app(&auth, hits.clone()).await;

    let req = test::TestRequest::get().uri("/protected").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body,
        json!({"success": false, "message": "Unauthorised", "data": {}})
    );
    assert_eq!(hits.load(Ordering::SeqCst), 0, "next stage must not run");
}

#[actix_web::test]
async fn test_valid_bearer_token_reaches_handler_once() {
    let auth = authenticator();
    let hits = web::Data::new(AtomicUsize::new(0));
    let app = test_app(&auth, hits.clone()).await;

    let req = test::TestRequest::get()
        .uri("/protected")
        .insert_header(("Authorization", format!("Bearer {}", demo_token(&auth))))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(
        body["data"]["tokenData"],
        json!({"user": "demo", "purpose": "testing"})
    );
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[actix_web::test]
async fn test_bearer_takes_precedence_over_custom_header() {
    let auth = authenticator();
    let hits = web::Data::new(AtomicUsize::new(0));
    let app = test_app(&auth, hits.clone()).await;

    let req = test::TestRequest::get()
        .uri("/protected")
        .insert_header(("Authorization", format!("Bearer {}", demo_token(&auth))))
        .insert_header(("authtoken", "garbage"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    // a bad bearer token is not rescued by a good custom header
    let req = test::TestRequest::get()
        .uri("/protected")
        .insert_header(("Authorization", "Bearer garbage"))
        .insert_header(("authtoken", demo_token(&auth)))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::UNAUTHORIZED
    );
}

#[actix_web::test]
async fn test_custom_header_credential() {
    let auth = authenticator();
    let hits = web::Data::new(AtomicUsize::new(0));
    let app = test_app(&auth, hits.clone()).await;

    let req = test::TestRequest::get()
        .uri("/protected")
        .insert_header(("authtoken", demo_token(&auth)))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[actix_web::test]
async fn test_body_credential_leaves_body_readable() {
    let auth = authenticator();
    let hits = web::Data::new(AtomicUsize::new(0));
    let app = test_app(&auth, hits).await;

    let req = test::TestRequest::post()
        .uri("/protected")
        .set_json(json!({"authtoken": demo_token(&auth), "note": "hello"}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["user"], "demo");
    assert_eq!(body["data"]["body"]["note"], "hello");
}

#[actix_web::test]
async fn test_oversized_body_falls_through_to_query_credential() {
    let auth = authenticator();
    let hits = web::Data::new(AtomicUsize::new(0));
    let app = test_app(&auth, hits).await;

    let note = "x".repeat(BODY_SCAN_LIMIT + 50_000);
    let req = test::TestRequest::post()
        .uri(&format!("/protected?authtoken={}", demo_token(&auth)))
        .set_json(json!({"note": note}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["user"], "demo");
    assert_eq!(body["data"]["body"]["note"].as_str().map(str::len), Some(note.len()));
}

#[actix_web::test]
async fn test_oversized_body_without_credential_is_unauthorised() {
    let auth = authenticator();
    let hits = web::Data::new(AtomicUsize::new(0));
    let app = test_app(&auth, hits.clone()).await;

    let req = test::TestRequest::post()
        .uri("/protected")
        .set_json(json!({"note": "x".repeat(BODY_SCAN_LIMIT * 2)}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Unauthorised");
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[actix_web::test]
async fn test_path_credential() {
    let auth = authenticator();
    let hits = web::Data::new(AtomicUsize::new(0));
    let app = test_app(&auth, hits.clone()).await;

    let req = test::TestRequest::get()
        .uri(&format!("/items/{}", demo_token(&auth)))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[actix_web::test]
async fn test_query_credential() {
    let auth = authenticator();
    let hits = web::Data::new(AtomicUsize::new(0));
    let app = test_app(&auth, hits.clone()).await;

    let req = test::TestRequest::get()
        .uri(&format!("/protected?authtoken={}", demo_token(&auth)))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[actix_web::test]
async fn test_expired_token_is_rejected() {
    let auth = authenticator();
    let hits = web::Data::new(AtomicUsize::new(0));
    let app = test_app(&auth, hits.clone()).await;

    let token = auth
        .codec()
        .create_token_at(&json!({"user": "demo"}), 1, now_secs() - 61)
        .unwrap();
    let req = test::TestRequest::get()
        .uri("/protected")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Unauthorised");
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[actix_web::test]
async fn test_token_from_other_secret_is_rejected() {
    let auth = authenticator();
    let other = Authenticator::new(&AuthConfig::new("otherSecret", "authtoken")).unwrap();
    let hits = web::Data::new(AtomicUsize::new(0));
    let app = test_app(&auth, hits.clone()).await;

    let req = test::TestRequest::get()
        .uri("/protected")
        .insert_header(("Authorization", format!("Bearer {}", demo_token(&other))))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Unauthorised");
}

#[actix_web::test]
async fn test_identity_is_request_scoped() {
    let auth = authenticator();
    let hits = web::Data::new(AtomicUsize::new(0));
    let app = test_app(&auth, hits.clone()).await;

    let req = test::TestRequest::get()
        .uri("/protected")
        .insert_header(("Authorization", format!("Bearer {}", demo_token(&auth))))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    // an unprotected route never sees an identity from an earlier request
    let req = test::TestRequest::get().uri("/open").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[actix_web::test]
async fn test_instances_keep_their_own_field_names() {
    let staff = Authenticator::new(&AuthConfig::new("staffSecret", "x-staff-token")).unwrap();
    let users = authenticator();
    let hits = web::Data::new(AtomicUsize::new(0));

    let app = test::init_service(
        App::new()
            .app_data(hits.clone())
            .service(
                web::resource("/staff")
                    .wrap(staff.middleware())
                    .route(web::get().to(guard(whoami))),
            )
            .service(
                web::resource("/users")
                    .wrap(users.middleware())
                    .route(web::get().to(guard(whoami))),
            )
            .wrap(error_channel()),
    )
    .await;

    let staff_token = staff.create_token(&json!({"user": "boss"}), 5).unwrap();

    let req = test::TestRequest::get()
        .uri("/staff")
        .insert_header(("x-staff-token", staff_token.clone()))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::get()
        .uri("/users")
        .insert_header(("authtoken", staff_token))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::UNAUTHORIZED
    );
}

#[::core::prelude::v1::test]
fn test_authenticator_rejects_blank_settings() {
    assert!(matches!(
        Authenticator::new(&AuthConfig::new("mySecret", "")),
        Err(ConfigError::Invalid(_))
    ));
    assert!(matches!(
        Authenticator::new(&AuthConfig::new("", "authtoken")),
        Err(ConfigError::Invalid(_))
    ));
}

#[::core::prelude::v1::test]
fn test_typed_claims() {
    #[derive(serde::Deserialize)]
    struct DemoClaims {
        user: String,
    }

    let user = AuthUser::new(
        json!({"user": "demo"})
            .as_object()
            .cloned()
            .expect("object payload"),
    );
    let claims: DemoClaims = user.claims().unwrap();
    assert_eq!(claims.user, "demo");

    let err = user.claims::<Vec<u8>>().unwrap_err();
    assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
}

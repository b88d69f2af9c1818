use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use migration::MigratorTrait;
use reqwest::StatusCode as HttpStatusCode;
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use server::routes::{self, auth};
use service::auth_service::{issue_token, AuthSettings};
use service::mailer::LogMailer;

const TEST_SECRET: &str = "test-secret";

fn cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

fn settings() -> AuthSettings {
    AuthSettings { jwt_secret: TEST_SECRET.into(), token_ttl_hours: 12 }
}

struct TestApp {
    base_url: String,
    db: sea_orm::DatabaseConnection,
}

async fn start_server() -> anyhow::Result<TestApp> {
    // Prefer env over a developer's config file
    std::env::set_var("CONFIG_PATH", "/nonexistent-config-for-tests.toml");

    // Without DATABASE_URL every route needs, skip gracefully
    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("DATABASE_URL missing; skip e2e tests");
        return Err(anyhow::anyhow!("missing DATABASE_URL"));
    }

    let db = models::db::connect().await?;
    migration::Migrator::up(&db, None).await?;

    let state = auth::ServerState {
        db: db.clone(),
        auth: settings(),
        mailer: Arc::new(LogMailer),
    };

    let app: Router = routes::build_router(state, cors());
    let listener = TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0)).await?;
    let addr: SocketAddr = listener.local_addr()?;
    let base_url = format!("http://{}:{}", addr.ip(), addr.port());

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            eprintln!("server error: {}", e);
        }
    });

    Ok(TestApp { base_url, db })
}

fn client() -> reqwest::Client {
    reqwest::Client::builder().cookie_store(true).build().expect("reqwest client")
}

/// Register a fresh user through the API and return their bearer token.
async fn register_user(c: &reqwest::Client, base: &str) -> anyhow::Result<String> {
    let email = format!("e2e_{}@example.com", Uuid::new_v4());
    let res = c
        .post(format!("{}/auth/register", base))
        .json(&json!({"name": "E2E Tester", "email": email, "password": "S3curePass!"}))
        .send()
        .await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["success"], true);
    Ok(body["data"]["token"].as_str().expect("token in body").to_string())
}

/// Admins are provisioned out of band, so the test writes the row directly
/// and signs its own token.
async fn admin_token(db: &sea_orm::DatabaseConnection) -> anyhow::Result<String> {
    let email = format!("e2e_admin_{}@example.com", Uuid::new_v4());
    let admin = models::user::create(db, &email, "E2E Admin", models::user::ROLE_ADMIN).await?;
    Ok(issue_token(&settings(), &admin)?)
}

fn company_payload(name: &str) -> serde_json::Value {
    json!({
        "name": name,
        "business": "Dental clinic",
        "address": "88 Sukhumvit Rd",
        "province": "Bangkok",
        "postalcode": "10110",
        "tel": "02-111-2222",
        "picture": "https://example.com/clinic.jpg",
    })
}

#[tokio::test]
async fn e2e_public_health() -> anyhow::Result<()> {
    if std::env::var("SKIP_DB_TESTS").is_ok() {
        return Ok(());
    }
    let app = match start_server().await {
        Ok(a) => a,
        Err(_) => return Ok(()),
    };
    let res = client().get(format!("{}/health", app.base_url)).send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["status"], "ok");
    Ok(())
}

#[tokio::test]
async fn e2e_register_login_me_logout() -> anyhow::Result<()> {
    if std::env::var("SKIP_DB_TESTS").is_ok() {
        return Ok(());
    }
    let app = match start_server().await {
        Ok(a) => a,
        Err(_) => return Ok(()),
    };
    let c = client();

    let email = format!("e2e_{}@example.com", Uuid::new_v4());
    let res = c
        .post(format!("{}/auth/register", app.base_url))
        .json(&json!({"name": "Session Tester", "email": email, "password": "S3curePass!"}))
        .send()
        .await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    assert!(res.headers().get("set-cookie").is_some());

    // Login re-issues the cookie and echoes the token in the body
    let res = c
        .post(format!("{}/auth/login", app.base_url))
        .json(&json!({"email": email, "password": "S3curePass!"}))
        .send()
        .await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["success"], true);
    assert!(body["data"]["token"].as_str().is_some());

    // Cookie session reaches /auth/me
    let res = c.get(format!("{}/auth/me", app.base_url)).send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["data"]["email"], email);
    assert_eq!(body["data"]["role"], "user");

    // Logout clears the cookie; the next /auth/me has no credentials
    let res = c.post(format!("{}/auth/logout", app.base_url)).send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    let res = c.get(format!("{}/auth/me", app.base_url)).send().await?;
    assert_eq!(res.status(), HttpStatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn e2e_protected_routes_require_token() -> anyhow::Result<()> {
    if std::env::var("SKIP_DB_TESTS").is_ok() {
        return Ok(());
    }
    let app = match start_server().await {
        Ok(a) => a,
        Err(_) => return Ok(()),
    };
    let c = reqwest::Client::new();

    let res = c.get(format!("{}/bookings", app.base_url)).send().await?;
    assert_eq!(res.status(), HttpStatusCode::UNAUTHORIZED);

    let res = c
        .get(format!("{}/bookings", app.base_url))
        .header("Authorization", "Bearer not-a-real-token")
        .send()
        .await?;
    assert_eq!(res.status(), HttpStatusCode::UNAUTHORIZED);

    // An expired token is rejected the same way
    let stale_user = models::user::create(
        &app.db,
        &format!("e2e_exp_{}@example.com", Uuid::new_v4()),
        "Expired",
        models::user::ROLE_USER,
    )
    .await?;
    let expired = issue_token(
        &AuthSettings { jwt_secret: TEST_SECRET.into(), token_ttl_hours: -2 },
        &stale_user,
    )?;
    let res = c
        .get(format!("{}/bookings", app.base_url))
        .header("Authorization", format!("Bearer {}", expired))
        .send()
        .await?;
    assert_eq!(res.status(), HttpStatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn e2e_company_reads_public_writes_admin_only() -> anyhow::Result<()> {
    if std::env::var("SKIP_DB_TESTS").is_ok() {
        return Ok(());
    }
    let app = match start_server().await {
        Ok(a) => a,
        Err(_) => return Ok(()),
    };
    let c = reqwest::Client::new();

    // Listing is public
    let res = c.get(format!("{}/companies", app.base_url)).send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);

    // A plain user cannot create a company
    let user_token = register_user(&client(), &app.base_url).await?;
    let name = format!("e2e_co_{}", &Uuid::new_v4().to_string()[..8]);
    let res = c
        .post(format!("{}/companies", app.base_url))
        .bearer_auth(&user_token)
        .json(&company_payload(&name))
        .send()
        .await?;
    assert_eq!(res.status(), HttpStatusCode::UNAUTHORIZED);

    // Admin can
    let admin = admin_token(&app.db).await?;
    let res = c
        .post(format!("{}/companies", app.base_url))
        .bearer_auth(&admin)
        .json(&company_payload(&name))
        .send()
        .await?;
    assert_eq!(res.status(), HttpStatusCode::CREATED);
    let body = res.json::<serde_json::Value>().await?;
    let company_id = body["data"]["id"].as_str().expect("company id").to_string();

    // Public read of the created company
    let res = c.get(format!("{}/companies/{}", app.base_url, company_id)).send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["data"]["name"], name.as_str());

    // Filtered listing finds it; an envelope with count and pagination
    let res = c
        .get(format!("{}/companies?name={}&limit=1", app.base_url, name))
        .send()
        .await?;
    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["count"], 1);
    assert!(body["pagination"]["next"].is_null());

    // Update then delete, both admin-gated
    let res = c
        .put(format!("{}/companies/{}", app.base_url, company_id))
        .bearer_auth(&admin)
        .json(&json!({"province": "Phuket"}))
        .send()
        .await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["data"]["province"], "Phuket");

    let res = c
        .delete(format!("{}/companies/{}", app.base_url, company_id))
        .bearer_auth(&admin)
        .send()
        .await?;
    assert_eq!(res.status(), HttpStatusCode::OK);

    let res = c.get(format!("{}/companies/{}", app.base_url, company_id)).send().await?;
    assert_eq!(res.status(), HttpStatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn e2e_booking_cap_ownership_and_cascade() -> anyhow::Result<()> {
    if std::env::var("SKIP_DB_TESTS").is_ok() {
        return Ok(());
    }
    let app = match start_server().await {
        Ok(a) => a,
        Err(_) => return Ok(()),
    };
    let c = reqwest::Client::new();

    let admin = admin_token(&app.db).await?;
    let owner = register_user(&client(), &app.base_url).await?;
    let stranger = register_user(&client(), &app.base_url).await?;

    let name = format!("e2e_bk_co_{}", &Uuid::new_v4().to_string()[..8]);
    let res = c
        .post(format!("{}/companies", app.base_url))
        .bearer_auth(&admin)
        .json(&company_payload(&name))
        .send()
        .await?;
    assert_eq!(res.status(), HttpStatusCode::CREATED);
    let body = res.json::<serde_json::Value>().await?;
    let company_id = body["data"]["id"].as_str().expect("company id").to_string();

    // Three bookings allowed, the fourth is over the cap
    let nested = format!("{}/companies/{}/bookings", app.base_url, company_id);
    let mut booking_id = String::new();
    for _ in 0..3 {
        let res = c
            .post(&nested)
            .bearer_auth(&owner)
            .json(&json!({"booking_date": "2026-09-15T10:00:00+07:00"}))
            .send()
            .await?;
        assert_eq!(res.status(), HttpStatusCode::OK);
        let body = res.json::<serde_json::Value>().await?;
        booking_id = body["data"]["id"].as_str().expect("booking id").to_string();
    }
    let res = c
        .post(&nested)
        .bearer_auth(&owner)
        .json(&json!({"booking_date": "2026-09-16T10:00:00+07:00"}))
        .send()
        .await?;
    assert_eq!(res.status(), HttpStatusCode::BAD_REQUEST);

    // Owner sees the populated company on a single booking
    let res = c
        .get(format!("{}/bookings/{}", app.base_url, booking_id))
        .bearer_auth(&owner)
        .send()
        .await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["data"]["company"]["name"], name.as_str());

    // A stranger is denied; a missing booking is 404 even for the stranger
    let res = c
        .get(format!("{}/bookings/{}", app.base_url, booking_id))
        .bearer_auth(&stranger)
        .send()
        .await?;
    assert_eq!(res.status(), HttpStatusCode::UNAUTHORIZED);
    let res = c
        .get(format!("{}/bookings/{}", app.base_url, Uuid::new_v4()))
        .bearer_auth(&stranger)
        .send()
        .await?;
    assert_eq!(res.status(), HttpStatusCode::NOT_FOUND);

    // Listing is scoped: the stranger sees none of the owner's bookings
    let res = c
        .get(format!("{}/bookings?companyId={}", app.base_url, company_id))
        .bearer_auth(&stranger)
        .send()
        .await?;
    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["count"], 0);

    // The admin sees all three through the nested route
    let res = c.get(&nested).bearer_auth(&admin).send().await?;
    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["count"], 3);

    // Owner can reschedule and cancel their own booking
    let res = c
        .put(format!("{}/bookings/{}", app.base_url, booking_id))
        .bearer_auth(&owner)
        .json(&json!({"booking_date": "2026-09-20T09:30:00+07:00"}))
        .send()
        .await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    let res = c
        .delete(format!("{}/bookings/{}", app.base_url, booking_id))
        .bearer_auth(&owner)
        .send()
        .await?;
    assert_eq!(res.status(), HttpStatusCode::OK);

    // Deleting the company takes its remaining bookings with it
    let res = c
        .delete(format!("{}/companies/{}", app.base_url, company_id))
        .bearer_auth(&admin)
        .send()
        .await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    let res = c
        .get(format!("{}/bookings?companyId={}", app.base_url, company_id))
        .bearer_auth(&admin)
        .send()
        .await?;
    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["count"], 0);
    Ok(())
}

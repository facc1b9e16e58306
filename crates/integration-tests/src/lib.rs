//! Integration tests for the Atelier API.
//!
//! # Running Tests
//!
//! ```bash
//! # Migrate and start the server
//! cargo run -p atelier-cli -- migrate
//! cargo run -p atelier-api
//!
//! # Create the staff account the tests log in with
//! cargo run -p atelier-cli -- user create -e "$ATELIER_TEST_ADMIN_EMAIL" \
//!     -p "$ATELIER_TEST_ADMIN_PASSWORD" -r super_admin
//!
//! # Run the ignored tests
//! cargo test -p atelier-integration-tests -- --ignored
//! ```
//!
//! # Environment Variables
//!
//! - `ATELIER_TEST_URL` - API base URL (default `http://localhost:4000`)
//! - `ATELIER_TEST_ADMIN_EMAIL` / `ATELIER_TEST_ADMIN_PASSWORD` - staff login

use reqwest::{
    Client, Response, StatusCode,
    header::{HeaderMap, HeaderValue},
};
use serde_json::{Value, json};
use uuid::Uuid;

/// Password used for every account the tests register.
pub const TEST_PASSWORD: &str = "correct-horse-battery";

/// HTTP client bound to one test.
///
/// Each context presents its own `X-Forwarded-For` address so tests running
/// in parallel don't share a rate-limit bucket.
pub struct TestContext {
    pub client: Client,
    pub base_url: String,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built.
    #[must_use]
    pub fn new() -> Self {
        let [a, b, c, ..] = Uuid::new_v4().into_bytes();
        let ip = format!("10.{a}.{b}.{}", c.max(1));

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_str(&ip).expect("valid header"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: std::env::var("ATELIER_TEST_URL")
                .unwrap_or_else(|_| "http://localhost:4000".to_string()),
        }
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Register a fresh customer and return `(token, email)`.
    ///
    /// # Panics
    ///
    /// Panics if registration fails.
    pub async fn register_customer(&self) -> (String, String) {
        let email = unique_email("customer");
        let resp = self
            .client
            .post(self.url("/api/users/register"))
            .json(&json!({
                "email": email,
                "password": TEST_PASSWORD,
                "firstName": "Test",
                "lastName": "Customer",
                "phone": "9876543210"
            }))
            .send()
            .await
            .expect("Failed to register");
        assert_eq!(resp.status(), StatusCode::CREATED);

        let data = data(resp).await;
        (token_of(&data), email)
    }

    /// Log in with the staff account from the environment.
    ///
    /// # Panics
    ///
    /// Panics if the variables are unset or the login fails.
    pub async fn admin_token(&self) -> String {
        let email = std::env::var("ATELIER_TEST_ADMIN_EMAIL")
            .expect("ATELIER_TEST_ADMIN_EMAIL must be set");
        let password = std::env::var("ATELIER_TEST_ADMIN_PASSWORD")
            .expect("ATELIER_TEST_ADMIN_PASSWORD must be set");
        self.login(&email, &password).await
    }

    /// # Panics
    ///
    /// Panics if the login fails.
    pub async fn login(&self, email: &str, password: &str) -> String {
        let resp = self
            .client
            .post(self.url("/api/users/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("Failed to log in");
        assert_eq!(resp.status(), StatusCode::OK, "login as {email}");
        token_of(&data(resp).await)
    }

    /// Create an active product with the given stock slots.
    ///
    /// # Panics
    ///
    /// Panics if the request fails.
    pub async fn create_product(&self, admin: &str, inventory: Value) -> Value {
        let name = format!("Test Kurta {}", Uuid::new_v4().simple());
        let resp = self
            .client
            .post(self.url("/api/products"))
            .bearer_auth(admin)
            .json(&json!({
                "name": name,
                "description": "Handloom cotton",
                "price": "1250.00",
                "category": "Kurtas",
                "subcategory": "Cotton",
                "images": [{"url": "/uploads/kurta.jpg", "alt": "front"}],
                "inventory": inventory,
            }))
            .send()
            .await
            .expect("Failed to create product");
        assert_eq!(resp.status(), StatusCode::CREATED);
        data(resp).await
    }
}

/// A unique address on the reserved `example.com` domain.
#[must_use]
pub fn unique_email(prefix: &str) -> String {
    format!("{prefix}-{}@example.com", Uuid::new_v4().simple())
}

/// A complete shipping address body.
#[must_use]
pub fn shipping_address() -> Value {
    json!({
        "fullName": "Test Customer",
        "phone": "9876543210",
        "line1": "12 MG Road",
        "city": "Bengaluru",
        "state": "Karnataka",
        "postalCode": "560001",
        "country": "India"
    })
}

/// Unwrap a success envelope and return its `data`.
///
/// # Panics
///
/// Panics if the body isn't JSON or `success` isn't `true`.
pub async fn data(resp: Response) -> Value {
    let body: Value = resp.json().await.expect("Failed to parse JSON body");
    assert_eq!(body["success"], true, "unexpected envelope: {body}");
    body["data"].clone()
}

/// Read an error envelope and return its `message`.
///
/// # Panics
///
/// Panics if the body isn't an error envelope.
pub async fn error_message(resp: Response) -> String {
    let body: Value = resp.json().await.expect("Failed to parse JSON body");
    assert_eq!(body["success"], false, "unexpected envelope: {body}");
    body["message"].as_str().unwrap_or_default().to_string()
}

fn token_of(data: &Value) -> String {
    data["token"]
        .as_str()
        .expect("response carries a token")
        .to_string()
}

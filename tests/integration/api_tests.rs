//! API integration tests
//!
//! These run against a live server started with a bootstrap administrator:
//! `ODONTO__AUTH__BOOTSTRAP_ADMIN_EMAIL` / `ODONTO__AUTH__BOOTSTRAP_ADMIN_PASSWORD`
//! must match `ADMIN_EMAIL` / `ADMIN_PASSWORD` below (or the env overrides).

use chrono::{Datelike, Duration, Local, NaiveDate, Weekday};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:8080/api/v1";
const ADMIN_EMAIL: &str = "admin@odonto.local";
const ADMIN_PASSWORD: &str = "change-me-please";

fn admin_credentials() -> (String, String) {
    (
        std::env::var("ODONTO_TEST_ADMIN_EMAIL").unwrap_or_else(|_| ADMIN_EMAIL.to_string()),
        std::env::var("ODONTO_TEST_ADMIN_PASSWORD").unwrap_or_else(|_| ADMIN_PASSWORD.to_string()),
    )
}

/// Suffix keeping emails and item names unique across runs
fn unique() -> String {
    Local::now().format("%Y%m%d%H%M%S%f").to_string()
}

/// First Monday at least a week ahead
fn next_monday() -> NaiveDate {
    let mut day = Local::now().date_naive() + Duration::days(7);
    while day.weekday() != Weekday::Mon {
        day = day.succ_opt().unwrap();
    }
    day
}

async fn login(client: &Client, email: &str, password: &str) -> String {
    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Failed to send login request");
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.expect("Failed to parse login response");
    body["token"].as_str().expect("No token in response").to_string()
}

async fn admin_token(client: &Client) -> String {
    let (email, password) = admin_credentials();
    login(client, &email, &password).await
}

/// Create a general dentist and return its id
async fn create_doctor(client: &Client, token: &str) -> i64 {
    let response = client
        .post(format!("{}/users/staff", BASE_URL))
        .bearer_auth(token)
        .json(&json!({
            "email": format!("doctor{}@odonto.test", unique()),
            "password": "doctor-pass-1",
            "first_name": "Laura",
            "last_name": "Mendez",
            "role": "DOCTOR",
            "specialty": "GENERAL"
        }))
        .send()
        .await
        .expect("Failed to create doctor");
    assert_eq!(response.status(), StatusCode::CREATED);

    let body: Value = response.json().await.unwrap();
    body["id"].as_i64().unwrap()
}

/// Register a patient and return (id, token)
async fn register_patient(client: &Client) -> (i64, String) {
    let email = format!("patient{}@odonto.test", unique());
    let response = client
        .post(format!("{}/auth/register", BASE_URL))
        .json(&json!({
            "email": email,
            "password": "patient-pass-1",
            "first_name": "Ana",
            "last_name": "Lopez",
            "phone": "+34 600 123 456"
        }))
        .send()
        .await
        .expect("Failed to register patient");
    assert_eq!(response.status(), StatusCode::CREATED);

    let body: Value = response.json().await.unwrap();
    let token = login(client, &email, "patient-pass-1").await;
    (body["id"].as_i64().unwrap(), token)
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_login_rejects_bad_password() {
    let client = Client::new();
    let (email, _) = admin_credentials();

    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({ "email": email, "password": "definitely-wrong" }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore]
async fn test_unauthorized_access() {
    let client = Client::new();

    let response = client
        .get(format!("{}/inventory", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore]
async fn test_patient_cannot_list_users() {
    let client = Client::new();
    let (_, token) = register_patient(&client).await;

    let response = client
        .get(format!("{}/users", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore]
async fn test_booking_flow() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let doctor_id = create_doctor(&client, &admin).await;
    let (patient_id, patient) = register_patient(&client).await;

    // Monday 08:00-12:00 every 30 minutes
    let response = client
        .post(format!("{}/availability", BASE_URL))
        .bearer_auth(&admin)
        .json(&json!({
            "doctor_id": doctor_id,
            "day_of_week": 0,
            "start_time": "08:00:00",
            "end_time": "12:00:00",
            "slot_interval_minutes": 30
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let monday = next_monday();
    let response = client
        .get(format!(
            "{}/availability/doctor/{}?from={}&to={}",
            BASE_URL, doctor_id, monday, monday
        ))
        .bearer_auth(&patient)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let days: Value = response.json().await.unwrap();
    assert_eq!(days[0]["slots"].as_array().unwrap().len(), 8);

    let booking = json!({
        "doctor_id": doctor_id,
        "date": monday.to_string(),
        "time": "09:00:00",
        "appointment_type_id": 1
    });
    let response = client
        .post(format!("{}/appointments", BASE_URL))
        .bearer_auth(&patient)
        .json(&booking)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let appointment: Value = response.json().await.unwrap();
    assert_eq!(appointment["status"], "PENDING");
    assert_eq!(appointment["patient_id"].as_i64().unwrap(), patient_id);

    // Same doctor and slot again
    let (_, other_patient) = register_patient(&client).await;
    let response = client
        .post(format!("{}/appointments", BASE_URL))
        .bearer_auth(&other_patient)
        .json(&booking)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let error: Value = response.json().await.unwrap();
    assert_eq!(error["error"], "SlotUnavailable");

    // The booked slot is no longer offered
    let days: Value = client
        .get(format!(
            "{}/availability/doctor/{}?from={}&to={}",
            BASE_URL, doctor_id, monday, monday
        ))
        .bearer_auth(&patient)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(days[0]["slots"].as_array().unwrap().len(), 7);

    let response = client
        .post(format!("{}/appointments/{}/cancel", BASE_URL, appointment["id"]))
        .bearer_auth(&patient)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cancelled: Value = response.json().await.unwrap();
    assert_eq!(cancelled["status"], "CANCELLED");
}

#[tokio::test]
#[ignore]
async fn test_weekend_booking_rejected() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let doctor_id = create_doctor(&client, &admin).await;
    let (_, patient) = register_patient(&client).await;

    let saturday = next_monday() + Duration::days(5);
    let response = client
        .post(format!("{}/appointments", BASE_URL))
        .bearer_auth(&patient)
        .json(&json!({
            "doctor_id": doctor_id,
            "date": saturday.to_string(),
            "time": "10:00:00",
            "appointment_type_id": 1
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore]
async fn test_self_booking_rejected_before_lookups() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let doctor_id = create_doctor(&client, &admin).await;

    let response = client
        .post(format!("{}/appointments", BASE_URL))
        .bearer_auth(&admin)
        .json(&json!({
            "patient_id": doctor_id,
            "doctor_id": doctor_id,
            "date": next_monday().to_string(),
            "time": "09:00:00",
            "appointment_type_id": 1
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// Register an inventory item and return its JSON
async fn register_item(client: &Client, token: &str, body: Value) -> Value {
    let response = client
        .post(format!("{}/inventory", BASE_URL))
        .bearer_auth(token)
        .json(&body)
        .send()
        .await
        .expect("Failed to register item");
    assert_eq!(response.status(), StatusCode::CREATED);
    response.json().await.unwrap()
}

async fn get_items(client: &Client, token: &str, path: &str) -> Vec<Value> {
    let response = client
        .get(format!("{}{}", BASE_URL, path))
        .bearer_auth(token)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    body.as_array().expect("Expected a list").clone()
}

/// Names of the listed items carrying `tag`, in response order
fn tagged_names(items: &[Value], tag: &str) -> Vec<String> {
    items
        .iter()
        .filter_map(|item| item["name"].as_str())
        .filter(|name| name.contains(tag))
        .map(str::to_string)
        .collect()
}

#[tokio::test]
#[ignore]
async fn test_sterilization_list_orders_by_remaining_cycles() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let tag = unique();

    let instrument = |name: &str, lifespan: i64| {
        json!({
            "name": format!("{} {}", name, tag),
            "item_type": "INSTRUMENT",
            "quantity_available": 4,
            "minimum_quantity": 1,
            "unit_price": "12.50",
            "sterilizable": true,
            "sterilization_lifespan": lifespan
        })
    };
    let forceps = register_item(&client, &admin, instrument("Forceps", 3)).await;
    register_item(&client, &admin, instrument("Mirror", 1)).await;
    let scaler = register_item(&client, &admin, instrument("Scaler", 2)).await;
    register_item(&client, &admin, instrument("Elevator", 50)).await;

    let response = client
        .post(format!("{}/inventory/{}/damaged", BASE_URL, scaler["id"]))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = client
        .post(format!("{}/inventory/{}/sterilize", BASE_URL, forceps["id"]))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let sterilized: Value = response.json().await.unwrap();
    assert_eq!(sterilized["remaining_sterilizations"], 2);

    let items = get_items(&client, &admin, "/inventory/sterilization").await;
    assert_eq!(
        tagged_names(&items, &tag),
        vec![format!("Mirror {}", tag), format!("Forceps {}", tag)]
    );
}

#[tokio::test]
#[ignore]
async fn test_expiring_and_below_minimum_queries() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let tag = unique();
    let today = Local::now().date_naive();

    let medication = |name: &str, quantity: i64, expires_in: i64| {
        json!({
            "name": format!("{} {}", name, tag),
            "item_type": "MEDICATION",
            "quantity_available": quantity,
            "minimum_quantity": 10,
            "unit_price": "3.10",
            "expiry_date": (today + Duration::days(expires_in)).to_string()
        })
    };
    register_item(&client, &admin, medication("Lidocaine", 50, 10)).await;
    register_item(&client, &admin, medication("Articaine", 5, 60)).await;

    let items = get_items(&client, &admin, "/inventory/expiring?days=30").await;
    assert_eq!(tagged_names(&items, &tag), vec![format!("Lidocaine {}", tag)]);

    let items = get_items(&client, &admin, "/inventory/expiring?days=90").await;
    assert_eq!(tagged_names(&items, &tag).len(), 2);

    let items = get_items(&client, &admin, "/inventory/below-minimum").await;
    assert_eq!(tagged_names(&items, &tag), vec![format!("Articaine {}", tag)]);

    let response = client
        .get(format!("{}/inventory/expiring?days=-1", BASE_URL))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore]
async fn test_search_is_case_insensitive_and_filters_status() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let tag = unique();

    let gloves = |name: &str, quantity: i64| {
        json!({
            "name": format!("{} {}", name, tag),
            "item_type": "PROTECTIVE_GEAR",
            "quantity_available": quantity,
            "minimum_quantity": 20,
            "unit_price": "0.25"
        })
    };
    register_item(&client, &admin, gloves("Nitrile GLOVES", 100)).await;
    register_item(&client, &admin, gloves("Latex gloves", 10)).await;

    let items = get_items(&client, &admin, "/inventory/search?name=glov&item_type=PROTECTIVE_GEAR").await;
    assert_eq!(tagged_names(&items, &tag).len(), 2);

    let items = get_items(&client, &admin, "/inventory/search?name=GLOV&status=LOW_STOCK").await;
    assert_eq!(tagged_names(&items, &tag), vec![format!("Latex gloves {}", tag)]);
}

#[tokio::test]
#[ignore]
async fn test_inventory_consumption() {
    let client = Client::new();
    let admin = admin_token(&client).await;

    let response = client
        .post(format!("{}/inventory", BASE_URL))
        .bearer_auth(&admin)
        .json(&json!({
            "name": format!("Gloves {}", unique()),
            "item_type": "CONSUMABLE",
            "quantity_available": 100,
            "minimum_quantity": 20,
            "unit_price": "0.25"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let item: Value = response.json().await.unwrap();
    let id = item["id"].as_i64().unwrap();

    let consume = |quantity: i64| {
        client
            .put(format!("{}/inventory/{}/consume", BASE_URL, id))
            .bearer_auth(&admin)
            .json(&json!({ "used_quantity": quantity }))
            .send()
    };

    let item: Value = consume(30).await.unwrap().json().await.unwrap();
    assert_eq!(item["quantity_available"], 70);
    assert_eq!(item["status"], "AVAILABLE");

    let item: Value = consume(55).await.unwrap().json().await.unwrap();
    assert_eq!(item["quantity_available"], 15);
    assert_eq!(item["status"], "LOW_STOCK");

    let response = consume(16).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = client
        .delete(format!("{}/inventory/{}", BASE_URL, id))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let item: Value = client
        .get(format!("{}/inventory/{}", BASE_URL, id))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(item["status"], "DELETED");
}

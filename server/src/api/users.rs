// server/src/api/users.rs

use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::reply::{Json, WithStatus};
use warp::Filter;

use models::users::{NewUser, UserUpdate};

use super::{error_reply, json_reply, respond, with_services, ApiReply, Services};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Account routes: registration, login, profile reads and updates, and
/// the doctor/patient listings.
pub fn routes(svc: Services) -> BoxedFilter<(WithStatus<Json>,)> {
    let register = warp::path!("users")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_services(svc.clone()))
        .and_then(|payload: NewUser, svc: Services| async move {
            Ok(respond(svc.directory.register(payload).await, StatusCode::CREATED)) as ApiReply
        });

    let login = warp::path!("login")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_services(svc.clone()))
        .and_then(|req: LoginRequest, svc: Services| async move {
            let result = svc.directory.verify_credentials(&req.email, &req.password).await;
            Ok(respond(result, StatusCode::OK)) as ApiReply
        });

    let list = warp::path!("users")
        .and(warp::get())
        .and(with_services(svc.clone()))
        .and_then(|svc: Services| async move {
            Ok(respond(svc.directory.list_users().await, StatusCode::OK)) as ApiReply
        });

    let get = warp::path!("users" / Uuid)
        .and(warp::get())
        .and(with_services(svc.clone()))
        .and_then(|id: Uuid, svc: Services| async move {
            Ok(respond(svc.directory.get_user(id).await, StatusCode::OK)) as ApiReply
        });

    let update = warp::path!("users" / Uuid)
        .and(warp::put())
        .and(warp::body::json())
        .and(with_services(svc.clone()))
        .and_then(|id: Uuid, update: UserUpdate, svc: Services| async move {
            Ok(respond(svc.directory.update_user(id, update).await, StatusCode::OK)) as ApiReply
        });

    let delete = warp::path!("users" / Uuid)
        .and(warp::delete())
        .and(with_services(svc.clone()))
        .and_then(|id: Uuid, svc: Services| async move {
            let reply = match svc.directory.delete_user(id).await {
                Ok(()) => json_reply(&json!({ "deleted": id }), StatusCode::OK),
                Err(e) => error_reply(e),
            };
            Ok(reply) as ApiReply
        });

    let doctors = warp::path!("doctors")
        .and(warp::get())
        .and(with_services(svc.clone()))
        .and_then(|svc: Services| async move {
            Ok(respond(svc.directory.list_doctors().await, StatusCode::OK)) as ApiReply
        });

    let patients = warp::path!("patients")
        .and(warp::get())
        .and(with_services(svc))
        .and_then(|svc: Services| async move {
            Ok(respond(svc.directory.list_patients().await, StatusCode::OK)) as ApiReply
        });

    register
        .or(login)
        .unify()
        .or(list)
        .unify()
        .or(get)
        .unify()
        .or(update)
        .unify()
        .or(delete)
        .unify()
        .or(doctors)
        .unify()
        .or(patients)
        .unify()
        .boxed()
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use crate::api::{routes, test_support};

    use super::*;

    fn patient_body(email: &str) -> Value {
        json!({
            "name": "Ana Ruiz",
            "email": email,
            "password": "hunter22",
            "role": "patient",
            "age": 34
        })
    }

    fn doctor_body(email: &str) -> Value {
        json!({
            "name": "Dr. Lee",
            "email": email,
            "password": "stethoscope",
            "role": "doctor",
            "specialization": "Cardiology"
        })
    }

    async fn register(api: &BoxedFilter<(WithStatus<Json>,)>, body: &Value) -> Value {
        let res = warp::test::request()
            .method("POST")
            .path("/api/v1/users")
            .json(body)
            .reply(api)
            .await;
        assert_eq!(res.status(), StatusCode::CREATED);
        serde_json::from_slice(res.body()).unwrap()
    }

    #[tokio::test]
    async fn test_register_returns_profile_without_credentials() {
        let api = routes(test_support::services());
        let profile = register(&api, &patient_body("ana@example.com")).await;
        assert_eq!(profile["email"], "ana@example.com");
        assert_eq!(profile["role"], "patient");
        assert!(profile.get("password").is_none());
        assert!(profile.get("password_hash").is_none());
    }

    #[tokio::test]
    async fn test_register_duplicate_email_conflicts() {
        let api = routes(test_support::services());
        register(&api, &patient_body("ana@example.com")).await;
        let res = warp::test::request()
            .method("POST")
            .path("/api/v1/users")
            .json(&patient_body("Ana@Example.COM"))
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_register_rejects_invalid_payload() {
        let api = routes(test_support::services());
        let res = warp::test::request()
            .method("POST")
            .path("/api/v1/users")
            .json(&json!({
                "name": "No Address",
                "email": "not-an-email",
                "password": "pw",
                "role": "patient"
            }))
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_slice(res.body()).unwrap();
        assert!(body["error"].as_str().unwrap().contains("email"));
    }

    #[tokio::test]
    async fn test_login_round_trip() {
        let api = routes(test_support::services());
        register(&api, &patient_body("ana@example.com")).await;

        let ok = warp::test::request()
            .method("POST")
            .path("/api/v1/login")
            .json(&json!({ "email": "ana@example.com", "password": "hunter22" }))
            .reply(&api)
            .await;
        assert_eq!(ok.status(), StatusCode::OK);

        let bad = warp::test::request()
            .method("POST")
            .path("/api/v1/login")
            .json(&json!({ "email": "ana@example.com", "password": "wrong" }))
            .reply(&api)
            .await;
        assert_eq!(bad.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_get_unknown_user_is_404() {
        let api = routes(test_support::services());
        let res = warp::test::request()
            .method("GET")
            .path(&format!("/api/v1/users/{}", Uuid::new_v4()))
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_update_and_delete_user() {
        let api = routes(test_support::services());
        let profile = register(&api, &patient_body("ana@example.com")).await;
        let id = profile["id"].as_str().unwrap().to_string();

        let updated = warp::test::request()
            .method("PUT")
            .path(&format!("/api/v1/users/{id}"))
            .json(&json!({ "name": "Ana R. Ruiz" }))
            .reply(&api)
            .await;
        assert_eq!(updated.status(), StatusCode::OK);
        let body: Value = serde_json::from_slice(updated.body()).unwrap();
        assert_eq!(body["name"], "Ana R. Ruiz");

        let deleted = warp::test::request()
            .method("DELETE")
            .path(&format!("/api/v1/users/{id}"))
            .reply(&api)
            .await;
        assert_eq!(deleted.status(), StatusCode::OK);

        let gone = warp::test::request()
            .method("GET")
            .path(&format!("/api/v1/users/{id}"))
            .reply(&api)
            .await;
        assert_eq!(gone.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_role_listings_filter() {
        let api = routes(test_support::services());
        register(&api, &patient_body("ana@example.com")).await;
        register(&api, &doctor_body("lee@example.com")).await;

        let doctors = warp::test::request()
            .method("GET")
            .path("/api/v1/doctors")
            .reply(&api)
            .await;
        let body: Value = serde_json::from_slice(doctors.body()).unwrap();
        let list = body.as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["email"], "lee@example.com");

        let patients = warp::test::request()
            .method("GET")
            .path("/api/v1/patients")
            .reply(&api)
            .await;
        let body: Value = serde_json::from_slice(patients.body()).unwrap();
        assert_eq!(body.as_array().unwrap().len(), 1);
    }
}

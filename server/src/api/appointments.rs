// server/src/api/appointments.rs

use serde::Deserialize;
use uuid::Uuid;
use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::reply::{Json, WithStatus};
use warp::Filter;

use models::appointments::{
    AppointmentFilter, AppointmentStatus, BookingRequest, RescheduleRequest,
};

use super::{respond, with_services, ApiReply, Services};

/// Activity entries returned when the caller does not say how many.
const DEFAULT_ACTIVITY_LIMIT: usize = 20;

/// Admin listing filter, as query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct AppointmentListQuery {
    pub status: Option<AppointmentStatus>,
    pub doctor: Option<Uuid>,
    pub patient: Option<Uuid>,
}

impl From<AppointmentListQuery> for AppointmentFilter {
    fn from(query: AppointmentListQuery) -> Self {
        AppointmentFilter {
            status: query.status,
            doctor_id: query.doctor,
            patient_id: query.patient,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ActivityQuery {
    pub limit: Option<usize>,
}

/// Appointment routes: booking, the lifecycle actions, the listings per
/// patient and doctor, and the admin overview.
pub fn routes(svc: Services) -> BoxedFilter<(WithStatus<Json>,)> {
    let book = warp::path!("appointments")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_services(svc.clone()))
        .and_then(|req: BookingRequest, svc: Services| async move {
            Ok(respond(svc.booking.book(req).await, StatusCode::CREATED)) as ApiReply
        });

    let list = warp::path!("appointments")
        .and(warp::get())
        .and(warp::query::<AppointmentListQuery>())
        .and(with_services(svc.clone()))
        .and_then(|query: AppointmentListQuery, svc: Services| async move {
            let result = svc.booking.list_appointments(query.into()).await;
            Ok(respond(result, StatusCode::OK)) as ApiReply
        });

    let get = warp::path!("appointments" / Uuid)
        .and(warp::get())
        .and(with_services(svc.clone()))
        .and_then(|id: Uuid, svc: Services| async move {
            Ok(respond(svc.booking.get_appointment(id).await, StatusCode::OK)) as ApiReply
        });

    let confirm = warp::path!("appointments" / Uuid / "confirm")
        .and(warp::post())
        .and(with_services(svc.clone()))
        .and_then(|id: Uuid, svc: Services| async move {
            Ok(respond(svc.booking.confirm(id).await, StatusCode::OK)) as ApiReply
        });

    let decline = warp::path!("appointments" / Uuid / "decline")
        .and(warp::post())
        .and(with_services(svc.clone()))
        .and_then(|id: Uuid, svc: Services| async move {
            Ok(respond(svc.booking.decline(id).await, StatusCode::OK)) as ApiReply
        });

    let cancel = warp::path!("appointments" / Uuid / "cancel")
        .and(warp::post())
        .and(with_services(svc.clone()))
        .and_then(|id: Uuid, svc: Services| async move {
            Ok(respond(svc.booking.cancel(id).await, StatusCode::OK)) as ApiReply
        });

    let complete = warp::path!("appointments" / Uuid / "complete")
        .and(warp::post())
        .and(with_services(svc.clone()))
        .and_then(|id: Uuid, svc: Services| async move {
            Ok(respond(svc.booking.complete(id).await, StatusCode::OK)) as ApiReply
        });

    let reschedule = warp::path!("appointments" / Uuid / "reschedule")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_services(svc.clone()))
        .and_then(|id: Uuid, req: RescheduleRequest, svc: Services| async move {
            Ok(respond(svc.booking.reschedule(id, req).await, StatusCode::OK)) as ApiReply
        });

    let for_patient = warp::path!("patients" / Uuid / "appointments")
        .and(warp::get())
        .and(with_services(svc.clone()))
        .and_then(|patient_id: Uuid, svc: Services| async move {
            let result = svc.booking.appointments_for_patient(patient_id).await;
            Ok(respond(result, StatusCode::OK)) as ApiReply
        });

    let for_doctor = warp::path!("doctors" / Uuid / "appointments")
        .and(warp::get())
        .and(with_services(svc.clone()))
        .and_then(|doctor_id: Uuid, svc: Services| async move {
            let result = svc.booking.appointments_for_doctor(doctor_id).await;
            Ok(respond(result, StatusCode::OK)) as ApiReply
        });

    let pending_for_doctor = warp::path!("doctors" / Uuid / "appointments" / "pending")
        .and(warp::get())
        .and(with_services(svc.clone()))
        .and_then(|doctor_id: Uuid, svc: Services| async move {
            let result = svc.booking.pending_for_doctor(doctor_id).await;
            Ok(respond(result, StatusCode::OK)) as ApiReply
        });

    let overview = warp::path!("overview")
        .and(warp::get())
        .and(with_services(svc.clone()))
        .and_then(|svc: Services| async move {
            Ok(respond(svc.overview.overview().await, StatusCode::OK)) as ApiReply
        });

    let activity = warp::path!("overview" / "activity")
        .and(warp::get())
        .and(warp::query::<ActivityQuery>())
        .and(with_services(svc))
        .and_then(|query: ActivityQuery, svc: Services| async move {
            let limit = query.limit.unwrap_or(DEFAULT_ACTIVITY_LIMIT);
            Ok(respond(svc.overview.recent_activity(limit).await, StatusCode::OK)) as ApiReply
        });

    book.or(list)
        .unify()
        .or(get)
        .unify()
        .or(confirm)
        .unify()
        .or(decline)
        .unify()
        .or(cancel)
        .unify()
        .or(complete)
        .unify()
        .or(reschedule)
        .unify()
        .or(for_patient)
        .unify()
        .or(pending_for_doctor)
        .unify()
        .or(for_doctor)
        .unify()
        .or(activity)
        .unify()
        .or(overview)
        .unify()
        .boxed()
}

#[cfg(test)]
mod tests {
    use chrono::{Days, NaiveDate};
    use serde_json::{json, Value};

    use models::slots::SlotRange;

    use crate::api::test_support::{seed_doctor, seed_patient};
    use crate::api::{routes, test_support};

    use super::*;

    fn days_ahead(n: u64) -> NaiveDate {
        chrono::Utc::now().date_naive().checked_add_days(Days::new(n)).unwrap()
    }

    struct Clinic {
        svc: Services,
        api: BoxedFilter<(WithStatus<Json>,)>,
        doctor: Uuid,
        patient: Uuid,
    }

    impl Clinic {
        async fn with_slots(labels: &[&str], date: NaiveDate) -> Self {
            let svc = test_support::services();
            let api = routes(svc.clone());
            let doctor = seed_doctor(&svc).await;
            let patient = seed_patient(&svc).await;
            for label in labels {
                svc.availability
                    .publish(doctor, date, SlotRange::parse(label).unwrap())
                    .await
                    .unwrap();
            }
            Clinic { svc, api, doctor, patient }
        }

        async fn book(&self, date: NaiveDate, slot: &str) -> Value {
            let res = warp::test::request()
                .method("POST")
                .path("/api/v1/appointments")
                .json(&json!({
                    "patient_id": self.patient,
                    "doctor_id": self.doctor,
                    "date": date,
                    "slot": slot
                }))
                .reply(&self.api)
                .await;
            assert_eq!(res.status(), StatusCode::CREATED, "booking {slot} failed");
            serde_json::from_slice(res.body()).unwrap()
        }

        async fn act(&self, id: &str, action: &str) -> (StatusCode, Value) {
            let res = warp::test::request()
                .method("POST")
                .path(&format!("/api/v1/appointments/{id}/{action}"))
                .reply(&self.api)
                .await;
            let body = serde_json::from_slice(res.body()).unwrap_or(Value::Null);
            (res.status(), body)
        }
    }

    #[tokio::test]
    async fn test_booking_takes_the_slot() {
        let date = days_ahead(3);
        let clinic = Clinic::with_slots(&["09:00-09:30"], date).await;

        let appointment = clinic.book(date, "09:00-09:30").await;
        assert_eq!(appointment["status"], "pending");
        assert_eq!(appointment["slot"], "09:00-09:30");

        let second = warp::test::request()
            .method("POST")
            .path("/api/v1/appointments")
            .json(&json!({
                "patient_id": clinic.patient,
                "doctor_id": clinic.doctor,
                "date": date,
                "slot": "09:00-09:30"
            }))
            .reply(&clinic.api)
            .await;
        assert_eq!(second.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_booking_an_unpublished_slot_fails() {
        let date = days_ahead(3);
        let clinic = Clinic::with_slots(&["09:00-09:30"], date).await;

        let res = warp::test::request()
            .method("POST")
            .path("/api/v1/appointments")
            .json(&json!({
                "patient_id": clinic.patient,
                "doctor_id": clinic.doctor,
                "date": date,
                "slot": "15:00-15:30"
            }))
            .reply(&clinic.api)
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_slice(res.body()).unwrap();
        assert!(body["error"].as_str().unwrap().contains("not published"));
    }

    #[tokio::test]
    async fn test_get_unknown_appointment_is_404() {
        let clinic = Clinic::with_slots(&[], days_ahead(1)).await;
        let res = warp::test::request()
            .method("GET")
            .path(&format!("/api/v1/appointments/{}", Uuid::new_v4()))
            .reply(&clinic.api)
            .await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_lifecycle_actions_over_http() {
        let date = days_ahead(3);
        let clinic = Clinic::with_slots(&["09:00-09:30"], date).await;
        let appointment = clinic.book(date, "09:00-09:30").await;
        let id = appointment["id"].as_str().unwrap().to_string();

        let (status, body) = clinic.act(&id, "confirm").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "confirmed");

        // Decline only applies while the request is still pending.
        let (status, _) = clinic.act(&id, "decline").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = clinic.act(&id, "complete").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "completed");

        let (status, _) = clinic.act(&id, "cancel").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_reschedule_moves_the_visit() {
        let date = days_ahead(3);
        let clinic = Clinic::with_slots(&["09:00-09:30", "10:00-10:30"], date).await;
        let appointment = clinic.book(date, "09:00-09:30").await;
        let id = appointment["id"].as_str().unwrap();

        let moved = warp::test::request()
            .method("POST")
            .path(&format!("/api/v1/appointments/{id}/reschedule"))
            .json(&json!({ "date": date, "slot": "10:00-10:30" }))
            .reply(&clinic.api)
            .await;
        assert_eq!(moved.status(), StatusCode::OK);
        let body: Value = serde_json::from_slice(moved.body()).unwrap();
        assert_eq!(body["slot"], "10:00-10:30");

        // The old slot is bookable again.
        let free = warp::test::request()
            .method("GET")
            .path(&format!("/api/v1/doctors/{}/free/{date}", clinic.doctor))
            .reply(&clinic.api)
            .await;
        let body: Value = serde_json::from_slice(free.body()).unwrap();
        assert_eq!(body, json!(["09:00-09:30"]));
    }

    #[tokio::test]
    async fn test_listings_and_status_filter() {
        let date = days_ahead(3);
        let clinic = Clinic::with_slots(&["09:00-09:30", "10:00-10:30"], date).await;
        let first = clinic.book(date, "09:00-09:30").await;
        clinic.book(date, "10:00-10:30").await;
        clinic.act(first["id"].as_str().unwrap(), "confirm").await;

        let pending = warp::test::request()
            .method("GET")
            .path("/api/v1/appointments?status=pending")
            .reply(&clinic.api)
            .await;
        let body: Value = serde_json::from_slice(pending.body()).unwrap();
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["slot"], "10:00-10:30");

        let for_patient = warp::test::request()
            .method("GET")
            .path(&format!("/api/v1/patients/{}/appointments", clinic.patient))
            .reply(&clinic.api)
            .await;
        let body: Value = serde_json::from_slice(for_patient.body()).unwrap();
        assert_eq!(body.as_array().unwrap().len(), 2);

        let doctor_pending = warp::test::request()
            .method("GET")
            .path(&format!("/api/v1/doctors/{}/appointments/pending", clinic.doctor))
            .reply(&clinic.api)
            .await;
        let body: Value = serde_json::from_slice(doctor_pending.body()).unwrap();
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_overview_and_activity() {
        let date = days_ahead(3);
        let clinic = Clinic::with_slots(&["09:00-09:30"], date).await;
        let appointment = clinic.book(date, "09:00-09:30").await;
        clinic.act(appointment["id"].as_str().unwrap(), "confirm").await;

        let overview = warp::test::request()
            .method("GET")
            .path("/api/v1/overview")
            .reply(&clinic.api)
            .await;
        assert_eq!(overview.status(), StatusCode::OK);
        let stats: Value = serde_json::from_slice(overview.body()).unwrap();
        assert_eq!(stats["doctors"], 1);
        assert_eq!(stats["patients"], 1);
        assert_eq!(stats["total_appointments"], 1);
        assert_eq!(stats["confirmed"], 1);

        let activity = warp::test::request()
            .method("GET")
            .path("/api/v1/overview/activity?limit=1")
            .reply(&clinic.api)
            .await;
        assert_eq!(activity.status(), StatusCode::OK);
        let events: Value = serde_json::from_slice(activity.body()).unwrap();
        let events = events.as_array().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["event_type"], "appointment.confirmed");
    }
}

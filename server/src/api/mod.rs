// server/src/api/mod.rs
//
// JSON API over warp: one handler module per domain, a shared service
// bundle injected into every route, and a single error-to-status
// mapping so every failure body reads {"error": "..."}.

pub mod appointments;
pub mod availability;
pub mod users;

use std::convert::Infallible;
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::reply::{Json, WithStatus};
use warp::{Filter, Rejection};

use caching::Cache;
use models::errors::{ClinicError, ClinicResult};
use scheduling::{
    AvailabilityService, BookingService, DirectoryService, DoctorLocks, OverviewService,
};
use storage::DocumentStore;

/// Unified success return type of the JSON handlers.
pub type ApiReply = Result<WithStatus<Json>, Rejection>;

/// Everything a handler needs, cloned into each route.
#[derive(Clone)]
pub struct Services {
    pub booking: BookingService,
    pub availability: AvailabilityService,
    pub directory: DirectoryService,
    pub overview: OverviewService,
}

impl Services {
    /// Wires the services onto one store, sharing the free-slot cache
    /// and the per-doctor lock registry between booking and
    /// availability.
    pub fn new(store: Arc<dyn DocumentStore>, cache: Cache) -> Self {
        let locks = Arc::new(DoctorLocks::new());
        Services {
            booking: BookingService::new(Arc::clone(&store), cache.clone(), Arc::clone(&locks)),
            availability: AvailabilityService::new(Arc::clone(&store), cache, locks),
            directory: DirectoryService::new(Arc::clone(&store)),
            overview: OverviewService::new(store),
        }
    }
}

/// Injects the service bundle into warp filters.
pub(crate) fn with_services(
    svc: Services,
) -> impl Filter<Extract = (Services,), Error = Infallible> + Clone {
    warp::any().map(move || svc.clone())
}

pub(crate) fn json_reply<T: Serialize>(value: &T, status: StatusCode) -> WithStatus<Json> {
    warp::reply::with_status(warp::reply::json(value), status)
}

/// The JSON error body and status a service error maps onto.
pub(crate) fn error_reply(err: ClinicError) -> WithStatus<Json> {
    let status = match &err {
        ClinicError::NotFound { .. } => StatusCode::NOT_FOUND,
        ClinicError::AlreadyExists(_)
        | ClinicError::SlotTaken { .. }
        | ClinicError::BookingConflict { .. } => StatusCode::CONFLICT,
        ClinicError::SlotNotPublished { .. }
        | ClinicError::InvalidTransition { .. }
        | ClinicError::InvalidRequest(_)
        | ClinicError::InvalidData(_)
        | ClinicError::Validation(_) => StatusCode::BAD_REQUEST,
        ClinicError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    json_reply(&json!({ "error": err.to_string() }), status)
}

/// Collapses a service result into the unified reply shape.
pub(crate) fn respond<T: Serialize>(result: ClinicResult<T>, status: StatusCode) -> WithStatus<Json> {
    match result {
        Ok(value) => json_reply(&value, status),
        Err(e) => error_reply(e),
    }
}

/// The full API under `/api/v1`.
pub fn routes(services: Services) -> BoxedFilter<(WithStatus<Json>,)> {
    let health = warp::path!("health")
        .and(warp::get())
        .map(|| json_reply(&json!({ "status": "ok" }), StatusCode::OK));

    let api = users::routes(services.clone())
        .or(availability::routes(services.clone()))
        .unify()
        .or(appointments::routes(services))
        .unify()
        .or(health)
        .unify();

    warp::path!("api" / "v1" / ..).and(api).boxed()
}

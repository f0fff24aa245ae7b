// server/src/api/availability.rs

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::reply::{Json, WithStatus};
use warp::Filter;

use models::availability::{DatedSlot, SlotPattern};
use models::slots::SlotRange;

use super::{error_reply, json_reply, respond, with_services, ApiReply, Services};

#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub slot: SlotRange,
}

#[derive(Debug, Deserialize)]
pub struct BatchPublishRequest {
    pub doctor_id: Uuid,
    pub entries: Vec<DatedSlot>,
}

#[derive(Debug, Deserialize)]
pub struct RecurringPublishRequest {
    pub doctor_id: Uuid,
    pub start: NaiveDate,
    pub slots: Vec<SlotRange>,
    pub weeks: u8,
}

#[derive(Debug, Deserialize)]
pub struct PatternPublishRequest {
    pub doctor_id: Uuid,
    pub pattern: SlotPattern,
}

#[derive(Debug, Deserialize)]
pub struct DeleteBatchRequest {
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct SaveTemplateRequest {
    pub doctor_id: Uuid,
    pub name: String,
    pub slots: Vec<SlotRange>,
}

#[derive(Debug, Deserialize)]
pub struct ApplyTemplateRequest {
    pub dates: Vec<NaiveDate>,
}

/// Calendar routes: slot publishing in its single, bulk, recurring and
/// pattern forms, the free-slot listing patients book from, and slot
/// templates.
pub fn routes(svc: Services) -> BoxedFilter<(WithStatus<Json>,)> {
    let publish = warp::path!("availability")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_services(svc.clone()))
        .and_then(|req: PublishRequest, svc: Services| async move {
            let result = svc.availability.publish(req.doctor_id, req.date, req.slot).await;
            Ok(respond(result, StatusCode::CREATED)) as ApiReply
        });

    let publish_batch = warp::path!("availability" / "batch")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_services(svc.clone()))
        .and_then(|req: BatchPublishRequest, svc: Services| async move {
            let result = svc.availability.publish_many(req.doctor_id, req.entries).await;
            Ok(respond(result, StatusCode::OK)) as ApiReply
        });

    let publish_recurring = warp::path!("availability" / "recurring")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_services(svc.clone()))
        .and_then(|req: RecurringPublishRequest, svc: Services| async move {
            let result = svc
                .availability
                .publish_recurring(req.doctor_id, req.start, req.slots, req.weeks)
                .await;
            Ok(respond(result, StatusCode::OK)) as ApiReply
        });

    let publish_pattern = warp::path!("availability" / "pattern")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_services(svc.clone()))
        .and_then(|req: PatternPublishRequest, svc: Services| async move {
            let result = svc.availability.publish_pattern(req.doctor_id, req.pattern).await;
            Ok(respond(result, StatusCode::OK)) as ApiReply
        });

    let delete_batch = warp::path!("availability" / "delete-batch")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_services(svc.clone()))
        .and_then(|req: DeleteBatchRequest, svc: Services| async move {
            Ok(respond(svc.availability.remove_many(req.ids).await, StatusCode::OK)) as ApiReply
        });

    let delete_slot = warp::path!("availability" / Uuid)
        .and(warp::delete())
        .and(with_services(svc.clone()))
        .and_then(|slot_id: Uuid, svc: Services| async move {
            let reply = match svc.availability.remove(slot_id).await {
                Ok(()) => json_reply(&json!({ "deleted": slot_id }), StatusCode::OK),
                Err(e) => error_reply(e),
            };
            Ok(reply) as ApiReply
        });

    let doctor_slots = warp::path!("doctors" / Uuid / "availability")
        .and(warp::get())
        .and(with_services(svc.clone()))
        .and_then(|doctor_id: Uuid, svc: Services| async move {
            let result = svc.availability.slots_for_doctor(doctor_id).await;
            Ok(respond(result, StatusCode::OK)) as ApiReply
        });

    let doctor_slots_on = warp::path!("doctors" / Uuid / "availability" / NaiveDate)
        .and(warp::get())
        .and(with_services(svc.clone()))
        .and_then(|doctor_id: Uuid, date: NaiveDate, svc: Services| async move {
            let result = svc.availability.slots_for_doctor_on(doctor_id, date).await;
            Ok(respond(result, StatusCode::OK)) as ApiReply
        });

    let free_slots = warp::path!("doctors" / Uuid / "free" / NaiveDate)
        .and(warp::get())
        .and(with_services(svc.clone()))
        .and_then(|doctor_id: Uuid, date: NaiveDate, svc: Services| async move {
            let result = svc.booking.available_slots(doctor_id, date).await;
            Ok(respond(result, StatusCode::OK)) as ApiReply
        });

    let save_template = warp::path!("templates")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_services(svc.clone()))
        .and_then(|req: SaveTemplateRequest, svc: Services| async move {
            let result = svc
                .availability
                .save_template(req.doctor_id, &req.name, req.slots)
                .await;
            Ok(respond(result, StatusCode::CREATED)) as ApiReply
        });

    let list_templates = warp::path!("doctors" / Uuid / "templates")
        .and(warp::get())
        .and(with_services(svc.clone()))
        .and_then(|doctor_id: Uuid, svc: Services| async move {
            Ok(respond(svc.availability.list_templates(doctor_id).await, StatusCode::OK))
                as ApiReply
        });

    let delete_template = warp::path!("templates" / Uuid)
        .and(warp::delete())
        .and(with_services(svc.clone()))
        .and_then(|template_id: Uuid, svc: Services| async move {
            let reply = match svc.availability.delete_template(template_id).await {
                Ok(()) => json_reply(&json!({ "deleted": template_id }), StatusCode::OK),
                Err(e) => error_reply(e),
            };
            Ok(reply) as ApiReply
        });

    let apply_template = warp::path!("templates" / Uuid / "apply")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_services(svc))
        .and_then(|template_id: Uuid, req: ApplyTemplateRequest, svc: Services| async move {
            let result = svc.availability.apply_template(template_id, req.dates).await;
            Ok(respond(result, StatusCode::OK)) as ApiReply
        });

    publish_batch
        .or(publish_recurring)
        .unify()
        .or(publish_pattern)
        .unify()
        .or(delete_batch)
        .unify()
        .or(publish)
        .unify()
        .or(delete_slot)
        .unify()
        .or(doctor_slots_on)
        .unify()
        .or(doctor_slots)
        .unify()
        .or(free_slots)
        .unify()
        .or(save_template)
        .unify()
        .or(list_templates)
        .unify()
        .or(delete_template)
        .unify()
        .or(apply_template)
        .unify()
        .boxed()
}

//! HTTP handler functions for the pothole map API.

use actix_web::{HttpResponse, web};
use pothole_map_database::DbError;
use pothole_map_database::candidates::list_defects;
use pothole_map_database::defects::{PatchError, get_defect, list_reports_for_defect, patch_defect};
use pothole_map_database::reconcile::{self, SubmitError};
use pothole_map_database::reporters;
use pothole_map_database_models::{DefectPatch, DefectQuery};
use pothole_map_server_models::{
    ApiAck, ApiDefect, ApiDefectPatch, ApiDefectSummary, ApiError, ApiHealth, ApiReport,
    CreateReporterRequest, CreateReporterResponse, DefectQueryParams, SubmitReportRequest,
    SubmitReportResponse,
};

use crate::AppState;

fn internal_error(context: &str, e: &impl std::fmt::Display) -> HttpResponse {
    log::error!("{context}: {e}");
    HttpResponse::InternalServerError().json(ApiError::new("internal error"))
}

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `POST /api/reports`
///
/// Reconciles the report against nearby defects and answers `201` with the
/// defect it was attached to (or the one it created).
pub async fn submit_report(
    state: web::Data<AppState>,
    body: web::Json<SubmitReportRequest>,
) -> HttpResponse {
    let submission = body.into_inner().into();
    let submitted_at = chrono::Utc::now();

    let result = web::block(move || {
        reconcile::submit_report(&state.store, &state.match_config, submission, submitted_at)
    })
    .await;

    match result {
        Ok(Ok(outcome)) => HttpResponse::Created().json(SubmitReportResponse::from(outcome)),
        Ok(Err(SubmitError::Validation(e))) => {
            HttpResponse::BadRequest().json(ApiError::new(e.to_string()))
        }
        Ok(Err(e @ SubmitError::Persistence(_))) => internal_error("Failed to submit report", &e),
        Err(e) => internal_error("Report submission task failed", &e),
    }
}

/// `POST /api/reporters`
///
/// Registers an anonymous reporter. The body is optional.
pub async fn create_reporter(
    state: web::Data<AppState>,
    body: Option<web::Json<CreateReporterRequest>>,
) -> HttpResponse {
    let display_name = body.and_then(|b| b.into_inner().display_name);

    let result = web::block(move || -> Result<_, DbError> {
        let conn = state.store.acquire()?;
        reporters::create_reporter(&conn, display_name.as_deref())
    })
    .await;

    match result {
        Ok(Ok(row)) => HttpResponse::Created().json(CreateReporterResponse { id: row.id }),
        Ok(Err(e)) => internal_error("Failed to create reporter", &e),
        Err(e) => internal_error("Reporter task failed", &e),
    }
}

/// `GET /api/potholes`
///
/// Without coordinates, lists the highest-priority defects. With `lat` and
/// `lon`, lists defects inside the proximity box around that point; an
/// invalid coordinate answers `400`.
pub async fn list_potholes(
    state: web::Data<AppState>,
    params: web::Query<DefectQueryParams>,
) -> HttpResponse {
    let query = match DefectQuery::try_from(&*params) {
        Ok(query) => query,
        Err(e) => return HttpResponse::BadRequest().json(ApiError::new(e.to_string())),
    };

    let result = web::block(move || -> Result<_, DbError> {
        let conn = state.store.acquire()?;
        list_defects(&conn, &query)
    })
    .await;

    match result {
        Ok(Ok(rows)) => {
            let defects: Vec<ApiDefectSummary> =
                rows.into_iter().map(ApiDefectSummary::from).collect();
            HttpResponse::Ok().json(defects)
        }
        Ok(Err(e)) => internal_error("Failed to list defects", &e),
        Err(e) => internal_error("Defect listing task failed", &e),
    }
}

/// `GET /api/potholes/{id}`
pub async fn get_pothole(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let id = path.into_inner();
    let lookup_id = id.clone();

    let result = web::block(move || -> Result<_, DbError> {
        let conn = state.store.acquire()?;
        get_defect(&conn, &lookup_id)
    })
    .await;

    match result {
        Ok(Ok(Some(row))) => HttpResponse::Ok().json(ApiDefect::from(row)),
        Ok(Ok(None)) => {
            HttpResponse::NotFound().json(ApiError::new(format!("Defect {id} not found")))
        }
        Ok(Err(e)) => internal_error("Failed to load defect", &e),
        Err(e) => internal_error("Defect lookup task failed", &e),
    }
}

/// `PATCH /api/potholes/{id}`
///
/// Applies a moderation patch. Unknown fields are rejected while parsing
/// the body; an empty patch is rejected with `400`.
pub async fn patch_pothole(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<ApiDefectPatch>,
) -> HttpResponse {
    let id = path.into_inner();
    let patch = DefectPatch::from(body.into_inner());

    let result = web::block(move || -> Result<(), PatchError> {
        let conn = state.store.acquire()?;
        patch_defect(&conn, &id, &patch)
    })
    .await;

    match result {
        Ok(Ok(())) => HttpResponse::Ok().json(ApiAck { ok: true }),
        Ok(Err(e @ PatchError::NoFields)) => {
            HttpResponse::BadRequest().json(ApiError::new(e.to_string()))
        }
        Ok(Err(e @ PatchError::NotFound { .. })) => {
            HttpResponse::NotFound().json(ApiError::new(e.to_string()))
        }
        Ok(Err(e @ PatchError::Persistence(_))) => internal_error("Failed to patch defect", &e),
        Err(e) => internal_error("Defect patch task failed", &e),
    }
}

/// `GET /api/potholes/{id}/reports`
///
/// Lists a defect's reports, newest first. Unknown ids answer `404` rather
/// than an empty list.
pub async fn list_pothole_reports(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> HttpResponse {
    let id = path.into_inner();
    let lookup_id = id.clone();

    let result = web::block(move || -> Result<_, DbError> {
        let conn = state.store.acquire()?;
        if get_defect(&conn, &lookup_id)?.is_none() {
            return Ok(None);
        }
        list_reports_for_defect(&conn, &lookup_id).map(Some)
    })
    .await;

    match result {
        Ok(Ok(Some(rows))) => {
            let reports: Vec<ApiReport> = rows.into_iter().map(ApiReport::from).collect();
            HttpResponse::Ok().json(reports)
        }
        Ok(Ok(None)) => {
            HttpResponse::NotFound().json(ApiError::new(format!("Defect {id} not found")))
        }
        Ok(Err(e)) => internal_error("Failed to list reports", &e),
        Err(e) => internal_error("Report listing task failed", &e),
    }
}

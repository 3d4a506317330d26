use actix_web::{web, HttpResponse, Responder};
use std::sync::Arc;
use validator::Validate;

use crate::models::{ErrorResponse, FindJobsQuery, FindJobsRequest, HealthResponse, SearchCriteria};
use crate::services::JobSearchService;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub search: Arc<JobSearchService>,
}

/// Configure all job search routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/jobs/find", web::post().to(find_jobs));
}

/// Health check endpoint
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Find jobs endpoint
///
/// POST /api/v1/jobs/find?limit=3
///
/// Request body:
/// ```json
/// {
///   "position": "Data Engineer",
///   "location": "Austin",
///   "jobNature": "remote",
///   "salary": "$90,000 - $120,000",
///   "experience": "3 years",
///   "skills": "python, sql"
/// }
/// ```
async fn find_jobs(
    state: web::Data<AppState>,
    query: web::Query<FindJobsQuery>,
    req: web::Json<FindJobsRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        tracing::info!("Validation failed for find_jobs request: {:?}", errors);
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "Validation failed".to_string(),
            message: errors.to_string(),
            status_code: 400,
        });
    }

    let criteria = SearchCriteria::from(req.into_inner());
    if criteria.position.is_empty() {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "Validation failed".to_string(),
            message: "position must not be blank".to_string(),
            status_code: 400,
        });
    }

    let limit = query.limit;
    tracing::info!("Finding jobs for position '{}', limit {:?}", criteria.position, limit);

    // run on its own task so a panic in the pipeline becomes a 500
    let search = Arc::clone(&state.search);
    let task = actix_web::rt::spawn(async move { search.find_jobs(&criteria, limit).await });

    match task.await {
        Ok(response) => {
            tracing::info!("Returning {} jobs", response.relevant_jobs.len());
            HttpResponse::Ok().json(response)
        }
        Err(e) => {
            tracing::error!("Job search pipeline failed: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Internal server error".to_string(),
                message: "Error processing request".to_string(),
                status_code: 500,
            })
        }
    }
}

use actix_cors::Cors;
use actix_web::{error, http::StatusCode, middleware, web, App, HttpResponse, HttpServer};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use job_radar::config::{LoggingSettings, Settings};
use job_radar::core::{RateLimiter, RelevanceScorer};
use job_radar::models::ErrorResponse;
use job_radar::routes::{self, jobs::AppState};
use job_radar::services::sources::build_http_client;
use job_radar::services::{
    HttpDescriptionSource, InferenceBackend, JSearchSource, JobSearchService, JobsApiSource,
    LinkedInPageSource, PostingSource, ScoreCache,
};

/// JSON error body for rejected request payloads
#[derive(Debug)]
pub struct PayloadError(ErrorResponse);

impl std::fmt::Display for PayloadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.0.error, self.0.message)
    }
}

impl error::ResponseError for PayloadError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.0.status_code).unwrap_or(StatusCode::BAD_REQUEST)
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(&self.0)
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &actix_web::HttpRequest) -> actix_web::Error {
    info!("JSON payload error on {}: {}", req.path(), err);
    PayloadError(ErrorResponse {
        error: "invalid_json".to_string(),
        message: format!("Invalid JSON: {}", err),
        status_code: 400,
    })
    .into()
}

/// Handle query payload errors
pub fn handle_query_payload_error(err: error::QueryPayloadError, _req: &actix_web::HttpRequest) -> actix_web::Error {
    PayloadError(ErrorResponse {
        error: "invalid_query".to_string(),
        message: format!("Invalid query: {}", err),
        status_code: 400,
    })
    .into()
}

fn init_logging(logging: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| logging.format.clone());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.compact().init();
    }
}

/// Wire sources, description lookups and the scorer around one shared limiter
fn build_search_service(settings: &Settings) -> JobSearchService {
    let limiter = Arc::new(RateLimiter::with_limits(settings.rate_limits.table()));
    let client = build_http_client(Duration::from_secs(settings.search.request_timeout_secs));

    let jsearch = |site: Option<&String>| {
        let source = JSearchSource::new(
            settings.jsearch.base_url.clone(),
            settings.jsearch.api_key.clone(),
            Arc::clone(&limiter),
        )
        .with_client(client.clone())
        .with_host(settings.jsearch.host.clone())
        .with_country(settings.jsearch.country.clone());

        match site {
            Some(site) => source.with_site(site.clone()),
            None => source,
        }
    };

    if settings.jsearch.api_key.is_none() {
        warn!("JSEARCH_API_KEY not set; JSearch sources and job details are disabled");
    }
    if settings.inference.api_key.is_none() {
        warn!("HUGGINGFACE_API_KEY not set; top postings will score 0");
    }

    let mut sources: Vec<Arc<dyn PostingSource>> = settings
        .jsearch
        .sites
        .iter()
        .map(|site| Arc::new(jsearch(Some(site))) as Arc<dyn PostingSource>)
        .collect();

    if settings.jobs_api.enabled {
        if settings.jobs_api.api_key.is_none() {
            warn!("JOBS_API_KEY not set; Jobs API source is disabled");
        }
        let jobs_api = JobsApiSource::new(
            settings.jobs_api.base_url.clone(),
            settings.jobs_api.api_key.clone(),
            Arc::clone(&limiter),
        )
        .with_client(client.clone())
        .with_host(settings.jobs_api.host.clone());
        sources.push(Arc::new(jobs_api));
    }

    let details = Arc::new(jsearch(None));

    let mut descriptions = HttpDescriptionSource::new(Some(details));
    if let Some((min_ms, max_ms)) = settings.scoring.politeness_delay_ms {
        descriptions = descriptions.with_politeness_delay(Duration::from_millis(min_ms), Duration::from_millis(max_ms));
    }

    let backend = InferenceBackend::new(
        settings.inference.base_url.clone(),
        settings.inference.model.clone(),
        settings.inference.api_key.clone(),
    )
    .with_client(client.clone())
    .with_generation(settings.inference.max_new_tokens, settings.inference.temperature);

    let cache = ScoreCache::from_capacity(settings.scoring.cache_capacity);
    match settings.scoring.cache_capacity {
        Some(capacity) => info!("Score cache bounded at {} entries", capacity),
        None => info!("Score cache unbounded"),
    }

    let scorer = RelevanceScorer::new(Arc::new(backend), Arc::clone(&limiter), cache)
        .with_hot_set_size(settings.scoring.hot_set_size);

    let mut search = JobSearchService::new(sources, Arc::new(descriptions), scorer)
        .with_per_source_limit(settings.search.per_source_limit)
        .with_description_fetch_limit(settings.scoring.description_fetch_limit)
        .with_result_limits(settings.search.default_limit, settings.search.max_limit);

    if settings.linkedin.fallback {
        let linkedin = LinkedInPageSource::new(settings.linkedin.base_url.clone(), Arc::clone(&limiter));
        search = search.with_fallback(Arc::new(linkedin));
    }

    search
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()));
        }
    };

    init_logging(&settings.logging);

    info!("Starting job radar service...");

    let app_state = AppState {
        search: Arc::new(build_search_service(&settings)),
    };

    info!(
        "Search pipeline ready (rate limits: jsearch={}, jobs_api={}, huggingface={}, default={} per minute)",
        settings.rate_limits.jsearch,
        settings.rate_limits.jobs_api,
        settings.rate_limits.huggingface,
        settings.rate_limits.default
    );

    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    let server = HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .app_data(web::QueryConfig::default().error_handler(handle_query_payload_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port));

    match server {
        Ok(server) => server.run().await,
        Err(e) => {
            error!("Failed to bind HTTP server: {}", e);
            Err(e)
        }
    }
}

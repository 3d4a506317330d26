// Integration tests for Job Radar

use actix_web::{http::StatusCode, test, web, App};
use async_trait::async_trait;
use job_radar::core::{RateLimiter, RelevanceScorer, ScoringBackend};
use job_radar::models::{FindJobsResponse, Posting, SearchCriteria};
use job_radar::routes::{self, jobs::AppState};
use job_radar::services::{
    DescriptionSource, HttpDescriptionSource, InferenceBackend, JSearchSource, JobSearchService,
    JobsApiSource, PostingSource, ScoreCache, UpstreamError,
};
use mockito::{Matcher, Server, ServerGuard};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const JSEARCH_RESULTS: &str = r#"{"status":"OK","data":[
    {"job_id":"j1","job_title":"Senior Python Engineer","employer_name":"Acme",
     "job_city":"Austin","job_state":"TX","job_is_remote":false,
     "job_description":"Python, SQL and Airflow pipelines",
     "job_apply_link":"https://www.linkedin.com/jobs/view/1"},
    {"job_id":"j2","job_title":"Data Engineer","employer_name":"Globex",
     "job_country":"US","job_is_remote":true,
     "job_min_salary":90000,"job_max_salary":120000,
     "job_apply_link":"https://www.indeed.com/viewjob?jk=2"}
]}"#;

const JOBS_API_RESULTS: &str = r#"{"jobs":[
    {"id":"g1","title":"Python Developer","company":"Initech","location":"Remote",
     "url":"https://jobs.example.com/g1","description":"Django and Python services"}
]}"#;

async fn mock_upstreams(server: &mut ServerGuard, inference_calls: usize) -> mockito::Mock {
    server
        .mock("GET", "/search")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(JSEARCH_RESULTS)
        .create_async()
        .await;
    server
        .mock("GET", "/job-details")
        .match_query(Matcher::UrlEncoded("job_id".into(), "j2".into()))
        .with_status(200)
        .with_body(r#"{"data":[{"job_id":"j2","job_description":"We use SQL daily"}]}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/v2/list")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(JOBS_API_RESULTS)
        .create_async()
        .await;
    server
        .mock("POST", "/models/test-model")
        .with_status(200)
        .with_body(r#"[{"generated_text":"{\"score\": 0.5}"}]"#)
        .expect(inference_calls)
        .create_async()
        .await
}

fn create_live_service(server: &ServerGuard) -> JobSearchService {
    let limiter = Arc::new(RateLimiter::new());

    let jsearch = Arc::new(JSearchSource::new(server.url(), Some("js-key".into()), Arc::clone(&limiter)));
    let jobs_api = Arc::new(JobsApiSource::new(server.url(), Some("ja-key".into()), Arc::clone(&limiter)));
    let descriptions = HttpDescriptionSource::new(Some(Arc::clone(&jsearch)));
    let backend = InferenceBackend::new(server.url(), "test-model", Some("hf-key".into()));

    let scorer = RelevanceScorer::new(Arc::new(backend), limiter, ScoreCache::unbounded());
    let sources: Vec<Arc<dyn PostingSource>> = vec![jsearch, jobs_api];

    JobSearchService::new(sources, Arc::new(descriptions), scorer)
}

#[tokio::test]
async fn test_integration_end_to_end_search() {
    let mut server = Server::new_async().await;
    let inference = mock_upstreams(&mut server, 3).await;
    let service = create_live_service(&server);

    let criteria = SearchCriteria::new("Engineer").with_skills("python, sql");
    let response = service.find_jobs(&criteria, Some(3)).await;

    inference.assert_async().await;

    let titles: Vec<&str> = response.relevant_jobs.iter().map(|j| j.job_title.as_str()).collect();
    // 0.8 first; the two 0.65 scores keep prefilter order
    assert_eq!(titles, vec!["Senior Python Engineer", "Data Engineer", "Python Developer"]);

    let top = &response.relevant_jobs[0];
    let top_skills = top.skills_match.as_ref().unwrap();
    assert_eq!(top_skills.matched_skills, vec!["python", "sql"]);
    assert_eq!(top_skills.match_percentage, "100%");
    assert_eq!(top.location.as_deref(), Some("Austin, TX"));

    let data_engineer = &response.relevant_jobs[1];
    assert_eq!(data_engineer.salary.as_deref(), Some("$90,000.00 - $120,000.00"));
    assert_eq!(data_engineer.job_nature.as_deref(), Some("remote"));
    assert_eq!(data_engineer.skills_match.as_ref().unwrap().match_percentage, "50%");
}

#[tokio::test]
async fn test_integration_scores_are_cached_across_requests() {
    let mut server = Server::new_async().await;
    let inference = mock_upstreams(&mut server, 3).await;
    let service = create_live_service(&server);

    let criteria = SearchCriteria::new("Engineer").with_skills("python, sql");
    let first = service.find_jobs(&criteria, Some(3)).await;
    let second = service.find_jobs(&criteria, Some(3)).await;

    // the second request is served from the score cache
    inference.assert_async().await;
    assert_eq!(first.relevant_jobs, second.relevant_jobs);

    let stats = service.scorer().cache().stats().await;
    assert_eq!(stats.entries, 3);
    assert_eq!(stats.hit_count, 3);
}

#[tokio::test]
async fn test_integration_limit_truncates_results() {
    let mut server = Server::new_async().await;
    mock_upstreams(&mut server, 3).await;
    let service = create_live_service(&server);

    let response = service.find_jobs(&SearchCriteria::new("Engineer"), Some(1)).await;

    assert_eq!(response.relevant_jobs.len(), 1);
}

#[tokio::test]
async fn test_integration_failed_inference_still_returns_jobs() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/search")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(JSEARCH_RESULTS)
        .create_async()
        .await;
    server
        .mock("GET", "/job-details")
        .match_query(Matcher::Any)
        .with_status(404)
        .create_async()
        .await;
    server
        .mock("GET", "/v2/list")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"jobs":[]}"#)
        .create_async()
        .await;
    server
        .mock("POST", "/models/test-model")
        .with_status(401)
        .with_body("bad token")
        .create_async()
        .await;

    let service = create_live_service(&server);
    let response = service.find_jobs(&SearchCriteria::new("Engineer"), Some(5)).await;

    // both postings score zero but are still returned
    assert_eq!(response.relevant_jobs.len(), 2);
    assert_eq!(response.relevant_jobs[0].job_title, "Senior Python Engineer");
}

struct StubSource {
    postings: Vec<Posting>,
}

#[async_trait]
impl PostingSource for StubSource {
    fn name(&self) -> &str {
        "stub"
    }

    async fn search(&self, _criteria: &SearchCriteria, limit: usize) -> Vec<Posting> {
        self.postings.iter().take(limit).cloned().collect()
    }
}

struct StubDescriptions;

#[async_trait]
impl DescriptionSource for StubDescriptions {
    async fn fetch(&self, _posting: &Posting) -> Result<Option<String>, UpstreamError> {
        Ok(None)
    }
}

struct CountingBackend {
    calls: AtomicUsize,
}

#[async_trait]
impl ScoringBackend for CountingBackend {
    async fn generate(&self, _prompt: &str) -> Result<String, UpstreamError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("Relevance {}.{}", 0, 9 - n.min(8)))
    }
}

fn create_app_state(count: usize) -> AppState {
    let postings = (0..count)
        .map(|i| Posting::new(format!("Engineer {}", i), "Acme", "stub").with_source_id(i.to_string()))
        .collect();
    let scorer = RelevanceScorer::new(
        Arc::new(CountingBackend { calls: AtomicUsize::new(0) }),
        Arc::new(RateLimiter::new()),
        ScoreCache::unbounded(),
    );
    let search = JobSearchService::new(
        vec![Arc::new(StubSource { postings })],
        Arc::new(StubDescriptions),
        scorer,
    )
    .with_per_source_limit(10);

    AppState { search: Arc::new(search) }
}

#[actix_web::test]
async fn test_routes_health() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(create_app_state(0)))
            .configure(routes::configure_routes),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/v1/health").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn test_routes_find_jobs_default_and_clamped_limit() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(create_app_state(8)))
            .configure(routes::configure_routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/v1/jobs/find")
        .set_json(serde_json::json!({"position": "Engineer"}))
        .to_request();
    let body: FindJobsResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body.relevant_jobs.len(), 3);
    assert_eq!(body.relevant_jobs[0].job_title, "Engineer 0");

    let req = test::TestRequest::post()
        .uri("/api/v1/jobs/find?limit=50")
        .set_json(serde_json::json!({"position": "Engineer", "jobNature": "remote"}))
        .to_request();
    let body: FindJobsResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body.relevant_jobs.len(), 5);
}

#[actix_web::test]
async fn test_routes_reject_blank_position() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(create_app_state(2)))
            .configure(routes::configure_routes),
    )
    .await;

    for body in [serde_json::json!({"position": ""}), serde_json::json!({"position": "   "})] {
        let req = test::TestRequest::post()
            .uri("/api/v1/jobs/find")
            .set_json(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}

use crate::application::{DatabaseQueryUseCase, LogAnalysisUseCase};
use crate::domain::error::AppError;
use crate::domain::query::{LogRequest, LogResponse, QueryRequest};
use crate::infrastructure::db::DbEngineRegistry;
use actix_cors::Cors;
use actix_web::{dev::Server, get, post, web, App, HttpResponse, HttpServer, Responder};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;
use validator::Validate;

pub struct HttpState {
    pub database_query: Arc<DatabaseQueryUseCase>,
    pub log_analysis: Arc<LogAnalysisUseCase>,
    pub engines: Arc<DbEngineRegistry>,
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub detail: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    databases: BTreeMap<String, &'static str>,
}

fn error_response(err: &AppError) -> HttpResponse {
    HttpResponse::InternalServerError().json(ErrorBody {
        detail: err.detail().to_string(),
    })
}

fn unprocessable(detail: String) -> HttpResponse {
    HttpResponse::UnprocessableEntity().json(ErrorBody { detail })
}

#[post("/execute_query/")]
async fn execute_query(
    data: web::Data<HttpState>,
    req: web::Json<QueryRequest>,
) -> impl Responder {
    let request_id = Uuid::new_v4();
    info!(
        request_id = %request_id,
        db_type = %req.db_type,
        "Received execute_query request"
    );

    if let Err(e) = req.validate() {
        return unprocessable(e.to_string());
    }

    match data
        .database_query
        .execute(&req.db_type, &req.question)
        .await
    {
        Ok(response) => {
            info!(
                request_id = %request_id,
                "Executed query successfully for question: {}",
                req.question
            );
            HttpResponse::Ok().json(response)
        }
        Err(e) => {
            error!(
                request_id = %request_id,
                db_type = %req.db_type,
                "Error executing SQL query for question {}: {}",
                req.question,
                e
            );
            error_response(&e)
        }
    }
}

#[post("/analyze_logs/")]
async fn analyze_logs(data: web::Data<HttpState>, req: web::Json<LogRequest>) -> impl Responder {
    let request_id = Uuid::new_v4();
    info!(request_id = %request_id, bytes = req.logs.len(), "Received log analysis request");

    match data.log_analysis.summarize_errors(&req.logs).await {
        Ok(summary) => {
            info!(request_id = %request_id, "Log analysis completed successfully");
            HttpResponse::Ok().json(LogResponse { summary })
        }
        Err(e) => {
            error!(request_id = %request_id, "Error analyzing logs: {}", e);
            error_response(&e)
        }
    }
}

/// Reports "degraded" when any already-connected database fails a ping.
#[get("/health")]
async fn health(data: web::Data<HttpState>) -> impl Responder {
    let report = data.engines.health().await;
    let status = if report.values().all(|healthy| *healthy) {
        "ok"
    } else {
        "degraded"
    };
    let databases = report
        .into_iter()
        .map(|(db_type, healthy)| (db_type, if healthy { "ok" } else { "unavailable" }))
        .collect();

    HttpResponse::Ok().json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        databases,
    })
}

/// Malformed JSON bodies are answered with 422 and a `detail` message.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let detail = err.to_string();
        actix_web::error::InternalError::from_response(err, unprocessable(detail)).into()
    })
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .service(execute_query)
        .service(analyze_logs)
        .service(health);
}

pub fn start_server(state: HttpState, host: &str, port: u16) -> std::io::Result<Server> {
    let state = web::Data::new(state);

    let server = HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((host, port))?
    .run();

    info!("HTTP API listening on {}:{}", host, port);
    Ok(server)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::use_cases::sql_guard::{SqlGuard, SqlGuardRules};
    use crate::application::use_cases::test_support::ScriptedLlm;
    use crate::domain::llm_config::{LLMConfig, ModelsConfig};
    use actix_web::{http::StatusCode, test};
    use serde_json::{json, Value};
    use std::path::PathBuf;

    fn state(llm: Arc<ScriptedLlm>) -> web::Data<HttpState> {
        let models = ModelsConfig::default();
        let engines = Arc::new(DbEngineRegistry::default());
        web::Data::new(HttpState {
            database_query: Arc::new(DatabaseQueryUseCase::new(
                llm.clone(),
                engines.clone(),
                LLMConfig::default(),
                models.database_query,
                SqlGuard::from_rules(&SqlGuardRules::default()).unwrap(),
                PathBuf::from("does/not/exist.yaml"),
            )),
            log_analysis: Arc::new(LogAnalysisUseCase::new(
                llm,
                LLMConfig::default(),
                models.summarize_errors,
            )),
            engines,
        })
    }

    #[actix_web::test]
    async fn test_health() {
        let app = test::init_service(
            App::new()
                .app_data(state(Arc::new(ScriptedLlm::new())))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(body["databases"], json!({}));
    }

    #[actix_web::test]
    async fn test_analyze_logs_returns_summary() {
        let llm = Arc::new(ScriptedLlm::new().reply("Raise spark.executor.memory."));
        let app = test::init_service(App::new().app_data(state(llm)).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/analyze_logs/")
            .set_json(json!({"logs": "t - ERROR - java.lang.OutOfMemoryError"}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, json!({"summary": "Raise spark.executor.memory."}));
    }

    #[actix_web::test]
    async fn test_analyze_logs_without_errors() {
        let app = test::init_service(
            App::new()
                .app_data(state(Arc::new(ScriptedLlm::new())))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/analyze_logs/")
            .set_json(json!({"logs": "all fine"}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["summary"], "No critical errors found.");
    }

    #[actix_web::test]
    async fn test_analyze_logs_llm_failure_is_500() {
        // No scripted reply, so the summarizer call fails.
        let app = test::init_service(
            App::new()
                .app_data(state(Arc::new(ScriptedLlm::new())))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/analyze_logs/")
            .set_json(json!({"logs": "t - ERROR - boom"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["detail"], "no scripted reply left");
    }

    #[actix_web::test]
    async fn test_execute_query_unknown_database_is_500() {
        let app = test::init_service(
            App::new()
                .app_data(state(Arc::new(ScriptedLlm::new())))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/execute_query/")
            .set_json(json!({"db_type": "oracle", "question": "How many orders?"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["detail"], "Failed to connect to the database");
    }

    #[actix_web::test]
    async fn test_execute_query_missing_field_is_422() {
        let app = test::init_service(
            App::new()
                .app_data(state(Arc::new(ScriptedLlm::new())))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/execute_query/")
            .set_json(json!({"db_type": "postgres"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["detail"].as_str().unwrap().contains("question"));
    }

    #[actix_web::test]
    async fn test_execute_query_empty_question_is_422() {
        let app = test::init_service(
            App::new()
                .app_data(state(Arc::new(ScriptedLlm::new())))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/execute_query/")
            .set_json(json!({"db_type": "postgres", "question": ""}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}

//! Read-only HTTP surface: status, health and the debug flush trigger.

use actix_cors::Cors;
use actix_web::{
	middleware::Logger,
	web::{self, Data, Path},
	App, HttpResponse, HttpServer, Result as ActixResult,
};
use preranker_config::ApiConfig;
use preranker_core::Engine;
use preranker_monitoring::{HealthCheck, HealthCheckResult, HealthChecker};
use preranker_types::IntentId;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	pub engine: Arc<Engine>,
	pub health: Arc<HealthChecker>,
}

/// Health check over the engine's lifecycle state.
struct EngineRunningCheck {
	engine: Arc<Engine>,
}

#[async_trait::async_trait]
impl HealthCheck for EngineRunningCheck {
	async fn check(&self) -> HealthCheckResult {
		if self.engine.is_running().await {
			HealthCheckResult::healthy("engine running")
		} else {
			HealthCheckResult::unhealthy("engine not running")
		}
	}

	fn name(&self) -> &str {
		"engine"
	}
}

/// Starts the HTTP server for the operational endpoints.
pub async fn start_server(
	config: ApiConfig,
	engine: Arc<Engine>,
) -> Result<(), Box<dyn std::error::Error>> {
	let health = Arc::new(HealthChecker::new());
	health
		.register_check(Box::new(EngineRunningCheck {
			engine: engine.clone(),
		}))
		.await;

	let app_state = AppState { engine, health };
	let bind_address = format!("{}:{}", config.host, config.port);

	info!("Operational API server starting on {}", bind_address);

	let server = HttpServer::new(move || {
		App::new()
			.app_data(Data::new(app_state.clone()))
			.wrap(Logger::default())
			.wrap(Cors::default().allow_any_origin().allow_any_method().max_age(3600))
			.route("/status", web::get().to(handle_status))
			.route("/health", web::get().to(handle_health))
			.route("/debug/flush/{intent_id}", web::post().to(handle_flush))
	})
	.bind(&bind_address)?
	.run();

	server.await?;

	Ok(())
}

/// GET /status
async fn handle_status(app_state: Data<AppState>) -> ActixResult<HttpResponse> {
	let status = app_state.engine.status().await;
	Ok(HttpResponse::Ok().json(status))
}

/// GET /health
async fn handle_health(app_state: Data<AppState>) -> ActixResult<HttpResponse> {
	let overall = app_state.health.get_overall_health().await;
	if overall.is_healthy() {
		Ok(HttpResponse::Ok().json(json!({ "status": overall })))
	} else {
		Ok(HttpResponse::ServiceUnavailable().json(json!({ "status": overall })))
	}
}

/// POST /debug/flush/{intent_id}: operational intervention bypassing the
/// window timer. Runs under the same once-only guard as the timer path.
async fn handle_flush(
	app_state: Data<AppState>,
	path: Path<String>,
) -> ActixResult<HttpResponse> {
	let intent_id = IntentId(path.into_inner());
	info!(intent_id = %intent_id, "Debug flush requested over HTTP");

	app_state.engine.flush(&intent_id).await;

	Ok(HttpResponse::Accepted().json(json!({
		"intent_id": intent_id.as_str(),
		"flush": "triggered"
	})))
}

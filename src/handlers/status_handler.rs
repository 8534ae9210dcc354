// Read-only status endpoints: /health and /metrics
use crate::metrics::history::HistorySnapshot;
use crate::scaling::controller::ScalingController;
use crate::scaling::decision::Evaluation;
use crate::scaling::scaling_config::ConfigSummary;
use actix_web::{web, HttpResponse, Responder};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub current_replicas: u32,
    pub scaling_in_progress: bool,
    pub last_scale_action: Option<DateTime<Utc>>,
    pub config: ConfigSummary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsResponse {
    pub timestamp: DateTime<Utc>,
    pub current_replicas: u32,
    pub metrics: HistorySnapshot,
    pub last_evaluation: Option<Evaluation>,
    pub config: ConfigSummary,
}

pub async fn health(controller: web::Data<ScalingController>) -> impl Responder {
    let state = controller.state();
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now(),
        current_replicas: state.current_replicas(),
        scaling_in_progress: state.scaling_in_progress(),
        last_scale_action: state.last_scale_action(),
        config: controller.config().summary(),
    })
}

pub async fn metrics(controller: web::Data<ScalingController>) -> impl Responder {
    HttpResponse::Ok().json(MetricsResponse {
        timestamp: Utc::now(),
        current_replicas: controller.state().current_replicas(),
        metrics: controller.history().snapshot(),
        last_evaluation: controller.last_evaluation(),
        config: controller.config().summary(),
    })
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/health").route(web::get().to(health)))
        .service(web::resource("/metrics").route(web::get().to(metrics)));
}

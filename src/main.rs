// HTTP status server + scaling poll loop
use actix_web::{web, App, HttpServer};
use env_logger::Env;
use std::sync::Arc;

mod handlers;
mod metrics;
mod scaling;

use crate::handlers::status_handler;
use crate::metrics::collector::PrometheusCollector;
use crate::metrics::prometheus::PrometheusClient;
use crate::metrics::sample::MetricQueries;
use crate::scaling::container_runtime::{ContainerTemplate, DockerRuntime};
use crate::scaling::controller::ScalingController;
use crate::scaling::poller;
use crate::scaling::scaling_config::ScalingConfig;
use crate::scaling::scaling_error::ScalingError;

fn build_controller(config: ScalingConfig) -> Result<ScalingController, ScalingError> {
    let runtime = DockerRuntime::new(
        &config.docker_host,
        ContainerTemplate {
            image: config.container_image.clone(),
            network: config.docker_network.clone(),
        },
    )?;
    let collector = PrometheusCollector::new(
        PrometheusClient::new(&config.prometheus_url)?,
        MetricQueries::for_prefix(&config.container_prefix),
    );
    Ok(ScalingController::new(config, Arc::new(runtime), Arc::new(collector)))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let controller = ScalingConfig::from_env()
        .and_then(build_controller)
        .map(Arc::new)
        .map_err(|e| {
            log::error!("Autoscaler failed to start: {}", e);
            std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
        })?;

    let config = controller.config();
    log::info!(
        "Autoscaler starting: replicas {}..={}, up {}%, down {}%, cooldown {:?}, prometheus {}, docker {}",
        config.min_replicas,
        config.max_replicas,
        config.scale_up_threshold,
        config.scale_down_threshold,
        config.scale_cooldown,
        config.prometheus_url,
        config.docker_host
    );
    let port = config.port;
    let period = config.check_interval;

    // /health reports live replicas from the first request on
    let replicas = controller.sync_replicas().await;
    log::info!("Found {} running replicas at start-up", replicas);

    actix_web::rt::spawn(poller::run(controller.clone(), period));

    let data = web::Data::from(controller);
    HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .configure(status_handler::configure)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}

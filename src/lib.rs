use actix_cors::Cors;
use actix_web::middleware::Compress;
use actix_web::{http::header, web, App, HttpServer};
use actix_web_prometheus::PrometheusMetricsBuilder;
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

pub mod config;
pub mod db;
pub mod error;
pub mod report;
pub mod settings;

pub use crate::config::AppConfig;
pub use crate::db::AppState;
pub use crate::error::ReportError;

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_type: &str, message: &str) -> Self {
        Self {
            error: error_type.to_string(),
            message: message.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn not_found(message: &str) -> Self {
        Self::new("NotFound", message)
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new("BadRequest", message)
    }

    pub fn internal_error(message: &str) -> Self {
        Self::new("InternalServerError", message)
    }
}

/// Every application route: the `/api` scope plus the public `/file` endpoint.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .configure(report::handlers::config)
            .configure(settings::handlers::config),
    )
    .service(web::resource("/file").route(web::get().to(report::handlers::serve_file)));
}

fn cors(origins: &[String]) -> Cors {
    let cors = if origins.is_empty() {
        Cors::default().allow_any_origin()
    } else {
        origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
    };
    cors.allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allowed_headers(vec![header::AUTHORIZATION, header::ACCEPT, header::CONTENT_TYPE])
        .expose_headers(vec![header::CONTENT_DISPOSITION])
        .max_age(3600)
}

pub async fn run() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    #[derive(OpenApi)]
    #[openapi(
        paths(
            crate::report::handlers::unzip,
            crate::report::handlers::calculate,
            crate::report::handlers::list_reports,
            crate::report::handlers::view_report,
            crate::report::handlers::export_report,
            crate::report::handlers::download_report,
            crate::report::handlers::delete_report,
            crate::report::handlers::extra_export,
            crate::report::handlers::serve_file,
            crate::settings::handlers::save_province,
            crate::settings::handlers::save_national,
            crate::settings::handlers::get_province,
            crate::settings::handlers::get_national,
            crate::settings::handlers::list_roads,
            crate::settings::handlers::add_road
        ),
        components(
            schemas(
                report::models::UnzipResponse,
                report::models::CalculateRequest,
                report::models::CalculateResponse,
                report::models::MessageResponse,
                settings::models::ProvinceSetting,
                settings::models::NationalSetting,
                settings::models::Road,
                ErrorResponse,
            )
        ),
        tags(
            (name = "Report Pipeline", description = "Upload survey data and generate reports."),
            (name = "Report Catalog", description = "List, view, export and delete generated reports."),
            (name = "Settings", description = "Province and ministry targets, road names.")
        )
    )]
    struct ApiDoc;

    let config = AppConfig::from_env();
    let bind = (config.host.clone(), config.port);
    let cors_origins = config.cors_allowed_origins.clone();
    let max_upload = config.max_upload_bytes;

    let app_state = match AppState::new(config).await {
        Ok(state) => web::Data::new(state),
        Err(e) => {
            log::error!(
                "Failed to initialise application state. Check DATABASE_URL and the configured directories. Error: {:#}",
                e
            );
            std::process::exit(1);
        }
    };

    let prometheus = match PrometheusMetricsBuilder::new("road_report_server")
        .endpoint("/metrics")
        .build()
    {
        Ok(p) => p,
        Err(e) => {
            log::error!("Failed to create Prometheus metrics middleware: {}", e);
            std::process::exit(1);
        }
    };

    log::info!("Starting server at http://{}:{}", bind.0, bind.1);

    HttpServer::new(move || {
        App::new()
            .wrap(Compress::default())
            .wrap(prometheus.clone())
            .wrap(cors(&cors_origins))
            .app_data(app_state.clone())
            .app_data(web::JsonConfig::default().limit(4 * 1024 * 1024))
            .app_data(web::PayloadConfig::default().limit(max_upload))
            .configure(configure_routes)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
    })
    .backlog(8192)
    .max_connections(25000)
    .keep_alive(actix_web::http::KeepAlive::Os)
    .bind(bind)?
    .run()
    .await
}

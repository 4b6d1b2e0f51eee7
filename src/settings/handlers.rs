use actix_web::{web, HttpResponse, Responder, ResponseError};
use log::{error, info, warn};

use crate::report::models::MessageResponse;
use crate::settings::models::{NationalSetting, ProvinceSetting, Road};
use crate::settings::SettingsKind;
use crate::{AppState, ErrorResponse};

fn message(text: &str) -> HttpResponse {
    HttpResponse::Ok().json(MessageResponse {
        message: text.to_string(),
    })
}

#[utoipa::path(
    post,
    path = "/api/settings/province",
    tag = "Settings",
    request_body = ProvinceSetting,
    responses(
        (status = 200, description = "Province targets saved", body = MessageResponse),
        (status = 400, description = "Malformed body", body = ErrorResponse),
        (status = 500, description = "Store failure", body = ErrorResponse)
    )
)]
pub async fn save_province(
    state: web::Data<AppState>,
    item: web::Json<ProvinceSetting>,
) -> impl Responder {
    let setting = item.into_inner();
    let value = match serde_json::to_value(&setting) {
        Ok(v) => v,
        Err(e) => {
            return HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error(&e.to_string()))
        }
    };
    match state
        .settings
        .save(SettingsKind::Province, &setting.year.to_string(), value)
        .await
    {
        Ok(()) => {
            info!("Saved province settings for {}", setting.year);
            message("省厅指标保存成功")
        }
        Err(e) => {
            error!("Failed to save province settings {}: {}", setting.year, e);
            e.error_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/settings/national",
    tag = "Settings",
    request_body = NationalSetting,
    responses(
        (status = 200, description = "National targets saved", body = MessageResponse),
        (status = 400, description = "Malformed body", body = ErrorResponse),
        (status = 500, description = "Store failure", body = ErrorResponse)
    )
)]
pub async fn save_national(
    state: web::Data<AppState>,
    item: web::Json<NationalSetting>,
) -> impl Responder {
    let setting = item.into_inner();
    if setting.plan.trim().is_empty() {
        return HttpResponse::BadRequest().json(ErrorResponse::bad_request("plan is required"));
    }
    let value = match serde_json::to_value(&setting) {
        Ok(v) => v,
        Err(e) => {
            return HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error(&e.to_string()))
        }
    };
    match state
        .settings
        .save(SettingsKind::National, &setting.plan, value)
        .await
    {
        Ok(()) => {
            info!("Saved national settings for plan {}", setting.plan);
            message("交通部指标保存成功")
        }
        Err(e) => {
            error!("Failed to save national settings {}: {}", setting.plan, e);
            e.error_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/settings/province/{year}",
    tag = "Settings",
    params(("year" = String, Path, description = "Four digit year")),
    responses(
        (status = 200, description = "Province targets", body = ProvinceSetting),
        (status = 400, description = "Year is not a number", body = ErrorResponse),
        (status = 404, description = "No targets for that year", body = ErrorResponse)
    )
)]
pub async fn get_province(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let raw = path.into_inner();
    let year: i32 = match raw.trim().parse() {
        Ok(y) => y,
        Err(_) => {
            return HttpResponse::BadRequest()
                .json(ErrorResponse::bad_request(&format!("invalid year '{}'", raw)))
        }
    };

    match state
        .settings
        .get(SettingsKind::Province, &year.to_string())
        .await
    {
        Ok(Some(value)) => match serde_json::from_value::<ProvinceSetting>(value) {
            Ok(setting) => HttpResponse::Ok().json(setting),
            Err(e) => {
                error!("Stored province settings for {} are corrupt: {}", year, e);
                HttpResponse::InternalServerError()
                    .json(ErrorResponse::internal_error("stored settings are unreadable"))
            }
        },
        Ok(None) => HttpResponse::NotFound().json(ErrorResponse::not_found(&format!(
            "no province settings for {}",
            year
        ))),
        Err(e) => {
            error!("Failed to load province settings {}: {}", year, e);
            e.error_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/settings/national/{plan}",
    tag = "Settings",
    params(("plan" = String, Path, description = "Plan period name")),
    responses(
        (status = 200, description = "National targets", body = NationalSetting),
        (status = 404, description = "No targets for that plan", body = ErrorResponse)
    )
)]
pub async fn get_national(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let plan = path.into_inner();
    match state.settings.get(SettingsKind::National, &plan).await {
        Ok(Some(value)) => match serde_json::from_value::<NationalSetting>(value) {
            Ok(setting) => HttpResponse::Ok().json(setting),
            Err(e) => {
                error!("Stored national settings for {} are corrupt: {}", plan, e);
                HttpResponse::InternalServerError()
                    .json(ErrorResponse::internal_error("stored settings are unreadable"))
            }
        },
        Ok(None) => HttpResponse::NotFound().json(ErrorResponse::not_found(&format!(
            "no national settings for plan '{}'",
            plan
        ))),
        Err(e) => {
            error!("Failed to load national settings {}: {}", plan, e);
            e.error_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/road/list",
    tag = "Settings",
    responses(
        (status = 200, description = "Known road names", body = Vec<Road>)
    )
)]
pub async fn list_roads(state: web::Data<AppState>) -> impl Responder {
    match state.settings.roads().await {
        Ok(names) => HttpResponse::Ok().json(
            names
                .into_iter()
                .map(|name| Road { name })
                .collect::<Vec<_>>(),
        ),
        Err(e) => {
            error!("Failed to list roads: {}", e);
            e.error_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/road",
    tag = "Settings",
    request_body = Road,
    responses(
        (status = 200, description = "Road recorded", body = MessageResponse),
        (status = 400, description = "Empty name", body = ErrorResponse)
    )
)]
pub async fn add_road(state: web::Data<AppState>, item: web::Json<Road>) -> impl Responder {
    let name = item.name.trim();
    if name.is_empty() {
        return HttpResponse::BadRequest().json(ErrorResponse::bad_request("road name is required"));
    }
    match state.settings.add_road(name).await {
        Ok(true) => message(&format!("road {} added", name)),
        Ok(false) => {
            warn!("Road {} already exists", name);
            message(&format!("road {} already exists", name))
        }
        Err(e) => {
            error!("Failed to add road {}: {}", name, e);
            e.error_response()
        }
    }
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/settings/province").route(web::post().to(save_province)))
        .service(web::resource("/settings/national").route(web::post().to(save_national)))
        .service(web::resource("/settings/province/{year}").route(web::get().to(get_province)))
        .service(web::resource("/settings/national/{plan}").route(web::get().to(get_national)))
        .service(web::resource("/road/list").route(web::get().to(list_roads)))
        .service(web::resource("/road").route(web::post().to(add_road)));
}

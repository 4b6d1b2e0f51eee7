use actix_files::NamedFile;
use actix_multipart::Multipart;
use actix_web::http::header::{
    Charset, ContentDisposition, DispositionParam, DispositionType, ExtendedValue,
};
use actix_web::{web, HttpRequest, HttpResponse};
use log::{error, info};

use crate::error::ReportError;
use crate::report::catalog::ReportId;
use crate::report::calculation::CalculationParams;
use crate::report::models::{
    CalculateRequest, CalculateResponse, FileQuery, ListQuery, MessageResponse, UnzipResponse,
    WatermarkQuery,
};
use crate::report::report_type::{ReportFormat, ReportType};
use crate::report::upload;
use crate::{AppState, ErrorResponse};

/// `attachment` disposition carrying both a plain and an RFC 5987 UTF-8 filename.
pub fn attachment(filename: &str) -> ContentDisposition {
    ContentDisposition {
        disposition: DispositionType::Attachment,
        parameters: vec![
            DispositionParam::Filename(filename.to_string()),
            DispositionParam::FilenameExt(ExtendedValue {
                charset: Charset::Ext("UTF-8".to_string()),
                language_tag: None,
                value: filename.as_bytes().to_vec(),
            }),
        ],
    }
}

fn inline() -> ContentDisposition {
    ContentDisposition {
        disposition: DispositionType::Inline,
        parameters: vec![],
    }
}

async fn open_file(path: &std::path::Path) -> Result<NamedFile, ReportError> {
    NamedFile::open_async(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ReportError::NotFound(path.display().to_string())
        } else {
            ReportError::io("open", path, e)
        }
    })
}

#[utoipa::path(
    post,
    path = "/api/unzip",
    tag = "Report Pipeline",
    request_body(content_type = "multipart/form-data", description = "One or more survey files; .zip archives are extracted"),
    responses(
        (status = 200, description = "Input files stored", body = UnzipResponse),
        (status = 400, description = "Invalid upload or archive", body = ErrorResponse),
        (status = 500, description = "Filesystem failure", body = ErrorResponse)
    )
)]
pub async fn unzip(
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, ReportError> {
    info!("Executing unzip handler");
    let files = upload::ingest(
        payload,
        &state.config.upload_dir,
        state.config.max_upload_bytes,
    )
    .await?;
    let files: Vec<String> = files.iter().map(|p| p.display().to_string()).collect();
    info!("Upload produced {} input files", files.len());
    Ok(HttpResponse::Ok().json(UnzipResponse { files }))
}

#[utoipa::path(
    post,
    path = "/api/calculate/{format}",
    tag = "Report Pipeline",
    params(("format" = String, Path, description = "`docx` or `md`")),
    request_body = CalculateRequest,
    responses(
        (status = 200, description = "Report generated", body = CalculateResponse),
        (status = 400, description = "Unknown report type or format", body = ErrorResponse),
        (status = 502, description = "Computation failed", body = ErrorResponse),
        (status = 500, description = "Template or filesystem failure", body = ErrorResponse)
    )
)]
pub async fn calculate(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<CalculateRequest>,
) -> Result<HttpResponse, ReportError> {
    let format: ReportFormat = path.into_inner().parse()?;
    let request = body.into_inner();
    let report_type: ReportType = request.report_type.parse()?;
    let timestamp = request
        .timestamp
        .unwrap_or_else(|| chrono::Utc::now().timestamp());
    info!(
        "Generating {} report for {} at {} from {} files",
        format,
        report_type,
        timestamp,
        request.files.len()
    );

    let params = CalculationParams {
        pqi: request.pqi,
        mileage: request.mileage,
    };
    let result = state
        .calculator
        .compute(report_type, &request.files, params)
        .await?;

    let materializer = state.materializer.clone();
    let report = web::block(move || materializer.materialize(report_type, format, &result, timestamp))
        .await
        .map_err(|e| {
            error!("Materialization task failed: {}", e);
            ReportError::Task(e.to_string())
        })??;

    Ok(HttpResponse::Ok().json(CalculateResponse {
        message: format!("{} report generated", format),
        filename: report.filename,
    }))
}

#[utoipa::path(
    get,
    path = "/api/reports/list",
    tag = "Report Catalog",
    params(ListQuery),
    responses(
        (status = 200, description = "Report identifiers, newest first", body = Vec<String>),
        (status = 400, description = "Unknown format", body = ErrorResponse)
    )
)]
pub async fn list_reports(
    state: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, ReportError> {
    let format: ReportFormat = match query.format.as_deref() {
        Some(raw) if !raw.is_empty() => raw.parse()?,
        _ => state.catalog.default_format(),
    };
    let catalog = state.catalog.clone();
    let ids = web::block(move || catalog.list(format))
        .await
        .map_err(|e| ReportError::Task(e.to_string()))??;
    Ok(HttpResponse::Ok().json(ids))
}

#[utoipa::path(
    get,
    path = "/api/reports/view/{id}",
    tag = "Report Catalog",
    params(("id" = String, Path, description = "Report identifier, with or without `.md`")),
    responses(
        (status = 200, description = "Raw markdown body", content_type = "text/markdown"),
        (status = 404, description = "Report not found", body = ErrorResponse)
    )
)]
pub async fn view_report(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ReportError> {
    let id = ReportId::parse(&path.into_inner())?;
    let source = state.catalog.document_path(&id, ReportFormat::Markdown)?;
    let body = tokio::fs::read(&source).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ReportError::NotFound(format!("report file '{}.md'", id.as_str()))
        } else {
            error!("Failed to read report {:?}: {}", source, e);
            ReportError::io("read", &source, e)
        }
    })?;
    Ok(HttpResponse::Ok()
        .content_type(ReportFormat::Markdown.mime_type())
        .body(body))
}

#[utoipa::path(
    get,
    path = "/api/reports/export/{id}",
    tag = "Report Catalog",
    params(
        ("id" = String, Path, description = "Report identifier"),
        WatermarkQuery
    ),
    responses(
        (status = 200, description = "PDF document", content_type = "application/pdf"),
        (status = 400, description = "Invalid identifier", body = ErrorResponse),
        (status = 404, description = "Report not found", body = ErrorResponse),
        (status = 502, description = "Renderer failed", body = ErrorResponse)
    )
)]
pub async fn export_report(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<WatermarkQuery>,
) -> Result<HttpResponse, ReportError> {
    let raw_id = path.into_inner();
    info!("Exporting {} as PDF", raw_id);
    let exported = state
        .exporter
        .export(&raw_id, query.into_inner().into_spec())
        .await?;
    Ok(HttpResponse::Ok()
        .content_type("application/pdf")
        .insert_header(attachment(&exported.filename))
        .body(exported.bytes))
}

#[utoipa::path(
    get,
    path = "/api/reports/download/{id}",
    tag = "Report Catalog",
    params(("id" = String, Path, description = "Report identifier; `.docx`/`.md` picks the document")),
    responses(
        (status = 200, description = "Stored primary document"),
        (status = 404, description = "Report not found", body = ErrorResponse)
    )
)]
pub async fn download_report(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ReportError> {
    let id = ReportId::parse(&path.into_inner())?;
    let (file_path, format) = state.catalog.primary_document(&id)?;
    let filename = format!("{}.{}", id.as_str(), format.extension());
    let file = open_file(&file_path)
        .await?
        .set_content_type(format.mime_type().parse().unwrap_or(mime_guess::mime::APPLICATION_OCTET_STREAM))
        .set_content_disposition(attachment(&filename));
    Ok(file.into_response(&req))
}

#[utoipa::path(
    delete,
    path = "/api/reports/{id}",
    tag = "Report Catalog",
    params(("id" = String, Path, description = "Report identifier")),
    responses(
        (status = 200, description = "Report deleted (or already absent)", body = MessageResponse),
        (status = 400, description = "Invalid identifier", body = ErrorResponse)
    )
)]
pub async fn delete_report(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ReportError> {
    let raw = path.into_inner();
    let id = ReportId::parse(&raw)?;
    let catalog = state.catalog.clone();
    let target = id.clone();
    web::block(move || catalog.delete(&target))
        .await
        .map_err(|e| ReportError::Task(e.to_string()))??;
    Ok(HttpResponse::Ok().json(MessageResponse {
        message: format!("report {} deleted", id.as_str()),
    }))
}

#[utoipa::path(
    get,
    path = "/api/reports/extraExport/{id}",
    tag = "Report Catalog",
    params(("id" = String, Path, description = "Primary document file name")),
    responses(
        (status = 200, description = "Extra companion document"),
        (status = 400, description = "Report type has no extra document", body = ErrorResponse),
        (status = 404, description = "Extra document not found", body = ErrorResponse)
    )
)]
pub async fn extra_export(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ReportError> {
    let extra = state.catalog.resolve_extra(&path.into_inner())?;
    info!("Serving extra document {:?}", extra.path);
    let file = open_file(&extra.path)
        .await?
        .set_content_type(
            extra
                .format
                .mime_type()
                .parse()
                .unwrap_or(mime_guess::mime::APPLICATION_OCTET_STREAM),
        )
        .set_content_disposition(attachment(&extra.filename));
    Ok(file.into_response(&req))
}

#[utoipa::path(
    get,
    path = "/file",
    tag = "Report Catalog",
    params(FileQuery),
    responses(
        (status = 200, description = "Raw file from the report store"),
        (status = 400, description = "Path escapes the report store", body = ErrorResponse),
        (status = 404, description = "File not found", body = ErrorResponse)
    )
)]
pub async fn serve_file(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<FileQuery>,
) -> Result<HttpResponse, ReportError> {
    let path = state.catalog.resolve_file(&query.name)?;
    let file = open_file(&path).await?.set_content_disposition(inline());
    Ok(file.into_response(&req))
}

/// Pipeline routes mounted under `/api`.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/unzip").route(web::post().to(unzip)))
        .service(web::resource("/calculate/{format}").route(web::post().to(calculate)))
        .service(web::resource("/reports/list").route(web::get().to(list_reports)))
        .service(web::resource("/reports/view/{id}").route(web::get().to(view_report)))
        .service(web::resource("/reports/export/{id}").route(web::get().to(export_report)))
        .service(web::resource("/reports/download/{id}").route(web::get().to(download_report)))
        .service(web::resource("/reports/extraExport/{id}").route(web::get().to(extra_export)))
        .service(web::resource("/reports/{id}").route(web::delete().to(delete_report)));
}

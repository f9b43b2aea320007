//! Route handlers.

use super::error::ServerError;
use super::{flash, AppState};
use crate::detect::{self, ALLOWED_EXTENSIONS};
use crate::error::ConvertError;
use crate::orchestrator::{run_batch, UploadBatch};
use crate::progress::TracingProgressCallback;
use crate::registry::Tool;
use axum::extract::{Multipart, State};
use axum::http::header::{self, HeaderName};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Json;
use axum_extra::extract::SignedCookieJar;
use quick_xml::escape::escape;
use serde::Serialize;
use tracing::{debug, warn};

const INDEX_TEMPLATE: &str = include_str!("assets/index.html");

const X_FILES_CONVERTED: HeaderName = HeaderName::from_static("x-files-converted");
const X_FILES_SKIPPED: HeaderName = HeaderName::from_static("x-files-skipped");
const X_FILES_FAILED: HeaderName = HeaderName::from_static("x-files-failed");

/// `GET /`: the upload form, showing (and consuming) any pending notice.
pub async fn index(jar: SignedCookieJar) -> (SignedCookieJar, Html<String>) {
    let (jar, notice) = flash::take(jar);
    (jar, Html(render_index(notice.as_deref())))
}

fn render_index(notice: Option<&str>) -> String {
    let options: String = Tool::ALL
        .iter()
        .map(|tool| {
            format!(
                "    <option value=\"{}\">{}</option>\n",
                tool.id(),
                escape(tool.label())
            )
        })
        .collect();
    let notice = notice
        .map(|n| format!("<div class=\"toast\" role=\"status\">{}</div>", escape(n)))
        .unwrap_or_default();
    INDEX_TEMPLATE
        .replace("{{notice}}", &notice)
        .replace("{{options}}", options.trim_end())
        .replace("{{extensions}}", &ALLOWED_EXTENSIONS.join(", "))
}

/// `POST /convert`: multipart `files` (repeated) plus `tool`.
///
/// Responds with the single output or `results.zip` as an attachment. A
/// batch with nothing to return redirects to the form with a notice.
pub async fn convert(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    multipart: Multipart,
) -> Response {
    let batch = match read_batch(multipart, state.config.max_upload_bytes).await {
        Ok(batch) => batch,
        Err(e) => {
            warn!("Rejected upload: {}", e);
            return e.into_response();
        }
    };

    match run_batch(
        batch,
        &state.config.scratch_root,
        &state.ctx,
        &TracingProgressCallback,
    )
    .await
    {
        Ok(outcome) => {
            let summary = outcome.summary();
            let (filename, bytes) = outcome.package.into_parts();
            let headers = [
                (header::CONTENT_TYPE, content_type(&filename).to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{filename}\""),
                ),
                (X_FILES_CONVERTED, summary.converted.to_string()),
                (X_FILES_SKIPPED, summary.skipped.to_string()),
                (X_FILES_FAILED, summary.failed.to_string()),
            ];
            (headers, bytes).into_response()
        }
        Err(e @ ConvertError::EmptyBatch { .. }) => {
            debug!("Nothing to return: {}", e);
            (flash::set(jar, e.notice()), Redirect::to("/")).into_response()
        }
        Err(e) => {
            warn!("Batch aborted: {}", e);
            let jar = flash::set(jar, e.notice());
            (jar, ServerError::from(e)).into_response()
        }
    }
}

/// Collect the form fields. Parts without a filename are ignored, as a
/// browser sends one empty part when no file was picked.
async fn read_batch(mut multipart: Multipart, limit: usize) -> Result<UploadBatch, ServerError> {
    let upload_error = |e: axum::extract::multipart::MultipartError| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ServerError::UploadTooLarge(limit)
        } else {
            ServerError::InvalidUpload(e.body_text())
        }
    };

    let mut batch = UploadBatch::default();
    while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("tool") => batch.tool = field.text().await.map_err(upload_error)?,
            Some("files") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(upload_error)?;
                if filename.is_empty() {
                    continue;
                }
                batch.push(filename, bytes.to_vec());
            }
            other => debug!("Ignoring form field {:?}", other),
        }
    }
    Ok(batch)
}

fn content_type(filename: &str) -> &'static str {
    match detect::extension(filename).as_deref() {
        Some("zip") => "application/zip",
        Some("pdf") => "application/pdf",
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        Some("pptx") => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// `GET /health`
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

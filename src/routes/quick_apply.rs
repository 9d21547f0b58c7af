use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bytes::BytesMut;

use crate::dto::quick_apply_dto::{
    ApplicationReceipt, QuickApplyResponse, QuickApplySubmission, ResumeUpload,
};
use crate::error::{Error, Result};
use crate::AppState;

fn upload_error(err: MultipartError, limit: usize) -> Error {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Error::PayloadTooLarge { limit }
    } else {
        Error::Multipart(err)
    }
}

#[axum::debug_handler]
pub async fn quick_apply(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    tracing::info!(job_id = %job_id, "quick-apply request received");
    let policy = state.storage.policy();
    let mut submission = QuickApplySubmission::default();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| upload_error(e, policy.max_bytes))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "name" => submission.form.name = field.text().await?,
            "email" => submission.form.email = field.text().await?,
            "phone" => submission.form.phone = field.text().await?,
            "message" => submission.form.message = Some(field.text().await?),
            "resume" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let mut data = BytesMut::new();
                while let Some(chunk) = field
                    .chunk()
                    .await
                    .map_err(|e| upload_error(e, policy.max_bytes))?
                {
                    policy.check_size(data.len() + chunk.len())?;
                    data.extend_from_slice(&chunk);
                }
                submission.resume = Some(ResumeUpload {
                    filename,
                    bytes: data.freeze(),
                });
            }
            _ => {}
        }
    }

    let outcome = state.intake_service.submit(&job_id, submission).await?;
    let preview_url = outcome.preview_url().map(str::to_string);
    let application = outcome.application;

    Ok((
        StatusCode::CREATED,
        Json(QuickApplyResponse {
            success: true,
            application: ApplicationReceipt {
                id: application.id,
                job_id: application.job_id,
                status: application.status,
                resume_url: state.storage.public_url(&application.resume_ref),
                tracking_token: application.tracking_token,
                document_url: state.storage.public_url(&application.summary_ref),
            },
            track_url: outcome.track_url,
            preview_url,
        }),
    ))
}

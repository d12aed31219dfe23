//! Version information endpoint handler.

use crate::{models::VersionResponse, services::metrics::build_info};
use actix_web::{Result, web};
use paperclip::actix::api_v2_operation;

#[api_v2_operation(
    summary = "Version Information Endpoint",
    description = "Returns the current API version, commit hash, and build time.",
    tags("Version"),
    responses(
        (status = 200, description = "Successful response", body = VersionResponse)
    )
)]
pub async fn version() -> Result<web::Json<VersionResponse>> {
    let (version, commit, build_time) = build_info();

    Ok(web::Json(VersionResponse {
        version: version.to_string(),
        commit: commit.to_string(),
        build_time: build_time.to_string(),
    }))
}

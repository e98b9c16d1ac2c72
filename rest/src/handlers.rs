//! HTTP/JSON API (spec.md §6). Request parsing is routine — this module does
//! the minimum to get well-typed query params and bodies into the ledger.

use crate::{error::RestError, state::AppState};
use actix_web::{get, post, web, HttpResponse};
use common_lib::types::Resource;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Deserialize)]
pub struct AcquireParams {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub state: String,
    pub dest: String,
    pub owner: String,
    pub request_id: String,
}

#[post("/acquire")]
pub async fn acquire(state: web::Data<AppState>, params: web::Query<AcquireParams>) -> Result<HttpResponse, RestError> {
    let resource = state
        .ledger
        .acquire(&params.resource_type, &params.state, &params.dest, &params.owner, &params.request_id)
        .await?;
    Ok(HttpResponse::Ok().json(resource))
}

#[derive(Deserialize)]
pub struct AcquireByStateParams {
    pub state: String,
    pub dest: String,
    pub owner: String,
    pub names: String,
}

#[post("/acquirebystate")]
pub async fn acquire_by_state(
    state: web::Data<AppState>,
    params: web::Query<AcquireByStateParams>,
) -> Result<HttpResponse, RestError> {
    let names: Vec<String> = params
        .names
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if names.is_empty() {
        return Err(RestError::bad_request("names must be a non-empty comma-separated list"));
    }
    let resources: Vec<Resource> = state
        .ledger
        .acquire_by_state(&params.state, &params.dest, &params.owner, &names)
        .await?;
    Ok(HttpResponse::Ok().json(resources))
}

#[derive(Deserialize)]
pub struct ReleaseParams {
    pub name: String,
    pub dest: String,
    pub owner: String,
}

#[post("/release")]
pub async fn release(state: web::Data<AppState>, params: web::Query<ReleaseParams>) -> Result<HttpResponse, RestError> {
    state.ledger.release(&params.name, &params.dest, &params.owner).await?;
    Ok(HttpResponse::Ok().finish())
}

#[derive(Deserialize)]
pub struct UpdateParams {
    pub name: String,
    pub owner: String,
    pub state: String,
}

#[post("/update")]
pub async fn update(
    state: web::Data<AppState>,
    params: web::Query<UpdateParams>,
    body: web::Bytes,
) -> Result<HttpResponse, RestError> {
    let patch: HashMap<String, Option<String>> = if body.is_empty() {
        HashMap::new()
    } else {
        serde_json::from_slice(&body).map_err(|e| RestError::bad_request(format!("invalid userdata body: {}", e)))?
    };
    state.ledger.update(&params.name, &params.owner, &params.state, &patch).await?;
    Ok(HttpResponse::Ok().finish())
}

#[derive(Deserialize)]
pub struct ResetParams {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub state: String,
    pub expire: String,
    pub dest: String,
}

#[post("/reset")]
pub async fn reset(state: web::Data<AppState>, params: web::Query<ResetParams>) -> Result<HttpResponse, RestError> {
    let expire_std = humantime::parse_duration(&params.expire)
        .map_err(|e| RestError::bad_request(format!("invalid duration '{}': {}", params.expire, e)))?;
    let expire = chrono::Duration::from_std(expire_std)
        .map_err(|e| RestError::bad_request(format!("duration out of range: {}", e)))?;
    let reaped = state
        .ledger
        .reset(&params.resource_type, &params.state, expire, &params.dest)
        .await?;
    Ok(HttpResponse::Ok().json(reaped))
}

#[derive(Deserialize)]
pub struct MetricParams {
    #[serde(rename = "type")]
    pub resource_type: String,
}

#[get("/metric")]
pub async fn metric(state: web::Data<AppState>, params: web::Query<MetricParams>) -> HttpResponse {
    HttpResponse::Ok().json(state.ledger.metric(&params.resource_type))
}

#[get("/healthz")]
pub async fn healthz(state: web::Data<AppState>) -> HttpResponse {
    if state.is_hydrated() {
        HttpResponse::Ok().finish()
    } else {
        HttpResponse::ServiceUnavailable().finish()
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(acquire)
        .service(acquire_by_state)
        .service(release)
        .service(update)
        .service(reset)
        .service(metric)
        .service(healthz);
}

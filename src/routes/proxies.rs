mod types;

use actix_web::get;
use actix_web::{web, HttpRequest, HttpResponse, Responder};

use crate::auth::{authorize, AccessToken};
use crate::errors::ServiceError;
use crate::monitor::ProxyList;

use self::types::*;

#[get("")]
async fn get_proxies(
    rq: HttpRequest,
    access: web::Data<AccessToken>,
    proxies: web::Data<ProxyList>,
) -> Result<impl Responder, ServiceError> {
    authorize(&rq, &access)?;

    let snapshot = proxies.snapshot();

    Ok(HttpResponse::Ok().json(ProxyListing {
        count: snapshot.len(),
        proxies: snapshot.to_vec(),
    }))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(get_proxies);
}

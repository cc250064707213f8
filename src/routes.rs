mod proxies;

use actix_web::web;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/proxies").configure(proxies::config));
}

use std::io;

use actix_web::{middleware, web, App, HttpServer, ResponseError};

use tokio_util::sync::CancellationToken;

use download_proxy_monitor::auth::AccessToken;
use download_proxy_monitor::errors::ServiceError;
use download_proxy_monitor::{routes, AppSettings, AwcProbe, ProxyHealthMonitor};

#[actix_rt::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    #[cfg(feature = "error_reporting")]
    let _guard = sentry::init((
        std::env::var("SENTRY_DSN").ok(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    ));

    let settings = AppSettings::load().map_err(|e| {
        log::error!("{}", e);

        io::Error::new(io::ErrorKind::InvalidInput, e)
    })?;

    let token = CancellationToken::new();

    let monitor = ProxyHealthMonitor::new(
        settings.doujin.clone(),
        AwcProbe::from_settings(&settings),
    );
    let proxies = monitor.proxies();
    let monitor = monitor.spawn(token.clone());

    let access = AccessToken(settings.server.access_token.clone());

    // stops on SIGINT/SIGTERM
    HttpServer::new(move || {
        let app = App::new()
            .wrap(middleware::Logger::default())
            .app_data(web::Data::new(access.clone()))
            .app_data(web::Data::new(proxies.clone()))
            .configure(routes::config)
            .default_service(
                web::route().to(|| async { ServiceError::NotFound.error_response() }),
            );

        #[cfg(feature = "error_reporting")]
        let app = app.wrap(sentry_actix::Sentry::new());

        app
    })
    .bind(&settings.server.bind)?
    .run()
    .await?;

    token.cancel();

    if let Err(e) = monitor.await {
        log::error!("proxy monitor task failed: {}", e);
    }

    Ok(())
}

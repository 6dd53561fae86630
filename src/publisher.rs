use std::sync::{Arc, Mutex};

use actix_web::{
    App, HttpResponse, HttpServer, Responder, dev::ServerHandle, get,
    web::{self, Data},
};
use anyhow::{Context as _, Result};
use log::{error, info};
use tokio::task::JoinHandle;

use crate::{esp::EspData, measurement::StationData};

type LastData = Mutex<Option<StationData>>;

#[allow(async_fn_in_trait)]
pub trait Publisher {
    async fn start(&mut self) -> Result<()>;

    async fn stop(&mut self);

    fn publish(&mut self, data: &StationData);
}

/// Serves the last station snapshot at `/json` in the board's own format.
pub struct HttpPublisher {
    port: u16,
    last_data: Arc<LastData>,
    server: Option<(ServerHandle, JoinHandle<std::io::Result<()>>)>,
}

impl HttpPublisher {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            last_data: Arc::new(Mutex::new(None)),
            server: None,
        }
    }
}

#[get("/json")]
async fn station_json(last_data: web::Data<LastData>) -> impl Responder {
    let Ok(last_data) = last_data.lock() else {
        return HttpResponse::InternalServerError().body("station data lock poisoned");
    };

    match last_data.as_ref() {
        Some(data) => HttpResponse::Ok().json(EspData::from_station_data(data)),
        None => HttpResponse::ServiceUnavailable().finish(),
    }
}

impl Publisher for HttpPublisher {
    async fn start(&mut self) -> Result<()> {
        info!("starting sensor data HTTP publisher at http://0.0.0.0:{}/json", self.port);

        let last_data = Data::from(self.last_data.clone());
        let server = HttpServer::new(move || App::new().app_data(last_data.clone()).service(station_json))
            .workers(1)
            .disable_signals()
            .bind(("0.0.0.0", self.port))
            .with_context(|| format!("can't bind sensor data HTTP publisher to port {}", self.port))?
            .run();

        let handle = server.handle();
        self.server = Some((handle, tokio::spawn(server)));

        Ok(())
    }

    async fn stop(&mut self) {
        let Some((handle, task)) = self.server.take() else {
            return;
        };

        info!("stopping sensor data HTTP publisher...");
        handle.stop(true).await;
        match task.await {
            Ok(Ok(())) => info!("sensor data HTTP publisher stopped"),
            Ok(Err(e)) => error!("error while stopping sensor data HTTP server: {e}"),
            Err(e) => error!("sensor data HTTP server task failed: {e}"),
        }
    }

    fn publish(&mut self, data: &StationData) {
        match self.last_data.lock() {
            Ok(mut last_data) => *last_data = Some(data.clone()),
            Err(e) => *e.into_inner() = Some(data.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use actix_web::{http::StatusCode, test};
    use chrono::Utc;

    use super::*;
    use crate::measurement::Measurement;

    #[actix_web::test]
    async fn unavailable_until_first_publish() {
        let mut publisher = HttpPublisher::new(0);
        let app = test::init_service(
            App::new()
                .app_data(Data::from(publisher.last_data.clone()))
                .service(station_json),
        )
        .await;

        let response =
            test::call_service(&app, test::TestRequest::get().uri("/json").to_request()).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        publisher.publish(&StationData {
            version: "esp-0.1.0".to_owned(),
            token_id: "0123456789abcdef0123456789abcdef01234567".parse().unwrap(),
            uptime: Duration::from_secs(42 * 60),
            last_measurement: Measurement {
                humidity: Some(55.5),
                pm25: Some(7.25),
                ..Measurement::at(Utc::now())
            },
        });

        let body: serde_json::Value =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri("/json").to_request())
                .await;
        assert_eq!(body["System"]["Uptime"], 42);
        assert_eq!(body["System"]["Git Build"], "esp-0.1.0");
        assert_eq!(body["Sensors"][0]["TaskName"], "BME280");
        assert_eq!(body["Sensors"][0]["TaskValues"][0]["Name"], "Humidity");
        assert_eq!(body["Sensors"][0]["TaskValues"][0]["Value"], 55.5);
        assert_eq!(body["Sensors"][1]["TaskName"], "SDS011");
        assert_eq!(body["Sensors"][1]["TaskValues"][0]["Value"], 7.25);
    }
}

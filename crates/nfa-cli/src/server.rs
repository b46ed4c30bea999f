// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::api::ErrorResponse;
use crate::facade::{ApiRequest, ApiResponse, Facade, Method};
use anyhow::{Result, anyhow};
use std::io::Read;
use std::time::Instant;
use tiny_http::{Header, Request, Response, Server};
use tracing::{info, warn};

const CORS_HEADERS: [(&str, &str); 3] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", "GET, POST, DELETE, OPTIONS"),
    ("Access-Control-Allow-Headers", "Content-Type"),
];

pub fn bind(addr: &str) -> Result<Server> {
    Server::http(addr).map_err(|error| {
        anyhow!("bind HTTP facade on {addr}: {error} -- change [server].bind/port or stop the process using it")
    })
}

/// Answers requests one at a time; returns after `max_requests` when set.
pub fn serve(server: &Server, facade: &Facade<'_>, max_requests: Option<usize>) -> Result<usize> {
    info!(addr = %server.server_addr(), "HTTP facade listening");
    let mut handled = 0;
    if max_requests == Some(0) {
        return Ok(handled);
    }
    for mut request in server.incoming_requests() {
        let started = Instant::now();
        let method = request.method().to_string();
        let url = request.url().to_owned();

        let mut body = Vec::new();
        let response = match request.as_reader().read_to_end(&mut body) {
            Ok(_) => match ApiRequest::new(Method::parse(&method), &url, body) {
                Ok(api_request) => facade.handle(&api_request),
                Err(error) => ApiResponse::error(
                    400,
                    ErrorResponse::new("bad_request", format!("{error:#}")),
                ),
            },
            Err(error) => ApiResponse::error(
                400,
                ErrorResponse::new("bad_request", format!("read request body: {error}")),
            ),
        };

        let status = response.status;
        if let Err(error) = respond(request, response) {
            warn!(%method, %url, error = %format!("{error:#}"), "could not send response");
        }
        info!(
            %method,
            %url,
            status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "request handled"
        );

        handled += 1;
        if max_requests.is_some_and(|max| handled >= max) {
            break;
        }
    }
    Ok(handled)
}

fn respond(request: Request, response: ApiResponse) -> Result<()> {
    let mut headers = vec![header("Content-Type", response.content_type)?];
    for (field, value) in CORS_HEADERS {
        headers.push(header(field, value)?);
    }
    if let Some(file_name) = &response.attachment {
        headers.push(header(
            "Content-Disposition",
            &format!("attachment; filename=\"{file_name}\""),
        )?);
    }

    let mut reply = Response::from_data(response.body).with_status_code(response.status);
    for value in headers {
        reply = reply.with_header(value);
    }
    request
        .respond(reply)
        .map_err(|error| anyhow!("write response: {error}"))
}

fn header(field: &str, value: &str) -> Result<Header> {
    Header::from_bytes(field.as_bytes(), value.as_bytes())
        .map_err(|()| anyhow!("invalid response header {field}: {value:?}"))
}

#[cfg(test)]
mod tests {
    use super::{bind, serve};
    use crate::facade::Facade;
    use anyhow::{Result, anyhow};
    use nfa_testkit::{AppendingGenerator, MemoryHistory, TextRenderer, lorem_summary};
    use serde_json::{Value, json};
    use std::thread;

    #[test]
    fn serves_requests_with_cors_headers_until_the_limit() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let server = bind("127.0.0.1:0")?;
        let base = format!("http://{}", server.server_addr());
        let generator = AppendingGenerator::new();
        let history = MemoryHistory::new();
        let facade = Facade::new(
            &generator,
            Some(&TextRenderer),
            &history,
            temp.path().to_path_buf(),
        );

        let client = thread::spawn(move || -> Result<Vec<(u16, Value, Option<String>)>> {
            let http = reqwest::blocking::Client::new();
            let mut seen = Vec::new();

            let health = http.get(format!("{base}/api/health")).send()?;
            let cors = health
                .headers()
                .get("access-control-allow-origin")
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned);
            seen.push((health.status().as_u16(), health.json()?, cors));

            let generated = http
                .post(format!("{base}/api/generate-nfa"))
                .json(&json!({
                    "subject": "Chess Tournament Funding",
                    "summary": lorem_summary(60),
                    "nfaType": "advance",
                }))
                .send()?;
            seen.push((generated.status().as_u16(), generated.json()?, None));

            let preflight = http
                .request(reqwest::Method::OPTIONS, format!("{base}/api/edit-nfa"))
                .send()?;
            seen.push((preflight.status().as_u16(), Value::Null, None));
            Ok(seen)
        });

        let handled = serve(&server, &facade, Some(3))?;
        let seen = client
            .join()
            .map_err(|_| anyhow!("client thread panicked"))??;

        assert_eq!(handled, 3);
        assert_eq!(seen[0].0, 200);
        assert_eq!(seen[0].1["success"], json!(true));
        assert_eq!(seen[0].2.as_deref(), Some("*"));
        assert_eq!(seen[1].0, 200);
        assert_eq!(seen[1].1["fallback"], json!(false));
        assert!(
            seen[1].1["nfa_text"]
                .as_str()
                .is_some_and(|text| text.starts_with("Subject: Chess Tournament Funding"))
        );
        assert_eq!(seen[2].0, 204);
        Ok(())
    }

    #[test]
    fn zero_limit_returns_immediately() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let server = bind("127.0.0.1:0")?;
        let generator = AppendingGenerator::new();
        let history = MemoryHistory::new();
        let facade = Facade::new(&generator, None, &history, temp.path().to_path_buf());
        assert_eq!(serve(&server, &facade, Some(0))?, 0);
        Ok(())
    }

    #[test]
    fn busy_port_has_actionable_error() -> Result<()> {
        let server = bind("127.0.0.1:0")?;
        let addr = server.server_addr().to_string();
        let error = bind(&addr).err().expect("second bind should fail");
        assert!(error.to_string().contains("[server].bind/port"));
        Ok(())
    }
}

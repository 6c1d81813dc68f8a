use reqwest::{header, Body, Client, Method, RequestBuilder, Response};
use tracing::{debug, instrument};
use transfer_core::{HttpMethod, TransferDescriptor};

fn method(m: HttpMethod) -> Method {
    match m {
        HttpMethod::Get => Method::GET,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Post => Method::POST,
        HttpMethod::Patch => Method::PATCH,
    }
}

fn request(http: &Client, descriptor: &TransferDescriptor) -> RequestBuilder {
    descriptor
        .headers()
        .iter()
        .fold(
            http.request(method(descriptor.method()), descriptor.url()),
            |req, (name, value)| req.header(name.as_str(), value.as_str()),
        )
}

async fn check(resp: Response, context: &str) -> anyhow::Result<Response> {
    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("{} {}: {}", context, status, body);
    }
    Ok(resp)
}

/// Read from `source` and write into `destination`.
///
/// Binary bodies are streamed chunk by chunk and never held in memory as a
/// whole; text bodies are read as UTF-8 first.
#[instrument(skip_all, level = "debug", fields(source = source.url(), destination = destination.url()))]
pub async fn copy_between(
    http: &Client,
    source: &TransferDescriptor,
    destination: &TransferDescriptor,
) -> anyhow::Result<()> {
    let resp = request(http, source).send().await?;
    let resp = check(resp, "Source read failed").await?;

    let mut dest_req = request(http, destination);
    if destination.is_binary() {
        if let Some(len) = resp.content_length() {
            dest_req = dest_req.header(header::CONTENT_LENGTH, len);
        }
        dest_req = dest_req.body(Body::wrap_stream(resp.bytes_stream()));
    } else {
        dest_req = dest_req.body(resp.text().await?);
    }

    let written = dest_req.send().await?;
    check(written, "Destination write failed").await?;

    debug!("Copied {} -> {}", source.url(), destination.url());
    Ok(())
}

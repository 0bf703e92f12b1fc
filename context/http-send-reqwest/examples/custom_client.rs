use std::time::Duration;

use anyhow::Result;
use bytes::Bytes;
use reqsend_core::Context;
use reqsend_http_send_reqwest::ReqwestHttpSend;
use reqwest::Client;

#[tokio::main]
async fn main() -> Result<()> {
    // Storage calls can be slow on large bodies, keep the timeout generous.
    let client = Client::builder()
        .timeout(Duration::from_secs(60))
        .pool_max_idle_per_host(16)
        .build()?;

    let ctx = Context::new().with_http_send(ReqwestHttpSend::new(client));

    // The emulator answers anonymous requests for the service properties with an error
    // body, which is enough to see the round trip.
    let default_url = "http://127.0.0.1:10000/devstoreaccount1?restype=service&comp=properties";
    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| default_url.to_string());

    let req = http::Request::get(&url)
        .header("x-ms-version", "2016-05-31")
        .body(Bytes::new())?;

    match ctx.http_send(req).await {
        Ok(resp) => {
            println!("GET {url} -> {}", resp.status());
            for (name, value) in resp.headers() {
                println!("  {name}: {value:?}");
            }
            println!("{}", String::from_utf8_lossy(resp.body()));
        }
        Err(err) => {
            eprintln!("GET {url} failed: {err}");
            if err.is_transport() {
                eprintln!("is the storage emulator running?");
            }
        }
    }

    Ok(())
}

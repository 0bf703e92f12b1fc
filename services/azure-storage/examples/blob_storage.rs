use anyhow::Result;
use http::{Method, StatusCode};
use reqsend_azure_storage::{Client, Config, EMULATOR_ACCOUNT_NAME};
use reqsend_core::{Context, OsEnv};
use reqsend_http_send_reqwest::ReqwestHttpSend;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let ctx = Context::new()
        .with_http_send(ReqwestHttpSend::default())
        .with_env(OsEnv);

    // Without AZURE_STORAGE_ACCOUNT the storage emulator is used.
    let mut cfg = Config::new().from_env(&ctx);
    if cfg.account_name.is_none() {
        println!("AZURE_STORAGE_ACCOUNT is not set, talking to the storage emulator");
        cfg = cfg.with_account_name(EMULATOR_ACCOUNT_NAME);
    }

    let mut client = Client::from_config(ctx, &cfg)?;
    client.add_to_user_agent("blob-storage-example")?;
    let blob = client.blob_service();

    let container = "reqsend-example";
    let create = blob
        .request(Method::PUT, format!("/{container}"))
        .with_query("restype", "container");
    match blob.call(create, &[StatusCode::CREATED]).await {
        Ok(_) => println!("created container {container}"),
        Err(err) => match err.as_service_error() {
            Some(e) if e.code == "ContainerAlreadyExists" => {
                println!("container {container} already exists")
            }
            _ => return Err(err.into()),
        },
    }

    let upload = blob
        .request(Method::PUT, format!("/{container}/hello.txt"))
        .with_header("x-ms-blob-type", "BlockBlob")
        .with_header("Content-Type", "text/plain")
        .with_metadata("source", "example")
        .with_body("hello, storage");
    blob.call(upload, &[StatusCode::CREATED]).await?;
    println!("uploaded {container}/hello.txt");

    let download = blob.request(Method::GET, format!("/{container}/hello.txt"));
    let resp = blob.call(download, &[StatusCode::OK]).await?;
    println!(
        "downloaded {} bytes, source metadata: {}",
        resp.body.len(),
        resp.header("x-ms-meta-source")
    );

    let delete = blob
        .request(Method::DELETE, format!("/{container}"))
        .with_query("restype", "container");
    blob.call(delete, &[StatusCode::ACCEPTED]).await?;
    println!("deleted container {container}");

    Ok(())
}

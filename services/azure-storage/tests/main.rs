use std::env;

use anyhow::Result;
use http::{Method, StatusCode};
use log::warn;
use reqsend_azure_storage::{Client, Config};
use reqsend_core::{Context, OsEnv};
use reqsend_http_send_reqwest::ReqwestHttpSend;
use serde::Deserialize;

fn init_client() -> Option<Client> {
    let _ = env_logger::builder().is_test(true).try_init();
    let _ = dotenv::dotenv();

    if env::var("REQSEND_AZURE_STORAGE_TEST").unwrap_or_default() != "on" {
        return None;
    }

    let ctx = Context::new()
        .with_http_send(ReqwestHttpSend::default())
        .with_env(OsEnv);

    let cfg = Config::new()
        .with_account_name(
            env::var("REQSEND_AZURE_STORAGE_ACCOUNT_NAME")
                .expect("env REQSEND_AZURE_STORAGE_ACCOUNT_NAME must set"),
        )
        .with_account_key(
            env::var("REQSEND_AZURE_STORAGE_ACCOUNT_KEY")
                .expect("env REQSEND_AZURE_STORAGE_ACCOUNT_KEY must set"),
        )
        .from_env(&ctx);

    let client = Client::from_config(ctx, &cfg).expect("client must be built");
    Some(client)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EnumerationResults {
    #[serde(default)]
    containers: Containers,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Containers {
    #[serde(default)]
    container: Vec<Container>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Container {
    name: String,
}

fn container_name() -> String {
    format!("reqsend{}", chrono::Utc::now().timestamp_millis())
}

#[tokio::test]
async fn test_container_lifecycle() -> Result<()> {
    let Some(client) = init_client() else {
        warn!("REQSEND_AZURE_STORAGE_TEST is not set, skipped");
        return Ok(());
    };
    let blob = client.blob_service();
    let name = container_name();

    let create = blob
        .request(Method::PUT, format!("/{name}"))
        .with_query("restype", "container")
        .with_metadata("purpose", "reqsend");
    blob.call(create, &[StatusCode::CREATED]).await?;

    let list = blob
        .request(Method::GET, "/")
        .with_query("comp", "list")
        .with_query("prefix", &name);
    let listed: EnumerationResults = blob.call_xml(list, &[StatusCode::OK]).await?;
    assert_eq!(listed.containers.container.len(), 1);
    assert_eq!(listed.containers.container[0].name, name);

    let create_again = blob
        .request(Method::PUT, format!("/{name}"))
        .with_query("restype", "container");
    let err = blob
        .call(create_again, &[StatusCode::CREATED])
        .await
        .unwrap_err();
    let service_err = err.as_service_error().expect("must be a service error");
    assert_eq!(service_err.status_code, StatusCode::CONFLICT);
    assert_eq!(service_err.code, "ContainerAlreadyExists");
    assert!(!service_err.request_id.is_empty());

    let delete = blob
        .request(Method::DELETE, format!("/{name}"))
        .with_query("restype", "container");
    blob.call(delete, &[StatusCode::ACCEPTED]).await?;
    Ok(())
}

#[tokio::test]
async fn test_head_missing_blob() -> Result<()> {
    let Some(client) = init_client() else {
        warn!("REQSEND_AZURE_STORAGE_TEST is not set, skipped");
        return Ok(());
    };
    let blob = client.blob_service();

    let head = blob.request(Method::HEAD, format!("/{}/missing", container_name()));
    let err = blob.call(head, &[StatusCode::OK]).await.unwrap_err();

    let service_err = err.as_service_error().expect("must be a service error");
    assert_eq!(service_err.status_code, StatusCode::NOT_FOUND);
    assert_eq!(service_err.code, "404 Not Found");
    Ok(())
}

#[tokio::test]
async fn test_table_lifecycle() -> Result<()> {
    let Some(client) = init_client() else {
        warn!("REQSEND_AZURE_STORAGE_TEST is not set, skipped");
        return Ok(());
    };
    let table = client.table_service();
    let name = container_name();

    let create = table
        .request(Method::POST, "/Tables")
        .with_header("Content-Type", "application/json")
        .with_header("Accept", "application/json;odata=nometadata")
        .with_header("Prefer", "return-no-content")
        .with_body(format!(r#"{{"TableName":"{name}"}}"#));
    table.call(create, &[StatusCode::NO_CONTENT]).await?;

    let delete = table
        .request(Method::DELETE, format!("/Tables('{name}')"))
        .with_header("Accept", "application/json;odata=nometadata");
    table.call(delete, &[StatusCode::NO_CONTENT]).await?;
    Ok(())
}

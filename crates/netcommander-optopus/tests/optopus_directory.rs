//! Inventory lookups feeding a proxy call, end to end over mock servers.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use netcommander_core::{Credentials, DeviceDirectory};
use netcommander_optopus::OptopusDirectory;
use netcommander_proxy::ProxyClient;
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

fn load_fixture(name: &str) -> Value {
    let fixture_path = fixtures_dir().join(name);
    let content = fs::read_to_string(&fixture_path).unwrap_or_else(|e| {
        panic!(
            "Failed to read fixture at {}: {}",
            fixture_path.display(),
            e
        )
    });
    serde_json::from_str(&content).unwrap_or_else(|e| {
        panic!(
            "Failed to parse fixture at {}: {}",
            fixture_path.display(),
            e
        )
    })
}

async fn optopus_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/search"))
        .and(query_param("string", "ex2200 location:ma01 active:true"))
        .and(query_param("types", "network_node"))
        .respond_with(ResponseTemplate::new(200).set_body_json(load_fixture("search_results.json")))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn search_decodes_fixture() {
    let optopus = optopus_server().await;
    let directory = OptopusDirectory::new(optopus.uri()).unwrap();

    let devices = directory.search("ex2200 location:ma01").await.unwrap();
    assert_eq!(devices.names(), vec!["sw1.ma01", "sw2.ma01"]);

    let models = devices.fact_list("model").unwrap();
    assert_eq!(models, vec![&json!("ex2200-24t-4g"), &json!("ex2200-48t-4g")]);
}

#[tokio::test]
async fn search_results_drive_a_proxy_call() {
    let optopus = optopus_server().await;
    let proxy = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/netconf"))
        .and(body_partial_json(json!({
            "nodes": [
                {"hostname": "sw1.ma01", "facts": {"location": "ma01"}},
                {"hostname": "sw2.ma01", "facts": {"location": "ma01"}}
            ],
            "request": "<rpc><get-chassis-inventory/></rpc>"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string(concat!(
            r#"{"Hostname":"sw1.ma01","Success":true,"Output":"<output><chassis-inventory><chassis><serial-number>GP0211AB1234</serial-number></chassis></chassis-inventory></output>"}"#,
            "\n",
            r#"{"Hostname":"sw2.ma01","Success":false,"Output":"authentication failed"}"#,
            "\n"
        )))
        .expect(1)
        .mount(&proxy)
        .await;

    let directory: Arc<dyn DeviceDirectory> =
        Arc::new(OptopusDirectory::new(optopus.uri()).unwrap());
    let client = ProxyClient::builder(format!("{}/v2", proxy.uri()))
        .unwrap()
        .with_credentials(Credentials::new("netops", "secret"))
        .with_directory(directory)
        .build()
        .unwrap();

    let devices = client.search("ex2200 location:ma01").await.unwrap();
    let (replies, failures) = client
        .run_rpc("<get-chassis-inventory/>", &devices)
        .await
        .unwrap()
        .collect_all()
        .await
        .unwrap();

    assert_eq!(replies.len(), 1);
    assert_eq!(
        replies[0]
            .output
            .find_path("chassis/serial-number")
            .map(|e| e.text()),
        Some("GP0211AB1234".to_string())
    );
    assert_eq!(failures.len(), 1);
    assert_eq!(client.last_errors()[0].hostname, "sw2.ma01");
}

//! Full runs against a fake Nautobot and a fake RESTCONF device served over HTTP.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::Router;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use ipsync::approval::ForceApproval;
use ipsync::config::{DeviceConfig, InventoryConfig};
use ipsync::device::{DeviceClient, RestconfDevice};
use ipsync::inventory::NautobotInventory;
use ipsync::reconcile::Reconciler;
use ipsync::report::CsvReport;
use ipsync::types::{OutcomeKind, ReconciliationOutcome};
use ipsync::validate::Validator;

#[derive(Debug, Clone)]
struct Recorded {
    method: Method,
    path: String,
    authorization: Option<String>,
    body: String,
}

struct Fake {
    /// (interface name, inventory type, address)
    inventory_interfaces: Vec<(&'static str, &'static str, &'static str)>,
    device_interfaces: Value,
    slow_device: bool,
    requests: Mutex<Vec<Recorded>>,
    base: Mutex<String>,
}

impl Fake {
    fn new(
        inventory_interfaces: Vec<(&'static str, &'static str, &'static str)>,
        device_interfaces: Value,
    ) -> Self {
        Self {
            inventory_interfaces,
            device_interfaces,
            slow_device: false,
            requests: Mutex::new(Vec::new()),
            base: Mutex::new(String::new()),
        }
    }

    fn requests(&self, method: Method) -> Vec<Recorded> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method)
            .cloned()
            .collect()
    }
}

async fn handle(
    State(fake): State<Arc<Fake>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, String) {
    let path = uri.path().to_string();
    let query = uri.query().unwrap_or_default().to_string();
    fake.requests.lock().unwrap().push(Recorded {
        method: method.clone(),
        path: path.clone(),
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body,
    });

    if path.starts_with("/api/") {
        let base = fake.base.lock().unwrap().clone();
        let page = match path.as_str() {
            // two pages to exercise `next`
            "/api/dcim/devices/" if query.is_empty() => json!({
                "count": 1,
                "next": format!("{}/api/dcim/devices/?limit=1&offset=1", base),
                "results": [{
                    "id": "dev-1",
                    "name": "rtr-01",
                    "device_type": { "display": "CSR1000v" },
                    "role": { "display": "router" }
                }]
            }),
            "/api/dcim/devices/" => json!({ "count": 1, "next": null, "results": [] }),
            "/api/dcim/interfaces/" => json!({
                "next": null,
                "results": fake.inventory_interfaces.iter().enumerate().map(|(i, (name, kind, _))| json!({
                    "id": format!("if-{}", i),
                    "name": name,
                    "type": { "value": kind }
                })).collect::<Vec<_>>()
            }),
            "/api/ipam/ip-addresses/" => {
                let index: usize = query
                    .trim_start_matches("interface_id=if-")
                    .parse()
                    .unwrap_or(usize::MAX);
                let results = fake
                    .inventory_interfaces
                    .get(index)
                    .map(|(_, _, address)| vec![json!({ "address": address })])
                    .unwrap_or_default();
                json!({ "next": null, "results": results })
            }
            _ => return (StatusCode::NOT_FOUND, String::new()),
        };
        return (StatusCode::OK, page.to_string());
    }

    let collection = "/restconf/data/ietf-interfaces:interfaces";
    match method {
        Method::GET if path == collection => {
            if fake.slow_device {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            (StatusCode::OK, fake.device_interfaces.to_string())
        }
        Method::POST if path == collection => (StatusCode::CREATED, String::new()),
        Method::PUT if path.starts_with(collection) => (StatusCode::NO_CONTENT, String::new()),
        _ => (StatusCode::NOT_FOUND, String::new()),
    }
}

async fn serve(fake: Arc<Fake>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    *fake.base.lock().unwrap() = format!("http://{}", addr);

    let app = Router::new().fallback(handle).with_state(fake);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn run(fake: Arc<Fake>, timeout: Duration) -> (Vec<ReconciliationOutcome>, String) {
    let addr = serve(fake).await;

    let inventory = NautobotInventory::new(
        &InventoryConfig {
            url: format!("http://{}/api/", addr),
            token: "t0ken".into(),
        },
        timeout,
    )
    .unwrap();
    let device: Arc<dyn DeviceClient> = Arc::new(
        RestconfDevice::new(
            &DeviceConfig {
                url: format!("http://{}/restconf/data/", addr),
                username: "admin".into(),
                password: "secret".into(),
                ..Default::default()
            },
            timeout,
        )
        .unwrap(),
    );

    let mut outcomes: Vec<ReconciliationOutcome> = Vec::new();
    let mut reconciler = Reconciler::new(Validator::default(), device, Box::new(ForceApproval));
    reconciler.run(&inventory, &mut outcomes).await.unwrap();

    let mut report = CsvReport::new(Vec::new()).unwrap();
    ipsync::reconcile::OutcomeSink::record(&mut report, &outcomes).unwrap();
    let csv = String::from_utf8(report.into_inner()).unwrap();
    (outcomes, csv)
}

fn device_with_management_only() -> Value {
    json!({
        "ietf-interfaces:interfaces": {
            "interface": [{
                "name": "GigabitEthernet0/0/1",
                "description": "uplink",
                "type": "iana-if-type:ethernetCsmacd",
                "ietf-ip:ipv4": { "address": [{ "ip": "10.10.20.48", "netmask": "255.255.255.0" }] }
            }]
        }
    })
}

#[tokio::test]
async fn missing_interface_is_created_with_fixed_mask() {
    let fake = Arc::new(Fake::new(
        vec![("Loopback10", "virtual", "192.0.2.5/24")],
        device_with_management_only(),
    ));

    let (outcomes, csv) = run(fake.clone(), Duration::from_secs(5)).await;

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].actions(), "Interface and IP address are added!");
    let rows: Vec<_> = csv.lines().collect();
    assert_eq!(rows.len(), 2);
    assert!(rows[1].starts_with("rtr-01,router,Loopback10,virtual,192.0.2.5/24,"));

    let posts = fake.requests(Method::POST);
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].path, "/restconf/data/ietf-interfaces:interfaces");
    assert!(posts[0]
        .authorization
        .as_deref()
        .is_some_and(|a| a.starts_with("Basic ")));

    let body: Value = serde_json::from_str(&posts[0].body).unwrap();
    let iface = &body["ietf-interfaces:interface"];
    assert_eq!(iface["name"], "Loopback10");
    assert_eq!(iface["type"], "iana-if-type:softwareLoopback");
    assert_eq!(iface["ietf-ip:ipv4"]["address"][0]["ip"], "192.0.2.5");
    assert_eq!(iface["ietf-ip:ipv4"]["address"][0]["netmask"], "255.255.255.0");

    let inventory_gets: Vec<_> = fake
        .requests(Method::GET)
        .into_iter()
        .filter(|r| r.path.starts_with("/api/"))
        .collect();
    // two device pages, one interface list, one address list
    assert_eq!(inventory_gets.len(), 4);
    assert!(inventory_gets
        .iter()
        .all(|r| r.authorization.as_deref() == Some("Token t0ken")));
}

#[tokio::test]
async fn changed_address_is_replaced_at_encoded_path() {
    let fake = Arc::new(Fake::new(
        vec![("GigabitEthernet0/0/1", "1000base-t", "10.10.20.50/24")],
        device_with_management_only(),
    ));

    let (outcomes, _) = run(fake.clone(), Duration::from_secs(5)).await;

    assert_eq!(outcomes[0].observed, "10.10.20.48");
    assert_eq!(outcomes[0].actions(), "IP address is edited!");
    let puts = fake.requests(Method::PUT);
    assert_eq!(puts.len(), 1);
    assert_eq!(
        puts[0].path,
        "/restconf/data/ietf-interfaces:interfaces/interface=GigabitEthernet0%2F0%2F1"
    );
}

#[tokio::test]
async fn matching_address_touches_nothing() {
    let fake = Arc::new(Fake::new(
        vec![("GigabitEthernet0/0/1", "1000base-t", "10.10.20.48/24")],
        device_with_management_only(),
    ));

    let (outcomes, _) = run(fake.clone(), Duration::from_secs(5)).await;

    assert_eq!(outcomes[0].kind, OutcomeKind::InSync);
    assert!(fake.requests(Method::PUT).is_empty());
    assert!(fake.requests(Method::POST).is_empty());
}

#[tokio::test]
async fn hung_device_is_recorded_as_unreachable() {
    let mut fake = Fake::new(
        vec![("Loopback10", "virtual", "192.0.2.5/24")],
        device_with_management_only(),
    );
    fake.slow_device = true;
    let fake = Arc::new(fake);

    let (outcomes, _) = run(fake.clone(), Duration::from_millis(300)).await;

    assert_eq!(outcomes.len(), 1);
    assert!(matches!(
        &outcomes[0].kind,
        OutcomeKind::Failed { action: None, reason } if reason.contains("timed out")
    ));
    assert!(fake.requests(Method::POST).is_empty());
}

//! In-process hub bound to an ephemeral port, for end-to-end tests.

use crate::health::HealthTracker;
use crate::http::build_router;
use crate::hub::SyncHub;
use crate::ports::{BusinessProcessRecord, FileTimelineStore, KpiRecord, TimelineCatalog};
use crate::state::AppState;
use crate::store::EnvironmentStore;
use bpdash_devkit::TimelineBuilder;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::net::TcpListener;

const PROD_YAML: &str = "\
web01:
  http:
    check_state: 2
    check_output: connection refused
  ssh:
    check_state: 0
db01:
  pgsql:
    check_state: 1
    downtime: true
";

pub struct TestServer {
    pub addr: SocketAddr,
    pub app: AppState,
    /// Start of the fixture timelines, two hours before the server started.
    pub timeline_origin: OffsetDateTime,
    _dir: tempfile::TempDir,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::with_capacity(64).await
    }

    pub async fn with_capacity(capacity: usize) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let envs = dir.path().join("environments");
        std::fs::create_dir_all(&envs).unwrap();
        std::fs::write(envs.join("prod.yaml"), PROD_YAML).unwrap();

        let timeline_origin =
            OffsetDateTime::from_unix_timestamp(OffsetDateTime::now_utc().unix_timestamp() - 7200).unwrap();
        let timelines = dir.path().join("timelines.json");
        std::fs::write(&timelines, serde_json::to_string(&catalog(timeline_origin)).unwrap()).unwrap();

        let store = EnvironmentStore::load_dir(&envs, ".yaml").unwrap();
        let app = AppState {
            hub: SyncHub::new(store, capacity, HealthTracker::new()),
            timelines: Arc::new(FileTimelineStore::new(timelines).unwrap()),
        };

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = build_router(app.clone());
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            addr,
            app,
            timeline_origin,
            _dir: dir,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Waits until `n` viewers are subscribed to the hub.
    pub async fn wait_for_viewers(&self, n: usize) {
        for _ in 0..200 {
            if self.app.hub.health_tracker().viewers() == n {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("expected {n} viewers, have {}", self.app.hub.health_tracker().viewers());
    }
}

fn catalog(origin: OffsetDateTime) -> TimelineCatalog {
    let mut kpis = BTreeMap::new();
    kpis.insert(
        "db".to_string(),
        KpiRecord {
            name: "Database".into(),
            frames: TimelineBuilder::starting_at(origin).ok(50).nok(10).build(),
        },
    );
    let mut catalog = TimelineCatalog::new();
    catalog.insert(
        "shop".to_string(),
        BusinessProcessRecord {
            name: "Web shop".into(),
            frames: TimelineBuilder::starting_at(origin).ok(45).nok(15).build(),
            kpis,
        },
    );
    catalog
}

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Form, Path};
use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::client::{AssetApi, AssetClient, ClientError, ClientOptions, LoginResponse};
use crate::filter::{filter_assets, unique_agencies, unique_districts, FilterCriteria};
use crate::model::{Asset, AssetField, AssetKind};
use crate::session::{MemorySessionStore, Session, SessionStore};
use crate::sort::{sort_assets, SortConfig, SortDirection};
use crate::state::{Coordinator, Event, Phase};

fn asset(id: &str, kind: &str, agency: &str, district: &str, address: &str, created: &str) -> Asset {
    Asset {
        id: id.to_string(),
        asset_type: kind.to_string(),
        management_agency: agency.to_string(),
        administrative_district: district.to_string(),
        section: format!("{district} sec. 1"),
        address: address.to_string(),
        target_name: format!("lot {id}"),
        created_at: created.to_string(),
        ..Default::default()
    }
}

fn fixture() -> Vec<Asset> {
    vec![
        asset("1", "建物", "Water Bureau", "Da-an", "123 Taipei Road", "2023-06-01T08:00:00"),
        asset("2", "土地", "Parks Dept", "Xinyi", "9 Hill St", "2023-01-01T08:00:00"),
        asset("3", "土地", "Water Bureau", "Xinyi", "3 River Rd", "2023-03-15T08:00:00"),
        asset("4", "建物/土地", "Tax Office", "Beitou", "22 Spring Ln", "2022-11-30"),
    ]
}

fn ids(assets: &[Asset]) -> Vec<&str> {
    assets.iter().map(|a| a.id.as_str()).collect()
}

#[test]
fn default_criteria_keep_the_whole_list() {
    let assets = fixture();
    assert_eq!(filter_assets(&assets, &FilterCriteria::default()), assets);
}

#[test]
fn full_selections_keep_the_whole_list() {
    let assets = fixture();
    let criteria = FilterCriteria {
        search_text: String::new(),
        selected_types: BTreeSet::from([AssetKind::Building, AssetKind::Land]),
        type_include: true,
        selected_agencies: unique_agencies(&assets).into_iter().collect(),
        agency_include: true,
        selected_districts: unique_districts(&assets).into_iter().collect(),
        district_include: true,
    };
    assert_eq!(criteria.selected_agencies.len(), 3);
    assert_eq!(criteria.selected_districts.len(), 3);
    assert_eq!(filter_assets(&assets, &criteria), assets);
}

#[test]
fn filtered_list_is_ordered_subset() {
    let assets = fixture();
    let criteria = FilterCriteria {
        search_text: "xinyi".to_string(),
        ..Default::default()
    };
    let out = filter_assets(&assets, &criteria);
    assert_eq!(ids(&out), vec!["2", "3"]);
}

#[test]
fn exclude_with_no_types_selected_keeps_everything() {
    let assets = fixture();
    let criteria = FilterCriteria {
        selected_types: BTreeSet::new(),
        type_include: false,
        ..Default::default()
    };
    assert_eq!(filter_assets(&assets, &criteria).len(), assets.len());
}

#[test]
fn exclude_with_no_agencies_selected_keeps_nothing() {
    let criteria = FilterCriteria {
        agency_include: false,
        ..Default::default()
    };
    assert!(filter_assets(&fixture(), &criteria).is_empty());
}

#[test]
fn exclude_with_no_districts_selected_keeps_nothing() {
    let criteria = FilterCriteria {
        district_include: false,
        ..Default::default()
    };
    assert!(filter_assets(&fixture(), &criteria).is_empty());
}

#[test]
fn selecting_one_agency_keeps_only_its_assets() {
    let assets = fixture()[..3].to_vec();
    let criteria = FilterCriteria {
        selected_agencies: BTreeSet::from(["Water Bureau".to_string()]),
        ..Default::default()
    };
    let out = filter_assets(&assets, &criteria);
    assert_eq!(ids(&out), vec!["1", "3"]);
}

#[test]
fn search_is_case_insensitive() {
    let criteria = FilterCriteria {
        search_text: "TAIPEI".to_string(),
        ..Default::default()
    };
    let out = filter_assets(&fixture(), &criteria);
    assert_eq!(ids(&out), vec!["1"]);
}

#[test]
fn mixed_type_asset_matches_either_kind() {
    let mut criteria = FilterCriteria::default();
    criteria.toggle_type(AssetKind::Land);
    let out = filter_assets(&fixture(), &criteria);
    assert_eq!(ids(&out), vec!["1", "4"]);
}

#[test]
fn created_sort_orders_by_instant() {
    let assets = vec![
        asset("a", "土地", "", "", "", "2023-06-01"),
        asset("b", "土地", "", "", "", "2023-01-01"),
    ];
    let asc = sort_assets(&assets, &SortConfig::new(AssetField::Created, SortDirection::Asc));
    assert_eq!(ids(&asc), vec!["b", "a"]);
    let desc = sort_assets(&assets, &SortConfig::new(AssetField::Created, SortDirection::Desc));
    assert_eq!(ids(&desc), vec!["a", "b"]);
}

#[test]
fn sort_without_key_keeps_input_order() {
    let assets = fixture();
    assert_eq!(sort_assets(&assets, &SortConfig::default()), assets);
}

#[test]
fn sorting_twice_is_stable() {
    let config = SortConfig::new(AssetField::Agency, SortDirection::Asc);
    let once = sort_assets(&fixture(), &config);
    let twice = sort_assets(&once, &config);
    assert_eq!(once, twice);
    assert_eq!(ids(&once), vec!["2", "4", "1", "3"]);
}

#[test]
fn header_clicks_cycle_direction() {
    let mut state = crate::state::reduce(
        Default::default(),
        Event::Mounted { has_session: true },
    );
    let generation = state.pending_fetch().unwrap();
    state = crate::state::reduce(
        state,
        Event::FetchSucceeded {
            generation,
            assets: fixture(),
        },
    );

    state = crate::state::reduce(state, Event::SortRequested(AssetField::Created));
    assert_eq!(ids(&state.visible), vec!["4", "2", "3", "1"]);
    state = crate::state::reduce(state, Event::SortRequested(AssetField::Created));
    assert_eq!(state.sort.direction, SortDirection::Desc);
    assert_eq!(ids(&state.visible), vec!["1", "3", "2", "4"]);
    state = crate::state::reduce(state, Event::SortRequested(AssetField::District));
    assert_eq!(state.sort.key, Some(AssetField::District));
    assert_eq!(state.sort.direction, SortDirection::Asc);
}

#[derive(Default)]
struct FakeApi {
    assets: Mutex<Vec<Asset>>,
    fetches: AtomicUsize,
    fail_fetch: bool,
    hang_fetch: bool,
    updated: Mutex<Vec<Asset>>,
}

impl FakeApi {
    fn with_assets(assets: Vec<Asset>) -> Self {
        Self {
            assets: Mutex::new(assets),
            ..Default::default()
        }
    }
}

#[async_trait]
impl AssetApi for FakeApi {
    async fn login(&self, _username: &str, _password: &str) -> Result<LoginResponse, ClientError> {
        Ok(LoginResponse {
            access_token: "tok".to_string(),
            user: Value::Null,
        })
    }

    async fn fetch_assets(&self, _token: &str) -> Result<Vec<Asset>, ClientError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.hang_fetch {
            std::future::pending::<()>().await;
        }
        if self.fail_fetch {
            return Err(ClientError::FetchFailed {
                message: "HTTP 500".to_string(),
            });
        }
        Ok(self.assets.lock().unwrap().clone())
    }

    async fn update_asset(&self, _token: &str, asset: &Asset) -> Result<(), ClientError> {
        self.updated.lock().unwrap().push(asset.clone());
        let mut assets = self.assets.lock().unwrap();
        if let Some(slot) = assets.iter_mut().find(|a| a.id == asset.id) {
            *slot = asset.clone();
        }
        Ok(())
    }

    async fn create_asset(&self, _token: &str, _asset: &Asset) -> Result<(), ClientError> {
        Ok(())
    }
}

fn logged_in() -> MemorySessionStore {
    MemorySessionStore::with_session(Session {
        token: "tok".to_string(),
        user: json!({"username": "clerk"}),
    })
}

#[tokio::test]
async fn mount_without_token_redirects_and_skips_fetch() {
    let api = FakeApi::with_assets(fixture());
    let store = MemorySessionStore::default();
    let mut coordinator = Coordinator::new(&api, &store);
    coordinator.mount().await;
    assert_eq!(coordinator.state().phase, Phase::RedirectToLogin);
    assert_eq!(api.fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn mount_loads_the_list() {
    let api = FakeApi::with_assets(fixture());
    let store = logged_in();
    let mut coordinator = Coordinator::new(&api, &store);
    coordinator.mount().await;
    let state = coordinator.state();
    assert_eq!(state.phase, Phase::Ready);
    assert_eq!(state.visible.len(), 4);
    assert_eq!(state.agencies(), vec!["Water Bureau", "Parks Dept", "Tax Office"]);
}

#[tokio::test]
async fn failed_fetch_leaves_an_empty_list() {
    let api = FakeApi {
        fail_fetch: true,
        ..FakeApi::with_assets(fixture())
    };
    let store = logged_in();
    let mut coordinator = Coordinator::new(&api, &store);
    coordinator.mount().await;
    let state = coordinator.state();
    assert_eq!(state.phase, Phase::Failed);
    assert!(!state.is_loading());
    assert!(state.visible.is_empty());
    assert!(state.error.as_deref().unwrap_or_default().contains("HTTP 500"));
}

#[tokio::test]
async fn saving_an_edit_reloads_the_list() {
    let api = FakeApi::with_assets(fixture());
    let store = logged_in();
    let mut coordinator = Coordinator::new(&api, &store);
    coordinator.mount().await;
    coordinator.dispatch(Event::RowSelected("2".to_string()));
    assert_eq!(coordinator.state().phase, Phase::Detail);

    let mut edited = coordinator.state().selected.clone().unwrap();
    edited.address = "5 River Rd".to_string();
    coordinator.submit_update(&edited).await.unwrap();

    let state = coordinator.state();
    assert_eq!(state.phase, Phase::Ready);
    assert!(state.selected.is_none());
    assert_eq!(api.fetches.load(Ordering::SeqCst), 2);
    assert_eq!(api.updated.lock().unwrap().len(), 1);
    let reloaded = state.assets.iter().find(|a| a.id == "2").unwrap();
    assert_eq!(reloaded.address, "5 River Rd");
}

#[tokio::test]
async fn filters_survive_a_reload() {
    let api = FakeApi::with_assets(fixture());
    let store = logged_in();
    let mut coordinator = Coordinator::new(&api, &store);
    coordinator.mount().await;
    coordinator.dispatch(Event::ToggleAgency("Water Bureau".to_string()));
    coordinator.refresh().await;
    assert_eq!(ids(&coordinator.state().visible), vec!["1", "3"]);
}

#[tokio::test]
async fn unmount_drops_in_flight_fetch() {
    let api = FakeApi {
        hang_fetch: true,
        ..FakeApi::with_assets(fixture())
    };
    let store = logged_in();
    let mut coordinator = Coordinator::new(&api, &store);
    let handle = coordinator.unmount_handle();

    tokio::join!(coordinator.mount(), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.unmount();
    });

    let state = coordinator.state();
    assert_eq!(state.phase, Phase::Unmounted);
    assert!(state.assets.is_empty());
    assert_eq!(api.fetches.load(Ordering::SeqCst), 1);
}

const TEST_TOKEN: &str = "tok-1";

async fn token_route(Form(form): Form<HashMap<String, String>>) -> Response {
    let user = form.get("username").map(String::as_str);
    let pass = form.get("password").map(String::as_str);
    if user == Some("clerk") && pass == Some("pw") {
        Json(json!({"access_token": TEST_TOKEN, "user": {"username": "clerk"}})).into_response()
    } else {
        (StatusCode::UNAUTHORIZED, "bad credentials").into_response()
    }
}

fn bearer_ok(headers: &HeaderMap) -> bool {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {TEST_TOKEN}"))
        .unwrap_or(false)
}

async fn list_route(headers: HeaderMap) -> Response {
    if !bearer_ok(&headers) {
        return (StatusCode::UNAUTHORIZED, "missing token").into_response();
    }
    Json(json!([
        {"id": 1, "資產類型": "土地", "管理機關": "Water Bureau", "行政區": "Da-an",
         "地段": "Da-an sec. 1", "地址": "1 Taipei Rd", "標的名稱": "lot 1",
         "建立時間": "2023-01-01T00:00:00", "面積": 120.5},
        {"id": "2", "資產類型": "建物", "管理機關": "Parks Dept"}
    ]))
    .into_response()
}

async fn update_route(
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> StatusCode {
    if !bearer_ok(&headers) {
        return StatusCode::UNAUTHORIZED;
    }
    if id == "a b" && body["地址"] == "5 River Rd" && body["面積"] == 3 {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::BAD_REQUEST
    }
}

async fn create_route(headers: HeaderMap, Json(body): Json<Value>) -> StatusCode {
    if !bearer_ok(&headers) {
        return StatusCode::UNAUTHORIZED;
    }
    if body.get("id").is_some() {
        return StatusCode::BAD_REQUEST;
    }
    if body["標的名稱"] == "duplicate" {
        return StatusCode::CONFLICT;
    }
    StatusCode::CREATED
}

async fn spawn_api() -> AssetClient {
    let app = Router::new()
        .route("/token", post(token_route))
        .route("/api/v1/idle", get(list_route).post(create_route))
        .route("/api/v1/idle/:id", put(update_route));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    AssetClient::new(&ClientOptions {
        api_url: format!("http://{addr}"),
        timeout_seconds: 5,
        proxy: None,
    })
    .unwrap()
}

#[tokio::test]
async fn login_posts_form_and_reads_token() {
    let client = spawn_api().await;
    let response = client.login("clerk", "pw").await.unwrap();
    assert_eq!(response.access_token, TEST_TOKEN);
    assert_eq!(response.user["username"], "clerk");

    let err = client.login("clerk", "nope").await.unwrap_err();
    assert!(matches!(err, ClientError::LoginFailed { status: Some(401) }));
}

#[tokio::test]
async fn fetch_sends_bearer_and_decodes_records() {
    let client = spawn_api().await;
    let assets = client.fetch_assets(TEST_TOKEN).await.unwrap();
    assert_eq!(assets.len(), 2);
    assert_eq!(assets[0].id, "1");
    assert_eq!(assets[0].address, "1 Taipei Rd");
    assert_eq!(assets[0].extra.get("面積"), Some(&json!(120.5)));
    assert_eq!(assets[1].id, "2");
    assert!(assets[1].address.is_empty());
}

#[tokio::test]
async fn rejected_fetch_is_reported() {
    let client = spawn_api().await;
    let err = client.fetch_assets("stale").await.unwrap_err();
    match err {
        ClientError::FetchFailed { message } => assert!(message.contains("401")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn update_puts_full_record_to_escaped_path() {
    let client = spawn_api().await;
    let mut edited = asset("a b", "土地", "Parks Dept", "Xinyi", "5 River Rd", "");
    edited.extra.insert("面積".to_string(), json!(3));
    client.update_asset(TEST_TOKEN, &edited).await.unwrap();

    edited.address = "elsewhere".to_string();
    let err = client.update_asset(TEST_TOKEN, &edited).await.unwrap_err();
    assert!(matches!(err, ClientError::UpdateFailed { .. }));
}

#[tokio::test]
async fn coordinator_runs_against_http_client() {
    let client = spawn_api().await;
    let store = MemorySessionStore::default();
    let login = client.login("clerk", "pw").await.unwrap();
    store
        .set(&Session {
            token: login.access_token,
            user: login.user,
        })
        .unwrap();

    let mut coordinator = Coordinator::new(&client, &store);
    coordinator.mount().await;
    coordinator.dispatch(Event::SearchChanged("taipei".to_string()));
    assert_eq!(ids(&coordinator.state().visible), vec!["1"]);
}

#[tokio::test]
async fn create_posts_new_record_without_id() {
    let client = spawn_api().await;
    let mut draft = asset("", "建物", "Parks Dept", "Xinyi", "7 Park Ave", "");
    draft.target_name = "New depot".to_string();
    client.create_asset(TEST_TOKEN, &draft).await.unwrap();

    let err = client.create_asset("stale", &draft).await.unwrap_err();
    match err {
        ClientError::UpdateFailed { message, .. } => assert!(message.contains("401")),
        other => panic!("unexpected error: {other:?}"),
    }

    draft.target_name = "duplicate".to_string();
    let err = client.create_asset(TEST_TOKEN, &draft).await.unwrap_err();
    match err {
        ClientError::UpdateFailed { message, .. } => assert!(message.contains("409")),
        other => panic!("unexpected error: {other:?}"),
    }

    draft.id = "9".to_string();
    draft.target_name = "New depot".to_string();
    assert!(client.create_asset(TEST_TOKEN, &draft).await.is_err());
}

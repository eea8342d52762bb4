use std::path::PathBuf;
use std::sync::Arc;

use fxr_core::RateRecord;
use fxr_storage::{MemoryStore, RateStore, StaticFetcher};
use fxr_sync::catalog::{currency_sort, CURRENCY_NAMES};
use fxr_sync::{
    run_all_once, seed_catalog, IngestRuntime, JobKind, SourceRegistry, SyncConfig,
};

const DIRECTORY_URL: &str = "https://www.kylc.com/huilv/bank.html";
const GOLD_URL: &str = "https://www.huilvbiao.com/api/gold_indexApi";
const SILVER_URL: &str = "https://www.huilvbiao.com/api/silver_indexApi";

fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..")
}

fn fixture(rel: &str) -> String {
    let path = workspace_root().join("fixtures").join(rel);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("reading {}: {e}", path.display()))
}

fn registry() -> SourceRegistry {
    let text = std::fs::read_to_string(workspace_root().join("sources.yaml")).unwrap();
    SourceRegistry::from_yaml_str(&text).unwrap()
}

async fn currencies_only(store: &MemoryStore) {
    for (code, name) in CURRENCY_NAMES {
        store.create_currency(code, name, currency_sort(code)).await.unwrap();
    }
}

fn runtime(fetcher: StaticFetcher, store: Arc<MemoryStore>, registry: SourceRegistry) -> IngestRuntime {
    IngestRuntime::new(
        SyncConfig::from_lookup(|_| None),
        registry,
        Arc::new(fetcher),
        store,
    )
}

fn bank_rows(rows: &[RateRecord]) -> Vec<&fxr_core::BankRate> {
    rows.iter()
        .filter_map(|r| match r {
            RateRecord::Bank(b) => Some(b),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn directory_then_detail_creates_bank_and_is_idempotent() {
    let store = Arc::new(MemoryStore::new());
    currencies_only(&store).await;
    let fetcher = StaticFetcher::new()
        .with_body(DIRECTORY_URL, fixture("kylc/bank.html"))
        .with_body("https://www.kylc.com/b-icbc.html", fixture("kylc/b-icbc.html"));
    let rt = runtime(fetcher, store.clone(), registry());

    let first = rt.sync_once(JobKind::BankRates).await;
    assert_eq!(first.fetched, 2);
    assert_eq!(first.extracted, 6);
    assert_eq!(first.inserted, 5);
    assert_eq!(first.skipped_zero, 1);
    // boc, cmbchina and hsbc detail pages are not served
    assert_eq!(first.failures, 3);

    let icbc = store.find_bank_by_code("ICBC").await.unwrap().unwrap();
    assert_eq!(icbc.name, "工商银行");
    assert_eq!(store.list_banks().await.unwrap().len(), 4);

    let usd = store.find_currency_by_code("USD").await.unwrap().unwrap();
    let rows = store.rate_rows().await;
    let banks = bank_rows(&rows);
    assert_eq!(banks.len(), 5);
    let usd_row = banks.iter().find(|b| b.currency_id == usd.id).unwrap();
    assert_eq!(usd_row.bank_id, icbc.id);
    assert_eq!(usd_row.hui_in, 7.112);
    assert_eq!(usd_row.chao_in, 7.0542);
    assert_eq!(usd_row.hui_out, 7.141);
    assert_eq!(usd_row.zhesuan, 7.1265);
    assert!(!usd_row.cash_estimated);

    let thb = store.find_currency_by_code("THB").await.unwrap().unwrap();
    let thb_row = banks.iter().find(|b| b.currency_id == thb.id).unwrap();
    assert_eq!(thb_row.chao_in, thb_row.hui_in);
    assert_eq!(thb_row.chao_out, thb_row.hui_out);
    assert!(thb_row.cash_estimated);

    let second = rt.sync_once(JobKind::BankRates).await;
    assert_eq!(second.inserted, 0);
    assert_eq!(second.updated, 5);
    assert_eq!(bank_rows(&store.rate_rows().await).len(), 5);
    assert_eq!(store.list_banks().await.unwrap().len(), 4);
}

#[tokio::test]
async fn metals_job_keeps_good_symbols_when_one_is_truncated() {
    let store = Arc::new(MemoryStore::new());
    store.create_currency("USD", "美元", 1).await.unwrap();
    let fetcher = StaticFetcher::new()
        .with_body(GOLD_URL, fixture("huilvbiao/gold_indexApi.js"))
        .with_body(SILVER_URL, fixture("huilvbiao/silver_indexApi.js"));
    let rt = runtime(fetcher, store.clone(), registry());

    let report = rt.sync_once(JobKind::Metals).await;
    assert_eq!(report.fetched, 2);
    assert_eq!(report.inserted, 5);
    assert_eq!(report.failures, 1);

    let cny = store.find_currency_by_code("CNY").await.unwrap().unwrap();
    assert_eq!(cny.name, "人民币");
    assert_eq!(cny.sort, 0);

    let rows = store.rate_rows().await;
    let autd = rows
        .iter()
        .find_map(|r| match r {
            RateRecord::Metal(m) if m.symbol == "AUTD" => Some(m),
            _ => None,
        })
        .unwrap();
    assert_eq!(autd.trading_venue, "中国上海黄金交易所");
    assert_eq!(autd.price, 1247.73);
    assert_eq!(autd.max_price, 1255.00);
    assert_eq!(autd.min_price, 1177.25);
    assert_eq!(autd.open_price, 1180.44);
    assert_eq!(autd.prev_close, 1184.04);
    assert_eq!(autd.currency_id, cny.id);

    let again = rt.sync_once(JobKind::Metals).await;
    assert_eq!(again.updated, 5);
    assert_eq!(store.rate_rows().await.len(), 5);
}

#[tokio::test]
async fn zero_priced_base_quote_leaves_catalog_untouched() {
    let store = Arc::new(MemoryStore::new());
    store.create_currency("USD", "美元", 1).await.unwrap();
    let gold = fixture("huilvbiao/gold_indexApi.js").replace(
        "hq_str_gds_AUTD=\"1247.73,",
        "hq_str_gds_AUTD=\"0,",
    );
    let fetcher = StaticFetcher::new().with_body(GOLD_URL, gold);
    let rt = runtime(fetcher, store.clone(), registry());

    let report = rt.sync_once(JobKind::Metals).await;
    assert_eq!(report.skipped_zero, 1);
    assert_eq!(report.inserted, 2);
    assert!(store.find_currency_by_code("CNY").await.unwrap().is_none());
}

#[tokio::test]
async fn realtime_job_skips_base_and_isolates_currencies() {
    let store = Arc::new(MemoryStore::new());
    seed_catalog(store.as_ref()).await.unwrap();
    let registry = registry();
    let usd_url = registry.realtime.as_ref().unwrap().url_for("USD");
    let fetcher = StaticFetcher::new().with_body(usd_url, fixture("baidu/usd.json"));
    let rt = runtime(fetcher, store.clone(), registry);

    let report = rt.sync_once(JobKind::Realtime).await;
    assert_eq!(report.inserted, 1);
    assert_eq!(report.failures, CURRENCY_NAMES.len() - 1);

    let usd = store.find_currency_by_code("USD").await.unwrap().unwrap();
    match store.rate_rows().await.as_slice() {
        [RateRecord::Exchange(rate)] => {
            assert_eq!(rate.currency_id, usd.id);
            assert_eq!(rate.base, "CNY");
            assert_eq!(rate.rate, 7.1223);
        }
        other => panic!("expected one exchange rate, got {other:?}"),
    }
}

#[tokio::test]
async fn direct_bank_page_uses_registered_layout() {
    let store = Arc::new(MemoryStore::new());
    seed_catalog(store.as_ref()).await.unwrap();
    let registry = SourceRegistry::from_yaml_str(
        r#"
bank_pages:
  - bank_code: PSBC
    url: https://bank.test/psbc.html
"#,
    )
    .unwrap();
    let fetcher = StaticFetcher::new().with_body("https://bank.test/psbc.html", fixture("banks/psbc.html"));
    let rt = runtime(fetcher, store.clone(), registry);

    let report = rt.sync_once(JobKind::BankRates).await;
    assert_eq!(report.extracted, 2);
    assert_eq!(report.inserted, 1);
    // "100日元" has no catalog mapping
    assert_eq!(report.skipped_unresolved, 1);

    let psbc = store.find_bank_by_code("PSBC").await.unwrap().unwrap();
    let rows = store.rate_rows().await;
    let banks = bank_rows(&rows);
    assert_eq!(banks[0].bank_id, psbc.id);
    assert_eq!(banks[0].hui_in, 7.112);
    assert_eq!(banks[0].chao_in, 7.0542);
}

#[tokio::test]
async fn failed_job_does_not_stop_the_others() {
    let store = Arc::new(MemoryStore::new());
    store.create_currency("USD", "美元", 1).await.unwrap();
    let fetcher = StaticFetcher::new()
        .with_status(DIRECTORY_URL, 503)
        .with_body(GOLD_URL, fixture("huilvbiao/gold_indexApi.js"));
    let rt = runtime(fetcher, store.clone(), registry());

    let runners = vec![rt.runner(JobKind::BankRates), rt.runner(JobKind::Metals)];
    let results = run_all_once(&runners).await;

    let (kind, bank) = &results[0];
    assert_eq!(*kind, JobKind::BankRates);
    let bank = bank.as_ref().unwrap();
    assert_eq!(bank.failures, 1);
    assert_eq!(bank.written(), 0);

    let (_, metals) = &results[1];
    assert_eq!(metals.as_ref().unwrap().inserted, 3);
}

//! Walk one surplus meal through the whole app against in-memory backends.
//!
//! A vendor signs up and lists an item, a student signs up, favourites the
//! vendor and reserves the item, and the vendor then fulfils the order. The
//! final counters are recomputed from the order log and logged.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use mockable::DefaultClock;
use ortho_config::OrthoConfig;
use savorly_core::config::CoreSettings;
use savorly_core::domain::{
    Credentials, FavoritesCache, MenuService, MetricKey, MetricsAggregator, MetricsEntity,
    MetricsReconciler, Money, NewMenuItem, OrderStatus, OrderStatusService, OrderWriter,
    ReservationRequest, RoleData, SessionContext, SessionManager, SessionState, StudentDetails,
    VendorDetails,
};
use savorly_core::outbound::file_cache::FileLocalCache;
use savorly_core::outbound::memory::{MemoryIdentityProvider, MemoryRemoteStore};
use tokio::runtime::Builder;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

/// `savorly-demo` command arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "savorly-demo",
    about = "Reserve a surplus meal end to end against in-memory backends",
    version
)]
struct CliArgs {
    /// Servings the student reserves.
    #[arg(long, default_value_t = 2)]
    servings: u32,
    /// Surplus price of the item in cents.
    #[arg(long = "discount-cents", default_value_t = 629)]
    discount_cents: i64,
    /// Regular price of the item in cents.
    #[arg(long = "price-cents", default_value_t = 1299)]
    price_cents: i64,
    /// Local cache directory. Overrides `SAVORLY_CACHE_DIR`.
    #[arg(long = "cache-dir", value_name = "path")]
    cache_dir: Option<PathBuf>,
    /// Keep the local cache in a temporary directory removed on exit.
    #[arg(long, conflicts_with = "cache_dir")]
    ephemeral: bool,
}

fn main() -> io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let runtime = Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|error| io::Error::other(format!("create Tokio runtime: {error}")))?;
    runtime.block_on(async_main())
}

async fn async_main() -> io::Result<()> {
    let args = CliArgs::try_parse().map_err(io::Error::other)?;
    let settings = CoreSettings::load_from_iter([OsString::from("savorly-demo")])
        .map_err(|error| io::Error::other(format!("load settings: {error}")))?;
    let mode = settings.concurrency_mode().map_err(io::Error::other)?;
    let policy = settings.failure_policy().map_err(io::Error::other)?;

    let temp_dir = if args.ephemeral {
        Some(tempfile::tempdir()?)
    } else {
        None
    };
    let cache_dir = match (&temp_dir, args.cache_dir.clone()) {
        (Some(dir), _) => dir.path().to_path_buf(),
        (None, Some(path)) => path,
        (None, None) => settings.cache_dir(),
    };
    info!(%mode, %policy, cache_dir = %cache_dir.display(), "starting demo");

    let store = Arc::new(MemoryRemoteStore::new());
    let provider = Arc::new(MemoryIdentityProvider::default());
    let sessions = SessionManager::new(Arc::clone(&provider), Arc::clone(&store));
    let favorites = FavoritesCache::new(Arc::new(
        FileLocalCache::open(&cache_dir).map_err(io::Error::other)?,
    ));
    let menu = MenuService::new(Arc::clone(&store));
    let writer = OrderWriter::new(
        Arc::clone(&store),
        MetricsAggregator::new(Arc::clone(&store), mode),
        Arc::new(DefaultClock),
        policy,
    );
    let status = OrderStatusService::new(Arc::clone(&store), Arc::new(DefaultClock));
    let reconciler = MetricsReconciler::new(Arc::clone(&store));

    sessions.start().await.map_err(io::Error::other)?;

    let vendor_credentials = credentials("orders@goldenbear.example", "pad-thai-42")?;
    sessions
        .sign_up(
            &vendor_credentials,
            &RoleData::Vendor(VendorDetails {
                name: "Golden Bear Cafe".to_owned(),
                category: "Thai".to_owned(),
                address: "2475 Bancroft Way".to_owned(),
                ..VendorDetails::default()
            }),
        )
        .await
        .map_err(io::Error::other)?;
    let vendor = signed_in(&sessions.current())?;
    let item = menu
        .create_item(
            &vendor,
            NewMenuItem {
                name: "Pad Thai".to_owned(),
                description: "Closing-time surplus".to_owned(),
                price: Money::from_cents(args.price_cents),
                discount_price: Money::from_cents(args.discount_cents),
                serves: 1,
            },
        )
        .await
        .map_err(io::Error::other)?;
    sessions.sign_out().await;

    sessions
        .sign_up(
            &credentials("alice@berkeley.edu", "hunter22")?,
            &RoleData::Student(StudentDetails {
                first_name: "Alice".to_owned(),
                last_name: "Chen".to_owned(),
            }),
        )
        .await
        .map_err(io::Error::other)?;
    let student_state = sessions.current();
    let student = signed_in(&student_state)?;
    favorites
        .on_session_change(&student_state)
        .await
        .map_err(io::Error::other)?;
    favorites
        .toggle(student.identity_id(), "Golden Bear Cafe")
        .await
        .map_err(io::Error::other)?;

    let request =
        ReservationRequest::for_item(&student, &item, args.servings).map_err(io::Error::other)?;
    let order = writer.reserve(request).await.map_err(io::Error::other)?;
    info!(order_id = %order.id, status = %order.status, "order placed");

    sessions.sign_out().await;
    favorites
        .on_session_change(&sessions.current())
        .await
        .map_err(io::Error::other)?;

    let vendor = sessions
        .sign_in(&vendor_credentials)
        .await
        .map_err(io::Error::other)?;
    for target in [OrderStatus::Ready, OrderStatus::Completed] {
        let advanced = status
            .advance(&vendor, order.id, target)
            .await
            .map_err(io::Error::other)?;
        info!(order_id = %advanced.id, status = %advanced.status, "order advanced");
    }

    let student_metrics = reconciler
        .recompute(&MetricsEntity::Student(student.identity_id().clone()))
        .await
        .map_err(io::Error::other)?;
    let vendor_metrics = reconciler
        .recompute(&MetricsEntity::Vendor(vendor.identity_id().clone()))
        .await
        .map_err(io::Error::other)?;
    info!(
        money_saved = %student_metrics.money(MetricKey::MoneySaved),
        meals_rescued = student_metrics.get(MetricKey::MealsRescued),
        total_revenue = %vendor_metrics.money(MetricKey::TotalRevenue),
        meals_shared = vendor_metrics.get(MetricKey::MealsShared),
        orders_completed = vendor_metrics.get(MetricKey::OrdersCompleted),
        "counters reconciled"
    );

    sessions.dispose().await;
    Ok(())
}

fn credentials(email: &str, password: &str) -> io::Result<Credentials> {
    Credentials::try_from_parts(email, password).map_err(io::Error::other)
}

fn signed_in(state: &SessionState) -> io::Result<SessionContext> {
    state
        .context()
        .cloned()
        .ok_or_else(|| io::Error::other("expected an authenticated session"))
}

use std::collections::{BTreeMap, BTreeSet};
use std::env;

use anyhow::{Context, Result};
use tracing::{info, warn};

use sales_analytics_pipeline::aggregate::{
    AggregationRequest, FilterOptions, aggregate, joined_frame, period_breakdown_frame,
    product_totals_frame, summary_pivot_frame, write_parquet,
};
use sales_analytics_pipeline::config::AppConfig;
use sales_analytics_pipeline::loader::{
    IngestEngine, discover_sales_files, latest_inventory_file,
};
use sales_analytics_pipeline::models::{Diagnostic, Period};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // Load environment variables
    dotenv::dotenv().ok();

    let (config_path, selected_arg) = parse_args();

    let config = AppConfig::from_file(&config_path)
        .with_context(|| format!("Failed to load configuration from {config_path}"))?;

    info!("🚀 Starting sales analytics pipeline");
    info!(
        "Sales dir: {} | Inventory dir: {} | Workers: {}",
        config.data.sales_dir.display(),
        config.data.inventory_dir.display(),
        config.ingest.max_workers
    );

    // Discover candidate sales exports, one per reporting period
    let mut sources = discover_sales_files(&config.data.sales_dir)
        .context("Failed to scan sales data directory")?;
    info!("Found {} sales file(s)", sources.len());

    // Period selection: --periods narrows the load; default is everything
    let selected: BTreeSet<Period> = match selected_arg {
        Some(arg) => parse_periods(&arg)?,
        None => sources.iter().map(|s| s.period).collect(),
    };
    sources.retain(|s| selected.contains(&s.period));

    if sources.is_empty() {
        warn!("No sales files match the selected periods; producing empty results");
    }

    let engine = IngestEngine::new(config.ingest.max_workers);

    // Concurrent load + single-threaded merge
    let sales = engine.ingest_sales(sources).await;
    info!(
        "📊 Unified dataset: {} rows across {} period(s), version {}",
        sales.dataset.len(),
        sales.dataset.periods().len(),
        sales.dataset.version()
    );

    // Latest inventory snapshot, if any
    let inventory = match latest_inventory_file(&config.data.inventory_dir)
        .context("Failed to scan inventory directory")?
    {
        Some(path) => {
            info!("Using inventory snapshot {}", path.display());
            Some(engine.ingest_inventory(&path).await)
        }
        None => {
            warn!("No inventory snapshot found; the joined view will be skipped");
            None
        }
    };
    let inventory_records = inventory.as_ref().map(|i| i.records.as_slice());

    // One aggregation pass over everything that loaded
    let request = AggregationRequest {
        dataset: &sales.dataset,
        periods: selected.clone(),
        inventory: inventory_records,
        filters: FilterOptions::default(),
    };
    let result = aggregate(&request);

    info!(
        "✅ Aggregated {} product(s), {} period bucket(s), {} order(s)",
        result.product_totals.len(),
        result.period_breakdown.len(),
        result.summary.order_count
    );
    info!(
        "💰 Total revenue: {} | Total margin: {}",
        result.summary.total_revenue, result.summary.total_margin
    );

    // Export result tables for the presentation layer
    std::fs::create_dir_all(&config.data.output_dir)
        .with_context(|| format!("Failed to create {}", config.data.output_dir.display()))?;
    let out = &config.data.output_dir;

    let mut totals_df = product_totals_frame(&result.product_totals)?;
    write_parquet(&mut totals_df, &out.join("product_totals.parquet"))?;

    let mut breakdown_df = period_breakdown_frame(&result.period_breakdown)?;
    write_parquet(&mut breakdown_df, &out.join("period_breakdown.parquet"))?;

    let stock_by_product: Option<BTreeMap<String, i64>> = inventory_records.map(|records| {
        records
            .iter()
            .map(|r| (r.product_id.clone(), r.quantity_on_hand))
            .collect()
    });
    let mut pivot_df = summary_pivot_frame(
        &result.product_totals,
        &result.period_breakdown,
        &selected,
        stock_by_product.as_ref(),
    )?;
    write_parquet(&mut pivot_df, &out.join("product_summary.parquet"))?;

    if let Some(joined) = &result.joined {
        let mut joined_df = joined_frame(joined)?;
        write_parquet(&mut joined_df, &out.join("sales_inventory_joined.parquet"))?;
    }

    // Full diagnostics list: ingestion + aggregation
    let mut diagnostics: Vec<Diagnostic> = sales.diagnostics;
    if let Some(inv) = inventory {
        diagnostics.extend(inv.diagnostics);
    }
    diagnostics.extend(result.diagnostics.iter().cloned());

    let diagnostics_path = out.join("diagnostics.json");
    std::fs::write(
        &diagnostics_path,
        serde_json::to_string_pretty(&diagnostics)?,
    )
    .with_context(|| format!("Failed to write {}", diagnostics_path.display()))?;

    if diagnostics.is_empty() {
        info!("🎉 Pipeline completed with no diagnostics");
    } else {
        warn!(
            "⚠️ Pipeline completed with {} diagnostic(s), see {}",
            diagnostics.len(),
            diagnostics_path.display()
        );
    }

    Ok(())
}

/// Arguments: an optional config path and an optional
/// `--periods 2024-01,2024-02` selection.
fn parse_args() -> (String, Option<String>) {
    let mut config_path = "src/configs/pipeline.toml".to_string();
    let mut periods = None;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--periods" || arg == "-p" {
            periods = args.next();
        } else {
            config_path = arg;
        }
    }

    (config_path, periods)
}

fn parse_periods(arg: &str) -> Result<BTreeSet<Period>> {
    arg.split(',')
        .map(|s| {
            s.trim()
                .parse::<Period>()
                .map_err(|e| anyhow::anyhow!("invalid --periods value: {e}"))
        })
        .collect()
}

use std::sync::Arc;
use std::time::Duration;

use clap::{Args as ClapArgs, Parser, Subcommand};
use cluster::{MarkerStyle, PointIcon, marker_style, spiderfy};
use engine::{EngineConfig, Session};
use foundation::{QuickRange, Rect};
use serde_json::json;
use streaming::{AggregateFunction, ColumnId, HttpBackend};
use tracing::info;
use tracing_subscriber::EnvFilter;
use view::{MapMode, ViewState};

#[derive(Parser, Debug)]
#[command(author, version, about = "Explore a clustered point dataset from the terminal")]
struct Args {
    /// Backend API base URL (default: EXPLORER_BASE_URL or http://localhost:8080/api)
    #[arg(long)]
    base_url: Option<String>,

    /// Index status poll interval in milliseconds
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Per-request timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Give up waiting for the view after this many seconds
    #[arg(long, default_value_t = 60)]
    wait_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List available datasets
    Datasets,

    /// Load a dataset, apply the given parameters and print the view
    View(ViewArgs),

    /// Reset the backend index of a dataset and reload the view
    Reset {
        #[arg(long)]
        dataset: String,
    },

    /// Fetch the detail row of one point
    Row {
        #[arg(long)]
        dataset: String,

        #[arg(long)]
        row: i64,
    },

    /// Request a forecast; the answer is logged
    Forecast {
        #[arg(long)]
        dataset: String,

        #[arg(long, default_value_t = 10)]
        horizon: u32,
    },
}

#[derive(ClapArgs, Debug)]
struct ViewArgs {
    #[arg(long)]
    dataset: String,

    /// Viewport: south,west,north,east
    #[arg(long)]
    bbox: Option<String>,

    #[arg(long)]
    zoom: Option<u8>,

    /// Group-by columns, comma separated
    #[arg(long)]
    group_by: Option<String>,

    /// Categorical filter column=value, repeatable
    #[arg(long = "filter")]
    filters: Vec<String>,

    #[arg(long)]
    measure: Option<ColumnId>,

    /// AVG, SUM, MIN, MAX or COUNT
    #[arg(long)]
    aggregate: Option<String>,

    /// Quick range: All, 2Y, 1Y, 6M, 3M or 1M
    #[arg(long, conflicts_with = "dates")]
    range: Option<String>,

    /// Custom range "dd-mm-yyyy - dd-mm-yyyy"
    #[arg(long)]
    dates: Option<String>,

    /// Statistics rectangle: south,west,north,east
    #[arg(long)]
    drawn: Option<String>,

    /// Per-point time series (needs max zoom)
    #[arg(long)]
    time_series: bool,

    /// Print heatmap intensities of this measure instead of markers
    #[arg(long)]
    heatmap: Option<usize>,

    /// Expand the cluster at this index and print its spider legs
    #[arg(long)]
    expand: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut config = EngineConfig::from_env()?;
    if let Some(url) = args.base_url {
        config.base_url = url;
    }
    if let Some(ms) = args.poll_interval_ms {
        config.poll_interval_ms = ms;
    }
    if let Some(ms) = args.timeout_ms {
        config.request_timeout_ms = ms;
    }
    config.validate()?;

    let backend = Arc::new(HttpBackend::new(
        config.base_url.clone(),
        config.request_timeout(),
    )?);
    info!("using backend at {}", backend.base_url());
    let mut session = Session::new(backend, config);
    let wait = Duration::from_secs(args.wait_secs);

    match args.command {
        Command::Datasets => {
            session.list_datasets();
            let state = session.wait_for(|v| !v.datasets.is_empty(), wait).await?;
            for d in &state.datasets {
                println!("{}\t{}\t{} objects", d.id, d.name, d.object_count);
            }
        }
        Command::View(view) => run_view(&mut session, view, wait).await?,
        Command::Reset { dataset } => {
            load(&mut session, &dataset, wait).await?;
            session.reset_index()?;
            let state = session.settle(wait).await?;
            print_view(&session, &state)?;
        }
        Command::Row { dataset, row } => {
            load(&mut session, &dataset, wait).await?;
            session.open_point(row)?;
            let state = session
                .wait_for(|v| v.row.is_some() || v.error.is_some(), wait)
                .await?;
            println!("{}", serde_json::to_string_pretty(&state.row)?);
        }
        Command::Forecast { dataset, horizon } => {
            load(&mut session, &dataset, wait).await?;
            session.forecast(horizon)?;
            // The forecast task only logs; give it the request timeout to finish.
            tokio::time::sleep(session.config().request_timeout()).await;
        }
    }
    Ok(())
}

async fn load(
    session: &mut Session,
    dataset: &str,
    wait: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    session.select_dataset(dataset);
    let state = session
        .wait_for(|v| v.is_ready() || v.error.is_some(), wait)
        .await?;
    if let Some(err) = &state.error {
        return Err(err.clone().into());
    }
    session.settle(wait).await?;
    Ok(())
}

async fn run_view(
    session: &mut Session,
    args: ViewArgs,
    wait: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    load(session, &args.dataset, wait).await?;

    if args.bbox.is_some() || args.zoom.is_some() {
        let state = session.state();
        let current = state.params.as_ref().ok_or("dataset has no parameters")?;
        let rect = match &args.bbox {
            Some(bbox) => parse_rect(bbox)?,
            None => current.viewport,
        };
        session.set_viewport(rect, args.zoom.unwrap_or(current.zoom))?;
    }
    if let Some(cols) = &args.group_by {
        session.set_group_by(parse_columns(cols)?)?;
    }
    for filter in &args.filters {
        let (column, value) = filter
            .split_once('=')
            .ok_or_else(|| format!("filter {filter:?} is not column=value"))?;
        session.set_filter(column.trim().parse()?, Some(value.to_string()))?;
    }
    if let Some(measure) = args.measure {
        session.set_measure(measure)?;
    }
    if let Some(agg) = &args.aggregate {
        session.set_aggregate(parse_aggregate(agg)?)?;
    }
    if let Some(label) = &args.range {
        let range =
            QuickRange::from_label(label).ok_or_else(|| format!("unknown range {label:?}"))?;
        session.quick_range(range)?;
    }
    if let Some(dates) = &args.dates {
        session.custom_range(dates)?;
    }
    if let Some(drawn) = &args.drawn {
        session.set_drawn_rect(Some(parse_rect(drawn)?))?;
    }
    if args.time_series {
        session.set_time_series(true)?;
    }
    if let Some(measure) = args.heatmap {
        session.set_map_mode(MapMode::Heatmap);
        session.select_measure(measure);
    }

    let state = session.settle(wait).await?;
    if let Some(index) = args.expand {
        if !session.expand_cluster(index) {
            return Err(format!("no cluster at index {index}").into());
        }
    }
    print_view(session, &session.state())?;
    if state.error.is_some() {
        return Err("view finished with an error".into());
    }
    Ok(())
}

fn print_view(session: &Session, state: &ViewState) -> Result<(), Box<dyn std::error::Error>> {
    let zoom = state.params.as_ref().map_or(0, |p| p.zoom);
    let markers: Vec<_> = if state.map_mode == MapMode::Heatmap {
        session
            .heat_points()
            .iter()
            .map(|h| json!({"lat": h.lat, "lon": h.lon, "intensity": h.intensity}))
            .collect()
    } else {
        state
            .clusters
            .iter()
            .map(|c| {
                json!({
                    "lat": c.centroid.lat,
                    "lon": c.centroid.lon,
                    "members": c.member_count,
                    "marker": describe(&marker_style(c, zoom)),
                })
            })
            .collect()
    };
    let legs: Vec<_> = state
        .expanded()
        .map(|c| {
            spiderfy(c)
                .iter()
                .map(|leg| {
                    json!({
                        "row": leg.point.row_id,
                        "lat": leg.position.lat,
                        "lon": leg.position.lon,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let out = json!({
        "view": state.summary(),
        "markers": markers,
        "spider": legs,
        "metrics": session.metrics().snapshot(),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn describe(style: &MarkerStyle) -> String {
    match style {
        MarkerStyle::Point {
            icon: PointIcon::Star,
            ..
        } => "star".to_string(),
        MarkerStyle::Point {
            icon: PointIcon::Dot { fill },
            ..
        } => format!("dot {fill}"),
        MarkerStyle::Cluster {
            fill, label, badge, ..
        } => match badge {
            Some(badge) => format!("cluster {label}{badge} {fill}"),
            None => format!("cluster {label} {fill}"),
        },
    }
}

fn parse_rect(input: &str) -> Result<Rect, Box<dyn std::error::Error>> {
    let parts = input
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()?;
    match parts[..] {
        [south, west, north, east] => Ok(Rect::from_bounds(south, west, north, east)),
        _ => Err(format!("expected south,west,north,east, got {input:?}").into()),
    }
}

fn parse_columns(input: &str) -> Result<Vec<ColumnId>, Box<dyn std::error::Error>> {
    Ok(input
        .split(',')
        .filter(|p| !p.trim().is_empty())
        .map(|p| p.trim().parse::<ColumnId>())
        .collect::<Result<Vec<_>, _>>()?)
}

fn parse_aggregate(input: &str) -> Result<AggregateFunction, Box<dyn std::error::Error>> {
    Ok(serde_json::from_value(json!(input.trim().to_uppercase()))?)
}

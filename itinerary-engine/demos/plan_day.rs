//! Plans a day in central Saigon: geocode, optimize, synthesize, export.
//!
//! Run with `RUST_LOG=itinerary_engine=debug` to watch the engine work.
//! An optional argument names a JSON planner config file.

use chrono::{NaiveDate, Utc};
use tracing_subscriber::EnvFilter;

use itinerary_engine::domain::{ItemKind, NewItem, NewTrip, TimelineBlock, TransportMode};
use itinerary_engine::geocode::saigon_landmarks;
use itinerary_engine::planner::{GeocodeOutcome, PlannerConfig, TripPlanner};
use itinerary_engine::timeline::{CacheConfig, CachedEstimator, SpeedTableEstimator};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => PlannerConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => PlannerConfig::default(),
    };
    let mut planner = TripPlanner::new(config);

    let start = NaiveDate::from_ymd_opt(2025, 3, 1).ok_or("bad date")?;
    let trip = planner.create_trip(
        NewTrip::new("Saigon weekend", start, 1)
            .with_currency("VND")
            .with_mode(TransportMode::Grab)
            .with_timezone("Asia/Ho_Chi_Minh"),
    );
    let day = planner.add_day(&trip, start)?;

    let stops = [
        ("Bitexco Financial Tower", 9),
        ("War Remnants Museum", 10),
        ("Ben Thanh Market", 12),
        ("Saigon Opera House", 14),
        ("Independence Palace", 15),
        ("Bui Vien Walking Street", 19),
    ];
    let mut items = Vec::new();
    for (place, hour) in stops {
        let from = start.and_hms_opt(hour, 0, 0).ok_or("bad time")?;
        let to = start.and_hms_opt(hour, 45, 0).ok_or("bad time")?;
        let item = NewItem::new(ItemKind::Activity, place)
            .with_address(place)
            .between(from, to);
        items.push(planner.add_item(&day, item)?);
    }

    let geocoder = saigon_landmarks();
    for item in &items {
        if let GeocodeOutcome::Unresolved = planner.geocode_item(item, &geocoder).await? {
            println!("could not locate {item}");
        }
    }

    let route = planner.optimize_day(&day, None)?;
    println!("route: {}", route.outcome);

    let estimator = CachedEstimator::new(SpeedTableEstimator::new(), &CacheConfig::default());
    let synthesis = planner.synthesize_day(&day, &estimator).await?;
    println!("{} moves, {} gaps", synthesis.links.len(), synthesis.gaps.len());

    for block in planner.graph().timeline_of_day(&day) {
        match block {
            TimelineBlock::Stop { item, .. } => println!("  * {}", item.title),
            TimelineBlock::Move { link } => {
                println!("    {} {} min, {:.2}", link.mode, link.minutes, link.cost)
            }
        }
    }

    let export = planner.export_day_ics(&day, Utc::now())?;
    println!("\n{} ({} events)\n{}", export.mime_type(), export.events, export.ics);
    Ok(())
}

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use breeze_core::Config;
use breeze_services::{
    DisplayState, LocationCacheService, SearchDebouncer, WeatherDisplay, WeatherSession,
};
use breeze_store::{LocationStore, SqliteStore};
use breeze_weather::{ConfiguredLocationProvider, OpenMeteoGeocoder, OpenMeteoProvider};

#[tokio::main]
async fn main() -> Result<()> {
    breeze_core::init()?;

    let (config, validation) = Config::load_validated()?;
    for warning in &validation.warnings {
        tracing::warn!("Config: {}", warning);
    }

    let backend =
        SqliteStore::open(config.store_path()).context("Failed to open location store")?;
    let store = Arc::new(LocationStore::new(Arc::new(backend)));

    let provider = OpenMeteoProvider::new(&config.weather)?;
    let geocoder = OpenMeteoGeocoder::new(&config.weather, &config.search)?;
    let device = ConfiguredLocationProvider::new(&config.location)?;

    let cache = Arc::new(LocationCacheService::new(
        store,
        Arc::new(provider),
        Arc::new(device),
        &config.weather,
    ));

    tracing::info!("Breeze started");

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("search") => search(&cache, Arc::new(geocoder), &config, &args[1..].join(" ")).await,
        Some("refresh") => {
            let refreshed = cache.refresh_saved().await;
            println!("Refreshed {refreshed} saved locations");
            Ok(())
        }
        _ => {
            let session = WeatherSession::new(cache.clone());
            session.start().await;
            let refreshed = cache.refresh_stale().await;
            tracing::info!("Refreshed {} stale saved locations", refreshed);

            session.settle().await;
            print_state(&session.state());
            Ok(())
        }
    }
}

async fn search(
    cache: &Arc<LocationCacheService>,
    geocoder: Arc<OpenMeteoGeocoder>,
    config: &Config,
    query: &str,
) -> Result<()> {
    let debouncer = SearchDebouncer::new(geocoder, cache.clone(), &config.search);
    let mut rx = debouncer.subscribe();
    debouncer.on_query_changed(query);

    let wait = Duration::from_millis(config.search.debounce_ms)
        + Duration::from_secs(config.weather.request_timeout_secs * 2);
    let state = tokio::time::timeout(wait, rx.wait_for(|s| s.query == query && !s.is_searching))
        .await
        .context("Search timed out")?
        .context("Search was cancelled")?
        .clone();

    if state.results.is_empty() {
        println!("No places match \"{query}\"");
    }
    for place in &state.results {
        let region = [place.state.as_str(), place.country.as_str()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        if place.has_weather() {
            println!(
                "{} ({}): {:.0}° {}",
                place.name, region, place.temperature, place.weather_condition
            );
        } else {
            println!("{} ({})", place.name, region);
        }
    }
    Ok(())
}

fn print_state(state: &DisplayState) {
    match state {
        DisplayState::Ready(display) => print_display(display),
        DisplayState::Error { message, last_good } => {
            eprintln!("{message}");
            if let Some(display) = last_good {
                print_display(display);
            }
        }
        DisplayState::Idle | DisplayState::Loading { .. } => println!("No weather to show"),
    }
}

fn print_display(display: &WeatherDisplay) {
    println!("{}", display.location.name);
    println!("{}", display.date_label);
    println!(
        "{}° {} ({})",
        display.headline.temperature(),
        display.description,
        display.headline.subtitle()
    );
    for day in &display.daily {
        println!(
            "  {:<10} {:>4}°  {}",
            day.weekday,
            day.max_temperature,
            day.condition.description()
        );
    }
    for tip in &display.tips {
        println!("  - {:?}: {:?}", tip.action, tip.reason);
    }
}

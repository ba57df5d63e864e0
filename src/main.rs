use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::warn;

use fish_risk_rs::config::Config;
use fish_risk_rs::logging;
use fish_risk_rs::render::AsciiMap;
#[cfg(feature = "online")]
use fish_risk_rs::services::{IpDeviceLocator, NominatimGeocoder, http_client};
use fish_risk_rs::services::{CatalogGeocoder, StaticDeviceLocator};
use fish_risk_rs::{
    AlertChannel, Applied, Coordinate, CountryNormalizer, DeviceLocationService, FarmDataset,
    GeocodingService, LocationInput, LocationResolver, MapViewController, Permission, Place,
    RegionCatalog, RiskBand, ServiceError, Species,
};

#[derive(Parser)]
#[command(
    name = "fish-risk-rs",
    version,
    about = "Find fish farms by species and origin and map their microplastic contamination risk"
)]
struct Args {
    /// Map width in characters
    #[arg(short = 'W', long, default_value_t = 80)]
    width: usize,

    /// Map height in characters
    #[arg(short = 'H', long, default_value_t = 24)]
    height: usize,

    /// Fish species: salmon, sea_bass or mackerel
    #[arg(short, long)]
    species: Option<Species>,

    /// Region key to jump to (e.g. "norway"); no geocoding needed
    #[arg(short, long, conflicts_with = "query")]
    region: Option<String>,

    /// Place name to search for (e.g. "Oslo")
    #[arg(short, long)]
    query: Option<String>,

    /// Device latitude (requires --lon too); skips the IP lookup
    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    lat: Option<f64>,

    /// Device longitude (requires --lat too)
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    lon: Option<f64>,

    /// Answer "no" to the device location prompt
    #[arg(long, conflicts_with_all = ["lat", "lon"])]
    deny_location: bool,

    /// Stay off the network and geocode against the region table only
    #[arg(long)]
    offline: bool,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the known regions and exit
    #[arg(long)]
    list_regions: bool,

    /// Debug logging on stderr (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,
}

enum Geocoder {
    #[cfg(feature = "online")]
    Online(NominatimGeocoder),
    Offline(CatalogGeocoder),
}

impl GeocodingService for Geocoder {
    async fn forward_geocode(&self, query: &str) -> Result<Vec<Coordinate>, ServiceError> {
        match self {
            #[cfg(feature = "online")]
            Geocoder::Online(g) => g.forward_geocode(query).await,
            Geocoder::Offline(g) => g.forward_geocode(query).await,
        }
    }

    async fn reverse_geocode(&self, coordinate: Coordinate) -> Result<Vec<Place>, ServiceError> {
        match self {
            #[cfg(feature = "online")]
            Geocoder::Online(g) => g.reverse_geocode(coordinate).await,
            Geocoder::Offline(g) => g.reverse_geocode(coordinate).await,
        }
    }
}

enum DeviceLocator {
    #[cfg(feature = "online")]
    Ip(IpDeviceLocator),
    Fixed(StaticDeviceLocator),
}

impl DeviceLocationService for DeviceLocator {
    async fn request_permission(&self) -> Permission {
        match self {
            #[cfg(feature = "online")]
            DeviceLocator::Ip(d) => d.request_permission().await,
            DeviceLocator::Fixed(d) => d.request_permission().await,
        }
    }

    async fn current_coordinate(&self) -> Result<Coordinate, ServiceError> {
        match self {
            #[cfg(feature = "online")]
            DeviceLocator::Ip(d) => d.current_coordinate().await,
            DeviceLocator::Fixed(d) => d.current_coordinate().await,
        }
    }

    fn is_available(&self) -> bool {
        match self {
            #[cfg(feature = "online")]
            DeviceLocator::Ip(d) => d.is_available(),
            DeviceLocator::Fixed(d) => d.is_available(),
        }
    }
}

struct StderrAlerts;

impl AlertChannel for StderrAlerts {
    fn show_message(&mut self, text: &str) {
        eprintln!("{text}");
    }
}

type Controller = MapViewController<Geocoder, DeviceLocator, AsciiMap, StderrAlerts>;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    logging::init_logging(args.verbose);

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<ExitCode> {
    let config = match &args.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };

    let catalog = Arc::new(RegionCatalog::embedded().context("loading region table")?);
    let farms = Arc::new(FarmDataset::embedded().context("loading farm table")?);
    for farm in farms.orphans(&catalog) {
        warn!(id = farm.id, country = %farm.country, "farm country matches no region; it will never be shown");
    }

    if args.list_regions {
        for region in catalog.iter() {
            println!(
                "{:<10} {:<10} risk {:>3} ({})",
                region.key,
                region.display_name,
                region.contamination_level,
                RiskBand::from_level(region.contamination_level)
            );
        }
        return Ok(ExitCode::SUCCESS);
    }

    let normalizer = config.normalizer();
    let geocoder = build_geocoder(&args, &config, &catalog, &normalizer)?;
    let device = build_device_locator(&args, &config)?;
    let resolver = LocationResolver::new(geocoder, device, normalizer, Arc::clone(&catalog));

    let mut controller: Controller = MapViewController::new(
        Arc::new(resolver),
        farms,
        AsciiMap::new(args.width, args.height, &catalog),
        StderrAlerts,
        config.view_settings()?,
    );

    let network_lookup =
        cfg!(feature = "online") && !args.offline && args.lat.is_none() && !args.deny_location;
    if let Some(pending) = controller.mount() {
        if network_lookup {
            eprint!("Looking up your location... ");
        }
        let outcome = pending.run().await;
        // Close the status line before any alert is printed
        if network_lookup {
            eprintln!("{}", if outcome.is_ok() { "done." } else { "failed." });
        }
        controller.apply(outcome);
    }

    let input = match (args.region, args.query) {
        (Some(key), _) => Some(LocationInput::Region(key)),
        (None, Some(text)) => Some(LocationInput::FreeText(text)),
        (None, None) => None,
    };
    let failed = match input {
        Some(input) => matches!(
            controller.search(input, args.species).await,
            Applied::Failed(_)
        ),
        None => {
            controller.select_species(args.species);
            false
        }
    };

    print_summary(&controller);
    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn build_geocoder(
    args: &Args,
    config: &Config,
    catalog: &Arc<RegionCatalog>,
    normalizer: &CountryNormalizer,
) -> anyhow::Result<Geocoder> {
    if args.offline {
        return Ok(Geocoder::Offline(CatalogGeocoder::new(
            Arc::clone(catalog),
            normalizer.clone(),
        )));
    }
    online_geocoder(config, catalog, normalizer)
}

fn build_device_locator(args: &Args, config: &Config) -> anyhow::Result<DeviceLocator> {
    if args.deny_location {
        return Ok(DeviceLocator::Fixed(StaticDeviceLocator::denied()));
    }
    if let (Some(lat), Some(lon)) = (args.lat, args.lon) {
        let here = Coordinate::new(lat, lon);
        anyhow::ensure!(here.is_valid(), "coordinates out of range: {lat}, {lon}");
        return Ok(DeviceLocator::Fixed(StaticDeviceLocator::at(here)));
    }
    if args.offline {
        return Ok(DeviceLocator::Fixed(StaticDeviceLocator::unavailable()));
    }
    online_device_locator(config)
}

#[cfg(feature = "online")]
fn online_geocoder(
    config: &Config,
    _catalog: &Arc<RegionCatalog>,
    _normalizer: &CountryNormalizer,
) -> anyhow::Result<Geocoder> {
    let http = http_client(&config.user_agent, config.request_timeout())?;
    Ok(Geocoder::Online(NominatimGeocoder::new(
        http,
        config.geocoder_url.clone(),
    )))
}

#[cfg(not(feature = "online"))]
fn online_geocoder(
    _config: &Config,
    catalog: &Arc<RegionCatalog>,
    normalizer: &CountryNormalizer,
) -> anyhow::Result<Geocoder> {
    eprintln!("Online geocoding requires the 'online' feature; using the region table.");
    Ok(Geocoder::Offline(CatalogGeocoder::new(
        Arc::clone(catalog),
        normalizer.clone(),
    )))
}

#[cfg(feature = "online")]
fn online_device_locator(config: &Config) -> anyhow::Result<DeviceLocator> {
    let http = http_client(&config.user_agent, config.request_timeout())?;
    Ok(DeviceLocator::Ip(IpDeviceLocator::new(
        http,
        config.geolocation_url.clone(),
        Permission::Granted,
    )))
}

#[cfg(not(feature = "online"))]
fn online_device_locator(_config: &Config) -> anyhow::Result<DeviceLocator> {
    Ok(DeviceLocator::Fixed(StaticDeviceLocator::unavailable()))
}

fn print_summary(controller: &Controller) {
    let state = controller.search_state();
    let catalog = controller.resolver().catalog();

    let species = state
        .selected_species
        .map_or_else(|| "(none)".to_string(), |s| s.to_string());
    let region = match state.selected_region_key.as_deref().and_then(|k| catalog.get(k)) {
        Some(r) => format!(
            "{} (risk level {}, {})",
            r.display_name,
            r.contamination_level,
            RiskBand::from_level(r.contamination_level)
        ),
        None => "(none)".to_string(),
    };

    println!("Species: {species}   Region: {region}");
    println!();
    println!("{}", controller.surface().render());
    println!();
    println!("{}", AsciiMap::legend());

    let farms = controller.visible_farms();
    if farms.is_empty() {
        println!("No farms shown. Pick both a species and a region.");
    } else {
        println!("Farms shown: {}", farms.len());
        for farm in farms {
            println!(
                "  #{:<4} {}  {:<8}  level {:>3} ({})",
                farm.id,
                farm.coordinate,
                farm.species,
                farm.contamination_level,
                RiskBand::from_level(farm.contamination_level)
            );
        }
    }
    if let Some(vp) = &state.viewport {
        println!("Centre: {}", vp.center);
    }
}

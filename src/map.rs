//! Map view controller for the supplier search screen.
//!
//! The controller owns the [`SearchState`] and is the only thing that mutates
//! it. Resolutions are split in three steps so the UI thread never blocks:
//!
//! ```text
//! submit()/mount()  ──► PendingResolution ──run()──► ResolutionOutcome ──► apply()
//!   (UI thread)            (any task)                                    (UI thread)
//! ```
//!
//! Every request gets a generation number and a cancellation token derived
//! from the controller's lifetime token. A newer request cancels the older
//! one, and `apply` drops any outcome that is not from the latest request, so
//! two viewport animations never race.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ResolutionError;
use crate::farm::{Farm, FarmDataset, RiskBand, Species};
use crate::filter::filter_farms;
use crate::geo::{Coordinate, Viewport, ZoomSpan};
use crate::resolver::{
    DeviceLocationService, GeocodingService, LocationInput, LocationResolver, ResolutionResult,
};

/// Viewport transition time for searches.
pub const DEFAULT_ANIMATION: Duration = Duration::from_millis(1000);

/// Outline colour shared by every farm circle.
pub const OVERLAY_STROKE: &str = "rgba(0,0,0,0.2)";

/// A filled circle drawn for one farm.
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub farm_id: u64,
    pub center: Coordinate,
    pub radius_meters: f64,
    pub band: RiskBand,
    pub fill_color: &'static str,
    pub stroke_color: &'static str,
}

impl Overlay {
    /// One kilometre of radius per contamination point.
    pub fn for_farm(farm: &Farm) -> Self {
        let band = RiskBand::from_level(farm.contamination_level);
        Self {
            farm_id: farm.id,
            center: farm.coordinate,
            radius_meters: f64::from(farm.contamination_level) * 1000.0,
            band,
            fill_color: band.fill_color(),
            stroke_color: OVERLAY_STROKE,
        }
    }
}

/// Where the controller draws.
pub trait MapSurface {
    /// Jump without animation.
    fn set_viewport(&mut self, viewport: Viewport);

    fn animate_to(&mut self, viewport: Viewport, duration: Duration);

    /// Replace every farm overlay with `overlays`.
    fn render_overlays(&mut self, overlays: &[Overlay]);
}

/// User-visible error notifications.
pub trait AlertChannel {
    fn show_message(&mut self, text: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// No viewport yet.
    Uninitialized,
    DeviceLocating,
    Ready,
    Searching,
}

/// Everything the user has chosen, plus the current viewport.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchState {
    pub selected_species: Option<Species>,
    /// Always a key present in the region catalog.
    pub selected_region_key: Option<String>,
    pub free_text_query: String,
    pub viewport: Option<Viewport>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewSettings {
    pub zoom_span: ZoomSpan,
    pub animation: Duration,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            zoom_span: ZoomSpan::DEFAULT,
            animation: DEFAULT_ANIMATION,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Purpose {
    Mount,
    Search,
}

/// A resolution handed out by the controller but not yet run.
///
/// Owns everything it needs, so it can be awaited in place or spawned.
pub struct PendingResolution<G, D> {
    generation: u64,
    purpose: Purpose,
    input: LocationInput,
    species: Option<Species>,
    token: CancellationToken,
    resolver: Arc<LocationResolver<G, D>>,
}

impl<G, D> PendingResolution<G, D>
where
    G: GeocodingService,
    D: DeviceLocationService,
{
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Resolve, or stop early if the request is superseded or the view closes.
    pub async fn run(self) -> ResolutionOutcome {
        let result = tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            result = self.resolver.resolve(&self.input) => Some(result),
        };

        ResolutionOutcome {
            generation: self.generation,
            purpose: self.purpose,
            species: self.species,
            result,
        }
    }
}

/// A finished (or cancelled) resolution waiting to be applied.
#[derive(Debug)]
pub struct ResolutionOutcome {
    generation: u64,
    purpose: Purpose,
    species: Option<Species>,
    /// `None` when cancelled before completing.
    result: Option<Result<ResolutionResult, ResolutionError>>,
}

impl ResolutionOutcome {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_cancelled(&self) -> bool {
        self.result.is_none()
    }

    /// Resolved without error.
    pub fn is_ok(&self) -> bool {
        matches!(self.result, Some(Ok(_)))
    }
}

/// What [`MapViewController::apply`] did with an outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    /// Viewport and overlays updated.
    Updated,
    /// The user was alerted; viewport unchanged.
    Failed(ResolutionError),
    /// A newer request superseded this one, or the view is gone.
    Stale,
    Cancelled,
}

pub struct MapViewController<G, D, M, A> {
    resolver: Arc<LocationResolver<G, D>>,
    farms: Arc<FarmDataset>,
    surface: M,
    alerts: A,
    settings: ViewSettings,
    state: ControllerState,
    search: SearchState,
    visible: Vec<Farm>,
    generation: u64,
    /// Latest generation issued when the species was last picked directly.
    species_picked_at: Option<u64>,
    in_flight: Option<CancellationToken>,
    lifetime: CancellationToken,
    mount_attempted: bool,
    location_denied: bool,
}

impl<G, D, M, A> MapViewController<G, D, M, A>
where
    G: GeocodingService,
    D: DeviceLocationService,
    M: MapSurface,
    A: AlertChannel,
{
    pub fn new(
        resolver: Arc<LocationResolver<G, D>>,
        farms: Arc<FarmDataset>,
        surface: M,
        alerts: A,
        settings: ViewSettings,
    ) -> Self {
        Self {
            resolver,
            farms,
            surface,
            alerts,
            settings,
            state: ControllerState::Uninitialized,
            search: SearchState::default(),
            visible: Vec::new(),
            generation: 0,
            species_picked_at: None,
            in_flight: None,
            lifetime: CancellationToken::new(),
            mount_attempted: false,
            location_denied: false,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn search_state(&self) -> &SearchState {
        &self.search
    }

    /// Farms currently drawn, in dataset order.
    pub fn visible_farms(&self) -> &[Farm] {
        &self.visible
    }

    pub fn surface(&self) -> &M {
        &self.surface
    }

    pub fn alerts(&self) -> &A {
        &self.alerts
    }

    pub fn location_denied(&self) -> bool {
        self.location_denied
    }

    pub fn resolver(&self) -> &LocationResolver<G, D> {
        &self.resolver
    }

    /// Start locating the device when the view first appears.
    ///
    /// Happens at most once, and only when the device can locate itself.
    pub fn mount(&mut self) -> Option<PendingResolution<G, D>> {
        if self.mount_attempted
            || self.lifetime.is_cancelled()
            || self.state != ControllerState::Uninitialized
        {
            return None;
        }
        self.mount_attempted = true;

        if !self.resolver.device_available() {
            debug!("device location unavailable; waiting for a search");
            return None;
        }
        self.state = ControllerState::DeviceLocating;
        Some(self.issue(Purpose::Mount, LocationInput::DeviceLocation, None))
    }

    /// Start a user search. `species`, when given, replaces the selected
    /// species once the location resolves.
    pub fn submit(
        &mut self,
        input: LocationInput,
        species: Option<Species>,
    ) -> Option<PendingResolution<G, D>> {
        if self.lifetime.is_cancelled() {
            return None;
        }
        if let LocationInput::FreeText(text) = &input {
            self.search.free_text_query = text.clone();
        }
        self.state = ControllerState::Searching;
        Some(self.issue(Purpose::Search, input, species))
    }

    fn issue(
        &mut self,
        purpose: Purpose,
        input: LocationInput,
        species: Option<Species>,
    ) -> PendingResolution<G, D> {
        if let Some(previous) = self.in_flight.take() {
            debug!(generation = self.generation, "superseding in-flight resolution");
            previous.cancel();
        }
        self.generation += 1;
        let token = self.lifetime.child_token();
        self.in_flight = Some(token.clone());
        debug!(generation = self.generation, ?input, "resolution issued");

        PendingResolution {
            generation: self.generation,
            purpose,
            input,
            species,
            token,
            resolver: Arc::clone(&self.resolver),
        }
    }

    /// Fold a finished resolution into the view.
    pub fn apply(&mut self, outcome: ResolutionOutcome) -> Applied {
        if outcome.generation != self.generation || self.lifetime.is_cancelled() {
            debug!(
                generation = outcome.generation,
                latest = self.generation,
                "dropping stale resolution"
            );
            return Applied::Stale;
        }
        self.in_flight = None;

        let Some(result) = outcome.result else {
            self.state = self.settled_state();
            return Applied::Cancelled;
        };

        match (outcome.purpose, result) {
            (Purpose::Mount, Ok(resolved)) => {
                let viewport = Viewport::new(resolved.coordinate, self.settings.zoom_span);
                info!(center = %resolved.coordinate, "centred on device location");
                self.surface.set_viewport(viewport);
                self.search.viewport = Some(viewport);
                self.state = ControllerState::Ready;
                self.emit_overlays();
                Applied::Updated
            }
            (Purpose::Search, Ok(resolved)) => {
                let viewport = Viewport::new(resolved.coordinate, self.settings.zoom_span);
                info!(
                    center = %resolved.coordinate,
                    region = resolved.matched_region_key.as_deref().unwrap_or("-"),
                    "search resolved"
                );
                self.surface.animate_to(viewport, self.settings.animation);
                self.search.viewport = Some(viewport);
                self.search.selected_region_key = resolved.matched_region_key;
                // A direct pick made while this search ran is newer.
                let picked_since = self
                    .species_picked_at
                    .is_some_and(|at| at >= outcome.generation);
                if let Some(species) = outcome.species.filter(|_| !picked_since) {
                    self.search.selected_species = Some(species);
                }
                self.state = ControllerState::Ready;
                self.emit_overlays();
                Applied::Updated
            }
            (purpose, Err(err)) => {
                if purpose == Purpose::Mount && err == ResolutionError::PermissionDenied {
                    self.location_denied = true;
                }
                self.state = self.settled_state();
                warn!(error = %err, "location resolution failed");
                self.alerts.show_message(&err.user_message());
                Applied::Failed(err)
            }
        }
    }

    /// Change the species filter. Redraws only when the value changes.
    /// Overrides the species carried by any search still in flight.
    pub fn select_species(&mut self, species: Option<Species>) {
        if self.in_flight.is_some() {
            self.species_picked_at = Some(self.generation);
        }
        if self.search.selected_species == species {
            return;
        }
        self.search.selected_species = species;
        self.emit_overlays();
    }

    /// Locate the device and apply the result in one go.
    pub async fn locate_device(&mut self) -> Option<Applied> {
        let pending = self.mount()?;
        let outcome = pending.run().await;
        Some(self.apply(outcome))
    }

    /// Submit, resolve and apply in one go.
    pub async fn search(&mut self, input: LocationInput, species: Option<Species>) -> Applied {
        let Some(pending) = self.submit(input, species) else {
            return Applied::Cancelled;
        };
        let outcome = pending.run().await;
        self.apply(outcome)
    }

    /// The user left the search view. Nothing in flight will be applied.
    pub fn navigate_away(&mut self) {
        self.lifetime.cancel();
        self.in_flight = None;
        self.state = self.settled_state();
        info!("search view closed");
    }

    fn settled_state(&self) -> ControllerState {
        if self.search.viewport.is_some() {
            ControllerState::Ready
        } else {
            ControllerState::Uninitialized
        }
    }

    fn emit_overlays(&mut self) {
        let visible = filter_farms(
            self.farms.farms(),
            self.search.selected_species,
            self.search.selected_region_key.as_deref(),
        );
        let overlays: Vec<Overlay> = visible.iter().map(|f| Overlay::for_farm(f)).collect();
        self.visible = visible.into_iter().cloned().collect();

        debug!(count = overlays.len(), "rendering farm overlays");
        self.surface.render_overlays(&overlays);
    }
}

impl<G, D, M, A> Drop for MapViewController<G, D, M, A> {
    fn drop(&mut self) {
        self.lifetime.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::CountryNormalizer;
    use crate::region::RegionCatalog;
    use crate::services::{CatalogGeocoder, StaticDeviceLocator};

    #[derive(Default)]
    struct Recorder {
        viewports: Vec<Viewport>,
        animations: Vec<(Viewport, Duration)>,
        overlays: Vec<Vec<Overlay>>,
    }

    impl MapSurface for Recorder {
        fn set_viewport(&mut self, viewport: Viewport) {
            self.viewports.push(viewport);
        }

        fn animate_to(&mut self, viewport: Viewport, duration: Duration) {
            self.animations.push((viewport, duration));
        }

        fn render_overlays(&mut self, overlays: &[Overlay]) {
            self.overlays.push(overlays.to_vec());
        }
    }

    #[derive(Default)]
    struct Messages(Vec<String>);

    impl AlertChannel for Messages {
        fn show_message(&mut self, text: &str) {
            self.0.push(text.to_string());
        }
    }

    type Controller = MapViewController<CatalogGeocoder, StaticDeviceLocator, Recorder, Messages>;

    fn controller(device: StaticDeviceLocator) -> Controller {
        let catalog = Arc::new(RegionCatalog::embedded().unwrap());
        let geocoder = CatalogGeocoder::new(Arc::clone(&catalog), CountryNormalizer::default());
        let resolver = LocationResolver::new(geocoder, device, CountryNormalizer::default(), catalog);
        MapViewController::new(
            Arc::new(resolver),
            Arc::new(FarmDataset::embedded().unwrap()),
            Recorder::default(),
            Messages::default(),
            ViewSettings::default(),
        )
    }

    #[test]
    fn overlay_radius_and_colour() {
        let farm = Farm {
            id: 9,
            coordinate: Coordinate::new(60.0, 5.0),
            species: Species::Salmon,
            country: "Norway".into(),
            contamination_level: 65,
        };
        let overlay = Overlay::for_farm(&farm);
        assert_eq!(overlay.radius_meters, 65_000.0);
        assert_eq!(overlay.band, RiskBand::High);
        assert_eq!(overlay.fill_color, "rgba(255,0,0,0.4)");
        assert_eq!(overlay.stroke_color, "rgba(0,0,0,0.2)");
    }

    #[tokio::test]
    async fn mount_centres_on_device() {
        let here = Coordinate::new(57.0, -2.0);
        let mut c = controller(StaticDeviceLocator::at(here));
        assert_eq!(c.state(), ControllerState::Uninitialized);

        assert_eq!(c.locate_device().await, Some(Applied::Updated));
        assert_eq!(c.state(), ControllerState::Ready);
        let vp = c.search_state().viewport.unwrap();
        assert_eq!(vp.center, here);
        assert_eq!(vp.span.latitude_delta(), 10.0);
        assert_eq!(vp.span.longitude_delta(), 10.0);
        assert_eq!(c.surface().viewports, vec![vp]);
        // Nothing selected yet, so nothing drawn.
        assert_eq!(c.surface().overlays, vec![vec![]]);

        // Only once.
        assert!(c.locate_device().await.is_none());
    }

    #[tokio::test]
    async fn mount_denied_stays_uninitialized() {
        let mut c = controller(StaticDeviceLocator::denied());
        assert_eq!(
            c.locate_device().await,
            Some(Applied::Failed(ResolutionError::PermissionDenied))
        );
        assert_eq!(c.state(), ControllerState::Uninitialized);
        assert!(c.location_denied());
        assert_eq!(c.search_state().viewport, None);
        assert_eq!(c.alerts().0, ["Permission to access location was denied"]);
        assert!(c.locate_device().await.is_none());
        assert_eq!(c.alerts().0.len(), 1);
    }

    #[tokio::test]
    async fn mount_skipped_without_capability() {
        let mut c = controller(StaticDeviceLocator::unavailable());
        assert!(c.locate_device().await.is_none());
        assert_eq!(c.state(), ControllerState::Uninitialized);
        assert!(c.alerts().0.is_empty());
    }

    #[tokio::test]
    async fn dropdown_search_animates_and_filters() {
        let mut c = controller(StaticDeviceLocator::unavailable());
        let applied = c
            .search(LocationInput::Region("norway".into()), Some(Species::Salmon))
            .await;
        assert_eq!(applied, Applied::Updated);
        assert_eq!(c.state(), ControllerState::Ready);

        let (vp, duration) = c.surface().animations[0];
        assert_eq!(vp.center, Coordinate::new(60.472, 8.4689));
        assert_eq!(duration, Duration::from_secs(1));

        let ids: Vec<u64> = c.visible_farms().iter().map(|f| f.id).collect();
        assert_eq!(ids, [1, 2, 3]);
        assert_eq!(c.search_state().selected_region_key.as_deref(), Some("norway"));
    }

    #[tokio::test]
    async fn failed_search_keeps_viewport() {
        let mut c = controller(StaticDeviceLocator::unavailable());
        c.search(LocationInput::Region("scotland".into()), None).await;
        let before = c.search_state().viewport;

        let applied = c.search(LocationInput::FreeText("Atlantis".into()), None).await;
        assert!(matches!(applied, Applied::Failed(ResolutionError::NotFound { .. })));
        assert_eq!(c.state(), ControllerState::Ready);
        assert_eq!(c.search_state().viewport, before);
        assert_eq!(c.search_state().selected_region_key.as_deref(), Some("scotland"));
        assert_eq!(c.surface().animations.len(), 1);
        assert_eq!(c.alerts().0.len(), 1);
    }

    #[tokio::test]
    async fn species_change_redraws() {
        let mut c = controller(StaticDeviceLocator::unavailable());
        c.search(LocationInput::Region("england".into()), None).await;
        assert!(c.visible_farms().is_empty());

        c.select_species(Some(Species::SeaBass));
        let ids: Vec<u64> = c.visible_farms().iter().map(|f| f.id).collect();
        assert_eq!(ids, [10, 12, 13]);

        let draws = c.surface().overlays.len();
        c.select_species(Some(Species::SeaBass));
        assert_eq!(c.surface().overlays.len(), draws);
    }

    #[tokio::test]
    async fn species_picked_during_search_is_kept() {
        let mut c = controller(StaticDeviceLocator::unavailable());
        let pending = c
            .submit(LocationInput::Region("norway".into()), Some(Species::Salmon))
            .unwrap();
        c.select_species(Some(Species::Mackerel));

        let outcome = pending.run().await;
        assert!(outcome.is_ok());
        assert_eq!(c.apply(outcome), Applied::Updated);
        assert_eq!(c.search_state().selected_species, Some(Species::Mackerel));
        let ids: Vec<u64> = c.visible_farms().iter().map(|f| f.id).collect();
        assert_eq!(ids, [4]);

        // The next search's species applies again.
        c.search(LocationInput::Region("norway".into()), Some(Species::Salmon))
            .await;
        assert_eq!(c.search_state().selected_species, Some(Species::Salmon));
    }

    #[tokio::test]
    async fn failed_outcome_is_not_ok() {
        let mut c = controller(StaticDeviceLocator::unavailable());
        let pending = c.submit(LocationInput::FreeText("Atlantis".into()), None).unwrap();
        let outcome = pending.run().await;
        assert!(!outcome.is_ok());
        assert!(!outcome.is_cancelled());
        assert!(matches!(c.apply(outcome), Applied::Failed(_)));
    }

    #[tokio::test]
    async fn newer_request_wins() {
        let mut c = controller(StaticDeviceLocator::unavailable());
        let first = c.submit(LocationInput::Region("norway".into()), None).unwrap();
        let second = c.submit(LocationInput::Region("scotland".into()), None).unwrap();
        assert_eq!(c.state(), ControllerState::Searching);

        let first = first.run().await;
        assert!(first.is_cancelled());
        let second = second.run().await;

        assert_eq!(c.apply(second), Applied::Updated);
        assert_eq!(c.apply(first), Applied::Stale);
        assert_eq!(c.surface().animations.len(), 1);
        assert_eq!(c.search_state().selected_region_key.as_deref(), Some("scotland"));
    }

    #[tokio::test]
    async fn navigate_away_cancels() {
        let mut c = controller(StaticDeviceLocator::unavailable());
        let pending = c.submit(LocationInput::Region("norway".into()), None).unwrap();
        c.navigate_away();
        assert_eq!(c.state(), ControllerState::Uninitialized);

        let outcome = pending.run().await;
        assert!(outcome.is_cancelled());
        assert_eq!(c.apply(outcome), Applied::Stale);
        assert!(c.surface().animations.is_empty());
        assert!(c.submit(LocationInput::Region("norway".into()), None).is_none());
    }
}

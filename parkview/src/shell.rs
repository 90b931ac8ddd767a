//! Top level state of the viewer.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::config::ViewerConfig;
use crate::dataset::{ParkDataset, ParkFeature, ParkId};
use crate::diagnostics::DiagnosticRunner;
use crate::health::{Fallback, FetchRecord, StyleHealth, StyleHealthTracker};
use crate::keyboard::{KeyDispatcher, KeySignal, KeySubscription};
use crate::messenger::Messenger;
use crate::style::{StylePreset, StyleRef, StyleResolver};
use crate::surface::{LoggingObserver, MapEvent, MapSurface};
use crate::viewport::ViewportState;

/// What changed during a [`ViewerShell::pump`] call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ShellUpdate {
    /// The active style was replaced.
    pub style_changed: bool,
    /// The selected park changed.
    pub selection_changed: bool,
    /// Health of the active style changed.
    pub health_changed: bool,
    /// Fallback applied during this call.
    pub fallback: Option<Fallback>,
}

impl ShellUpdate {
    /// Whether nothing changed.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Marker to draw on the map.
#[derive(Debug, Clone, Copy)]
pub struct Marker<'a> {
    /// Park the marker stands for.
    pub park: &'a ParkFeature,
    /// Whether the popup of this park is open.
    pub selected: bool,
}

/// Owns the UI state of the viewer and ties the style health tracking to the map surface.
///
/// All methods are called from the UI thread. Background work (diagnostic fetches, the map
/// engine) reports through queues that are applied in [`ViewerShell::pump`].
pub struct ViewerShell {
    config: ViewerConfig,
    dataset: ParkDataset,
    resolver: StyleResolver,
    tracker: StyleHealthTracker,
    surface: MapSurface,
    selected: Option<ParkId>,
    sidebar_visible: bool,
    diagnostics: Option<DiagnosticRunner>,
    diagnosed_generation: Option<u64>,
    keys: Option<KeySubscription>,
    last_fallback: Option<Fallback>,
}

impl ViewerShell {
    /// Creates a shell showing the initial style of the configuration.
    pub fn new(config: ViewerConfig, dataset: ParkDataset) -> Self {
        let style = config.initial_style();
        let tracker = StyleHealthTracker::new(style.clone(), config.baseline_style.clone());

        let mut surface = MapSurface::new(
            style,
            config.credential.clone(),
            config.initial_viewport,
        );
        surface.add_observer(LoggingObserver);
        surface.add_request_observer(LoggingObserver);

        log::info!(
            "Viewer created with {} parks, initial style {}, token present: {}",
            dataset.len(),
            tracker.active_style(),
            config.credential.is_some()
        );
        if config.credential.is_none() {
            log::warn!(
                "No access token found in {}, map tiles will not load",
                crate::config::TOKEN_VARIABLES.join(", ")
            );
        }

        Self {
            resolver: StyleResolver::new(config.style_host.clone()),
            config,
            dataset,
            tracker,
            surface,
            selected: None,
            sidebar_visible: true,
            diagnostics: None,
            diagnosed_generation: None,
            keys: None,
            last_fallback: None,
        }
    }

    /// Enables diagnostic fetches of selected styles.
    pub fn with_diagnostics(mut self, runner: DiagnosticRunner) -> Self {
        self.diagnostics = Some(runner);
        self
    }

    /// Sets the messenger used by the map engine to wake the UI up.
    pub fn set_messenger(&mut self, messenger: Option<Arc<dyn Messenger>>) {
        self.surface.set_messenger(messenger);
    }

    /// Subscribes to key signals and checks the active style.
    pub fn mount(&mut self, keys: &KeyDispatcher) {
        if self.keys.is_none() {
            log::debug!("Viewer mounted");
        }

        self.keys = Some(keys.subscribe());
        self.check_active_style();
    }

    /// Releases the key subscription.
    pub fn unmount(&mut self) {
        if self.keys.take().is_some() {
            log::debug!("Viewer unmounted");
        }
    }

    /// Whether the shell listens to key signals.
    pub fn is_mounted(&self) -> bool {
        self.keys.is_some()
    }

    /// Makes `style` active. Health starts over even if the style is the same as before.
    ///
    /// Returns the handle of the diagnostic fetch if one was started.
    pub fn select_style(&mut self, style: StyleRef) -> Option<JoinHandle<()>> {
        log::info!("Switching style to {style}");

        let ticket = self.tracker.select(style.clone());
        self.surface.set_style(style, ticket.generation());
        self.check_active_style()
    }

    /// Starts a diagnostic fetch of the active style, unless one was already started for the
    /// current selection or the style has nothing to fetch.
    pub fn check_active_style(&mut self) -> Option<JoinHandle<()>> {
        let runner = self.diagnostics.as_ref()?;
        let ticket = self.tracker.ticket();
        if self.diagnosed_generation == Some(ticket.generation()) {
            return None;
        }

        let Some(url) = self
            .resolver
            .diagnostic_url(ticket.style(), self.surface.credential())
        else {
            log::debug!("Style {} cannot be resolved, skipping diagnostics", ticket.style());
            return None;
        };

        self.diagnosed_generation = Some(ticket.generation());
        Some(runner.spawn(url, ticket))
    }

    /// Style currently requested for rendering.
    pub fn active_style(&self) -> &StyleRef {
        self.tracker.active_style()
    }

    /// Health of the active style.
    pub fn health(&self) -> StyleHealth {
        self.tracker.health()
    }

    /// The last fallback applied, if any.
    pub fn last_fallback(&self) -> Option<&Fallback> {
        self.last_fallback.as_ref()
    }

    /// Opens the popup of the park, replacing any open popup. Returns `false` for unknown ids.
    pub fn select_park(&mut self, id: &ParkId) -> bool {
        if self.dataset.get(id).is_none() {
            log::warn!("Cannot select unknown park {id}");
            return false;
        }

        if self.selected.as_ref() != Some(id) {
            log::debug!("Park {id} selected");
            self.selected = Some(id.clone());
        }

        true
    }

    /// Closes the popup. Returns `true` if a park was selected.
    pub fn clear_selection(&mut self) -> bool {
        match self.selected.take() {
            Some(id) => {
                log::debug!("Selection of park {id} cleared");
                true
            }
            None => false,
        }
    }

    /// Id of the selected park.
    pub fn selected_park(&self) -> Option<&ParkId> {
        self.selected.as_ref()
    }

    /// Shows or hides the inspector panel.
    pub fn toggle_sidebar(&mut self) {
        self.sidebar_visible = !self.sidebar_visible;
    }

    /// Whether the inspector panel is shown.
    pub fn sidebar_visible(&self) -> bool {
        self.sidebar_visible
    }

    /// Records the viewport reported by the map widget.
    pub fn update_viewport(&mut self, viewport: ViewportState) -> bool {
        self.surface.report_viewport(viewport)
    }

    /// Last known viewport.
    pub fn viewport(&self) -> ViewportState {
        self.surface.viewport()
    }

    /// Applies everything that happened since the last call: key signals first, then diagnostic
    /// results, then map engine events.
    pub fn pump(&mut self) -> ShellUpdate {
        let mut update = ShellUpdate::default();

        let signals = self
            .keys
            .as_ref()
            .map(KeySubscription::drain)
            .unwrap_or_default();
        for signal in signals {
            match signal {
                KeySignal::Escape => update.selection_changed |= self.clear_selection(),
            }
        }

        let health = self.tracker.health();

        while let Some(report) = self.diagnostics.as_mut().and_then(DiagnosticRunner::try_next) {
            if let FetchRecord::FallBack(fallback) =
                self.tracker.record_fetch(&report.ticket, &report.outcome)
            {
                self.apply_fallback(fallback, &mut update);
                break;
            }
        }

        if update.fallback.is_none() {
            for event in self.surface.take_events() {
                let MapEvent::Error(error) = event else {
                    continue;
                };

                log::debug!("Render error for {}: {error}", self.active_style());
                if let Some(fallback) = self.tracker.record_render_error() {
                    self.apply_fallback(fallback, &mut update);

                    // The rest of the batch belongs to the replaced style.
                    break;
                }
            }
        }

        update.health_changed = update.style_changed || self.tracker.health() != health;
        update
    }

    fn apply_fallback(&mut self, fallback: Fallback, update: &mut ShellUpdate) {
        log::warn!(
            "Style {} is broken, switching to {}",
            fallback.from,
            fallback.to
        );
        self.select_style(fallback.to.clone());
        self.last_fallback = Some(fallback.clone());
        update.style_changed = true;
        update.fallback = Some(fallback);
    }

    /// One marker per park, in dataset order.
    pub fn markers(&self) -> impl Iterator<Item = Marker<'_>> + '_ {
        self.dataset.iter().map(|park| Marker {
            park,
            selected: self.selected.as_ref() == Some(&park.id),
        })
    }

    /// Park whose popup is open.
    pub fn popup(&self) -> Option<&ParkFeature> {
        self.selected.as_ref().and_then(|id| self.dataset.get(id))
    }

    /// Styles offered in the inspector.
    pub fn presets(&self) -> &[StylePreset] {
        &self.config.presets
    }

    /// Whether an access token is configured.
    pub fn token_present(&self) -> bool {
        self.surface.credential().is_some()
    }

    /// Parks shown on the map.
    pub fn dataset(&self) -> &ParkDataset {
        &self.dataset
    }

    /// Resolves styles to service URLs.
    pub fn resolver(&self) -> &StyleResolver {
        &self.resolver
    }

    /// The map surface.
    pub fn surface(&self) -> &MapSurface {
        &self.surface
    }

    /// The map surface, mutably.
    pub fn surface_mut(&mut self) -> &mut MapSurface {
        &mut self.surface
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use tokio::runtime::Handle;

    use super::*;
    use crate::dataset::tests::TWO_PARKS;
    use crate::diagnostics::tests::{ok, status, ManualFetcher};
    use crate::style::AccessToken;
    use crate::surface::EngineError;

    const CUSTOM: &str = "mapbox://styles/someone/custom";
    const OTHER: &str = "mapbox://styles/someone/other";

    fn api_url(path: &str) -> String {
        format!("https://api.mapbox.com/styles/v1/{path}?access_token=tok")
    }

    fn config(custom: Option<&str>) -> ViewerConfig {
        ViewerConfig {
            credential: AccessToken::new("tok"),
            custom_style: custom.map(StyleRef::new),
            ..Default::default()
        }
    }

    fn shell(custom: Option<&str>) -> ViewerShell {
        let dataset = ParkDataset::from_json(TWO_PARKS).expect("valid dataset");
        ViewerShell::new(config(custom), dataset)
    }

    fn render_error(shell: &ViewerShell) {
        shell
            .surface()
            .handle()
            .emit(MapEvent::Error(EngineError::with_status("Forbidden", 403)));
    }

    #[test]
    fn escape_clears_selection() {
        let keys = KeyDispatcher::new();
        let mut shell = shell(None);
        shell.mount(&keys);

        assert!(shell.select_park(&"2".into()));
        assert_eq!(shell.popup().map(|park| park.name.as_str()), Some("East Plaza"));

        keys.dispatch(KeySignal::Escape);
        let update = shell.pump();

        assert!(update.selection_changed);
        assert_eq!(shell.selected_park(), None);
        assert!(shell.popup().is_none());
    }

    #[test]
    fn unmounted_shell_ignores_escape() {
        let keys = KeyDispatcher::new();
        let mut shell = shell(None);
        shell.mount(&keys);
        assert!(shell.is_mounted());
        shell.unmount();
        assert!(!shell.is_mounted());
        assert_eq!(keys.subscriber_count(), 0);

        shell.select_park(&"1".into());
        keys.dispatch(KeySignal::Escape);
        assert!(shell.pump().is_empty());
        assert_eq!(shell.selected_park(), Some(&ParkId::from("1")));
    }

    #[test]
    fn selection_replaces() {
        let mut shell = shell(None);
        assert!(shell.select_park(&"1".into()));
        assert!(shell.select_park(&"2".into()));
        assert!(!shell.select_park(&"3".into()));

        let selected: Vec<_> = shell
            .markers()
            .filter(|marker| marker.selected)
            .map(|marker| marker.park.id.as_str())
            .collect();
        assert_eq!(selected, vec!["2"]);

        assert!(shell.clear_selection());
        assert!(!shell.clear_selection());
    }

    #[test]
    fn sidebar_toggles() {
        let mut shell = shell(None);
        assert!(shell.sidebar_visible());
        shell.toggle_sidebar();
        assert!(!shell.sidebar_visible());
        shell.toggle_sidebar();
        assert!(shell.sidebar_visible());
    }

    #[test]
    fn initial_style() {
        assert_eq!(shell(None).active_style(), &StyleRef::baseline());
        assert_eq!(shell(Some(CUSTOM)).active_style().as_str(), CUSTOM);
        assert!(shell(None).token_present());
        assert_eq!(shell(None).presets().len(), 5);
    }

    #[test]
    fn render_error_without_diagnostics_keeps_style() {
        let mut shell = shell(Some(CUSTOM));
        render_error(&shell);
        render_error(&shell);

        let update = shell.pump();
        assert_eq!(update.fallback, None);
        assert!(update.health_changed);
        assert_eq!(shell.active_style().as_str(), CUSTOM);
        assert_eq!(shell.health(), StyleHealth::Unhealthy);
    }

    #[tokio::test]
    async fn stale_fetch_does_not_touch_new_style() {
        let fetcher = Arc::new(ManualFetcher::default());
        let release_a = fetcher.expect(&api_url("someone/custom"));
        let release_b = fetcher.expect(&api_url("someone/other"));

        let mut shell =
            shell(None).with_diagnostics(DiagnosticRunner::new(fetcher, Handle::current()));

        let task_a = shell
            .select_style(StyleRef::new(CUSTOM))
            .expect("fetch started");
        let task_b = shell
            .select_style(StyleRef::new(OTHER))
            .expect("fetch started");

        release_a.send(ok("{}")).expect("receiver alive");
        task_a.await.expect("task finished");
        shell.pump();

        assert_eq!(shell.active_style().as_str(), OTHER);
        assert_eq!(shell.health(), StyleHealth::Unknown);

        release_b
            .send(status(404, r#"{ "message": "Style not found" }"#))
            .expect("receiver alive");
        task_b.await.expect("task finished");

        assert!(shell.pump().health_changed);
        assert_eq!(shell.health(), StyleHealth::Unhealthy);
    }

    #[tokio::test]
    async fn confirmed_failure_falls_back_once() {
        let fetcher = Arc::new(ManualFetcher::default());
        let release = fetcher.expect(&api_url("someone/custom"));
        let release_baseline = fetcher.expect(&api_url("mapbox/streets-v11"));

        let mut shell = shell(Some(CUSTOM))
            .with_diagnostics(DiagnosticRunner::new(fetcher, Handle::current()));

        let task = shell.check_active_style().expect("fetch started");
        assert!(shell.check_active_style().is_none());

        release
            .send(status(401, r#"{ "message": "Not Authorized" }"#))
            .expect("receiver alive");
        task.await.expect("task finished");
        shell.pump();
        assert_eq!(shell.health(), StyleHealth::Unhealthy);

        render_error(&shell);
        render_error(&shell);
        let update = shell.pump();

        assert!(update.style_changed);
        assert_matches!(
            update.fallback,
            Some(Fallback { from, to }) if from.as_str() == CUSTOM && to == StyleRef::baseline()
        );
        assert_eq!(shell.active_style(), &StyleRef::baseline());
        assert_eq!(shell.health(), StyleHealth::Unknown);
        assert!(shell.last_fallback().is_some());

        // The second error was reported for the replaced style.
        assert!(shell.pump().is_empty());

        release_baseline
            .send(status(500, "oops"))
            .expect("receiver alive");
        render_error(&shell);
        assert_eq!(shell.pump().fallback, None);
        assert_eq!(shell.active_style(), &StyleRef::baseline());
    }

    async fn broken_custom_style(render_error_first: bool) {
        let fetcher = Arc::new(ManualFetcher::default());
        let release = fetcher.expect(&api_url("someone/custom"));
        let _baseline = fetcher.expect(&api_url("mapbox/streets-v11"));

        let mut shell = shell(Some(CUSTOM))
            .with_diagnostics(DiagnosticRunner::new(fetcher, Handle::current()));
        let task = shell.check_active_style().expect("fetch started");

        // The engine reports a single error per loaded style.
        let engine = shell.surface().handle();
        let tile_error = || {
            engine.emit(MapEvent::Error(EngineError::with_status(
                "tile request failed: Unauthorized",
                401,
            )))
        };

        if render_error_first {
            tile_error();
            let update = shell.pump();
            assert_eq!(update.fallback, None);
            assert_eq!(shell.health(), StyleHealth::Unhealthy);
        }

        release
            .send(status(401, r#"{ "message": "Not Authorized - Invalid Token" }"#))
            .expect("receiver alive");
        task.await.expect("task finished");

        if !render_error_first {
            assert_eq!(shell.pump().fallback, None);
            assert_eq!(shell.health(), StyleHealth::Unhealthy);
            tile_error();
        }

        let update = shell.pump();
        assert!(update.style_changed);
        assert_matches!(update.fallback, Some(Fallback { from, .. }) if from.as_str() == CUSTOM);
        assert_eq!(shell.active_style(), &StyleRef::baseline());
        assert_eq!(shell.health(), StyleHealth::Unknown);

        tile_error();
        assert!(shell.pump().is_empty());
        assert_eq!(shell.active_style(), &StyleRef::baseline());
    }

    #[tokio::test]
    async fn render_error_before_failed_fetch_falls_back() {
        broken_custom_style(true).await;
    }

    #[tokio::test]
    async fn failed_fetch_before_render_error_falls_back() {
        broken_custom_style(false).await;
    }

    #[tokio::test]
    async fn unresolvable_style_is_not_fetched() {
        let fetcher = Arc::new(ManualFetcher::default());
        let mut shell =
            shell(None).with_diagnostics(DiagnosticRunner::new(fetcher, Handle::current()));

        assert!(shell.select_style(StyleRef::new("ftp://nowhere")).is_none());
        assert_eq!(shell.health(), StyleHealth::Unknown);
    }

    #[test]
    fn events_of_replaced_style_are_ignored() {
        let mut shell = shell(Some(CUSTOM));
        let old = shell.surface().handle();

        shell.select_style(StyleRef::new(OTHER));
        old.emit(MapEvent::Error(EngineError::new("late tile error")));

        assert!(shell.pump().is_empty());
        assert_eq!(shell.health(), StyleHealth::Unknown);
    }

    #[test]
    fn events_of_previous_selection_of_same_style_are_ignored() {
        let mut shell = shell(Some(CUSTOM));
        let old = shell.surface().handle();

        shell.select_style(StyleRef::new(CUSTOM));
        assert_ne!(shell.surface().generation(), old.generation());
        old.emit(MapEvent::Error(EngineError::with_status("Unauthorized", 401)));

        assert!(shell.pump().is_empty());
        assert_eq!(shell.health(), StyleHealth::Unknown);

        render_error(&shell);
        assert!(shell.pump().health_changed);
        assert_eq!(shell.health(), StyleHealth::Unhealthy);
    }

    #[test]
    fn closing_popup_deselects_marker() {
        let mut shell = shell(None);
        shell.select_park(&"1".into());
        assert_eq!(shell.popup().map(|park| park.id.as_str()), Some("1"));

        assert!(shell.clear_selection());
        assert!(shell.popup().is_none());
        assert!(shell.markers().all(|marker| !marker.selected));
    }

    #[test]
    fn viewport_updates() {
        let mut shell = shell(None);
        let viewport = ViewportState::new(45.5, -75.5, 12.0);
        assert!(shell.update_viewport(viewport));
        assert!(!shell.update_viewport(viewport));
        assert_eq!(shell.viewport(), viewport);
    }
}

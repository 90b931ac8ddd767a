//! Boundary between the viewer and the map engine.
//!
//! The engine runs its work on whatever threads it likes and reports back through a
//! [`SurfaceHandle`]. The handle is bound to the style selection that was active when it was
//! created, so events of a replaced selection can be recognized and dropped. Selecting the same
//! style again is a new selection.

use std::fmt::{Display, Formatter};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::messenger::Messenger;
use crate::style::{redact, AccessToken, StyleRef};
use crate::viewport::ViewportState;

/// Error reported by the map engine. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct EngineError {
    /// Description of the error.
    pub message: String,
    /// HTTP status if the error came from a failed request.
    pub status: Option<u16>,
}

impl EngineError {
    /// Creates an error without a status.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
        }
    }

    /// Creates an error for a failed request.
    pub fn with_status(message: impl Into<String>, status: u16) -> Self {
        Self {
            message: message.into(),
            status: Some(status),
        }
    }
}

/// Lifecycle signal of the map engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapEvent {
    /// The style and its sources are fully loaded.
    StyleLoaded,
    /// The style definition changed.
    StyleData {
        /// Whether the style is completely loaded.
        loaded: bool,
    },
    /// A data source changed.
    SourceData {
        /// Id of the source.
        source_id: String,
        /// Whether the source is completely loaded.
        loaded: bool,
    },
    /// Something went wrong while rendering.
    Error(EngineError),
}

/// Kind of a resource requested by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Style definition.
    Style,
    /// Map tile.
    Tile,
    /// Anything else.
    Other,
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ResourceKind::Style => "Style",
            ResourceKind::Tile => "Tile",
            ResourceKind::Other => "Other",
        })
    }
}

/// Outgoing request of the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRequest {
    /// What is being requested.
    pub kind: ResourceKind,
    /// Request url.
    pub url: String,
}

/// Receives lifecycle events on the UI thread.
pub trait MapEventObserver: Send + Sync {
    /// Called for every event of the active style.
    fn on_event(&self, style: &StyleRef, event: &MapEvent);
}

/// Sees every request the engine makes. Observers cannot change the request.
pub trait RequestObserver: Send + Sync {
    /// Called before the request is sent, possibly from a background thread.
    fn on_request(&self, request: &ResourceRequest);
}

/// Writes engine events and requests to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl MapEventObserver for LoggingObserver {
    fn on_event(&self, style: &StyleRef, event: &MapEvent) {
        match event {
            MapEvent::StyleLoaded => log::info!("Style {style} fully loaded"),
            MapEvent::StyleData { loaded } => {
                log::debug!("Style data of {style} updated, loaded={loaded}")
            }
            MapEvent::SourceData { source_id, loaded } => {
                log::debug!("Source {source_id} of {style} updated, loaded={loaded}")
            }
            MapEvent::Error(error) => log::error!("Map error for {style}: {error}"),
        }
    }
}

impl RequestObserver for LoggingObserver {
    fn on_request(&self, request: &ResourceRequest) {
        log::trace!("Request {} {}", request.kind, redact(&request.url));
    }
}

type TaggedEvent = (u64, StyleRef, MapEvent);

/// Engine side of the surface: reports events and requests for one style selection.
#[derive(Clone)]
pub struct SurfaceHandle {
    style: StyleRef,
    generation: u64,
    sender: UnboundedSender<TaggedEvent>,
    request_observers: Arc<[Arc<dyn RequestObserver>]>,
    messenger: Option<Arc<dyn Messenger>>,
}

impl SurfaceHandle {
    /// Style this handle reports for.
    pub fn style(&self) -> &StyleRef {
        &self.style
    }

    /// Selection generation this handle reports for.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Queues an event for the UI thread.
    pub fn emit(&self, event: MapEvent) {
        let tagged = (self.generation, self.style.clone(), event);
        if self.sender.send(tagged).is_err() {
            log::debug!("Map surface is gone, dropping event for {}", self.style);
            return;
        }

        if let Some(messenger) = &self.messenger {
            messenger.request_redraw();
        }
    }

    /// Shows the request to the request observers.
    pub fn observe_request(&self, request: &ResourceRequest) {
        for observer in self.request_observers.iter() {
            observer.on_request(request);
        }
    }
}

/// Viewer side of the map engine.
///
/// Holds the style to render, the credential and the last viewport reported by the map widget.
pub struct MapSurface {
    style: StyleRef,
    generation: u64,
    credential: Option<AccessToken>,
    viewport: ViewportState,
    sender: UnboundedSender<TaggedEvent>,
    receiver: UnboundedReceiver<TaggedEvent>,
    observers: Vec<Arc<dyn MapEventObserver>>,
    request_observers: Vec<Arc<dyn RequestObserver>>,
    messenger: Option<Arc<dyn Messenger>>,
}

impl MapSurface {
    /// Creates a new surface showing the first selection (generation 0) of `style`.
    pub fn new(style: StyleRef, credential: Option<AccessToken>, viewport: ViewportState) -> Self {
        let (sender, receiver) = unbounded_channel();
        Self {
            style,
            generation: 0,
            credential,
            viewport,
            sender,
            receiver,
            observers: Vec::new(),
            request_observers: Vec::new(),
            messenger: None,
        }
    }

    /// Adds an observer of lifecycle events.
    pub fn add_observer(&mut self, observer: impl MapEventObserver + 'static) {
        self.observers.push(Arc::new(observer));
    }

    /// Adds an observer of engine requests. Only handles created afterwards see it.
    pub fn add_request_observer(&mut self, observer: impl RequestObserver + 'static) {
        self.request_observers.push(Arc::new(observer));
    }

    /// Sets the messenger used by handles to wake the UI up.
    pub fn set_messenger(&mut self, messenger: Option<Arc<dyn Messenger>>) {
        self.messenger = messenger;
    }

    /// Style requested for rendering.
    pub fn style(&self) -> &StyleRef {
        &self.style
    }

    /// Generation of the style selection being rendered.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Replaces the style selection. Handles of the previous selection keep working, but their
    /// events are dropped from then on, even if `style` is the same as before.
    pub fn set_style(&mut self, style: StyleRef, generation: u64) {
        self.style = style;
        self.generation = generation;
    }

    /// Access token for the engine.
    pub fn credential(&self) -> Option<&AccessToken> {
        self.credential.as_ref()
    }

    /// Last reported viewport.
    pub fn viewport(&self) -> ViewportState {
        self.viewport
    }

    /// Records a viewport change made by the user. Returns `true` if it differs from the last one.
    pub fn report_viewport(&mut self, viewport: ViewportState) -> bool {
        if self.viewport == viewport {
            return false;
        }

        log::trace!("Viewport changed to {viewport:?}");
        self.viewport = viewport;
        true
    }

    /// Creates a handle for the engine bound to the current style selection.
    pub fn handle(&self) -> SurfaceHandle {
        SurfaceHandle {
            style: self.style.clone(),
            generation: self.generation,
            sender: self.sender.clone(),
            request_observers: self.request_observers.iter().cloned().collect(),
            messenger: self.messenger.clone(),
        }
    }

    /// Drains queued events of the current selection, notifying observers on the way. Events of
    /// replaced selections are dropped.
    pub fn take_events(&mut self) -> Vec<MapEvent> {
        let mut events = Vec::new();
        while let Ok((generation, style, event)) = self.receiver.try_recv() {
            if generation != self.generation {
                log::debug!(
                    "Dropping {event:?} of replaced style {style} (generation {generation})"
                );
                continue;
            }

            for observer in &self.observers {
                observer.on_event(&style, &event);
            }
            events.push(event);
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<MapEvent>>,
        requests: Mutex<Vec<ResourceRequest>>,
    }

    impl MapEventObserver for Arc<Recorder> {
        fn on_event(&self, _style: &StyleRef, event: &MapEvent) {
            self.events.lock().push(event.clone());
        }
    }

    impl RequestObserver for Arc<Recorder> {
        fn on_request(&self, request: &ResourceRequest) {
            self.requests.lock().push(request.clone());
        }
    }

    fn surface() -> MapSurface {
        MapSurface::new(
            "mapbox://styles/a/first".into(),
            AccessToken::new("tok"),
            ViewportState::default(),
        )
    }

    #[test]
    fn relays_events_of_active_style() {
        let recorder = Arc::new(Recorder::default());
        let mut surface = surface();
        surface.add_observer(recorder.clone());

        let handle = surface.handle();
        handle.emit(MapEvent::StyleData { loaded: false });
        handle.emit(MapEvent::SourceData {
            source_id: "a/first".into(),
            loaded: true,
        });
        handle.emit(MapEvent::StyleLoaded);

        let events = surface.take_events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[2], MapEvent::StyleLoaded);
        assert_eq!(*recorder.events.lock(), events);
        assert!(surface.take_events().is_empty());
    }

    #[test]
    fn drops_events_of_replaced_style() {
        let mut surface = surface();
        let old = surface.handle();

        surface.set_style("mapbox://styles/a/second".into(), 1);
        let new = surface.handle();
        assert_eq!(new.generation(), 1);

        old.emit(MapEvent::Error(EngineError::new("tile failed")));
        new.emit(MapEvent::StyleLoaded);

        assert_eq!(surface.take_events(), vec![MapEvent::StyleLoaded]);
    }

    #[test]
    fn drops_events_of_replaced_selection_of_same_style() {
        let mut surface = surface();
        let old = surface.handle();

        surface.set_style("mapbox://styles/a/first".into(), 1);
        old.emit(MapEvent::Error(EngineError::with_status("Unauthorized", 401)));
        assert!(surface.take_events().is_empty());

        surface.handle().emit(MapEvent::StyleLoaded);
        assert_eq!(surface.take_events(), vec![MapEvent::StyleLoaded]);
    }

    #[test]
    fn requests_are_observed_unchanged() {
        let recorder = Arc::new(Recorder::default());
        let mut surface = surface();
        surface.add_request_observer(recorder.clone());
        surface.add_request_observer(LoggingObserver);

        let request = ResourceRequest {
            kind: ResourceKind::Tile,
            url: "https://api.mapbox.com/styles/v1/a/first/tiles/256/0/0/0?access_token=tok"
                .into(),
        };
        surface.handle().observe_request(&request);

        assert_eq!(*recorder.requests.lock(), vec![request]);
    }

    #[test]
    fn viewport_changes() {
        let mut surface = surface();
        assert!(!surface.report_viewport(ViewportState::default()));
        assert!(surface.report_viewport(ViewportState::new(45.0, -75.0, 11.0)));
        assert_eq!(surface.viewport().zoom, 11.0);
    }
}

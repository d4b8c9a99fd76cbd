//! Host-facing controller.
//!
//! Bridges UI refresh and validate requests into a [`CaptchaSession`],
//! schedules rasterization as a deferred task, and notifies observers.
//! Everything runs on the caller's thread; nothing here blocks.

use super::code::CaptchaCode;
use super::session::{CaptchaSession, ValidationResult};
use crate::config::{CaptchaConfig, CaptchaError, Result};
use crate::render::{CaptchaRenderer, RenderedCaptchaImage};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// Handle returned by [`CaptchaController::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// State change delivered to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChangeEvent {
    /// A new code replaced the previous one; its image is pending.
    Refreshed { serial: u64 },
    /// Rasterization for the current code finished. `has_image` is false
    /// when no surface was available and the widget fell back to no image.
    Rendered { serial: u64, has_image: bool },
    Disposed,
}

#[derive(Debug, Clone, Default)]
pub enum RenderStatus {
    /// No code yet.
    #[default]
    Idle,
    /// A rasterization task is scheduled for the current code.
    Pending,
    /// Rendering settled, with or without an image.
    Ready(Option<Arc<RenderedCaptchaImage>>),
}

impl RenderStatus {
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

/// One-shot rasterization scheduled by a refresh.
struct DeferredRaster {
    serial: u64,
    text: String,
    due_at: SystemTime,
}

impl DeferredRaster {
    /// A due time further out than one settle delay means the clock moved
    /// backwards after scheduling; such a task runs immediately.
    fn is_due(&self, now: SystemTime, settle_delay: Duration) -> bool {
        self.due_at <= now
            || now
                .checked_add(settle_delay)
                .is_some_and(|latest| self.due_at > latest)
    }
}

type Observer = Box<dyn FnMut(&ChangeEvent)>;

pub struct CaptchaController {
    session: CaptchaSession,
    renderer: CaptchaRenderer,
    deferred: VecDeque<DeferredRaster>,
    observers: Vec<(SubscriptionId, Observer)>,
    next_subscription: u64,
    on_code_generated: Option<Box<dyn FnMut(&str)>>,
    status: RenderStatus,
    disposed: bool,
}

impl CaptchaController {
    /// Creates a controller with a wall-clock session and its own renderer.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` for an invalid config, or
    /// `RenderingUnavailable` if fonts cannot be loaded.
    pub fn new(config: CaptchaConfig) -> Result<Self> {
        let config = Arc::new(config);
        let session = CaptchaSession::new(Arc::clone(&config))?;
        let renderer = CaptchaRenderer::new(config)?;
        Ok(Self::from_parts(session, renderer))
    }

    /// Assembles a controller from an existing session and renderer.
    #[must_use]
    pub fn from_parts(session: CaptchaSession, renderer: CaptchaRenderer) -> Self {
        Self {
            session,
            renderer,
            deferred: VecDeque::new(),
            observers: Vec::new(),
            next_subscription: 1,
            on_code_generated: None,
            status: RenderStatus::Idle,
            disposed: false,
        }
    }

    /// Registers a callback invoked with every freshly generated code text.
    #[must_use]
    pub fn on_code_generated(mut self, callback: impl FnMut(&str) + 'static) -> Self {
        self.on_code_generated = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn config(&self) -> &Arc<CaptchaConfig> {
        self.session.config()
    }

    #[must_use]
    pub fn session(&self) -> &CaptchaSession {
        &self.session
    }

    #[must_use]
    pub fn current_code(&self) -> Option<&CaptchaCode> {
        self.session.current()
    }

    #[must_use]
    pub fn status(&self) -> &RenderStatus {
        &self.status
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Number of rasterization tasks not yet run.
    #[must_use]
    pub fn pending_tasks(&self) -> usize {
        self.deferred.len()
    }

    /// Adds an observer for state changes.
    ///
    /// # Errors
    ///
    /// Returns `Disposed` after [`CaptchaController::dispose`].
    pub fn subscribe(
        &mut self,
        observer: impl FnMut(&ChangeEvent) + 'static,
    ) -> Result<SubscriptionId> {
        self.ensure_live()?;
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push((id, Box::new(observer)));
        Ok(id)
    }

    /// Removes an observer. Returns whether it was registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sub, _)| *sub != id);
        self.observers.len() != before
    }

    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Generates a new code and schedules its rasterization.
    ///
    /// Any task still pending for an older code is dropped, so the queue
    /// holds at most one task.
    ///
    /// # Errors
    ///
    /// Returns `Disposed` after disposal.
    pub fn refresh(&mut self) -> Result<&CaptchaCode> {
        self.ensure_live()?;
        let code = self.session.refresh()?.clone();

        let due_at = self.session.now() + self.config().settle_delay;
        self.renderer.invalidate();
        self.status = RenderStatus::Pending;
        let stale = self.deferred.len();
        if stale > 0 {
            debug!(
                stale,
                serial = code.serial,
                "Dropping superseded captcha rasterizations"
            );
        }
        self.deferred.clear();
        self.deferred.push_back(DeferredRaster {
            serial: code.serial,
            text: code.text.clone(),
            due_at,
        });

        if let Some(callback) = self.on_code_generated.as_mut() {
            callback(&code.text);
        }
        self.notify(&ChangeEvent::Refreshed {
            serial: code.serial,
        });

        self.session.current().ok_or(CaptchaError::NotInitialized)
    }

    /// Checks `input` against the current code.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` before the first refresh and `Disposed`
    /// after disposal.
    pub fn validate(&self, input: &str) -> Result<ValidationResult> {
        self.ensure_live()?;
        self.session.validate(input)
    }

    /// Runs every rasterization task whose settle delay has elapsed.
    ///
    /// Hosts call this once their layout pass completes. Tasks scheduled for
    /// a code that has since been replaced are dropped. A task that cannot
    /// rasterize marks the widget ready without an image. Returns the number
    /// of tasks that produced a status change.
    pub fn run_deferred(&mut self) -> usize {
        if self.disposed {
            return 0;
        }
        let now = self.session.now();
        let settle_delay = self.config().settle_delay;
        let (due, waiting): (VecDeque<_>, VecDeque<_>) = std::mem::take(&mut self.deferred)
            .into_iter()
            .partition(|task| task.is_due(now, settle_delay));
        self.deferred = waiting;
        let mut settled = 0;

        for task in due {
            let Some(code) = self.session.current().cloned() else {
                continue;
            };
            if code.serial != task.serial || code.text != task.text {
                debug!(
                    task_serial = task.serial,
                    current_serial = code.serial,
                    "Discarding stale captcha rasterization"
                );
                continue;
            }
            if self.status.is_ready() {
                continue;
            }
            self.settle(&code);
            settled += 1;
        }
        settled
    }

    /// Renders the current code immediately, skipping the settle delay.
    ///
    /// Returns the cached image when one exists. The scheduled task for this
    /// code becomes a no-op.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` before the first refresh, `Disposed` after
    /// disposal, or `RenderingUnavailable` if no surface can be produced.
    pub fn render_now(&mut self) -> Result<Arc<RenderedCaptchaImage>> {
        self.ensure_live()?;
        let code = self
            .session
            .current()
            .cloned()
            .ok_or(CaptchaError::NotInitialized)?;
        let was_pending = !self.status.is_ready();
        let image = self.renderer.render(&code)?;
        self.status = RenderStatus::Ready(Some(Arc::clone(&image)));
        if was_pending {
            self.notify(&ChangeEvent::Rendered {
                serial: code.serial,
                has_image: true,
            });
        }
        Ok(image)
    }

    /// Cached image for the current code, for cheap repaints.
    #[must_use]
    pub fn image(&self) -> Option<Arc<RenderedCaptchaImage>> {
        self.session
            .current()
            .and_then(|code| self.renderer.cached(code))
    }

    /// Releases observers, pending tasks, and the cached image.
    ///
    /// Observers receive a final [`ChangeEvent::Disposed`]. Idempotent; also
    /// runs on drop.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.notify(&ChangeEvent::Disposed);
        self.observers.clear();
        self.deferred.clear();
        self.renderer.invalidate();
        self.on_code_generated = None;
        self.status = RenderStatus::Idle;
        self.disposed = true;
        debug!("Captcha controller disposed");
    }

    fn settle(&mut self, code: &CaptchaCode) {
        let image = match self.renderer.render(code) {
            Ok(image) => Some(image),
            Err(e) => {
                warn!(
                    serial = code.serial,
                    error = %e,
                    "Captcha rasterization unavailable, continuing without image"
                );
                None
            }
        };
        let has_image = image.is_some();
        self.status = RenderStatus::Ready(image);
        self.notify(&ChangeEvent::Rendered {
            serial: code.serial,
            has_image,
        });
    }

    fn notify(&mut self, event: &ChangeEvent) {
        for (_, observer) in &mut self.observers {
            observer(event);
        }
    }

    fn ensure_live(&self) -> Result<()> {
        if self.disposed {
            Err(CaptchaError::Disposed)
        } else {
            Ok(())
        }
    }
}

impl Drop for CaptchaController {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::captcha::{Clock, ManualClock};
    use crate::config::Alphabet;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    fn controller_with(config: CaptchaConfig) -> (CaptchaController, ManualClock) {
        let config = Arc::new(config);
        let clock = ManualClock::default();
        let session = CaptchaSession::with_parts(
            Arc::clone(&config),
            clock.clone(),
            StdRng::seed_from_u64(1),
        )
        .unwrap();
        let renderer = CaptchaRenderer::with_rng(config, StdRng::seed_from_u64(2)).unwrap();
        (CaptchaController::from_parts(session, renderer), clock)
    }

    fn small_config() -> CaptchaConfig {
        let mut config = CaptchaConfig::new(120.0, 40.0);
        config.alphabet = Alphabet::new("ABC123").unwrap();
        config.length = 4;
        config
    }

    fn recorder(controller: &mut CaptchaController) -> Rc<RefCell<Vec<ChangeEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        controller
            .subscribe(move |event| sink.borrow_mut().push(event.clone()))
            .unwrap();
        events
    }

    #[test]
    fn test_refresh_notifies_and_schedules() {
        let (mut controller, _) = controller_with(small_config());
        let events = recorder(&mut controller);
        assert!(matches!(controller.status(), RenderStatus::Idle));

        let serial = controller.refresh().unwrap().serial;
        assert!(matches!(controller.status(), RenderStatus::Pending));
        assert_eq!(controller.pending_tasks(), 1);
        assert_eq!(*events.borrow(), vec![ChangeEvent::Refreshed { serial }]);
        assert!(controller.image().is_none());

        assert_eq!(controller.run_deferred(), 1);
        assert_eq!(controller.pending_tasks(), 0);
        assert!(controller.image().is_some());
        assert_eq!(
            events.borrow().last(),
            Some(&ChangeEvent::Rendered {
                serial,
                has_image: true
            })
        );
    }

    #[test]
    fn test_settle_delay_defers_rasterization() {
        let mut config = small_config();
        config.settle_delay = Duration::from_millis(100);
        let (mut controller, clock) = controller_with(config);

        controller.refresh().unwrap();
        assert_eq!(controller.run_deferred(), 0);
        assert!(matches!(controller.status(), RenderStatus::Pending));

        clock.advance(Duration::from_millis(100));
        assert_eq!(controller.run_deferred(), 1);
        assert!(controller.status().is_ready());
    }

    #[test]
    fn test_stale_task_discarded() {
        let mut config = small_config();
        config.settle_delay = Duration::from_millis(10);
        let (mut controller, clock) = controller_with(config);
        let events = recorder(&mut controller);

        let first = controller.refresh().unwrap().serial;
        let second = controller.refresh().unwrap().serial;
        assert_eq!(controller.pending_tasks(), 1);

        clock.advance(Duration::from_millis(10));
        assert_eq!(controller.run_deferred(), 1);

        let rendered: Vec<_> = events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                ChangeEvent::Rendered { serial, .. } => Some(*serial),
                _ => None,
            })
            .collect();
        assert_eq!(rendered, vec![second]);
        assert_ne!(first, second);
        assert_eq!(controller.image().unwrap().serial(), second);
    }

    #[test]
    fn test_refresh_without_pumping_keeps_one_task() {
        let (mut controller, _) = controller_with(small_config());
        for _ in 0..1_000 {
            controller.refresh().unwrap();
        }
        assert_eq!(controller.pending_tasks(), 1);
        assert_eq!(controller.run_deferred(), 1);
        assert_eq!(controller.pending_tasks(), 0);
    }

    #[test]
    fn test_clock_moving_backwards_between_refreshes() {
        let mut config = small_config();
        config.settle_delay = Duration::from_millis(16);
        let (mut controller, clock) = controller_with(config);

        controller.refresh().unwrap();
        clock.set(clock.now() - Duration::from_secs(3600));
        let serial = controller.refresh().unwrap().serial;
        clock.advance(Duration::from_secs(5));

        assert_eq!(controller.run_deferred(), 1);
        assert_eq!(controller.pending_tasks(), 0);
        assert!(controller.status().is_ready());
        assert_eq!(controller.image().unwrap().serial(), serial);
    }

    #[test]
    fn test_clock_moving_backwards_after_refresh() {
        let mut config = small_config();
        config.settle_delay = Duration::from_millis(16);
        let (mut controller, clock) = controller_with(config);

        controller.refresh().unwrap();
        clock.set(clock.now() - Duration::from_secs(3600));

        assert_eq!(controller.run_deferred(), 1);
        assert!(controller.status().is_ready());
    }

    #[test]
    fn test_repaint_returns_cached_image() {
        let (mut controller, _) = controller_with(small_config());
        controller.refresh().unwrap();
        controller.run_deferred();

        let a = controller.image().unwrap();
        let b = controller.image().unwrap();
        let c = controller.render_now().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_refresh_never_reuses_previous_image() {
        let (mut controller, _) = controller_with(small_config());
        controller.refresh().unwrap();
        let first = controller.render_now().unwrap();

        controller.refresh().unwrap();
        assert!(controller.image().is_none());
        let second = controller.render_now().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_render_now_makes_deferred_task_noop() {
        let (mut controller, _) = controller_with(small_config());
        let events = recorder(&mut controller);
        controller.refresh().unwrap();
        controller.render_now().unwrap();

        assert_eq!(controller.run_deferred(), 0);
        let rendered = events
            .borrow()
            .iter()
            .filter(|e| matches!(e, ChangeEvent::Rendered { .. }))
            .count();
        assert_eq!(rendered, 1);
    }

    #[test]
    fn test_unavailable_surface_falls_back_to_ready() {
        let (mut controller, _) = controller_with(CaptchaConfig::new(60_000.0, 60_000.0));
        let events = recorder(&mut controller);
        let serial = controller.refresh().unwrap().serial;

        assert_eq!(controller.run_deferred(), 1);
        assert!(matches!(controller.status(), RenderStatus::Ready(None)));
        assert!(controller.image().is_none());
        assert_eq!(
            events.borrow().last(),
            Some(&ChangeEvent::Rendered {
                serial,
                has_image: false
            })
        );
    }

    #[test]
    fn test_oversized_font_falls_back_to_ready() {
        let mut config = small_config();
        config.font_size = Some(40_000.0);
        let (mut controller, _) = controller_with(config);
        controller.refresh().unwrap();

        assert!(matches!(
            controller.render_now(),
            Err(CaptchaError::RenderingUnavailable(_))
        ));
        assert_eq!(controller.run_deferred(), 1);
        assert!(matches!(controller.status(), RenderStatus::Ready(None)));
    }

    #[test]
    fn test_code_generated_callback() {
        let seen = Rc::new(RefCell::new(Vec::<String>::new()));
        let sink = Rc::clone(&seen);
        let (controller, _) = controller_with(small_config());
        let mut controller =
            controller.on_code_generated(move |text| sink.borrow_mut().push(text.to_string()));

        let first = controller.refresh().unwrap().text.clone();
        let second = controller.refresh().unwrap().text.clone();
        assert_eq!(*seen.borrow(), vec![first, second]);
    }

    #[test]
    fn test_unsubscribe() {
        let (mut controller, _) = controller_with(small_config());
        let count = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&count);
        let id = controller.subscribe(move |_| *sink.borrow_mut() += 1).unwrap();

        controller.refresh().unwrap();
        assert!(controller.unsubscribe(id));
        assert!(!controller.unsubscribe(id));
        controller.refresh().unwrap();
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn test_validate_through_controller() {
        let (mut controller, clock) = controller_with(small_config());
        assert_eq!(controller.validate("A1C2"), Err(CaptchaError::NotInitialized));

        let text = controller.refresh().unwrap().text.clone();
        assert_eq!(
            controller.validate(&text.to_lowercase()).unwrap(),
            ValidationResult::Valid
        );
        clock.advance(Duration::from_secs(601));
        assert_eq!(
            controller.validate(&text).unwrap(),
            ValidationResult::CodeExpired
        );
    }

    #[test]
    fn test_dispose_releases_everything() {
        let (mut controller, _) = controller_with(small_config());
        let events = recorder(&mut controller);
        controller.refresh().unwrap();

        controller.dispose();
        assert!(controller.is_disposed());
        assert_eq!(controller.observer_count(), 0);
        assert_eq!(controller.pending_tasks(), 0);
        assert_eq!(events.borrow().last(), Some(&ChangeEvent::Disposed));
        assert_eq!(controller.refresh().err(), Some(CaptchaError::Disposed));
        assert_eq!(controller.validate("x"), Err(CaptchaError::Disposed));
        assert!(controller.subscribe(|_| {}).is_err());
        assert_eq!(controller.run_deferred(), 0);

        controller.dispose();
        let disposed = events
            .borrow()
            .iter()
            .filter(|e| **e == ChangeEvent::Disposed)
            .count();
        assert_eq!(disposed, 1);
    }

    #[test]
    fn test_drop_notifies_disposed() {
        let (mut controller, _) = controller_with(small_config());
        let events = recorder(&mut controller);
        drop(controller);
        assert_eq!(*events.borrow(), vec![ChangeEvent::Disposed]);
    }

    #[test]
    fn test_change_event_serialization() {
        let json = serde_json::to_string(&ChangeEvent::Rendered {
            serial: 3,
            has_image: true,
        })
        .unwrap();
        assert_eq!(json, r#"{"event":"rendered","serial":3,"has_image":true}"#);
    }
}

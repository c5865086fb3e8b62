// wwwidget-core/src/controller.rs
use crate::input::is_interrupt_key;
use crate::{
    BuildError, ConstructionError, ControllerSettings, DashboardConfig, DisplayGuard, DisplayMode,
    InputEvent, InputSource, Interrupt, OutputReceiver, SkippedSection, WindowLayout,
    WorkerHandle, WorkerId, WorkerRegistry, output_channel,
};
use crossterm::event::{KeyCode, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::{Terminal, backend::Backend};
use std::io;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Init,
    Running,
    ShuttingDown,
}

/// Pane found under the most recent pointer press
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointerHit {
    pub worker: WorkerId,
    pub column: u16,
    pub row: u16,
}

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("cannot enter terminal display mode: {0}")]
    Display(#[source] io::Error),
}

/// What the loop does after an input event
enum Flow {
    Continue,
    Redraw,
    Quit,
}

/// The single loop that owns the terminal.
///
/// Drains worker output into the window layout, draws it, and dispatches
/// input. It never blocks on a worker; the only wait is the bounded input
/// poll.
pub struct Controller<B: Backend, I: InputSource, M: DisplayMode> {
    state: ControllerState,
    settings: ControllerSettings,
    terminal: Terminal<B>,
    input: I,
    display: DisplayGuard<M>,
    interrupt: Interrupt,
    layout: WindowLayout,
    workers: Vec<WorkerHandle>,
    output: OutputReceiver,
    skipped: Vec<SkippedSection>,
    last_pointer_hit: Option<PointerHit>,
    backlog_warned: bool,
}

impl<B: Backend, I: InputSource, M: DisplayMode> Controller<B, I, M> {
    /// Build every section, allocate its pane, enter the display mode and
    /// start the workers. Sections that fail are reported by
    /// [`Controller::skipped`] and never stop the others.
    pub fn init(
        config: &DashboardConfig,
        registry: &WorkerRegistry,
        terminal: Terminal<B>,
        input: I,
        display: M,
        interrupt: Interrupt,
    ) -> Result<Self, ControllerError> {
        let mut state = ControllerState::Init;
        debug!(?state, sections = config.sections().len(), "initializing dashboard");

        let report = registry.build_all(config);
        let mut skipped = report.skipped;
        let mut layout = WindowLayout::new();
        let mut ready = Vec::new();

        for (id, worker) in report.workers {
            match layout.allocate(id.clone(), worker.geometry(), worker.label()) {
                Ok(_) => ready.push((id, worker)),
                Err(source) => {
                    warn!(worker = %id, error = %source, "cannot allocate window, skipping");
                    skipped.push(SkippedSection {
                        name: id.to_string(),
                        reason: BuildError::Construction(ConstructionError::Geometry {
                            section: id.to_string(),
                            source,
                        }),
                    });
                }
            }
        }

        let display = DisplayGuard::enter(display).map_err(ControllerError::Display)?;

        let (sender, output) = output_channel();
        let mut workers = Vec::with_capacity(ready.len());
        for (id, worker) in ready {
            match WorkerHandle::spawn(id.clone(), worker, sender.clone()) {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    error!(worker = %id, error = %e, "cannot start worker thread");
                    layout.remove(&id);
                }
            }
        }

        state = ControllerState::Running;
        info!(
            workers = workers.len(),
            skipped = skipped.len(),
            "dashboard started"
        );

        Ok(Self {
            state,
            settings: config.controller.clone(),
            terminal,
            input,
            display,
            interrupt,
            layout,
            workers,
            output,
            skipped,
            last_pointer_hit: None,
            backlog_warned: false,
        })
    }

    /// Run until the quit key or an interrupt. The terminal is restored and
    /// the workers are stopped before this returns, on error too.
    pub fn run(&mut self) -> Result<(), ControllerError> {
        let result = self.run_loop();
        if let Err(e) = &result {
            error!(error = %e, "controller loop failed");
        }
        self.shutdown();
        result
    }

    fn run_loop(&mut self) -> Result<(), ControllerError> {
        if self.state != ControllerState::Running {
            return Ok(());
        }
        self.present()?;
        while self.tick()? {}
        Ok(())
    }

    /// One loop iteration. Returns false once the controller is shutting down.
    pub fn tick(&mut self) -> Result<bool, ControllerError> {
        if self.state != ControllerState::Running {
            return Ok(false);
        }
        if self.interrupt.is_triggered() {
            info!("interrupt received");
            self.shutdown();
            return Ok(false);
        }

        // Pending output must not wait behind the input poll
        let timeout = if self.output.backlog() > 0 {
            Duration::ZERO
        } else {
            self.settings.poll_interval()
        };

        let mut redraw = false;
        if let Some(event) = self.input.poll_event(timeout)? {
            match self.handle_input(event)? {
                Flow::Continue => {}
                Flow::Redraw => redraw = true,
                Flow::Quit => {
                    info!("quit requested");
                    self.shutdown();
                    return Ok(false);
                }
            }
        }

        if self.drain() {
            redraw = true;
        }
        if redraw {
            self.present()?;
        }
        Ok(true)
    }

    fn handle_input(&mut self, event: InputEvent) -> Result<Flow, ControllerError> {
        match event {
            InputEvent::Key(key) => {
                let quit = key.code == KeyCode::Char(self.settings.quit_key)
                    && !key.modifiers.contains(KeyModifiers::CONTROL);
                if quit || is_interrupt_key(&key) {
                    return Ok(Flow::Quit);
                }
                debug!(?key, "key ignored");
                Ok(Flow::Continue)
            }
            InputEvent::Mouse(mouse) => {
                self.pointer(mouse);
                Ok(Flow::Continue)
            }
            InputEvent::Resize(width, height) => {
                debug!(width, height, "terminal resized");
                self.terminal.clear()?;
                Ok(Flow::Redraw)
            }
        }
    }

    fn pointer(&mut self, mouse: MouseEvent) {
        if !matches!(mouse.kind, MouseEventKind::Down(_)) {
            return;
        }
        let Some(pane) = self.layout.resolve(mouse.column, mouse.row) else {
            debug!(column = mouse.column, row = mouse.row, "pointer press outside any pane");
            return;
        };

        let hit = PointerHit {
            worker: pane.id().clone(),
            column: mouse.column,
            row: mouse.row,
        };
        info!(worker = %hit.worker, column = hit.column, row = hit.row, "pointer hit");

        if let Some(handle) = self.workers.iter().find(|h| h.id() == &hit.worker)
            && handle.accepts_input()
            && !handle.send_input(InputEvent::Mouse(mouse))
        {
            debug!(worker = %hit.worker, "worker no longer takes input");
        }
        self.last_pointer_hit = Some(hit);
    }

    /// Apply up to `max_batches_per_tick` pending batches. Returns whether
    /// any pane changed.
    fn drain(&mut self) -> bool {
        let backlog = self.output.backlog();
        if backlog > self.settings.backlog_warning {
            if !self.backlog_warned {
                warn!(backlog, "output backlog above threshold, rendering is falling behind");
                self.backlog_warned = true;
            }
        } else {
            self.backlog_warned = false;
        }

        let mut changed = false;
        for _ in 0..self.settings.max_batches_per_tick.max(1) {
            let Some(message) = self.output.try_take() else {
                break;
            };
            let Some(pane) = self.layout.get_mut(&message.worker) else {
                warn!(worker = %message.worker, "batch from unknown worker dropped");
                continue;
            };

            let report = pane.apply(&message.label, &message.batch);
            if !report.is_clean() {
                for (index, e) in &report.failures {
                    warn!(worker = %message.worker, index, error = %e, "skipped malformed command");
                }
                debug!(
                    worker = %message.worker,
                    applied = report.applied,
                    skipped = report.failures.len(),
                    "batch partially applied"
                );
            }
            changed = true;
        }
        changed
    }

    fn present(&mut self) -> Result<(), ControllerError> {
        let layout = &self.layout;
        self.terminal.draw(|frame| layout.render(frame.buffer_mut()))?;
        Ok(())
    }

    /// Restore the terminal, then stop and join the workers within the
    /// configured grace period. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.state == ControllerState::ShuttingDown {
            return;
        }
        self.state = ControllerState::ShuttingDown;

        if let Err(e) = self.display.restore() {
            warn!(error = %e, "failed to restore terminal");
        }

        for handle in &mut self.workers {
            handle.request_stop();
        }
        let deadline = Instant::now() + self.settings.shutdown_grace();
        let detached = self
            .workers
            .iter_mut()
            .map(|handle| handle.join_until(deadline))
            .filter(|joined| !joined)
            .count();
        info!(detached, "dashboard stopped");
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn layout(&self) -> &WindowLayout {
        &self.layout
    }

    pub fn terminal(&self) -> &Terminal<B> {
        &self.terminal
    }

    pub fn last_pointer_hit(&self) -> Option<&PointerHit> {
        self.last_pointer_hit.as_ref()
    }

    /// Ids of the started workers, in section order
    pub fn worker_ids(&self) -> Vec<&WorkerId> {
        self.workers.iter().map(|h| h.id()).collect()
    }

    pub fn skipped(&self) -> &[SkippedSection] {
        &self.skipped
    }

    /// Batches waiting to be applied
    pub fn backlog(&self) -> usize {
        self.output.backlog()
    }
}

impl<B: Backend, I: InputSource, M: DisplayMode> Drop for Controller<B, I, M> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Cadence, ClassifyError, FromSection, Geometry, OutputBatch, SectionConfig, WireArg,
        WireCommand, Worker, WorkerContext, WorkerError, register_worker,
    };
    use crossterm::event::{KeyEvent, MouseButton};
    use ratatui::backend::TestBackend;
    use serde::Deserialize;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::thread;

    /// Test worker: prints `text`, optionally counts clicks
    struct Static {
        geometry: Geometry,
        settings: StaticSettings,
        produced: usize,
        clicks: usize,
    }

    #[derive(Deserialize)]
    struct StaticSettings {
        #[serde(default = "default_text")]
        text: String,
        #[serde(default)]
        interactive: bool,
        #[serde(default)]
        bogus: bool,
        #[serde(default = "default_batches")]
        batches: usize,
    }

    fn default_text() -> String {
        "hello".to_string()
    }

    fn default_batches() -> usize {
        1
    }

    impl FromSection for Static {
        fn from_section(section: &SectionConfig) -> Result<Self, ConstructionError> {
            Ok(Self {
                geometry: section.geometry()?,
                settings: section.settings()?,
                produced: 0,
                clicks: 0,
            })
        }
    }

    impl Worker for Static {
        fn geometry(&self) -> Geometry {
            self.geometry
        }

        fn label(&self) -> String {
            format!("clicks {}", self.clicks)
        }

        fn produce(&mut self, _ctx: &WorkerContext) -> Result<OutputBatch, WorkerError> {
            self.produced += 1;
            let mut batch = OutputBatch::new();
            batch.write_text(0, 0, &self.settings.text);
            if self.settings.bogus {
                batch.push_raw(WireCommand::new(
                    "Bogus",
                    vec![WireArg::Int(1), WireArg::Int(2), WireArg::Int(3)],
                ));
                batch.write_text(1, 0, "still ok");
            }
            Ok(batch)
        }

        fn cadence(&self) -> Cadence {
            if self.produced < self.settings.batches {
                Cadence::Every(Duration::ZERO)
            } else {
                Cadence::OnInput
            }
        }

        fn accepts_input(&self) -> bool {
            self.settings.interactive
        }

        fn accept_input(&mut self, _event: InputEvent) {
            self.clicks += 1;
        }
    }

    /// Replays queued events and errors. When `idle` is set an empty queue
    /// blocks for the poll timeout like a real terminal would.
    #[derive(Clone, Default)]
    struct ScriptedInput {
        events: Arc<Mutex<VecDeque<io::Result<InputEvent>>>>,
        idle: Arc<AtomicBool>,
    }

    impl ScriptedInput {
        fn push(&self, event: InputEvent) {
            self.events.lock().unwrap().push_back(Ok(event));
        }

        fn fail(&self, reason: &str) {
            self.events
                .lock()
                .unwrap()
                .push_back(Err(io::Error::other(reason.to_string())));
        }

        fn wait_when_empty(&self) {
            self.idle.store(true, Ordering::SeqCst);
        }
    }

    impl InputSource for ScriptedInput {
        fn poll_event(&mut self, timeout: Duration) -> io::Result<Option<InputEvent>> {
            let next = self.events.lock().unwrap().pop_front();
            match next {
                Some(event) => event.map(Some),
                None => {
                    if self.idle.load(Ordering::SeqCst) {
                        thread::sleep(timeout);
                    }
                    Ok(None)
                }
            }
        }
    }

    #[derive(Clone, Default)]
    struct CountingDisplay {
        restored: Arc<AtomicUsize>,
    }

    impl DisplayMode for CountingDisplay {
        fn enter(&mut self) -> io::Result<()> {
            Ok(())
        }

        fn restore(&mut self) -> io::Result<()> {
            self.restored.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    type TestController = Controller<TestBackend, ScriptedInput, CountingDisplay>;

    struct Harness {
        controller: TestController,
        input: ScriptedInput,
        display: CountingDisplay,
        interrupt: Interrupt,
    }

    fn harness(toml: &str) -> Harness {
        harness_with(toml, Interrupt::new())
    }

    fn harness_with(toml: &str, interrupt: Interrupt) -> Harness {
        let mut registry = WorkerRegistry::new();
        register_worker!(registry, "Static", Static).unwrap();
        let config = DashboardConfig::from_toml_str(toml).unwrap();

        let input = ScriptedInput::default();
        let display = CountingDisplay::default();
        let controller = Controller::init(
            &config,
            &registry,
            Terminal::new(TestBackend::new(40, 12)).unwrap(),
            input.clone(),
            display.clone(),
            interrupt.clone(),
        )
        .unwrap();

        Harness {
            controller,
            input,
            display,
            interrupt,
        }
    }

    fn row(controller: &TestController, y: u16) -> String {
        let buffer = controller.terminal().backend().buffer();
        (0..buffer.area.width)
            .map(|x| buffer[(x, y)].symbol())
            .collect()
    }

    /// Tick until `done` holds, failing after a few seconds
    fn tick_until(controller: &mut TestController, mut done: impl FnMut(&TestController) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done(controller) {
            assert!(Instant::now() < deadline, "condition not reached");
            assert!(controller.tick().unwrap());
            thread::sleep(Duration::from_millis(1));
        }
    }

    fn key(c: char) -> InputEvent {
        InputEvent::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE))
    }

    fn press(column: u16, row: u16) -> InputEvent {
        InputEvent::Mouse(MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column,
            row,
            modifiers: KeyModifiers::NONE,
        })
    }

    const SINGLE: &str = r#"
[Static_main]
x = 0
y = 0
width = 20
height = 10

[Unknown_foo]
x = 0
y = 0
width = 20
height = 10
"#;

    #[test]
    fn test_end_to_end_quit() {
        let Harness {
            mut controller,
            input,
            display,
            ..
        } = harness(SINGLE);

        assert_eq!(controller.state(), ControllerState::Running);
        assert_eq!(controller.worker_ids(), [&WorkerId::from("Static_main")]);
        assert_eq!(controller.skipped().len(), 1);
        assert_eq!(controller.skipped()[0].name, "Unknown_foo");
        assert!(matches!(
            controller.skipped()[0].reason,
            BuildError::Classify(ClassifyError::NoMatch(_))
        ));

        tick_until(&mut controller, |c| row(c, 1).starts_with("│hello"));
        assert!(row(&controller, 0).starts_with("┌─clicks 0"));

        input.push(key('q'));
        assert!(!controller.tick().unwrap());
        assert_eq!(controller.state(), ControllerState::ShuttingDown);
        assert_eq!(display.restored.load(Ordering::SeqCst), 1);

        controller.shutdown();
        drop(controller);
        assert_eq!(display.restored.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_interrupt_restores_once() {
        let Harness {
            mut controller,
            display,
            interrupt,
            ..
        } = harness(SINGLE);

        assert!(controller.tick().unwrap());
        interrupt.trigger();
        assert!(!controller.tick().unwrap());
        assert_eq!(controller.state(), ControllerState::ShuttingDown);
        assert!(!controller.tick().unwrap());
        assert!(controller.run().is_ok());

        drop(controller);
        assert_eq!(display.restored.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_run_returns_after_interrupt() {
        let Harness {
            mut controller,
            display,
            interrupt,
            ..
        } = harness(SINGLE);

        interrupt.trigger();
        controller.run().unwrap();
        assert_eq!(controller.state(), ControllerState::ShuttingDown);
        assert_eq!(display.restored.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_input_error_restores_before_returning() {
        let Harness {
            mut controller,
            input,
            display,
            ..
        } = harness(SINGLE);

        input.fail("tty gone");
        let err = controller.run().err().unwrap();
        assert!(matches!(err, ControllerError::Io(_)));
        assert_eq!(err.to_string(), "IO error: tty gone");
        assert_eq!(controller.state(), ControllerState::ShuttingDown);
        assert_eq!(display.restored.load(Ordering::SeqCst), 1);

        drop(controller);
        assert_eq!(display.restored.load(Ordering::SeqCst), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_sigint_stops_run() {
        use signal_hook::consts::signal::SIGINT;

        let interrupt = Interrupt::install().unwrap();
        let Harness {
            mut controller,
            input,
            display,
            ..
        } = harness_with(SINGLE, interrupt);
        input.wait_when_empty();

        let raiser = thread::spawn(|| {
            thread::sleep(Duration::from_millis(100));
            signal_hook::low_level::raise(SIGINT).unwrap();
        });
        let started = Instant::now();
        controller.run().unwrap();
        raiser.join().unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(controller.state(), ControllerState::ShuttingDown);
        assert_eq!(display.restored.load(Ordering::SeqCst), 1);

        drop(controller);
        assert_eq!(display.restored.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_malformed_command_is_skipped() {
        let Harness { mut controller, .. } = harness(
            r#"
[Static_bogus]
x = 0
y = 0
width = 20
height = 5
text = "ok"
bogus = true
"#,
        );

        tick_until(&mut controller, |c| row(c, 2).starts_with("│still ok"));
        assert!(row(&controller, 1).starts_with("│ok "));
    }

    #[test]
    fn test_pointer_hit_resolves_topmost_pane() {
        let Harness {
            mut controller,
            input,
            ..
        } = harness(
            r#"
[Static_below]
x = 0
y = 0
width = 20
height = 8

[Static_above]
x = 10
y = 4
width = 20
height = 8
interactive = true
"#,
        );

        input.push(press(2, 2));
        tick_until(&mut controller, |c| c.last_pointer_hit().is_some());
        assert_eq!(
            controller.last_pointer_hit(),
            Some(&PointerHit {
                worker: WorkerId::from("Static_below"),
                column: 2,
                row: 2,
            })
        );

        // Overlap goes to the pane allocated last, border cells included
        input.push(press(10, 4));
        assert!(controller.tick().unwrap());
        assert_eq!(
            controller.last_pointer_hit().map(|h| h.worker.as_str()),
            Some("Static_above")
        );

        // The interactive worker saw the click and produced again
        tick_until(&mut controller, |c| row(c, 4).contains("clicks 1"));

        input.push(press(39, 0));
        assert!(controller.tick().unwrap());
        assert_eq!(
            controller.last_pointer_hit().map(|h| h.worker.as_str()),
            Some("Static_above")
        );
    }

    #[test]
    fn test_drains_one_batch_per_tick() {
        let Harness { mut controller, .. } = harness(
            r#"
[Static_burst]
x = 0
y = 0
width = 20
height = 5
batches = 5
"#,
        );

        let deadline = Instant::now() + Duration::from_secs(5);
        while controller.backlog() < 5 {
            assert!(Instant::now() < deadline, "worker did not produce its burst");
            thread::sleep(Duration::from_millis(1));
        }

        for remaining in (0..5).rev() {
            assert!(controller.tick().unwrap());
            assert_eq!(controller.backlog(), remaining);
        }
    }

    #[test]
    fn test_small_geometry_is_skipped() {
        let Harness { controller, .. } = harness(
            r#"
[Static_tiny]
x = 0
y = 0
width = 2
height = 2

[Static_ok]
x = 0
y = 0
width = 10
height = 3
"#,
        );

        assert_eq!(controller.worker_ids(), [&WorkerId::from("Static_ok")]);
        assert_eq!(controller.layout().len(), 1);
        assert_eq!(controller.skipped()[0].name, "Static_tiny");
    }
}

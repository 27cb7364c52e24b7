//! Execution contexts.
//!
//! A [`Context`] is one audio-graph session. It owns a clock (through its
//! timing strategy), an [`EventScheduler`] and the graph provider, and looks
//! the same to callers in both modes:
//!
//! ```ignore
//! use saavy_clock::{graph::SoftwareGraph, Context};
//!
//! let mut ctx = Context::offline(2, 0.02, 44_100, Box::new(SoftwareGraph::new(44_100)))?;
//! ctx.on_tick(|time| {
//!     println!("tick at {time}");
//!     Ok(())
//! });
//! let buffer = ctx.render().await?; // ticks at 0, 0.005, 0.01, 0.015, 0.02
//! ```
//!
//! The strategy is picked once, in the constructor. Every later call goes
//! through the [`TimingStrategy`] object without looking at the mode again.
//!
//! The async operations complete without ever suspending. They are deferred
//! results for interface uniformity between the two modes; awaiting them does
//! not order them relative to other async work.

/// Offline driver, render job and strategy.
pub mod offline;
/// Construction parameters.
pub mod options;
/// Hardware-clock strategy.
pub mod realtime;

pub use offline::{DriverState, OfflineRenderDriver, OfflineStrategy, RenderJob, MAX_RENDER_FRAMES};
pub use options::{ContextMode, ContextOptions};
pub use realtime::RealtimeStrategy;

use crate::{
    dsp::ShaperCurve,
    engine::{
        EventScheduler, ListenerFailure, ListenerResult, MonotonicSource, SchedulerHandle,
        SubscriptionId, SystemMonotonic,
    },
    graph::{GraphPrimitiveProvider, NodeHandle, RenderedBuffer},
    io::stream::MediaStream,
    Error, Result, Seconds,
};

/// Lifecycle of a context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Suspended,
    Running,
    Closed,
}

/// Mode-specific behaviour behind the context façade
pub trait TimingStrategy {
    fn mode(&self) -> ContextMode;

    fn state(&self) -> ContextState;

    fn now(&self) -> Seconds;

    /// Granularity of the underlying clock
    fn tick_increment(&self) -> Seconds;

    fn resume(&mut self) -> Result<()>;

    fn suspend(&mut self) -> Result<()>;

    /// Run due notification passes; returns how many ran
    fn poll(&mut self, scheduler: &EventScheduler, failures: &mut Vec<ListenerFailure>) -> usize;

    fn close(&mut self, graph: &mut dyn GraphPrimitiveProvider) -> Result<()>;

    /// Offline only
    fn render(
        &mut self,
        _scheduler: &EventScheduler,
        _graph: &mut dyn GraphPrimitiveProvider,
        _failures: &mut Vec<ListenerFailure>,
    ) -> Result<RenderedBuffer> {
        Err(Error::InvalidMode {
            operation: "render",
            mode: self.mode(),
        })
    }
}

/// One audio-graph session, realtime or offline
pub struct Context {
    strategy: Box<dyn TimingStrategy>,
    scheduler: EventScheduler,
    graph: Box<dyn GraphPrimitiveProvider>,
    sample_rate: u32,
    channel_count: u16,
    failures: Vec<ListenerFailure>,
}

impl Context {
    /// Build a context; realtime contexts read the system monotonic clock
    pub fn new(options: ContextOptions, graph: Box<dyn GraphPrimitiveProvider>) -> Result<Self> {
        Self::with_time_source(options, graph, Box::new(SystemMonotonic::new()))
    }

    /// Build a context whose realtime clock reads `source`
    ///
    /// Offline contexts run on their own synthetic clock and drop `source`.
    pub fn with_time_source(
        options: ContextOptions,
        graph: Box<dyn GraphPrimitiveProvider>,
        source: Box<dyn MonotonicSource>,
    ) -> Result<Self> {
        options.validate()?;
        if graph.sample_rate() != options.sample_rate {
            return Err(Error::InvalidConfig {
                field: "sample_rate",
                reason: format!(
                    "context runs at {} Hz but the graph runs at {} Hz",
                    options.sample_rate,
                    graph.sample_rate()
                ),
            });
        }

        let strategy: Box<dyn TimingStrategy> = match options.mode {
            ContextMode::Realtime => Box::new(RealtimeStrategy::new(
                options.sample_rate,
                options.update_interval,
                source,
            )?),
            ContextMode::Offline => {
                // validate() guarantees the duration is present
                let duration = options.duration_seconds.unwrap_or_default();
                let job = RenderJob::new(duration, options.channel_count, options.sample_rate)?;
                Box::new(OfflineStrategy::new(job, options.catch_up_step)?)
            }
        };

        tracing::debug!(
            mode = %options.mode,
            sample_rate = options.sample_rate,
            channels = options.channel_count,
            tick_increment = strategy.tick_increment(),
            "context created"
        );

        Ok(Self {
            strategy,
            scheduler: EventScheduler::new(),
            graph,
            sample_rate: options.sample_rate,
            channel_count: options.channel_count,
            failures: Vec::new(),
        })
    }

    /// Realtime context with default update interval
    pub fn realtime(sample_rate: u32, graph: Box<dyn GraphPrimitiveProvider>) -> Result<Self> {
        Self::new(ContextOptions::realtime(sample_rate), graph)
    }

    /// Offline context rendering `duration_seconds` of `channel_count` channels
    pub fn offline(
        channel_count: u16,
        duration_seconds: Seconds,
        sample_rate: u32,
        graph: Box<dyn GraphPrimitiveProvider>,
    ) -> Result<Self> {
        Self::new(
            ContextOptions::offline(channel_count, duration_seconds, sample_rate),
            graph,
        )
    }

    pub fn mode(&self) -> ContextMode {
        self.strategy.mode()
    }

    pub fn state(&self) -> ContextState {
        self.strategy.state()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    /// Wall time (realtime) or swept virtual time (offline)
    pub fn now(&self) -> Seconds {
        self.strategy.now()
    }

    pub fn tick_increment(&self) -> Seconds {
        self.strategy.tick_increment()
    }

    /// Start the clock (realtime); resolves immediately offline
    pub async fn resume(&mut self) -> Result<()> {
        self.strategy.resume()
    }

    /// Freeze the clock (realtime only)
    pub async fn suspend(&mut self) -> Result<()> {
        self.strategy.suspend()
    }

    /// Release the session; resolves with the context itself
    pub async fn close(&mut self) -> Result<&mut Self> {
        self.strategy.close(self.graph.as_mut())?;
        Ok(self)
    }

    /// Drain the schedule and render the graph (offline only, once)
    pub async fn render(&mut self) -> Result<RenderedBuffer> {
        self.strategy
            .render(&self.scheduler, self.graph.as_mut(), &mut self.failures)
    }

    /// Give a realtime context the chance to fire due passes
    pub fn poll(&mut self) -> usize {
        self.strategy.poll(&self.scheduler, &mut self.failures)
    }

    /// Run `listener` on every notification pass
    pub fn on_tick<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(Seconds) -> ListenerResult + 'static,
    {
        self.scheduler.subscribe(listener)
    }

    /// Run `callback` once, on the first pass at or past virtual time `at`
    ///
    /// The callback receives `at`, so sample-accurate work keyed on it does
    /// not depend on how coarse the passes are.
    pub fn schedule_at<F>(&mut self, at: Seconds, callback: F) -> Result<SubscriptionId>
    where
        F: FnOnce(Seconds) -> ListenerResult + 'static,
    {
        self.scheduler.subscribe_at(at, callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.scheduler.unsubscribe(id)
    }

    /// Handle listeners can capture to (un)subscribe during a pass
    pub fn scheduler_handle(&self) -> SchedulerHandle {
        self.scheduler.handle()
    }

    pub fn listener_count(&self) -> usize {
        self.scheduler.len()
    }

    /// Listener failures collected since the last call
    pub fn take_listener_failures(&mut self) -> Vec<ListenerFailure> {
        std::mem::take(&mut self.failures)
    }

    pub fn destination(&self) -> NodeHandle {
        self.graph.destination()
    }

    pub fn connect(&mut self, source: NodeHandle, destination: NodeHandle) -> Result<()> {
        Ok(self.graph.connect(source, destination)?)
    }

    pub fn disconnect(&mut self, node: NodeHandle) -> Result<()> {
        Ok(self.graph.disconnect(node)?)
    }

    /// Disconnect and drop a node the caller no longer needs
    pub fn release(&mut self, node: NodeHandle) -> Result<()> {
        Ok(self.graph.release(node)?)
    }

    pub fn create_shaper(&mut self, curve: ShaperCurve) -> Result<NodeHandle> {
        Ok(self.graph.create_shaper(curve)?)
    }

    pub fn create_stream_source(&mut self, stream: &mut MediaStream) -> Result<NodeHandle> {
        Ok(self.graph.create_stream_source(stream)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::clock::tests::ManualSource;
    use crate::graph::{GraphError, SoftwareGraph};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn offline(duration: Seconds) -> Context {
        Context::offline(1, duration, 44_100, Box::new(SoftwareGraph::new(44_100))).unwrap()
    }

    fn recorder(ctx: &mut Context) -> Rc<RefCell<Vec<Seconds>>> {
        let times = Rc::new(RefCell::new(Vec::new()));
        let log = times.clone();
        ctx.on_tick(move |t| {
            log.borrow_mut().push(t);
            Ok(())
        });
        times
    }

    #[tokio::test]
    async fn test_offline_render_ticks_every_five_ms() {
        let mut ctx = offline(0.02);
        let times = recorder(&mut ctx);

        let buffer = ctx.render().await.unwrap();

        let times = times.borrow();
        assert_eq!(times.len(), 5);
        for (time, expected) in times.iter().zip([0.0, 0.005, 0.01, 0.015, 0.02]) {
            assert!((time - expected).abs() < 1e-9, "{} vs {}", time, expected);
        }
        assert_eq!(buffer.len(), 882);
    }

    #[tokio::test]
    async fn test_second_render_fails_fast() {
        let mut ctx = offline(0.02);
        let times = recorder(&mut ctx);

        let first = ctx.render().await.unwrap();
        let second = ctx.render().await;

        assert_eq!(second, Err(Error::TerminalState(DriverState::Rendered)));
        assert_eq!(times.borrow().len(), 5);
        assert_eq!(first.len(), 882);
        assert_eq!(ctx.state(), ContextState::Closed);
    }

    #[tokio::test]
    async fn test_offline_resume_does_not_move_time() {
        let mut ctx = offline(0.1);
        ctx.resume().await.unwrap();
        assert_eq!(ctx.now(), 0.0);
        assert_eq!(ctx.poll(), 0);
        assert_eq!(ctx.state(), ContextState::Suspended);
    }

    #[tokio::test]
    async fn test_offline_close_resolves_with_context() {
        let mut ctx = offline(0.1);
        let closed = ctx.close().await.unwrap();
        assert_eq!(closed.state(), ContextState::Closed);
        assert_eq!(ctx.render().await, Err(Error::Closed));
    }

    #[tokio::test]
    async fn test_offline_suspend_is_invalid() {
        let mut ctx = offline(0.1);
        assert!(matches!(
            ctx.suspend().await,
            Err(Error::InvalidMode { operation: "suspend", mode: ContextMode::Offline })
        ));
    }

    #[tokio::test]
    async fn test_schedule_at_fires_once_at_requested_time() {
        let mut ctx = offline(0.05);
        let fired = Rc::new(RefCell::new(Vec::new()));

        for at in [0.0123, 0.0, 0.03] {
            let log = fired.clone();
            ctx.schedule_at(at, move |t| {
                log.borrow_mut().push(t);
                Ok(())
            })
            .unwrap();
        }
        assert_eq!(ctx.schedule_at(-1.0, |_| Ok(())), Err(Error::InvalidTime(-1.0)));

        ctx.render().await.unwrap();

        assert_eq!(*fired.borrow(), vec![0.0, 0.0123, 0.03]);
        assert_eq!(ctx.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_listener_failures_are_aggregated() {
        let mut ctx = offline(0.01);
        ctx.on_tick(|t| {
            if t > 0.0 {
                Err(format!("bad tick at {}", t).into())
            } else {
                Ok(())
            }
        });
        let times = recorder(&mut ctx);

        ctx.render().await.unwrap();

        assert_eq!(times.borrow().len(), 3);
        let failures = ctx.take_listener_failures();
        assert_eq!(failures.len(), 2);
        assert!(ctx.take_listener_failures().is_empty());
    }

    #[tokio::test]
    async fn test_native_failure_surfaces_unchanged() {
        let mut graph = SoftwareGraph::new(44_100);
        graph.fail_next_render("engine exploded");
        let mut ctx = Context::offline(2, 0.01, 44_100, Box::new(graph)).unwrap();

        assert_eq!(
            ctx.render().await,
            Err(Error::NativeRenderFailure(GraphError::Backend("engine exploded".into())))
        );
        assert_eq!(
            ctx.render().await,
            Err(Error::TerminalState(DriverState::Failed))
        );
    }

    #[tokio::test]
    async fn test_realtime_render_is_invalid_mode() {
        let mut ctx = Context::realtime(48_000, Box::new(SoftwareGraph::new(48_000))).unwrap();
        assert_eq!(
            ctx.render().await,
            Err(Error::InvalidMode { operation: "render", mode: ContextMode::Realtime })
        );
    }

    #[tokio::test]
    async fn test_realtime_lifecycle_with_manual_clock() {
        let source = ManualSource::default();
        let mut ctx = Context::with_time_source(
            ContextOptions::realtime(48_000).with_update_interval(0.1),
            Box::new(SoftwareGraph::new(48_000)),
            Box::new(source.clone()),
        )
        .unwrap();
        let times = recorder(&mut ctx);

        assert_eq!(ctx.state(), ContextState::Suspended);
        assert_eq!(ctx.poll(), 0);

        ctx.resume().await.unwrap();
        assert_eq!(ctx.state(), ContextState::Running);
        assert_eq!(ctx.poll(), 1);
        source.set(0.1);
        assert_eq!(ctx.poll(), 1);

        ctx.close().await.unwrap();
        source.set(1.0);
        assert_eq!(ctx.poll(), 0);
        assert_eq!(ctx.resume().await, Err(Error::Closed));
        assert_eq!(*times.borrow(), vec![0.0, 0.1]);
    }

    #[test]
    fn test_sample_rate_mismatch_rejected() {
        let result = Context::offline(1, 1.0, 44_100, Box::new(SoftwareGraph::new(48_000)));
        assert!(matches!(
            result,
            Err(Error::InvalidConfig { field: "sample_rate", .. })
        ));
    }

    #[test]
    fn test_offline_tick_increment_is_render_quantum() {
        let ctx = offline(1.0);
        assert!((ctx.tick_increment() - 128.0 / 44_100.0).abs() < 1e-12);
    }

    #[test]
    fn test_graph_wiring_errors_surface() {
        let mut ctx = offline(1.0);
        let shaper = ctx.create_shaper(crate::dsp::range::gain_to_audio()).unwrap();
        let destination = ctx.destination();
        ctx.connect(shaper, destination).unwrap();
        assert!(matches!(
            ctx.connect(destination, shaper),
            Err(Error::Graph(GraphError::InvalidConnection { .. }))
        ));
        ctx.disconnect(shaper).unwrap();
    }

    #[test]
    fn test_release_keeps_destination() {
        let mut ctx = offline(1.0);
        let destination = ctx.destination();
        assert!(matches!(
            ctx.release(destination),
            Err(Error::Graph(GraphError::PermanentNode(_)))
        ));

        let shaper = ctx.create_shaper(crate::dsp::range::gain_to_audio()).unwrap();
        ctx.connect(shaper, destination).unwrap();
        ctx.release(shaper).unwrap();
        assert!(matches!(
            ctx.release(shaper),
            Err(Error::Graph(GraphError::UnknownNode(_)))
        ));
    }
}

//! Subcommand runners

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use color_eyre::eyre::{eyre, Result as EyreResult, WrapErr};
use saavy_clock::{
    dsp::range,
    graph::SoftwareGraph,
    io::{CpalDevices, DeviceSelector, UserMedia},
    Context, Seconds,
};

/// Offline: schedule one click per beat, render, print what fired when
pub async fn offline(duration: Seconds, sample_rate: u32, channels: u16, bpm: f64) -> EyreResult<()> {
    if !(bpm.is_finite() && bpm > 0.0) {
        return Err(eyre!("bpm must be positive, got {}", bpm));
    }

    // a constant routed through a range shaper keeps the render audible to the peak meter
    let mut graph = SoftwareGraph::new(sample_rate);
    let level = graph.create_constant(0.25);

    let mut ctx = Context::offline(channels, duration, sample_rate, Box::new(graph))
        .wrap_err("failed to create offline context")?;
    let shaper = ctx.create_shaper(range::gain_to_audio())?;
    let destination = ctx.destination();
    ctx.connect(level, shaper)?;
    ctx.connect(shaper, destination)?;

    let passes = Rc::new(Cell::new(0usize));
    let counter = passes.clone();
    ctx.on_tick(move |time| {
        counter.set(counter.get() + 1);
        tracing::debug!(time, "pass");
        Ok(())
    });

    let beat = 60.0 / bpm;
    let clicks = Rc::new(RefCell::new(Vec::new()));
    let mut beat_index = 0u32;
    while beat_index as Seconds * beat <= duration {
        let log = clicks.clone();
        let index = beat_index;
        ctx.schedule_at(beat_index as Seconds * beat, move |time| {
            log.borrow_mut().push((index, time));
            Ok(())
        })?;
        beat_index += 1;
    }

    println!("=== saavy offline ===");
    println!("Duration: {} s @ {} Hz, {} channel(s)", duration, sample_rate, channels);
    println!("Tempo: {} bpm ({} clicks)", bpm, beat_index);
    println!();

    let buffer = ctx.render().await.wrap_err("offline render failed")?;

    for (index, time) in clicks.borrow().iter() {
        println!("  click {:>3} at {:.4} s", index, time);
    }
    println!();

    let peak = buffer
        .channel(0)
        .map(|samples| samples.iter().fold(0.0f32, |peak, s| peak.max(s.abs())))
        .unwrap_or(0.0);
    println!("Passes: {}", passes.get());
    println!("Frames: {} x {} channel(s)", buffer.len(), buffer.channel_count());
    println!("Peak: {:.3}", peak);

    for failure in ctx.take_listener_failures() {
        println!("  listener failed at {:.4} s: {}", failure.time, failure.message);
    }
    Ok(())
}

/// Realtime: poll the context against the system clock for `seconds`
pub async fn live(seconds: Seconds, sample_rate: u32, input: Option<String>) -> EyreResult<()> {
    let mut ctx = Context::realtime(sample_rate, Box::new(SoftwareGraph::new(sample_rate)))
        .wrap_err("failed to create realtime context")?;

    let passes = Rc::new(Cell::new(0usize));
    let counter = passes.clone();
    ctx.on_tick(move |time| {
        counter.set(counter.get() + 1);
        tracing::debug!(time, "pass");
        Ok(())
    });

    let mut media = None;
    if let Some(input) = input {
        let selector = match input.parse::<usize>() {
            Ok(index) => DeviceSelector::Index(index),
            Err(_) => DeviceSelector::LabelOrId(input),
        };
        let mut mic = UserMedia::new(CpalDevices::new());
        match mic.open(&mut ctx, selector).await {
            Ok(()) => {
                if let Some(source) = mic.output() {
                    let destination = ctx.destination();
                    ctx.connect(source, destination)?;
                }
                println!("Input: {}", mic.label().unwrap_or("unknown"));
                media = Some(mic);
            }
            Err(err) => tracing::warn!(error = %err, "continuing without input"),
        }
    }

    println!("=== saavy live ===");
    println!("Running for {} s @ {} Hz", seconds, sample_rate);

    ctx.resume().await?;
    let nap = Duration::from_secs_f64(ctx.tick_increment() / 4.0);
    let end = ctx.now() + seconds;
    while ctx.now() < end {
        ctx.poll();
        tokio::time::sleep(nap).await;
    }

    if let Some(mut mic) = media {
        mic.close(&mut ctx);
    }
    ctx.close().await?;

    println!("Passes: {}", passes.get());
    println!("Clock: {:.3} s", ctx.now());
    Ok(())
}

//! Merge pipeline: two sources feed a merge actor, a barrier pairs the merged
//! stream with a counter, and a sink prints the pairs.
//!
//! Run with `RUST_LOG=rendezvous=debug` to watch registrations and commits.

use crossbeam_channel::bounded;
use rendezvous::{Director, DirectorConfig, ReceiverMatrix, Result};
use tracing_subscriber::EnvFilter;

const PER_SOURCE: u64 = 5;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let director = Director::<u64>::new(DirectorConfig::default().with_finish_on_deadlock(true));
    let rs = director.add_receivers(6);
    let (left, right, merged, ticks) = (rs[0], rs[1], rs[2], rs[3]);
    let (out_value, out_tick) = (rs[4], rs[5]);

    // Nobody starts until every actor is registered, so a half-built network
    // is never mistaken for a deadlock.
    let (gate, opened) = bounded::<()>(0);

    let mut handles = Vec::new();
    for (name, receiver, base) in [("left", left, 0), ("right", right, 100)] {
        let opened = opened.clone();
        handles.push(director.spawn(name, move |actor| -> Result<()> {
            let _ = opened.recv();
            for i in 0..PER_SOURCE {
                actor.put(receiver, base + i)?;
            }
            Ok(())
        })?);
    }

    let wait = opened.clone();
    handles.push(director.spawn("merge", move |actor| -> Result<()> {
        let _ = wait.recv();
        let inputs = ReceiverMatrix::from_receivers([left, right]);
        let outputs = ReceiverMatrix::single(merged);
        loop {
            actor.get_from_any_put_to_all(&inputs, &outputs)?;
        }
    })?);

    let wait = opened.clone();
    handles.push(director.spawn("counter", move |actor| -> Result<()> {
        let _ = wait.recv();
        for tick in 0.. {
            actor.put(ticks, tick)?;
        }
        Ok(())
    })?);

    let wait = opened.clone();
    handles.push(director.spawn("zip", move |actor| -> Result<()> {
        let _ = wait.recv();
        let inputs = ReceiverMatrix::from_receivers([merged, ticks]);
        let outputs = ReceiverMatrix::from_receivers([out_value, out_tick]);
        loop {
            actor.get_from_all_put_to_all(&inputs, &outputs)?;
        }
    })?);

    let sink = director.spawn("sink", move |actor| -> Result<Vec<(u64, u64)>> {
        let _ = opened.recv();
        let inputs = ReceiverMatrix::from_receivers([out_value, out_tick]);
        let mut pairs = Vec::new();
        for _ in 0..2 * PER_SOURCE {
            let tokens = actor.get_from_all(&inputs)?;
            println!("tick {:>2}: value {:>3}", tokens[1], tokens[0]);
            pairs.push((tokens[0], tokens[1]));
        }
        Ok(pairs)
    })?;

    drop(gate);

    let pairs = sink.join().unwrap_or_else(|_| Ok(Vec::new()))?;
    println!("sink received {} values", pairs.len());

    // Sources are done and the sink has left; the remaining actors deadlock and
    // the director finishes them.
    for handle in handles {
        let name = handle.name().to_string();
        match handle.join() {
            Ok(Err(err)) if err.is_terminated() => println!("{name}: terminated"),
            Ok(result) => println!("{name}: {result:?}"),
            Err(_) => println!("{name}: panicked"),
        }
    }
    Ok(())
}

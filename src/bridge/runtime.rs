use crossbeam_channel::{bounded, select, tick, Sender};
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::Bridge;
use crate::log_debug;
use crate::watchdog::Watchdog;

/// The two long-lived threads driving a bridge: the watchdog ticker and the arrival
/// consumer.
pub struct BridgeRuntime {
    bridge: Arc<Bridge>,
    shutdown: Option<Sender<()>>,
    watchdog: Option<thread::JoinHandle<()>>,
    consumer: Option<thread::JoinHandle<()>>,
}

impl BridgeRuntime {
    /// Start supervising. The first tick runs immediately, then once per `interval`.
    ///
    /// The ticker holds at most one pending tick, so a tick that overruns the interval
    /// coalesces with the next one instead of queueing behind it.
    pub fn start(bridge: Arc<Bridge>, interval: Duration) -> io::Result<Self> {
        // Never sent on; dropping the sender is the stop signal.
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);

        let arrivals = bridge.arrivals();
        let consumer_bridge = Arc::clone(&bridge);
        let consumer_stop = shutdown_rx.clone();
        let consumer = thread::Builder::new()
            .name("serialrelay-consumer".to_string())
            .spawn(move || loop {
                select! {
                    recv(arrivals) -> arrival => match arrival {
                        Ok(arrival) => consumer_bridge.handle_arrival(arrival),
                        Err(_) => break,
                    },
                    recv(consumer_stop) -> _ => break,
                }
            })?;

        let watchdog = Watchdog::new(Arc::clone(&bridge));
        let ticker = thread::Builder::new()
            .name("serialrelay-watchdog".to_string())
            .spawn(move || {
                let ticks = tick(interval);
                log_debug(&format!("watchdog started, interval {interval:?}"));
                watchdog.tick();
                loop {
                    select! {
                        recv(ticks) -> _ => {
                            watchdog.tick();
                        }
                        recv(shutdown_rx) -> _ => break,
                    }
                }
            })?;

        Ok(Self {
            bridge,
            shutdown: Some(shutdown_tx),
            watchdog: Some(ticker),
            consumer: Some(consumer),
        })
    }

    /// Stop both threads, then release the serial session.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if self.shutdown.take().is_none() {
            return;
        }
        for (name, handle) in [
            ("watchdog", self.watchdog.take()),
            ("consumer", self.consumer.take()),
        ] {
            if let Some(handle) = handle {
                if handle.join().is_err() {
                    log_debug(&format!("{name} thread panicked"));
                }
            }
        }
        self.bridge.disconnect();
        log_debug("bridge runtime stopped");
    }
}

impl Drop for BridgeRuntime {
    fn drop(&mut self) {
        self.stop();
    }
}

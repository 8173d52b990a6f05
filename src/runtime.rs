use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event as CtEvent, KeyEvent};

/// Everything the main loop reacts to. `Tick` carries the wall-clock
/// milliseconds elapsed since the previous tick; the session consumes that
/// as its logical delta, so time spent handling input is never lost.
#[derive(Clone, Debug)]
pub enum GameEvent {
    Key(KeyEvent),
    Resize,
    Tick(u64),
}

/// Where terminal events come from. The binary reads crossterm; headless
/// tests feed a channel instead.
pub trait GameEventSource: Send + 'static {
    /// Wait up to `timeout` for the next event.
    fn recv_timeout(&self, timeout: Duration) -> Result<GameEvent, RecvTimeoutError>;
}

/// Crossterm-backed source. A reader thread forwards key and resize events
/// into a channel and exits once the receiving side is gone.
pub struct CrosstermEventSource {
    rx: Receiver<GameEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            match event::read() {
                Ok(CtEvent::Key(key)) => {
                    if tx.send(GameEvent::Key(key)).is_err() {
                        break;
                    }
                }
                Ok(CtEvent::Resize(_, _)) => {
                    if tx.send(GameEvent::Resize).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(_) => break,
            }
        });

        Self { rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl GameEventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<GameEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// How long to wait for input before emitting a tick.
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Channel-fed source for driving the loop without a terminal.
pub struct TestEventSource {
    rx: Receiver<GameEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<GameEvent>) -> Self {
        Self { rx }
    }
}

impl GameEventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<GameEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Pumps the event source at the ticker's cadence. Input events pass
/// straight through; when the interval runs out with nothing arriving, the
/// runner measures how much wall time actually passed since the last tick
/// and stamps the tick with it. A burst of key events therefore delays the
/// next tick but never shrinks the total time the session sees.
pub struct Runner<E: GameEventSource, T: Ticker> {
    event_source: E,
    ticker: T,
    last_tick: Instant,
}

impl<E: GameEventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
            last_tick: Instant::now(),
        }
    }

    /// Next event, or a measured tick when the interval expires.
    pub fn step(&mut self) -> GameEvent {
        match self.event_source.recv_timeout(self.ticker.interval()) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                let now = Instant::now();
                let delta = now.duration_since(self.last_tick);
                self.last_tick = now;
                GameEvent::Tick(delta.as_millis() as u64)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn timeout_yields_a_measured_tick() {
        let (_tx, rx) = mpsc::channel();
        let es = TestEventSource::new(rx);
        let mut runner = Runner::new(es, FixedTicker::new(Duration::from_millis(5)));

        match runner.step() {
            GameEvent::Tick(delta_ms) => assert!(delta_ms >= 5),
            ev => panic!("expected a tick, got {ev:?}"),
        }
    }

    #[test]
    fn events_pass_through_before_ticks() {
        let (tx, rx) = mpsc::channel();
        tx.send(GameEvent::Resize).unwrap();
        let es = TestEventSource::new(rx);
        let mut runner = Runner::new(es, FixedTicker::new(Duration::from_millis(10)));

        assert!(matches!(runner.step(), GameEvent::Resize));
    }

    #[test]
    fn tick_delta_covers_time_spent_on_events() {
        let (tx, rx) = mpsc::channel();
        tx.send(GameEvent::Resize).unwrap();
        let es = TestEventSource::new(rx);
        let mut runner = Runner::new(es, FixedTicker::new(Duration::from_millis(5)));

        // an event arrives first and consumes no tick budget
        assert!(matches!(runner.step(), GameEvent::Resize));
        std::thread::sleep(Duration::from_millis(20));

        // the following tick must account for the whole gap, not just the
        // 5 ms wait: sleep + interval since the runner was built
        match runner.step() {
            GameEvent::Tick(delta_ms) => assert!(delta_ms >= 25),
            ev => panic!("expected a tick, got {ev:?}"),
        }
    }

    #[test]
    fn consecutive_ticks_measure_their_own_gaps() {
        let (_tx, rx) = mpsc::channel();
        let es = TestEventSource::new(rx);
        let mut runner = Runner::new(es, FixedTicker::new(Duration::from_millis(5)));

        std::thread::sleep(Duration::from_millis(100));
        let first = match runner.step() {
            GameEvent::Tick(d) => d,
            ev => panic!("expected a tick, got {ev:?}"),
        };
        let second = match runner.step() {
            GameEvent::Tick(d) => d,
            ev => panic!("expected a tick, got {ev:?}"),
        };
        assert!(first >= 105);
        // the second gap starts at the first tick, not at construction
        assert!(second >= 5 && second < 100);
    }
}

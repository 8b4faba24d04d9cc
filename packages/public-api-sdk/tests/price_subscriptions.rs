//! Price Subscription Integration Tests
//!
//! Drives the threaded engine end to end against scripted quote fetchers:
//! change delivery, baseline handling, callback isolation, cache retention
//! and concurrent registry mutation.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use test_case::test_case;

use public_api_sdk::{
    Callback, FetchError, InstrumentRef, PriceChange, PriceSubscriptionManager, Quote,
    QuoteFetcher, QuoteField, SchedulerOptions, SdkError, SubscriptionConfig,
};

// =============================================================================
// Helpers
// =============================================================================

fn options() -> SchedulerOptions {
    SchedulerOptions {
        worker_threads: 4,
        stop_timeout: Duration::from_secs(2),
        default_interval: Duration::from_millis(50),
        retry_unit: Duration::from_millis(1),
    }
}

fn fast() -> Option<SubscriptionConfig> {
    Some(SubscriptionConfig::with_frequency(0.1).unwrap())
}

fn quote(symbol: &str, last: Decimal) -> Quote {
    Quote::new(
        InstrumentRef::equity(symbol),
        Some(last),
        Some(last - dec!(0.05)),
        Some(last + dec!(0.05)),
    )
}

/// Returns the `n`-th scripted price on the `n`-th call for every requested
/// instrument, repeating the final price once the script runs out.
struct ScriptedFetcher {
    script: Vec<Decimal>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    fn new(script: Vec<Decimal>) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: AtomicUsize::new(0),
        })
    }
}

impl QuoteFetcher for ScriptedFetcher {
    fn fetch_quotes(&self, instruments: &[InstrumentRef]) -> Result<Vec<Quote>, FetchError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let price = self.script[n.min(self.script.len() - 1)];
        Ok(instruments
            .iter()
            .map(|instrument| quote(&instrument.symbol, price))
            .collect())
    }
}

/// Moves `last` from 150 to 151 once `switch_after` has elapsed; bid and ask
/// never move.
struct ClockFetcher {
    started: Instant,
    switch_after: Duration,
}

impl QuoteFetcher for ClockFetcher {
    fn fetch_quotes(&self, instruments: &[InstrumentRef]) -> Result<Vec<Quote>, FetchError> {
        let last = if self.started.elapsed() >= self.switch_after {
            dec!(151)
        } else {
            dec!(150)
        };
        Ok(instruments
            .iter()
            .map(|instrument| {
                Quote::new(instrument.clone(), Some(last), Some(dec!(149.9)), Some(dec!(150.1)))
            })
            .collect())
    }
}

/// Serves per-symbol prices for the current phase; every fetch reads the
/// phase once so all symbols in a batch come from the same phase.
struct PhasedFetcher {
    phase: AtomicUsize,
    prices: Vec<(&'static str, Vec<Decimal>)>,
}

impl PhasedFetcher {
    fn new(prices: Vec<(&'static str, Vec<Decimal>)>) -> Arc<Self> {
        Arc::new(Self {
            phase: AtomicUsize::new(0),
            prices,
        })
    }

    fn advance(&self) {
        self.phase.fetch_add(1, Ordering::SeqCst);
    }
}

impl QuoteFetcher for PhasedFetcher {
    fn fetch_quotes(&self, instruments: &[InstrumentRef]) -> Result<Vec<Quote>, FetchError> {
        let phase = self.phase.load(Ordering::SeqCst);
        Ok(instruments
            .iter()
            .filter_map(|instrument| {
                let (_, script) = self.prices.iter().find(|(s, _)| *s == instrument.symbol)?;
                Some(quote(&instrument.symbol, script[phase.min(script.len() - 1)]))
            })
            .collect())
    }
}

fn recorder() -> (Arc<Mutex<Vec<PriceChange>>>, Callback<PriceChange>) {
    let changes = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&changes);
    let callback = Callback::blocking(move |change| {
        sink.lock().unwrap().push(change);
        Ok(())
    });
    (changes, callback)
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

// =============================================================================
// Change delivery
// =============================================================================

#[test]
fn repeated_quote_then_change_fires_exactly_once() {
    let fetcher = ScriptedFetcher::new(vec![dec!(100), dec!(100), dec!(101)]);
    let manager = PriceSubscriptionManager::with_fetcher(fetcher.clone(), options());
    let (changes, callback) = recorder();

    manager
        .subscribe_instruments(vec![InstrumentRef::equity("AAPL")], callback, fast())
        .unwrap();

    assert!(wait_until(Duration::from_secs(3), || !changes.lock().unwrap().is_empty()));
    // Let a few more identical polls go by.
    thread::sleep(Duration::from_millis(300));
    manager.stop();

    let changes = changes.lock().unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].old_quote.as_ref().unwrap().last, Some(dec!(100)));
    assert_eq!(changes[0].new_quote.last, Some(dec!(101)));
    assert!(fetcher.calls.load(Ordering::SeqCst) >= 3);
}

#[test]
fn default_frequency_reports_single_change_within_a_second() {
    let fetcher = ScriptedFetcher::new(vec![dec!(100.00), dec!(101.00)]);
    let manager = PriceSubscriptionManager::with_fetcher(fetcher, options());
    let (changes, callback) = recorder();

    manager
        .subscribe_instruments(vec![InstrumentRef::equity("AAPL")], callback, None)
        .unwrap();

    thread::sleep(Duration::from_millis(1500));
    manager.stop();

    let changes = changes.lock().unwrap();
    assert_eq!(changes.len(), 1);
    assert!(changes[0].has_changed(QuoteField::Last));
    assert_eq!(changes[0].old_quote.as_ref().unwrap().last, Some(dec!(100.00)));
    assert_eq!(changes[0].new_quote.last, Some(dec!(101.00)));
}

#[test]
fn last_price_move_reports_only_last_field() {
    let fetcher = Arc::new(ClockFetcher {
        started: Instant::now(),
        switch_after: Duration::from_millis(1200),
    });
    let manager = PriceSubscriptionManager::with_fetcher(fetcher, options());
    let (changes, callback) = recorder();

    manager
        .subscribe_instruments(
            vec![InstrumentRef::equity("AAPL")],
            callback,
            Some(SubscriptionConfig::with_frequency(0.5).unwrap()),
        )
        .unwrap();

    thread::sleep(Duration::from_millis(2500));
    manager.stop();

    let changes = changes.lock().unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].instrument, InstrumentRef::equity("AAPL"));
    assert_eq!(changes[0].changed_fields, vec![QuoteField::Last]);
    assert_eq!(changes[0].new_quote.last, Some(dec!(151)));
}

#[test]
fn failing_callback_does_not_block_other_subscriptions() {
    let fetcher = ScriptedFetcher::new(vec![dec!(10), dec!(11), dec!(12), dec!(13)]);
    let manager = PriceSubscriptionManager::with_fetcher(fetcher, options());
    let failures = Arc::new(AtomicUsize::new(0));
    let failures_seen = Arc::clone(&failures);
    let (changes, callback) = recorder();

    manager
        .subscribe_instruments(
            vec![InstrumentRef::equity("AAPL")],
            Callback::blocking(move |_| {
                failures_seen.fetch_add(1, Ordering::SeqCst);
                anyhow::bail!("subscriber is broken")
            }),
            fast(),
        )
        .unwrap();
    manager
        .subscribe_instruments(vec![InstrumentRef::equity("AAPL")], callback, fast())
        .unwrap();

    assert!(wait_until(Duration::from_secs(3), || changes.lock().unwrap().len() >= 2));
    manager.stop();

    assert!(failures.load(Ordering::SeqCst) >= 1);
    assert_eq!(manager.get_active_subscriptions().len(), 2);
}

#[test]
fn callback_error_does_not_hold_back_other_instrument_in_same_cycle() {
    let fetcher = PhasedFetcher::new(vec![
        ("AAPL", vec![dec!(100), dec!(101), dec!(102)]),
        ("MSFT", vec![dec!(200), dec!(201), dec!(201)]),
    ]);
    let manager = PriceSubscriptionManager::with_fetcher(fetcher.clone(), options());
    let aapl = InstrumentRef::equity("AAPL");
    let msft = InstrumentRef::equity("MSFT");

    let aapl_seen: Arc<Mutex<Vec<Decimal>>> = Arc::default();
    let aapl_sink = Arc::clone(&aapl_seen);
    manager
        .subscribe_instruments(
            vec![aapl.clone()],
            Callback::blocking(move |change: PriceChange| {
                let mut seen = aapl_sink.lock().unwrap();
                seen.push(change.new_quote.last.unwrap());
                if seen.len() == 1 {
                    anyhow::bail!("first delivery fails");
                }
                Ok(())
            }),
            fast(),
        )
        .unwrap();
    let (msft_changes, msft_callback) = recorder();
    manager
        .subscribe_instruments(vec![msft.clone()], msft_callback, fast())
        .unwrap();

    assert!(wait_until(Duration::from_secs(3), || {
        manager.cached_value(&aapl).is_some() && manager.cached_value(&msft).is_some()
    }));

    // Both symbols move in the same batched fetch.
    fetcher.advance();
    assert!(wait_until(Duration::from_secs(3), || {
        !msft_changes.lock().unwrap().is_empty() && !aapl_seen.lock().unwrap().is_empty()
    }));
    assert_eq!(*aapl_seen.lock().unwrap(), vec![dec!(101)]);

    fetcher.advance();
    assert!(wait_until(Duration::from_secs(3), || aapl_seen.lock().unwrap().len() >= 2));
    manager.stop();

    assert_eq!(*aapl_seen.lock().unwrap(), vec![dec!(101), dec!(102)]);
    let msft_changes = msft_changes.lock().unwrap();
    assert_eq!(msft_changes.len(), 1);
    assert_eq!(msft_changes[0].new_quote.last, Some(dec!(201)));
}

#[test]
fn panicking_callback_keeps_scheduler_alive() {
    let fetcher = ScriptedFetcher::new(vec![dec!(1), dec!(2), dec!(3), dec!(4)]);
    let manager = PriceSubscriptionManager::with_fetcher(fetcher, options());
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);

    manager
        .subscribe_instruments(
            vec![InstrumentRef::equity("MSFT")],
            Callback::blocking(move |_| {
                let n = seen.fetch_add(1, Ordering::SeqCst);
                assert!(n > 0, "first delivery panics");
                Ok(())
            }),
            fast(),
        )
        .unwrap();

    assert!(wait_until(Duration::from_secs(3), || calls.load(Ordering::SeqCst) >= 2));
    assert!(manager.is_running());
    manager.stop();
}

#[test]
fn paused_subscription_receives_nothing() {
    let fetcher = ScriptedFetcher::new((0..50).map(Decimal::from).collect());
    let manager = PriceSubscriptionManager::with_fetcher(fetcher, options());
    let (changes, callback) = recorder();

    let id = manager
        .subscribe_instruments(vec![InstrumentRef::equity("AAPL")], callback, fast())
        .unwrap();
    assert!(manager.pause(id));
    thread::sleep(Duration::from_millis(400));

    assert!(changes.lock().unwrap().is_empty());
    assert!(manager.get_active_subscriptions().is_empty());

    assert!(manager.resume(id));
    assert!(wait_until(Duration::from_secs(3), || !changes.lock().unwrap().is_empty()));
    manager.stop();
}

// =============================================================================
// Registry behavior
// =============================================================================

#[test]
fn shared_key_cache_survives_partial_unsubscribe() {
    let fetcher = ScriptedFetcher::new(vec![dec!(100)]);
    let manager = PriceSubscriptionManager::with_fetcher(fetcher, options());
    let aapl = InstrumentRef::equity("AAPL");
    let msft = InstrumentRef::equity("MSFT");

    let a = manager
        .subscribe_instruments(vec![aapl.clone()], Callback::blocking(|_| Ok(())), fast())
        .unwrap();
    let b = manager
        .subscribe_instruments(
            vec![aapl.clone(), msft.clone()],
            Callback::blocking(|_| Ok(())),
            fast(),
        )
        .unwrap();

    assert!(wait_until(Duration::from_secs(3), || {
        manager.cached_value(&aapl).is_some() && manager.cached_value(&msft).is_some()
    }));
    manager.stop();

    assert!(manager.unsubscribe(b));
    assert!(manager.cached_value(&aapl).is_some());
    assert!(manager.cached_value(&msft).is_none());
    assert_eq!(manager.watcher_count(&aapl), 1);

    assert!(manager.unsubscribe(a));
    assert!(manager.cached_value(&aapl).is_none());
    assert!(!manager.unsubscribe(a));
}

#[test]
fn concurrent_subscribe_and_unsubscribe_leave_no_residue() {
    let fetcher = ScriptedFetcher::new(vec![dec!(1), dec!(2)]);
    let manager = Arc::new(PriceSubscriptionManager::with_fetcher(fetcher, options()));
    let symbols = ["AAPL", "MSFT", "NVDA", "TSLA"];

    let workers: Vec<_> = (0..8)
        .map(|t| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                for i in 0..25 {
                    let symbol = symbols[(t + i) % symbols.len()];
                    let id = manager
                        .subscribe_instruments(
                            vec![InstrumentRef::equity(symbol)],
                            Callback::blocking(|_| Ok(())),
                            fast(),
                        )
                        .unwrap();
                    assert!(manager.get_subscription_info(id).is_some());
                    assert!(manager.unsubscribe(id));
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    manager.stop();

    assert!(manager.get_active_subscriptions().is_empty());
    for symbol in symbols {
        let instrument = InstrumentRef::equity(symbol);
        assert_eq!(manager.watcher_count(&instrument), 0);
        assert!(manager.cached_value(&instrument).is_none());
    }
}

#[test]
fn subscribe_deduplicates_instruments() {
    let manager =
        PriceSubscriptionManager::with_fetcher(ScriptedFetcher::new(vec![dec!(1)]), options());
    let id = manager
        .subscribe_instruments(
            vec![InstrumentRef::equity("AAPL"), InstrumentRef::equity("AAPL")],
            Callback::blocking(|_| Ok(())),
            None,
        )
        .unwrap();
    manager.stop();

    let info = manager.get_subscription_info(id).unwrap();
    assert_eq!(info.watched, vec![InstrumentRef::equity("AAPL")]);
}

// =============================================================================
// Frequency validation
// =============================================================================

#[test_case(0.1, true ; "lower bound")]
#[test_case(60.0, true ; "upper bound")]
#[test_case(2.5, true ; "inside range")]
#[test_case(0.099, false ; "below lower bound")]
#[test_case(60.001, false ; "above upper bound")]
#[test_case(f64::NAN, false ; "not a number")]
fn set_frequency_bounds(seconds: f64, accepted: bool) {
    let manager =
        PriceSubscriptionManager::with_fetcher(ScriptedFetcher::new(vec![dec!(1)]), options());
    let id = manager
        .subscribe_instruments(
            vec![InstrumentRef::equity("AAPL")],
            Callback::blocking(|_| Ok(())),
            None,
        )
        .unwrap();
    manager.stop();

    let result = manager.set_frequency(id, seconds);

    if accepted {
        assert!(result.unwrap());
        let info = manager.get_subscription_info(id).unwrap();
        assert_eq!(info.config.polling_frequency(), Duration::from_secs_f64(seconds));
    } else {
        assert!(matches!(result, Err(SdkError::InvalidArgument(_))));
    }
}

#[test]
fn set_frequency_on_unknown_subscription_is_false() {
    let manager =
        PriceSubscriptionManager::with_fetcher(ScriptedFetcher::new(vec![dec!(1)]), options());
    let id = manager
        .subscribe_instruments(
            vec![InstrumentRef::equity("AAPL")],
            Callback::blocking(|_| Ok(())),
            None,
        )
        .unwrap();
    manager.stop();
    assert!(manager.unsubscribe(id));

    assert!(!manager.set_frequency(id, 1.0).unwrap());
}

use crate::models::*;
use chrono::NaiveDate;
use log::debug;

#[derive(Debug, PartialEq, Eq)]
pub enum EntryOutcome {
    Executed,
    Skipped {
        reason: &'static str,
        details: Option<String>,
    },
}

#[derive(Debug, PartialEq, Eq)]
pub enum ExitOutcome {
    Executed,
    Skipped { reason: &'static str },
}

#[derive(Debug, Clone)]
struct OpenPosition {
    size: u64,
    entry_date: NaiveDate,
    entry_price: f64,
    entry_commission: f64,
    stop_price: f64,
}

/// Everything the broker recorded over a run.
#[derive(Debug, Clone)]
pub struct BrokerLedger {
    pub cash: f64,
    pub open_position: f64,
    pub final_equity: f64,
    pub trades: Vec<Trade>,
    pub daily_positions: Vec<DailyPosition>,
}

/// Single-instrument, long-only account. Fills happen at the bar close with a
/// flat commission charged on each leg.
pub struct Broker {
    commission_rate: f64,
    cash: f64,
    position: Option<OpenPosition>,
    last_close: Option<f64>,
    peak_equity: Option<f64>,
    trades: Vec<Trade>,
    daily_positions: Vec<DailyPosition>,
}

impl Broker {
    pub fn new(initial_cash: f64, commission_rate: f64) -> Self {
        Self {
            commission_rate,
            cash: initial_cash,
            position: None,
            last_close: None,
            peak_equity: None,
            trades: Vec::new(),
            daily_positions: Vec::new(),
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn position_size(&self) -> u64 {
        self.position.as_ref().map(|p| p.size).unwrap_or(0)
    }

    pub fn equity(&self, close: f64) -> f64 {
        self.cash + self.position_size() as f64 * close
    }

    /// Account view for the strategy, marked at `close` before execution.
    pub fn state(&self, close: f64) -> BrokerState {
        BrokerState {
            cash: self.cash,
            buying_power: self.cash / (1.0 + self.commission_rate),
            equity: self.equity(close),
            position_size: self.position_size() as f64,
            entry_price: self.position.as_ref().map(|p| p.entry_price),
            entry_stop_price: self.position.as_ref().map(|p| p.stop_price),
        }
    }

    /// Applies a strategy decision on `bar`. Entries while long and exits
    /// while flat are ignored.
    pub fn execute(&mut self, bar: &Bar, decision: Decision) {
        match decision {
            Decision::Hold => {}
            Decision::EnterLong { size, stop_price } => {
                if let EntryOutcome::Skipped { reason, details } =
                    self.open_long(bar, size, stop_price)
                {
                    debug!(
                        "Entry on {} skipped: {}{}",
                        bar.date,
                        reason,
                        details.map(|d| format!(" ({})", d)).unwrap_or_default()
                    );
                }
            }
            Decision::ExitLong => {
                if let ExitOutcome::Skipped { reason } = self.close_long(bar) {
                    debug!("Exit on {} skipped: {}", bar.date, reason);
                }
            }
        }
    }

    pub fn open_long(&mut self, bar: &Bar, size: u64, stop_price: f64) -> EntryOutcome {
        if self.position.is_some() {
            return EntryOutcome::Skipped {
                reason: "position_already_open",
                details: None,
            };
        }
        if size == 0 {
            return EntryOutcome::Skipped {
                reason: "zero_size",
                details: None,
            };
        }

        let price = bar.close;
        let notional = price * size as f64;
        let commission = notional * self.commission_rate;
        let cost = notional + commission;
        if cost > self.cash {
            return EntryOutcome::Skipped {
                reason: "insufficient_cash",
                details: Some(format!("need {:.2}, have {:.2}", cost, self.cash)),
            };
        }

        self.cash -= cost;
        self.position = Some(OpenPosition {
            size,
            entry_date: bar.date,
            entry_price: price,
            entry_commission: commission,
            stop_price,
        });
        debug!(
            "Opened {} shares at {:.4} on {} (stop {:.4})",
            size, price, bar.date, stop_price
        );
        EntryOutcome::Executed
    }

    pub fn close_long(&mut self, bar: &Bar) -> ExitOutcome {
        let Some(position) = self.position.take() else {
            return ExitOutcome::Skipped {
                reason: "no_open_position",
            };
        };

        let price = bar.close;
        let size = position.size as f64;
        let proceeds = price * size;
        let exit_commission = proceeds * self.commission_rate;
        let commission = position.entry_commission + exit_commission;
        let pnl = (price - position.entry_price) * size - commission;
        let entry_notional = position.entry_price * size;
        let return_pct = if entry_notional > 0.0 {
            pnl / entry_notional
        } else {
            0.0
        };

        self.cash += proceeds - exit_commission;
        debug!(
            "Closed {} shares at {:.4} on {} (pnl {:.2})",
            position.size, price, bar.date, pnl
        );
        self.trades.push(Trade {
            date: bar.date,
            side: TradeSide::Sell,
            price,
            size,
            commission,
            pnl,
            entry_date: position.entry_date,
            entry_price: position.entry_price,
            return_pct,
        });
        ExitOutcome::Executed
    }

    /// Records the end-of-bar snapshot. Drawdown is measured against the
    /// highest equity seen in earlier snapshots (and this one).
    pub fn record_snapshot(&mut self, bar: &Bar) -> DailyPosition {
        let equity = self.equity(bar.close);
        let peak = self.peak_equity.map_or(equity, |peak| peak.max(equity));
        self.peak_equity = Some(peak);
        self.last_close = Some(bar.close);

        let drawdown = if peak > 0.0 {
            (equity - peak) / peak
        } else {
            0.0
        };
        let snapshot = DailyPosition {
            date: bar.date,
            position_size: self.position_size() as f64,
            cash: self.cash,
            equity,
            drawdown,
        };
        self.daily_positions.push(snapshot);
        snapshot
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn into_ledger(self) -> BrokerLedger {
        let final_equity = self
            .last_close
            .map(|close| self.equity(close))
            .unwrap_or(self.cash);
        BrokerLedger {
            cash: self.cash,
            open_position: self.position_size() as f64,
            final_equity,
            trades: self.trades,
            daily_positions: self.daily_positions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(day: u32, close: f64) -> Bar {
        let date = NaiveDate::from_ymd_opt(2024, 3, day).unwrap();
        Bar::new(date, close, close + 1.0, close - 1.0, close, 10_000.0)
    }

    #[test]
    fn test_open_long_charges_notional_and_commission() {
        let mut broker = Broker::new(10_000.0, 0.001);
        assert_eq!(broker.open_long(&bar(1, 100.0), 10, 95.0), EntryOutcome::Executed);
        assert!((broker.cash() - (10_000.0 - 1_000.0 - 1.0)).abs() < 1e-9);
        assert_eq!(broker.position_size(), 10);
        assert!(broker.trades().is_empty());

        let state = broker.state(101.0);
        assert_eq!(state.entry_price, Some(100.0));
        assert_eq!(state.entry_stop_price, Some(95.0));
        assert!((state.equity - (8_999.0 + 1_010.0)).abs() < 1e-9);
    }

    #[test]
    fn test_open_long_rejects_when_cash_short() {
        let mut broker = Broker::new(1_000.0, 0.001);
        let outcome = broker.open_long(&bar(1, 100.0), 10, 95.0);
        assert!(matches!(
            outcome,
            EntryOutcome::Skipped {
                reason: "insufficient_cash",
                ..
            }
        ));
        assert_eq!(broker.cash(), 1_000.0);
        assert_eq!(broker.position_size(), 0);
    }

    #[test]
    fn test_open_long_rejects_cost_just_above_cash() {
        let mut broker = Broker::new(100.0, 0.0);
        let outcome = broker.open_long(&bar(1, 100.000_000_9), 1, 95.0);
        assert!(matches!(
            outcome,
            EntryOutcome::Skipped {
                reason: "insufficient_cash",
                ..
            }
        ));
        assert_eq!(broker.cash(), 100.0);
        assert_eq!(broker.state(100.000_000_9).equity, 100.0);

        // exactly affordable still fills and leaves nothing behind
        assert_eq!(broker.open_long(&bar(1, 100.0), 1, 95.0), EntryOutcome::Executed);
        assert_eq!(broker.cash(), 0.0);
    }

    #[test]
    fn test_buying_power_reserves_commission() {
        let broker = Broker::new(1_001.0, 0.001);
        let state = broker.state(100.0);
        assert!((state.buying_power - 1_000.0).abs() < 1e-9);
        assert!(state.is_flat());
    }

    #[test]
    fn test_round_trip_records_single_trade() {
        let mut broker = Broker::new(10_000.0, 0.001);
        broker.open_long(&bar(1, 100.0), 10, 95.0);
        assert_eq!(broker.close_long(&bar(4, 110.0)), ExitOutcome::Executed);

        let trade = &broker.trades()[0];
        assert_eq!(broker.trades().len(), 1);
        assert_eq!(trade.side, TradeSide::Sell);
        assert_eq!(trade.entry_date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert!((trade.commission - 2.1).abs() < 1e-9);
        assert!((trade.pnl - (100.0 - 2.1)).abs() < 1e-9);
        assert!((trade.return_pct - 97.9 / 1_000.0).abs() < 1e-12);
        // cash moves by exactly the net pnl
        assert!((broker.cash() - (10_000.0 + trade.pnl)).abs() < 1e-9);
        assert_eq!(broker.state(110.0).entry_stop_price, None);
    }

    #[test]
    fn test_exit_when_flat_is_ignored() {
        let mut broker = Broker::new(5_000.0, 0.0);
        broker.execute(&bar(1, 50.0), Decision::ExitLong);
        assert!(broker.trades().is_empty());
        assert_eq!(broker.cash(), 5_000.0);
    }

    #[test]
    fn test_snapshot_tracks_running_peak() {
        let mut broker = Broker::new(1_000.0, 0.0);
        broker.open_long(&bar(1, 10.0), 50, 5.0);
        let first = broker.record_snapshot(&bar(1, 10.0));
        assert_eq!(first.drawdown, 0.0);
        broker.record_snapshot(&bar(2, 12.0));
        let third = broker.record_snapshot(&bar(3, 9.0));
        // peak 1100, now 950
        assert!((third.drawdown - (950.0 - 1_100.0) / 1_100.0).abs() < 1e-12);
        assert_eq!(third.position_size, 50.0);

        let ledger = broker.into_ledger();
        assert_eq!(ledger.daily_positions.len(), 3);
        assert!((ledger.final_equity - 950.0).abs() < 1e-9);
        assert_eq!(ledger.open_position, 50.0);
    }
}

use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tracing::{error, info, warn};

use common::{
    validate_candles, AnalysisRecord, CandleProvider, Config, EngineCommand, EngineState, Operation, Outcome,
    RecordSink, Signal,
};
use strategy::StrategyEngine;

/// Cloneable handle for controlling a running `Runner`.
#[derive(Clone)]
pub struct RunnerHandle {
    command_tx: mpsc::Sender<EngineCommand>,
    state: Arc<RwLock<EngineState>>,
}

impl RunnerHandle {
    pub async fn send(&self, cmd: EngineCommand) {
        let _ = self.command_tx.send(cmd).await;
    }

    pub async fn state(&self) -> EngineState {
        *self.state.read().await
    }
}

/// Polling loop around a `StrategyEngine`.
///
/// Every tick while running: fetch both timeframes, analyze, write the audit
/// record, and follow up open signals against the newest candles. Open
/// signals that hit their stop or target go into the ledger as losses or
/// wins; those still open when the runner stops go in as pending.
pub struct Runner {
    config: Config,
    engine: StrategyEngine,
    provider: Arc<dyn CandleProvider>,
    sink: Arc<dyn RecordSink>,
    open: Vec<Signal>,
    state: Arc<RwLock<EngineState>>,
    command_rx: mpsc::Receiver<EngineCommand>,
}

impl Runner {
    pub fn new(
        config: Config,
        engine: StrategyEngine,
        provider: Arc<dyn CandleProvider>,
        sink: Arc<dyn RecordSink>,
    ) -> (Self, RunnerHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);
        let state = Arc::new(RwLock::new(EngineState::Stopped));
        let handle = RunnerHandle { command_tx, state: state.clone() };
        let runner = Runner {
            config,
            engine,
            provider,
            sink,
            open: Vec::new(),
            state,
            command_rx,
        };
        (runner, handle)
    }

    pub fn engine(&self) -> &StrategyEngine {
        &self.engine
    }

    /// Signals not yet resolved.
    pub fn open_signals(&self) -> &[Signal] {
        &self.open
    }

    /// Drive the loop until `Stop` arrives or every handle is dropped.
    /// Returns the engine so the caller can report on its ledger.
    pub async fn run(mut self) -> StrategyEngine {
        info!(
            symbol = %self.config.symbol,
            htf = %self.config.htf_timeframe,
            ltf = %self.config.ltf_timeframe,
            every = ?self.config.poll_interval,
            bias_window = self.engine.params().bias_window,
            min_ltf_candles = self.engine.params().min_ltf_candles,
            "Runner initialized in Stopped state. Waiting for Start command."
        );
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => match cmd {
                    Some(EngineCommand::Stop) | None => {
                        info!("Runner stopping");
                        break;
                    }
                    Some(cmd) => self.apply(cmd).await,
                },
                _ = ticker.tick() => {
                    if *self.state.read().await == EngineState::Running {
                        self.poll_once().await;
                    }
                }
            }
        }

        *self.state.write().await = EngineState::Stopped;
        for signal in self.open.drain(..) {
            self.engine.register_operation(Operation::pending(&signal));
        }
        info!(operations = self.engine.ledger().len(), "Runner stopped");
        self.engine
    }

    async fn apply(&mut self, cmd: EngineCommand) {
        let current = *self.state.read().await;
        let next = match (cmd, current) {
            (EngineCommand::Start, EngineState::Stopped) => EngineState::Running,
            (EngineCommand::Pause, EngineState::Running) => EngineState::Paused,
            (EngineCommand::Resume, EngineState::Paused) => EngineState::Running,
            (cmd, state) => {
                warn!(?cmd, %state, "Command ignored in current state");
                return;
            }
        };
        info!(from = %current, to = %next, "Runner state changed");
        *self.state.write().await = next;
    }

    /// One analysis cycle. `None` when data was unavailable and the cycle
    /// was skipped.
    pub async fn poll_once(&mut self) -> Option<AnalysisRecord> {
        let cfg = &self.config;
        let (htf, ltf) = tokio::join!(
            self.provider.candles(&cfg.symbol, &cfg.htf_timeframe, cfg.htf_count),
            self.provider.candles(&cfg.symbol, &cfg.ltf_timeframe, cfg.ltf_count),
        );
        let (htf, ltf) = match (htf, ltf) {
            (Ok(htf), Ok(ltf)) => (htf, ltf),
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "Candle fetch failed; skipping cycle");
                return None;
            }
        };
        for (tf, series) in [(&cfg.htf_timeframe, &htf), (&cfg.ltf_timeframe, &ltf)] {
            if let Err(e) = validate_candles(&cfg.symbol, tf, series) {
                warn!(error = %e, "Skipping cycle");
                return None;
            }
        }

        self.follow_open(&ltf);

        let record = self.engine.analyze_detailed(&htf, &ltf);
        if let Err(e) = self.sink.write_record(&record) {
            error!(error = %e, sequence = record.sequence, "Failed to write analysis record");
        }

        match record.decision.signal() {
            Some(signal) if !self.open.iter().any(|s| s.timestamp == signal.timestamp) => {
                println!("{}", describe(signal, self.engine.risk_config().pip_size));
                self.open.push(*signal);
            }
            Some(_) => info!("Signal already open for this candle"),
            None => info!(decision = record.decision.label(), "No signal this cycle"),
        }
        Some(record)
    }

    fn follow_open(&mut self, candles: &[common::Candle]) {
        let pip_size = self.engine.risk_config().pip_size;
        let mut still_open = Vec::with_capacity(self.open.len());
        for signal in self.open.drain(..) {
            let operation = paper::simulate(&signal, candles, pip_size);
            if operation.outcome == Outcome::Pending {
                still_open.push(signal);
                continue;
            }
            info!(outcome = ?operation.outcome, pips = operation.pips, entry = signal.entry_price, "Open signal resolved");
            self.engine.register_operation(operation);
        }
        self.open = still_open;
    }
}

/// One-line summary printed for every new signal.
pub fn describe(signal: &Signal, pip_size: f64) -> String {
    format!(
        "{} {} @ {:.5} | SL {:.5} | TP {:.5} | {:.1} pips risk | RR 1:{:.1} | {:.2} lots | {} ({})",
        signal.direction,
        signal.opportunity,
        signal.entry_price,
        signal.stop_loss,
        signal.take_profit,
        signal.stop_distance / pip_size,
        signal.rr_ratio,
        signal.position_size,
        signal.entry_kind,
        signal.timestamp.format("%Y-%m-%d %H:%M"),
    )
}

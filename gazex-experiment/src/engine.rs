use std::sync::Arc;

use gazex_core::{
    EnvironmentInfo, ExperimentPhase, FixationStats, GazePoint, PhaseEvent, Session,
    SessionSummary, Side, Trial, TrialOutcome, TrialState, epoch_millis,
};
use gazex_gaze::{
    CalibrationResult, CalibrationSamples, GazeAdapter, GazeError, GazeOracle, GazeSmoother,
    TargetResult, VALIDATION_TARGETS, ValidationReport, reference_point,
};
use gazex_store::{Delivery, PersistenceGateway, SessionRequest, Transport};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};
use tokio::time::{Instant, sleep, sleep_until};
use tracing::{debug, error, info, warn};

use crate::config::ExperimentConfig;
use crate::error::EngineError;
use crate::images::{ImageSource, prepare_pair};
use crate::manifest::{LoadedManifest, Manifest, ManifestSource};
use crate::planner::{plan_trials, redraw_pair};
use crate::presenter::{Presenter, Prompt, Screen, UserAction};
use crate::visibility::{Visibility, watch_visibility};

/// Everything a finished session produced.
#[derive(Debug, Clone)]
pub struct EngineReport {
    pub summary: SessionSummary,
    pub session: Session,
    pub calibration: CalibrationResult,
    pub validation: ValidationReport,
    pub trials: Vec<Trial>,
    pub calibration_runs: u32,
    pub manifest_source: ManifestSource,
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    delivered: usize,
    queued: usize,
    lost: usize,
}

/// Drives one participant session from the welcome screen to completion.
pub struct Engine<O, T, S, P> {
    config: ExperimentConfig,
    gaze: GazeAdapter<O>,
    gateway: PersistenceGateway<T>,
    images: Arc<S>,
    presenter: P,
    manifest: LoadedManifest,
    rng: StdRng,
    phase: ExperimentPhase,
    trial_state: Option<TrialState>,
    smoother: GazeSmoother,
    visibility: Option<watch::Receiver<Visibility>>,
    deliveries: JoinSet<Delivery>,
    tally: Tally,
    breaks_taken: u32,
    calibration_runs: u32,
}

impl<O, T, S, P> Engine<O, T, S, P>
where
    O: GazeOracle,
    T: Transport,
    S: ImageSource,
    P: Presenter,
{
    pub fn new(
        config: ExperimentConfig,
        gaze: GazeAdapter<O>,
        gateway: PersistenceGateway<T>,
        images: S,
        presenter: P,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let manifest = Manifest::load_or_placeholder(config.stimuli.manifest_path.as_deref());
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Ok(Self {
            smoother: GazeSmoother::new(config.gaze.window_size),
            config,
            gaze,
            gateway,
            images: Arc::new(images),
            presenter,
            manifest,
            rng,
            phase: ExperimentPhase::default(),
            trial_state: None,
            visibility: None,
            deliveries: JoinSet::new(),
            tally: Tally::default(),
            breaks_taken: 0,
            calibration_runs: 0,
        })
    }

    /// Pauses the oracle whenever the receiver reports the display hidden.
    pub fn with_visibility(mut self, rx: watch::Receiver<Visibility>) -> Self {
        self.visibility = Some(rx);
        self
    }

    pub fn with_manifest(mut self, manifest: LoadedManifest) -> Self {
        self.manifest = manifest;
        self
    }

    pub fn phase(&self) -> ExperimentPhase {
        self.phase
    }

    pub fn trial_state(&self) -> Option<TrialState> {
        self.trial_state
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn gateway(&self) -> &PersistenceGateway<T> {
        &self.gateway
    }

    pub async fn run(&mut self) -> Result<EngineReport, EngineError> {
        let monitor = self
            .visibility
            .take()
            .map(|rx| watch_visibility(self.gaze.clone(), rx));
        let result = self.run_phases().await;
        if let Some(monitor) = monitor {
            monitor.abort();
        }
        self.gaze.end();
        if let Err(err) = &result {
            error!(phase = ?self.phase, error = %err, "experiment halted");
        }
        result
    }

    fn transition(&mut self, event: PhaseEvent) -> Result<(), EngineError> {
        let next = self.phase.on(event)?;
        info!(from = ?self.phase, to = ?next, ?event, "phase transition");
        self.phase = next;
        Ok(())
    }

    fn set_trial_state(&mut self, state: TrialState) {
        debug!(?state, "trial state");
        self.trial_state = Some(state);
    }

    fn screen_size(&self) -> (f64, f64) {
        let l = &self.config.layout;
        (l.screen_width as f64, l.screen_height as f64)
    }

    async fn run_phases(&mut self) -> Result<EngineReport, EngineError> {
        match self.gateway.replay_pending().await {
            Ok(report) if report.attempted > 0 => {
                info!(
                    delivered = report.delivered,
                    remaining = report.remaining,
                    sessions_created = report.sessions_created,
                    "earlier trials replayed"
                )
            }
            Ok(_) => {}
            Err(err) => warn!(error = %err, "queued trials could not be replayed"),
        }
        if let ManifestSource::Placeholder { reason } = &self.manifest.source {
            warn!(%reason, "running with placeholder stimuli");
        }

        self.presenter.show(&Screen::Welcome);
        self.presenter.prompt(Prompt::Start).await;
        self.transition(PhaseEvent::Continue)?;

        self.presenter.show(&Screen::Camera);
        self.gaze.initialize().await.map_err(GazeError::from)?;
        self.transition(PhaseEvent::CameraReady)?;

        let (calibration, validation) = loop {
            let calibration = self.calibrate().await?;
            self.transition(PhaseEvent::CalibrationComplete)?;

            let report = self.validate().await;
            let min_accuracy = self.config.validation.min_accuracy;
            let passed = report.passes(min_accuracy);
            self.presenter.show(&Screen::ValidationResult {
                report: report.clone(),
                passed,
            });
            if !passed {
                let action = self
                    .presenter
                    .prompt(Prompt::LowAccuracy {
                        accuracy: report.accuracy,
                        min_accuracy,
                    })
                    .await;
                if action == UserAction::Recalibrate {
                    self.smoother.reset_calibration();
                    self.transition(PhaseEvent::Recalibrate)?;
                    continue;
                }
                warn!(accuracy = report.accuracy, min_accuracy, "continuing below minimum accuracy");
            }
            break (calibration, report);
        };
        let session = self.open_session(validation.accuracy).await;
        self.transition(PhaseEvent::ValidationAccepted)?;

        let mut trials = plan_trials(
            &self.manifest.manifest,
            &self.config.scramble,
            self.config.trials,
            &mut self.rng,
        )?;
        self.presenter.show(&Screen::Instructions);
        self.presenter.prompt(Prompt::Instructions).await;
        self.transition(PhaseEvent::Continue)?;

        let total = trials.len() as u32;
        let break_every = self.config.break_every;
        for (index, trial) in trials.iter_mut().enumerate() {
            self.run_trial(trial, &session.id).await?;
            let completed = index as u32 + 1;
            if break_every > 0 && completed % break_every == 0 && completed < total {
                self.transition(PhaseEvent::BreakDue)?;
                self.breaks_taken += 1;
                info!(completed, total, "break");
                self.presenter.show(&Screen::Break { completed, total });
                self.presenter.prompt(Prompt::Break { completed, total }).await;
                self.transition(PhaseEvent::Continue)?;
            }
        }
        self.trial_state = None;
        self.transition(PhaseEvent::TrialsExhausted)?;

        Ok(self.complete(session, trials, calibration, validation).await)
    }

    /// Two timed halves, one per reference point. Repeats until both halves
    /// yield samples.
    async fn calibrate(&mut self) -> Result<CalibrationResult, EngineError> {
        let (w, h) = self.screen_size();
        let half = self.config.timing.calibration_half();
        loop {
            self.calibration_runs += 1;
            let mut samples = CalibrationSamples::new();
            let mut stream = self.gaze.subscribe();
            for side in [Side::Left, Side::Right] {
                let point = reference_point(side, w, h);
                self.presenter.show(&Screen::CalibrationTarget { side, point });
                for sample in stream.collect_until(Instant::now() + half).await {
                    samples.record(side, sample);
                }
            }
            self.gaze.release();

            match samples.threshold() {
                Ok(result) => {
                    self.smoother.set_threshold(result.threshold)?;
                    return Ok(result);
                }
                Err(err) => {
                    warn!(error = %err, run = self.calibration_runs, "calibration failed, repeating");
                    self.presenter
                        .prompt(Prompt::CalibrationRetry {
                            reason: err.to_string(),
                        })
                        .await;
                }
            }
        }
    }

    async fn validate(&mut self) -> ValidationReport {
        let (w, h) = self.screen_size();
        let diagonal = self.config.layout.diagonal();
        let settle = self.config.timing.validation_settle();
        let collect = self.config.timing.validation_collect();

        let mut results = Vec::with_capacity(VALIDATION_TARGETS.len());
        for (index, (fx, fy)) in VALIDATION_TARGETS.iter().enumerate() {
            let point = GazePoint::new(fx * w, fy * h);
            self.presenter.show(&Screen::ValidationTarget { index, point });
            sleep(settle).await;
            let mut stream = self.gaze.subscribe();
            let points: Vec<GazePoint> = stream
                .collect_until(Instant::now() + collect)
                .await
                .into_iter()
                .map(|s| s.point)
                .filter(GazePoint::is_finite)
                .collect();
            let result = TargetResult::score(point, &points, diagonal);
            debug!(index, distance = result.distance, samples = result.samples, "validation target");
            results.push(result);
        }
        self.gaze.release();
        ValidationReport::from_results(results, diagonal)
    }

    /// Creates the remote session, or falls back to a local id whose records go
    /// through the queue until a replay creates the session remotely.
    async fn open_session(&mut self, accuracy: f64) -> Session {
        let l = &self.config.layout;
        let environment = EnvironmentInfo::current(l.screen_width, l.screen_height);
        let request = SessionRequest {
            participant_id: self.config.participant_id.clone(),
            calibration_accuracy: accuracy,
            environment: environment.clone(),
        };
        let id = match self.gateway.create_session(&request).await {
            Ok(id) => id,
            Err(err) => {
                let id = self.gateway.local_session(&request);
                warn!(error = %err, session_id = %id, "remote session unavailable, continuing locally");
                id
            }
        };
        Session::new(id, request.participant_id, accuracy, environment)
    }

    async fn run_trial(&mut self, trial: &mut Trial, session_id: &str) -> Result<(), EngineError> {
        let timing = self.config.timing.clone();
        let (left_region, right_region) = self.config.layout.regions();
        let (w, h) = self.screen_size();
        info!(
            trial = trial.number,
            method = %trial.scramble.method,
            level = trial.scramble.level,
            "trial started"
        );

        self.set_trial_state(TrialState::InterTrial);
        self.presenter.show(&Screen::Blank);
        sleep(timing.inter_trial()).await;

        self.set_trial_state(TrialState::Fixation);
        self.presenter.show(&Screen::Fixation {
            center: GazePoint::new(w / 2.0, h / 2.0),
        });
        sleep(timing.fixation()).await;

        self.set_trial_state(TrialState::Loading);
        let prepared = match prepare_pair(
            &self.images,
            &trial.stimuli.left,
            &trial.stimuli.right,
            trial.scramble,
            trial.scramble_seed,
        )
        .await
        {
            Ok(pair) => Ok(pair),
            Err(first) => {
                trial.stimuli = redraw_pair(&self.manifest.manifest, &trial.stimuli, &mut self.rng)?;
                info!(trial = trial.number, "retrying with a fresh image pair");
                prepare_pair(
                    &self.images,
                    &trial.stimuli.left,
                    &trial.stimuli.right,
                    trial.scramble,
                    trial.scramble_seed,
                )
                .await
                .map_err(|second| format!("{first}; retry: {second}"))
            }
        };
        let (left, right) = match prepared {
            Ok(pair) => pair,
            Err(reason) => {
                self.set_trial_state(TrialState::Abandoned);
                warn!(trial = trial.number, %reason, "trial abandoned");
                trial.record_outcome(TrialOutcome {
                    fixation: FixationStats::default(),
                    raw_sample_count: 0,
                    duration_ms: 0,
                    timestamp_ms: epoch_millis(),
                    abandoned: Some(reason),
                });
                self.submit(session_id, trial);
                return Ok(());
            }
        };

        self.set_trial_state(TrialState::Stimulus);
        self.presenter.show(&Screen::Stimuli {
            trial: trial.number,
            left,
            right,
            left_region,
            right_region,
        });
        let opened = Instant::now();
        let deadline = opened + timing.trial_window();
        let mut stream = self.gaze.subscribe();
        let mut recorder = self.smoother.begin_trial()?;
        while let Some(sample) = stream.next_before(deadline).await {
            recorder.record(sample);
        }
        sleep_until(deadline).await;
        self.gaze.release();
        let (fixation, raw_sample_count) =
            recorder.finish(left_region, right_region, self.config.gaze.sample_rate_hz);

        trial.record_outcome(TrialOutcome {
            fixation,
            raw_sample_count,
            duration_ms: opened.elapsed().as_millis() as u64,
            timestamp_ms: epoch_millis(),
            abandoned: None,
        });
        self.set_trial_state(TrialState::Complete);
        info!(
            trial = trial.number,
            left_pct = fixation.left_percentage,
            right_pct = fixation.right_percentage,
            switches = fixation.switches,
            samples = fixation.total_samples,
            "trial complete"
        );
        self.submit(session_id, trial);
        Ok(())
    }

    /// Hands the record to the gateway without waiting for it.
    fn submit(&mut self, session_id: &str, trial: &Trial) {
        let Some(payload) = trial.payload() else {
            return;
        };
        let gateway = self.gateway.clone();
        let session_id = session_id.to_string();
        self.deliveries
            .spawn(async move { gateway.submit(&session_id, payload).await });
        while let Some(done) = self.deliveries.try_join_next() {
            self.count(done);
        }
    }

    fn count(&mut self, done: Result<Delivery, JoinError>) {
        match done {
            Ok(Delivery::Delivered) => self.tally.delivered += 1,
            Ok(Delivery::Queued) => self.tally.queued += 1,
            Ok(Delivery::Lost(_)) => self.tally.lost += 1,
            Err(err) => {
                error!(error = %err, "delivery task failed");
                self.tally.lost += 1;
            }
        }
    }

    async fn complete(
        &mut self,
        mut session: Session,
        trials: Vec<Trial>,
        calibration: CalibrationResult,
        validation: ValidationReport,
    ) -> EngineReport {
        while let Some(done) = self.deliveries.join_next().await {
            self.count(done);
        }

        let acknowledged = if session.is_local() {
            info!(session_id = %session.id, "local session, skipping remote completion");
            false
        } else {
            match self.gateway.complete_session(&session.id).await {
                Ok(()) => true,
                Err(err) => {
                    error!(session_id = %session.id, error = %err, "session completion not delivered");
                    false
                }
            }
        };
        session.mark_completed();

        let summary = SessionSummary {
            session_id: session.id.clone(),
            trials_run: trials.iter().filter(|t| t.outcome().is_some()).count(),
            trials_abandoned: trials.iter().filter(|t| t.is_abandoned()).count(),
            breaks_taken: self.breaks_taken as usize,
            delivered: self.tally.delivered,
            undelivered: self.tally.queued + self.tally.lost,
            completion_acknowledged: acknowledged,
            calibration_accuracy: session.calibration_accuracy,
        };
        info!(
            session_id = %summary.session_id,
            trials = summary.trials_run,
            abandoned = summary.trials_abandoned,
            delivered = summary.delivered,
            undelivered = summary.undelivered,
            "session complete"
        );
        self.presenter.show(&Screen::Completion {
            summary: summary.clone(),
        });

        EngineReport {
            summary,
            session,
            calibration,
            validation,
            trials,
            calibration_runs: self.calibration_runs,
            manifest_source: self.manifest.source.clone(),
        }
    }
}
